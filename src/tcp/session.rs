use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info, warn};

use crate::{
	config::Config,
	msg::{RawPacket, Request},
	protocol::Header,
	tcp::manager::Event,
};

/// Where the Cync cloud lives.
pub const DEFAULT_HOST: &str = "cm.gelighting.com";
pub const DEFAULT_PORT: u16 = 23778;

/// Minimum spacing between two successful connections.
pub const RECONNECT_FLOOR: Duration = Duration::from_secs(10);

/// Keep-alive cadence while connected.  A missed ping never triggers a reconnect on its own;
/// only stream closure or an I/O error does.
pub const PING_INTERVAL: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Disconnected,
	Connecting,
	Authenticating,
	Connected,
}

/// Owns the TCP connection to the cloud: the handshake, the pre-auth send queue, the
/// reconnect floor and the per-connection sequence counter.
///
/// A reader thread per connection decodes frames and hands them to the worker loop over the
/// event channel, tagged with a generation number so frames from a dead connection are
/// ignored after a reconnect.
pub struct Session {
	addr: String,
	config: Config,
	state: SessionState,
	stream: Option<TcpStream>,
	queue: VecDeque<Vec<u8>>,
	seq: u16,
	last_connect_success: Option<Instant>,
	generation: u64,
	events: Sender<Event>,
}

impl Session {
	pub fn new(addr: String, config: Config, events: Sender<Event>) -> Session {
		Session {
			addr,
			config,
			state: SessionState::Disconnected,
			stream: None,
			queue: VecDeque::new(),
			seq: 1,
			last_connect_success: None,
			generation: 0,
			events,
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn is_connected(&self) -> bool {
		self.state == SessionState::Connected
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// The per-connection sequence number stamped into STATUS and CONNECTED requests.
	pub fn next_seq(&mut self) -> u16 {
		let seq = self.seq;
		self.seq = self.seq.wrapping_add(1);
		seq
	}

	/// Open the TCP connection and immediately write the AUTH frame.
	///
	/// The caller waits for the inbound auth response before anything queued goes out.
	pub fn connect(&mut self) -> Result<()> {
		self.state = SessionState::Connecting;
		info!("connecting to {}", self.addr);

		let stream = TcpStream::connect(&self.addr)?;
		set_keepalive(&stream);

		self.generation += 1;
		let reader = stream.try_clone()?;
		let events = self.events.clone();
		let generation = self.generation;
		thread::spawn(move || reader_loop(reader, generation, events));

		self.stream = Some(stream);
		self.state = SessionState::Authenticating;

		let auth = RawPacket::build(
			0,
			&Request::Auth {
				user_id: self.config.user_id,
				authorize: self.config.authorize.clone(),
			},
		)?;
		self.write_now(&auth.pack()?)
	}

	/// React to the inbound AUTH response.  Returns whether the session is now connected;
	/// on rejection the connection is torn down and the caller schedules the retry.
	pub fn handle_auth(&mut self, ok: bool) -> Result<bool> {
		if !ok {
			warn!("cloud rejected credentials for user {}", self.config.user_id);
			self.disconnect();
			return Ok(false);
		}

		self.state = SessionState::Connected;
		self.last_connect_success = Some(Instant::now());
		self.seq = 1;

		if !self.queue.is_empty() {
			debug!("authenticated; flushing {} queued sends", self.queue.len());
		}
		while let Some(bytes) = self.queue.pop_front() {
			self.write_now(&bytes)?;
		}
		Ok(true)
	}

	/// Stamp a sequence number onto a request and send it, queueing while not connected.
	pub fn send_request(&mut self, request: &Request) -> Result<()> {
		let seq = self.next_seq();
		let packet = RawPacket::build(seq, request)?;
		self.send(&packet)
	}

	/// Send a packed frame, or queue it while the session is not connected.  Queued frames
	/// go out in submission order, ahead of anything submitted after connect.
	pub fn send(&mut self, packet: &RawPacket) -> Result<()> {
		let bytes = packet.pack()?;
		if self.state == SessionState::Connected {
			self.write_now(&bytes)
		} else {
			self.queue.push_back(bytes);
			Ok(())
		}
	}

	pub fn ping(&mut self) -> Result<()> {
		if self.state != SessionState::Connected {
			return Ok(());
		}
		let packet = RawPacket::build(0, &Request::Ping)?;
		self.write_now(&packet.pack()?)
	}

	/// Tear the connection down, keeping the queue.  Bumping the generation makes the old
	/// reader thread's remaining events dead letters.
	pub fn disconnect(&mut self) {
		if let Some(stream) = self.stream.take() {
			let _ = stream.shutdown(Shutdown::Both);
		}
		self.state = SessionState::Disconnected;
		self.generation += 1;
	}

	/// Final teardown: the queue is dropped along with the connection.
	pub fn shutdown(&mut self) {
		self.disconnect();
		self.queue.clear();
	}

	/// How long to wait before the next connect attempt.  The first attempt is free; after
	/// that, attempts keep a 10 s floor from the previous successful connection.
	pub fn reconnect_delay(&self, now: Instant) -> Duration {
		delay_after(self.last_connect_success, now)
	}

	fn write_now(&mut self, bytes: &[u8]) -> Result<()> {
		let stream = self
			.stream
			.as_mut()
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no stream"))?;
		stream.write_all(bytes)?;
		Ok(())
	}

	#[cfg(test)]
	pub(crate) fn queued(&self) -> &VecDeque<Vec<u8>> {
		&self.queue
	}
}

fn delay_after(last_success: Option<Instant>, now: Instant) -> Duration {
	match last_success {
		Some(t) => RECONNECT_FLOOR
			.checked_sub(now.duration_since(t))
			.unwrap_or(Duration::from_secs(0)),
		None => Duration::from_secs(0),
	}
}

/// Per-connection reader: whole frames, in wire order, onto the event channel.  Packet reads
/// are atomic -- a header is always followed by its full payload before anything is emitted.
fn reader_loop(mut stream: TcpStream, generation: u64, events: Sender<Event>) {
	loop {
		let mut head = [0u8; 5];
		if let Err(e) = stream.read_exact(&mut head) {
			debug!("stream ended: {}", e);
			break;
		}
		let header = match Header::unpack(&head) {
			Ok(header) => header,
			Err(_) => break,
		};

		let mut payload = vec![0u8; header.length as usize];
		if stream.read_exact(&mut payload).is_err() {
			break;
		}

		let packet = RawPacket { header, payload };
		if events
			.send(Event::Inbound { generation, packet })
			.is_err()
		{
			return;
		}
	}
	let _ = events.send(Event::StreamClosed { generation });
}

#[cfg(unix)]
fn set_keepalive(stream: &TcpStream) {
	use std::os::unix::io::AsRawFd;

	let fd = stream.as_raw_fd();
	let enable: libc::c_int = 1;
	let ret = unsafe {
		let ptr: *const libc::c_int = &enable;
		libc::setsockopt(
			fd,
			libc::SOL_SOCKET,
			libc::SO_KEEPALIVE,
			ptr as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if ret != 0 {
		warn!("could not enable TCP keep-alive");
	}
}

#[cfg(not(unix))]
fn set_keepalive(_stream: &TcpStream) {}
