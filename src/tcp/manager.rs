use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::{
	config::Config,
	device::Capabilities,
	error::Error,
	msg::{MeshState, Packet, RawPacket, Request, StatusReport},
	tcp::{
		bulb::StateUpdate,
		registry::{DeviceRegistry, HomeInventory},
		session::{Session, DEFAULT_HOST, DEFAULT_PORT, PING_INTERVAL},
	},
};

/// How often every bulb is re-probed for reachability.  A bulb stays disconnected from the
/// start of a sweep until its switch answers the probe.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(300);

/// The boundary to the home-automation host.
///
/// Implementations surface bulbs as accessories.  Errors returned here are logged and never
/// interrupt the worker loop.
pub trait HostBridge: Send + Sync {
	/// Called once per bulb, on first import.
	fn expose_capabilities(&self, device_id: u32, caps: Capabilities) -> Result<()>;

	/// Called after each status apply, carrying only the characteristics the bulb supports.
	fn notify_state(&self, device_id: u32, update: StateUpdate) -> Result<()>;
}

/// User commands forwarded by the host adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
	On(bool),
	/// 0..100
	Brightness(u8),
	/// Mired-like integer, 140..500
	ColorTemp(u16),
	/// Degrees, 0..360
	Hue(f32),
	/// Percent, 0..100
	Saturation(f32),
}

/// Everything the worker loop reacts to.  Inbound frames and stream closures carry the
/// connection generation that produced them so leftovers from a replaced connection are
/// ignored.
pub(crate) enum Event {
	Inbound { generation: u64, packet: RawPacket },
	StreamClosed { generation: u64 },
	Connect,
	PingTick,
	ProbeTick,
	Import {
		homes: Vec<HomeInventory>,
		reply: Sender<Result<HashSet<u32>, Error>>,
	},
	Remove { device_id: u32 },
	Intent { device_id: u32, intent: Intent },
	Shutdown,
}

/// The core's worker: one thread owning the session and the registry, fed by an event
/// channel.  Inbound packets, user intents and timer ticks all mutate state here and nowhere
/// else, so none of it needs locking.
pub struct Manager {
	session: Session,
	registry: DeviceRegistry,
	host: Arc<dyn HostBridge>,
	events: Receiver<Event>,
	tx: Sender<Event>,
}

/// What the host adapter holds: entry points that marshal onto the worker loop.
#[derive(Clone)]
pub struct BridgeHandle {
	tx: Sender<Event>,
}

impl Manager {
	pub fn new(config: Config, host: Arc<dyn HostBridge>) -> Manager {
		Self::with_addr(format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT), config, host)
	}

	pub fn with_addr(addr: String, config: Config, host: Arc<dyn HostBridge>) -> Manager {
		let (tx, events) = mpsc::channel();
		Manager {
			session: Session::new(addr, config, tx.clone()),
			registry: DeviceRegistry::new(),
			host,
			events,
			tx,
		}
	}

	pub fn handle(&self) -> BridgeHandle {
		BridgeHandle {
			tx: self.tx.clone(),
		}
	}

	/// Start the worker thread plus the ping and probe timers, kick off the first connect,
	/// and hand back the handle the host adapter talks to.
	pub fn spawn(self) -> BridgeHandle {
		let handle = self.handle();

		let _ = self.tx.send(Event::Connect);
		spawn_timer(self.tx.clone(), PING_INTERVAL, || Event::PingTick);
		spawn_timer(self.tx.clone(), PROBE_INTERVAL, || Event::ProbeTick);

		thread::spawn(move || self.run());
		handle
	}

	/// Run the loop on the calling thread until shutdown.
	pub fn run(mut self) {
		while let Ok(event) = self.events.recv() {
			if !self.handle_event(event) {
				break;
			}
		}
		info!("bridge core shutting down");
		self.session.shutdown();
	}

	fn handle_event(&mut self, event: Event) -> bool {
		match event {
			Event::Inbound { generation, packet } => {
				if generation == self.session.generation() {
					self.dispatch(packet);
				}
			}
			Event::StreamClosed { generation } => {
				if generation == self.session.generation() {
					warn!("connection to the cloud lost");
					self.session.disconnect();
					self.schedule_reconnect();
				}
			}
			Event::Connect => self.connect(),
			Event::PingTick => {
				if let Err(e) = self.session.ping() {
					warn!("keep-alive write failed: {}", e);
					self.session.disconnect();
					self.schedule_reconnect();
				}
			}
			Event::ProbeTick => self.probe_sweep(),
			Event::Import { homes, reply } => {
				let _ = reply.send(self.import(&homes));
			}
			Event::Remove { device_id } => self.registry.remove_device(device_id),
			Event::Intent { device_id, intent } => self.apply_intent(device_id, intent),
			Event::Shutdown => return false,
		}
		true
	}

	fn connect(&mut self) {
		if let Err(e) = self.session.connect() {
			warn!("connect failed: {}", e);
			self.session.disconnect();
			self.schedule_reconnect();
		}
	}

	fn schedule_reconnect(&self) {
		let delay = self.session.reconnect_delay(Instant::now());
		debug!("next connect attempt in {:?}", delay);
		let tx = self.tx.clone();
		thread::spawn(move || {
			thread::sleep(delay);
			let _ = tx.send(Event::Connect);
		});
	}

	fn dispatch(&mut self, raw: RawPacket) {
		let is_response = raw.header.is_response;
		let packet = match Packet::from_raw(&raw) {
			Ok(packet) => packet,
			Err(Error::UnknownPacketType(t)) => {
				debug!("dropping packet of unknown type {}", t);
				return;
			}
			Err(e) => {
				debug!("dropping malformed frame: {}", e);
				return;
			}
		};

		match packet {
			Packet::AuthResponse { ok } => self.on_auth(ok),
			Packet::Sync { states } => {
				for state in &states {
					self.apply_state(None, state);
				}
			}
			Packet::Status {
				switch_id,
				response_id,
				report,
			} => {
				if !is_response {
					// the ack goes out before anything a subtype handler emits
					self.send(&Request::StatusAck {
						switch_id,
						response_id,
					});
				}
				match report {
					Some(StatusReport::Device(state)) => self.apply_state(Some(switch_id), &state),
					Some(StatusReport::Paged(states)) => {
						for state in &states {
							self.apply_state(Some(switch_id), state);
						}
					}
					None => {}
				}
			}
			Packet::StatusSync { state } => {
				if let Some(state) = state {
					self.apply_state(None, &state);
				}
			}
			Packet::Connected { switch_id } => self.on_reachable(switch_id),
			Packet::Ping => {}
		}
	}

	fn on_auth(&mut self, ok: bool) {
		match self.session.handle_auth(ok) {
			Ok(true) => info!("authenticated with the cloud"),
			Ok(false) => self.schedule_reconnect(),
			Err(e) => {
				warn!("queue flush after auth failed: {}", e);
				self.session.disconnect();
				self.schedule_reconnect();
			}
		}
	}

	fn apply_state(&mut self, switch_id: Option<u32>, state: &MeshState) {
		let (device_id, update) = match self.registry.resolve_mut(switch_id, state.mesh_id) {
			Some(bulb) => (bulb.device_id, bulb.apply(state)),
			None => {
				debug!("status for unknown mesh node {}", state.mesh_id);
				return;
			}
		};
		if let Err(e) = self.host.notify_state(device_id, update) {
			error!("host rejected state update for device {}: {}", device_id, e);
		}
	}

	fn on_reachable(&mut self, switch_id: u32) {
		match self.registry.by_switch_mut(switch_id) {
			Some(bulb) => bulb.connected = true,
			None => {
				debug!("reachability report for unknown switch {}", switch_id);
				return;
			}
		}
		debug!("switch {} reachable; resyncing", switch_id);
		self.send(&Request::QueryMesh { switch_id });
	}

	/// Mark every bulb unreachable and ask its switch to prove otherwise.
	fn probe_sweep(&mut self) {
		let switches: Vec<u32> = self
			.registry
			.bulbs_mut()
			.map(|bulb| {
				bulb.connected = false;
				bulb.switch_id
			})
			.collect();
		for switch_id in switches {
			self.send(&Request::Probe { switch_id });
		}
	}

	fn import(&mut self, homes: &[HomeInventory]) -> Result<HashSet<u32>, Error> {
		let outcome = self.registry.import_inventory(homes)?;

		let created: Vec<(u32, u32, Capabilities)> = outcome
			.created
			.iter()
			.filter_map(|switch_id| {
				self.registry
					.by_switch(*switch_id)
					.map(|b| (*switch_id, b.device_id, b.capabilities()))
			})
			.collect();

		for (switch_id, device_id, caps) in created {
			if let Err(e) = self.host.expose_capabilities(device_id, caps) {
				error!("host rejected accessory for device {}: {}", device_id, e);
			}
			// probe new bulbs right away instead of waiting out the sweep timer
			self.send(&Request::Probe { switch_id });
		}

		info!("inventory pass: {} bulbs known", self.registry.len());
		Ok(outcome.known_devices)
	}

	fn apply_intent(&mut self, device_id: u32, intent: Intent) {
		let command = match self.registry.by_device_mut(device_id) {
			Some(bulb) => match intent {
				Intent::On(v) => bulb.set_on(v),
				Intent::Brightness(v) => bulb.set_brightness(v),
				Intent::ColorTemp(v) => bulb.set_color_temp(v),
				Intent::Hue(v) => bulb.set_hue(v),
				Intent::Saturation(v) => bulb.set_saturation(v),
			},
			None => {
				warn!("intent for unknown device {}", device_id);
				return;
			}
		};

		match command {
			Some(command) => self.send(&Request::SetState(command)),
			None => warn!("device {} does not support {:?}", device_id, intent),
		}
	}

	/// Sends never fail outward: a broken connection turns into a reconnect and the frame is
	/// preserved on the queue by the next submission path.
	fn send(&mut self, request: &Request) {
		if let Err(e) = self.session.send_request(request) {
			warn!("send failed: {}", e);
			self.session.disconnect();
			self.schedule_reconnect();
		}
	}
}

impl BridgeHandle {
	/// Upsert the registry from a REST inventory pass.  Returns every device id now known so
	/// the host can remove stale accessories.  Called by the host adapter after its REST
	/// inventory succeeds.
	pub fn import_inventory(&self, homes: Vec<HomeInventory>) -> Result<HashSet<u32>, Error> {
		let (reply, rx) = mpsc::channel();
		self.tx
			.send(Event::Import { homes, reply })
			.map_err(|_| Error::Shutdown)?;
		rx.recv().map_err(|_| Error::Shutdown)?
	}

	/// Forward a user command into the core.  Fire-and-forget: failures surface as log
	/// lines and cloud echoes, never as errors to the host.
	pub fn user_intent(&self, device_id: u32, intent: Intent) {
		let _ = self.tx.send(Event::Intent { device_id, intent });
	}

	/// The host removed an accessory; forget the bulb.
	pub fn remove_accessory(&self, device_id: u32) {
		let _ = self.tx.send(Event::Remove { device_id });
	}

	/// Stop the worker loop, close the socket and drop the send queue.  No host callbacks
	/// happen after this.
	pub fn shutdown(&self) {
		let _ = self.tx.send(Event::Shutdown);
	}
}

fn spawn_timer(tx: Sender<Event>, period: Duration, event: fn() -> Event) {
	thread::spawn(move || loop {
		thread::sleep(period);
		if tx.send(event()).is_err() {
			break;
		}
	});
}
