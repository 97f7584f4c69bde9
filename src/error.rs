use std::io;
use thiserror::Error;

/// Various packet encoding/decoding and session errors
#[derive(Error, Debug)]
pub enum Error {
	/// This error means we were unable to handle an inbound packet because its type is unknown.
	///
	/// The Cync cloud is known to emit packet types beyond the documented set, so this error
	/// type does not necessarily represent a bug.
	#[error("unknown packet type: `{0}`")]
	UnknownPacketType(u8),
	/// This error means a packet or one of its fields contains an invalid or unsupported value,
	/// or that a frame is too short for the records it claims to carry.
	#[error("protocol error: `{0}`")]
	ProtocolError(String),

	/// Invalid configuration or inventory data, e.g. a home with id 0.
	#[error("config error: `{0}`")]
	Config(String),

	/// The worker loop is gone; returned by handle calls made after `shutdown()`.
	#[error("core is shut down")]
	Shutdown,

	#[error("i/o error")]
	Io(#[from] io::Error),
}
