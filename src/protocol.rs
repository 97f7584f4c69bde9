use byteorder::{BigEndian, WriteBytesExt};
use std::convert::TryFrom;
use std::io::Cursor;

use crate::{error::Error, read_write::BigEndianReader};

/// The low nibble of every type byte carries the protocol version the server requires.
pub const PROTOCOL_VERSION: u8 = 0x03;

/// Bit of the type byte that marks a packet as a response to an earlier request.
const RESPONSE_BIT: u8 = 0x08;

/// The known packet types of the Cync cloud TCP protocol.
///
/// Other types exist on the wire but are undocumented; the dispatcher drops them.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PacketType {
	/// Login request / login status response
	Auth = 1,
	/// Mesh state broadcast pushed by the server (multi-record)
	Sync = 4,
	/// Subtype-tagged request/response envelope
	Status = 7,
	/// Single-device state delta pushed by the server
	StatusSync = 8,
	/// Reachability probe and its answer
	Connected = 10,
	/// Empty-payload keep-alive
	Ping = 13,
}

impl TryFrom<u8> for PacketType {
	type Error = Error;
	fn try_from(val: u8) -> Result<PacketType, Error> {
		match val {
			1 => Ok(PacketType::Auth),
			4 => Ok(PacketType::Sync),
			7 => Ok(PacketType::Status),
			8 => Ok(PacketType::StatusSync),
			10 => Ok(PacketType::Connected),
			13 => Ok(PacketType::Ping),
			x => Err(Error::UnknownPacketType(x)),
		}
	}
}

/// The outer frame header carried by every TCP packet:
///
/// * Packet type in the high nibble of the first byte
/// * Protocol version constant in the low nibble; bit `0x08` flags a response
/// * Payload length as a big-endian u32
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
	/// High nibble of the type byte.  May name a type outside [PacketType]; such frames are
	/// preserved at this layer and dropped by the dispatcher.
	pub packet_type: u8,

	/// Whether the sender flagged this packet as a response
	pub is_response: bool,

	/// Number of payload bytes that follow the header
	pub length: u32,
}

impl Header {
	/// packed size, in bytes
	pub(crate) fn packed_size() -> usize {
		5
	}

	pub(crate) fn validate(&self) {
		assert!(self.packet_type < 16);
	}

	pub(crate) fn pack(&self) -> Result<Vec<u8>, Error> {
		let mut v = Vec::with_capacity(Self::packed_size());

		let mut b = (self.packet_type << 4) | PROTOCOL_VERSION;
		if self.is_response {
			b |= RESPONSE_BIT;
		}
		v.write_u8(b)?;
		v.write_u32::<BigEndian>(self.length)?;

		Ok(v)
	}

	pub(crate) fn unpack(v: &[u8]) -> Result<Header, Error> {
		if v.len() < Self::packed_size() {
			return Err(Error::ProtocolError(format!(
				"frame header needs 5 bytes, got {}",
				v.len()
			)));
		}

		let mut c = Cursor::new(v);

		let b: u8 = c.read_val()?;
		let packet_type = b >> 4;
		let is_response = (b & RESPONSE_BIT) > 0;

		let length = c.read_val()?;

		Ok(Header {
			packet_type,
			is_response,
			length,
		})
	}
}
