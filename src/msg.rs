use std::convert::TryFrom;
use std::io::Cursor;

use crate::{
	error::Error,
	protocol::{Header, PacketType},
	read_write::{BigEndianReader, BigEndianWriter},
};

/// Subtype tags of the STATUS request/response envelope.
pub mod subtype {
	/// Request the full state of all mesh nodes under a switch (outbound)
	pub const GET_STATUS_PAGINATED: u8 = 0x52;
	/// Single-device status fragment (inbound)
	pub const GET_STATUS: u8 = 0xDB;
	/// On/off only (outbound)
	pub const SET_STATUS: u8 = 0xD0;
	/// Brightness only.  Legacy: the firmware still answers it, but every state change this
	/// library emits goes through [SET_STATE] instead, so no builder exists for it.
	pub const SET_BRIGHTNESS: u8 = 0xD2;
	/// White-temperature only (outbound)
	pub const SET_COLOR_TEMP: u8 = 0xE2;
	/// Combined on + brightness + temperature + RGB (outbound, preferred)
	pub const SET_STATE: u8 = 0xF0;
}

/// Inner body of a GET_STATUS_PAGINATED request, fixed by the firmware.
const QUERY_MESH_INNER: [u8; 6] = [0xFF, 0xFF, 0x00, 0x00, 0x56, 0x7E];

/// Marks the end of an envelope inner body.
const INNER_TERMINATOR: u8 = 0x7E;

/// State of a single mesh node as reported by the cloud.
///
/// Produced by SYNC broadcasts, STATUS_SYNC deltas and both STATUS subtypes; not every frame
/// shape carries every field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshState {
	pub mesh_id: u16,
	pub on: bool,
	/// 0..100.  Always zero when `on` is false.
	pub brightness: u8,
	/// Wire-space white temperature, 0 (warm) to 100 (cool).  `None` when the node is in RGB
	/// mode or the frame shape does not carry it.
	pub color_temp: Option<u8>,
	/// `None` when the frame shape does not carry color.
	pub rgb: Option<[u8; 3]>,
}

/// Full desired state of one bulb, as carried on the wire by a SET_STATE request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateCommand {
	pub switch_id: u32,
	pub mesh_id: u16,
	pub on: bool,
	pub brightness: u8,
	/// Wire-space white temperature, 0 (warm) to 100 (cool)
	pub color_temp: u8,
	pub rgb: [u8; 3],
}

/// Requests this library can put on the wire.
#[derive(Debug, Clone)]
pub enum Request {
	/// Login request.  Always the first packet written on a fresh connection.
	///
	/// `authorize` is a short opaque ASCII token obtained out-of-band from the REST
	/// two-factor exchange.
	Auth { user_id: u32, authorize: String },

	/// Combined on/brightness/temperature/RGB command for one mesh node.
	SetState(StateCommand),

	/// On/off only.  [Request::SetState] is preferred; this remains for parity with the
	/// firmware's older command set.
	SetPower {
		switch_id: u32,
		mesh_id: u16,
		on: bool,
	},

	/// White-temperature only.  [Request::SetState] is preferred.
	SetColorTemp {
		switch_id: u32,
		mesh_id: u16,
		/// Wire-space, 0 (warm) to 100 (cool)
		color_temp: u8,
	},

	/// Ask a switch for the full state of every mesh node it fronts.
	QueryMesh { switch_id: u32 },

	/// Reachability probe.  The server answers only while the switch is online.
	Probe { switch_id: u32 },

	/// Acknowledgement of a server-initiated STATUS packet, echoing its response id.
	StatusAck { switch_id: u32, response_id: u16 },

	/// Empty-payload keep-alive.
	Ping,
}

impl Request {
	pub fn packet_type(&self) -> PacketType {
		match *self {
			Request::Auth { .. } => PacketType::Auth,
			Request::SetState(..)
			| Request::SetPower { .. }
			| Request::SetColorTemp { .. }
			| Request::QueryMesh { .. }
			| Request::StatusAck { .. } => PacketType::Status,
			Request::Probe { .. } => PacketType::Connected,
			Request::Ping => PacketType::Ping,
		}
	}
}

/// The raw packet structure: outer frame header plus undecoded payload.
///
/// This is what is sent and received over the TCP stream.  To interpret an inbound payload,
/// use [Packet::from_raw].
#[derive(Debug, Clone, PartialEq)]
pub struct RawPacket {
	pub header: Header,
	pub payload: Vec<u8>,
}

impl RawPacket {
	/// Build a RawPacket (suitable for sending on the network) from a given request.
	///
	/// `seq` is the per-connection sequence number; it is written into the payload of every
	/// STATUS and CONNECTED request and ignored by the other shapes.
	pub fn build(seq: u16, request: &Request) -> Result<RawPacket, Error> {
		let packet_type = request.packet_type();
		let mut is_response = false;

		let payload = match *request {
			Request::Auth {
				user_id,
				ref authorize,
			} => auth_payload(user_id, authorize)?,
			Request::SetState(ref cmd) => envelope(
				cmd.switch_id,
				seq,
				subtype::SET_STATE,
				&set_state_inner(cmd),
			)?,
			Request::SetPower {
				switch_id,
				mesh_id,
				on,
			} => envelope(
				switch_id,
				seq,
				subtype::SET_STATUS,
				&set_power_inner(mesh_id, on),
			)?,
			Request::SetColorTemp {
				switch_id,
				mesh_id,
				color_temp,
			} => envelope(
				switch_id,
				seq,
				subtype::SET_COLOR_TEMP,
				&set_color_temp_inner(mesh_id, color_temp),
			)?,
			Request::QueryMesh { switch_id } => envelope(
				switch_id,
				seq,
				subtype::GET_STATUS_PAGINATED,
				&QUERY_MESH_INNER,
			)?,
			Request::Probe { switch_id } => {
				let mut v = Vec::with_capacity(7);
				v.write_val(switch_id)?;
				v.write_val(seq)?;
				v.write_val(0u8)?;
				v
			}
			Request::StatusAck {
				switch_id,
				response_id,
			} => {
				// acks carry the response bit so the server can tell them from new requests
				is_response = true;
				let mut v = Vec::with_capacity(7);
				v.write_val(switch_id)?;
				v.write_val(response_id)?;
				v.write_val(0u8)?;
				v
			}
			Request::Ping => Vec::new(),
		};

		Ok(RawPacket::from_parts(
			packet_type as u8,
			is_response,
			payload,
		))
	}

	pub(crate) fn from_parts(packet_type: u8, is_response: bool, payload: Vec<u8>) -> RawPacket {
		RawPacket {
			header: Header {
				packet_type,
				is_response,
				length: payload.len() as u32,
			},
			payload,
		}
	}

	/// The total size (in bytes) of the packed version of this packet.
	pub fn packed_size(&self) -> usize {
		Header::packed_size() + self.payload.len()
	}

	/// Validates that this object was constructed correctly.  Panics if not.
	pub fn validate(&self) {
		self.header.validate();
		assert_eq!(self.header.length as usize, self.payload.len());
	}

	/// Packs this RawPacket into bytes that can be sent over the network.
	pub fn pack(&self) -> Result<Vec<u8>, Error> {
		let mut v = Vec::with_capacity(self.packed_size());
		v.extend(self.header.pack()?);
		v.extend(&self.payload);
		Ok(v)
	}

	/// Given some bytes (generally read from a network socket), unpack the data into a
	/// `RawPacket` structure.
	pub fn unpack(v: &[u8]) -> Result<RawPacket, Error> {
		let header = Header::unpack(v)?;
		let start = Header::packed_size();
		let end = start + header.length as usize;
		if v.len() < end {
			return Err(Error::ProtocolError(format!(
				"length header says {} payload bytes, only {} available",
				header.length,
				v.len() - start
			)));
		}

		Ok(RawPacket {
			header,
			payload: Vec::from(&v[start..end]),
		})
	}
}

/// Decoded inbound Cync packets
///
/// This enum lists the packet shapes the cloud is known to send.  Frames whose type is not
/// listed here fail to decode with [Error::UnknownPacketType] and are dropped by the
/// dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
	/// Answer to the login request.  Anything but a leading `0x0000` is a rejection.
	AuthResponse { ok: bool },

	/// Mesh state broadcast.  Carries zero or more per-node records.
	Sync { states: Vec<MeshState> },

	/// STATUS envelope.  Unsolicited ones (`is_response == false` on the header) must be
	/// acked with [Request::StatusAck] echoing `response_id`.
	Status {
		switch_id: u32,
		response_id: u16,
		report: Option<StatusReport>,
	},

	/// Single-device state delta.  Short keep-alive variants of this frame carry no state.
	StatusSync { state: Option<MeshState> },

	/// Positive reachability report for one switch.
	Connected { switch_id: u32 },

	/// Keep-alive echo.
	Ping,
}

/// Subtype-specific content of a STATUS envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReport {
	/// Single-device fragment (subtype 0xDB)
	Device(MeshState),
	/// Full per-node listing for one switch (subtype 0x52)
	Paged(Vec<MeshState>),
}

impl Packet {
	/// Tries to parse the payload of a [RawPacket], based on its packet type.
	pub fn from_raw(raw: &RawPacket) -> Result<Packet, Error> {
		match PacketType::try_from(raw.header.packet_type)? {
			PacketType::Auth => parse_auth_response(&raw.payload),
			PacketType::Sync => parse_sync(&raw.payload),
			PacketType::Status => parse_status(&raw.payload),
			PacketType::StatusSync => parse_status_sync(&raw.payload),
			PacketType::Connected => parse_connected(&raw.payload),
			PacketType::Ping => Ok(Packet::Ping),
		}
	}
}

/// `0x03, userID, 0x00, len, auth, 0x0000, 0xB4` -- total `len + 10` bytes.
fn auth_payload(user_id: u32, authorize: &str) -> Result<Vec<u8>, Error> {
	if !authorize.is_ascii() || authorize.len() > 255 {
		return Err(Error::ProtocolError(format!(
			"authorize token must be ASCII and at most 255 bytes, got {} bytes",
			authorize.len()
		)));
	}

	let mut v = Vec::with_capacity(authorize.len() + 10);
	v.write_val(0x03u8)?;
	v.write_val(user_id)?;
	v.write_val(0x00u8)?;
	v.write_val(authorize.len() as u8)?;
	v.extend_from_slice(authorize.as_bytes());
	v.write_val(0u16)?;
	v.write_val(0xB4u8)?;
	Ok(v)
}

/// The request envelope shared by all STATUS subtypes:
/// `switchID, seq, 0x00, 0x7E, 0x00*4, 0xF8, subtype, inner_len, 0x00*3, inner`.
fn envelope(switch_id: u32, seq: u16, sub: u8, inner: &[u8]) -> Result<Vec<u8>, Error> {
	let mut v = Vec::with_capacity(18 + inner.len());
	v.write_val(switch_id)?;
	v.write_val(seq)?;
	v.write_val(0x00u8)?;
	v.write_val(0x7Eu8)?;
	v.extend_from_slice(&[0x00; 4]);
	v.write_val(0xF8u8)?;
	v.write_val(sub)?;
	v.write_val(inner.len() as u8)?;
	v.extend_from_slice(&[0x00; 3]);
	v.extend_from_slice(inner);
	Ok(v)
}

/// 16 bytes; the checksum constant 496 is the sum of the fixed header contributions required
/// by the device firmware.
fn set_state_inner(cmd: &StateCommand) -> Vec<u8> {
	let on = cmd.on as u8;
	let [r, g, b] = cmd.rgb;
	let sum = 496u32
		+ u32::from(cmd.mesh_id)
		+ u32::from(on)
		+ u32::from(cmd.brightness)
		+ u32::from(cmd.color_temp)
		+ u32::from(r)
		+ u32::from(g)
		+ u32::from(b);

	vec![
		0x00,
		0x00,
		(cmd.mesh_id >> 8) as u8,
		cmd.mesh_id as u8,
		0x00,
		subtype::SET_STATE,
		0x00,
		0x00,
		on,
		cmd.brightness,
		cmd.color_temp,
		r,
		g,
		b,
		(sum % 256) as u8,
		INNER_TERMINATOR,
	]
}

/// 13 bytes; same layout as SET_STATE through the `on` byte.
fn set_power_inner(mesh_id: u16, on: bool) -> Vec<u8> {
	let on = on as u8;
	let sum = 429u32 + u32::from(mesh_id) + u32::from(on);

	vec![
		0x00,
		0x00,
		(mesh_id >> 8) as u8,
		mesh_id as u8,
		0x00,
		subtype::SET_STATUS,
		0x00,
		0x00,
		on,
		0x00,
		0x00,
		(sum % 256) as u8,
		INNER_TERMINATOR,
	]
}

/// 12 bytes; the `0x05` marker tells the firmware the next byte is a white temperature.
fn set_color_temp_inner(mesh_id: u16, color_temp: u8) -> Vec<u8> {
	let sum = 469u32 + u32::from(mesh_id) + u32::from(color_temp);

	vec![
		0x00,
		0x00,
		(mesh_id >> 8) as u8,
		mesh_id as u8,
		0x00,
		subtype::SET_COLOR_TEMP,
		0x00,
		0x00,
		0x05,
		color_temp,
		(sum % 256) as u8,
		INNER_TERMINATOR,
	]
}

fn parse_auth_response(payload: &[u8]) -> Result<Packet, Error> {
	if payload.len() < 2 {
		return Err(Error::ProtocolError(format!(
			"auth response needs 2 bytes, got {}",
			payload.len()
		)));
	}
	Ok(Packet::AuthResponse {
		ok: payload[0] == 0 && payload[1] == 0,
	})
}

/// 19-byte records after a 7-byte header: `meshID@3, on@4, brightness@5, cyncTemp@6`.
fn parse_sync(payload: &[u8]) -> Result<Packet, Error> {
	if payload.len() < 7 {
		return Err(Error::ProtocolError(format!(
			"sync frame needs a 7-byte header, got {}",
			payload.len()
		)));
	}

	let mut states = Vec::new();
	let mut off = 7;
	while payload.len() - off >= 19 {
		let rec = &payload[off..off + 19];
		let on = rec[4] > 0;
		states.push(MeshState {
			mesh_id: u16::from(rec[3]),
			on,
			brightness: if on { rec[5] } else { 0 },
			color_temp: Some(rec[6]),
			rgb: None,
		});
		off += 19;
	}

	Ok(Packet::Sync { states })
}

fn parse_status(payload: &[u8]) -> Result<Packet, Error> {
	if payload.len() < 6 {
		return Err(Error::ProtocolError(format!(
			"status frame needs 6 header bytes, got {}",
			payload.len()
		)));
	}

	let mut c = Cursor::new(payload);
	let switch_id: u32 = c.read_val()?;
	let response_id: u16 = c.read_val()?;

	let report = if payload.len() >= 25 {
		match payload[13] {
			subtype::GET_STATUS => Some(StatusReport::Device(parse_device_fragment(payload)?)),
			subtype::GET_STATUS_PAGINATED => Some(StatusReport::Paged(parse_paged_records(payload))),
			_ => None,
		}
	} else {
		None
	};

	Ok(Packet::Status {
		switch_id,
		response_id,
		report,
	})
}

/// Subtype 0xDB: `meshID@21, state@27, brightness@28`.
fn parse_device_fragment(payload: &[u8]) -> Result<MeshState, Error> {
	if payload.len() < 29 {
		return Err(Error::ProtocolError(format!(
			"single-device status needs 29 bytes, got {}",
			payload.len()
		)));
	}

	let on = payload[27] > 0;
	Ok(MeshState {
		mesh_id: u16::from(payload[21]),
		on,
		brightness: if on { payload[28] } else { 0 },
		color_temp: None,
		rgb: None,
	})
}

/// Subtype 0x52: consecutive 24-byte records from offset 22.  A trailing partial record is
/// discarded and the rest of the frame kept.
fn parse_paged_records(payload: &[u8]) -> Vec<MeshState> {
	let mut states = Vec::new();
	let mut off = 22;
	while payload.len() >= off + 24 {
		let rec = &payload[off..off + 24];
		let on = rec[8] > 0;
		// 254 in the temperature slot means the node is in RGB mode
		let rgb_active = rec[16] == 254;
		states.push(MeshState {
			mesh_id: u16::from(rec[0]),
			on,
			brightness: if on { rec[12] } else { 0 },
			color_temp: if rgb_active { None } else { Some(rec[16]) },
			rgb: Some([rec[20], rec[21], rec[22]]),
		});
		off += 24;
	}
	states
}

/// `meshID@21, on@27, brightness@28` when the frame is long enough to carry state.
fn parse_status_sync(payload: &[u8]) -> Result<Packet, Error> {
	if payload.len() < 33 {
		return Ok(Packet::StatusSync { state: None });
	}

	let on = payload[27] > 0;
	Ok(Packet::StatusSync {
		state: Some(MeshState {
			mesh_id: u16::from(payload[21]),
			on,
			brightness: if on { payload[28] } else { 0 },
			color_temp: None,
			rgb: None,
		}),
	})
}

/// Any CONNECTED frame is a positive reachability report for the switch it names.
fn parse_connected(payload: &[u8]) -> Result<Packet, Error> {
	if payload.len() < 4 {
		return Err(Error::ProtocolError(format!(
			"connected frame needs 4 bytes, got {}",
			payload.len()
		)));
	}

	let mut c = Cursor::new(payload);
	let switch_id: u32 = c.read_val()?;
	Ok(Packet::Connected { switch_id })
}
