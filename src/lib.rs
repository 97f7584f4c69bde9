//! This crate provides the core client for the Cync (GE Lighting / Savant) cloud TCP control
//! protocol.
//!
//! It lets you control Cync bulbs through the vendor cloud at `cm.gelighting.com:23778` --
//! there is no LAN path; every command and every status update crosses that one TCP
//! connection, framed as `[type][length:u32be][payload]` with big-endian integers
//! throughout.
//!
//! # Identifiers
//!
//! The cloud addresses devices through three id spaces at once.  The REST inventory assigns
//! each device a global `deviceID` and each physical controller a `switchID`; requests on
//! the TCP connection are addressed to switches.  Inside a home's BLE mesh, devices answer
//! to a small `meshID` derived from the device and home ids (see [mesh_id]).  Status frames
//! name mesh ids, so the [tcp::DeviceRegistry] keeps all three mappings.
//!
//! # Sessions
//!
//! The TCP connection authenticates with credentials from the vendor's REST two-factor
//! exchange (user id plus a short `authorize` token).  This library performs no REST calls
//! itself; the host adapter supplies a [Config] and an inventory, and the [tcp::Manager]
//! does the rest: handshake, keep-alive pings, reachability probes and reconnects with a
//! 10-second floor between connections.
//!
//! # The REST boundary
//!
//! For reference, the collaborator endpoints a host adapter needs (all under
//! `https://api.gelighting.com`): `POST /v2/user/token/refresh` exchanges a refresh token
//! for an access token; `GET /v2/user/{userID}/subscribe/devices` lists homes;
//! `GET /v2/product/{product_id}/device/{home_id}/property` yields the bulb inventory; and
//! the `POST /v2/two_factor/email/verifycode` + `POST /v2/user_auth/two_factor` pair
//! (corp id `1007d2ad150c4000`) produces the `userID`/`authorize`/`refreshToken` credential
//! material in the first place.
//!
//! # Unknown packets
//!
//! It's common to see frames that don't match the documented protocol.  These are suspected
//! to be internal messages used by the official apps.  The dispatcher drops them; a frame
//! that fails to decode never takes the connection down.

mod color;
mod config;
mod device;
mod error;
mod msg;
mod protocol;
mod read_write;
pub mod tcp;

pub use color::{
	describe_mireds, hsv_to_rgb, mireds_to_wire_temp, rgb_to_hsv, wire_temp_to_mireds,
};
pub use config::Config;
pub use device::{
	capabilities, mesh_id, supports_brightness, supports_color_temp, supports_rgb, Capabilities,
};
pub use error::Error;
pub use msg::{subtype, MeshState, Packet, RawPacket, Request, StateCommand, StatusReport};
pub use protocol::{Header, PacketType};
pub use read_write::{BigEndianReader, BigEndianWriter};

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_frame_roundtrip() {
		for &t in &[
			PacketType::Auth,
			PacketType::Sync,
			PacketType::Status,
			PacketType::StatusSync,
			PacketType::Connected,
			PacketType::Ping,
		] {
			let payload = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x42];
			let raw = RawPacket::from_parts(t as u8, false, payload.clone());
			raw.validate();

			let packed = raw.pack().unwrap();
			assert_eq!(packed.len(), 5 + payload.len());

			let unpacked = RawPacket::unpack(&packed).unwrap();
			assert_eq!(unpacked.header.packet_type, t as u8);
			assert_eq!(unpacked.header.is_response, false);
			assert_eq!(unpacked.payload, payload);
		}
	}

	#[test]
	fn test_auth_request_bytes() {
		// known-good login frame for userID 0x12345678 / authorize "abcdef"
		let raw = RawPacket::build(
			0,
			&Request::Auth {
				user_id: 0x12345678,
				authorize: "abcdef".to_owned(),
			},
		)
		.unwrap();
		raw.validate();

		let bytes = raw.pack().unwrap();
		assert_eq!(
			bytes,
			vec![
				0x13, 0x00, 0x00, 0x00, 0x10, 0x03, 0x12, 0x34, 0x56, 0x78, 0x00, 0x06, 0x61,
				0x62, 0x63, 0x64, 0x65, 0x66, 0x00, 0x00, 0xB4,
			]
		);
	}

	#[test]
	fn test_auth_token_must_be_short_ascii() {
		assert!(RawPacket::build(
			0,
			&Request::Auth {
				user_id: 1,
				authorize: "héllo".to_owned(),
			},
		)
		.is_err());

		assert!(RawPacket::build(
			0,
			&Request::Auth {
				user_id: 1,
				authorize: "x".repeat(256),
			},
		)
		.is_err());
	}

	#[test]
	fn test_auth_response_decode() {
		let ok = RawPacket::unpack(&[0x13, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00]).unwrap();
		assert_eq!(
			Packet::from_raw(&ok).unwrap(),
			Packet::AuthResponse { ok: true }
		);

		let denied = RawPacket::unpack(&[0x13, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01]).unwrap();
		assert_eq!(
			Packet::from_raw(&denied).unwrap(),
			Packet::AuthResponse { ok: false }
		);
	}

	#[test]
	fn test_set_state_request() {
		// switch 1000, mesh 5, on, 50%, temp 20, no color, seq 1
		let raw = RawPacket::build(
			1,
			&Request::SetState(StateCommand {
				switch_id: 1000,
				mesh_id: 5,
				on: true,
				brightness: 50,
				color_temp: 20,
				rgb: [0, 0, 0],
			}),
		)
		.unwrap();

		let p = &raw.payload;
		assert_eq!(p.len(), 18 + 16);
		assert_eq!(&p[0..4], &1000u32.to_be_bytes());
		assert_eq!(&p[4..6], &1u16.to_be_bytes());
		assert_eq!(p[7], 0x7E);
		assert_eq!(p[12], 0xF8);
		assert_eq!(p[13], subtype::SET_STATE);
		assert_eq!(p[14], 0x10);

		// (496 + 5 + 1 + 50 + 20) mod 256 == 60
		assert_eq!(p[18 + 14], 0x3C);
		assert_eq!(p[18 + 15], 0x7E);
	}

	#[test]
	fn test_set_power_inner() {
		let raw = RawPacket::build(
			2,
			&Request::SetPower {
				switch_id: 1000,
				mesh_id: 5,
				on: true,
			},
		)
		.unwrap();

		let inner = &raw.payload[18..];
		assert_eq!(inner.len(), 13);
		assert_eq!(inner[5], subtype::SET_STATUS);
		assert_eq!(inner[8], 1);
		assert_eq!(inner[11], ((429 + 5 + 1) % 256) as u8);
		assert_eq!(inner[12], 0x7E);
	}

	#[test]
	fn test_set_color_temp_inner() {
		let raw = RawPacket::build(
			3,
			&Request::SetColorTemp {
				switch_id: 1000,
				mesh_id: 5,
				color_temp: 20,
			},
		)
		.unwrap();

		let inner = &raw.payload[18..];
		assert_eq!(inner.len(), 12);
		assert_eq!(inner[5], subtype::SET_COLOR_TEMP);
		assert_eq!(inner[8], 0x05);
		assert_eq!(inner[9], 20);
		assert_eq!(inner[10], ((469 + 5 + 20) % 256) as u8);
		assert_eq!(inner[11], 0x7E);
	}

	#[test]
	fn test_query_mesh_request() {
		let raw = RawPacket::build(1, &Request::QueryMesh { switch_id: 42 }).unwrap();
		assert_eq!(raw.header.packet_type, PacketType::Status as u8);
		assert_eq!(raw.payload[13], subtype::GET_STATUS_PAGINATED);
		assert_eq!(raw.payload[14], 6);
		assert_eq!(&raw.payload[18..24], &[0xFF, 0xFF, 0x00, 0x00, 0x56, 0x7E]);
	}

	#[test]
	fn test_probe_request() {
		let raw = RawPacket::build(7, &Request::Probe { switch_id: 42 }).unwrap();
		let bytes = raw.pack().unwrap();

		assert_eq!(bytes[0], 0xA3);
		assert_eq!(bytes.len(), 12);
		assert_eq!(&raw.payload[..], &[0, 0, 0, 42, 0, 7, 0]);
	}

	#[test]
	fn test_ping_frame() {
		let raw = RawPacket::build(0, &Request::Ping).unwrap();
		assert_eq!(raw.pack().unwrap(), vec![0xD3, 0x00, 0x00, 0x00, 0x00]);
	}

	#[test]
	fn test_status_ack_echoes_the_response_id() {
		let raw = RawPacket::build(
			0,
			&Request::StatusAck {
				switch_id: 42,
				response_id: 0x0304,
			},
		)
		.unwrap();
		let bytes = raw.pack().unwrap();

		// type 7 with the response bit
		assert_eq!(bytes[0], 0x7B);
		assert_eq!(&raw.payload[..], &[0, 0, 0, 42, 0x03, 0x04, 0]);
	}

	#[test]
	fn test_paginated_status_decode() {
		// length-70 payload with two 24-byte records at offset 22
		let mut payload = vec![0u8; 70];
		payload[0..4].copy_from_slice(&1000u32.to_be_bytes());
		payload[4..6].copy_from_slice(&3u16.to_be_bytes());
		payload[13] = subtype::GET_STATUS_PAGINATED;

		payload[22] = 5; // mesh 5: on, 80%, temp 30, rgb 10/20/30
		payload[30] = 1;
		payload[34] = 80;
		payload[38] = 30;
		payload[42] = 10;
		payload[43] = 20;
		payload[44] = 30;
		payload[46] = 6; // mesh 6: off

		let raw = RawPacket::from_parts(PacketType::Status as u8, true, payload);
		match Packet::from_raw(&raw).unwrap() {
			Packet::Status {
				switch_id,
				response_id,
				report: Some(StatusReport::Paged(states)),
			} => {
				assert_eq!(switch_id, 1000);
				assert_eq!(response_id, 3);
				assert_eq!(states.len(), 2);
				assert_eq!(
					states[0],
					MeshState {
						mesh_id: 5,
						on: true,
						brightness: 80,
						color_temp: Some(30),
						rgb: Some([10, 20, 30]),
					}
				);
				assert_eq!(states[1].mesh_id, 6);
				assert_eq!(states[1].on, false);
				assert_eq!(states[1].brightness, 0);
			}
			other => panic!("unexpected decode: {:?}", other),
		}
	}

	#[test]
	fn test_paginated_rgb_mode_marker() {
		// 254 in the temperature slot means the node is showing color, not white
		let mut payload = vec![0u8; 46];
		payload[13] = subtype::GET_STATUS_PAGINATED;
		payload[22] = 5;
		payload[30] = 1;
		payload[34] = 100;
		payload[38] = 254;
		payload[42] = 255;

		let raw = RawPacket::from_parts(PacketType::Status as u8, true, payload);
		match Packet::from_raw(&raw).unwrap() {
			Packet::Status {
				report: Some(StatusReport::Paged(states)),
				..
			} => {
				assert_eq!(states[0].color_temp, None);
				assert_eq!(states[0].rgb, Some([255, 0, 0]));
			}
			other => panic!("unexpected decode: {:?}", other),
		}
	}

	#[test]
	fn test_single_device_status_decode() {
		let mut payload = vec![0u8; 29];
		payload[0..4].copy_from_slice(&1000u32.to_be_bytes());
		payload[13] = subtype::GET_STATUS;
		payload[21] = 5;
		payload[27] = 1;
		payload[28] = 80;

		let raw = RawPacket::from_parts(PacketType::Status as u8, true, payload.clone());
		match Packet::from_raw(&raw).unwrap() {
			Packet::Status {
				report: Some(StatusReport::Device(state)),
				..
			} => {
				assert_eq!(state.mesh_id, 5);
				assert_eq!(state.on, true);
				assert_eq!(state.brightness, 80);
			}
			other => panic!("unexpected decode: {:?}", other),
		}

		// off means brightness zero no matter what the wire says
		payload[27] = 0;
		let raw = RawPacket::from_parts(PacketType::Status as u8, true, payload);
		match Packet::from_raw(&raw).unwrap() {
			Packet::Status {
				report: Some(StatusReport::Device(state)),
				..
			} => {
				assert_eq!(state.on, false);
				assert_eq!(state.brightness, 0);
			}
			other => panic!("unexpected decode: {:?}", other),
		}
	}

	#[test]
	fn test_short_status_has_no_report() {
		let mut payload = vec![0u8; 7];
		payload[0..4].copy_from_slice(&1000u32.to_be_bytes());
		payload[4..6].copy_from_slice(&9u16.to_be_bytes());

		let raw = RawPacket::from_parts(PacketType::Status as u8, false, payload);
		match Packet::from_raw(&raw).unwrap() {
			Packet::Status {
				switch_id,
				response_id,
				report,
			} => {
				assert_eq!(switch_id, 1000);
				assert_eq!(response_id, 9);
				assert!(report.is_none());
			}
			other => panic!("unexpected decode: {:?}", other),
		}
	}

	#[test]
	fn test_sync_decode() {
		let mut payload = vec![0u8; 7 + 19 * 2];
		payload[7 + 3] = 5;
		payload[7 + 4] = 1;
		payload[7 + 5] = 65;
		payload[7 + 6] = 40;
		payload[7 + 19 + 3] = 6;

		let raw = RawPacket::from_parts(PacketType::Sync as u8, false, payload);
		match Packet::from_raw(&raw).unwrap() {
			Packet::Sync { states } => {
				assert_eq!(states.len(), 2);
				assert_eq!(
					states[0],
					MeshState {
						mesh_id: 5,
						on: true,
						brightness: 65,
						color_temp: Some(40),
						rgb: None,
					}
				);
				assert_eq!(states[1].on, false);
			}
			other => panic!("unexpected decode: {:?}", other),
		}
	}

	#[test]
	fn test_status_sync_decode() {
		let mut payload = vec![0u8; 33];
		payload[21] = 5;
		payload[27] = 1;
		payload[28] = 60;

		let raw = RawPacket::from_parts(PacketType::StatusSync as u8, false, payload);
		match Packet::from_raw(&raw).unwrap() {
			Packet::StatusSync { state: Some(state) } => {
				assert_eq!(state.mesh_id, 5);
				assert_eq!(state.brightness, 60);
			}
			other => panic!("unexpected decode: {:?}", other),
		}

		// short delta frames are keep-alive noise, not state
		let raw = RawPacket::from_parts(PacketType::StatusSync as u8, false, vec![0u8; 20]);
		assert_eq!(
			Packet::from_raw(&raw).unwrap(),
			Packet::StatusSync { state: None }
		);
	}

	#[test]
	fn test_connected_decode() {
		let mut payload = vec![0u8; 7];
		payload[0..4].copy_from_slice(&42u32.to_be_bytes());

		let raw = RawPacket::from_parts(PacketType::Connected as u8, true, payload);
		assert_eq!(
			Packet::from_raw(&raw).unwrap(),
			Packet::Connected { switch_id: 42 }
		);
	}

	#[test]
	fn test_truncated_frame_rejected() {
		// length header says 16 bytes, only one present
		let err = RawPacket::unpack(&[0x73, 0x00, 0x00, 0x00, 0x10, 0x01]);
		assert!(err.is_err());
	}

	#[test]
	fn test_unknown_type_rejected() {
		let raw = RawPacket::from_parts(3, false, vec![0u8; 4]);
		assert!(matches!(
			Packet::from_raw(&raw),
			Err(Error::UnknownPacketType(3))
		));
	}
}
