use crate::error::Error;

/// Which characteristics a device exposes, selected by its `deviceType`.
///
/// The type code comes from the REST inventory.  Every supported device switches on and off;
/// the other three capabilities are membership tests against the tables below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
	pub on_off: bool,
	pub brightness: bool,
	pub color_temp: bool,
	pub rgb: bool,
}

/// Look up what a Cync product supports.
///
/// Tables transcribed from the device populations the official plugin ships with.
pub fn capabilities(device_type: u8) -> Capabilities {
	Capabilities {
		on_off: true,
		brightness: supports_brightness(device_type),
		color_temp: supports_color_temp(device_type),
		rgb: supports_rgb(device_type),
	}
}

#[rustfmt::skip]
pub fn supports_brightness(device_type: u8) -> bool {
	matches!(device_type,
		1 | 5..=11 | 13..=15 | 17..=37 | 48 | 49 | 55 | 56 | 80..=83 | 85 | 128..=154 | 156 | 158..=165)
}

#[rustfmt::skip]
pub fn supports_color_temp(device_type: u8) -> bool {
	matches!(device_type,
		5..=8 | 10 | 11 | 14 | 15 | 19..=23 | 25 | 26 | 28..=35 | 80 | 82 | 83 | 85
		| 129..=133 | 135..=147 | 153 | 154 | 156 | 158..=165)
}

#[rustfmt::skip]
pub fn supports_rgb(device_type: u8) -> bool {
	matches!(device_type,
		6..=8 | 21..=23 | 30..=35 | 131..=133 | 137..=143 | 146 | 147 | 153 | 154 | 156 | 158..=165)
}

/// Derive a device's BLE-mesh address from its cloud id and home id.
///
/// Let `r = deviceID mod homeID`; the mesh id is `(r mod 1000) + round(r / 1000) * 256`,
/// with ordinary arithmetic rounding of the quotient.  The firmware and the cloud agree on
/// this mapping, so it must be reproduced bit-for-bit.
pub fn mesh_id(device_id: u32, home_id: u32) -> Result<u16, Error> {
	if home_id == 0 {
		return Err(Error::Config(format!(
			"home id 0 for device {}: mesh address is undefined",
			device_id
		)));
	}

	let r = device_id % home_id;
	let rounded = (f64::from(r) / 1000.0).round() as u32;
	Ok(((r % 1000) + rounded * 256) as u16)
}
