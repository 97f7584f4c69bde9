//! Color-space plumbing between the host's hue/saturation/mired view and the wire formats.
//!
//! Cync bulbs report white temperature in a 0..100 wire space where 0 is warm, and color as
//! plain 8-bit RGB.  Home-automation hosts speak mired-like integers (140 cool .. 500 warm)
//! and hue/saturation pairs, so every user intent and every inbound status passes through
//! the conversions here.

/// Coolest white the host can ask for, in mireds.
pub const MIREDS_MIN: u16 = 140;
/// Warmest white the host can ask for, in mireds.
pub const MIREDS_MAX: u16 = 500;

/// Wire-space white temperature (0 warm .. 100 cool) to the host's mired-like integer.
pub fn wire_temp_to_mireds(temp: u8) -> u16 {
	let temp = temp.min(100);
	(f32::from(100 - temp) * 360.0 / 100.0).round() as u16 + MIREDS_MIN
}

/// The host's mired-like integer back to wire space.  Out-of-range input is clamped.
pub fn mireds_to_wire_temp(mireds: u16) -> u8 {
	let mireds = mireds.max(MIREDS_MIN).min(MIREDS_MAX);
	100 - (f32::from(mireds - MIREDS_MIN) * 100.0 / 360.0).round() as u8
}

/// Hue (0..360 degrees), saturation (0..100) and value (0..100) to 8-bit RGB.
///
/// The bulb's brightness doubles as V, so a dim red still encodes as dim bytes.
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
	let h = hue.rem_euclid(360.0) / 60.0;
	let s = (saturation / 100.0).max(0.0).min(1.0);
	let v = (value / 100.0).max(0.0).min(1.0);

	let c = v * s;
	let x = c * (1.0 - (h % 2.0 - 1.0).abs());
	let m = v - c;

	let (r, g, b) = match h as u32 {
		0 => (c, x, 0.0),
		1 => (x, c, 0.0),
		2 => (0.0, c, x),
		3 => (0.0, x, c),
		4 => (x, 0.0, c),
		_ => (c, 0.0, x),
	};

	[
		((r + m) * 255.0).round() as u8,
		((g + m) * 255.0).round() as u8,
		((b + m) * 255.0).round() as u8,
	]
}

/// 8-bit RGB back to (hue 0..360, saturation 0..100, value 0..100).
pub fn rgb_to_hsv(rgb: [u8; 3]) -> (f32, f32, f32) {
	let r = f32::from(rgb[0]) / 255.0;
	let g = f32::from(rgb[1]) / 255.0;
	let b = f32::from(rgb[2]) / 255.0;

	let max = r.max(g).max(b);
	let min = r.min(g).min(b);
	let delta = max - min;

	let hue = if delta == 0.0 {
		0.0
	} else if max == r {
		60.0 * ((g - b) / delta).rem_euclid(6.0)
	} else if max == g {
		60.0 * ((b - r) / delta + 2.0)
	} else {
		60.0 * ((r - g) / delta + 4.0)
	};

	let saturation = if max == 0.0 { 0.0 } else { delta / max * 100.0 };

	(hue, saturation, max * 100.0)
}

/// Describe (in english words) a white temperature given in mireds.
pub fn describe_mireds(mireds: u16) -> &'static str {
	match mireds {
		0..=179 => "Daylight",
		180..=249 => "Cool White",
		250..=329 => "Neutral",
		330..=429 => "Warm White",
		_ => "Candlelight",
	}
}
