use crate::{
	color,
	device::{self, Capabilities},
	msg::{MeshState, StateCommand},
};

/// A single light known to the bridge.
///
/// Holds the last state the cloud reported plus the identifier triplet used to address the
/// device: `device_id` (cloud-global, also the host's accessory key), `switch_id` (the
/// controller node TCP requests are addressed to) and `mesh_id` (the address inside the
/// home's BLE mesh).
pub struct Bulb {
	pub device_id: u32,
	pub switch_id: u32,
	pub mesh_id: u16,
	pub device_type: u8,
	pub home_id: u32,
	pub name: String,
	/// Confirmed reachable by a CONNECTED probe answer; reset on every probe sweep
	pub connected: bool,
	pub on: bool,
	/// 0..100
	pub brightness: u8,
	/// Wire-space white temperature, 0 (warm) to 100 (cool)
	pub color_temp: u8,
	pub rgb: [u8; 3],
	hue: f32,
	saturation: f32,
	caps: Capabilities,
}

/// Characteristic values pushed to the host after an apply.
///
/// Only the characteristics the bulb actually exposes are populated.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StateUpdate {
	pub on: Option<bool>,
	/// 0..100
	pub brightness: Option<u8>,
	/// Mired-like integer, 140..500
	pub color_temp: Option<u16>,
	/// Degrees, 0..360
	pub hue: Option<f32>,
	/// Percent, 0..100
	pub saturation: Option<f32>,
}

impl Bulb {
	pub fn new(
		device_id: u32,
		switch_id: u32,
		mesh_id: u16,
		device_type: u8,
		home_id: u32,
		name: String,
	) -> Bulb {
		Bulb {
			device_id,
			switch_id,
			mesh_id,
			device_type,
			home_id,
			name,
			connected: false,
			on: false,
			brightness: 0,
			color_temp: 0,
			rgb: [0; 3],
			hue: 0.0,
			saturation: 0.0,
			caps: device::capabilities(device_type),
		}
	}

	pub fn capabilities(&self) -> Capabilities {
		self.caps
	}

	/// Refresh inventory-sourced attributes on a re-import pass.  Cloud-reported state and
	/// reachability are left alone.
	pub fn update_record(&mut self, device_id: u32, mesh_id: u16, device_type: u8, name: String) {
		self.device_id = device_id;
		self.mesh_id = mesh_id;
		self.name = name;
		if device_type != self.device_type {
			self.device_type = device_type;
			self.caps = device::capabilities(device_type);
		}
	}

	/// Overwrite local state with a cloud report and say what the host should hear about.
	///
	/// The cloud is authoritative: echoes of our own commands come back through here and are
	/// applied like any other report.  Applying the same state twice is a no-op.
	pub fn apply(&mut self, state: &MeshState) -> StateUpdate {
		self.on = state.on;
		self.brightness = state.brightness;
		if let Some(temp) = state.color_temp {
			self.color_temp = temp;
		}
		if let Some(rgb) = state.rgb {
			self.rgb = rgb;
			let (hue, saturation, _) = color::rgb_to_hsv(rgb);
			self.hue = hue;
			self.saturation = saturation;
		}
		self.host_view()
	}

	pub fn set_on(&mut self, on: bool) -> Option<StateCommand> {
		self.on = on;
		Some(self.command())
	}

	pub fn set_brightness(&mut self, brightness: u8) -> Option<StateCommand> {
		if !self.caps.brightness {
			return None;
		}
		self.brightness = brightness.min(100);
		Some(self.command())
	}

	/// `mireds` is the host's view-space temperature (140 cool .. 500 warm).
	pub fn set_color_temp(&mut self, mireds: u16) -> Option<StateCommand> {
		if !self.caps.color_temp {
			return None;
		}
		self.color_temp = color::mireds_to_wire_temp(mireds);
		Some(self.command())
	}

	pub fn set_hue(&mut self, hue: f32) -> Option<StateCommand> {
		if !self.caps.rgb {
			return None;
		}
		self.hue = hue;
		self.recolor();
		Some(self.command())
	}

	pub fn set_saturation(&mut self, saturation: f32) -> Option<StateCommand> {
		if !self.caps.rgb {
			return None;
		}
		self.saturation = saturation;
		self.recolor();
		Some(self.command())
	}

	/// Every accepted setter ships the full current state in one SET_STATE.
	pub fn command(&self) -> StateCommand {
		StateCommand {
			switch_id: self.switch_id,
			mesh_id: self.mesh_id,
			on: self.on,
			brightness: self.brightness,
			color_temp: self.color_temp,
			rgb: self.rgb,
		}
	}

	fn recolor(&mut self) {
		self.rgb = color::hsv_to_rgb(self.hue, self.saturation, f32::from(self.brightness));
	}

	fn host_view(&self) -> StateUpdate {
		StateUpdate {
			on: Some(self.on),
			brightness: if self.caps.brightness {
				Some(self.brightness)
			} else {
				None
			},
			color_temp: if self.caps.color_temp {
				Some(color::wire_temp_to_mireds(self.color_temp))
			} else {
				None
			},
			hue: if self.caps.rgb { Some(self.hue) } else { None },
			saturation: if self.caps.rgb {
				Some(self.saturation)
			} else {
				None
			},
		}
	}
}

impl std::fmt::Debug for Bulb {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"{:<15}  dev {:>10}  switch {:>10}  mesh {:>4}  ",
			self.name, self.device_id, self.switch_id, self.mesh_id
		)?;
		if !self.connected {
			return write!(f, "unreachable");
		}
		if self.on {
			write!(f, "on {:>3}%", self.brightness)?;
			if self.caps.rgb && self.saturation > 0.0 {
				write!(f, "  hue {:.0} sat {:.0}%", self.hue, self.saturation)?;
			} else if self.caps.color_temp {
				let mireds = color::wire_temp_to_mireds(self.color_temp);
				write!(f, "  {}", color::describe_mireds(mireds))?;
			}
			Ok(())
		} else {
			write!(f, "off")
		}
	}
}
