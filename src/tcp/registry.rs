use std::collections::{HashMap, HashSet};

use crate::{device, error::Error, tcp::Bulb};

/// One home's slice of the REST device inventory, as handed over by the host adapter.
#[derive(Debug, Clone)]
pub struct HomeInventory {
	pub home_id: u32,
	pub bulbs: Vec<BulbRecord>,
}

/// One bulb row from the REST inventory.
#[derive(Debug, Clone)]
pub struct BulbRecord {
	pub device_id: u32,
	pub switch_id: u32,
	pub device_type: u8,
	pub name: String,
}

/// What an inventory pass changed.
#[derive(Debug)]
pub struct ImportOutcome {
	/// Every device id now known, so the host can remove stale accessories
	pub known_devices: HashSet<u32>,
	/// Switch ids seen for the first time; the host gets a capability announcement for each
	pub created: Vec<u32>,
}

/// The authoritative mapping from the three identifier spaces to bulbs.
///
/// Bulbs are keyed by `switch_id` -- the inventory yields exactly one bulb per switch -- with
/// secondary maps for the other two spaces.  Mesh ids can collide across homes; lookups that
/// carry the packet's `switch_id` resolve those, and bare mesh lookups pick the first match.
pub struct DeviceRegistry {
	bulbs: HashMap<u32, Bulb>,
	by_device: HashMap<u32, u32>,
	by_mesh: HashMap<u16, u32>,
}

impl DeviceRegistry {
	pub fn new() -> DeviceRegistry {
		DeviceRegistry {
			bulbs: HashMap::new(),
			by_device: HashMap::new(),
			by_mesh: HashMap::new(),
		}
	}

	/// Upsert bulbs from an inventory pass.
	///
	/// A switch id seen before keeps its Bulb (and its cloud-reported state); its
	/// inventory-sourced attributes are refreshed.  A home id of zero makes the mesh
	/// address undefined and fails the whole pass.
	pub fn import_inventory(&mut self, homes: &[HomeInventory]) -> Result<ImportOutcome, Error> {
		let mut outcome = ImportOutcome {
			known_devices: HashSet::new(),
			created: Vec::new(),
		};

		for home in homes {
			for record in &home.bulbs {
				let mesh_id = device::mesh_id(record.device_id, home.home_id)?;

				match self.bulbs.get_mut(&record.switch_id) {
					Some(bulb) => bulb.update_record(
						record.device_id,
						mesh_id,
						record.device_type,
						record.name.clone(),
					),
					None => {
						self.bulbs.insert(
							record.switch_id,
							Bulb::new(
								record.device_id,
								record.switch_id,
								mesh_id,
								record.device_type,
								home.home_id,
								record.name.clone(),
							),
						);
						outcome.created.push(record.switch_id);
					}
				}

				self.by_device.insert(record.device_id, record.switch_id);
				self.by_mesh.entry(mesh_id).or_insert(record.switch_id);
				outcome.known_devices.insert(record.device_id);
			}
		}

		Ok(outcome)
	}

	/// Forget a bulb once the host reports its accessory removed.
	pub fn remove_device(&mut self, device_id: u32) {
		if let Some(switch_id) = self.by_device.remove(&device_id) {
			if let Some(bulb) = self.bulbs.remove(&switch_id) {
				self.by_mesh.remove(&bulb.mesh_id);
			}
		}
	}

	pub fn by_switch(&self, switch_id: u32) -> Option<&Bulb> {
		self.bulbs.get(&switch_id)
	}

	pub fn by_switch_mut(&mut self, switch_id: u32) -> Option<&mut Bulb> {
		self.bulbs.get_mut(&switch_id)
	}

	pub fn by_device_mut(&mut self, device_id: u32) -> Option<&mut Bulb> {
		let switch_id = *self.by_device.get(&device_id)?;
		self.bulbs.get_mut(&switch_id)
	}

	/// Find the bulb a status record is about.
	///
	/// When the frame named a switch, a mesh match under that switch wins; otherwise the
	/// first bulb registered with that mesh id is used.
	pub fn resolve_mut(&mut self, switch_id: Option<u32>, mesh_id: u16) -> Option<&mut Bulb> {
		if let Some(switch_id) = switch_id {
			let direct = self
				.bulbs
				.get(&switch_id)
				.map_or(false, |b| b.mesh_id == mesh_id);
			if direct {
				return self.bulbs.get_mut(&switch_id);
			}
		}
		let switch_id = *self.by_mesh.get(&mesh_id)?;
		self.bulbs.get_mut(&switch_id)
	}

	pub fn bulbs(&self) -> impl Iterator<Item = &Bulb> {
		self.bulbs.values()
	}

	pub fn bulbs_mut(&mut self) -> impl Iterator<Item = &mut Bulb> {
		self.bulbs.values_mut()
	}

	pub fn len(&self) -> usize {
		self.bulbs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bulbs.is_empty()
	}
}

impl Default for DeviceRegistry {
	fn default() -> Self {
		Self::new()
	}
}
