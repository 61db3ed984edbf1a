//! Physical pin and logical port mapping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::ast::{BsdlAst, PinId};

/// One physical pin of the package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    /// Dense position in the package pin map
    pub index: usize,
    /// Physical pin id (package pin number or ball name)
    pub pin_id: PinId,
    /// Name of the port bonded to this pin
    pub port_name: String,
    /// Index of the logical port group, once known
    pub port_group: Option<usize>,
    /// Signal class of the logical port group (in, out, inout, linkage, ...)
    pub pin_type: Option<String>,
}

/// Pin table with lookups by port name and by physical id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PinMap {
    pins: Vec<Pin>,
    /// Port name of every pin, same indexing as `pins`
    #[serde(skip)]
    port_dict: Vec<String>,
    /// Physical id to every pin index carrying it
    #[serde(skip)]
    pin_dict: BTreeMap<PinId, Vec<usize>>,
}

impl PinMap {
    /// Create an empty pin map
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten the package pin map and apply the logical port groups
    pub fn from_ast(ast: &BsdlAst) -> Self {
        let mut map = Self::new();

        for port in ast.pin_map() {
            for pin_id in &port.pin_list {
                map.push(pin_id.clone(), port.port_name.clone());
            }
        }

        if let Some(groups) = ast.logical_ports() {
            for (group, ports) in groups.iter().enumerate() {
                for identifier in &ports.identifier_list {
                    map.stamp_port(identifier, group, &ports.pin_type);
                }
            }
        }

        map
    }

    fn push(&mut self, pin_id: PinId, port_name: String) {
        let index = self.pins.len();
        let indices = self.pin_dict.entry(pin_id.clone()).or_default();
        if let Some(first) = indices.first() {
            warn!(
                pin = %pin_id,
                first = *first,
                duplicate = index,
                "Physical pin id appears more than once in the pin map"
            );
        }
        indices.push(index);
        self.port_dict.push(port_name.clone());
        self.pins.push(Pin {
            index,
            pin_id,
            port_name,
            port_group: None,
            pin_type: None,
        });
    }

    fn stamp_port(&mut self, port_name: &str, group: usize, pin_type: &str) {
        for (index, name) in self.port_dict.iter().enumerate() {
            if name == port_name {
                let pin = &mut self.pins[index];
                pin.port_group = Some(group);
                pin.pin_type = Some(pin_type.to_string());
            }
        }
    }

    /// All pins in index order
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Pin at a dense index
    pub fn get(&self, index: usize) -> Option<&Pin> {
        self.pins.get(index)
    }

    /// First pin carrying a physical id
    pub fn by_id(&self, pin_id: &PinId) -> Option<&Pin> {
        self.pin_dict
            .get(pin_id)
            .and_then(|indices| indices.first())
            .map(|&index| &self.pins[index])
    }

    /// Every pin carrying a physical id
    ///
    /// More than one only when the pin map lists the id twice.
    pub fn all_by_id(&self, pin_id: &PinId) -> Vec<&Pin> {
        self.pin_dict
            .get(pin_id)
            .map(|indices| indices.iter().map(|&i| &self.pins[i]).collect())
            .unwrap_or_default()
    }

    /// Every pin bonded to a port
    pub fn by_port(&self, port_name: &str) -> Vec<&Pin> {
        self.port_dict
            .iter()
            .enumerate()
            .filter(|(_, name)| *name == port_name)
            .map(|(index, _)| &self.pins[index])
            .collect()
    }

    /// Every pin of a logical port group
    pub fn by_group(&self, group: usize) -> Vec<&Pin> {
        self.pins
            .iter()
            .filter(|p| p.port_group == Some(group))
            .collect()
    }

    /// Port name of every pin, same indexing as [`PinMap::pins`]
    pub fn port_names(&self) -> &[String] {
        &self.port_dict
    }

    /// Physical ids listed more than once
    pub fn duplicate_ids(&self) -> Vec<&PinId> {
        self.pin_dict
            .iter()
            .filter(|(_, indices)| indices.len() > 1)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}
