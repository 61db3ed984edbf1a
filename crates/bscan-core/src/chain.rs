//! Scan chain: devices sharing one JTAG bus, in chain order

use serde::Serialize;
use tracing::debug;

use crate::dut::Dut;

/// Ordered set of devices on one scan chain
///
/// Position 0 is the device closest to TDI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanChain {
    devices: Vec<Dut>,
}

impl ScanChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Append a device and assign its chain position
    pub fn push(&mut self, mut dut: Dut) -> usize {
        let position = self.devices.len();
        dut.set_chain_position(position);
        debug!(position, name = %dut.name(), idcode = ?dut.idcode(), "Added device to chain");
        self.devices.push(dut);
        position
    }

    pub fn get(&self, position: usize) -> Option<&Dut> {
        self.devices.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dut> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// First device reporting an IDCODE
    pub fn find_by_idcode(&self, idcode: &str) -> Option<&Dut> {
        self.devices.iter().find(|d| d.idcode() == Some(idcode))
    }

    /// Sum of all IR lengths, `None` if any device's IR length is unknown
    pub fn total_ir_length(&self) -> Option<usize> {
        self.devices.iter().map(Dut::ir_length).sum()
    }
}
