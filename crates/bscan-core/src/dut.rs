//! Device under test: the resolved model of one JTAG component
//!
//! Terminology:
//! - a *pin* is a physical connection of the package
//! - a *port* is the functional view of one pin or a group of pins
//! - a *cell* is a boundary-scan register cell, possibly tied to a port

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ast::{BsdlAst, PinId};
use crate::identity::resolve_idcode;
use crate::instructions::{resolve_instructions, Instruction};
use crate::pins::{Pin, PinMap};
use crate::registers::{resolve_registers, Register, Resolution};

#[derive(Error, Debug)]
pub enum DutError {
    #[error("No IDCODE declaration in optional register description")]
    MissingIdentity,
    #[error("Malformed {section}: {detail}")]
    MalformedSection {
        section: &'static str,
        detail: String,
    },
    #[error("Instruction {instruction} refers to unknown register {register}")]
    UnknownRegister {
        instruction: String,
        register: String,
    },
    #[error("Not supported: {0}")]
    Unsupported(&'static str),
}

/// A resolved device description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dut {
    idcode: Option<String>,
    name: String,
    package: String,
    /// Position on the scan chain, assigned by the chain owner
    chain_position: Option<usize>,
    registers: Vec<Register>,
    instructions: Vec<Instruction>,
    pins: PinMap,
    /// Hand-added entries, laid over every tree applied later
    #[serde(skip)]
    manual_registers: Vec<Register>,
    #[serde(skip)]
    manual_instructions: Vec<Instruction>,
}

impl Default for Dut {
    fn default() -> Self {
        Self::new()
    }
}

impl Dut {
    /// Create an empty device holding only the BYPASS register
    pub fn new() -> Self {
        Self {
            idcode: None,
            name: String::new(),
            package: String::new(),
            chain_position: None,
            registers: vec![Register::bypass()],
            instructions: Vec::new(),
            pins: PinMap::new(),
            manual_registers: Vec::new(),
            manual_instructions: Vec::new(),
        }
    }

    /// Create a placeholder for a device known only by its IDCODE
    pub fn with_idcode(idcode: impl Into<String>) -> Self {
        Self {
            idcode: Some(idcode.into()),
            ..Self::new()
        }
    }

    /// Resolve a device from a parsed BSDL tree
    pub fn from_ast(ast: &BsdlAst) -> Result<Self, DutError> {
        let mut dut = Self::new();
        dut.apply_ast(ast)?;
        Ok(dut)
    }

    /// Resolve a parsed BSDL tree into this device
    ///
    /// The tables are rebuilt from the tree, replacing whatever an earlier
    /// tree put there. Hand-added registers and instructions are laid over
    /// the result; where they collide with the tree, the tree wins. On error
    /// the device is left unchanged.
    pub fn apply_ast(&mut self, ast: &BsdlAst) -> Result<(), DutError> {
        let idcode = resolve_idcode(ast)?;

        let resolved = resolve_registers(ast, Resolution::default())?;
        let mut resolved = resolve_instructions(ast, resolved)?;
        let manual_instructions = self.overlay_manual(&mut resolved);
        let pins = PinMap::from_ast(ast);

        if let Some(previous) = self.idcode.as_deref().filter(|p| *p != idcode) {
            warn!(previous, idcode = %idcode, "Replacing IDCODE with the tree's declaration");
        }

        self.idcode = Some(idcode);
        self.name = ast.component_name();
        self.package = ast.package().to_string();
        self.registers = resolved.registers;
        self.instructions = resolved.instructions;
        self.pins = pins;
        self.manual_instructions = manual_instructions;

        info!(
            name = %self.name,
            package = %self.package,
            registers = self.registers.len(),
            instructions = self.instructions.len(),
            pins = self.pins.len(),
            "Resolved device"
        );
        Ok(())
    }

    /// Lay the hand-added entries over freshly resolved tables
    ///
    /// Returns the hand-added instructions that are still bound to an
    /// existing register.
    fn overlay_manual(&self, resolved: &mut Resolution) -> Vec<Instruction> {
        for register in &self.manual_registers {
            match resolved.registers.iter_mut().find(|r| r.name == register.name) {
                Some(existing) => match (existing.length, register.length) {
                    (None, length) => existing.length = length,
                    (Some(tree), Some(manual)) if tree != manual => warn!(
                        register = %register.name,
                        tree,
                        manual,
                        "Hand-added register length differs from the tree, keeping the tree's"
                    ),
                    _ => {}
                },
                None => resolved.registers.push(register.clone()),
            }
        }

        let mut kept = Vec::new();
        for instruction in &self.manual_instructions {
            if !resolved.registers.iter().any(|r| r.name == instruction.register) {
                warn!(
                    instruction = %instruction.name,
                    register = %instruction.register,
                    "Dropping hand-added instruction, its register is gone"
                );
                continue;
            }
            match resolved.instructions.iter_mut().find(|i| i.name == instruction.name) {
                Some(existing) => {
                    if existing.opcode.is_none() {
                        existing.opcode = instruction.opcode.clone();
                    }
                }
                None => resolved.instructions.push(instruction.clone()),
            }
            kept.push(instruction.clone());
        }
        kept
    }

    pub fn idcode(&self) -> Option<&str> {
        self.idcode.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn chain_position(&self) -> Option<usize> {
        self.chain_position
    }

    pub fn set_chain_position(&mut self, position: usize) {
        self.chain_position = Some(position);
    }

    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    pub fn register(&self, name: &str) -> Option<&Register> {
        self.registers.iter().find(|r| r.name == name)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction(&self, name: &str) -> Option<&Instruction> {
        self.instructions.iter().find(|i| i.name == name)
    }

    /// Instruction register length, if known
    pub fn ir_length(&self) -> Option<usize> {
        self.register(crate::registers::IR).and_then(|r| r.length)
    }

    pub fn pins(&self) -> &[Pin] {
        self.pins.pins()
    }

    /// Pin with a physical id (first one if the id is listed twice)
    pub fn pin_by_id(&self, pin_id: &PinId) -> Option<&Pin> {
        self.pins.by_id(pin_id)
    }

    pub fn pins_by_id(&self, pin_id: &PinId) -> Vec<&Pin> {
        self.pins.all_by_id(pin_id)
    }

    pub fn pins_by_port(&self, port_name: &str) -> Vec<&Pin> {
        self.pins.by_port(port_name)
    }

    pub fn port_names(&self) -> &[String] {
        self.pins.port_names()
    }

    /// Add a register by hand
    ///
    /// Returns `false` and changes nothing if the name is taken.
    pub fn add_register(&mut self, name: &str, length: Option<usize>) -> bool {
        if self.register(name).is_some() {
            debug!(register = name, "Register already present, not added");
            return false;
        }
        let register = Register::new(name, length);
        self.registers.push(register.clone());
        self.manual_registers.push(register);
        true
    }

    /// Add an instruction by hand
    ///
    /// Returns `Ok(false)` and changes nothing if the name is taken. The
    /// register must already exist.
    pub fn add_instruction(
        &mut self,
        name: &str,
        opcode: Option<&str>,
        register: &str,
    ) -> Result<bool, DutError> {
        if self.register(register).is_none() {
            return Err(DutError::UnknownRegister {
                instruction: name.to_string(),
                register: register.to_string(),
            });
        }
        if self.instruction(name).is_some() {
            debug!(instruction = name, "Instruction already present, not added");
            return Ok(false);
        }
        let instruction = Instruction::new(name, opcode.map(str::to_string), register);
        self.instructions.push(instruction.clone());
        self.manual_instructions.push(instruction);
        Ok(true)
    }

    /// Decode the boundary-scan register cells
    ///
    /// Cell-level decoding of the boundary register is not implemented; this
    /// is the hook for it.
    pub fn decode_boundary_register(&self) -> Result<(), DutError> {
        Err(DutError::Unsupported("boundary-scan register cell decoding"))
    }
}
