//! Instruction and opcode table resolution

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::BsdlAst;
use crate::dut::DutError;
use crate::registers::{Resolution, BSR, BYPASS};

/// Name given to the opcode entry that declares no instruction name
///
/// Angle brackets cannot appear in a BSDL identifier, so this never collides
/// with a declared instruction.
pub const ANONYMOUS: &str = "<anonymous>";

/// An instruction, its opcode and the data register it selects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub name: String,
    /// Bit pattern loaded into IR, `None` until known
    pub opcode: Option<String>,
    /// Name of the selected register
    pub register: String,
}

impl Instruction {
    pub fn new(
        name: impl Into<String>,
        opcode: Option<String>,
        register: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            opcode,
            register: register.into(),
        }
    }

    /// Instruction known by name and register only
    pub fn stub(name: impl Into<String>, register: impl Into<String>) -> Self {
        Self::new(name, None, register)
    }

    pub fn is_anonymous(&self) -> bool {
        self.name == ANONYMOUS
    }
}

/// Add an instruction unless one with the same name exists
pub fn merge_instruction(instructions: &mut Vec<Instruction>, instruction: Instruction) {
    if !instructions.iter().any(|i| i.name == instruction.name) {
        instructions.push(instruction);
    }
}

/// Assign opcodes from the instruction-opcode list
///
/// Instructions already bound to a register keep that binding and only gain
/// an opcode if they have none. New instructions go to BSR, or to BYPASS
/// for the anonymous entry.
pub fn resolve_instructions(ast: &BsdlAst, resolved: Resolution) -> Result<Resolution, DutError> {
    let Resolution {
        registers,
        mut instructions,
    } = resolved;

    let entries = ast
        .instruction_register_description
        .as_ref()
        .map(|ir| ir.instruction_opcodes.as_slice())
        .unwrap_or(&[]);

    for entry in entries {
        let (name, default_register) = match entry.instruction_name.as_deref() {
            Some(name) if !name.is_empty() => (name, BSR),
            _ => (ANONYMOUS, BYPASS),
        };

        let opcode = entry
            .opcode_list
            .iter()
            .next()
            .cloned()
            .ok_or_else(|| DutError::MalformedSection {
                section: "instruction_register_description",
                detail: format!("instruction {} has no opcode", name),
            })?;

        match instructions.iter_mut().find(|i| i.name == name) {
            Some(existing) => {
                if existing.opcode.is_none() {
                    existing.opcode = Some(opcode);
                }
            }
            None => {
                debug!(instruction = %name, register = default_register, "Instruction bound by default");
                instructions.push(Instruction::new(name, Some(opcode), default_register));
            }
        }
    }

    Ok(Resolution {
        registers,
        instructions,
    })
}
