//! bscan Core - BSDL tree resolution and JTAG device models
//!
//! This crate turns an already-parsed BSDL (Boundary-Scan Description
//! Language) tree into a structured device model:
//! - Input tree types with shape normalization ([`ast`])
//! - Identification code extraction ([`identity`])
//! - Register table resolution with cross-referenced lengths ([`registers`])
//! - Instruction/opcode table resolution ([`instructions`])
//! - Physical pin and logical port mapping ([`pins`])
//! - The assembled device under test and scan chain ([`dut`], [`chain`])

pub mod ast;
pub mod chain;
pub mod dut;
pub mod identity;
pub mod instructions;
pub mod pins;
pub mod registers;

pub use ast::{AstError, BsdlAst, OneOrMany, PinId};
pub use chain::ScanChain;
pub use dut::{Dut, DutError};
pub use instructions::Instruction;
pub use pins::{Pin, PinMap};
pub use registers::{Register, Resolution};
