//! Register table resolution
//!
//! Register lengths in a BSDL tree are spread over several sections. The
//! mandatory registers come with their lengths, but data registers named in
//! the register-access section often carry none. Their length then has to be
//! borrowed from the optional-register section, whose entries are keyed by
//! instruction (`usercode_register`) rather than by register name.
//!
//! Resolution runs in stages:
//! 1. seed BYPASS, IR and BSR
//! 2. collect length candidates from the optional-register section
//! 3. walk the register-access section, letting each captured instruction
//!    claim the candidate of the same name
//! 4. promote every unclaimed candidate to a register of its own

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::{join_bits, BsdlAst, IntLit, RegisterRecord};
use crate::dut::DutError;
use crate::instructions::{merge_instruction, Instruction};

pub const BYPASS: &str = "BYPASS";
pub const IR: &str = "IR";
pub const BSR: &str = "BSR";

const REGISTER_SUFFIX: &str = "_REGISTER";

/// A named register and its bit length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub name: String,
    /// `None` while the length is unknown
    pub length: Option<usize>,
}

impl Register {
    pub fn new(name: impl Into<String>, length: Option<usize>) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }

    /// The single-bit bypass register every device has
    pub fn bypass() -> Self {
        Self::new(BYPASS, Some(1))
    }
}

/// Register-length candidate from the optional-register section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub length: usize,
}

/// Register and instruction tables passed between resolution stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub registers: Vec<Register>,
    pub instructions: Vec<Instruction>,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            registers: vec![Register::bypass()],
            instructions: Vec::new(),
        }
    }
}

/// Add a register unless one with the same name exists
///
/// An existing register with an unknown length takes the new length.
pub fn merge_register(registers: &mut Vec<Register>, register: Register) {
    match registers.iter_mut().find(|r| r.name == register.name) {
        Some(existing) => {
            if existing.length.is_none() && register.length.is_some() {
                debug!(register = %existing.name, length = ?register.length, "Back-filled register length");
                existing.length = register.length;
            }
        }
        None => registers.push(register),
    }
}

/// Add a register, replacing the length of an existing one
pub fn set_register(registers: &mut Vec<Register>, register: Register) {
    match registers.iter_mut().find(|r| r.name == register.name) {
        Some(existing) => {
            if existing.length.is_some() && existing.length != register.length {
                warn!(
                    register = %existing.name,
                    previous = ?existing.length,
                    length = ?register.length,
                    "Register length replaced by the tree's declaration"
                );
            }
            existing.length = register.length;
        }
        None => registers.push(register),
    }
}

/// Candidate name for an optional-register key (`usercode_register` -> `USERCODE`)
pub fn candidate_name(key: &str) -> String {
    key.to_uppercase().replace(REGISTER_SUFFIX, "")
}

/// Collect length candidates from the optional-register records
pub fn candidates(records: &[RegisterRecord]) -> Vec<Candidate> {
    records
        .iter()
        .flat_map(|record| record.iter())
        .map(|(key, bits)| Candidate {
            name: candidate_name(key),
            length: join_bits(bits).chars().count(),
        })
        .collect()
}

fn required_length(
    value: Option<&IntLit>,
    section: &'static str,
    field: &str,
) -> Result<usize, DutError> {
    let value = value.ok_or_else(|| DutError::MalformedSection {
        section,
        detail: format!("missing {}", field),
    })?;
    value.to_usize().ok_or_else(|| DutError::MalformedSection {
        section,
        detail: format!("{} is not a length: {:?}", field, value),
    })
}

/// Build the register table, plus an instruction stub for every instruction
/// the register sections mention
///
/// `seed` holds registers and instructions that already exist. IR and BSR
/// always take the tree's lengths; every other seeded entry is merged with
/// what the tree declares.
pub fn resolve_registers(ast: &BsdlAst, seed: Resolution) -> Result<Resolution, DutError> {
    let Resolution {
        mut registers,
        mut instructions,
    } = seed;

    let ir = ast.instruction_register_description.as_ref().ok_or_else(|| {
        DutError::MalformedSection {
            section: "instruction_register_description",
            detail: "section is missing".to_string(),
        }
    })?;
    let ir_length = required_length(
        ir.instruction_length.as_ref(),
        "instruction_register_description",
        "instruction_length",
    )?;

    let boundary = ast
        .boundary_scan_register_description
        .as_ref()
        .and_then(|b| b.fixed_boundary_stmts.as_ref())
        .ok_or_else(|| DutError::MalformedSection {
            section: "boundary_scan_register_description",
            detail: "fixed_boundary_stmts is missing".to_string(),
        })?;
    let bsr_length = required_length(
        boundary.boundary_length.as_ref(),
        "boundary_scan_register_description",
        "boundary_length",
    )?;

    merge_register(&mut registers, Register::bypass());
    set_register(&mut registers, Register::new(IR, Some(ir_length)));
    set_register(&mut registers, Register::new(BSR, Some(bsr_length)));

    let mut pending = candidates(ast.optional_registers());

    for access in ast.register_accesses() {
        let name = access.register.reg_name.clone();
        let explicit = match access.register.reg_length.as_ref() {
            Some(value) => Some(value.to_usize().ok_or_else(|| DutError::MalformedSection {
                section: "register_access_description",
                detail: format!("length of {} is not a length: {:?}", name, value),
            })?),
            None => None,
        };

        // One candidate at most; later ones stay pending and get promoted
        let mut length = explicit;
        for captured in &access.instruction_capture_list {
            if length.is_some() {
                break;
            }
            if let Some(pos) = pending
                .iter()
                .position(|c| c.name == captured.instruction_name)
            {
                let claimed = pending.remove(pos);
                debug!(register = %name, instruction = %claimed.name, "Claimed length candidate");
                length = Some(claimed.length);
            }
        }

        merge_register(&mut registers, Register::new(name.clone(), length));
        for captured in &access.instruction_capture_list {
            merge_instruction(
                &mut instructions,
                Instruction::stub(captured.instruction_name.clone(), name.clone()),
            );
        }
    }

    for candidate in pending {
        debug!(
            register = %candidate.name,
            length = candidate.length,
            "Promoting unclaimed candidate to register"
        );
        merge_register(
            &mut registers,
            Register::new(candidate.name.clone(), Some(candidate.length)),
        );
        merge_instruction(
            &mut instructions,
            Instruction::stub(candidate.name.clone(), candidate.name),
        );
    }

    Ok(Resolution {
        registers,
        instructions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(extra: &str) -> BsdlAst {
        let json = format!(
            r#"{{
                "instruction_register_description": {{
                    "instruction_length": 8,
                    "instruction_opcodes": []
                }},
                "boundary_scan_register_description": {{
                    "fixed_boundary_stmts": {{"boundary_length": "192"}}
                }}{}
            }}"#,
            extra
        );
        BsdlAst::from_json(&json).unwrap()
    }

    fn find<'a>(resolution: &'a Resolution, name: &str) -> Option<&'a Register> {
        resolution.registers.iter().find(|r| r.name == name)
    }

    #[test]
    fn test_mandatory_registers() {
        let resolved = resolve_registers(&tree(""), Resolution::default()).unwrap();
        assert_eq!(
            resolved.registers,
            vec![
                Register::new("BYPASS", Some(1)),
                Register::new("IR", Some(8)),
                Register::new("BSR", Some(192)),
            ]
        );
        assert!(resolved.instructions.is_empty());
    }

    #[test]
    fn test_candidate_name() {
        assert_eq!(candidate_name("usercode_register"), "USERCODE");
        assert_eq!(candidate_name("idcode_register"), "IDCODE");
        assert_eq!(candidate_name("Usercode1"), "USERCODE1");
    }

    #[test]
    fn test_capture_claims_candidate_length() {
        let ast = tree(
            r#",
            "optional_register_description": [
                {"usercode1": ["0101", "0101", "0101", "0101", "0101", "0101", "0101", "0101"]}
            ],
            "register_access_description": [
                {"register": {"reg_name": "USERCODE"},
                 "instruction_capture_list": [{"instruction_name": "USERCODE1"}]}
            ]"#,
        );

        let resolved = resolve_registers(&ast, Resolution::default()).unwrap();
        assert_eq!(find(&resolved, "USERCODE"), Some(&Register::new("USERCODE", Some(32))));
        assert!(find(&resolved, "USERCODE1").is_none());
        assert_eq!(
            resolved.instructions,
            vec![Instruction::stub("USERCODE1", "USERCODE")]
        );
    }

    #[test]
    fn test_explicit_length_is_kept() {
        let ast = tree(
            r#",
            "optional_register_description": {"idcode_register": "00000000000000000000000000000001"},
            "register_access_description": [
                {"register": {"reg_name": "DEVICE_ID", "reg_length": 32},
                 "instruction_capture_list": [{"instruction_name": "IDCODE"}]},
                {"register": {"reg_name": "BYPASS"},
                 "instruction_capture_list": [
                    {"instruction_name": "BYPASS"},
                    {"instruction_name": "HIGHZ"}
                 ]}
            ]"#,
        );

        let resolved = resolve_registers(&ast, Resolution::default()).unwrap();
        assert_eq!(find(&resolved, "DEVICE_ID").unwrap().length, Some(32));
        assert_eq!(find(&resolved, "BYPASS").unwrap().length, Some(1));
        assert_eq!(
            resolved.registers.iter().filter(|r| r.name == "BYPASS").count(),
            1
        );
        // Not claimed, the register had an explicit length
        assert_eq!(find(&resolved, "IDCODE").unwrap().length, Some(32));

        let idcode = resolved.instructions.iter().find(|i| i.name == "IDCODE").unwrap();
        assert_eq!(idcode.register, "DEVICE_ID");
        let highz = resolved.instructions.iter().find(|i| i.name == "HIGHZ").unwrap();
        assert_eq!(highz.register, "BYPASS");
    }

    #[test]
    fn test_unclaimed_candidate_becomes_register() {
        let ast = tree(
            r#",
            "optional_register_description": [
                {"idcode_register": "0001"},
                {"usercode_register": "11110000"}
            ]"#,
        );

        let resolved = resolve_registers(&ast, Resolution::default()).unwrap();
        assert_eq!(find(&resolved, "IDCODE"), Some(&Register::new("IDCODE", Some(4))));
        assert_eq!(find(&resolved, "USERCODE"), Some(&Register::new("USERCODE", Some(8))));
        assert_eq!(
            resolved.instructions,
            vec![
                Instruction::stub("IDCODE", "IDCODE"),
                Instruction::stub("USERCODE", "USERCODE"),
            ]
        );
    }

    #[test]
    fn test_claim_from_later_capture_entry() {
        let ast = tree(
            r#",
            "optional_register_description": {"usercode_register": "1111"},
            "register_access_description": {
                "register": {"reg_name": "USER"},
                "instruction_capture_list": [
                    {"instruction_name": "USERDATA"},
                    {"instruction_name": "USERCODE"}
                ]
            }"#,
        );

        let resolved = resolve_registers(&ast, Resolution::default()).unwrap();
        assert_eq!(find(&resolved, "USER").unwrap().length, Some(4));
        assert_eq!(resolved.instructions.len(), 2);
    }

    #[test]
    fn test_register_without_any_length() {
        let ast = tree(
            r#",
            "register_access_description": [
                {"register": {"reg_name": "PRIVATE"},
                 "instruction_capture_list": [{"instruction_name": "SECRET"}]}
            ]"#,
        );

        let resolved = resolve_registers(&ast, Resolution::default()).unwrap();
        assert_eq!(find(&resolved, "PRIVATE").unwrap().length, None);
    }

    #[test]
    fn test_seed_is_merged() {
        let mut seed = Resolution::default();
        seed.registers.push(Register::new("IR", None));
        seed.registers.push(Register::new("CUSTOM", Some(3)));

        let resolved = resolve_registers(&tree(""), seed).unwrap();
        assert_eq!(find(&resolved, "IR").unwrap().length, Some(8));
        assert_eq!(find(&resolved, "CUSTOM").unwrap().length, Some(3));
        assert_eq!(resolved.registers.len(), 4);
    }

    #[test]
    fn test_tree_lengths_override_seed() {
        let mut seed = Resolution::default();
        seed.registers.push(Register::new("IR", Some(6)));
        seed.registers.push(Register::new("BSR", Some(10)));

        let resolved = resolve_registers(&tree(""), seed).unwrap();
        assert_eq!(find(&resolved, "IR").unwrap().length, Some(8));
        assert_eq!(find(&resolved, "BSR").unwrap().length, Some(192));
        assert_eq!(resolved.registers.len(), 3);
    }

    #[test]
    fn test_only_first_candidate_is_claimed() {
        let ast = tree(
            r#",
            "optional_register_description": [
                {"usercode1": "00001111"},
                {"usercode2": "0000111100001111"}
            ],
            "register_access_description": {
                "register": {"reg_name": "USER"},
                "instruction_capture_list": [
                    {"instruction_name": "USERCODE1"},
                    {"instruction_name": "USERCODE2"}
                ]
            }"#,
        );

        let resolved = resolve_registers(&ast, Resolution::default()).unwrap();
        assert_eq!(find(&resolved, "USER").unwrap().length, Some(8));
        assert!(find(&resolved, "USERCODE1").is_none());
        assert_eq!(find(&resolved, "USERCODE2").unwrap().length, Some(16));

        // The capture binding wins over the promoted self-binding
        let usercode2 = resolved.instructions.iter().find(|i| i.name == "USERCODE2").unwrap();
        assert_eq!(usercode2.register, "USER");
    }

    #[test]
    fn test_padded_names_claim_candidates() {
        let ast = tree(
            r#",
            "optional_register_description": {"usercode_register": "1111"},
            "register_access_description": {
                "register": {"reg_name": " USER "},
                "instruction_capture_list": [{"instruction_name": " USERCODE"}]
            }"#,
        );

        let resolved = resolve_registers(&ast, Resolution::default()).unwrap();
        assert_eq!(find(&resolved, "USER").unwrap().length, Some(4));
        assert!(find(&resolved, "USERCODE").is_none());
        assert_eq!(resolved.instructions, vec![Instruction::stub("USERCODE", "USER")]);
    }

    #[test]
    fn test_missing_required_sections() {
        let ast = BsdlAst::from_json(
            r#"{"boundary_scan_register_description": {"fixed_boundary_stmts": {"boundary_length": 4}}}"#,
        )
        .unwrap();
        assert!(matches!(
            resolve_registers(&ast, Resolution::default()),
            Err(DutError::MalformedSection {
                section: "instruction_register_description",
                ..
            })
        ));

        let ast = BsdlAst::from_json(
            r#"{"instruction_register_description": {"instruction_length": 4}}"#,
        )
        .unwrap();
        assert!(matches!(
            resolve_registers(&ast, Resolution::default()),
            Err(DutError::MalformedSection {
                section: "boundary_scan_register_description",
                ..
            })
        ));
    }

    #[test]
    fn test_non_numeric_length() {
        let ast = BsdlAst::from_json(
            r#"{
                "instruction_register_description": {"instruction_length": "eight"},
                "boundary_scan_register_description": {"fixed_boundary_stmts": {"boundary_length": 4}}
            }"#,
        )
        .unwrap();
        assert!(matches!(
            resolve_registers(&ast, Resolution::default()),
            Err(DutError::MalformedSection { .. })
        ));
    }
}
