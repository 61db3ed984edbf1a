//! Device identification code extraction

use tracing::warn;

use crate::ast::{join_bits, BsdlAst};
use crate::dut::DutError;

/// Optional-register key carrying the IDCODE bit pattern
pub const IDCODE_KEY: &str = "idcode_register";

/// Find the IDCODE declaration and return its bit pattern
///
/// The first declaration wins. Later declarations that disagree with it are
/// reported but do not fail resolution.
pub fn resolve_idcode(ast: &BsdlAst) -> Result<String, DutError> {
    let mut found = ast
        .optional_registers()
        .iter()
        .filter_map(|record| record.get(IDCODE_KEY))
        .map(join_bits);

    let idcode = found.next().ok_or(DutError::MissingIdentity)?;

    for other in found.filter(|other| *other != idcode) {
        warn!(
            used = %idcode,
            ignored = %other,
            "Conflicting IDCODE declarations, keeping the first"
        );
    }

    Ok(idcode)
}
