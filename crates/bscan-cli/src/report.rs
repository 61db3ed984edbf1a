//! Text and JSON reports of resolved devices

use anyhow::Result;
use bscan_core::{Dut, ScanChain};
use std::fmt::Write;

use crate::config::OutputFormat;

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}

/// Full description of one device
pub fn device_report(dut: &Dut, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(dut)?);
    }

    let mut out = String::new();
    writeln!(out, "{} ({})", dut.name(), dut.package())?;
    writeln!(out, "  IDCODE: {}", or_unknown(dut.idcode()))?;

    writeln!(out, "Registers:")?;
    for register in dut.registers() {
        writeln!(out, "  {:<16} {:>6}", register.name, or_unknown(register.length))?;
    }

    writeln!(out, "Instructions:")?;
    for instruction in dut.instructions() {
        writeln!(
            out,
            "  {:<16} {:<16} -> {}",
            instruction.name,
            or_unknown(instruction.opcode.as_deref()),
            instruction.register
        )?;
    }

    writeln!(out, "Pins:")?;
    for pin in dut.pins() {
        writeln!(
            out,
            "  {:>4} {:<6} {:<16} group={} type={}",
            pin.index,
            pin.pin_id.as_str(),
            pin.port_name,
            or_unknown(pin.port_group),
            or_unknown(pin.pin_type.as_deref())
        )?;
    }

    Ok(out)
}

/// One line per device plus the combined IR length
pub fn chain_report(chain: &ScanChain, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(chain)?);
    }

    let mut out = String::new();
    for dut in chain.iter() {
        writeln!(
            out,
            "{:>3}: {:<16} IDCODE={} IR={}",
            or_unknown(dut.chain_position()),
            if dut.name().is_empty() { "<unknown>" } else { dut.name() },
            or_unknown(dut.idcode()),
            or_unknown(dut.ir_length())
        )?;
    }
    writeln!(out, "Total IR length: {}", or_unknown(chain.total_ir_length()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_device_report() {
        let mut dut = Dut::with_idcode("0001");
        dut.add_register("IR", Some(4));
        dut.add_instruction("BYPASS", Some("1111"), "BYPASS").unwrap();

        let report = device_report(&dut, OutputFormat::Text).unwrap();
        assert!(report.contains("IDCODE: 0001"));
        assert!(report.contains("IR"));
        assert!(report.contains("-> BYPASS"));
    }

    #[test]
    fn test_chain_report() {
        let mut chain = ScanChain::new();
        chain.push(Dut::with_idcode("0001"));

        let report = chain_report(&chain, OutputFormat::Text).unwrap();
        assert!(report.contains("<unknown>"));
        assert!(report.contains("Total IR length: ?"));

        let json = chain_report(&chain, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["devices"][0]["idcode"], "0001");
    }
}
