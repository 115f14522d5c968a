//! Text renderings of run results.

use soc_core::{ClientId, Diagnostics, DisassemblyRow, RegisterFile};

/// Renders the register file four registers per row.
#[must_use]
pub fn format_registers(registers: &RegisterFile) -> String {
    let values = registers.values();
    values
        .chunks(4)
        .enumerate()
        .map(|(row, chunk)| {
            let cells: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(column, value)| format!("R{:<2} = {value:#06x}", row * 4 + column))
                .collect();
            format!("{}\n", cells.join("  "))
        })
        .collect()
}

/// Renders the counters as aligned `name: value` lines.
#[must_use]
pub fn format_diagnostics(diagnostics: &Diagnostics) -> String {
    let self_test = match diagnostics.self_test_passed {
        Some(true) => "passed",
        Some(false) => "FAILED",
        None => "running",
    };
    let rows: [(&str, String); 15] = [
        ("memory cycles", diagnostics.memory_cycles.to_string()),
        ("pixel cycles", diagnostics.pixel_cycles.to_string()),
        ("self-test", self_test.to_string()),
        ("instructions", diagnostics.instructions_retired.to_string()),
        ("unknown words", diagnostics.unknown_instructions.to_string()),
        (
            "monitor grants",
            diagnostics.arbiter.grants_for(ClientId::Monitor).to_string(),
        ),
        (
            "cpu grants",
            diagnostics.arbiter.grants_for(ClientId::Processor).to_string(),
        ),
        ("filler grants", diagnostics.filler_grants().to_string()),
        ("refreshes", diagnostics.refreshes.to_string()),
        ("lines scanned", diagnostics.lines_scanned.to_string()),
        (
            "underruns",
            format!(
                "{} ({} ppm)",
                diagnostics.underruns,
                diagnostics.underrun_ppm()
            ),
        ),
        ("fills committed", diagnostics.fills_committed.to_string()),
        (
            "fills dropped",
            format!(
                "{} late, {} abandoned",
                diagnostics.fills_discarded, diagnostics.fills_abandoned
            ),
        ),
        ("sync pulses", diagnostics.sync_pulses.to_string()),
        ("frame swaps", diagnostics.frame_swaps.to_string()),
    ];
    rows.iter()
        .map(|(name, value)| format!("{name:<16} {value}\n"))
        .collect()
}

/// Renders a disassembly listing, one instruction per line.
#[must_use]
pub fn format_listing(rows: &[DisassemblyRow]) -> String {
    rows.iter()
        .map(|row| format!("{:04}: {:04X}  {}\n", row.pc, row.word, row.text()))
        .collect()
}

/// Serializes the counters as a TOML document.
///
/// # Errors
///
/// Returns the serializer error when a counter cannot be represented.
pub fn diagnostics_toml(diagnostics: &Diagnostics) -> Result<String, toml::ser::Error> {
    toml::to_string(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::{diagnostics_toml, format_diagnostics, format_listing, format_registers};
    use soc_core::{disassemble, Diagnostics, Instruction, Register, RegisterFile};

    #[test]
    fn registers_render_in_four_rows() {
        let mut registers = RegisterFile::default();
        registers.set(Register::R3, 5);
        registers.set(Register::R15, 0xBEEF);
        let text = format_registers(&registers);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("R3  = 0x0005"));
        assert!(lines[3].ends_with("R15 = 0xbeef"));
    }

    #[test]
    fn diagnostics_include_underrun_ratio() {
        let diagnostics = Diagnostics {
            lines_scanned: 768,
            underruns: 3,
            self_test_passed: Some(true),
            ..Diagnostics::default()
        };
        let text = format_diagnostics(&diagnostics);
        assert!(text.contains("underruns        3 (3906 ppm)"));
        assert!(text.contains("self-test        passed"));
    }

    #[test]
    fn listing_shows_pc_word_and_text() {
        let rows = disassemble(&[Instruction::mov(Register::R1, Register::R2).word()]);
        assert_eq!(format_listing(&rows), "0000: 0021  MOV R1, R2\n");
    }

    #[test]
    fn diagnostics_render_one_terminated_row_per_counter() {
        let text = format_diagnostics(&Diagnostics::default());
        assert_eq!(text.lines().count(), 15);
        assert!(text.ends_with('\n'));
        assert!(text.starts_with("memory cycles    0\n"));
        assert!(text.contains("self-test        running\n"));
    }

    #[test]
    fn diagnostics_serialize_as_toml() {
        let diagnostics = Diagnostics {
            memory_cycles: 42,
            ..Diagnostics::default()
        };
        let text = diagnostics_toml(&diagnostics).expect("serializable");
        assert!(text.contains("memory_cycles = 42"));
    }
}
