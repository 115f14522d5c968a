//! Integration tests for the socsim CLI.

use env_logger as _;
use log as _;
use serde as _;
use soc_cli as _;
use soc_core as _;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use thiserror as _;
use toml as _;

/// XOR R0,R0; ADDI R0,#5; PUSH R0; XOR R0,R0; POP R0; MOV R3,R0
const STACK_ROUND_TRIP: &str = "\
# push a value, clobber the register, pop it back
0x0500
0x1050
0x4200 ; PUSH R0
0x0500
0x4300 ; POP R0
0x0003 ; MOV R3, R0
";

const COMPACT_NO_REFRESH: &str = "\
preset = \"compact\"

[timing]
refresh_interval_cycles = 0
";

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("socsim")
}

fn create_temp_file(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn socsim(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .output()
        .expect("failed to run socsim")
}

fn framebuffer_image() -> String {
    let mut image = String::new();
    for row in 0..8u16 {
        image.push_str(&format!("@{:#x}\n", 0x400 + u32::from(row) * 32));
        let words: Vec<String> = (0..16u16)
            .map(|x| format!("{:04x}", (row << 8) | x))
            .collect();
        image.push_str(&words.join(" "));
        image.push('\n');
    }
    image
}

#[test]
fn run_prints_final_registers() {
    let temp_dir = tempfile::tempdir().unwrap();
    let program = create_temp_file(temp_dir.path(), "stack.hex", STACK_ROUND_TRIP);

    let output = socsim(&["run", program.to_str().unwrap(), "--compact"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("R3  = 0x0005"));
    assert!(stdout.contains("self-test        passed"));
    assert!(stdout.contains("instructions     6"));
}

#[test]
fn run_with_config_and_image_reports_toml_counters() {
    let temp_dir = tempfile::tempdir().unwrap();
    let program = create_temp_file(temp_dir.path(), "empty.hex", "# nothing\n");
    let config = create_temp_file(temp_dir.path(), "sim.toml", COMPACT_NO_REFRESH);
    let image = create_temp_file(temp_dir.path(), "fb.img", &framebuffer_image());

    let output = socsim(&[
        "run",
        program.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--image",
        image.to_str().unwrap(),
        "--lines",
        "8",
        "--toml",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("lines_scanned = 8"));
    assert!(stdout.contains("underruns = 0"));
    assert!(stdout.contains("refreshes = 0"));
}

#[test]
fn strict_decode_fault_exits_with_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let program = create_temp_file(temp_dir.path(), "bad.hex", "0xC123\n");

    let output = socsim(&["run", program.to_str().unwrap(), "--compact", "--strict"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("unknown instruction encoding under strict decode"));
}

#[test]
fn lenient_decode_runs_unknown_words_as_noops() {
    let temp_dir = tempfile::tempdir().unwrap();
    let program = create_temp_file(temp_dir.path(), "bad.hex", "0xC123\n0x1021\n");

    let output = socsim(&["run", program.to_str().unwrap(), "--compact"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("R1  = 0x0002"));
    assert!(stdout.contains("unknown words    1"));
}

#[test]
fn disasm_lists_program() {
    let temp_dir = tempfile::tempdir().unwrap();
    let program = create_temp_file(temp_dir.path(), "stack.hex", STACK_ROUND_TRIP);

    let output = socsim(&["disasm", program.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[1], "0001: 1050  ADDI R0, #5");
    assert_eq!(lines[2], "0002: 4200  PUSH R0");
    assert_eq!(lines[5], "0005: 0003  MOV R3, R0");
}

#[test]
fn malformed_program_reports_line() {
    let temp_dir = tempfile::tempdir().unwrap();
    let program = create_temp_file(temp_dir.path(), "typo.hex", "0x0500\n0xZZ\n");

    let output = socsim(&["run", program.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("line 2: invalid hex token `0xZZ`"));
}

#[test]
fn missing_program_file_fails() {
    let output = socsim(&["run", "/nonexistent/socsim/program.hex"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("failed to read"));
}

#[test]
fn help_prints_usage() {
    let output = socsim(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Usage: socsim"));
}
