//! CLI entry point for the `socsim` runner.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde as _;
use soc_cli::config::{load_config, Preset};
use soc_cli::hexfile::{load_image, load_program};
use soc_cli::report::{diagnostics_toml, format_diagnostics, format_listing, format_registers};
use soc_cli::LoadError;
use soc_core::{disassemble, MemoryImage, RunBoundary, SimError, StopReason, System};
use thiserror as _;
use toml as _;
#[cfg(test)]
use tempfile as _;

const DEFAULT_MAX_CYCLES: u64 = 10_000_000;

const USAGE_TEXT: &str = "\
Usage: socsim <command> [options]

Commands:
  run    <program> [options]   Run a program and print registers and counters
  disasm <program>             Print a program listing

Run options:
  -c, --config <file>    TOML configuration (overlays the preset)
  -i, --image <file>     Memory image loaded before reset
      --compact          Use the 16x8 compact preset instead of XGA
      --strict           Fault on unrecognized instruction words
      --frame-ready      Assert frame_ready so every sync pulse swaps
  -l, --lines <n>        Scan <n> more lines after the program halts
      --max-cycles <n>   Memory-cycle limit per run phase (default 10000000)
      --toml             Print counters as TOML
  -h, --help             Show this help message

Programs are hex words, one instruction per token; `#` or `;` starts a
comment. Images use the same syntax with `@address` segment markers.
Set RUST_LOG=debug for bus and scanout logging.
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(RunArgs),
    Disasm(PathBuf),
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    program: PathBuf,
    config: Option<PathBuf>,
    image: Option<PathBuf>,
    compact: bool,
    strict: bool,
    frame_ready: bool,
    lines: u64,
    max_cycles: u64,
    toml: bool,
}

impl RunArgs {
    fn new(program: PathBuf) -> Self {
        Self {
            program,
            config: None,
            image: None,
            compact: false,
            strict: false,
            frame_ready: false,
            lines: 0,
            max_cycles: DEFAULT_MAX_CYCLES,
            toml: false,
        }
    }
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "run" => parse_run_args(args)
            .map(Command::Run)
            .map(ParseResult::Command),
        "disasm" => parse_disasm_args(args)
            .map(Command::Disasm)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn parse_count(flag: &str, value: Option<OsString>) -> Result<u64, String> {
    let value = value.ok_or_else(|| format!("missing value for {flag}"))?;
    value
        .to_string_lossy()
        .parse()
        .map_err(|_| format!("invalid count for {flag}: {}", value.to_string_lossy()))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut program: Option<PathBuf> = None;
    let mut parsed = RunArgs::new(PathBuf::new());

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "--help" | "-h" => return Err(USAGE_TEXT.to_string()),
            "--compact" => parsed.compact = true,
            "--strict" => parsed.strict = true,
            "--frame-ready" => parsed.frame_ready = true,
            "--toml" => parsed.toml = true,
            "-c" | "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for {flag}"))?;
                parsed.config = Some(PathBuf::from(value));
            }
            "-i" | "--image" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for {flag}"))?;
                parsed.image = Some(PathBuf::from(value));
            }
            "-l" | "--lines" => parsed.lines = parse_count(&flag, args.next())?,
            "--max-cycles" => parsed.max_cycles = parse_count(&flag, args.next())?,
            _ if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
            _ => {
                if program.is_some() {
                    return Err("multiple program paths provided".to_string());
                }
                program = Some(PathBuf::from(arg));
            }
        }
    }

    parsed.program = program.ok_or_else(|| "missing program path".to_string())?;
    Ok(parsed)
}

fn parse_disasm_args(args: impl Iterator<Item = OsString>) -> Result<PathBuf, String> {
    let mut input: Option<PathBuf> = None;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if input.is_some() {
            return Err("multiple program paths provided".to_string());
        }
        input = Some(PathBuf::from(arg));
    }

    input.ok_or_else(|| "missing program path".to_string())
}

fn build_system(args: &RunArgs) -> Result<System, String> {
    let preset = if args.compact {
        Preset::Compact
    } else {
        Preset::Xga
    };
    let mut config = match &args.config {
        Some(path) => load_config(path, preset).map_err(|e| report_load_error(path, &e))?,
        None => preset.config(),
    };
    if args.strict {
        config.strict_decode = true;
    }

    let program = load_program(&args.program).map_err(|e| e.to_string())?;
    let image = match &args.image {
        Some(path) => load_image(path).map_err(|e| e.to_string())?,
        None => MemoryImage::new(),
    };

    let mut system = System::new(config, program, &image).map_err(|e| e.to_string())?;
    system.context_mut().set_frame_ready(args.frame_ready);
    Ok(system)
}

fn report_load_error(path: &Path, error: &LoadError) -> String {
    match error {
        LoadError::Io { .. } => error.to_string(),
        _ => format!("{}: {error}", path.display()),
    }
}

fn run_phases(system: &mut System, args: &RunArgs) -> Result<(), SimError> {
    let outcome = system.run(RunBoundary::ProcessorHalted, args.max_cycles)?;
    if outcome.stop == StopReason::CycleLimit {
        log::warn!(
            "processor still running after {} memory cycles",
            outcome.memory_cycles
        );
    }
    if args.lines > 0 {
        let outcome = system.run(RunBoundary::LinesScanned(args.lines), args.max_cycles)?;
        if outcome.stop == StopReason::CycleLimit {
            log::warn!(
                "cycle limit reached before {} lines were scanned",
                args.lines
            );
        }
    }
    Ok(())
}

fn run(args: &RunArgs) -> Result<(), i32> {
    let mut system = build_system(args).map_err(|error| {
        eprintln!("error: {error}");
        1
    })?;

    let result = run_phases(&mut system, args);
    if let Err(error) = &result {
        eprintln!("error: {error}");
    }

    print!("{}", format_registers(system.registers()));
    println!();
    let diagnostics = system.diagnostics();
    if args.toml {
        match diagnostics_toml(&diagnostics) {
            Ok(text) => print!("{text}"),
            Err(error) => {
                eprintln!("error: failed to render counters: {error}");
                return Err(1);
            }
        }
    } else {
        print!("{}", format_diagnostics(&diagnostics));
    }

    result.map_err(|_| 1)
}

fn run_disasm(path: &Path) -> Result<(), i32> {
    let program = load_program(path).map_err(|error| {
        eprintln!("error: {error}");
        1
    })?;
    print!("{}", format_listing(&disassemble(program.words())));
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Run(args))) => match run(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::Disasm(path))) => match run_disasm(&path) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> std::vec::IntoIter<OsString> {
        let owned: Vec<OsString> = list.iter().map(OsString::from).collect();
        owned.into_iter()
    }

    #[test]
    fn parses_run_command_with_options() {
        let result = parse_run_args(args(&[
            "prog.hex",
            "--config",
            "sim.toml",
            "-i",
            "fb.img",
            "--compact",
            "--lines",
            "16",
            "--toml",
        ]))
        .expect("valid run args should parse");

        assert_eq!(
            result,
            RunArgs {
                config: Some(PathBuf::from("sim.toml")),
                image: Some(PathBuf::from("fb.img")),
                compact: true,
                lines: 16,
                toml: true,
                ..RunArgs::new(PathBuf::from("prog.hex"))
            }
        );
    }

    #[test]
    fn parses_disasm_command() {
        let result = parse_args(args(&["disasm", "prog.hex"])).expect("valid");
        assert!(matches!(
            result,
            ParseResult::Command(Command::Disasm(path)) if path.as_path() == Path::new("prog.hex")
        ));
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(args(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(args(&["build"])).expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn rejects_bad_count() {
        let error = parse_run_args(args(&["prog.hex", "--lines", "many"])).expect_err("bad count");
        assert!(error.contains("invalid count for --lines"));
    }

    #[test]
    fn run_requires_program() {
        let error = parse_run_args(args(&["--strict"])).expect_err("missing program");
        assert!(error.contains("missing program"));
    }

    #[test]
    fn disasm_rejects_options() {
        let error = parse_disasm_args(args(&["--strict"])).expect_err("no options");
        assert!(error.contains("unknown option"));
    }
}
