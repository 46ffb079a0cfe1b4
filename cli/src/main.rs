use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use kit_core::{BuildError, Engine, EngineConfig, Program, build, rt};
use tracing_subscriber::EnvFilter;


const DEFAULT_LOG_FILTER: &str = "kit::script=info,warn";

#[derive(Debug, Parser)]
#[command(name = "kit", author, version, about = "Run and inspect kit scripts", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Script to run when no subcommand is given
    #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
    file: Option<PathBuf>,

    #[command(flatten)]
    run: RunOpts,
}

#[derive(Debug, Clone, Default, Args)]
struct RunOpts {
    /// Engine settings (TOML)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Abandon the script after this many milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Print the energy used to stderr
    #[arg(long)]
    energy: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build and execute a script, printing its result.
    Run {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Parse and compile a script without running it.
    Check {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
    },
    /// Print the compiled bytecode.
    Disasm {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
    },
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);
    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        anyhow::bail!("parent directory components ('..') are not allowed in file paths");
    }
    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

/// `KIT_LOG` wins over `RUST_LOG`; blank values are ignored.
fn log_filter_expr(kit_log: Option<String>, rust_log: Option<String>) -> String {
    [kit_log, rust_log]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

fn init_tracing() {
    let expr = log_filter_expr(std::env::var("KIT_LOG").ok(), std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&expr).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read file '{}'", path.display()))
}

fn load_config(opts: &RunOpts) -> anyhow::Result<EngineConfig> {
    let mut config = match &opts.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if opts.timeout_ms.is_some() {
        config.timeout_ms = opts.timeout_ms;
    }
    Ok(config)
}

fn report_build_error(path: &Path, err: &BuildError) {
    for message in err.messages() {
        eprintln!("{}: {}", path.display(), message);
    }
}

/// `Ok(None)` means the errors were already reported.
fn build_file(path: &Path) -> anyhow::Result<Option<Program>> {
    let src = read_source(path)?;
    match build(&src) {
        Ok(program) => Ok(Some(program)),
        Err(err) => {
            report_build_error(path, &err);
            Ok(None)
        }
    }
}

fn run_file(path: &Path, opts: &RunOpts) -> anyhow::Result<bool> {
    let config = load_config(opts)?;
    let Some(program) = build_file(path)? else {
        return Ok(false);
    };
    let runtime = rt::shared_runtime()?;
    let engine = Engine::new(config)
        .with_globals(kit_stdlib::stdlib_globals(None)?)
        .with_spawner(runtime.clone());

    let outcome = engine.execute_with_timeout(&program, &runtime);
    if opts.energy {
        eprintln!("energy: {}", outcome.energy);
    }
    if let Some(err) = &outcome.error {
        eprintln!("Error: {}", err);
        return Ok(false);
    }
    if !outcome.value.is_nil() {
        println!("{}", outcome.value.text());
    }
    Ok(true)
}

fn check_file(path: &Path) -> anyhow::Result<bool> {
    let Some(program) = build_file(path)? else {
        return Ok(false);
    };
    let bytecode = program.bytecode();
    println!(
        "ok: {} bytes, {} constants, {} functions",
        bytecode.len(),
        bytecode.constants.len(),
        bytecode.entries.len()
    );
    Ok(true)
}

fn disasm_file(path: &Path) -> anyhow::Result<bool> {
    let Some(program) = build_file(path)? else {
        return Ok(false);
    };
    print!("{}", program.disassemble());
    Ok(true)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let ok = match (args.command, args.file) {
        (Some(Commands::Run { file, opts }), _) => run_file(&file, &opts)?,
        (Some(Commands::Check { file }), _) => check_file(&file)?,
        (Some(Commands::Disasm { file }), _) => disasm_file(&file)?,
        (None, Some(file)) => run_file(&file, &args.run)?,
        (None, None) => {
            eprintln!("Error: no script given (try `kit --help`)");
            false
        }
    };
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
