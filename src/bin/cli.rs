use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mldsl::catalog::HostData;
use mldsl::dsl::{self, Plan, Program};
use mldsl::paths;
use mldsl::settings::{self, CompilerSettings};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mldsl-cli", about = "mldsl compiler", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the host data files
    #[arg(long, global = true, env = "MLDSL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Compiler settings file (defaults to mldsl.json in the data directory)
    #[arg(long, global = true, env = "MLDSL_CONFIG")]
    config: Option<PathBuf>,

    /// Log lowering details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file into host commands
    Compile {
        file: PathBuf,
        /// Write the structured plan to this path instead of printing commands
        #[arg(long)]
        plan: Option<PathBuf>,
        /// Print the structured plan instead of commands
        #[arg(long)]
        print_plan: bool,
    },
    /// Print the JSON Schema of the structured plan
    Schema,
}

// ── Helpers ──────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let default = if verbose { "mldsl=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

fn load_inputs(data_dir: &Path, config: Option<&Path>) -> (CompilerSettings, HostData) {
    let config = config.map_or_else(|| paths::settings_path(data_dir), Path::to_path_buf);
    let settings = settings::load_settings(&config).unwrap_or_else(|e| fail(e));
    let host = HostData::load(data_dir, &settings.host).unwrap_or_else(|e| fail(e));
    (settings, host)
}

fn plan_json(plan: &Plan) -> String {
    serde_json::to_string_pretty(plan).unwrap_or_else(|e| fail(e))
}

fn emit(program: &Program, settings: &CompilerSettings, plan_path: Option<&Path>, print_plan: bool) {
    if let Some(path) = plan_path {
        let json = plan_json(&program.plan());
        std::fs::write(path, json + "\n").unwrap_or_else(|e| fail(format!("writing {}: {e}", path.display())));
        eprintln!("plan written to {} ({} units)", path.display(), program.units.len());
        return;
    }
    if print_plan {
        println!("{}", plan_json(&program.plan()));
        return;
    }
    match program.commands(settings.max_command_len) {
        Ok(commands) => {
            for command in commands {
                println!("{command}");
            }
        }
        Err(e) => fail(e),
    }
}

// ── Main ─────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Schema => {
            let schema = schemars::schema_for!(Plan);
            println!("{}", serde_json::to_string_pretty(&schema).unwrap_or_else(|e| fail(e)));
        }
        Commands::Compile { file, plan, print_plan } => {
            let data_dir = cli.data_dir.clone().unwrap_or_else(|| PathBuf::from("."));
            let (settings, host) = load_inputs(&data_dir, cli.config.as_deref());
            let program = match dsl::compile_file(file, &host, &settings) {
                Ok(program) => program,
                Err(e) => fail(e.format_with_source()),
            };
            emit(&program, &settings, plan.as_deref(), *print_plan);
        }
    }
}
