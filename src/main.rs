use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use ebbgen::flow_graph::GraphInput;
use ebbgen::minimal::{BillingRelevance, OverridePolicy};
use ebbgen::{GenError, RenderOptions, describe, renderer};

#[derive(Parser)]
#[command(
    name = "ebbgen",
    version,
    about = "Generate validation models and example records from billing DDL"
)]
struct Cli {
    /// Log more (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the full and minimal example report for each table
    Examples {
        /// DDL file (reads from stdin if not provided)
        file: Option<PathBuf>,

        /// Only this table (repeatable)
        #[arg(long = "table", short = 't')]
        tables: Vec<String>,

        /// JSON object mapping table names to minimal field lists
        #[arg(long)]
        minimal_overrides: Option<PathBuf>,
    },

    /// Print a field table for each generated model
    Describe {
        /// DDL file (reads from stdin if not provided)
        file: Option<PathBuf>,

        /// Only this table (repeatable)
        #[arg(long = "table", short = 't')]
        tables: Vec<String>,

        /// JSON object mapping table names to minimal field lists
        #[arg(long)]
        minimal_overrides: Option<PathBuf>,
    },

    /// Validate records against their models and print the flow graph as JSON
    Graph {
        /// Records and edges, as {"records": [...], "edges": [...]}
        #[arg(long)]
        records: PathBuf,

        /// DDL file (reads from stdin if not provided)
        file: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR: {e}");
            exit_code(&e)
        }
    }
}

fn run(command: Command) -> Result<ExitCode, GenError> {
    match command {
        Command::Examples {
            file,
            tables,
            minimal_overrides,
        } => {
            let input = read_input(file.as_deref())?;
            let options = options(tables, minimal_overrides.as_deref())?;
            emit(&input, &options, renderer::report)
        }
        Command::Describe {
            file,
            tables,
            minimal_overrides,
        } => {
            let input = read_input(file.as_deref())?;
            let options = options(tables, minimal_overrides.as_deref())?;
            emit(&input, &options, |model| Ok(describe::describe(model)))
        }
        Command::Graph { records, file } => {
            let input = read_input(file.as_deref())?;
            let graph_input = GraphInput::from_json(&read_file(&records)?)?;
            let graph = ebbgen::generate_flow_graph(&input, &graph_input)?;
            println!("{}", graph.to_json()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Print every model that generated; report failures and exit with the first
/// failure's code.
fn emit(
    input: &str,
    options: &RenderOptions,
    show: impl Fn(&ebbgen::GeneratedModel) -> Result<String, GenError>,
) -> Result<ExitCode, GenError> {
    let mut first_failure = None;
    for outcome in ebbgen::generate_models(input, options)? {
        match outcome.result.and_then(|model| show(&model)) {
            Ok(text) => print!("{text}"),
            Err(e) => {
                eprintln!("ERROR: {}: {e}", outcome.table);
                if first_failure.is_none() {
                    first_failure = Some(exit_code(&e));
                }
            }
        }
    }
    Ok(first_failure.unwrap_or(ExitCode::SUCCESS))
}

fn options(tables: Vec<String>, overrides: Option<&Path>) -> Result<RenderOptions, GenError> {
    let policy: Box<dyn ebbgen::minimal::MinimalFieldPolicy> = match overrides {
        Some(path) => Box::new(OverridePolicy::from_file(path, BillingRelevance)?),
        None => Box::new(BillingRelevance),
    };
    Ok(RenderOptions { tables, policy })
}

fn read_input(file: Option<&Path>) -> Result<String, GenError> {
    match file {
        Some(path) => read_file(path),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|source| GenError::Io {
                    path: PathBuf::from("<stdin>"),
                    source,
                })?;
            Ok(buf)
        }
    }
}

fn read_file(path: &Path) -> Result<String, GenError> {
    std::fs::read_to_string(path).map_err(|source| GenError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn exit_code(e: &GenError) -> ExitCode {
    ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
}
