use anyhow::{format_err, Result};
use clap::{Args, Parser, Subcommand};
use powers_bridge::{load_network, Gateway, ProcessGate, SolveRequest, SolverMode};
use std::path::PathBuf;

/// Diagnostic dumps and external solve/learn hooks for a power flow solver.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Solver configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configuration and import the solver module
    Check,

    /// Write the bus and branch dump files
    Dump(DumpArgs),

    /// Run one solve pass through the solver module
    Solve(SolveArgs),
}

#[derive(Args)]
struct DumpArgs {
    /// Network snapshot (JSON)
    #[arg(required = true)]
    input: PathBuf,

    /// Use busdump.csv and branchdump.csv when no dump file is configured.
    #[arg(long, default_value_t = false)]
    generic: bool,
}

#[derive(Args)]
struct SolveArgs {
    /// Network snapshot (JSON)
    #[arg(required = true)]
    input: PathBuf,

    /// Run the learn pass after solving.
    #[arg(long, default_value_t = false)]
    learn: bool,

    /// Solver mode: normal, dyncalc or dyninit.
    #[arg(long, default_value_t = SolverMode::Normal)]
    mode: SolverMode,
}

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let mut gateway = Gateway::new(ProcessGate::new(), cli.config.clone());

    match &cli.command {
        Commands::Check => {
            let rc = gateway.init();
            println!("{} (rc = {})", gateway.status(), rc);
            if rc != 0 {
                return Err(format_err!("solver is not ready"));
            }
        }
        Commands::Dump(args) => {
            let network = load_network(&args.input)?;
            gateway.init();
            let summary = gateway.dump(&network.buses, &network.branches, args.generic)?;
            println!(
                "{}: {} buses",
                summary.bus.path.display(),
                summary.bus.rows
            );
            println!(
                "{}: {} branches",
                summary.branch.path.display(),
                summary.branch.rows
            );
        }
        Commands::Solve(args) => {
            let network = load_network(&args.input)?;
            let rc = gateway.init();
            if rc != 0 {
                return Err(format_err!("solver is {} (rc = {})", gateway.status(), rc));
            }
            let request = SolveRequest::new(&network.buses, &network.branches).mode(args.mode);
            let iterations = gateway.solve(&request);
            if iterations < 0 {
                return Err(format_err!("solve did not run"));
            }
            println!("iterations: {}", iterations);
            if args.learn {
                gateway.learn(&request.iterations(iterations as i64));
            }
        }
    }

    Ok(())
}
