mod error;
mod problem;

use clap::{Parser, Subcommand, ValueEnum};
use omsi_core::Status;
use omsi_solver::SolverKind;
use omsi_system::{LogCategory, RuntimeContext, SolverSettings};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

use error::CliResult;
use problem::{LoopFile, SolveReport, solve_loop};

#[derive(Parser)]
#[command(name = "omsi-cli")]
#[command(about = "Solve algebraic loops with the OMSI solver backends", long_about = None)]
struct Cli {
    /// Increase log output (-v debug, -vv trace with matrix dumps)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the loop described in a YAML or JSON file
    Solve {
        /// Path to the loop file
        path: PathBuf,
        /// Backend override
        #[arg(long, value_enum)]
        solver: Option<SolverArg>,
        /// Residual tolerance for accepting the solution
        #[arg(long)]
        tolerance: Option<f64>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the default solver settings as YAML
    Settings,
}

#[derive(Clone, Copy, ValueEnum)]
enum SolverArg {
    DenseDirect,
    TotalPivot,
    Newton,
}

impl From<SolverArg> for SolverKind {
    fn from(arg: SolverArg) -> Self {
        match arg {
            SolverArg::DenseDirect => SolverKind::DenseDirect,
            SolverArg::TotalPivot => SolverKind::TotalPivot,
            SolverArg::Newton => SolverKind::Newton,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Solve {
            path,
            solver,
            tolerance,
            json,
        } => cmd_solve(&path, solver, tolerance, json, cli.verbose),
        Commands::Settings => cmd_settings().map(|()| Status::Ok),
    };

    match result {
        Ok(Status::Ok) => ExitCode::SUCCESS,
        Ok(Status::Warning) => ExitCode::from(1),
        Ok(Status::Fatal) => ExitCode::from(2),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn cmd_solve(
    path: &Path,
    solver: Option<SolverArg>,
    tolerance: Option<f64>,
    json: bool,
    verbose: u8,
) -> CliResult<Status> {
    let file = LoopFile::load(path)?;
    let mut settings = file.settings.clone().unwrap_or_default();
    if let Some(solver) = solver {
        settings.linear_solver = solver.into();
    }
    if let Some(tol) = tolerance {
        settings.system_tolerance = tol;
    }

    let mut runtime = RuntimeContext::new(path.display().to_string(), settings);
    if verbose >= 2 {
        for category in [
            LogCategory::Setup,
            LogCategory::Jacobian,
            LogCategory::Linear,
            LogCategory::Nonlinear,
        ] {
            runtime = runtime.with_logging(category);
        }
    }

    let report = solve_loop(&file, &runtime)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(report.status)
}

fn print_report(report: &SolveReport) {
    let mark = match report.status {
        Status::Ok => "✓",
        Status::Warning => "!",
        Status::Fatal => "✗",
    };
    println!("{mark} {} [{}]: {}", report.name, report.solver, report.status);
    for (i, x) in report.solution.iter().enumerate() {
        println!("  x[{i}] = {x:.12}");
    }
    println!("  ||Ax - b|| = {:.3e}", report.residual_norm);
    println!(
        "  solves: {}, failures: {}",
        report.stats.solves, report.stats.failures
    );
}

fn cmd_settings() -> CliResult<()> {
    print!("{}", serde_yaml::to_string(&SolverSettings::default())?);
    Ok(())
}
