use anyhow::Context;
use clap::{ColorChoice, Parser, ValueEnum};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};

use concolic_executor::{explore, explore_symbolic, ExecConfig, ExplorationReport, StateReport};

const ABOUT: &str = r#"
Explore every path of a WLang program.

The concolic engine pairs each path with a concrete witness and finishes
loops concretely once the unroll bound is reached. The symbolic engine
drops paths that need more iterations than the bound.

Examples:
  # Concolic exploration with the default bound of 10
  wlang program.wl

  # Pure symbolic exploration, JSON report
  wlang --engine symbolic --json program.wl

  # Dump each terminal state's solver assertions
  wlang --smt2 --unroll-bound 3 program.wl
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Engine {
    Concolic,
    Symbolic,
}

#[derive(Parser)]
#[command(name = "wlang")]
#[command(about = "Concolic and symbolic explorer for WLang programs")]
#[command(long_about = ABOUT)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
#[command(styles = get_styles())]
struct Cli {
    /// WLang source file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Execution engine
    #[arg(long, value_enum, default_value_t = Engine::Concolic)]
    engine: Engine,

    /// Symbolic loop unrollings per `while`
    #[arg(long, env = "WLANG_UNROLL_BOUND", default_value_t = 10, value_name = "N")]
    unroll_bound: usize,

    /// Maximum loop iterations for a concrete run
    #[arg(long, env = "WLANG_FUEL", default_value_t = 1_000_000, value_name = "N")]
    fuel: u64,

    /// Per-query solver timeout
    #[arg(long, env = "WLANG_TIMEOUT_MS", value_name = "MS")]
    timeout_ms: Option<u32>,

    /// Concrete value assigned by `havoc`
    #[arg(long, default_value_t = 0, allow_negative_numbers = true, value_name = "N")]
    havoc_value: i64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Print each state's solver assertions in SMT-LIB format
    #[arg(long)]
    smt2: bool,

    /// Verbose output mode
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn exec_config(&self) -> ExecConfig {
        ExecConfig {
            unroll_bound: self.unroll_bound,
            concrete_fuel: self.fuel,
            solver_timeout_ms: self.timeout_ms,
            havoc_value: self.havoc_value,
        }
    }
}

fn get_styles() -> clap::builder::Styles {
    use clap::builder::styling::*;

    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default().bold())
        .usage(AnsiColor::BrightCyan.on_default().bold())
        .literal(AnsiColor::BrightGreen.on_default())
        .placeholder(AnsiColor::BrightYellow.on_default())
        .valid(AnsiColor::BrightGreen.on_default())
        .invalid(AnsiColor::BrightRed.on_default())
        .error(AnsiColor::BrightRed.on_default().bold())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let program = wlang_syntax::parse_file(&cli.file)
        .with_context(|| format!("failed to load {}", cli.file.display()))?;
    debug!(file = %cli.file.display(), "parsed program:\n{}", program);

    let config = cli.exec_config();
    let report = match cli.engine {
        Engine::Concolic => explore(&program, &config, cli.smt2),
        Engine::Symbolic => explore_symbolic(&program, &config, cli.smt2),
    }
    .context("exploration aborted")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{}", json);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ExplorationReport) {
    let (valid, invalid) = report.partition();

    for state in &invalid {
        println!(
            "{} {}",
            "[exec]: invalid state reached".red().bold(),
            format!("({})", state.status).red()
        );
        print_state(state);
    }

    for state in &valid {
        println!("{}", "[exec]: valid state".green().bold());
        print_state(state);
    }

    println!(
        "{} {} total, {} valid, {} error, {} infeasible",
        "[exec]:".bold(),
        report.states.len(),
        report.valid.to_string().green(),
        report.errors.to_string().red(),
        report.infeasible.to_string().yellow()
    );
}

fn print_state(state: &StateReport) {
    print!("{}", state);
    if let Some(smt2) = &state.smt2 {
        println!("{}", "SMT-LIB:".dimmed());
        print!("{}", smt2);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_map_to_config() {
        let cli = Cli::parse_from([
            "wlang",
            "--unroll-bound",
            "3",
            "--fuel",
            "99",
            "--timeout-ms",
            "250",
            "--havoc-value",
            "-4",
            "--engine",
            "symbolic",
            "prog.wl",
        ]);
        let config = cli.exec_config();
        assert_eq!(config.unroll_bound, 3);
        assert_eq!(config.concrete_fuel, 99);
        assert_eq!(config.solver_timeout_ms, Some(250));
        assert_eq!(config.havoc_value, -4);
        assert_eq!(cli.engine, Engine::Symbolic);
        assert!(!cli.json);
    }
}
