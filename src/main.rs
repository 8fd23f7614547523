//! `loam` command line front end.
//!
//! A thin wrapper over the library: it configures a runtime from flags and
//! the environment, then loads a module or script, lists modules, or turns a
//! coverage data directory into a report.

use std::{
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use tracing::debug;

use loam::{
    coverage::{self, CoverageError},
    diagnostics::render_error,
    runtime::{
        BootstrapPrecedence, ConfigError, Runtime, loader::LoadError,
        repository::RepositoryError, value::Value,
    },
};

#[derive(Parser, Debug)]
#[command(name = "loam")]
#[command(version, about = "Module runtime and coverage tools for loam")]
struct Cli {
    /// Repository directory, consulted in the order given
    #[arg(long = "repo", value_name = "DIR", global = true)]
    repos: Vec<PathBuf>,

    /// Tar archive repository, consulted after every --repo
    #[arg(long = "archive", value_name = "FILE", global = true)]
    archives: Vec<PathBuf>,

    /// Consult the built-in library before user repositories
    #[arg(long, global = true)]
    bootstrap_first: bool,

    /// Record coverage into this directory
    #[arg(long, value_name = "DIR", global = true)]
    coverage_data: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a `.loam` script, or load a module and print what it provides
    Load {
        /// Script file or module path such as `/app/main`
        target: String,
    },
    /// List every module the configured repositories offer
    Modules,
    /// Merge coverage data and write an HTML and JSON report
    ReportCoverage {
        data_dir: PathBuf,
        output_dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("{}", render_failure(&err));
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Load { target } => {
            let runtime = build_runtime(&cli)?;
            load(&runtime, target)?;
            runtime.flush_coverage()?;
        }
        Command::Modules => {
            let runtime = build_runtime(&cli)?;
            for module in runtime.collect_modules(&|_| true)? {
                println!("{module}");
            }
        }
        Command::ReportCoverage {
            data_dir,
            output_dir,
        } => report_coverage(data_dir, output_dir)?,
    }
    Ok(())
}

fn build_runtime(cli: &Cli) -> Result<Runtime, ConfigError> {
    let mut builder = Runtime::builder();
    for repo in &cli.repos {
        builder = builder.add_repository_directory(repo);
    }
    for archive in &cli.archives {
        builder = builder.add_archive(archive);
    }
    if cli.bootstrap_first {
        builder = builder.bootstrap_precedence(BootstrapPrecedence::Highest);
    }
    if let Some(dir) = &cli.coverage_data {
        builder = builder.coverage_data_dir(dir);
    }
    builder.with_env().build()
}

fn load(runtime: &Runtime, target: &str) -> anyhow::Result<()> {
    let path = Path::new(target);
    if path.extension().is_some_and(|ext| ext == "loam") || path.is_file() {
        debug!(script = %path.display(), "running script");
        let results = runtime.top_level()?.load_file(path)?;
        for value in results {
            println!("{value}");
        }
        return Ok(());
    }

    let module = runtime.load_path(target)?;
    println!("{}", Value::Struct(module.exports()));
    Ok(())
}

fn report_coverage(data_dir: &Path, output_dir: &Path) -> anyhow::Result<()> {
    let report = coverage::merge(data_dir)?;
    coverage::render(&report, output_dir)?;
    print!("{}", report.summary_text(coverage::colors_enabled()));
    let index = output_dir.join(coverage::HTML_FILE);
    println!("\nreport: {}", index.display());
    Ok(())
}

/// Coded errors render with their code and hint; anything else falls back to
/// the error chain.
fn render_failure(err: &anyhow::Error) -> String {
    if let Some(err) = err.downcast_ref::<LoadError>() {
        return err.render();
    }
    if let Some(err) = err.downcast_ref::<ConfigError>() {
        return err.render();
    }
    if let Some(err) = err.downcast_ref::<CoverageError>() {
        return err.render();
    }
    if let Some(err) = err.downcast_ref::<RepositoryError>() {
        return render_error(err.code(), &err.to_string());
    }
    format!("error: {err:#}")
}
