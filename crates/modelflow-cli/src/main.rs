use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use modelflow_core::{Config, ExecutionResult, NodeStatus, RunArgs, CONFIG_FILE_NAME};
use modelflow_engine::{Command, FileExecutor, Materialization, RunTask};
use modelflow_graph::{Manifest, Project};
use modelflow_plugin::{builtin_registry, ResultWriters, DEFAULT_PLUGIN};

/// modelflow - build SQL models in dependency order
#[derive(Parser)]
#[command(name = "modelflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory (default: current directory)
    #[arg(short, long, global = true)]
    project_dir: Option<PathBuf>,

    /// Path to config file (default: <project-dir>/modelflow.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build table, view, incremental and ephemeral models
    Run(RunOptions),

    /// Build every built-in materialization
    Build(RunOptions),

    /// Build seed models
    Seed(RunOptions),

    /// Build snapshot models
    Snapshot(RunOptions),

    /// Run test models
    Test(RunOptions),

    /// Render models without executing them
    Compile(RunOptions),

    /// List models in dependency order
    Ls {
        #[command(flatten)]
        selection: Selection,
    },

    /// List registered plugins
    Plugins,
}

#[derive(Args, Debug, Clone, Default)]
struct Selection {
    /// Models to include (`name`, `+name`, `name+`, `*`)
    #[arg(short, long, num_args = 1..)]
    select: Vec<String>,

    /// Models to leave out
    #[arg(long, num_args = 1..)]
    exclude: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct RunOptions {
    #[command(flatten)]
    selection: Selection,

    /// Maximum number of models built at once (default: target.threads)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Stop after the first failure
    #[arg(short = 'x', long)]
    fail_fast: bool,

    /// Result writer plugin (default: run.result_writer)
    #[arg(short, long)]
    writer: Option<String>,

    /// Where the result writer writes (default: target/<writer>.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Notification recipient, repeatable
    #[arg(long)]
    notify: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = load_config(cli.project_dir.as_deref(), cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Run(options) => run_command(config, Command::Run, options, cli.verbose).await,
        Commands::Build(options) => run_command(config, Command::Build, options, cli.verbose).await,
        Commands::Seed(options) => run_command(config, Command::Seed, options, cli.verbose).await,
        Commands::Snapshot(options) => run_command(config, Command::Snapshot, options, cli.verbose).await,
        Commands::Test(options) => run_command(config, Command::Test, options, cli.verbose).await,
        Commands::Compile(options) => run_command(config, Command::Compile, options, cli.verbose).await,
        Commands::Ls { selection } => ls_command(config, &selection),
        Commands::Plugins => {
            plugins_command();
            Ok(())
        }
    }
}

/// Resolve the project config from flags
fn load_config(project_dir: Option<&Path>, config_path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = match config_path {
        Some(path) => {
            let mut config = Config::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            // Defaults to the config file's directory
            if let Some(dir) = project_dir {
                config.project_root = dir.to_path_buf();
            }
            config
        }
        None => {
            let project_dir = project_dir.unwrap_or_else(|| Path::new("."));
            if verbose && !project_dir.join(CONFIG_FILE_NAME).exists() {
                eprintln!("{}", "No config file found, using defaults".yellow());
            }
            Config::discover(project_dir)
                .with_context(|| format!("Failed to load {}", project_dir.join(CONFIG_FILE_NAME).display()))?
        }
    };

    if verbose {
        eprintln!("{} {} ({})", "Project:".cyan(), config.name, config.project_root.display());
    }

    Ok(config)
}

fn load_project(config: Config) -> Result<Project> {
    let root = config.project_root.clone();
    Project::load(config).with_context(|| format!("Failed to load project at {}", root.display()))
}

/// run, build, seed, snapshot, test and compile
async fn run_command(config: Config, command: Command, options: RunOptions, verbose: bool) -> Result<()> {
    let (result, output) = execute_run(config, command, options, verbose).await?;
    print_run_summary(&result, &output);

    let code = exit_code(&result);
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}

/// Process exit status for a finished run
fn exit_code(result: &ExecutionResult) -> i32 {
    if result.success() {
        0
    } else {
        1
    }
}

/// Load, compile and execute the project, then persist results with the chosen writer
///
/// Returns the run and the path the writer wrote to.
async fn execute_run(
    config: Config,
    command: Command,
    options: RunOptions,
    verbose: bool,
) -> Result<(ExecutionResult, PathBuf)> {
    let target_dir = config.target_dir();
    let writer_name = options
        .writer
        .clone()
        .unwrap_or_else(|| config.run.result_writer.clone());
    let args = RunArgs {
        command: command.to_string(),
        select: options.selection.select.clone(),
        exclude: options.selection.exclude.clone(),
        threads: options.threads.unwrap_or(0),
        fail_fast: options.fail_fast || config.run.fail_fast,
        target: config.target.name.clone(),
        notify: if options.notify.is_empty() {
            config.run.notify.clone()
        } else {
            options.notify.clone()
        },
    };

    // Resolve the writer before doing any work
    let writer = builtin_registry()
        .get_pluggable::<ResultWriters>(&writer_name)
        .with_context(|| format!("Available writers: {}", builtin_registry().names("result_writers").join(", ")))?;

    tracing::debug!(command = %command, writer = %writer_name, "starting");
    let project = load_project(config)?;

    let manifest_path = target_dir.join("manifest.json");
    Manifest::from_project(&project)
        .save_to_file(&manifest_path)
        .context("Failed to write manifest")?;
    if verbose {
        eprintln!("{} {}", "Wrote manifest:".cyan(), manifest_path.display());
    }

    let task = RunTask::new(&project, args)?;
    let selected = task.select()?;
    let compiled = task.compile();
    compiled
        .write_compiled(&target_dir.join("compiled"))
        .context("Failed to write compiled models")?;

    let executor = Arc::new(FileExecutor::new(target_dir.join("run")));
    let result = task.execute_compiled(executor, &compiled, &selected).await?;

    let output = options
        .output
        .unwrap_or_else(|| default_output(&target_dir, &writer_name));
    writer
        .write(&result, &output)
        .with_context(|| format!("Result writer '{}' failed", writer_name))?;

    Ok((result, output))
}

fn default_output(target_dir: &Path, writer_name: &str) -> PathBuf {
    if writer_name == DEFAULT_PLUGIN {
        target_dir.join("run_results.json")
    } else {
        target_dir.join(format!("{}.json", writer_name))
    }
}

/// List models in dependency order
fn ls_command(config: Config, selection: &Selection) -> Result<()> {
    let project = load_project(config)?;
    let selected = modelflow_graph::select_nodes(&project, &selection.select, &selection.exclude)?;
    let order = project
        .graph()
        .topological_sort()
        .context("Project graph contains a cycle")?;

    for unique_id in order.iter().filter(|id| selected.contains(*id)) {
        let Some(model) = project.get(unique_id) else {
            continue;
        };
        let materialization = Materialization::from(model.materialized.as_str());
        println!(
            "{} {} {}",
            unique_id,
            format!("[{}]", materialization).dimmed(),
            model.path.display().to_string().dimmed()
        );
    }

    Ok(())
}

fn plugins_command() {
    let registry = builtin_registry();
    for group in registry.groups() {
        println!("{}", group.bold());
        for name in registry.names(group) {
            println!("  {}", name);
        }
    }
}

/// Print run summary to stdout
fn print_run_summary(result: &ExecutionResult, output: &Path) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", format!("modelflow {}", result.args.command).bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    for node in &result.results {
        let status = match node.status {
            NodeStatus::Success => "OK".green().bold(),
            NodeStatus::Error => "ERROR".red().bold(),
            NodeStatus::Skipped => "SKIP".yellow(),
            NodeStatus::Pending | NodeStatus::Running => "?".normal(),
        };

        print!("  [{}] {}", status, node.unique_id);
        if node.execution_time > 0.0 {
            print!(" {}", format!("({:.2}s)", node.execution_time).dimmed());
        }
        println!();

        if node.status != NodeStatus::Success {
            if let Some(message) = &node.message {
                println!("    {}", message);
            }
        }
    }

    let summary = result.summary();
    println!();
    println!("{}", "Summary:".bold());
    println!("  Total:    {}", summary.total);
    println!("  Success:  {}", format!("{}", summary.success).green());
    if summary.error > 0 {
        println!("  Errors:   {}", format!("{}", summary.error).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", summary.error).green());
    }
    println!("  Skipped:  {}", summary.skipped);
    println!("  Elapsed:  {:.2}s", result.elapsed_time);
    println!();

    if result.success() {
        println!("{}", "✓ Completed successfully".green().bold());
    } else {
        println!("{}", "✗ Completed with errors".red().bold());
    }
    println!("Results written to {}", output.display());
    println!("{}", "=".repeat(60).bright_blue());
}
