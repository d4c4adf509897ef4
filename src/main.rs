//! Stratus CLI entrypoint.
//!
//! This is the main entrypoint for the stratus command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use stratus_deploy::cli::{Cli, Commands, OutputFormatter};
use stratus_deploy::config::{
    ConfigParser, ConfigValidator, SpecHasher, StackConfig, find_config_file,
};
use stratus_deploy::error::Result;
use stratus_deploy::graph::Executor;
use stratus_deploy::provider::{CloudClient, CloudProvisioner};
use stratus_deploy::stack::web_server_stack;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Plan { detailed } => cmd_plan(cli.config.as_ref(), detailed, &formatter),
        Commands::Apply { yes, concurrency } => {
            cmd_apply(cli.config.as_ref(), yes, concurrency, &formatter).await
        }
        Commands::Destroy { yes } => cmd_destroy(cli.config.as_ref(), yes, &formatter).await,
    }
}

/// Initialize a new project.
fn cmd_init(path: &PathBuf, force: bool) -> Result<()> {
    info!("Initializing new Stratus project in: {}", path.display());

    let config_path = path.join("stratus.stack.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    if !force && config_path.exists() {
        eprintln!("Stack file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    let config_template = include_str!("../templates/stratus.stack.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    if !gitignore_path.exists() {
        std::fs::write(&gitignore_path, ".env\n")?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nProject initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in your credentials");
    eprintln!("  2. Edit stratus.stack.yaml with your deployment settings");
    eprintln!("  3. Run 'stratus validate' to check your configuration");
    eprintln!("  4. Run 'stratus plan' to see what will be deployed");
    eprintln!("  5. Run 'stratus apply' to deploy");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;

    let validator = ConfigValidator::new();
    let result = validator.validate(&config)?;

    eprintln!("{}", formatter.format_validation(&result, show_warnings));

    let hasher = SpecHasher::new();
    eprintln!("Stack summary:");
    eprintln!("  Project: {}", config.qualified_name());
    eprintln!("  Location: {}", config.location);
    eprintln!("  VM size: {}", config.vm.size);
    eprintln!(
        "  Fingerprint: {}",
        hasher.short_hash(&hasher.hash_stack(&config))
    );

    Ok(())
}

/// Show the deployment plan.
fn cmd_plan(
    config_path: Option<&PathBuf>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    ConfigValidator::new().validate(&config)?;

    let evaluator = web_server_stack(&config)?;
    let plan = evaluator.build_plan()?;

    eprintln!("{}", formatter.format_plan(&plan, detailed));
    Ok(())
}

/// Execute the deployment plan.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    concurrency: Option<usize>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    ConfigValidator::new().validate(&config)?;

    let evaluator = web_server_stack(&config)?;
    let plan = evaluator.build_plan()?;

    eprintln!("{}", formatter.format_plan(&plan, false));

    if !auto_approve && !confirm("Apply this plan?")? {
        eprintln!("Apply cancelled.");
        return Ok(());
    }

    let executor = build_executor(&config)?
        .with_concurrency(concurrency.unwrap_or(config.settings.concurrency));
    let result = executor.execute(&plan).await?;

    eprintln!("{}", formatter.format_execution(&result));

    if result.success {
        Ok(())
    } else {
        Err(stratus_deploy::StratusError::internal(
            "apply completed with failures",
        ))
    }
}

/// Destroy the deployment.
async fn cmd_destroy(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;

    let evaluator = web_server_stack(&config)?;
    let plan = evaluator.build_plan()?;

    eprintln!(
        "This will delete {} resources of project '{}'.",
        plan.len(),
        config.qualified_name()
    );

    if !auto_approve && !confirm("Destroy all resources?")? {
        eprintln!("Destroy cancelled.");
        return Ok(());
    }

    let executor = build_executor(&config)?.with_concurrency(config.settings.concurrency);
    let result = executor.destroy(&plan).await?;

    eprintln!("{}", formatter.format_execution(&result));

    if result.success {
        Ok(())
    } else {
        Err(stratus_deploy::StratusError::internal(
            "destroy completed with failures",
        ))
    }
}

/// Loads and resolves the stack configuration.
fn load_config(config_path: Option<&PathBuf>) -> Result<StackConfig> {
    let config_file = resolve_config_path(config_path)?;

    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .unwrap_or_else(|| Path::new(".")),
    );
    parser.load_dotenv()?;
    parser.load(&config_file)
}

/// Resolves the stack file path from the CLI argument or by searching.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Builds the executor over the real control-plane provisioner.
fn build_executor(config: &StackConfig) -> Result<Executor> {
    let api_key = ConfigParser::get_api_key()?;
    let api_url = config
        .settings
        .api_url
        .clone()
        .unwrap_or_else(|| String::from(stratus_deploy::provider::DEFAULT_API_URL));

    let client = CloudClient::new(&api_key, &api_url)?;
    let provisioner = CloudProvisioner::new(client);
    Ok(Executor::new(Arc::new(provisioner)))
}

/// Asks the user for confirmation on stderr/stdin.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
