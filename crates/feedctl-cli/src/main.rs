use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use feedctl::auth::resolve_api_key;
use feedctl::feed::HttpConnector;
use feedctl::package::find_package;
use feedctl::registry::ConfigRegistry;
use feedctl::{
    PackagePublisher, PublishRequest, Reporter, RequestObserver, SourceCommandSpec,
    SourceRegistryProcessor,
};
use feedctl_config::{load_config, resolve_config_path};

#[derive(Parser, Debug)]
#[command(name = "feedctl", version)]
#[command(about = "Manage package feed sources and push packages to remote feeds")]
struct Cli {
    /// Configuration file (default: $FEEDCTL_CONFIG, then ~/.feedctl/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print every outbound HTTP request.
    #[arg(long, global = true)]
    verbose: bool,

    /// Report what would be done without changing anything.
    #[arg(long, global = true)]
    noop: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List, add, remove, disable or enable package sources.
    #[command(after_help = SourceRegistryProcessor::help_message())]
    Source(SourceArgs),
    /// Push a package archive to a feed.
    Push(PushArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// list (default), add, remove, disable or enable
    #[arg(value_name = "COMMAND")]
    command: Vec<String>,

    /// Name of the source.
    #[arg(short, long)]
    name: Option<String>,

    /// Feed URL or file-system location.
    #[arg(short, long, default_value = "")]
    source: String,

    /// User name for an authenticated feed.
    #[arg(short, long = "user")]
    user: Option<String>,

    /// Password for an authenticated feed. Stored encrypted.
    #[arg(short, long)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct PushArgs {
    /// Package archive. Defaults to the single .nupkg in the current directory.
    package: Option<PathBuf>,

    /// Target feed; several may be separated by ',' or ';'. Defaults to push.default_source.
    #[arg(short, long)]
    source: Option<String>,

    /// API key. Defaults to FEEDCTL_API_KEY_<FEED>, then FEEDCTL_API_KEY.
    #[arg(short, long)]
    key: Option<String>,

    /// Upload timeout in seconds; 0 means the default of 300.
    #[arg(short, long, allow_negative_numbers = true)]
    timeout: Option<i64>,
}

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut reporter = CliReporter;

    match run(&cli, &mut reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            reporter.error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, reporter: &mut CliReporter) -> Result<()> {
    match &cli.cmd {
        Commands::Source(args) => source(cli, args, reporter),
        Commands::Push(args) => push(cli, args, reporter),
    }
}

fn source(cli: &Cli, args: &SourceArgs, reporter: &mut CliReporter) -> Result<()> {
    let processor = SourceRegistryProcessor::new();
    let spec = processor.prepare(
        &args.command,
        SourceCommandSpec {
            name: args.name.clone(),
            source: args.source.clone(),
            username: args.user.clone(),
            password: args.password.clone(),
            ..Default::default()
        },
    )?;

    let config_path = resolve_config_path(cli.config.as_deref())?;
    let mut stdout = io::stdout().lock();
    let mut registry = ConfigRegistry::open(&config_path, &mut stdout, reporter)?;
    processor.execute(&spec, &mut registry, cli.noop)
}

fn push(cli: &Cli, args: &PushArgs, reporter: &mut CliReporter) -> Result<()> {
    let config_path = resolve_config_path(cli.config.as_deref())?;
    let config = load_config(&config_path)?;

    let feeds = args
        .source
        .as_deref()
        .or(config.push().default_source.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let Some(feeds) = feeds else {
        bail!("no push source; pass --source or set push.default_source in {}", config_path.display());
    };

    let package_path = match &args.package {
        Some(path) => path.clone(),
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            find_package(&cwd)?
        }
    };

    if cli.noop {
        reporter.info(&format!(
            "Would have attempted to push {} to source {feeds}",
            package_path.display()
        ));
        return Ok(());
    }

    let api_key = resolve_api_key(args.key.as_deref(), &feeds)?
        .context("no API key; pass --key or set FEEDCTL_API_KEY")?;
    if cli.verbose {
        reporter.info(&format!("using API key from {}", api_key.source));
    }

    let request = PublishRequest {
        target_feeds: feeds,
        api_key: api_key.key,
        timeout_seconds: args.timeout.or(config.push().timeout_secs),
        package_path,
        verbose: cli.verbose,
    };

    let observer: RequestObserver = Arc::new(|method: &str, uri: &str| {
        eprintln!("[verbose] {method} {uri}");
    });
    let publisher = PackagePublisher::new(HttpConnector, observer);
    publisher.publish(&request, reporter)?;

    Ok(())
}
