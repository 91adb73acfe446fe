use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use aptly_config::{Config, find_config, load_config_from_file};
use aptly_publish::pipeline::{self, PipelinePlan};
use aptly_publish::{
    ApiResult, AptlyClient, PublishTarget, RepoTarget, Reporter, UploadBatch,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Root prefix used when neither `--prefix` nor `[publish] prefix` is set.
const ROOT_PREFIX: &str = ".";

#[derive(Parser, Debug)]
#[command(name = "aptly-publish", version)]
#[command(
    about = "Upload, register and publish Debian packages through the Aptly API"
)]
struct Cli {
    /// Path to the config file (default: nearest .aptly.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Aptly API base URL, e.g. https://aptly.example.com
    #[arg(long, global = true)]
    url: Option<String>,

    /// User for HTTP basic auth. The password is read from APTLY_PASSWORD or the config file.
    #[arg(long, global = true)]
    username: Option<String>,

    /// Accept any TLS certificate from the server.
    #[arg(long, global = true)]
    trust_self_signed: bool,

    /// Debug-level diagnostics on stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the Aptly server version.
    Version,
    /// Upload package files into an upload directory.
    Upload {
        /// Upload directory on the server (default: generated)
        #[arg(long)]
        dir: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Add the files of an upload directory to a local repository.
    Add {
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        dir: String,
        /// Replace packages that already exist in the repository.
        #[arg(long)]
        force_replace: bool,
    },
    /// Update a published distribution.
    Publish {
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        distribution: Option<String>,
        /// Overwrite files already in the published pool.
        #[arg(long)]
        force_overwrite: bool,
    },
    /// Upload, add and publish in one go.
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Upload directory on the server (default: generated)
        #[arg(long)]
        dir: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        distribution: Option<String>,
        #[arg(long)]
        force_replace: bool,
        #[arg(long)]
        force_overwrite: bool,
        /// Do not query the server version first.
        #[arg(long)]
        skip_version_check: bool,
    },
    /// Print the effective configuration with secrets masked.
    Config,
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

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (config_file, mut config) = load_effective_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);

    let mut reporter = CliReporter;

    match cli.cmd {
        Commands::Version => {
            let client = client(&config)?;
            let version = client.server_version(&mut reporter)?;
            println!("version: {version}");
        }
        Commands::Upload { dir, files } => {
            let client = client(&config)?;
            let batch = upload_batch(dir, files);
            let result = client.upload_files(&batch, &mut reporter)?;
            println!("upload_dir: {}", batch.directory);
            print_uploaded(&result);
        }
        Commands::Add {
            repo,
            dir,
            force_replace,
        } => {
            let client = client(&config)?;
            let repository = required(
                repo,
                config.publish.repository.as_deref(),
                "repository",
                "--repo",
            )?;
            let target = RepoTarget::new(repository, dir)
                .with_force_replace(force_replace || config.publish.force_replace);
            let result = client.add_uploaded_files_to_repo(&target, &mut reporter)?;
            println!("repository: {}", target.repository);
            print_registered(&result);
        }
        Commands::Publish {
            prefix,
            distribution,
            force_overwrite,
        } => {
            let client = client(&config)?;
            let target = publish_target(&config, prefix, distribution, force_overwrite)?;
            client.update_publish_repo(&target, &mut reporter)?;
            print_published(&target);
        }
        Commands::Run {
            files,
            dir,
            repo,
            prefix,
            distribution,
            force_replace,
            force_overwrite,
            skip_version_check,
        } => {
            let client = client(&config)?;
            let plan = PipelinePlan {
                check_version: !skip_version_check,
                batch: upload_batch(dir, files),
                repository: required(
                    repo,
                    config.publish.repository.as_deref(),
                    "repository",
                    "--repo",
                )?,
                force_replace: force_replace || config.publish.force_replace,
                publish: publish_target(&config, prefix, distribution, force_overwrite)?,
            };
            let report = pipeline::run(&client, &plan, &mut reporter)?;

            if let Some(version) = &report.server_version {
                println!("server_version: {version}");
            }
            println!("upload_dir: {}", plan.batch.directory);
            print_uploaded(&report.uploaded);
            print_registered(&report.registered);
            print_published(&plan.publish);
            println!("stage: {}", report.stage);
        }
        Commands::Config => {
            match &config_file {
                Some(path) => println!("config_file: {}", path.display()),
                None => println!("config_file: none"),
            }
            let password = aptly_config::resolve_password(&config);
            println!("password_source: {}", password.source);
            println!();
            print!("{}", config.masked().to_toml()?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Explicit `--config` must exist; otherwise the nearest `.aptly.toml` is used if any.
fn load_effective_config(explicit: Option<&Path>) -> Result<(Option<PathBuf>, Config)> {
    if let Some(path) = explicit {
        let config = load_config_from_file(path)?;
        return Ok((Some(path.to_path_buf()), config));
    }

    let cwd = env::current_dir().context("failed to determine current directory")?;
    match find_config(&cwd) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using config file");
            let config = load_config_from_file(&path)?;
            Ok((Some(path), config))
        }
        None => Ok((None, Config::default())),
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.url {
        config.server.url = Some(url.clone());
    }
    if let Some(username) = &cli.username {
        config.server.username = Some(username.clone());
    }
    if cli.trust_self_signed {
        config.server.trust_self_signed = true;
    }
}

fn client(config: &Config) -> Result<AptlyClient> {
    let endpoint = config.server_endpoint()?;
    Ok(AptlyClient::new(endpoint)?)
}

fn upload_batch(dir: Option<String>, files: Vec<PathBuf>) -> UploadBatch {
    match dir {
        Some(dir) => UploadBatch::new(dir, files),
        None => UploadBatch::generated(files),
    }
}

fn required(
    flag: Option<String>,
    configured: Option<&str>,
    what: &str,
    arg: &str,
) -> Result<String> {
    match flag.or_else(|| configured.map(str::to_string)) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("no {what} given (pass {arg} or set [publish] {what} in the config file)"),
    }
}

fn publish_target(
    config: &Config,
    prefix: Option<String>,
    distribution: Option<String>,
    force_overwrite: bool,
) -> Result<PublishTarget> {
    let distribution = required(
        distribution,
        config.publish.distribution.as_deref(),
        "distribution",
        "--distribution",
    )?;
    let prefix = prefix
        .or_else(|| config.publish.prefix.clone())
        .unwrap_or_else(|| ROOT_PREFIX.to_string());

    Ok(PublishTarget::new(prefix, distribution)
        .with_force_overwrite(force_overwrite || config.publish.force_overwrite)
        .with_signing(config.signing()))
}

fn print_uploaded(result: &ApiResult) {
    for file in result.uploaded_files() {
        println!("uploaded: {file}");
    }
}

fn print_registered(result: &ApiResult) {
    let report = result.get("Report");
    print_strings("added", report.and_then(|r| r.get("Added")));
    print_strings("removed", report.and_then(|r| r.get("Removed")));
    print_strings("warning", report.and_then(|r| r.get("Warnings")));
    print_strings("failed", result.get("FailedFiles"));
}

fn print_strings(label: &str, value: Option<&Value>) {
    let Some(Value::Array(items)) = value else {
        return;
    };
    for item in items.iter().filter_map(Value::as_str) {
        println!("{label}: {item}");
    }
}

fn print_published(target: &PublishTarget) {
    let signed = if target.signing.enabled { "signed" } else { "unsigned" };
    println!(
        "published: {}/{} ({signed})",
        target.prefix, target.distribution
    );
}
