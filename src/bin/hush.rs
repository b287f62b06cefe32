//! hush - client for the hush secrets daemon
//!
//! Commands:
//! - init <PROJECT>: write `.hush` and generate the master key if absent
//! - login: save server URL and token to `~/.hush/credentials.json`
//! - set KEY=VALUE...: seal locally and push
//! - pull: fetch, open locally, write the output file
//! - list: show key names for the project/environment
//! - projects: show project names on the server
//! - status: check that the server is reachable

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hush::client::batch::{self, BatchSummary};
use hush::client::{output, SecretsRemote};
use hush::crypto::{MasterKeyStore, OnExisting};
use hush::project::{self, Credentials, ProjectConfig};
use hush::HushClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hush")]
#[command(about = "Lightweight secrets manager - values are encrypted before they leave your machine")]
#[command(version)]
struct Cli {
    /// Project descriptor to use
    #[arg(long, global = true, default_value = project::PROJECT_FILE_NAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a project and generate the master key if it does not exist
    Init {
        /// Project name
        project: String,
        /// Environment name
        #[arg(long, default_value = "production")]
        env: String,
        /// Replace an existing master key. Secrets sealed under it become unreadable.
        #[arg(long)]
        force_new_key: bool,
    },

    /// Save the server URL and access token
    Login {
        /// Server URL
        #[arg(long, default_value = "http://localhost:8080")]
        server: String,
        /// Access token issued by hushd
        #[arg(long, env = project::TOKEN_ENV, hide_env_values = true)]
        token: String,
    },

    /// Encrypt and push secrets (KEY=VALUE)
    Set {
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Pull secrets and write them to the configured output file
    Pull,

    /// List secret names (values are never shown)
    List,

    /// List projects known to the server
    Projects,

    /// Check that the server is reachable
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hush=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            project,
            env,
            force_new_key,
        } => cmd_init(&cli.config, &project, &env, force_new_key),
        Commands::Login { server, token } => cmd_login(&server, &token).await,
        Commands::Set { pairs } => cmd_set(&cli.config, &pairs).await,
        Commands::Pull => cmd_pull(&cli.config).await,
        Commands::List => cmd_list(&cli.config).await,
        Commands::Projects => cmd_projects().await,
        Commands::Status => cmd_status().await,
    }
}

fn connect() -> Result<HushClient> {
    let path = Credentials::default_path()?;
    let creds = Credentials::load(&path).context("No credentials: run `hush login` first")?;
    Ok(HushClient::new(creds.server, creds.token))
}

fn cmd_init(config_path: &Path, project: &str, env: &str, force_new_key: bool) -> Result<()> {
    let config = ProjectConfig::new(project, env);
    config.save_to(config_path)?;

    let keys = MasterKeyStore::default_location()?;
    if force_new_key {
        keys.generate_with(OnExisting::Overwrite)?;
        println!("✓ Generated new master encryption key (previous key destroyed)");
    } else if !keys.exists() {
        keys.generate()?;
        println!("✓ Generated master encryption key");
    }

    println!("✓ Initialized hush project: {} ({})", project, env);
    println!("✓ Wrote {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  hush login --server URL --token TOKEN");
    println!("  hush set KEY=value");
    println!("  hush pull");
    Ok(())
}

async fn cmd_login(server: &str, token: &str) -> Result<()> {
    let creds = Credentials {
        server: server.trim_end_matches('/').to_string(),
        token: token.trim().to_string(),
    };

    if let Err(e) = HushClient::new(&creds.server, &creds.token).ping().await {
        eprintln!("warning: {}", e);
    }

    let path = Credentials::default_path()?;
    creds.save(&path)?;
    println!("✓ Saved credentials to {}", path.display());
    Ok(())
}

async fn cmd_set(config_path: &Path, pairs: &[String]) -> Result<()> {
    let config = ProjectConfig::load_from(config_path)?;
    let key = MasterKeyStore::default_location()?.load()?;
    let client = connect()?;

    let report =
        batch::push_pairs(&client, &key, &config.project, &config.environment, pairs).await;

    for item in &report.items {
        match &item.result {
            Ok(()) => println!("✓ Set {}", item.key),
            Err(e) => eprintln!("✗ {}: {}", item.key, e),
        }
    }
    finish(report.summary(), report.success_count(), report.items.len())
}

async fn cmd_pull(config_path: &Path) -> Result<()> {
    let config = ProjectConfig::load_from(config_path)?;
    let key = MasterKeyStore::default_location()?.load()?;
    let client = connect()?;

    let report =
        batch::pull_secrets(&client, &key, &config.project, &config.environment).await?;

    for (name, e) in report.failed() {
        eprintln!("✗ {}: {}", name, e);
    }

    let written = output::write_report(&config, &report, &config.output.path)
        .with_context(|| format!("Failed to write {}", config.output.path.display()))?;

    match written {
        Some(count) => println!(
            "✓ Pulled {} secrets to {}",
            count,
            config.output.path.display()
        ),
        None => eprintln!(
            "{} left unchanged: no secret could be decrypted (wrong master key?)",
            config.output.path.display()
        ),
    }
    finish(report.summary(), report.success_count(), report.items.len())
}

async fn cmd_list(config_path: &Path) -> Result<()> {
    let config = ProjectConfig::load_from(config_path)?;
    let client = connect()?;

    let secrets = client
        .get_secrets(&config.project, &config.environment)
        .await?;

    println!("Secrets for {}/{}:", config.project, config.environment);
    for secret in secrets {
        println!("  • {}", secret.key);
    }
    Ok(())
}

async fn cmd_projects() -> Result<()> {
    for project in connect()?.list_projects().await? {
        println!("{}", project);
    }
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let client = connect()?;
    client.ping().await?;
    println!("✓ {} is healthy", client.base_url());
    Ok(())
}

/// Turn a batch summary into the process result.
fn finish(summary: BatchSummary, succeeded: usize, total: usize) -> Result<()> {
    match summary {
        BatchSummary::Complete => Ok(()),
        BatchSummary::Partial => {
            eprintln!("{} of {} items succeeded", succeeded, total);
            Ok(())
        }
        BatchSummary::Failed => bail!("all {} items failed", total),
    }
}
