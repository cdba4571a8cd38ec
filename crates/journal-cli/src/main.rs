use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use journal_core::config::ClientConfig;
use journal_core::credentials::LoginCredentials;
use journal_core::entry::verify_chain;
use journal_core::transport::Transport;
use journal_core::{JournalClient, JournalEntry, SymmetricKey, SyncCursor, Url, XChaChaProvider};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const KEY_ENV: &str = "JOURNAL_KEY";

#[derive(Parser, Debug)]
#[command(
    name = "journal",
    author,
    version,
    about = "Encrypted journal sync client",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server base URL, overrides config and JOURNAL_SERVER_URL
    #[arg(long, global = true)]
    server: Option<String>,

    /// Credentials document to authenticate with (HTTP basic)
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch and verify entries newer than a checkpoint
    Fetch {
        #[arg(long)]
        journal: String,
        /// Uid of the last entry already verified
        #[arg(long)]
        since: Option<String>,
        /// Print decrypted payloads instead of raw entries
        #[arg(long)]
        decrypt: bool,
    },
    /// Encrypt, link and push new entries after a checkpoint
    Push {
        #[arg(long)]
        journal: String,
        #[arg(long)]
        since: Option<String>,
        #[arg(required = true)]
        messages: Vec<String>,
    },
    /// Verify a saved batch of entries offline
    Verify {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        since: Option<String>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match &cli.command {
        Commands::Fetch {
            journal,
            since,
            decrypt,
        } => fetch_command(&cli, journal, since.as_deref(), *decrypt),
        Commands::Push {
            journal,
            since,
            messages,
        } => push_command(&cli, journal, since.as_deref(), messages),
        Commands::Verify { file, since } => verify_command(file, since.as_deref()),
    }
}

fn load_key() -> Result<SymmetricKey> {
    let encoded = match std::env::var(KEY_ENV) {
        Ok(value) => value,
        Err(_) => rpassword::prompt_password("Journal key (base64): ")
            .context("reading journal key")?,
    };
    SymmetricKey::from_base64(&encoded).map_err(|e| anyhow!("invalid journal key: {e}"))
}

fn build_client(cli: &Cli, journal: &str) -> Result<JournalClient> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => ClientConfig::default_path()?,
    };
    let mut config = ClientConfig::load(&path)?.apply_env();

    let credentials = cli
        .credentials
        .as_ref()
        .map(|path| -> Result<LoginCredentials> {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(LoginCredentials::from_json(&raw)?)
        })
        .transpose()?;

    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    } else if let Some(url) = credentials.as_ref().and_then(LoginCredentials::server_url) {
        config.server_url = url.to_string();
    }
    let base: Url = config.validate()?;

    let mut transport_config = config.transport_config();
    if let Some(credentials) = &credentials {
        transport_config.auth = Some(credentials.auth());
    }
    let transport = Transport::new(&transport_config)?;
    info!(server = %base, journal, "connecting");
    Ok(JournalClient::new(
        transport,
        Arc::new(XChaChaProvider),
        &base,
        journal,
    )?)
}

fn fetch_command(cli: &Cli, journal: &str, since: Option<&str>, decrypt: bool) -> Result<()> {
    let client = build_client(cli, journal)?;
    let key = load_key()?;
    let entries = client.fetch_entries(&key, since)?;
    let output = if decrypt {
        let mut out = Vec::with_capacity(entries.len());
        for entry in &entries {
            let plaintext = client.decrypt(entry, &key)?;
            out.push(json!({
                "uid": entry.uid(),
                "content": String::from_utf8_lossy(&plaintext),
            }));
        }
        serde_json::Value::Array(out)
    } else {
        serde_json::to_value(&entries)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn push_command(cli: &Cli, journal: &str, since: Option<&str>, messages: &[String]) -> Result<()> {
    let client = build_client(cli, journal)?;
    let key = load_key()?;
    let mut cursor = since.map(SyncCursor::at).unwrap_or_default();
    let pushed = client.append(&key, messages, &mut cursor)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "pushed": pushed.len(),
            "last": cursor.last(),
        }))?
    );
    Ok(())
}

fn verify_command(file: &Path, since: Option<&str>) -> Result<()> {
    let raw = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let entries: Vec<JournalEntry> = serde_json::from_slice(&raw)?;
    let key = load_key()?;
    verify_chain(&XChaChaProvider, &entries, &key, since)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "verified": entries.len(),
            "last": entries.last().map(JournalEntry::uid).or(since),
        }))?
    );
    Ok(())
}
