//! Command-line front end (spec §6): `sync`, `update`, `lookup <url>`,
//! `purge`, `stats`, wired to [`gsb_facade::SafeBrowsingClient`].

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gsb_facade::{ClientConfig, SafeBrowsingClient};
use tracing::{error, info, warn};

/// Offline Safe Browsing v3 mirror and lookup client.
#[derive(Parser, Debug)]
#[command(name = "gsb", version, about)]
struct Cli {
    /// Safe Browsing API key.
    #[arg(long, env = "GGLSBL3_API_KEY")]
    api_key: String,

    /// Path to the embedded database file.
    #[arg(long, default_value = "./gsb_v3.db")]
    db_file: String,

    /// Compute fair-use delays but never actually sleep for them.
    #[arg(long)]
    no_fair_use: bool,

    /// `trace`, `debug`, `info`, `warn`, or `error`.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Suppress all log output.
    #[arg(short, long)]
    silent: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Repeatedly sync until the cache is fully caught up.
    Sync,
    /// Perform one sync pass and exit.
    Update,
    /// Look up a URL against the cached prefixes.
    Lookup { url: String },
    /// Delete the database file.
    Purge {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Print counts of chunks, prefixes, and full hashes.
    Stats,
}

const USER_INTERRUPT_EXIT_CODE: i32 = 5;
const NETWORK_RETRY_DELAY: Duration = Duration::from_secs(5);
const MAX_NETWORK_RETRIES: u32 = 5;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.silent);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing(log_level: &str, silent: bool) {
    if silent {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = ClientConfig::new(cli.api_key.clone(), cli.db_file.clone());
    config.discard_fair_use = cli.no_fair_use;

    match cli.command {
        Command::Sync => run_sync_loop(config).await,
        Command::Update => {
            let client = SafeBrowsingClient::connect(config).await?;
            run_sync_with_retry(&client).await?;
            Ok(0)
        }
        Command::Lookup { url } => run_lookup(config, &url).await,
        Command::Purge { yes } => run_purge(&cli.db_file, yes),
        Command::Stats => run_stats(config).await,
    }
}

/// Syncs repeatedly until a pass stores no new chunks, aborting cleanly
/// on Ctrl-C (spec §5's cancellable sleep, surfaced here as a whole-pass
/// cancellation point; exit code 5 per spec §6).
async fn run_sync_loop(config: ClientConfig) -> Result<i32> {
    let client = SafeBrowsingClient::connect(config).await?;
    loop {
        let before = client.stats().await?.chunks;
        tokio::select! {
            result = run_sync_with_retry(&client) => { result?; }
            _ = tokio::signal::ctrl_c() => {
                warn!("sync interrupted by user");
                return Ok(USER_INTERRUPT_EXIT_CODE);
            }
        }
        let after = client.stats().await?.chunks;
        if after == before {
            break;
        }
    }
    info!("cache is fully in sync");
    Ok(0)
}

/// Network failures are logged and retried after a bounded sleep (spec
/// §7); any other error kind propagates and terminates the process.
async fn run_sync_with_retry(client: &SafeBrowsingClient) -> Result<()> {
    let mut attempt = 0;
    loop {
        match client.sync().await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_network() && attempt < MAX_NETWORK_RETRIES => {
                attempt += 1;
                warn!("sync failed ({err}), retrying in {}s (attempt {attempt}/{MAX_NETWORK_RETRIES})", NETWORK_RETRY_DELAY.as_secs());
                tokio::time::sleep(NETWORK_RETRY_DELAY).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn run_lookup(config: ClientConfig, url: &str) -> Result<i32> {
    let client = SafeBrowsingClient::connect(config).await?;
    let result = client.lookup(url).await?;
    if result.is_clean() {
        println!("OK: {url} did not match any list");
    } else {
        for (list, metadata) in &result.matches {
            match metadata {
                Some(m) => println!("MATCH: {url} is on {list} (metadata={m})"),
                None => println!("MATCH: {url} is on {list}"),
            }
        }
    }
    Ok(result.exit_code())
}

fn run_purge(db_file: &str, skip_confirm: bool) -> Result<i32> {
    if !std::path::Path::new(db_file).exists() {
        println!("{db_file} does not exist, nothing to purge");
        return Ok(0);
    }
    if !skip_confirm && !confirm(&format!("Delete database file {db_file}? [y/N] "))? {
        println!("aborted");
        return Ok(0);
    }
    std::fs::remove_file(db_file)?;
    println!("deleted {db_file}");
    Ok(0)
}

async fn run_stats(config: ClientConfig) -> Result<i32> {
    let client = SafeBrowsingClient::connect(config).await?;
    let stats = client.stats().await?;
    println!("chunks: {}", stats.chunks);
    println!("prefixes: {}", stats.prefixes);
    println!("full_hashes: {}", stats.full_hashes);
    Ok(0)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
