//! FlashAuth - An In-Process Authentication and Authorization Engine
//!
//! This is the console entry point. It builds an engine from command-line flags,
//! reads one command per line from stdin and prints each reply to stdout.

use anyhow::{bail, Context};
use flashauth::{AuthEngine, CommandHandler, EngineConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Console configuration
struct Config {
    engine: EngineConfig,
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> anyhow::Result<Self> {
        let mut engine = EngineConfig::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--user-shards" => {
                    engine.user_shards = parse_value(&args, i)?;
                    i += 2;
                }
                "--token-shards" => {
                    engine.token_shards = parse_value(&args, i)?;
                    i += 2;
                }
                "--ttl-secs" => {
                    engine.token_ttl = Duration::from_secs(parse_value(&args, i)?);
                    i += 2;
                }
                "--sweep-ms" => {
                    engine.sweep_interval = Duration::from_millis(parse_value(&args, i)?);
                    i += 2;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("FlashAuth version {}", flashauth::VERSION);
                    std::process::exit(0);
                }
                other => {
                    print_help();
                    bail!("unknown argument: {}", other);
                }
            }
        }

        engine.validate()?;
        Ok(Self { engine })
    }
}

/// Parses the value following the flag at `args[i]`.
fn parse_value<T>(args: &[String], i: usize) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let flag = &args[i];
    let Some(raw) = args.get(i + 1) else {
        bail!("{} requires a value", flag);
    };
    raw.parse()
        .with_context(|| format!("invalid value for {}: {}", flag, raw))
}

fn print_help() {
    println!(
        r#"
FlashAuth - An In-Process Authentication and Authorization Engine

USAGE:
    flashauth [OPTIONS]

OPTIONS:
        --user-shards <N>    Number of user shards (default: 1024)
        --token-shards <N>   Number of token shards (default: 1024)
        --ttl-secs <SECS>    Token time-to-live in seconds (default: 7200)
        --sweep-ms <MS>      Sweeper tick period in milliseconds (default: 200)
    -v, --version            Print version information
    -h, --help               Print this help message

COMMANDS (one per line on stdin):
    CREATEUSER name password      DELETEUSER name password
    CREATEROLE role               DELETEROLE role
    ADDROLE name role             AUTH name password
    INVALIDATE token              CHECKROLE token role
    ROLES token                   STATS | PING | HELP | QUIT

EXAMPLE:
    $ flashauth --ttl-secs 600
    CREATEUSER alice s3cret
    200 20002 user created
    AUTH alice s3cret
    200 20008 token created
    token ...

Set RUST_LOG=debug for lifecycle logs (written to stderr).
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args()?;

    // Set up logging; stdout carries replies, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Create the engine; this also starts the token sweeper
    let engine = Arc::new(AuthEngine::new(config.engine)?);
    let handler = CommandHandler::new(Arc::clone(&engine));
    info!("Console ready, reading commands from stdin");

    // Set up graceful shutdown
    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping..."),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    let result = tokio::select! {
        result = console_loop(handler) => result,
        _ = shutdown => Ok(()),
    };

    engine.shutdown();
    info!("Shutdown complete");
    result
}

/// Reads commands until EOF or QUIT.
async fn console_loop(handler: CommandHandler) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = handler.execute(&line);
        stdout.write_all(format!("{}\n", reply).as_bytes()).await?;
        stdout.flush().await?;

        if reply.quit {
            break;
        }
    }

    Ok(())
}
