//! stringkv server entry point.
//!
//! Sets up logging, the storage engine and its expiry sweeper, then accepts
//! client connections until Ctrl+C.

use anyhow::{bail, Context};
use std::sync::Arc;
use stringkv::commands::CommandHandler;
use stringkv::connection::{handle_connection, ConnectionStats};
use stringkv::storage::{start_expiry_sweeper, StorageEngine, NUM_SHARDS};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Server configuration
#[derive(Debug, PartialEq, Eq)]
struct Config {
    host: String,
    port: u16,
    /// Default log filter, used when `RUST_LOG` is not set
    log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: stringkv::DEFAULT_HOST.to_string(),
            port: stringkv::DEFAULT_PORT,
            log_level: "info".to_string(),
        }
    }
}

/// What the command line asks for.
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Serve(Config),
    Help,
    Version,
}

impl Config {
    fn parse<I>(args: I) -> anyhow::Result<Invocation>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    config.host = args.next().context("--host requires a value")?;
                }
                "--port" | "-p" => {
                    let value = args.next().context("--port requires a value")?;
                    config.port = value
                        .parse()
                        .with_context(|| format!("invalid port number '{}'", value))?;
                }
                "--log-level" => {
                    config.log_level = args.next().context("--log-level requires a value")?;
                }
                "--help" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                other => bail!("unknown argument: {}", other),
            }
        }

        Ok(Invocation::Serve(config))
    }

    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
stringkv - A Redis-compatible string command server

USAGE:
    stringkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>         Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>         Port to listen on (default: 6379)
        --log-level <LEVEL>   Log filter when RUST_LOG is unset (default: info)
    -v, --version             Print version information
        --help                Print this help message

EXAMPLES:
    stringkv                          # Start on 127.0.0.1:6379
    stringkv --port 6380              # Start on port 6380
    stringkv --log-level debug        # Log connection details

CONNECTING:
    $ redis-cli -p 6379
    127.0.0.1:6379> SET counter 10
    OK
    127.0.0.1:6379> INCRBY counter 5
    (integer) 15
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::parse(std::env::args().skip(1)) {
        Ok(Invocation::Serve(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("stringkv version {}", stringkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            print_help();
            return Err(e);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let storage = Arc::new(StorageEngine::new());
    info!(shards = NUM_SHARDS, "Storage engine initialized");

    let _sweeper = start_expiry_sweeper(Arc::clone(&storage));

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!(
        version = stringkv::VERSION,
        "Listening on {}",
        config.bind_address()
    );

    tokio::select! {
        _ = accept_loop(listener, storage, stats) => {}
        result = signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Shutdown signal received, stopping server...");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Accepts connections forever, one task per client.
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
) {
    let handler = CommandHandler::new(storage);
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = handler.clone();
                let stats = Arc::clone(&stats);
                tokio::spawn(handle_connection(stream, addr, handler, stats));
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Invocation> {
        Config::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults() {
        assert_eq!(parse(&[]).unwrap(), Invocation::Serve(Config::default()));
    }

    #[test]
    fn test_host_port_and_log_level() {
        let Invocation::Serve(config) =
            parse(&["-h", "0.0.0.0", "--port", "6380", "--log-level", "debug"]).unwrap()
        else {
            panic!("expected a serve invocation");
        };
        assert_eq!(config.bind_address(), "0.0.0.0:6380");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["--help"]).unwrap(), Invocation::Help);
        assert_eq!(parse(&["-p", "1", "-v"]).unwrap(), Invocation::Version);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(parse(&["--port", "http"]).is_err());
        assert!(parse(&["--port"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }
}
