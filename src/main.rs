//! linekv - An Interactive In-Memory Key-Value Store
//!
//! This is the main entry point for the linekv server.
//! It sets up logging, the storage engine and the TCP listener, and hands
//! each accepted connection to its own task.

use anyhow::{bail, Context};
use linekv::commands::CommandHandler;
use linekv::connection::{handle_connection, ConnectionStats};
use linekv::storage::{start_expiry_sweeper, StorageEngine};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Prompt written before each read
    prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: linekv::DEFAULT_HOST.to_string(),
            port: linekv::DEFAULT_PORT,
            prompt: linekv::DEFAULT_PROMPT.to_string(),
        }
    }
}

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Serve(Config),
    Help,
    Version,
}

impl Config {
    /// Builds the configuration from the `PORT` variable and the process arguments.
    fn from_env_and_args() -> anyhow::Result<Invocation> {
        let port_var = std::env::var("PORT").ok();
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::parse(port_var.as_deref(), &args)
    }

    /// `PORT` overrides the default port; flags override both.
    fn parse(port_var: Option<&str>, args: &[String]) -> anyhow::Result<Invocation> {
        let mut config = Config::default();

        if let Some(port) = port_var {
            config.port = parse_port(port).context("invalid PORT environment variable")?;
        }

        let mut args = args.iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    let Some(host) = args.next() else {
                        bail!("--host requires a value");
                    };
                    config.host = host.clone();
                }
                "--port" | "-p" => {
                    let Some(port) = args.next() else {
                        bail!("--port requires a value");
                    };
                    config.port = parse_port(port)?;
                }
                "--prompt" => {
                    let Some(prompt) = args.next() else {
                        bail!("--prompt requires a value");
                    };
                    config.prompt = prompt.clone();
                }
                "--help" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                other => bail!("unknown argument: {}", other),
            }
        }

        Ok(Invocation::Serve(config))
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_port(value: &str) -> anyhow::Result<u16> {
    value
        .parse()
        .with_context(|| format!("invalid port number: {}", value))
}

fn print_help() {
    println!(
        r#"
linekv - An Interactive In-Memory Key-Value Store

USAGE:
    linekv [OPTIONS]

OPTIONS:
    -h, --host <HOST>      Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>      Port to listen on (default: $PORT or 80)
        --prompt <TEXT>    Prompt written before each read (default: "redis> ")
    -v, --version          Print version information
        --help             Print this help message

ENVIRONMENT:
    PORT        Port to listen on when --port is not given
    RUST_LOG    Log filter (default: info)

CONNECTING:
    Any line-oriented client works:
    $ nc localhost 80
    redis> SET name linekv
    OK
    redis> GET name
    linekv
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_env_and_args() {
        Ok(Invocation::Serve(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("linekv version {}", linekv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("linekv v{} starting", linekv::VERSION);

    // Create the storage engine (shared across all connections)
    let storage = Arc::new(StorageEngine::new());

    // Start the background expiry sweeper
    let _sweeper = start_expiry_sweeper(Arc::clone(&storage));

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());
    let prompt: Arc<str> = Arc::from(config.prompt.as_str());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&storage), Arc::clone(&stats), prompt) => {}
        _ = shutdown => {}
    }

    let storage_stats = storage.stats();
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        errors = stats.error_responses.load(Ordering::Relaxed),
        keys = storage_stats.keys,
        expired = storage_stats.expired,
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
    prompt: Arc<str>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);
                let prompt = Arc::clone(&prompt);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats, prompt).await;
                });
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

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn serve(invocation: Invocation) -> Config {
        match invocation {
            Invocation::Serve(config) => config,
            other => panic!("expected Serve, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let config = serve(Config::parse(None, &[]).unwrap());
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_address(), "0.0.0.0:80");
        assert_eq!(config.prompt, "redis> ");
    }

    #[test]
    fn test_port_from_env() {
        let config = serve(Config::parse(Some("6380"), &[]).unwrap());
        assert_eq!(config.port, 6380);
    }

    #[test]
    fn test_flags_override_env() {
        let config = serve(
            Config::parse(
                Some("6380"),
                &args(&["--port", "7000", "-h", "127.0.0.1", "--prompt", "> "]),
            )
            .unwrap(),
        );
        assert_eq!(config.bind_address(), "127.0.0.1:7000");
        assert_eq!(config.prompt, "> ");
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::parse(Some("eighty"), &[]).is_err());
        assert!(Config::parse(None, &args(&["-p", "99999"])).is_err());
        assert!(Config::parse(None, &args(&["--host"])).is_err());
        assert!(Config::parse(None, &args(&["--verbose"])).is_err());
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(Config::parse(None, &args(&["--help"])).unwrap(), Invocation::Help);
        assert_eq!(Config::parse(None, &args(&["-v"])).unwrap(), Invocation::Version);
    }
}
