//! pollkv - A Single-Threaded Key-Value Server
//!
//! This is the main entry point for the pollkv server.
//! It parses flags, sets up logging, binds the listener and hands everything
//! to the reactor.

use anyhow::Context;
use pollkv::commands::CommandHandler;
use pollkv::server::{Reactor, ReactorConfig};
use pollkv::storage::Store;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Event loop settings
    reactor: ReactorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: pollkv::DEFAULT_HOST.to_string(),
            port: pollkv::DEFAULT_PORT,
            reactor: ReactorConfig::default(),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = value_of(&args, i, "--host").to_string();
                    i += 2;
                }
                "--port" | "-p" => {
                    config.port = parse_value(&args, i, "--port", "invalid port number");
                    i += 2;
                }
                "--poll-timeout-ms" => {
                    let ms: u64 = parse_value(&args, i, "--poll-timeout-ms", "invalid timeout");
                    config.reactor.poll_timeout = Duration::from_millis(ms);
                    i += 2;
                }
                "--max-connections" => {
                    config.reactor.max_connections =
                        parse_value(&args, i, "--max-connections", "invalid connection limit");
                    i += 2;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("pollkv version {}", pollkv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Returns the argument following the flag at `i`, or exits.
fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str, what: &str) -> T {
    value_of(args, i, flag).parse().unwrap_or_else(|_| {
        eprintln!("Error: {}", what);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
pollkv - A Single-Threaded Key-Value Server

USAGE:
    pollkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>             Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>             Port to listen on (default: 1234)
        --poll-timeout-ms <MS>    Longest wait for readiness (default: 1000)
        --max-connections <N>     Refuse clients beyond this (default: 10000)
    -v, --version                 Print version information
        --help                    Print this help message

EXAMPLES:
    pollkv                        # Start on 127.0.0.1:1234
    pollkv --port 4000            # Start on port 4000
    pollkv --host 0.0.0.0         # Listen on all interfaces

CONNECTING:
    $ pollkv-cli set name Ariz
    [OK]
    $ pollkv-cli get name
    [OK] Ariz

LOGGING:
    Set RUST_LOG (e.g. RUST_LOG=debug) to change verbosity.
"#
    );
}

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

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

    let listener = std::net::TcpListener::bind(config.bind_address())
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("pollkv v{} listening on {}", pollkv::VERSION, config.bind_address());

    let reactor = Reactor::new(
        listener,
        Store::new(),
        CommandHandler::new(),
        config.reactor,
    )
    .context("failed to start event loop")?;

    // Only returns on a fatal poll error
    reactor.run().context("event loop failed")?;
    Ok(())
}
