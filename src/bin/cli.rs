//! pollkv-cli - send one command to a pollkv server
//!
//! ```text
//! $ pollkv-cli set name Ariz
//! [OK]
//! $ pollkv-cli get name
//! [OK] Ariz
//! ```

use anyhow::Context;
use pollkv::client::Client;
use tracing_subscriber::EnvFilter;

struct Config {
    host: String,
    port: u16,
    command: Vec<String>,
}

impl Config {
    fn from_args() -> Self {
        let mut config = Config {
            host: pollkv::DEFAULT_HOST.to_string(),
            port: pollkv::DEFAULT_PORT,
            command: Vec::new(),
        };
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" if config.command.is_empty() => {
                    config.host = value_of(&args, i, "--host").to_string();
                    i += 2;
                }
                "--port" | "-p" if config.command.is_empty() => {
                    config.port = value_of(&args, i, "--port").parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid port number");
                        std::process::exit(1);
                    });
                    i += 2;
                }
                "--help" if config.command.is_empty() => {
                    print_help();
                    std::process::exit(0);
                }
                // everything from the first positional argument on is the command
                _ => {
                    config.command.extend(args[i..].iter().cloned());
                    break;
                }
            }
        }

        if config.command.is_empty() {
            print_help();
            std::process::exit(1);
        }

        config
    }
}

fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
USAGE:
    pollkv-cli [OPTIONS] <COMMAND> [ARGS...]

OPTIONS:
    -h, --host <HOST>    Server host (default: 127.0.0.1)
    -p, --port <PORT>    Server port (default: 1234)
        --help           Print this help message

COMMANDS:
    get <key>
    set <key> <value>
    del <key>
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let addr = format!("{}:{}", config.host, config.port);
    let mut client = Client::connect(addr.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let response = client
        .send(&config.command)
        .await
        .context("request failed")?;

    println!("{}", response.to_string().trim_end());
    Ok(())
}
