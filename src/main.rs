//! Entry point for `ipk-chat`.
//!
//! Parses CLI arguments, resolves the server, and wires stdin, Ctrl+C and the
//! terminal to the engine. All protocol work is delegated to library modules;
//! `main.rs` owns only process setup (logging, signal handling, argument
//! parsing, rendering).

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use ipk_chat::client::Commander;
use ipk_chat::config::{
    Config, TransportKind, DEFAULT_CONFIRMATION_TIMEOUT_MS, DEFAULT_MAX_RETRIES, DEFAULT_PORT,
};
use ipk_chat::{Client, ClientEvent};

/// Chat client for the IPK protocol over TCP or UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Transport protocol: tcp or udp.
    #[arg(short = 't', value_parser = parse_transport)]
    transport: TransportKind,

    /// Server IPv4 address or hostname.
    #[arg(short = 's')]
    server: String,

    /// Server port.
    #[arg(short = 'p', default_value_t = DEFAULT_PORT)]
    port: u16,

    /// UDP confirmation timeout in milliseconds.
    #[arg(short = 'd', default_value_t = DEFAULT_CONFIRMATION_TIMEOUT_MS)]
    timeout_ms: u32,

    /// Maximum number of UDP retransmissions.
    #[arg(short = 'r', default_value_t = DEFAULT_MAX_RETRIES)]
    retries: u32,
}

fn parse_transport(s: &str) -> Result<TransportKind, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::resolve(&cli.server, cli.port, cli.transport, cli.timeout_ms, cli.retries)
        .context("invalid server configuration")?;
    log::info!("Starting {:?} session with {}", config.transport, config.remote);

    let (mut handle, mut events) = Client::start(&config)
        .await
        .with_context(|| format!("cannot reach {}", config.remote))?;

    tokio::spawn(read_stdin(handle.commander()));
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            render(&event);
        }
    });

    let outcome = tokio::select! {
        outcome = handle.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted; ending session");
            handle.terminate().await
        }
    };
    let _ = printer.await;

    // stdin is read on a blocking thread that would keep the runtime alive.
    std::process::exit(if outcome.is_ok() { 0 } else { 1 });
}

async fn read_stdin(commands: Commander) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !commands.submit(line) {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("stdin: {e}");
                break;
            }
        }
    }
    commands.end_of_input();
}

fn render(event: &ClientEvent) {
    match event {
        ClientEvent::Info(_) | ClientEvent::ChatLine { .. } => println!("{event}"),
        ClientEvent::ProtocolError(_) | ClientEvent::Fatal(_) => eprintln!("{event}"),
    }
}
