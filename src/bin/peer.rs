//! Interactive push-to-talk peer
//!
//! One process per device. Arm one side with `listen`, point the other at
//! it with `connect <host:port>`, then hold the floor with `talk` and
//! yield it with `release`. Both sides run the same binary; the roles are
//! symmetric once the session exists.

use anyhow::Result;
use std::io::{BufRead, Write as _};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use p2p_walkie::audio::CpalEngine;
use p2p_walkie::config::AppConfig;
use p2p_walkie::session::SessionManager;
use p2p_walkie::transport::{PeerHandle, TcpTransport};
use p2p_walkie::TransmissionGate;

struct CliArgs {
    name: Option<String>,
    port: Option<u16>,
    config_path: Option<std::path::PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args();
    let mut config = load_config(&args)?;
    if let Some(name) = args.name {
        config.display_name = name;
    }
    if let Some(port) = args.port {
        config.transport.port = port;
    }

    tracing::info!("peer name: {}", config.display_name);
    tracing::info!(
        "service port: {} ({} Hz, {} ch, {} ms frames)",
        config.transport.port,
        config.audio.sample_rate,
        config.audio.channels,
        config.audio.frame_ms
    );

    let transport = Arc::new(TcpTransport::new(
        config.transport.clone(),
        &config.display_name,
    ));
    let engine = Arc::new(CpalEngine::new(config.audio.clone()));
    let manager = SessionManager::new(transport, engine.clone(), config.audio.clone());
    let mut gate = TransmissionGate::new(engine, manager.frame_sink());

    // Event printer: every lifecycle notification lands on the console.
    let events = manager.events();
    let printer = std::thread::Builder::new()
        .name("event-printer".to_string())
        .spawn(move || {
            for event in events.iter() {
                println!("<< {event}");
            }
        })?;

    ctrlc::set_handler(|| {
        // A second Ctrl+C while teardown is in flight force-exits.
        println!();
        std::process::exit(0);
    })?;

    print_help();

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let command = match parts.next() {
            Some(command) => command,
            None => continue,
        };

        match command {
            "listen" | "l" => {
                if let Err(e) = manager.listen() {
                    eprintln!("listen failed: {e}");
                }
            }
            "connect" | "c" => match parts.next().map(parse_peer) {
                Some(Ok(peer)) => {
                    if let Err(e) = manager.connect(peer) {
                        eprintln!("connect failed: {e}");
                    }
                }
                Some(Err(e)) => eprintln!("{e}"),
                None => eprintln!("usage: connect <host:port>"),
            },
            "talk" | "t" => {
                if let Err(e) = gate.start() {
                    eprintln!("cannot transmit: {e}");
                }
            }
            "release" | "r" => gate.stop(),
            "stop" | "s" => manager.teardown(),
            "status" => {
                println!("state: {:?}", manager.state());
                println!("transmitting: {}", gate.is_transmitting());
                let sink = manager.frame_sink();
                println!(
                    "frames sent: {}, dropped: {}",
                    sink.frames_submitted(),
                    sink.frames_dropped()
                );
            }
            "help" | "h" | "?" => print_help(),
            "quit" | "q" | "exit" => break,
            other => eprintln!("unknown command: {other} (try 'help')"),
        }
        prompt();
    }

    gate.stop();
    manager.teardown();
    drop(manager);
    // The event channel closes with the manager, ending the printer.
    let _ = printer.join();
    Ok(())
}

fn parse_args() -> CliArgs {
    let mut parsed = CliArgs {
        name: None,
        port: None,
        config_path: None,
    };

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--name" | "-n" => {
                if i + 1 < args.len() {
                    parsed.name = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    if let Ok(port) = args[i + 1].parse() {
                        parsed.port = Some(port);
                    }
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(args[i + 1].clone().into());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("p2p-walkie peer");
                println!();
                println!("Usage: peer [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --name <NAME>    Display name (default: Peer-<PID>)");
                println!("  -p, --port <PORT>    Service port (default: 45710)");
                println!("      --config <PATH>  Config file path");
                println!("  -h, --help           Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    parsed
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    if let Some(path) = &args.config_path {
        return Ok(AppConfig::load(path)?);
    }
    if let Some(path) = AppConfig::default_path() {
        if path.exists() {
            tracing::info!("loading config from {}", path.display());
            return Ok(AppConfig::load(&path)?);
        }
    }
    Ok(AppConfig::default())
}

fn parse_peer(spec: &str) -> Result<PeerHandle, String> {
    let address = spec
        .parse()
        .map_err(|_| format!("invalid peer address: {spec} (expected host:port)"))?;
    Ok(PeerHandle {
        address,
        name: spec.to_string(),
    })
}

fn print_help() {
    println!("commands:");
    println!("  listen              wait for an inbound connection");
    println!("  connect <host:port> dial a peer");
    println!("  talk                hold the floor (start transmitting)");
    println!("  release             yield the floor (stop transmitting)");
    println!("  stop                tear the session down");
    println!("  status              show state and counters");
    println!("  quit                exit");
    prompt();
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
