use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use libp2p::Multiaddr;
use metrics::Metrics;
use metrics::server::{MetricsServerConfig, run_metrics_server};
use networking::gossipsub::config::GossipsubConfig;
use networking::gossipsub::topic::get_topics;
use networking::network::{NetworkService, NetworkServiceConfig};
use networking::relay::{
    RelayAddress, RelayAddressHandler, RelayAddressResolver, RelayAddressSink, RelayAddressSlot,
};
use networking::types::{ChatCommand, ChatMessage, PeerAddressesChanged};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::{sync::mpsc, task};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    address: IpAddr,

    #[arg(short, long, default_value_t = 9091)]
    port: u16,

    /// Multiaddr or path to a YAML file listing multiaddrs.
    #[arg(short, long)]
    bootnodes: Vec<String>,

    /// Relay to listen through. Must carry the relay's `/p2p/` peer id.
    #[arg(short, long)]
    relay: Vec<String>,

    #[arg(short, long)]
    topic: Vec<String>,

    #[arg(long, default_value_t = false)]
    disable_kademlia: bool,

    /// Copy each derived relay address to the system clipboard.
    #[arg(long, default_value_t = false)]
    copy_to_clipboard: bool,

    #[arg(long, default_value_t = false)]
    metrics: bool,

    #[arg(long, default_value = "127.0.0.1")]
    metrics_address: IpAddr,

    #[arg(long, default_value_t = 8080)]
    metrics_port: u16,
}

/// Shows relay addresses on the terminal and optionally copies them.
#[derive(Clone)]
struct TerminalRelaySink {
    slot: RelayAddressSlot,
    copy_to_clipboard: bool,
}

impl TerminalRelaySink {
    fn new(copy_to_clipboard: bool) -> Self {
        Self {
            slot: RelayAddressSlot::new(),
            copy_to_clipboard,
        }
    }
}

impl RelayAddressSink for TerminalRelaySink {
    fn set_relay_address(&self, address: &RelayAddress) {
        self.slot.set_relay_address(address);
        println!("relay address: {address}");
    }

    fn trigger_clipboard_copy(&self) {
        self.slot.trigger_clipboard_copy();
        if !self.copy_to_clipboard {
            return;
        }

        let Some(address) = self.slot.current() else {
            return;
        };

        let copied = arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_text(address.into_string()));
        if let Err(err) = copied {
            warn!(?err, "Failed to copy relay address to clipboard");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Publish(String),
    Dial(Multiaddr),
    Peers,
    Relay,
    Quit,
    Empty,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => Input::Quit,
        ("/peers", _) => Input::Peers,
        ("/relay", _) => Input::Relay,
        ("/dial", addr) => match addr.trim().parse::<Multiaddr>() {
            Ok(addr) => Input::Dial(addr),
            Err(err) => Input::Invalid(format!("invalid multiaddr {addr:?}: {err}")),
        },
        _ => Input::Publish(line.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let metrics = if args.metrics {
        let metrics = Arc::new(Metrics::new()?);
        let config = MetricsServerConfig {
            metrics_address: args.metrics_address,
            metrics_port: args.metrics_port,
        };
        let server_metrics = metrics.clone();
        task::spawn(async move {
            if let Err(err) = run_metrics_server(config, server_metrics).await {
                warn!("Metrics server exited with error: {err:?}");
            }
        });
        Some(metrics)
    } else {
        None
    };

    let (command_sender, command_receiver) = mpsc::unbounded_channel::<ChatCommand>();
    let (chat_sender, mut chat_receiver) = mpsc::unbounded_channel::<ChatMessage>();
    let (address_sender, address_receiver) = mpsc::unbounded_channel::<PeerAddressesChanged>();

    let mut gossipsub_config = GossipsubConfig::new()?;
    gossipsub_config.set_topics(get_topics(&args.topic));

    let network_service_config = Arc::new(
        NetworkServiceConfig::new(gossipsub_config, args.address, args.port, args.bootnodes)
            .with_relays(args.relay)
            .with_kademlia(!args.disable_kademlia),
    );
    let mut network_service = NetworkService::new(
        network_service_config,
        command_receiver,
        chat_sender,
        address_sender,
        metrics.clone(),
    )
    .await?;

    let session = network_service.session();
    println!("peer id: {}", network_service.local_peer_id());

    let mut network_handle = task::spawn(async move { network_service.start().await });

    let relay_sink = TerminalRelaySink::new(args.copy_to_clipboard);
    let relay_slot = relay_sink.slot.clone();
    let mut resolver = RelayAddressResolver::new(relay_sink);
    if let Some(metrics) = &metrics {
        resolver = resolver.with_metrics(metrics.clone());
    }
    task::spawn(RelayAddressHandler::new(resolver).run(address_receiver));

    task::spawn(async move {
        while let Some(message) = chat_receiver.recv().await {
            if message.should_display() {
                println!("{message}");
            } else {
                debug!(from = ?message.from, "Discarding unsigned chat message");
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                match parse_input(&line) {
                    Input::Publish(text) => command_sender.send(ChatCommand::Publish(text))?,
                    Input::Dial(addr) => command_sender.send(ChatCommand::Dial(addr))?,
                    Input::Peers => {
                        let connections = session.lock().connections();
                        println!("connections ({}):", connections.len());
                        for addr in connections {
                            println!("  {addr}");
                        }
                    }
                    Input::Relay => match relay_slot.current() {
                        Some(address) => println!("relay address: {address}"),
                        None => println!("no relay address yet"),
                    },
                    Input::Quit => break,
                    Input::Empty => {}
                    Input::Invalid(reason) => println!("{reason}"),
                }
            }
            result = &mut network_handle => {
                match result {
                    Ok(Ok(())) => info!("Network service finished"),
                    Ok(Err(err)) => warn!("Network service exited with error: {err:?}"),
                    Err(err) => warn!("Network task failed: {err:?}"),
                }
                return Ok(());
            }
        }
    }

    drop(command_sender);
    if let Err(err) = network_handle.await? {
        warn!("Network service exited with error: {err:?}");
    }

    info!("Main async task exiting...");
    Ok(())
}
