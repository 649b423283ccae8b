//! vibemq-bridge - check bridge topic rules and dry-run remapping/mirroring
//!
//! Usage:
//!   vibemq-bridge [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>        Configuration file path
//!   -i, --inbound <TOPIC>      Remap a topic as if received from the remote broker
//!   -s, --subscribe <FILTER>   Mirror a local subscription and print upstream requests
//!   -u, --unsubscribe <FILTER> Release a mirrored subscription
//!   -b, --bridge <NAME>        Restrict --inbound to one bridge
//!   -l, --log-level            Log level (error, warn, info, debug, trace)
//!   -h, --help                 Print help

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use vibemq_bridge::config::Config;
use vibemq_bridge::{BridgeRegistry, TopicTokens, UpstreamRequest};

/// Client identifier used for dry-run subscriptions
const DRY_RUN_CLIENT: &str = "vibemq-bridge-cli";

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    #[default]
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }

    fn from_config(level: &str) -> Self {
        match level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    }
}

/// Validate bridge topic rules and dry-run inbound remapping and subscription mirroring
#[derive(Parser, Debug)]
#[command(name = "vibemq-bridge")]
#[command(author = "VibeMQ Contributors")]
#[command(version)]
#[command(about = "Bridge topic rule checker for VibeMQ")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Topic to remap as if received from the remote broker (repeatable)
    #[arg(short, long)]
    inbound: Vec<String>,

    /// Local subscription to mirror upstream (repeatable)
    #[arg(short, long)]
    subscribe: Vec<String>,

    /// Local subscription to release after subscribing (repeatable)
    #[arg(short, long)]
    unsubscribe: Vec<String>,

    /// Only remap through this bridge
    #[arg(short, long)]
    bridge: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error loading config file: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    // CLI overrides config, config overrides default (warn)
    let log_level = args
        .log_level
        .unwrap_or_else(|| LogLevel::from_config(&file_config.log.level));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error installing log subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    let (upstream_tx, mut upstream_rx) = mpsc::unbounded_channel();

    let registry = match file_config.build_registry(Some(&upstream_tx)) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Bridge startup aborted: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for bridge in registry.bridges() {
        println!(
            "bridge '{}': {} forwarding rules, {} mirroring rules, remapping {}",
            bridge.name(),
            bridge.topics().len(),
            bridge.sub_topics().len(),
            if bridge.topic_remapping() { "on" } else { "off" }
        );
    }

    let mut ok = remap_all(&registry, &args);
    ok &= mirror_all(&registry, &args);

    drop(upstream_tx);
    while let Ok(request) = upstream_rx.try_recv() {
        match request {
            UpstreamRequest::Subscribe { bridge, topic, qos } => {
                println!("upstream '{}': SUBSCRIBE {} qos {}", bridge, topic, qos)
            }
            UpstreamRequest::Unsubscribe { bridge, topic } => {
                println!("upstream '{}': UNSUBSCRIBE {}", bridge, topic)
            }
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn remap_all(registry: &BridgeRegistry, args: &Args) -> bool {
    let mut ok = true;

    for bridge in registry.bridges() {
        if args.bridge.as_deref().is_some_and(|name| name != bridge.name()) {
            continue;
        }

        for topic in &args.inbound {
            match bridge.remap_inbound(topic) {
                Ok(local) => println!("inbound '{}': {} -> {}", bridge.name(), topic, local),
                Err(e) => {
                    error!("Bridge '{}': cannot remap '{}': {}", bridge.name(), topic, e);
                    ok = false;
                }
            }
        }
    }

    ok
}

fn mirror_all(registry: &BridgeRegistry, args: &Args) -> bool {
    let mut ok = true;

    let parse = |filter: &str| match TopicTokens::parse(filter) {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            error!("Invalid subscription '{}': {}", filter, e);
            None
        }
    };

    for filter in &args.subscribe {
        let Some(tokens) = parse(filter) else {
            ok = false;
            continue;
        };
        match registry.on_local_subscribe(DRY_RUN_CLIENT, &tokens) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => println!("subscribe {}: no bridge mirrors it", filter),
            Err(e) => {
                error!("Cannot mirror '{}': {}", filter, e);
                ok = false;
            }
        }
    }

    for filter in &args.unsubscribe {
        let Some(tokens) = parse(filter) else {
            ok = false;
            continue;
        };
        match registry.on_local_unsubscribe(DRY_RUN_CLIENT, &tokens) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => println!("unsubscribe {}: nothing mirrored", filter),
            Err(e) => {
                error!("Cannot release '{}': {}", filter, e);
                ok = false;
            }
        }
    }

    ok
}
