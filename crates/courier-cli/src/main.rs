//! # Courier CLI
//!
//! Command-line client for the Courier message service.
//!
//! ## Usage
//!
//! ```bash
//! # Show the unread count
//! courier unread
//!
//! # List unread messages on page 2
//! courier messages --page 2 --page-size 20 --unread
//!
//! # Run with a custom config
//! courier --config /path/to/courier.toml read abc
//!
//! # Forward JSON messages from stdin and print first deliveries
//! COURIER_USER_ID=u1 courier watch < messages.jsonl
//! ```

mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use courier_protocol::{ActionOutcome, MessageQuery};
use std::path::PathBuf;
use std::sync::Arc;
use tenvis_courier_core::{metrics, Client, Event, EventKind, LocalChannel};
use tenvis_courier_service::HttpActionService;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "Courier message service client")]
struct Cli {
    /// Path to a courier.toml file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base address of the message service.
    #[arg(long, global = true)]
    service_address: Option<String>,

    /// Path of the message resource.
    #[arg(long, global = true)]
    path: Option<String>,

    /// User to act for.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List messages.
    Messages {
        /// Page to fetch.
        #[arg(long)]
        page: Option<u32>,
        /// Page size, used together with --page.
        #[arg(long)]
        page_size: Option<u32>,
        /// Only show unread messages.
        #[arg(long)]
        unread: bool,
    },
    /// Show the unread count.
    Unread,
    /// Mark a message read.
    Read { send_id: String },
    /// Postpone a message.
    Delay { send_id: String, schedule: String },
    /// Acknowledge delivery of a push.
    Delivered { push_id: String },
    /// Register this device for a channel.
    Register { device_id: String, channel: String },
    /// Remove this device from a channel.
    Unregister { device_id: String, channel: String },
    /// Deliver JSON messages read from stdin and print each new one.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "courier=info,tenvis_courier_core=info,tenvis_courier_service=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::Config::from_file(path)?,
        None => config::Config::load()?,
    };
    if let Some(address) = cli.service_address {
        config.service_address = address;
    }
    if let Some(path) = cli.path {
        config.path = path;
    }
    if let Some(user) = cli.user {
        config.user_id = user;
    }
    config.validate()?;

    metrics::describe_metrics();

    let service = Arc::new(HttpActionService::new()?);
    let client = Client::with_options(service, config.client_options());
    client.on(EventKind::UnreadChange, |event| {
        if let Event::UnreadChange { count } = event {
            info!(count, "Unread count changed");
        }
    });

    let client_config = config.client_config();
    client.start(&client_config);
    let result = run(&client, &config.user_id, cli.command).await;
    client.stop(&client_config);

    result
}

async fn run(client: &Client, user_id: &str, command: Command) -> Result<()> {
    match command {
        Command::Messages {
            page,
            page_size,
            unread,
        } => {
            let mut query = MessageQuery::new();
            if let Some(page) = page {
                query = query.page(page);
            }
            if let Some(size) = page_size {
                query = query.page_size(size);
            }
            if unread {
                query = query.unread_only();
            }

            let page = client.fetch_messages(query).await?;
            println!("{}", serde_json::to_string_pretty(&page.display_messages)?);
            info!(
                total = page.messages.len(),
                shown = page.display_messages.len(),
                unread = page.unread_count,
                "Listed messages"
            );
        }
        Command::Unread => {
            println!("{}", client.fetch_unread_count().await?);
        }
        Command::Read { send_id } => print_outcome(&client.mark_read(send_id).await?)?,
        Command::Delay { send_id, schedule } => {
            print_outcome(&client.delay(send_id, schedule).await?)?;
        }
        Command::Delivered { push_id } => print_outcome(&client.mark_delivered(push_id).await?)?,
        Command::Register { device_id, channel } => {
            print_outcome(&client.register_device(user_id, device_id, channel).await?)?;
        }
        Command::Unregister { device_id, channel } => {
            print_outcome(&client.unregister_device(user_id, device_id, channel).await?)?;
        }
        Command::Watch => watch(client).await?,
    }

    Ok(())
}

fn print_outcome(outcome: &ActionOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

async fn watch(client: &Client) -> Result<()> {
    client.on(EventKind::Message, |event| {
        if let Event::Message { message, .. } = event {
            match serde_json::to_string(message.as_ref()) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "Failed to encode message"),
            }
        }
    });

    let stdin = Arc::new(LocalChannel::new("stdin"));
    client.use_channel(stdin.clone())?;

    if let Err(e) = client.fetch_unread_count().await {
        warn!(error = %e, "Could not fetch unread count, continuing without it");
    }

    stdin.connect();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = stdin.deliver_raw(line.as_bytes()) {
            warn!(error = %e, "Skipping invalid message");
        }
    }
    stdin.disconnect();

    let stats = client.stats();
    info!(
        delivered = stats.delivered_count,
        unread = ?stats.unread_count,
        "Input closed"
    );
    Ok(())
}
