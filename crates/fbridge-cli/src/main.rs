//! fbridge CLI - drive the page/relay delivery bridge from a terminal
//!
//! Usage:
//!   fbridge init                         Write default .fbridge/config.toml
//!   fbridge send <url>                   Deliver one page URL (relay first, then direct)
//!   fbridge watch <url> --navigate <url> Simulate client-side navigation and report the anchor
//!   fbridge record-id <url>              Show the record id extracted from a URL

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use fbridge_core::{extract_record_id, FbridgeConfig, FbridgeError};
use fbridge_page::{Element, Notifier, Page, PageAgent};
use fbridge_relay::RelayAgent;
use fbridge_transport::{BackendClient, RuntimeChannel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "fbridge")]
#[command(author, version, about = "Deliver page records to the recording backend")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory containing .fbridge/config.toml
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Override the backend base URL
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init,

    /// Deliver one page URL
    Send {
        /// Page URL to deliver
        url: String,

        /// Start without a relay, forcing the direct path
        #[arg(long)]
        no_relay: bool,

        /// Do not wait for Enter after each notice
        #[arg(short, long)]
        yes: bool,
    },

    /// Simulate a single-page app and report the trigger anchor
    Watch {
        /// Initial page URL
        url: String,

        /// URLs to push, in order
        #[arg(long = "navigate", value_name = "URL")]
        navigate: Vec<String>,

        /// Click the anchor after the last navigation
        #[arg(long)]
        click: bool,
    },

    /// Print the record id extracted from a URL
    RecordId {
        url: String,
    },
}

/// Prints notices and waits for the user to dismiss them
#[derive(Default)]
struct ConsoleNotifier {
    wait_for_enter: bool,
    shown: Notify,
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn acknowledge(&self, message: &str) -> fbridge_core::Result<()> {
        println!("\n  {}", message);
        if self.wait_for_enter {
            println!("  [press Enter to dismiss]");
            let mut line = String::new();
            let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
            if read == 0 {
                return Err(FbridgeError::Unknown("stdin closed before dismissal".to_string()));
            }
        }
        self.shown.notify_waiters();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init => cmd_init(cli.root),
        Commands::Send { url, no_relay, yes } => {
            let config = load_config(&cli.root, cli.backend)?;
            cmd_send(config, url, no_relay, yes).await
        }
        Commands::Watch {
            url,
            navigate,
            click,
        } => {
            let config = load_config(&cli.root, cli.backend)?;
            cmd_watch(config, url, navigate, click).await
        }
        Commands::RecordId { url } => cmd_record_id(&url),
    }
}

fn load_config(root: &Path, backend: Option<String>) -> Result<FbridgeConfig> {
    let mut config = FbridgeConfig::load_or_default(root)
        .with_context(|| format!("Failed to load config from {}", root.display()))?;
    if let Some(url) = backend {
        config.backend.base_url = url;
    }
    Ok(config)
}

fn cmd_init(root: PathBuf) -> Result<()> {
    FbridgeConfig::write_default(&root).context("Failed to write config")?;
    println!("Initialized fbridge in {:?}", root);
    println!("Created:");
    println!("  .fbridge/config.toml");
    Ok(())
}

async fn cmd_send(config: FbridgeConfig, url: String, no_relay: bool, yes: bool) -> Result<()> {
    let channel = RuntimeChannel::new(config.relay.reply_timeout());
    let relay = if no_relay {
        info!("Relay disabled, delivery will use the direct path");
        None
    } else {
        let backend = BackendClient::new(&config.backend)?;
        Some(RelayAgent::new(backend).spawn(&channel, config.relay.inbox_capacity))
    };

    let page = Page::open(url);
    let agent = PageAgent::new(
        page.history.clone(),
        channel,
        BackendClient::new(&config.backend)?,
        Arc::new(ConsoleNotifier {
            wait_for_enter: !yes,
            ..Default::default()
        }),
    );

    let outcome = agent.initiate_delivery().await;

    if let Some(relay) = relay {
        relay.stop();
    }

    let delivery = outcome?;
    let path: Vec<String> = delivery.path.iter().map(|o| o.to_string()).collect();
    println!("\nDelivery {}", delivery.id);
    println!("  Path:    {}", path.join(" -> "));
    println!("  Success: {}", delivery.result.success);
    if !delivery.result.raw.is_null() {
        println!("  Body:    {}", serde_json::to_string_pretty(&delivery.result.raw)?);
    }

    if !delivery.result.success {
        anyhow::bail!("Delivery failed");
    }
    Ok(())
}

async fn cmd_watch(
    config: FbridgeConfig,
    url: String,
    navigate: Vec<String>,
    click: bool,
) -> Result<()> {
    let channel = RuntimeChannel::new(config.relay.reply_timeout());
    let relay = RelayAgent::new(BackendClient::new(&config.backend)?)
        .spawn(&channel, config.relay.inbox_capacity);

    let page = Page::open(url);
    let notifier = Arc::new(ConsoleNotifier::default());
    let agent = PageAgent::new(
        page.history.clone(),
        channel,
        BackendClient::new(&config.backend)?,
        notifier.clone(),
    );

    let anchor_id = config.anchor.element_id.clone();
    let settle = config.anchor.recheck_delay() + Duration::from_millis(50);
    let watcher = page.install(&agent, config.anchor)?;
    page.document.mark_ready();
    tokio::time::sleep(settle).await;
    report_anchor(&page, &anchor_id);

    for next in navigate {
        // A router pushes the URL, then re-renders the view
        page.history.push_state(next.clone());
        page.document
            .replace_content(vec![Element::new("main").with_text(next)]);
        tokio::time::sleep(settle).await;
        report_anchor(&page, &anchor_id);
    }

    if click {
        // The click runs its delivery in the background; wait for its notice
        let shown = notifier.shown.notified();
        if !page.document.click(&anchor_id) {
            anyhow::bail!("Anchor {} not present", anchor_id);
        }
        info!("Clicked anchor on {}", page.location());
        shown.await;
    }

    watcher.stop();
    relay.stop();
    Ok(())
}

fn report_anchor(page: &Page, anchor_id: &str) {
    println!(
        "{:<50} anchors: {}",
        page.location(),
        page.document.count_by_id(anchor_id)
    );
}

fn cmd_record_id(url: &str) -> Result<()> {
    match extract_record_id(url) {
        Some(id) => println!("{}", id),
        None => println!("(no record id)"),
    }
    Ok(())
}
