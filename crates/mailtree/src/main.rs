//! `mailtree` - IMAP folder browser and IDLE watcher.
//!
//! Reads one account from `account.json`, connects, and prints the folder
//! tree, mailbox counters, or live IDLE events.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mailtree_imap::command::StatusAttribute;
use mailtree_imap::parser::StatusItem;
use mailtree_imap::{Connection, Element, Error, Ftree, IdleEvent};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::AccountSettings;

#[derive(Debug, Parser)]
#[command(name = "mailtree", version, about = "Browse IMAP folders and watch mailboxes")]
struct Cli {
    /// Account settings file [default: <config dir>/mailtree/account.json]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the folder tree.
    Tree {
        /// Only subscribed mailboxes.
        #[arg(short, long)]
        subscribed: bool,
    },
    /// Print message counters for mailboxes.
    Status {
        /// Mailboxes to query.
        #[arg(default_value = "INBOX")]
        mailboxes: Vec<String>,
    },
    /// Select a mailbox and print changes as they arrive.
    Idle {
        #[arg(default_value = "INBOX")]
        mailbox: String,
        /// Seconds to wait for each event before printing a heartbeat.
        #[arg(long, default_value_t = 60)]
        wait: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailtree=info,mailtree_imap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(settings::default_path);
    let account = AccountSettings::load(&path).await?;

    let mut conn = connect(&account).await?;
    let outcome = match cli.command {
        Commands::Tree { subscribed } => print_tree(&mut conn, subscribed).await,
        Commands::Status { mailboxes } => print_status(&mut conn, &mailboxes).await,
        Commands::Idle { mailbox, wait } => watch(&mut conn, &mailbox, Duration::from_secs(wait)).await,
    };

    if let Err(e) = conn.logout().await {
        warn!(error = %e, "logout failed");
    }
    outcome
}

/// Connects and authenticates, falling back to LOGIN for passwords when
/// the server offers no usable SASL mechanism.
async fn connect(account: &AccountSettings) -> anyhow::Result<Connection> {
    let config = account.config()?;
    let credentials = account.credentials()?;
    let mut conn = Connection::connect(config)
        .await
        .with_context(|| format!("connecting to {}", account.host))?;

    match conn.authenticate(&credentials).await {
        Ok(()) => {}
        Err(Error::Unsupported(reason)) if !credentials.is_token() => {
            info!(%reason, "falling back to LOGIN");
            let password = account.password.as_deref().unwrap_or_default();
            conn.login(&account.username, password).await?;
        }
        Err(e) => return Err(e).context("authentication failed"),
    }
    info!(host = %account.host, user = %account.username, "logged in");
    Ok(conn)
}

async fn print_tree(conn: &mut Connection, subscribed_only: bool) -> anyhow::Result<()> {
    let mut tree = Ftree::new();
    tree.populate_all(conn).await?;

    for element in &tree {
        if subscribed_only && !element.is_subscribed() && !element.has_children() {
            continue;
        }
        let depth = tree.ancestors(element.name())?.count();
        println!("{}{}{}", "  ".repeat(depth), element.label(), markers(element));
    }
    Ok(())
}

fn markers(element: &Element) -> String {
    let mut out = String::new();
    if let Some(role) = element.special_use() {
        out.push_str(&format!(" [{role:?}]"));
    }
    if element.is_container() {
        out.push_str(" (container)");
    }
    if element.is_subscribed() {
        out.push_str(" *");
    }
    out
}

async fn print_status(conn: &mut Connection, mailboxes: &[String]) -> anyhow::Result<()> {
    let items = [StatusAttribute::Messages, StatusAttribute::Recent, StatusAttribute::Unseen];
    for mailbox in mailboxes {
        let status = conn
            .status(mailbox, &items)
            .await
            .with_context(|| format!("STATUS {mailbox}"))?;
        let mut line = mailbox.clone();
        for item in status {
            match item {
                StatusItem::Messages(n) => line.push_str(&format!(" messages={n}")),
                StatusItem::Recent(n) => line.push_str(&format!(" recent={n}")),
                StatusItem::Unseen(n) => line.push_str(&format!(" unseen={n}")),
                _ => {}
            }
        }
        println!("{line}");
    }
    Ok(())
}

/// Runs IDLE until the connection fails, re-entering it whenever the
/// watchdog or the server ends it.
async fn watch(conn: &mut Connection, mailbox: &str, wait: Duration) -> anyhow::Result<()> {
    let status = conn.select(mailbox).await?;
    println!("{mailbox}: {} messages", status.exists);

    loop {
        let mut idle = conn.idle().await?;
        loop {
            match idle.wait(wait).await? {
                IdleEvent::Exists(n) => println!("exists {n}"),
                IdleEvent::Recent(n) => println!("recent {n}"),
                IdleEvent::Expunge(seq) => println!("expunge {seq}"),
                IdleEvent::Fetch { seq, flags } => {
                    let flags: Vec<&str> = flags.iter().map(|f| f.as_str()).collect();
                    println!("flags {seq} ({})", flags.join(" "));
                }
                IdleEvent::Alert(text) => println!("ALERT: {text}"),
                IdleEvent::Timeout => tracing::debug!("still idling"),
                IdleEvent::Watchdog | IdleEvent::Ended => break,
            }
        }
        info!("re-entering IDLE");
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::parse_from(["mailtree", "--config", "/tmp/a.json", "status", "INBOX", "Sent"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/a.json")));
        match cli.command {
            Commands::Status { mailboxes } => assert_eq!(mailboxes, vec!["INBOX", "Sent"]),
            other => panic!("unexpected {other:?}"),
        }

        let cli = Cli::parse_from(["mailtree", "idle"]);
        match cli.command {
            Commands::Idle { mailbox, wait } => {
                assert_eq!(mailbox, "INBOX");
                assert_eq!(wait, 60);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
