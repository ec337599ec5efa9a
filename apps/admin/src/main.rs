use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    ConcurrencyPolicy, ControllerOptions, Gesture, HttpOrderStore, ReorderController,
    ReorderOutcome,
};
use shared::domain::{CollectionName, OrderedItem};
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "RANKS_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[arg(long, default_value = "executives")]
    collection: String,
    /// Reject the reorder if someone else changed the collection meanwhile.
    #[arg(long)]
    versioned: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Drag the item at position `from` to position `to` (1-based).
    Move {
        #[arg(long)]
        from: usize,
        #[arg(long)]
        to: usize,
    },
    Up {
        #[arg(long)]
        position: usize,
    },
    Down {
        #[arg(long)]
        position: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let collection = CollectionName::parse(&args.collection)?;
    let store = HttpOrderStore::new(&args.server_url)
        .with_context(|| format!("invalid server url {}", args.server_url))?;
    let options = ControllerOptions {
        policy: if args.versioned {
            ConcurrencyPolicy::Versioned
        } else {
            ConcurrencyPolicy::LastWriterWins
        },
        ..ControllerOptions::default()
    };
    let controller = ReorderController::load(Arc::new(store), &collection, options)
        .await
        .with_context(|| format!("failed to load collection {collection}"))?;

    let gesture = match args.command {
        Command::List { search, json } => {
            if let Some(term) = search {
                controller.set_filter(term).await;
            }
            let items = controller.visible_items().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                print_items(&items);
            }
            return Ok(());
        }
        Command::Move { from, to } => Gesture::Drop {
            source: to_index(from)?,
            destination: to_index(to)?,
        },
        Command::Up { position } => Gesture::MoveUp {
            index: to_index(position)?,
        },
        Command::Down { position } => Gesture::MoveDown {
            index: to_index(position)?,
        },
    };

    controller.enter_reorder_mode().await;
    let result = controller.apply_gesture(gesture).await;
    if let Some(notice) = controller.current_notice().await {
        println!("{}", notice.message);
    }
    match result? {
        ReorderOutcome::Unchanged => println!("Order unchanged."),
        ReorderOutcome::Committed { version } => info!(%collection, version, "order saved"),
    }
    print_items(controller.view().await.items());
    Ok(())
}

fn to_index(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .context("positions start at 1")
}

fn print_items(items: &[OrderedItem]) {
    if items.is_empty() {
        println!("(no items)");
        return;
    }
    for (index, item) in items.iter().enumerate() {
        let rank = item
            .rank
            .map(|rank| rank.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:>3}. {} (rank {rank}, id {})", index + 1, item.name, item.id);
    }
}
