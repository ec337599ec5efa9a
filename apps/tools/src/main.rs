use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::domain::{CollectionName, ItemId, Placement};
use storage::{ReassignError, Storage};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/ranks.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Collections,
    List {
        collection: String,
    },
    Add {
        collection: String,
        name: String,
        /// Store without a rank, like a legacy import.
        #[arg(long)]
        unranked: bool,
    },
    Remove {
        collection: String,
        id: String,
    },
    /// Rewrite ranks to 1..N following the current display order.
    Compact {
        collection: String,
    },
    Reorder {
        collection: String,
        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Collections => {
            for summary in storage.list_collections().await? {
                println!(
                    "{} items={} version={}",
                    summary.collection, summary.item_count, summary.version
                );
            }
        }
        Command::List { collection } => {
            let snapshot = storage
                .list_ordered(&CollectionName::parse(&collection)?)
                .await?;
            println!("version={}", snapshot.version);
            for item in snapshot.items {
                let rank = item
                    .rank
                    .map(|rank| rank.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{rank}\t{}\t{}", item.id, item.name);
            }
        }
        Command::Add {
            collection,
            name,
            unranked,
        } => {
            let placement = if unranked {
                Placement::Unranked
            } else {
                Placement::Tail
            };
            let item = storage
                .create_item(&CollectionName::parse(&collection)?, &name, placement)
                .await?;
            println!("created id={}", item.id);
        }
        Command::Remove { collection, id } => {
            let removed = storage
                .delete_item(&CollectionName::parse(&collection)?, &ItemId(id.clone()))
                .await?;
            if !removed {
                bail!("no item {id} in {collection}");
            }
            println!("removed id={id}");
        }
        Command::Compact { collection } => {
            let version = storage
                .compact_ranks(&CollectionName::parse(&collection)?)
                .await?;
            println!("compacted version={version}");
        }
        Command::Reorder { collection, ids } => {
            let ids: Vec<ItemId> = ids.into_iter().map(ItemId).collect();
            match storage
                .reassign_ranks(&CollectionName::parse(&collection)?, &ids, None)
                .await
            {
                Ok(version) => println!("reordered version={version}"),
                Err(ReassignError::InvalidPermutation(mismatch)) => {
                    bail!("rejected: {mismatch}")
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}
