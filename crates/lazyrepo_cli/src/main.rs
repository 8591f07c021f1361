//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a file store and run one create/update/delete flush cycle.
//! - Print deterministic `key=value` lines for quick local sanity checks.
//!
//! Usage: `lazyrepo_cli [data_dir] [--connection direct|shared]`

use clap::Parser;
use lazyrepo_core::{
    init_logging, CachedDataRepository, ConnectionMode, DbError, LogConfig, Record, RecordMeta,
    RecordRepository, RepositoryManager, SqliteStore, StoreConfig,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lazyrepo", about = "Deferred-write repository smoke run", version)]
struct Cli {
    /// Directory holding the database file and logs.
    #[arg(default_value = "lazyrepo-data")]
    data_dir: PathBuf,

    /// How the store shares its database file: direct or shared.
    #[arg(long, default_value = "shared", value_parser = parse_connection)]
    connection: ConnectionMode,
}

fn parse_connection(value: &str) -> Result<ConnectionMode, DbError> {
    value.parse()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Memo {
    #[serde(flatten)]
    meta: RecordMeta,
    body: String,
}

impl Record for Memo {
    const COLLECTION: &'static str = "memos";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let data_dir = absolute(cli.data_dir)?;

    init_logging(&LogConfig::with_default_level(data_dir.join("logs"))?)?;

    let config = StoreConfig::new(&data_dir).with_connection(cli.connection);
    let store = Arc::new(SqliteStore::open(&config)?);
    let memos = Arc::new(CachedDataRepository::<Memo, _>::new(Arc::clone(&store))?);

    let manager = RepositoryManager::new();
    manager.register_repository(memos.clone());
    manager.register_callback(|| log::info!("event=cli_flush module=cli status=ok"));

    memos.create(Memo {
        meta: RecordMeta::default(),
        body: "first draft".to_string(),
    });
    let created = manager.process_queues()?;
    println!("lazyrepo created={} cached={}", created.created, memos.cached_len());

    if let Some(mut memo) = memos.get(memos.max_id()?)? {
        memo.body = "revised".to_string();
        let memo = memos.update(memo);
        let updated = manager.process_queues()?;
        println!(
            "lazyrepo id={} updated={} created_ms={} updated_ms={}",
            memo.id(),
            updated.updated,
            memo.created(),
            memo.updated()
        );

        memos.delete(&memo);
        let deleted = manager.process_queues()?;
        println!("lazyrepo deleted={} remaining={}", deleted.deleted, memos.get_all()?.len());
    }

    println!("lazyrepo version={}", lazyrepo_core::core_version());
    Ok(())
}

fn absolute(path: PathBuf) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
