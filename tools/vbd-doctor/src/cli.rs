//! Command-line arguments and settings layering.
//!
//! Precedence, lowest first: built-in defaults, `--config` file, flags.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::warn;
use vbd_sharding::{
    BatchOptions, ConnectionConfig, ConnectionOverrides, LocatorError, RepairOptions,
    TomlConfigProvider, DEFAULT_COLLECTION,
};

/// vbd-doctor: find documents stored on the wrong vbucket and move them home
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "vbd-doctor", version)]
#[command(about = "Locate documents across vbuckets, restore misplaced copies, remove strays")]
pub struct Args {
    /// Bucket to open [default: default]
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Username [default: Administrator]
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password [default: password]
    #[arg(short, long, env = "VBD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Seed node hostname [default: localhost]
    #[arg(long)]
    pub host: Option<String>,

    /// Seed node KV port [default: 11210]
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Use encrypted transport (nodes are reached on the seed port)
    #[arg(long)]
    pub tls: bool,

    /// Document identifier (repeatable)
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<String>,

    /// JSON file holding a list of identifiers
    #[arg(long, value_name = "FILE")]
    pub ids_file: Option<PathBuf>,

    /// Collection path as scope.collection [default: _default._default]
    #[arg(long)]
    pub collection: Option<String>,

    /// Include document values in the output
    #[arg(long)]
    pub value: bool,

    /// Query every vbucket instead of only the one the key hashes to
    /// (implied by --restore and --delete)
    #[arg(long)]
    pub search_all_vbs: bool,

    /// Re-create misplaced documents on their correct vbucket
    #[arg(long)]
    pub restore: bool,

    /// Delete misplaced copies (after a successful restore when --restore is set)
    #[arg(long)]
    pub delete: bool,

    /// Write an empty JSON document for each id directly on this vbucket
    #[arg(
        long = "seed-vb",
        value_name = "VB",
        conflicts_with_all = ["restore", "delete", "search_all_vbs"]
    )]
    pub seed_vb: Option<usize>,

    /// TOML file with connection defaults
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-operation timeout in seconds [default: 10]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Everything a run needs, after layering.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Connection to the seed node
    pub connection: ConnectionConfig,
    /// Lookup and repair behavior
    pub batch: BatchOptions,
}

impl Args {
    /// Connection fields given on the command line.
    pub fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            host: self.host.clone(),
            port: self.port,
            tls: self.tls.then_some(true),
            bucket: self.bucket.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout_secs,
        }
    }

    /// Merge defaults, the config file and the flags.
    pub fn settings(&self) -> Result<Settings, LocatorError> {
        let file = match &self.config {
            Some(path) => TomlConfigProvider::load(path)?,
            None => TomlConfigProvider::default(),
        };

        let mut connection = file.connection_config();
        self.overrides().apply(&mut connection);
        connection.validate()?;

        let collection = self
            .collection
            .clone()
            .or_else(|| file.collection().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());

        let repair = RepairOptions {
            restore: self.restore,
            delete: self.delete,
        };
        let mut search_all_shards = self.search_all_vbs || file.search_all_vbs().unwrap_or(false);
        if repair.any() && !search_all_shards {
            // the owning shard alone never yields a misplaced copy
            warn!("[vbd] --restore/--delete need every vbucket searched; enabling --search-all-vbs");
            search_all_shards = true;
        }

        let batch = BatchOptions {
            collection,
            search_all_shards,
            show_values: self.value,
            repair,
        };

        Ok(Settings { connection, batch })
    }

    /// Log filter implied by `-v`, if any.
    pub fn log_level(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("info"),
            2 => Some("debug"),
            _ => Some("trace"),
        }
    }
}
