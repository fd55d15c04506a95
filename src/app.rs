//! Application context: resolved root, config, and a wired engine.

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::embedding::build_embedder;
use crate::engine::Engine;
use crate::error::{Result, TmError};
use crate::storage::Database;

/// Everything a command handler needs, built once per invocation.
pub struct AppContext {
    pub root: PathBuf,
    pub config: Config,
    pub engine: Engine,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = resolve_root(cli.root.as_deref())?;
        let config = Config::load(cli.config.as_deref(), &root)?;
        let db = Database::open(config.storage.database_path(&root))?;
        let embedder = build_embedder(&config.embedding)?;
        let engine = Engine::new(db, embedder, Box::new(SystemClock), config.engine.clone());

        Ok(Self {
            root,
            config,
            engine,
        })
    }
}

/// Root resolution order: explicit flag, `TM_ROOT`, platform data dir.
pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(raw) = std::env::var("TM_ROOT") {
        if !raw.trim().is_empty() {
            return Ok(PathBuf::from(raw));
        }
    }
    dirs::data_dir()
        .map(|dir| dir.join("tm"))
        .ok_or_else(|| {
            TmError::Config("cannot determine a data directory; pass --root".to_string())
        })
}
