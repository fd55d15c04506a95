//! Layered configuration: defaults, global file, project file, environment.
//!
//! Files are TOML patches merged onto the defaults in order
//! (global `<config_dir>/tm/config.toml`, then `<root>/config.toml`),
//! followed by `TM_*` environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TmError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("TM_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("tm/config.toml"))
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&root.join("config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| TmError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| TmError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.storage {
            self.storage.merge(patch);
        }
        if let Some(patch) = patch.embedding {
            self.embedding.merge(patch);
        }
        if let Some(patch) = patch.engine {
            self.engine.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("TM_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(value));
        }

        if let Some(value) = env_string("TM_EMBEDDING_BACKEND") {
            self.embedding.backend = value;
        }
        if let Some(value) = env_usize("TM_EMBEDDING_DIMS")? {
            self.embedding.dims = value;
        }
        if let Some(value) = env_string("TM_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = env_string("TM_EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = value;
        }
        if let Some(value) = env_u64("TM_EMBEDDING_TIMEOUT_SECS")? {
            self.embedding.timeout_secs = value;
        }

        if let Some(value) = env_usize("TM_TOP_K")? {
            self.engine.top_k = value;
        }
        if let Some(value) = env_f64("TM_ALPHA")? {
            self.engine.alpha = value;
        }
        if let Some(value) = env_f64("TM_LAMBDA")? {
            self.engine.lambda = value;
        }
        if let Some(value) = env_u64("TM_WORKLOAD_CAP")? {
            self.engine.workload_cap = u32::try_from(value)
                .map_err(|_| TmError::Config("TM_WORKLOAD_CAP out of range".to_string()))?;
        }
        if let Some(value) = env_f64("TM_URGENCY_HORIZON_HOURS")? {
            self.engine.urgency_horizon_hours = value;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.embedding.dims == 0 {
            return Err(TmError::Config(
                "embedding.dims must be greater than 0".to_string(),
            ));
        }
        if self.engine.top_k == 0 {
            return Err(TmError::Config(
                "engine.top_k must be greater than 0".to_string(),
            ));
        }
        if self.engine.lambda <= 0.0 {
            return Err(TmError::Config(
                "engine.lambda must be greater than 0".to_string(),
            ));
        }
        if self.engine.alpha < 0.0 {
            return Err(TmError::Config(
                "engine.alpha must not be negative".to_string(),
            ));
        }
        if self.engine.reward_floor >= self.engine.reward_ceiling {
            return Err(TmError::Config(
                "engine.reward_floor must be below engine.reward_ceiling".to_string(),
            ));
        }
        Ok(())
    }
}

/// Storage section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file path; defaults to `<root>/tm.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    fn merge(&mut self, patch: StoragePatch) {
        if let Some(value) = patch.db_path {
            self.db_path = Some(value);
        }
    }

    #[must_use]
    pub fn database_path(&self, root: &Path) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| root.join("tm.db"))
    }
}

/// Embedding provider section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `hash` (deterministic, offline) or `api` (remote model).
    pub backend: String,

    /// Embedding dimension D. Remote models dictate their own
    /// (e.g. 1536); the hash backend accepts any.
    pub dims: usize,

    /// Remote model identifier, `api` backend only.
    pub model: String,

    /// Remote endpoint URL, `api` backend only.
    pub endpoint: String,

    /// Name of the environment variable holding the API key.
    pub api_key_env: String,

    /// Request timeout for remote calls.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "hash".to_string(),
            dims: 384,
            model: "text-embedding-3-small".to_string(),
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            api_key_env: "TM_EMBEDDING_API_KEY".to_string(),
            timeout_secs: 5,
        }
    }
}

impl EmbeddingConfig {
    fn merge(&mut self, patch: EmbeddingPatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.dims {
            self.dims = value;
        }
        if let Some(value) = patch.model {
            self.model = value;
        }
        if let Some(value) = patch.endpoint {
            self.endpoint = value;
        }
        if let Some(value) = patch.api_key_env {
            self.api_key_env = value;
        }
        if let Some(value) = patch.timeout_secs {
            self.timeout_secs = value;
        }
    }
}

/// Assignment & learning engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Similarity filter keeps the best K candidates.
    pub top_k: usize,

    /// LinUCB exploration weight.
    pub alpha: f64,

    /// Ridge regularization; the per-arm design matrix starts at lambda * I.
    pub lambda: f64,

    /// Workload count at which an employee scores as fully loaded.
    pub workload_cap: u32,

    /// Hours-until-due horizon for the urgency feature.
    pub urgency_horizon_hours: f64,

    /// Months of experience/tenure that count as 1.0.
    pub skill_norm_months: f64,

    /// Expected completion days: `max(min_expected_days, difficulty * days_per_difficulty)`.
    pub min_expected_days: f64,
    pub days_per_difficulty: f64,

    pub completion_reward: f64,
    pub ontime_bonus: f64,
    pub good_behaviour_bonus: f64,
    pub overdue_penalty_per_day: f64,
    pub overdue_cap_days: u32,
    pub rework_penalty: f64,
    pub failure_penalty: f64,

    pub reward_floor: f64,
    pub reward_ceiling: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            alpha: 1.0,
            lambda: 1.0,
            workload_cap: 10,
            urgency_horizon_hours: 72.0,
            skill_norm_months: 60.0,
            min_expected_days: 1.0,
            days_per_difficulty: 1.0,
            completion_reward: 1.0,
            ontime_bonus: 0.5,
            good_behaviour_bonus: 0.2,
            overdue_penalty_per_day: 0.4,
            overdue_cap_days: 7,
            rework_penalty: 0.5,
            failure_penalty: 1.2,
            reward_floor: -2.0,
            reward_ceiling: 2.0,
        }
    }
}

impl EngineConfig {
    fn merge(&mut self, patch: EnginePatch) {
        if let Some(value) = patch.top_k {
            self.top_k = value;
        }
        if let Some(value) = patch.alpha {
            self.alpha = value;
        }
        if let Some(value) = patch.lambda {
            self.lambda = value;
        }
        if let Some(value) = patch.workload_cap {
            self.workload_cap = value;
        }
        if let Some(value) = patch.urgency_horizon_hours {
            self.urgency_horizon_hours = value;
        }
        if let Some(value) = patch.skill_norm_months {
            self.skill_norm_months = value;
        }
        if let Some(value) = patch.min_expected_days {
            self.min_expected_days = value;
        }
        if let Some(value) = patch.days_per_difficulty {
            self.days_per_difficulty = value;
        }
        if let Some(value) = patch.completion_reward {
            self.completion_reward = value;
        }
        if let Some(value) = patch.ontime_bonus {
            self.ontime_bonus = value;
        }
        if let Some(value) = patch.good_behaviour_bonus {
            self.good_behaviour_bonus = value;
        }
        if let Some(value) = patch.overdue_penalty_per_day {
            self.overdue_penalty_per_day = value;
        }
        if let Some(value) = patch.overdue_cap_days {
            self.overdue_cap_days = value;
        }
        if let Some(value) = patch.rework_penalty {
            self.rework_penalty = value;
        }
        if let Some(value) = patch.failure_penalty {
            self.failure_penalty = value;
        }
        if let Some(value) = patch.reward_floor {
            self.reward_floor = value;
        }
        if let Some(value) = patch.reward_ceiling {
            self.reward_ceiling = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    storage: Option<StoragePatch>,
    embedding: Option<EmbeddingPatch>,
    engine: Option<EnginePatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StoragePatch {
    db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EmbeddingPatch {
    backend: Option<String>,
    dims: Option<usize>,
    model: Option<String>,
    endpoint: Option<String>,
    api_key_env: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EnginePatch {
    top_k: Option<usize>,
    alpha: Option<f64>,
    lambda: Option<f64>,
    workload_cap: Option<u32>,
    urgency_horizon_hours: Option<f64>,
    skill_norm_months: Option<f64>,
    min_expected_days: Option<f64>,
    days_per_difficulty: Option<f64>,
    completion_reward: Option<f64>,
    ontime_bonus: Option<f64>,
    good_behaviour_bonus: Option<f64>,
    overdue_penalty_per_day: Option<f64>,
    overdue_cap_days: Option<u32>,
    rework_penalty: Option<f64>,
    failure_penalty: Option<f64>,
    reward_floor: Option<f64>,
    reward_ceiling: Option<f64>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    env_string(key)
        .map(|v| {
            v.parse()
                .map_err(|_| TmError::Config(format!("{key} must be an integer, got {v:?}")))
        })
        .transpose()
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    env_string(key)
        .map(|v| {
            v.parse()
                .map_err(|_| TmError::Config(format!("{key} must be an integer, got {v:?}")))
        })
        .transpose()
}

fn env_f64(key: &str) -> Result<Option<f64>> {
    env_string(key)
        .map(|v| {
            v.parse()
                .map_err(|_| TmError::Config(format!("{key} must be a number, got {v:?}")))
        })
        .transpose()
}
