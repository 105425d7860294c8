use crate::agent::AmbiguityPolicy;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_ENV: &str = "HELIOS_CONFIG_DIR";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level Helios configuration, loaded from `config.toml`.
///
/// Resolution order: `HELIOS_CONFIG_DIR` env → `~/.helios/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml - computed, not serialized
    #[serde(skip)]
    pub config_dir: PathBuf,
    /// Path to config.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// API key for the completion service. Overridden by `HELIOS_API_KEY` or `API_KEY` env vars.
    pub api_key: Option<String>,
    /// Base URL override for the provider API (e.g. "http://10.0.0.1:11434/v1" for remote Ollama)
    pub api_url: Option<String>,
    /// Provider ID (`"ollama"`, `"openai"`, `"custom:<url>"`). Default: `"ollama"`.
    pub default_provider: Option<String>,
    /// Model name passed to the provider. Default: `"llama3"`.
    pub default_model: Option<String>,
    /// Sampling temperature (0.0-2.0). Default: `0.7`.
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    /// Reasoning loop limits and policies (`[agent]`).
    #[serde(default)]
    pub agent: AgentConfig,

    /// Conversation memory settings (`[memory]`).
    #[serde(default)]
    pub memory: MemoryConfig,

    /// HTTP gateway settings (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// ERP database location (`[database]`).
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Observability backend configuration (`[observability]`).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_provider() -> String {
    "ollama".into()
}

fn default_model() -> String {
    "llama3".into()
}

// ── Agent ─────────────────────────────────────────────────────────

/// Reasoning loop configuration (`[agent]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum think/act iterations per loop. Default: `10`.
    /// Setting to `0` falls back to the safe default of `10`.
    #[serde(default = "default_agent_max_iterations")]
    pub max_iterations: usize,
    /// Wall-clock ceiling per loop in seconds. Default: `60`.
    #[serde(default = "default_agent_max_execution_secs")]
    pub max_execution_secs: u64,
    /// Fail the request on unknown actions, parse errors and tool errors
    /// instead of feeding them back to the model. Default: `false`.
    #[serde(default)]
    pub strict: bool,
    /// Which marker wins when a completion has both an action and a final
    /// answer: `"final_answer"`, `"action"` or `"reject"`. Default: `"final_answer"`.
    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,
    /// Answer returned when a loop runs out of iterations or time.
    #[serde(default = "default_agent_fallback_answer")]
    pub fallback_answer: String,
}

fn default_agent_max_iterations() -> usize {
    10
}

fn default_agent_max_execution_secs() -> u64 {
    60
}

fn default_agent_fallback_answer() -> String {
    crate::agent::loop_::DEFAULT_FALLBACK_ANSWER.into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_agent_max_iterations(),
            max_execution_secs: default_agent_max_execution_secs(),
            strict: false,
            ambiguity: AmbiguityPolicy::default(),
            fallback_answer: default_agent_fallback_answer(),
        }
    }
}

// ── Memory ────────────────────────────────────────────────────────

/// Conversation memory configuration (`[memory]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Exchanges kept per conversation (k). Default: `5`.
    #[serde(default = "default_memory_window")]
    pub window: usize,
    /// Key memory by the request's session id. When false every request
    /// shares one conversation. Default: `true`.
    #[serde(default = "default_true")]
    pub per_session: bool,
    /// Sessions kept in memory before the least recently used is evicted.
    /// Default: `1024`.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Seconds a session may sit idle before it is dropped. Default: `3600`.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_memory_window() -> usize {
    crate::memory::DEFAULT_WINDOW
}

fn default_max_sessions() -> usize {
    crate::sessions::DEFAULT_MAX_SESSIONS
}

fn default_session_idle_secs() -> u64 {
    crate::sessions::DEFAULT_IDLE_TTL.as_secs()
}

fn default_true() -> bool {
    true
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window: default_memory_window(),
            per_session: true,
            max_sessions: default_max_sessions(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────────

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Gateway port (default: 8000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Origins allowed by CORS (default: the local chat UI on port 8501)
    #[serde(default = "default_gateway_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Whole-request timeout in seconds (default: 120)
    #[serde(default = "default_gateway_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum request body size in bytes (default: 64 KiB)
    #[serde(default = "default_gateway_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:8501".into(),
        "http://127.0.0.1:8501".into(),
    ]
}

fn default_gateway_request_timeout_secs() -> u64 {
    120
}

fn default_gateway_max_body_bytes() -> usize {
    65_536
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            cors_origins: default_gateway_cors_origins(),
            request_timeout_secs: default_gateway_request_timeout_secs(),
            max_body_bytes: default_gateway_max_body_bytes(),
        }
    }
}

// ── Database ──────────────────────────────────────────────────────

/// ERP database configuration (`[database]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file. Relative paths resolve against the config directory.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("erp.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

// ── Observability ─────────────────────────────────────────────────

/// Observability configuration (`[observability]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `"log"`, `"prometheus"` or `"none"`. Default: `"log"`.
    #[serde(default = "default_observability_backend")]
    pub backend: String,
    /// `"compact"`, `"pretty"` or `"json"`. Default: `"compact"`.
    #[serde(default = "default_observability_log_format")]
    pub log_format: String,
}

fn default_observability_backend() -> String {
    "log".into()
}

fn default_observability_log_format() -> String {
    "compact".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: default_observability_backend(),
            log_format: default_observability_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let helios_dir = home.join(".helios");

        Self {
            config_path: helios_dir.join(CONFIG_FILE_NAME),
            config_dir: helios_dir,
            api_key: None,
            api_url: None,
            default_provider: Some(default_provider()),
            default_model: Some(default_model()),
            default_temperature: default_temperature(),
            agent: AgentConfig::default(),
            memory: MemoryConfig::default(),
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        let dir = dir.trim();
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".helios"))
}

fn is_valid_temperature(value: f64) -> bool {
    (0.0..=2.0).contains(&value)
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = default_config_dir()?;
        Self::load_or_init_in(&config_dir).await
    }

    /// Load `config.toml` from `config_dir`, writing a default one first if
    /// none exists. Env overrides are applied and the result validated.
    pub async fn load_or_init_in(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        fs::create_dir_all(config_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let initialized = if config_path.exists() {
            false
        } else {
            let config = Config {
                config_dir: config_dir.to_path_buf(),
                config_path: config_path.clone(),
                ..Config::default()
            };
            config.save().await?;

            // Restrict permissions on newly created config file (may contain API keys)
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(&config_path, Permissions::from_mode(0o600)).await;
            }
            true
        };

        // Warn if config file is world-readable (may contain API keys)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = fs::metadata(&config_path).await {
                if meta.permissions().mode() & 0o004 != 0 {
                    tracing::warn!(
                        "Config file {:?} is world-readable (mode {:o}). \
                         Consider restricting with: chmod 600 {:?}",
                        config_path,
                        meta.permissions().mode() & 0o777,
                        config_path,
                    );
                }
            }
        }

        let contents = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;
        let mut config: Config =
            toml::from_str(&contents).context("Failed to parse config file")?;
        // Set computed paths that are skipped during serialization
        config.config_dir = config_dir.to_path_buf();
        config.config_path = config_path;

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            database = %config.database_path().display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    pub fn provider_name(&self) -> &str {
        self.default_provider.as_deref().unwrap_or("ollama")
    }

    pub fn model_name(&self) -> &str {
        self.default_model.as_deref().unwrap_or("llama3")
    }

    /// Absolute database path; relative config values resolve against the
    /// config directory.
    pub fn database_path(&self) -> PathBuf {
        if self.database.path.is_absolute() {
            self.database.path.clone()
        } else {
            self.config_dir.join(&self.database.path)
        }
    }

    /// Validate configuration values that would cause runtime failures.
    ///
    /// Called after TOML deserialization and env-override application to catch
    /// obviously invalid values early instead of failing at arbitrary runtime points.
    pub fn validate(&self) -> Result<()> {
        // Gateway
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }

        // Memory
        if self.memory.window == 0 {
            anyhow::bail!("memory.window must be greater than 0");
        }
        if self.memory.max_sessions == 0 {
            anyhow::bail!("memory.max_sessions must be greater than 0");
        }

        // Agent
        if self.agent.max_execution_secs == 0 {
            anyhow::bail!("agent.max_execution_secs must be greater than 0");
        }

        if !is_valid_temperature(self.default_temperature) {
            anyhow::bail!(
                "default_temperature must be between 0.0 and 2.0 (got {})",
                self.default_temperature
            );
        }

        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // API Key: HELIOS_API_KEY or API_KEY (generic)
        if let Ok(key) = std::env::var("HELIOS_API_KEY").or_else(|_| std::env::var("API_KEY")) {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }

        if let Ok(provider) = std::env::var("HELIOS_PROVIDER") {
            if !provider.trim().is_empty() {
                self.default_provider = Some(provider.trim().to_string());
            }
        }

        if let Ok(model) = std::env::var("HELIOS_MODEL") {
            if !model.trim().is_empty() {
                self.default_model = Some(model.trim().to_string());
            }
        }

        if let Ok(url) = std::env::var("HELIOS_API_URL") {
            if !url.trim().is_empty() {
                self.api_url = Some(url.trim().to_string());
            }
        }

        if let Ok(host) = std::env::var("HELIOS_GATEWAY_HOST") {
            if !host.trim().is_empty() {
                self.gateway.host = host.trim().to_string();
            }
        }

        // Port: HELIOS_GATEWAY_PORT or PORT (container platforms)
        if let Ok(port) = std::env::var("HELIOS_GATEWAY_PORT").or_else(|_| std::env::var("PORT"))
        {
            match port.trim().parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid gateway port override"),
            }
        }

        if let Ok(path) = std::env::var("HELIOS_DATABASE_PATH") {
            if !path.trim().is_empty() {
                self.database.path = PathBuf::from(path.trim());
            }
        }

        // Temperature: only accepted within the valid range
        if let Ok(temp) = std::env::var("HELIOS_TEMPERATURE") {
            if let Ok(value) = temp.trim().parse::<f64>() {
                if is_valid_temperature(value) {
                    self.default_temperature = value;
                }
            }
        }
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(CONFIG_FILE_NAME);
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));
        let backup_path = parent_dir.join(format!("{file_name}.bak"));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        let had_existing_config = self.config_path.exists();
        if had_existing_config {
            fs::copy(&self.config_path, &backup_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to create config backup before atomic replace: {}",
                        backup_path.display()
                    )
                })?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            if had_existing_config && backup_path.exists() {
                fs::copy(&backup_path, &self.config_path)
                    .await
                    .context("Failed to restore config backup")?;
            }
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await?;

        if had_existing_config {
            let _ = fs::remove_file(&backup_path).await;
        }

        Ok(())
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::{Mutex, MutexGuard};
    use tokio::test;

    // ── Defaults ─────────────────────────────────────────────

    #[test]
    async fn config_default_has_sane_values() {
        let c = Config::default();
        assert_eq!(c.provider_name(), "ollama");
        assert_eq!(c.model_name(), "llama3");
        assert!((c.default_temperature - 0.7).abs() < f64::EPSILON);
        assert!(c.api_key.is_none());
        assert!(c.config_path.ends_with(".helios/config.toml"));
    }

    #[test]
    async fn section_defaults() {
        let c = Config::default();
        assert_eq!(c.agent.max_iterations, 10);
        assert_eq!(c.agent.max_execution_secs, 60);
        assert!(!c.agent.strict);
        assert_eq!(c.agent.ambiguity, AmbiguityPolicy::FinalAnswer);
        assert_eq!(
            c.agent.fallback_answer,
            "Agent stopped due to iteration limit or time limit."
        );
        assert_eq!(c.memory.window, 5);
        assert!(c.memory.per_session);
        assert_eq!(c.gateway.host, "127.0.0.1");
        assert_eq!(c.gateway.port, 8000);
        assert_eq!(c.gateway.cors_origins.len(), 2);
        assert_eq!(c.observability.backend, "log");
    }

    // ── Serde ────────────────────────────────────────────────

    #[test]
    async fn partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
default_provider = "openai"
default_model = "gpt-4o-mini"

[agent]
strict = true
ambiguity = "reject"

[gateway]
port = 9100
"#,
        )
        .unwrap();
        assert_eq!(parsed.provider_name(), "openai");
        assert!(parsed.agent.strict);
        assert_eq!(parsed.agent.ambiguity, AmbiguityPolicy::Reject);
        assert_eq!(parsed.agent.max_iterations, 10);
        assert_eq!(parsed.gateway.port, 9100);
        assert_eq!(parsed.gateway.host, "127.0.0.1");
        assert_eq!(parsed.memory.window, 5);
        assert!((parsed.default_temperature - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    async fn config_toml_roundtrip() {
        let mut config = Config::default();
        config.api_key = Some("test-key".into());
        config.memory.window = 8;
        config.observability.backend = "prometheus".into();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.api_key, config.api_key);
        assert_eq!(parsed.memory.window, 8);
        assert_eq!(parsed.observability.backend, "prometheus");
        assert!(!toml_str.contains("config_path"));
    }

    // ── Load / save ──────────────────────────────────────────

    #[test]
    async fn load_or_init_writes_default_file() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("helios");

        let config = Config::load_or_init_in(&dir).await.unwrap();
        assert!(dir.join("config.toml").exists());
        assert_eq!(config.config_dir, dir);
        assert_eq!(config.database_path(), dir.join("erp.db"));

        let mut entries = fs::read_dir(&dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().into_owned();
            assert!(!name.contains(".tmp-"), "temp file left behind: {name}");
        }
    }

    #[test]
    async fn load_or_init_reads_existing_file() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "default_model = \"mistral\"\n[memory]\nwindow = 3\n[database]\npath = \"/var/lib/helios/erp.db\"\n",
        )
        .await
        .unwrap();

        let config = Config::load_or_init_in(tmp.path()).await.unwrap();
        assert_eq!(config.model_name(), "mistral");
        assert_eq!(config.memory.window, 3);
        assert_eq!(config.memory.max_sessions, 1024);
        assert_eq!(config.memory.session_idle_secs, 3600);
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/helios/erp.db"));
    }

    #[test]
    async fn load_rejects_invalid_values() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[memory]\nwindow = 0\n")
            .await
            .unwrap();

        let err = Config::load_or_init_in(tmp.path()).await.unwrap_err();
        assert!(err.to_string().contains("memory.window"));

        fs::write(tmp.path().join("config.toml"), "[memory]\nmax_sessions = 0\n")
            .await
            .unwrap();
        let err = Config::load_or_init_in(tmp.path()).await.unwrap_err();
        assert!(err.to_string().contains("memory.max_sessions"));
    }

    #[test]
    async fn save_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config {
            config_dir: tmp.path().to_path_buf(),
            config_path: tmp.path().join("config.toml"),
            ..Config::default()
        };
        config.save().await.unwrap();
        config.gateway.port = 9999;
        config.save().await.unwrap();

        let contents = fs::read_to_string(&config.config_path).await.unwrap();
        assert!(contents.contains("port = 9999"));
        assert!(!tmp.path().join("config.toml.bak").exists());
    }

    // ── Validation ───────────────────────────────────────────

    #[test]
    async fn validate_rejects_bad_values() {
        let mut c = Config::default();
        c.gateway.host = "  ".into();
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.agent.max_execution_secs = 0;
        assert!(c.validate().unwrap_err().to_string().contains("max_execution_secs"));

        let mut c = Config::default();
        c.default_temperature = 3.5;
        assert!(c.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    // ── Env override helpers ─────────────────────────────────

    async fn env_override_lock() -> MutexGuard<'static, ()> {
        static ENV_OVERRIDE_TEST_LOCK: Mutex<()> = Mutex::const_new(());
        ENV_OVERRIDE_TEST_LOCK.lock().await
    }

    fn clear_env_test_vars() {
        for key in [
            "HELIOS_API_KEY",
            "API_KEY",
            "HELIOS_PROVIDER",
            "HELIOS_MODEL",
            "HELIOS_API_URL",
            "HELIOS_GATEWAY_HOST",
            "HELIOS_GATEWAY_PORT",
            "PORT",
            "HELIOS_DATABASE_PATH",
            "HELIOS_TEMPERATURE",
        ] {
            std::env::remove_var(key);
        }
    }

    // ── Env override tests ───────────────────────────────────

    #[test]
    async fn env_override_api_key() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("HELIOS_API_KEY", "env-key");
        config.apply_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("env-key"));

        std::env::remove_var("HELIOS_API_KEY");
    }

    #[test]
    async fn env_override_api_key_fallback() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("API_KEY", "fallback-key");
        config.apply_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("fallback-key"));

        std::env::remove_var("API_KEY");
    }

    #[test]
    async fn env_override_provider_and_model() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("HELIOS_PROVIDER", "openai");
        std::env::set_var("HELIOS_MODEL", "gpt-4o");
        config.apply_env_overrides();
        assert_eq!(config.provider_name(), "openai");
        assert_eq!(config.model_name(), "gpt-4o");

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_port_and_fallback() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("PORT", "8080");
        config.apply_env_overrides();
        assert_eq!(config.gateway.port, 8080);

        std::env::set_var("HELIOS_GATEWAY_PORT", "not-a-port");
        config.apply_env_overrides();
        assert_eq!(config.gateway.port, 8080);

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_temperature_respects_range() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("HELIOS_TEMPERATURE", "0.2");
        config.apply_env_overrides();
        assert!((config.default_temperature - 0.2).abs() < f64::EPSILON);

        std::env::set_var("HELIOS_TEMPERATURE", "5.0");
        config.apply_env_overrides();
        assert!((config.default_temperature - 0.2).abs() < f64::EPSILON);

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_database_path() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("HELIOS_DATABASE_PATH", "/tmp/other.db");
        config.apply_env_overrides();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/other.db"));

        clear_env_test_vars();
    }
}
