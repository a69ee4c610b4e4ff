use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Deep link the auth e-mails send users back to
pub const DEFAULT_REDIRECT_URL: &str = "prolaunchhub://";

/// Settings loading errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: basic_toml::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LaunchhubSettings {
    pub backend: BackendSettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Project URL of the hosted backend, e.g. `https://abc.supabase.co`
    pub url: String,
    /// Public (anon) API key sent with every request
    pub anon_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub redirect_url: String,
    /// Refresh sessions this many seconds before they expire
    pub refresh_margin_seconds: i64,
    /// How often the background refresher checks the session. If 0, auto refresh is disabled.
    pub auto_refresh_interval_seconds: u64,
    /// Minimum password length enforced by the sign-up form
    pub min_password_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Where the current session is kept between launches
    pub session_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            refresh_margin_seconds: 10,
            auto_refresh_interval_seconds: 30,
            min_password_length: 6,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            session_file: ".launchhub/session.json".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LaunchhubSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// This also loads the `.env` file and initializes the logger.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_env_file();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        Self::initialize_logging(&settings.logging);

        Ok(settings)
    }

    /// Initialize `env_logger` with the configured level unless `RUST_LOG` says otherwise
    fn initialize_logging(logging: &LoggingSettings) {
        let env = env_logger::Env::default().default_filter_or(logging.level.clone());
        if env_logger::Builder::from_env(env).try_init().is_err() {
            log::debug!("Logger already initialized");
        }
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `LAUNCHHUB_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    fn load_base_settings() -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        let default_config_path = PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(default_config_path)?;
        }

        if let Ok(secrets_dir) = std::env::var("LAUNCHHUB_SECRETS_DIR") {
            let secrets_path = PathBuf::from(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_file(secrets_path)?;
            }
        }

        Ok(settings)
    }

    /// Parse a single TOML settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    pub fn from_file(path: PathBuf) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;
        basic_toml::from_str(&contents).map_err(|source| SettingsError::Parse { path, source })
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_backend_env_overrides(&mut settings.backend);
        Self::apply_auth_env_overrides(&mut settings.auth);
        Self::apply_storage_env_overrides(&mut settings.storage);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_backend_env_overrides(backend: &mut BackendSettings) {
        if let Ok(url) = std::env::var("LAUNCHHUB_URL") {
            backend.url = url;
        }
        if let Ok(anon_key) = std::env::var("LAUNCHHUB_ANON_KEY") {
            backend.anon_key = anon_key;
        }
    }

    fn apply_auth_env_overrides(auth: &mut AuthSettings) {
        if let Ok(redirect_url) = std::env::var("LAUNCHHUB_REDIRECT_URL") {
            auth.redirect_url = redirect_url;
        }
        Self::apply_numeric_env_override(
            "LAUNCHHUB_REFRESH_MARGIN_SECONDS",
            &mut auth.refresh_margin_seconds,
        );
        Self::apply_numeric_env_override(
            "LAUNCHHUB_AUTO_REFRESH_INTERVAL_SECONDS",
            &mut auth.auto_refresh_interval_seconds,
        );
        Self::apply_numeric_env_override(
            "LAUNCHHUB_MIN_PASSWORD_LENGTH",
            &mut auth.min_password_length,
        );
    }

    fn apply_storage_env_overrides(storage: &mut StorageSettings) {
        if let Ok(session_file) = std::env::var("LAUNCHHUB_SESSION_FILE") {
            storage.session_file = session_file;
        }
    }

    fn apply_logging_env_overrides(logging: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging.level = log_level;
        }
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override<T: std::str::FromStr>(env_var: &str, target: &mut T) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<T>() {
                *target = value;
            } else {
                log::warn!("Ignoring invalid {env_var}={value_str}");
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Interval for the background session refresher, `None` when disabled
    #[must_use]
    pub fn auto_refresh_interval(&self) -> Option<std::time::Duration> {
        (self.auth.auto_refresh_interval_seconds > 0)
            .then(|| std::time::Duration::from_secs(self.auth.auto_refresh_interval_seconds))
    }
}
