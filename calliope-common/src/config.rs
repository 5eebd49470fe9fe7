//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "CALLIOPE_ROOT_FOLDER";

/// Service settings file expected inside the root folder
pub const SERVICE_CONFIG_FILE: &str = "calliope.toml";

const DATABASE_FILE: &str = "calliope.db";
const UPLOADS_DIR: &str = "uploads";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = load_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Some(root_folder) = root_folder_from_toml(&toml_content) {
                return root_folder;
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    get_default_root_folder()
}

/// Extract the `root_folder` key from a user-level config file
fn root_folder_from_toml(content: &str) -> Option<PathBuf> {
    let config = toml::from_str::<toml::Value>(content).ok()?;
    config
        .get("root_folder")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
}

/// Get the user-level configuration file path for the platform
fn load_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("calliope").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/calliope/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("calliope"))
        .unwrap_or_else(|| PathBuf::from("./calliope_data"))
}

/// Layout of everything the service keeps on disk
#[derive(Debug, Clone)]
pub struct RootFolder {
    path: PathBuf,
}

impl RootFolder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn database_path(&self) -> PathBuf {
        self.path.join(DATABASE_FILE)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.path.join(UPLOADS_DIR)
    }

    pub fn service_config_path(&self) -> PathBuf {
        self.path.join(SERVICE_CONFIG_FILE)
    }

    /// Create the root folder and upload directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.path)?;
        std::fs::create_dir_all(self.uploads_dir())?;
        Ok(())
    }
}

/// Service settings read from `calliope.toml`
///
/// Every key is optional; missing keys fall back to [`ServiceConfig::default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port to listen on
    pub port: u16,
    /// Lifetime of issued bearer tokens, in seconds
    pub token_ttl_secs: i64,
    /// Largest accepted upload after base64 decoding, in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
            token_ttl_secs: 24 * 60 * 60,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Load settings from a TOML file, or defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No service config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.token_ttl_secs <= 0 {
            return Err(Error::Config("token_ttl_secs must be positive".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wins() {
        let resolved = resolve_root_folder(Some(Path::new("/srv/calliope")), ROOT_FOLDER_ENV);
        assert_eq!(resolved, PathBuf::from("/srv/calliope"));
    }

    #[test]
    fn test_root_folder_from_toml() {
        let parsed = root_folder_from_toml("root_folder = \"/data/books\"\n");
        assert_eq!(parsed, Some(PathBuf::from("/data/books")));
        assert_eq!(root_folder_from_toml("port = 1"), None);
        assert_eq!(root_folder_from_toml("not toml ["), None);
    }

    #[test]
    fn test_root_folder_layout() {
        let root = RootFolder::new("/srv/calliope");
        assert_eq!(root.database_path(), PathBuf::from("/srv/calliope/calliope.db"));
        assert_eq!(root.uploads_dir(), PathBuf::from("/srv/calliope/uploads"));
        assert_eq!(
            root.service_config_path(),
            PathBuf::from("/srv/calliope/calliope.toml")
        );
    }

    #[test]
    fn test_partial_service_config_keeps_defaults() {
        let config = ServiceConfig::from_toml("port = 8080\n").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.token_ttl_secs, 86_400);
    }

    #[test]
    fn test_invalid_service_config_rejected() {
        assert!(ServiceConfig::from_toml("token_ttl_secs = 0\n").is_err());
        assert!(ServiceConfig::from_toml("port = \"eighty\"\n").is_err());
    }

    #[test]
    fn test_missing_service_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::load(&dir.path().join("calliope.toml")).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }
}
