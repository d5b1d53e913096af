// src/settings.rs

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, File};
use directories::ProjectDirs;
use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

const DEFAULT_ADDR: &str = "127.0.0.1:8000";
pub(crate) const DEFAULT_CACHE_TTL_MINUTES: i64 = 30;
const MAX_CACHE_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub address: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Api {
    /// Base URL of the remote trial API, e.g. `https://trials.example.com`.
    pub base_url: String,
    /// Request timeout in seconds. Requests never time out when unset.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Database {
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Cache {
    pub ttl_minutes: i64,
}

impl Cache {
    pub fn ttl(&self) -> SignedDuration {
        SignedDuration::from_mins(self.ttl_minutes)
    }
}

/// Offline demo credential. Login with exactly this email and password skips
/// the remote login call and seeds the session with the sentinel values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Auth {
    pub demo_email: Option<String>,
    pub demo_password: Option<String>,
    pub demo_token: Option<String>,
    pub demo_user_id: Option<String>,
    pub demo_role: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Export {
    /// Directory that `exportTrial` writes `trial_<id>.json` into. Exports
    /// are only returned inline when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub web: Web,
    pub api: Api,
    pub database: Database,
    pub cache: Cache,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub export: Export,
}

impl Settings {
    /// Load settings from the given TOML file, with sane defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let builder = ConfigBuilder::<DefaultState>::default()
            .set_default("web.address", DEFAULT_ADDR)?
            .set_default("database.path", default_database_path())?
            .set_default("cache.ttl_minutes", DEFAULT_CACHE_TTL_MINUTES)?;

        let cfg = builder.add_source(File::from(path)).build()?;

        let settings: Self = cfg.try_deserialize()?;
        if !(1..=MAX_CACHE_TTL_MINUTES).contains(&settings.cache.ttl_minutes) {
            return Err(ConfigError::Message(format!(
                "cache.ttl_minutes must be between 1 and {MAX_CACHE_TTL_MINUTES}, got {}",
                settings.cache.ttl_minutes
            )));
        }
        Ok(settings)
    }
}

fn default_database_path() -> String {
    ProjectDirs::from("", "", "trial-dashboard").map_or_else(
        || "trial-dashboard-db".to_string(),
        |dirs| dirs.data_dir().join("db").to_string_lossy().into_owned(),
    )
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::Settings;

    #[test]
    fn defaults_fill_missing_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[api]\nbase_url = \"http://localhost:3000\"").unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.web.address.to_string(), "127.0.0.1:8000");
        assert_eq!(settings.cache.ttl_minutes, 30);
        assert_eq!(settings.api.base_url, "http://localhost:3000");
        assert!(settings.api.timeout_secs.is_none());
        assert!(settings.auth.demo_email.is_none());
        assert!(settings.export.dir.is_none());
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[web]
address = "0.0.0.0:9000"

[api]
base_url = "https://trials.example.com"
timeout_secs = 10

[database]
path = "/tmp/trial-db"

[cache]
ttl_minutes = 5

[auth]
demo_email = "demo@example.com"
demo_password = "demo"

[export]
dir = "/tmp/exports"
"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.web.address.port(), 9000);
        assert_eq!(settings.api.timeout_secs, Some(10));
        assert_eq!(settings.cache.ttl_minutes, 5);
        assert_eq!(settings.database.path.to_str(), Some("/tmp/trial-db"));
        assert_eq!(settings.auth.demo_email.as_deref(), Some("demo@example.com"));
        assert_eq!(settings.export.dir.as_deref().and_then(|d| d.to_str()), Some("/tmp/exports"));
    }

    #[test]
    fn ttl_out_of_range() {
        for ttl in ["0", "-5", "9223372036854775807"] {
            let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
            writeln!(
                file,
                "[api]\nbase_url = \"http://localhost:3000\"\n[cache]\nttl_minutes = {ttl}"
            )
            .unwrap();
            assert!(Settings::from_file(file.path()).is_err(), "{ttl}");
        }
    }
}
