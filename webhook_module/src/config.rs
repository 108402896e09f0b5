use std::env;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

use sheets_module::appender::{DEFAULT_COUNT_RANGE, DEFAULT_TIMEZONE};
use sheets_module::client::DEFAULT_SHEETS_API_BASE_URL;
use sheets_module::SheetTarget;

use crate::heuristic::{Dictionary, HeuristicError, NameHeuristic, DEFAULT_NAME_PATTERN};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_INBOUND_BODY_MAX_BYTES: usize = 1024 * 1024;
pub const DEFAULT_SPREADSHEET_ID: &str = "15W-5K8IPKVT84DqYRMgUZe4ArPdbqDq10PU1u4kWME4";
pub const DEFAULT_SHEET_NAME: &str = "raw";
pub const DEFAULT_CREDENTIALS_FILE: &str = "google-credentials.json";
pub const CONFIG_FILE_NAME: &str = "webhook.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {0}")]
    Io(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config value {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Deserialize, Default)]
pub struct ServiceConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub sheet: SheetSection,
    #[serde(default)]
    pub heuristic: HeuristicSection,
    #[serde(default)]
    pub slack: SlackSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SheetSection {
    pub spreadsheet_id: Option<String>,
    pub name: Option<String>,
    pub count_range: Option<String>,
    pub timezone: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub api_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HeuristicSection {
    pub dictionary_path: Option<PathBuf>,
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SlackSection {
    pub signing_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub inbound_body_max_bytes: usize,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// Column range counted to find the first free row, e.g. `A1:A600000`
    pub count_range: String,
    pub timezone: Tz,
    /// Service account key file
    pub credentials_path: PathBuf,
    pub sheets_api_base_url: String,
    /// Pre-issued token used instead of the key file
    pub google_access_token: Option<String>,
    /// Word list replacing the embedded dictionary
    pub dictionary_path: Option<PathBuf>,
    pub name_pattern: String,
    /// Slack request signing secret; requests are not verified when unset
    pub slack_signing_secret: Option<String>,
}

impl ServiceConfig {
    /// `.env`, then `webhook.toml` (if any), then environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let cwd = env::current_dir().map_err(|err| ConfigError::Io(err.to_string()))?;
        let file = match resolve_config_path(&cwd) {
            Some(path) => load_config_file(&path)?,
            None => ServiceConfigFile::default(),
        };
        Self::from_parts(file, &cwd, |key| env::var(key).ok())
    }

    pub fn from_parts(
        file: ServiceConfigFile,
        cwd: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = var("WEBHOOK_HOST")
            .or(file.server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var("WEBHOOK_PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "WEBHOOK_PORT",
                value,
            })?,
            None => file.server.port.unwrap_or(DEFAULT_PORT),
        };
        let inbound_body_max_bytes = var("WEBHOOK_MAX_BODY_BYTES")
            .and_then(|value| value.parse::<usize>().ok())
            .or(file.server.max_body_bytes)
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_INBOUND_BODY_MAX_BYTES);

        let spreadsheet_id = var("SHEET_SPREADSHEET_ID")
            .or(file.sheet.spreadsheet_id)
            .unwrap_or_else(|| DEFAULT_SPREADSHEET_ID.to_string());
        let sheet_name = var("SHEET_NAME")
            .or(file.sheet.name)
            .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string());
        let count_range = file
            .sheet
            .count_range
            .unwrap_or_else(|| DEFAULT_COUNT_RANGE.to_string());
        let timezone = match var("SHEET_TIMEZONE").or(file.sheet.timezone) {
            Some(name) => name.parse::<Tz>().map_err(|_| ConfigError::Invalid {
                key: "timezone",
                value: name,
            })?,
            None => DEFAULT_TIMEZONE,
        };
        let credentials_path = var("GOOGLE_CREDENTIALS_PATH")
            .map(PathBuf::from)
            .or(file.sheet.credentials_path)
            .map(|path| resolve_path(cwd, path))
            .unwrap_or_else(|| cwd.join(DEFAULT_CREDENTIALS_FILE));
        let sheets_api_base_url = var("GOOGLE_SHEETS_API_BASE_URL")
            .or(file.sheet.api_base_url)
            .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE_URL.to_string());
        let google_access_token = var("GOOGLE_ACCESS_TOKEN");

        let dictionary_path = var("NAME_DICTIONARY_PATH")
            .map(PathBuf::from)
            .or(file.heuristic.dictionary_path)
            .map(|path| resolve_path(cwd, path));
        let name_pattern = file
            .heuristic
            .pattern
            .unwrap_or_else(|| DEFAULT_NAME_PATTERN.to_string());

        let slack_signing_secret = var("SLACK_SIGNING_SECRET").or(file
            .slack
            .signing_secret
            .filter(|value| !value.trim().is_empty()));

        Ok(Self {
            host,
            port,
            inbound_body_max_bytes,
            spreadsheet_id,
            sheet_name,
            count_range,
            timezone,
            credentials_path,
            sheets_api_base_url,
            google_access_token,
            dictionary_path,
            name_pattern,
            slack_signing_secret,
        })
    }

    pub fn sheet_target(&self) -> SheetTarget {
        SheetTarget {
            spreadsheet_id: self.spreadsheet_id.clone(),
            sheet_name: self.sheet_name.clone(),
            count_range: self.count_range.clone(),
            timezone: self.timezone,
        }
    }

    pub fn build_heuristic(&self) -> Result<NameHeuristic, HeuristicError> {
        let dictionary = match &self.dictionary_path {
            Some(path) => Dictionary::load(path)?,
            None => Dictionary::english(),
        };
        NameHeuristic::with_pattern(&self.name_pattern, dictionary)
    }
}

/// `WEBHOOK_CONFIG_PATH`, else `webhook.toml` in the working directory.
pub fn resolve_config_path(cwd: &Path) -> Option<PathBuf> {
    if let Ok(path) = env::var("WEBHOOK_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return Some(resolve_path(cwd, PathBuf::from(path)));
        }
    }

    let direct = cwd.join(CONFIG_FILE_NAME);
    if direct.exists() {
        return Some(direct);
    }
    None
}

pub fn load_config_file(path: &Path) -> Result<ServiceConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| ConfigError::Io(format!("{}: {}", path.display(), err)))?;
    toml::from_str::<ServiceConfigFile>(&content).map_err(|err| ConfigError::Parse(err.to_string()))
}

fn resolve_path(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_match_historic_constants() {
        let config =
            ServiceConfig::from_parts(ServiceConfigFile::default(), Path::new("/srv/app"), no_env)
                .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.spreadsheet_id, DEFAULT_SPREADSHEET_ID);
        assert_eq!(config.sheet_name, "raw");
        assert_eq!(config.count_range, "A1:A600000");
        assert_eq!(config.timezone, chrono_tz::US::Pacific);
        assert_eq!(
            config.credentials_path,
            PathBuf::from("/srv/app/google-credentials.json")
        );
        assert_eq!(config.sheets_api_base_url, DEFAULT_SHEETS_API_BASE_URL);
        assert!(config.google_access_token.is_none());
        assert!(config.dictionary_path.is_none());
        assert_eq!(config.name_pattern, DEFAULT_NAME_PATTERN);
        assert!(config.slack_signing_secret.is_none());
        assert_eq!(config.sheet_target().count_range_a1(), "raw!A1:A600000");
    }

    #[test]
    fn file_values_apply_and_env_wins() {
        let file: ServiceConfigFile = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9100

            [sheet]
            spreadsheet_id = "from-file"
            name = "attendance"
            timezone = "America/New_York"
            credentials_path = "secrets/key.json"

            [heuristic]
            dictionary_path = "/etc/words.txt"

            [slack]
            signing_secret = "file-secret"
            "#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("WEBHOOK_PORT", "9200"),
            ("SHEET_SPREADSHEET_ID", "from-env"),
            ("SLACK_SIGNING_SECRET", "  "),
        ]);

        let config = ServiceConfig::from_parts(file, Path::new("/srv/app"), |key| {
            env.get(key).map(|value| value.to_string())
        })
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9200);
        assert_eq!(config.spreadsheet_id, "from-env");
        assert_eq!(config.sheet_name, "attendance");
        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert_eq!(
            config.credentials_path,
            PathBuf::from("/srv/app/secrets/key.json")
        );
        assert_eq!(config.dictionary_path, Some(PathBuf::from("/etc/words.txt")));
        // blank env values fall through to the file
        assert_eq!(config.slack_signing_secret.as_deref(), Some("file-secret"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ServiceConfig::from_parts(ServiceConfigFile::default(), Path::new("/"), |key| {
            (key == "WEBHOOK_PORT").then(|| "not-a-port".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "WEBHOOK_PORT", .. }));

        let err = ServiceConfig::from_parts(ServiceConfigFile::default(), Path::new("/"), |key| {
            (key == "SHEET_TIMEZONE").then(|| "Mars/Olympus".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "timezone", .. }));
    }

    #[test]
    fn heuristic_uses_configured_pattern() {
        let mut config =
            ServiceConfig::from_parts(ServiceConfigFile::default(), Path::new("/"), no_env)
                .unwrap();
        config.name_pattern = r"[A-Z][a-z]+".to_string();
        let heuristic = config.build_heuristic().unwrap();
        assert_eq!(
            heuristic.find_names("Priya Okafor"),
            vec!["Priya".to_string(), "Okafor".to_string()]
        );

        config.name_pattern = "(".to_string();
        assert!(config.build_heuristic().is_err());
    }

    #[test]
    fn config_file_parse_errors_are_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[server]\nport = \"eighty\"\n").unwrap();
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            load_config_file(&temp.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    #[serial_test::serial]
    fn config_path_resolution() {
        let temp = tempfile::TempDir::new().unwrap();
        std::env::remove_var("WEBHOOK_CONFIG_PATH");
        assert_eq!(resolve_config_path(temp.path()), None);

        std::fs::write(temp.path().join(CONFIG_FILE_NAME), "").unwrap();
        assert_eq!(
            resolve_config_path(temp.path()),
            Some(temp.path().join(CONFIG_FILE_NAME))
        );

        std::env::set_var("WEBHOOK_CONFIG_PATH", "conf/custom.toml");
        assert_eq!(
            resolve_config_path(temp.path()),
            Some(temp.path().join("conf/custom.toml"))
        );
        std::env::remove_var("WEBHOOK_CONFIG_PATH");
    }
}
