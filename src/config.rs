use crate::{
    api::{DEFAULT_BASE_URL, MAX_PAGE_SIZE},
    cli::Cli,
    error::{ClassifierKind, Resilience},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("minimum duration must be a finite number of minutes >= 0, got {0}")]
    Threshold(f64),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub client_secret: Option<PathBuf>,
    pub token_file: Option<PathBuf>,
    pub scopes: Option<Vec<String>>,
    pub consent_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub page_size: Option<usize>,
    pub lookup_batch_size: Option<usize>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub min_duration: Option<f64>,
    pub removal_limit: Option<usize>,
    pub sample_size: Option<usize>,
    pub resilience: Option<Resilience>,
    pub classifier: Option<ClassifierKind>,
    pub quota_keyword: Option<String>,
    pub clear_rating: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub filter: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub auth: AuthSection,
    pub api: ApiSection,
    pub run: RunSection,
    pub logging: LoggingSection,
}

impl ConfigFile {
    /// `Ok(None)` when the file does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub client_secret: PathBuf,
    pub token_file: PathBuf,
    pub scopes: Vec<String>,
    pub consent_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// Knobs for one pass of the fetch → resolve → filter → remove pipeline.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub min_duration: f64,
    pub dry_run: bool,
    pub removal_limit: usize,
    pub start_index: usize,
    pub sample_size: usize,
    pub resilience: Resilience,
    pub classifier: ClassifierKind,
    pub quota_keyword: String,
    pub clear_rating: bool,
    pub page_size: usize,
    pub lookup_batch_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            min_duration: 5.0,
            dry_run: false,
            removal_limit: 50,
            start_index: 0,
            sample_size: 5,
            resilience: Resilience::default(),
            classifier: ClassifierKind::default(),
            quota_keyword: "quota".to_string(),
            clear_rating: false,
            page_size: MAX_PAGE_SIZE,
            lookup_batch_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub run: RunConfig,
    pub log_filter: String,
}

impl Config {
    /// Reads the config file named by the CLI and layers environment and CLI values over it.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match ConfigFile::read(&cli.config) {
            Ok(file) => file,
            Err(e @ ConfigError::Parse { .. }) => {
                eprintln!("Warning: {}. Using defaults.", e);
                None
            }
            Err(e) => return Err(e),
        };
        Self::resolve(file, |key| std::env::var(key).ok(), cli)
    }

    /// Precedence: CLI flag, then environment variable, then config file, then built-in default.
    pub fn resolve(
        file: Option<ConfigFile>,
        env: impl Fn(&str) -> Option<String>,
        cli: &Cli,
    ) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = RunConfig::default();

        let client_secret = cli
            .client_secret
            .clone()
            .or_else(|| env("CLIENT_SECRET_FILE").map(PathBuf::from))
            .or(file.auth.client_secret)
            .unwrap_or_else(|| PathBuf::from("client-secret.json"));

        let token_file = cli
            .token_file
            .clone()
            .or_else(|| env("TOKEN_FILE").map(PathBuf::from))
            .or(file.auth.token_file)
            .unwrap_or_else(|| PathBuf::from("token.json"));

        let scopes = file
            .auth
            .scopes
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| vec![YOUTUBE_SCOPE.to_string()]);

        let consent_timeout =
            Duration::from_secs(file.auth.consent_timeout_secs.unwrap_or(300).max(1));

        let base_url = env("YOUTUBE_API_BASE")
            .or(file.api.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout = Duration::from_secs(file.api.timeout_secs.unwrap_or(30).max(1));
        let page_size = file
            .api
            .page_size
            .unwrap_or(MAX_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let lookup_batch_size = file
            .api
            .lookup_batch_size
            .unwrap_or(MAX_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let min_duration = cli
            .min_duration
            .or_else(|| env("MIN_DURATION").and_then(|v| v.parse().ok()))
            .or(file.run.min_duration)
            .unwrap_or(defaults.min_duration);
        if !min_duration.is_finite() || min_duration < 0.0 {
            return Err(ConfigError::Threshold(min_duration));
        }

        let removal_limit = cli
            .batch_size
            .or(file.run.removal_limit)
            .unwrap_or(defaults.removal_limit);

        let log_filter = env("RUST_LOG")
            .or(file.logging.filter)
            .unwrap_or_else(|| "liked_videos_pruner=info".to_string());

        let run = RunConfig {
            min_duration,
            dry_run: cli.dry_run,
            removal_limit,
            start_index: cli.start_index,
            sample_size: file.run.sample_size.unwrap_or(defaults.sample_size),
            resilience: cli
                .resilience
                .or(file.run.resilience)
                .unwrap_or(defaults.resilience),
            classifier: cli
                .classifier
                .or(file.run.classifier)
                .unwrap_or(defaults.classifier),
            quota_keyword: file.run.quota_keyword.unwrap_or(defaults.quota_keyword),
            clear_rating: cli.clear_rating || file.run.clear_rating.unwrap_or(false),
            page_size,
            lookup_batch_size,
        };

        Ok(Self {
            auth: AuthConfig {
                client_secret,
                token_file,
                scopes,
                consent_timeout,
            },
            api: ApiConfig {
                base_url,
                timeout,
            },
            run,
            log_filter,
        })
    }
}
