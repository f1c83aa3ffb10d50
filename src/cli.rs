use crate::error::{ClassifierKind, Resilience};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Remove videos from your liked videos that are under a specified duration.
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "liked-videos-pruner", version)]
pub struct Cli {
    /// Minimum duration in minutes (videos shorter than this will be unliked) [default: 5]
    #[arg(long)]
    pub min_duration: Option<f64>,

    /// Path to the OAuth client secret JSON file [default: client-secret.json]
    #[arg(long)]
    pub client_secret: Option<PathBuf>,

    /// Where the OAuth token is cached between runs [default: token.json]
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Show what would be unliked without actually unliking
    #[arg(long)]
    pub dry_run: bool,

    /// Number of videos to unlike in one run (lower for quota issues) [default: 50]
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Start processing from this index (useful for resuming after quota exceeded)
    #[arg(long, default_value_t = 0)]
    pub start_index: usize,

    /// What to do when an API call fails mid-run [default: resilient]
    #[arg(long, value_enum)]
    pub resilience: Option<Resilience>,

    /// Also reset each removed video's rating
    #[arg(long)]
    pub clear_rating: bool,

    /// How quota exhaustion is recognised in API errors [default: keyword]
    #[arg(long, value_enum)]
    pub classifier: Option<ClassifierKind>,

    /// Optional TOML config file
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,
}

impl Cli {
    /// Command line that continues this run at `start_index` with the same flags.
    ///
    /// Settings taken from the environment or the config file are not echoed; they still
    /// apply when the command is run from the same place.
    pub fn resume_command(&self, min_duration: f64, start_index: usize) -> String {
        let mut args = vec![
            env!("CARGO_PKG_NAME").to_string(),
            "--min-duration".to_string(),
            min_duration.to_string(),
        ];
        if let Some(path) = &self.client_secret {
            args.extend(["--client-secret".to_string(), shell_path(path)]);
        }
        if let Some(path) = &self.token_file {
            args.extend(["--token-file".to_string(), shell_path(path)]);
        }
        if let Some(n) = self.batch_size {
            args.extend(["--batch-size".to_string(), n.to_string()]);
        }
        if let Some(name) = self.resilience.and_then(value_name) {
            args.extend(["--resilience".to_string(), name]);
        }
        if self.clear_rating {
            args.push("--clear-rating".to_string());
        }
        if let Some(name) = self.classifier.and_then(value_name) {
            args.extend(["--classifier".to_string(), name]);
        }
        if !self.config.as_os_str().is_empty() && self.config != Path::new("config.toml") {
            args.extend(["--config".to_string(), shell_path(&self.config)]);
        }
        args.extend(["--start-index".to_string(), start_index.to_string()]);
        args.join(" ")
    }
}

fn value_name(value: impl ValueEnum) -> Option<String> {
    value.to_possible_value().map(|v| v.get_name().to_string())
}

fn shell_path(path: &Path) -> String {
    let text = path.display().to_string();
    if text.contains(char::is_whitespace) {
        format!("\"{}\"", text)
    } else {
        text
    }
}
