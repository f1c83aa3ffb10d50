use serde::Deserialize;
use std::fmt;
use tracing::{error, warn};

/// Failure of a single call against the platform API.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{endpoint} returned {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
        reasons: Vec<String>,
    },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
    #[error("the authenticated account has no channel, so it has no liked-videos collection")]
    NoChannel,
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    TransientQuota,
    TransientOther,
    Fatal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorClass::TransientQuota => "quota exhausted",
            ErrorClass::TransientOther => "transient error",
            ErrorClass::Fatal => "fatal error",
        })
    }
}

/// Decides how a failed call should be treated by the calling loop.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, err: &ApiError) -> ErrorClass;
}

/// Shared tail for every classifier once the quota check has not matched.
fn classify_fallback(err: &ApiError) -> ErrorClass {
    if let ApiError::Transport { .. } = err {
        return ErrorClass::TransientOther;
    }
    match err.status_code() {
        Some(status) if status == 429 || status >= 500 => ErrorClass::TransientOther,
        _ => ErrorClass::Fatal,
    }
}

/// Case-insensitive substring match on the rendered error text and any reason codes.
#[derive(Clone, Debug)]
pub struct KeywordClassifier {
    keyword: String,
}

impl KeywordClassifier {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new("quota")
    }
}

impl ErrorClassifier for KeywordClassifier {
    fn classify(&self, err: &ApiError) -> ErrorClass {
        if self.keyword.is_empty() {
            return classify_fallback(err);
        }
        let mut text = err.to_string();
        if let ApiError::Status { reasons, .. } = err {
            for reason in reasons {
                text.push(' ');
                text.push_str(reason);
            }
        }
        if text.to_lowercase().contains(&self.keyword) {
            return ErrorClass::TransientQuota;
        }
        classify_fallback(err)
    }
}

/// Matches the structured `errors[].reason` codes the API attaches to its error bodies.
#[derive(Clone, Debug, Default)]
pub struct ReasonClassifier;

const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded"];

impl ErrorClassifier for ReasonClassifier {
    fn classify(&self, err: &ApiError) -> ErrorClass {
        if let ApiError::Status { reasons, .. } = err {
            if reasons.iter().any(|r| QUOTA_REASONS.contains(&r.as_str())) {
                return ErrorClass::TransientQuota;
            }
        }
        classify_fallback(err)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierKind {
    #[default]
    Keyword,
    Reason,
}

impl ClassifierKind {
    pub fn build(self, quota_keyword: &str) -> Box<dyn ErrorClassifier> {
        match self {
            ClassifierKind::Keyword => Box::new(KeywordClassifier::new(quota_keyword)),
            ClassifierKind::Reason => Box::new(ReasonClassifier),
        }
    }
}

/// What the fetch/resolve/remove loops do when a call fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Resilience {
    /// Report the error, stop the loop and keep partial results.
    #[default]
    Resilient,
    /// Let the error propagate and end the run.
    FailFast,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Resolve,
    Remove,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "retrieving liked videos",
            Stage::Resolve => "getting video durations",
            Stage::Remove => "unliking videos",
        })
    }
}

/// Record of a loop that stopped before finishing its work.
#[derive(Clone, Debug, PartialEq)]
pub struct Interruption {
    pub stage: Stage,
    pub class: ErrorClass,
    pub message: String,
}

impl Interruption {
    pub fn is_fatal(&self) -> bool {
        self.class == ErrorClass::Fatal
    }
}

/// A possibly partial result, plus the reason it is partial.
#[derive(Debug)]
pub struct Staged<T> {
    pub value: T,
    pub interruption: Option<Interruption>,
}

impl<T> Staged<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value,
            interruption: None,
        }
    }
}

impl Resilience {
    /// Turns a failed call into an [`Interruption`], or hands the error back in fail-fast mode.
    pub fn intercept(
        self,
        stage: Stage,
        err: ApiError,
        classifier: &dyn ErrorClassifier,
    ) -> Result<Interruption, ApiError> {
        if self == Resilience::FailFast {
            return Err(err);
        }

        let class = classifier.classify(&err);
        error!("Error {}: {}", stage, err);
        match class {
            ErrorClass::TransientQuota => match stage {
                Stage::Remove => {
                    warn!("Quota exceeded. Please wait 24 hours for quota to reset.")
                }
                _ => warn!("Quota exceeded. Returning partial results."),
            },
            ErrorClass::TransientOther => warn!("Stopping early, returning partial results."),
            ErrorClass::Fatal => warn!("Unrecoverable error, returning partial results."),
        }

        Ok(Interruption {
            stage,
            class,
            message: err.to_string(),
        })
    }
}
