use thiserror::Error;

/// Errors produced while locating a segment.
///
/// Every variant is terminal for the current run; nothing is retried
/// internally unless [`crate::http_fetch::RetryConfig`] asks for it.
#[derive(Error, Debug)]
pub enum TsIndexError {
    #[error("fetch error: request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    #[error("header missing: response for {url} has no {header} header")]
    HeaderMissing { header: String, url: String },

    #[error("header parse error: {header} value {value:?}: {reason}")]
    HeaderParse {
        header: String,
        value: String,
        reason: String,
    },

    #[error("time parse error: {0}")]
    TimeParse(String),

    #[error("invalid anchor: {0}")]
    InvalidAnchor(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl TsIndexError {
    pub(crate) fn fetch(url: &str, source: reqwest::Error) -> Self {
        TsIndexError::Fetch {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn header_parse(header: &str, value: &str, reason: impl Into<String>) -> Self {
        TsIndexError::HeaderParse {
            header: header.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TsIndexError>;
