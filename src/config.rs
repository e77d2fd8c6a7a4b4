use crate::error::{Result, TsIndexError};
use crate::extrapolate::SegmentUrlTemplate;
use crate::http_fetch::RetryConfig;
use chrono::FixedOffset;
use serde::Serialize;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Playlist of RTHK Radio 2, the stream this tool was first written for.
pub const DEFAULT_PLAYLIST_URL: &str =
    "https://rthkradio2-live.akamaized.net/hls/live/2040078/radio2/index_64_a.m3u8";

pub const DEFAULT_SEGMENT_PREFIX: &str = "index_64_a";

pub const DEFAULT_QOS_HEADER: &str = "X-Akamai-Live-Origin-QoS";

/// Duration used when the QoS header carries no `d=` field.
pub const DEFAULT_QOS_DURATION_MS: u64 = 10_000;

/// Hong Kong civil time.
pub const DEFAULT_CIVIL_UTC_OFFSET_HOURS: i32 = 8;

/// Where the anchor's wall-clock time comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorStrategy {
    /// `#EXT-X-PROGRAM-DATE-TIME` tag in the playlist itself
    ProgramDateTime,
    /// Provider QoS response header (`t=<unix secs>`, `d=<millis>`) on a segment HEAD
    QosHeader,
    /// `Last-Modified` response header on a segment HEAD
    LastModified,
}

impl AnchorStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorStrategy::ProgramDateTime => "program-date-time",
            AnchorStrategy::QosHeader => "qos-header",
            AnchorStrategy::LastModified => "last-modified",
        }
    }
}

impl fmt::Display for AnchorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorStrategy {
    type Err = TsIndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "program-date-time" | "pdt" => Ok(AnchorStrategy::ProgramDateTime),
            "qos-header" | "qos" | "akamai" => Ok(AnchorStrategy::QosHeader),
            "last-modified" => Ok(AnchorStrategy::LastModified),
            other => Err(TsIndexError::Config(format!(
                "unknown anchor strategy '{other}' (expected program-date-time, qos-header or last-modified)"
            ))),
        }
    }
}

/// Locator configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Live media playlist to read the newest segment from
    pub playlist_url: String,
    /// `<baseUrl>` of the segment URI template.
    ///
    /// When `None`, the directory of `playlist_url` is used.
    pub segment_base_url: Option<String>,
    /// `<streamPrefix>` of the segment URI template
    pub segment_prefix: String,
    pub anchor_strategy: AnchorStrategy,
    /// Response header read by [`AnchorStrategy::QosHeader`]
    pub qos_header: String,
    pub qos_default_duration_ms: u64,
    /// Fixed civil timezone for target-time input and report output
    pub civil_offset: FixedOffset,
    /// Optional per-request timeout (default: client default)
    pub http_timeout: Option<Duration>,
    /// Total HTTP attempts per request; 1 disables retry
    pub fetch_max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            playlist_url: DEFAULT_PLAYLIST_URL.to_string(),
            segment_base_url: None,
            segment_prefix: DEFAULT_SEGMENT_PREFIX.to_string(),
            anchor_strategy: AnchorStrategy::ProgramDateTime,
            qos_header: DEFAULT_QOS_HEADER.to_string(),
            qos_default_duration_ms: DEFAULT_QOS_DURATION_MS,
            civil_offset: FixedOffset::east_opt(DEFAULT_CIVIL_UTC_OFFSET_HOURS * 3600)
                .expect("default civil offset is within range"),
            http_timeout: None,
            fetch_max_attempts: 1,
        }
    }
}

/// Values given on the command line. A field that is set replaces the
/// matching environment variable, which is then not read at all.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub anchor_strategy: Option<AnchorStrategy>,
    pub playlist_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional. Values that are present but malformed are
    /// errors, since a silent fallback would change which segment is chosen.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(ConfigOverrides::default())
    }

    /// Like [`Config::from_env`], with `overrides` taking precedence.
    pub fn from_env_with(overrides: ConfigOverrides) -> Result<Self> {
        let defaults = Config::default();

        let playlist_url = match overrides.playlist_url {
            Some(url) => url,
            None => env::var("PLAYLIST_URL").unwrap_or(defaults.playlist_url),
        };

        let segment_base_url = env::var("SEGMENT_BASE_URL").ok().filter(|s| !s.is_empty());

        let segment_prefix = env::var("SEGMENT_PREFIX").unwrap_or(defaults.segment_prefix);

        let anchor_strategy = match overrides.anchor_strategy {
            Some(strategy) => strategy,
            None => match env::var("ANCHOR_STRATEGY") {
                Ok(value) => value.parse()?,
                Err(_) => defaults.anchor_strategy,
            },
        };

        let qos_header = env::var("QOS_HEADER").unwrap_or(defaults.qos_header);

        let qos_default_duration_ms = parse_var("QOS_DEFAULT_DURATION_MS")?
            .unwrap_or(defaults.qos_default_duration_ms);

        let civil_offset = match parse_var::<i32>("CIVIL_UTC_OFFSET_HOURS")? {
            Some(hours) => hours_offset(hours)?,
            None => defaults.civil_offset,
        };

        let http_timeout = parse_var::<u64>("HTTP_TIMEOUT_SECS")?.map(Duration::from_secs);

        let fetch_max_attempts =
            parse_var("FETCH_MAX_ATTEMPTS")?.unwrap_or(defaults.fetch_max_attempts);

        let config = Config {
            playlist_url,
            segment_base_url,
            segment_prefix,
            anchor_strategy,
            qos_header,
            qos_default_duration_ms,
            civil_offset,
            http_timeout,
            fetch_max_attempts,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check URLs and numeric ranges.
    pub fn validate(&self) -> Result<()> {
        require_http_url("PLAYLIST_URL", &self.playlist_url)?;
        if let Some(base) = &self.segment_base_url {
            require_http_url("SEGMENT_BASE_URL", base)?;
        }
        if self.qos_default_duration_ms == 0 {
            return Err(TsIndexError::Config(
                "QOS_DEFAULT_DURATION_MS must be greater than 0".to_string(),
            ));
        }
        if self.fetch_max_attempts == 0 {
            return Err(TsIndexError::Config(
                "FETCH_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// URI template `<baseUrl><streamPrefix><index>.ts`.
    pub fn url_template(&self) -> Result<SegmentUrlTemplate> {
        let base_url = match &self.segment_base_url {
            Some(base) => base.clone(),
            None => {
                let playlist = require_http_url("PLAYLIST_URL", &self.playlist_url)?;
                playlist
                    .join("./")
                    .map_err(|e| {
                        TsIndexError::Config(format!(
                            "cannot derive segment base from {}: {e}",
                            self.playlist_url
                        ))
                    })?
                    .to_string()
            }
        };
        Ok(SegmentUrlTemplate::new(base_url, &self.segment_prefix))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.fetch_max_attempts,
            timeout: self.http_timeout,
            ..Default::default()
        }
    }
}

fn hours_offset(hours: i32) -> Result<FixedOffset> {
    if !(-23..=23).contains(&hours) {
        return Err(TsIndexError::Config(format!(
            "CIVIL_UTC_OFFSET_HOURS {hours} is out of range -23..=23"
        )));
    }
    FixedOffset::east_opt(hours * 3600).ok_or_else(|| {
        TsIndexError::Config(format!("CIVIL_UTC_OFFSET_HOURS {hours} is not a valid offset"))
    })
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| TsIndexError::Config(format!("{name}={value:?} is invalid: {e}"))),
        Err(_) => Ok(None),
    }
}

fn require_http_url(name: &str, value: &str) -> Result<Url> {
    let parsed = Url::parse(value)
        .map_err(|e| TsIndexError::Config(format!("{name} {value:?} is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(TsIndexError::Config(format!(
            "{name} scheme '{scheme}' not allowed, only http/https"
        ))),
    }
}
