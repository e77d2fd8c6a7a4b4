//! Strategy B: provider QoS header on a HEAD of the reference segment.
//!
//! Akamai live origins answer with a header such as
//! `X-Akamai-Live-Origin-QoS: d=10000,t=1764137375.472,...`, where `t` is the
//! Unix time the segment became the live edge and `d` its real duration in
//! milliseconds. `d` replaces the playlist's nominal target duration.

use super::{AnchorResolver, TimeAnchor};
use crate::config::AnchorStrategy;
use crate::error::{Result, TsIndexError};
use crate::extrapolate::SegmentUrlTemplate;
use crate::http_fetch::{self, RetryConfig};
use crate::playlist::{MediaManifest, SegmentReference};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, info};

/// Timing fields read from the QoS header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QosTiming {
    pub live_edge: DateTime<Utc>,
    pub duration_ms: u64,
}

pub struct QosHeaderResolver {
    client: Client,
    template: SegmentUrlTemplate,
    retry: RetryConfig,
    header: String,
    default_duration_ms: u64,
}

impl QosHeaderResolver {
    pub fn new(
        client: Client,
        template: SegmentUrlTemplate,
        retry: RetryConfig,
        header: String,
        default_duration_ms: u64,
    ) -> Self {
        Self {
            client,
            template,
            retry,
            header,
            default_duration_ms,
        }
    }
}

#[async_trait]
impl AnchorResolver for QosHeaderResolver {
    fn strategy(&self) -> AnchorStrategy {
        AnchorStrategy::QosHeader
    }

    async fn resolve(
        &self,
        reference: &SegmentReference,
        _manifest: &MediaManifest,
    ) -> Result<TimeAnchor> {
        let url = self.template.url_for(reference.index);
        info!("Probing {} for {} header", url, self.header);

        let response = http_fetch::head(&self.client, &url, &self.retry).await?;
        let raw = response
            .headers()
            .get(self.header.as_str())
            .ok_or_else(|| TsIndexError::HeaderMissing {
                header: self.header.clone(),
                url: url.clone(),
            })?;
        let value = raw.to_str().map_err(|_| {
            TsIndexError::header_parse(
                &self.header,
                &String::from_utf8_lossy(raw.as_bytes()),
                "value is not visible ASCII",
            )
        })?;
        debug!("{}: {}", self.header, value);

        let timing = parse_qos_header(&self.header, value, self.default_duration_ms)?;
        let duration_secs = timing.duration_ms as f64 / 1000.0;

        if duration_secs != reference.segment_duration_secs {
            info!(
                "QoS duration {}s overrides playlist target duration {}s",
                duration_secs, reference.segment_duration_secs
            );
        }

        TimeAnchor::new(
            reference.index,
            timing.live_edge,
            duration_secs,
            self.strategy(),
        )
    }
}

/// Parse `t=<secs[.fraction]>` and `d=<millis>` out of a QoS header value.
///
/// Fields are `key=value` pairs separated by commas, semicolons or
/// whitespace; keys must match exactly. `d` falls back to
/// `default_duration_ms` when absent.
pub fn parse_qos_header(header: &str, value: &str, default_duration_ms: u64) -> Result<QosTiming> {
    let mut timestamp = None;
    let mut duration = None;

    for field in value
        .split([',', ';', ' ', '\t'])
        .filter(|f| !f.is_empty())
    {
        match field.split_once('=') {
            Some(("t", v)) => timestamp = Some(v.trim()),
            Some(("d", v)) => duration = Some(v.trim()),
            _ => {}
        }
    }

    let raw_timestamp =
        timestamp.ok_or_else(|| TsIndexError::header_parse(header, value, "no t= field"))?;
    let live_edge = parse_unix_timestamp(raw_timestamp).ok_or_else(|| {
        TsIndexError::header_parse(header, value, format!("invalid timestamp {raw_timestamp:?}"))
    })?;

    let duration_ms = match duration {
        None => default_duration_ms,
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| {
                TsIndexError::header_parse(header, value, format!("invalid duration {raw:?}"))
            })?,
    };

    Ok(QosTiming {
        live_edge,
        duration_ms,
    })
}

/// `1764137375.472` to an instant, exact to the nanosecond.
fn parse_unix_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let (secs, fraction) = raw.split_once('.').unwrap_or((raw, ""));

    if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let secs: i64 = secs.parse().ok()?;
    let nanos = fraction
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(9)
        .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));

    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    const HEADER: &str = "X-Akamai-Live-Origin-QoS";

    #[test]
    fn parses_timestamp_and_duration() {
        let timing = parse_qos_header(HEADER, "d=9984,t=1764137375.472,s=1", 10_000).unwrap();
        assert_eq!(
            timing.live_edge,
            Utc.timestamp_opt(1_764_137_375, 0).unwrap() + TimeDelta::milliseconds(472)
        );
        assert_eq!(timing.duration_ms, 9984);
    }

    #[test]
    fn duration_defaults_when_absent() {
        let timing = parse_qos_header(HEADER, "t=1764137375", 10_000).unwrap();
        assert_eq!(timing.duration_ms, 10_000);
        assert_eq!(timing.live_edge.timestamp(), 1_764_137_375);
    }

    #[test]
    fn keys_match_exactly() {
        let err = parse_qos_header(HEADER, "st=1764137375.472,d=10000", 10_000).unwrap_err();
        assert!(matches!(err, TsIndexError::HeaderParse { .. }));
    }

    #[test]
    fn accepts_other_separators() {
        let timing = parse_qos_header(HEADER, "d=6000; t=1700000000.5", 10_000).unwrap();
        assert_eq!(timing.duration_ms, 6000);
        assert_eq!(timing.live_edge.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn malformed_fields_are_header_parse_errors() {
        for value in [
            "t=abc,d=10000",
            "t=,d=10000",
            "t=17641.37.375",
            "t=-5",
            "t=1764137375.472,d=ten",
            "t=1764137375.472,d=0",
            "d=10000",
        ] {
            let err = parse_qos_header(HEADER, value, 10_000).unwrap_err();
            assert!(
                matches!(err, TsIndexError::HeaderParse { .. }),
                "{value:?} should fail to parse"
            );
        }
    }

    #[test]
    fn long_fractions_are_truncated_to_nanoseconds() {
        let instant = parse_unix_timestamp("1.1234567891").unwrap();
        assert_eq!(instant.timestamp_subsec_nanos(), 123_456_789);
    }
}
