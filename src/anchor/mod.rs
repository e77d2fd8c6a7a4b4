//! Anchor Resolver: pin one segment index to the wall-clock instant it was live.
//!
//! The three strategies differ only in where the instant comes from. Each one
//! implements [`AnchorResolver`] and produces the same [`TimeAnchor`], so the
//! extrapolator never needs to know which was used.

pub mod last_modified;
pub mod program_date_time;
pub mod qos;

use crate::config::{AnchorStrategy, Config};
use crate::error::{Result, TsIndexError};
use crate::playlist::{MediaManifest, SegmentReference};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

pub use last_modified::LastModifiedResolver;
pub use program_date_time::ProgramDateTimeResolver;
pub use qos::QosHeaderResolver;

/// A known (segment index, wall-clock instant) correspondence.
///
/// `reference_time` is the instant the segment at `reference_index` was the
/// live edge. The segment duration is always finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeAnchor {
    reference_index: i64,
    reference_time: DateTime<Utc>,
    segment_duration_secs: f64,
    source: AnchorStrategy,
}

impl TimeAnchor {
    pub fn new(
        reference_index: i64,
        reference_time: DateTime<Utc>,
        segment_duration_secs: f64,
        source: AnchorStrategy,
    ) -> Result<Self> {
        if !segment_duration_secs.is_finite() || segment_duration_secs <= 0.0 {
            return Err(TsIndexError::InvalidAnchor(format!(
                "segment duration {segment_duration_secs}s must be a positive number"
            )));
        }
        if duration_nanos(segment_duration_secs) < 1 {
            return Err(TsIndexError::InvalidAnchor(format!(
                "segment duration {segment_duration_secs}s is below nanosecond resolution"
            )));
        }

        Ok(Self {
            reference_index,
            reference_time,
            segment_duration_secs,
            source,
        })
    }

    pub fn reference_index(&self) -> i64 {
        self.reference_index
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    pub fn segment_duration_secs(&self) -> f64 {
        self.segment_duration_secs
    }

    /// Segment duration rounded to whole nanoseconds (always >= 1).
    pub fn segment_duration_nanos(&self) -> i128 {
        duration_nanos(self.segment_duration_secs)
    }

    /// Strategy that produced this anchor.
    pub fn source(&self) -> AnchorStrategy {
        self.source
    }
}

fn duration_nanos(secs: f64) -> i128 {
    (secs * 1e9).round() as i128
}

/// Source of the anchor's wall-clock time.
///
/// `reference` is the newest segment of `manifest`; implementations that
/// request a segment from the origin do so for that segment only.
#[async_trait]
pub trait AnchorResolver: Send + Sync {
    fn strategy(&self) -> AnchorStrategy;

    async fn resolve(
        &self,
        reference: &SegmentReference,
        manifest: &MediaManifest,
    ) -> Result<TimeAnchor>;
}

/// Build the resolver selected by `config.anchor_strategy`.
pub fn build_resolver(config: &Config, client: Client) -> Result<Box<dyn AnchorResolver>> {
    let resolver: Box<dyn AnchorResolver> = match config.anchor_strategy {
        AnchorStrategy::ProgramDateTime => Box::new(ProgramDateTimeResolver),
        AnchorStrategy::QosHeader => Box::new(QosHeaderResolver::new(
            client,
            config.url_template()?,
            config.retry_config(),
            config.qos_header.clone(),
            config.qos_default_duration_ms,
        )),
        AnchorStrategy::LastModified => Box::new(LastModifiedResolver::new(
            client,
            config.url_template()?,
            config.retry_config(),
        )),
    };
    Ok(resolver)
}
