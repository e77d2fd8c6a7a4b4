//! Index Extrapolator: from a resolved anchor to the segment live at a target time.
//!
//! All arithmetic runs on absolute instants in integer nanoseconds. The
//! offset is `diff / duration` with Rust's integer division, which truncates
//! toward zero: a target 25s before a 10s-segment anchor is 2 segments back,
//! and a target 25s after it is 2 segments forward. No bounds are checked;
//! the resulting index may be negative or already evicted by the origin.

use crate::anchor::TimeAnchor;
use crate::config::AnchorStrategy;
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use serde::Serialize;
use tracing::debug;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// `<baseUrl><streamPrefix><index>.ts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentUrlTemplate {
    base_url: String,
    prefix: String,
}

impl SegmentUrlTemplate {
    /// A `/` is appended to `base_url` if it does not already end with one.
    pub fn new(base_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            prefix: prefix.into(),
        }
    }

    pub fn url_for(&self, index: i64) -> String {
        format!("{}{}{}.ts", self.base_url, self.prefix, index)
    }
}

/// Caller-supplied instant to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec {
    /// Kept in the caller's civil offset for reporting; compared as an instant.
    pub target_time: DateTime<FixedOffset>,
}

impl TargetSpec {
    pub fn new(target_time: DateTime<FixedOffset>) -> Self {
        Self { target_time }
    }

    pub fn utc(&self) -> DateTime<Utc> {
        self.target_time.with_timezone(&Utc)
    }
}

/// Anchor fields reported alongside the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub reference_index: i64,
    pub reference_time: DateTime<Utc>,
    pub segment_duration_secs: f64,
    pub strategy: AnchorStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtrapolationResult {
    pub target_index: i64,
    pub target_time: DateTime<FixedOffset>,
    pub url: String,
    pub diagnostics: Diagnostics,
}

/// Number of segments to step back from the anchor to reach `target`.
///
/// Positive when `target` is before the anchor, negative when after.
pub fn index_offset(anchor: &TimeAnchor, target: DateTime<Utc>) -> i64 {
    let diff = total_nanos(anchor.reference_time() - target);
    let offset = diff / anchor.segment_duration_nanos();
    i64::try_from(offset).unwrap_or(if offset > 0 { i64::MAX } else { i64::MIN })
}

/// Compute the index and URL of the segment live at `target`.
pub fn extrapolate(
    anchor: &TimeAnchor,
    target: &TargetSpec,
    template: &SegmentUrlTemplate,
) -> ExtrapolationResult {
    let offset = index_offset(anchor, target.utc());
    let target_index = anchor.reference_index().saturating_sub(offset);

    debug!(
        "Extrapolated: reference {} - offset {} = target {}",
        anchor.reference_index(),
        offset,
        target_index
    );

    ExtrapolationResult {
        target_index,
        target_time: target.target_time,
        url: template.url_for(target_index),
        diagnostics: Diagnostics {
            reference_index: anchor.reference_index(),
            reference_time: anchor.reference_time(),
            segment_duration_secs: anchor.segment_duration_secs(),
            strategy: anchor.source(),
        },
    }
}

fn total_nanos(delta: TimeDelta) -> i128 {
    i128::from(delta.num_seconds()) * NANOS_PER_SEC + i128::from(delta.subsec_nanos())
}
