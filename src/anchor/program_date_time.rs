//! Strategy A: the playlist's own `#EXT-X-PROGRAM-DATE-TIME` tags.
//!
//! No extra request is made. If the newest segment has no tag of its own, its
//! start is derived from the nearest earlier tagged segment plus the `#EXTINF`
//! durations in between.

use super::{AnchorResolver, TimeAnchor};
use crate::config::AnchorStrategy;
use crate::error::{Result, TsIndexError};
use crate::playlist::{MediaManifest, SegmentReference};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use tracing::{info, warn};

/// Basic-format offset (`+0800`) as written by Akamai origins.
const BASIC_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgramDateTimeResolver;

#[async_trait]
impl AnchorResolver for ProgramDateTimeResolver {
    fn strategy(&self) -> AnchorStrategy {
        AnchorStrategy::ProgramDateTime
    }

    async fn resolve(
        &self,
        reference: &SegmentReference,
        manifest: &MediaManifest,
    ) -> Result<TimeAnchor> {
        let time = program_date_time_for(manifest, reference.index)?;

        info!(
            "Anchor from PROGRAM-DATE-TIME: index {} at {}",
            reference.index,
            time.to_rfc3339()
        );

        TimeAnchor::new(
            reference.index,
            time.with_timezone(&Utc),
            reference.segment_duration_secs,
            self.strategy(),
        )
    }
}

/// Start time of the segment numbered `index` in `manifest`.
pub fn program_date_time_for(manifest: &MediaManifest, index: i64) -> Result<DateTime<FixedOffset>> {
    let mut position = manifest.position_of(index).ok_or_else(|| {
        TsIndexError::ManifestParse(format!("segment {index} is not listed in the playlist"))
    })?;
    let mut elapsed = TimeDelta::zero();

    loop {
        let segment = &manifest.segments[position];

        if let Some(raw) = &segment.program_date_time {
            let tagged = parse_program_date_time(raw)?;
            if !elapsed.is_zero() {
                warn!(
                    "Segment {} has no PROGRAM-DATE-TIME; derived from {} + {}ms",
                    index,
                    segment.uri,
                    elapsed.num_milliseconds()
                );
            }
            return tagged.checked_add_signed(elapsed).ok_or_else(|| {
                TsIndexError::ManifestParse(format!("PROGRAM-DATE-TIME {raw:?} is out of range"))
            });
        }

        if position == 0 {
            return Err(TsIndexError::ManifestParse(format!(
                "no #EXT-X-PROGRAM-DATE-TIME tag at or before segment {index}"
            )));
        }

        position -= 1;
        let previous = &manifest.segments[position];
        let secs = previous.duration_secs.ok_or_else(|| {
            TsIndexError::ManifestParse(format!(
                "cannot derive PROGRAM-DATE-TIME: {} has no #EXTINF duration",
                previous.uri
            ))
        })?;
        elapsed = extinf_delta(secs)
            .and_then(|step| elapsed.checked_add(&step))
            .ok_or_else(|| {
                TsIndexError::ManifestParse(format!(
                    "#EXTINF duration {secs}s of {} is out of range",
                    previous.uri
                ))
            })?;
    }
}

fn extinf_delta(secs: f64) -> Option<TimeDelta> {
    let nanos = (secs * 1e9).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos >= i64::MAX as f64 {
        return None;
    }
    Some(TimeDelta::nanoseconds(nanos as i64))
}

/// Parse a PROGRAM-DATE-TIME value with an explicit offset.
///
/// Accepts RFC 3339 (`2025-11-26T14:01:12.185+08:00`, `...Z`) and the basic
/// offset form (`2025-11-26T14:01:12.185+0800`).
pub fn parse_program_date_time(value: &str) -> Result<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, BASIC_OFFSET_FORMAT))
        .map_err(|e| {
            TsIndexError::ManifestParse(format!("invalid PROGRAM-DATE-TIME {value:?}: {e}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::parse_manifest;
    use chrono::TimeZone;

    const PREFIX: &str = "index_64_a";

    fn hk() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn parses_both_offset_forms() {
        let expected = hk()
            .with_ymd_and_hms(2025, 11, 26, 14, 1, 12)
            .unwrap()
            + TimeDelta::milliseconds(185);

        assert_eq!(
            parse_program_date_time("2025-11-26T14:01:12.185+0800").unwrap(),
            expected
        );
        assert_eq!(
            parse_program_date_time("2025-11-26T14:01:12.185+08:00").unwrap(),
            expected
        );
        assert_eq!(
            parse_program_date_time("2025-11-26T06:01:12.185Z").unwrap(),
            expected
        );
    }

    #[test]
    fn rejects_timestamp_without_offset() {
        let err = parse_program_date_time("2025-11-26T14:01:12.185").unwrap_err();
        assert!(matches!(err, TsIndexError::ManifestParse(_)));
    }

    #[tokio::test]
    async fn uses_tag_of_newest_segment() {
        let content = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:01:12.185+0800
#EXTINF:10.000,
index_64_a176413.ts
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:01:22.185+0800
#EXTINF:10.000,
index_64_a176414.ts
";
        let manifest = parse_manifest(content, PREFIX).unwrap();
        let reference = manifest.latest_segment().unwrap();
        let anchor = ProgramDateTimeResolver
            .resolve(&reference, &manifest)
            .await
            .unwrap();

        assert_eq!(anchor.reference_index(), 176414);
        assert_eq!(
            anchor.reference_time(),
            Utc.with_ymd_and_hms(2025, 11, 26, 6, 1, 22).unwrap() + TimeDelta::milliseconds(185)
        );
        assert_eq!(anchor.segment_duration_secs(), 10.0);
        assert_eq!(anchor.source(), AnchorStrategy::ProgramDateTime);
    }

    #[test]
    fn derives_untagged_segment_from_extinf() {
        let content = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:00:00.000+08:00
#EXTINF:10.000,
index_64_a10.ts
#EXTINF:9.984,
index_64_a11.ts
#EXTINF:10.000,
index_64_a12.ts
";
        let manifest = parse_manifest(content, PREFIX).unwrap();
        let time = program_date_time_for(&manifest, 12).unwrap();
        assert_eq!(
            time,
            hk().with_ymd_and_hms(2025, 11, 26, 14, 0, 19).unwrap() + TimeDelta::milliseconds(984)
        );
    }

    #[test]
    fn missing_tag_is_a_manifest_error() {
        let content = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10,\nindex_64_a1.ts\n";
        let manifest = parse_manifest(content, PREFIX).unwrap();
        let err = program_date_time_for(&manifest, 1).unwrap_err();
        assert!(matches!(err, TsIndexError::ManifestParse(_)));
    }

    #[test]
    fn malformed_tag_is_a_manifest_error() {
        let content = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXT-X-PROGRAM-DATE-TIME:yesterday
#EXTINF:10,
index_64_a1.ts
";
        let manifest = parse_manifest(content, PREFIX).unwrap();
        let err = program_date_time_for(&manifest, 1).unwrap_err();
        assert!(matches!(err, TsIndexError::ManifestParse(_)));
    }

    #[test]
    fn oversized_extinf_is_a_manifest_error() {
        let content = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:00:00Z
#EXTINF:1e12,
index_64_a1.ts
#EXTINF:1e12,
index_64_a2.ts
#EXTINF:10,
index_64_a3.ts
";
        let manifest = parse_manifest(content, PREFIX).unwrap();
        let err = program_date_time_for(&manifest, 3).unwrap_err();
        assert!(matches!(err, TsIndexError::ManifestParse(_)));
    }

    #[test]
    fn tag_between_extinf_and_uri_belongs_to_that_segment() {
        let content = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXTINF:10.000,
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:01:12.185+0800
index_64_a176413.ts
#EXTINF:10.000,
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:01:22.185+0800
index_64_a176414.ts
";
        let manifest = parse_manifest(content, PREFIX).unwrap();
        assert_eq!(
            program_date_time_for(&manifest, 176414).unwrap(),
            hk().with_ymd_and_hms(2025, 11, 26, 14, 1, 22).unwrap() + TimeDelta::milliseconds(185)
        );
        assert_eq!(manifest.segments[1].duration_secs, Some(10.0));
    }

    #[test]
    fn gap_without_extinf_cannot_be_bridged() {
        let content = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:00:00Z
index_64_a1.ts
#EXTINF:10,
index_64_a2.ts
";
        let manifest = parse_manifest(content, PREFIX).unwrap();
        let err = program_date_time_for(&manifest, 2).unwrap_err();
        assert!(matches!(err, TsIndexError::ManifestParse(_)));
    }
}
