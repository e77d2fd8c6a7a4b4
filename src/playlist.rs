//! Playlist Reader: fetch the live media playlist and find its newest segment.
//!
//! Parsing is a line scanner over the extended M3U text rather than a full
//! HLS object model. Two details matter here and are easy to lose in a
//! generic parser: a missing `#EXT-X-TARGETDURATION` must be an error rather
//! than a zero default, and `#EXT-X-PROGRAM-DATE-TIME` values are kept as the
//! origin wrote them so the anchor resolver can decide how to read them.

use crate::error::{Result, TsIndexError};
use crate::http_fetch::{self, RetryConfig};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

const TAG_HEADER: &str = "#EXTM3U";
const TAG_TARGET_DURATION: &str = "#EXT-X-TARGETDURATION:";
const TAG_INF: &str = "#EXTINF:";
const TAG_PROGRAM_DATE_TIME: &str = "#EXT-X-PROGRAM-DATE-TIME:";

/// A segment identified by its position in the stream's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentReference {
    pub index: i64,
    /// Nominal duration the numbering advances by, in seconds.
    pub segment_duration_secs: f64,
}

/// One media segment entry as listed in the playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestSegment {
    pub uri: String,
    /// Index embedded in the filename, if it follows `<prefix><digits>.ts`.
    pub index: Option<i64>,
    /// `#EXTINF` duration in seconds.
    pub duration_secs: Option<f64>,
    /// Raw `#EXT-X-PROGRAM-DATE-TIME` value attached to this segment.
    pub program_date_time: Option<String>,
}

/// Parsed live media playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaManifest {
    pub target_duration_secs: f64,
    pub segments: Vec<ManifestSegment>,
}

impl MediaManifest {
    /// Most recent segment matching the naming convention.
    pub fn latest_segment(&self) -> Result<SegmentReference> {
        self.segments
            .iter()
            .filter_map(|s| s.index)
            .max()
            .map(|index| SegmentReference {
                index,
                segment_duration_secs: self.target_duration_secs,
            })
            .ok_or_else(|| {
                TsIndexError::ManifestParse(
                    "no segment URI matching <prefix><digits>.ts in playlist".to_string(),
                )
            })
    }

    /// Position in [`MediaManifest::segments`] of the entry with `index`.
    pub fn position_of(&self, index: i64) -> Option<usize> {
        self.segments.iter().position(|s| s.index == Some(index))
    }
}

/// Fetch `url` and parse it as a media playlist whose segments are named
/// `<prefix><digits>.ts`.
pub async fn fetch_playlist(
    client: &Client,
    url: &str,
    prefix: &str,
    retry: &RetryConfig,
) -> Result<MediaManifest> {
    info!("Fetching playlist: {}", url);

    let content = http_fetch::get_text(client, url, retry).await?;
    let manifest = parse_manifest(&content, prefix)?;

    info!(
        "Parsed playlist: {} segments, target duration {}s",
        manifest.segments.len(),
        manifest.target_duration_secs
    );

    Ok(manifest)
}

/// Parse extended M3U `content` into a [`MediaManifest`].
pub fn parse_manifest(content: &str, prefix: &str) -> Result<MediaManifest> {
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

    match lines.next() {
        Some(first) if first.starts_with(TAG_HEADER) => {}
        _ => {
            return Err(TsIndexError::ManifestParse(
                "playlist does not start with #EXTM3U".to_string(),
            ));
        }
    }

    let mut target_duration = None;
    let mut segments = Vec::new();
    let mut pending_duration = None;
    let mut pending_pdt = None;

    for line in lines {
        if let Some(value) = line.strip_prefix(TAG_TARGET_DURATION) {
            target_duration = Some(parse_target_duration(value)?);
        } else if let Some(value) = line.strip_prefix(TAG_INF) {
            let raw = value.split(',').next().unwrap_or_default().trim();
            pending_duration = raw.parse::<f64>().ok().filter(|d| d.is_finite() && *d >= 0.0);
            if pending_duration.is_none() {
                debug!("Ignoring malformed #EXTINF duration: {}", value);
            }
        } else if let Some(value) = line.strip_prefix(TAG_PROGRAM_DATE_TIME) {
            pending_pdt = Some(value.trim().to_string());
        } else if line.starts_with('#') {
            continue;
        } else {
            segments.push(ManifestSegment {
                uri: line.to_string(),
                index: parse_segment_index(line, prefix),
                duration_secs: pending_duration.take(),
                program_date_time: pending_pdt.take(),
            });
        }
    }

    let target_duration_secs = target_duration.ok_or_else(|| {
        TsIndexError::ManifestParse("playlist has no #EXT-X-TARGETDURATION tag".to_string())
    })?;

    Ok(MediaManifest {
        target_duration_secs,
        segments,
    })
}

fn parse_target_duration(value: &str) -> Result<f64> {
    let value = value.trim();
    value
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| {
            TsIndexError::ManifestParse(format!(
                "#EXT-X-TARGETDURATION value {value:?} is not a positive number"
            ))
        })
}

/// Extract the index from a segment URI named `<prefix><digits>.ts`.
///
/// Only the last path component is considered; query and fragment are
/// ignored, so absolute and tokenized URIs are handled too.
pub fn parse_segment_index(uri: &str, prefix: &str) -> Option<i64> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let name = path.rsplit('/').next().unwrap_or(path);
    let digits = name.strip_prefix(prefix)?.strip_suffix(".ts")?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "index_64_a";

    const LIVE_PLAYLIST: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-MEDIA-SEQUENCE:176413
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:01:12.185+0800
#EXTINF:10.000,
index_64_a176413.ts
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:01:22.185+0800
#EXTINF:10.000,
index_64_a176414.ts
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:01:32.185+0800
#EXTINF:10.000,
index_64_a176415.ts
";

    #[test]
    fn parses_target_duration_and_segments() {
        let manifest = parse_manifest(LIVE_PLAYLIST, PREFIX).unwrap();
        assert_eq!(manifest.target_duration_secs, 10.0);
        assert_eq!(manifest.segments.len(), 3);

        let first = &manifest.segments[0];
        assert_eq!(first.uri, "index_64_a176413.ts");
        assert_eq!(first.index, Some(176413));
        assert_eq!(first.duration_secs, Some(10.0));
        assert_eq!(
            first.program_date_time.as_deref(),
            Some("2025-11-26T14:01:12.185+0800")
        );
    }

    #[test]
    fn program_date_time_after_extinf_stays_with_its_segment() {
        let content = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXTINF:10.000,
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:01:12.185+0800
index_64_a176413.ts
#EXTINF:9.984,
index_64_a176414.ts
#EXTINF:10.000,
#EXT-X-PROGRAM-DATE-TIME:2025-11-26T14:01:32.169+0800
index_64_a176415.ts
";
        let manifest = parse_manifest(content, PREFIX).unwrap();
        let tags: Vec<_> = manifest
            .segments
            .iter()
            .map(|s| (s.index, s.duration_secs, s.program_date_time.as_deref()))
            .collect();
        assert_eq!(
            tags,
            [
                (Some(176413), Some(10.0), Some("2025-11-26T14:01:12.185+0800")),
                (Some(176414), Some(9.984), None),
                (Some(176415), Some(10.0), Some("2025-11-26T14:01:32.169+0800")),
            ]
        );
    }

    #[test]
    fn latest_segment_is_highest_index() {
        let manifest = parse_manifest(LIVE_PLAYLIST, PREFIX).unwrap();
        let reference = manifest.latest_segment().unwrap();
        assert_eq!(reference.index, 176415);
        assert_eq!(reference.segment_duration_secs, 10.0);
        assert_eq!(manifest.position_of(176415), Some(2));
    }

    #[test]
    fn latest_segment_ignores_list_order() {
        let content = "#EXTM3U
#EXT-X-TARGETDURATION:6
#EXTINF:6,
seg_900.ts
#EXTINF:6,
seg_1000.ts
#EXTINF:6,
seg_950.ts
";
        let manifest = parse_manifest(content, "seg_").unwrap();
        assert_eq!(manifest.latest_segment().unwrap().index, 1000);
    }

    #[test]
    fn missing_target_duration_is_an_error() {
        let content = "#EXTM3U\n#EXTINF:10,\nindex_64_a1.ts\n";
        let err = parse_manifest(content, PREFIX).unwrap_err();
        assert!(matches!(err, TsIndexError::ManifestParse(_)));
    }

    #[test]
    fn non_numeric_target_duration_is_an_error() {
        for value in ["ten", "", "0", "-10", "NaN"] {
            let content = format!("#EXTM3U\n#EXT-X-TARGETDURATION:{value}\nindex_64_a1.ts\n");
            let err = parse_manifest(&content, PREFIX).unwrap_err();
            assert!(
                matches!(err, TsIndexError::ManifestParse(_)),
                "value {value:?} should be rejected"
            );
        }
    }

    #[test]
    fn missing_header_is_an_error() {
        let err = parse_manifest("<html>gateway timeout</html>", PREFIX).unwrap_err();
        assert!(matches!(err, TsIndexError::ManifestParse(_)));
    }

    #[test]
    fn no_matching_segment_is_an_error() {
        let content = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10,\nother_1.ts\n";
        let manifest = parse_manifest(content, PREFIX).unwrap();
        assert!(matches!(
            manifest.latest_segment(),
            Err(TsIndexError::ManifestParse(_))
        ));
    }

    #[test]
    fn segment_index_from_uri_forms() {
        assert_eq!(parse_segment_index("index_64_a42.ts", PREFIX), Some(42));
        assert_eq!(
            parse_segment_index("https://cdn.example.com/radio2/index_64_a42.ts?tok=1", PREFIX),
            Some(42)
        );
        assert_eq!(parse_segment_index("index_64_a.ts", PREFIX), None);
        assert_eq!(parse_segment_index("index_64_a4x2.ts", PREFIX), None);
        assert_eq!(parse_segment_index("index_64_a42.aac", PREFIX), None);
        assert_eq!(parse_segment_index("index_128_a42.ts", PREFIX), None);
    }
}
