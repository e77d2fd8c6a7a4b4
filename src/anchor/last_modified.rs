//! Strategy C: `Last-Modified` on a HEAD of the reference segment.
//!
//! The header has whole-second precision and no duration of its own, so the
//! playlist's target duration is used.

use super::{AnchorResolver, TimeAnchor};
use crate::config::AnchorStrategy;
use crate::error::{Result, TsIndexError};
use crate::extrapolate::SegmentUrlTemplate;
use crate::http_fetch::{self, RetryConfig};
use crate::playlist::{MediaManifest, SegmentReference};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::LAST_MODIFIED;
use tracing::info;

const HEADER_NAME: &str = "Last-Modified";

pub struct LastModifiedResolver {
    client: Client,
    template: SegmentUrlTemplate,
    retry: RetryConfig,
}

impl LastModifiedResolver {
    pub fn new(client: Client, template: SegmentUrlTemplate, retry: RetryConfig) -> Self {
        Self {
            client,
            template,
            retry,
        }
    }
}

#[async_trait]
impl AnchorResolver for LastModifiedResolver {
    fn strategy(&self) -> AnchorStrategy {
        AnchorStrategy::LastModified
    }

    async fn resolve(
        &self,
        reference: &SegmentReference,
        _manifest: &MediaManifest,
    ) -> Result<TimeAnchor> {
        let url = self.template.url_for(reference.index);
        info!("Probing {} for Last-Modified", url);

        let response = http_fetch::head(&self.client, &url, &self.retry).await?;
        let raw = response
            .headers()
            .get(LAST_MODIFIED)
            .ok_or_else(|| TsIndexError::HeaderMissing {
                header: HEADER_NAME.to_string(),
                url: url.clone(),
            })?;
        let value = raw.to_str().map_err(|_| {
            TsIndexError::header_parse(
                HEADER_NAME,
                &String::from_utf8_lossy(raw.as_bytes()),
                "value is not visible ASCII",
            )
        })?;

        let modified = parse_http_date(value)?;
        info!("Anchor from Last-Modified: index {} at {}", reference.index, modified);

        TimeAnchor::new(
            reference.index,
            modified,
            reference.segment_duration_secs,
            self.strategy(),
        )
    }
}

/// Parse an HTTP date (`Wed, 26 Nov 2025 06:09:35 GMT`) per RFC 5322 rules.
pub fn parse_http_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TsIndexError::header_parse(HEADER_NAME, value, e.to_string()))
}
