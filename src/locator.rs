//! Pipeline: Playlist Reader, then Anchor Resolver, then Index Extrapolator.
//!
//! A [`Locator`] holds only configuration and an HTTP client. Each call to
//! [`Locator::locate`] reads the live playlist afresh; nothing is cached
//! between calls.

use crate::anchor::{self, AnchorResolver, TimeAnchor};
use crate::config::Config;
use crate::error::{Result, TsIndexError};
use crate::extrapolate::{self, ExtrapolationResult, SegmentUrlTemplate, TargetSpec};
use crate::http_fetch::RetryConfig;
use crate::playlist;
use crate::target_time;
use reqwest::Client;
use tracing::info;

pub struct Locator {
    config: Config,
    client: Client,
    template: SegmentUrlTemplate,
    retry: RetryConfig,
    resolver: Box<dyn AnchorResolver>,
}

impl Locator {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(concat!("tsindex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TsIndexError::Config(format!("failed to create HTTP client: {e}")))?;

        let template = config.url_template()?;
        let retry = config.retry_config();
        let resolver = anchor::build_resolver(&config, client.clone())?;

        Ok(Self {
            config,
            client,
            template,
            retry,
            resolver,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read the playlist and resolve an anchor for its newest segment.
    pub async fn resolve_anchor(&self) -> Result<TimeAnchor> {
        let manifest = playlist::fetch_playlist(
            &self.client,
            &self.config.playlist_url,
            &self.config.segment_prefix,
            &self.retry,
        )
        .await?;
        let reference = manifest.latest_segment()?;

        info!(
            "Newest segment: index {} (target duration {}s), resolving with {}",
            reference.index,
            reference.segment_duration_secs,
            self.resolver.strategy()
        );

        self.resolver.resolve(&reference, &manifest).await
    }

    /// Locate the segment that was live at `target`.
    pub async fn locate(&self, target: &TargetSpec) -> Result<ExtrapolationResult> {
        let anchor = self.resolve_anchor().await?;
        let result = extrapolate::extrapolate(&anchor, target, &self.template);

        info!(
            "Target {} -> index {} ({})",
            result.target_time.to_rfc3339(),
            result.target_index,
            result.url
        );

        Ok(result)
    }

    /// Parse `input` in the configured civil offset, then [`Locator::locate`].
    pub async fn locate_str(&self, input: &str) -> Result<ExtrapolationResult> {
        let target_time = target_time::parse_target_time(input, self.config.civil_offset)?;
        self.locate(&TargetSpec::new(target_time)).await
    }
}
