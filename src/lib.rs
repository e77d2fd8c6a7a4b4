//! Locate the HLS live-stream segment that was on air at a past wall-clock time.
//!
//! The newest segment index is read from the live playlist, pinned to a
//! wall-clock instant by one of three [`anchor`] strategies, and extrapolated
//! back (or forward) to the caller's target time by [`extrapolate`].

pub mod anchor;
pub mod config;
pub mod error;
pub mod extrapolate;
pub mod http_fetch;
pub mod locator;
pub mod playlist;
pub mod report;
pub mod target_time;

pub use config::{AnchorStrategy, Config};
pub use error::{Result, TsIndexError};
pub use locator::Locator;
