//! Output of a located segment: a short text report or pretty JSON.

use crate::extrapolate::ExtrapolationResult;
use chrono::FixedOffset;
use std::io::{self, Write};

/// Human-readable report. Times are shown in `civil_offset`; the segment URL
/// is the last line so it can be picked up with `tail -n1`.
pub fn write_text(
    out: &mut impl Write,
    result: &ExtrapolationResult,
    civil_offset: FixedOffset,
) -> io::Result<()> {
    let diagnostics = &result.diagnostics;
    let reference_time = diagnostics.reference_time.with_timezone(&civil_offset);

    writeln!(out, "Segment duration: {}s", diagnostics.segment_duration_secs)?;
    writeln!(out, "Anchor source:    {}", diagnostics.strategy)?;
    writeln!(
        out,
        "Reference: index {} at {}",
        diagnostics.reference_index,
        reference_time.to_rfc3339()
    )?;
    writeln!(
        out,
        "Target:    index {} at {}",
        result.target_index,
        result.target_time.to_rfc3339()
    )?;
    writeln!(out)?;
    writeln!(out, "{}", result.url)
}

pub fn write_json(out: &mut impl Write, result: &ExtrapolationResult) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, result)?;
    writeln!(out)
}
