//! Report lines written to standard output.

use std::io::{self, Write};
use std::path::Path;

use crate::aggregate::{percent, BatchTotals};
use crate::engine::SENTINEL;

/// Name shown on the combined residency line.
pub const ALL_FILES: &str = "<ALLFILES>";

pub fn residency_line<W: Write>(
    out: &mut W,
    pages: usize,
    resident: usize,
    name: &Path,
) -> io::Result<()> {
    writeln!(
        out,
        "{:.1}% {} pages {} resident: {}",
        percent(resident as u64, pages as u64),
        pages,
        resident,
        name.display()
    )
}

/// The combined line. The percentage is taken against the pages actually
/// probed, the page count shown is every candidate page.
pub fn combined_line<W: Write>(out: &mut W, totals: &BatchTotals) -> io::Result<()> {
    writeln!(
        out,
        "{:.1}% {} pages {} resident: {}",
        totals.resident_percent(),
        totals.candidate_pages,
        totals.resident_pages,
        ALL_FILES
    )
}

pub fn sentinel_line<W: Write>(out: &mut W, totals: &BatchTotals) -> io::Result<()> {
    writeln!(out, "Number of {}s: {}", SENTINEL, totals.sentinel_hits)
}
