//! The per-record operations and the optional touch pass.

use std::hint::black_box;

use log::{debug, trace};

use crate::error::RecordError;
use crate::region::MappedRegion;
use crate::registry::FileMapping;
use crate::residency::resident_pages;

/// Word counted by the sweep.
pub const SENTINEL: i32 = 42;

/// What to do with every mapped file. Exactly one per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Pin every page but the last.
    Lock,
    /// Report how many pages are resident, then release the file.
    Residency,
    /// Keep the mapping and nothing else.
    MapOnly,
    /// Read every word, counting the sentinel.
    Sweep,
}

impl Operation {
    /// Whether the run waits for the operator before releasing.
    pub fn holds(self) -> bool {
        matches!(self, Operation::Lock | Operation::MapOnly)
    }
}

/// Result of running an operation on one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Locked { pages: usize },
    Probed { pages: usize, resident: usize },
    Held,
    Swept { hits: u64 },
}

/// Reads the first word of every page so each one gets faulted in.
/// Returns the wrapping sum of those words.
pub fn touch_pages(region: &MappedRegion) -> i32 {
    let sum = (0..region.page_count())
        .filter_map(|i| region.first_word(i))
        .fold(0i32, i32::wrapping_add);
    black_box(sum)
}

/// Counts sentinel words across the whole region.
pub fn sweep(region: &MappedRegion) -> u64 {
    let hits = region.words().filter(|&w| w == SENTINEL).count() as u64;
    black_box(hits)
}

/// Length handed to `mlock`: everything except the final page.
pub fn lock_len(region: &MappedRegion) -> usize {
    region.len().saturating_sub(region.page_size())
}

/// Runs `op` on an active record.
///
/// Residency always leaves the record closed. Lock leaves the pinned range in
/// the record for the hold gate to release. A record that is not active is
/// left alone and yields `Held`.
pub fn apply(op: Operation, record: &mut FileMapping<'_>) -> Result<Outcome, RecordError> {
    let Some(active) = record.active_mut() else {
        return Ok(Outcome::Held);
    };
    let outcome = match op {
        Operation::Lock => {
            let region = active.region();
            let pin = region.pin(lock_len(region)).map_err(RecordError::Lock)?;
            let pages = pin.len() / region.page_size();
            debug!("Locked {} bytes at {:p}", pin.len(), region.as_ptr());
            active.set_pin(pin);
            Outcome::Locked { pages }
        }
        Operation::Residency => {
            let region = active.region();
            let pages = region.page_count();
            let resident = resident_pages(region).map_err(RecordError::Residency)?;
            record.close();
            Outcome::Probed { pages, resident }
        }
        Operation::MapOnly => Outcome::Held,
        Operation::Sweep => Outcome::Swept {
            hits: sweep(active.region()),
        },
    };
    trace!("'{}': {:?}", record.name().display(), outcome);
    Ok(outcome)
}
