//! One run over the whole input list.

use std::io::Write;
use std::path::PathBuf;

use log::{debug, trace};

use crate::aggregate::BatchTotals;
use crate::anonymous::hold_anonymous;
use crate::config::Options;
use crate::engine::{apply, touch_pages, Operation, Outcome};
use crate::error::FatalError;
use crate::hold::{hold_then_release, HoldGate};
use crate::page_size;
use crate::registry::{map_record, FileMapping, Registry};
use crate::report;

/// Processes `files` according to `options`, writing report lines to `out`
/// and waiting on `gate` when the operation holds memory.
///
/// With no files and a non-zero anonymous size, locks anonymous memory
/// instead.
pub fn run<G: HoldGate, W: Write>(
    options: &Options,
    files: &[PathBuf],
    gate: &mut G,
    out: &mut W,
) -> Result<BatchTotals, FatalError> {
    let page_size = page_size();
    if files.is_empty() && options.anonymous != 0 {
        hold_anonymous(options.anonymous, page_size, gate, out)?;
        return Ok(BatchTotals::default());
    }

    let mut registry = Registry::new(files, page_size)?;
    let totals = process(&mut registry, options, out)?;
    finish(&mut registry, &totals, options, gate, out)?;
    Ok(totals)
}

/// Maps, touches and operates on every record in order. Each record is
/// either dead or in its final per-operation state before the next starts.
pub fn process<W: Write>(
    registry: &mut Registry<'_>,
    options: &Options,
    out: &mut W,
) -> Result<BatchTotals, FatalError> {
    let mut totals = BatchTotals::default();
    let page_size = registry.page_size();
    for record in registry.records_mut() {
        if !map_record(record, page_size, &mut totals) {
            continue;
        }
        if options.touch {
            touch(record);
        }
        match apply(options.operation, record) {
            Ok(outcome) => {
                book(outcome, record, options, &mut totals, out)?;
                debug!("Success for file '{}'", record.name().display());
            }
            Err(err) => {
                record.kill(err);
                totals.record_dead();
            }
        }
    }
    Ok(totals)
}

fn touch(record: &FileMapping<'_>) {
    if let Some(active) = record.active() {
        let sum = touch_pages(active.region());
        trace!("Sum of file '{}': {}", record.name().display(), sum);
    }
}

fn book<W: Write>(
    outcome: Outcome,
    record: &FileMapping<'_>,
    options: &Options,
    totals: &mut BatchTotals,
    out: &mut W,
) -> Result<(), FatalError> {
    match outcome {
        Outcome::Locked { pages } => totals.record_lock(pages),
        Outcome::Probed { pages, resident } => {
            totals.record_probe(pages, resident);
            if options.verbosity > 0 {
                report::residency_line(out, pages, resident, record.name())?;
            }
        }
        Outcome::Swept { hits } => totals.record_sentinels(hits),
        Outcome::Held => {}
    }
    Ok(())
}

/// Writes the summary, holds if the operation calls for it, and releases
/// whatever is still open.
pub fn finish<G: HoldGate, W: Write>(
    registry: &mut Registry<'_>,
    totals: &BatchTotals,
    options: &Options,
    gate: &mut G,
    out: &mut W,
) -> Result<(), FatalError> {
    if totals.should_report(options.verbosity) {
        report::combined_line(out, totals)?;
    }

    if options.operation.holds() {
        hold_then_release(registry, totals, options.operation, gate, out)?;
    } else {
        registry.release_all();
    }

    if options.verbosity > 0 && options.operation == Operation::Sweep {
        report::sentinel_line(out, totals)?;
    }
    out.flush()?;
    Ok(())
}
