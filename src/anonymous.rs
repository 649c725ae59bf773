//! Locking a block of anonymous memory instead of files.
//!
//! There is nothing to fall back to here, so every failure ends the run.

use std::io::Write;

use log::debug;

use crate::error::FatalError;
use crate::hold::HoldGate;
use crate::region::MappedRegion;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

fn fatal(stage: &'static str) -> impl FnOnce(rustix::io::Errno) -> FatalError {
    move |source| FatalError::Anonymous { stage, source }
}

/// Maps and locks `size` bytes, waits on `gate`, then unlocks and unmaps.
pub fn hold_anonymous<G: HoldGate, W: Write>(
    size: usize,
    page_size: usize,
    gate: &mut G,
    out: &mut W,
) -> Result<(), FatalError> {
    writeln!(out, "Doing mmap of {:.3} GB", size as f64 / GIB)?;
    out.flush()?;
    let region = MappedRegion::map_anonymous(size, page_size).map_err(fatal("mmap"))?;
    debug!("mapped {} bytes for a request of {}", region.len(), size);

    writeln!(out, "Doing mlock")?;
    out.flush()?;
    let pin = region.pin(region.len()).map_err(fatal("mlock"))?;

    let start = region.as_ptr();
    let end = start.cast::<u8>().wrapping_add(region.len());
    writeln!(
        out,
        "mapped and mlocked anonymously @ {:p}-{:p}, press enter to release",
        start, end
    )?;
    out.flush()?;
    gate.pause().map_err(FatalError::Hold)?;

    writeln!(out, "Doing munlock")?;
    pin.unlock().map_err(fatal("munlock"))?;
    writeln!(out, "Doing munmap")?;
    region.unmap().map_err(fatal("munmap"))?;
    out.flush()?;
    Ok(())
}
