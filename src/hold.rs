//! Waiting for the operator before memory is released.

use std::io::{self, Read, Write};

use log::info;

use crate::aggregate::BatchTotals;
use crate::engine::Operation;
use crate::error::FatalError;
use crate::registry::Registry;

/// Something that blocks until the operator lets the run continue.
pub trait HoldGate {
    /// Blocks until exactly one signal arrives.
    fn pause(&mut self) -> io::Result<()>;
}

/// Waits for one byte on standard input. End of input also resumes.
#[derive(Debug, Default)]
pub struct StdinGate;

impl HoldGate for StdinGate {
    fn pause(&mut self) -> io::Result<()> {
        let mut byte = [0u8; 1];
        let _read = io::stdin().lock().read(&mut byte)?;
        Ok(())
    }
}

/// Tells the operator what is held, waits on `gate`, then releases every
/// active record. Returns how many records were released.
pub fn hold_then_release<G: HoldGate, W: Write>(
    registry: &mut Registry<'_>,
    totals: &BatchTotals,
    op: Operation,
    gate: &mut G,
    out: &mut W,
) -> Result<usize, FatalError> {
    let verb = match op {
        Operation::Lock => "Holding",
        _ => "Mapped",
    };
    writeln!(
        out,
        "{} {} pages, press enter to release",
        verb, totals.candidate_pages
    )?;
    out.flush()?;
    gate.pause().map_err(FatalError::Hold)?;

    let released = registry.release_all();
    info!("Released {} of {} files", released, registry.len());
    Ok(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_size;

    struct FailingGate;

    impl HoldGate for FailingGate {
        fn pause(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "closed"))
        }
    }

    #[test]
    fn gate_failure_is_fatal() {
        let mut registry = Registry::new(&[], page_size()).unwrap();
        let err = hold_then_release(
            &mut registry,
            &BatchTotals::default(),
            Operation::MapOnly,
            &mut FailingGate,
            &mut io::sink(),
        )
        .unwrap_err();
        assert!(matches!(err, FatalError::Hold(_)));
    }
}
