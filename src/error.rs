use std::collections::TryReserveError;
use std::io;

use rustix::io::Errno;
use thiserror::Error;

/// Why a single file dropped out of the batch.
///
/// These never abort the run; the record is marked dead and the next file is
/// processed.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("open: {0}")]
    Open(Errno),
    #[error("fstat: {0}")]
    Stat(Errno),
    #[error("is a directory")]
    Directory,
    #[error("size of {length} bytes is too small to map")]
    TooSmall { length: u64 },
    #[error("size of {length} bytes does not fit in the address space")]
    TooLarge { length: u64 },
    #[error("mmap of {len} bytes: {source}")]
    Map { len: usize, source: Errno },
    #[error("mlock: {0} ({code})", code = .0.raw_os_error())]
    Lock(Errno),
    #[error("mincore: {0} ({code})", code = .0.raw_os_error())]
    Residency(Errno),
}

impl RecordError {
    /// Rejections that are a normal consequence of the input list rather
    /// than a system failure. Only reported at higher verbosity.
    pub fn is_rejection(&self) -> bool {
        matches!(self, RecordError::Directory | RecordError::TooSmall { .. })
    }
}

/// Failures that end the whole run.
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("cannot allocate registry for {count} files: {source}")]
    Registry {
        count: usize,
        source: TryReserveError,
    },
    #[error("{stage} anon: {source}")]
    Anonymous { stage: &'static str, source: Errno },
    #[error("waiting for input: {0}")]
    Hold(io::Error),
    #[error("writing report: {0}")]
    Output(#[from] io::Error),
}
