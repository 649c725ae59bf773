//! Lock files into memory, hold their mappings open, or measure how much of
//! them is resident, using `mmap`, `mlock` and the
//! [`mincore`](https://www.man7.org/linux/man-pages/man2/mincore.2.html)
//! system call. This library also re-exports `rustix::param::page_size`,
//! which every size it reports is a multiple of.

pub mod aggregate;
pub mod anonymous;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod hold;
pub mod region;
pub mod registry;
pub mod report;
pub mod residency;

pub use rustix::param::page_size;

pub use aggregate::BatchTotals;
pub use batch::{finish, process, run};
pub use config::{Args, Options};
pub use engine::Operation;
pub use error::{FatalError, RecordError};
pub use hold::{HoldGate, StdinGate};
pub use registry::{FileMapping, Registry};
pub use residency::probe_fd;
