use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::engine::Operation;

/// Highest verbosity level that changes behaviour.
pub const MAX_VERBOSITY: u8 = 4;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Lock files into memory, hold their mappings, or report how much of them is resident",
    after_help = "\
Operations:
  -o l  lock all pages of all files (default); the last page of each file is left unlocked
  -o i  do not lock, print how many pages of each file are already in memory
  -o m  just mmap the files read-only and wait
  -o s  sweep every word of every file

Verbosity:
  -v 0  silent unless requested
  -v 1  per-file residency lines
  -v 2  rejected files and the combined line
  -v 3  per-file progress
  -v 4  sizes and touch sums"
)]
pub struct Args {
    /// Verbosity level, 0 to 4
    #[arg(short, long, default_value_t = 0)]
    pub verbose: u8,

    /// Operation: l (lock), i (residency), m (map only), s (sweep)
    #[arg(short = 'o', long = "operation", default_value = "l", value_parser = parse_operation)]
    pub operation: Operation,

    /// Touch all pages after mapping to bring them into memory
    #[arg(short, long)]
    pub touch: bool,

    /// Map and lock this many anonymous bytes instead of files
    #[arg(short, long, default_value_t = 0)]
    pub anonymous: usize,

    /// Files to operate on
    pub files: Vec<PathBuf>,
}

impl Args {
    /// Splits the parsed command line into run options and the file list.
    pub fn into_parts(self) -> (Options, Vec<PathBuf>) {
        let options = Options {
            verbosity: self.verbose.min(MAX_VERBOSITY),
            touch: self.touch,
            operation: self.operation,
            anonymous: self.anonymous,
        };
        (options, self.files)
    }
}

/// Only the first character selects the operation, so `-o lock` and `-o l`
/// are the same.
fn parse_operation(s: &str) -> Result<Operation, String> {
    match s.chars().next() {
        Some('l') => Ok(Operation::Lock),
        Some('i') => Ok(Operation::Residency),
        Some('m') => Ok(Operation::MapOnly),
        Some('s') => Ok(Operation::Sweep),
        _ => Err(format!("unknown operation '{s}'")),
    }
}

/// Run-wide settings. Fixed once parsing is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub verbosity: u8,
    pub touch: bool,
    pub operation: Operation,
    /// Bytes of anonymous memory to lock; 0 means use the file list.
    pub anonymous: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            verbosity: 0,
            touch: false,
            operation: Operation::Lock,
            anonymous: 0,
        }
    }
}

impl Options {
    /// Default log filter for this verbosity. Per-file failures are warnings
    /// and always shown.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbosity {
            0 | 1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<(Options, Vec<PathBuf>), clap::Error> {
        Args::try_parse_from(std::iter::once("clockmem").chain(argv.iter().copied()))
            .map(Args::into_parts)
    }

    #[test]
    fn defaults_to_lock() {
        let (options, files) = parse(&["a", "b"]).unwrap();
        assert_eq!(options, Options::default());
        assert_eq!(files, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn operation_uses_first_character() {
        for (flag, op) in [
            ("l", Operation::Lock),
            ("i", Operation::Residency),
            ("incore", Operation::Residency),
            ("m", Operation::MapOnly),
            ("s", Operation::Sweep),
        ] {
            let (options, _) = parse(&["-o", flag, "f"]).unwrap();
            assert_eq!(options.operation, op, "-o {flag}");
        }
    }

    #[test]
    fn unknown_operation_is_usage_error() {
        assert!(parse(&["-o", "x", "f"]).is_err());
        assert!(parse(&["-o"]).is_err());
    }

    #[test]
    fn flags_combine() {
        let (options, files) = parse(&["-t", "-v", "9", "-a", "8192"]).unwrap();
        assert!(options.touch);
        assert_eq!(options.verbosity, MAX_VERBOSITY);
        assert_eq!(options.anonymous, 8192);
        assert!(files.is_empty());
    }

    #[test]
    fn log_level_follows_verbosity() {
        let at = |verbosity| Options { verbosity, ..Options::default() }.log_level();
        assert_eq!(at(0), LevelFilter::Warn);
        assert_eq!(at(2), LevelFilter::Info);
        assert_eq!(at(4), LevelFilter::Trace);
    }
}
