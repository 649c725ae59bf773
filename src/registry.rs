//! Per-file mapping records and the batch mapper that fills them in.

use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};
use rustix::fs::{fstat, open, FileType, Mode, OFlags};
use rustix::io::Result as RustixResult;

use crate::aggregate::BatchTotals;
use crate::error::{FatalError, RecordError};
use crate::geometry::PageGeometry;
use crate::region::{MappedRegion, PinnedRange};

/// OS resources held by a record that mapped successfully.
///
/// Fields drop in declaration order, which is the reverse of acquisition:
/// unlock, then unmap, then close.
#[derive(Debug)]
pub struct ActiveMapping {
    pin: Option<PinnedRange>,
    region: MappedRegion,
    fd: OwnedFd,
}

impl ActiveMapping {
    pub fn region(&self) -> &MappedRegion {
        &self.region
    }

    pub fn pin(&self) -> Option<&PinnedRange> {
        self.pin.as_ref()
    }

    pub(crate) fn set_pin(&mut self, pin: PinnedRange) {
        self.pin = Some(pin);
    }

    /// Releases everything, unlocking before unmapping. Every step is
    /// attempted even if an earlier one fails; the first failure is returned.
    pub fn release(self) -> RustixResult<()> {
        let ActiveMapping { pin, region, fd } = self;
        let unlocked = pin.map_or(Ok(()), PinnedRange::unlock);
        let unmapped = region.unmap();
        drop(fd);
        unlocked.and(unmapped)
    }
}

/// Where a record is in its lifecycle.
#[derive(Debug, Default)]
pub enum RecordState {
    #[default]
    Unattempted,
    Dead(RecordError),
    Active(ActiveMapping),
    /// Resources were released on purpose.
    Closed,
}

/// One input file.
#[derive(Debug)]
pub struct FileMapping<'a> {
    name: &'a Path,
    length: u64,
    geometry: PageGeometry,
    state: RecordState,
}

impl<'a> FileMapping<'a> {
    pub fn new(name: &'a Path) -> Self {
        FileMapping {
            name,
            length: 0,
            geometry: PageGeometry::default(),
            state: RecordState::Unattempted,
        }
    }

    pub fn name(&self) -> &'a Path {
        self.name
    }

    /// Size reported by `fstat`.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn aligned_len(&self) -> usize {
        self.geometry.aligned_len
    }

    /// Bytes actually mapped; always the aligned length.
    pub fn mapped_len(&self) -> usize {
        self.geometry.aligned_len
    }

    pub fn page_count(&self) -> usize {
        self.geometry.page_count
    }

    pub fn state(&self) -> &RecordState {
        &self.state
    }

    /// True while the record holds an open descriptor and mapping.
    pub fn is_open(&self) -> bool {
        matches!(self.state, RecordState::Active(_))
    }

    pub fn is_dead(&self) -> bool {
        matches!(self.state, RecordState::Dead(_))
    }

    pub fn failure(&self) -> Option<&RecordError> {
        match &self.state {
            RecordState::Dead(err) => Some(err),
            _ => None,
        }
    }

    pub fn active(&self) -> Option<&ActiveMapping> {
        match &self.state {
            RecordState::Active(active) => Some(active),
            _ => None,
        }
    }

    pub(crate) fn active_mut(&mut self) -> Option<&mut ActiveMapping> {
        match &mut self.state {
            RecordState::Active(active) => Some(active),
            _ => None,
        }
    }

    /// Opens, stats and maps the file.
    ///
    /// Pages are added to `totals` as candidates once the size is known, even
    /// if mapping then fails. On error the record holds nothing.
    pub fn map(&mut self, page_size: usize, totals: &mut BatchTotals) -> Result<(), RecordError> {
        let fd = open(self.name, OFlags::RDONLY | OFlags::CLOEXEC, Mode::empty())
            .map_err(RecordError::Open)?;
        let stat = fstat(&fd).map_err(RecordError::Stat)?;
        self.length = stat.st_size as u64;

        if FileType::from_raw_mode(stat.st_mode) == FileType::Directory {
            return Err(RecordError::Directory);
        }

        let byte_len = usize::try_from(self.length).map_err(|_| RecordError::TooLarge {
            length: self.length,
        })?;
        self.geometry = PageGeometry::align(byte_len, page_size);
        totals.offer(self.geometry.page_count);

        trace!(
            "'{}': {} -> {} -> {}",
            self.name.display(),
            self.length,
            self.aligned_len(),
            self.mapped_len()
        );

        if self.geometry.is_empty() {
            return Err(RecordError::TooSmall {
                length: self.length,
            });
        }

        let region = MappedRegion::map_file(&fd, self.geometry, page_size).map_err(|source| {
            RecordError::Map {
                len: self.mapped_len(),
                source,
            }
        })?;

        self.state = RecordState::Active(ActiveMapping {
            pin: None,
            region,
            fd,
        });
        Ok(())
    }

    /// Marks the record dead, dropping whatever it holds, and logs why.
    pub fn kill(&mut self, err: RecordError) {
        if err.is_rejection() {
            info!("'{}' {}, dropping it.", self.name.display(), err);
        } else {
            warn!(
                "'{}': {}. Continuing with other files.",
                self.name.display(),
                err
            );
        }
        self.state = RecordState::Dead(err);
    }

    /// Releases the record's resources on purpose. Returns whether anything
    /// was held.
    pub fn close(&mut self) -> bool {
        match std::mem::replace(&mut self.state, RecordState::Closed) {
            RecordState::Active(active) => {
                if let Err(err) = active.release() {
                    warn!("releasing '{}': {}, continuing", self.name.display(), err);
                }
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }
}

/// Fixed-size, ordered collection of records, one per input path.
#[derive(Debug)]
pub struct Registry<'a> {
    records: Vec<FileMapping<'a>>,
    page_size: usize,
}

impl<'a> Registry<'a> {
    pub fn new(paths: &'a [PathBuf], page_size: usize) -> Result<Self, FatalError> {
        let mut records = Vec::new();
        records
            .try_reserve_exact(paths.len())
            .map_err(|source| FatalError::Registry {
                count: paths.len(),
                source,
            })?;
        records.extend(paths.iter().map(|p| FileMapping::new(p)));
        Ok(Registry { records, page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FileMapping<'a>] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [FileMapping<'a>] {
        &mut self.records
    }

    pub fn active(&self) -> impl Iterator<Item = &FileMapping<'a>> {
        self.records.iter().filter(|r| r.is_open())
    }

    /// Maps every record in order. Failures are logged and the record is
    /// marked dead; the batch always runs to the end.
    pub fn map_all(&mut self, totals: &mut BatchTotals) {
        let page_size = self.page_size;
        for record in &mut self.records {
            map_record(record, page_size, totals);
        }
    }

    /// Releases every record still holding resources. Returns how many were
    /// released.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for record in &mut self.records {
            if record.close() {
                debug!("Released '{}'", record.name().display());
                released += 1;
            }
        }
        released
    }
}

/// Runs the batch mapper for one record and books the outcome.
pub(crate) fn map_record(record: &mut FileMapping<'_>, page_size: usize, totals: &mut BatchTotals) -> bool {
    debug!("Working on file '{}'", record.name().display());
    match record.map(page_size, totals) {
        Ok(()) => {
            totals.record_mapped();
            true
        }
        Err(err) => {
            record.kill(err);
            totals.record_dead();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_size;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_of(len: usize) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&vec![1u8; len]).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn maps_with_aligned_geometry() {
        let page = page_size();
        let f = file_of(page + 10);
        let paths = vec![f.path().to_path_buf()];
        let mut registry = Registry::new(&paths, page).unwrap();
        let mut totals = BatchTotals::default();
        registry.map_all(&mut totals);

        let record = &registry.records()[0];
        assert!(record.is_open());
        assert_eq!(record.length(), (page + 10) as u64);
        assert_eq!(record.mapped_len(), 2 * page);
        assert_eq!(record.page_count(), 2);
        assert_eq!(record.active().unwrap().region().len(), 2 * page);
        assert_eq!(totals.candidate_pages, 2);
        assert_eq!(totals.mapped_records, 1);
    }

    #[test]
    fn empty_file_is_too_small() {
        let f = file_of(0);
        let paths = vec![f.path().to_path_buf()];
        let mut registry = Registry::new(&paths, page_size()).unwrap();
        let mut totals = BatchTotals::default();
        registry.map_all(&mut totals);

        let record = &registry.records()[0];
        assert!(matches!(record.failure(), Some(RecordError::TooSmall { length: 0 })));
        assert!(!record.is_open());
        assert_eq!(totals.candidate_pages, 0);
        assert_eq!(totals.dead_records, 1);
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![dir.path().to_path_buf()];
        let mut registry = Registry::new(&paths, page_size()).unwrap();
        let mut totals = BatchTotals::default();
        registry.map_all(&mut totals);
        assert!(matches!(registry.records()[0].failure(), Some(RecordError::Directory)));
    }

    #[test]
    fn missing_file_fails_to_open() {
        let paths = vec![PathBuf::from("/nonexistent/clockmem-test")];
        let mut registry = Registry::new(&paths, page_size()).unwrap();
        let mut totals = BatchTotals::default();
        registry.map_all(&mut totals);
        assert!(matches!(registry.records()[0].failure(), Some(RecordError::Open(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn release_closes_only_active_records() {
        let page = page_size();
        let good = file_of(page);
        let paths = vec![good.path().to_path_buf(), PathBuf::from("/nonexistent/clockmem-test")];
        let mut registry = Registry::new(&paths, page).unwrap();
        let mut totals = BatchTotals::default();
        registry.map_all(&mut totals);

        assert_eq!(registry.active().count(), 1);
        assert_eq!(registry.release_all(), 1);
        assert!(matches!(registry.records()[0].state(), RecordState::Closed));
        assert!(registry.records()[1].is_dead());
        assert_eq!(registry.release_all(), 0);
    }
}
