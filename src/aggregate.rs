//! Run-wide totals, threaded through batch processing as an explicit value.

/// Percentage of `part` in `whole`, 0 when `whole` is 0.
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Counters accumulated record by record. Never decremented.
///
/// `candidate_pages` counts every page offered for mapping, including pages
/// of records that fail later. The residency percentage is taken against
/// `probed_pages` instead, the pages that were actually measured.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchTotals {
    pub candidate_pages: u64,
    pub probed_pages: u64,
    pub resident_pages: u64,
    pub locked_pages: u64,
    pub sentinel_hits: u64,
    pub mapped_records: usize,
    pub dead_records: usize,
}

impl BatchTotals {
    pub fn offer(&mut self, pages: usize) {
        self.candidate_pages += pages as u64;
    }

    pub fn record_mapped(&mut self) {
        self.mapped_records += 1;
    }

    pub fn record_dead(&mut self) {
        self.dead_records += 1;
    }

    pub fn record_probe(&mut self, pages: usize, resident: usize) {
        self.probed_pages += pages as u64;
        self.resident_pages += resident as u64;
    }

    pub fn record_lock(&mut self, pages: usize) {
        self.locked_pages += pages as u64;
    }

    pub fn record_sentinels(&mut self, hits: u64) {
        self.sentinel_hits += hits;
    }

    pub fn resident_percent(&self) -> f64 {
        percent(self.resident_pages, self.probed_pages)
    }

    /// The combined line is noise when nothing was resident, unless asked
    /// for with verbosity above 1.
    pub fn should_report(&self, verbosity: u8) -> bool {
        self.resident_pages > 0 || verbosity > 1
    }
}
