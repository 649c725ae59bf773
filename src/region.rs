//! Owning handles for a memory mapping and for a pinned range inside it.
//!
//! Both handles release what they hold exactly once: either explicitly via
//! [`MappedRegion::unmap`] / [`PinnedRange::unlock`], which report failures,
//! or on drop, which logs them.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::os::fd::AsFd;
use std::ptr::{self, NonNull};
use std::slice;

use log::warn;
use rustix::io::{Errno, Result as RustixResult};
use rustix::mm::{mlock, mmap, mmap_anonymous, munlock, munmap, MapFlags, ProtFlags};

use crate::geometry::PageGeometry;

const WORD: usize = std::mem::size_of::<i32>();

/// A page-aligned region returned by `mmap`.
#[derive(Debug)]
pub struct MappedRegion {
    base: NonNull<c_void>,
    geometry: PageGeometry,
    page_size: usize,
}

impl MappedRegion {
    /// Maps `geometry.aligned_len` bytes of `fd` read-only, from offset 0.
    ///
    /// `geometry` must be non-empty and computed for `page_size`. Mapping
    /// does not fault any page in; only reads through the region do.
    pub fn map_file<Fd: AsFd>(fd: &Fd, geometry: PageGeometry, page_size: usize) -> RustixResult<Self> {
        if geometry.is_empty() {
            return Err(Errno::INVAL);
        }
        let base = unsafe {
            // SAFETY: no address hint is passed, so the kernel picks a fresh
            // range that cannot alias any existing Rust allocation. The length
            // is non-zero and the descriptor is borrowed for the call only;
            // the mapping stays valid after the descriptor is closed.
            mmap(
                ptr::null_mut(),
                geometry.aligned_len,
                ProtFlags::READ,
                MapFlags::SHARED,
                fd,
                0,
            )?
        };
        Self::from_raw(base, geometry, page_size)
    }

    /// Maps `len` bytes of private anonymous memory, rounded up to a page.
    pub fn map_anonymous(len: usize, page_size: usize) -> RustixResult<Self> {
        let geometry = PageGeometry::align(len, page_size);
        if geometry.is_empty() {
            return Err(Errno::INVAL);
        }
        let base = unsafe {
            // SAFETY: as in map_file, the kernel chooses the address.
            mmap_anonymous(
                ptr::null_mut(),
                geometry.aligned_len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE,
            )?
        };
        Self::from_raw(base, geometry, page_size)
    }

    fn from_raw(base: *mut c_void, geometry: PageGeometry, page_size: usize) -> RustixResult<Self> {
        let base = NonNull::new(base).ok_or(Errno::NOMEM)?;
        Ok(MappedRegion {
            base,
            geometry,
            page_size,
        })
    }

    pub fn len(&self) -> usize {
        self.geometry.aligned_len
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.geometry.page_count
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.base.as_ptr()
    }

    pub(crate) fn as_mut_ptr(&self) -> *mut c_void {
        self.base.as_ptr()
    }

    /// The whole mapping as bytes.
    ///
    /// Bytes past the end of a file up to the page boundary read as zero.
    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            // SAFETY: the range [base, base + len) is mapped for as long as
            // self lives and every constructor maps it readable. The file may
            // be changed by other processes, in which case only the values
            // read are affected.
            slice::from_raw_parts(self.base.as_ptr().cast::<u8>(), self.len())
        }
    }

    /// Bytes of page `index`, or `None` past the last page.
    pub fn page(&self, index: usize) -> Option<&[u8]> {
        if index >= self.page_count() {
            return None;
        }
        let start = index * self.page_size;
        self.as_bytes().get(start..start + self.page_size)
    }

    /// Every native-endian 32-bit word of the mapping, in order.
    pub fn words(&self) -> impl Iterator<Item = i32> + '_ {
        self.as_bytes()
            .chunks_exact(WORD)
            .map(|w| i32::from_ne_bytes([w[0], w[1], w[2], w[3]]))
    }

    /// The first word of page `index`.
    pub fn first_word(&self, index: usize) -> Option<i32> {
        let page = self.page(index)?;
        let w = page.get(..WORD)?;
        Some(i32::from_ne_bytes([w[0], w[1], w[2], w[3]]))
    }

    /// Pins the first `len` bytes of the region.
    ///
    /// The returned range does not borrow the region; whoever owns both must
    /// drop or unlock the range before unmapping the region.
    pub fn pin(&self, len: usize) -> RustixResult<PinnedRange> {
        if len > self.len() {
            return Err(Errno::INVAL);
        }
        unsafe {
            // SAFETY: [base, base + len) lies within this mapping.
            mlock(self.as_mut_ptr(), len)?;
        }
        Ok(PinnedRange {
            base: self.base,
            len,
        })
    }

    /// Unmaps the region, reporting failure.
    pub fn unmap(self) -> RustixResult<()> {
        let this = ManuallyDrop::new(self);
        unsafe {
            // SAFETY: base and len are exactly what mmap returned, and self is
            // consumed so the memory is never touched again.
            munmap(this.as_mut_ptr(), this.len())
        }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: see unmap.
        if let Err(err) = unsafe { munmap(self.as_mut_ptr(), self.len()) } {
            warn!("munmap of {} bytes at {:p}: {}", self.len(), self.base, err);
        }
    }
}

/// A range locked into physical memory with `mlock`.
#[derive(Debug)]
pub struct PinnedRange {
    base: NonNull<c_void>,
    len: usize,
}

impl PinnedRange {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unlocks the range, reporting failure.
    pub fn unlock(self) -> RustixResult<()> {
        let this = ManuallyDrop::new(self);
        unsafe {
            // SAFETY: the same range that was passed to mlock.
            munlock(this.base.as_ptr(), this.len)
        }
    }
}

impl Drop for PinnedRange {
    fn drop(&mut self) {
        // SAFETY: see unlock.
        if let Err(err) = unsafe { munlock(self.base.as_ptr(), self.len) } {
            warn!("munlock of {} bytes at {:p}: {}", self.len, self.base, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_size;

    #[test]
    fn anonymous_region_is_page_aligned() {
        let page = page_size();
        let region = MappedRegion::map_anonymous(page + 1, page).unwrap();
        assert_eq!(region.len(), 2 * page);
        assert_eq!(region.page_count(), 2);
        assert_eq!(region.as_ptr() as usize % page, 0);
        region.unmap().unwrap();
    }

    #[test]
    fn page_views_are_bounds_checked() {
        let page = page_size();
        let region = MappedRegion::map_anonymous(3 * page, page).unwrap();
        assert_eq!(region.page(2).map(<[u8]>::len), Some(page));
        assert!(region.page(3).is_none());
        assert_eq!(region.first_word(0), Some(0));
        assert!(region.first_word(3).is_none());
        assert_eq!(region.words().count(), 3 * page / WORD);
    }

    #[test]
    fn zero_length_is_rejected() {
        let err = MappedRegion::map_anonymous(0, page_size()).unwrap_err();
        assert_eq!(err, Errno::INVAL);
    }

    #[test]
    fn pin_beyond_region_is_rejected() {
        let page = page_size();
        let region = MappedRegion::map_anonymous(page, page).unwrap();
        assert_eq!(region.pin(2 * page).unwrap_err(), Errno::INVAL);
    }

    #[test]
    fn empty_pin_then_unlock() {
        let page = page_size();
        let region = MappedRegion::map_anonymous(page, page).unwrap();
        let pin = region.pin(0).unwrap();
        assert!(pin.is_empty());
        pin.unlock().unwrap();
        region.unmap().unwrap();
    }
}
