//! Page residency queries through the
//! [`mincore`](https://www.man7.org/linux/man-pages/man2/mincore.2.html)
//! system call.

use std::io::Error;
use std::os::fd::AsFd;

use libc::mincore;
use rustix::fs::{fstat, FileType};
use rustix::io::{Errno, Result as RustixResult};

use crate::geometry::PageGeometry;
use crate::page_size;
use crate::region::MappedRegion;

/// Returns one flag per page of `region`, set when the page is resident.
///
/// Querying does not fault pages in or change their residency.
pub fn resident_map(region: &MappedRegion) -> RustixResult<Vec<bool>> {
    let mut vec_out = vec![0u8; region.page_count()];
    // SAFETY: the region is a live mapping of `len` bytes and mincore writes
    // exactly len / page_size bytes, the length of vec_out.
    let ret = unsafe { mincore(region.as_mut_ptr(), region.len(), vec_out.as_mut_ptr().cast()) };
    if ret != 0 {
        // Nothing runs between mincore and last_os_error, so errno is intact.
        return Err(Errno::from_io_error(&Error::last_os_error()).unwrap_or(Errno::IO));
    }
    // Only the least significant bit is defined; the rest are reserved.
    Ok(vec_out.into_iter().map(|x| x & 1 != 0).collect())
}

/// Number of resident pages in `region`.
pub fn resident_pages(region: &MappedRegion) -> RustixResult<usize> {
    Ok(resident_map(region)?.into_iter().filter(|&x| x).count())
}

/// Maps the regular file behind `fd`, queries which pages are resident and
/// unmaps it again.
///
/// Symlinks are not followed. Anything other than a regular file yields
/// `EACCES`, the same errno `mmap` would return.
pub fn probe_fd<Fd: AsFd>(fd: &Fd) -> RustixResult<Vec<bool>> {
    let file_stat = fstat(fd)?;
    if FileType::from_raw_mode(file_stat.st_mode) != FileType::RegularFile {
        return Err(Errno::ACCESS);
    }
    let file_size = usize::try_from(file_stat.st_size).map_err(|_| Errno::FBIG)?;
    let geometry = PageGeometry::align(file_size, page_size());
    if geometry.is_empty() {
        return Ok(Vec::new());
    }
    let region = MappedRegion::map_file(fd, geometry, page_size())?;
    let map = resident_map(&region)?;
    region.unmap()?;
    Ok(map)
}
