//! Page-aligned sizing.

/// Sizes of a mapping rounded up to whole pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageGeometry {
    /// Byte length rounded up to a multiple of the page size.
    pub aligned_len: usize,
    /// `aligned_len / page_size`.
    pub page_count: usize,
}

impl PageGeometry {
    /// Rounds `byte_len` up to whole pages of `page_size` bytes.
    ///
    /// A zero length yields a zero geometry, which callers treat as
    /// "nothing to map".
    pub fn align(byte_len: usize, page_size: usize) -> Self {
        debug_assert!(page_size.is_power_of_two());
        let page_count = byte_len.div_ceil(page_size);
        PageGeometry {
            aligned_len: page_count * page_size,
            page_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.page_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 4096;

    #[test]
    fn exact_multiple_is_unchanged() {
        let g = PageGeometry::align(3 * PAGE, PAGE);
        assert_eq!(g.aligned_len, 3 * PAGE);
        assert_eq!(g.page_count, 3);
    }

    #[test]
    fn partial_page_rounds_up() {
        for len in [1, PAGE - 1, PAGE + 1, 5 * PAGE + 17] {
            let g = PageGeometry::align(len, PAGE);
            assert_eq!(g.aligned_len % PAGE, 0);
            assert!(g.aligned_len >= len);
            assert!(g.aligned_len - len < PAGE);
            assert_eq!(g.page_count, g.aligned_len / PAGE);
        }
    }

    #[test]
    fn zero_length_is_empty() {
        let g = PageGeometry::align(0, PAGE);
        assert!(g.is_empty());
        assert_eq!(g.aligned_len, 0);
    }

    #[test]
    fn honours_larger_pages() {
        let g = PageGeometry::align(20_000, 16384);
        assert_eq!(g.aligned_len, 32768);
        assert_eq!(g.page_count, 2);
    }
}
