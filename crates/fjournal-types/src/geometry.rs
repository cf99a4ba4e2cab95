//! The circular address space of the log.
//!
//! Logical log offsets live in `[first, last)`. Every pointer advance —
//! stepping past a record block, or summing a descriptor's tag count —
//! must be followed by [`Geometry::wrap`] so the offset stays inside the
//! window.

/// First/last bounds of the usable log area, in logical block offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    first: u32,
    last: u32,
}

impl Geometry {
    /// Build a geometry. `first` must be strictly below `last`.
    #[must_use]
    pub const fn new(first: u32, last: u32) -> Self {
        assert!(first < last, "log geometry requires first < last");
        Self { first, last }
    }

    /// First usable logical offset.
    #[inline]
    #[must_use]
    pub const fn first(self) -> u32 {
        self.first
    }

    /// One past the final usable logical offset.
    #[inline]
    #[must_use]
    pub const fn last(self) -> u32 {
        self.last
    }

    /// Number of usable log blocks.
    #[inline]
    #[must_use]
    pub const fn span(self) -> u32 {
        self.last - self.first
    }

    /// Fold an advanced offset back into `[first, last)`.
    ///
    /// A single subtraction suffices: callers only ever advance by at most
    /// one log length between wraps.
    #[inline]
    #[must_use]
    pub const fn wrap(self, offset: u32) -> u32 {
        if offset >= self.last {
            offset - self.span()
        } else {
            offset
        }
    }

    /// Whether `offset` is a valid logical log offset.
    #[inline]
    #[must_use]
    pub const fn contains(self, offset: u32) -> bool {
        offset >= self.first && offset < self.last
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn wrap_maps_past_the_end_back_to_the_front() {
        // first=10, last=20: 18,19,20,21 -> 18,19,10,11.
        let geo = Geometry::new(10, 20);
        assert_eq!(geo.wrap(18), 18);
        assert_eq!(geo.wrap(19), 19);
        assert_eq!(geo.wrap(20), 10);
        assert_eq!(geo.wrap(21), 11);
    }

    #[test]
    fn wrap_leaves_in_range_offsets_alone() {
        let geo = Geometry::new(1, 4096);
        assert_eq!(geo.wrap(1), 1);
        assert_eq!(geo.wrap(4095), 4095);
    }

    proptest! {
        #[test]
        fn wrap_always_lands_in_window(
            first in 0u32..1024,
            len in 1u32..4096,
            step in 0u32..4096,
        ) {
            let last = first + len;
            let geo = Geometry::new(first, last);
            let offset = first + (step % len);
            prop_assert!(geo.contains(offset));
            // Advance by anything up to one full log length, then wrap.
            let advanced = offset + (step % len).max(1);
            let wrapped = geo.wrap(advanced.min(last + len - 1));
            prop_assert!(geo.contains(wrapped));
        }
    }
}
