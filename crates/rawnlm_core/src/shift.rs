//! CFA-aligned search offsets.

/// A displacement between a pixel and a candidate pixel of the same channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shift {
    pub dx: isize,
    pub dy: isize,
}

impl Shift {
    pub const ZERO: Shift = Shift { dx: 0, dy: 0 };

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

/// Enumerates every shift in `{-N*P, ..., N*P}^2` stepping by `P`.
///
/// Order is row-major: `dy` outer, `dx` inner, both ascending. `N * P` must
/// fit in `isize`; the kernel caps `N` at the frame size before scanning.
#[derive(Debug, Clone, Copy)]
pub struct ShiftScanner {
    neighborhood_radius: usize,
    period: usize,
}

impl ShiftScanner {
    pub fn new(neighborhood_radius: usize, period: usize) -> Self {
        Self {
            neighborhood_radius,
            period,
        }
    }

    /// Number of shifts, `(2N + 1)^2`.
    pub fn len(&self) -> usize {
        let side = 2 * self.neighborhood_radius + 1;
        side * side
    }

    /// Never empty: the zero shift is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = Shift> {
        let n = self.neighborhood_radius as isize;
        let p = self.period as isize;
        (-n..=n).flat_map(move |j| (-n..=n).map(move |i| Shift { dx: i * p, dy: j * p }))
    }
}
