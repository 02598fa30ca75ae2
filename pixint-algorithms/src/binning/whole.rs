//! Whole-pixel engines: every pixel lands in at most one bin.

use pixint_core::Histogram;

use super::{in_range, AxisRestriction, BinnedAxis, BinningRequest, Secondary};

impl BinnedAxis<'_> {
    /// Bin of pixel `[row, col]`; bin 0 for every finite value on a zero-width range.
    #[inline]
    fn whole_bin(&self, row: usize, col: usize) -> Option<usize> {
        let value = self.coords.value(row, col);
        if !value.is_finite() {
            return None;
        }
        if self.edges.is_degenerate() {
            return Some(0);
        }
        self.edges.locate(value).or_else(|| {
            // Angles just past the cut may still belong to the far end of the grid.
            if self.periodic {
                self.edges
                    .locate(value - 360.0)
                    .or_else(|| self.edges.locate(value + 360.0))
            } else {
                None
            }
        })
    }
}

impl AxisRestriction<'_> {
    #[inline]
    fn admits(&self, row: usize, col: usize) -> bool {
        let value = self.coords.value(row, col);
        value.is_finite() && in_range(value, self.range, self.periodic)
    }
}

/// Accumulates one detector row.
pub(super) fn accumulate_row(request: &BinningRequest<'_>, row: usize, hist: &mut Histogram) {
    let data = request.frame.data();
    let (_, cols) = data.dim();

    for col in 0..cols {
        if !request.includes(row, col) {
            continue;
        }
        let signal = data[[row, col]];
        if !signal.is_finite() {
            continue;
        }
        let Some(x) = request.primary.whole_bin(row, col) else {
            continue;
        };
        let y = match request.secondary {
            Secondary::Unrestricted => 0,
            Secondary::Restricted(restriction) => {
                if !restriction.admits(row, col) {
                    continue;
                }
                0
            }
            Secondary::Binned(axis) => match axis.whole_bin(row, col) {
                Some(y) => y,
                None => continue,
            },
        };
        hist.add(y, x, 1.0, signal, request.frame.error_at(row, col));
    }
}
