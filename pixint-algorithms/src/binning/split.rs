//! Pixel-splitting engines: every pixel is spread over the bins its
//! coordinate envelope overlaps.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

use pixint_core::Histogram;

use super::{in_range, AxisRestriction, BinnedAxis, BinningRequest, Secondary};

/// Distributes `scale` over the bins spanned by `[min_exact, max_exact]`,
/// both given in units of bins from the lowest edge.
///
/// Bins strictly inside the span get `scale / (max_exact - min_exact)`; the
/// first and last get that share times their covered fraction. Bins outside
/// `0..n_bins` are dropped. A span inside a single bin puts all of `scale`
/// there, with a value exactly on the top edge counted in the last bin.
pub fn split_fractions(
    min_exact: f64,
    max_exact: f64,
    n_bins: usize,
    scale: f64,
    mut emit: impl FnMut(usize, f64),
) {
    let n = n_bins as f64;
    let min_bin = min_exact.floor();
    let max_bin = max_exact.floor();

    if min_bin == max_bin {
        if min_bin >= 0.0 && min_bin < n {
            emit(min_bin as usize, scale);
        } else if min_exact == n && n_bins > 0 {
            emit(n_bins - 1, scale);
        }
        return;
    }

    let per_bin = scale / (max_exact - min_exact);
    let first = min_bin.max(0.0);
    let last = max_bin.min(n - 1.0);
    if first > last {
        return;
    }
    for bin in (first as usize)..=(last as usize) {
        let b = bin as f64;
        let coverage = if b == min_bin {
            1.0 - (min_exact - min_bin)
        } else if b == max_bin {
            max_exact - max_bin
        } else {
            1.0
        };
        if coverage > 0.0 {
            emit(bin, per_bin * coverage);
        }
    }
}

/// Fraction of the envelope `[lo, hi]` lying inside `range`.
///
/// Periodic envelopes are also compared one turn up and down. A zero-width
/// envelope counts fully when inside the range and not at all otherwise.
#[must_use]
pub fn range_fraction((lo, hi): (f64, f64), range: [f64; 2], periodic: bool) -> f64 {
    if !lo.is_finite() || !hi.is_finite() || hi < lo {
        return 0.0;
    }
    let width = hi - lo;
    if width == 0.0 {
        return if in_range(lo, range, periodic) { 1.0 } else { 0.0 };
    }
    let overlap = |shift: f64| ((hi + shift).min(range[1]) - (lo + shift).max(range[0])).max(0.0);
    let mut covered = overlap(0.0);
    if periodic {
        covered += overlap(-360.0) + overlap(360.0);
    }
    (covered / width).min(1.0)
}

impl BinnedAxis<'_> {
    /// Pushes `(bin, weight)` for every bin pixel `[row, col]` covers, the
    /// weights summing to `scale` when the envelope lies inside the edges.
    fn split_bins(&self, row: usize, col: usize, scale: f64, out: &mut Vec<(usize, f64)>) {
        out.clear();
        let (lo, hi) = self.coords.bounds(row, col);
        if !lo.is_finite() || !hi.is_finite() || hi < lo {
            return;
        }
        let edges = self.edges;
        if edges.is_degenerate() {
            out.push((0, scale));
            return;
        }

        let (first, last, width, n) = (edges.lo(), edges.hi(), edges.bin_width(), edges.n_bins());
        let mut spread = |lo: f64, hi: f64| {
            if hi < first || lo > last {
                return;
            }
            split_fractions((lo - first) / width, (hi - first) / width, n, scale, |bin, w| {
                out.push((bin, w));
            });
        };
        spread(lo, hi);
        // An envelope across the ±180 cut is stored with its maximum above
        // 180, and a grid crossing the cut runs past 180; either way part of
        // the pixel may sit one turn away. Copies that only touch an outer
        // edge are skipped so a full-circle grid counts nothing twice.
        if self.periodic {
            for shift in [-360.0, 360.0] {
                if hi + shift > first && lo + shift < last {
                    spread(lo + shift, hi + shift);
                }
            }
        }
    }
}

impl AxisRestriction<'_> {
    #[inline]
    fn fraction(&self, row: usize, col: usize) -> f64 {
        range_fraction(self.coords.bounds(row, col), self.range, self.periodic)
    }
}

/// Accumulates one detector row.
pub(super) fn accumulate_row(request: &BinningRequest<'_>, row: usize, hist: &mut Histogram) {
    let data = request.frame.data();
    let (_, cols) = data.dim();
    let mut xs = Vec::new();
    let mut ys = Vec::new();

    for col in 0..cols {
        if !request.includes(row, col) {
            continue;
        }
        let signal = data[[row, col]];
        if !signal.is_finite() {
            continue;
        }
        let error = request.frame.error_at(row, col);

        match request.secondary {
            Secondary::Unrestricted | Secondary::Restricted(_) => {
                let scale = match request.secondary {
                    Secondary::Restricted(restriction) => restriction.fraction(row, col),
                    _ => 1.0,
                };
                if scale <= 0.0 {
                    continue;
                }
                request.primary.split_bins(row, col, scale, &mut xs);
                for &(x, w) in &xs {
                    hist.add(0, x, w, signal, error);
                }
            }
            Secondary::Binned(axis) => {
                request.primary.split_bins(row, col, 1.0, &mut xs);
                if xs.is_empty() {
                    continue;
                }
                axis.split_bins(row, col, 1.0, &mut ys);
                for &(y, wy) in &ys {
                    for &(x, wx) in &xs {
                        hist.add(y, x, wx * wy, signal, error);
                    }
                }
            }
        }
    }
}
