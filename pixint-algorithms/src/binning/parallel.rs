//! Serial and data-parallel accumulation over detector rows.

use pixint_core::Histogram;
use rayon::prelude::*;

/// Rows handed to one parallel task.
const ROWS_PER_TASK: usize = 16;

/// How the per-pixel accumulation is scheduled.
///
/// Accumulation is a commutative sum, so the parallel path differs from the
/// serial one only in summation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// One pass over the frame on the calling thread.
    #[default]
    Serial,
    /// Row blocks accumulated into private histograms on the rayon pool,
    /// then merged.
    Parallel,
}

/// Runs `accumulate` for every row in `0..rows` into a `[ny, nx]` histogram.
pub(crate) fn reduce_rows<F>(
    rows: usize,
    shape: (usize, usize),
    with_variance: bool,
    execution: ExecutionStrategy,
    accumulate: F,
) -> Histogram
where
    F: Fn(usize, &mut Histogram) + Sync,
{
    let (ny, nx) = shape;
    match execution {
        ExecutionStrategy::Serial => {
            let mut hist = Histogram::new(ny, nx, with_variance);
            for row in 0..rows {
                accumulate(row, &mut hist);
            }
            hist
        }
        ExecutionStrategy::Parallel => {
            let blocks: Vec<(usize, usize)> = (0..rows)
                .step_by(ROWS_PER_TASK)
                .map(|start| (start, (start + ROWS_PER_TASK).min(rows)))
                .collect();

            let partials: Vec<Histogram> = blocks
                .par_iter()
                .map(|&(start, end)| {
                    let mut hist = Histogram::new(ny, nx, with_variance);
                    for row in start..end {
                        accumulate(row, &mut hist);
                    }
                    hist
                })
                .collect();

            let mut total = Histogram::new(ny, nx, with_variance);
            for partial in &partials {
                total.merge(partial);
            }
            total
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp, clippy::cast_precision_loss)]
    use super::*;

    #[test]
    fn test_parallel_matches_serial() {
        let accumulate = |row: usize, hist: &mut Histogram| {
            hist.add(0, row % 3, 1.0, row as f64, Some(1.0));
        };
        let serial = reduce_rows(100, (1, 3), true, ExecutionStrategy::Serial, accumulate);
        let parallel = reduce_rows(100, (1, 3), true, ExecutionStrategy::Parallel, accumulate);
        assert_eq!(serial.weight(), parallel.weight());
        assert_eq!(serial.signal(), parallel.signal());
        assert_eq!(serial.total_weight(), 100.0);
    }

    #[test]
    fn test_zero_rows() {
        let hist = reduce_rows(0, (2, 2), false, ExecutionStrategy::Parallel, |_, _| {});
        assert_eq!(hist.total_weight(), 0.0);
        assert_eq!(hist.shape(), (2, 2));
    }
}
