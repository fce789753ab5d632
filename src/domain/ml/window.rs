use crate::domain::errors::DatasetError;
use crate::domain::market::series::Series;
use ndarray::{Array1, Array2, Array3, ArrayView1, Axis, concatenate, s};
use std::collections::VecDeque;

/// Fixed-capacity FIFO of feature rows. Pushing onto a full buffer evicts
/// the oldest row, so the content is always the last `capacity` pushes.
#[derive(Debug, Clone)]
pub struct SequenceBuffer {
    rows: VecDeque<Array1<f64>>,
    capacity: usize,
}

impl SequenceBuffer {
    pub fn new(capacity: usize) -> Self {
        Self::with_expected_rows(capacity, capacity)
    }

    /// Caps the up-front allocation at the number of rows that will be pushed.
    pub fn with_expected_rows(capacity: usize, rows: usize) -> Self {
        Self {
            rows: VecDeque::with_capacity(capacity.min(rows)),
            capacity,
        }
    }

    pub fn push(&mut self, row: Array1<f64>) {
        if self.rows.len() >= self.capacity {
            self.rows.pop_front();
        }
        self.rows.push_back(row);
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Buffer content as a `steps x features` matrix, oldest row first.
    pub fn to_matrix(&self, n_features: usize) -> Array2<f64> {
        let mut out = Array2::zeros((self.rows.len(), n_features));
        for (mut dst, src) in out.outer_iter_mut().zip(self.rows.iter()) {
            dst.assign(src);
        }
        out
    }
}

/// The most recent history plus the rows whose label lies past the end of
/// the series. Used to forecast beyond the known data.
#[derive(Debug, Clone, PartialEq)]
pub struct TailSequence {
    /// Last `n_steps` labeled rows (`steps x features`)
    pub history: Array2<f64>,
    /// Trailing `lookup_step` rows with no label (`lookup_step x features`)
    pub pending: Array2<f64>,
}

impl TailSequence {
    pub fn len(&self) -> usize {
        self.history.nrows() + self.pending.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// History followed by pending rows. Fails if the two segments disagree
    /// on the feature count.
    pub fn to_array(&self) -> Result<Array2<f64>, DatasetError> {
        concatenate(Axis(0), &[self.history.view(), self.pending.view()]).map_err(|e| {
            DatasetError::ShapeMismatch {
                expected: format!("{} feature columns", self.history.ncols()),
                actual: e.to_string(),
            }
        })
    }

    /// The history as a single model input of shape `(1, features, steps)`,
    /// or `None` when fewer than `n_steps` rows were buffered.
    pub fn history_window(&self, n_steps: usize) -> Option<Array3<f64>> {
        if n_steps == 0 || self.history.nrows() != n_steps {
            return None;
        }
        let feature_major = self.history.t().to_owned();
        Some(feature_major.insert_axis(Axis(0)))
    }
}

/// Supervised windows cut from one series.
#[derive(Debug, Clone)]
pub struct WindowedDataset {
    /// `(examples, features, steps)`
    pub windows: Array3<f64>,
    /// One label per window
    pub labels: Array1<f64>,
    pub tail: TailSequence,
    pub n_steps: usize,
    pub lookup_step: usize,
}

impl WindowedDataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.windows.shape()[1]
    }
}

/// Cuts a series into overlapping windows of `n_steps` rows, each labeled
/// with the target value `lookup_step` rows after its last row.
#[derive(Debug, Clone)]
pub struct Windower {
    n_steps: usize,
    lookup_step: usize,
    target_column: String,
}

impl Windower {
    pub fn new(n_steps: usize, lookup_step: usize) -> Self {
        Self {
            n_steps,
            lookup_step,
            target_column: "adjclose".to_string(),
        }
    }

    pub fn with_target(mut self, column: &str) -> Self {
        self.target_column = column.to_string();
        self
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn lookup_step(&self) -> usize {
        self.lookup_step
    }

    /// Label for row `i`: the target `lookup_step` rows later, or `None` for
    /// the trailing rows that have no future value.
    fn labels(&self, target: ArrayView1<'_, f64>) -> Vec<Option<f64>> {
        let n = target.len();
        (0..n)
            .map(|i| {
                i.checked_add(self.lookup_step)
                    .filter(|j| *j < n)
                    .map(|j| target[j])
            })
            .collect()
    }

    pub fn window<S: AsRef<str>>(
        &self,
        series: &Series,
        feature_columns: &[S],
    ) -> Result<WindowedDataset, DatasetError> {
        if self.n_steps == 0 {
            return Err(DatasetError::InvalidParameter {
                name: "n_steps".to_string(),
                reason: "window size must be at least 1".to_string(),
            });
        }
        if feature_columns.is_empty() {
            return Err(DatasetError::InvalidParameter {
                name: "feature_columns".to_string(),
                reason: "at least one feature column is required".to_string(),
            });
        }

        let features = series.select(feature_columns)?;
        let target = series.column(&self.target_column)?;
        let n_rows = features.nrows();
        let n_features = features.ncols();
        let labels = self.labels(target);

        let labeled_rows = n_rows.saturating_sub(self.lookup_step);
        let pending = features.slice(s![labeled_rows.., ..]).to_owned();

        let mut buffer = SequenceBuffer::with_expected_rows(self.n_steps, labeled_rows);
        let mut flat = Vec::new();
        let mut window_labels = Vec::new();

        for (row, label) in features
            .outer_iter()
            .zip(labels.iter())
            .take(labeled_rows)
        {
            let label = match label {
                Some(l) if !l.is_nan() && row.iter().all(|v| !v.is_nan()) => *l,
                // Missing values break contiguity
                _ => {
                    buffer.clear();
                    continue;
                }
            };

            buffer.push(row.to_owned());
            if buffer.is_full() {
                // Step-major buffer, stored feature-major
                let window = buffer.to_matrix(n_features);
                flat.extend(window.t().iter().copied());
                window_labels.push(label);
            }
        }

        let n_windows = window_labels.len();
        // A step axis too long to index can only occur with no windows
        let representable = n_features
            .checked_mul(self.n_steps)
            .is_some_and(|n| n <= isize::MAX as usize);
        let steps_axis = if representable { self.n_steps } else { 0 };
        let windows = Array3::from_shape_vec((n_windows, n_features, steps_axis), flat)
            .map_err(|e| DatasetError::ShapeMismatch {
                expected: format!("({}, {}, {})", n_windows, n_features, self.n_steps),
                actual: e.to_string(),
            })?;

        Ok(WindowedDataset {
            windows,
            labels: Array1::from(window_labels),
            tail: TailSequence {
                history: buffer.to_matrix(n_features),
                pending,
            },
            n_steps: self.n_steps,
            lookup_step: self.lookup_step,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::series::PriceBar;
    use chrono::NaiveDate;

    const FEATURES: &[&str] = &["adjclose", "volume", "open", "high", "low"];

    fn series(n: usize) -> Series {
        let bars: Vec<PriceBar> = (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                PriceBar {
                    date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Days::new(i as u64),
                    open: c - 0.5,
                    high: c + 1.0,
                    low: c - 1.0,
                    close: c,
                    adjclose: c,
                    volume: 10.0 * i as f64,
                }
            })
            .collect();
        Series::from_bars("TEST", &bars)
    }

    #[test]
    fn test_sequence_buffer_evicts_oldest() {
        let mut buffer = SequenceBuffer::new(2);
        buffer.push(Array1::from(vec![1.0]));
        buffer.push(Array1::from(vec![2.0]));
        assert!(buffer.is_full());
        buffer.push(Array1::from(vec![3.0]));

        assert_eq!(buffer.len(), 2);
        let m = buffer.to_matrix(1);
        assert_eq!(m.column(0).to_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_sixty_rows_give_49_windows() {
        let ds = Windower::new(10, 1).window(&series(60), FEATURES).unwrap();

        assert_eq!(ds.len(), 49);
        assert_eq!(ds.windows.shape(), &[49, 5, 10]);
        assert_eq!(ds.tail.len(), 11);
        assert_eq!(ds.tail.to_array().unwrap().shape(), &[11, 5]);
    }

    #[test]
    fn test_window_count_formula() {
        for (n, k, l) in [(30, 5, 3), (12, 12, 1), (13, 12, 1), (40, 1, 0), (20, 7, 7)] {
            let ds = Windower::new(k, l).window(&series(n), FEATURES).unwrap();
            let expected = (n as i64 - l as i64 - k as i64 + 1).max(0) as usize;
            assert_eq!(ds.len(), expected, "n={n} k={k} l={l}");
        }
    }

    #[test]
    fn test_short_series_gives_empty_dataset() {
        let ds = Windower::new(10, 1).window(&series(5), FEATURES).unwrap();

        assert!(ds.is_empty());
        assert_eq!(ds.windows.shape(), &[0, 5, 10]);
        assert!(ds.tail.history_window(10).is_none());
    }

    #[test]
    fn test_labels_and_feature_major_layout() {
        let k = 4;
        let l = 3;
        let s = series(20);
        let ds = Windower::new(k, l).window(&s, FEATURES).unwrap();
        let adjclose = s.column("adjclose").unwrap();

        for w in 0..ds.len() {
            let last_row = w + k - 1;
            assert_eq!(ds.labels[w], adjclose[last_row + l]);
            // Feature 0 (adjclose) across steps is the window's rows in order
            for step in 0..k {
                assert_eq!(ds.windows[[w, 0, step]], adjclose[w + step]);
            }
            // Feature 1 is volume
            assert_eq!(ds.windows[[w, 1, 0]], 10.0 * w as f64);
        }
    }

    #[test]
    fn test_tail_segments() {
        let s = series(20);
        let ds = Windower::new(4, 2).window(&s, FEATURES).unwrap();

        // History ends at the last labeled row (index 17), pending is rows 18 and 19
        assert_eq!(ds.tail.history.nrows(), 4);
        assert_eq!(ds.tail.history[[3, 0]], 117.0);
        assert_eq!(ds.tail.pending.nrows(), 2);
        assert_eq!(ds.tail.pending[[0, 0]], 118.0);
        assert_eq!(ds.tail.pending[[1, 0]], 119.0);

        let input = ds.tail.history_window(4).unwrap();
        assert_eq!(input.shape(), &[1, 5, 4]);
        assert_eq!(input[[0, 0, 3]], 117.0);
    }

    #[test]
    fn test_missing_values_break_windows() {
        let mut bars: Vec<PriceBar> = (0..12)
            .map(|i| PriceBar {
                date: NaiveDate::from_ymd_opt(2021, 3, 1).unwrap() + chrono::Days::new(i),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: i as f64,
                adjclose: i as f64,
                volume: 1.0,
            })
            .collect();
        bars[5].volume = f64::NAN;
        let s = Series::from_bars("GAP", &bars);

        let ds = Windower::new(3, 1).window(&s, FEATURES).unwrap();
        // Rows 0..=4 give 3 windows (ending 2, 3, 4); row 5 is dropped;
        // rows 6..=10 give 3 windows (ending 8, 9, 10)
        assert_eq!(ds.len(), 6);
        assert_eq!(ds.labels.to_vec(), vec![3.0, 4.0, 5.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_oversized_parameters_give_empty_dataset() {
        let ds = Windower::new(usize::MAX / 2, 1)
            .window(&series(5), FEATURES)
            .unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.windows.len(), 0);
        assert_eq!(ds.tail.history.nrows(), 4);

        let ds = Windower::new(2, usize::MAX)
            .window(&series(5), FEATURES)
            .unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.tail.pending.nrows(), 5);
    }

    #[test]
    fn test_tail_with_mismatched_segments_is_an_error() {
        let tail = TailSequence {
            history: Array2::zeros((3, 5)),
            pending: Array2::zeros((1, 4)),
        };
        assert!(matches!(
            tail.to_array(),
            Err(DatasetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let err = Windower::new(0, 1).window(&series(10), FEATURES).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidParameter { .. }));
    }

    #[test]
    fn test_missing_target_column() {
        let err = Windower::new(2, 1)
            .with_target("vwap")
            .window(&series(10), FEATURES)
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { column } if column == "vwap"));
    }
}
