use crate::domain::errors::DatasetError;
use chrono::NaiveDate;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Column names produced by every market-data provider.
pub const OHLCV_COLUMNS: &[&str] = &["open", "high", "low", "close", "adjclose", "volume"];

/// One daily record as delivered by a provider. Missing values are `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjclose: f64,
    pub volume: f64,
}

impl PriceBar {
    fn values(&self) -> [f64; 6] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.adjclose,
            self.volume,
        ]
    }
}

/// Ordered, dated, column-oriented price history.
///
/// Values are stored row-major (`rows x columns`). A `Series` is never
/// mutated after construction; transformations return new values.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    symbol: Option<String>,
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl Series {
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self, DatasetError> {
        if values.nrows() != dates.len() || values.ncols() != columns.len() {
            return Err(DatasetError::ShapeMismatch {
                expected: format!("({}, {})", dates.len(), columns.len()),
                actual: format!("({}, {})", values.nrows(), values.ncols()),
            });
        }

        Ok(Self {
            symbol: None,
            dates,
            columns,
            values,
        })
    }

    /// Builds an OHLCV series from provider bars, in the order given.
    pub fn from_bars(symbol: &str, bars: &[PriceBar]) -> Self {
        let flat: Vec<f64> = bars.iter().flat_map(|b| b.values()).collect();
        // Shape always matches: six values per bar.
        let values = Array2::from_shape_vec((bars.len(), OHLCV_COLUMNS.len()), flat)
            .unwrap_or_else(|_| Array2::zeros((0, OHLCV_COLUMNS.len())));

        Self {
            symbol: Some(symbol.to_uppercase()),
            dates: bars.iter().map(|b| b.date).collect(),
            columns: OHLCV_COLUMNS.iter().map(|c| c.to_string()).collect(),
            values,
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.to_uppercase());
        self
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize, DatasetError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DatasetError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>, DatasetError> {
        let idx = self.column_index(name)?;
        Ok(self.values.column(idx))
    }

    /// Fails with `MissingColumn` on the first requested column that is absent.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<(), DatasetError> {
        for name in names {
            self.column_index(name.as_ref())?;
        }
        Ok(())
    }

    /// Returns a copy with one column's values replaced.
    pub fn with_column(&self, name: &str, values: Array1<f64>) -> Result<Self, DatasetError> {
        let idx = self.column_index(name)?;
        if values.len() != self.len() {
            return Err(DatasetError::ShapeMismatch {
                expected: format!("{} values for '{}'", self.len(), name),
                actual: values.len().to_string(),
            });
        }

        let mut next = self.clone();
        next.values.column_mut(idx).assign(&values);
        Ok(next)
    }

    /// The requested columns as a `rows x columns` matrix, in request order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Array2<f64>, DatasetError> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.values.select(Axis(1), &indices))
    }

    /// Last value of a column that is not `NaN`.
    pub fn last_valid(&self, name: &str) -> Result<Option<f64>, DatasetError> {
        Ok(self
            .column(name)?
            .iter()
            .rev()
            .copied()
            .find(|v| !v.is_nan()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close - 1.0,
            high: close + 2.0,
            low: close - 2.0,
            close,
            adjclose: close,
            volume: 1000.0 * day as f64,
        }
    }

    #[test]
    fn test_from_bars_layout() {
        let series = Series::from_bars("tsla", &[bar(1, 10.0), bar(2, 11.0)]);

        assert_eq!(series.symbol(), Some("TSLA"));
        assert_eq!(series.len(), 2);
        assert_eq!(series.columns().len(), 6);
        assert_eq!(series.column("adjclose").unwrap().to_vec(), vec![10.0, 11.0]);
        assert_eq!(series.column("volume").unwrap().to_vec(), vec![1000.0, 2000.0]);
    }

    #[test]
    fn test_missing_column() {
        let series = Series::from_bars("X", &[bar(1, 10.0)]);
        let err = series.require_columns(&["adjclose", "vwap"]).unwrap_err();
        assert_eq!(
            err,
            DatasetError::MissingColumn {
                column: "vwap".to_string()
            }
        );
    }

    #[test]
    fn test_with_column_leaves_original_untouched() {
        let series = Series::from_bars("X", &[bar(1, 10.0), bar(2, 12.0)]);
        let replaced = series
            .with_column("close", Array1::from(vec![0.0, 1.0]))
            .unwrap();

        assert_eq!(series.column("close").unwrap().to_vec(), vec![10.0, 12.0]);
        assert_eq!(replaced.column("close").unwrap().to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_new_rejects_bad_shape() {
        let dates = vec![NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()];
        let result = Series::new(dates, vec!["close".to_string()], Array2::zeros((2, 1)));
        assert!(matches!(result, Err(DatasetError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_select_and_last_valid() {
        let mut b = bar(3, 13.0);
        b.adjclose = f64::NAN;
        let series = Series::from_bars("X", &[bar(1, 10.0), bar(2, 11.0), b]);

        let m = series.select(&["volume", "close"]).unwrap();
        assert_eq!(m.shape(), &[3, 2]);
        assert_eq!(m[[1, 0]], 2000.0);
        assert_eq!(m[[2, 1]], 13.0);

        assert_eq!(series.last_valid("adjclose").unwrap(), Some(11.0));
    }
}
