use crate::domain::errors::DatasetError;
use crate::domain::market::series::Series;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Min-max scaler for one column, mapping the observed range onto [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub data_min: f64,
    pub data_max: f64,
}

impl MinMaxScaler {
    /// Fits over the finite values of `values`. `NaN` entries are ignored;
    /// a column with no finite values fits to `[0, 0]`.
    pub fn fit(values: ArrayView1<'_, f64>) -> Self {
        let (min, max) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        if min > max {
            return Self {
                data_min: 0.0,
                data_max: 0.0,
            };
        }

        Self {
            data_min: min,
            data_max: max,
        }
    }

    /// Width of the fitted range; a constant column uses 1 so it maps to 0.
    fn range(&self) -> f64 {
        let range = self.data_max - self.data_min;
        if range == 0.0 { 1.0 } else { range }
    }

    pub fn transform_value(&self, value: f64) -> f64 {
        (value - self.data_min) / self.range()
    }

    pub fn invert_value(&self, value: f64) -> f64 {
        value * self.range() + self.data_min
    }

    pub fn transform(&self, values: ArrayView1<'_, f64>) -> Array1<f64> {
        values.mapv(|v| self.transform_value(v))
    }

    pub fn invert(&self, values: ArrayView1<'_, f64>) -> Array1<f64> {
        values.mapv(|v| self.invert_value(v))
    }
}

/// Fitted scalers keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnScalers {
    scalers: HashMap<String, MinMaxScaler>,
}

impl ColumnScalers {
    pub fn get(&self, column: &str) -> Option<&MinMaxScaler> {
        self.scalers.get(column)
    }

    pub fn len(&self) -> usize {
        self.scalers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalers.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.scalers.keys().map(String::as_str)
    }

    /// Maps values back to the raw scale of `column`. Columns that were not
    /// scaled pass through unchanged.
    pub fn invert(&self, column: &str, values: ArrayView1<'_, f64>) -> Array1<f64> {
        match self.scalers.get(column) {
            Some(scaler) => scaler.invert(values),
            None => values.to_owned(),
        }
    }

    pub fn invert_value(&self, column: &str, value: f64) -> f64 {
        self.scalers
            .get(column)
            .map_or(value, |scaler| scaler.invert_value(value))
    }
}

/// A series whose feature columns have been min-max scaled, with the
/// scalers needed to invert them.
#[derive(Debug, Clone)]
pub struct ScaledSeries {
    pub series: Series,
    pub scalers: ColumnScalers,
}

/// Fits one independent scaler per column over the whole series and returns
/// a new series with those columns normalized. The input is left untouched.
pub fn scale_columns<S: AsRef<str>>(
    series: &Series,
    columns: &[S],
) -> Result<ScaledSeries, DatasetError> {
    series.require_columns(columns)?;

    let mut scaled = series.clone();
    let mut scalers = HashMap::with_capacity(columns.len());

    for column in columns {
        let name = column.as_ref();
        let raw = series.column(name)?;
        let scaler = MinMaxScaler::fit(raw);
        scaled = scaled.with_column(name, scaler.transform(raw))?;
        scalers.insert(name.to_string(), scaler);
    }

    Ok(ScaledSeries {
        series: scaled,
        scalers: ColumnScalers { scalers },
    })
}
