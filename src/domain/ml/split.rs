use crate::domain::errors::DatasetError;
use crate::domain::ml::window::WindowedDataset;
use ndarray::{Array1, Array3, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitOptions {
    /// Fraction of windows held out for testing, in (0, 1)
    pub test_size: f64,
    pub shuffle: bool,
    /// Only used when shuffling. `None` draws from the thread RNG, so the
    /// split differs between runs.
    pub seed: Option<u64>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            shuffle: false,
            seed: None,
        }
    }
}

/// Train/test partition of a windowed dataset.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub x_train: Array3<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array3<f64>,
    pub y_test: Array1<f64>,
    /// Window indices in the order they appear in `x_train`
    pub train_indices: Vec<usize>,
    /// Window indices in the order they appear in `x_test`
    pub test_indices: Vec<usize>,
}

impl DatasetSplit {
    pub fn train_len(&self) -> usize {
        self.y_train.len()
    }

    pub fn test_len(&self) -> usize {
        self.y_test.len()
    }
}

/// Number of training examples for `n` windows: `round(n * (1 - test_size))`.
pub fn train_size(n: usize, test_size: f64) -> usize {
    ((n as f64) * (1.0 - test_size)).round().min(n as f64) as usize
}

pub fn split_dataset(
    dataset: &WindowedDataset,
    options: &SplitOptions,
) -> Result<DatasetSplit, DatasetError> {
    let test_size = options.test_size;
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(DatasetError::InvalidTestSize { test_size });
    }

    let n = dataset.len();
    let mut order: Vec<usize> = (0..n).collect();
    if options.shuffle {
        match options.seed {
            Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => order.shuffle(&mut rand::rng()),
        }
    }

    let n_train = train_size(n, test_size);
    let test_indices = order.split_off(n_train);
    let train_indices = order;

    Ok(DatasetSplit {
        x_train: dataset.windows.select(Axis(0), &train_indices),
        y_train: dataset.labels.select(Axis(0), &train_indices),
        x_test: dataset.windows.select(Axis(0), &test_indices),
        y_test: dataset.labels.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    })
}
