use async_trait::async_trait;
use ndarray::s;
use pricecast::application::dataset::loader::{DatasetLoader, LoadOptions, SeriesSource};
use pricecast::domain::errors::{DatasetError, FetchError, LoadError};
use pricecast::domain::market::series::Series;
use pricecast::domain::ml::split::SplitOptions;
use pricecast::domain::ports::MarketDataProvider;
use pricecast::infrastructure::MockMarketDataProvider;
use std::collections::HashSet;
use std::sync::Arc;

// --- Mocks ---

struct UnavailableProvider;

#[async_trait]
impl MarketDataProvider for UnavailableProvider {
    async fn fetch_daily_series(&self, symbol: &str) -> Result<Series, FetchError> {
        Err(FetchError::Status {
            symbol: symbol.to_string(),
            status: 503,
        })
    }

    fn name(&self) -> &str {
        "Unavailable"
    }
}

fn options(n_steps: usize, test_size: f64, shuffle: bool) -> LoadOptions {
    LoadOptions {
        n_steps,
        lookup_step: 1,
        split: SplitOptions {
            test_size,
            shuffle,
            seed: None,
        },
        ..LoadOptions::default()
    }
}

fn loader_with(rows: usize, options: LoadOptions) -> DatasetLoader {
    let provider = MockMarketDataProvider::new()
        .with_series("SYN", MockMarketDataProvider::synthetic_series("SYN", rows));
    DatasetLoader::new(options, Arc::new(provider))
}

#[tokio::test]
async fn test_sixty_daily_rows() {
    let loader = loader_with(60, options(10, 0.2, false));
    let bundle = loader.load_bundle("SYN".into()).await.unwrap();

    assert_eq!(bundle.total_windows(), 49);
    assert_eq!(bundle.tail.len(), 11);
    assert_eq!(bundle.tail.to_array().unwrap().shape(), &[11, 5]);
    assert_eq!(&bundle.split.x_train.shape()[1..], &[5, 10]);
    let next_input = bundle.tail.history_window(10).unwrap();
    assert_eq!(next_input.shape(), &[1, 5, 10]);
    assert!(bundle.ensure_trainable().is_ok());
}

#[tokio::test]
async fn test_five_rows_give_empty_dataset() {
    let loader = loader_with(5, options(10, 0.2, false));
    let bundle = loader.load_bundle("SYN".into()).await.unwrap();

    assert_eq!(bundle.total_windows(), 0);
    assert_eq!(bundle.split.x_train.shape(), &[0, 5, 10]);
    assert!(matches!(
        bundle.ensure_trainable(),
        Err(DatasetError::InsufficientData {
            available: 5,
            required: 11
        })
    ));

    let tensor = loader.load_feature_tensor("SYN".into()).await.unwrap();
    assert_eq!(tensor.shape(), &[0, 5, 10]);
}

#[tokio::test]
async fn test_hundred_windows_ordered_split() {
    // 110 rows, n_steps 10, lookup 1 -> 100 windows
    let loader = loader_with(110, options(10, 0.2, false));
    let bundle = loader.load_bundle("SYN".into()).await.unwrap();
    let tensor = loader.load_feature_tensor("SYN".into()).await.unwrap();

    assert_eq!(tensor.shape(), &[100, 5, 10]);
    assert_eq!(bundle.split.train_len(), 80);
    assert_eq!(bundle.split.test_len(), 20);
    assert_eq!(bundle.split.x_train, tensor.slice(s![0..80, .., ..]));
    assert_eq!(bundle.split.x_test, tensor.slice(s![80..100, .., ..]));
    assert_eq!(bundle.split.train_indices, (0..80).collect::<Vec<_>>());
    assert_eq!(bundle.split.test_indices, (80..100).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_labels_invert_to_raw_prices() {
    let loader = loader_with(110, options(10, 0.2, false));
    let bundle = loader.load_bundle("SYN".into()).await.unwrap();
    let raw = bundle.series.column("adjclose").unwrap();

    // Test window j ends at row 80 + j + 9, its label is one row later
    let prices = bundle.invert_target(&bundle.split.y_test.to_vec());
    for (j, price) in prices.iter().enumerate() {
        let expected = raw[90 + j];
        assert!(((price - expected) / expected).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_source_series_is_not_modified() {
    let series = MockMarketDataProvider::synthetic_series("RAW", 40);
    let loader = DatasetLoader::new(options(5, 0.25, false), Arc::new(MockMarketDataProvider::new()));

    let bundle = loader
        .load_bundle(SeriesSource::Loaded(series.clone()))
        .await
        .unwrap();

    assert_eq!(bundle.series, series);
    assert_eq!(bundle.scalers.len(), 5);
    let scaled_max = bundle
        .split
        .x_train
        .iter()
        .chain(bundle.split.x_test.iter())
        .fold(f64::MIN, |a, b| a.max(*b));
    assert!(scaled_max <= 1.0);
}

#[tokio::test]
async fn test_seeded_shuffle_is_reproducible_and_disjoint() {
    let mut opts = options(10, 0.2, true);
    opts.split.seed = Some(99);
    let loader = loader_with(110, opts);

    let first = loader.load_bundle("SYN".into()).await.unwrap();
    let second = loader.load_bundle("SYN".into()).await.unwrap();
    assert_eq!(first.split.train_indices, second.split.train_indices);

    let train: HashSet<usize> = first.split.train_indices.iter().copied().collect();
    let test: HashSet<usize> = first.split.test_indices.iter().copied().collect();
    assert!(train.is_disjoint(&test));
    assert_eq!(train.len() + test.len(), 100);
}

#[tokio::test]
async fn test_invalid_symbol_is_rejected() {
    let loader = loader_with(60, options(10, 0.2, false));
    let err = loader.load_bundle("TS LA".into()).await.unwrap_err();

    assert!(matches!(
        err,
        LoadError::Dataset(DatasetError::InvalidInput { .. })
    ));
}

#[tokio::test]
async fn test_missing_feature_column() {
    let mut opts = options(10, 0.2, false);
    opts.feature_columns.push("vwap".to_string());
    let loader = loader_with(60, opts);

    let err = loader.load_bundle("SYN".into()).await.unwrap_err();
    assert!(matches!(
        err,
        LoadError::Dataset(DatasetError::MissingColumn { column }) if column == "vwap"
    ));
}

#[tokio::test]
async fn test_fetch_errors_propagate_unmodified() {
    let loader = DatasetLoader::new(options(10, 0.2, false), Arc::new(UnavailableProvider));
    let err = loader.load_feature_tensor("TSLA".into()).await.unwrap_err();

    assert!(matches!(
        err,
        LoadError::Fetch(FetchError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_invalid_test_size() {
    let loader = loader_with(60, options(10, 1.0, false));
    let err = loader.load_bundle("SYN".into()).await.unwrap_err();

    assert!(matches!(
        err,
        LoadError::Dataset(DatasetError::InvalidTestSize { .. })
    ));
}

#[tokio::test]
async fn test_oversized_window_parameters_give_empty_dataset() {
    let mut opts = options(usize::MAX / 2, 0.2, false);
    opts.lookup_step = usize::MAX;
    let loader = loader_with(5, opts);
    let bundle = loader.load_bundle("SYN".into()).await.unwrap();

    assert_eq!(bundle.total_windows(), 0);
    assert!(matches!(
        bundle.ensure_trainable(),
        Err(DatasetError::InsufficientData {
            available: 5,
            required: usize::MAX
        })
    ));
}
