// Series loading, scaling and windowing
pub mod dataset;

// Sequence regressors and evaluation
pub mod ml;

// End-to-end forecast run
pub mod pipeline;
