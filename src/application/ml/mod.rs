pub mod forecaster;
pub mod linear_baseline;
pub mod lstm;
pub mod predictor;
