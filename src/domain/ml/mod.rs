pub mod metrics;
pub mod model_config;
pub mod scaler;
pub mod split;
pub mod window;
