// Market data domain
pub mod market;

// Dataset preparation: scaling, windowing, splitting, metrics
pub mod ml;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
