// Price series
pub mod series;
