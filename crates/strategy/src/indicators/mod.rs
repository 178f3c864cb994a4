pub mod sma;

pub use sma::MovingAverage;
