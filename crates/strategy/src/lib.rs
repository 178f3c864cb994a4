pub mod config;
pub mod engine;
pub mod indicators;
pub mod sizing;

pub use config::{InstrumentConfig, ShortExitPolicy, StrategyConfig, TrailingMode};
pub use engine::{CrossoverEngine, InstrumentSnapshot, OpenPosition, PositionState};
pub use indicators::MovingAverage;
pub use sizing::{position_size, SizingParams};
