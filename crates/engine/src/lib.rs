pub mod feed;
pub mod replay;
pub mod runner;

pub use feed::{load_bars, merge_chronological, parse_bars};
pub use replay::{Replay, ReplayReport};
pub use runner::{Runner, RunnerHandle};
