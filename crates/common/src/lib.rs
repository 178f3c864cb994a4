pub mod account;
pub mod config;
pub mod error;
pub mod types;

pub use account::{AccountProvider, AccountSnapshot};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
