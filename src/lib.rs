pub mod access;
pub mod cli;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use access::{AccessGuard, Scope};
pub use cli::{Cli, Commands};
pub use error::NO_PROVIDER_MESSAGE;
pub use models::Config;
