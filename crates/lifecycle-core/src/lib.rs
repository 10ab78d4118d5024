pub mod audit;
pub mod config;
pub mod content;
pub mod error;
pub mod io;
pub mod observability;
pub mod paths;
pub mod repair;
pub mod router;
pub mod score;
pub mod state_machine;
pub mod store;
pub mod text;
pub mod types;

pub use error::{LifecycleError, Result};
