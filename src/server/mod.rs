//! The room presence and membership broker.

mod handler;
mod member;
mod presence;
mod registry;
mod runner;
mod signal;
mod state;

pub use runner::{router, run_server};
pub use state::AppState;
