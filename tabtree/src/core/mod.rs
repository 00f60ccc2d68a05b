mod config;
mod error;
mod focus_history;
pub mod hibernation;
mod node;
pub mod ordering;
pub mod persist;
pub mod placement;
mod state;
mod tree;

pub use config::*;
pub use error::*;
pub use focus_history::*;
pub use node::*;
pub use state::*;
pub use tree::Tree;
