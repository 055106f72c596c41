pub mod athlete;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod events;
pub mod fop;
pub mod group;
pub mod io;
pub mod lifting_order;
pub mod registry;
pub mod roster;
pub mod surface;
pub mod timer;
pub mod types;

pub use error::{FopError, Result, RuleViolation};
