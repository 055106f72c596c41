pub mod config;
pub mod order;
pub mod serve;
