pub mod events;
pub mod mirror;
pub mod platforms;
