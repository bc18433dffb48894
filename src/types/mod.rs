//! Request and response types for the CreoleCentric REST API.

pub mod account;
pub mod job;

pub use account::*;
pub use job::*;
