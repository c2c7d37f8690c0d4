pub mod application;
pub mod cache;
pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::*;
pub use storage::Repository;
