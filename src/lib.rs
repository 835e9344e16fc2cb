pub mod config;
pub mod engine;
pub mod model;
pub mod observability;
pub mod sql;
pub mod validate;
pub mod wire;
