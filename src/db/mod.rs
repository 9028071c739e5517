//! Database access layer: pooling, execution, introspection, and row
//! normalization.

pub mod catalog;
pub mod executor;
pub mod pool;
pub mod types;

pub use executor::Executor;
pub use pool::DbPool;
