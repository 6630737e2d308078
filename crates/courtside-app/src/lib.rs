// Library root: re-exports all modules so integration tests and the binary
// share one public API.

pub mod batch;
pub mod config;
pub mod db;
pub mod pool;
pub mod session;
