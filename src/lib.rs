// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod config;
pub mod detector;
pub mod inventory;
pub mod listener;
pub mod replay;
pub mod runtime;
