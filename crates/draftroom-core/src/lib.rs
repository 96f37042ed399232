// Library root: re-exports all modules so the command binary and integration
// tests can reach the draft engine, its stores and the config loaders.

pub mod config;
pub mod db;
pub mod draft;
pub mod players;
pub mod realtime;
pub mod room;
pub mod store;
