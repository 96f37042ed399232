// Library root: exposes the event loop, console and message types so the
// binary and tests share them.

pub mod app;
pub mod console;
pub mod protocol;
