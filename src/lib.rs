//! Smartmarks: a minimal personal bookmark manager.
//!
//! Bookmarks live in a backend store; each open session keeps a local view
//! that is refreshed after its own writes and patched by realtime change
//! events caused by other sessions.

pub mod app;
pub mod database;
pub mod logging;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
