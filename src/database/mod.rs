//! Local database layer.
//!
//! Provides SQLite connection management and schema migrations for the
//! local bookmark store.
//!
//! # Usage
//!
//! ```no_run
//! use smartmarks::database::Database;
//!
//! // Open a persistent database
//! let db = Database::open("smartmarks.db").expect("failed to open database");
//!
//! // Or use an in-memory database for testing
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//!
//! let conn = db.connection();
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
