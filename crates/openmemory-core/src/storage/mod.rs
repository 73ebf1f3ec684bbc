//! Record Store
//!
//! SQLite-backed durability layer. Owns the `memories` and `waypoints`
//! tables plus one lazily-created report table per analyzer. All writes are
//! single-statement atomic; callers get no cross-statement transaction
//! promises, but no operation leaves a half-written row.

mod schema;
mod sqlite;

pub use schema::{Migration, MIGRATIONS};
pub use sqlite::{MemoryStore, ReportRow};
