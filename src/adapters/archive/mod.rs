//! Archive adapters.
//!
//! - `PostgresArchiveWriter` - Archive table in PostgreSQL
//! - `InMemoryArchiveWriter` - Collects rows in memory (testing)

mod in_memory_archive;
mod postgres_archive;

pub use in_memory_archive::InMemoryArchiveWriter;
pub use postgres_archive::{is_plain_identifier, PostgresArchiveWriter};
