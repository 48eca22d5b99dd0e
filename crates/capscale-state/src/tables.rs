//! redb table definitions for the capscale state store.

use redb::TableDefinition;

pub const LAST_ATTEMPTS_TABLE: &str = "last_attempts";
pub const COLLECTIONS_TABLE: &str = "collections";

/// Last scaling attempt per rate-limiter key.
pub const LAST_ATTEMPTS: TableDefinition<&str, &[u8]> = TableDefinition::new(LAST_ATTEMPTS_TABLE);

/// Locally managed collections keyed by collection id.
pub const COLLECTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new(COLLECTIONS_TABLE);
