//! Hard limits. These exist to keep a single misbehaving caller from
//! exhausting memory or the WAL; normal traffic never gets near them.

use crate::model::Ms;

/// Earliest accepted timestamp (1970-01-01).
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// Latest accepted timestamp (2100-01-01).
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Widest accepted session time range (31 days).
pub const MAX_SPAN_DURATION_MS: Ms = 31 * 24 * 3_600_000;

/// Max sessions held by one engine.
pub const MAX_SESSIONS: usize = 100_000;

/// Max ledger rows per session, cancelled history included.
pub const MAX_LEDGER_ROWS_PER_SESSION: usize = 100_000;

/// Max (person, action) pairs in one batch.
pub const MAX_BATCH_SIZE: usize = 64;

/// Max participant capacity of a session.
pub const MAX_CAPACITY: u32 = 100_000;
