use crate::model::Ms;

/// Longest single booking the engine accepts (one working day).
pub const MAX_BOOKING_DURATION_MS: Ms = 24 * 3_600_000;

/// Largest cumulative pending shift, either direction (one week).
pub const MAX_SHIFT_MINUTES: i64 = 7 * 24 * 60;

pub const MAX_NOTES_LEN: usize = 4096;

/// Pending changes committed by one `commit_all` call.
pub const MAX_BATCH_SIZE: usize = 500;

/// Capacity of the store change feed. Slow listeners skip to the latest snapshot.
pub const CHANGE_FEED_CAPACITY: usize = 64;
