// Hard limits enforced by the engine. Every request path checks the ones it
// touches before taking a write lock.

/// Earliest calendar year the engine accepts for periods and stays.
pub const MIN_SUPPORTED_YEAR: i32 = 2000;

/// Latest calendar year the engine accepts for periods and stays.
pub const MAX_SUPPORTED_YEAR: i32 = 2199;

/// Longest single stay, in nights.
pub const MAX_STAY_DAYS: i64 = 366;

/// Widest window accepted by the availability query (a full cycle plus slack).
pub const MAX_QUERY_WINDOW_DAYS: i64 = 5 * 366;

/// Periods accepted by a single schedule replace.
pub const MAX_PERIODS_PER_REPLACE: usize = 4096;

/// Reservation records kept in the book, cancelled ones included.
pub const MAX_RESERVATIONS: usize = 100_000;

pub const MAX_PRINCIPAL_ID_LEN: usize = 256;

pub const MAX_SETTING_KEY_LEN: usize = 128;

pub const MAX_SETTING_VALUE_LEN: usize = 64 * 1024;
