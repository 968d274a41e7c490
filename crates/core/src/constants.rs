//! Constants used throughout the MobileMed core crate.

/// Database used when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://mobilemed.db";

/// Pool size used when `DATABASE_MAX_CONNECTIONS` is not set.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// How long a writer waits on a locked database before giving up.
pub const BUSY_TIMEOUT_SECS: u64 = 5;

/// Page number used when a listing request omits `page`.
pub const DEFAULT_PAGE: u32 = 1;

/// Page size used when a listing request omits `pageSize`.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound on `pageSize` when `MOBILEMED_MAX_PAGE_SIZE` is not set.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Message used whenever a referenced patient does not exist.
pub const PATIENT_NOT_FOUND: &str = "patient not found";

/// Message used whenever an exam id does not exist.
pub const EXAM_NOT_FOUND: &str = "exam not found";
