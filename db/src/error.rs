use sea_orm::DbErr;
use thiserror::Error;

/// Typed outcome taxonomy for the attendance core.
///
/// Every variant except `Db` is a routine business-rule rejection whose
/// `Display` text is the stable reason string surfaced to clients. `Db`
/// wraps unrecoverable store faults and is the only variant that should be
/// treated as a server error.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Token missing, revoked, past expiry, or out of scan budget.
    #[error("invalid, expired, or exhausted")]
    TokenUnusable,

    /// Owning session missing or soft-deleted.
    #[error("session unavailable")]
    SessionUnavailable,

    /// Duplicate (student, session) scan, whether caught by the pre-check
    /// or by losing the unique-index race at insert time.
    #[error("already recorded")]
    AlreadyRecorded,

    #[error("outside lecture scan window")]
    OutsideScanWindow,

    #[error(transparent)]
    Db(#[from] DbErr),
}

impl AttendanceError {
    /// True for expected business-rule rejections, false for store faults.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, AttendanceError::Db(_))
    }
}
