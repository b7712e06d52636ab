//! Error taxonomy for EOSS.
//!
//! Every failure that can terminate a request is one variant of [`EossError`].
//! The variant is also the single source of truth for the response a failure
//! produces — see [`EossError::status_and_body`] — so the HTTP layer never
//! has to re-derive a status code from scratch.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EossError>;

#[derive(Debug, Error)]
pub enum EossError {
    /// Metadata store session could not be established.
    #[error("metadata store connect failure: {0}")]
    Connect(String),

    /// A parameterised statement failed to execute.
    #[error("metadata store exec failure: {0}")]
    Exec(String),

    /// A pending transaction failed to commit.
    #[error("metadata store commit failure: {0}")]
    Commit(String),

    /// A shared (read) lock acquisition found the sentinel already held
    /// exclusively.
    #[error("object read lock busy")]
    LockBusyRead,

    /// An exclusive (write) lock acquisition found the sentinel already held,
    /// shared or exclusive.
    #[error("object write lock busy")]
    LockBusyWrite,

    /// Unexpected I/O or logic failure inside the coordinator.
    #[error("internal failure: {0}")]
    Internal(String),

    /// PUT failed past step (A) and rollback undid every sub-step.
    #[error("rollback done")]
    RollbackOk,

    /// PUT failed past step (A) and rollback left some sub-step undone.
    #[error("rollback failed")]
    RollbackPartial,

    /// Object does not exist (HEAD/GET/DELETE on an absent id).
    #[error("object does not exist")]
    NotFound,

    /// Row exists with state = INIT.
    #[error("object initialized only")]
    StateInit,

    /// Row exists with state = STAGED.
    #[error("object saved not closed")]
    StateStaged,

    /// Row exists with state = CLOSED but the final file is missing.
    #[error("object mds closed not in local")]
    Lost,

    /// SAFEMODE rejected a mutating request.
    #[error("eoss safemode enabled")]
    Safemode,

    /// Method not implemented for this route.
    #[error("bad method")]
    BadMethod,

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Plain filesystem I/O failure outside the coordinator's own taxonomy.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EossError {
    /// The `(status, body)` pair this error maps to, per the status code matrix.
    pub fn status_and_body(&self) -> (StatusCode, &'static str) {
        match self {
            EossError::NotFound => (StatusCode::NOT_FOUND, "Object Does Not Exist"),
            EossError::StateInit => (status(440), "Object Initialized Only"),
            EossError::StateStaged => (status(441), "Object Saved Not Closed"),
            EossError::Lost => (status(524), "Object MDS Closed Not In Local"),
            EossError::LockBusyRead => (StatusCode::CONFLICT, "Object Read Conflict"),
            EossError::LockBusyWrite => (StatusCode::CONFLICT, "Object Write Conflict"),
            EossError::BadMethod => (StatusCode::METHOD_NOT_ALLOWED, "Bad Method"),
            EossError::Safemode => (status(525), "EOSS Safemode Enabled"),
            EossError::Connect(_) => (status(520), "MDS Connection Failure"),
            EossError::Exec(_) => (status(521), "MDS Execution Failure"),
            EossError::Commit(_) => (status(522), "MDS Commit Failure"),
            EossError::RollbackOk => (status(526), "EOSS Rollback Done"),
            EossError::RollbackPartial => (status(527), "EOSS Rollback Failed"),
            EossError::Internal(_) | EossError::Io(_) | EossError::Config(_) => {
                (status(523), "EOSS Internal Exception Failure")
            }
        }
    }
}

/// Non-standard codes (440, 520-527) aren't in `axum::http::StatusCode`'s const
/// table; build them from the raw u16 instead.
fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).expect("status code in range 100-599")
}

impl IntoResponse for EossError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, body).into_response()
    }
}
