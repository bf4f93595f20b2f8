use std::fmt::{self, Display};

use serde_json::{json, Value};
use thiserror::Error;
use warp::http::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    RowNotFound,
    Other,
}

#[derive(Debug)]
pub struct QueryError {
    info: String,
    kind: QueryErrorKind,
    constraint: Option<String>,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            kind: QueryErrorKind::Other,
            constraint: None,
        }
    }

    pub fn kind(&self) -> QueryErrorKind {
        self.kind
    }

    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    pub fn is_unique_violation(&self) -> bool {
        self.kind == QueryErrorKind::UniqueViolation
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.kind == QueryErrorKind::ForeignKeyViolation
    }

    /// A write that points at a missing catalog row is the caller's fault.
    pub fn into_reference_error(self, what: &str) -> ApiError {
        if self.is_foreign_key_violation() {
            ApiError::Validation(format!("Unknown {what} referenced"))
        } else {
            self.into()
        }
    }

    /// The referenced row vanished between the lookup and the write.
    pub fn into_missing_error(self, message: String) -> ApiError {
        if self.is_foreign_key_violation() {
            ApiError::NotFound(message)
        } else {
            self.into()
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => {
                let kind = if e.is_unique_violation() {
                    QueryErrorKind::UniqueViolation
                } else if e.is_foreign_key_violation() {
                    QueryErrorKind::ForeignKeyViolation
                } else {
                    QueryErrorKind::Other
                };

                Self {
                    info: format!("{e}"),
                    kind,
                    constraint: e.constraint().map(str::to_owned),
                }
            }
            sqlx::Error::RowNotFound => Self {
                info: String::from("RowNotFound"),
                kind: QueryErrorKind::RowNotFound,
                constraint: None,
            },
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug)]
pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: value.to_string(),
        }
    }
}

impl Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for CacheError {}

/// Every failure a request handler can surface to the caller.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Duplicate favorite, cart entry or subscription.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found() -> Self {
        Self::NotFound(String::from("Not found."))
    }

    pub fn unauthenticated() -> Self {
        Self::Unauthorized(String::from(
            "Authentication credentials were not provided.",
        ))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent to the caller. Internal details stay in the logs.
    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(message) | ApiError::Conflict(message) => {
                json!({ "errors": message })
            }
            ApiError::Internal(_) => json!({ "detail": "Internal server error" }),
            other => json!({ "detail": other.to_string() }),
        }
    }
}

impl warp::reject::Reject for ApiError {}

impl From<QueryError> for ApiError {
    fn from(value: QueryError) -> Self {
        match value.kind() {
            QueryErrorKind::RowNotFound => ApiError::not_found(),
            _ => ApiError::Internal(value.info),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(value: CacheError) -> Self {
        ApiError::Internal(value.info)
    }
}
