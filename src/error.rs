use std::fmt;

/// Numeric error code reported by FileMaker Server in `messages[0].code`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(pub i64);

impl ErrorCode {
    /// The response carried no code at all.
    pub const UNKNOWN: Self = Self(-1);
    pub const SUCCESS: Self = Self(0);
    pub const RECORD_MISSING: Self = Self(101);
    pub const LAYOUT_MISSING: Self = Self(105);
    pub const INVALID_USER_PASSWORD: Self = Self(212);
    pub const NO_RECORDS_MATCH: Self = Self(401);
    pub const INVALID_DAPI_TOKEN: Self = Self(952);

    /// Codes treated as a transient "not found" condition by read retries.
    pub const NOT_FOUND: [Self; 2] = [Self::RECORD_MISSING, Self::NO_RECORDS_MATCH];

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn is_session_invalid(self) -> bool {
        self == Self::INVALID_DAPI_TOKEN
    }

    pub fn is_not_found(self) -> bool {
        Self::NOT_FOUND.contains(&self)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ErrorCode {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Coarse classification used by the relogin and retry wrappers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    BadJson,
    SessionInvalid,
    NotFound,
    Remote,
    Decode,
    /// Misuse on the caller's side: unknown field, no session, bad URL.
    Usage,
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum FmError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Response body is not valid JSON.
    #[error("invalid JSON response: {source}; body: {body}")]
    BadJson {
        #[source]
        source: serde_json::Error,
        /// Raw response body as received.
        body: String,
    },
    /// Application-level error reported by FileMaker Server.
    #[error("FileMaker Server returned error {code}, {message}")]
    FileMaker { code: ErrorCode, message: String },
    /// Successful response with an unexpected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// Record lookup by a field the layout does not carry.
    #[error("no field named {0}; the Data API only returns fields placed on the layout")]
    MissingField(String),
    #[error("no session token held; log in first")]
    NotLoggedIn,
    /// Server or container URL that cannot be parsed or extended.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FmError {
    pub(crate) fn remote(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::FileMaker {
            code,
            message: message.into(),
        }
    }

    /// FileMaker error code, if this is a remote application error.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::FileMaker { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::BadJson { .. } => ErrorKind::BadJson,
            Self::FileMaker { code, .. } if code.is_session_invalid() => ErrorKind::SessionInvalid,
            Self::FileMaker { code, .. } if code.is_not_found() => ErrorKind::NotFound,
            Self::FileMaker { .. } => ErrorKind::Remote,
            Self::Decode(_) => ErrorKind::Decode,
            Self::MissingField(_) | Self::NotLoggedIn | Self::InvalidUrl(_) => ErrorKind::Usage,
        }
    }

    pub fn is_session_invalid(&self) -> bool {
        self.kind() == ErrorKind::SessionInvalid
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, ErrorKind, FmError};

    #[test]
    fn classifies_by_code() {
        let expired = FmError::remote(ErrorCode::INVALID_DAPI_TOKEN, "Invalid FileMaker Data API token (*)");
        assert_eq!(expired.kind(), ErrorKind::SessionInvalid);
        assert!(expired.is_session_invalid());
        assert!(!expired.is_not_found());

        let missing = FmError::remote(ErrorCode::RECORD_MISSING, "Record is missing");
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let no_match = FmError::remote(ErrorCode::NO_RECORDS_MATCH, "No records match the request");
        assert!(no_match.is_not_found());

        let other = FmError::remote(ErrorCode::INVALID_USER_PASSWORD, "Invalid user account");
        assert_eq!(other.kind(), ErrorKind::Remote);
    }

    #[test]
    fn message_text_does_not_drive_classification() {
        let err = FmError::remote(ErrorCode(500), "Record is missing");
        assert_eq!(err.kind(), ErrorKind::Remote);
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = FmError::remote(ErrorCode::RECORD_MISSING, "Record is missing");
        assert_eq!(
            err.to_string(),
            "FileMaker Server returned error 101, Record is missing"
        );
        assert_eq!(err.code(), Some(ErrorCode(101)));
        assert_eq!(FmError::NotLoggedIn.code(), None);
    }
}
