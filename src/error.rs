//! Error types returned by the graphics manager's internal components.
//!
//! The dispatcher never lets these escape a call to
//! [`GraphicsManager::handle_command`](crate::manager::GraphicsManager::handle_command) —
//! they are folded into a response string there, per the protocol's "errors
//! are recovered locally" contract. Components below the dispatcher return
//! `Result<T, Error>` so each stays independently testable.

use std::fmt::{self, Display, Formatter};

/// One of the ASCII error kinds the wire protocol can report.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Unknown format/compression/transmission, zero dimensions, inflate
    /// failure, size mismatch, oversized image, overlong filename, or an
    /// `id`+`image_number` conflict.
    Invalid,
    /// A put/delete command referenced an image that does not exist.
    NotFound,
    /// A buffer allocation failed.
    OutOfMemory,
    /// Opening or mapping a file/shared-memory segment failed.
    BadFile,
    /// Direct transmission exceeded the hard byte cap.
    TooBig,
    /// A continuation chunk arrived but the in-progress image is gone.
    IllegalSequence,
    /// The final payload was shorter than its declared size.
    NoData,
}

impl ErrorKind {
    /// The ASCII token this kind is reported as on the wire, e.g. `"EINVAL"`.
    pub const fn as_code(self) -> &'static str {
        match self {
            Self::Invalid => "EINVAL",
            Self::NotFound => "ENOENT",
            Self::OutOfMemory => "ENOMEM",
            Self::BadFile => "EBADF",
            Self::TooBig => "EFBIG",
            Self::IllegalSequence => "EILSEQ",
            Self::NoData => "ENODATA",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// An error kind plus a human-readable message, matching the
/// `"<CODE>:<message>"` wire format the terminal reports back to the client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfMemory, message)
    }

    pub fn bad_file(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadFile, message)
    }

    pub fn too_big(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooBig, message)
    }

    pub fn illegal_sequence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IllegalSequence, message)
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoData, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formats_as_code_colon_message() {
        let err = Error::not_found("Put command refers to non-existent image with id: 7");

        assert_eq!(
            err.to_string(),
            "ENOENT:Put command refers to non-existent image with id: 7"
        );
    }
}
