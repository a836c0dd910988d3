use core::fmt;

/// Errors returned by the mesh core.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Unexpectedly reached the end of a buffer while reading or writing data.
    Eof,

    /// A frame or record specified an invalid length value or was too short.
    InvalidLength,

    /// Invalid value supplied for a field.
    InvalidValue,

    /// A persistent-store record does not exist.
    ///
    /// A missing configuration record is not a failure; the caller falls back
    /// to defaults.
    NotFound,

    /// A radio or storage driver operation failed.
    Hardware,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::Eof => "end of buffer",
            Error::InvalidLength => "invalid length value specified",
            Error::InvalidValue => "invalid value for field",
            Error::NotFound => "record not found",
            Error::Hardware => "driver operation failed",
        })
    }
}
