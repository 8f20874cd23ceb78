//! Error types for the extension layer.

use thiserror::Error;

/// Result type for extension encode/decode operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension layer error types.
#[derive(Debug, Error)]
pub enum Error {
    /// The byte read where an extension header was expected is not the
    /// string-extension code.
    #[error("invalid code={0:#x} decoding ext len")]
    InvalidHeaderCode(u8),

    /// A statically-typed decode expected one identifier but the stream
    /// carries another.
    #[error("got ext id={got}, wanted {wanted}")]
    MismatchedExtId { got: String, wanted: String },

    /// Dynamic decode found no registration for the identifier on the stream.
    #[error("unknown ext id={0}")]
    UnknownExtId(String),

    /// A type-erased adapter was handed a value of the wrong concrete type.
    #[error("extension value is not a {expected}")]
    ValueTypeMismatch { expected: &'static str },

    /// A typed encode/decode entry point found no binding for the value type.
    #[error("no extension registered for type {0}")]
    UnregisteredType(&'static str),

    /// A string primitive met a code outside the string shapes.
    #[error("invalid code={0:#x} decoding string")]
    InvalidStrCode(u8),

    /// An extension payload does not fit the 32-bit length field.
    #[error("ext payload of {0} bytes exceeds u32 length field")]
    PayloadTooLarge(usize),

    /// User marshal/unmarshal logic failed.
    #[error("ext payload error: {0}")]
    Payload(String),

    /// Identifier or string bytes are not valid UTF-8.
    #[error("string is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// IO error from the underlying stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
