//! Encoding side of the extension layer.
//!
//! [`Encoder`] owns the narrow set of host-format write primitives the
//! extension layer consumes (raw bytes, code byte, 32-bit length, nil,
//! length-prefixed string) plus the extension header writer and the typed
//! [`Encoder::encode_ext`] entry point that dispatches through the registry.

use std::any::{type_name, Any, TypeId};
use std::io::Write;

use crate::codes;
use crate::error::{Error, Result};
use crate::registry;

/// Streaming encoder over a byte sink.
pub struct Encoder<'a> {
    wr: &'a mut dyn Write,
}

impl<'a> Encoder<'a> {
    /// Create an encoder writing to `wr`.
    pub fn new(wr: &'a mut dyn Write) -> Self {
        Self { wr }
    }

    /// Write raw bytes verbatim.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.wr.write_all(buf)?;
        Ok(())
    }

    /// Write a single format code byte.
    pub fn write_code(&mut self, c: u8) -> Result<()> {
        self.write(&[c])
    }

    /// Write an unsigned 32-bit value, big-endian.
    pub fn write_u32(&mut self, n: u32) -> Result<()> {
        self.write(&n.to_be_bytes())
    }

    /// Write the host format's nil representation.
    pub fn encode_nil(&mut self) -> Result<()> {
        self.write_code(codes::NIL)
    }

    /// Write a length-prefixed string, picking the narrowest string shape
    /// that holds its byte length.
    pub fn encode_str(&mut self, s: &str) -> Result<()> {
        let len = s.len();
        if len < 32 {
            self.write_code(codes::FIXSTR_LOW | len as u8)?;
        } else if len <= u8::MAX as usize {
            self.write_code(codes::STR8)?;
            self.write(&[len as u8])?;
        } else if len <= u16::MAX as usize {
            self.write_code(codes::STR16)?;
            self.write(&(len as u16).to_be_bytes())?;
        } else {
            let len = u32::try_from(len).map_err(|_| Error::PayloadTooLarge(s.len()))?;
            self.write_code(codes::STR32)?;
            self.write_u32(len)?;
        }
        self.write(s.as_bytes())
    }

    /// Write a string-identified extension header.
    ///
    /// Emits the [`codes::EXT_STR`] code, the payload length as a big-endian
    /// `u32`, then the identifier as an ordinary length-prefixed string. The
    /// length field is always 4 bytes wide regardless of payload size, so the
    /// header has exactly one shape.
    ///
    /// The payload itself is not written; callers follow up with
    /// [`Encoder::write`].
    pub fn encode_ext_header(&mut self, ext_id: &str, payload_len: usize) -> Result<()> {
        let len = u32::try_from(payload_len).map_err(|_| Error::PayloadTooLarge(payload_len))?;
        self.write_code(codes::EXT_STR)?;
        self.write_u32(len)?;
        self.encode_str(ext_id)
    }

    /// Encode a value of a registered extension type.
    ///
    /// Looks up the encode adapter bound to `T` (or to `Option<T>` via the
    /// dual binding installed at registration) and runs it. Fails with
    /// [`Error::UnregisteredType`] when no binding exists.
    pub fn encode_ext<T: Send + Sync + 'static>(&mut self, value: &T) -> Result<()> {
        let adapter = registry::encoder_for(TypeId::of::<T>())
            .ok_or(Error::UnregisteredType(type_name::<T>()))?;
        adapter(self, value as &dyn Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_str_bytes(s: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        Encoder::new(&mut buf).encode_str(s).unwrap();
        buf
    }

    #[test]
    fn test_encode_nil() {
        let mut buf = Vec::new();
        Encoder::new(&mut buf).encode_nil().unwrap();
        assert_eq!(buf, [codes::NIL]);
    }

    #[test]
    fn test_encode_str_fixstr() {
        assert_eq!(encode_str_bytes(""), [codes::FIXSTR_LOW]);

        let b = encode_str_bytes("abc");
        assert_eq!(b[0], codes::FIXSTR_LOW | 3);
        assert_eq!(&b[1..], b"abc");

        // 31 bytes is the widest fixstr
        let s = "x".repeat(31);
        assert_eq!(encode_str_bytes(&s)[0], codes::FIXSTR_LOW | 31);
    }

    #[test]
    fn test_encode_str_str8() {
        let s = "x".repeat(32);
        let b = encode_str_bytes(&s);
        assert_eq!(b[0], codes::STR8);
        assert_eq!(b[1], 32);
        assert_eq!(b.len(), 2 + 32);
    }

    #[test]
    fn test_encode_str_str16() {
        let s = "x".repeat(300);
        let b = encode_str_bytes(&s);
        assert_eq!(b[0], codes::STR16);
        assert_eq!(u16::from_be_bytes([b[1], b[2]]), 300);
        assert_eq!(b.len(), 3 + 300);
    }

    #[test]
    fn test_ext_header_layout() {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_ext_header("my.ext", 0x0102)
            .unwrap();

        assert_eq!(buf[0], codes::EXT_STR);
        assert_eq!(u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]), 0x0102);
        assert_eq!(buf[5], codes::FIXSTR_LOW | 6);
        assert_eq!(&buf[6..], b"my.ext");
    }

    #[test]
    fn test_encode_ext_unregistered_type() {
        struct Never;
        let mut buf = Vec::new();
        let err = Encoder::new(&mut buf).encode_ext(&Never).unwrap_err();
        assert!(matches!(err, Error::UnregisteredType(_)));
    }
}
