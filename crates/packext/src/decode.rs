//! Decoding side of the extension layer.
//!
//! [`Decoder`] owns the read primitives (code byte, exact reads, string
//! decode/skip, raw skip), the extension header reader, the typed
//! [`Decoder::decode_ext`] entry point, the dynamic decode path for open
//! destinations, and the skip path.

use std::any::{type_name, Any, TypeId};
use std::io::Read;

use tracing::debug;

use crate::codes;
use crate::error::{Error, Result};
use crate::registry;

/// A decoded extension whose concrete type was resolved from the stream.
///
/// Produced by [`Decoder::decode_ext_dynamic`]: the identifier read off the
/// wire plus the freshly decoded value, boxed because the caller did not know
/// the type statically.
pub struct ExtValue {
    /// The identifier carried in the extension header.
    pub ext_id: String,
    /// The decoded value, of the type registered under `ext_id`.
    pub value: Box<dyn Any + Send + Sync>,
}

impl ExtValue {
    /// Whether the payload is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrow the payload as a `T`, if it is one.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the payload as an owned `T`, handing `self` back on a type
    /// mismatch.
    pub fn downcast<T: 'static>(self) -> std::result::Result<T, ExtValue> {
        match self.value.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(value) => Err(ExtValue {
                ext_id: self.ext_id,
                value,
            }),
        }
    }
}

impl std::fmt::Debug for ExtValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtValue")
            .field("ext_id", &self.ext_id)
            .finish_non_exhaustive()
    }
}

/// Streaming decoder over a byte source.
///
/// Tracks the number of bytes consumed so callers can verify framing
/// arithmetic (e.g. that a skip advanced by exactly the header plus payload).
pub struct Decoder<'a> {
    rd: &'a mut dyn Read,
    consumed: u64,
}

impl<'a> Decoder<'a> {
    /// Create a decoder reading from `rd`.
    pub fn new(rd: &'a mut dyn Read) -> Self {
        Self { rd, consumed: 0 }
    }

    /// Total bytes consumed from the stream by this decoder.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    fn read_exact_buf(&mut self, buf: &mut [u8]) -> Result<()> {
        self.rd.read_exact(buf)?;
        self.consumed += buf.len() as u64;
        Ok(())
    }

    /// Read one format code byte.
    pub fn read_code(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact_buf(&mut b)?;
        Ok(b[0])
    }

    /// Read exactly `n` raw bytes.
    pub fn read_n(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact_buf(&mut buf)?;
        Ok(buf)
    }

    /// Read an unsigned 32-bit value, big-endian.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact_buf(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    /// Consume and discard exactly `n` raw bytes.
    pub fn skip_n(&mut self, n: usize) -> Result<()> {
        let copied = std::io::copy(&mut (&mut *self.rd).take(n as u64), &mut std::io::sink())?;
        self.consumed += copied;
        if copied < n as u64 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        Ok(())
    }

    fn str_len(&mut self, c: u8) -> Result<usize> {
        if codes::is_fixed_str(c) {
            return Ok((c & 0x1f) as usize);
        }
        match c {
            codes::STR8 => {
                let mut b = [0u8; 1];
                self.read_exact_buf(&mut b)?;
                Ok(b[0] as usize)
            }
            codes::STR16 => {
                let mut b = [0u8; 2];
                self.read_exact_buf(&mut b)?;
                Ok(u16::from_be_bytes(b) as usize)
            }
            codes::STR32 => Ok(self.read_u32()? as usize),
            _ => Err(Error::InvalidStrCode(c)),
        }
    }

    /// Read a length-prefixed string.
    pub fn decode_str(&mut self) -> Result<String> {
        let c = self.read_code()?;
        let len = self.str_len(c)?;
        let bytes = self.read_n(len)?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Consume a length-prefixed string without materializing it.
    pub fn skip_str(&mut self) -> Result<()> {
        let c = self.read_code()?;
        let len = self.str_len(c)?;
        self.skip_n(len)
    }

    /// Read a string-identified extension header.
    ///
    /// Returns the identifier and the payload length; the payload itself is
    /// left on the stream.
    pub fn decode_ext_header(&mut self) -> Result<(String, usize)> {
        let c = self.read_code()?;
        self.decode_ext_header_from(c)
    }

    /// Finish reading an extension header whose code byte was already
    /// consumed by the caller.
    pub fn decode_ext_header_from(&mut self, c: u8) -> Result<(String, usize)> {
        let payload_len = self.parse_ext_len(c)?;
        let ext_id = self.decode_str()?;
        Ok((ext_id, payload_len))
    }

    fn parse_ext_len(&mut self, c: u8) -> Result<usize> {
        match c {
            codes::EXT_STR => Ok(self.read_u32()? as usize),
            _ => Err(Error::InvalidHeaderCode(c)),
        }
    }

    /// Decode into a destination of a registered extension type.
    ///
    /// Looks up the decode adapter bound to `T` (or to `Option<T>` via the
    /// dual binding) and runs it; the adapter reads the header, checks the
    /// identifier against the one `T` was registered under, and invokes the
    /// registered decode logic. Fails with [`Error::UnregisteredType`] when
    /// no binding exists.
    pub fn decode_ext<T: Send + Sync + 'static>(&mut self, dest: &mut T) -> Result<()> {
        let adapter = registry::decoder_for(TypeId::of::<T>())
            .ok_or(Error::UnregisteredType(type_name::<T>()))?;
        adapter(self, dest as &mut dyn Any)
    }

    /// Decode an extension whose concrete type is not known statically.
    ///
    /// Reads the header, resolves the identifier through the registry,
    /// allocates a fresh instance of the registered type and decodes into it.
    /// Fails with [`Error::UnknownExtId`] for unregistered identifiers.
    pub fn decode_ext_dynamic(&mut self) -> Result<ExtValue> {
        let c = self.read_code()?;
        self.decode_ext_dynamic_from(c)
    }

    /// Dynamic decode for a caller that already pulled the code byte.
    pub fn decode_ext_dynamic_from(&mut self, c: u8) -> Result<ExtValue> {
        let (ext_id, payload_len) = self.decode_ext_header_from(c)?;

        let info = registry::dynamic_for(&ext_id).ok_or_else(|| {
            Error::UnknownExtId(ext_id.clone())
        })?;
        debug!(ext_id = %ext_id, ty = info.type_name, payload_len, "dynamic extension decode");

        let mut value = (info.construct)();
        (info.decode)(self, value.as_mut(), payload_len)?;

        Ok(ExtValue { ext_id, value })
    }

    /// Skip an extension header and its payload, given the already-read code.
    ///
    /// Consumes the length field (its width re-derived from `c`), the
    /// identifier string, and exactly the payload bytes. Never consults the
    /// registry; unknown identifiers cannot fail here.
    pub fn skip_ext(&mut self, c: u8) -> Result<()> {
        if codes::ext_len_width(c) == 0 {
            return Err(Error::InvalidHeaderCode(c));
        }
        let payload_len = self.read_u32()? as usize;
        self.skip_str()?;
        self.skip_n(payload_len)
    }
}
