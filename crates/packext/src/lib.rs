//! String-identified extension layer for a compact binary serialization
//! format.
//!
//! The host format tags values with a single-byte numeric extension code;
//! this crate augments it with extensions named by a variable-length string
//! identifier instead. Independent modules register custom encode/decode
//! logic under an identifier, and values are framed on the wire inside the
//! format's extension envelope convention:
//!
//! ```text
//! [1 byte: EXT_STR code]
//! [4 bytes: big-endian payload length N]
//! [length-prefixed string: identifier]
//! [N bytes: opaque payload]
//! ```
//!
//! The length field is always 4 bytes wide, so the header has exactly one
//! shape regardless of payload size.
//!
//! ## Example
//!
//! ```rust
//! use packext::{Decoder, Encoder, Error, ExtPayload, Result};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Celsius(f64);
//!
//! impl ExtPayload for Celsius {
//!     fn marshal_ext(&self) -> Result<Vec<u8>> {
//!         Ok(self.0.to_be_bytes().to_vec())
//!     }
//!
//!     fn unmarshal_ext(&mut self, payload: &[u8]) -> Result<()> {
//!         let bytes: [u8; 8] = payload
//!             .try_into()
//!             .map_err(|_| Error::Payload("want 8 bytes".into()))?;
//!         self.0 = f64::from_be_bytes(bytes);
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     packext::register::<Celsius>("sensor.celsius");
//!
//!     let mut buf = Vec::new();
//!     Encoder::new(&mut buf).encode_ext(&Celsius(21.5))?;
//!
//!     let mut rd = &buf[..];
//!     let value = Decoder::new(&mut rd).decode_ext_dynamic()?;
//!     assert_eq!(value.ext_id, "sensor.celsius");
//!     assert_eq!(value.downcast::<Celsius>().ok(), Some(Celsius(21.5)));
//!     Ok(())
//! }
//! ```
//!
//! The registry is process-wide. Registration is expected during an
//! initialization phase; concurrent lookups are safe once mutation has
//! settled. Re-registering an identifier atomically replaces the previous
//! binding.

pub mod codes;
pub mod decode;
pub mod encode;
pub mod error;
pub mod registry;

pub use decode::{Decoder, ExtValue};
pub use encode::Encoder;
pub use error::{Error, Result};
pub use registry::{
    is_registered, register, register_decoder, register_encoder, registered_ext_ids, unregister,
    ExtPayload,
};
