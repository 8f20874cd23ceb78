//! Wire-format code constants.
//!
//! The host format marks every value with a single leading code byte. This
//! module defines the subset of codes the extension layer touches: the nil
//! marker, the four string shapes used for identifiers, and the
//! string-extension header code itself.

/// Nil value marker.
pub const NIL: u8 = 0xc0;

/// String-identified extension header: `EXT_STR`, a 4-byte big-endian payload
/// length, then the identifier as an ordinary length-prefixed string.
///
/// `0xc1` is the one code byte the base format never assigns, which keeps the
/// augmented format unambiguous against ordinary values.
pub const EXT_STR: u8 = 0xc1;

/// String with a 1-byte length prefix.
pub const STR8: u8 = 0xd9;
/// String with a 2-byte big-endian length prefix.
pub const STR16: u8 = 0xda;
/// String with a 4-byte big-endian length prefix.
pub const STR32: u8 = 0xdb;

/// First code of the inline-length string range (length 0).
pub const FIXSTR_LOW: u8 = 0xa0;
/// Last code of the inline-length string range (length 31).
pub const FIXSTR_HIGH: u8 = 0xbf;

/// Whether `c` is a fixstr code carrying its length in the low five bits.
pub fn is_fixed_str(c: u8) -> bool {
    (FIXSTR_LOW..=FIXSTR_HIGH).contains(&c)
}

/// Width in bytes of the payload-length field for an extension header code.
///
/// String-identified extensions always use a 4-byte length field; any other
/// code has no length field and yields 0.
pub fn ext_len_width(c: u8) -> usize {
    match c {
        EXT_STR => 4,
        _ => 0,
    }
}
