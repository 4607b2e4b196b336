//! Byte-level packet payload codec.
//!
//! [`PacketPayload`] wraps an owned byte buffer and reads or writes typed
//! fields at explicit offsets: raw bytes, ASCII characters and strings,
//! binary integers and floats, ASCII hexadecimal and decimal numbers, plus
//! additive and XOR checksums.
//!
//! The caller sizes the buffer; nothing grows automatically. Every accessor
//! indexes the buffer like a slice, so an offset or width outside the buffer
//! panics.
//!
//! # Example
//!
//! ```
//! use ipsocket_net::payload::{ascii, PacketPayload};
//!
//! // STX, 4 hex digits, ETX, checksum
//! let mut packet = PacketPayload::zeroed(7);
//! packet.set_byte(0, ascii::STX);
//! packet.set_hex(1, 4, 0x1A2B);
//! packet.set_byte(5, ascii::ETX);
//! packet.set_sum(6, 0, 6);
//!
//! assert_eq!(packet.get_string(1, 4), "1A2B");
//! assert_eq!(packet.get_hex(1, 4), Some(0x1A2B));
//! assert!(packet.check_sum(6, 0, 6));
//! ```

use std::fmt;

/// Byte order of multi-byte binary fields.
///
/// ASCII hex and decimal fields are always written most-significant digit
/// first and are not affected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endian {
    /// Most significant byte first (network order).
    #[default]
    Big,
    /// Least significant byte first.
    Little,
}

/// Named ASCII control codes for building framed packets.
pub mod ascii {
    pub const NUL: u8 = 0x00;
    pub const SOH: u8 = 0x01;
    pub const STX: u8 = 0x02;
    pub const ETX: u8 = 0x03;
    pub const EOT: u8 = 0x04;
    pub const ENQ: u8 = 0x05;
    pub const ACK: u8 = 0x06;
    pub const BEL: u8 = 0x07;
    pub const BS: u8 = 0x08;
    pub const HT: u8 = 0x09;
    pub const LF: u8 = 0x0A;
    pub const VT: u8 = 0x0B;
    pub const FF: u8 = 0x0C;
    pub const CR: u8 = 0x0D;
    pub const SO: u8 = 0x0E;
    pub const SI: u8 = 0x0F;
    pub const DLE: u8 = 0x10;
    pub const DC1: u8 = 0x11;
    pub const DC2: u8 = 0x12;
    pub const DC3: u8 = 0x13;
    pub const DC4: u8 = 0x14;
    pub const NAK: u8 = 0x15;
    pub const SYN: u8 = 0x16;
    pub const ETB: u8 = 0x17;
    pub const CAN: u8 = 0x18;
    pub const EM: u8 = 0x19;
    pub const SUB: u8 = 0x1A;
    pub const ESC: u8 = 0x1B;
    pub const FS: u8 = 0x1C;
    pub const GS: u8 = 0x1D;
    pub const RS: u8 = 0x1E;
    pub const US: u8 = 0x1F;
    pub const DEL: u8 = 0x7F;
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Decode bytes as ASCII text; any byte above 0x7F becomes `?`.
pub(crate) fn ascii_to_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}

/// Encode text as ASCII bytes; any non-ASCII character becomes `?`.
pub(crate) fn string_to_ascii(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

fn hex_value(c: u8) -> Option<u32> {
    (c as char).to_digit(16)
}

fn dec_value(c: u8) -> Option<u32> {
    c.is_ascii_digit().then(|| u32::from(c - b'0'))
}

/// Sign-extend the low `bits` bits of `raw`. At 32 bits the pattern is
/// reinterpreted unchanged.
fn sign_extend(raw: u32, bits: u32) -> i32 {
    if bits >= 32 {
        raw as i32
    } else {
        let shift = 32 - bits;
        ((raw << shift) as i32) >> shift
    }
}

/// An owned byte buffer with typed field accessors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PacketPayload {
    data: Vec<u8>,
    endian: Endian,
}

impl PacketPayload {
    /// Wrap an existing buffer using big-endian byte order.
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_endian(data, Endian::Big)
    }

    /// Wrap an existing buffer using the given byte order.
    pub fn with_endian(data: Vec<u8>, endian: Endian) -> Self {
        Self { data, endian }
    }

    /// Create a zero-filled buffer of `size` bytes, big-endian.
    pub fn zeroed(size: usize) -> Self {
        Self::zeroed_with_endian(size, Endian::Big)
    }

    /// Create a zero-filled buffer of `size` bytes with the given byte order.
    pub fn zeroed_with_endian(size: usize, endian: Endian) -> Self {
        Self::with_endian(vec![0; size], endian)
    }

    /// Create a buffer holding the ASCII encoding of `text`.
    pub fn from_ascii(text: &str) -> Self {
        Self::new(string_to_ascii(text))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    // Bytes, characters and strings

    /// Store one byte.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is out of range.
    pub fn set_byte(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Read one byte.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is out of range.
    pub fn get_byte(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    /// Store one character as a single ASCII byte (`?` if not ASCII).
    pub fn set_char(&mut self, offset: usize, value: char) {
        self.data[offset] = if value.is_ascii() { value as u8 } else { b'?' };
    }

    /// Read one byte as an ASCII character (`?` above 0x7F).
    pub fn get_char(&self, offset: usize) -> char {
        let b = self.data[offset];
        if b.is_ascii() { b as char } else { '?' }
    }

    /// Copy the ASCII encoding of `text` into the buffer at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the encoded text does not fit between `offset` and the end
    /// of the buffer.
    pub fn set_string(&mut self, offset: usize, text: &str) {
        let bytes = string_to_ascii(text);
        self.data[offset..offset + bytes.len()].copy_from_slice(&bytes);
    }

    /// Read `len` bytes at `offset` as ASCII text.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn get_string(&self, offset: usize, len: usize) -> String {
        ascii_to_string(&self.data[offset..offset + len])
    }

    // Binary integers and floats

    /// Store the low `width` bytes of `value` in the payload's byte order.
    ///
    /// # Panics
    ///
    /// Panics if `width` is not in `1..=4` or the field is out of range.
    pub fn set_int(&mut self, offset: usize, width: usize, value: i32) {
        assert!((1..=4).contains(&width), "integer width must be 1..=4, got {width}");
        let bytes = value.to_be_bytes();
        let field = &mut self.data[offset..offset + width];
        field.copy_from_slice(&bytes[4 - width..]);
        if self.endian == Endian::Little {
            field.reverse();
        }
    }

    /// Read a `width`-byte integer as its raw bit pattern.
    ///
    /// Values wider than 31 bits wrap into the sign bit; use
    /// [`get_int_s`](Self::get_int_s) for sign-extended fields.
    pub fn get_int(&self, offset: usize, width: usize) -> i32 {
        self.get_int_u(offset, width) as i32
    }

    /// Read a `width`-byte unsigned integer.
    ///
    /// # Panics
    ///
    /// Panics if `width` is not in `1..=4` or the field is out of range.
    pub fn get_int_u(&self, offset: usize, width: usize) -> u32 {
        assert!((1..=4).contains(&width), "integer width must be 1..=4, got {width}");
        let field = &self.data[offset..offset + width];
        let fold = |acc: u32, &b: &u8| (acc << 8) | u32::from(b);
        match self.endian {
            Endian::Big => field.iter().fold(0, fold),
            Endian::Little => field.iter().rev().fold(0, fold),
        }
    }

    /// Read a `width`-byte two's-complement integer, sign-extended from the
    /// field width.
    pub fn get_int_s(&self, offset: usize, width: usize) -> i32 {
        sign_extend(self.get_int_u(offset, width), 8 * width as u32)
    }

    /// Store an IEEE-754 single in the payload's byte order.
    pub fn set_float(&mut self, offset: usize, value: f32) {
        let bytes = match self.endian {
            Endian::Big => value.to_be_bytes(),
            Endian::Little => value.to_le_bytes(),
        };
        self.data[offset..offset + 4].copy_from_slice(&bytes);
    }

    /// Read an IEEE-754 single in the payload's byte order.
    pub fn get_float(&self, offset: usize) -> f32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        match self.endian {
            Endian::Big => f32::from_be_bytes(bytes),
            Endian::Little => f32::from_le_bytes(bytes),
        }
    }

    // ASCII hex and decimal

    /// Write the low `4 * width` bits of `value` as uppercase hex digits,
    /// most significant first.
    ///
    /// Negative values are written in two's complement, so
    /// `set_hex(0, 2, -1)` writes `"FF"`.
    pub fn set_hex(&mut self, offset: usize, width: usize, value: i32) {
        let field = &mut self.data[offset..offset + width];
        let mut v = value;
        for slot in field.iter_mut().rev() {
            *slot = HEX_DIGITS[(v & 0xF) as usize];
            v >>= 4;
        }
    }

    /// Parse `width` hex digits as a raw bit pattern.
    ///
    /// Returns `None` if any byte is not `0-9`, `A-F` or `a-f`.
    pub fn get_hex(&self, offset: usize, width: usize) -> Option<i32> {
        self.get_hex_u(offset, width).map(|v| v as i32)
    }

    /// Parse `width` hex digits as an unsigned value.
    pub fn get_hex_u(&self, offset: usize, width: usize) -> Option<u32> {
        self.data[offset..offset + width]
            .iter()
            .try_fold(0u32, |acc, &c| Some((acc << 4) | hex_value(c)?))
    }

    /// Parse `width` hex digits as a two's-complement value sign-extended
    /// from `4 * width` bits.
    ///
    /// # Panics
    ///
    /// Panics if `width` is not in `1..=8`.
    pub fn get_hex_s(&self, offset: usize, width: usize) -> Option<i32> {
        assert!((1..=8).contains(&width), "hex width must be 1..=8, got {width}");
        self.get_hex_u(offset, width)
            .map(|raw| sign_extend(raw, 4 * width as u32))
    }

    /// Write `value` as `width` decimal digits, most significant first.
    /// Digits beyond `width` are dropped.
    pub fn set_dec(&mut self, offset: usize, width: usize, value: u32) {
        let field = &mut self.data[offset..offset + width];
        let mut v = value;
        for slot in field.iter_mut().rev() {
            *slot = b'0' + (v % 10) as u8;
            v /= 10;
        }
    }

    /// Parse `width` decimal digits. Returns `None` on any non-digit byte.
    pub fn get_dec(&self, offset: usize, width: usize) -> Option<u32> {
        self.data[offset..offset + width]
            .iter()
            .try_fold(0u32, |acc, &c| {
                Some(acc.wrapping_mul(10).wrapping_add(dec_value(c)?))
            })
    }

    // Checksums

    /// Additive checksum of `len` bytes starting at `start`, modulo 256.
    pub fn sum(&self, start: usize, len: usize) -> u8 {
        self.data[start..start + len]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_add(b))
    }

    /// Store [`sum`](Self::sum) of the range at `offset`.
    pub fn set_sum(&mut self, offset: usize, start: usize, len: usize) {
        let sum = self.sum(start, len);
        self.set_byte(offset, sum);
    }

    /// Check the byte at `offset` against [`sum`](Self::sum) of the range.
    pub fn check_sum(&self, offset: usize, start: usize, len: usize) -> bool {
        self.sum(start, len) == self.get_byte(offset)
    }

    /// XOR checksum of `len` bytes starting at `start`.
    pub fn xor(&self, start: usize, len: usize) -> u8 {
        self.data[start..start + len].iter().fold(0u8, |acc, &b| acc ^ b)
    }

    pub fn set_xor(&mut self, offset: usize, start: usize, len: usize) {
        let xor = self.xor(start, len);
        self.set_byte(offset, xor);
    }

    pub fn check_xor(&self, offset: usize, start: usize, len: usize) -> bool {
        self.xor(start, len) == self.get_byte(offset)
    }
}

impl fmt::Display for PacketPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&ascii_to_string(&self.data))
    }
}

impl From<Vec<u8>> for PacketPayload {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for PacketPayload {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl From<&str> for PacketPayload {
    fn from(text: &str) -> Self {
        Self::from_ascii(text)
    }
}

impl AsRef<[u8]> for PacketPayload {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0x8000, 16), -32768);
        assert_eq!(sign_extend(0xFFFF_FFFF, 32), -1);
        assert_eq!(sign_extend(0x8, 4), -8);
    }

    #[test]
    fn test_ascii_conversion() {
        assert_eq!(ascii_to_string(&[b'A', 0xC3, b'B']), "A?B");
        assert_eq!(string_to_ascii("aé"), b"a?");
    }

    #[test]
    fn test_set_int_big_and_little() {
        let mut p = PacketPayload::zeroed(4);
        p.set_int(0, 3, 0x0012_3456);
        assert_eq!(&p.data()[..3], &[0x12, 0x34, 0x56]);

        p.set_endian(Endian::Little);
        p.set_int(0, 3, 0x0012_3456);
        assert_eq!(&p.data()[..3], &[0x56, 0x34, 0x12]);
        assert_eq!(p.get_int_u(0, 3), 0x12_3456);
    }

    #[test]
    fn test_get_int_wraps_at_full_width() {
        let p = PacketPayload::new(vec![0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(p.get_int(0, 4), -2);
        assert_eq!(p.get_int_u(0, 4), 0xFFFF_FFFE);
        assert_eq!(p.get_int_s(0, 4), -2);
        assert_eq!(p.get_int_s(2, 2), -2);
        assert_eq!(p.get_int(2, 2), 0xFFFE);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_panics() {
        let p = PacketPayload::zeroed(2);
        p.get_int_u(1, 2);
    }

    #[test]
    fn test_hex_negative_and_lowercase() {
        let mut p = PacketPayload::zeroed(4);
        p.set_hex(0, 2, -1);
        assert_eq!(p.get_string(0, 2), "FF");
        assert_eq!(p.get_hex_s(0, 2), Some(-1));

        let p = PacketPayload::from_ascii("7fG0");
        assert_eq!(p.get_hex_u(0, 2), Some(0x7F));
        assert_eq!(p.get_hex_u(1, 2), None);
    }

    #[test]
    fn test_dec() {
        let mut p = PacketPayload::zeroed(5);
        p.set_dec(0, 5, 1234);
        assert_eq!(p.to_string(), "01234");
        assert_eq!(p.get_dec(0, 5), Some(1234));

        p.set_dec(0, 2, 1234);
        assert_eq!(p.get_string(0, 2), "34");

        p.set_char(1, 'x');
        assert_eq!(p.get_dec(0, 5), None);
    }
}
