//! Leaf encodings for primitive types.
//!
//! # Integers and floats
//!
//! `u8`, `i8` and `bool` are written as a single raw byte. All wider integers are varints:
//! unsigned values directly, signed values after ZigZag encoding. `u16`/`i16` are widened to
//! 32 bits first. Floats are written as the varint of their IEEE-754 bit pattern (not of their
//! magnitude), so large exponents produce long varints.
//!
//! # Text and byte arrays
//!
//! ```text
//! string:  varint(0)                     null
//!          varint(1)                     ""
//!          varint(len + 2) varint(chars) utf8 bytes
//!
//! bytes:   varint(0)                     null
//!          varint(len + 1) raw bytes
//! ```
//!
//! The character count of a string is kept for wire compatibility and skipped on decode.
//! Types that cannot be null (`String`, `Vec<u8>`, `Bytes`) decode a null marker as empty.
//!
//! # Decimal
//!
//! A [Decimal] is written as three unsigned varints: the low 64 bits of the mantissa, the high
//! 32 bits of the mantissa, and `scale << 1 | sign`.

use crate::{
    codec::{at_least, EncodeSize, Read, Write},
    varint, Error,
};
use bytes::{Buf, BufMut, Bytes};
use std::fmt;

/// Offset added to the byte length of a non-empty string.
const STRING_LEN_OFFSET: u32 = 2;

/// Offset added to the length of a byte array.
const BYTES_LEN_OFFSET: u32 = 1;

/// Marker written for a null string or byte array.
const NULL_MARKER: u32 = 0;

/// Marker written for an empty string.
const EMPTY_STRING_MARKER: u32 = 1;

// Unsigned integers written as varints of their own width
macro_rules! impl_varint {
    ($type:ty) => {
        impl Write for $type {
            #[inline]
            fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
                varint::write(*self, buf);
            }
        }

        impl Read for $type {
            #[inline]
            fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
                varint::read(buf)
            }
        }

        impl EncodeSize for $type {
            #[inline]
            fn encode_size(&self) -> usize {
                varint::size(*self)
            }
        }
    };
}
impl_varint!(u32);
impl_varint!(u64);

// Signed integers written as ZigZag varints of their own width
macro_rules! impl_zigzag {
    ($type:ty, $utype:ty) => {
        impl Write for $type {
            #[inline]
            fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
                varint::write_signed::<$utype, $type>(*self, buf);
            }
        }

        impl Read for $type {
            #[inline]
            fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
                varint::read_signed::<$utype, $type>(buf)
            }
        }

        impl EncodeSize for $type {
            #[inline]
            fn encode_size(&self) -> usize {
                varint::size_signed::<$utype, $type>(*self)
            }
        }
    };
}
impl_zigzag!(i32, u32);
impl_zigzag!(i64, u64);

// Floats written as varints of their bit pattern
macro_rules! impl_float {
    ($type:ty, $utype:ty) => {
        impl Write for $type {
            #[inline]
            fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
                varint::write(self.to_bits(), buf);
            }
        }

        impl Read for $type {
            #[inline]
            fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
                Ok(<$type>::from_bits(varint::read::<$utype>(buf)?))
            }
        }

        impl EncodeSize for $type {
            #[inline]
            fn encode_size(&self) -> usize {
                varint::size(self.to_bits())
            }
        }
    };
}
impl_float!(f32, u32);
impl_float!(f64, u64);

impl Write for u16 {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        varint::write(u32::from(*self), buf);
    }
}

impl Read for u16 {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        let value: u32 = varint::read(buf)?;
        u16::try_from(value).map_err(|_| Error::InvalidData("u16", value.to_string()))
    }
}

impl EncodeSize for u16 {
    #[inline]
    fn encode_size(&self) -> usize {
        varint::size(u32::from(*self))
    }
}

impl Write for i16 {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        varint::write_signed::<u32, i32>(i32::from(*self), buf);
    }
}

impl Read for i16 {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        let value = varint::read_signed::<u32, i32>(buf)?;
        i16::try_from(value).map_err(|_| Error::InvalidData("i16", value.to_string()))
    }
}

impl EncodeSize for i16 {
    #[inline]
    fn encode_size(&self) -> usize {
        varint::size_signed::<u32, i32>(i32::from(*self))
    }
}

impl Write for u8 {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        buf.put_u8(*self);
    }
}

impl Read for u8 {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        at_least(buf, 1)?;
        Ok(buf.get_u8())
    }
}

impl EncodeSize for u8 {
    #[inline]
    fn encode_size(&self) -> usize {
        1
    }
}

impl Write for i8 {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        buf.put_i8(*self);
    }
}

impl Read for i8 {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        at_least(buf, 1)?;
        Ok(buf.get_i8())
    }
}

impl EncodeSize for i8 {
    #[inline]
    fn encode_size(&self) -> usize {
        1
    }
}

impl Write for bool {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        buf.put_u8(u8::from(*self));
    }
}

impl Read for bool {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        match u8::read(buf)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::InvalidData("bool", other.to_string())),
        }
    }
}

impl EncodeSize for bool {
    #[inline]
    fn encode_size(&self) -> usize {
        1
    }
}

impl Write for char {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        varint::write(u32::from(*self), buf);
    }
}

impl Read for char {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        let value: u32 = varint::read(buf)?;
        char::from_u32(value).ok_or_else(|| Error::InvalidData("char", format!("{value:#x}")))
    }
}

impl EncodeSize for char {
    #[inline]
    fn encode_size(&self) -> usize {
        varint::size(u32::from(*self))
    }
}

/// Converts an in-memory length plus a wire offset to the 32-bit length field.
fn length_field(context: &'static str, len: usize, offset: u32) -> Result<u32, Error> {
    u32::try_from(len)
        .ok()
        .and_then(|len| len.checked_add(offset))
        .ok_or_else(|| Error::InvalidData(context, format!("length {len} too large")))
}

/// Returns the encoded size of a length field, without bounding it to 32 bits.
fn length_field_size(len: usize, offset: u32) -> usize {
    varint::size(len as u64 + u64::from(offset))
}

/// Writes an optional string.
///
/// Fails without writing anything if the string is too long for a 32-bit length field.
pub fn write_str(value: Option<&str>, buf: &mut (impl BufMut + ?Sized)) -> Result<(), Error> {
    match value {
        None => varint::write(NULL_MARKER, buf),
        Some("") => varint::write(EMPTY_STRING_MARKER, buf),
        Some(value) => {
            let len = length_field("string", value.len(), STRING_LEN_OFFSET)?;
            let chars = length_field("string", value.chars().count(), 0)?;
            varint::write(len, buf);
            varint::write(chars, buf);
            buf.put_slice(value.as_bytes());
        }
    }
    Ok(())
}

/// Reads an optional string.
pub fn read_string(buf: &mut (impl Buf + ?Sized)) -> Result<Option<String>, Error> {
    let len: u32 = varint::read(buf)?;
    match len {
        NULL_MARKER => Ok(None),
        EMPTY_STRING_MARKER => Ok(Some(String::new())),
        len => {
            // Character count, unused on decode
            let _: u32 = varint::read(buf)?;

            let len = (len - STRING_LEN_OFFSET) as usize;
            at_least(buf, len)?;
            let mut bytes = vec![0; len];
            buf.copy_to_slice(&mut bytes);
            Ok(Some(String::from_utf8(bytes)?))
        }
    }
}

/// Returns the encoded length of an optional string.
pub fn str_size(value: Option<&str>) -> usize {
    match value {
        None | Some("") => 1,
        Some(value) => {
            length_field_size(value.len(), STRING_LEN_OFFSET)
                + length_field_size(value.chars().count(), 0)
                + value.len()
        }
    }
}

/// Writes an optional byte array.
///
/// Fails without writing anything if the array is too long for a 32-bit length field.
pub fn write_bytes(value: Option<&[u8]>, buf: &mut (impl BufMut + ?Sized)) -> Result<(), Error> {
    match value {
        None => varint::write(NULL_MARKER, buf),
        Some(value) => {
            varint::write(length_field("bytes", value.len(), BYTES_LEN_OFFSET)?, buf);
            buf.put_slice(value);
        }
    }
    Ok(())
}

/// Reads the length of an optional byte array, returning `None` for a null marker.
fn read_bytes_len(buf: &mut (impl Buf + ?Sized)) -> Result<Option<usize>, Error> {
    let len: u32 = varint::read(buf)?;
    if len == NULL_MARKER {
        return Ok(None);
    }
    let len = (len - BYTES_LEN_OFFSET) as usize;
    at_least(buf, len)?;
    Ok(Some(len))
}

/// Reads an optional byte array.
pub fn read_bytes(buf: &mut (impl Buf + ?Sized)) -> Result<Option<Vec<u8>>, Error> {
    let Some(len) = read_bytes_len(buf)? else {
        return Ok(None);
    };
    let mut bytes = vec![0; len];
    buf.copy_to_slice(&mut bytes);
    Ok(Some(bytes))
}

/// Returns the encoded length of an optional byte array.
pub fn bytes_size(value: Option<&[u8]>) -> usize {
    match value {
        None => 1,
        Some(value) => length_field_size(value.len(), BYTES_LEN_OFFSET) + value.len(),
    }
}

/// Completes a leaf [Write] of text or bytes.
///
/// [Write] has no error path, so a length too large for the wire panics here. Routines built by
/// the serializer call [write_str] and [write_bytes] directly and return the error instead.
fn infallible(result: Result<(), Error>) {
    if let Err(err) = result {
        panic!("write: {err}");
    }
}

impl Write for String {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        infallible(write_str(Some(self), buf));
    }
}

impl Read for String {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        Ok(read_string(buf)?.unwrap_or_default())
    }
}

impl EncodeSize for String {
    #[inline]
    fn encode_size(&self) -> usize {
        str_size(Some(self))
    }
}

impl Write for Option<String> {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        infallible(write_str(self.as_deref(), buf));
    }
}

impl Read for Option<String> {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        read_string(buf)
    }
}

impl EncodeSize for Option<String> {
    #[inline]
    fn encode_size(&self) -> usize {
        str_size(self.as_deref())
    }
}

impl Write for Vec<u8> {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        infallible(write_bytes(Some(self), buf));
    }
}

impl Read for Vec<u8> {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        Ok(read_bytes(buf)?.unwrap_or_default())
    }
}

impl EncodeSize for Vec<u8> {
    #[inline]
    fn encode_size(&self) -> usize {
        bytes_size(Some(self))
    }
}

impl Write for Option<Vec<u8>> {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        infallible(write_bytes(self.as_deref(), buf));
    }
}

impl Read for Option<Vec<u8>> {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        read_bytes(buf)
    }
}

impl EncodeSize for Option<Vec<u8>> {
    #[inline]
    fn encode_size(&self) -> usize {
        bytes_size(self.as_deref())
    }
}

impl Write for Bytes {
    #[inline]
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        infallible(write_bytes(Some(self), buf));
    }
}

impl Read for Bytes {
    #[inline]
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        match read_bytes_len(buf)? {
            Some(len) => Ok(buf.copy_to_bytes(len)),
            None => Ok(Bytes::new()),
        }
    }
}

impl EncodeSize for Bytes {
    #[inline]
    fn encode_size(&self) -> usize {
        bytes_size(Some(self))
    }
}

/// A 128-bit fixed-point decimal: a 96-bit unsigned mantissa, a sign and a base-10 scale.
///
/// The represented value is `(-1)^negative * mantissa / 10^scale`. Negative zero is
/// preserved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: u128,
    scale: u8,
    negative: bool,
}

impl Decimal {
    /// The largest supported scale.
    pub const MAX_SCALE: u8 = 28;

    /// The largest supported mantissa (96 bits).
    pub const MAX_MANTISSA: u128 = (1 << 96) - 1;

    /// Creates a decimal, returning `None` if the mantissa exceeds 96 bits or the scale
    /// exceeds [Decimal::MAX_SCALE].
    pub fn new(mantissa: u128, scale: u8, negative: bool) -> Option<Self> {
        if mantissa > Self::MAX_MANTISSA || scale > Self::MAX_SCALE {
            return None;
        }
        Some(Self {
            mantissa,
            scale,
            negative,
        })
    }

    /// Returns the unsigned mantissa.
    pub fn mantissa(&self) -> u128 {
        self.mantissa
    }

    /// Returns the base-10 scale.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Returns whether the sign bit is set.
    pub fn is_negative(&self) -> bool {
        self.negative
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self {
            mantissa: u128::from(value.unsigned_abs()),
            scale: 0,
            negative: value < 0,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.to_string();
        let scale = self.scale as usize;
        if self.negative {
            f.write_str("-")?;
        }
        if scale == 0 {
            return f.write_str(&digits);
        }
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{int}.{frac}")
        } else {
            write!(f, "0.{}{digits}", "0".repeat(scale - digits.len()))
        }
    }
}

impl Decimal {
    fn parts(&self) -> (u64, u32, u32) {
        let low_mid = self.mantissa as u64;
        let high = (self.mantissa >> 64) as u32;
        let scale_sign = (u32::from(self.scale) << 1) | u32::from(self.negative);
        (low_mid, high, scale_sign)
    }
}

impl Write for Decimal {
    fn write(&self, buf: &mut (impl BufMut + ?Sized)) {
        let (low_mid, high, scale_sign) = self.parts();
        varint::write(low_mid, buf);
        varint::write(high, buf);
        varint::write(scale_sign, buf);
    }
}

impl Read for Decimal {
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error> {
        let low_mid: u64 = varint::read(buf)?;
        let high: u32 = varint::read(buf)?;
        let scale_sign: u32 = varint::read(buf)?;

        let scale = scale_sign >> 1;
        let scale = u8::try_from(scale)
            .ok()
            .filter(|scale| *scale <= Self::MAX_SCALE)
            .ok_or_else(|| Error::InvalidData("decimal", format!("scale {scale}")))?;
        Ok(Self {
            mantissa: (u128::from(high) << 64) | u128::from(low_mid),
            scale,
            negative: scale_sign & 1 == 1,
        })
    }
}

impl EncodeSize for Decimal {
    fn encode_size(&self) -> usize {
        let (low_mid, high, scale_sign) = self.parts();
        varint::size(low_mid) + varint::size(high) + varint::size(scale_sign)
    }
}
