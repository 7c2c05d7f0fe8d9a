//! Leaf codec traits
//!
//! Leaf types (integers, floats, text, byte arrays, decimals) have a fixed wire encoding that
//! does not depend on any registry. They implement [Write], [Read] and [EncodeSize] directly;
//! the primitive and enum handlers adapt these implementations into type-erased routines.

use crate::error::Error;
use bytes::{Buf, BufMut, BytesMut};

/// Trait for leaf types that can be written (encoded) to a buffer.
pub trait Write {
    /// Encodes this value by writing to a buffer.
    ///
    /// Panics if a string or byte array is too long for its 32-bit length field.
    fn write(&self, buf: &mut (impl BufMut + ?Sized));
}

/// Trait for leaf types that can be read (decoded) from a buffer.
pub trait Read: Sized {
    /// Reads a value from the buffer, consuming the necessary bytes.
    ///
    /// Returns an error if decoding fails (e.g. truncated stream or out-of-domain value).
    fn read(buf: &mut (impl Buf + ?Sized)) -> Result<Self, Error>;
}

/// Trait for leaf types whose encoded length can be computed without encoding.
pub trait EncodeSize {
    /// Returns the encoded length of this value.
    ///
    /// This method MUST return the exact number of bytes that will be written by `write()`.
    fn encode_size(&self) -> usize;
}

/// Trait for leaf types that can be encoded to a standalone buffer.
pub trait Encode: Write + EncodeSize {
    /// Encodes a value to a `BytesMut` buffer.
    ///
    /// Panics if the `write` implementation does not write the expected number of bytes.
    ///
    /// (Provided method).
    fn encode(&self) -> BytesMut {
        let len = self.encode_size();
        let mut buffer = BytesMut::with_capacity(len);
        self.write(&mut buffer);
        assert_eq!(buffer.len(), len, "write() did not write expected bytes");
        buffer
    }
}

// Automatically implement `Encode` for types that implement `Write` and `EncodeSize`.
impl<T: Write + EncodeSize> Encode for T {}

/// Trait for leaf types that can be decoded from a buffer, ensuring the entire buffer is consumed.
pub trait Decode: Read {
    /// Decodes a value from a buffer, ensuring the buffer is fully consumed.
    ///
    /// (Provided method).
    fn decode(mut buf: impl Buf) -> Result<Self, Error> {
        let result = Self::read(&mut buf)?;

        // Check that the buffer is fully consumed.
        let remaining = buf.remaining();
        if remaining > 0 {
            return Err(Error::ExtraData(remaining));
        }

        Ok(result)
    }
}

// Automatically implement `Decode` for types that implement `Read`.
impl<T: Read> Decode for T {}

/// Fails with [Error::StreamTruncated] unless `buf` holds at least `len` more bytes.
#[inline]
pub(crate) fn at_least(buf: &(impl Buf + ?Sized), len: usize) -> Result<(), Error> {
    if buf.remaining() < len {
        return Err(Error::StreamTruncated);
    }
    Ok(())
}
