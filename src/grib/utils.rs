use std::marker;
use std::ops::{BitOr, Shl, Shr};
use crate::grib::{GribError, Result};

/// Sign-magnitude integers as GRIB stores them: the most significant bit is the sign.
pub(crate) trait GribInt<I> {
    fn as_grib_int(&self) -> I;
}

macro_rules! add_impl_for_ints {
    ($(($ty_src:ty, $ty_dst:ty),)*) => ($(
        impl GribInt<$ty_dst> for $ty_src {
            fn as_grib_int(&self) -> $ty_dst {
                if self.leading_zeros() == 0 {
                    let abs = (self << 1 >> 1) as $ty_dst;
                    -abs
                } else {
                    *self as $ty_dst
                }
            }
        }
    )*);
}

add_impl_for_ints! {
    (u8, i8),
    (u16, i16),
    (u32, i32),
    (u64, i64),
}

/// Inverse of [`GribInt`].
pub(crate) trait GribUint<U> {
    fn as_grib_uint(&self) -> U;
}

macro_rules! add_impl_for_uints {
    ($(($ty_src:ty, $ty_dst:ty),)*) => ($(
        impl GribUint<$ty_dst> for $ty_src {
            fn as_grib_uint(&self) -> $ty_dst {
                let sign_bit: $ty_dst = 1 << (<$ty_dst>::BITS - 1);
                if *self < 0 {
                    self.unsigned_abs() | sign_bit
                } else {
                    *self as $ty_dst
                }
            }
        }
    )*);
}

add_impl_for_uints! {
    (i8, u8),
    (i16, u16),
    (i32, u32),
    (i64, u64),
}

/// Reads a sign-magnitude integer spread over an arbitrary number of octets.
pub(crate) fn grib_int_from_octets(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let magnitude = bytes.iter().enumerate().fold(0_i64, |acc, (i, b)| {
        let b = if i == 0 { b & 0x7f } else { *b };
        (acc << 8) | i64::from(b)
    });
    if bytes[0] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

pub(crate) struct BitwiseIterator<'a, T: 'a + From<u8> + Shr<usize, Output = T> + Shl<usize, Output = T> + BitOr<Output = T>> {
    slice: &'a [u8],
    size: usize,
    pos: usize,
    offset: usize,
    _marker: marker::PhantomData<T>,
}

impl<'a, T: 'a + From<u8> + Shr<usize, Output = T> + Shl<usize, Output = T> + BitOr<Output = T>> BitwiseIterator<'a, T> {
    pub(crate) fn new(slice: &'a [u8], size: usize) -> Self {
        Self {
            slice,
            size,
            pos: 0,
            offset: 0,
            _marker: Default::default()
        }
    }

    pub(crate) fn with_offset(self, offset: usize) -> Self {
        Self {
            offset,
            ..self
        }
    }
}

impl<'a, T: 'a + From<u8> + Shr<usize, Output = T> + Shl<usize, Output = T> + BitOr<Output = T>> Iterator for BitwiseIterator<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {

        let new_offset = self.offset + self.size;
        let (new_pos, new_offset) = (self.pos + new_offset / 8, new_offset % 8);

        if self.pos >= self.slice.len()
            || new_pos > self.slice.len()
            || (new_pos == self.slice.len() && new_offset > 0)
        {
            return None;
        }

        let mut val = T::from(self.slice[self.pos] << self.offset >> self.offset);
        if new_pos == self.pos {
            val = val >> (8 - new_offset); // 00_____# -> 000_____
        } else {
            for pos in (self.pos + 1)..new_pos {
                val = (val << 8) | T::from(self.slice[pos]);
            }

            if new_offset > 0 {
                let last_val = T::from(self.slice[new_pos]) >> (8 - new_offset);
                val = (val << new_offset) | last_val // 0000____ and -####### -> 000____-
            }
        }

        self.pos = new_pos;
        self.offset = new_offset;

        Some(val)
    }
}

/// Packs unsigned integers of a fixed bit width, most significant bit first.
pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    acc_bits: usize,
}

impl BitWriter {
    pub(crate) fn with_capacity(num_bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity((num_bits + 7) / 8),
            acc: 0,
            acc_bits: 0,
        }
    }

    /// `width` must not exceed 32.
    pub(crate) fn push(&mut self, value: u64, width: usize) {
        if width == 0 {
            return;
        }
        let mask = (1_u64 << width) - 1;
        self.acc = (self.acc << width) | (value & mask);
        self.acc_bits += width;
        while self.acc_bits >= 8 {
            self.acc_bits -= 8;
            self.bytes.push((self.acc >> self.acc_bits) as u8);
        }
        self.acc &= (1_u64 << self.acc_bits) - 1;
    }

    /// Pads the last octet with zero bits.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        if self.acc_bits > 0 {
            self.bytes.push((self.acc << (8 - self.acc_bits)) as u8);
        }
        self.bytes
    }
}

/// Cursor over a template body; every read is bounds-checked.
pub(crate) struct Buffer {
    pub(crate) bytes: Vec<u8>,
    pos: usize
}

impl Buffer {
    pub(crate) fn new(buf: Vec<u8>) -> Self {
        Self {
            bytes: buf,
            pos: 0
        }
    }

    pub(crate) fn read<T: EndianRead>(&mut self) -> Result<T> {
        let end = self.pos + std::mem::size_of::<T>();
        if end > self.bytes.len() {
            return Err(GribError::MalformedMessage(format!(
                "template truncated: needs {} octets, has {}", end, self.bytes.len()
            )));
        }
        let val = T::from_be_bytes(&self.bytes[self.pos..end]);
        self.pos = end;

        Ok(val)
    }

    pub(crate) fn read_grib_int<T: EndianRead + GribInt<I>, I>(&mut self) -> Result<I> {
        Ok(self.read::<T>()?.as_grib_int())
    }

    pub(crate) fn remaining(&self) -> &[u8] {
        &self.bytes[self.pos..]
    }
}

pub(crate) trait EndianRead {
    fn from_be_bytes(bytes: &[u8]) -> Self;
}

pub(crate) trait EndianWrite {
    fn write_be_bytes(&self, out: &mut Vec<u8>);
}

macro_rules! uint_impl {
    ($ty:ty) => {

        impl EndianRead for $ty {
            fn from_be_bytes(bytes: &[u8]) -> Self {
                let mut raw = [0; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_be_bytes(raw)
            }
        }

        impl EndianWrite for $ty {
            fn write_be_bytes(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes());
            }
        }
    }
}

uint_impl! { u8 }
uint_impl! { u16 }
uint_impl! { u32 }
uint_impl! { u64 }

uint_impl! { f32 }

/// Section body under construction.
#[derive(Default)]
pub(crate) struct BufferWriter {
    pub(crate) bytes: Vec<u8>,
}

impl BufferWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn write<T: EndianWrite>(&mut self, val: T) -> &mut Self {
        val.write_be_bytes(&mut self.bytes);
        self
    }

    pub(crate) fn write_grib_int<I: GribUint<T>, T: EndianWrite>(&mut self, val: I) -> &mut Self {
        self.write(val.as_grib_uint())
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Prefixes the body with the 5-octet section header.
    pub(crate) fn into_section(self, number: u8) -> Vec<u8> {
        let length = (self.bytes.len() + crate::grib::SECT_HEADER_SIZE) as u32;
        let mut out = Vec::with_capacity(length as usize);
        out.extend_from_slice(&length.to_be_bytes());
        out.push(number);
        out.extend_from_slice(&self.bytes);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_magnitude_decoding() {
        assert_eq!(0x8001_u16.as_grib_int(), -1_i16);
        assert_eq!(0x0001_u16.as_grib_int(), 1_i16);
        assert_eq!((90_000_000_u32 | 0x8000_0000).as_grib_int(), -90_000_000_i32);
        assert_eq!(0x80_u8.as_grib_int(), 0_i8);
    }

    #[test]
    fn sign_magnitude_encoding() {
        assert_eq!((-1_i16).as_grib_uint(), 0x8001_u16);
        assert_eq!(45_000_000_i32.as_grib_uint(), 45_000_000_u32);
        assert_eq!((-45_000_000_i32).as_grib_uint().as_grib_int(), -45_000_000_i32);
    }

    #[test]
    fn sign_magnitude_from_octets() {
        assert_eq!(grib_int_from_octets(&[0x80, 0x05]), -5);
        assert_eq!(grib_int_from_octets(&[0x01, 0x00]), 256);
        assert_eq!(grib_int_from_octets(&[0x81]), -1);
        assert_eq!(grib_int_from_octets(&[]), 0);
    }

    #[test]
    fn bitwise_iterator_reads_across_octets() {
        // 3-bit values 1, 2, 3, 4, 5 packed: 001 010 011 100 101 -> 0x29 0xCA (plus padding)
        let bytes = [0b0010_1001, 0b1100_1010];
        let values: Vec<u32> = BitwiseIterator::<u32>::new(&bytes, 3).take(5).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn bitwise_iterator_with_offset() {
        let bytes = [0b1111_0101, 0b1000_0000];
        let values: Vec<u32> = BitwiseIterator::<u32>::new(&bytes, 4).with_offset(4).take(2).collect();
        assert_eq!(values, vec![0b0101, 0b1000]);
    }

    #[test]
    fn bit_writer_matches_iterator() {
        let input = [0_u64, 1, 1023, 512, 7, 900];
        let mut writer = BitWriter::with_capacity(input.len() * 10);
        for v in input {
            writer.push(v, 10);
        }
        let bytes = writer.finish();
        assert_eq!(bytes.len(), 8);
        let decoded: Vec<u64> = BitwiseIterator::<u64>::new(&bytes, 10).take(input.len()).collect();
        assert_eq!(decoded, input.to_vec());
    }

    #[test]
    fn buffer_reports_truncation() {
        let mut buf = Buffer::new(vec![0, 1, 2]);
        assert_eq!(buf.read::<u16>().unwrap(), 1);
        assert!(matches!(buf.read::<u16>(), Err(GribError::MalformedMessage(_))));
    }

    #[test]
    fn section_header_is_prefixed() {
        let mut body = BufferWriter::new();
        body.write(1_u8).write(2_u16);
        let section = body.into_section(6);
        assert_eq!(section, vec![0, 0, 0, 8, 6, 1, 0, 2]);
    }
}
