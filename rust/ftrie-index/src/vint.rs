//! Variable-length integer (VInt) codec.
//!
//! A VInt stores an unsigned 32-bit value as a big-endian sequence of 7-bit
//! groups, most significant group first. Every byte except the last one has
//! its high bit (`0x80`) set:
//!
//! ```text
//! value range              bytes
//! [0, 2^7)                 0xxxxxxx
//! [2^7, 2^14)              1xxxxxxx 0xxxxxxx
//! [2^14, 2^21)             1xxxxxxx 1xxxxxxx 0xxxxxxx
//! [2^21, 2^28)             1xxxxxxx 1xxxxxxx 1xxxxxxx 0xxxxxxx
//! [2^28, 2^32)             1000xxxx 1xxxxxxx 1xxxxxxx 1xxxxxxx 0xxxxxxx
//! ```
//!
//! Because the encoded length is recoverable from the continuation bits alone,
//! VInt byte runs can be copied between streams without re-encoding.

use ftrie_common::{Result, error::Error, verify_data};

/// Maximum number of bytes a single VInt occupies.
pub const MAX_VINT_LEN: usize = 5;

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7F;

/// Returns the number of bytes needed to encode `value`, in `1..=5`.
#[inline]
pub fn vint_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Appends the VInt encoding of `value` to `buf` and returns the number of
/// bytes written.
#[inline]
pub fn write_vint(buf: &mut Vec<u8>, value: u32) -> usize {
    let len = vint_len(value);
    for group in (1..len).rev() {
        buf.push(((value >> (7 * group)) as u8 & PAYLOAD_MASK) | CONTINUATION);
    }
    buf.push(value as u8 & PAYLOAD_MASK);
    len
}

/// Decodes the VInt starting at `offset` in `buf`.
///
/// Returns the value together with the number of bytes consumed.
///
/// # Errors
///
/// Returns an `InvalidFormat` error if the sequence is truncated, runs past
/// [`MAX_VINT_LEN`] bytes, or encodes a value above `u32::MAX`.
pub fn read_vint(buf: &[u8], offset: usize) -> Result<(u32, usize)> {
    let mut value = 0u64;
    for i in 0..MAX_VINT_LEN {
        let Some(&byte) = buf.get(offset + i) else {
            return Err(Error::invalid_format("vint", "truncated sequence"));
        };
        value = (value << 7) | (byte & PAYLOAD_MASK) as u64;
        if byte & CONTINUATION == 0 {
            verify_data!(value, value <= u32::MAX as u64);
            return Ok((value as u32, i + 1));
        }
    }
    Err(Error::invalid_format(
        "vint",
        format!("sequence longer than {MAX_VINT_LEN} bytes"),
    ))
}

/// Returns the encoded length of the VInt starting at `offset`, looking only
/// at the continuation bits.
pub fn encoded_len(buf: &[u8], offset: usize) -> Result<usize> {
    let tail = buf.get(offset..).unwrap_or_default();
    match tail
        .iter()
        .take(MAX_VINT_LEN)
        .position(|&b| b & CONTINUATION == 0)
    {
        Some(last) => Ok(last + 1),
        None if tail.len() < MAX_VINT_LEN => {
            Err(Error::invalid_format("vint", "truncated sequence"))
        }
        None => Err(Error::invalid_format(
            "vint",
            format!("sequence longer than {MAX_VINT_LEN} bytes"),
        )),
    }
}

/// Decodes a whole run of back-to-back VInts.
pub fn decode_vints(buf: &[u8]) -> Result<Vec<u32>> {
    let mut values = Vec::new();
    let mut offset = 0;
    while offset < buf.len() {
        let (value, len) = read_vint(buf, offset)?;
        values.push(value);
        offset += len;
    }
    Ok(values)
}

/// Iterator over the raw byte runs of back-to-back VInts.
///
/// The input is expected to be produced by [`write_vint`]; a dangling
/// continuation byte at the end is yielded as a (short) final run.
pub struct RawVInts<'a> {
    data: &'a [u8],
}

impl<'a> RawVInts<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        RawVInts { data }
    }
}

impl<'a> Iterator for RawVInts<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.data.is_empty() {
            return None;
        }
        let len = self
            .data
            .iter()
            .position(|&b| b & CONTINUATION == 0)
            .map_or(self.data.len(), |last| last + 1);
        let (run, rest) = self.data.split_at(len);
        self.data = rest;
        Some(run)
    }
}

/// Growable VInt stream with a leading size header.
///
/// The first four bytes hold a little-endian count of all bytes written to
/// the stream, the header included (so an empty stream reports 4). The
/// buffer starts with room for 8 payload bytes and grows by a factor of 1.5.
#[derive(Clone)]
pub struct VIntStream {
    buf: Vec<u8>,
    count: u32,
}

impl VIntStream {
    /// Size of the stream header in bytes.
    pub const HEADER_LEN: usize = 4;

    const INITIAL_PAYLOAD: usize = 8;

    pub fn new() -> VIntStream {
        let mut buf = Vec::with_capacity(Self::HEADER_LEN + Self::INITIAL_PAYLOAD);
        buf.extend_from_slice(&(Self::HEADER_LEN as u32).to_le_bytes());
        VIntStream { buf, count: 0 }
    }

    /// Appends `value` and refreshes the size header.
    pub fn push(&mut self, value: u32) {
        let len = self.buf.len();
        if self.buf.capacity() - len < MAX_VINT_LEN {
            let target = (self.buf.capacity() * 3 / 2).max(len + MAX_VINT_LEN);
            self.buf.reserve_exact(target - len);
        }
        write_vint(&mut self.buf, value);
        self.count += 1;
        let size = self.buf.len() as u32;
        self.buf[..Self::HEADER_LEN].copy_from_slice(&size.to_le_bytes());
    }

    /// Number of values pushed so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Value of the size header: total bytes written, header included.
    pub fn size(&self) -> usize {
        let mut header = [0u8; Self::HEADER_LEN];
        header.copy_from_slice(&self.buf[..Self::HEADER_LEN]);
        u32::from_le_bytes(header) as usize
    }

    /// The encoded values, without the header.
    pub fn payload(&self) -> &[u8] {
        &self.buf[Self::HEADER_LEN..self.size()]
    }

    /// Raw byte runs of the encoded values, in push order.
    pub fn raw_values(&self) -> RawVInts<'_> {
        RawVInts::new(self.payload())
    }

    /// Bytes reserved by the stream, used for memory accounting.
    pub fn allocated_size(&self) -> usize {
        self.buf.capacity()
    }
}

impl Default for VIntStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftrie_common::error::ErrorKind;

    #[test]
    fn test_vint_len_boundaries() {
        assert_eq!(vint_len(0), 1);
        assert_eq!(vint_len(0x7F), 1);
        assert_eq!(vint_len(0x80), 2);
        assert_eq!(vint_len(0x3FFF), 2);
        assert_eq!(vint_len(0x4000), 3);
        assert_eq!(vint_len(0x1F_FFFF), 3);
        assert_eq!(vint_len(0x20_0000), 4);
        assert_eq!(vint_len(0x0FFF_FFFF), 4);
        assert_eq!(vint_len(0x1000_0000), 5);
        assert_eq!(vint_len(u32::MAX), 5);
    }

    #[test]
    fn test_write_vint_layout() {
        let mut buf = Vec::new();
        assert_eq!(write_vint(&mut buf, 7), 1);
        assert_eq!(buf, [0x07]);

        buf.clear();
        write_vint(&mut buf, 300);
        // 300 = 0b10_0101100
        assert_eq!(buf, [0x82, 0x2C]);

        buf.clear();
        write_vint(&mut buf, u32::MAX);
        assert_eq!(buf, [0x8F, 0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_vint_roundtrip_edges() {
        let mut values = vec![0u32, 1, u32::MAX, u32::MAX - 1];
        for shift in [7, 14, 21, 28] {
            values.push((1 << shift) - 1);
            values.push(1 << shift);
            values.push((1 << shift) + 1);
        }
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        values.extend((0..10_000).map(|_| rng.u32(..)));

        let mut buf = Vec::new();
        for &value in &values {
            let start = buf.len();
            let len = write_vint(&mut buf, value);
            assert_eq!(len, vint_len(value));
            assert_eq!(encoded_len(&buf, start).unwrap(), len);
            assert_eq!(read_vint(&buf, start).unwrap(), (value, len));
        }
        assert_eq!(decode_vints(&buf).unwrap(), values);
        assert_eq!(RawVInts::new(&buf).count(), values.len());
    }

    #[test]
    fn test_read_vint_malformed() {
        assert!(read_vint(&[], 0).is_err());
        assert!(read_vint(&[0x81], 0).is_err());
        assert!(read_vint(&[0x81, 0x81, 0x81, 0x81, 0x81, 0x01], 0).is_err());
        // Five groups whose top group overflows 32 bits.
        let err = read_vint(&[0xFF, 0xFF, 0xFF, 0xFF, 0x7F], 0).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidFormat { element, .. } if element == "value"
        ));
        assert!(encoded_len(&[0x80, 0x80], 0).is_err());
        assert!(encoded_len(&[0x80; 6], 0).is_err());
        assert!(decode_vints(&[0x01, 0x80]).is_err());
    }

    #[test]
    fn test_stream_header_and_growth() {
        let mut stream = VIntStream::new();
        assert_eq!(stream.size(), 4);
        assert_eq!(stream.count(), 0);
        assert!(stream.payload().is_empty());
        assert_eq!(stream.allocated_size(), 12);

        stream.push(1);
        stream.push(300);
        assert_eq!(stream.size(), 4 + 1 + 2);
        assert_eq!(stream.payload(), &[0x01, 0x82, 0x2C]);

        for v in 0..1000 {
            stream.push(v);
        }
        assert_eq!(stream.count(), 1002);
        assert_eq!(stream.size(), 4 + stream.payload().len());
        assert_eq!(decode_vints(stream.payload()).unwrap().len(), 1002);
        let raw: Vec<&[u8]> = stream.raw_values().take(2).collect();
        assert_eq!(raw, vec![&[0x01][..], &[0x82, 0x2C][..]]);
    }
}
