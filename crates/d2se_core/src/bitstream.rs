use std::io;

/// Largest field a single read or write may span.
pub const MAX_FIELD_BITS: u32 = 64;

/// Reads little-endian bit fields, least significant bit first.
///
/// Bit 0 is the low bit of byte 0; a field that crosses a byte boundary
/// continues in the low bits of the next byte.
pub struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn at(bytes: &'a [u8], bit_pos: usize) -> Self {
        Self {
            bytes,
            pos: bit_pos,
        }
    }

    pub fn read_bits(&mut self, n: u32) -> io::Result<u64> {
        let value = read_bits_at(self.bytes, self.pos, n)?;
        self.pos += n as usize;
        Ok(value)
    }

    pub fn read_u8(&mut self, n: u32) -> io::Result<u8> {
        debug_assert!(n <= 8);
        Ok(self.read_bits(n)? as u8)
    }

    pub fn read_u16(&mut self, n: u32) -> io::Result<u16> {
        debug_assert!(n <= 16);
        Ok(self.read_bits(n)? as u16)
    }

    pub fn read_u32(&mut self, n: u32) -> io::Result<u32> {
        debug_assert!(n <= 32);
        Ok(self.read_bits(n)? as u32)
    }

    /// Consume the bits up to the next byte boundary and return them.
    /// Returns `(bits, count)`; `count` is zero when already aligned.
    pub fn read_padding(&mut self) -> io::Result<(u8, u32)> {
        let count = padding_bits(self.pos);
        let bits = self.read_bits(count)? as u8;
        Ok((bits, count))
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of whole or partial bytes touched so far.
    pub fn byte_len(&self) -> usize {
        self.pos.div_ceil(8)
    }

    pub fn bits_remaining(&self) -> usize {
        (self.bytes.len() * 8).saturating_sub(self.pos)
    }
}

/// Writes little-endian bit fields into a buffer that grows on demand.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    pos: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let pos = bytes.len() * 8;
        Self { bytes, pos }
    }

    pub fn write_bits(&mut self, value: u64, n: u32) {
        assert!(n <= MAX_FIELD_BITS, "bit field wider than {MAX_FIELD_BITS}");
        let end = self.pos + n as usize;
        let needed = end.div_ceil(8);
        if self.bytes.len() < needed {
            self.bytes.resize(needed, 0);
        }
        store(&mut self.bytes, self.pos, value, n);
        self.pos = end;
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_bits(u64::from(b), 8);
        }
    }

    /// Fill up to the next byte boundary with the low bits of `padding`.
    pub fn pad_to_byte(&mut self, padding: u8) {
        let count = padding_bits(self.pos);
        self.write_bits(u64::from(padding), count);
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Read `n` bits starting at `bit_offset` without a cursor.
pub fn read_bits_at(bytes: &[u8], bit_offset: usize, n: u32) -> io::Result<u64> {
    check_span(bytes.len(), bit_offset, n)?;
    Ok(extract(bytes, bit_offset, n))
}

/// Read-modify-write of an `n` bit field inside an existing buffer.
/// Neighbouring bits are preserved; the buffer never grows.
pub fn write_bits_at(bytes: &mut [u8], bit_offset: usize, value: u64, n: u32) -> io::Result<()> {
    check_span(bytes.len(), bit_offset, n)?;
    store(bytes, bit_offset, value, n);
    Ok(())
}

pub fn mask(n: u32) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}

fn padding_bits(pos: usize) -> u32 {
    ((8 - pos % 8) % 8) as u32
}

fn check_span(len: usize, bit_offset: usize, n: u32) -> io::Result<()> {
    if n > MAX_FIELD_BITS {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("bit field of {n} bits exceeds {MAX_FIELD_BITS}"),
        ));
    }
    let end = bit_offset + n as usize;
    if end > len * 8 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "truncated bit stream: need bits {bit_offset}..{end}, have {}",
                len * 8
            ),
        ));
    }
    Ok(())
}

fn extract(bytes: &[u8], start: usize, n: u32) -> u64 {
    let mut value = 0u64;
    let mut done = 0u32;
    let mut pos = start;
    while done < n {
        let shift = (pos % 8) as u32;
        let take = (8 - shift).min(n - done);
        let chunk = (u64::from(bytes[pos / 8]) >> shift) & mask(take);
        value |= chunk << done;
        done += take;
        pos += take as usize;
    }
    value
}

fn store(bytes: &mut [u8], start: usize, value: u64, n: u32) {
    let mut done = 0u32;
    let mut pos = start;
    while done < n {
        let shift = (pos % 8) as u32;
        let take = (8 - shift).min(n - done);
        let field = (mask(take) as u8) << shift;
        let chunk = (((value >> done) & mask(take)) as u8) << shift;
        let byte = &mut bytes[pos / 8];
        *byte = (*byte & !field) | chunk;
        done += take;
        pos += take as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::{BitReader, BitWriter, read_bits_at, write_bits_at};

    #[test]
    fn reads_lsb_first_across_bytes() {
        // 0b1010_1100, 0b0000_0011
        let bytes = [0xAC, 0x03];
        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bits(2).unwrap(), 0b00);
        assert_eq!(r.read_bits(4).unwrap(), 0b1011);
        // spans the boundary: top two bits of byte 0, low three of byte 1
        assert_eq!(r.read_bits(5).unwrap(), 0b01110);
        assert_eq!(r.position(), 11);
        assert_eq!(r.byte_len(), 2);
    }

    #[test]
    fn read_past_end_is_truncation() {
        let bytes = [0xFF];
        let mut r = BitReader::new(&bytes);
        r.read_bits(5).unwrap();
        let err = r.read_bits(4).expect_err("only three bits remain");
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn writer_grows_and_round_trips() {
        let mut w = BitWriter::new();
        w.write_bits(0x1FF, 9);
        w.write_bits(12345, 32);
        w.write_bits(0b101, 3);
        assert_eq!(w.position(), 44);
        w.pad_to_byte(0);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 6);

        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bits(9).unwrap(), 0x1FF);
        assert_eq!(r.read_bits(32).unwrap(), 12345);
        assert_eq!(r.read_bits(3).unwrap(), 0b101);
        assert_eq!(r.read_padding().unwrap(), (0, 4));
    }

    #[test]
    fn write_at_preserves_neighbouring_bits() {
        let mut bytes = [0xFF; 6];
        write_bits_at(&mut bytes, 4, 0, 40).unwrap();
        assert_eq!(bytes, [0x0F, 0, 0, 0, 0, 0xF0]);
        write_bits_at(&mut bytes, 4, 0xAB_CDEF_0123, 40).unwrap();
        assert_eq!(read_bits_at(&bytes, 4, 40).unwrap(), 0xAB_CDEF_0123);
        assert_eq!(bytes[0] & 0x0F, 0x0F);
        assert_eq!(bytes[5] & 0xF0, 0xF0);
    }

    #[test]
    fn write_at_rejects_span_past_end() {
        let mut bytes = [0u8; 2];
        assert!(write_bits_at(&mut bytes, 10, 1, 8).is_err());
        assert_eq!(bytes, [0, 0]);
    }

    #[test]
    fn oversized_values_are_masked_to_width() {
        let mut w = BitWriter::new();
        w.write_bits(0xFFFF, 4);
        w.write_bits(0, 4);
        assert_eq!(w.into_bytes(), vec![0x0F]);
    }
}
