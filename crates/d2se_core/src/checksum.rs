const CHECKSUM_WIDTH: usize = 4;

/// Rolling checksum used by 1.09+ saves.
///
/// Each step shifts the 32-bit accumulator left by one and adds the byte plus
/// the carry, where the carry is the accumulator's sign bit after the previous
/// step. The four bytes at `checksum_offset` count as zero.
pub fn compute_checksum(bytes: &[u8], checksum_offset: Option<usize>) -> u32 {
    let field = checksum_offset.map(|start| start..start + CHECKSUM_WIDTH);
    let mut value: i32 = 0;
    let mut carry: i32 = 0;

    for (idx, &byte) in bytes.iter().enumerate() {
        let byte = match &field {
            Some(range) if range.contains(&idx) => 0,
            _ => byte,
        };
        value = value
            .wrapping_shl(1)
            .wrapping_add(i32::from(byte))
            .wrapping_add(carry);
        carry = i32::from(value < 0);
    }

    value as u32
}

pub fn read_stored_checksum(bytes: &[u8], checksum_offset: usize) -> Option<u32> {
    read_u32_le(bytes, checksum_offset)
}

/// Recompute and store the checksum in place. Returns the new value, or
/// `None` when the buffer is too short to hold the field.
pub fn apply_checksum(bytes: &mut [u8], checksum_offset: usize) -> Option<u32> {
    if bytes.len() < checksum_offset + CHECKSUM_WIDTH {
        return None;
    }
    let value = compute_checksum(bytes, Some(checksum_offset));
    bytes[checksum_offset..checksum_offset + CHECKSUM_WIDTH].copy_from_slice(&value.to_le_bytes());
    Some(value)
}

pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

#[cfg(test)]
mod tests {
    use super::{apply_checksum, compute_checksum, read_stored_checksum};

    #[test]
    fn small_inputs_match_reference_values() {
        assert_eq!(compute_checksum(&[], None), 0);
        assert_eq!(compute_checksum(&[1, 2, 3], None), 11);
    }

    #[test]
    fn carry_wraps_around_the_sign_bit() {
        assert_eq!(compute_checksum(&[0xFF; 40], None), 0xFD81);

        let ramp: Vec<u8> = (0..=255u8).chain(0..=255u8).collect();
        assert_eq!(compute_checksum(&ramp, None), 0xF3FF_FDFF);
    }

    #[test]
    fn checksum_field_is_ignored() {
        let mut bytes: Vec<u8> = (0..64u8).collect();
        let clean = compute_checksum(&bytes, Some(12));
        assert_eq!(clean, 0xFF40_FFBF);

        bytes[12..16].copy_from_slice(&[0x99, 0x88, 0x77, 0x66]);
        assert_eq!(compute_checksum(&bytes, Some(12)), clean);

        let stored = apply_checksum(&mut bytes, 12).expect("buffer holds the field");
        assert_eq!(stored, clean);
        assert_eq!(read_stored_checksum(&bytes, 12), Some(clean));
        assert_eq!(compute_checksum(&bytes, Some(12)), clean);
    }

    #[test]
    fn short_buffer_has_no_field() {
        let mut bytes = [0u8; 10];
        assert_eq!(apply_checksum(&mut bytes, 12), None);
        assert_eq!(read_stored_checksum(&bytes, 12), None);
    }
}
