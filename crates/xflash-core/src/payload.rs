//! Image padding.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Padding multiple must be non-zero")]
    ZeroMultiple,
}

/// Extend `data` with `padding` up to the next multiple of `multiple` bytes.
///
/// Data that is already aligned is returned unchanged.
pub fn pad_to_multiple(data: &[u8], multiple: usize, padding: u8) -> Result<Vec<u8>, PayloadError> {
    if multiple == 0 {
        return Err(PayloadError::ZeroMultiple);
    }

    let mut padded = data.to_vec();
    let remainder = data.len() % multiple;
    if remainder != 0 {
        padded.resize(data.len() + multiple - remainder, padding);
    }
    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::BLOCK_SIZE;

    #[test]
    fn test_aligned_data_unchanged() {
        let data = vec![0xAB; BLOCK_SIZE * 2];
        assert_eq!(pad_to_multiple(&data, BLOCK_SIZE, 0xFF).unwrap(), data);
        assert!(pad_to_multiple(&[], BLOCK_SIZE, 0xFF).unwrap().is_empty());
    }

    #[test]
    fn test_pads_to_next_block() {
        let padded = pad_to_multiple(b"abc", 8, b'.').unwrap();
        assert_eq!(padded, b"abc.....");

        let padded = pad_to_multiple(&[1u8; 129], BLOCK_SIZE, 0xFF).unwrap();
        assert_eq!(padded.len(), 256);
        assert!(padded[129..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_zero_multiple_rejected() {
        assert_eq!(pad_to_multiple(b"abc", 0, 0), Err(PayloadError::ZeroMultiple));
    }
}
