//! Mask strip encoding.
//!
//! A mask is cut into strips of 8 columns, each one a part of the `ZPnn`
//! block. A strip is written top to bottom as segments: one count byte
//! (1..=127) and that many row bytes, bit 7 being the leftmost column of the
//! strip. Columns past the right edge are written as zero.

use super::block::{Block, Part, indexed_tag};
use crate::error::BlockError;
use crate::model::{Bitmap, ZPlane};

pub const STRIP_WIDTH: usize = 8;
pub const MAX_ROWS: usize = 0x7F;

pub fn strip_count(width: u16) -> usize {
    (width as usize).div_ceil(STRIP_WIDTH)
}

pub fn encode_strip(mask: &impl Bitmap, strip: usize) -> Vec<u8> {
    let (width, height) = (mask.width() as usize, mask.height() as usize);
    let x0 = strip * STRIP_WIDTH;
    let row_byte = |y: usize| {
        (0..STRIP_WIDTH)
            .filter(|i| x0 + i < width && mask.pixel((x0 + i) as u16, y as u16))
            .fold(0u8, |acc, i| acc | (0x80 >> i))
    };

    let mut out = Vec::with_capacity(height + height.div_ceil(MAX_ROWS));
    let mut y = 0;
    while y < height {
        let rows = MAX_ROWS.min(height - y);
        out.push(rows as u8);
        out.extend((y..y + rows).map(&row_byte));
        y += rows;
    }
    out
}

pub fn encode_strips(mask: &impl Bitmap) -> Vec<Vec<u8>> {
    (0..strip_count(mask.width()))
        .map(|strip| encode_strip(mask, strip))
        .collect()
}

/// Reverses `encode_strips`. `None` when `strips` don't describe exactly a
/// `width` x `height` mask.
pub fn decode_strips<S: AsRef<[u8]>>(strips: &[S], width: u16, height: u16) -> Option<ZPlane> {
    if strips.len() != strip_count(width) {
        return None;
    }
    let mut plane = ZPlane::new(width, height);

    for (strip, data) in strips.iter().enumerate() {
        let x0 = strip * STRIP_WIDTH;
        let mut bytes = data.as_ref().iter().copied();
        let mut y = 0usize;
        while y < height as usize {
            let rows = bytes.next()? as usize;
            if rows == 0 || rows > MAX_ROWS || y + rows > height as usize {
                return None;
            }
            for _ in 0..rows {
                let row = bytes.next()?;
                for i in 0..STRIP_WIDTH {
                    let x = x0 + i;
                    if x < width as usize {
                        plane.set(x as u16, y as u16, row & (0x80 >> i) != 0);
                    }
                }
                y += 1;
            }
        }
        if bytes.next().is_some() {
            return None;
        }
    }
    Some(plane)
}

/// `ZPnn` block, one part per strip.
pub fn zplane_block(mask: &impl Bitmap, index: usize) -> Result<Block, BlockError> {
    let mut block = Block::new(indexed_tag(*b"ZP", index)?);
    for strip in encode_strips(mask) {
        block.push(Part::Bytes(strip));
    }
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_strip() {
        let mask = ZPlane::from_rows(&["10000001", "01000000", "00000000"]).unwrap();
        assert_eq!(encode_strips(&mask), vec![vec![3, 0x81, 0x40, 0x00]]);
    }

    #[test]
    fn test_partial_strip_is_padded() {
        let mask = ZPlane::from_rows(&["1111111111", "0000000001"]).unwrap();
        // the second strip only has two real columns
        assert_eq!(
            encode_strips(&mask),
            vec![vec![2, 0xFF, 0x00], vec![2, 0xC0, 0x40]]
        );
    }

    #[test]
    fn test_tall_mask_is_segmented() {
        let mut mask = ZPlane::new(16, 300);
        mask.set(0, 299, true);
        let strips = encode_strips(&mask);
        assert_eq!(strips.len(), 2);

        for data in &strips {
            let mut segments = Vec::new();
            let mut pos = 0;
            while pos < data.len() {
                let rows = data[pos] as usize;
                segments.push(rows);
                pos += 1 + rows;
            }
            assert_eq!(segments, vec![127, 127, 46]);
            assert_eq!(data.len(), 300 + 3);
        }
        assert_eq!(strips[0].last(), Some(&0x80));
        assert_eq!(strips[1].last(), Some(&0x00));
    }

    #[test]
    fn test_round_trip() {
        let mut mask = ZPlane::new(21, 140);
        for y in 0..140 {
            for x in 0..21 {
                mask.set(x, y, (x * 7 + y * 3) % 5 == 0);
            }
        }
        let strips = encode_strips(&mask);
        assert_eq!(decode_strips(&strips, 21, 140), Some(mask));
    }

    #[test]
    fn test_decode_rejects_bad_data() {
        let mask = ZPlane::from_rows(&["1", "0"]).unwrap();
        let strips = encode_strips(&mask);
        assert!(decode_strips(&strips, 1, 2).is_some());

        let test_cases: Vec<Vec<Vec<u8>>> = vec![
            vec![vec![2, 0x80]],
            vec![vec![2, 0x80, 0x00, 0x00]],
            vec![vec![3, 0, 0, 0]],
            vec![vec![0]],
            vec![strips[0].clone(), strips[0].clone()],
        ];
        for strips in test_cases {
            assert!(decode_strips(&strips, 1, 2).is_none(), "{strips:?}");
        }
    }

    #[test]
    fn test_block_offsets_per_strip() {
        let mask = ZPlane::new(16, 1);
        let block = zplane_block(&mask, 1).unwrap();
        assert_eq!(&block.tag(), b"ZP01");
        assert_eq!(block.offsets().unwrap(), vec![12, 14]);
        assert_eq!(
            block.to_bytes().unwrap(),
            b"ZP01\0\0\0\x10\x0c\x00\x0e\x00\x01\x00\x01\x00"
        );
    }
}
