//! Generic tagged container used by every resource in the output file.
//!
//! ```text
//! tag      4 ASCII bytes
//! size     u32 BE, header included
//! offsets  one LE entry per part, from the start of the block
//! parts    raw bytes or nested blocks
//! ```
//!
//! Entries are u16 except in containers, whose parts (a full background
//! image, a whole room) run past 64K and get u32 entries.

use std::io::Write;

use crate::error::BlockError;

pub type Tag = [u8; 4];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Bytes(Vec<u8>),
    Block(Block),
}

impl Part {
    pub fn size(&self) -> usize {
        match self {
            Part::Bytes(bytes) => bytes.len(),
            Part::Block(block) => block.size(),
        }
    }
}

/// Width of one offset table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetWidth {
    U16,
    U32,
}

impl OffsetWidth {
    pub fn bytes(self) -> usize {
        match self {
            OffsetWidth::U16 => 2,
            OffsetWidth::U32 => 4,
        }
    }

    fn max(self) -> usize {
        match self {
            OffsetWidth::U16 => u16::MAX as usize,
            OffsetWidth::U32 => u32::MAX as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    tag: Tag,
    width: OffsetWidth,
    parts: Vec<Part>,
}

impl Block {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            width: OffsetWidth::U16,
            parts: Vec::new(),
        }
    }

    /// Block whose parts may lie anywhere in a 32-bit range.
    pub fn container(tag: Tag) -> Self {
        Self {
            width: OffsetWidth::U32,
            ..Self::new(tag)
        }
    }

    /// Leaf block holding a single payload.
    pub fn leaf(tag: Tag, bytes: Vec<u8>) -> Self {
        Self::new(tag).with(Part::Bytes(bytes))
    }

    pub fn with(mut self, part: Part) -> Self {
        self.push(part);
        self
    }

    pub fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn push_block(&mut self, block: Block) {
        self.parts.push(Part::Block(block));
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn tag_name(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }

    pub fn offset_width(&self) -> OffsetWidth {
        self.width
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Nested blocks, in order.
    pub fn children(&self) -> impl Iterator<Item = &Block> {
        self.parts.iter().filter_map(|p| match p {
            Part::Block(b) => Some(b),
            Part::Bytes(_) => None,
        })
    }

    pub fn header_size(&self) -> usize {
        8 + self.width.bytes() * self.parts.len()
    }

    pub fn size(&self) -> usize {
        self.header_size() + self.parts.iter().map(Part::size).sum::<usize>()
    }

    /// Start of every part, counted from the first byte of the tag.
    pub fn offsets(&self) -> Result<Vec<u32>, BlockError> {
        let mut offset = self.header_size();
        let mut offsets = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            if offset > self.width.max() {
                return Err(BlockError::OffsetOverflow {
                    tag: self.tag_name(),
                    offset,
                });
            }
            offsets.push(offset as u32);
            offset += part.size();
        }
        Ok(offsets)
    }

    pub fn write<W: Write>(&self, out: &mut W) -> Result<(), BlockError> {
        let size = self.size();
        let encoded_size = u32::try_from(size).map_err(|_| BlockError::TooLarge {
            tag: self.tag_name(),
            size,
        })?;

        out.write_all(&self.tag)?;
        out.write_all(&encoded_size.to_be_bytes())?;
        for offset in self.offsets()? {
            match self.width {
                OffsetWidth::U16 => out.write_all(&(offset as u16).to_le_bytes())?,
                OffsetWidth::U32 => out.write_all(&offset.to_le_bytes())?,
            }
        }
        for part in &self.parts {
            match part {
                Part::Bytes(bytes) => out.write_all(bytes)?,
                Part::Block(block) => block.write(out)?,
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, BlockError> {
        let expected = self.size();
        let mut out = Vec::with_capacity(expected);
        self.write(&mut out)?;
        if out.len() != expected {
            return Err(BlockError::SizeMismatch {
                tag: self.tag_name(),
                expected,
                written: out.len(),
            });
        }
        Ok(out)
    }
}

/// `prefix` followed by a two digit index, e.g. `ZP01`.
pub fn indexed_tag(prefix: [u8; 2], index: usize) -> Result<Tag, BlockError> {
    if index > 99 {
        return Err(BlockError::TagIndex(index));
    }
    Ok([
        prefix[0],
        prefix[1],
        b'0' + (index / 10) as u8,
        b'0' + (index % 10) as u8,
    ])
}
