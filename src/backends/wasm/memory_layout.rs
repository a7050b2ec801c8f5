//! Heap object layouts.
//!
//! All objects are sequences of 4 byte words allocated from the bump heap.
//!
//! ```text
//! instance  [field0, field1, ...]
//! list      [tag = 1, size, bound, elem0, elem1, ...]
//! tuple     [elem0, elem1, ...]
//! string    [length, char0, char1, ...]
//! dict      [tag = 3, size, bound, key0, value0, key1, value1, ...]
//! bigint    [signed limb count, limb0, limb1, ...]
//! ```

use crate::settings::WORD_SIZE;

/// Byte offset of the word at `index`
pub const fn word_offset(index: u32) -> u32 {
    index * WORD_SIZE
}

/// Class instances have no header, field `n` is word `n`
pub struct InstanceLayout;

impl InstanceLayout {
    pub const fn field_offset(field_index: u32) -> u32 {
        word_offset(field_index)
    }

    pub const fn allocation_size(field_count: u32) -> u32 {
        word_offset(field_count)
    }
}

pub struct ListLayout;

impl ListLayout {
    pub const TAG: i32 = 1;
    pub const TAG_OFFSET: u32 = 0;
    pub const SIZE_OFFSET: u32 = 4;
    pub const BOUND_OFFSET: u32 = 8;
    pub const HEADER_SIZE: u32 = 12;

    pub const fn element_offset(index: u32) -> u32 {
        Self::HEADER_SIZE + word_offset(index)
    }

    /// Header plus room for `bound` elements
    pub const fn allocation_size(bound: u32) -> u32 {
        word_offset(bound + 3)
    }
}

pub struct TupleLayout;

impl TupleLayout {
    pub const fn element_offset(index: u32) -> u32 {
        word_offset(index)
    }

    pub const fn allocation_size(arity: u32) -> u32 {
        word_offset(arity)
    }
}

/// One word per Unicode scalar value
pub struct StringLayout;

impl StringLayout {
    pub const LENGTH_OFFSET: u32 = 0;
    pub const HEADER_SIZE: u32 = 4;

    pub const fn char_offset(index: u32) -> u32 {
        Self::HEADER_SIZE + word_offset(index)
    }

    pub const fn allocation_size(length: u32) -> u32 {
        word_offset(length + 1)
    }
}

pub struct DictLayout;

impl DictLayout {
    pub const TAG: i32 = 3;
    pub const TAG_OFFSET: u32 = 0;
    pub const SIZE_OFFSET: u32 = 4;
    pub const BOUND_OFFSET: u32 = 8;
    pub const HEADER_SIZE: u32 = 12;
    pub const ENTRY_SIZE: u32 = 8;

    pub const fn key_offset(entry: u32) -> u32 {
        Self::HEADER_SIZE + entry * Self::ENTRY_SIZE
    }

    pub const fn value_offset(entry: u32) -> u32 {
        Self::key_offset(entry) + WORD_SIZE
    }

    pub const fn allocation_size(bound: u32) -> u32 {
        Self::HEADER_SIZE + bound * Self::ENTRY_SIZE
    }
}

/// Sign and magnitude, base 2^32 little endian limbs.
/// The count word is negative for negative numbers and 0 for zero.
pub struct BigintLayout;

impl BigintLayout {
    pub const COUNT_OFFSET: u32 = 0;
    pub const HEADER_SIZE: u32 = 4;

    pub const fn limb_offset(index: u32) -> u32 {
        Self::HEADER_SIZE + word_offset(index)
    }

    pub const fn allocation_size(limbs: u32) -> u32 {
        word_offset(limbs + 1)
    }
}
