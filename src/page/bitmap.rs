//! Fixed-width slot bitmap for the sparse page layout.
//!
//! One bit per record slot. The wire form is a length-prefixed byte array in
//! LSB-first bit order with trailing zero bytes trimmed, so sparse pages pay
//! only for the slots they use.

use crate::bytes::{put_u32, Cursor};
use crate::error::{Result, SylvaError};
use crate::settings::RECORDS_PER_PAGE;

const WORDS: usize = RECORDS_PER_PAGE / 64;
const MAX_WIRE_BYTES: usize = RECORDS_PER_PAGE / 8;

#[derive(Clone, PartialEq, Eq)]
pub struct SlotBitmap {
    words: [u64; WORDS],
}

impl SlotBitmap {
    pub fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    pub fn set(&mut self, bit: usize) {
        assert!(bit < RECORDS_PER_PAGE, "slot offset out of range: {bit}");
        self.words[bit / 64] |= 1 << (bit % 64);
    }

    pub fn get(&self, bit: usize) -> bool {
        assert!(bit < RECORDS_PER_PAGE, "slot offset out of range: {bit}");
        self.words[bit / 64] & (1 << (bit % 64)) != 0
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Index of the first set bit at or after `from`, if any.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        if from >= RECORDS_PER_PAGE {
            return None;
        }
        let mut word_index = from / 64;
        let mut word = self.words[word_index] & (!0u64 << (from % 64));
        loop {
            if word != 0 {
                return Some(word_index * 64 + word.trailing_zeros() as usize);
            }
            word_index += 1;
            if word_index == WORDS {
                return None;
            }
            word = self.words[word_index];
        }
    }

    /// Canonical wire form: u32 byte count, then the bitmap bytes with
    /// trailing zeros trimmed.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let mut bytes = [0u8; MAX_WIRE_BYTES];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (self.words[i / 8] >> ((i % 8) * 8)) as u8;
        }
        let used = MAX_WIRE_BYTES - bytes.iter().rev().take_while(|b| **b == 0).count();
        put_u32(out, used as u32);
        out.extend_from_slice(&bytes[..used]);
    }

    pub fn read_from(cursor: &mut Cursor<'_>) -> Result<Self> {
        let len = cursor.read_u32()? as usize;
        if len > MAX_WIRE_BYTES {
            return Err(SylvaError::Corruption(format!(
                "slot bitmap length {len} exceeds {MAX_WIRE_BYTES} bytes"
            )));
        }
        let bytes = cursor.read_exact(len)?;
        let mut bitmap = Self::new();
        for (i, byte) in bytes.iter().enumerate() {
            bitmap.words[i / 8] |= u64::from(*byte) << ((i % 8) * 8);
        }
        Ok(bitmap)
    }
}

impl Default for SlotBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SlotBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut set = f.debug_list();
        let mut bit = self.next_set_bit(0);
        while let Some(index) = bit {
            set.entry(&index);
            bit = self.next_set_bit(index + 1);
        }
        set.finish()
    }
}
