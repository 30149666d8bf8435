//! Page variants and shared page metadata of the record store.
//!
//! Keyed pages ([`KeyValuePage`]) address their contents by node key and
//! never expose positional reference slots; those belong to the indexed
//! pages of the surrounding trees ([`IndexedPage`]). The split is a
//! compile-time property, not a runtime error.

pub mod bitmap;
pub mod keyvalue;
pub mod overflow;

pub use bitmap::SlotBitmap;
pub use keyvalue::KeyValuePage;
pub use overflow::OverflowPage;

use crate::bytes::Cursor;
use crate::error::{Result, SylvaError};
use crate::settings::NULL_ID;

/// Which subtree of the resource a record page belongs to.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PageKind {
    NodePage = 0x01,
    PathSummaryPage = 0x02,
    TextValuePage = 0x03,
    AttributeValuePage = 0x04,
}

impl PageKind {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Self::NodePage),
            0x02 => Ok(Self::PathSummaryPage),
            0x03 => Ok(Self::TextValuePage),
            0x04 => Ok(Self::AttributeValuePage),
            other => Err(SylvaError::Corruption(format!(
                "unknown page kind: 0x{other:02X}"
            ))),
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A pointer to another page: a persistent key once the target is durable,
/// and the in-memory page while it still awaits commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageReference {
    key: u64,
    page: Option<OverflowPage>,
}

impl PageReference {
    pub fn new() -> Self {
        Self {
            key: NULL_ID,
            page: None,
        }
    }

    pub fn with_key(key: u64) -> Self {
        Self { key, page: None }
    }

    pub fn with_page(page: OverflowPage) -> Self {
        Self {
            key: NULL_ID,
            page: Some(page),
        }
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn set_key(&mut self, key: u64) {
        self.key = key;
    }

    pub fn page(&self) -> Option<&OverflowPage> {
        self.page.as_ref()
    }

    pub fn set_page(&mut self, page: OverflowPage) {
        self.page = Some(page);
    }

    pub fn take_page(&mut self) -> Option<OverflowPage> {
        self.page.take()
    }

    pub fn is_persisted(&self) -> bool {
        self.key != NULL_ID
    }
}

impl Default for PageReference {
    fn default() -> Self {
        Self::new()
    }
}

/// Target a page is serialized for. Both targets share the canonical
/// bit-set form below; they differ one level up, in how page references are
/// laid out by the surrounding write machinery.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SerializationType {
    Data,
    TransactionIntentLog,
}

impl SerializationType {
    pub fn serialize_bitmap(self, out: &mut Vec<u8>, bitmap: &SlotBitmap) {
        bitmap.write_to(out);
    }

    pub fn deserialize_bitmap(self, cursor: &mut Cursor<'_>) -> Result<SlotBitmap> {
        SlotBitmap::read_from(cursor)
    }
}

/// Operations shared by every page variant.
pub trait Page {
    /// Writes the canonical byte layout. Takes `&mut self` because keyed
    /// pages derive their slot state lazily on first serialization.
    fn serialize(&mut self, out: &mut Vec<u8>, ty: SerializationType) -> Result<()>;
}

/// Positional reference slots of the non-keyed pages (tree roots, indirect
/// pages). Keyed pages do not implement this trait: addressing them by slot
/// position is a type error, not a runtime failure.
pub trait IndexedPage: Page {
    fn references(&self) -> &[PageReference];

    fn reference(&self, offset: usize) -> Option<&PageReference>;

    fn set_reference(&mut self, offset: usize, reference: PageReference);
}
