//! The record unit stored on key-value pages.
//!
//! The page layer treats the record body as opaque bytes; the kind tag names
//! which node variant the body encodes so the layers above can dispatch
//! without open inheritance.

use crate::dewey::DeweyId;
use crate::error::{Result, SylvaError};

/// Node key of the document root. The root never carries a Dewey index entry.
pub const DOCUMENT_NODE_KEY: u64 = 0;

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NodeKind {
    Document = 0x00,
    Element = 0x01,
    Attribute = 0x02,
    Text = 0x03,
    Object = 0x04,
    ObjectKey = 0x05,
    Array = 0x06,
    StringValue = 0x07,
    NumberValue = 0x08,
    BooleanValue = 0x09,
    NullValue = 0x0A,
}

impl NodeKind {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::Document),
            0x01 => Ok(Self::Element),
            0x02 => Ok(Self::Attribute),
            0x03 => Ok(Self::Text),
            0x04 => Ok(Self::Object),
            0x05 => Ok(Self::ObjectKey),
            0x06 => Ok(Self::Array),
            0x07 => Ok(Self::StringValue),
            0x08 => Ok(Self::NumberValue),
            0x09 => Ok(Self::BooleanValue),
            0x0A => Ok(Self::NullValue),
            other => Err(SylvaError::Corruption(format!(
                "unknown node kind: 0x{other:02X}"
            ))),
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A single node record: a stable key, a kind tag, an optional hierarchical
/// position label, and an opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    node_key: u64,
    kind: NodeKind,
    dewey_id: Option<DeweyId>,
    value: Vec<u8>,
}

impl Record {
    pub fn new(node_key: u64, kind: NodeKind, value: Vec<u8>) -> Self {
        Self {
            node_key,
            kind,
            dewey_id: None,
            value,
        }
    }

    pub fn with_dewey_id(mut self, dewey_id: DeweyId) -> Self {
        self.dewey_id = Some(dewey_id);
        self
    }

    pub fn node_key(&self) -> u64 {
        self.node_key
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn dewey_id(&self) -> Option<&DeweyId> {
        self.dewey_id.as_ref()
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }
}
