//! Overflow page: the escape hatch for records too large to store inline.

use std::fmt;

use crate::error::Result;
use crate::page::{Page, SerializationType};

/// A flat byte container holding the serialized body of exactly one record.
/// It carries no metadata of its own; its identity is the persistent key of
/// the reference pointing at it.
#[derive(Clone, PartialEq, Eq)]
pub struct OverflowPage {
    data: Vec<u8>,
}

impl OverflowPage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Page for OverflowPage {
    fn serialize(&mut self, out: &mut Vec<u8>, _ty: SerializationType) -> Result<()> {
        out.extend_from_slice(&self.data);
        Ok(())
    }
}

impl fmt::Debug for OverflowPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverflowPage")
            .field("len", &self.data.len())
            .finish()
    }
}
