//! Contracts between the record-page layer and the transaction machinery.
//!
//! Pages never touch storage directly. Reads go through [`PageReadTrx`]
//! (overflow resolution, resource configuration, offset computation) and
//! commit goes through [`PageWriteTrx`]. The transaction layer also owns all
//! synchronization: a page is mutated by at most one writer at a time.

use std::sync::Arc;

use crate::error::Result;
use crate::model::Record;
use crate::page::{OverflowPage, PageKind, PageReference};
use crate::resource::ResourceConfig;
use crate::settings;

pub trait PageReadTrx {
    /// The configuration of the resource this transaction reads.
    fn resource_config(&self) -> Arc<ResourceConfig>;

    /// Resolves an overflow reference to the page it points at.
    fn read_overflow(&self, reference: &PageReference) -> Result<OverflowPage>;

    /// Slot offset of a node key within its page. Deterministic; used while
    /// serializing to compute bitmap positions.
    fn record_page_offset(&self, key: u64) -> usize {
        settings::record_page_offset(key)
    }

    /// Record lookup for the layers above the page. The page itself never
    /// calls this.
    fn record(&self, key: u64, kind: PageKind, index: u32) -> Result<Option<Record>>;
}

pub trait PageWriteTrx: PageReadTrx {
    /// Durably persists the page owned by `reference` and assigns its
    /// persistent key. A key-value page calls this once per overflow
    /// reference that still owns an unpersisted page, before the page itself
    /// becomes durable.
    fn commit_reference(&mut self, reference: &mut PageReference) -> Result<()>;
}
