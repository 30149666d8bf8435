#![forbid(unsafe_code)]
//! Record-page layer of a versioned tree-document store.
//!
//! Documents are persisted as addressable node graphs; this crate owns the
//! page that groups node records on disk: its binary format, overflow
//! handling for oversized records, optional prefix-compressed Dewey-ID
//! chains, and the copy-on-write contract a page honors during revision
//! commit. Index trees, transaction managers, and caching live above and
//! reach this layer only through the contracts in [`trx`].

pub mod bytes;
pub mod codec;
pub mod dewey;
pub mod error;
pub mod model;
pub mod page;
pub mod resource;
pub mod settings;
pub mod trx;

pub use crate::codec::{NodeCodec, RecordCodec};
pub use crate::dewey::DeweyId;
pub use crate::error::{Result, SylvaError};
pub use crate::model::{NodeKind, Record, DOCUMENT_NODE_KEY};
pub use crate::page::{
    IndexedPage, KeyValuePage, OverflowPage, Page, PageKind, PageReference, SerializationType,
    SlotBitmap,
};
pub use crate::resource::ResourceConfig;
pub use crate::settings::{MAX_RECORD_SIZE, NULL_ID, RECORDS_PER_PAGE};
pub use crate::trx::{PageReadTrx, PageWriteTrx};
