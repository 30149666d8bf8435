//! Keyed record page: the unit of storage for node records.
//!
//! A page owns up to [`RECORDS_PER_PAGE`] records sharing one page key.
//! Live records sit in an insertion-ordered map; at commit time each record
//! is materialized either into an inline slot or, when its body exceeds
//! [`MAX_RECORD_SIZE`], into an overflow page behind a reference. The wire
//! layout interleaves two sparse slot bitmaps so a reader recovers node keys
//! without storing them per entry, and an optional Dewey section carries
//! prefix-compressed position labels ahead of the inline slots.
//!
//! Pages are not internally synchronized. The transaction layer guarantees a
//! single writer per page; `&mut` receivers on every state-changing
//! operation (including the memoizing [`KeyValuePage::get_value`]) make that
//! contract explicit.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::bytes::{put_u32, put_u64, put_var_u64, Cursor};
use crate::dewey::DeweyId;
use crate::error::{Result, SylvaError};
use crate::model::{NodeKind, Record, DOCUMENT_NODE_KEY};
use crate::page::{OverflowPage, Page, PageKind, PageReference, SerializationType, SlotBitmap};
use crate::resource::ResourceConfig;
use crate::settings::{MAX_RECORD_SIZE, RECORDS_PER_PAGE};
use crate::trx::{PageReadTrx, PageWriteTrx};

pub struct KeyValuePage {
    /// Base key of the page; records carry keys in
    /// `[page_key * RECORDS_PER_PAGE, (page_key + 1) * RECORDS_PER_PAGE)`.
    page_key: u64,
    kind: PageKind,
    /// Live records in insertion order. Shared structurally with clones and
    /// materialized privately on first mutation.
    records: Arc<IndexMap<u64, Record>>,
    /// Serialized bodies of inline records, derived by [`Self::prepare`].
    slots: Arc<IndexMap<u64, Vec<u8>>>,
    /// References to overflow pages for oversized records.
    references: Arc<IndexMap<u64, PageReference>>,
    /// Dewey-ID to node key, populated by prepare when Dewey chains are on.
    dewey_index: Arc<IndexMap<DeweyId, u64>>,
    previous_page_ref: Option<u64>,
    resource: Arc<ResourceConfig>,
    trx: Arc<dyn PageReadTrx>,
    prepared: bool,
}

impl KeyValuePage {
    /// Creates an empty page for a fresh revision.
    pub fn new(
        page_key: u64,
        kind: PageKind,
        previous_page_ref: Option<u64>,
        trx: Arc<dyn PageReadTrx>,
    ) -> Self {
        let resource = trx.resource_config();
        Self {
            page_key,
            kind,
            records: Arc::new(IndexMap::new()),
            slots: Arc::new(IndexMap::new()),
            references: Arc::new(IndexMap::new()),
            dewey_index: Arc::new(IndexMap::new()),
            previous_page_ref,
            resource,
            trx,
            prepared: false,
        }
    }

    /// Reconstructs a page from its canonical byte layout.
    pub fn from_bytes(
        cursor: &mut Cursor<'_>,
        ty: SerializationType,
        trx: Arc<dyn PageReadTrx>,
    ) -> Result<Self> {
        let page_key = cursor.read_var_u64()?;
        let resource = trx.resource_config();
        let mut records: IndexMap<u64, Record> = IndexMap::new();

        if resource.dewey_enabled() {
            let dewey_count = cursor.read_u32()? as usize;
            let mut previous: Option<DeweyId> = None;
            for _ in 0..dewey_count {
                let id = resource
                    .codec
                    .deserialize_dewey_id(cursor, previous.as_ref(), &resource)?;
                if let Some(id) = id {
                    let key = cursor.read_var_u64()?;
                    let len = cursor.read_u32()? as usize;
                    let body = cursor.read_exact(len)?;
                    let record = resource.codec.deserialize(
                        &mut Cursor::new(body),
                        key,
                        Some(id.clone()),
                        Some(trx.as_ref()),
                    )?;
                    records.insert(key, record);
                    previous = Some(id);
                }
            }
        }

        let inline_bitmap = ty.deserialize_bitmap(cursor)?;
        let overflow_bitmap = ty.deserialize_bitmap(cursor)?;

        let inline_count = cursor.read_u32()? as usize;
        let mut next_bit = 0usize;
        for _ in 0..inline_count {
            let offset = inline_bitmap.next_set_bit(next_bit).ok_or_else(|| {
                SylvaError::Corruption("inline bitmap has fewer set bits than entries".into())
            })?;
            next_bit = offset + 1;
            let key = page_key * RECORDS_PER_PAGE as u64 + offset as u64;
            let len = cursor.read_u32()? as usize;
            let body = cursor.read_exact(len)?;
            let record = resource.codec.deserialize(
                &mut Cursor::new(body),
                key,
                None,
                Some(trx.as_ref()),
            )?;
            records.insert(key, record);
        }

        let overflow_count = cursor.read_u32()? as usize;
        let mut references: IndexMap<u64, PageReference> =
            IndexMap::with_capacity(overflow_count);
        next_bit = 0;
        for _ in 0..overflow_count {
            let offset = overflow_bitmap.next_set_bit(next_bit).ok_or_else(|| {
                SylvaError::Corruption("overflow bitmap has fewer set bits than entries".into())
            })?;
            next_bit = offset + 1;
            let key = page_key * RECORDS_PER_PAGE as u64 + offset as u64;
            references.insert(key, PageReference::with_key(cursor.read_u64()?));
        }

        let previous_page_ref = if cursor.read_bool()? {
            Some(cursor.read_u64()?)
        } else {
            None
        };
        let kind = PageKind::from_byte(cursor.read_u8()?)?;

        trace!(
            page_key,
            records = records.len(),
            overflow = references.len(),
            "page.reconstruct"
        );
        Ok(Self {
            page_key,
            kind,
            records: Arc::new(records),
            slots: Arc::new(IndexMap::new()),
            references: Arc::new(references),
            dewey_index: Arc::new(IndexMap::new()),
            previous_page_ref,
            resource,
            trx,
            prepared: false,
        })
    }

    /// Copy-on-write clone sharing all map structure. The clone observes the
    /// possibly newer view of `trx`; the origin never sees clone-side
    /// mutations.
    pub fn clone_with(&self, trx: Arc<dyn PageReadTrx>) -> Self {
        Self {
            page_key: self.page_key,
            kind: self.kind,
            records: Arc::clone(&self.records),
            slots: Arc::clone(&self.slots),
            references: Arc::clone(&self.references),
            dewey_index: Arc::clone(&self.dewey_index),
            previous_page_ref: self.previous_page_ref,
            resource: Arc::clone(&self.resource),
            trx,
            prepared: self.prepared,
        }
    }

    pub fn page_key(&self) -> u64 {
        self.page_key
    }

    pub fn kind(&self) -> PageKind {
        self.kind
    }

    /// Key of the previous revision of this page, if any.
    pub fn previous_reference_key(&self) -> Option<u64> {
        self.previous_page_ref
    }

    /// Number of live records plus overflow references. Exceeds the live
    /// count until overflow records have been faulted in by
    /// [`Self::get_value`].
    pub fn size(&self) -> usize {
        self.records.len() + self.references.len()
    }

    /// Live records in insertion order. Overflow records not yet faulted in
    /// are absent.
    pub fn entries(&self) -> impl Iterator<Item = (&u64, &Record)> {
        self.records.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Serialized body of an inline record, once prepare has run.
    pub fn inline_slot(&self, key: u64) -> Option<&[u8]> {
        self.slots.get(&key).map(Vec::as_slice)
    }

    pub fn dewey_entries(&self) -> impl Iterator<Item = (&DeweyId, &u64)> {
        self.dewey_index.iter()
    }

    pub fn page_reference(&self, key: u64) -> Option<&PageReference> {
        self.references.get(&key)
    }

    pub fn reference_entries(&self) -> impl Iterator<Item = (&u64, &PageReference)> {
        self.references.iter()
    }

    /// Points `key` at an already materialized overflow page.
    pub fn set_page_reference(&mut self, key: u64, reference: PageReference) {
        debug_assert_eq!(
            key / RECORDS_PER_PAGE as u64,
            self.page_key,
            "record key outside this page"
        );
        Arc::make_mut(&mut self.references).insert(key, reference);
    }

    /// Returns the record at `key`. Records that live behind a persisted
    /// overflow reference are resolved through the page-read context and
    /// memoized; a failed resolution is reported as an absent key.
    pub fn get_value(&mut self, key: u64) -> Option<&Record> {
        if !self.records.contains_key(&key) {
            let data = match self.references.get(&key) {
                Some(reference) if reference.is_persisted() => {
                    match self.trx.read_overflow(reference) {
                        Ok(page) => page.into_data(),
                        Err(error) => {
                            debug!(
                                page_key = self.page_key,
                                record_key = key,
                                %error,
                                "page.overflow_fault_failed"
                            );
                            return None;
                        }
                    }
                }
                _ => return None,
            };
            let record =
                match self
                    .resource
                    .codec
                    .deserialize(&mut Cursor::new(&data), key, None, None)
                {
                    Ok(record) => record,
                    Err(error) => {
                        debug!(
                            page_key = self.page_key,
                            record_key = key,
                            %error,
                            "page.overflow_decode_failed"
                        );
                        return None;
                    }
                };
            Arc::make_mut(&mut self.records).insert(key, record);
        }
        self.records.get(&key)
    }

    /// Writes `record` at `key`, overwriting any prior entry, and discards
    /// state derived for that key so the next prepare re-derives it.
    pub fn set_entry(&mut self, key: u64, record: Record) {
        debug_assert_eq!(
            key / RECORDS_PER_PAGE as u64,
            self.page_key,
            "record key outside this page"
        );
        self.prepared = false;
        if self.slots.contains_key(&key) {
            Arc::make_mut(&mut self.slots).shift_remove(&key);
        }
        if self.references.contains_key(&key) {
            Arc::make_mut(&mut self.references).shift_remove(&key);
        }
        if self.dewey_index.values().any(|entry| *entry == key) {
            Arc::make_mut(&mut self.dewey_index).retain(|_, entry| *entry != key);
        }
        Arc::make_mut(&mut self.records).insert(key, record);
    }

    /// Moves every live record into exactly one of the inline slots or the
    /// overflow references, and fills the Dewey index. Invoked implicitly by
    /// [`Self::serialize`] and [`Self::commit`]; idempotent until the next
    /// mutation.
    pub fn prepare(&mut self) -> Result<()> {
        if self.prepared {
            return Ok(());
        }
        let dewey = self.resource.dewey_enabled();

        let mut work: Vec<(u64, &Record)> =
            self.records.iter().map(|(key, record)| (*key, record)).collect();
        if dewey {
            // Stable sort: Dewey-bearing records first in label order, the
            // rest keep insertion order. The root counts as label-less.
            work.sort_by(|(a_key, a), (b_key, b)| {
                let a_id = (*a_key != DOCUMENT_NODE_KEY)
                    .then(|| a.dewey_id())
                    .flatten();
                let b_id = (*b_key != DOCUMENT_NODE_KEY)
                    .then(|| b.dewey_id())
                    .flatten();
                match (a_id, b_id) {
                    (Some(a_id), Some(b_id)) => a_id.cmp(b_id),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }

        let mut inline: Vec<(u64, Option<DeweyId>, Vec<u8>)> = Vec::new();
        let mut overflow: Vec<(u64, OverflowPage)> = Vec::new();
        for (key, record) in work {
            // A key that already owns a slot or an overflow reference keeps
            // it; re-deriving a committed reference would orphan the
            // persisted page.
            if self.slots.contains_key(&key) || self.references.contains_key(&key) {
                continue;
            }
            let mut body = Vec::new();
            self.resource
                .codec
                .serialize(&mut body, record, self.trx.as_ref())?;
            if body.len() > MAX_RECORD_SIZE {
                overflow.push((key, OverflowPage::new(body)));
            } else {
                let dewey_id = (dewey && key != DOCUMENT_NODE_KEY)
                    .then(|| record.dewey_id().cloned())
                    .flatten();
                inline.push((key, dewey_id, body));
            }
        }

        for (key, page) in overflow {
            Arc::make_mut(&mut self.references).insert(key, PageReference::with_page(page));
        }
        for (key, dewey_id, body) in inline {
            if let Some(id) = dewey_id {
                Arc::make_mut(&mut self.dewey_index).insert(id, key);
            }
            Arc::make_mut(&mut self.slots).insert(key, body);
        }

        self.prepared = true;
        trace!(
            page_key = self.page_key,
            inline = self.slots.len(),
            overflow = self.references.len(),
            "page.prepare"
        );
        Ok(())
    }

    /// Writes the canonical byte layout. Byte-identical across calls until
    /// the page is mutated.
    pub fn serialize(&mut self, out: &mut Vec<u8>, ty: SerializationType) -> Result<()> {
        self.prepare()?;
        put_var_u64(out, self.page_key);

        // Dewey section: labels sorted by ascending byte length, each
        // delta-encoded against its predecessor and carrying its record
        // inline. Slots emitted here are excluded from the inline pass.
        let mut dewey_consumed: HashSet<u64> = HashSet::new();
        if self.resource.dewey_enabled() {
            put_u32(out, self.dewey_index.len() as u32);
            let mut ids: Vec<&DeweyId> = self.dewey_index.keys().collect();
            ids.sort_by_cached_key(|id| id.to_bytes().len());
            let mut previous: Option<&DeweyId> = None;
            for id in ids {
                self.resource.codec.serialize_dewey_id(
                    out,
                    NodeKind::Element,
                    id,
                    previous,
                    &self.resource,
                )?;
                let key = *self.dewey_index.get(id).expect("id taken from key iteration");
                put_var_u64(out, key);
                let body = self.slots.get(&key).ok_or_else(|| {
                    SylvaError::Corruption("dewey index entry without an inline slot".into())
                })?;
                put_u32(out, body.len() as u32);
                out.extend_from_slice(body);
                dewey_consumed.insert(key);
                previous = Some(id);
            }
        }

        let mut inline_keys: Vec<u64> = self
            .slots
            .keys()
            .copied()
            .filter(|key| !dewey_consumed.contains(key))
            .collect();
        inline_keys.sort_unstable();
        let mut inline_bitmap = SlotBitmap::new();
        for key in &inline_keys {
            inline_bitmap.set(self.trx.record_page_offset(*key));
        }

        let mut overflow_keys: Vec<u64> = self.references.keys().copied().collect();
        overflow_keys.sort_unstable();
        let mut overflow_bitmap = SlotBitmap::new();
        for key in &overflow_keys {
            overflow_bitmap.set(self.trx.record_page_offset(*key));
        }

        ty.serialize_bitmap(out, &inline_bitmap);
        ty.serialize_bitmap(out, &overflow_bitmap);

        put_u32(out, inline_keys.len() as u32);
        for key in &inline_keys {
            let body = &self.slots[key];
            put_u32(out, body.len() as u32);
            out.extend_from_slice(body);
        }

        put_u32(out, overflow_keys.len() as u32);
        for key in &overflow_keys {
            put_u64(out, self.references[key].key());
        }

        match self.previous_page_ref {
            Some(key) => {
                out.push(1);
                put_u64(out, key);
            }
            None => out.push(0),
        }
        out.push(self.kind.to_byte());

        trace!(page_key = self.page_key, bytes = out.len(), "page.serialize");
        Ok(())
    }

    /// Prepares if needed, then hands every reference still owning an
    /// unpersisted overflow page to the write context. The caller must make
    /// those pages durable before this page itself.
    pub fn commit(&mut self, trx: &mut dyn PageWriteTrx) -> Result<()> {
        self.prepare()?;
        let page_key = self.page_key;
        let references = Arc::make_mut(&mut self.references);
        for (key, reference) in references.iter_mut() {
            if reference.page().is_some() {
                trace!(page_key, record_key = *key, "page.commit_overflow");
                trx.commit_reference(reference)?;
            }
        }
        Ok(())
    }
}

impl Page for KeyValuePage {
    fn serialize(&mut self, out: &mut Vec<u8>, ty: SerializationType) -> Result<()> {
        KeyValuePage::serialize(self, out, ty)
    }
}

impl PartialEq for KeyValuePage {
    fn eq(&self, other: &Self) -> bool {
        self.page_key == other.page_key
            && self.records == other.records
            && self.references == other.references
    }
}

impl fmt::Debug for KeyValuePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValuePage")
            .field("page_key", &self.page_key)
            .field("kind", &self.kind)
            .field("records", &self.records)
            .field("references", &self.references)
            .field("previous_page_ref", &self.previous_page_ref)
            .finish()
    }
}
