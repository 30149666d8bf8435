//! Record serialization seam.
//!
//! A [`RecordCodec`] turns records into bytes and back, given the frame data
//! (node key, optional Dewey-ID) the surrounding page supplies. Codecs that
//! understand Dewey-IDs additionally encode prefix-compressed Dewey chains.

use crate::bytes::{put_var_u64, Cursor};
use crate::dewey::DeweyId;
use crate::error::{Result, SylvaError};
use crate::model::{NodeKind, Record};
use crate::resource::ResourceConfig;
use crate::trx::PageReadTrx;

pub trait RecordCodec: Send + Sync {
    /// Writes the record body. Implementations may consult the page-read
    /// context, e.g. for name-dictionary lookups.
    fn serialize(
        &self,
        out: &mut Vec<u8>,
        record: &Record,
        trx: &dyn PageReadTrx,
    ) -> Result<()>;

    /// Reads a record body previously written by this codec. The node key
    /// and optional Dewey-ID come from the page frame and are authoritative.
    /// The context is absent when decoding an overflow body outside a page
    /// frame.
    fn deserialize(
        &self,
        cursor: &mut Cursor<'_>,
        node_key: u64,
        dewey_id: Option<DeweyId>,
        trx: Option<&dyn PageReadTrx>,
    ) -> Result<Record>;

    /// Whether this codec can encode Dewey-ID chains. Pages treat a codec
    /// without this capability exactly like a Dewey-disabled resource.
    fn supports_dewey_ids(&self) -> bool {
        false
    }

    /// Writes `current` delta-encoded against `previous` (`None` for the
    /// first element of a chain).
    fn serialize_dewey_id(
        &self,
        out: &mut Vec<u8>,
        kind: NodeKind,
        current: &DeweyId,
        previous: Option<&DeweyId>,
        config: &ResourceConfig,
    ) -> Result<()> {
        let _ = (out, kind, current, previous, config);
        Err(SylvaError::UnsupportedFeature("dewey id chains"))
    }

    /// Reads the next Dewey-ID of a chain, delta-decoded against `previous`.
    fn deserialize_dewey_id(
        &self,
        cursor: &mut Cursor<'_>,
        previous: Option<&DeweyId>,
        config: &ResourceConfig,
    ) -> Result<Option<DeweyId>> {
        let _ = (cursor, previous, config);
        Err(SylvaError::UnsupportedFeature("dewey id chains"))
    }
}

/// The production codec for node records: a kind tag followed by the
/// length-prefixed opaque body. Dewey chains use common-prefix deltas.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeCodec;

impl RecordCodec for NodeCodec {
    fn serialize(
        &self,
        out: &mut Vec<u8>,
        record: &Record,
        _trx: &dyn PageReadTrx,
    ) -> Result<()> {
        out.push(record.kind().to_byte());
        put_var_u64(out, record.value().len() as u64);
        out.extend_from_slice(record.value());
        Ok(())
    }

    fn deserialize(
        &self,
        cursor: &mut Cursor<'_>,
        node_key: u64,
        dewey_id: Option<DeweyId>,
        _trx: Option<&dyn PageReadTrx>,
    ) -> Result<Record> {
        let kind = NodeKind::from_byte(cursor.read_u8()?)?;
        let len = cursor.read_var_u64()? as usize;
        let value = cursor.read_exact(len)?.to_vec();
        cursor.ensure_consumed()?;
        let record = Record::new(node_key, kind, value);
        Ok(match dewey_id {
            Some(id) => record.with_dewey_id(id),
            None => record,
        })
    }

    fn supports_dewey_ids(&self) -> bool {
        true
    }

    fn serialize_dewey_id(
        &self,
        out: &mut Vec<u8>,
        _kind: NodeKind,
        current: &DeweyId,
        previous: Option<&DeweyId>,
        config: &ResourceConfig,
    ) -> Result<()> {
        if !config.store_dewey_ids {
            return Ok(());
        }
        let prefix = previous.map_or(0, |prev| prev.common_prefix_len(current));
        let suffix = &current.divisions()[prefix..];
        put_var_u64(out, prefix as u64);
        put_var_u64(out, suffix.len() as u64);
        for division in suffix {
            put_var_u64(out, u64::from(*division));
        }
        Ok(())
    }

    fn deserialize_dewey_id(
        &self,
        cursor: &mut Cursor<'_>,
        previous: Option<&DeweyId>,
        config: &ResourceConfig,
    ) -> Result<Option<DeweyId>> {
        if !config.store_dewey_ids {
            return Ok(None);
        }
        let prefix = cursor.read_var_u64()? as usize;
        let suffix_len = cursor.read_var_u64()? as usize;
        let mut divisions = match previous {
            Some(prev) => {
                if prefix > prev.level() {
                    return Err(SylvaError::Corruption(
                        "dewey delta prefix exceeds previous id".into(),
                    ));
                }
                prev.divisions()[..prefix].to_vec()
            }
            None => {
                if prefix != 0 {
                    return Err(SylvaError::Corruption(
                        "dewey delta without a previous id".into(),
                    ));
                }
                Vec::new()
            }
        };
        divisions.reserve(suffix_len);
        for _ in 0..suffix_len {
            let division = cursor.read_var_u64()?;
            let division = u32::try_from(division)
                .map_err(|_| SylvaError::Corruption("dewey division exceeds u32".into()))?;
            divisions.push(division);
        }
        Ok(Some(DeweyId::new(&divisions)))
    }
}
