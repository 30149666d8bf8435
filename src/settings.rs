//! Format constants shared by the record-page layer.
//!
//! Both constants below are part of the on-disk format contract and are
//! versioned with the overall storage format.

/// Number of record slots per key-value page.
///
/// A record with node key `k` lives on the page with page key
/// `k / RECORDS_PER_PAGE` at offset `k % RECORDS_PER_PAGE`.
pub const RECORDS_PER_PAGE: usize = 512;

/// Upper bound for a record body stored inline in its page. Larger bodies
/// are flushed to an overflow page and referenced instead.
pub const MAX_RECORD_SIZE: usize = 4096;

/// Sentinel for "no persistent key assigned".
pub const NULL_ID: u64 = u64::MAX;

/// Returns the page key of the page a node key belongs to.
pub fn record_page_key(node_key: u64) -> u64 {
    node_key / RECORDS_PER_PAGE as u64
}

/// Returns the slot offset of a node key within its page.
pub fn record_page_offset(node_key: u64) -> usize {
    (node_key % RECORDS_PER_PAGE as u64) as usize
}
