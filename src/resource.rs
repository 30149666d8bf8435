//! Immutable per-resource configuration bound to every page at construction.

use std::fmt;
use std::sync::Arc;

use crate::codec::{NodeCodec, RecordCodec};

/// Resource-level settings the record-page layer depends on: whether the
/// resource stores Dewey-IDs and which codec materializes record bodies.
#[derive(Clone)]
pub struct ResourceConfig {
    pub store_dewey_ids: bool,
    pub codec: Arc<dyn RecordCodec>,
}

impl ResourceConfig {
    pub fn new(codec: Arc<dyn RecordCodec>) -> Self {
        Self {
            store_dewey_ids: false,
            codec,
        }
    }

    pub fn with_dewey_ids(mut self, store_dewey_ids: bool) -> Self {
        self.store_dewey_ids = store_dewey_ids;
        self
    }

    /// Dewey chains are materialized only when the resource stores them AND
    /// the codec knows how to encode them.
    pub fn dewey_enabled(&self) -> bool {
        self.store_dewey_ids && self.codec.supports_dewey_ids()
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self::new(Arc::new(NodeCodec))
    }
}

impl fmt::Debug for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceConfig")
            .field("store_dewey_ids", &self.store_dewey_ids)
            .field("codec_supports_dewey_ids", &self.codec.supports_dewey_ids())
            .finish()
    }
}
