//! Hierarchical Dewey-ID labels.
//!
//! A Dewey-ID names a node's position in the document tree as the list of
//! sibling divisions on the path from the root. Ancestry and document order
//! checks reduce to prefix and lexicographic comparisons over the divisions.

use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;

use crate::bytes::{put_var_u64, Cursor};
use crate::error::Result;

/// Most real-world documents nest shallowly, so the divisions stay inline.
type Divisions = SmallVec<[u32; 8]>;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DeweyId {
    divisions: Divisions,
}

impl DeweyId {
    pub fn new(divisions: &[u32]) -> Self {
        Self {
            divisions: SmallVec::from_slice(divisions),
        }
    }

    /// The label of the document root.
    pub fn root() -> Self {
        Self::new(&[1])
    }

    pub fn divisions(&self) -> &[u32] {
        &self.divisions
    }

    /// Tree depth, i.e. the number of divisions.
    pub fn level(&self) -> usize {
        self.divisions.len()
    }

    /// Returns true if `self` labels an ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &DeweyId) -> bool {
        self.divisions.len() < other.divisions.len()
            && other.divisions[..self.divisions.len()] == self.divisions[..]
    }

    /// Number of leading divisions shared with `other`.
    pub fn common_prefix_len(&self, other: &DeweyId) -> usize {
        self.divisions
            .iter()
            .zip(other.divisions.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Canonical byte form: each division as an unsigned varint. Deeper or
    /// larger-division labels never encode shorter than their prefixes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.divisions.len());
        for division in &self.divisions {
            put_var_u64(&mut out, u64::from(*division));
        }
        out
    }

    /// Parses the canonical byte form produced by [`DeweyId::to_bytes`],
    /// consuming the cursor to its end.
    pub fn from_bytes(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut divisions = Divisions::new();
        while !cursor.is_empty() {
            let division = cursor.read_var_u64()?;
            let division = u32::try_from(division).map_err(|_| {
                crate::error::SylvaError::Corruption("dewey division exceeds u32".into())
            })?;
            divisions.push(division);
        }
        Ok(Self { divisions })
    }
}

impl Ord for DeweyId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.divisions.cmp(&other.divisions)
    }
}

impl PartialOrd for DeweyId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for DeweyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeweyId(")?;
        for (i, division) in self.divisions.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{division}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for DeweyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, division) in self.divisions.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{division}")?;
        }
        Ok(())
    }
}
