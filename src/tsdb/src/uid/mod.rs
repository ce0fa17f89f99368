use std::fmt::{Display, Formatter};

use crate::error::Result;

pub mod memory;

/// UniqueIdKind identifies one of the three name spaces ids are allocated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniqueIdKind {
    Metric,
    TagKey,
    TagValue,
}

impl UniqueIdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueIdKind::Metric => "metrics",
            UniqueIdKind::TagKey => "tagk",
            UniqueIdKind::TagValue => "tagv",
        }
    }
}

impl Display for UniqueIdKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UniqueIdResolver maps names to fixed-width binary ids.
///
/// Ids returned for a kind always have exactly `width(kind)` bytes.
pub trait UniqueIdResolver: Send + Sync {
    fn width(&self, kind: UniqueIdKind) -> usize;

    /// get_or_create_id returns the id of `name`, allocating one on first use.
    fn get_or_create_id(&self, kind: UniqueIdKind, name: &str) -> Result<Vec<u8>>;

    /// get_id returns the id of `name` without allocating.
    fn get_id(&self, kind: UniqueIdKind, name: &str) -> Result<Option<Vec<u8>>>;

    /// get_name is the reverse lookup of an id.
    fn get_name(&self, kind: UniqueIdKind, id: &[u8]) -> Result<Option<String>>;
}
