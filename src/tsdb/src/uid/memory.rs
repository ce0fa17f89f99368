use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::TsdbConfig;
use crate::error::{Result, TsdbError};
use crate::uid::{UniqueIdKind, UniqueIdResolver};

struct IdSpace {
    width: usize,
    next: AtomicU64,
    /// forward: map<name, id>
    ids: DashMap<String, Vec<u8>>,
    /// reverse: map<id, name>
    names: DashMap<Vec<u8>, String>,
}

impl IdSpace {
    fn new(width: usize) -> Self {
        Self {
            width,
            next: AtomicU64::new(1),
            ids: DashMap::new(),
            names: DashMap::new(),
        }
    }

    fn max_id(&self) -> u64 {
        if self.width >= 8 {
            u64::MAX
        } else {
            (1_u64 << (self.width * 8)) - 1
        }
    }

    fn allocate(&self, kind: UniqueIdKind) -> Result<Vec<u8>> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        if id > self.max_id() {
            return Err(TsdbError::UidExhausted {
                kind,
                width: self.width,
            });
        }
        Ok(id.to_be_bytes()[8 - self.width..].to_vec())
    }
}

/// MemoryUniqueIds allocates sequential ids per kind and keeps both directions in memory.
pub struct MemoryUniqueIds {
    metrics: IdSpace,
    tag_names: IdSpace,
    tag_values: IdSpace,
}

impl MemoryUniqueIds {
    pub fn new(metric_width: usize, tag_name_width: usize, tag_value_width: usize) -> Self {
        Self {
            metrics: IdSpace::new(metric_width),
            tag_names: IdSpace::new(tag_name_width),
            tag_values: IdSpace::new(tag_value_width),
        }
    }

    pub fn from_config(config: &TsdbConfig) -> Self {
        Self::new(
            config.metric_width,
            config.tag_name_width,
            config.tag_value_width,
        )
    }

    fn space(&self, kind: UniqueIdKind) -> &IdSpace {
        match kind {
            UniqueIdKind::Metric => &self.metrics,
            UniqueIdKind::TagKey => &self.tag_names,
            UniqueIdKind::TagValue => &self.tag_values,
        }
    }

    /// len returns how many names of `kind` have an id.
    pub fn len(&self, kind: UniqueIdKind) -> usize {
        self.space(kind).ids.len()
    }
}

impl UniqueIdResolver for MemoryUniqueIds {
    fn width(&self, kind: UniqueIdKind) -> usize {
        self.space(kind).width
    }

    fn get_or_create_id(&self, kind: UniqueIdKind, name: &str) -> Result<Vec<u8>> {
        let space = self.space(kind);
        if let Some(id) = space.ids.get(name) {
            return Ok(id.value().clone());
        }

        match space.ids.entry(name.to_string()) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                let id = space.allocate(kind)?;
                space.names.insert(id.clone(), name.to_string());
                e.insert(id.clone());
                tracing::debug!(kind = kind.as_str(), name, "assigned new id");
                Ok(id)
            }
        }
    }

    fn get_id(&self, kind: UniqueIdKind, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.space(kind).ids.get(name).map(|id| id.value().clone()))
    }

    fn get_name(&self, kind: UniqueIdKind, id: &[u8]) -> Result<Option<String>> {
        Ok(self.space(kind).names.get(id).map(|n| n.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use crate::error::TsdbError;
    use crate::uid::memory::MemoryUniqueIds;
    use crate::uid::{UniqueIdKind, UniqueIdResolver};

    #[test]
    fn test_sequential_fixed_width_ids() {
        let uids = MemoryUniqueIds::new(3, 3, 3);
        let a = uids.get_or_create_id(UniqueIdKind::Metric, "sys.cpu").unwrap();
        let b = uids.get_or_create_id(UniqueIdKind::Metric, "sys.mem").unwrap();
        assert_eq!(a, vec![0, 0, 1]);
        assert_eq!(b, vec![0, 0, 2]);

        // same name, same id
        let again = uids.get_or_create_id(UniqueIdKind::Metric, "sys.cpu").unwrap();
        assert_eq!(again, a);

        // kinds have separate spaces
        let k = uids.get_or_create_id(UniqueIdKind::TagKey, "sys.cpu").unwrap();
        assert_eq!(k, vec![0, 0, 1]);

        assert_eq!(
            uids.get_name(UniqueIdKind::Metric, &b).unwrap(),
            Some("sys.mem".to_string())
        );
        assert_eq!(uids.len(UniqueIdKind::Metric), 2);
    }

    #[test]
    fn test_lookup_only() {
        let uids = MemoryUniqueIds::new(3, 3, 3);
        assert_eq!(uids.get_id(UniqueIdKind::Metric, "nope").unwrap(), None);
        assert_eq!(uids.len(UniqueIdKind::Metric), 0);

        uids.get_or_create_id(UniqueIdKind::Metric, "yes").unwrap();
        assert_eq!(
            uids.get_id(UniqueIdKind::Metric, "yes").unwrap(),
            Some(vec![0, 0, 1])
        );
    }

    #[test]
    fn test_exhausted() {
        let uids = MemoryUniqueIds::new(1, 1, 1);
        for i in 0..255 {
            uids.get_or_create_id(UniqueIdKind::TagValue, &format!("v{}", i))
                .unwrap();
        }
        let r = uids.get_or_create_id(UniqueIdKind::TagValue, "one-too-many");
        assert!(matches!(
            r,
            Err(TsdbError::UidExhausted {
                kind: UniqueIdKind::TagValue,
                width: 1
            })
        ));
    }

    #[test]
    fn test_concurrent_create_is_unique() {
        let uids = Arc::new(MemoryUniqueIds::new(3, 3, 3));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let uids = uids.clone();
                thread::spawn(move || {
                    (0..100)
                        .map(|i| {
                            uids.get_or_create_id(UniqueIdKind::TagValue, &format!("host{}", i))
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<Vec<u8>>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
        assert_eq!(uids.len(UniqueIdKind::TagValue), 100);
    }
}
