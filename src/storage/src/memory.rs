use std::collections::{BTreeMap, HashMap};
use std::str::from_utf8;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::flush::FlushInterval;
use crate::request::{AppendRequest, PutRequest};
use crate::StoreClient;

/// Row maps qualifiers to cell values, sorted by qualifier bytes.
pub type Row = BTreeMap<Bytes, Bytes>;

struct Table {
    family: Bytes,
    rows: BTreeMap<Bytes, Row>,
}

/// MemoryStore is a sorted, in-process store with a single column family per table.
pub struct MemoryStore {
    tables: RwLock<HashMap<Bytes, Table>>,
    flush_interval: FlushInterval,

    durable_writes: AtomicU64,
    deferred_writes: AtomicU64,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_flush_interval(FlushInterval::default())
    }

    pub fn with_flush_interval(flush_interval: FlushInterval) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            flush_interval,
            durable_writes: AtomicU64::new(0),
            deferred_writes: AtomicU64::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub async fn create_table(&self, table: impl Into<Bytes>, family: impl Into<Bytes>) {
        let mut inner = self.tables.write().await;
        inner.entry(table.into()).or_insert_with(|| Table {
            family: family.into(),
            rows: BTreeMap::new(),
        });
    }

    /// set_fail_writes makes every following put/append fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn durable_writes(&self) -> u64 {
        self.durable_writes.load(Ordering::SeqCst)
    }

    pub fn deferred_writes(&self) -> u64 {
        self.deferred_writes.load(Ordering::SeqCst)
    }

    pub async fn row(&self, table: &[u8], key: &[u8]) -> Option<Row> {
        let inner = self.tables.read().await;
        inner.get(table).and_then(|t| t.rows.get(key).cloned())
    }

    pub async fn row_count(&self, table: &[u8]) -> usize {
        let inner = self.tables.read().await;
        inner.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    /// rows returns a snapshot of the table in key order.
    pub async fn rows(&self, table: &[u8]) -> Vec<(Bytes, Row)> {
        let inner = self.tables.read().await;
        inner
            .get(table)
            .map(|t| {
                t.rows
                    .iter()
                    .map(|(k, r)| (k.clone(), r.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("store is failing writes".to_string()));
        }
        Ok(())
    }

    fn record(&self, durable: bool) {
        if durable {
            self.durable_writes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.deferred_writes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'a>(
    tables: &'a mut HashMap<Bytes, Table>,
    table: &Bytes,
    family: &Bytes,
) -> Result<&'a mut Table, StoreError> {
    let t = tables
        .get_mut(table)
        .ok_or_else(|| StoreError::TableNotFound(lossy(table)))?;
    if &t.family != family {
        return Err(StoreError::FamilyNotFound {
            table: lossy(table),
            family: lossy(family),
        });
    }
    Ok(t)
}

fn lossy(b: &[u8]) -> String {
    from_utf8(b)
        .map(|s| s.to_string())
        .unwrap_or_else(|_| format!("{:?}", b))
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn put(&self, request: PutRequest) -> Result<(), StoreError> {
        self.check_writable()?;

        let mut inner = self.tables.write().await;
        let table = lookup(&mut inner, &request.table, &request.family)?;
        table
            .rows
            .entry(request.key)
            .or_default()
            .insert(request.qualifier, request.value);
        drop(inner);

        self.record(request.durable);
        Ok(())
    }

    async fn append(&self, request: AppendRequest) -> Result<(), StoreError> {
        self.check_writable()?;

        let mut inner = self.tables.write().await;
        let table = lookup(&mut inner, &request.table, &request.family)?;
        let row = table.rows.entry(request.key).or_default();
        let cell = match row.get(&request.qualifier) {
            Some(existing) => {
                let mut buf = BytesMut::with_capacity(existing.len() + request.value.len());
                buf.extend_from_slice(existing);
                buf.extend_from_slice(&request.value);
                buf.freeze()
            }
            None => request.value,
        };
        row.insert(request.qualifier, cell);
        drop(inner);

        self.record(request.durable);
        Ok(())
    }

    fn flush_interval(&self) -> u16 {
        self.flush_interval.get()
    }

    fn set_flush_interval(&self, interval_ms: u16) {
        tracing::debug!(interval_ms, "store flush interval changed");
        self.flush_interval.set(interval_ms);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::error::StoreError;
    use crate::flush::FlushInterval;
    use crate::memory::MemoryStore;
    use crate::request::{AppendRequest, PutRequest};
    use crate::StoreClient;

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryStore::new();
        store.create_table("tsdb", "t").await;

        store
            .put(PutRequest::new("tsdb", "row1", "t", "q", "v1"))
            .await
            .unwrap();
        store
            .put(PutRequest::new("tsdb", "row1", "t", "q", "v2"))
            .await
            .unwrap();

        let row = store.row(b"tsdb", b"row1").await.unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row.get(&Bytes::from("q")).unwrap(), &Bytes::from("v2"));
        assert_eq!(store.durable_writes(), 2);
        assert_eq!(store.deferred_writes(), 0);
    }

    #[tokio::test]
    async fn test_append_concatenates() {
        let store = MemoryStore::new();
        store.create_table("tsdb", "t").await;

        let mut first = AppendRequest::new("tsdb", "row1", "t", "a", vec![1_u8, 2]);
        first.set_durable(false);
        store.append(first).await.unwrap();
        store
            .append(AppendRequest::new("tsdb", "row1", "t", "a", vec![3_u8]))
            .await
            .unwrap();

        let row = store.row(b"tsdb", b"row1").await.unwrap();
        assert_eq!(row.get(&Bytes::from("a")).unwrap().as_ref(), &[1, 2, 3]);
        assert_eq!(store.durable_writes(), 1);
        assert_eq!(store.deferred_writes(), 1);
    }

    #[tokio::test]
    async fn test_rows_are_sorted() {
        let store = MemoryStore::new();
        store.create_table("tsdb", "t").await;
        for key in ["c", "a", "b"] {
            store
                .put(PutRequest::new("tsdb", key, "t", "q", "v"))
                .await
                .unwrap();
        }

        let keys: Vec<Bytes> = store
            .rows(b"tsdb")
            .await
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]);
        assert_eq!(store.row_count(b"tsdb").await, 3);
    }

    #[tokio::test]
    async fn test_errors() {
        let store = MemoryStore::new();
        store.create_table("tsdb", "t").await;

        let r = store.put(PutRequest::new("nope", "k", "t", "q", "v")).await;
        assert_eq!(r, Err(StoreError::TableNotFound("nope".to_string())));

        let r = store.put(PutRequest::new("tsdb", "k", "x", "q", "v")).await;
        assert!(matches!(r, Err(StoreError::FamilyNotFound { .. })));

        store.set_fail_writes(true);
        let r = store
            .append(AppendRequest::new("tsdb", "k", "t", "q", "v"))
            .await;
        assert!(matches!(r, Err(StoreError::Rejected(_))));
        assert_eq!(store.row_count(b"tsdb").await, 0);
    }

    #[tokio::test]
    async fn test_flush_interval_is_shared() {
        let interval = FlushInterval::new(0);
        let a = MemoryStore::with_flush_interval(interval.clone());
        let b = MemoryStore::with_flush_interval(interval.clone());

        a.set_flush_interval(5000);
        assert_eq!(b.flush_interval(), 5000);
        assert_eq!(interval.get(), 5000);
    }
}
