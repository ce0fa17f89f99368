use bytes::Bytes;

/// PutRequest writes a single cell, overwriting what was there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub table: Bytes,
    pub key: Bytes,
    pub family: Bytes,
    pub qualifier: Bytes,
    pub value: Bytes,
    pub durable: bool,
}

impl PutRequest {
    pub fn new(
        table: impl Into<Bytes>,
        key: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            value: value.into(),
            durable: true,
        }
    }

    pub fn set_durable(&mut self, durable: bool) {
        self.durable = durable;
    }
}

/// AppendRequest concatenates `value` to an existing cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRequest {
    pub table: Bytes,
    pub key: Bytes,
    pub family: Bytes,
    pub qualifier: Bytes,
    pub value: Bytes,
    pub durable: bool,
}

impl AppendRequest {
    pub fn new(
        table: impl Into<Bytes>,
        key: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            value: value.into(),
            durable: true,
        }
    }

    pub fn set_durable(&mut self, durable: bool) {
        self.durable = durable;
    }
}
