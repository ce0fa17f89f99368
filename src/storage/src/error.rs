use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("column family not found: {family} in table {table}")]
    FamilyNotFound { table: String, family: String },

    #[error("write rejected: {0}")]
    Rejected(String),
}
