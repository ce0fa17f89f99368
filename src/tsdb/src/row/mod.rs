pub mod row_key;
pub mod salt;
