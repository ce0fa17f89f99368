use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::qualifier::Qualifier;
use crate::error::{Result, TsdbError};

/// Column holding the appended samples of a row.
pub const APPEND_COLUMN_QUALIFIER: [u8; 3] = [0x05, 0x00, 0x00];

/// AppendDataPoints is the payload of an append write: the qualifier followed by the value.
///
/// The length flags of each qualifier tell a reader where the value ends, so payloads of
/// successive appends can be concatenated in one cell and split again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendDataPoints {
    pub qualifier: Qualifier,
    pub value: Bytes,
}

impl AppendDataPoints {
    pub fn new(qualifier: Qualifier, value: Bytes) -> Self {
        Self { qualifier, value }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.qualifier.len() + self.value.len());
        self.qualifier.put(&mut buf);
        buf.put_slice(&self.value);
        buf.freeze()
    }

    /// parse splits a concatenated append column into its samples.
    pub fn parse(column: &[u8]) -> Result<Vec<AppendDataPoints>> {
        let mut points = Vec::new();
        let mut pos = 0;
        while pos < column.len() {
            let qualifier = Qualifier::decode(&column[pos..])?;
            pos += qualifier.len();

            let end = pos + qualifier.value_len();
            if end > column.len() {
                return Err(TsdbError::InvalidValue(format!(
                    "append column truncated at offset {}: need {} bytes, have {}",
                    pos,
                    qualifier.value_len(),
                    column.len() - pos
                )));
            }
            points.push(AppendDataPoints::new(
                qualifier,
                Bytes::copy_from_slice(&column[pos..end]),
            ));
            pos = end;
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use crate::codec::append::AppendDataPoints;
    use crate::codec::qualifier::build_qualifier;
    use crate::codec::value::{decode_float, decode_long, encode_float, encode_long};

    #[test]
    fn test_concatenated_payloads_parse_back() {
        let base = 1_356_998_400_u32;
        let v1 = encode_long(300);
        let v2 = encode_float(0.5).unwrap();
        let v3 = encode_long(-1);

        let p1 = AppendDataPoints::new(build_qualifier(base as i64 + 1, base, v1.flags).unwrap(), v1.bytes.clone());
        let p2 = AppendDataPoints::new(
            build_qualifier(base as i64 * 1000 + 2500, base, v2.flags).unwrap(),
            v2.bytes.clone(),
        );
        let p3 = AppendDataPoints::new(build_qualifier(base as i64 + 3, base, v3.flags).unwrap(), v3.bytes.clone());

        let mut column = BytesMut::new();
        for p in [&p1, &p2, &p3] {
            column.extend_from_slice(&p.to_bytes());
        }

        let parsed = AppendDataPoints::parse(&column).unwrap();
        assert_eq!(parsed, vec![p1, p2, p3]);

        assert_eq!(decode_long(parsed[0].qualifier.flags(), &parsed[0].value).unwrap(), 300);
        assert_eq!(decode_float(parsed[1].qualifier.flags(), &parsed[1].value).unwrap(), 0.5);
        assert_eq!(parsed[1].qualifier.offset_ms(), 2500);
        assert_eq!(decode_long(parsed[2].qualifier.flags(), &parsed[2].value).unwrap(), -1);
    }

    #[test]
    fn test_truncated_column() {
        let v = encode_long(70000);
        let p = AppendDataPoints::new(build_qualifier(10, 0, v.flags).unwrap(), v.bytes);
        let bytes = p.to_bytes();
        assert!(AppendDataPoints::parse(&bytes[..bytes.len() - 1]).is_err());
        assert!(AppendDataPoints::parse(&[]).unwrap().is_empty());
    }
}
