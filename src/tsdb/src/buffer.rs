use tsdb_utils::time::MS_PER_SECOND;

use crate::codec::qualifier::Qualifier;
use crate::error::{Result, TsdbError};

const INITIAL_CAPACITY: usize = 4;

/// WriteBuffer keeps the samples written to the current row of a series writer.
///
/// Qualifiers and values are parallel arrays sharing an index. Values are kept widened to
/// 64 bits: integers sign-extended, floats as their IEEE-754 bit pattern.
///
/// Capacity doubles when full and is capped at the densest legal packing of a row: one
/// sample per second of the window, or one per millisecond once a millisecond sample has
/// been appended.
pub struct WriteBuffer {
    qualifiers: Vec<Qualifier>,
    values: Vec<i64>,
    capacity: usize,
    window: usize,
    has_millis: bool,
}

impl WriteBuffer {
    pub fn new(window_seconds: u32) -> Self {
        let window = window_seconds as usize;
        let capacity = INITIAL_CAPACITY.min(window);
        Self {
            qualifiers: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            capacity,
            window,
            has_millis: false,
        }
    }

    pub fn len(&self) -> usize {
        self.qualifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qualifiers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// limit is the most samples one row can legally hold.
    pub fn limit(&self) -> usize {
        if self.has_millis {
            self.window * MS_PER_SECOND as usize
        } else {
            self.window
        }
    }

    /// append adds a sample, growing the arrays if needed.
    ///
    /// # Panics
    ///
    /// Panics if the row already holds as many samples as its window allows. Ordering and
    /// window checks upstream make this unreachable for well-formed input.
    pub fn append(&mut self, qualifier: Qualifier, value: i64) {
        if qualifier.is_millis() {
            self.has_millis = true;
        }
        if self.len() == self.capacity {
            self.grow();
        }
        self.qualifiers.push(qualifier);
        self.values.push(value);
    }

    fn grow(&mut self) {
        let new_capacity = (self.capacity * 2).min(self.limit());
        if new_capacity <= self.capacity {
            panic!(
                "can't grow write buffer larger than {} samples",
                self.capacity
            );
        }
        let additional = new_capacity - self.len();
        self.qualifiers.reserve_exact(additional);
        self.values.reserve_exact(additional);
        self.capacity = new_capacity;
    }

    /// reset drops every sample and starts the growth sequence over for the next row.
    pub fn reset(&mut self) {
        self.qualifiers.clear();
        self.values.clear();
        self.has_millis = false;
        self.capacity = INITIAL_CAPACITY.min(self.window);
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.len() {
            return Err(TsdbError::IndexOutOfRange {
                index: i,
                size: self.len(),
            });
        }
        Ok(())
    }

    pub fn get(&self, i: usize) -> Result<(Qualifier, i64)> {
        self.check_index(i)?;
        Ok((self.qualifiers[i], self.values[i]))
    }

    pub fn qualifier(&self, i: usize) -> Result<Qualifier> {
        self.check_index(i)?;
        Ok(self.qualifiers[i])
    }

    /// timestamp returns the time of sample `i`, in the resolution it was written with:
    /// seconds for a second qualifier, milliseconds for a millisecond qualifier.
    pub fn timestamp(&self, i: usize, base_time: u32) -> Result<i64> {
        let q = self.qualifier(i)?;
        Ok(match q {
            Qualifier::Seconds(_) => base_time as i64 + q.delta_seconds() as i64,
            Qualifier::Millis(_) => base_time as i64 * MS_PER_SECOND + q.offset_ms() as i64,
        })
    }

    pub fn is_integer(&self, i: usize) -> Result<bool> {
        self.qualifier(i).map(|q| q.is_integer())
    }

    pub fn long_value(&self, i: usize) -> Result<i64> {
        if !self.is_integer(i)? {
            return Err(TsdbError::TypeMismatch {
                index: i,
                expected: "long",
            });
        }
        Ok(self.values[i])
    }

    pub fn double_value(&self, i: usize) -> Result<f64> {
        if self.is_integer(i)? {
            return Err(TsdbError::TypeMismatch {
                index: i,
                expected: "float",
            });
        }
        Ok(f32::from_bits(self.values[i] as u32) as f64)
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::WriteBuffer;
    use crate::codec::qualifier::build_qualifier;
    use crate::codec::value::{encode_float, encode_long};
    use crate::error::TsdbError;

    #[test]
    fn test_append_and_get() {
        let mut buf = WriteBuffer::new(3600);
        assert!(buf.is_empty());

        let l = encode_long(300);
        let f = encode_float(1.5).unwrap();
        buf.append(build_qualifier(1000, 0, l.flags).unwrap(), l.raw());
        buf.append(build_qualifier(1500, 0, f.flags).unwrap(), f.raw());

        assert_eq!(buf.len(), 2);
        assert_eq!(buf.timestamp(0, 0).unwrap(), 1000);
        assert_eq!(buf.timestamp(1, 0).unwrap(), 1500);
        assert_eq!(buf.long_value(0).unwrap(), 300);
        assert_eq!(buf.double_value(1).unwrap(), 1.5);
        assert!(matches!(
            buf.double_value(0),
            Err(TsdbError::TypeMismatch { index: 0, .. })
        ));
        assert!(matches!(
            buf.long_value(1),
            Err(TsdbError::TypeMismatch { index: 1, .. })
        ));
        assert!(matches!(
            buf.get(2),
            Err(TsdbError::IndexOutOfRange { index: 2, size: 2 })
        ));
    }

    #[test]
    fn test_growth_doubles_up_to_window() {
        let mut buf = WriteBuffer::new(10);
        assert_eq!(buf.capacity(), 4);
        let mut capacities = vec![];
        for delta in 0..10 {
            let v = encode_long(delta);
            buf.append(build_qualifier(delta, 0, v.flags).unwrap(), v.raw());
            capacities.push(buf.capacity());
        }
        assert_eq!(capacities, vec![4, 4, 4, 4, 8, 8, 8, 8, 10, 10]);
    }

    #[test]
    #[should_panic(expected = "can't grow write buffer")]
    fn test_growing_past_window_panics() {
        let mut buf = WriteBuffer::new(2);
        let v = encode_long(1);
        for delta in 0..3 {
            buf.append(build_qualifier(delta, 0, v.flags).unwrap(), v.raw());
        }
    }

    #[test]
    fn test_millis_raise_limit() {
        let mut buf = WriteBuffer::new(2);
        let v = encode_long(1);
        for offset in 0..5_i64 {
            let ts = 1_356_998_400_000 + offset;
            buf.append(build_qualifier(ts, 1_356_998_400, v.flags).unwrap(), v.raw());
        }
        assert_eq!(buf.limit(), 2000);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.timestamp(4, 1_356_998_400).unwrap(), 1_356_998_400_004);

        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.limit(), 2);
        assert_eq!(buf.capacity(), 2);
    }

    #[test]
    fn test_reset_restarts_growth() {
        let mut buf = WriteBuffer::new(3600);
        let v = encode_long(1);
        for delta in 0..20 {
            buf.append(build_qualifier(delta, 0, v.flags).unwrap(), v.raw());
        }
        assert_eq!(buf.capacity(), 32);

        buf.reset();
        assert_eq!(buf.capacity(), 4);
        for delta in 0..5 {
            buf.append(build_qualifier(delta, 0, v.flags).unwrap(), v.raw());
        }
        assert_eq!(buf.capacity(), 8);
    }
}
