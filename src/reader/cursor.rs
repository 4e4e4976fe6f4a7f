use crate::error::ReadError;

/// Big-endian reader over a class file buffer. Every read is bounds-checked.
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(ReadError::Truncated {
                offset: self.pos,
                needed: len,
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ReadError> {
        self.take(len).map(|_| ())
    }

    pub fn u1(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    pub fn u2(&mut self) -> Result<u16, ReadError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u4(&mut self) -> Result<u32, ReadError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian() {
        let mut cursor = Cursor::new(&[0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34, 0x07]);
        assert_eq!(cursor.u4().unwrap(), 0xCAFEBABE);
        assert_eq!(cursor.u2().unwrap(), 52);
        assert_eq!(cursor.u1().unwrap(), 7);
        assert!(cursor.u1().is_err());
    }

    #[test]
    fn test_truncation_reports_offset() {
        let mut cursor = Cursor::new(&[0x00, 0x01, 0x02]);
        cursor.u2().unwrap();
        assert_eq!(
            cursor.u2(),
            Err(ReadError::Truncated { offset: 2, needed: 2 })
        );
        assert_eq!(
            cursor.skip(usize::MAX),
            Err(ReadError::Truncated {
                offset: 2,
                needed: usize::MAX
            })
        );
    }
}
