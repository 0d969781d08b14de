use crate::error::{Error, Result};

/// Big-endian cursor over a classfile byte slice.
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn read_u1(&mut self) -> Result<u8> {
        let [b] = *self.read_array::<1>()?;
        Ok(b)
    }

    pub fn read_u2(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(*self.read_array::<2>()?))
    }

    pub fn read_u4(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(*self.read_array::<4>()?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Error::UnexpectedEof)?;
        let slice = self.bytes.get(self.pos..end).ok_or(Error::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn ensure_empty(&self) -> Result<()> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(Error::MalformedAttribute("trailing bytes"))
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<&'a [u8; N]> {
        let slice = self.read_bytes(N)?;
        slice.try_into().map_err(|_| Error::UnexpectedEof)
    }
}
