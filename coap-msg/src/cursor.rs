//! Bounded append/extract helpers over a byte buffer.
//!
//! [`Appender`] and [`Extractor`] are dual views over a `[u8]`: one tracks
//! how many bytes are left to write, the other how many are left to read.
//! Both fail loudly rather than silently truncating, mirroring the
//! all-or-nothing semantics of the underlying protocol's buffer helpers.

/// Appends bytes into a `&mut [u8]`, refusing any write that would run past
/// the end of the slice.
#[derive(Debug)]
pub struct Appender<'a> {
  buf: &'a mut [u8],
  pos: usize,
}

/// The append or extract operation did not have enough room to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorError {
  /// Not enough space left in the destination buffer.
  InsufficientSpace,
  /// Not enough bytes left in the source buffer.
  InsufficientData,
}

impl<'a> Appender<'a> {
  /// Wrap a buffer for appending, starting at offset 0.
  pub fn new(buf: &'a mut [u8]) -> Self {
    Self { buf, pos: 0 }
  }

  /// Bytes written so far.
  pub fn position(&self) -> usize {
    self.pos
  }

  /// Bytes of headroom remaining before the buffer is full.
  pub fn bytes_left(&self) -> usize {
    self.buf.len() - self.pos
  }

  /// Append `src` in full, or fail without writing anything.
  pub fn append(&mut self, src: &[u8]) -> Result<(), CursorError> {
    if src.len() > self.bytes_left() {
      return Err(CursorError::InsufficientSpace);
    }
    self.buf[self.pos..self.pos + src.len()].copy_from_slice(src);
    self.pos += src.len();
    Ok(())
  }

  /// Append a single byte.
  pub fn append_u8(&mut self, b: u8) -> Result<(), CursorError> {
    self.append(&[b])
  }

  /// The bytes written into the buffer so far.
  pub fn written(&self) -> &[u8] {
    &self.buf[..self.pos]
  }
}

/// Extracts bytes from a `&[u8]`, refusing any read that would run past the
/// end of the slice.
#[derive(Debug, Clone)]
pub struct Extractor<'a> {
  buf: &'a [u8],
  pos: usize,
}

impl<'a> Extractor<'a> {
  /// Wrap a buffer for extraction, starting at offset 0.
  pub fn new(buf: &'a [u8]) -> Self {
    Self { buf, pos: 0 }
  }

  /// Bytes consumed so far.
  pub fn position(&self) -> usize {
    self.pos
  }

  /// Bytes left unconsumed.
  pub fn bytes_left(&self) -> usize {
    self.buf.len() - self.pos
  }

  /// Extract exactly `n` bytes into `dst`, or fail without advancing.
  pub fn extract(&mut self, dst: &mut [u8], n: usize) -> Result<(), CursorError> {
    if n > self.bytes_left() || n > dst.len() {
      return Err(CursorError::InsufficientData);
    }
    dst[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
    self.pos += n;
    Ok(())
  }

  /// Skip `n` bytes without copying them anywhere (`extract(NULL, n)` in the
  /// original C API).
  pub fn skip(&mut self, n: usize) -> Result<(), CursorError> {
    if n > self.bytes_left() {
      return Err(CursorError::InsufficientData);
    }
    self.pos += n;
    Ok(())
  }

  /// Borrow the next `n` bytes without advancing the position.
  pub fn peek(&self, n: usize) -> Result<&'a [u8], CursorError> {
    if n > self.bytes_left() {
      return Err(CursorError::InsufficientData);
    }
    Ok(&self.buf[self.pos..self.pos + n])
  }

  /// Take the next `n` bytes and advance, or fail.
  pub fn take(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
    let s = self.peek(n)?;
    self.pos += n;
    Ok(s)
  }

  /// Take the next single byte.
  pub fn take_u8(&mut self) -> Result<u8, CursorError> {
    self.take(1).map(|s| s[0])
  }

  /// Everything from the current position to the end of the buffer.
  pub fn remaining(&self) -> &'a [u8] {
    &self.buf[self.pos..]
  }

  /// True if there is nothing left to read.
  pub fn is_exhausted(&self) -> bool {
    self.pos >= self.buf.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn append_succeeds_when_room() {
    let mut buf = [0u8; 4];
    let mut a = Appender::new(&mut buf);
    a.append(&[1, 2]).unwrap();
    a.append(&[3]).unwrap();
    assert_eq!(a.written(), &[1, 2, 3]);
    assert_eq!(a.bytes_left(), 1);
  }

  #[test]
  fn append_fails_atomically_when_out_of_room() {
    let mut buf = [0u8; 2];
    let mut a = Appender::new(&mut buf);
    a.append(&[1]).unwrap();
    assert_eq!(a.append(&[2, 3]), Err(CursorError::InsufficientSpace));
    // failed append must not have partially written
    assert_eq!(a.written(), &[1]);
  }

  #[test]
  fn extract_reads_and_advances() {
    let buf = [1, 2, 3, 4];
    let mut e = Extractor::new(&buf);
    let mut dst = [0u8; 2];
    e.extract(&mut dst, 2).unwrap();
    assert_eq!(dst, [1, 2]);
    assert_eq!(e.bytes_left(), 2);
  }

  #[test]
  fn extract_fails_atomically_when_insufficient() {
    let buf = [1, 2];
    let mut e = Extractor::new(&buf);
    let mut dst = [0u8; 3];
    assert_eq!(e.extract(&mut dst, 3), Err(CursorError::InsufficientData));
    assert_eq!(e.position(), 0);
  }

  #[test]
  fn skip_discards_bytes() {
    let buf = [1, 2, 3];
    let mut e = Extractor::new(&buf);
    e.skip(2).unwrap();
    assert_eq!(e.take_u8().unwrap(), 3);
  }
}
