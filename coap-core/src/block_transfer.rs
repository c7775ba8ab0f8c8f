//! Blockwise transfer (RFC7959): splitting an outgoing body into
//! block-sized chunks on demand, reassembling an incoming sequence of
//! chunks back into a whole body, and deciding whether a new request
//! continues an existing blockwise exchange.

use coap_msg::opt::{is_request_key_option, number, OptionList};
use coap_msg::Block;

/// Splits a body into blocks of a fixed size, handed out one at a time as
/// the peer pulls them (a response body might be gigabytes; there's no
/// reason to chunk it all up front).
#[derive(Debug, Clone, Copy)]
pub struct Fragmenter<'a> {
  body: &'a [u8],
  block_size: u32,
}

impl<'a> Fragmenter<'a> {
  pub fn new(body: &'a [u8], szx: u8) -> Self {
    let block_size = Block::new(0, false, szx).expect("szx fits in 3 bits").size();
    Self { body, block_size }
  }

  /// The chunk for block `seq_num`, and whether more blocks follow it.
  /// `None` if `seq_num` is past the end of the body.
  pub fn block(&self, seq_num: u32) -> Option<(&'a [u8], bool)> {
    let start = seq_num.checked_mul(self.block_size)? as usize;
    if start >= self.body.len() {
      return if start == 0 && self.body.is_empty() { Some((&[], false)) } else { None };
    }
    let end = (start + self.block_size as usize).min(self.body.len());
    Some((&self.body[start..end], end < self.body.len()))
  }

  /// Total number of blocks the body splits into (at least 1, even for an
  /// empty body).
  pub fn total_blocks(&self) -> u32 {
    if self.body.is_empty() {
      1
    } else {
      (self.body.len() as u32).div_ceil(self.block_size)
    }
  }
}

/// Errors accepting an incoming block into a [`Reassembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyError {
  /// The block's offset wasn't the next expected one (or, for BERT, fell
  /// behind the next expected one).
  OutOfOrder,
  /// The block size changed mid-transfer without the sequence restarting.
  SizeChanged,
  /// `more = 1` on a non-BERT block but the chunk's length didn't equal the
  /// block's own declared size (RFC7959 §4 step 1).
  SizeMismatch,
  /// `more = 1` on a BERT block but the chunk's length wasn't a positive
  /// multiple of 1024.
  BertChunkNotAligned,
  /// Accepting this block would exceed the configured body size limit.
  TooLarge,
}

/// Whether accepting a block completed the transfer or more are expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyProgress {
  Continue,
  Complete,
}

/// Accumulates blockwise chunks into a complete body.
///
/// Tracked by byte offset rather than sequence number so that BERT transfers
/// (RFC8323 §6), where one message can carry several 1024-byte chunks under
/// a single BLOCK option, advance correctly: a BERT message's declared
/// `seq_num * 1024` offset only has to be `>=` the next expected offset, not
/// exactly the previous block's `seq_num + 1`.
#[derive(Debug)]
pub struct Reassembler {
  buf: Vec<u8>,
  expected_offset: usize,
  block_size: Option<u32>,
  max_body_size: usize,
}

impl Reassembler {
  pub fn new(max_body_size: usize) -> Self {
    Self { buf: Vec::new(), expected_offset: 0, block_size: None, max_body_size }
  }

  /// Feed in one block's chunk, in the order blocks are expected to
  /// arrive.
  pub fn accept(&mut self, block: Block, chunk: &[u8])
                -> Result<ReassemblyProgress, ReassemblyError> {
    match self.block_size {
      | Some(sz) if block.more && block.size() != sz => return Err(ReassemblyError::SizeChanged),
      | None => self.block_size = Some(block.size()),
      | _ => {},
    }

    if block.more {
      if block.is_bert() {
        if chunk.is_empty() || chunk.len() % 1024 != 0 {
          return Err(ReassemblyError::BertChunkNotAligned);
        }
      } else if chunk.len() as u32 != block.size() {
        return Err(ReassemblyError::SizeMismatch);
      }
    }

    let offset = block.seq_num as usize * block.size() as usize;
    if block.is_bert() {
      if offset < self.expected_offset {
        return Err(ReassemblyError::OutOfOrder);
      }
    } else if offset != self.expected_offset {
      return Err(ReassemblyError::OutOfOrder);
    }

    if self.buf.len() + chunk.len() > self.max_body_size {
      return Err(ReassemblyError::TooLarge);
    }

    self.buf.extend_from_slice(chunk);
    self.expected_offset = offset + chunk.len();

    Ok(if block.more { ReassemblyProgress::Continue } else { ReassemblyProgress::Complete })
  }

  /// The body reassembled so far (complete only once `accept` has returned
  /// `Complete`).
  pub fn body(&self) -> &[u8] {
    &self.buf
  }
}

fn block1_of(options: &OptionList<'_>) -> Option<Block> {
  options.find_first(number::BLOCK1 as u32).and_then(|v| Block::decode(v).ok())
}

/// Whether `curr_request` is a legitimate next segment of the blockwise
/// transfer that `prev_request` began (acknowledged by `prev_response`),
/// given `expected_request_offset` — the payload offset the engine expects
/// the next segment to start at.
///
/// True iff (a) `prev_response` shows a BLOCK1 transfer was actually in
/// progress, (b) `curr_request`'s request-key options (critical options
/// other than BLOCK1/BLOCK2, plus Content-Format) are unchanged from
/// `prev_request`'s, and (c) `curr_request`'s BLOCK1 offset matches
/// `expected_request_offset` exactly, or — when either side is using a BERT
/// block — is at least `expected_request_offset` (a BERT message may pack
/// several 1024-byte chunks ahead of where a non-BERT accounting would
/// expect the next block to start).
pub fn is_sequential_block_request(prev_response: &OptionList<'_>, prev_request: &OptionList<'_>,
                                    curr_request: &OptionList<'_>, expected_request_offset: usize)
                                    -> bool {
  let Some(prev_response_block) = block1_of(prev_response) else { return false };
  let Some(curr_block) = block1_of(curr_request) else { return false };

  if !OptionList::options_equal(prev_request, curr_request, is_request_key_option) {
    return false;
  }

  let offset = curr_block.seq_num as usize * curr_block.size() as usize;
  if curr_block.is_bert() || prev_response_block.is_bert() {
    offset >= expected_request_offset
  } else {
    offset == expected_request_offset
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn opts_with_block1(path: &[u8], block: Block) -> OptionList<'static> {
    let mut opts = OptionList::owned();
    opts.insert(number::PATH as u32, path).unwrap();
    opts.insert(number::BLOCK1 as u32, &block.encode()).unwrap();
    opts
  }

  #[test]
  fn fragmenter_splits_body_into_fixed_size_blocks() {
    let body = vec![0u8; 40];
    let f = Fragmenter::new(&body, 0); // 16-byte blocks
    assert_eq!(f.total_blocks(), 3);
    assert_eq!(f.block(0), Some((&body[0..16], true)));
    assert_eq!(f.block(1), Some((&body[16..32], true)));
    assert_eq!(f.block(2), Some((&body[32..40], false)));
    assert_eq!(f.block(3), None);
  }

  #[test]
  fn fragmenter_handles_empty_body() {
    let f = Fragmenter::new(&[], 0);
    assert_eq!(f.total_blocks(), 1);
    assert_eq!(f.block(0), Some((&[][..], false)));
  }

  #[test]
  fn reassembler_rejects_out_of_order_block() {
    let mut r = Reassembler::new(1024);
    let b1 = Block::new(1, false, 0).unwrap();
    assert_eq!(r.accept(b1, b"x"), Err(ReassemblyError::OutOfOrder));
  }

  #[test]
  fn reassembler_completes_on_last_block_and_concatenates_body() {
    let mut r = Reassembler::new(1024);
    let b0 = Block::new(0, true, 0).unwrap();
    let b1 = Block::new(1, false, 0).unwrap();
    assert_eq!(r.accept(b0, &[1u8; 16]), Ok(ReassemblyProgress::Continue));
    assert_eq!(r.accept(b1, &[2u8; 4]), Ok(ReassemblyProgress::Complete));
    assert_eq!(r.body().len(), 20);
  }

  #[test]
  fn reassembler_rejects_size_change_mid_transfer() {
    let mut r = Reassembler::new(1024);
    let b0 = Block::new(0, true, 0).unwrap(); // 16-byte blocks, more coming
    r.accept(b0, &[1u8; 16]).unwrap();
    let b1 = Block::new(1, true, 1).unwrap(); // switched to 32-byte blocks
    assert_eq!(r.accept(b1, &[2u8; 16]), Err(ReassemblyError::SizeChanged));
  }

  #[test]
  fn reassembler_rejects_chunk_shorter_than_declared_block_size() {
    let mut r = Reassembler::new(1024);
    let b0 = Block::new(0, true, 0).unwrap(); // declares 16-byte blocks, more=1
    assert_eq!(r.accept(b0, &[1u8; 8]), Err(ReassemblyError::SizeMismatch));
  }

  #[test]
  fn reassembler_enforces_max_body_size() {
    let mut r = Reassembler::new(10);
    let b0 = Block::new(0, false, 0).unwrap();
    assert_eq!(r.accept(b0, &[0u8; 16]), Err(ReassemblyError::TooLarge));
  }

  #[test]
  fn reassembler_accepts_bert_multi_chunk_message_and_resumes_past_it() {
    let mut r = Reassembler::new(1 << 20);
    let b0 = Block::new(0, true, 7).unwrap(); // BERT, more=1
    assert_eq!(r.accept(b0, &[1u8; 2048]), Ok(ReassemblyProgress::Continue));

    // two 1024-byte chunks were consumed, so the next BERT message starts
    // at seq_num=2 (offset 2048), which must be accepted even though it
    // isn't `prev.seq_num + 1`
    let b1 = Block::new(2, false, 7).unwrap();
    assert_eq!(r.accept(b1, &[2u8; 1024]), Ok(ReassemblyProgress::Complete));
    assert_eq!(r.body().len(), 3072);
  }

  #[test]
  fn reassembler_rejects_bert_chunk_not_a_multiple_of_1024() {
    let mut r = Reassembler::new(1 << 20);
    let b0 = Block::new(0, true, 7).unwrap();
    assert_eq!(r.accept(b0, &[1u8; 1500]), Err(ReassemblyError::BertChunkNotAligned));
  }

  #[test]
  fn sequential_predicate_matches_block1_continuation_scenario() {
    // prev_request/prev_response: BLOCK1(seq=1, size=1024, more=1)
    let prev_block = Block::new(1, true, 6).unwrap(); // szx=6 -> size 1024
    let prev_request = opts_with_block1(b"sensors", prev_block);
    let prev_response = opts_with_block1(b"sensors", prev_block);

    // curr_request: BLOCK1(seq=2, size=1024, more=1), expected offset 2048
    let curr_block = Block::new(2, true, 6).unwrap();
    let curr_request = opts_with_block1(b"sensors", curr_block);

    assert!(is_sequential_block_request(&prev_response, &prev_request, &curr_request, 2048));
  }

  #[test]
  fn sequential_predicate_accepts_block_size_shrinking_mid_transfer() {
    let prev_block = Block::new(1, true, 6).unwrap(); // size 1024
    let prev_request = opts_with_block1(b"sensors", prev_block);
    let prev_response = opts_with_block1(b"sensors", prev_block);

    // curr_request shrinks to 512-byte blocks: seq=4, offset 4*512=2048
    let curr_block = Block::new(4, true, 5).unwrap();
    let curr_request = opts_with_block1(b"sensors", curr_block);

    assert!(is_sequential_block_request(&prev_response, &prev_request, &curr_request, 2048));
  }

  #[test]
  fn sequential_predicate_rejects_offset_mismatch() {
    let prev_block = Block::new(1, true, 6).unwrap();
    let prev_request = opts_with_block1(b"sensors", prev_block);
    let prev_response = opts_with_block1(b"sensors", prev_block);

    // seq=3, size=1024 -> offset 3072, but expected is 2048
    let curr_block = Block::new(3, true, 6).unwrap();
    let curr_request = opts_with_block1(b"sensors", curr_block);

    assert!(!is_sequential_block_request(&prev_response, &prev_request, &curr_request, 2048));
  }

  #[test]
  fn sequential_predicate_rejects_changed_critical_option() {
    let prev_block = Block::new(1, true, 6).unwrap();
    let prev_request = opts_with_block1(b"sensors", prev_block);
    let prev_response = opts_with_block1(b"sensors", prev_block);

    let curr_block = Block::new(2, true, 6).unwrap();
    let curr_request = opts_with_block1(b"actuators", curr_block); // Uri-Path changed

    assert!(!is_sequential_block_request(&prev_response, &prev_request, &curr_request, 2048));
  }
}
