use std::mem;
use std::ptr::{self, NonNull};

use crate::align;
use crate::header::{self, HEADER_SIZE, Header};

/// Variable-size suballocator over one caller-supplied memory pool.
///
/// The handle holds the pool's base address and aligned length; all
/// bookkeeping lives inside the pool itself as a chain of inline
/// headers terminated by a zero-size sentinel. Walking the chain is
/// pure offset arithmetic: `offset += HEADER_SIZE + payload`.
///
/// Single-threaded by design. There is no internal locking; concurrent
/// calls against the same pool are undefined and the caller supplies
/// external synchronization if it needs any.
pub struct Vsa {
  base: NonNull<u8>,
  len: usize,
}

impl Vsa {
  /// Takes over the pool at `memory` and formats it as one free block
  /// followed by the sentinel.
  ///
  /// `pool_size` is rounded up to a word multiple first. Contract
  /// violations (null or misaligned memory, zero size, a pool too
  /// small to hold the first header plus the sentinel) abort via
  /// assertion rather than returning an error.
  ///
  /// # Safety
  ///
  /// `memory` must be valid for reads and writes for `pool_size`
  /// rounded up to the next word multiple, and must stay valid and
  /// otherwise untouched for the lifetime of the returned `Vsa`.
  pub unsafe fn init(
    memory: *mut u8,
    pool_size: usize,
  ) -> Self {
    assert!(!memory.is_null(), "pool memory must not be null");
    assert!(
      memory as usize % mem::size_of::<usize>() == 0,
      "pool memory must be word aligned"
    );
    assert!(pool_size > 0, "pool size must be positive");
    assert!(pool_size <= isize::MAX as usize, "pool size too large");

    let len = align!(pool_size);

    assert!(
      len >= 2 * HEADER_SIZE,
      "pool of {} bytes cannot hold a block header and the sentinel",
      len
    );

    let mut pool = Self {
      base: unsafe { NonNull::new_unchecked(memory) },
      len,
    };

    // One free block spanning the usable pool, then the sentinel.
    pool.write(0, Header::free(len - 2 * HEADER_SIZE));
    pool.write(len - HEADER_SIZE, Header::sentinel());

    pool
  }

  /// Allocates `nbytes` (rounded up to the word size) out of the pool.
  ///
  /// Scans the header chain front to back, lazily merging each run of
  /// adjacent free blocks it passes, and claims the first block whose
  /// capacity reaches the request. When the claimed block has more
  /// than a header's worth of spare capacity the remainder is split
  /// off as a new free block; otherwise the spare bytes travel with
  /// the allocation and come back on free.
  ///
  /// Returns a pointer to the first payload byte, or null when no
  /// free region is large enough even after merging. Merges performed
  /// during a failed search persist; they never reduce capacity.
  pub fn alloc(
    &mut self,
    nbytes: usize,
  ) -> *mut u8 {
    assert!(nbytes > 0, "allocation request must be positive");
    assert!(nbytes <= isize::MAX as usize, "allocation request too large");

    let nbytes = align!(nbytes);

    let Some(offset) = self.defrag(nbytes) else {
      return ptr::null_mut();
    };

    let cap = self.read(offset).payload();

    if cap > nbytes + HEADER_SIZE {
      // Split: the remainder becomes a free block of its own.
      self.write(
        offset + HEADER_SIZE + nbytes,
        Header::free(cap - nbytes - HEADER_SIZE),
      );
      self.write(offset, Header::allocated(nbytes));
    } else {
      // Remainder too small to host a header. The whole capacity is
      // handed out and recovered when the block is freed.
      self.write(offset, Header::allocated(cap));
    }

    unsafe { self.base.as_ptr().add(offset + HEADER_SIZE) }
  }

  /// Releases a block previously returned by [`Vsa::alloc`].
  ///
  /// A null pointer is a no-op. The block's header flips back to free
  /// in O(1); merging with free neighbors is deferred until the next
  /// allocation or largest-chunk query actually needs the space.
  ///
  /// The header behind the pointer must carry this allocator's
  /// signature and must currently be allocated; a foreign pointer or
  /// a double free fails the assertion and aborts.
  ///
  /// # Safety
  ///
  /// `block` must be null or a pointer obtained from [`Vsa::alloc`]
  /// on this pool that has not been freed since. The payload must no
  /// longer be in use.
  pub unsafe fn free(
    &mut self,
    block: *mut u8,
  ) {
    if block.is_null() {
      return;
    }

    let offset = (block as usize)
      .checked_sub(self.base.as_ptr() as usize + HEADER_SIZE)
      .filter(|offset| offset + HEADER_SIZE <= self.len);

    let Some(offset) = offset else {
      panic!("pointer does not belong to this pool");
    };

    let header = self.read(offset);

    assert!(
      header.carries_signature(),
      "pointer was not produced by this allocator"
    );
    assert!(
      header.is_allocated(),
      "block is not currently allocated (double free?)"
    );

    self.write(offset, Header::free(header.payload()));
  }

  /// Returns the usable size of the largest free block, merging every
  /// adjacent run of free blocks in the whole pool first.
  ///
  /// The merge pass makes this call linear in the number of headers,
  /// and idempotent: a second call with no intervening alloc or free
  /// returns the same value. Returns 0 when no free block exists.
  pub fn largest_chunk_available(&mut self) -> usize {
    // An unsatisfiable request drives the merge pass over every free
    // run in the pool.
    self.defrag(isize::MAX as usize);

    let mut largest = 0;
    let mut offset = 0;

    loop {
      let header = self.read(offset);

      if header.is_sentinel() {
        return largest;
      }

      if header.is_free() {
        largest = largest.max(header.payload());
      }

      offset += HEADER_SIZE + header.payload();
    }
  }

  /// Coalescing search: walks the chain from the first header and
  /// returns the offset of the first free block whose capacity
  /// reaches `nbytes`, or `None` when the sentinel is hit first.
  ///
  /// A free block that is too small on its own absorbs every free
  /// block immediately following it before being judged again, so the
  /// pool gets compacted as a side effect of searching it. Merges are
  /// kept even when the search ultimately fails.
  fn defrag(
    &mut self,
    nbytes: usize,
  ) -> Option<usize> {
    let mut offset = 0;

    loop {
      let header = self.read(offset);

      if header.is_sentinel() {
        return None;
      }

      if header.is_free() {
        if header.payload() >= nbytes {
          return Some(offset);
        }

        let merged = self.merge_run(offset);

        if merged >= nbytes {
          return Some(offset);
        }

        offset += HEADER_SIZE + merged;
      } else {
        offset += HEADER_SIZE + header.payload();
      }
    }
  }

  /// Merges the free block at `offset` with every free block that
  /// immediately follows it, stopping at the first allocated header
  /// or the sentinel. Returns the merged payload size.
  fn merge_run(
    &mut self,
    offset: usize,
  ) -> usize {
    let mut payload = self.read(offset).payload();
    let mut front = offset + HEADER_SIZE + payload;

    loop {
      let header = self.read(front);

      if !header.is_free() {
        break;
      }

      // The absorbed block's header becomes payload of the survivor.
      payload += HEADER_SIZE + header.payload();
      front += HEADER_SIZE + header.payload();
    }

    self.write(offset, Header::free(payload));

    payload
  }

  fn read(
    &self,
    offset: usize,
  ) -> Header {
    // Sound given init's contract: the pool stays valid for the
    // allocator's lifetime, and the accessor bounds-checks the offset.
    unsafe { header::read(self.base.as_ptr(), self.len, offset) }
  }

  fn write(
    &mut self,
    offset: usize,
    header: Header,
  ) {
    unsafe { header::write(self.base.as_ptr(), self.len, offset, header) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const POOL_SIZE: usize = 160;

  fn pool_buffer() -> Vec<usize> {
    vec![0usize; POOL_SIZE / mem::size_of::<usize>()]
  }

  fn usable(pool_size: usize) -> usize {
    pool_size - 2 * HEADER_SIZE
  }

  /// Walks the header chain to the sentinel and returns the total
  /// bytes covered, headers included.
  fn walk_total(vsa: &Vsa) -> usize {
    let mut offset = 0;

    loop {
      let header = vsa.read(offset);

      if header.is_sentinel() {
        return offset + HEADER_SIZE;
      }

      offset += HEADER_SIZE + header.payload();
    }
  }

  #[test]
  fn test_init_leaves_one_free_block_spanning_the_pool() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    assert_eq!(usable(POOL_SIZE), vsa.largest_chunk_available());
    assert_eq!(POOL_SIZE, walk_total(&vsa));
  }

  #[test]
  fn test_init_rounds_the_pool_size_up() {
    let mut buf = pool_buffer();
    let word = mem::size_of::<usize>();

    // 7 bytes short of a word multiple still formats the full word.
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE - word + 1) };

    assert_eq!(usable(POOL_SIZE), vsa.largest_chunk_available());
  }

  #[test]
  fn test_alloc_carves_a_block_and_reports_the_remainder() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let block = vsa.alloc(32);

    assert!(!block.is_null());
    assert_eq!(usable(POOL_SIZE) - 32 - HEADER_SIZE, vsa.largest_chunk_available());
    assert_eq!(POOL_SIZE, walk_total(&vsa));
  }

  #[test]
  fn test_free_reclaims_the_whole_allocation() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let before = vsa.largest_chunk_available();
    let block = vsa.alloc(32);

    unsafe { vsa.free(block) };

    assert_eq!(before, vsa.largest_chunk_available());
    assert_eq!(POOL_SIZE, walk_total(&vsa));
  }

  #[test]
  fn test_largest_chunk_reports_only_free_space_while_a_block_is_outstanding() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let block = vsa.alloc(64);

    assert_eq!(usable(POOL_SIZE) - 64 - HEADER_SIZE, vsa.largest_chunk_available());

    unsafe { vsa.free(block) };

    assert_eq!(usable(POOL_SIZE), vsa.largest_chunk_available());
  }

  #[test]
  fn test_largest_chunk_is_idempotent() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let a = vsa.alloc(16);
    let _b = vsa.alloc(16);

    unsafe { vsa.free(a) };

    let first = vsa.largest_chunk_available();

    assert_eq!(first, vsa.largest_chunk_available());
  }

  #[test]
  fn test_free_null_is_a_noop() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let before = vsa.largest_chunk_available();

    unsafe { vsa.free(ptr::null_mut()) };

    assert_eq!(before, vsa.largest_chunk_available());
    assert_eq!(POOL_SIZE, walk_total(&vsa));
  }

  #[test]
  fn test_alloc_rounds_requests_up_to_the_word_size() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let block = vsa.alloc(13);

    assert_eq!(0, block as usize % mem::size_of::<usize>());
    assert_eq!(
      usable(POOL_SIZE) - align!(13) - HEADER_SIZE,
      vsa.largest_chunk_available()
    );
  }

  #[test]
  fn test_oversized_request_returns_null() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    assert!(vsa.alloc(POOL_SIZE).is_null());
    assert!(vsa.alloc(usable(POOL_SIZE) + 1).is_null());

    // The failed searches must not have cost any capacity.
    assert_eq!(usable(POOL_SIZE), vsa.largest_chunk_available());
  }

  #[test]
  fn test_exhaustion_after_allocations_returns_null() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let _a = vsa.alloc(64);
    let remaining = vsa.largest_chunk_available();

    assert!(vsa.alloc(remaining + 1).is_null());
    assert!(!vsa.alloc(remaining).is_null());
  }

  #[test]
  fn test_coalescing_merges_adjacent_freed_blocks() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let a = vsa.alloc(16);
    let b = vsa.alloc(16);
    let _c = vsa.alloc(16);

    unsafe {
      vsa.free(a);
      vsa.free(b);
    }

    // Bigger than either hole alone; fits once a and b merge, header
    // of b included.
    let merged = vsa.alloc(32 + HEADER_SIZE);

    assert_eq!(a, merged);
    assert_eq!(POOL_SIZE, walk_total(&vsa));
  }

  #[test]
  fn test_alloc_reuses_a_freed_block() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let a = vsa.alloc(24);
    let _b = vsa.alloc(24);

    unsafe { vsa.free(a) };

    assert_eq!(a, vsa.alloc(24));
  }

  #[test]
  fn test_allocations_do_not_overlap() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let a = vsa.alloc(32);
    let b = vsa.alloc(32);

    assert!(!a.is_null());
    assert!(!b.is_null());

    unsafe {
      ptr::write_bytes(a, 0xAA, 32);
      ptr::write_bytes(b, 0xBB, 32);

      for i in 0..32 {
        assert_eq!(0xAA, a.add(i).read());
        assert_eq!(0xBB, b.add(i).read());
      }
    }

    assert_eq!(POOL_SIZE, walk_total(&vsa));
  }

  #[test]
  fn test_no_split_when_the_remainder_cannot_hold_a_header() {
    // Pool with exactly one block of capacity 2 * HEADER_SIZE.
    let mut buf = vec![0usize; 4 * HEADER_SIZE / mem::size_of::<usize>()];
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, 4 * HEADER_SIZE) };

    // The leftover after this request equals one header, too small to
    // split off, so the whole capacity is handed out.
    let block = vsa.alloc(HEADER_SIZE);

    assert!(!block.is_null());
    assert_eq!(0, vsa.largest_chunk_available());

    unsafe { vsa.free(block) };

    assert_eq!(2 * HEADER_SIZE, vsa.largest_chunk_available());
  }

  #[test]
  fn test_header_chain_stays_intact_across_a_workload() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let a = vsa.alloc(16);
    assert_eq!(POOL_SIZE, walk_total(&vsa));

    let b = vsa.alloc(40);
    assert_eq!(POOL_SIZE, walk_total(&vsa));

    unsafe { vsa.free(a) };
    assert_eq!(POOL_SIZE, walk_total(&vsa));

    let c = vsa.alloc(8);
    assert_eq!(POOL_SIZE, walk_total(&vsa));

    unsafe {
      vsa.free(b);
      vsa.free(c);
    }

    assert_eq!(POOL_SIZE, walk_total(&vsa));
    assert_eq!(usable(POOL_SIZE), vsa.largest_chunk_available());
  }

  #[test]
  #[should_panic(expected = "allocation request must be positive")]
  fn test_zero_byte_request_is_a_contract_violation() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    vsa.alloc(0);
  }

  #[test]
  #[should_panic(expected = "pool size must be positive")]
  fn test_zero_pool_size_is_a_contract_violation() {
    let mut buf = pool_buffer();

    unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, 0) };
  }

  #[test]
  #[should_panic(expected = "does not belong to this pool")]
  fn test_freeing_a_pointer_outside_the_pool_is_detected() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let past_the_end = (buf.as_mut_ptr() as *mut u8).wrapping_add(2 * POOL_SIZE);

    unsafe { vsa.free(past_the_end) };
  }

  #[test]
  #[should_panic(expected = "not produced by this allocator")]
  fn test_freeing_a_pointer_without_a_signature_is_detected() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let block = vsa.alloc(32);

    // Inside the pool, but not behind a header this allocator wrote.
    unsafe { vsa.free(block.add(mem::size_of::<usize>())) };
  }

  #[test]
  #[should_panic(expected = "double free")]
  fn test_double_free_is_detected() {
    let mut buf = pool_buffer();
    let mut vsa = unsafe { Vsa::init(buf.as_mut_ptr() as *mut u8, POOL_SIZE) };

    let block = vsa.alloc(32);

    unsafe {
      vsa.free(block);
      vsa.free(block);
    }
  }
}
