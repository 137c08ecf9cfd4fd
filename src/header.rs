use std::mem;

/// Size in bytes of one in-pool header.
///
/// Every block pays this once, and the pool pays it once more for the
/// terminating sentinel.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

/// Ownership marker written into every header this allocator creates.
/// `free` checks it before trusting a caller-supplied pointer.
pub(crate) const SIGNATURE: usize = 0xDEAD_BEEF;

/// In-place record placed at the start of every block and, with size
/// zero, at the pool's terminating sentinel.
///
/// The sign of `size` encodes the block state, so there is no separate
/// free list: positive = free, negative = allocated, zero = sentinel.
/// The magnitude counts usable payload bytes only; advancing to the
/// next header adds `HEADER_SIZE` on top of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub(crate) struct Header {
  size: isize,
  signature: usize,
}

impl Header {
  pub(crate) fn free(payload: usize) -> Self {
    Self {
      size: payload as isize,
      signature: SIGNATURE,
    }
  }

  pub(crate) fn allocated(payload: usize) -> Self {
    Self {
      size: -(payload as isize),
      signature: SIGNATURE,
    }
  }

  pub(crate) fn sentinel() -> Self {
    Self {
      size: 0,
      signature: SIGNATURE,
    }
  }

  pub(crate) fn is_free(&self) -> bool {
    self.size > 0
  }

  pub(crate) fn is_allocated(&self) -> bool {
    self.size < 0
  }

  pub(crate) fn is_sentinel(&self) -> bool {
    self.size == 0
  }

  /// Usable payload bytes behind this header, header excluded.
  pub(crate) fn payload(&self) -> usize {
    self.size.unsigned_abs()
  }

  pub(crate) fn carries_signature(&self) -> bool {
    self.signature == SIGNATURE
  }
}

/// Reads the header stored at `offset` bytes into the pool.
///
/// # Safety
///
/// `base` must point to a pool of at least `len` bytes that is valid
/// for reads for the allocator's lifetime. The offset itself is
/// bounds- and alignment-checked here.
pub(crate) unsafe fn read(
  base: *const u8,
  len: usize,
  offset: usize,
) -> Header {
  check_offset(len, offset);

  unsafe { (base.add(offset) as *const Header).read() }
}

/// Writes a header at `offset` bytes into the pool.
///
/// # Safety
///
/// `base` must point to a pool of at least `len` bytes that is valid
/// for writes for the allocator's lifetime. The offset itself is
/// bounds- and alignment-checked here.
pub(crate) unsafe fn write(
  base: *mut u8,
  len: usize,
  offset: usize,
  header: Header,
) {
  check_offset(len, offset);

  unsafe { (base.add(offset) as *mut Header).write(header) }
}

fn check_offset(len: usize, offset: usize) {
  assert!(
    offset % mem::align_of::<Header>() == 0,
    "header offset {} is not word aligned",
    offset
  );
  assert!(
    offset + HEADER_SIZE <= len,
    "header offset {} is outside the pool",
    offset
  );
}
