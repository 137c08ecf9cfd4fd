//! # vsalloc - A Variable-Size Pool Suballocator
//!
//! This crate provides a **variable-size allocator** (VSA) that carves
//! variably-sized blocks out of one caller-supplied memory region,
//! without ever calling into a system allocator.
//!
//! ## Overview
//!
//! All bookkeeping lives inside the pool itself: every block is
//! prefixed by a fixed-size header, and the last header is a zero-size
//! sentinel marking the end of the pool.
//!
//! ```text
//!   Pool Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                       CALLER-SUPPLIED POOL                           │
//!   │                                                                      │
//!   │   ┌────┬────────┬────┬──────────────┬────┬──────────────────┬────┐   │
//!   │   │ H  │ used   │ H  │    free      │ H  │      used        │ H  │   │
//!   │   └────┴────────┴────┴──────────────┴────┴──────────────────┴────┘   │
//!   │     ▲                                                          ▲     │
//!   │     │                                                          │     │
//!   │   first header                                            sentinel   │
//!   │   (the handle)                                            (size 0)   │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   There are no next-pointers: the next header always lives at
//!   `offset + HEADER_SIZE + |size|`. The sign of the size field is
//!   the block state (positive = free, negative = used, 0 = sentinel).
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   vsalloc
//!   ├── align      - Word-alignment macro (align!)
//!   ├── header     - In-pool header record and its offset accessors (internal)
//!   └── pool       - Vsa handle: init / alloc / free / largest_chunk_available
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use vsalloc::Vsa;
//!
//! // Any word-aligned buffer works as a pool.
//! let mut pool = vec![0usize; 20]; // 160 bytes on a 64-bit machine
//! let pool_size = pool.len() * core::mem::size_of::<usize>();
//!
//! let mut vsa = unsafe { Vsa::init(pool.as_mut_ptr() as *mut u8, pool_size) };
//!
//! let block = vsa.alloc(32);
//! assert!(!block.is_null());
//!
//! unsafe {
//!     block.write_bytes(0xAB, 32);
//!     vsa.free(block);
//! }
//! ```
//!
//! ## How It Works
//!
//! Freeing a block only flips its header's sign back to positive, in
//! O(1). Merging adjacent free blocks is deferred: the next allocation
//! (or largest-chunk query) walks the header chain and, whenever a
//! free block is too small on its own, absorbs the free blocks
//! immediately following it before judging it again.
//!
//! ```text
//!   Lazy coalescing during a search for 48 bytes:
//!
//!   before   ┌────┬──────────┬────┬──────┬────┬──────┬────┐
//!            │ -32│  used    │ +16│ free │ +16│ free │  0 │
//!            └────┴──────────┴────┴──────┴────┴──────┴────┘
//!
//!   after    ┌────┬──────────┬────┬───────────────────┬────┐
//!            │ -32│  used    │ +48│       free        │  0 │
//!            └────┴──────────┴────┴───────────────────┴────┘
//!
//!   The absorbed block's header becomes payload of the survivor, so
//!   merging two 16-byte holes yields 16 + HEADER_SIZE + 16 bytes.
//! ```
//!
//! When a claimed block has more than a header's worth of spare
//! capacity, the remainder is split off as a new free block.
//! Otherwise the spare bytes ride along inside the allocation and come
//! back on free (accepted internal fragmentation).
//!
//! ## Features
//!
//! - **No system allocator**: the caller owns the backing memory
//! - **Inline bookkeeping**: headers interleave with payload, no side tables
//! - **O(1) free**: coalescing is paid only when capacity is needed
//! - **Ownership signature**: every header carries a marker that `free`
//!   verifies before trusting a caller-supplied pointer
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives
//! - **Fixed pool**: no growing or shrinking after initialization
//! - **Word alignment only**: all sizes round up to the machine word
//! - **Trusting contract**: violations (zero-size requests, foreign
//!   pointers, double frees) abort via assertion instead of returning
//!   errors; only exhaustion is reported, as a null result
//!
//! ## Safety
//!
//! The pool is raw memory, so initialization and free are `unsafe`:
//! the caller guarantees the backing region stays valid for the
//! allocator's lifetime and that freed pointers came from [`Vsa::alloc`].
//! All raw header reads and writes go through two bounds-checked
//! accessors in the `header` module; the searching, merging, and
//! splitting logic is ordinary safe code over offsets and sizes.

pub mod align;
mod header;
mod pool;

pub use header::HEADER_SIZE;
pub use pool::Vsa;
