use std::io::Read;

use libc::{c_void, free, malloc};
use vsalloc::{HEADER_SIZE, Vsa};

const POOL_SIZE: usize = 160;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect the pool with `gdb` or just follow
/// how each call reshapes the header chain.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_largest(
  label: &str,
  vsa: &mut Vsa,
) {
  println!(
    "[{}] largest chunk available = {} bytes",
    label,
    vsa.largest_chunk_available()
  );
}

fn main() {
  // The pool is plain caller-owned memory; the allocator never asks
  // the system for more. malloc returns word-aligned memory, which is
  // all the pool contract requires.
  let pool = unsafe { malloc(POOL_SIZE) } as *mut u8;
  assert!(!pool.is_null(), "could not allocate the backing pool");

  println!(
    "Managing a {} byte pool at {:?} (header = {} bytes)",
    POOL_SIZE, pool, HEADER_SIZE
  );

  let mut vsa = unsafe { Vsa::init(pool, POOL_SIZE) };

  // --------------------------------------------------------------------
  // 1) Fresh pool: one free block spanning everything except the first
  //    header and the sentinel.
  // --------------------------------------------------------------------
  println!("\n[1] Initialized");
  print_largest("1", &mut vsa);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Allocate 32 bytes. The free block is split: 32 bytes (plus its
  //    header) go to us, the remainder becomes a smaller free block.
  // --------------------------------------------------------------------
  let first_block = vsa.alloc(32);
  println!("\n[2] Allocate 32 bytes -> {:?}", first_block);

  // Write something into the block to show it is usable.
  unsafe { first_block.write_bytes(0xAB, 32) };
  println!("[2] Filled the block with 0xAB");
  print_largest("2", &mut vsa);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Allocate 40 more bytes, then 13. Odd sizes round up to the
  //    machine word, so 13 costs the same as 16.
  // --------------------------------------------------------------------
  let second_block = vsa.alloc(40);
  let third_block = vsa.alloc(13);
  println!("\n[3] Allocate 40 -> {:?}, allocate 13 -> {:?}", second_block, third_block);
  print_largest("3", &mut vsa);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Free the first two blocks. Free is O(1): the headers just flip
  //    back to "free", nothing merges yet.
  // --------------------------------------------------------------------
  unsafe {
    vsa.free(first_block);
    vsa.free(second_block);
  }
  println!("\n[4] Freed the 32 and 40 byte blocks (no merging yet)");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Ask for more than either hole holds on its own. The search
  //    merges the two adjacent holes (their shared header becomes
  //    payload) and the request fits where the first block used to be.
  // --------------------------------------------------------------------
  let merged_block = vsa.alloc(72 + HEADER_SIZE);
  println!("\n[5] Allocate {} -> {:?}", 72 + HEADER_SIZE, merged_block);
  println!(
    "[5] merged_block == first_block? {}",
    if merged_block == first_block {
      "Yes, the freed neighbors were coalesced"
    } else {
      "No, it was placed elsewhere"
    }
  );
  print_largest("5", &mut vsa);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Exhaustion: a request bigger than all free space combined
  //    fails with a null pointer. That is the only recoverable error
  //    in the interface.
  // --------------------------------------------------------------------
  let too_big = vsa.alloc(POOL_SIZE);
  println!("\n[6] Allocate {} -> {:?} (null means exhausted)", POOL_SIZE, too_big);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 7) Free everything. The pool reports its full capacity again.
  // --------------------------------------------------------------------
  unsafe {
    vsa.free(merged_block);
    vsa.free(third_block);
    vsa.free(too_big); // null, a no-op
  }
  println!("\n[7] Freed every block");
  print_largest("7", &mut vsa);

  // --------------------------------------------------------------------
  // 8) End of demo. The allocator holds no state outside the pool, so
  //    handing the memory back to the system is all the cleanup there is.
  // --------------------------------------------------------------------
  unsafe { free(pool as *mut c_void) };
  println!("\n[8] End of example. Backing pool returned to the system.");
}
