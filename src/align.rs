/// Rounds the given size up to the nearest machine-word multiple.
///
/// Every size the allocator touches goes through this macro: the pool
/// size at initialization and each allocation request. Because every
/// block's rounded payload plus the header size is itself a word
/// multiple, headers always land on word-aligned offsets.
///
/// # Examples
///
/// ```rust
/// use vsalloc::align;
///
/// match core::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + core::mem::size_of::<usize>() - 1) & !(core::mem::size_of::<usize>() - 1)
  };
}
