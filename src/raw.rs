use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use crate::error::AllocError;

/// Owned block of uninitialized storage for `capacity` values of `T`.
///
/// The buffer never constructs or destroys values on its own. Which slots
/// hold live values is tracked by the owner, which must destroy them before
/// the buffer is dropped; dropping the buffer only releases the block.
///
/// A buffer is never resized in place and can not be cloned. Growing means
/// allocating a new buffer, relocating values into it and swapping.
pub struct RawBuffer<T> {
    ptr: NonNull<T>,
    capacity: usize,
    _owns: PhantomData<T>,
}

unsafe impl<T: Send> Send for RawBuffer<T> {}
unsafe impl<T: Sync> Sync for RawBuffer<T> {}

impl<T> RawBuffer<T> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Empty buffer, no allocation.
    pub const fn new() -> RawBuffer<T> {
        RawBuffer {
            ptr: NonNull::dangling(),
            capacity: 0,
            _owns: PhantomData,
        }
    }

    /// Allocates storage for exactly `capacity` slots.
    ///
    /// Zero capacity and zero-sized `T` never touch the allocator.
    pub fn try_allocate(capacity: usize) -> Result<RawBuffer<T>, AllocError> {
        if capacity == 0 || Self::IS_ZST {
            return Ok(RawBuffer {
                ptr: NonNull::dangling(),
                capacity,
                _owns: PhantomData,
            });
        }

        let layout = Layout::array::<T>(capacity)
            .map_err(|_| AllocError::CapacityOverflow { requested: capacity })?;
        let ptr = unsafe { alloc::alloc(layout) } as *mut T;
        let ptr = NonNull::new(ptr).ok_or(AllocError::OutOfMemory { layout })?;

        trace!(target: "dynarr::raw", "allocated {} slots ({} bytes) at {:p}", capacity, layout.size(), ptr);

        Ok(RawBuffer {
            ptr,
            capacity,
            _owns: PhantomData,
        })
    }

    /// Same as `try_allocate`, but panics on capacity overflow and aborts
    /// through `handle_alloc_error` when the allocator fails.
    pub fn allocate(capacity: usize) -> RawBuffer<T> {
        match Self::try_allocate(capacity) {
            Ok(buffer) => buffer,
            Err(e) => e.handle(),
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Pointer to slot `offset`. One past the last slot is allowed.
    #[inline(always)]
    pub fn slot(&self, offset: usize) -> *mut T {
        debug_assert!(offset <= self.capacity, "slot {} out of capacity {}", offset, self.capacity);
        self.ptr.as_ptr().wrapping_add(offset)
    }

    /// # Safety
    ///
    /// `index < capacity` and the slot holds a live value.
    #[inline(always)]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(index < self.capacity, "index {} out of capacity {}", index, self.capacity);
        &*self.slot(index)
    }

    /// # Safety
    ///
    /// `index < capacity` and the slot holds a live value.
    #[inline(always)]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.capacity, "index {} out of capacity {}", index, self.capacity);
        &mut *self.slot(index)
    }

    /// Constructs `value` in slot `index`.
    ///
    /// # Safety
    ///
    /// `index < capacity`. A live value already in the slot is overwritten
    /// without being destroyed.
    #[inline(always)]
    pub unsafe fn write(&mut self, index: usize, value: T) {
        debug_assert!(index < self.capacity, "index {} out of capacity {}", index, self.capacity);
        ptr::write(self.slot(index), value);
    }

    /// Moves the value out of slot `index`, leaving the slot uninitialized.
    ///
    /// # Safety
    ///
    /// `index < capacity` and the slot holds a live value, which the caller
    /// must treat as moved-from afterwards.
    #[inline(always)]
    pub unsafe fn read(&self, index: usize) -> T {
        debug_assert!(index < self.capacity, "index {} out of capacity {}", index, self.capacity);
        ptr::read(self.slot(index))
    }

    /// Destroys the value in slot `index`.
    ///
    /// # Safety
    ///
    /// `index < capacity` and the slot holds a live value.
    #[inline(always)]
    pub unsafe fn drop_in_place(&mut self, index: usize) {
        debug_assert!(index < self.capacity, "index {} out of capacity {}", index, self.capacity);
        ptr::drop_in_place(self.slot(index));
    }

    /// Destroys the values in slots `[start, end)`.
    ///
    /// # Safety
    ///
    /// `start <= end <= capacity` and every slot in the range holds a live value.
    pub unsafe fn drop_range(&mut self, start: usize, end: usize) {
        debug_assert!(start <= end && end <= self.capacity, "range {}..{} out of capacity {}", start, end, self.capacity);
        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.slot(start), end - start));
    }

    /// Bitwise moves `count` values starting at `start` into `target`,
    /// starting at `target_start`. The source slots become uninitialized.
    ///
    /// # Safety
    ///
    /// Both ranges lie within their buffer's capacity, the source slots are
    /// live and the target slots are uninitialized.
    pub unsafe fn relocate(&self, start: usize, count: usize, target: &mut RawBuffer<T>, target_start: usize) {
        debug_assert!(start + count <= self.capacity);
        debug_assert!(target_start + count <= target.capacity);
        ptr::copy_nonoverlapping(self.slot(start), target.slot(target_start), count);
    }

    /// Bitwise moves `count` values from `from` to `to` within this buffer.
    /// The ranges may overlap.
    ///
    /// # Safety
    ///
    /// Both ranges lie within capacity. After the call the caller must treat
    /// the destination range as live and the uncovered part of the source
    /// range as uninitialized.
    pub unsafe fn shift(&mut self, from: usize, to: usize, count: usize) {
        debug_assert!(from + count <= self.capacity);
        debug_assert!(to + count <= self.capacity);
        ptr::copy(self.slot(from), self.slot(to), count);
    }

    /// Exchanges the blocks of two buffers.
    #[inline(always)]
    pub fn swap(&mut self, other: &mut RawBuffer<T>) {
        mem::swap(&mut self.ptr, &mut other.ptr);
        mem::swap(&mut self.capacity, &mut other.capacity);
    }

    /// Transfers the block into a fresh buffer and leaves this one empty.
    ///
    /// The receiving buffer is always new, so no block can be released
    /// while it still holds values.
    #[inline(always)]
    pub fn take(&mut self) -> RawBuffer<T> {
        mem::replace(self, RawBuffer::new())
    }
}

impl<T> Default for RawBuffer<T> {
    fn default() -> Self {
        RawBuffer::new()
    }
}

impl<T> Drop for RawBuffer<T> {
    fn drop(&mut self) {
        if self.capacity == 0 || Self::IS_ZST {
            return;
        }
        trace!(target: "dynarr::raw", "released {} slots at {:p}", self.capacity, self.ptr);
        // the same layout was validated by `try_allocate`
        unsafe {
            let layout = Layout::from_size_align_unchecked(
                mem::size_of::<T>() * self.capacity,
                mem::align_of::<T>(),
            );
            alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout);
        }
    }
}

impl<T> std::fmt::Debug for RawBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBuffer")
            .field("ptr", &self.ptr)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod raw_tests {
    use super::RawBuffer;
    use crate::dropflag::{Counters, Tracked};
    use crate::AllocError;

    #[test]
    fn zero_capacity_is_empty() {
        let buffer = RawBuffer::<u64>::allocate(0);
        assert_eq!(0, buffer.capacity());
        assert_eq!(RawBuffer::<u64>::new().as_ptr(), buffer.as_ptr());
    }

    #[test]
    fn allocates_requested_slots() {
        let mut buffer = RawBuffer::<u64>::allocate(8);
        assert_eq!(8, buffer.capacity());
        for i in 0..8 {
            unsafe { buffer.write(i, i as u64 * 10) };
        }
        for i in 0..8 {
            assert_eq!(i as u64 * 10, unsafe { *buffer.get_unchecked(i) });
        }
    }

    #[test]
    fn slot_is_aligned() {
        let buffer = RawBuffer::<u128>::allocate(3);
        for i in 0..=3 {
            assert_eq!(0, buffer.slot(i) as usize % std::mem::align_of::<u128>());
        }
    }

    #[test]
    fn overflowing_capacity_is_reported() {
        let result = RawBuffer::<u64>::try_allocate(usize::MAX / 2);
        assert_eq!(
            Some(AllocError::CapacityOverflow { requested: usize::MAX / 2 }),
            result.err()
        );
    }

    #[test]
    fn zero_sized_values_need_no_allocation() {
        let mut buffer = RawBuffer::<()>::allocate(usize::MAX);
        assert_eq!(usize::MAX, buffer.capacity());
        unsafe {
            buffer.write(12, ());
            buffer.read(12);
        }
    }

    #[test]
    fn swap_exchanges_blocks() {
        let mut a = RawBuffer::<i32>::allocate(2);
        let mut b = RawBuffer::<i32>::allocate(5);
        let (pa, pb) = (a.as_ptr(), b.as_ptr());
        a.swap(&mut b);
        assert_eq!((5, pb), (a.capacity(), a.as_ptr()));
        assert_eq!((2, pa), (b.capacity(), b.as_ptr()));
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut source = RawBuffer::<i32>::allocate(4);
        let address = source.as_ptr();
        let taken = source.take();
        assert_eq!((4, address), (taken.capacity(), taken.as_ptr()));
        assert_eq!(0, source.capacity());
    }

    #[test]
    fn dropping_buffer_does_not_destroy_values() {
        let counters = Counters::shared();
        let mut buffer = RawBuffer::allocate(2);
        unsafe { buffer.write(0, Tracked::new(1, &counters)) };
        let value = unsafe { buffer.read(0) };
        drop(buffer);
        assert_eq!(1, counters.borrow().live());
        drop(value);
        assert_eq!(0, counters.borrow().live());
    }

    #[test]
    fn drop_range_destroys_only_range() {
        let counters = Counters::shared();
        let mut buffer = RawBuffer::allocate(4);
        for i in 0..4 {
            unsafe { buffer.write(i, Tracked::new(i as i32, &counters)) };
        }
        unsafe { buffer.drop_range(1, 3) };
        assert_eq!(2, counters.borrow().destroyed);
        unsafe {
            buffer.drop_in_place(0);
            buffer.drop_in_place(3);
        }
        assert_eq!(0, counters.borrow().live());
    }

    #[test]
    fn relocate_and_shift_move_bits() {
        let mut source = RawBuffer::<i32>::allocate(3);
        let mut target = RawBuffer::<i32>::allocate(6);
        unsafe {
            for i in 0..3 {
                source.write(i, i as i32 + 1);
            }
            source.relocate(0, 3, &mut target, 1);
            target.shift(1, 3, 3);
            assert_eq!([1, 2, 3], [*target.get_unchecked(3), *target.get_unchecked(4), *target.get_unchecked(5)]);
        }
    }
}
