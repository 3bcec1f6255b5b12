use std::convert::Infallible;
use std::mem;
use std::ops::{Deref, DerefMut};

use crate::error::{infallible, AllocError, Error};
use crate::raw::RawBuffer;

/// Growable contiguous array of `T`.
///
/// Slots `[0, len)` of the owned `RawBuffer` hold live values, slots
/// `[len, capacity)` are uninitialized. Capacity grows geometrically when an
/// element is added to a full array, and exactly when `reserve` or `resize`
/// asks for more. It is never reduced in place.
///
/// `reserve`, emplace and copy assignment into a too-small array leave the
/// array exactly as it was when they fail: new storage is fully prepared
/// before the old one is touched. Resize and copy assignment that reuses the
/// current storage only leave it valid: capacity reserved or elements
/// already assigned by the failed call stay. In every case values
/// constructed by a call that later fails are destroyed before the error
/// (or panic) propagates, so nothing leaks.
pub struct DynamicArray<T> {
    buffer: RawBuffer<T>,
    len: usize,
}

impl<T> DynamicArray<T> {
    /// Capacity multiplier applied when a full array grows by one element.
    pub const GROWTH_FACTOR: usize = 2;

    /// Capacity of the first allocation made by a growing empty array.
    pub const MIN_NON_ZERO_CAP: usize = 1;

    /// Empty array, no allocation.
    pub const fn new() -> DynamicArray<T> {
        DynamicArray {
            buffer: RawBuffer::new(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> DynamicArray<T> {
        DynamicArray {
            buffer: RawBuffer::allocate(capacity),
            len: 0,
        }
    }

    pub fn try_with_capacity(capacity: usize) -> Result<DynamicArray<T>, AllocError> {
        Ok(DynamicArray {
            buffer: RawBuffer::try_allocate(capacity)?,
            len: 0,
        })
    }

    /// Array of `len` default values, with capacity exactly `len`.
    pub fn with_len(len: usize) -> DynamicArray<T> where T: Default {
        let mut array = DynamicArray::new();
        array.resize(len);
        array
    }

    /// Array of `len` clones of `value`, with capacity exactly `len`.
    pub fn from_elem(len: usize, value: &T) -> DynamicArray<T> where T: Clone {
        let mut array = DynamicArray::with_capacity(len);
        infallible(array.construct_tail(len, |_| Ok(value.clone())).map_err(Error::Element));
        array
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// True when the next added element forces a relocation.
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len == self.buffer.capacity()
    }

    #[inline(always)]
    pub fn as_ptr(&self) -> *const T {
        self.buffer.as_ptr()
    }

    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.buffer.as_mut_ptr()
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.buffer.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.buffer.as_mut_ptr(), self.len) }
    }

    /// # Safety
    ///
    /// `index < len()`. Only checked in debug builds.
    #[inline(always)]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(index < self.len, "index {} out of range for length {}", index, self.len);
        self.buffer.get_unchecked(index)
    }

    /// # Safety
    ///
    /// `index < len()`. Only checked in debug builds.
    #[inline(always)]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.len, "index {} out of range for length {}", index, self.len);
        self.buffer.get_unchecked_mut(index)
    }

    /// Moves storage and elements into a new array, leaving this one empty
    /// with zero capacity.
    pub fn take(&mut self) -> DynamicArray<T> {
        let len = mem::replace(&mut self.len, 0);
        DynamicArray {
            buffer: self.buffer.take(),
            len,
        }
    }

    /// Exchanges storage and elements with `other`. Named apart from the
    /// slice's element `swap`.
    pub fn swap_with(&mut self, other: &mut DynamicArray<T>) {
        self.buffer.swap(&mut other.buffer);
        mem::swap(&mut self.len, &mut other.len);
    }

    /// Ensures capacity for at least `capacity` elements.
    ///
    /// Does nothing if the capacity is already sufficient. Otherwise storage
    /// for exactly `capacity` elements is allocated and the elements are
    /// relocated into it. On failure the array is unchanged.
    pub fn try_reserve(&mut self, capacity: usize) -> Result<(), AllocError> {
        if capacity <= self.buffer.capacity() {
            return Ok(());
        }

        let mut relocated = RawBuffer::try_allocate(capacity)?;
        debug!("reserve: relocating {} elements, capacity {} -> {}", self.len, self.buffer.capacity(), capacity);
        unsafe { self.buffer.relocate(0, self.len, &mut relocated, 0) };
        self.buffer.swap(&mut relocated);
        Ok(())
    }

    pub fn reserve(&mut self, capacity: usize) {
        if let Err(e) = self.try_reserve(capacity) {
            e.handle()
        }
    }

    /// Makes room for `additional` more elements, at least doubling the
    /// capacity when it has to grow.
    fn reserve_amortized(&mut self, additional: usize) {
        let required = match self.len.checked_add(additional) {
            Some(required) => required,
            None => AllocError::CapacityOverflow { requested: usize::MAX }.handle(),
        };
        if required > self.buffer.capacity() {
            let doubled = self.buffer.capacity().saturating_mul(Self::GROWTH_FACTOR);
            self.reserve(required.max(doubled));
        }
    }

    /// Resizes to `new_len`, default-constructing new elements.
    pub fn resize(&mut self, new_len: usize) where T: Default {
        self.resize_with(new_len, T::default)
    }

    pub fn resize_with<F>(&mut self, new_len: usize, mut f: F) where F: FnMut() -> T {
        infallible(self.try_resize_with(new_len, || Ok::<T, Infallible>(f())))
    }

    /// Resizes to `new_len`.
    ///
    /// Growing reserves exactly `new_len` and constructs the new elements
    /// with `f`. If `f` fails, the elements it already produced are destroyed
    /// and the length is unchanged; the capacity keeps its new value.
    /// Shrinking destroys the tail and keeps the capacity.
    pub fn try_resize_with<E, F>(&mut self, new_len: usize, mut f: F) -> Result<(), Error<E>>
        where F: FnMut() -> Result<T, E>
    {
        if new_len <= self.len {
            self.truncate(new_len);
            return Ok(());
        }
        self.try_reserve(new_len)?;
        self.construct_tail(new_len - self.len, |_| f())
            .map_err(Error::Element)
    }

    /// Destroys elements past `len`. Capacity is unchanged.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let old_len = mem::replace(&mut self.len, len);
        unsafe { self.buffer.drop_range(len, old_len) };
    }

    pub fn clear(&mut self) {
        self.truncate(0)
    }

    /// Constructs `count` elements past the end with `f(i)`, `i` counting
    /// from zero. Capacity must already be sufficient.
    fn construct_tail<E, F>(&mut self, count: usize, mut f: F) -> Result<(), E>
        where F: FnMut(usize) -> Result<T, E>
    {
        debug_assert!(self.len + count <= self.buffer.capacity());
        let mut tail = TailGuard {
            buffer: &mut self.buffer,
            start: self.len,
            end: self.len,
        };
        for i in 0..count {
            let value = f(i)?;
            unsafe { tail.buffer.write(tail.end, value) };
            tail.end += 1;
        }
        let end = tail.end;
        mem::forget(tail);
        self.len = end;
        Ok(())
    }

    pub fn push_back(&mut self, value: T) {
        self.emplace_back(move || value);
    }

    pub fn try_push_back(&mut self, value: T) -> Result<(), AllocError> {
        match self.try_emplace_back(move || Ok::<T, Infallible>(value)) {
            Ok(_) => Ok(()),
            Err(Error::Alloc(e)) => Err(e),
            Err(Error::Element(never)) => match never {},
        }
    }

    pub fn emplace_back<F>(&mut self, f: F) -> &mut T where F: FnOnce() -> T {
        self.emplace(self.len, f)
    }

    pub fn try_emplace_back<E, F>(&mut self, f: F) -> Result<&mut T, Error<E>>
        where F: FnOnce() -> Result<T, E>
    {
        self.try_emplace(self.len, f)
    }

    /// Removes the last element, `None` if the array is empty.
    pub fn pop_back(&mut self) -> Option<T> {
        if self.len == 0 {
            None
        } else {
            self.len -= 1;
            Some(unsafe { self.buffer.read(self.len) })
        }
    }

    pub fn insert(&mut self, index: usize, value: T) -> &mut T {
        self.emplace(index, move || value)
    }

    pub fn insert_cloned(&mut self, index: usize, value: &T) -> &mut T where T: Clone {
        self.emplace(index, || value.clone())
    }

    pub fn emplace<F>(&mut self, index: usize, f: F) -> &mut T where F: FnOnce() -> T {
        infallible(self.try_emplace(index, || Ok::<T, Infallible>(f())))
    }

    /// Inserts the value produced by `f` at `index`, shifting the following
    /// elements toward the end.
    ///
    /// A full array relocates into storage of twice its length (at least
    /// one slot). If `f` fails, the array is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn try_emplace<E, F>(&mut self, index: usize, f: F) -> Result<&mut T, Error<E>>
        where F: FnOnce() -> Result<T, E>
    {
        assert!(index <= self.len, "emplace position {} out of range for length {}", index, self.len);

        if self.is_full() {
            self.emplace_with_relocation(index, f)?;
        } else {
            self.emplace_without_relocation(index, f)?;
        }
        self.len += 1;
        Ok(unsafe { self.buffer.get_unchecked_mut(index) })
    }

    fn grown_capacity(len: usize) -> Result<usize, AllocError> {
        if len == 0 {
            return Ok(Self::MIN_NON_ZERO_CAP);
        }
        len.checked_mul(Self::GROWTH_FACTOR)
            .ok_or(AllocError::CapacityOverflow { requested: len })
    }

    fn emplace_with_relocation<E, F>(&mut self, index: usize, f: F) -> Result<(), Error<E>>
        where F: FnOnce() -> Result<T, E>
    {
        let capacity = Self::grown_capacity(self.len)?;
        let mut relocated = RawBuffer::try_allocate(capacity)?;
        // the new element goes straight into its final slot; until the
        // relocation below, nothing in the current buffer has been touched
        let value = f().map_err(Error::Element)?;
        debug!("emplace: relocating {} elements, capacity {} -> {}", self.len, self.buffer.capacity(), capacity);
        unsafe {
            relocated.write(index, value);
            self.buffer.relocate(0, index, &mut relocated, 0);
            self.buffer.relocate(index, self.len - index, &mut relocated, index + 1);
        }
        self.buffer.swap(&mut relocated);
        Ok(())
    }

    fn emplace_without_relocation<E, F>(&mut self, index: usize, f: F) -> Result<(), Error<E>>
        where F: FnOnce() -> Result<T, E>
    {
        let value = f().map_err(Error::Element)?;
        unsafe {
            if index < self.len {
                self.buffer.shift(index, index + 1, self.len - index);
            }
            self.buffer.write(index, value);
        }
        Ok(())
    }

    /// Destroys the element at `index` and closes the gap. Returns `index`,
    /// now the position of the element that followed the erased one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn erase(&mut self, index: usize) -> usize {
        drop(self.remove(index));
        index
    }

    /// Removes and returns the element at `index`, closing the gap.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&mut self, index: usize) -> T {
        assert!(index < self.len, "erase position {} out of range for length {}", index, self.len);
        unsafe {
            let value = self.buffer.read(index);
            self.buffer.shift(index + 1, index, self.len - index - 1);
            self.len -= 1;
            value
        }
    }

    /// Appends clones of `items`.
    pub fn extend_from_slice(&mut self, items: &[T]) where T: Clone {
        self.reserve_amortized(items.len());
        infallible(self.construct_tail(items.len(), |i| Ok(items[i].clone())).map_err(Error::Element));
    }

    pub(crate) fn into_raw_parts(mut self) -> (RawBuffer<T>, usize) {
        let len = mem::replace(&mut self.len, 0);
        (self.buffer.take(), len)
    }
}

/// Elements constructed past the live range by the current call.
/// Dropping the guard destroys them, which unwinds a failed construction.
struct TailGuard<'a, T> {
    buffer: &'a mut RawBuffer<T>,
    start: usize,
    end: usize,
}

impl<'a, T> Drop for TailGuard<'a, T> {
    fn drop(&mut self) {
        unsafe { self.buffer.drop_range(self.start, self.end) };
    }
}

impl<T> Drop for DynamicArray<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Default for DynamicArray<T> {
    fn default() -> Self {
        DynamicArray::new()
    }
}

impl<T: Clone> Clone for DynamicArray<T> {
    /// Element-wise copy with capacity equal to the source length.
    fn clone(&self) -> Self {
        let mut copy: DynamicArray<T> = DynamicArray::with_capacity(self.len);
        copy.extend_from_slice(self.as_slice());
        copy
    }

    /// Copy assignment.
    ///
    /// When `source` does not fit the current capacity, a full copy is built
    /// first and swapped in, so a panicking clone leaves `self` untouched.
    /// Otherwise the storage is reused: the common prefix is assigned in
    /// place, then the tail is destroyed or cloned to match `source`. A clone
    /// panicking in the tail keeps the assigned prefix and drops the partial
    /// tail.
    fn clone_from(&mut self, source: &Self) {
        if source.len > self.buffer.capacity() {
            let mut copy = source.clone();
            self.swap_with(&mut copy);
            return;
        }

        let common = self.len.min(source.len);
        for (target, item) in self.as_mut_slice()[..common].iter_mut().zip(&source[..common]) {
            target.clone_from(item);
        }
        if source.len < self.len {
            self.truncate(source.len);
        } else {
            let tail = &source[common..];
            infallible(self.construct_tail(tail.len(), |i| Ok(tail[i].clone())).map_err(Error::Element));
        }
    }
}

impl<T> Deref for DynamicArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for DynamicArray<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> std::fmt::Debug for DynamicArray<T> where T: std::fmt::Debug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for DynamicArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for DynamicArray<T> {}

impl<T> Extend<T> for DynamicArray<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve_amortized(lower);
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<T> std::iter::FromIterator<T> for DynamicArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut array = DynamicArray::new();
        array.extend(iter);
        array
    }
}

impl<'a, T> IntoIterator for &'a DynamicArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut DynamicArray<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
