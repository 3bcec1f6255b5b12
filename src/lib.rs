//! Growable contiguous array built on manually managed raw storage.
//!
//! [`RawBuffer`] owns uninitialized slots and knows nothing about which of
//! them are live. [`DynamicArray`] layers element lifetime on top of it:
//! construction, destruction, geometric growth, and insertion that either
//! completes or leaves the array as it was.
//!
//! ```
//! use dynarr::DynamicArray;
//!
//! let mut array = DynamicArray::new();
//! array.push_back(1);
//! array.push_back(3);
//! array.insert(1, 2);
//! assert_eq!(&[1, 2, 3][..], &array[..]);
//! assert_eq!(4, array.capacity());
//!
//! array.erase(0);
//! assert_eq!(&[2, 3][..], &array[..]);
//! ```

mod logging;
mod error;
mod raw;
mod array;
mod iter;

pub use error::{AllocError, Error};
pub use raw::RawBuffer;
pub use array::DynamicArray;
pub use iter::IntoIter;

#[cfg(test)]
pub mod dropflag;
