use std::alloc::{handle_alloc_error, Layout};
use std::convert::Infallible;

use thiserror::Error;

/// Failure to obtain storage for a `RawBuffer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The requested slot count does not fit into a valid allocation layout.
    #[error("capacity overflow: {requested} slots exceed the maximum allocation size")]
    CapacityOverflow { requested: usize },
    /// The global allocator returned null.
    #[error("out of memory: failed to allocate {} bytes", .layout.size())]
    OutOfMemory { layout: Layout },
}

impl AllocError {
    /// Diverges the way `Vec` does: panic on overflow, abort through the
    /// allocation error hook when memory is exhausted.
    pub(crate) fn handle(self) -> ! {
        match self {
            AllocError::CapacityOverflow { requested } => {
                panic!("capacity overflow: {} slots requested", requested)
            }
            AllocError::OutOfMemory { layout } => handle_alloc_error(layout),
        }
    }
}

/// Error returned by fallible container operations that run a user constructor.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error<E> {
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// The element constructor reported a failure. The container is unchanged.
    #[error("element construction failed: {0}")]
    Element(E),
}

pub(crate) fn infallible<R>(result: Result<R, Error<Infallible>>) -> R {
    match result {
        Ok(value) => value,
        Err(Error::Alloc(e)) => e.handle(),
        Err(Error::Element(never)) => match never {},
    }
}
