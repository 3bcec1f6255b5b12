#![macro_use]

// Records go to the `dynarr` target unless one is given. Without the
// `logging` feature the macros expand to nothing.

/// Buffer relocations.
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => (
        #[cfg(feature = "logging")]
        log::debug!(target: $target, $($arg)+);
    );
    ($($arg:tt)+) => (
        #[cfg(feature = "logging")]
        log::debug!(target: "dynarr", $($arg)+);
    )
}

/// Raw block allocation and release.
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => (
        #[cfg(feature = "logging")]
        log::trace!(target: $target, $($arg)+);
    );
    ($($arg:tt)+) => (
        #[cfg(feature = "logging")]
        log::trace!(target: "dynarr", $($arg)+);
    )
}
