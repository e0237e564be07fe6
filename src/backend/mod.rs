//! Backend abstraction layer
//!
//! Provides the capability trait the rendering core consumes and the types
//! shared by its implementations.

pub mod traits;
pub mod types;

#[cfg(feature = "recording")]
pub mod recording;

pub use traits::*;
pub use types::*;

/// Upper bound on error codes drained by a single poll, guards against
/// backends that report the same error forever.
const MAX_ERRORS_PER_POLL: u32 = 32;

/// Drain and log every pending backend error. Returns how many were drained.
///
/// Prefer the [`check_backend_errors!`](crate::check_backend_errors) macro,
/// which fills in the call site.
pub fn drain_errors<B: GraphicsBackend + ?Sized>(backend: &mut B, file: &str, line: u32) -> u32 {
    let mut count = 0;
    while count < MAX_ERRORS_PER_POLL {
        let Some(err) = backend.poll_error() else {
            break;
        };
        log::error!("{} error in file {} @ line {}: {}", backend.name(), file, line, err);
        count += 1;
    }
    count
}

/// Poll the backend for pending error codes and log them with the call site.
#[macro_export]
macro_rules! check_backend_errors {
    ($backend:expr) => {
        $crate::backend::drain_errors($backend, file!(), line!())
    };
}
