//! Stream adapters.

pub mod framing;

pub use framing::{read_envelope, read_frame, write_envelope, write_frame};
