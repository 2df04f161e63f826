//! Transport service layer.

pub mod registry;
