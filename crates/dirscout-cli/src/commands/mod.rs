//! Command implementations.

pub mod index;
pub mod invalidate;
pub mod refresh;
pub mod resolve;
pub mod set_path;
pub mod status;
