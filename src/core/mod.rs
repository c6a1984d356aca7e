//! Core Engine Modules
//!
//! Pure computation over an in-memory dataset; no file or network I/O.

pub mod decomposition;
