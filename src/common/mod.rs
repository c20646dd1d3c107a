//! Shared utilities used by the binary and the library.

pub mod logger;
