//! Fee Rebuild Module
//!
//! Replace-by-fee bumping of an exported state without network access.

mod rebuild;

#[cfg(test)]
mod tests;

pub use rebuild::*;
