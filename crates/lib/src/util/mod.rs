//! Shared utilities.
//!
//! Bounded output capture plus test helpers.

pub mod tail;

#[cfg(test)]
pub mod testutil;
