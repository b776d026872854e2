//! # `gwstd`
//!
//! This crate contains "std extensions" which other gateway crates can use
//! without having to pull in any dependencies.
//!
//! Traits, macros, copies of unstable `std` APIs, a small number of types, are
//! all fair game so long as they do NOT depend on anything outside of [`std`].

/// Exponential backoff sequences for the transport retry loop.
pub mod backoff;
/// Utilities for use in `const` fns and expressions.
pub mod const_utils;
