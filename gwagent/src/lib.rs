//! The tenant agent CLI: wraps `gwclient`'s token cache and pinned
//! transport behind one subcommand per worker method (spec.md §4.6).

pub mod cli;
