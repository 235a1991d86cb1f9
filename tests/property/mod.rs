//! Property-based tests

pub mod ledger;
