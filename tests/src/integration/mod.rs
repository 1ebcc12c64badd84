//! End-to-end scenarios.

mod direct_funding;
mod dispute;
mod indirect_funding;
