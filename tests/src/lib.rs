//! # turnstile-tests
//!
//! Workspace-level integration suite: full channel lifecycles driven through
//! the scheduler, over an in-process transport with configurable loss and
//! latency, against the in-memory mock chain.

pub mod support;

#[cfg(test)]
mod integration;
