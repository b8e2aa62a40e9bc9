//! # bytemut
//!
//! `bytemut` is a bytecode mutation-testing core organized around:
//! - `bytecode`: a stack-based intermediate code, its codec and a small hot-swappable runtime
//! - `engine`: mutation identity, the operator framework and the return-value operator
//! - `worker`: the isolated mutant execution worker and its wire protocol (feature `worker`)
//! - `testkit`: proptest strategies, laws and fixtures (feature `testkit`)
//!
//! Discovering classes, scheduling batches across workers and reporting belong to the
//! orchestrator, not to this crate.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

pub mod bytecode;
pub mod engine;
pub mod prelude;

#[cfg(feature = "worker")]
#[cfg_attr(docsrs, doc(cfg(feature = "worker")))]
pub mod logging;

#[cfg(feature = "worker")]
#[cfg_attr(docsrs, doc(cfg(feature = "worker")))]
pub mod worker;

#[cfg(feature = "testkit")]
#[cfg_attr(docsrs, doc(cfg(feature = "testkit")))]
pub mod testkit;

/// Re-export `proptest` for convenience.
#[cfg(feature = "testkit")]
pub use proptest;
