//! # callscope
//!
//! Call-tree reconstruction and querying for instrumented processes.
//!
//! An external agent instruments a target process and emits an ordered
//! event stream (method enters/leaves, tail calls, managed/unmanaged
//! transitions, exceptions, metadata). callscope turns that stream into
//! one append-only call tree per thread ([`reconstruct`]), tracks exception
//! lifecycles alongside, and answers queries over the finished forest with
//! a parallel classification pass and a cloning rebuild pass ([`filter`]).
//!
//! - [`session`] owns the live side: a dispatch worker draining the event
//!   transport, a watchdog for dead targets, and a cancellable watch queue
//!   of frames as they appear.
//! - [`export`] round-trips forests through a JSON document.
//! - [`display`] renders forests and query results as indented text.

pub mod cli;
pub mod display;
pub mod domain;
pub mod export;
pub mod filter;
pub mod frame;
pub mod reconstruct;
pub mod session;
