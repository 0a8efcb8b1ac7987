//! Prism Core
//!
//! This crate provides the core engine of the Prism reactivity system.
//! It implements:
//!
//! - Observed objects with fine-grained per-property dependency tracking
//! - Effects with automatic dependency discovery and cleanup
//! - A scheduler hook with a batched job queue
//! - Computed values, watchers, and ref adapters
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: the runtime, dependency store, effect machinery, and the
//!   reactive access layer
//! - `error`: the error type shared by fallible container operations
//!
//! # Example
//!
//! ```rust
//! use prism_core::reactive::{Obj, Runtime, Value};
//!
//! let rt = Runtime::new();
//!
//! // Wrap a plain object for reactive access.
//! let state = rt.reactive(Obj::map().with("count", 0));
//!
//! // Register an effect; it runs once and re-runs on change.
//! let observed = state.clone();
//! let _effect = rt.effect(move || {
//!     println!("count is {:?}", observed.get("count"));
//! });
//!
//! // The effect re-runs, printing the new count.
//! state.set("count", 5).unwrap();
//! # assert_eq!(state.get("count"), Value::Int(5));
//! ```

pub mod error;
pub mod reactive;
