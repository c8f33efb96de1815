//! `catalogd` is an event-sourced domain service for product catalog state.
//!
//! Clients submit typed commands over HTTP; each command is validated
//! against the current aggregate state and, when accepted, becomes an
//! immutable event appended to a per-product stream in an append-only
//! [store]. Queries rebuild the current state by folding events.
//!
//! The write path runs `api` → [`domain::command`] → [`processor`]
//! (load via [`store`] + [`domain::product::reduce`], validate, append
//! under an optimistic sequence expectation). The read path folds the
//! stream straight into the [`domain::product::Product`] read model.

#![deny(unsafe_code, unused_qualifications, trivial_casts)]
#![deny(clippy::all)]

pub mod api;
pub mod cli;
pub mod domain;
pub mod processor;
pub mod store;
pub mod tracing;
