//! Decoding engine, independent of any tokenizer or I/O source.
//!
//! This module is intended for applications that need fine control over how
//! rows reach the decoder. See [`crate::avec`] for implementations covering
//! common decoding patterns.
//!
//! # Architecture
//!
//! Decoding a stream happens in three phases:
//!
//! 1. A [`HeaderMap`](header::HeaderMap) is resolved, from an explicit list of
//! column names or from the first row of the stream.
//!
//! 2. The field metadata of a [`Record`](crate::avec::Record) type is
//! extracted, each field's decode routine is bound, and the result is checked
//! against the header to build a [`DecoderPlan`](plan::DecoderPlan). Every
//! configuration mistake (a missing required column, an unknown or mismatched
//! decoder method) surfaces here, before any row is read.
//!
//! 3. The plan is applied to each remaining row, producing one record per row.
//!
//! The [`stream`] module represents these phases as state tokens. Each token
//! is consumed by its `advance` method, which returns a successor token along
//! with any extracted data. Only the initial state, re-exported for
//! convenience as [`Decoder`], can be constructed.
//!
//! A built plan is immutable and may be shared between threads, provided each
//! thread supplies its own rows and destinations.
//!
//! Implementers are recommended to begin by studying the driver in
//! [`crate::avec::reader`].

pub mod bind;
pub mod field;
pub mod header;
pub mod plan;
pub mod row;
pub mod stream;

/// Entrypoint to the finite-state machine.
pub type Decoder = stream::Init;
