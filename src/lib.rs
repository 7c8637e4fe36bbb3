//! A header-driven decoder of delimited text into strongly-typed records.
//!
//! Rowbind maps the named columns of a delimited text stream onto the named
//! fields of a Rust struct. Each field is decoded either by a default routine
//! chosen from its static type, or by a custom decoder function named in the
//! field's tag.
//!
//! Most users should begin with the functions and derive macro in the [`avec`]
//! module. If these prove insufficient (for example, to drive decoding from a
//! row supplier other than the bundled tokenizer), consider assembling a
//! decoder from the parts described in the [`sans`] module.
//!
//! ## Cargo Features
//!
//! The following crate feature flags are available:
//!
//! - `derive`: enable the [`Record`](macro@avec::Record) derive macro
//!   (default).

pub mod avec;
pub mod sans;

/// A type-erased error returned by decode routines.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
