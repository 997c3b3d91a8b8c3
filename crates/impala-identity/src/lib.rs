//! First-class identity types for the Impala front-end.
//!
//! These types provide type-safe identifiers for traits and type variables,
//! plus the string interner that maps source names to `Symbol`s. Keeping them
//! in their own crate lets every pass (resolver, type core, emitter) share
//! identities without depending on each other's internals.

mod entities;
mod intern;

pub use entities::{TraitId, TypeVarId};
pub use intern::{Interner, Symbol};
