//! Impala's generic type system.
//!
//! One [`TypeTable`] owns every type node, trait, and trait instance for a
//! single compilation. Construction goes through the table's factories,
//! which hand out cheap [`TypeId`] handles; [`TypeTable::unify`] merges
//! structurally equal types into a single representative, so that semantic
//! type equality afterwards is representative identity. Polymorphism is
//! expressed by binding type variables at a composite node
//! ([`TypeTable::add_bound_var`]); trait bounds on those variables survive
//! [`TypeTable::instantiate`] as obligations for the caller's `implements`
//! checker.
//!
//! The table is strictly single-threaded: one compilation, one table, and
//! handles must never cross tables.

mod binder;
mod display;
mod errors;
mod infer;
mod lower;
mod node;
mod sanity;
mod specialize;
mod table;
mod traits;
mod unify;


pub use impala_identity::{Interner, Symbol, TraitId, TypeVarId};

pub use errors::TypeError;
pub use lower::{lower_type, LowerTypes};
pub use node::{PrimType, TypeId, TypeIdVec, TypeKind, TypeNode, VarData};
pub use sanity::SanityError;
pub use specialize::{Instantiation, Obligation};
pub use table::{InternStats, TypeTable};
pub use traits::{InstanceId, InstanceIdVec, InstanceNode, TraitDef};
