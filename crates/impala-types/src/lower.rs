//! Conversion seam toward the code generator.
//!
//! The emitter downstream consumes fully unified, closed types only. It
//! supplies a [`LowerTypes`] implementation mapping each kind onto its IR;
//! [`lower_type`] drives the walk and refuses types that still contain
//! inference holes or escaped variables.

use impala_identity::TypeVarId;

use crate::errors::TypeError;
use crate::node::{PrimType, TypeId, TypeKind};
use crate::table::TypeTable;

/// One constructor per type kind, implemented by the target IR
pub trait LowerTypes {
    type Ty;

    fn prim(&mut self, prim: PrimType) -> Self::Ty;
    fn tuple(&mut self, elems: Vec<Self::Ty>) -> Self::Ty;
    fn function(&mut self, params: Vec<Self::Ty>) -> Self::Ty;
    /// A bound type variable, identified by its binder position
    fn type_param(&mut self, var: TypeVarId, position: usize) -> Self::Ty;
}

/// Fold a closed, fully-inferred type into the target IR
pub fn lower_type<L: LowerTypes>(
    table: &TypeTable,
    t: TypeId,
    sink: &mut L,
) -> Result<L::Ty, TypeError> {
    table.require_closed(t)?;
    if !table.is_known(t) {
        return Err(TypeError::IncompleteType {
            ty: table.display(t),
        });
    }
    lower_walk(table, t, sink)
}

fn lower_walk<L: LowerTypes>(
    table: &TypeTable,
    t: TypeId,
    sink: &mut L,
) -> Result<L::Ty, TypeError> {
    let t = table.representative(t).unwrap_or(t);
    match table.kind(t) {
        TypeKind::Prim(p) => Ok(sink.prim(*p)),
        TypeKind::Unknown(_) => Err(TypeError::IncompleteType {
            ty: table.display(t),
        }),
        TypeKind::Var(data) => {
            let id = data.id;
            match table.binder_position(t) {
                Some(position) => Ok(sink.type_param(id, position)),
                None => Err(TypeError::UnboundTypeVar {
                    var: table.display(t),
                }),
            }
        }
        TypeKind::Tuple(_) => {
            let children = table.kind(t).children().to_vec();
            let mut lowered = Vec::with_capacity(children.len());
            for c in children {
                lowered.push(lower_walk(table, c, sink)?);
            }
            Ok(sink.tuple(lowered))
        }
        TypeKind::Fn(_) => {
            let children = table.kind(t).children().to_vec();
            let mut lowered = Vec::with_capacity(children.len());
            for c in children {
                lowered.push(lower_walk(table, c, sink)?);
            }
            Ok(sink.function(lowered))
        }
    }
}
