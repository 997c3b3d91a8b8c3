//! Inference holes and `unify_with`.
//!
//! During type checking a type may still contain `Unknown` holes
//! (`fn(?0, ?1)`). `unify_with` matches such an incomplete type against a
//! complete closed one and fills the holes: against `fn(int, bool)` it binds
//! `?0 = int, ?1 = bool`. A contradiction (`fn(?0, ?0)` against
//! `fn(int, bool)`) fails without committing anything, so a failed call
//! leaves the table exactly as it was.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::errors::TypeError;
use crate::node::{TypeId, TypeIdVec, TypeKind};
use crate::table::TypeTable;
use crate::traits::InstanceId;
use crate::unify::EqCtx;

impl TypeTable {
    /// Whether `t` contains no unresolved inference holes
    pub fn is_known(&self, t: TypeId) -> bool {
        let mut visited = Vec::new();
        !self.has_unknown(t, &mut visited)
    }

    fn has_unknown(&self, t: TypeId, visited: &mut Vec<TypeId>) -> bool {
        let t = self.resolved(t);
        if visited.contains(&t) {
            return false;
        }
        visited.push(t);
        match self.kind(t) {
            TypeKind::Unknown(_) => true,
            TypeKind::Prim(_) => false,
            TypeKind::Var(data) => {
                let bounds: SmallVec<[InstanceId; 2]> = data.bounds.clone();
                bounds.iter().any(|&b| {
                    let args: TypeIdVec = self.instance(self.inst_resolved(b)).args.clone();
                    args.iter().any(|&a| self.has_unknown(a, visited))
                })
            }
            TypeKind::Tuple(_) | TypeKind::Fn(_) => {
                let children: TypeIdVec = SmallVec::from_slice(self.kind(t).children());
                children.iter().any(|&c| self.has_unknown(c, visited))
            }
        }
    }

    /// Fill the inference holes of `incomplete` by matching it against
    /// `complete`, then canonicalize the result.
    ///
    /// `complete` must itself be closed and hole-free. Returns `Mismatch`
    /// when the two are structurally incompatible or when one hole would
    /// need two different types; in that case nothing is committed.
    pub fn unify_with(&mut self, incomplete: TypeId, complete: TypeId) -> Result<TypeId, TypeError> {
        if !self.is_known(complete) {
            return Err(TypeError::IncompleteType {
                ty: self.display(complete),
            });
        }
        self.require_closed(complete)?;
        let complete = self.unify(complete);

        let mut tentative: FxHashMap<TypeId, TypeId> = FxHashMap::default();
        let mut ctx = EqCtx::new();
        if !self.match_into(incomplete, complete, &mut tentative, &mut ctx) {
            trace!(
                incomplete = incomplete.index(),
                complete = complete.index(),
                "unify_with mismatch"
            );
            return Err(TypeError::Mismatch {
                expected: self.display(complete),
                found: self.display(incomplete),
            });
        }
        for (hole, ty) in tentative {
            self.nodes[hole.index() as usize].representative = Some(ty);
        }
        let rep = self.unify(incomplete);
        debug_assert!(self.check_sanity().is_ok());
        Ok(rep)
    }

    fn match_into(
        &self,
        a: TypeId,
        b: TypeId,
        tentative: &mut FxHashMap<TypeId, TypeId>,
        ctx: &mut EqCtx,
    ) -> bool {
        let a = self.resolved(a);
        let b = self.resolved(b);
        if a == b {
            return true;
        }
        if self.kind(a).is_unknown() {
            return match tentative.get(&a) {
                Some(&bound) => bound == b,
                None => {
                    tentative.insert(a, b);
                    true
                }
            };
        }
        match (self.kind(a), self.kind(b)) {
            (TypeKind::Prim(p), TypeKind::Prim(q)) => p == q,
            (TypeKind::Var(_), TypeKind::Var(_)) => self.ty_equal(a, b, ctx),
            (TypeKind::Tuple(_), TypeKind::Tuple(_)) | (TypeKind::Fn(_), TypeKind::Fn(_)) => {
                self.match_composites(a, b, tentative, ctx)
            }
            _ => false,
        }
    }

    fn match_composites(
        &self,
        a: TypeId,
        b: TypeId,
        tentative: &mut FxHashMap<TypeId, TypeId>,
        ctx: &mut EqCtx,
    ) -> bool {
        let children_a: TypeIdVec = SmallVec::from_slice(self.kind(a).children());
        let children_b: TypeIdVec = SmallVec::from_slice(self.kind(b).children());
        if children_a.len() != children_b.len() {
            return false;
        }
        let vars_a: SmallVec<[TypeId; 2]> = self.node(a).bound_vars.clone();
        let vars_b: SmallVec<[TypeId; 2]> = self.node(b).bound_vars.clone();
        if vars_a.len() != vars_b.len() {
            return false;
        }

        let alpha_base = ctx.alpha_len();
        for (&v, &w) in vars_a.iter().zip(&vars_b) {
            ctx.push_alpha(self.resolved(v), self.resolved(w));
        }
        let mut result = true;
        for (&v, &w) in vars_a.iter().zip(&vars_b) {
            if !self.bounds_equal(v, w, ctx) {
                result = false;
                break;
            }
        }
        if result {
            for (&x, &y) in children_a.iter().zip(&children_b) {
                if !self.match_into(x, y, tentative, ctx) {
                    result = false;
                    break;
                }
            }
        }
        ctx.truncate_alpha(alpha_base);
        result
    }
}
