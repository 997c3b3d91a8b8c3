//! Specialization and instantiation of polytypes.
//!
//! `instantiate` substitutes a bound-variable-to-type map through a
//! polytype: the outer binders are dropped, nested polytypes keep theirs
//! (their binders are cloned into fresh variables so substitution never
//! captures), and the result is re-interned. The bounds of every substituted
//! variable are themselves substituted and handed back as obligations; the
//! caller's `implements` checker decides whether the chosen types satisfy
//! them — the core only reports what must hold.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::errors::TypeError;
use crate::node::{TypeId, TypeIdVec, TypeKind};
use crate::table::TypeTable;
use crate::traits::InstanceId;

/// One `U : T` requirement produced by instantiation
#[derive(Debug, Clone, Copy)]
pub struct Obligation {
    /// The type substituted for a bound variable
    pub target: TypeId,
    /// The variable's bound with the substitution applied
    pub bound: InstanceId,
}

/// Result of instantiating a polytype
#[derive(Debug, Clone)]
pub struct Instantiation {
    /// The substituted, unified type; monomorphic in the outer binders
    pub ty: TypeId,
    pub obligations: Vec<Obligation>,
}

impl TypeTable {
    /// Instantiate the polytype `t` with `mapping`, one entry per bound
    /// variable. The map must cover the binders exactly.
    pub fn instantiate(
        &mut self,
        t: TypeId,
        mapping: &FxHashMap<TypeId, TypeId>,
    ) -> Result<Instantiation, TypeError> {
        let t = self.resolved(t);
        let binders: SmallVec<[TypeId; 2]> = self.node(t).bound_vars.clone();
        if mapping.len() != binders.len() {
            return Err(TypeError::SubstitutionArity {
                expected: binders.len(),
                found: mapping.len(),
            });
        }
        let mut map: FxHashMap<TypeId, TypeId> = FxHashMap::default();
        for (&k, &v) in mapping {
            map.insert(self.resolved(k), v);
        }
        for &v in &binders {
            if !map.contains_key(&self.resolved(v)) {
                return Err(TypeError::SubstitutionKey {
                    var: self.display(v),
                });
            }
        }

        let mut obligations = Vec::new();
        for &v in &binders {
            let v = self.resolved(v);
            let target = map[&v];
            let bounds: SmallVec<[InstanceId; 2]> = SmallVec::from_slice(self.var_bounds(v));
            for b in bounds {
                let mut scoped = map.clone();
                let bound = self.specialize_instance(b, &mut scoped)?;
                obligations.push(Obligation { target, bound });
            }
        }

        let body = self.specialize_kind(t, &mut map)?;
        let ty = self.unify(body);
        for ob in &mut obligations {
            ob.bound = self.unify_instance(ob.bound);
        }
        trace!(from = t.index(), to = ty.index(), "instantiated polytype");
        debug_assert!(self.check_sanity().is_ok());
        Ok(Instantiation { ty, obligations })
    }

    /// Substitution with binders respected: a mapped node is replaced, a
    /// polytype clones its binders into fresh variables (extending `map` so
    /// inner quantifiers shadow), everything else is copied structurally.
    pub fn specialize(
        &mut self,
        t: TypeId,
        map: &mut FxHashMap<TypeId, TypeId>,
    ) -> Result<TypeId, TypeError> {
        let t = self.resolved(t);
        if let Some(&mapped) = map.get(&t) {
            return Ok(mapped);
        }
        let binders: SmallVec<[TypeId; 2]> = self.node(t).bound_vars.clone();
        if binders.is_empty() {
            return self.specialize_kind(t, map);
        }

        // clone all binders before touching bounds so cyclic bounds land on
        // the clones
        let mut clones: SmallVec<[(TypeId, TypeId); 2]> = SmallVec::new();
        for &v in &binders {
            let v = self.resolved(v);
            let fresh = self.type_var();
            map.insert(v, fresh);
            clones.push((v, fresh));
        }
        for &(v, fresh) in &clones {
            let bounds: SmallVec<[InstanceId; 2]> = SmallVec::from_slice(self.var_bounds(v));
            for b in bounds {
                let bound = self.specialize_instance(b, map)?;
                self.add_trait_bound(fresh, bound)?;
            }
        }
        let body = self.specialize_kind(t, map)?;
        for &(_, fresh) in &clones {
            self.add_bound_var(body, fresh)?;
        }
        Ok(body)
    }

    /// Copy one node with substituted children, ignoring `t`'s own binders
    fn specialize_kind(
        &mut self,
        t: TypeId,
        map: &mut FxHashMap<TypeId, TypeId>,
    ) -> Result<TypeId, TypeError> {
        let t = self.resolved(t);
        match self.kind(t) {
            TypeKind::Prim(_) | TypeKind::Unknown(_) => Ok(t),
            TypeKind::Var(_) => Ok(map.get(&t).copied().unwrap_or(t)),
            TypeKind::Tuple(_) => {
                let children: TypeIdVec = SmallVec::from_slice(self.kind(t).children());
                let mut subst = TypeIdVec::new();
                for c in children {
                    subst.push(self.specialize(c, map)?);
                }
                self.tuple(subst)
            }
            TypeKind::Fn(_) => {
                let children: TypeIdVec = SmallVec::from_slice(self.kind(t).children());
                let mut subst = TypeIdVec::new();
                for c in children {
                    subst.push(self.specialize(c, map)?);
                }
                self.function(subst)
            }
        }
    }

    /// Substitute through a trait instance's arguments
    pub(crate) fn specialize_instance(
        &mut self,
        i: InstanceId,
        map: &mut FxHashMap<TypeId, TypeId>,
    ) -> Result<InstanceId, TypeError> {
        let i = self.inst_resolved(i);
        let (trait_id, args) = {
            let inst = self.instance(i);
            (inst.trait_id, inst.args.clone())
        };
        let mut subst = TypeIdVec::new();
        for a in args {
            subst.push(self.specialize(a, map)?);
        }
        self.instantiate_trait(trait_id, subst)
    }
}
