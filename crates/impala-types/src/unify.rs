//! Union-find canonicalization and structural equality.
//!
//! `unify` takes a freshly-constructed node, canonicalizes its children, and
//! either returns an existing structurally-equal node or installs this one as
//! the representative of a new equivalence class. After unification, semantic
//! type equality is representative identity.
//!
//! Structural equality is alpha-equivalence over binders: when two polytypes
//! with equal binder arity are compared, their variable pairs are pushed onto
//! an explicit alpha stack for the duration of the comparison (the stack
//! replaces the original's transient `equiv_var` field). A currently-visiting
//! set keeps cyclic trait bounds (`A: S<B>, B: S<A>`) from recursing forever.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use smallvec::SmallVec;
use tracing::trace;

use crate::node::{TypeId, TypeIdVec, TypeKind};
use crate::table::TypeTable;
use crate::traits::InstanceId;

// Hash tags. Bound variables hash as a back-edge sentinel plus their binder
// position so that alpha-equivalent terms collide; nothing recurses through a
// variable, which keeps cyclic bounds finite.
const TAG_PRIM: u8 = 0x01;
const TAG_TUPLE: u8 = 0x02;
const TAG_FN: u8 = 0x03;
const TAG_UNKNOWN: u8 = 0x04;
const TAG_BOUND_VAR: u8 = 0xB0;
const TAG_FREE_VAR: u8 = 0xF0;
const TAG_CANONICAL: u8 = 0xA0;

/// Scratch state for one structural comparison
#[derive(Default)]
pub(crate) struct EqCtx {
    /// Provisional bound-variable pairs, innermost last (push-restore)
    alpha: Vec<(TypeId, TypeId)>,
    /// Composite pairs currently under comparison; a revisit is provisionally
    /// equal, which is what terminates bound cycles
    visiting: Vec<(TypeId, TypeId)>,
}

impl EqCtx {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alpha_len(&self) -> usize {
        self.alpha.len()
    }

    pub(crate) fn push_alpha(&mut self, left: TypeId, right: TypeId) {
        self.alpha.push((left, right));
    }

    pub(crate) fn truncate_alpha(&mut self, len: usize) {
        self.alpha.truncate(len);
    }
}

impl TypeTable {
    // =========================================================================
    // Unification
    // =========================================================================

    /// Canonicalize `t`, returning the representative of its equivalence
    /// class. Total for well-formed constructions; children and trait bounds
    /// are canonical before the parent is installed.
    pub fn unify(&mut self, t: TypeId) -> TypeId {
        let mut open_binders = Vec::new();
        let rep = self.unify_node(t, &mut open_binders);
        debug_assert!(self.check_sanity().is_ok());
        rep
    }

    /// Canonicalize a trait instance the same way
    pub fn unify_instance(&mut self, i: InstanceId) -> InstanceId {
        let rep = self.unify_instance_node(i);
        debug_assert!(self.check_sanity().is_ok());
        rep
    }

    /// Unify both handles and compare representatives: the semantic type
    /// equality the rest of the compiler uses.
    pub fn same(&mut self, a: TypeId, b: TypeId) -> bool {
        self.unify(a);
        self.unify(b);
        self.resolved(a) == self.resolved(b)
    }

    /// Structural equality (alpha-equivalent binders, rigid free variables)
    /// without canonicalizing anything.
    pub fn equal(&self, a: TypeId, b: TypeId) -> bool {
        self.ty_equal(a, b, &mut EqCtx::new())
    }

    fn unify_node(&mut self, t: TypeId, open_binders: &mut Vec<TypeId>) -> TypeId {
        if let Some(rep) = self.node(t).representative {
            return rep;
        }
        enum Step {
            OwnClass,
            Untouched,
            Binder(TypeId),
            Composite,
        }
        let step = match self.kind(t) {
            // primitives are pre-unified singletons; free variables are rigid
            TypeKind::Prim(_) => Step::OwnClass,
            // inference holes stay un-unified until `unify_with` resolves them
            TypeKind::Unknown(_) => Step::Untouched,
            TypeKind::Var(data) => match data.bound_at {
                None => Step::OwnClass,
                Some(binder) => Step::Binder(binder),
            },
            TypeKind::Tuple(_) | TypeKind::Fn(_) => Step::Composite,
        };
        match step {
            Step::OwnClass => {
                self.nodes[t.index() as usize].representative = Some(t);
                t
            }
            Step::Untouched => t,
            Step::Binder(binder) => {
                if open_binders.contains(&binder) {
                    // the in-progress binder assigns this variable
                    return t;
                }
                self.unify_node(binder, open_binders);
                self.resolved(t)
            }
            Step::Composite => self.unify_composite(t, open_binders),
        }
    }

    fn unify_composite(&mut self, t: TypeId, open_binders: &mut Vec<TypeId>) -> TypeId {
        if !self.is_known(t) {
            // a type with unresolved holes cannot be interned yet; its hash
            // would go stale the moment a hole resolves
            return t;
        }
        open_binders.push(t);
        let children: TypeIdVec = SmallVec::from_slice(self.kind(t).children());
        for &child in &children {
            if let Some(binder) = self.var_bound_at(child) {
                if open_binders.contains(&binder) {
                    continue;
                }
            }
            self.unify_node(child, open_binders);
        }
        open_binders.pop();

        let hash = self.structural_hash(t);
        let found = self.type_intern.get(&hash).and_then(|bucket| {
            bucket
                .iter()
                .copied()
                .find(|&cand| self.ty_equal(t, cand, &mut EqCtx::new()))
        });

        match found {
            Some(canonical) => {
                self.stats.hits += 1;
                trace!(node = t.index(), rep = canonical.index(), "intern hit");
                self.nodes[t.index() as usize].representative = Some(canonical);
                self.assign_binder_cluster(t, canonical);
                canonical
            }
            None => {
                self.stats.misses += 1;
                trace!(node = t.index(), "intern miss, installing representative");
                self.nodes[t.index() as usize].representative = Some(t);
                self.type_intern.entry(hash).or_default().push(t);
                let vars: SmallVec<[TypeId; 2]> = self.node(t).bound_vars.clone();
                for &v in &vars {
                    if self.nodes[v.index() as usize].representative.is_none() {
                        self.nodes[v.index() as usize].representative = Some(v);
                    }
                }
                for &v in &vars {
                    let bounds: SmallVec<[InstanceId; 2]> =
                        SmallVec::from_slice(self.var_bounds(self.resolved(v)));
                    for b in bounds {
                        self.unify_instance_node(b);
                    }
                }
                t
            }
        }
    }

    /// After a binder matched an existing polytype, its variables and their
    /// bound instances join the canonical node's classes position-wise.
    fn assign_binder_cluster(&mut self, t: TypeId, canonical: TypeId) {
        let vars_t: SmallVec<[TypeId; 2]> = self.node(t).bound_vars.clone();
        let vars_c: SmallVec<[TypeId; 2]> = self.node(canonical).bound_vars.clone();
        debug_assert_eq!(vars_t.len(), vars_c.len());

        for (&v, &w) in vars_t.iter().zip(&vars_c) {
            let w = self.resolved(w);
            if self.nodes[v.index() as usize].representative.is_none() {
                self.nodes[v.index() as usize].representative = Some(w);
            }
        }
        for (&v, &w) in vars_t.iter().zip(&vars_c) {
            let w = self.resolved(w);
            let bounds_v: SmallVec<[InstanceId; 2]> = SmallVec::from_slice(self.var_bounds(v));
            let bounds_w: SmallVec<[InstanceId; 2]> = SmallVec::from_slice(self.var_bounds(w));
            for b in bounds_v {
                if self.instances[b.index() as usize].representative.is_some() {
                    continue;
                }
                let paired = bounds_w
                    .iter()
                    .copied()
                    .find(|&c| self.inst_equal(b, c, &mut EqCtx::new()));
                match paired {
                    Some(c) => {
                        let c = self.inst_resolved(c);
                        self.instances[b.index() as usize].representative = Some(c);
                    }
                    // bounds were set-equal when the binders matched, so a
                    // pair must exist; intern independently if it does not
                    None => {
                        debug_assert!(false, "binder matched with unpaired bound");
                        self.unify_instance_node(b);
                    }
                }
            }
        }
    }

    pub(crate) fn unify_instance_node(&mut self, i: InstanceId) -> InstanceId {
        if let Some(rep) = self.instance(i).representative {
            return rep;
        }
        let args: TypeIdVec = self.instance(i).args.clone();
        if args.iter().any(|&a| !self.is_known(a)) {
            return i;
        }
        for &arg in &args {
            let mut open_binders = Vec::new();
            self.unify_node(arg, &mut open_binders);
        }
        if let Some(rep) = self.instance(i).representative {
            // unifying an argument's binder can resolve this very instance
            return rep;
        }

        let hash = self.instance_hash(i);
        let found = self.inst_intern.get(&hash).and_then(|bucket| {
            bucket
                .iter()
                .copied()
                .find(|&cand| self.inst_equal(i, cand, &mut EqCtx::new()))
        });
        match found {
            Some(canonical) => {
                self.instances[i.index() as usize].representative = Some(canonical);
                canonical
            }
            None => {
                self.instances[i.index() as usize].representative = Some(i);
                self.inst_intern.entry(hash).or_default().push(i);
                i
            }
        }
    }

    // =========================================================================
    // Structural equality
    // =========================================================================

    pub(crate) fn ty_equal(&self, a: TypeId, b: TypeId, ctx: &mut EqCtx) -> bool {
        let a = self.resolved(a);
        let b = self.resolved(b);
        if a == b {
            return true;
        }
        match (self.kind(a), self.kind(b)) {
            (TypeKind::Var(_), TypeKind::Var(_)) => self.var_equal(a, b, ctx),
            (TypeKind::Var(_), _) | (_, TypeKind::Var(_)) => false,
            _ => {
                if self.is_unified(a) && self.is_unified(b) {
                    // canonicity: distinct representatives are distinct types
                    return false;
                }
                self.kinds_equal(a, b, ctx)
            }
        }
    }

    /// Like `ty_equal`, but forces a structural comparison even between two
    /// distinct representatives. The sanity checker uses this to validate
    /// canonicity instead of assuming it.
    pub(crate) fn ty_equal_structural(&self, a: TypeId, b: TypeId) -> bool {
        let a = self.resolved(a);
        let b = self.resolved(b);
        if a == b {
            return true;
        }
        self.kinds_equal(a, b, &mut EqCtx::new())
    }

    fn kinds_equal(&self, a: TypeId, b: TypeId, ctx: &mut EqCtx) -> bool {
        match (self.kind(a), self.kind(b)) {
            (TypeKind::Prim(p), TypeKind::Prim(q)) => p == q,
            (TypeKind::Var(_), TypeKind::Var(_)) => self.var_equal(a, b, ctx),
            (TypeKind::Tuple(_), TypeKind::Tuple(_)) | (TypeKind::Fn(_), TypeKind::Fn(_)) => {
                self.composite_equal(a, b, ctx)
            }
            // distinct unknowns are never equal (identity was checked above)
            _ => false,
        }
    }

    fn var_equal(&self, a: TypeId, b: TypeId, ctx: &mut EqCtx) -> bool {
        // innermost alpha pair wins (nested binders shadow)
        for &(v, w) in ctx.alpha.iter().rev() {
            if v == a {
                return w == b;
            }
            if w == b {
                return false;
            }
        }
        let bound_a = self.var_bound_at(a);
        let bound_b = self.var_bound_at(b);
        let (binder_a, binder_b) = match (bound_a, bound_b) {
            (Some(x), Some(y)) => (x, y),
            // free variables are rigid: equal only by identity
            _ => return false,
        };
        if self.is_unified(a) && self.is_unified(b) {
            // two canonical variables with no alpha claim are distinct
            return false;
        }
        // bound at the same position of structurally equal binders
        match (self.binder_position(a), self.binder_position(b)) {
            (Some(pa), Some(pb)) if pa == pb => self.ty_equal(binder_a, binder_b, ctx),
            _ => false,
        }
    }

    fn composite_equal(&self, a: TypeId, b: TypeId, ctx: &mut EqCtx) -> bool {
        if ctx.visiting.contains(&(a, b)) {
            return true;
        }
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

        ctx.visiting.push((a, b));
        let alpha_base = ctx.alpha.len();
        for (&v, &w) in vars_a.iter().zip(&vars_b) {
            ctx.alpha.push((self.resolved(v), self.resolved(w)));
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
                if !self.ty_equal(x, y, ctx) {
                    result = false;
                    break;
                }
            }
        }

        ctx.alpha.truncate(alpha_base);
        ctx.visiting.pop();
        result
    }

    /// Trait-bound sets compare as sets, up to instance representatives
    pub(crate) fn bounds_equal(&self, v: TypeId, w: TypeId, ctx: &mut EqCtx) -> bool {
        let bounds_v = self.var_bounds(self.resolved(v));
        let bounds_w = self.var_bounds(self.resolved(w));
        if bounds_v.len() != bounds_w.len() {
            return false;
        }
        let bounds_v: SmallVec<[InstanceId; 2]> = SmallVec::from_slice(bounds_v);
        let bounds_w: SmallVec<[InstanceId; 2]> = SmallVec::from_slice(bounds_w);
        bounds_v
            .iter()
            .all(|&i| bounds_w.iter().any(|&j| self.inst_equal(i, j, ctx)))
    }

    pub(crate) fn inst_equal(&self, i: InstanceId, j: InstanceId, ctx: &mut EqCtx) -> bool {
        let i = self.inst_resolved(i);
        let j = self.inst_resolved(j);
        if i == j {
            return true;
        }
        let (trait_i, args_i) = {
            let inst = self.instance(i);
            (inst.trait_id, inst.args.clone())
        };
        let (trait_j, args_j) = {
            let inst = self.instance(j);
            (inst.trait_id, inst.args.clone())
        };
        if trait_i != trait_j || args_i.len() != args_j.len() {
            return false;
        }
        args_i
            .iter()
            .zip(&args_j)
            .all(|(&x, &y)| self.ty_equal(x, y, ctx))
    }

    /// Index of a bound variable within its binder's quantifier list
    pub(crate) fn binder_position(&self, v: TypeId) -> Option<usize> {
        let binder = self.var_bound_at(v)?;
        let v = self.resolved(v);
        self.node(binder)
            .bound_vars
            .iter()
            .position(|&x| self.resolved(x) == v)
    }

    // =========================================================================
    // Structural hashing
    // =========================================================================

    pub(crate) fn structural_hash(&self, t: TypeId) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash_node(t, &mut hasher);
        hasher.finish()
    }

    fn hash_node(&self, t: TypeId, hasher: &mut FxHasher) {
        let t = self.resolved(t);
        match self.kind(t) {
            TypeKind::Prim(p) => {
                TAG_PRIM.hash(hasher);
                p.hash(hasher);
            }
            TypeKind::Unknown(id) => {
                TAG_UNKNOWN.hash(hasher);
                id.hash(hasher);
            }
            TypeKind::Var(_) => self.hash_child(t, hasher),
            TypeKind::Tuple(elems) => {
                TAG_TUPLE.hash(hasher);
                elems.len().hash(hasher);
                self.node(t).bound_vars.len().hash(hasher);
                for &e in elems {
                    self.hash_child(e, hasher);
                }
            }
            TypeKind::Fn(params) => {
                TAG_FN.hash(hasher);
                params.len().hash(hasher);
                self.node(t).bound_vars.len().hash(hasher);
                for &p in params {
                    self.hash_child(p, hasher);
                }
            }
        }
    }

    fn hash_child(&self, c: TypeId, hasher: &mut FxHasher) {
        let c = self.resolved(c);
        match self.kind(c) {
            TypeKind::Var(data) => match data.bound_at {
                Some(_) => {
                    // back-edge sentinel: position and bound count only, so
                    // alpha-equivalent occurrences collide and cycles stay
                    // finite
                    TAG_BOUND_VAR.hash(hasher);
                    self.binder_position(c).unwrap_or(0).hash(hasher);
                    data.bounds.len().hash(hasher);
                }
                None => {
                    TAG_FREE_VAR.hash(hasher);
                    data.id.index().hash(hasher);
                }
            },
            TypeKind::Unknown(id) => {
                TAG_UNKNOWN.hash(hasher);
                id.hash(hasher);
            }
            _ if self.is_unified(c) => {
                TAG_CANONICAL.hash(hasher);
                c.index().hash(hasher);
            }
            _ => self.hash_node(c, hasher),
        }
    }

    pub(crate) fn instance_hash(&self, i: InstanceId) -> u64 {
        let mut hasher = FxHasher::default();
        let i = self.inst_resolved(i);
        let inst = self.instance(i);
        inst.trait_id.index().hash(&mut hasher);
        inst.args.len().hash(&mut hasher);
        for &arg in &inst.args {
            self.hash_child(arg, &mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::node::PrimType;
    use crate::table::TypeTable;
    use smallvec::smallvec;

    #[test]
    fn ground_types_intern_once() {
        let mut table = TypeTable::new();
        let int = table.type_int();
        let b = table.type_bool();

        let t1 = table.tuple(smallvec![int, b]).unwrap();
        let t2 = table.tuple(smallvec![int, b]).unwrap();
        assert_ne!(t1, t2);

        let r1 = table.unify(t1);
        let r2 = table.unify(t2);
        assert_eq!(r1, r2);
        assert_eq!(table.intern_stats().hits, 1);
    }

    #[test]
    fn distinct_shapes_stay_distinct() {
        let mut table = TypeTable::new();
        let int = table.type_int();
        let b = table.type_bool();

        let t1 = table.tuple(smallvec![int, b]).unwrap();
        let t2 = table.tuple(smallvec![b, int]).unwrap();
        let f1 = table.function(smallvec![int, b]).unwrap();

        let r1 = table.unify(t1);
        let r2 = table.unify(t2);
        let rf = table.unify(f1);
        assert_ne!(r1, r2);
        assert_ne!(r1, rf);
    }

    #[test]
    fn tuples_and_functions_nest() {
        let mut table = TypeTable::new();
        let int = table.type_int();
        let inner1 = table.tuple(smallvec![int]).unwrap();
        let inner2 = table.tuple(smallvec![int]).unwrap();
        let f1 = table.function(smallvec![inner1, int]).unwrap();
        let f2 = table.function(smallvec![inner2, int]).unwrap();

        assert!(table.same(f1, f2));
    }

    #[test]
    fn free_vars_are_rigid() {
        let mut table = TypeTable::new();
        let a = table.type_var();
        let b = table.type_var();
        let f = table.function(smallvec![a]).unwrap();
        let g = table.function(smallvec![b]).unwrap();

        assert!(!table.equal(f, g));
        assert!(!table.same(f, g));
    }

    #[test]
    fn same_free_var_interns() {
        let mut table = TypeTable::new();
        let a = table.type_var();
        let f = table.function(smallvec![a]).unwrap();
        let g = table.function(smallvec![a]).unwrap();

        assert!(table.same(f, g));
    }

    #[test]
    fn representative_is_idempotent() {
        let mut table = TypeTable::new();
        let int = table.type_int();
        let f = table.function(smallvec![int]).unwrap();
        let rep = table.unify(f);
        assert_eq!(table.representative(rep), Some(rep));
        assert_eq!(table.unify(rep), rep);
    }

    #[test]
    fn alpha_equivalent_polytypes_share_a_class() {
        let mut table = TypeTable::new();

        let a = table.type_var();
        let b = table.type_var();
        let f = table.function(smallvec![a, b]).unwrap();
        table.add_bound_var(f, a).unwrap();
        table.add_bound_var(f, b).unwrap();

        let c = table.type_var();
        let d = table.type_var();
        let g = table.function(smallvec![c, d]).unwrap();
        table.add_bound_var(g, c).unwrap();
        table.add_bound_var(g, d).unwrap();

        let rf = table.unify(f);
        let rg = table.unify(g);
        assert_eq!(rf, rg);
        // position-wise variable classes merge too
        assert_eq!(table.representative(c), table.representative(a));
        assert_eq!(table.representative(d), table.representative(b));
    }

    #[test]
    fn binder_order_of_bounds_is_a_set() {
        let mut table = TypeTable::new();
        let clonable = table.intern_name("Clonable");
        let equality = table.intern_name("Equality");
        let clonable = table.trait_def(clonable, 0);
        let equality = table.trait_def(equality, 0);
        let ci = table.instantiate_trait(clonable, smallvec![]).unwrap();
        let ei = table.instantiate_trait(equality, smallvec![]).unwrap();

        let c = table.type_var_with_bounds(smallvec![ci, ei]);
        let d = table.type_var();
        let f = table.function(smallvec![c, d]).unwrap();
        table.add_bound_var(f, c).unwrap();
        table.add_bound_var(f, d).unwrap();

        let ci2 = table.instantiate_trait(clonable, smallvec![]).unwrap();
        let ei2 = table.instantiate_trait(equality, smallvec![]).unwrap();
        let e = table.type_var_with_bounds(smallvec![ei2, ci2]);
        let x = table.type_var();
        let g = table.function(smallvec![e, x]).unwrap();
        table.add_bound_var(g, e).unwrap();
        table.add_bound_var(g, x).unwrap();

        assert_eq!(table.unify(f), table.unify(g));
    }

    #[test]
    fn bound_mismatch_splits_classes() {
        let mut table = TypeTable::new();
        let name = table.intern_name("Clonable");
        let clonable = table.trait_def(name, 0);
        let ci = table.instantiate_trait(clonable, smallvec![]).unwrap();

        let a = table.type_var_with_bounds(smallvec![ci]);
        let f = table.function(smallvec![a]).unwrap();
        table.add_bound_var(f, a).unwrap();

        let b = table.type_var();
        let g = table.function(smallvec![b]).unwrap();
        table.add_bound_var(g, b).unwrap();

        assert_ne!(table.unify(f), table.unify(g));
    }

    #[test]
    fn primitive_identity_is_structural_identity() {
        let mut table = TypeTable::new();
        let a = table.primitive(PrimType::F64);
        let b = table.primitive(PrimType::F64);
        assert!(table.same(a, b));
    }
}
