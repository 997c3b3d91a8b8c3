//! The TypeTable: arena, factories, and interning storage.
//!
//! One table owns every type node, trait, and trait instance for a single
//! compilation. All construction goes through the factories here; the
//! unifier (see `unify.rs`) canonicalizes what the factories build. The
//! table is strictly single-threaded.

use impala_identity::{Interner, Symbol, TraitId, TypeVarId};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::TypeError;
use crate::node::{PrimType, TypeId, TypeIdVec, TypeKind, TypeNode, VarData};
use crate::traits::{InstanceId, InstanceNode, TraitDef};

/// Intern-table hit/miss counters, for debugging interner behavior
#[derive(Debug, Default, Clone, Copy)]
pub struct InternStats {
    pub hits: u64,
    pub misses: u64,
}

impl InternStats {
    /// Hit rate as a percentage (0.0 - 100.0); 0.0 before any lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Factory and owner of all type nodes for one compilation.
pub struct TypeTable {
    pub(crate) nodes: Vec<TypeNode>,
    pub(crate) traits: Vec<TraitDef>,
    pub(crate) instances: Vec<InstanceNode>,

    /// Hash-bucketed intern set over unified type nodes
    pub(crate) type_intern: FxHashMap<u64, SmallVec<[TypeId; 2]>>,
    /// Hash-bucketed intern set over unified trait instances
    pub(crate) inst_intern: FxHashMap<u64, SmallVec<[InstanceId; 2]>>,
    trait_lookup: FxHashMap<(Symbol, usize), TraitId>,

    /// Pre-unified primitive singletons
    prims: FxHashMap<PrimType, TypeId>,

    interner: Interner,
    next_var: u32,
    next_unknown: u32,
    pub(crate) stats: InternStats,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            nodes: Vec::new(),
            traits: Vec::new(),
            instances: Vec::new(),
            type_intern: FxHashMap::default(),
            inst_intern: FxHashMap::default(),
            trait_lookup: FxHashMap::default(),
            prims: FxHashMap::default(),
            interner: Interner::new(),
            next_var: 0,
            next_unknown: 0,
            stats: InternStats::default(),
        };
        for prim in PrimType::ALL {
            let id = table.push_node(TypeKind::Prim(prim));
            table.nodes[id.index() as usize].representative = Some(id);
            let hash = table.structural_hash(id);
            table.type_intern.entry(hash).or_default().push(id);
            table.prims.insert(prim, id);
        }
        table
    }

    // =========================================================================
    // Factories
    // =========================================================================

    /// The singleton node for a primitive type
    pub fn primitive(&mut self, prim: PrimType) -> TypeId {
        self.prims[&prim]
    }

    /// `int` in surface syntax
    pub fn type_int(&mut self) -> TypeId {
        self.primitive(PrimType::I32)
    }

    pub fn type_bool(&mut self) -> TypeId {
        self.primitive(PrimType::Bool)
    }

    /// `float` in surface syntax
    pub fn type_float(&mut self) -> TypeId {
        self.primitive(PrimType::F32)
    }

    /// A (possibly fresh) tuple node over `elems`
    pub fn tuple(&mut self, elems: TypeIdVec) -> Result<TypeId, TypeError> {
        self.check_embeddable(&elems)?;
        Ok(self.push_node(TypeKind::Tuple(elems)))
    }

    /// A (possibly fresh) function node; the last parameter carries the
    /// continuation/return by convention
    pub fn function(&mut self, params: TypeIdVec) -> Result<TypeId, TypeError> {
        self.check_embeddable(&params)?;
        Ok(self.push_node(TypeKind::Fn(params)))
    }

    /// A fresh, free type variable. Each call yields a distinct identity;
    /// variables are never interned before binding.
    pub fn type_var(&mut self) -> TypeId {
        self.type_var_with_bounds(SmallVec::new())
    }

    /// A fresh type variable carrying trait bounds
    pub fn type_var_with_bounds(&mut self, bounds: SmallVec<[InstanceId; 2]>) -> TypeId {
        let id = TypeVarId::new(self.next_var);
        self.next_var += 1;
        let mut deduped: SmallVec<[InstanceId; 2]> = SmallVec::new();
        for b in bounds {
            if !deduped.contains(&b) {
                deduped.push(b);
            }
        }
        self.push_node(TypeKind::Var(VarData {
            id,
            bounds: deduped,
            bound_at: None,
        }))
    }

    /// A fresh inference hole
    pub fn unknown(&mut self) -> TypeId {
        let id = self.next_unknown;
        self.next_unknown += 1;
        self.push_node(TypeKind::Unknown(id))
    }

    /// Attach a trait bound to a not-yet-unified type variable.
    ///
    /// Bounds may reference other variables, including cyclically
    /// (`A: S<B>, B: S<A>`), which is why they are attached after creation.
    pub fn add_trait_bound(&mut self, var: TypeId, bound: InstanceId) -> Result<(), TypeError> {
        if !self.kind(var).is_var() {
            return Err(TypeError::NotAVariable {
                node: self.display(var),
            });
        }
        if self.is_unified(var) {
            return Err(TypeError::FrozenNode {
                node: self.display(var),
            });
        }
        if let TypeKind::Var(data) = &mut self.nodes[var.index() as usize].kind {
            if !data.bounds.contains(&bound) {
                data.bounds.push(bound);
            }
        }
        Ok(())
    }

    /// The canonical trait for `name` with `arity` formal parameters.
    /// Traits are nominal: same name and arity means the same trait.
    pub fn trait_def(&mut self, name: Symbol, arity: usize) -> TraitId {
        if let Some(&id) = self.trait_lookup.get(&(name, arity)) {
            return id;
        }
        let id = TraitId::new(self.traits.len() as u32);
        self.traits.push(TraitDef { name, arity });
        self.trait_lookup.insert((name, arity), id);
        id
    }

    /// Apply a trait to type actuals. Fails if the actuals do not match the
    /// trait's formal arity.
    pub fn instantiate_trait(
        &mut self,
        trait_id: TraitId,
        args: TypeIdVec,
    ) -> Result<InstanceId, TypeError> {
        let def = &self.traits[trait_id.index() as usize];
        if args.len() != def.arity {
            return Err(TypeError::TraitArity {
                trait_name: self.interner.resolve(def.name).to_owned(),
                expected: def.arity,
                found: args.len(),
            });
        }
        let id = InstanceId::new(self.instances.len() as u32);
        self.instances.push(InstanceNode::new(trait_id, args));
        Ok(id)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn node(&self, t: TypeId) -> &TypeNode {
        &self.nodes[t.index() as usize]
    }

    pub fn kind(&self, t: TypeId) -> &TypeKind {
        &self.node(t).kind
    }

    /// The canonical node for `t`'s equivalence class, if unified
    pub fn representative(&self, t: TypeId) -> Option<TypeId> {
        self.node(t).representative
    }

    pub fn is_unified(&self, t: TypeId) -> bool {
        self.node(t).representative.is_some()
    }

    /// Representative if unified, the node itself otherwise
    pub(crate) fn resolved(&self, t: TypeId) -> TypeId {
        self.node(t).representative.unwrap_or(t)
    }

    pub fn bound_vars(&self, t: TypeId) -> &[TypeId] {
        &self.node(t).bound_vars
    }

    pub fn is_polytype(&self, t: TypeId) -> bool {
        self.node(t).is_polytype()
    }

    /// Bounds of a type variable; empty for any other kind
    pub fn var_bounds(&self, t: TypeId) -> &[InstanceId] {
        match self.kind(t) {
            TypeKind::Var(data) => &data.bounds,
            _ => &[],
        }
    }

    /// Binding site of a type variable, if it is one and is bound
    pub fn var_bound_at(&self, t: TypeId) -> Option<TypeId> {
        match self.kind(t) {
            TypeKind::Var(data) => data.bound_at,
            _ => None,
        }
    }

    /// Identity of a type variable node
    pub fn var_id(&self, t: TypeId) -> Option<TypeVarId> {
        match self.kind(t) {
            TypeKind::Var(data) => Some(data.id),
            _ => None,
        }
    }

    pub fn instance(&self, i: InstanceId) -> &InstanceNode {
        &self.instances[i.index() as usize]
    }

    pub(crate) fn inst_resolved(&self, i: InstanceId) -> InstanceId {
        self.instance(i).representative.unwrap_or(i)
    }

    pub fn trait_info(&self, id: TraitId) -> &TraitDef {
        &self.traits[id.index() as usize]
    }

    pub fn trait_name(&self, id: TraitId) -> &str {
        self.interner.resolve(self.trait_info(id).name)
    }

    /// Intern a name into the table's symbol store
    pub fn intern_name(&mut self, name: &str) -> Symbol {
        self.interner.intern(name)
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Number of owned type nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn intern_stats(&self) -> InternStats {
        self.stats
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(crate) fn push_node(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId::new(self.nodes.len() as u32);
        self.nodes.push(TypeNode::new(kind));
        id
    }

    /// A composite may not embed a polytype that still contains a free
    /// variable: generalization after embedding is rejected.
    fn check_embeddable(&self, children: &[TypeId]) -> Result<(), TypeError> {
        for &child in children {
            let child = self.resolved(child);
            if self.node(child).is_polytype() && self.has_free_var(child) {
                return Err(TypeError::OpenPolytypeChild {
                    child: self.display(child),
                });
            }
        }
        Ok(())
    }

    /// Whether any reachable type variable is still free (bounds included)
    pub(crate) fn has_free_var(&self, t: TypeId) -> bool {
        let mut visited = Vec::new();
        self.free_var_walk(t, &mut visited)
    }

    fn free_var_walk(&self, t: TypeId, visited: &mut Vec<TypeId>) -> bool {
        let t = self.resolved(t);
        if visited.contains(&t) {
            return false;
        }
        visited.push(t);
        match self.kind(t) {
            TypeKind::Prim(_) | TypeKind::Unknown(_) => false,
            TypeKind::Var(data) => {
                if data.bound_at.is_none() {
                    return true;
                }
                let bounds: SmallVec<[InstanceId; 2]> = data.bounds.clone();
                bounds.iter().any(|&b| {
                    let args: TypeIdVec = self.instance(self.inst_resolved(b)).args.clone();
                    args.iter().any(|&a| self.free_var_walk(a, visited))
                })
            }
            TypeKind::Tuple(_) | TypeKind::Fn(_) => {
                let children: TypeIdVec = SmallVec::from_slice(self.kind(t).children());
                children.iter().any(|&c| self.free_var_walk(c, visited))
            }
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}
