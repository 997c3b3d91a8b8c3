//! Binder discipline: `add_bound_var`, occurrence, and closedness.
//!
//! A composite node generalizes over a variable by adding it to its
//! `bound_vars`. Every way that can go wrong is a typed error raised before
//! any mutation, so a failed binding leaves no trace.

use smallvec::SmallVec;

use crate::errors::TypeError;
use crate::node::{TypeId, TypeIdVec, TypeKind};
use crate::table::TypeTable;
use crate::traits::InstanceId;

impl TypeTable {
    /// Generalize `node` over the type variable `var`.
    ///
    /// Fails with an `IllegalType` behavior when `var` is already bound, when
    /// `node` is `var` itself, when `var` does not occur inside `node`, when
    /// `node` is not a composite, or when either side is already frozen by
    /// unification. On failure nothing changes.
    pub fn add_bound_var(&mut self, node: TypeId, var: TypeId) -> Result<(), TypeError> {
        if node == var {
            return Err(TypeError::SelfBinding {
                var: self.display(var),
            });
        }
        if !self.kind(var).is_var() {
            return Err(TypeError::NotAVariable {
                node: self.display(var),
            });
        }
        if !self.kind(node).is_composite() {
            return Err(TypeError::NotGeneralizable {
                node: self.display(node),
            });
        }
        if self.is_unified(node) || self.is_unified(var) {
            return Err(TypeError::FrozenNode {
                node: self.display(node),
            });
        }
        if self.var_bound_at(var).is_some() {
            return Err(TypeError::DoubleBinding {
                var: self.display(var),
            });
        }
        if !self.occurs(node, var) {
            return Err(TypeError::VacuousBinding {
                var: self.display(var),
                node: self.display(node),
            });
        }

        if let TypeKind::Var(data) = &mut self.nodes[var.index() as usize].kind {
            data.bound_at = Some(node);
        }
        self.nodes[node.index() as usize].bound_vars.push(var);
        debug_assert!(self.check_sanity().is_ok());
        Ok(())
    }

    /// Whether `var` occurs inside `node`, counting occurrences reached
    /// through the trait bounds of other variables.
    pub(crate) fn occurs(&self, node: TypeId, var: TypeId) -> bool {
        let var = self.resolved(var);
        let mut visited = Vec::new();
        self.occurs_walk(node, var, &mut visited)
    }

    fn occurs_walk(&self, t: TypeId, var: TypeId, visited: &mut Vec<TypeId>) -> bool {
        let t = self.resolved(t);
        if visited.contains(&t) {
            return false;
        }
        visited.push(t);
        match self.kind(t) {
            TypeKind::Prim(_) | TypeKind::Unknown(_) => false,
            TypeKind::Var(data) => {
                if t == var {
                    return true;
                }
                let bounds: SmallVec<[InstanceId; 2]> = data.bounds.clone();
                bounds.iter().any(|&b| {
                    let args: TypeIdVec = self.instance(self.inst_resolved(b)).args.clone();
                    args.iter().any(|&a| self.occurs_walk(a, var, visited))
                })
            }
            TypeKind::Tuple(_) | TypeKind::Fn(_) => {
                let children: TypeIdVec = SmallVec::from_slice(self.kind(t).children());
                children.iter().any(|&c| self.occurs_walk(c, var, visited))
            }
        }
    }

    /// A type is closed iff every variable reachable inside it is bound at
    /// some enclosing node of the walk.
    pub fn is_closed(&self, t: TypeId) -> bool {
        self.find_escaping_var(t).is_none()
    }

    /// Fail with `MissingBinding` if any reachable variable escapes its
    /// binder chain. The code generator calls this before lowering.
    pub fn require_closed(&self, t: TypeId) -> Result<(), TypeError> {
        match self.find_escaping_var(t) {
            None => Ok(()),
            Some(var) => Err(TypeError::UnboundTypeVar {
                var: self.display(var),
            }),
        }
    }

    /// First variable (if any) whose binder is not an ancestor in the walk
    pub(crate) fn find_escaping_var(&self, t: TypeId) -> Option<TypeId> {
        let mut binders = Vec::new();
        let mut visited = Vec::new();
        self.escape_walk(t, &mut binders, &mut visited)
    }

    fn escape_walk(
        &self,
        t: TypeId,
        binders: &mut Vec<TypeId>,
        visited: &mut Vec<TypeId>,
    ) -> Option<TypeId> {
        let t = self.resolved(t);
        if visited.contains(&t) {
            return None;
        }
        visited.push(t);
        match self.kind(t) {
            TypeKind::Prim(_) | TypeKind::Unknown(_) => None,
            TypeKind::Var(data) => {
                match data.bound_at {
                    Some(binder) if binders.contains(&self.resolved(binder)) => {}
                    _ => return Some(t),
                }
                let bounds: SmallVec<[InstanceId; 2]> = data.bounds.clone();
                for b in bounds {
                    let args: TypeIdVec = self.instance(self.inst_resolved(b)).args.clone();
                    for a in args {
                        if let Some(escaped) = self.escape_walk(a, binders, visited) {
                            return Some(escaped);
                        }
                    }
                }
                None
            }
            TypeKind::Tuple(_) | TypeKind::Fn(_) => {
                binders.push(t);
                let children: TypeIdVec = SmallVec::from_slice(self.kind(t).children());
                for c in children {
                    if let Some(escaped) = self.escape_walk(c, binders, visited) {
                        binders.pop();
                        return Some(escaped);
                    }
                }
                binders.pop();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn binding_requires_occurrence() {
        let mut table = TypeTable::new();
        let int = table.type_int();
        let a = table.type_var();
        let f = table.function(smallvec![int]).unwrap();

        let err = table.add_bound_var(f, a);
        assert!(matches!(err, Err(TypeError::VacuousBinding { .. })));
        assert!(table.var_bound_at(a).is_none());
        assert!(table.check_sanity().is_ok());
    }

    #[test]
    fn self_binding_is_rejected() {
        let mut table = TypeTable::new();
        let a = table.type_var();
        let err = table.add_bound_var(a, a);
        assert!(matches!(err, Err(TypeError::SelfBinding { .. })));
        assert!(table.var_bound_at(a).is_none());
    }

    #[test]
    fn variables_cannot_generalize() {
        let mut table = TypeTable::new();
        let a = table.type_var();
        let b = table.type_var();
        let err = table.add_bound_var(a, b);
        assert!(matches!(err, Err(TypeError::NotGeneralizable { .. })));
    }

    #[test]
    fn double_binding_is_rejected() {
        let mut table = TypeTable::new();
        let a = table.type_var();
        let f = table.function(smallvec![a]).unwrap();
        table.add_bound_var(f, a).unwrap();

        let g = table.function(smallvec![a]).unwrap();
        let err = table.add_bound_var(g, a);
        assert!(matches!(err, Err(TypeError::DoubleBinding { .. })));
        assert_eq!(table.var_bound_at(a), Some(f));
    }

    #[test]
    fn unified_nodes_are_frozen() {
        let mut table = TypeTable::new();
        let a = table.type_var();
        let f = table.function(smallvec![a]).unwrap();
        table.unify(f);

        let err = table.add_bound_var(f, a);
        assert!(matches!(err, Err(TypeError::FrozenNode { .. })));
    }

    #[test]
    fn closedness_follows_the_binder_chain() {
        let mut table = TypeTable::new();
        let a = table.type_var();
        let f = table.function(smallvec![a]).unwrap();
        assert!(!table.is_closed(f));

        table.add_bound_var(f, a).unwrap();
        assert!(table.is_closed(f));
        assert!(table.require_closed(f).is_ok());
    }

    #[test]
    fn inner_polytype_stays_closed_inside_outer() {
        let mut table = TypeTable::new();
        let int = table.type_int();

        let b = table.type_var();
        let inner = table.function(smallvec![b]).unwrap();
        table.add_bound_var(inner, b).unwrap();

        let outer = table.tuple(smallvec![inner, int]).unwrap();
        assert!(table.is_closed(outer));
    }

    #[test]
    fn open_polytype_cannot_be_embedded() {
        let mut table = TypeTable::new();
        let a = table.type_var();
        let b = table.type_var();
        // generalizes a but still contains free b
        let inner = table.function(smallvec![a, b]).unwrap();
        table.add_bound_var(inner, a).unwrap();

        let int = table.type_int();
        let err = table.tuple(smallvec![inner, int]);
        assert!(matches!(err, Err(TypeError::OpenPolytypeChild { .. })));
        assert!(table.check_sanity().is_ok());
    }

    #[test]
    fn occurrence_through_bounds_counts() {
        let mut table = TypeTable::new();
        let name = table.intern_name("S");
        let s = table.trait_def(name, 1);

        let a = table.type_var();
        let b = table.type_var();
        let s_b = table.instantiate_trait(s, smallvec![b]).unwrap();
        table.add_trait_bound(a, s_b).unwrap();

        let f = table.function(smallvec![a]).unwrap();
        // b occurs only through a's bound S<b>
        assert!(table.occurs(f, b));
        table.add_bound_var(f, a).unwrap();
        table.add_bound_var(f, b).unwrap();
        assert!(table.is_closed(f));
    }
}
