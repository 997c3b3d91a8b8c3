//! Whole-table invariant checking.
//!
//! `check_sanity` walks every owned node and validates the structural
//! invariants the rest of the crate relies on. Tests call it after every
//! scenario; debug builds assert it at the end of each mutating operation.

use miette::Diagnostic;
use thiserror::Error;

use crate::node::{TypeId, TypeKind};
use crate::table::TypeTable;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum SanityError {
    #[error("representative chain of '{node}' is not idempotent")]
    #[diagnostic(code(E3901))]
    BrokenRepresentative { node: String },

    #[error("distinct representatives '{left}' and '{right}' are structurally equal")]
    #[diagnostic(code(E3902))]
    DuplicateClass { left: String, right: String },

    #[error("binding site of '{var}' does not point back")]
    #[diagnostic(code(E3903))]
    BindingSiteMismatch { var: String },

    #[error("'{var}' is bound at itself")]
    #[diagnostic(code(E3904))]
    SelfBound { var: String },

    #[error("'{node}' binds '{var}' which does not occur in it")]
    #[diagnostic(code(E3905))]
    VacuousBinder { var: String, node: String },

    #[error("'{node}' embeds the open polytype '{child}'")]
    #[diagnostic(code(E3906))]
    OpenEmbedding { node: String, child: String },

    #[error("trait instance '{instance}' does not match its trait's arity")]
    #[diagnostic(code(E3907))]
    InstanceArityBroken { instance: String },
}

impl TypeTable {
    /// Verify every table-wide invariant. Clean tables return `Ok(())`.
    pub fn check_sanity(&self) -> Result<(), SanityError> {
        self.check_nodes()?;
        self.check_instances()?;
        self.check_canonicity()
    }

    fn check_nodes(&self) -> Result<(), SanityError> {
        for idx in 0..self.nodes.len() {
            let t = TypeId::new(idx as u32);

            if let Some(rep) = self.representative(t) {
                if self.representative(rep) != Some(rep) {
                    return Err(SanityError::BrokenRepresentative {
                        node: self.display(t),
                    });
                }
            }

            if let TypeKind::Var(data) = self.kind(t) {
                if let Some(binder) = data.bound_at {
                    if binder == t {
                        return Err(SanityError::SelfBound {
                            var: self.display(t),
                        });
                    }
                    if !self.node(binder).bound_vars.contains(&t) {
                        return Err(SanityError::BindingSiteMismatch {
                            var: self.display(t),
                        });
                    }
                }
            }

            for &v in self.node(t).bound_vars.iter() {
                let points_back = matches!(
                    self.kind(v),
                    TypeKind::Var(data) if data.bound_at == Some(t)
                );
                if !points_back {
                    return Err(SanityError::BindingSiteMismatch {
                        var: self.display(v),
                    });
                }
                if !self.occurs(t, v) {
                    return Err(SanityError::VacuousBinder {
                        var: self.display(v),
                        node: self.display(t),
                    });
                }
            }

            if self.kind(t).is_composite() {
                for &child in self.kind(t).children() {
                    let child = self.resolved(child);
                    if self.node(child).is_polytype() && self.has_free_var(child) {
                        return Err(SanityError::OpenEmbedding {
                            node: self.display(t),
                            child: self.display(child),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_instances(&self) -> Result<(), SanityError> {
        for idx in 0..self.instances.len() {
            let i = crate::traits::InstanceId::new(idx as u32);
            let inst = self.instance(i);
            if let Some(rep) = inst.representative {
                if self.instance(rep).representative != Some(rep) {
                    return Err(SanityError::BrokenRepresentative {
                        node: self.display_instance(i),
                    });
                }
            }
            if inst.args.len() != self.trait_info(inst.trait_id).arity {
                return Err(SanityError::InstanceArityBroken {
                    instance: self.display_instance(i),
                });
            }
        }
        Ok(())
    }

    /// Two unified nodes are representative-equal iff structurally equal:
    /// within each hash bucket, distinct representatives must compare
    /// unequal under the full structural comparison.
    fn check_canonicity(&self) -> Result<(), SanityError> {
        for bucket in self.type_intern.values() {
            for (i, &a) in bucket.iter().enumerate() {
                for &b in &bucket[i + 1..] {
                    if self.ty_equal_structural(a, b) {
                        return Err(SanityError::DuplicateClass {
                            left: self.display(a),
                            right: self.display(b),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
