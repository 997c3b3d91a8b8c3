//! Type-core errors (E3xxx).
//!
//! The core has no source spans; errors carry pre-rendered type strings and
//! the type-check walker turns them into located diagnostics.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("type variable '{var}' is already bound")]
    #[diagnostic(code(E3001), help("a variable can be generalized at exactly one site"))]
    DoubleBinding { var: String },

    #[error("cannot bind type variable '{var}' at itself")]
    #[diagnostic(code(E3002))]
    SelfBinding { var: String },

    #[error("type variable '{var}' does not occur in '{node}'")]
    #[diagnostic(code(E3003), help("a binder must dominate an occurrence of its variable"))]
    VacuousBinding { var: String, node: String },

    #[error("'{node}' cannot bind type variables")]
    #[diagnostic(code(E3004), help("only tuple and function types generalize"))]
    NotGeneralizable { node: String },

    #[error("'{node}' is not a type variable")]
    #[diagnostic(code(E3005))]
    NotAVariable { node: String },

    #[error("'{node}' is already unified and can no longer be mutated")]
    #[diagnostic(code(E3006))]
    FrozenNode { node: String },

    #[error("cannot embed '{child}': it generalizes a variable that is still free")]
    #[diagnostic(code(E3007), help("close the polytype before putting it inside another type"))]
    OpenPolytypeChild { child: String },

    #[error("trait '{trait_name}' expects {expected} type argument(s), found {found}")]
    #[diagnostic(code(E3010))]
    TraitArity {
        trait_name: String,
        expected: usize,
        found: usize,
    },

    #[error("substitution maps {found} variable(s), but the type binds {expected}")]
    #[diagnostic(code(E3011))]
    SubstitutionArity { expected: usize, found: usize },

    #[error("substitution key '{var}' is not bound at the instantiated type")]
    #[diagnostic(code(E3012))]
    SubstitutionKey { var: String },

    #[error("cannot unify '{found}' with '{expected}'")]
    #[diagnostic(code(E3020))]
    Mismatch { expected: String, found: String },

    #[error("'{ty}' still contains unresolved inference holes")]
    #[diagnostic(code(E3021))]
    IncompleteType { ty: String },

    #[error("type variable '{var}' is not bound by any enclosing type")]
    #[diagnostic(code(E3030), help("every variable must be generalized before codegen"))]
    UnboundTypeVar { var: String },
}
