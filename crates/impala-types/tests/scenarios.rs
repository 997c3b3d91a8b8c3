//! End-to-end scenarios exercising construction, generalization,
//! unification, trait bounds, and specialization together.

use impala_types::{TypeError, TypeTable};
use rustc_hash::FxHashMap;
use smallvec::smallvec;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// `fn<A,B>(A,B)` built twice lands in one class.
#[test]
fn generic_functions_share_a_class() {
    init_tracing();
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

    assert_eq!(table.unify(f), table.unify(g));
    assert!(table.check_sanity().is_ok());
}

/// `fn<A>(A)` built twice: the representatives agree and so do the inner
/// variables, position-wise.
#[test]
fn inner_variables_merge_with_their_binders() {
    let mut table = TypeTable::new();

    let a1 = table.type_var();
    let f1 = table.function(smallvec![a1]).unwrap();
    table.add_bound_var(f1, a1).unwrap();

    let a2 = table.type_var();
    let f2 = table.function(smallvec![a2]).unwrap();
    table.add_bound_var(f2, a2).unwrap();

    let r1 = table.unify(f1);
    let r2 = table.unify(f2);
    assert_eq!(r1, r2);
    assert_eq!(table.representative(a1), table.representative(a2));
    assert!(table.check_sanity().is_ok());
}

/// Trait-bound sets compare as sets: `fn<C: Clonable + Equality, D>(C, D)`
/// and `fn<E: Equality + Clonable, F>(E, F)` are the same type.
#[test]
fn bound_sets_are_order_insensitive() {
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

    let ei2 = table.instantiate_trait(equality, smallvec![]).unwrap();
    let ci2 = table.instantiate_trait(clonable, smallvec![]).unwrap();
    let e = table.type_var_with_bounds(smallvec![ei2, ci2]);
    let x = table.type_var();
    let g = table.function(smallvec![e, x]).unwrap();
    table.add_bound_var(g, e).unwrap();
    table.add_bound_var(g, x).unwrap();

    assert_eq!(table.unify(f), table.unify(g));
    assert!(table.check_sanity().is_ok());
}

/// `fn(int).add_bound_var(A)` is vacuous; the failure leaves no trace.
#[test]
fn vacuous_generalization_is_inert() {
    let mut table = TypeTable::new();
    let int = table.type_int();
    let a = table.type_var();
    let f = table.function(smallvec![int]).unwrap();

    let err = table.add_bound_var(f, a);
    assert!(matches!(err, Err(TypeError::VacuousBinding { .. })));
    assert!(table.var_bound_at(a).is_none());
    assert!(table.bound_vars(f).is_empty());
    assert!(table.check_sanity().is_ok());

    // the failed attempt changed nothing observable
    let g = table.function(smallvec![int]).unwrap();
    assert!(table.same(f, g));
}

/// `A.add_bound_var(A)` is rejected and `A` stays free.
#[test]
fn self_generalization_is_inert() {
    let mut table = TypeTable::new();
    let a = table.type_var();

    let err = table.add_bound_var(a, a);
    assert!(matches!(err, Err(TypeError::SelfBinding { .. })));
    assert!(table.var_bound_at(a).is_none());
    assert!(table.check_sanity().is_ok());
}

/// Mutually recursive bounds `A: S<B>, B: S<A>` round-trip through
/// construction, unification, sanity, and display.
#[test]
fn cyclic_bounds_round_trip() {
    init_tracing();
    let mut table = TypeTable::new();
    let name = table.intern_name("S");
    let s = table.trait_def(name, 1);

    let a = table.type_var();
    let b = table.type_var();
    let s_b = table.instantiate_trait(s, smallvec![b]).unwrap();
    let s_a = table.instantiate_trait(s, smallvec![a]).unwrap();
    table.add_trait_bound(a, s_b).unwrap();
    table.add_trait_bound(b, s_a).unwrap();

    let f = table.function(smallvec![a, b]).unwrap();
    table.add_bound_var(f, a).unwrap();
    table.add_bound_var(f, b).unwrap();

    let rep = table.unify(f);
    assert!(table.check_sanity().is_ok());
    assert_eq!(table.display(rep), "fn<A: S<B>, B: S<A>>(A, B)");

    // and a second, independently built copy joins the same class
    let a2 = table.type_var();
    let b2 = table.type_var();
    let s_b2 = table.instantiate_trait(s, smallvec![b2]).unwrap();
    let s_a2 = table.instantiate_trait(s, smallvec![a2]).unwrap();
    table.add_trait_bound(a2, s_b2).unwrap();
    table.add_trait_bound(b2, s_a2).unwrap();
    let f2 = table.function(smallvec![a2, b2]).unwrap();
    table.add_bound_var(f2, a2).unwrap();
    table.add_bound_var(f2, b2).unwrap();

    assert_eq!(table.unify(f2), rep);
    assert!(table.check_sanity().is_ok());
}

/// Two free variables keep `fn(A)` and `fn(B)` apart; generalizing each
/// merges the classes.
#[test]
fn generalization_turns_rigid_into_alpha() {
    let mut table = TypeTable::new();

    let a = table.type_var();
    let b = table.type_var();
    let f = table.function(smallvec![a]).unwrap();
    let g = table.function(smallvec![b]).unwrap();

    // free variables are rigid: distinct identities, distinct classes
    assert!(!table.equal(f, g));
    assert!(table.representative(f).is_none());
    assert!(table.representative(g).is_none());

    table.add_bound_var(f, a).unwrap();
    table.add_bound_var(g, b).unwrap();
    assert!(table.same(f, g));
    assert!(table.check_sanity().is_ok());
}

/// Instantiating `fn<A: Eq>(A, A)` at `i32` yields `fn(i32, i32)` plus the
/// obligation `i32 : Eq`.
#[test]
fn instantiation_reports_obligations() {
    let mut table = TypeTable::new();
    let int = table.type_int();
    let name = table.intern_name("Eq");
    let eq = table.trait_def(name, 0);
    let eq_inst = table.instantiate_trait(eq, smallvec![]).unwrap();

    let a = table.type_var_with_bounds(smallvec![eq_inst]);
    let f = table.function(smallvec![a, a]).unwrap();
    table.add_bound_var(f, a).unwrap();
    let f = table.unify(f);

    let mut mapping = FxHashMap::default();
    mapping.insert(a, int);
    let inst = table.instantiate(f, &mapping).unwrap();

    let expected = table.function(smallvec![int, int]).unwrap();
    assert_eq!(inst.ty, table.unify(expected));
    assert_eq!(inst.obligations.len(), 1);
    assert_eq!(inst.obligations[0].target, int);
    assert_eq!(table.display_instance(inst.obligations[0].bound), "Eq");
    assert!(table.check_sanity().is_ok());
}
