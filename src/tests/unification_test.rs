use super::common::{ity, oty, Fixture};
use crate::kernel::normalize::{beta_normalize, eta_expand, to_canonical};
use crate::kernel::term::Term;
use crate::kernel::types::Type;
use crate::kernel::unifier::{pre_unify, pre_unify_all};
use crate::signature::TRUE;

/// A free variable of function type i > i, by index.
fn fun_var(index: u32) -> Term {
    Term::bound(Type::fun1(ity(), ity()), index)
}

#[test]
fn test_bare_variable_against_constant() {
    // X = c solves immediately with [X -> c] and nothing postponed.
    let mut fixture = Fixture::new();
    let c = fixture.sym("c");
    let x = Term::bound(ity(), 1);
    let results: Vec<_> = pre_unify(&mut fixture.sig, x.clone(), c.clone())
        .unwrap()
        .collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].residual.is_empty());
    assert_eq!(results[0].subst.apply(&x), c);
}

#[test]
fn test_abstraction_body_forced_to_witness() {
    // λx. X = λx. x: the extensionality step applies both sides to a fresh
    // witness constant, which the loose variable then has to equal.
    let mut fixture = Fixture::new();
    let left = Term::abs(ity(), Term::bound(ity(), 2));
    let right = Term::abs(ity(), Term::bound(ity(), 1));
    let results: Vec<_> = pre_unify(&mut fixture.sig, left, right).unwrap().collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].residual.is_empty());
    let bound = results[0].subst.apply(&Term::bound(ity(), 1));
    let name = fixture.name_of(&bound).expect("expected a constant binding");
    assert!(name.starts_with("sk"), "expected a witness, got {}", name);
}

#[test]
fn test_driver_postpones_flex_flex_pairs() {
    // Two equations whose heads are all free variables, with the p/q terms
    // as arguments. Nothing is solvable; the whole list comes back as the
    // residual, none of it function-typed.
    let mut fixture = Fixture::new();
    let f_var = |index| Term::bound(Type::fun1(ity(), oty()), index);

    let lam_true = Term::abs(ity(), Term::symbol(TRUE));
    let lam_not_q = Term::abs(
        ity(),
        Term::symbol(crate::signature::NOT).apply_terms(vec![fixture
            .sym("q")
            .apply_terms(vec![Term::bound(ity(), 1)])]),
    );
    let left1 = f_var(1).apply_terms(vec![fixture
        .sym("p")
        .apply_terms(vec![fixture.sym("c"), lam_true])]);
    let right1 = f_var(2).apply_terms(vec![fixture
        .sym("p")
        .apply_terms(vec![fixture.sym("d"), lam_not_q])]);
    let left2 = f_var(1).apply_terms(vec![fixture.sym("c")]);
    let right2 = f_var(2).apply_terms(vec![fixture.sym("d")]);

    let results: Vec<_> = pre_unify_all(
        &mut fixture.sig,
        vec![(left1, right1), (left2, right2)],
    )
    .unwrap()
    .collect();

    assert_eq!(results.len(), 1);
    let residual = &results[0].residual;
    assert_eq!(residual.len(), 2);
    for eq in residual {
        assert!(eq.is_flex_flex());
        let ty = eq.left.typ(&fixture.sig).unwrap();
        assert!(!ty.is_fun(), "residual equation has function type {}", ty);
    }
}

#[test]
fn test_rigid_rigid_clash_under_same_head() {
    // g(a, b) = g(a, c) decomposes to the unsolvable b = c.
    let mut fixture = Fixture::new();
    let left = fixture
        .sym("g")
        .apply_terms(vec![fixture.sym("a"), fixture.sym("b")]);
    let right = fixture
        .sym("g")
        .apply_terms(vec![fixture.sym("a"), fixture.sym("c")]);
    let results: Vec<_> = pre_unify(&mut fixture.sig, left, right).unwrap().collect();
    assert!(results.is_empty());
}

#[test]
fn test_applied_variable_prefers_imitation() {
    // X(a) = c: the imitation [X -> λy. c] solves it. The projection
    // [X -> λy. y] is tried too, but leaves a = c, which clashes, so the
    // stream holds exactly the imitation.
    let mut fixture = Fixture::new();
    let left = fun_var(1).apply_terms(vec![fixture.sym("a")]);
    let right = fixture.sym("c");
    let results: Vec<_> = pre_unify(&mut fixture.sig, left.clone(), right.clone())
        .unwrap()
        .collect();
    assert_eq!(results.len(), 1);
    let binding = results[0].subst.apply(&fun_var(1));
    assert_eq!(binding, Term::abs(ity(), fixture.sym("c")));

    // Soundness: both sides agree after the substitution, up to β.
    let s = beta_normalize(&results[0].subst.apply(&left));
    let t = beta_normalize(&results[0].subst.apply(&right));
    assert_eq!(s, t);
}

#[test]
fn test_applied_variable_both_branches() {
    // X(c) = c: the projection also succeeds here, after the imitation.
    let mut fixture = Fixture::new();
    let left = fun_var(1).apply_terms(vec![fixture.sym("c")]);
    let right = fixture.sym("c");
    let results: Vec<_> = pre_unify(&mut fixture.sig, left, right).unwrap().collect();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].subst.apply(&fun_var(1)),
        Term::abs(ity(), fixture.sym("c"))
    );
    assert_eq!(
        results[1].subst.apply(&fun_var(1)),
        Term::abs(ity(), Term::bound(ity(), 1))
    );
}

#[test]
fn test_occurs_cycle_yields_nothing() {
    // X = f(X) has no finite unifier; the bounded search exhausts silently.
    let mut fixture = Fixture::new();
    let x = Term::bound(ity(), 1);
    let fx = fixture.sym("f").apply_terms(vec![x.clone()]);
    let results: Vec<_> = pre_unify(&mut fixture.sig, x, fx)
        .unwrap()
        .max_depth(8)
        .collect();
    assert!(results.is_empty());
}

#[test]
fn test_identity_on_alpha_equal_inputs() {
    let mut fixture = Fixture::new();
    let lam_q = Term::abs(
        ity(),
        fixture.sym("q").apply_terms(vec![Term::bound(ity(), 1)]),
    );
    let term = fixture
        .sym("p")
        .apply_terms(vec![fixture.sym("c"), lam_q]);
    let results: Vec<_> = pre_unify(&mut fixture.sig, term.clone(), term)
        .unwrap()
        .collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].subst.is_identity());
    assert!(results[0].residual.is_empty());
}

#[test]
fn test_first_order_most_general_unifier() {
    // g(X, b) = g(a, Y): the classical mgu {X -> a, Y -> b}, found first.
    let mut fixture = Fixture::new();
    let left = fixture
        .sym("g")
        .apply_terms(vec![Term::bound(ity(), 1), fixture.sym("b")]);
    let right = fixture
        .sym("g")
        .apply_terms(vec![fixture.sym("a"), Term::bound(ity(), 2)]);
    let results: Vec<_> = pre_unify(&mut fixture.sig, left.clone(), right.clone())
        .unwrap()
        .collect();
    assert_eq!(results.len(), 1);
    let subst = &results[0].subst;
    assert!(results[0].residual.is_empty());
    assert_eq!(subst.apply(&Term::bound(ity(), 1)), fixture.sym("a"));
    assert_eq!(subst.apply(&Term::bound(ity(), 2)), fixture.sym("b"));
    assert_eq!(subst.apply(&left), subst.apply(&right));

    // The closure is idempotent.
    let once = subst.apply(&left);
    assert_eq!(subst.apply(&once), once);
}

#[test]
fn test_well_typedness_is_preserved() {
    let mut fixture = Fixture::new();
    let left = fun_var(1).apply_terms(vec![fixture.sym("a")]);
    let right = fixture.sym("c");
    assert!(left.well_typed(&fixture.sig));
    assert!(right.well_typed(&fixture.sig));
    let results: Vec<_> = pre_unify(&mut fixture.sig, left.clone(), right)
        .unwrap()
        .collect();
    for pre in &results {
        let substituted = pre.subst.apply(&left);
        assert!(substituted.well_typed(&fixture.sig));
        assert!(beta_normalize(&substituted).well_typed(&fixture.sig));
    }
}

#[test]
fn test_normalization_fixed_points() {
    let fixture = Fixture::new();
    // (λy. f y) a: one redex, with an η-long subterm.
    let redex = Term::abs(
        ity(),
        fixture.sym("f").apply_terms(vec![Term::bound(ity(), 1)]),
    )
    .apply_terms(vec![fixture.sym("a")]);

    let beta = beta_normalize(&redex);
    assert_eq!(beta_normalize(&beta), beta);
    assert_eq!(beta, fixture.sym("f").apply_terms(vec![fixture.sym("a")]));

    let eta = eta_expand(&redex, &fixture.sig).unwrap();
    assert_eq!(eta_expand(&eta, &fixture.sig).unwrap(), eta);

    let canonical = to_canonical(&redex, &fixture.sig).unwrap();
    assert_eq!(to_canonical(&canonical, &fixture.sig).unwrap(), canonical);
}

#[test]
fn test_emission_is_deterministic_across_runs() {
    let run = || {
        let mut fixture = Fixture::new();
        let left = fun_var(1).apply_terms(vec![fixture.sym("c")]);
        let right = fixture.sym("c");
        pre_unify(&mut fixture.sig, left, right)
            .unwrap()
            .map(|pre| format!("{}", pre))
            .collect::<Vec<_>>()
    };
    let first = run();
    assert_eq!(first.len(), 2);
    assert_eq!(first, run());
}
