use anyhow::Result;
use fuzzydl_model::{Concept, ConnectiveKind, FuzzyLogic, ImplicationKind};
use fuzzydl_reasoner::{knowledge_base_to_string, BlockingType, KnowledgeBase, ReasonerConfig, ReasonerError};
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-4;

fn assert_degree(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "{what}: expected {expected}, got {actual}"
    );
}

fn conjunction_kb(logic: FuzzyLogic, a: f64, b: f64) -> Result<KnowledgeBase> {
    let mut kb = KnowledgeBase::with_logic(logic);
    kb.add_assertion("x", Concept::atomic("A"), a)?;
    kb.add_assertion("x", Concept::atomic("B"), b)?;
    Ok(kb)
}

fn both(kind: ConnectiveKind) -> Concept {
    Concept::and(kind, vec![Concept::atomic("A"), Concept::atomic("B")])
}

#[test]
fn test_lukasiewicz_conjunction_degree() -> Result<()> {
    let mut kb = conjunction_kb(FuzzyLogic::Lukasiewicz, 0.7, 0.6)?;
    let degree = kb.min_instance_degree("x", &both(ConnectiveKind::Lukasiewicz))?;
    assert_degree(degree, 0.3, "Łukasiewicz t-norm");
    Ok(())
}

#[test]
fn test_goedel_conjunction_degree() -> Result<()> {
    let mut kb = conjunction_kb(FuzzyLogic::Goedel, 0.7, 0.6)?;
    let degree = kb.min_instance_degree("x", &both(ConnectiveKind::Goedel))?;
    assert_degree(degree, 0.6, "Gödel t-norm");
    Ok(())
}

#[test]
fn test_role_inclusion_degree_reaches_existential() -> Result<()> {
    let mut kb = KnowledgeBase::default();
    kb.role_implies("hasFriend", "knows", 0.8)?;
    kb.add_relation("ann", "hasFriend", "bob", 1.0)?;
    kb.add_assertion("bob", Concept::atomic("Kind"), 1.0)?;

    let degree = kb.min_instance_degree("ann", &Concept::exists("knows", Concept::atomic("Kind")))?;
    assert_degree(degree, 0.8, "∃knows.Kind through hasFriend ⊑ knows");
    Ok(())
}

#[test]
fn test_range_applies_to_objects() -> Result<()> {
    let mut kb = KnowledgeBase::default();
    kb.role_range("hasChild", Concept::atomic("Person"))?;
    kb.add_relation("ann", "hasChild", "bob", 1.0)?;

    let degree = kb.min_instance_degree("bob", &Concept::atomic("Person"))?;
    assert_degree(degree, 1.0, "range of hasChild");
    let unrelated = kb.min_instance_degree("ann", &Concept::atomic("Person"))?;
    assert_degree(unrelated, 0.0, "subject is not in the range");
    Ok(())
}

#[test]
fn test_lukasiewicz_disjointness_conflict() -> Result<()> {
    let mut kb = KnowledgeBase::default();
    kb.add_concepts_disjoint(&["Cat", "Dog"])?;
    kb.add_assertion("tom", Concept::atomic("Cat"), 0.6)?;
    kb.add_assertion("tom", Concept::atomic("Dog"), 0.5)?;
    assert!(!kb.is_consistent()?, "0.6 + 0.5 exceeds 1");

    let mut weaker = KnowledgeBase::default();
    weaker.add_concepts_disjoint(&["Cat", "Dog"])?;
    weaker.add_assertion("tom", Concept::atomic("Cat"), 0.6)?;
    weaker.add_assertion("tom", Concept::atomic("Dog"), 0.4)?;
    assert!(weaker.is_consistent()?);
    Ok(())
}

#[test]
fn test_inconsistent_query_is_an_error() -> Result<()> {
    let mut kb = KnowledgeBase::default();
    kb.add_assertion("a", Concept::atomic("A"), 0.8)?;
    kb.add_assertion("a", Concept::not(Concept::atomic("A")), 0.8)?;
    assert!(!kb.is_consistent()?);
    assert!(matches!(
        kb.min_instance_degree("a", &Concept::atomic("A")),
        Err(ReasonerError::InconsistentOntology(_))
    ));
    Ok(())
}

#[test]
fn test_cyclic_terminology_terminates_with_blocking() -> Result<()> {
    let mut kb = KnowledgeBase::with_logic(FuzzyLogic::Goedel);
    kb.define_atomic_concept(
        "Person",
        Concept::exists("hasParent", Concept::atomic("Person")),
        ImplicationKind::Goedel,
        1.0,
    )?;
    kb.add_assertion("ann", Concept::atomic("Person"), 1.0)?;

    assert!(kb.is_consistent()?);
    assert_ne!(kb.blocking_type(), BlockingType::NoBlocking);
    let stats = kb.stats();
    assert!(stats.existentials_expanded > 0);
    assert!(stats.individuals_created < 10, "created {}", stats.individuals_created);
    Ok(())
}

#[test]
fn test_individual_limit_without_blocking() -> Result<()> {
    let config = ReasonerConfig::from_json_str(r#"{"blocking": "NoBlocking", "max_individuals": 3}"#)?;
    let mut kb = KnowledgeBase::new(config);
    kb.define_atomic_concept(
        "Person",
        Concept::exists("hasParent", Concept::atomic("Person")),
        ImplicationKind::Lukasiewicz,
        1.0,
    )?;
    kb.add_assertion("ann", Concept::atomic("Person"), 1.0)?;

    assert!(matches!(
        kb.is_consistent(),
        Err(ReasonerError::MaxIndividualsExceeded(3))
    ));
    Ok(())
}

#[test]
fn test_configuration_selects_logic() -> Result<()> {
    let config = ReasonerConfig::from_json_str(r#"{"logic": "Zadeh"}"#)?;
    let mut kb = KnowledgeBase::new(config);
    assert_eq!(kb.logic(), FuzzyLogic::Zadeh);

    kb.add_assertion("a", Concept::atomic("A"), 0.3)?;
    let degree = kb.max_instance_degree("a", &Concept::not(Concept::atomic("A")))?;
    assert_degree(degree, 0.7, "involutive negation");
    Ok(())
}

#[test]
fn test_serialized_knowledge_base_lists_axioms() -> Result<()> {
    let mut kb = KnowledgeBase::default();
    kb.define_concept("Parent", Concept::exists("hasChild", Concept::Top));
    kb.add_assertion("ann", Concept::atomic("Parent"), 0.9)?;

    let text = knowledge_base_to_string(&kb);
    assert!(text.starts_with("(define-fuzzy-logic lukasiewicz)"));
    assert!(text.contains("(define-concept Parent"));
    assert!(text.contains("(instance ann Parent 0.9)"));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn lukasiewicz_conjunction_matches_t_norm(a in 0.05f64..1.0, b in 0.05f64..1.0) {
        let mut kb = conjunction_kb(FuzzyLogic::Lukasiewicz, a, b).unwrap();
        let degree = kb.min_instance_degree("x", &both(ConnectiveKind::Lukasiewicz)).unwrap();
        prop_assert!((degree - (a + b - 1.0).max(0.0)).abs() < TOLERANCE);
    }

    #[test]
    fn goedel_conjunction_matches_minimum(a in 0.05f64..1.0, b in 0.05f64..1.0) {
        let mut kb = conjunction_kb(FuzzyLogic::Goedel, a, b).unwrap();
        let degree = kb.min_instance_degree("x", &both(ConnectiveKind::Goedel)).unwrap();
        prop_assert!((degree - a.min(b)).abs() < TOLERANCE);
    }
}
