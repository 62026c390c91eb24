//! 知識ベースの S 式への書き出し

use fuzzydl_model::FeatureKind;
use std::fmt::{self, Write};

use crate::absorption::DeclaredAxiom;
use crate::kb::KnowledgeBase;

/// Roles generated by the reasoner itself
fn is_generated_role(role: &str) -> bool {
    role.ends_with("^-")
}

fn write_axiom<W: Write>(axiom: &DeclaredAxiom, w: &mut W) -> fmt::Result {
    match axiom {
        DeclaredAxiom::Definition { defined, concept } => writeln!(w, "(define-concept {defined} {concept})"),
        DeclaredAxiom::Primitive(pcd) if pcd.degree >= 1.0 => {
            writeln!(w, "(define-primitive-concept {} {})", pcd.defined, pcd.definition)
        }
        DeclaredAxiom::Primitive(pcd) => writeln!(w, "{pcd}"),
        DeclaredAxiom::Equivalence(eq) => writeln!(w, "{eq}"),
        DeclaredAxiom::Inclusion(gci) => writeln!(w, "{gci}"),
        DeclaredAxiom::Disjoint(names) => writeln!(w, "(disjoint {})", names.join(" ")),
        DeclaredAxiom::Domain { role, concept } => writeln!(w, "(domain {role} {concept})"),
        DeclaredAxiom::Range { role, concept } => writeln!(w, "(range {role} {concept})"),
    }
}

/// Writes the knowledge base in the textual s-expression dialect
pub fn write_knowledge_base<W: Write>(kb: &KnowledgeBase, w: &mut W) -> fmt::Result {
    writeln!(w, "(define-fuzzy-logic {})", kb.config.logic)?;

    for (feature, kind) in &kb.features {
        let kind = if kb.string_ranks.contains_key(feature) {
            FeatureKind::String
        } else {
            *kind
        };
        writeln!(w, "{}", kind.definition(feature))?;
    }
    if let Some((k1, k2)) = kb.fuzzy_number_range {
        writeln!(w, "(define-fuzzy-number-range {k1} {k2})")?;
    }
    for (name, value) in &kb.truth_constants {
        writeln!(w, "(define-truth-constant {name} {value})")?;
    }
    for modifier in kb.modifiers.values() {
        writeln!(w, "{}", modifier.definition())?;
    }
    for fuzzy in kb.fuzzy_concepts.values() {
        writeln!(w, "{}", fuzzy.definition())?;
    }

    for axiom in kb.tbox.declared() {
        write_axiom(axiom, w)?;
    }

    for (role, info) in kb.roles.roles() {
        if is_generated_role(role) || info.concrete {
            continue;
        }
        if info.functional {
            writeln!(w, "(functional {role})")?;
        }
        if info.inverse_functional {
            writeln!(w, "(inverse-functional {role})")?;
        }
        if info.transitive {
            writeln!(w, "(transitive {role})")?;
        }
        if info.reflexive {
            writeln!(w, "(reflexive {role})")?;
        }
        if info.symmetric {
            writeln!(w, "(symmetric {role})")?;
        }
        for inverse in &info.inverses {
            if inverse.as_str() > role.as_str() && !is_generated_role(inverse) {
                writeln!(w, "(inverse {role} {inverse})")?;
            }
        }
        for (parent, degree) in &info.parents {
            writeln!(w, "(implies-role {role} {parent} {degree})")?;
        }
    }

    for assertion in &kb.declared_assertions {
        writeln!(
            w,
            "(instance {} {} {})",
            assertion.individual, assertion.concept, assertion.degree
        )?;
    }
    for relation in &kb.declared_relations {
        writeln!(
            w,
            "(related {} {} {} {})",
            relation.subject, relation.object, relation.role, relation.degree
        )?;
    }
    Ok(())
}

pub fn knowledge_base_to_string(kb: &KnowledgeBase) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_knowledge_base(kb, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuzzydl_model::{Concept, FuzzyLogic, ImplicationKind, Modifier};

    #[test]
    fn test_serialized_sections() {
        let mut kb = KnowledgeBase::with_logic(FuzzyLogic::Goedel);
        kb.define_integer_concrete_feature("age", 0, 120).unwrap();
        kb.define_modifier(Modifier::linear("very", 0.8).unwrap()).unwrap();
        kb.define_atomic_concept("Student", Concept::atomic("Person"), ImplicationKind::Lukasiewicz, 1.0)
            .unwrap();
        kb.add_concepts_disjoint(&["Cat", "Dog"]).unwrap();
        kb.role_is_transitive("partOf").unwrap();
        kb.add_inverse_roles("hasChild", "hasParent").unwrap();
        kb.add_assertion("ann", Concept::atomic("Student"), 0.8).unwrap();
        kb.add_relation("ann", "hasChild", "bob", 1.0).unwrap();

        let text = knowledge_base_to_string(&kb);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "(define-fuzzy-logic goedel)");
        assert!(lines.contains(&"(range age *integer* 0 120)"));
        assert!(lines.contains(&"(define-modifier very linear-modifier(0.8))"));
        assert!(lines.contains(&"(define-primitive-concept Student Person)"));
        assert!(lines.contains(&"(disjoint Cat Dog)"));
        assert!(lines.contains(&"(transitive partOf)"));
        assert!(lines.contains(&"(inverse hasChild hasParent)"));
        assert!(lines.contains(&"(instance ann Student 0.8)"));
        assert!(lines.contains(&"(related ann bob hasChild 1)"));
    }

    #[test]
    fn test_generated_inverse_is_hidden() {
        let mut kb = KnowledgeBase::default();
        kb.role_is_inverse_functional("hasSSN").unwrap();
        let text = knowledge_base_to_string(&kb);
        assert!(text.contains("(inverse-functional hasSSN)"));
        assert!(!text.contains("^-"));
    }
}
