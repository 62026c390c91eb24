use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fuzzydl_model::{Concept, ConnectiveKind, FuzzyLogic, ImplicationKind};
use fuzzydl_reasoner::KnowledgeBase;

fn create_chain_kb(logic: FuzzyLogic, size: usize) -> KnowledgeBase {
    let mut kb = KnowledgeBase::with_logic(logic);

    // A_i ⊑ A_{i-1}
    for i in 1..size {
        kb.define_atomic_concept(
            &format!("A{i}"),
            Concept::atomic(format!("A{}", i - 1)),
            ImplicationKind::Lukasiewicz,
            1.0,
        )
        .unwrap();
    }

    // ind_i : A_i, (ind_i, ind_{i+1}) : R
    for i in 0..size {
        kb.add_assertion(&format!("ind{i}"), Concept::atomic(format!("A{i}")), 0.8)
            .unwrap();
        if i + 1 < size {
            kb.add_relation(&format!("ind{i}"), "R", &format!("ind{}", i + 1), 0.9)
                .unwrap();
        }
    }
    kb
}

fn benchmark_consistency(c: &mut Criterion) {
    for logic in [FuzzyLogic::Lukasiewicz, FuzzyLogic::Zadeh] {
        for size in [5, 10, 20] {
            let kb = create_chain_kb(logic, size);
            c.bench_function(&format!("consistency_{logic}_{size}_individuals"), |b| {
                b.iter(|| {
                    let mut kb = kb.clone();
                    let _result = kb.is_consistent().unwrap();
                });
            });
        }
    }
}

fn benchmark_instance_degree(c: &mut Criterion) {
    let mut kb = create_chain_kb(FuzzyLogic::Lukasiewicz, 10);
    let query = Concept::atomic("A0");
    c.bench_function("min_instance_degree_chain_10", |b| {
        b.iter(|| {
            let _degree = kb.min_instance_degree(black_box("ind9"), black_box(&query)).unwrap();
        });
    });
}

fn benchmark_existential_expansion(c: &mut Criterion) {
    let mut kb = KnowledgeBase::with_logic(FuzzyLogic::Goedel);
    // Cyclic inclusion, terminated by blocking
    kb.define_atomic_concept(
        "Person",
        Concept::exists("hasParent", Concept::atomic("Person")),
        ImplicationKind::Goedel,
        1.0,
    )
    .unwrap();
    let filler = Concept::and(
        ConnectiveKind::Goedel,
        vec![Concept::atomic("Person"), Concept::atomic("Tall")],
    );
    kb.add_assertion("ann", Concept::exists("hasFriend", filler), 0.7)
        .unwrap();

    c.bench_function("blocked_existential_expansion", |b| {
        b.iter(|| {
            let mut kb = kb.clone();
            kb.solve_abox().unwrap();
            black_box(kb.stats());
        });
    });
}

criterion_group!(
    benches,
    benchmark_consistency,
    benchmark_instance_degree,
    benchmark_existential_expansion
);
criterion_main!(benches);
