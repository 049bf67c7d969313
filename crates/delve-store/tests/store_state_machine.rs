//! Stateful property testing for FactStore ingestion and lookup.
//!
//! A plain vector of facts and links serves as the reference model; after
//! every transition the indexed lookups and stats must agree with a linear
//! scan of the model.

use std::collections::HashSet;

use proptest::prelude::*;
use proptest_state_machine::{ReferenceStateMachine, StateMachineTest, prop_state_machine};

use delve_store::{Atom, Fact, FactStore, Link};

const ENTITIES: &[&str] = &["post:1", "post:2", "user:a", "user:b"];
const ATTRIBUTES: &[&str] = &["views", "title", "type", "score"];
const LABELS: &[&str] = &["FOLLOWS", "WROTE"];

/// Operations that can be performed on the store.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Append a single fact.
    AddFact(Fact),
    /// Append a batch of facts, possibly with duplicates.
    AddFacts(Vec<Fact>),
    /// Append a link.
    AddLink(Link),
}

/// Reference model: everything ever appended, in order.
#[derive(Clone, Debug, Default)]
pub struct StoreModel {
    pub facts: Vec<Fact>,
    pub links: Vec<Link>,
}

fn atom_strategy() -> impl Strategy<Value = Atom> {
    prop_oneof![
        (0i64..50).prop_map(Atom::from),
        "[a-c]{1,2}".prop_map(Atom::from),
        any::<bool>().prop_map(Atom::from),
        Just(Atom::Null),
    ]
}

fn fact_strategy() -> impl Strategy<Value = Fact> {
    (
        proptest::sample::select(ENTITIES),
        proptest::sample::select(ATTRIBUTES),
        atom_strategy(),
    )
        .prop_map(|(entity, attribute, value)| Fact::new(entity, attribute, value))
}

impl ReferenceStateMachine for StoreModel {
    type State = Self;
    type Transition = StoreOperation;

    fn init_state() -> BoxedStrategy<Self::State> {
        Just(Self::default()).boxed()
    }

    fn transitions(_state: &Self::State) -> BoxedStrategy<Self::Transition> {
        prop_oneof![
            4 => fact_strategy().prop_map(StoreOperation::AddFact),
            2 => prop::collection::vec(fact_strategy(), 0..6).prop_map(StoreOperation::AddFacts),
            2 => (
                proptest::sample::select(ENTITIES),
                proptest::sample::select(LABELS),
                proptest::sample::select(ENTITIES),
            )
                .prop_map(|(s, l, t)| StoreOperation::AddLink(Link::new(s, l, t))),
        ]
        .boxed()
    }

    fn apply(mut state: Self::State, transition: &Self::Transition) -> Self::State {
        match transition {
            StoreOperation::AddFact(fact) => state.facts.push(fact.clone()),
            StoreOperation::AddFacts(facts) => state.facts.extend(facts.iter().cloned()),
            StoreOperation::AddLink(link) => state.links.push(link.clone()),
        }
        state
    }
}

pub struct StoreHarness;

impl StateMachineTest for StoreHarness {
    type SystemUnderTest = FactStore;
    type Reference = StoreModel;

    fn init_test(
        _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) -> Self::SystemUnderTest {
        FactStore::new()
    }

    fn apply(
        mut state: Self::SystemUnderTest,
        _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        transition: <Self::Reference as ReferenceStateMachine>::Transition,
    ) -> Self::SystemUnderTest {
        match transition {
            StoreOperation::AddFact(fact) => state.add_fact(fact),
            StoreOperation::AddFacts(facts) => state.add_facts(facts),
            StoreOperation::AddLink(link) => state.add_link(link),
        }
        state
    }

    fn check_invariants(
        state: &Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) {
        // Insertion order is preserved, duplicates included
        assert_eq!(state.facts(), ref_state.facts.as_slice());
        assert_eq!(state.links(), ref_state.links.as_slice());

        for entity in ENTITIES {
            let expected: Vec<&Fact> = ref_state
                .facts
                .iter()
                .filter(|f| f.entity == *entity)
                .collect();
            assert_eq!(state.facts_by_entity(entity), expected);
        }

        for attribute in ATTRIBUTES {
            let expected: Vec<&Fact> = ref_state
                .facts
                .iter()
                .filter(|f| f.attribute == *attribute)
                .collect();
            assert_eq!(state.facts_by_attribute(attribute), expected);

            for fact in &expected {
                let by_value = state.facts_by_value(attribute, &fact.value);
                assert!(by_value.iter().all(|f| f.value.canonical() == fact.value.canonical()));
                assert!(!by_value.is_empty());
            }

            let entry = state.catalog_entry(attribute);
            assert_eq!(entry.map(|e| e.fact_count).unwrap_or(0), expected.len());
        }

        let stats = state.stats();
        let mut entities: HashSet<&str> =
            ref_state.facts.iter().map(|f| f.entity.as_str()).collect();
        for link in &ref_state.links {
            entities.insert(&link.source);
            entities.insert(&link.target);
        }
        let attributes: HashSet<&str> = ref_state
            .facts
            .iter()
            .map(|f| f.attribute.as_str())
            .collect();
        assert_eq!(stats.fact_count, ref_state.facts.len());
        assert_eq!(stats.link_count, ref_state.links.len());
        assert_eq!(stats.entity_count, entities.len());
        assert_eq!(stats.attribute_count, attributes.len());
    }
}

prop_state_machine! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 2000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn store_state_machine_test(sequential 1..40 => StoreHarness);
}
