use delve_datalog::Evaluator;
use delve_eqls::{CompilerOptions, OrMode, Processor, process};
use delve_store::{Atom, Fact, FactStore};
use pretty_assertions::assert_eq;

fn store() -> FactStore {
    let mut store = FactStore::new();
    for (id, title, views) in [
        ("post:1", "Rust ownership", 100),
        ("post:2", "Datalog basics", 500),
        ("post:3", "Rust async", 1000),
        ("post:4", "Gardening", 1001),
    ] {
        store.add_facts([
            Fact::type_of(id, "post"),
            Fact::new(id, "title", title),
            Fact::new(id, "views", views),
        ]);
    }
    store
}

fn titles(text: &str, options: CompilerOptions) -> Vec<String> {
    let result = Processor::new().with_options(options).process(text);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let compiled = result.query.unwrap();
    let var = compiled.projection.get("?p.title").unwrap().to_string();
    let evaluated = Evaluator::default()
        .evaluate(&store(), &compiled.query)
        .unwrap();
    let mut titles: Vec<String> = evaluated
        .bindings
        .iter()
        .filter_map(|b| b.get(&var).and_then(Atom::as_str).map(String::from))
        .collect();
    titles.sort();
    titles
}

#[test]
fn test_between_is_inclusive() {
    assert_eq!(
        titles(
            "FIND post AS ?p WHERE ?p.views BETWEEN 100 AND 1000 RETURN ?p.title",
            CompilerOptions::default()
        ),
        vec!["Datalog basics", "Rust async", "Rust ownership"]
    );
}

#[test]
fn test_matches_case_insensitive() {
    assert_eq!(
        titles(
            "FIND post AS ?p WHERE ?p.title MATCHES /^rust/i RETURN ?p.title",
            CompilerOptions::default()
        ),
        vec!["Rust async", "Rust ownership"]
    );
}

#[test]
fn test_or_modes() {
    let text = "FIND post AS ?p WHERE ?p.views = 100 OR ?p.views = 500 RETURN ?p.title";
    assert!(titles(text, CompilerOptions::default()).is_empty());
    assert_eq!(
        titles(text, CompilerOptions::default().with_or_mode(OrMode::Disjunctive)),
        vec!["Datalog basics", "Rust ownership"]
    );
}

#[test]
fn test_projection_round_trip() {
    let result = process("FIND post AS ?p RETURN ?p.title, ?p.views, ?p");
    let compiled = result.query.unwrap();
    let evaluated = Evaluator::default()
        .evaluate(&store(), &compiled.query)
        .unwrap();
    assert_eq!(evaluated.bindings.len(), 4);
    for binding in &evaluated.bindings {
        for field in compiled.projection.fields() {
            let var = compiled.projection.get(field).unwrap();
            assert!(binding.get(var).is_some(), "{} unbound", field);
        }
    }
}

#[test]
fn test_parse_error_positioned() {
    let result = process("FIND post AS ?p\nWHERE ?p.views >");
    assert!(result.query.is_none());
    let error = &result.errors[0];
    assert_eq!(error.line, 2);
    assert!(error.expected.iter().any(|e| e == "number"));
}

#[test]
fn test_tokenizer_errors_accumulate() {
    let result = process("FIND post AS ?p WHERE ?p.title = \"open\nAND ?p.x ! 3");
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0].line, 1);
    assert_eq!(result.errors[1].line, 2);
}
