//! Text in, compiled query (or diagnostics) out.

use std::collections::{BTreeSet, HashMap};

use delve_store::CatalogEntry;
use tracing::{debug, warn};

use crate::ast::{AttrRef, QueryAst};
use crate::compiler::{CompiledQuery, Compiler, CompilerOptions, ProjectionMap};
use crate::error::ParseError;
use crate::parser::parse;
use crate::resolver::{AttributeResolver, Resolution};

/// Everything known about one query text.
///
/// `query` is `None` whenever `errors` is non-empty, so invalid text never
/// partially executes.
#[derive(Debug, Clone, Default)]
pub struct ProcessResult {
    pub query: Option<CompiledQuery>,
    pub errors: Vec<ParseError>,
    pub warnings: Vec<String>,
    pub projection: Option<ProjectionMap>,
}

impl ProcessResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.query.is_some()
    }

    fn failed(errors: Vec<ParseError>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }
}

/// Configurable front end: options plus an optional resolver.
pub struct Processor<'a> {
    options: CompilerOptions,
    resolver: Option<(&'a dyn AttributeResolver, &'a [CatalogEntry])>,
}

impl Default for Processor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Processor<'a> {
    pub fn new() -> Self {
        Self {
            options: CompilerOptions::default(),
            resolver: None,
        }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_resolver(
        mut self,
        resolver: &'a dyn AttributeResolver,
        catalog: &'a [CatalogEntry],
    ) -> Self {
        self.resolver = Some((resolver, catalog));
        self
    }

    pub fn process(&self, text: &str) -> ProcessResult {
        let ast = match parse(text) {
            Ok(ast) => ast,
            Err(errors) => {
                debug!(errors = errors.len(), "EQL-S parse failed");
                return ProcessResult::failed(errors);
            }
        };

        let mut warnings = Vec::new();
        let aliases = match self.resolver {
            Some((resolver, catalog)) if !catalog.is_empty() => {
                resolve_attributes(&ast, resolver, catalog, &mut warnings)
            }
            _ => HashMap::new(),
        };

        let compiled = Compiler::new(self.options.clone())
            .with_aliases(aliases)
            .compile(&ast);
        ProcessResult {
            projection: Some(compiled.projection.clone()),
            query: Some(compiled),
            errors: Vec::new(),
            warnings,
        }
    }
}

/// Resolve every dotted attribute in `ast`, returning the substitutions.
fn resolve_attributes(
    ast: &QueryAst,
    resolver: &dyn AttributeResolver,
    catalog: &[CatalogEntry],
    warnings: &mut Vec<String>,
) -> HashMap<String, String> {
    let attributes: BTreeSet<String> = ast.attr_refs().filter_map(AttrRef::attribute).collect();

    let mut aliases = HashMap::new();
    for attribute in attributes {
        match resolver.resolve(&attribute, catalog) {
            Resolution::Exact => {}
            Resolution::Substitute(resolved) => {
                warn!(attribute = %attribute, resolved = %resolved, "attribute resolved");
                warnings.push(format!("attribute `{}` resolved to `{}`", attribute, resolved));
                aliases.insert(attribute, resolved);
            }
            Resolution::Unknown => {
                warn!(attribute = %attribute, "unknown attribute");
                warnings.push(format!("unknown attribute `{}`", attribute));
            }
        }
    }
    aliases
}

/// Parse and compile with default options.
pub fn process(text: &str) -> ProcessResult {
    Processor::new().process(text)
}

/// Parse, resolve attribute names against `catalog`, then compile.
pub fn process_with(
    text: &str,
    resolver: &dyn AttributeResolver,
    catalog: &[CatalogEntry],
) -> ProcessResult {
    Processor::new().with_resolver(resolver, catalog).process(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::CaseInsensitiveResolver;
    use delve_datalog::{Goal, Literal, Term};
    use delve_store::{Fact, FactStore};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_process_ok() {
        let result = process("FIND post AS ?p WHERE ?p.views > 10 RETURN ?p.title");
        assert!(result.is_ok());
        assert!(result.warnings.is_empty());
        let projection = result.projection.unwrap();
        assert_eq!(projection.fields().collect::<Vec<_>>(), vec!["?p.title"]);
    }

    #[test]
    fn test_process_errors_have_no_query() {
        let result = process("FIND post AS ?p WHERE ?p.views >");
        assert!(!result.is_ok());
        assert!(result.query.is_none());
        assert!(result.projection.is_none());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_process_with_substitutes_and_warns() {
        let mut store = FactStore::new();
        store.add_facts([
            Fact::type_of("post:1", "post"),
            Fact::new("post:1", "title", "Hello"),
        ]);
        let catalog = store.catalog();
        let result = process_with(
            "FIND post AS ?p RETURN ?p.Title, ?p.likes",
            &CaseInsensitiveResolver,
            &catalog,
        );
        assert_eq!(
            result.warnings,
            vec![
                "attribute `Title` resolved to `title`".to_string(),
                "unknown attribute `likes`".to_string(),
            ]
        );
        let compiled = result.query.unwrap();
        assert_eq!(compiled.projection.get("?p.Title"), Some("$o0"));
        assert!(compiled.query.goals.contains(&Goal::from(Literal::attr(
            Term::var("p"),
            Term::constant("title"),
            Term::var("$o0")
        ))));
    }

    #[test]
    fn test_empty_catalog_skips_resolution() {
        let result = process_with("FIND post AS ?p RETURN ?p.Title", &CaseInsensitiveResolver, &[]);
        assert!(result.is_ok());
        assert!(result.warnings.is_empty());
    }
}
