pub mod describe;
pub mod display_width;
pub mod error;
pub mod example;
pub mod flow_graph;
pub mod mapper;
pub mod minimal;
pub mod model;
pub mod renderer;
pub mod schema_ast;
pub mod schema_parser;
pub mod validate;

pub use error::GenError;
pub use mapper::Outcome;
pub use model::GeneratedModel;

use std::collections::HashMap;

use log::warn;

use flow_graph::{FlowGraph, GraphInput};
use minimal::{BillingRelevance, MinimalFieldPolicy};
use schema_ast::TableSchema;

pub struct RenderOptions {
    /// Only these tables, in schema order. Empty means every table.
    pub tables: Vec<String>,
    pub policy: Box<dyn MinimalFieldPolicy>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            policy: Box::new(BillingRelevance),
        }
    }
}

#[derive(Debug, Default)]
pub struct Rendered {
    pub output: String,
    pub failures: Vec<(String, GenError)>,
}

impl Rendered {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&GenError> {
        self.failures.first().map(|(_, e)| e)
    }
}

pub fn render(input: &str) -> Result<Rendered, GenError> {
    render_with_options(input, &RenderOptions::default())
}

/// Reports for every selected table that generated, concatenated in schema
/// order. A failing table is recorded in `failures` and skipped. Only input
/// that cannot be parsed, or an unknown table filter, fails the whole call.
pub fn render_with_options(input: &str, options: &RenderOptions) -> Result<Rendered, GenError> {
    let mut rendered = Rendered::default();
    for outcome in generate_models(input, options)? {
        match outcome.result.and_then(|model| renderer::report(&model)) {
            Ok(report) => rendered.output.push_str(&report),
            Err(e) => rendered.failures.push((outcome.table, e)),
        }
    }
    Ok(rendered)
}

/// Build the flow graph from every table that generated. Tables that failed
/// are left out; a record of such a table fails with that table's error.
pub fn generate_flow_graph(input: &str, records: &GraphInput) -> Result<FlowGraph, GenError> {
    let mut models = Vec::new();
    let mut failed: HashMap<String, GenError> = HashMap::new();
    for outcome in generate_models(input, &RenderOptions::default())? {
        match outcome.result {
            Ok(model) => models.push(model),
            Err(e) => {
                warn!("{}: left out of the flow graph: {e}", outcome.table);
                failed.entry(outcome.table).or_insert(e);
            }
        }
    }
    // A repeated table name fails, but its first definition still counts.
    failed.retain(|table, _| !models.iter().any(|m| &m.table == table));

    if let Some(table) = records
        .records
        .iter()
        .map(|r| r.table.as_str())
        .find(|t| failed.contains_key(*t))
    {
        if let Some(e) = failed.remove(table) {
            return Err(e);
        }
    }
    flow_graph::build_flow_graph(&models, records)
}

/// Parse DDL and generate each selected table independently.
pub fn generate_models(input: &str, options: &RenderOptions) -> Result<Vec<Outcome>, GenError> {
    let schemas = schema_parser::parse_schemas(input)?;
    if schemas.is_empty() {
        return Err(GenError::Syntax {
            line: 1,
            context: "no CREATE TABLE statement".to_string(),
        });
    }
    let selected = select_tables(schemas, &options.tables)?;
    Ok(mapper::generate_all(&selected, options.policy.as_ref()))
}

fn select_tables(schemas: Vec<TableSchema>, names: &[String]) -> Result<Vec<TableSchema>, GenError> {
    if names.is_empty() {
        return Ok(schemas);
    }
    if let Some(missing) = names.iter().find(|n| !schemas.iter().any(|s| &s.name == *n)) {
        return Err(GenError::UnknownTable(missing.clone()));
    }
    Ok(schemas
        .into_iter()
        .filter(|s| names.contains(&s.name))
        .collect())
}
