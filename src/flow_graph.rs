use std::collections::{HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GenError;
use crate::model::{GeneratedModel, Instance};
use crate::validate::{self, Scope};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowNode {
    pub id: String,
    pub table: String,
    pub minimal: Map<String, Value>,
    pub others: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Default, Serialize)]
pub struct FlowGraph {
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    edge_set: HashSet<FlowEdge>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn add_record(
        &mut self,
        id: &str,
        model: &GeneratedModel,
        record: &Instance,
    ) -> Result<(), GenError> {
        if self.index.contains_key(id) {
            return Err(GenError::Graph(format!("duplicate node `{id}`")));
        }
        let mut minimal = Map::new();
        let mut others = Map::new();
        for (name, value) in record.iter() {
            let side = if model.minimal_fields.contains(name) {
                &mut minimal
            } else {
                &mut others
            };
            side.insert(name.to_string(), value.to_json());
        }
        self.index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(FlowNode {
            id: id.to_string(),
            table: model.table.clone(),
            minimal,
            others,
        });
        Ok(())
    }

    /// Link two existing nodes. Repeated edges are kept once.
    pub fn add_edge(&mut self, source: &str, target: &str) -> Result<(), GenError> {
        for id in [source, target] {
            if !self.index.contains_key(id) {
                return Err(GenError::Graph(format!("edge references unknown node `{id}`")));
            }
        }
        let edge = FlowEdge {
            source: source.to_string(),
            target: target.to_string(),
        };
        if self.edge_set.insert(edge.clone()) {
            self.edges.push(edge);
        }
        Ok(())
    }

    pub fn successors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source == id)
            .map(|e| e.target.as_str())
    }

    pub fn to_json(&self) -> Result<String, GenError> {
        serde_json::to_string_pretty(self).map_err(|e| GenError::Graph(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphInput {
    pub records: Vec<RecordInput>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

#[derive(Debug, Deserialize)]
pub struct RecordInput {
    pub id: String,
    pub table: String,
    pub values: Value,
}

impl GraphInput {
    pub fn from_json(text: &str) -> Result<Self, GenError> {
        serde_json::from_str(text).map_err(|e| GenError::Graph(format!("invalid records: {e}")))
    }
}

pub fn build_flow_graph(
    models: &[GeneratedModel],
    input: &GraphInput,
) -> Result<FlowGraph, GenError> {
    let by_table: HashMap<&str, &GeneratedModel> =
        models.iter().map(|m| (m.table.as_str(), m)).collect();

    let mut graph = FlowGraph::new();
    for record in &input.records {
        let model = by_table.get(record.table.as_str()).ok_or_else(|| {
            GenError::Graph(format!(
                "record `{}` references unknown table `{}`",
                record.id, record.table
            ))
        })?;
        let instance = validate::parse_instance(model, &record.values, Scope::Full).map_err(
            |detail| GenError::Graph(format!("record `{}` is not a valid {}: {detail}", record.id, model.type_name)),
        )?;
        graph.add_record(&record.id, model, &instance)?;
    }
    for edge in &input.edges {
        graph.add_edge(&edge.source, &edge.target)?;
    }

    debug!(
        "flow graph: {} nodes, {} edges",
        graph.nodes.len(),
        graph.edges.len()
    );
    Ok(graph)
}
