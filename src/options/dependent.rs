//! Dependent dropdowns: a child control's options filtered by a parent's value.
//!
//! Relationships come from the configured rule table and the data-source names
//! declared on fields. They are held as a petgraph directed graph of control
//! identifiers so chains (country → state → city) refresh parent-first.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde_json::Value;

use crate::config::DependentRule;
use crate::render::types::RenderTree;
use crate::state::value::{has_value, scalar_text, unwrap_value};

use super::mapping::OptionItem;

#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Nodes are control identifiers; edge weights index the rule table.
    pub graph: DiGraph<String, usize>,
    pub node_indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// For every rule, the first control bound to the parent source drives
    /// every control bound to the child source.
    pub fn build(rules: &[DependentRule], tree: &RenderTree) -> Self {
        let mut graph = DependencyGraph::default();
        let fields = tree.fields();

        for (rule_index, rule) in rules.iter().enumerate() {
            let Some(parent) = fields
                .iter()
                .find(|f| f.field.data_source.as_deref() == Some(rule.parent_source.as_str()))
            else {
                continue;
            };
            for child in fields
                .iter()
                .filter(|f| f.field.data_source.as_deref() == Some(rule.child_source.as_str()))
            {
                if child.control_id == parent.control_id {
                    continue;
                }
                let p = graph.node(&parent.control_id);
                let c = graph.node(&child.control_id);
                graph.graph.add_edge(p, c, rule_index);
            }
        }
        graph
    }

    fn node(&mut self, control_id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(control_id) {
            return idx;
        }
        let idx = self.graph.add_node(control_id.to_string());
        self.node_indices.insert(control_id.to_string(), idx);
        idx
    }

    pub fn is_empty(&self) -> bool {
        self.graph.edge_count() == 0
    }

    /// `(parent, child, rule)` triples, parents before their children. A cyclic
    /// rule table falls back to insertion order.
    pub fn ordered_edges(&self) -> Vec<(&str, &str, usize)> {
        let order: Vec<NodeIndex> = match toposort(&self.graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                tracing::warn!(
                    control_id = %self.graph[cycle.node_id()],
                    "dependent dropdown rules form a cycle"
                );
                self.graph.node_indices().collect()
            }
        };
        order
            .into_iter()
            .flat_map(|idx| {
                self.graph
                    .edges_directed(idx, Direction::Outgoing)
                    .map(|e| {
                        (
                            self.graph[e.source()].as_str(),
                            self.graph[e.target()].as_str(),
                            *e.weight(),
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// Options whose raw row links to the parent value. The link property may
/// hold a scalar or an array; comparison is by coerced string.
pub fn filter_options(all: &[OptionItem], link_property: &str, parent_value: &Value) -> Vec<OptionItem> {
    if !has_value(parent_value) {
        return Vec::new();
    }
    all.iter()
        .filter(|option| {
            let link = match &option.raw {
                Value::Object(row) => row.get(link_property),
                _ => None,
            };
            link.is_some_and(|link| link_contains(link, parent_value))
        })
        .cloned()
        .collect()
}

fn link_contains(link: &Value, parent_value: &Value) -> bool {
    let parents: Vec<String> = match unwrap_value(parent_value) {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    };
    match link {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .any(|l| parents.contains(&l)),
        other => scalar_text(other).is_some_and(|l| parents.contains(&l)),
    }
}
