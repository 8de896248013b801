//! Dominance relationships between soft constraints.
//!
//! A relationship `a >> b` states that soft constraint `a` is more important than `b`. The
//! relationships form a directed graph whose sources are the "head" constraints.
use super::Constraint;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};

/// The operator used to express dominance in textual relationships
const DOMINANCE_OPERATOR: &str = ">>";

/// A set of soft constraints and the dominance relation between them
#[derive(Debug, Default)]
pub struct ConstraintRelationships {
    graph: DiGraph<String, ()>,
    nodes: IndexMap<String, NodeIndex>,
}

impl ConstraintRelationships {
    /// Create an empty set of relationships
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constraint by its identity, returning its node in the graph
    pub fn add_constraint(&mut self, identity: &str) -> NodeIndex {
        if let Some(&node) = self.nodes.get(identity) {
            return node;
        }

        let node = self.graph.add_node(identity.to_string());
        self.nodes.insert(identity.to_string(), node);
        node
    }

    /// Record that `dominant` is more important than `dominated`
    pub fn add_relationship(&mut self, dominant: &str, dominated: &str) -> Result<()> {
        ensure!(
            dominant != dominated,
            "Constraint {dominant} cannot dominate itself"
        );

        let from = self.add_constraint(dominant);
        let to = self.add_constraint(dominated);
        self.graph.update_edge(from, to, ());
        Ok(())
    }

    /// Parse and record a relationship of the form `a >> b`
    pub fn parse_relationship(&mut self, relationship: &str) -> Result<()> {
        let (dominant, dominated) = relationship
            .split_once(DOMINANCE_OPERATOR)
            .with_context(|| {
                format!("Relationship '{relationship}' must be of the form 'a {DOMINANCE_OPERATOR} b'")
            })?;
        let (dominant, dominated) = (dominant.trim(), dominated.trim());
        ensure!(
            !dominant.is_empty() && !dominated.is_empty(),
            "Relationship '{relationship}' is missing a constraint"
        );

        self.add_relationship(dominant, dominated)
    }

    /// The constraints which no other constraint dominates, in insertion order.
    ///
    /// If the relationships are cyclic, there is no well-defined head and the result is empty.
    pub fn head_constraints(&self) -> Vec<&str> {
        if is_cyclic_directed(&self.graph) {
            return Vec::new();
        }

        self.nodes
            .iter()
            .filter(|(_, node)| {
                self.graph
                    .neighbors_directed(**node, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|(identity, _)| identity.as_str())
            .collect()
    }

    /// The weight of a constraint: one plus the number of constraints it directly dominates
    pub fn dominance_weight(&self, identity: &str) -> Result<u32> {
        let node = self
            .nodes
            .get(identity)
            .with_context(|| format!("Unknown constraint {identity}"))?;
        let dominated = self
            .graph
            .neighbors_directed(*node, Direction::Outgoing)
            .count();

        Ok(1 + u32::try_from(dominated)?)
    }

    /// Set the weight of every known soft constraint from the dominance relation
    pub fn apply_weights(&self, constraints: &mut [Constraint]) -> Result<()> {
        for constraint in constraints.iter_mut().filter(|c| c.soft) {
            let identity = constraint.identity();
            if self.nodes.contains_key(&identity) {
                constraint.weight = self.dominance_weight(&identity)?;
            }
        }

        Ok(())
    }
}
