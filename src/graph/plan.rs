//! Deployment plan construction.
//!
//! A plan is the topologically ordered form of the declared resource
//! graph. It is built once per invocation, handed to the executor, and
//! reusable only for an idempotent retry of the same declarations.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::config::SpecHasher;
use crate::error::{GraphError, Result, StratusError};

use super::resource::{ResourceId, ResourceNode};
use super::value::Output;

/// A topologically ordered set of resources ready for provisioning.
#[derive(Debug)]
pub struct DeploymentPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Fingerprint of the declarations this plan was built from.
    pub fingerprint: String,
    nodes: Vec<ResourceNode>,
    order: Vec<ResourceId>,
    exports: Vec<(String, Output)>,
}

impl DeploymentPlan {
    /// Builds a plan from declared nodes, ordering them topologically.
    ///
    /// The order is deterministic: among resources whose producers are all
    /// satisfied, the earliest declaration goes first.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::CyclicDependency`] naming the cycle members if
    /// the edges are not acyclic.
    pub fn build(nodes: Vec<ResourceNode>, exports: Vec<(String, Output)>) -> Result<Self> {
        let order = Self::topological_order(&nodes)?;

        let hasher = SpecHasher::new();
        let declaration_hashes: Vec<String> = nodes
            .iter()
            .map(|node| {
                let properties: serde_json::Map<String, serde_json::Value> = node
                    .properties
                    .iter()
                    .map(|(key, property)| (key.clone(), property.fingerprint()))
                    .collect();
                hasher.hash_resource(
                    node.kind.as_str(),
                    &node.name,
                    &serde_json::Value::Object(properties),
                )
            })
            .collect();
        let fingerprint = hasher.combine(&declaration_hashes);

        Ok(Self {
            created_at: Utc::now(),
            fingerprint,
            nodes,
            order,
            exports,
        })
    }

    /// Kahn's algorithm with declaration-order tie-breaking.
    fn topological_order(nodes: &[ResourceNode]) -> Result<Vec<ResourceId>> {
        let mut in_degree: Vec<usize> = nodes.iter().map(|node| node.depends_on.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for node in nodes {
            for dep in &node.depends_on {
                dependents[dep.0].push(node.id.0);
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut order = Vec::with_capacity(nodes.len());
        while let Some(idx) = ready.pop_first() {
            order.push(ResourceId(idx));
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() == nodes.len() {
            Ok(order)
        } else {
            let cycle = Self::find_cycle(nodes);
            Err(StratusError::Graph(GraphError::cycle(&cycle)))
        }
    }

    /// Names the members of one dependency cycle, for diagnostics.
    ///
    /// Depth-first traversal with a recursion-stack marker; the first back
    /// edge found closes the reported cycle.
    fn find_cycle(nodes: &[ResourceNode]) -> Vec<String> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        fn visit(
            idx: usize,
            nodes: &[ResourceNode],
            marks: &mut [Mark],
            stack: &mut Vec<usize>,
        ) -> Option<Vec<usize>> {
            marks[idx] = Mark::OnStack;
            stack.push(idx);

            for dep in &nodes[idx].depends_on {
                match marks[dep.0] {
                    Mark::OnStack => {
                        let start = stack.iter().position(|&entry| entry == dep.0).unwrap_or(0);
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(dep.0);
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        if let Some(cycle) = visit(dep.0, nodes, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Done => {}
                }
            }

            stack.pop();
            marks[idx] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::Unvisited; nodes.len()];
        let mut stack = Vec::new();
        for idx in 0..nodes.len() {
            if marks[idx] == Mark::Unvisited
                && let Some(cycle) = visit(idx, nodes, &mut marks, &mut stack)
            {
                return cycle.iter().map(|&entry| nodes[entry].name.clone()).collect();
            }
        }

        Vec::new()
    }

    /// The execution order.
    #[must_use]
    pub fn order(&self) -> &[ResourceId] {
        &self.order
    }

    /// All nodes, in declaration order.
    #[must_use]
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: ResourceId) -> &ResourceNode {
        &self.nodes[id.0]
    }

    /// Registered exports, in registration order.
    #[must_use]
    pub fn exports(&self) -> &[(String, Output)] {
        &self.exports
    }

    /// Direct dependents of a resource.
    #[must_use]
    pub fn dependents(&self, id: ResourceId) -> Vec<ResourceId> {
        self.nodes
            .iter()
            .filter(|node| node.depends_on.contains(&id))
            .map(|node| node.id)
            .collect()
    }

    /// Number of resources in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the plan contains no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.nodes.is_empty() {
            return write!(f, "Empty plan");
        }

        writeln!(f, "Deployment plan ({} resources):", self.nodes.len())?;
        for (position, id) in self.order.iter().enumerate() {
            let node = self.node(*id);
            if node.depends_on.is_empty() {
                writeln!(f, "  {}. {} '{}'", position + 1, node.kind, node.name)?;
            } else {
                let deps: Vec<&str> = node
                    .depends_on
                    .iter()
                    .map(|dep| self.node(*dep).name.as_str())
                    .collect();
                writeln!(
                    f,
                    "  {}. {} '{}' (after {})",
                    position + 1,
                    node.kind,
                    node.name,
                    deps.join(", ")
                )?;
            }
        }
        Ok(())
    }
}
