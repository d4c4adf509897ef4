//! Declarative resource graph construction.
//!
//! The evaluator registers resource declarations, derives dependency edges
//! from deferred values embedded in their properties, and produces the
//! topologically ordered deployment plan.

use std::collections::HashMap;
use tracing::debug;

use crate::error::{GraphError, Result, StratusError};
use crate::provider::ResourceKind;

use super::plan::DeploymentPlan;
use super::resource::{ResourceHandle, ResourceId, ResourceNode};
use super::value::{Output, PropertyMap};

/// Builder for a deployment's resource graph.
#[derive(Debug, Default)]
pub struct Evaluator {
    /// Declared resources, in declaration order; ids index into this list.
    nodes: Vec<ResourceNode>,
    /// Name to id lookup.
    by_name: HashMap<String, ResourceId>,
    /// Registered exports, in registration order.
    exports: Vec<(String, Output)>,
}

impl Evaluator {
    /// Creates an empty evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource declaration.
    ///
    /// Properties are scanned for embedded deferred values; each referenced
    /// producer becomes a dependency edge of the new resource.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateName`] if `name` is already declared
    /// in this deployment, regardless of kind.
    pub fn declare(
        &mut self,
        kind: ResourceKind,
        name: impl Into<String>,
        properties: PropertyMap,
    ) -> Result<ResourceHandle> {
        let name = name.into();

        if self.by_name.contains_key(&name) {
            return Err(StratusError::Graph(GraphError::duplicate(
                kind.as_str(),
                name,
            )));
        }

        let id = ResourceId(self.nodes.len());
        let depends_on = Self::derive_edges(&properties);
        debug!(
            "Declared {kind} '{name}' with {} dependency edge(s)",
            depends_on.len()
        );

        let node = ResourceNode::new(id, kind, name.clone(), properties, depends_on);
        let handle = node.handle();
        self.by_name.insert(name, id);
        self.nodes.push(node);

        Ok(handle)
    }

    /// Replaces the declaration of an existing resource.
    ///
    /// Replacement is the only permitted form of change: a resource is
    /// never mutated in place, and once its creation request has been
    /// issued it can no longer be replaced within this deployment.
    /// Dependency edges are re-derived from the new properties. Handles and
    /// deferred values obtained from the original declaration stay valid.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownResource`] if `name` was never
    /// declared, or [`GraphError::ResourceFrozen`] if the resource already
    /// has a provisioning outcome.
    pub fn replace(&mut self, name: &str, properties: PropertyMap) -> Result<ResourceHandle> {
        let Some(&id) = self.by_name.get(name) else {
            return Err(StratusError::Graph(GraphError::UnknownResource {
                name: name.to_string(),
            }));
        };

        let node = &mut self.nodes[id.0];
        if node.cell().get().is_some() {
            return Err(StratusError::Graph(GraphError::ResourceFrozen {
                name: name.to_string(),
            }));
        }

        node.depends_on = Self::derive_edges(&properties);
        node.properties = properties;
        debug!("Replaced declaration of '{name}'");

        Ok(node.handle())
    }

    /// Registers a named top-level export.
    ///
    /// The value is readable from the execution result once the plan has
    /// been executed; registering the same name again overwrites the
    /// previous export.
    pub fn export(&mut self, name: impl Into<String>, output: Output) {
        let name = name.into();
        self.exports.retain(|(existing, _)| *existing != name);
        self.exports.push((name, output));
    }

    /// Returns the handle of a declared resource.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownResource`] if `name` was never declared.
    pub fn handle(&self, name: &str) -> Result<ResourceHandle> {
        self.by_name.get(name).map_or_else(
            || {
                Err(StratusError::Graph(GraphError::UnknownResource {
                    name: name.to_string(),
                }))
            },
            |id| Ok(self.nodes[id.0].handle()),
        )
    }

    /// Number of declared resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no resource has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Orders the declared resources into an executable plan.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::CyclicDependency`] naming the cycle members if
    /// the dependency edges are not acyclic.
    pub fn build_plan(&self) -> Result<DeploymentPlan> {
        DeploymentPlan::build(self.nodes.clone(), self.exports.clone())
    }

    /// Scans a property map for embedded deferred values.
    fn derive_edges(properties: &PropertyMap) -> Vec<ResourceId> {
        let mut ids = Vec::new();
        for property in properties.values() {
            property.collect_dependencies(&mut ids);
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StratusError;
    use crate::graph::value::Property;
    use serde_json::json;

    fn props(entries: &[(&str, Property)]) -> PropertyMap {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn duplicate_name_is_rejected_across_kinds() {
        let mut evaluator = Evaluator::new();
        evaluator
            .declare(ResourceKind::ResourceGroup, "server", PropertyMap::new())
            .expect("first declaration");

        let err = evaluator
            .declare(ResourceKind::VirtualNetwork, "server", PropertyMap::new())
            .expect_err("duplicate must fail");

        assert!(matches!(
            err,
            StratusError::Graph(GraphError::DuplicateName { name, .. }) if name == "server"
        ));
    }

    #[test]
    fn edges_derive_from_embedded_outputs() {
        let mut evaluator = Evaluator::new();
        let rg = evaluator
            .declare(
                ResourceKind::ResourceGroup,
                "server",
                props(&[("location", Property::string("westus"))]),
            )
            .expect("declare rg");

        evaluator
            .declare(
                ResourceKind::VirtualNetwork,
                "server-network",
                props(&[
                    ("resource_group_name", Property::from(rg.output("name"))),
                    ("address_spaces", Property::from(json!(["10.0.0.0/16"]))),
                ]),
            )
            .expect("declare network");

        let plan = evaluator.build_plan().expect("plan");
        assert_eq!(plan.node(ResourceId(1)).depends_on, vec![ResourceId(0)]);
    }

    #[test]
    fn replace_rederives_edges_and_keeps_handles() {
        let mut evaluator = Evaluator::new();
        let rg = evaluator
            .declare(ResourceKind::ResourceGroup, "server", PropertyMap::new())
            .expect("declare rg");
        evaluator
            .declare(
                ResourceKind::PublicIp,
                "server-ip",
                props(&[("resource_group_name", Property::from(rg.output("name")))]),
            )
            .expect("declare ip");

        let replaced = evaluator
            .replace("server-ip", PropertyMap::new())
            .expect("replace");
        assert_eq!(replaced.id, ResourceId(1));

        let plan = evaluator.build_plan().expect("plan");
        assert!(plan.node(ResourceId(1)).depends_on.is_empty());
    }

    #[test]
    fn replace_unknown_resource_fails() {
        let mut evaluator = Evaluator::new();
        let err = evaluator
            .replace("ghost", PropertyMap::new())
            .expect_err("unknown name must fail");

        assert!(matches!(
            err,
            StratusError::Graph(GraphError::UnknownResource { name }) if name == "ghost"
        ));
    }

    #[test]
    fn export_overwrites_same_name() {
        let mut evaluator = Evaluator::new();
        let rg = evaluator
            .declare(ResourceKind::ResourceGroup, "server", PropertyMap::new())
            .expect("declare rg");

        evaluator.export("public_ip", rg.output("id"));
        evaluator.export("public_ip", rg.output("name"));

        let plan = evaluator.build_plan().expect("plan");
        assert_eq!(plan.exports().len(), 1);
        assert_eq!(plan.exports()[0].1.describe(), "server.name");
    }
}
