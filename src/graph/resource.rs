//! Resource nodes and their post-creation outcome cells.
//!
//! A declared resource is a node in the dependency graph. Its outputs are
//! unknown until the provisioning operation completes; the [`OutcomeCell`]
//! is the one-shot, first-writer-wins slot through which the executor
//! publishes the outcome to every downstream consumer.

use std::sync::Arc;
use tokio::sync::watch;

use crate::provider::{OutputMap, ResourceKind};

use super::value::{Output, PropertyMap};

/// Identifier of a resource within one deployment, assigned in declaration
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub usize);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal outcome of a resource's provisioning operation.
#[derive(Debug, Clone)]
pub enum ResourceOutcome {
    /// The operation completed and produced these output properties.
    Succeeded(OutputMap),
    /// The operation was attempted and failed with the given message.
    Failed(String),
    /// The operation was never attempted because a producer failed or the
    /// run was cancelled.
    Skipped,
}

impl ResourceOutcome {
    /// Returns true if this outcome carries output properties.
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// One-shot slot holding a resource's outcome.
///
/// Exactly one writer commits; later writes are ignored. Waiters suspend
/// until the slot is filled, which is the only synchronization a dependent
/// resource needs with its producers.
#[derive(Debug)]
pub struct OutcomeCell {
    tx: watch::Sender<Option<ResourceOutcome>>,
}

impl OutcomeCell {
    /// Creates an empty cell.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Commits an outcome. Returns true if this call was the committing
    /// writer, false if the cell was already filled.
    pub fn set(&self, outcome: ResourceOutcome) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    /// Returns the outcome if the cell has been filled.
    #[must_use]
    pub fn get(&self) -> Option<ResourceOutcome> {
        self.tx.borrow().clone()
    }

    /// Suspends until the cell is filled, then returns the outcome.
    pub async fn wait(&self) -> ResourceOutcome {
        let mut rx = self.tx.subscribe();
        let filled = rx.wait_for(Option::is_some).await;
        match filled {
            Ok(slot) => match slot.as_ref() {
                Some(outcome) => outcome.clone(),
                None => ResourceOutcome::Failed(String::from("outcome channel yielded empty slot")),
            },
            // The sender lives in this cell, so closure means the cell was
            // dropped mid-wait; surface it as a failure rather than hanging.
            Err(_) => ResourceOutcome::Failed(String::from("outcome channel closed")),
        }
    }
}

impl Default for OutcomeCell {
    fn default() -> Self {
        Self::new()
    }
}

/// A declared resource: kind, unique name, property bindings, derived
/// dependency edges, and the outcome cell its outputs flow through.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    /// Identifier within the deployment.
    pub id: ResourceId,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Unique name within the deployment.
    pub name: String,
    /// Declared property bindings (literal or deferred).
    pub properties: PropertyMap,
    /// Direct producers this resource depends on, sorted and deduplicated.
    pub depends_on: Vec<ResourceId>,
    /// Outcome slot shared with every handle and deferred value.
    cell: Arc<OutcomeCell>,
}

impl ResourceNode {
    /// Creates a new node with a fresh outcome cell.
    #[must_use]
    pub fn new(
        id: ResourceId,
        kind: ResourceKind,
        name: String,
        properties: PropertyMap,
        depends_on: Vec<ResourceId>,
    ) -> Self {
        Self {
            id,
            kind,
            name,
            properties,
            depends_on,
            cell: Arc::new(OutcomeCell::new()),
        }
    }

    /// Returns the shared outcome cell.
    #[must_use]
    pub fn cell(&self) -> Arc<OutcomeCell> {
        Arc::clone(&self.cell)
    }

    /// Returns a handle for projecting this resource's outputs.
    #[must_use]
    pub fn handle(&self) -> ResourceHandle {
        ResourceHandle {
            id: self.id,
            kind: self.kind,
            name: self.name.clone(),
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Caller-facing handle to a declared resource.
///
/// The handle is the `project` entry point: [`ResourceHandle::output`]
/// wraps a single not-yet-available output field as a deferred value.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    /// Identifier within the deployment.
    pub id: ResourceId,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource name.
    pub name: String,
    cell: Arc<OutcomeCell>,
}

impl ResourceHandle {
    /// Projects one output field of this resource as a deferred value.
    #[must_use]
    pub fn output(&self, field: &str) -> Output {
        Output::field(self.id, &self.name, Arc::clone(&self.cell), field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_first_writer_wins() {
        let cell = OutcomeCell::new();
        assert!(cell.set(ResourceOutcome::Succeeded(OutputMap::new())));
        assert!(!cell.set(ResourceOutcome::Failed(String::from("late"))));

        match cell.get() {
            Some(ResourceOutcome::Succeeded(_)) => {}
            other => panic!("expected first outcome to stand, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cell_wait_observes_prior_set() {
        let cell = OutcomeCell::new();
        cell.set(ResourceOutcome::Skipped);
        assert!(matches!(cell.wait().await, ResourceOutcome::Skipped));
    }

    #[tokio::test]
    async fn cell_wait_wakes_on_set() {
        let cell = Arc::new(OutcomeCell::new());
        let waiter = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.wait().await })
        };

        tokio::task::yield_now().await;
        cell.set(ResourceOutcome::Failed(String::from("boom")));

        let outcome = waiter.await.expect("waiter panicked");
        assert!(matches!(outcome, ResourceOutcome::Failed(msg) if msg == "boom"));
    }
}
