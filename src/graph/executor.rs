//! Concurrent plan execution with partial-failure semantics.
//!
//! Resources are spawned as independent tasks that synchronize only
//! through their producers' outcome cells: a resource's operation never
//! begins before every resource it depends on has completed, while
//! independent branches proceed in parallel up to the concurrency limit.
//! A failed resource marks all transitive dependents skipped without an
//! attempt; the remaining branches keep provisioning.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{GraphError, Result, StratusError};
use crate::provider::{Provision, ResourceKind, fields};

use super::plan::DeploymentPlan;
use super::resource::{OutcomeCell, ResourceOutcome};
use super::value::{Resolution, resolve_properties};

/// Default bound on concurrent provider operations.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Executor for deployment plans.
pub struct Executor {
    provisioner: Arc<dyn Provision>,
    concurrency: usize,
    cancelled: Arc<AtomicBool>,
}

/// Handle for aborting a running execution.
///
/// Cancellation is cooperative: in-flight operations finish per the
/// provider client's own contract, and no new operation is started.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Terminal status of one resource within an execution.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// The operation completed successfully in this run.
    Succeeded,
    /// The operation was attempted and failed.
    Failed,
    /// The operation was never attempted.
    Skipped,
    /// A prior run already provisioned this resource; nothing was issued.
    Unchanged,
}

/// Per-resource record of an execution.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    /// Resource name.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Terminal status.
    pub status: ResourceStatus,
    /// Provider-assigned identity, when the operation produced one.
    pub remote_id: Option<String>,
    /// Provider error message, for failures.
    pub error: Option<String>,
    /// Wall-clock duration of the operation in milliseconds.
    pub duration_ms: Option<u64>,
}

/// An export whose deferred value did not resolve.
#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedExport {
    /// Export name.
    pub name: String,
    /// Why the value is unavailable.
    pub reason: String,
}

/// Result of executing an entire plan.
#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    /// Identifier of this run.
    pub run_id: uuid::Uuid,
    /// When execution started.
    pub started_at: DateTime<Utc>,
    /// Per-resource records, in declaration order.
    pub reports: Vec<ResourceReport>,
    /// Resolved top-level exports.
    pub exports: std::collections::BTreeMap<String, serde_json::Value>,
    /// Exports that could not be resolved.
    pub unresolved_exports: Vec<UnresolvedExport>,
    /// Number of resources provisioned in this run.
    pub succeeded: usize,
    /// Number of failed resources.
    pub failed: usize,
    /// Number of skipped resources.
    pub skipped: usize,
    /// Number of resources untouched because a prior run provisioned them.
    pub unchanged: usize,
    /// True when every resource is succeeded or unchanged.
    pub success: bool,
}

impl Executor {
    /// Creates an executor over the given provisioning boundary.
    #[must_use]
    pub fn new(provisioner: Arc<dyn Provision>) -> Self {
        Self {
            provisioner,
            concurrency: DEFAULT_CONCURRENCY,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the bound on concurrent provider operations.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Returns a handle that aborts this executor's runs.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    /// Executes a plan: provisions every resource in dependency order.
    ///
    /// Re-executing a plan whose resources already succeeded issues no new
    /// operations; their reports come back as [`ResourceStatus::Unchanged`].
    ///
    /// # Errors
    ///
    /// Returns an error only for internal faults (task panics); provider
    /// failures are recorded per resource in the result.
    pub async fn execute(&self, plan: &DeploymentPlan) -> Result<ExecutionResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4();
        info!(
            "Executing plan {} ({} resources, concurrency {})",
            &plan.fingerprint[..8.min(plan.fingerprint.len())],
            plan.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(usize, ResourceReport)> = JoinSet::new();

        for id in plan.order() {
            let node = plan.node(*id);
            let producers: Vec<Arc<OutcomeCell>> = node
                .depends_on
                .iter()
                .map(|dep| plan.node(*dep).cell())
                .collect();

            let kind = node.kind;
            let name = node.name.clone();
            let properties = node.properties.clone();
            let cell = node.cell();
            let provisioner = Arc::clone(&self.provisioner);
            let semaphore = Arc::clone(&semaphore);
            let cancelled = Arc::clone(&self.cancelled);
            let index = id.0;

            tasks.spawn(async move {
                let report = provision_one(
                    kind,
                    name,
                    properties,
                    cell,
                    producers,
                    provisioner,
                    semaphore,
                    cancelled,
                )
                .await;
                (index, report)
            });
        }

        let reports = Self::collect(tasks, plan.len()).await?;
        let (exports, unresolved_exports) = Self::resolve_exports(plan).await;

        let result = ExecutionResult::assemble(
            run_id,
            started_at,
            reports,
            exports,
            unresolved_exports,
        );
        info!("{result}");
        Ok(result)
    }

    /// Destroys a plan's resources in reverse dependency order.
    ///
    /// A resource is deleted only after every resource depending on it has
    /// been deleted; a failed deletion skips all its producers.
    ///
    /// # Errors
    ///
    /// Returns an error only for internal faults; provider failures are
    /// recorded per resource in the result.
    pub async fn destroy(&self, plan: &DeploymentPlan) -> Result<ExecutionResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4();
        info!("Destroying {} resources", plan.len());

        // Fresh cells: destruction tracks its own completion, independent
        // of any prior apply run.
        let cells: Vec<Arc<OutcomeCell>> = (0..plan.len())
            .map(|_| Arc::new(OutcomeCell::new()))
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(usize, ResourceReport)> = JoinSet::new();

        for id in plan.order().iter().rev() {
            let node = plan.node(*id);
            // Reverse edges: wait for dependents, not producers.
            let blockers: Vec<Arc<OutcomeCell>> = plan
                .dependents(*id)
                .iter()
                .map(|dependent| Arc::clone(&cells[dependent.0]))
                .collect();

            let kind = node.kind;
            let name = node.name.clone();
            let cell = Arc::clone(&cells[id.0]);
            let provisioner = Arc::clone(&self.provisioner);
            let semaphore = Arc::clone(&semaphore);
            let cancelled = Arc::clone(&self.cancelled);
            let index = id.0;

            tasks.spawn(async move {
                let report =
                    destroy_one(kind, name, cell, blockers, provisioner, semaphore, cancelled)
                        .await;
                (index, report)
            });
        }

        let reports = Self::collect(tasks, plan.len()).await?;
        let result = ExecutionResult::assemble(
            run_id,
            started_at,
            reports,
            std::collections::BTreeMap::new(),
            Vec::new(),
        );
        info!("{result}");
        Ok(result)
    }

    /// Joins all tasks and orders their reports by declaration index.
    async fn collect(
        mut tasks: JoinSet<(usize, ResourceReport)>,
        count: usize,
    ) -> Result<Vec<ResourceReport>> {
        let mut indexed: Vec<Option<ResourceReport>> = (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, report) =
                joined.map_err(|e| StratusError::internal(format!("resource task failed: {e}")))?;
            indexed[index] = Some(report);
        }

        Ok(indexed
            .into_iter()
            .flatten()
            .collect())
    }

    /// Resolves registered exports once every resource has an outcome.
    async fn resolve_exports(
        plan: &DeploymentPlan,
    ) -> (
        std::collections::BTreeMap<String, serde_json::Value>,
        Vec<UnresolvedExport>,
    ) {
        let mut exports = std::collections::BTreeMap::new();
        let mut unresolved = Vec::new();

        for (name, output) in plan.exports() {
            match output.resolve().await {
                Resolution::Resolved(value) => {
                    exports.insert(name.clone(), value);
                }
                Resolution::Failed(reason) => unresolved.push(UnresolvedExport {
                    name: name.clone(),
                    reason,
                }),
                Resolution::Skipped => unresolved.push(UnresolvedExport {
                    name: name.clone(),
                    reason: String::from("producing resource was skipped"),
                }),
            }
        }

        (exports, unresolved)
    }
}

/// Provisions a single resource once its producers have completed.
#[allow(clippy::too_many_arguments)]
async fn provision_one(
    kind: ResourceKind,
    name: String,
    properties: super::value::PropertyMap,
    cell: Arc<OutcomeCell>,
    producers: Vec<Arc<OutcomeCell>>,
    provisioner: Arc<dyn Provision>,
    semaphore: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
) -> ResourceReport {
    // Idempotent retry of the same plan: a prior outcome stands.
    if let Some(outcome) = cell.get() {
        return report_prior_outcome(kind, &name, &outcome);
    }

    // Block only on direct producers; independent branches keep going.
    for producer in &producers {
        match producer.wait().await {
            ResourceOutcome::Succeeded(_) => {}
            ResourceOutcome::Failed(_) | ResourceOutcome::Skipped => {
                warn!("Skipping '{name}': a dependency did not complete");
                cell.set(ResourceOutcome::Skipped);
                return ResourceReport {
                    name,
                    kind,
                    status: ResourceStatus::Skipped,
                    remote_id: None,
                    error: Some(String::from("dependency failed or was skipped")),
                    duration_ms: None,
                };
            }
        }
    }

    let Ok(_permit) = semaphore.acquire_owned().await else {
        cell.set(ResourceOutcome::Skipped);
        return skipped_report(kind, name, "executor shut down");
    };

    if cancelled.load(Ordering::SeqCst) {
        debug!("Not starting '{name}': execution cancelled");
        cell.set(ResourceOutcome::Skipped);
        return skipped_report(kind, name, "execution cancelled");
    }

    // Producers are done, so this only extracts already-available values
    // and runs the pure projections.
    let resolved = match resolve_properties(&properties).await {
        Resolution::Resolved(value) => value,
        Resolution::Failed(message) => {
            error!("Failed to resolve properties of '{name}': {message}");
            cell.set(ResourceOutcome::Failed(message.clone()));
            return ResourceReport {
                name,
                kind,
                status: ResourceStatus::Failed,
                remote_id: None,
                error: Some(message),
                duration_ms: None,
            };
        }
        Resolution::Skipped => {
            cell.set(ResourceOutcome::Skipped);
            return skipped_report(kind, name, "dependency failed or was skipped");
        }
    };

    let started = Instant::now();
    match provisioner.create(kind, &name, &resolved).await {
        Ok(outputs) => {
            let remote_id = outputs
                .get(fields::ID)
                .and_then(|value| value.as_str())
                .map(String::from);
            info!("Provisioned {kind} '{name}'");
            cell.set(ResourceOutcome::Succeeded(outputs));
            ResourceReport {
                name,
                kind,
                status: ResourceStatus::Succeeded,
                remote_id,
                error: None,
                duration_ms: Some(elapsed_ms(started)),
            }
        }
        Err(e) => {
            let message = e.to_string();
            error!("Failed to provision {kind} '{name}': {message}");
            cell.set(ResourceOutcome::Failed(message.clone()));
            ResourceReport {
                name,
                kind,
                status: ResourceStatus::Failed,
                remote_id: None,
                error: Some(message),
                duration_ms: Some(elapsed_ms(started)),
            }
        }
    }
}

/// Deletes a single resource once its dependents have been deleted.
async fn destroy_one(
    kind: ResourceKind,
    name: String,
    cell: Arc<OutcomeCell>,
    blockers: Vec<Arc<OutcomeCell>>,
    provisioner: Arc<dyn Provision>,
    semaphore: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
) -> ResourceReport {
    for blocker in &blockers {
        match blocker.wait().await {
            ResourceOutcome::Succeeded(_) => {}
            ResourceOutcome::Failed(_) | ResourceOutcome::Skipped => {
                warn!("Not deleting '{name}': a dependent resource was not deleted");
                cell.set(ResourceOutcome::Skipped);
                return skipped_report(kind, name, "dependent resource was not deleted");
            }
        }
    }

    let Ok(_permit) = semaphore.acquire_owned().await else {
        cell.set(ResourceOutcome::Skipped);
        return skipped_report(kind, name, "executor shut down");
    };

    if cancelled.load(Ordering::SeqCst) {
        cell.set(ResourceOutcome::Skipped);
        return skipped_report(kind, name, "execution cancelled");
    }

    let started = Instant::now();
    match provisioner.delete(kind, &name).await {
        Ok(()) => {
            info!("Deleted {kind} '{name}'");
            cell.set(ResourceOutcome::Succeeded(crate::provider::OutputMap::new()));
            ResourceReport {
                name,
                kind,
                status: ResourceStatus::Succeeded,
                remote_id: None,
                error: None,
                duration_ms: Some(elapsed_ms(started)),
            }
        }
        Err(e) => {
            let message = e.to_string();
            error!("Failed to delete {kind} '{name}': {message}");
            cell.set(ResourceOutcome::Failed(message.clone()));
            ResourceReport {
                name,
                kind,
                status: ResourceStatus::Failed,
                remote_id: None,
                error: Some(message),
                duration_ms: Some(elapsed_ms(started)),
            }
        }
    }
}

fn report_prior_outcome(kind: ResourceKind, name: &str, outcome: &ResourceOutcome) -> ResourceReport {
    match outcome {
        ResourceOutcome::Succeeded(outputs) => {
            debug!("'{name}' already provisioned, nothing to do");
            ResourceReport {
                name: name.to_string(),
                kind,
                status: ResourceStatus::Unchanged,
                remote_id: outputs
                    .get(fields::ID)
                    .and_then(|value| value.as_str())
                    .map(String::from),
                error: None,
                duration_ms: None,
            }
        }
        ResourceOutcome::Failed(message) => ResourceReport {
            name: name.to_string(),
            kind,
            status: ResourceStatus::Failed,
            remote_id: None,
            error: Some(message.clone()),
            duration_ms: None,
        },
        ResourceOutcome::Skipped => ResourceReport {
            name: name.to_string(),
            kind,
            status: ResourceStatus::Skipped,
            remote_id: None,
            error: Some(String::from("skipped in a prior run")),
            duration_ms: None,
        },
    }
}

fn skipped_report(kind: ResourceKind, name: String, reason: &str) -> ResourceReport {
    ResourceReport {
        name,
        kind,
        status: ResourceStatus::Skipped,
        remote_id: None,
        error: Some(reason.to_string()),
        duration_ms: None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

impl ExecutionResult {
    fn assemble(
        run_id: uuid::Uuid,
        started_at: DateTime<Utc>,
        reports: Vec<ResourceReport>,
        exports: std::collections::BTreeMap<String, serde_json::Value>,
        unresolved_exports: Vec<UnresolvedExport>,
    ) -> Self {
        let count = |status: ResourceStatus| {
            reports
                .iter()
                .filter(|report| report.status == status)
                .count()
        };
        let succeeded = count(ResourceStatus::Succeeded);
        let failed = count(ResourceStatus::Failed);
        let skipped = count(ResourceStatus::Skipped);
        let unchanged = count(ResourceStatus::Unchanged);

        Self {
            run_id,
            started_at,
            reports,
            exports,
            unresolved_exports,
            succeeded,
            failed,
            skipped,
            unchanged,
            success: failed == 0 && skipped == 0,
        }
    }

    /// Reads a resolved export by name.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnresolvedExport`] if the export was not
    /// registered or its value never resolved.
    pub fn export(&self, name: &str) -> Result<&serde_json::Value> {
        self.exports.get(name).ok_or_else(|| {
            StratusError::Graph(GraphError::UnresolvedExport {
                name: name.to_string(),
            })
        })
    }

    /// True when every resource succeeded in this run or a prior one.
    #[must_use]
    pub const fn all_successful(&self) -> bool {
        self.success
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Executed {} resources: {} succeeded, {} failed, {} skipped, {} unchanged",
            self.reports.len(),
            self.succeeded,
            self.failed,
            self.skipped,
            self.unchanged
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::graph::Evaluator;
    use crate::graph::value::{Property, PropertyMap};
    use crate::provider::OutputMap;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Test double recording calls and echoing resolved properties back as
    /// outputs, the way the real provisioner surfaces inputs to consumers.
    struct FakeProvision {
        calls: Mutex<Vec<String>>,
        fail: HashSet<String>,
        delay: Option<Duration>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl FakeProvision {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: HashSet::new(),
                delay: None,
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            }
        }

        fn failing_on(name: &str) -> Self {
            let mut fake = Self::new();
            fake.fail.insert(name.to_string());
            fake
        }

        fn with_delay(delay: Duration) -> Self {
            let mut fake = Self::new();
            fake.delay = Some(delay);
            fake
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn max_concurrency(&self) -> usize {
            self.max_active.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provision for FakeProvision {
        async fn create(
            &self,
            kind: ResourceKind,
            name: &str,
            properties: &serde_json::Value,
        ) -> Result<OutputMap> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(format!("create:{name}"));

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail.contains(name) {
                return Err(StratusError::Provider(ProviderError::api_error(
                    500,
                    format!("instructed failure for {name}"),
                )));
            }

            let mut outputs = OutputMap::new();
            if let Some(object) = properties.as_object() {
                for (key, value) in object {
                    outputs.insert(key.clone(), value.clone());
                }
            }
            outputs.insert(String::from(fields::ID), json!(format!("{kind}/{name}")));
            outputs.insert(String::from(fields::NAME), json!(name));
            Ok(outputs)
        }

        async fn delete(&self, _kind: ResourceKind, name: &str) -> Result<()> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(format!("delete:{name}"));
            if self.fail.contains(name) {
                return Err(StratusError::Provider(ProviderError::api_error(
                    500,
                    format!("instructed failure for {name}"),
                )));
            }
            Ok(())
        }
    }

    fn chain_evaluator() -> Evaluator {
        let mut evaluator = Evaluator::new();
        let rg = evaluator
            .declare(
                ResourceKind::ResourceGroup,
                "server",
                [(String::from("location"), Property::string("westus"))]
                    .into_iter()
                    .collect(),
            )
            .expect("rg");
        let net = evaluator
            .declare(
                ResourceKind::VirtualNetwork,
                "server-network",
                [(
                    String::from("resource_group_name"),
                    Property::from(rg.output("name")),
                )]
                .into_iter()
                .collect(),
            )
            .expect("net");
        evaluator
            .declare(
                ResourceKind::Subnet,
                "server-subnet",
                [(
                    String::from("virtual_network_name"),
                    Property::from(net.output("name")),
                )]
                .into_iter()
                .collect(),
            )
            .expect("subnet");
        evaluator
    }

    #[tokio::test]
    async fn chain_executes_in_order_and_propagates_outputs() {
        let evaluator = chain_evaluator();
        let plan = evaluator.build_plan().expect("plan");

        let fake = Arc::new(FakeProvision::new());
        let executor = Executor::new(Arc::clone(&fake) as Arc<dyn Provision>);
        let result = executor.execute(&plan).await.expect("execute");

        assert!(result.success);
        assert_eq!(result.succeeded, 3);
        assert_eq!(
            fake.calls(),
            vec!["create:server", "create:server-network", "create:server-subnet"]
        );
    }

    #[tokio::test]
    async fn failure_skips_transitive_dependents_and_continues_independents() {
        let mut evaluator = chain_evaluator();
        // Independent branch.
        evaluator
            .declare(ResourceKind::PublicIp, "server-ip", PropertyMap::new())
            .expect("ip");
        let plan = evaluator.build_plan().expect("plan");

        let fake = Arc::new(FakeProvision::failing_on("server-network"));
        let executor = Executor::new(Arc::clone(&fake) as Arc<dyn Provision>);
        let result = executor.execute(&plan).await.expect("execute");

        assert!(!result.success);
        let status_of = |name: &str| {
            result
                .reports
                .iter()
                .find(|report| report.name == name)
                .map(|report| report.status)
                .expect("report present")
        };
        assert_eq!(status_of("server"), ResourceStatus::Succeeded);
        assert_eq!(status_of("server-network"), ResourceStatus::Failed);
        assert_eq!(status_of("server-subnet"), ResourceStatus::Skipped);
        assert_eq!(status_of("server-ip"), ResourceStatus::Succeeded);

        // The skipped resource was never issued to the provider.
        assert!(!fake.calls().contains(&String::from("create:server-subnet")));
    }

    #[tokio::test]
    async fn reexecuting_a_succeeded_plan_issues_no_operations() {
        let evaluator = chain_evaluator();
        let plan = evaluator.build_plan().expect("plan");

        let fake = Arc::new(FakeProvision::new());
        let executor = Executor::new(Arc::clone(&fake) as Arc<dyn Provision>);

        let first = executor.execute(&plan).await.expect("first run");
        assert_eq!(first.succeeded, 3);
        let calls_after_first = fake.calls().len();

        let second = executor.execute(&plan).await.expect("second run");
        assert!(second.success);
        assert_eq!(second.unchanged, 3);
        assert_eq!(second.succeeded, 0);
        assert_eq!(fake.calls().len(), calls_after_first);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_limit() {
        let mut evaluator = Evaluator::new();
        for index in 0..8 {
            evaluator
                .declare(
                    ResourceKind::PublicIp,
                    format!("ip-{index}"),
                    PropertyMap::new(),
                )
                .expect("declare");
        }
        let plan = evaluator.build_plan().expect("plan");

        let fake = Arc::new(FakeProvision::with_delay(Duration::from_millis(20)));
        let executor = Executor::new(Arc::clone(&fake) as Arc<dyn Provision>).with_concurrency(2);
        let result = executor.execute(&plan).await.expect("execute");

        assert!(result.success);
        assert!(fake.max_concurrency() <= 2, "limit was exceeded");
    }

    #[tokio::test]
    async fn cancelled_execution_starts_nothing() {
        let evaluator = chain_evaluator();
        let plan = evaluator.build_plan().expect("plan");

        let fake = Arc::new(FakeProvision::new());
        let executor = Executor::new(Arc::clone(&fake) as Arc<dyn Provision>);
        executor.cancel_handle().cancel();

        let result = executor.execute(&plan).await.expect("execute");
        assert_eq!(result.skipped, 3);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn exports_resolve_after_execution() {
        let mut evaluator = chain_evaluator();
        let subnet = evaluator.handle("server-subnet").expect("handle");
        evaluator.export("subnet_id", subnet.output("id"));
        let plan = evaluator.build_plan().expect("plan");

        let executor = Executor::new(Arc::new(FakeProvision::new()));
        let result = executor.execute(&plan).await.expect("execute");

        assert_eq!(result.export("subnet_id").expect("export"), &json!("subnet/server-subnet"));
    }

    #[tokio::test]
    async fn export_of_failed_branch_is_unresolved() {
        let mut evaluator = chain_evaluator();
        let subnet = evaluator.handle("server-subnet").expect("handle");
        evaluator.export("subnet_id", subnet.output("id"));
        let plan = evaluator.build_plan().expect("plan");

        let executor = Executor::new(Arc::new(FakeProvision::failing_on("server-network")));
        let result = executor.execute(&plan).await.expect("execute");

        assert!(result.exports.is_empty());
        assert_eq!(result.unresolved_exports.len(), 1);
        assert!(result.export("subnet_id").is_err());
    }

    #[tokio::test]
    async fn destroy_deletes_dependents_before_producers() {
        let evaluator = chain_evaluator();
        let plan = evaluator.build_plan().expect("plan");

        let fake = Arc::new(FakeProvision::new());
        let executor = Executor::new(Arc::clone(&fake) as Arc<dyn Provision>).with_concurrency(1);
        let result = executor.destroy(&plan).await.expect("destroy");

        assert!(result.success);
        assert_eq!(
            fake.calls(),
            vec!["delete:server-subnet", "delete:server-network", "delete:server"]
        );
    }

    #[tokio::test]
    async fn failed_deletion_skips_producers() {
        let evaluator = chain_evaluator();
        let plan = evaluator.build_plan().expect("plan");

        let fake = Arc::new(FakeProvision::failing_on("server-subnet"));
        let executor = Executor::new(Arc::clone(&fake) as Arc<dyn Provision>);
        let result = executor.destroy(&plan).await.expect("destroy");

        assert!(!result.success);
        assert_eq!(result.failed, 1);
        assert_eq!(result.skipped, 2);
        assert!(!fake.calls().contains(&String::from("delete:server")));
    }
}
