//! Deferred values and property bindings.
//!
//! An [`Output`] stands in for a resource output that only exists after the
//! producing resource's remote operation completes. Outputs compose:
//! [`Output::map`] applies a pure transformation lazily, and [`Output::all`]
//! combines several outputs into one that resolves only once every input
//! has. Resolution is one-shot and memoized - once an output has resolved
//! (or failed), every later read returns the cached outcome instead of
//! re-running the projection or touching the producer again.
//!
//! A [`Property`] is the value bound to a declared resource property:
//! either a literal JSON value, a deferred output, or a list/object nesting
//! either of those arbitrarily deep.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

use serde_json::{Value, json};

use super::resource::{OutcomeCell, ResourceId, ResourceOutcome};

/// Pure transformation applied to a resolved value.
type Transform = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Outcome of resolving a deferred value or property tree.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The value is available.
    Resolved(Value),
    /// Resolution failed with the given message.
    Failed(String),
    /// The producing resource was never provisioned.
    Skipped,
}

impl Resolution {
    /// Returns the resolved value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Failed(_) | Self::Skipped => None,
        }
    }
}

/// Reference to the producing resource of a source output.
#[derive(Clone)]
struct SourceRef {
    id: ResourceId,
    name: String,
    cell: Arc<OutcomeCell>,
}

/// The shape of one output node.
enum OutputNode {
    /// A single output field of a declared resource.
    Field { source: SourceRef, field: String },
    /// A pure transformation of another output.
    Map { input: Output, transform: Transform },
    /// The combination of several outputs into an array.
    All { inputs: Vec<Output> },
}

struct OutputInner {
    node: OutputNode,
    /// One-shot memo; the lock is held across the computation so the
    /// projection runs at most once even with concurrent readers.
    memo: Mutex<Option<Resolution>>,
}

/// A deferred value: a placeholder for a resource output that becomes
/// available only after the producing resource has been provisioned.
#[derive(Clone)]
pub struct Output {
    inner: Arc<OutputInner>,
}

impl Output {
    fn from_node(node: OutputNode) -> Self {
        Self {
            inner: Arc::new(OutputInner {
                node,
                memo: Mutex::new(None),
            }),
        }
    }

    /// Creates a source output for one field of a resource's outputs.
    #[must_use]
    pub fn field(id: ResourceId, name: &str, cell: Arc<OutcomeCell>, field: &str) -> Self {
        Self::from_node(OutputNode::Field {
            source: SourceRef {
                id,
                name: name.to_string(),
                cell,
            },
            field: field.to_string(),
        })
    }

    /// Applies a pure transformation once this output resolves.
    ///
    /// The transformation is lazy: mapping a deferred value yields another
    /// deferred value, never an eager evaluation.
    #[must_use]
    pub fn map<F>(&self, transform: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::from_node(OutputNode::Map {
            input: self.clone(),
            transform: Arc::new(transform),
        })
    }

    /// Combines several outputs into one resolving to the array of all
    /// input values, in input order.
    ///
    /// The combined output resolves only once every input has resolved;
    /// failure (or skip) of any input propagates.
    #[must_use]
    pub fn all(inputs: Vec<Self>) -> Self {
        Self::from_node(OutputNode::All { inputs })
    }

    /// Resolves this output, suspending until every producing resource has
    /// a terminal outcome. The result is memoized.
    pub fn resolve(&self) -> Pin<Box<dyn Future<Output = Resolution> + Send + '_>> {
        Box::pin(async move {
            let mut memo = self.inner.memo.lock().await;
            if let Some(cached) = memo.as_ref() {
                return cached.clone();
            }

            let resolution = match &self.inner.node {
                OutputNode::Field { source, field } => match source.cell.wait().await {
                    ResourceOutcome::Succeeded(outputs) => outputs.get(field).map_or_else(
                        || {
                            Resolution::Failed(format!(
                                "resource '{}' has no output field '{field}'",
                                source.name
                            ))
                        },
                        |value| Resolution::Resolved(value.clone()),
                    ),
                    ResourceOutcome::Failed(message) => Resolution::Failed(message),
                    ResourceOutcome::Skipped => Resolution::Skipped,
                },
                OutputNode::Map { input, transform } => match input.resolve().await {
                    Resolution::Resolved(value) => match transform(value) {
                        Ok(mapped) => Resolution::Resolved(mapped),
                        Err(message) => Resolution::Failed(message),
                    },
                    other => other,
                },
                OutputNode::All { inputs } => {
                    let mut values = Vec::with_capacity(inputs.len());
                    let mut failure = None;
                    for input in inputs {
                        match input.resolve().await {
                            Resolution::Resolved(value) => values.push(value),
                            other => {
                                failure = Some(other);
                                break;
                            }
                        }
                    }
                    failure.unwrap_or(Resolution::Resolved(Value::Array(values)))
                }
            };

            *memo = Some(resolution.clone());
            resolution
        })
    }

    /// Collects the identifiers of every resource this output reads from.
    #[must_use]
    pub fn dependencies(&self) -> Vec<ResourceId> {
        let mut ids = Vec::new();
        self.collect_dependencies(&mut ids);
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn collect_dependencies(&self, ids: &mut Vec<ResourceId>) {
        match &self.inner.node {
            OutputNode::Field { source, .. } => ids.push(source.id),
            OutputNode::Map { input, .. } => input.collect_dependencies(ids),
            OutputNode::All { inputs } => {
                for input in inputs {
                    input.collect_dependencies(ids);
                }
            }
        }
    }

    /// Human-readable description of the projection chain, used in
    /// diagnostics and declaration fingerprints.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.inner.node {
            OutputNode::Field { source, field } => format!("{}.{field}", source.name),
            OutputNode::Map { input, .. } => format!("map({})", input.describe()),
            OutputNode::All { inputs } => {
                let parts: Vec<String> = inputs.iter().map(Self::describe).collect();
                format!("all({})", parts.join(", "))
            }
        }
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Output({})", self.describe())
    }
}

/// A property binding: literal JSON, a deferred output, or a nested
/// structure containing either.
#[derive(Debug, Clone)]
pub enum Property {
    /// A literal value known at declaration time.
    Value(Value),
    /// A deferred output of another resource.
    Output(Output),
    /// A list whose elements may themselves be deferred.
    List(Vec<Property>),
    /// An object whose values may themselves be deferred.
    Object(BTreeMap<String, Property>),
}

/// Property name to binding, as declared on a resource.
pub type PropertyMap = BTreeMap<String, Property>;

impl Property {
    /// Creates a literal string property.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Value(Value::String(value.into()))
    }

    /// Collects the identifiers of every resource referenced anywhere in
    /// this binding.
    pub fn collect_dependencies(&self, ids: &mut Vec<ResourceId>) {
        match self {
            Self::Value(_) => {}
            Self::Output(output) => output.collect_dependencies(ids),
            Self::List(items) => {
                for item in items {
                    item.collect_dependencies(ids);
                }
            }
            Self::Object(entries) => {
                for entry in entries.values() {
                    entry.collect_dependencies(ids);
                }
            }
        }
    }

    /// Resolves this binding to a concrete JSON value, suspending on any
    /// embedded deferred values.
    pub fn resolve(&self) -> Pin<Box<dyn Future<Output = Resolution> + Send + '_>> {
        Box::pin(async move {
            match self {
                Self::Value(value) => Resolution::Resolved(value.clone()),
                Self::Output(output) => output.resolve().await,
                Self::List(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        match item.resolve().await {
                            Resolution::Resolved(value) => values.push(value),
                            other => return other,
                        }
                    }
                    Resolution::Resolved(Value::Array(values))
                }
                Self::Object(entries) => {
                    let mut map = serde_json::Map::new();
                    for (key, entry) in entries {
                        match entry.resolve().await {
                            Resolution::Resolved(value) => {
                                map.insert(key.clone(), value);
                            }
                            other => return other,
                        }
                    }
                    Resolution::Resolved(Value::Object(map))
                }
            }
        })
    }

    /// Deterministic representation for fingerprinting. Deferred values are
    /// represented by their projection chain, not their resolved value.
    #[must_use]
    pub fn fingerprint(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Output(output) => json!({ "$output": output.describe() }),
            Self::List(items) => Value::Array(items.iter().map(Self::fingerprint).collect()),
            Self::Object(entries) => {
                let map: serde_json::Map<String, Value> = entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), entry.fingerprint()))
                    .collect();
                Value::Object(map)
            }
        }
    }
}

impl From<Output> for Property {
    fn from(output: Output) -> Self {
        Self::Output(output)
    }
}

impl From<Value> for Property {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Resolves a full property map to a JSON object.
pub async fn resolve_properties(properties: &PropertyMap) -> Resolution {
    let mut map = serde_json::Map::new();
    for (key, property) in properties {
        match property.resolve().await {
            Resolution::Resolved(value) => {
                map.insert(key.clone(), value);
            }
            other => return other,
        }
    }
    Resolution::Resolved(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OutputMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resolved_cell(fields: &[(&str, &str)]) -> Arc<OutcomeCell> {
        let cell = Arc::new(OutcomeCell::new());
        let outputs: OutputMap = fields
            .iter()
            .map(|(key, value)| ((*key).to_string(), json!(value)))
            .collect();
        cell.set(ResourceOutcome::Succeeded(outputs));
        cell
    }

    fn source(name: &str, cell: &Arc<OutcomeCell>, field: &str) -> Output {
        Output::field(ResourceId(0), name, Arc::clone(cell), field)
    }

    #[tokio::test]
    async fn field_output_reads_producer_cell() {
        let cell = resolved_cell(&[("id", "vm-123")]);
        let output = source("server-vm", &cell, "id");

        match output.resolve().await {
            Resolution::Resolved(value) => assert_eq!(value, json!("vm-123")),
            other => panic!("expected resolution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_field_fails_with_field_name() {
        let cell = resolved_cell(&[("id", "vm-123")]);
        let output = source("server-vm", &cell, "ip_address");

        match output.resolve().await {
            Resolution::Failed(message) => assert!(message.contains("ip_address")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn map_composes_lazily_and_memoizes() {
        let cell = resolved_cell(&[("name", "server-ip")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let output = source("server-ip", &cell, "name").map(move |value| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!(format!("lookup:{}", value.as_str().unwrap_or(""))))
        });

        // No eager evaluation before the first read.
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = output.resolve().await;
        let second = output.resolve().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.value(), second.value());
        assert_eq!(first.value(), Some(&json!("lookup:server-ip")));
    }

    #[tokio::test]
    async fn all_combines_in_input_order_regardless_of_completion_order() {
        let slow = Arc::new(OutcomeCell::new());
        let fast = resolved_cell(&[("name", "b")]);

        let combined = Output::all(vec![
            source("a", &slow, "name"),
            source("b", &fast, "name"),
        ]);

        let resolver = tokio::spawn({
            let combined = combined.clone();
            async move { combined.resolve().await }
        });

        // The slow producer finishes after the fast one.
        tokio::task::yield_now().await;
        let outputs: OutputMap = [(String::from("name"), json!("a"))].into_iter().collect();
        slow.set(ResourceOutcome::Succeeded(outputs));

        let resolution = resolver.await.expect("resolver panicked");
        assert_eq!(resolution.value(), Some(&json!(["a", "b"])));
    }

    #[tokio::test]
    async fn all_propagates_failure() {
        let ok = resolved_cell(&[("id", "x")]);
        let failed = Arc::new(OutcomeCell::new());
        failed.set(ResourceOutcome::Failed(String::from("quota exceeded")));

        let combined = Output::all(vec![
            source("ok", &ok, "id"),
            source("bad", &failed, "id"),
        ]);

        match combined.resolve().await {
            Resolution::Failed(message) => assert_eq!(message, "quota exceeded"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nested_property_resolves_embedded_outputs() {
        let subnet = resolved_cell(&[("id", "subnet-1")]);
        let ip = resolved_cell(&[("id", "ip-1")]);

        let mut ip_config = BTreeMap::new();
        ip_config.insert(String::from("name"), Property::string("webserveripcfg"));
        ip_config.insert(
            String::from("subnet_id"),
            Property::from(source("server-subnet", &subnet, "id")),
        );
        ip_config.insert(
            String::from("public_ip_address_id"),
            Property::from(source("server-ip", &ip, "id")),
        );

        let property = Property::List(vec![Property::Object(ip_config)]);

        match property.resolve().await {
            Resolution::Resolved(value) => {
                assert_eq!(value[0]["subnet_id"], json!("subnet-1"));
                assert_eq!(value[0]["public_ip_address_id"], json!("ip-1"));
            }
            other => panic!("expected resolution, got {other:?}"),
        }

        let mut ids = Vec::new();
        property.collect_dependencies(&mut ids);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn fingerprint_is_deterministic_for_deferred_values() {
        let cell = resolved_cell(&[("id", "x")]);
        let property = Property::from(source("server-subnet", &cell, "id"));

        assert_eq!(
            property.fingerprint(),
            json!({ "$output": "server-subnet.id" })
        );
    }
}
