//! Declaration graph.
//!
//! [`StackBuilder`] is the only mutable stage: composing functions add
//! resources, explicit dependencies, parameters and outputs to it. `build`
//! validates the whole set and freezes it into a [`DeclarationGraph`], whose
//! nodes and typed edges can be inspected but not changed.
//!
//! Reference edges are not recorded by hand. They are derived from the
//! `Ref` / `Fn::GetAtt` expressions found in each resource's properties, so
//! the graph always agrees with what the rendered template says.
use crate::cfn_resources::{Output, Parameter, RemovalPolicy, Resource};
use crate::intrinsics::LogicalId;
use crate::json_utils::collect_references;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

/// Errors raised while assembling or freezing the declaration graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("invalid logical id: {0:?}")]
    InvalidId(String),

    #[error("logical id declared twice: {0}")]
    DuplicateId(LogicalId),

    #[error("{from} references undeclared resource {to}")]
    DanglingReference { from: LogicalId, to: String },

    #[error("dependency {from} -> {to} names undeclared resource {missing}")]
    UnknownDependency {
        from: LogicalId,
        to: LogicalId,
        missing: LogicalId,
    },

    #[error("dependency cycle between: {0}")]
    Cycle(String),

    #[error("failed to serialize {id}")]
    Serialize {
        id: LogicalId,
        #[source]
        source: serde_json::Error,
    },
}

/// How one declaration relates to another it must follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// The dependent's properties reference the dependency.
    Reference,
    /// Explicit ordering with no data reference.
    DependsOn,
}

/// `from` must be created after `to`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub from: LogicalId,
    pub to: LogicalId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub resource: Resource,
    pub removal_policy: Option<RemovalPolicy>,
}

/// Mutable collector used while composing a stack.
#[derive(Debug, Default)]
pub struct StackBuilder {
    nodes: BTreeMap<LogicalId, Node>,
    depends_on: BTreeSet<(LogicalId, LogicalId)>,
    parameters: BTreeMap<String, Parameter>,
    outputs: BTreeMap<LogicalId, Output>,
}

impl StackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a resource under `id`.
    pub fn add(&mut self, id: &str, resource: Resource) -> Result<LogicalId, GraphError> {
        self.insert(id, resource, None)
    }

    /// Declares a resource with an explicit teardown policy.
    pub fn add_with_policy(
        &mut self,
        id: &str,
        resource: Resource,
        policy: RemovalPolicy,
    ) -> Result<LogicalId, GraphError> {
        self.insert(id, resource, Some(policy))
    }

    fn insert(
        &mut self,
        id: &str,
        resource: Resource,
        removal_policy: Option<RemovalPolicy>,
    ) -> Result<LogicalId, GraphError> {
        let id = LogicalId::parse(id).ok_or_else(|| GraphError::InvalidId(id.to_string()))?;
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        debug!(id = %id, kind = resource.type_name(), "declared resource");
        self.nodes.insert(
            id.clone(),
            Node {
                resource,
                removal_policy,
            },
        );
        Ok(id)
    }

    /// Records that `dependent` must be created after `dependency`.
    pub fn depends_on(&mut self, dependent: &LogicalId, dependency: &LogicalId) {
        self.depends_on.insert((dependent.clone(), dependency.clone()));
    }

    /// Declares a template parameter. Re-declaring a name replaces it.
    pub fn parameter(&mut self, name: &str, parameter: Parameter) {
        self.parameters.insert(name.to_string(), parameter);
    }

    pub fn output(&mut self, id: &str, output: Output) -> Result<LogicalId, GraphError> {
        let id = LogicalId::parse(id).ok_or_else(|| GraphError::InvalidId(id.to_string()))?;
        if self.outputs.contains_key(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        self.outputs.insert(id.clone(), output);
        Ok(id)
    }

    pub fn resource(&self, id: &LogicalId) -> Option<&Resource> {
        self.nodes.get(id).map(|node| &node.resource)
    }

    /// Validates every reference and dependency and freezes the graph.
    pub fn build(self) -> Result<DeclarationGraph, GraphError> {
        let mut edges = BTreeSet::new();

        for (id, node) in &self.nodes {
            let value = serde_json::to_value(&node.resource).map_err(|source| {
                GraphError::Serialize {
                    id: id.clone(),
                    source,
                }
            })?;
            for target in collect_references(&value) {
                if self.is_parameter(&target) {
                    continue;
                }
                let to = self.known_id(&target).ok_or_else(|| GraphError::DanglingReference {
                    from: id.clone(),
                    to: target.clone(),
                })?;
                edges.insert(Edge {
                    from: id.clone(),
                    to,
                    kind: EdgeKind::Reference,
                });
            }
        }

        for (from, to) in &self.depends_on {
            for id in [from, to] {
                if !self.nodes.contains_key(id) {
                    return Err(GraphError::UnknownDependency {
                        from: from.clone(),
                        to: to.clone(),
                        missing: id.clone(),
                    });
                }
            }
            edges.insert(Edge {
                from: from.clone(),
                to: to.clone(),
                kind: EdgeKind::DependsOn,
            });
        }

        for (id, output) in &self.outputs {
            let value = serde_json::to_value(output).map_err(|source| GraphError::Serialize {
                id: id.clone(),
                source,
            })?;
            for target in collect_references(&value) {
                if !self.is_parameter(&target) && self.known_id(&target).is_none() {
                    return Err(GraphError::DanglingReference {
                        from: id.clone(),
                        to: target,
                    });
                }
            }
        }

        let order = creation_order(&self.nodes, &edges)?;

        Ok(DeclarationGraph {
            nodes: self.nodes,
            edges: edges.into_iter().collect(),
            parameters: self.parameters,
            outputs: self.outputs,
            order,
        })
    }

    fn is_parameter(&self, name: &str) -> bool {
        name.starts_with("AWS::") || self.parameters.contains_key(name)
    }

    fn known_id(&self, name: &str) -> Option<LogicalId> {
        LogicalId::parse(name).filter(|id| self.nodes.contains_key(id))
    }
}

/// Deterministic topological order: among ready nodes the smallest id goes first.
fn creation_order(
    nodes: &BTreeMap<LogicalId, Node>,
    edges: &BTreeSet<Edge>,
) -> Result<Vec<LogicalId>, GraphError> {
    let mut pending: BTreeMap<&LogicalId, BTreeSet<&LogicalId>> =
        nodes.keys().map(|id| (id, BTreeSet::new())).collect();
    for edge in edges {
        if edge.from != edge.to {
            pending.entry(&edge.from).or_default().insert(&edge.to);
        } else {
            return Err(GraphError::Cycle(edge.from.to_string()));
        }
    }

    let mut order = Vec::with_capacity(nodes.len());
    while !pending.is_empty() {
        let ready: Vec<&LogicalId> = pending
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(id, _)| *id)
            .collect();
        let Some(next) = ready.first().copied() else {
            let stuck: Vec<&str> = pending.keys().map(|id| id.as_str()).collect();
            return Err(GraphError::Cycle(stuck.join(", ")));
        };
        pending.remove(next);
        for deps in pending.values_mut() {
            deps.remove(next);
        }
        order.push(next.clone());
    }
    Ok(order)
}

/// Immutable result of one assembly run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationGraph {
    nodes: BTreeMap<LogicalId, Node>,
    edges: Vec<Edge>,
    parameters: BTreeMap<String, Parameter>,
    outputs: BTreeMap<LogicalId, Output>,
    order: Vec<LogicalId>,
}

impl DeclarationGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&LogicalId, &Node)> {
        self.nodes.iter()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        LogicalId::parse(id).and_then(|id| self.nodes.get(&id))
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.node(id).map(|node| &node.resource)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn has_edge(&self, from: &str, to: &str, kind: EdgeKind) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.from.as_str() == from && edge.to.as_str() == to && edge.kind == kind)
    }

    /// Ids `id` must be created after, through explicit `DependsOn` edges only.
    pub fn explicit_dependencies(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.edges
            .iter()
            .filter(|edge| &edge.from == id && edge.kind == EdgeKind::DependsOn)
            .map(|edge| &edge.to)
            .collect()
    }

    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    pub fn outputs(&self) -> &BTreeMap<LogicalId, Output> {
        &self.outputs
    }

    pub fn output(&self, id: &str) -> Option<&Output> {
        LogicalId::parse(id).and_then(|id| self.outputs.get(&id))
    }

    /// Every resource, each after everything it depends on.
    pub fn creation_order(&self) -> &[LogicalId] {
        &self.order
    }
}
