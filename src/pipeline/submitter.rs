use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{HandoffError, HandoffSender, PolicySubmitter};
use crate::cluster::{ClusterApi, Resource};
use crate::controls::{framework, ControlRegistry};
use crate::error::{Result, ScanError};
use crate::request::ScanRequest;
use crate::session::SessionObject;

/// Resolves the request's policy and emits one session per namespace.
pub struct PolicyHandler {
    cluster: Arc<dyn ClusterApi>,
    registry: ControlRegistry,
}

impl PolicyHandler {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self {
            cluster,
            registry: ControlRegistry::new(),
        }
    }

    /// Build the sessions for a request without sending them.
    ///
    /// Cluster-scoped resources come first, then namespaces in lexical order.
    pub fn sessions(&self, request: &ScanRequest) -> Result<Vec<SessionObject>> {
        let controls = framework::resolve(&request.policy_identifier, &self.registry)?;
        let excluded = request.excluded_namespace_list();

        let mut groups: BTreeMap<Option<String>, Vec<Resource>> = BTreeMap::new();
        let mut skipped = 0usize;
        for resource in self.cluster.list_resources()? {
            let in_excluded = resource
                .namespace
                .as_deref()
                .is_some_and(|ns| excluded.contains(&ns))
                || (resource.kind == "Namespace" && excluded.contains(&resource.name.as_str()));
            if in_excluded {
                skipped += 1;
                continue;
            }
            groups
                .entry(resource.namespace.clone())
                .or_default()
                .push(resource);
        }
        if skipped > 0 {
            tracing::debug!(skipped, excluded = ?excluded, "resources in excluded namespaces dropped");
        }

        Ok(groups
            .into_iter()
            .map(|(namespace, resources)| {
                SessionObject::new(
                    request.policy_identifier.clone(),
                    namespace,
                    controls.clone(),
                    resources,
                )
            })
            .collect())
    }
}

#[async_trait]
impl PolicySubmitter for PolicyHandler {
    async fn submit(
        &self,
        request: Arc<ScanRequest>,
        sessions: &HandoffSender<SessionObject>,
    ) -> Result<usize> {
        let pending = self.sessions(&request)?;
        let mut sent = 0;
        for session in pending {
            tracing::trace!(scope = session.scope(), resources = session.resources.len(), "submitting session");
            sessions.send(session).await.map_err(|e| match e {
                HandoffError::Cancelled => ScanError::Cancelled,
                HandoffError::Closed => {
                    ScanError::Submission("evaluation stage stopped accepting work".into())
                }
            })?;
            sent += 1;
        }
        tracing::debug!(sessions = sent, policy = %request.policy_identifier, "submission complete");
        Ok(sent)
    }
}
