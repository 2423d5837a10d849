mod credentials_in_config;
mod host_namespaces;
mod host_network;
mod host_path;
mod immutable_filesystem;
mod non_root;
mod privilege_escalation;
mod privileged;
mod resource_limits;
mod service_account_token;

use serde_json::Value;

use super::Control;
use crate::cluster::{container_name, Resource};

/// Returns all built-in controls.
pub fn all_controls() -> Vec<Box<dyn Control>> {
    vec![
        Box::new(privileged::PrivilegedContainerControl),
        Box::new(host_namespaces::HostNamespacesControl),
        Box::new(host_network::HostNetworkControl),
        Box::new(host_path::HostPathControl),
        Box::new(non_root::NonRootControl),
        Box::new(privilege_escalation::PrivilegeEscalationControl),
        Box::new(immutable_filesystem::ImmutableFilesystemControl),
        Box::new(resource_limits::ResourceLimitsControl),
        Box::new(service_account_token::ServiceAccountTokenControl),
        Box::new(credentials_in_config::CredentialsInConfigControl),
    ]
}

/// Look up `securityContext.<key>` on a container.
fn security_context_field<'a>(container: &'a Value, key: &str) -> Option<&'a Value> {
    container.get("securityContext")?.get(key)
}

/// Look up `spec.securityContext.<key>` on a workload's pod spec.
fn pod_security_context_field<'a>(resource: &'a Resource, key: &str) -> Option<&'a Value> {
    resource.pod_spec()?.get("securityContext")?.get(key)
}

/// A boolean field on the pod spec, `false` when absent.
fn pod_flag(resource: &Resource, key: &str) -> bool {
    resource
        .pod_spec()
        .and_then(|spec| spec.get(key))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Names of containers matching `failing`.
fn failing_containers<'a>(
    resource: &'a Resource,
    failing: impl Fn(&Value) -> bool,
) -> Vec<&'a str> {
    resource
        .containers()
        .into_iter()
        .filter(|c| failing(c))
        .map(container_name)
        .collect()
}

/// Format a container list for finding messages.
fn quoted(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
