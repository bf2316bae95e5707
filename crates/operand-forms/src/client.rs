//! The interface to the network collaborator.
//!
//! This crate never talks to a cluster itself. A host supplies an
//! implementation of [`ResourceClient`] (typically backed by its own API
//! machinery) and the edit controller drives it. Tests ship an in-memory
//! implementation.

use async_trait::async_trait;
use kube::core::{DynamicObject, GroupVersionKind};
use snafu::Snafu;

use crate::schema::StructuralSchema;

/// An opaque error reported by a [`ResourceClient`] implementation.
///
/// The engine never inspects collaborator failures beyond their message:
/// submission failures become recoverable session errors, load failures are
/// wrapped with context by the controller.
#[derive(Debug, Snafu)]
#[snafu(display("{message}"))]
pub struct ClientError {
    message: String,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Identifies the single resource an edit session works on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceSelector {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,

    /// Unset for cluster-scoped resources.
    pub namespace: Option<String>,
}

impl ResourceSelector {
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }

    /// The `apiVersion` value matching this selector, `group/version` or
    /// bare `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// The network operations the editing engine consumes.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetches all resources matching the selector's group/version/kind and
    /// namespace. Name filtering happens in the controller.
    async fn fetch_matching(
        &self,
        selector: &ResourceSelector,
    ) -> Result<Vec<DynamicObject>, ClientError>;

    /// Loads the structural schema describing resources of the given kind.
    async fn load_schema(&self, gvk: &GroupVersionKind) -> Result<StructuralSchema, ClientError>;

    async fn create(&self, resource: &DynamicObject) -> Result<DynamicObject, ClientError>;

    async fn update(&self, resource: &DynamicObject) -> Result<DynamicObject, ClientError>;

    async fn delete(&self, resource: &DynamicObject) -> Result<(), ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_formatting() {
        let selector = ResourceSelector {
            group: "demo.example.com".to_owned(),
            version: "v1alpha1".to_owned(),
            kind: "DemoCluster".to_owned(),
            name: "demo".to_owned(),
            namespace: Some("default".to_owned()),
        };
        assert_eq!(selector.api_version(), "demo.example.com/v1alpha1");

        let core = ResourceSelector {
            group: String::new(),
            version: "v1".to_owned(),
            kind: "ConfigMap".to_owned(),
            name: "demo".to_owned(),
            namespace: None,
        };
        assert_eq!(core.api_version(), "v1");
    }
}
