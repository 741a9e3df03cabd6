//! Build listing, re-reading and cancellation

use async_trait::async_trait;
use kube::{
    api::{ListParams, Patch, PatchParams},
    Api, Client,
};
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::resources::{Build, BuildResource, Cancelable};

/// Page size used while draining build lists
const LIST_PAGE_SIZE: u32 = 250;

/// Operations the canceller needs against build resources
#[async_trait]
pub trait BuildClient: Send + Sync {
    /// Every build visible in the namespace at call time
    async fn list(&self, namespace: &str) -> Result<Vec<BuildResource>>;

    /// Read a single build
    async fn get(&self, name: &str, namespace: &str) -> Result<BuildResource>;

    /// Request cancellation of a build that was just re-read
    async fn cancel(&self, build: Cancelable) -> Result<BuildResource>;
}

/// `BuildClient` backed by a Kubernetes client
#[derive(Clone)]
pub struct KubeBuildClient {
    client: Client,
}

impl KubeBuildClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Build> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl BuildClient for KubeBuildClient {
    async fn list(&self, namespace: &str) -> Result<Vec<BuildResource>> {
        let api = self.api(namespace);
        let mut params = ListParams::default().limit(LIST_PAGE_SIZE);
        let mut builds = Vec::new();

        loop {
            let page = api.list(&params).await?;
            builds.extend(page.items.iter().map(BuildResource::from));

            match page.metadata.continue_.filter(|token| !token.is_empty()) {
                Some(token) => {
                    debug!(namespace = %namespace, fetched = builds.len(), "Fetching next page of builds");
                    params = params.continue_token(&token);
                }
                None => break,
            }
        }

        debug!(namespace = %namespace, count = builds.len(), "Listed builds");
        Ok(builds)
    }

    async fn get(&self, name: &str, namespace: &str) -> Result<BuildResource> {
        let build = self.api(namespace).get(name).await.map_err(|e| match e {
            kube::Error::Api(api_err) if api_err.code == 404 => {
                Error::BuildNotFound(format!("{}/{}", namespace, name))
            }
            other => Error::Kube(other),
        })?;
        Ok(BuildResource::from(&build))
    }

    async fn cancel(&self, build: Cancelable) -> Result<BuildResource> {
        let mut patch = json!({
            "status": {
                "cancelled": true
            }
        });
        // The API server rejects the write with 409 if the build moved on
        // since it was re-read.
        if let Some(version) = &build.resource_version {
            patch["metadata"] = json!({ "resourceVersion": version });
        }

        let updated = self
            .api(&build.namespace)
            .patch(&build.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(BuildResource::from(&updated))
    }
}
