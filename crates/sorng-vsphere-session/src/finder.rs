//! Inventory resolver.
//!
//! Maps path hints to inventory objects with govc-style "or default"
//! selection: an empty hint picks the only object of the kind, and fails
//! when there are none or several. Once a datacenter is set, every other
//! lookup is scoped to it.
//!
//! Hint forms:
//!
//! - `""`: the default object of the kind
//! - `/DC0/host/cluster0`: absolute inventory path
//! - `cluster0/Resources`: path relative to the datacenter folder for the kind
//! - `ds0`: object name
//!
//! Relative hints are joined under the datacenter's inventory path, which
//! is looked up from its parent folders when it was not given explicitly.

use std::sync::Arc;

use crate::client::VimApi;
use crate::error::ResolveError;
use crate::types::{InventoryObject, ManagedObjectReference, ResourceKind};

/// Name vSphere gives the root resource pool of every compute resource.
pub const ROOT_POOL_NAME: &str = "Resources";

pub type ResolveResult = Result<InventoryObject, ResolveError>;

pub struct Finder {
    client: Arc<dyn VimApi>,
    datacenter: Option<InventoryObject>,
}

impl Finder {
    pub fn new(client: Arc<dyn VimApi>) -> Self {
        Self { client, datacenter: None }
    }

    /// Scope subsequent lookups to a datacenter.
    pub fn set_datacenter(&mut self, datacenter: InventoryObject) {
        self.datacenter = Some(datacenter);
    }

    pub fn datacenter(&self) -> Option<&InventoryObject> {
        self.datacenter.as_ref()
    }

    pub async fn datacenter_or_default(&self, path: &str) -> ResolveResult {
        self.resolve(ResourceKind::Datacenter, path).await
    }

    pub async fn compute_resource_or_default(&self, path: &str) -> ResolveResult {
        self.resolve(ResourceKind::Cluster, path).await
    }

    pub async fn datastore_or_default(&self, path: &str) -> ResolveResult {
        self.resolve(ResourceKind::Datastore, path).await
    }

    pub async fn host_system_or_default(&self, path: &str) -> ResolveResult {
        self.resolve(ResourceKind::Host, path).await
    }

    pub async fn network_or_default(&self, path: &str) -> ResolveResult {
        self.resolve(ResourceKind::Network, path).await
    }

    pub async fn resource_pool_or_default(&self, path: &str) -> ResolveResult {
        self.resolve(ResourceKind::Pool, path).await
    }

    /// Resolve any kind by hint.
    pub async fn resolve(&self, kind: ResourceKind, path: &str) -> ResolveResult {
        let path = path.trim();
        log::debug!("Resolving {} '{}'", kind, path);

        let found = if path.is_empty() {
            self.default_for(kind).await?
        } else if path.starts_with('/') {
            self.by_inventory_path(kind, path).await?
        } else if path.contains('/') {
            let full = self.absolute_path(kind, path);
            self.by_inventory_path(kind, &full).await?
        } else {
            self.by_name(kind, path).await?
        };
        Ok(self.with_inventory_path(found).await)
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn scope(&self, kind: ResourceKind) -> ManagedObjectReference {
        match (&self.datacenter, kind) {
            (Some(dc), k) if k != ResourceKind::Datacenter => dc.reference.clone(),
            _ => self.client.root_folder().clone(),
        }
    }

    fn absolute_path(&self, kind: ResourceKind, relative: &str) -> String {
        match (&self.datacenter, kind.folder()) {
            (Some(dc), Some(folder)) => format!("{}/{}/{}", dc.path(), folder, relative),
            _ => format!("/{relative}"),
        }
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<InventoryObject>, ResolveError> {
        let found = self
            .client
            .list_objects(&self.scope(kind), kind.vim_type())
            .await
            .map_err(|e| ResolveError::api(kind, &e))?;

        Ok(found
            .into_iter()
            .filter(|(r, _)| kind.accepts(&r.kind))
            .map(|(r, name)| InventoryObject::new(kind, r, name))
            .collect())
    }

    /// Datacenters anchor relative hints, so one found by name or default
    /// gets its real path (it may sit in a folder).
    async fn with_inventory_path(&self, obj: InventoryObject) -> InventoryObject {
        if obj.kind != ResourceKind::Datacenter || obj.inventory_path.is_some() {
            return obj;
        }
        match self.client.inventory_path(&obj.reference).await {
            Ok(path) => obj.with_path(path),
            Err(e) => {
                log::debug!("No inventory path for {}: {}", obj.reference, e);
                obj
            }
        }
    }

    async fn default_for(&self, kind: ResourceKind) -> ResolveResult {
        let mut candidates = self.list(kind).await?;
        if kind == ResourceKind::Pool {
            candidates.retain(|p| p.name == ROOT_POOL_NAME);
        }

        match candidates.len() {
            0 => Err(ResolveError::default_not_found(kind)),
            1 => Ok(candidates.remove(0)),
            _ => Err(ResolveError::default_multiple_found(kind)),
        }
    }

    async fn by_name(&self, kind: ResourceKind, name: &str) -> ResolveResult {
        let mut matches: Vec<InventoryObject> = self
            .list(kind)
            .await?
            .into_iter()
            .filter(|o| o.name == name)
            .collect();

        match matches.len() {
            0 => Err(ResolveError::not_found(kind, name)),
            1 => Ok(matches.remove(0)),
            _ => Err(ResolveError::multiple_found(kind, name)),
        }
    }

    async fn by_inventory_path(&self, kind: ResourceKind, path: &str) -> ResolveResult {
        let found = self
            .client
            .find_by_inventory_path(path)
            .await
            .map_err(|e| ResolveError::api(kind, &e))?;

        match found {
            Some(r) if kind.accepts(&r.kind) => {
                let name = path.rsplit('/').next().unwrap_or(path).to_string();
                Ok(InventoryObject::new(kind, r, name).with_path(path))
            }
            _ => Err(ResolveError::not_found(kind, path)),
        }
    }
}
