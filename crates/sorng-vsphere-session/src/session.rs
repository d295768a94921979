//! Session: connect, log in, and cache the resolved inventory objects.
//!
//! ```text
//! Unconnected ──connect──▶ Connected ──populate──▶ Populated
//!      ▲                       │
//!      └──────── logout ───────┘   (create logs out when populate fails)
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;
use url::Url;

use crate::cert::ClientCertificate;
use crate::client::{SoapConnector, VimApi, VimConnector};
use crate::endpoint::ServiceEndpoint;
use crate::error::{ResolutionErrors, SessionError, SessionResult};
use crate::finder::Finder;
use crate::keepalive::KeepAlive;
use crate::types::{InventoryObject, ResourceKind, SessionConfig, SessionInfo, SessionState};

/// `summary.type` reported by vSAN datastores.
pub const VSAN_DATASTORE_TYPE: &str = "vsan";

#[derive(Debug, Clone, Default)]
struct Resources {
    datacenter: Option<InventoryObject>,
    cluster: Option<InventoryObject>,
    datastore: Option<InventoryObject>,
    host: Option<InventoryObject>,
    network: Option<InventoryObject>,
    pool: Option<InventoryObject>,
}

impl Resources {
    fn set(&mut self, obj: InventoryObject) {
        let slot = match obj.kind {
            ResourceKind::Datacenter => &mut self.datacenter,
            ResourceKind::Cluster => &mut self.cluster,
            ResourceKind::Datastore => &mut self.datastore,
            ResourceKind::Host => &mut self.host,
            ResourceKind::Network => &mut self.network,
            ResourceKind::Pool => &mut self.pool,
        };
        *slot = Some(obj);
    }
}

/// Caches vSphere objects obtained by querying the SDK.
pub struct Session {
    config: SessionConfig,
    connector: Arc<dyn VimConnector>,
    client: Option<Arc<dyn VimApi>>,
    keepalive: Option<KeepAlive>,
    finder: Option<Finder>,
    resources: Resources,
    state: SessionState,
    connected_at: Option<DateTime<Utc>>,
}

impl Session {
    /// New unconnected session talking SOAP to `config.service`.
    pub fn new(config: SessionConfig) -> Self {
        let connector = Arc::new(SoapConnector::new(config.timeout()));
        Self::with_connector(config, connector)
    }

    /// New unconnected session using a custom connector.
    pub fn with_connector(config: SessionConfig, connector: Arc<dyn VimConnector>) -> Self {
        Self {
            config,
            connector,
            client: None,
            keepalive: None,
            finder: None,
            resources: Resources::default(),
            state: SessionState::Unconnected,
            connected_at: None,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Connect and populate as one unit: if populate fails the client is
    /// logged out again, so a connected but unresolved session is never
    /// handed back.
    pub async fn create(&mut self) -> SessionResult<&mut Self> {
        self.connect().await?;

        let populated = self.populate().await.map(|_| ());
        if let Err(e) = populated {
            if let Err(logout_err) = self.logout().await {
                log::warn!("Logout after failed populate: {}", logout_err);
            }
            return Err(e);
        }

        Ok(self)
    }

    /// Establish the connection for the session but nothing more.
    pub async fn connect(&mut self) -> SessionResult<&mut Self> {
        if self.client.is_some() {
            if let Err(e) = self.logout().await {
                log::debug!("Dropping previous connection: {}", e);
            }
        }

        let endpoint = ServiceEndpoint::parse(&self.config.service)?;
        let url = endpoint.url.clone();
        let insecure = self.config.insecure;

        // Credentials stay out of the URL so keep-alive is in place before login
        let mut client = self
            .connector
            .connect(&url, insecure, None)
            .await
            .map_err(|e| connect_error(&url, e))?;

        if self.config.has_certificate() {
            if !client.is_vc() {
                return Err(SessionError::unsupported_auth(
                    "Certificate based authentication not yet supported with ESXi",
                ));
            }

            let cert = ClientCertificate::load(&self.config.cert_file, &self.config.key_file).await?;
            client = self
                .connector
                .connect(&url, insecure, Some(&cert))
                .await
                .map_err(|e| connect_error(&url, e))?;
        }

        let keepalive = self
            .config
            .keepalive()
            .map(|interval| KeepAlive::start(client.clone(), interval));

        let login = if self.config.has_certificate() {
            client
                .login_extension_by_certificate(endpoint.username(), "")
                .await
        } else {
            client.login(endpoint.user.as_ref()).await
        };

        if let Err(e) = login {
            if let Some(ka) = keepalive {
                ka.stop().await;
            }
            return Err(SessionError::auth(format!(
                "Failed to log in to {url}: {}",
                e.message
            )));
        }

        log::info!(
            "Logged in to {} ({}){}",
            url,
            client.about().name,
            if keepalive.is_some() { " with keep-alive" } else { "" }
        );

        self.finder = Some(Finder::new(client.clone()));
        self.client = Some(client);
        self.keepalive = keepalive;
        self.resources = Resources::default();
        self.state = SessionState::Connected;
        self.connected_at = Some(Utc::now());
        Ok(self)
    }

    /// Resolve every configured resource. All failures are collected and
    /// returned together; on failure no resource is set.
    pub async fn populate(&mut self) -> SessionResult<&mut Self> {
        let client = self.client.clone().ok_or_else(SessionError::not_connected)?;
        self.resources = Resources::default();
        if self.state == SessionState::Populated {
            self.state = SessionState::Connected;
        }

        let finder = self.finder.insert(Finder::new(client.clone()));
        let cfg = &self.config;
        let mut errs = ResolutionErrors::new();
        let mut found = Resources::default();

        match finder.datacenter_or_default(cfg.path_for(ResourceKind::Datacenter)).await {
            Ok(dc) => {
                finder.set_datacenter(dc.clone());
                found.datacenter = Some(dc);
            }
            Err(e) => errs.push(e),
        }

        for kind in [
            ResourceKind::Cluster,
            ResourceKind::Datastore,
            ResourceKind::Host,
            ResourceKind::Network,
            ResourceKind::Pool,
        ] {
            let path = cfg.path_for(kind);
            if kind == ResourceKind::Network && path.is_empty() {
                continue;
            }
            match finder.resolve(kind, path).await {
                Ok(obj) => found.set(obj),
                // A default host is not needed on vCenter
                Err(e) if kind == ResourceKind::Host && e.is_default_multiple_found() && client.is_vc() => {
                    log::debug!("No default host: {}", e);
                }
                Err(e) => errs.push(e),
            }
        }

        if !errs.is_empty() {
            log::warn!(
                "Failed to resolve {} resource(s) on {}",
                errs.len(),
                client.url()
            );
            return Err(SessionError::resolution(errs));
        }

        self.resources = found;
        self.state = SessionState::Populated;
        Ok(self)
    }

    /// Stop keep-alive, log out, and forget the client and resources.
    pub async fn logout(&mut self) -> SessionResult<()> {
        if let Some(ka) = self.keepalive.take() {
            ka.stop().await;
        }
        self.finder = None;
        self.resources = Resources::default();
        self.state = SessionState::Unconnected;
        self.connected_at = None;

        let Some(client) = self.client.take() else {
            return Ok(());
        };
        client.logout().await?;
        log::info!("Logged out of {}", client.url());
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// The underlying client handle.
    pub fn vim25(&self) -> Option<Arc<dyn VimApi>> {
        self.client.clone()
    }

    pub fn finder(&self) -> Option<&Finder> {
        self.finder.as_ref()
    }

    /// Whether the session is backed by vCenter.
    pub fn is_vc(&self) -> bool {
        self.client.as_ref().map_or(false, |c| c.is_vc())
    }

    /// Whether the session datastore is backed by vSAN.
    pub async fn is_vsan(&self) -> bool {
        let (Some(client), Some(ds)) = (&self.client, &self.resources.datastore) else {
            return false;
        };
        match client.datastore_type(&ds.reference).await {
            Ok(t) => t == VSAN_DATASTORE_TYPE,
            Err(e) => {
                log::debug!("Datastore type lookup for {} failed: {}", ds.reference, e);
                false
            }
        }
    }

    pub fn datacenter(&self) -> Option<&InventoryObject> {
        self.resources.datacenter.as_ref()
    }

    pub fn cluster(&self) -> Option<&InventoryObject> {
        self.resources.cluster.as_ref()
    }

    pub fn datastore(&self) -> Option<&InventoryObject> {
        self.resources.datastore.as_ref()
    }

    pub fn host(&self) -> Option<&InventoryObject> {
        self.resources.host.as_ref()
    }

    pub fn network(&self) -> Option<&InventoryObject> {
        self.resources.network.as_ref()
    }

    pub fn pool(&self) -> Option<&InventoryObject> {
        self.resources.pool.as_ref()
    }

    /// Credential-free snapshot for logs and diagnostics.
    pub fn info(&self) -> SessionInfo {
        let endpoint = ServiceEndpoint::parse(&self.config.service)
            .map(|e| e.url.to_string())
            .unwrap_or_default();
        let name = |o: &Option<InventoryObject>| o.as_ref().map(|o| o.name.clone());

        SessionInfo {
            endpoint,
            state: self.state,
            api_type: self.client.as_ref().map(|c| c.about().api_type.clone()),
            api_version: self.client.as_ref().map(|c| c.about().api_version.clone()),
            connected_at: self.connected_at.map(|t| t.to_rfc3339()),
            datacenter: name(&self.resources.datacenter),
            cluster: name(&self.resources.cluster),
            datastore: name(&self.resources.datastore),
            host: name(&self.resources.host),
            network: name(&self.resources.network),
            pool: name(&self.resources.pool),
        }
    }
}

fn connect_error(url: &Url, e: SessionError) -> SessionError {
    SessionError::new(e.kind, format!("Failed to connect to {url}: {}", e.message))
}
