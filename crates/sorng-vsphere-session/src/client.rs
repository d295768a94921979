//! vim25 client seam and the reqwest-backed SOAP implementation.
//!
//! [`VimConnector`] builds an unauthenticated client for an endpoint and
//! [`VimApi`] is everything the session and the finder need from it.
//! Tests swap both for in-memory fakes.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::cert::ClientCertificate;
use crate::error::{SessionError, SessionResult};
use crate::soap;
use crate::types::{AboutInfo, ManagedObjectReference, ServiceContent, UserCredentials};
use crate::xml::XmlNode;

/// Builds clients for an SDK endpoint.
#[async_trait]
pub trait VimConnector: Send + Sync {
    /// Connect without logging in. With a certificate the TLS client
    /// presents it on every request.
    async fn connect(
        &self,
        url: &Url,
        insecure: bool,
        certificate: Option<&ClientCertificate>,
    ) -> SessionResult<Arc<dyn VimApi>>;
}

/// A connected vim25 client.
#[async_trait]
pub trait VimApi: Send + Sync {
    /// SDK URL (no credentials).
    fn url(&self) -> &Url;

    fn about(&self) -> &AboutInfo;

    /// Endpoint is vCenter rather than a standalone host.
    fn is_vc(&self) -> bool {
        self.about().api_type.is_vc()
    }

    /// Root of the inventory tree.
    fn root_folder(&self) -> &ManagedObjectReference;

    async fn login(&self, user: Option<&UserCredentials>) -> SessionResult<()>;

    async fn login_extension_by_certificate(
        &self,
        extension_key: &str,
        locale: &str,
    ) -> SessionResult<()>;

    async fn logout(&self) -> SessionResult<()>;

    /// Cheap authenticated round trip that resets the idle timer.
    async fn keep_alive(&self) -> SessionResult<()>;

    async fn find_by_inventory_path(
        &self,
        path: &str,
    ) -> SessionResult<Option<ManagedObjectReference>>;

    /// Every object of `vim_type` (subtypes included) below `container`,
    /// with its name.
    async fn list_objects(
        &self,
        container: &ManagedObjectReference,
        vim_type: &str,
    ) -> SessionResult<Vec<(ManagedObjectReference, String)>>;

    /// `summary.type` of a datastore (e.g. "VMFS", "NFS", "vsan").
    async fn datastore_type(&self, datastore: &ManagedObjectReference) -> SessionResult<String>;

    /// Full inventory path of an object, built from its `parent` chain up
    /// to the root folder (e.g. "/Lab/DC0").
    async fn inventory_path(&self, obj: &ManagedObjectReference) -> SessionResult<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SOAP implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parent hops walked before an inventory path lookup gives up.
const MAX_INVENTORY_DEPTH: usize = 32;

/// Connector producing [`SoapClient`]s.
#[derive(Debug, Clone)]
pub struct SoapConnector {
    timeout: Duration,
}

impl SoapConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SoapConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl VimConnector for SoapConnector {
    async fn connect(
        &self,
        url: &Url,
        insecure: bool,
        certificate: Option<&ClientCertificate>,
    ) -> SessionResult<Arc<dyn VimApi>> {
        let client = SoapClient::connect(url.clone(), insecure, self.timeout, certificate).await?;
        let api: Arc<dyn VimApi> = Arc::new(client);
        Ok(api)
    }
}

/// vim25 SOAP client over reqwest. The session cookie is kept by the
/// client's cookie store.
pub struct SoapClient {
    http: Client,
    url: Url,
    content: ServiceContent,
}

impl SoapClient {
    /// Build the HTTP client and fetch the service content.
    pub async fn connect(
        url: Url,
        insecure: bool,
        timeout: Duration,
        certificate: Option<&ClientCertificate>,
    ) -> SessionResult<Self> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(timeout)
            .cookie_store(true);
        if let Some(cert) = certificate {
            builder = builder.identity(cert.identity()?);
        }
        let http = builder
            .build()
            .map_err(|e| SessionError::connection(format!("Failed to build HTTP client: {e}")))?;

        let resp = Self::post(&http, &url, None, &soap::retrieve_service_content()).await?;
        let content = soap::decode_service_content(&resp)?;

        log::debug!(
            "Connected to {} ({}, API {})",
            url,
            content.about.full_name,
            content.about.api_version
        );

        Ok(Self { http, url, content })
    }

    pub fn service_content(&self) -> &ServiceContent {
        &self.content
    }

    async fn call(&self, body: &str) -> SessionResult<XmlNode> {
        Self::post(&self.http, &self.url, Some(&self.content.about.api_version), body).await
    }

    async fn post(
        http: &Client,
        url: &Url,
        api_version: Option<&str>,
        body: &str,
    ) -> SessionResult<XmlNode> {
        let action = match api_version {
            Some(v) if !v.is_empty() => format!("{}/{v}", soap::VIM25_NAMESPACE),
            _ => soap::VIM25_NAMESPACE.to_string(),
        };

        let resp = http
            .post(url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("text/xml; charset=utf-8"))
            .header("SOAPAction", action)
            .body(soap::envelope(body))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| SessionError::parse(format!("Failed to read response body: {e}")))?;
        soap::decode_response(status, &text)
    }

    fn session_manager(&self) -> SessionResult<&ManagedObjectReference> {
        self.content
            .session_manager
            .as_ref()
            .ok_or_else(|| SessionError::auth("Endpoint does not expose a session manager"))
    }

    async fn retrieve_all(&self, first: &str) -> SessionResult<Vec<soap::ObjectContent>> {
        let resp = self.call(first).await?;
        let (mut objects, mut token) = soap::decode_retrieve_result(&resp);
        while let Some(t) = token.take() {
            let body = soap::continue_retrieve_properties(&self.content.property_collector, &t);
            let resp = self.call(&body).await?;
            let (more, next) = soap::decode_retrieve_result(&resp);
            objects.extend(more);
            token = next;
        }
        Ok(objects)
    }
}

#[async_trait]
impl VimApi for SoapClient {
    fn url(&self) -> &Url {
        &self.url
    }

    fn about(&self) -> &AboutInfo {
        &self.content.about
    }

    fn root_folder(&self) -> &ManagedObjectReference {
        &self.content.root_folder
    }

    async fn login(&self, user: Option<&UserCredentials>) -> SessionResult<()> {
        let (name, password) = match user {
            Some(u) => (u.username.as_str(), u.password.as_deref().unwrap_or_default()),
            None => ("", ""),
        };
        let body = soap::login(self.session_manager()?, name, password);
        self.call(&body).await?;
        Ok(())
    }

    async fn login_extension_by_certificate(
        &self,
        extension_key: &str,
        locale: &str,
    ) -> SessionResult<()> {
        let body =
            soap::login_extension_by_certificate(self.session_manager()?, extension_key, locale);
        self.call(&body).await?;
        Ok(())
    }

    async fn logout(&self) -> SessionResult<()> {
        let body = soap::logout(self.session_manager()?);
        self.call(&body).await?;
        Ok(())
    }

    async fn keep_alive(&self) -> SessionResult<()> {
        self.call(&soap::current_time()).await?;
        Ok(())
    }

    async fn find_by_inventory_path(
        &self,
        path: &str,
    ) -> SessionResult<Option<ManagedObjectReference>> {
        let body = soap::find_by_inventory_path(&self.content.search_index, path);
        let resp = self.call(&body).await?;
        Ok(soap::decode_returnval_moref(&resp))
    }

    async fn list_objects(
        &self,
        container: &ManagedObjectReference,
        vim_type: &str,
    ) -> SessionResult<Vec<(ManagedObjectReference, String)>> {
        let view_manager = self.content.view_manager.as_ref().ok_or_else(|| {
            SessionError::parse("Endpoint does not expose a view manager")
        })?;

        let resp = self
            .call(&soap::create_container_view(view_manager, container, vim_type))
            .await?;
        let view = soap::decode_returnval_moref(&resp)
            .ok_or_else(|| SessionError::parse("CreateContainerView returned no view"))?;

        let result = self
            .retrieve_all(&soap::retrieve_view_properties(
                &self.content.property_collector,
                &view,
                vim_type,
                &["name"],
            ))
            .await;

        if let Err(e) = self.call(&soap::destroy_view(&view)).await {
            log::debug!("DestroyView {} failed: {}", view, e);
        }

        Ok(result?
            .into_iter()
            .map(|o| {
                let name = o.prop("name").unwrap_or_default().to_string();
                (o.obj, name)
            })
            .collect())
    }

    async fn datastore_type(&self, datastore: &ManagedObjectReference) -> SessionResult<String> {
        let objects = self
            .retrieve_all(&soap::retrieve_object_properties(
                &self.content.property_collector,
                datastore,
                &["summary.type"],
            ))
            .await?;
        objects
            .first()
            .and_then(|o| o.prop("summary.type"))
            .map(str::to_string)
            .ok_or_else(|| SessionError::parse(format!("{datastore} has no summary.type")))
    }

    async fn inventory_path(&self, obj: &ManagedObjectReference) -> SessionResult<String> {
        let mut names = Vec::new();
        let mut current = obj.clone();

        while current != self.content.root_folder {
            if names.len() >= MAX_INVENTORY_DEPTH {
                return Err(SessionError::parse(format!("{obj} is nested too deeply")));
            }
            let objects = self
                .retrieve_all(&soap::retrieve_object_properties(
                    &self.content.property_collector,
                    &current,
                    &["name", "parent"],
                ))
                .await?;
            let content = objects
                .into_iter()
                .next()
                .ok_or_else(|| SessionError::parse(format!("{current} has no properties")))?;

            names.push(content.prop("name").unwrap_or_default().to_string());
            match content.prop_ref("parent") {
                Some(parent) => current = parent,
                None => break,
            }
        }

        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }
}
