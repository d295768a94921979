//! vim25 SOAP envelopes and response decoding.
//!
//! Only the handful of calls the session needs are covered. Request
//! bodies are built as strings; responses go through [`crate::xml`].

use crate::error::{SessionError, SessionResult};
use crate::types::{AboutInfo, ApiType, ManagedObjectReference, ServiceContent};
use crate::xml::{self, escape, XmlNode};

pub const VIM25_NAMESPACE: &str = "urn:vim25";

/// Well-known reference of the service instance.
pub fn service_instance() -> ManagedObjectReference {
    ManagedObjectReference::new("ServiceInstance", "ServiceInstance")
}

// ── Request building ────────────────────────────────────────────────

/// Wrap a body element in a SOAP 1.1 envelope.
pub fn envelope(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            "<soapenv:Body>{}</soapenv:Body></soapenv:Envelope>"
        ),
        body
    )
}

fn moref_xml(tag: &str, r: &ManagedObjectReference) -> String {
    format!(
        r#"<{tag} type="{}">{}</{tag}>"#,
        escape(&r.kind),
        escape(&r.value)
    )
}

fn text_xml(tag: &str, value: &str) -> String {
    format!("<{tag}>{}</{tag}>", escape(value))
}

fn method(name: &str, this: &ManagedObjectReference, args: &str) -> String {
    format!(
        r#"<{name} xmlns="{VIM25_NAMESPACE}">{}{args}</{name}>"#,
        moref_xml("_this", this)
    )
}

pub fn retrieve_service_content() -> String {
    method("RetrieveServiceContent", &service_instance(), "")
}

pub fn current_time() -> String {
    method("CurrentTime", &service_instance(), "")
}

pub fn login(session_manager: &ManagedObjectReference, username: &str, password: &str) -> String {
    let args = format!("{}{}", text_xml("userName", username), text_xml("password", password));
    method("Login", session_manager, &args)
}

pub fn login_extension_by_certificate(
    session_manager: &ManagedObjectReference,
    extension_key: &str,
    locale: &str,
) -> String {
    let mut args = text_xml("extensionKey", extension_key);
    if !locale.is_empty() {
        args.push_str(&text_xml("locale", locale));
    }
    method("LoginExtensionByCertificate", session_manager, &args)
}

pub fn logout(session_manager: &ManagedObjectReference) -> String {
    method("Logout", session_manager, "")
}

pub fn find_by_inventory_path(search_index: &ManagedObjectReference, path: &str) -> String {
    method("FindByInventoryPath", search_index, &text_xml("inventoryPath", path))
}

pub fn create_container_view(
    view_manager: &ManagedObjectReference,
    container: &ManagedObjectReference,
    vim_type: &str,
) -> String {
    let args = format!(
        "{}{}{}",
        moref_xml("container", container),
        text_xml("type", vim_type),
        text_xml("recursive", "true")
    );
    method("CreateContainerView", view_manager, &args)
}

pub fn destroy_view(view: &ManagedObjectReference) -> String {
    method("DestroyView", view, "")
}

/// Properties of every object of `vim_type` reachable through a container view.
pub fn retrieve_view_properties(
    property_collector: &ManagedObjectReference,
    view: &ManagedObjectReference,
    vim_type: &str,
    paths: &[&str],
) -> String {
    let path_set: String = paths.iter().map(|p| text_xml("pathSet", p)).collect();
    let spec = format!(
        concat!(
            "<specSet><propSet>{}{}</propSet>",
            "<objectSet>{}<skip>true</skip>",
            r#"<selectSet xsi:type="TraversalSpec"><type>ContainerView</type><path>view</path><skip>false</skip></selectSet>"#,
            "</objectSet></specSet><options/>"
        ),
        text_xml("type", vim_type),
        path_set,
        moref_xml("obj", view)
    );
    method("RetrievePropertiesEx", property_collector, &spec)
}

/// Properties of a single object.
pub fn retrieve_object_properties(
    property_collector: &ManagedObjectReference,
    obj: &ManagedObjectReference,
    paths: &[&str],
) -> String {
    let path_set: String = paths.iter().map(|p| text_xml("pathSet", p)).collect();
    let spec = format!(
        "<specSet><propSet>{}{}</propSet><objectSet>{}<skip>false</skip></objectSet></specSet><options/>",
        text_xml("type", &obj.kind),
        path_set,
        moref_xml("obj", obj)
    );
    method("RetrievePropertiesEx", property_collector, &spec)
}

pub fn continue_retrieve_properties(
    property_collector: &ManagedObjectReference,
    token: &str,
) -> String {
    method(
        "ContinueRetrievePropertiesEx",
        property_collector,
        &text_xml("token", token),
    )
}

// ── Response decoding ───────────────────────────────────────────────

/// Decode a SOAP response. Returns the `*Response` element, or the fault
/// as an error.
pub fn decode_response(status: u16, body: &str) -> SessionResult<XmlNode> {
    let success = (200..300).contains(&status);
    let http_error = || SessionError::connection(format!("HTTP {status}: {}", snippet(body)));

    let doc = match xml::parse(body) {
        Ok(doc) => doc,
        Err(_) if !success => return Err(http_error()),
        Err(e) => return Err(e),
    };

    let Some(envelope_body) = doc.find("Body") else {
        if !success {
            return Err(http_error());
        }
        return Err(SessionError::parse(format!(
            "HTTP {status}: response has no SOAP body"
        )));
    };

    if let Some(fault) = envelope_body.child("Fault") {
        return Err(decode_fault(fault));
    }

    if !success {
        return Err(SessionError::connection(format!("HTTP {status} without SOAP fault")));
    }

    envelope_body
        .children
        .first()
        .cloned()
        .ok_or_else(|| SessionError::parse("SOAP body is empty"))
}

/// Leading part of an error page, cut on a character boundary.
fn snippet(body: &str) -> String {
    const MAX_CHARS: usize = 500;
    body.chars().take(MAX_CHARS).collect()
}

/// Turn a `<Fault>` element into an error named after the vim fault type.
pub fn decode_fault(fault: &XmlNode) -> SessionError {
    let message = fault
        .child_text("faultstring")
        .unwrap_or("unknown SOAP fault")
        .to_string();
    let name = fault
        .child("detail")
        .and_then(|d| d.children.first())
        .map(|d| match d.attr("xsi:type") {
            Some(t) => t.to_string(),
            None => d.name.trim_end_matches("Fault").to_string(),
        })
        .or_else(|| fault.child_text("faultcode").map(str::to_string))
        .unwrap_or_default();
    SessionError::fault(name, message)
}

/// Read a managed object reference from an element with a `type` attribute.
pub fn decode_moref(node: &XmlNode) -> Option<ManagedObjectReference> {
    let kind = node.attr("type")?;
    if node.text.is_empty() {
        return None;
    }
    Some(ManagedObjectReference::new(kind, node.text.clone()))
}

pub fn decode_service_content(response: &XmlNode) -> SessionResult<ServiceContent> {
    let rv = response
        .child("returnval")
        .ok_or_else(|| SessionError::parse("RetrieveServiceContent: missing returnval"))?;

    let required = |name: &str| {
        rv.child(name)
            .and_then(decode_moref)
            .ok_or_else(|| SessionError::parse(format!("RetrieveServiceContent: missing {name}")))
    };

    let about = rv
        .child("about")
        .ok_or_else(|| SessionError::parse("RetrieveServiceContent: missing about"))?;
    let text = |name: &str| about.child_text(name).unwrap_or_default().to_string();

    Ok(ServiceContent {
        about: AboutInfo {
            name: text("name"),
            full_name: text("fullName"),
            api_type: ApiType::parse(about.child_text("apiType").unwrap_or_default()),
            api_version: text("apiVersion"),
            instance_uuid: about.child_text("instanceUuid").map(str::to_string),
        },
        root_folder: required("rootFolder")?,
        property_collector: required("propertyCollector")?,
        view_manager: rv.child("viewManager").and_then(decode_moref),
        search_index: required("searchIndex")?,
        session_manager: rv.child("sessionManager").and_then(decode_moref),
    })
}

/// Optional reference in `returnval` (FindByInventoryPath, CreateContainerView).
pub fn decode_returnval_moref(response: &XmlNode) -> Option<ManagedObjectReference> {
    response.child("returnval").and_then(decode_moref)
}

/// One object from a `RetrieveResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectContent {
    pub obj: ManagedObjectReference,
    /// Property name and its `<val>` element.
    pub props: Vec<(String, XmlNode)>,
}

impl ObjectContent {
    fn val(&self, name: &str) -> Option<&XmlNode> {
        self.props.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Text of a scalar property.
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.val(name).map(|v| v.text.as_str())
    }

    /// A property holding a managed object reference (e.g. `parent`).
    pub fn prop_ref(&self, name: &str) -> Option<ManagedObjectReference> {
        self.val(name).and_then(decode_moref)
    }
}

/// Decode a `RetrievePropertiesEx` / `ContinueRetrievePropertiesEx`
/// response into objects and the continuation token.
pub fn decode_retrieve_result(response: &XmlNode) -> (Vec<ObjectContent>, Option<String>) {
    let Some(rv) = response.child("returnval") else {
        // No matching objects
        return (Vec::new(), None);
    };

    let objects = rv
        .children_named("objects")
        .filter_map(|o| {
            let obj = o.child("obj").and_then(decode_moref)?;
            let props = o
                .children_named("propSet")
                .filter_map(|p| {
                    let name = p.child_text("name")?.to_string();
                    let val = p.child("val").cloned().unwrap_or_default();
                    Some((name, val))
                })
                .collect();
            Some(ObjectContent { obj, props })
        })
        .collect();

    let token = rv
        .child_text("token")
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    (objects, token)
}
