//! REST mapping of internal entities onto ERP resources.

use erpsync_core::MirrorTarget;
use erpsync_domain::{
    EntityPayload, HttpMethod, OutboundRequest, Result, SyncError, UpstreamResponse,
};
use serde_json::Value;
use url::Url;

/// Mirrors entities as `POST {base}/{entity_type}` (create) or
/// `PUT {base}/{entity_type}/{external_id}` (update).
#[derive(Debug, Clone)]
pub struct ErpMirror {
    base_url: String,
}

impl ErpMirror {
    /// # Errors
    /// `Config` if `api_base_url` is not an absolute URL.
    pub fn new(api_base_url: &str) -> Result<Self> {
        let parsed = Url::parse(api_base_url)
            .map_err(|err| SyncError::Config(format!("invalid erp.api_base_url: {err}")))?;
        if parsed.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "erp.api_base_url cannot be used as a base: {api_base_url}"
            )));
        }
        Ok(Self { base_url: api_base_url.trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resource_url(&self, payload: &EntityPayload) -> Result<String> {
        let resource = payload.entity_type.trim_matches('/');
        if resource.is_empty() {
            return Err(SyncError::InvalidInput("entity_type must not be empty".into()));
        }
        Ok(match payload.external_id.as_deref() {
            Some(id) => format!("{}/{}/{}", self.base_url, resource, id),
            None => format!("{}/{}", self.base_url, resource),
        })
    }
}

impl MirrorTarget for ErpMirror {
    fn build_request(&self, access_token: &str, payload: &EntityPayload) -> Result<OutboundRequest> {
        let method = if payload.external_id.is_some() { HttpMethod::Put } else { HttpMethod::Post };
        Ok(OutboundRequest::new(method, self.resource_url(payload)?)
            .bearer(access_token)
            .header("Accept", "application/json")
            .json_body(&payload.data))
    }

    fn external_id(&self, payload: &EntityPayload, response: &UpstreamResponse) -> Result<String> {
        if response.body.trim().is_empty() {
            return payload.external_id.clone().ok_or_else(|| {
                SyncError::Upstream {
                    status: response.status,
                    message: "ERP response carried no resource id".into(),
                }
            });
        }

        let body: Value = response.json().map_err(|err| SyncError::Upstream {
            status: response.status,
            message: format!("unparseable ERP response: {err}"),
        })?;

        body.pointer("/data/id")
            .or_else(|| body.get("id"))
            .and_then(id_to_string)
            .or_else(|| payload.external_id.clone())
            .ok_or_else(|| SyncError::Upstream {
                status: response.status,
                message: "ERP response carried no resource id".into(),
            })
    }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn mirror() -> ErpMirror {
        ErpMirror::new("https://erp.test/Api/v3/").unwrap()
    }

    #[test]
    fn create_posts_to_collection() {
        let payload = EntityPayload::new("acme", "produtos", json!({"nome": "Caderno"}));
        let request = mirror().build_request("tok", &payload).unwrap();

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "https://erp.test/Api/v3/produtos");
        assert!(request.headers.contains(&("Authorization".into(), "Bearer tok".into())));
        assert_eq!(request.body.as_deref(), Some(r#"{"nome":"Caderno"}"#));
    }

    #[test]
    fn update_puts_to_resource() {
        let payload =
            EntityPayload::new("acme", "contatos", json!({})).with_external_id("77");
        let request = mirror().build_request("tok", &payload).unwrap();

        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.url, "https://erp.test/Api/v3/contatos/77");
    }

    #[test]
    fn empty_entity_type_is_invalid() {
        let payload = EntityPayload::new("acme", "", json!({}));
        assert!(matches!(
            mirror().build_request("tok", &payload),
            Err(SyncError::InvalidInput(_))
        ));
    }

    #[test]
    fn relative_base_url_is_rejected() {
        assert!(matches!(ErpMirror::new("erp/api"), Err(SyncError::Config(_))));
    }

    #[test]
    fn reads_numeric_and_string_ids() {
        let payload = EntityPayload::new("acme", "produtos", json!({}));
        let m = mirror();

        let nested = UpstreamResponse::new(201, r#"{"data":{"id":16172045}}"#);
        assert_eq!(m.external_id(&payload, &nested).unwrap(), "16172045");

        let flat = UpstreamResponse::new(201, r#"{"id":"abc"}"#);
        assert_eq!(m.external_id(&payload, &flat).unwrap(), "abc");
    }

    #[test]
    fn empty_update_response_keeps_known_id() {
        let payload = EntityPayload::new("acme", "produtos", json!({})).with_external_id("9");
        let response = UpstreamResponse::new(204, "");

        assert_eq!(mirror().external_id(&payload, &response).unwrap(), "9");
    }

    #[test]
    fn create_without_id_is_an_error() {
        let payload = EntityPayload::new("acme", "produtos", json!({}));
        let response = UpstreamResponse::new(201, r#"{"data":{}}"#);

        assert!(matches!(
            mirror().external_id(&payload, &response),
            Err(SyncError::Upstream { status: 201, .. })
        ));
    }
}
