//! Blocking HTTP client for the CKAN action API

use std::error::Error as StdError;
use std::io;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response, multipart};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::catalog::{Catalog, ContentFetcher};
use crate::config::ClientConfig;
use crate::types::{
    DatastoreCreate, DatastoreDelete, DatastoreSearch, DatastoreUpsert, Fetched, NewPackage,
    NewResource, Organization, Package, Resource, SearchResult, Upload,
};
use crate::{Error, Result};

/// Header carrying the API key
const API_KEY_HEADER: &str = "X-CKAN-API-Key";

/// The `{success, result, error}` wrapper around every action response
#[derive(Debug, serde::Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// A connection to one CKAN instance
#[derive(Debug, Clone)]
pub struct CkanClient {
    config: ClientConfig,
    address: String,
    http: Client,
}

impl CkanClient {
    /// Build a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let url = config.validate()?;
        let address = url.as_str().trim_end_matches('/').to_string();

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            config,
            address,
            http,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{}", self.address, action)
    }

    /// True when `url` is served by this catalog. The API key is only sent
    /// to the catalog itself, never to hosts a resource links to.
    fn is_own_origin(&self, url: &str) -> bool {
        match (Url::parse(url), Url::parse(&self.address)) {
            (Ok(target), Ok(own)) => target.origin() == own.origin(),
            _ => false,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// Call an action with a JSON body and decode its `result`.
    pub fn call<B, T>(&self, action: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.action_url(action);
        tracing::debug!(action, %url, "Calling CKAN action");

        let request = self.authorize(self.http.post(&url).json(body));
        let response = request
            .send()
            .map_err(|e| transport_error(action, e))?;

        decode(action, response)
    }

    /// Call an action with a multipart body carrying `upload`.
    fn call_multipart<T: DeserializeOwned>(
        &self,
        action: &str,
        resource: &NewResource,
        upload: Upload,
    ) -> Result<T> {
        let url = self.action_url(action);
        tracing::debug!(action, %url, file = %upload.file_name, "Uploading file");

        let mut form = multipart::Form::new();
        if let Value::Object(fields) = serde_json::to_value(resource)? {
            for (key, value) in fields {
                let text = match value {
                    Value::String(s) => s,
                    Value::Null => continue,
                    other => other.to_string(),
                };
                form = form.text(key, text);
            }
        }
        let part = multipart::Part::bytes(upload.bytes).file_name(upload.file_name);
        form = form.part("upload", part);

        let request = self.authorize(self.http.post(&url).multipart(form));
        let response = request
            .send()
            .map_err(|e| transport_error(action, e))?;

        decode(action, response)
    }

    fn send_resource(
        &self,
        action: &str,
        resource: &NewResource,
        upload: Option<Upload>,
    ) -> Result<Resource> {
        match upload {
            Some(upload) => self.call_multipart(action, resource, upload),
            None => self.call(action, resource),
        }
    }
}

impl Catalog for CkanClient {
    fn address(&self) -> &str {
        &self.address
    }

    fn package_show(&self, id: &str) -> Result<Package> {
        self.call("package_show", &json!({ "id": id }))
    }

    fn package_create(&self, package: &NewPackage) -> Result<Package> {
        self.call("package_create", package)
    }

    fn resource_show(&self, id: &str) -> Result<Resource> {
        self.call("resource_show", &json!({ "id": id }))
            .map_err(|e| match e {
                Error::NotFound { .. } => {
                    Error::not_found(format!("Resource `{}` was not found in filestore.", id))
                }
                other => other,
            })
    }

    fn resource_create(&self, resource: &NewResource, upload: Option<Upload>) -> Result<Resource> {
        self.send_resource("resource_create", resource, upload)
    }

    fn resource_update(&self, resource: &NewResource, upload: Option<Upload>) -> Result<Resource> {
        self.send_resource("resource_update", resource, upload)
    }

    fn organization_list_for_user(&self, permission: &str) -> Result<Vec<Organization>> {
        self.call(
            "organization_list_for_user",
            &json!({ "permission": permission }),
        )
    }

    fn datastore_create(&self, request: &DatastoreCreate) -> Result<()> {
        self.call::<_, Value>("datastore_create", request).map(drop)
    }

    fn datastore_delete(&self, request: &DatastoreDelete) -> Result<()> {
        self.call::<_, Value>("datastore_delete", request).map(drop)
    }

    fn datastore_upsert(&self, request: &DatastoreUpsert) -> Result<()> {
        self.call::<_, Value>("datastore_upsert", request).map(drop)
    }

    fn datastore_search(&self, request: &DatastoreSearch) -> Result<SearchResult> {
        self.call("datastore_search", request)
    }
}

impl ContentFetcher for CkanClient {
    fn fetch(&self, resource_id: &str) -> Result<Fetched> {
        let resource = self.resource_show(resource_id)?;
        let url = resource.download_url().ok_or_else(|| {
            Error::not_found(format!("Resource `{}` has no download url.", resource_id))
        })?;

        tracing::info!("Downloading url {}...", url);
        let mut request = self.http.get(url);
        if self.is_own_origin(url) {
            request = self.authorize(request);
        }
        let response = request
            .send()
            .map_err(|e| transport_error("fetch", e))?;

        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                return Err(Error::not_authorized(format!(
                    "Access to fetch resource {} was denied.",
                    resource_id
                )));
            }
            StatusCode::NOT_FOUND => {
                return Err(Error::not_found(format!(
                    "Resource `{}` was not found in filestore.",
                    resource_id
                )));
            }
            status if !status.is_success() => {
                return Err(Error::Http {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            _ => {}
        }

        let headers = response.headers();
        let raw_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        let (content_type, encoding) = split_content_type(raw_type.as_deref());

        Ok(Fetched {
            file_name: file_name_from_url(response.url().as_str()),
            body: Box::new(response),
            content_type,
            encoding,
            content_length,
        })
    }
}

fn decode<T: DeserializeOwned>(action: &str, response: Response) -> Result<T> {
    let status = response.status();
    let url = response.url().to_string();

    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return Err(Error::PayloadTooLarge {
            action: action.to_string(),
        });
    }

    let text = response.text().map_err(|e| transport_error(action, e))?;
    let envelope: Envelope = match serde_json::from_str(&text) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(Error::Http {
                status: status.as_u16(),
                url,
            });
        }
    };

    if envelope.success {
        let result = envelope.result.unwrap_or(Value::Null);
        return Ok(serde_json::from_value(result)?);
    }

    Err(envelope_error(envelope.error.unwrap_or(Value::Null)))
}

/// Map CKAN's `error` object onto the error taxonomy.
fn envelope_error(error: Value) -> Error {
    let kind = error
        .get("__type")
        .and_then(Value::as_str)
        .unwrap_or("Error")
        .to_string();
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());

    match kind.as_str() {
        "Not Found Error" => Error::NotFound { message },
        "Authorization Error" => Error::NotAuthorized { message },
        "Validation Error" => Error::Validation {
            message,
            fields: error,
        },
        _ => Error::Api { kind, message },
    }
}

fn transport_error(action: &str, error: reqwest::Error) -> Error {
    if is_broken_pipe(&error) {
        Error::PayloadTooLarge {
            action: action.to_string(),
        }
    } else {
        Error::Transport(error)
    }
}

/// True when the server hung up on us mid-request, which CKAN behind a
/// proxy does for oversized bodies.
fn is_broken_pipe(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<io::Error>()
            && matches!(
                io_error.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
            )
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Split `text/csv; charset=latin1` into its mime type and charset.
pub fn split_content_type(raw: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(raw) = raw else {
        return (None, None);
    };

    let mut parts = raw.split(';').map(str::trim);
    let mime = parts
        .next()
        .filter(|m| !m.is_empty())
        .map(str::to_ascii_lowercase);
    let charset = parts
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string());

    (mime, charset)
}

/// Last non-empty path segment of `url`.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("text/csv"), Some("text/csv"), None)]
    #[case(Some("text/csv; charset=ISO-8859-1"), Some("text/csv"), Some("ISO-8859-1"))]
    #[case(Some("Text/CSV;charset=\"utf-8\""), Some("text/csv"), Some("utf-8"))]
    #[case(None, None, None)]
    fn split_content_type_cases(
        #[case] raw: Option<&str>,
        #[case] mime: Option<&str>,
        #[case] charset: Option<&str>,
    ) {
        let (m, c) = split_content_type(raw);
        assert_eq!(m.as_deref(), mime);
        assert_eq!(c.as_deref(), charset);
    }

    #[rstest]
    #[case("http://example.com/dataset/r/download/data.csv", Some("data.csv"))]
    #[case("http://example.com/files/report.xlsx?x=1", Some("report.xlsx"))]
    #[case("http://example.com/", None)]
    fn file_name_from_url_cases(#[case] url: &str, #[case] expected: Option<&str>) {
        assert_eq!(file_name_from_url(url).as_deref(), expected);
    }

    #[test]
    fn envelope_error_maps_kinds() {
        let not_found = envelope_error(json!({"__type": "Not Found Error", "message": "Not found"}));
        assert!(matches!(not_found, Error::NotFound { .. }));

        let denied = envelope_error(json!({"__type": "Authorization Error", "message": "no"}));
        assert!(matches!(denied, Error::NotAuthorized { .. }));

        let invalid = envelope_error(json!({
            "__type": "Validation Error",
            "resource_id": ["Not found: Resource"]
        }));
        assert_eq!(invalid.field_errors("resource_id"), vec!["Not found: Resource"]);

        let other = envelope_error(json!({"__type": "Search Error", "message": "bad query"}));
        assert_eq!(other.to_string(), "Search Error: bad query");
    }

    #[rstest]
    #[case("http://localhost:5000/dataset/r/download/a.csv", true)]
    #[case("http://LOCALHOST:5000/files/a.csv", true)]
    #[case("http://localhost:5001/files/a.csv", false)]
    #[case("https://localhost:5000/files/a.csv", false)]
    #[case("http://files.example.org/a.csv", false)]
    #[case("not a url", false)]
    fn own_origin_cases(#[case] url: &str, #[case] expected: bool) {
        let client = CkanClient::new(ClientConfig::new("http://localhost:5000/")).unwrap();
        assert_eq!(client.is_own_origin(url), expected);
    }

    #[test]
    fn action_url_strips_trailing_slash() {
        let client = CkanClient::new(ClientConfig::new("http://localhost:5000/")).unwrap();
        assert_eq!(
            client.action_url("package_show"),
            "http://localhost:5000/api/3/action/package_show"
        );
        assert_eq!(client.address(), "http://localhost:5000");
    }
}
