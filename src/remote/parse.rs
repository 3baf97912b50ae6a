//! Blocking client for the Parse REST API.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{
    CreatedObject, FileFetcher, Payload, Query, RemoteClient, RemoteError, RemoteObject,
    RemoteResult, UpdatedObject, UploadedFile, OBJECT_NOT_FOUND,
};
use crate::config::RemoteSettings;
use crate::sync::hash::extension_of;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body returned by Parse on failure.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    error: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<RemoteObject>,
}

/// Parse REST client authenticated with the application id and a REST or
/// master key.
pub struct ParseClient {
    client: Client,
    server_url: String,
}

impl ParseClient {
    /// Build a client from remote settings.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidSettings` if the server URL is empty, no
    /// key is configured, or a credential is not a valid header value.
    pub fn new(settings: &RemoteSettings) -> RemoteResult<Self> {
        let server_url = settings.server_url.trim_end_matches('/').to_string();
        if server_url.is_empty() {
            return Err(RemoteError::InvalidSettings("server_url is empty".into()));
        }
        if settings.rest_api_key.is_none() && settings.master_key.is_none() {
            return Err(RemoteError::InvalidSettings(
                "either rest_api_key or master_key is required".into(),
            ));
        }

        let mut headers = HeaderMap::new();
        insert_header(&mut headers, "x-parse-application-id", &settings.application_id)?;
        if let Some(key) = &settings.rest_api_key {
            insert_header(&mut headers, "x-parse-rest-api-key", key)?;
        }
        if let Some(key) = &settings.master_key {
            insert_header(&mut headers, "x-parse-master-key", key)?;
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::InvalidSettings(e.to_string()))?;

        Ok(Self { client, server_url })
    }

    /// URL of a class endpoint. Built-in classes have their own roots.
    fn class_url(&self, class_name: &str) -> String {
        match class_name {
            "_User" => format!("{}/users", self.server_url),
            "_Role" => format!("{}/roles", self.server_url),
            "_Installation" => format!("{}/installations", self.server_url),
            other => format!("{}/classes/{other}", self.server_url),
        }
    }

    fn object_url(&self, class_name: &str, object_id: &str) -> String {
        format!("{}/{object_id}", self.class_url(class_name))
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> RemoteResult<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| RemoteError::InvalidSettings(format!("{name}: {e}")))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

fn transport(err: &reqwest::Error) -> RemoteError {
    RemoteError::Http(err.to_string())
}

/// Turn a response into `T`, mapping Parse error bodies to `RemoteError`.
///
/// `target` names the object for a not-found error.
fn read_response<T: DeserializeOwned>(
    response: Response,
    target: Option<(&str, &str)>,
) -> RemoteResult<T> {
    let status = response.status();
    let body = response.text().map_err(|e| transport(&e))?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) if err.code == OBJECT_NOT_FOUND => match target {
                Some((class_name, object_id)) => RemoteError::ObjectNotFound {
                    class_name: class_name.to_string(),
                    object_id: object_id.to_string(),
                },
                None => RemoteError::Api {
                    code: err.code,
                    message: err.error,
                },
            },
            Ok(err) => RemoteError::Api {
                code: err.code,
                message: err.error,
            },
            Err(_) => RemoteError::Http(format!("{status}: {body}")),
        });
    }

    serde_json::from_str(&body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

impl RemoteClient for ParseClient {
    fn create(&self, class_name: &str, payload: &Payload) -> RemoteResult<CreatedObject> {
        debug!(class = class_name, "POST object");
        let response = self
            .client
            .post(self.class_url(class_name))
            .json(payload)
            .send()
            .map_err(|e| transport(&e))?;
        read_response(response, None)
    }

    fn update(
        &self,
        class_name: &str,
        object_id: &str,
        payload: &Payload,
    ) -> RemoteResult<UpdatedObject> {
        debug!(class = class_name, object_id, "PUT object");
        let response = self
            .client
            .put(self.object_url(class_name, object_id))
            .json(payload)
            .send()
            .map_err(|e| transport(&e))?;
        read_response(response, Some((class_name, object_id)))
    }

    fn delete(&self, class_name: &str, object_id: &str) -> RemoteResult<()> {
        debug!(class = class_name, object_id, "DELETE object");
        let response = self
            .client
            .delete(self.object_url(class_name, object_id))
            .send()
            .map_err(|e| transport(&e))?;
        read_response::<serde_json::Value>(response, Some((class_name, object_id))).map(|_| ())
    }

    fn upload_file(&self, name: &str, data: &[u8]) -> RemoteResult<UploadedFile> {
        debug!(name, bytes = data.len(), "POST file");
        let response = self
            .client
            .post(format!("{}/files/{name}", self.server_url))
            .header(CONTENT_TYPE, content_type_for(name))
            .body(data.to_vec())
            .send()
            .map_err(|e| transport(&e))?;
        read_response(response, None)
    }

    fn query(&self, class_name: &str, query: &Query) -> RemoteResult<Vec<RemoteObject>> {
        let mut params: Vec<(&str, String)> = vec![
            ("limit", query.limit.to_string()),
            ("skip", query.skip.to_string()),
        ];
        if let Some(constraints) = &query.constraints {
            params.push(("where", constraints.to_string()));
        }
        if let Some(order) = &query.order {
            params.push(("order", order.clone()));
        }

        debug!(class = class_name, skip = query.skip, limit = query.limit, "GET objects");
        let response = self
            .client
            .get(self.class_url(class_name))
            .query(&params)
            .send()
            .map_err(|e| transport(&e))?;
        read_response::<QueryResponse>(response, None).map(|r| r.results)
    }
}

fn content_type_for(name: &str) -> &'static str {
    match extension_of(name) {
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".pdf" => "application/pdf",
        ".txt" => "text/plain",
        ".json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Plain HTTP downloader for file URLs. Parse file URLs need no credentials.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidSettings` if the HTTP client cannot be built.
    pub fn new() -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::InvalidSettings(e.to_string()))?;
        Ok(Self { client })
    }
}

impl FileFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> RemoteResult<Vec<u8>> {
        debug!(url, "GET file");
        let response = self.client.get(url).send().map_err(|e| transport(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Http(format!("{status} fetching {url}")));
        }
        let bytes = response.bytes().map_err(|e| transport(&e))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RemoteSettings {
        RemoteSettings {
            server_url: "https://parse.example.com/parse/".into(),
            application_id: "app".into(),
            rest_api_key: Some("rest".into()),
            master_key: None,
        }
    }

    #[test]
    fn test_class_urls() {
        let client = ParseClient::new(&settings()).unwrap();
        assert_eq!(
            client.class_url("Book"),
            "https://parse.example.com/parse/classes/Book"
        );
        assert_eq!(client.class_url("_User"), "https://parse.example.com/parse/users");
        assert_eq!(
            client.object_url("_Role", "r1"),
            "https://parse.example.com/parse/roles/r1"
        );
    }

    #[test]
    fn test_requires_a_key() {
        let mut settings = settings();
        settings.rest_api_key = None;
        assert!(matches!(
            ParseClient::new(&settings),
            Err(RemoteError::InvalidSettings(_))
        ));

        settings.master_key = Some("master".into());
        assert!(ParseClient::new(&settings).is_ok());
    }

    #[test]
    fn test_rejects_empty_server_url() {
        let mut settings = settings();
        settings.server_url = "/".into();
        assert!(ParseClient::new(&settings).is_err());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("abc.png"), "image/png");
        assert_eq!(content_type_for("abc"), "application/octet-stream");
    }
}
