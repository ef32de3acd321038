use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::config::AppConfig;
use crate::errors::{check_response_error, AppError, AppResult};
use crate::pagination::PageRequest;

pub const VERSION_HEADER: &str = "Anytype-Version";

/// HTTP transport for the local API: auth, version header, error checks.
#[derive(Clone)]
pub struct AnytypeClient {
    http: Client,
    base_url: Url,
    api_key: Arc<RwLock<Option<SecretString>>>,
    api_version: String,
}

impl AnytypeClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("anytype-extension/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let mut base_url = Url::parse(config.api_url.trim()).map_err(|err| {
            AppError::Config(format!("invalid Anytype API url {}: {err}", config.api_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "Anytype API url {} cannot be a base",
                config.api_url
            )));
        }
        if let Ok(mut segments) = base_url.path_segments_mut() {
            segments.pop_if_empty();
        }

        Ok(Self {
            http,
            base_url,
            api_key: Arc::new(RwLock::new(config.api_key.clone())),
            api_version: config.api_version.clone(),
        })
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn set_api_key(&self, key: Option<SecretString>) {
        *self.api_key.write() = key;
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.read().is_some()
    }

    pub fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config("invalid Anytype API base".into()))?
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header(VERSION_HEADER, &self.api_version);
        match self.api_key.read().as_ref() {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> AppResult<Response> {
        let response = builder.send().await?;
        trace!(status = response.status().as_u16(), url = %response.url(), "api response");
        check_response_error(response).await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.request(Method::GET, url).query(query)).await?;
        Ok(response.json().await?)
    }

    pub async fn get_page<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        page: PageRequest,
    ) -> AppResult<T> {
        self.get(segments, &page_query(page)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        body: &B,
    ) -> AppResult<T> {
        let url = self.endpoint(segments)?;
        let response = self
            .send(self.request(Method::POST, url).query(query).json(body))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> AppResult<T> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.request(Method::PATCH, url).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> AppResult<T> {
        let url = self.endpoint(segments)?;
        let response = self.send(self.request(Method::DELETE, url)).await?;
        Ok(response.json().await?)
    }

    /// Issues the smallest list request and reads the version the app
    /// reports.
    pub async fn fetch_api_version(&self) -> AppResult<Option<String>> {
        let url = self.endpoint(&["spaces"])?;
        let response = self
            .send(
                self.request(Method::GET, url)
                    .query(&page_query(PageRequest { offset: 0, limit: 1 })),
            )
            .await?;
        Ok(response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()))
    }
}

pub fn page_query(page: PageRequest) -> Vec<(&'static str, String)> {
    vec![
        ("offset", page.offset.to_string()),
        ("limit", page.limit.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use httptest::matchers::{all_of, contains, request, url_decoded};
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};
    use serde_json::json;

    use super::*;

    fn client_for(server: &Server) -> AnytypeClient {
        let config = AppConfig {
            api_url: server.url_str(""),
            api_key: Some(SecretString::new("secret-key".into())),
            ..AppConfig::default()
        };
        AnytypeClient::new(&config).unwrap()
    }

    #[test]
    fn endpoints_keep_base_path_prefix() {
        let config = AppConfig {
            api_url: "http://localhost:31009/proxy/".into(),
            ..AppConfig::default()
        };
        let client = AnytypeClient::new(&config).unwrap();
        let url = client.endpoint(&["spaces", "bafy.space", "objects"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:31009/proxy/v1/spaces/bafy.space/objects"
        );
    }

    #[tokio::test]
    async fn sends_auth_and_version_headers() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/v1/spaces"),
                request::headers(contains(("authorization", "Bearer secret-key"))),
                request::headers(contains(("anytype-version", crate::config::API_VERSION))),
                request::query(url_decoded(contains(("limit", "1")))),
            ])
            .respond_with(
                status_code(200)
                    .append_header(VERSION_HEADER, "2025-05-20")
                    .body(r#"{"data": [], "pagination": {"total": 0, "offset": 0, "limit": 1, "has_more": false}}"#),
            ),
        );

        let client = client_for(&server);
        let version = client.fetch_api_version().await.unwrap();
        assert_eq!(version.as_deref(), Some("2025-05-20"));
    }

    #[tokio::test]
    async fn error_statuses_surface_as_api_errors() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/v1/spaces/missing"))
                .respond_with(status_code(404).body("nope")),
        );
        server.expect(
            Expectation::matching(request::method_path("PATCH", "/v1/spaces/ok"))
                .respond_with(json_encoded(json!({"ok": true}))),
        );

        let client = client_for(&server);
        let err = client
            .get::<serde_json::Value>(&["spaces", "missing"], &[])
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));

        let value: serde_json::Value = client
            .patch(&["spaces", "ok"], &json!({"name": "x"}))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn refused_connections_are_connection_errors() {
        let config = AppConfig {
            api_url: "http://127.0.0.1:1".into(),
            ..AppConfig::default()
        };
        let client = AnytypeClient::new(&config).unwrap();
        let err = client.fetch_api_version().await.unwrap_err();
        assert!(err.is_connection());
    }
}
