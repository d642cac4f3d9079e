//! HTTP implementation of [`ArangoApi`].

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::error::from_response;
use super::{ArangoApi, ArangoError, DatabaseInfo, Grant, UserOptions, UserRecord};

const SYSTEM_DATABASE: &str = "_system";

/// HTTP transport tuning for the connection to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Timeout for establishing a connection (TCP and TLS).
    pub connect_timeout: Duration,
    /// TCP keep-alive interval.
    pub keep_alive: Duration,
    /// Maximum number of idle pooled connections.
    ///
    /// reqwest caps idle connections per host rather than in total. The
    /// client talks to a single endpoint, so the two limits coincide.
    pub max_idle_connections: usize,
    /// How long an idle pooled connection is kept.
    pub idle_timeout: Duration,
    /// Upper bound for the TLS handshake.
    ///
    /// reqwest has no separate handshake timeout; the handshake runs inside
    /// the connect timeout, which must not be shorter than this value.
    pub tls_handshake_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            keep_alive: Duration::from_secs(90),
            max_idle_connections: 100,
            idle_timeout: Duration::from_secs(90),
            tls_handshake_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct ResultEnvelope<T> {
    result: T,
}

/// Client for the ArangoDB HTTP API.
///
/// Requests carry JSON bodies, `Accept: application/json` and a basic
/// authentication header. The client is cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct ArangoClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl ArangoClient {
    /// Build a client.
    ///
    /// When `tls` is true, server certificates are **not verified**: self-signed
    /// and otherwise invalid certificates are accepted.
    pub fn new(
        endpoint: Url,
        username: &str,
        password: &str,
        tls: bool,
        settings: &TransportSettings,
    ) -> Result<Self, ArangoError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, basic_auth_header(username, password)?);

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .default_headers(headers)
            .connect_timeout(settings.connect_timeout.max(settings.tls_handshake_timeout))
            .tcp_keepalive(settings.keep_alive)
            .pool_max_idle_per_host(settings.max_idle_connections)
            .pool_idle_timeout(settings.idle_timeout);

        if tls {
            warn!("TLS enabled: server certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint,
        })
    }

    /// Build the URL for `/_db/{database}/{segments...}`.
    fn url(&self, database: &str, segments: &[&str]) -> Result<Url, ArangoError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ArangoError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["_db", database])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, path = url.path(), "ArangoDB request");
        self.http.request(method, url)
    }

    /// Send a request, turning non-success responses into [`ArangoError`]s.
    async fn execute(&self, request: RequestBuilder) -> Result<Response, ArangoError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await?;
        let err = from_response(status.as_u16(), &body);
        debug!(status = status.as_u16(), error = %err, "ArangoDB request failed");
        Err(err)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ArangoError> {
        Ok(self.execute(request).await?.json::<T>().await?)
    }
}

fn basic_auth_header(username: &str, password: &str) -> Result<HeaderValue, ArangoError> {
    let credentials = BASE64.encode(format!("{}:{}", username, password));
    let mut value = HeaderValue::from_str(&format!("Basic {}", credentials))
        .map_err(|e| ArangoError::Authentication(e.to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

#[async_trait]
impl ArangoApi for ArangoClient {
    async fn create_database(&self, name: &str) -> Result<(), ArangoError> {
        let url = self.url(SYSTEM_DATABASE, &["_api", "database"])?;
        self.execute(self.request(Method::POST, url).json(&json!({ "name": name })))
            .await?;
        Ok(())
    }

    async fn database(&self, name: &str) -> Result<DatabaseInfo, ArangoError> {
        let url = self.url(name, &["_api", "database", "current"])?;
        let envelope: ResultEnvelope<DatabaseInfo> = self
            .execute_json(self.request(Method::GET, url))
            .await?;
        Ok(envelope.result)
    }

    async fn remove_database(&self, name: &str) -> Result<(), ArangoError> {
        let url = self.url(SYSTEM_DATABASE, &["_api", "database", name])?;
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn user(&self, name: &str) -> Result<UserRecord, ArangoError> {
        let url = self.url(SYSTEM_DATABASE, &["_api", "user", name])?;
        self.execute_json(self.request(Method::GET, url)).await
    }

    async fn create_user(
        &self,
        name: &str,
        options: &UserOptions,
    ) -> Result<UserRecord, ArangoError> {
        let url = self.url(SYSTEM_DATABASE, &["_api", "user"])?;
        let body = json!({
            "user": name,
            "passwd": options.password,
            "active": options.active.unwrap_or(true),
        });
        self.execute_json(self.request(Method::POST, url).json(&body))
            .await
    }

    async fn update_user(
        &self,
        name: &str,
        options: &UserOptions,
    ) -> Result<UserRecord, ArangoError> {
        let url = self.url(SYSTEM_DATABASE, &["_api", "user", name])?;
        self.execute_json(self.request(Method::PATCH, url).json(options))
            .await
    }

    async fn remove_user(&self, name: &str) -> Result<(), ArangoError> {
        let url = self.url(SYSTEM_DATABASE, &["_api", "user", name])?;
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn database_access(&self, user: &str, database: &str) -> Result<Grant, ArangoError> {
        let url = self.url(
            SYSTEM_DATABASE,
            &["_api", "user", user, "database", database],
        )?;
        let envelope: ResultEnvelope<String> = self
            .execute_json(self.request(Method::GET, url))
            .await?;
        envelope.result.parse()
    }

    async fn set_database_access(
        &self,
        user: &str,
        database: &str,
        grant: Grant,
    ) -> Result<(), ArangoError> {
        let url = self.url(
            SYSTEM_DATABASE,
            &["_api", "user", user, "database", database],
        )?;
        self.execute(
            self.request(Method::PUT, url)
                .json(&json!({ "grant": grant.as_str() })),
        )
        .await?;
        Ok(())
    }

    async fn remove_database_access(
        &self,
        user: &str,
        database: &str,
    ) -> Result<(), ArangoError> {
        let url = self.url(
            SYSTEM_DATABASE,
            &["_api", "user", user, "database", database],
        )?;
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ArangoClient {
        let url = Url::parse(&server.uri()).unwrap();
        ArangoClient::new(
            url,
            "root",
            "secret",
            false,
            &TransportSettings::default(),
        )
        .unwrap()
    }

    fn error_body(code: u16, error_num: i64, message: &str) -> serde_json::Value {
        json!({
            "error": true,
            "code": code,
            "errorNum": error_num,
            "errorMessage": message
        })
    }

    #[test]
    fn test_transport_defaults() {
        let settings = TransportSettings::default();
        assert_eq!(settings.connect_timeout, Duration::from_secs(30));
        assert_eq!(settings.keep_alive, Duration::from_secs(90));
        assert_eq!(settings.max_idle_connections, 100);
        assert_eq!(settings.idle_timeout, Duration::from_secs(90));
        assert_eq!(settings.tls_handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_url_encodes_segments() {
        let client = ArangoClient::new(
            Url::parse("http://localhost:8529/").unwrap(),
            "root",
            "",
            true,
            &TransportSettings::default(),
        )
        .unwrap();
        let url = client
            .url(SYSTEM_DATABASE, &["_api", "user", "a b/c"])
            .unwrap();
        assert_eq!(url.path(), "/_db/_system/_api/user/a%20b%2Fc");
    }

    #[tokio::test]
    async fn test_create_database_sends_basic_auth() {
        let server = MockServer::start().await;
        // "root:secret"
        Mock::given(method("POST"))
            .and(path("/_db/_system/_api/database"))
            .and(header("authorization", "Basic cm9vdDpzZWNyZXQ="))
            .and(body_json(json!({"name": "mydb"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).create_database("mydb").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_database_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_db/_system/_api/database"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(error_body(409, 1207, "duplicate name")),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_database("mydb")
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_database_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_db/missing/_api/database/current"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(error_body(404, 1228, "database not found")),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).database("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_database() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_db/mydb/_api/database/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": false,
                "code": 200,
                "result": {"name": "mydb", "id": "123", "isSystem": false}
            })))
            .mount(&server)
            .await;

        let db = client_for(&server).database("mydb").await.unwrap();
        assert_eq!(db.name, "mydb");
    }

    #[tokio::test]
    async fn test_user_roundtrip_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_db/_system/_api/user"))
            .and(body_json(json!({"user": "alice", "passwd": "1234", "active": true})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "user": "alice", "active": true, "extra": {}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/_db/_system/_api/user/alice"))
            .and(body_json(json!({"passwd": "5678", "active": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": "alice", "active": false, "extra": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let created = client
            .create_user(
                "alice",
                &UserOptions {
                    password: "1234".to_string(),
                    active: Some(true),
                },
            )
            .await
            .unwrap();
        assert!(created.active);

        let updated = client
            .update_user(
                "alice",
                &UserOptions {
                    password: "5678".to_string(),
                    active: Some(false),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.user, "alice");
        assert!(!updated.active);
    }

    #[tokio::test]
    async fn test_remove_user_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/_db/_system/_api/user/ghost"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(error_body(404, 1703, "user not found")),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).remove_user("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_database_access() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/_db/_system/_api/user/alice/database/mydb"))
            .and(body_json(json!({"grant": "rw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"mydb": "rw"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_db/_system/_api/user/alice/database/mydb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "rw"})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/_db/_system/_api/user/alice/database/mydb"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"error": false})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .set_database_access("alice", "mydb", Grant::ReadWrite)
            .await
            .unwrap();
        assert_eq!(
            client.database_access("alice", "mydb").await.unwrap(),
            Grant::ReadWrite
        );
        client
            .remove_database_access("alice", "mydb")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_grant_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_db/_system/_api/user/alice/database/mydb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "undefined"})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .database_access("alice", "mydb")
            .await
            .unwrap_err();
        assert!(matches!(err, ArangoError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn test_error_without_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_db/_system/_api/user/alice"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client_for(&server).user("alice").await.unwrap_err();
        match err {
            ArangoError::Status { code, ref body } => {
                assert_eq!(code, 503);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_proxy_404_is_not_a_missing_entity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("<html>404 Not Found</html>"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("<html>404 Not Found</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(!client.database("mydb").await.unwrap_err().is_not_found());
        assert!(!client.user("alice").await.unwrap_err().is_not_found());
        assert!(!client.remove_user("alice").await.unwrap_err().is_not_found());
    }
}
