//! Relying-Party Server (RPS) client.
//!
//! The RPS performs the actual multi-factor verification. This front end only
//! forwards one-time tokens and activation keys as JSON over HTTP(S):
//!
//! - `POST /authenticate` exchanges an auth OTT for `(status, userId, message)`.
//! - `POST /loginResult` reports the outcome back (only for successful logins).
//! - `POST /user/{identity}` activates an identity with its activation key.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Certificate, Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, instrument};
use url::Url;

/// Result of an authentication round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub user_id: String,
    pub message: String,
    pub status: u16,
}

impl AuthOutcome {
    fn server_error(status: u16) -> Self {
        Self {
            user_id: String::new(),
            message: "Server error".to_string(),
            status,
        }
    }
}

/// Login outcome reported back to the RPS.
#[derive(Debug, Clone, Copy)]
pub struct LoginResult<'a> {
    pub session_id: &'a str,
    pub user_id: &'a str,
    pub auth_ott: &'a str,
    pub status: u16,
    pub message: &'a str,
}

#[async_trait]
pub trait RpsClient: Send + Sync {
    /// Exchange an auth OTT for the authenticated user.
    ///
    /// Never fails: transport problems are folded into a failure status.
    async fn authenticate(&self, session_id: &str, auth_ott: &str) -> AuthOutcome;

    /// Report the login result.
    async fn report_login_result(&self, result: LoginResult<'_>) -> Result<()>;

    /// Activate an identity.
    async fn activate_user(&self, identity: &str, activate_key: &str) -> Result<()>;
}

#[derive(Serialize)]
struct LogoutData<'a> {
    #[serde(rename = "sessionToken")]
    session_token: &'a str,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

#[derive(Serialize)]
struct AuthenticateRequest<'a> {
    #[serde(rename = "authOTT")]
    auth_ott: &'a str,
    #[serde(rename = "logoutData")]
    logout_data: LogoutData<'a>,
}

#[derive(Deserialize, Debug, Default)]
struct AuthenticateResponse {
    #[serde(default)]
    status: u16,
    #[serde(rename = "userId", default)]
    user_id: String,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct LoginResultRequest<'a> {
    #[serde(rename = "authOTT")]
    auth_ott: &'a str,
    status: u16,
    message: &'a str,
    #[serde(rename = "logoutData")]
    logout_data: LogoutData<'a>,
}

#[derive(Serialize)]
struct ActivateRequest<'a> {
    #[serde(rename = "activateKey")]
    activate_key: &'a str,
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    /// The RPS answered with an HTTP status above 399.
    #[error("Error code {0}")]
    Status(u16),
    #[error("{0:#}")]
    Other(anyhow::Error),
}

/// RPS client over JSON/HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpRpsClient {
    client: Client,
    base_url: Url,
}

impl HttpRpsClient {
    /// Build a client for `{schema}://{host}`.
    ///
    /// When `ca_certs` is not empty the client trusts only those CAs.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(schema: &str, host: &str, ca_certs: Vec<Certificate>) -> Result<Self> {
        let base_url = Url::parse(&format!("{schema}://{host}/"))
            .with_context(|| format!("Invalid RPS address: {schema}://{host}"))?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .user_agent(crate::APP_USER_AGENT);

        if !ca_certs.is_empty() {
            builder = builder.tls_built_in_root_certs(false);
            for cert in ca_certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder.build().context("Failed to build RPS HTTP client")?;

        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid RPS endpoint: {path}"))
            .map_err(FetchError::Other)
    }

    async fn send<Q: Serialize + Sync>(
        &self,
        url: Url,
        body: &Q,
    ) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .request(Method::POST, url)
            .json(body)
            .send()
            .await
            .map_err(|e| FetchError::Other(anyhow!(e)))?;

        let status = response.status();
        if status.as_u16() > 399 {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response)
    }

    async fn fetch_json<Q, D>(&self, path: &str, body: &Q) -> Result<D, FetchError>
    where
        Q: Serialize + Sync,
        D: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        self.send(url, body)
            .await?
            .json::<D>()
            .await
            .map_err(|e| FetchError::Other(anyhow!(e).context("Invalid data from RPS")))
    }

    async fn post<Q: Serialize + Sync>(&self, path: &str, body: &Q) -> Result<(), FetchError> {
        let url = self.endpoint(path)?;
        self.send(url, body).await.map(|_| ())
    }
}

#[async_trait]
impl RpsClient for HttpRpsClient {
    #[instrument(skip(self, auth_ott))]
    async fn authenticate(&self, session_id: &str, auth_ott: &str) -> AuthOutcome {
        let request = AuthenticateRequest {
            auth_ott,
            logout_data: LogoutData {
                session_token: session_id,
                user_id: None,
            },
        };

        match self
            .fetch_json::<_, AuthenticateResponse>("authenticate", &request)
            .await
        {
            Ok(response) => AuthOutcome {
                user_id: response.user_id,
                message: response.message,
                status: response.status,
            },
            Err(FetchError::Status(code)) => {
                error!("RPS authenticate failed: Error code {code}");
                AuthOutcome::server_error(code)
            }
            Err(err) => {
                error!("RPS authenticate failed: {err}");
                AuthOutcome::server_error(500)
            }
        }
    }

    #[instrument(skip(self, result), fields(status = result.status))]
    async fn report_login_result(&self, result: LoginResult<'_>) -> Result<()> {
        // The RPS only waits for results of successful logins.
        if result.status != 200 {
            return Ok(());
        }

        let request = LoginResultRequest {
            auth_ott: result.auth_ott,
            status: result.status,
            message: result.message,
            logout_data: LogoutData {
                session_token: result.session_id,
                user_id: Some(result.user_id),
            },
        };
        self.post("loginResult", &request)
            .await
            .map_err(|e| anyhow!("RPS loginResult failed: {e}"))
    }

    #[instrument(skip(self, activate_key))]
    async fn activate_user(&self, identity: &str, activate_key: &str) -> Result<()> {
        let path = format!("user/{identity}");
        debug!("Activating identity at RPS");
        self.post(&path, &ActivateRequest { activate_key })
            .await
            .map_err(|e| anyhow!("RPS user activation failed: {e}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const OTT: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";

    async fn client_for(server: &MockServer) -> HttpRpsClient {
        let address = server.address();
        HttpRpsClient::new("http", &address.to_string(), Vec::new()).unwrap()
    }

    #[test]
    fn base_url_is_built_from_schema_and_host() {
        let client = HttpRpsClient::new("https", "rps.example.com:8011", Vec::new()).unwrap();
        assert_eq!(client.base_url().as_str(), "https://rps.example.com:8011/");
        assert!(HttpRpsClient::new("http", "bad host", Vec::new()).is_err());
    }

    #[test]
    fn fetch_errors_display() {
        assert_eq!(FetchError::Status(502).to_string(), "Error code 502");
        let err = FetchError::Other(anyhow!("connection refused").context("Request failed"));
        assert_eq!(err.to_string(), "Request failed: connection refused");
    }

    #[tokio::test]
    async fn authenticate_returns_rps_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .and(body_json(json!({
                "authOTT": OTT,
                "logoutData": {"sessionToken": "SID"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 200,
                "userId": "alice@example.com",
                "message": "OK"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server).await.authenticate("SID", OTT).await;
        assert_eq!(
            outcome,
            AuthOutcome {
                user_id: "alice@example.com".to_string(),
                message: "OK".to_string(),
                status: 200,
            }
        );
    }

    #[tokio::test]
    async fn authenticate_http_error_passes_status_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let outcome = client_for(&server).await.authenticate("SID", OTT).await;
        assert_eq!(outcome.status, 401);
        assert_eq!(outcome.message, "Server error");
        assert!(outcome.user_id.is_empty());
    }

    #[tokio::test]
    async fn authenticate_invalid_body_is_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let outcome = client_for(&server).await.authenticate("SID", OTT).await;
        assert_eq!(outcome.status, 500);
        assert_eq!(outcome.message, "Server error");
    }

    #[tokio::test]
    async fn login_result_is_sent_only_for_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/loginResult"))
            .and(body_json(json!({
                "authOTT": OTT,
                "status": 200,
                "message": "OK",
                "logoutData": {"sessionToken": "SID", "userId": "alice"}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let mut result = LoginResult {
            session_id: "SID",
            user_id: "alice",
            auth_ott: OTT,
            status: 200,
            message: "OK",
        };
        client.report_login_result(result).await.unwrap();

        result.status = 401;
        client.report_login_result(result).await.unwrap();
    }

    #[tokio::test]
    async fn activate_user_posts_activation_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user/7b22757365724944223a22666f6f227d"))
            .and(body_json(json!({"activateKey": "KEY"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .activate_user("7b22757365724944223a22666f6f227d", "KEY")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn activate_user_surfaces_rps_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .activate_user("abcd", "KEY")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Error code 500"));
    }
}
