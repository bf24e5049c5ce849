//! Async HTTP client for the veriface enrollment API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use reqwest::{Client, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use veriface_core::{
  enrollment::{Credentials, EnrollmentRequest},
  identity::{Coordinates, IdentityView},
};

pub const DEFAULT_COOKIE_NAME: &str = "veriface_session";

/// Connection settings for the enrollment API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url:    String,
  pub cookie_name: String,
}

/// A logged-in identity and the token that proves it.
#[derive(Debug, Clone)]
pub struct Session {
  pub token: String,
  pub user:  IdentityView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignupPayload<'a> {
  name:               &'a str,
  dob:                &'a str,
  location:           &'a str,
  email:              &'a str,
  password:           &'a str,
  govt_image:         String,
  selfie_image:       String,
  blockchain_address: Option<&'a str>,
  coordinates:        Option<Coordinates>,
}

#[derive(Deserialize)]
struct AuthResponse {
  user: IdentityView,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct EnrollmentClient {
  client: Client,
  config: ApiConfig,
}

impl EnrollmentClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn cookie(&self, token: &str) -> String { format!("{}={token}", self.config.cookie_name) }

  /// The session token from a `Set-Cookie` header.
  fn session_token(&self, resp: &Response) -> Option<String> {
    let prefix = format!("{}=", self.config.cookie_name);
    resp
      .headers()
      .get_all(header::SET_COOKIE)
      .iter()
      .filter_map(|v| v.to_str().ok())
      .filter_map(|v| v.split(';').next()?.trim().strip_prefix(&prefix).map(str::to_owned))
      .find(|token| !token.is_empty())
  }

  async fn into_session(&self, resp: Response, what: &str) -> Result<Session> {
    let status = resp.status();
    if !status.is_success() {
      return Err(error_from(resp, what).await);
    }
    let token = self
      .session_token(&resp)
      .ok_or_else(|| anyhow!("{what}: response carried no session cookie"))?;
    let body: AuthResponse = resp.json().await.with_context(|| format!("deserialising {what}"))?;
    Ok(Session { token, user: body.user })
  }

  /// `POST /api/signup`
  pub async fn signup(&self, request: &EnrollmentRequest) -> Result<Session> {
    let payload = SignupPayload {
      name:               &request.profile.full_name,
      dob:                &request.profile.date_of_birth,
      location:           &request.profile.address,
      email:              &request.email,
      password:           &request.password,
      govt_image:         B64.encode(&request.document_image),
      selfie_image:       B64.encode(&request.selfie_image),
      blockchain_address: request.wallet_address.as_deref(),
      coordinates:        request.coordinates,
    };
    let resp = self
      .client
      .post(self.url("/signup"))
      .json(&payload)
      .send()
      .await
      .context("POST /signup failed")?;
    self.into_session(resp, "POST /signup").await
  }

  /// `POST /api/login`
  pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
    let resp = self
      .client
      .post(self.url("/login"))
      .json(credentials)
      .send()
      .await
      .context("POST /login failed")?;
    self.into_session(resp, "POST /login").await
  }

  /// `POST /api/logout`
  pub async fn logout(&self, token: &str) -> Result<()> {
    let resp = self
      .client
      .post(self.url("/logout"))
      .header(header::COOKIE, self.cookie(token))
      .send()
      .await
      .context("POST /logout failed")?;
    if !resp.status().is_success() {
      return Err(error_from(resp, "POST /logout").await);
    }
    Ok(())
  }

  /// `GET /api/check-session`. `None` when the token is not (or no longer)
  /// valid.
  pub async fn whoami(&self, token: &str) -> Result<Option<IdentityView>> {
    let resp = self
      .client
      .get(self.url("/check-session"))
      .header(header::COOKIE, self.cookie(token))
      .send()
      .await
      .context("GET /check-session failed")?;
    match resp.status() {
      StatusCode::UNAUTHORIZED => Ok(None),
      s if s.is_success() => Ok(Some(resp.json().await.context("deserialising identity")?)),
      _ => Err(error_from(resp, "GET /check-session").await),
    }
  }
}

async fn error_from(resp: Response, what: &str) -> anyhow::Error {
  let status = resp.status();
  match resp.json::<ErrorBody>().await {
    Ok(body) => anyhow!("{what} → {status}: {}", body.error),
    Err(_) => anyhow!("{what} → {status}"),
  }
}

#[cfg(test)]
mod tests {
  use mockito::{Matcher, Server};
  use serde_json::json;
  use veriface_core::identity::IdentityProfile;

  use super::*;

  fn client(server: &Server) -> EnrollmentClient {
    EnrollmentClient::new(ApiConfig {
      base_url:    server.url(),
      cookie_name: DEFAULT_COOKIE_NAME.to_owned(),
    })
    .unwrap()
  }

  fn user_json() -> serde_json::Value {
    json!({
      "id": "7f1c1a5e-3b0e-4c36-9d1a-2b4b5f0e8a11",
      "full_name": "Asha Rao",
      "date_of_birth": "1990-06-15",
      "address": "Pune",
      "email": "asha@example.com",
      "wallet_address": null,
      "created_at": "2024-01-01T00:00:00Z",
      "coordinates": null,
    })
  }

  #[tokio::test]
  async fn signup_sends_camel_case_fields_and_returns_token() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/api/signup")
      .match_body(Matcher::PartialJson(json!({
        "name": "Asha Rao",
        "dob": "15/06/1990",
        "location": "Pune",
        "email": "asha@example.com",
        "govtImage": "AQID",
        "selfieImage": "BAUG",
      })))
      .with_status(201)
      .with_header("set-cookie", "veriface_session=tok123; Path=/; HttpOnly")
      .with_body(json!({ "message": "registered", "user": user_json() }).to_string())
      .create_async()
      .await;

    let request = EnrollmentRequest {
      profile: IdentityProfile {
        full_name:     "Asha Rao".to_owned(),
        date_of_birth: "15/06/1990".to_owned(),
        address:       "Pune".to_owned(),
      },
      email: "asha@example.com".to_owned(),
      password: "pw".to_owned(),
      document_image: vec![1, 2, 3],
      selfie_image: vec![4, 5, 6],
      ..Default::default()
    };
    let session = client(&server).signup(&request).await.unwrap();
    assert_eq!(session.token, "tok123");
    assert_eq!(session.user.full_name, "Asha Rao");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn login_failure_surfaces_server_message() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/api/login")
      .with_status(401)
      .with_body(r#"{"error":"invalid credentials"}"#)
      .create_async()
      .await;

    let creds = Credentials { email: "a@example.com".to_owned(), password: "x".to_owned() };
    let err = client(&server).login(&creds).await.unwrap_err();
    assert!(err.to_string().contains("invalid credentials"), "{err}");
  }

  #[tokio::test]
  async fn whoami_sends_cookie_and_maps_401_to_none() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/api/check-session")
      .match_header("cookie", "veriface_session=good")
      .with_status(200)
      .with_body(user_json().to_string())
      .create_async()
      .await;
    server
      .mock("GET", "/api/check-session")
      .match_header("cookie", "veriface_session=stale")
      .with_status(401)
      .with_body(r#"{"error":"not authenticated"}"#)
      .create_async()
      .await;

    let client = client(&server);
    assert_eq!(client.whoami("good").await.unwrap().unwrap().email, "asha@example.com");
    assert!(client.whoami("stale").await.unwrap().is_none());
  }
}
