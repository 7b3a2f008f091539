use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::classroom::dto::TokenResponse;
use crate::error::AppError;

const CLASSROOM_SCOPES: &str = "https://www.googleapis.com/auth/classroom.courses.readonly \
https://www.googleapis.com/auth/classroom.rosters.readonly \
https://www.googleapis.com/auth/classroom.coursework.students.readonly \
https://www.googleapis.com/auth/classroom.student-submissions.students.readonly";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Parsed service-account key file (the JSON Google hands out).
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    scope: &'a str,
    iat: i64,
    exp: i64,
}

/// Domain-wide-delegation credential. This is the only allowed path to the
/// Classroom API: anything other than a service-account key is rejected up
/// front.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
}

impl ServiceAccountAuth {
    pub fn from_key_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Config(format!(
                "failed to read service account key {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("malformed service account key: {e}")))?;
        Self::from_key(key)
    }

    pub fn from_key(key: ServiceAccountKey) -> Result<Self, AppError> {
        if key.key_type != "service_account" {
            return Err(AppError::Credential(format!(
                "expected a service_account credential, got '{}'",
                key.key_type
            )));
        }
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AppError::Credential(format!("invalid private key material: {e}")))?;
        Ok(Self { key, encoding_key })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Signed JWT assertion impersonating `subject`.
    fn assertion(&self, subject: &str) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            sub: subject,
            aud: &self.key.token_uri,
            scope: CLASSROOM_SCOPES,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Credential(format!("failed to sign assertion: {e}")))
    }

    /// Exchange a signed assertion for an access token scoped to `subject`.
    pub async fn fetch_access_token(
        &self,
        http: &Client,
        subject: &str,
    ) -> Result<TokenResponse, AppError> {
        let assertion = self.assertion(subject)?;
        let response = http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Credential(format!(
                "token exchange failed for {subject}: {status} {body}"
            )));
        }

        Ok(response.json::<TokenResponse>().await?)
    }
}
