use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::{MediaStore, MediaStoreError};

const STORAGE_API: &str = "https://storage.googleapis.com/storage/v1/b";
const UPLOAD_API: &str = "https://storage.googleapis.com/upload/storage/v1/b";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Google Cloud Storage media backend.
///
/// Objects live under `upload/` in the bucket and are expected to be
/// publicly readable through `storage.googleapis.com`.
pub struct GcsStore {
    bucket: String,
    client: Client,
    access_token: tokio::sync::RwLock<String>,
    credentials_file: Option<String>,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GcsStore {
    pub async fn new(bucket: &str, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let store = Self {
            bucket: bucket.to_string(),
            client: Client::builder().build()?,
            access_token: tokio::sync::RwLock::new(String::new()),
            credentials_file: credentials_file.map(|s| s.to_string()),
        };

        store.refresh_token().await?;
        Ok(store)
    }

    /// Fetch a fresh access token. Tokens last an hour.
    pub async fn refresh_token(&self) -> Result<(), anyhow::Error> {
        let token = match self.credentials_file {
            Some(ref path) => self.token_from_service_account(path).await?,
            None => self.token_from_metadata_server().await?,
        };

        *self.access_token.write().await = token;
        Ok(())
    }

    async fn token_from_service_account(&self, path: &str) -> Result<String, anyhow::Error> {
        let key: ServiceAccountKey =
            serde_json::from_str(&tokio::fs::read_to_string(path).await?)?;

        let now = chrono::Utc::now().timestamp();
        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let claims = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        }))?);
        let unsigned = format!("{header}.{claims}");
        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let assertion = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    async fn token_from_metadata_server(&self) -> Result<String, anyhow::Error> {
        let resp: TokenResponse = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    fn object_name(key: &str) -> String {
        format!("upload%2F{key}")
    }

    fn object_url(&self, key: &str) -> String {
        format!("{STORAGE_API}/{}/o/{}", self.bucket, Self::object_name(key))
    }

    async fn token(&self) -> String {
        self.access_token.read().await.clone()
    }
}

/// Turn a non-success response into a backend error, keeping the body for logs.
async fn check(resp: Response, action: &str) -> Result<Response, MediaStoreError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(MediaStoreError::Backend(format!(
        "GCS {action} failed ({status}): {body}"
    )))
}

fn backend(e: reqwest::Error) -> MediaStoreError {
    MediaStoreError::Backend(e.to_string())
}

#[async_trait]
impl MediaStore for GcsStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), MediaStoreError> {
        let content_type = mime_guess::from_path(key)
            .first_or_octet_stream()
            .to_string();
        let url = format!(
            "{UPLOAD_API}/{}/o?uploadType=media&name=upload/{key}",
            self.bucket
        );

        let resp = self
            .client
            .post(url)
            .bearer_auth(self.token().await)
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await
            .map_err(backend)?;

        check(resp, "upload").await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, MediaStoreError> {
        let resp = self
            .client
            .get(format!("{}?alt=media", self.object_url(key)))
            .bearer_auth(self.token().await)
            .send()
            .await
            .map_err(backend)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(MediaStoreError::NotFound(key.to_string()));
        }

        check(resp, "download").await?.bytes().await.map_err(backend)
    }

    async fn delete(&self, key: &str) -> Result<(), MediaStoreError> {
        let resp = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(self.token().await)
            .send()
            .await
            .map_err(backend)?;

        // Already gone counts as deleted
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(resp, "delete").await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, MediaStoreError> {
        let resp = self
            .client
            .get(self.object_url(key))
            .bearer_auth(self.token().await)
            .send()
            .await
            .map_err(backend)?;

        Ok(resp.status().is_success())
    }

    fn locator(&self, key: &str) -> String {
        format!("https://storage.googleapis.com/{}/upload/{key}", self.bucket)
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    use base64::Engine;

    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::engine::general_purpose::STANDARD.decode(der_b64.trim())?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}
