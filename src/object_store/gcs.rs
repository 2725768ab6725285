use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tokio_util::io::{ReaderStream, StreamReader};

use super::{BodyReader, ByteRange, ObjectBody, ObjectStore, ObjectStoreError};

/// Google Cloud Storage object store backend.
///
/// Uploads stream straight through to the JSON API; ranged downloads use the
/// Range header and recover the full object size from Content-Range.
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
    pub async fn new(
        bucket: &str,
        credentials_file: Option<&str>,
    ) -> Result<Self, ObjectStoreError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        let store = Self {
            bucket: bucket.to_string(),
            client,
            access_token: tokio::sync::RwLock::new(String::new()),
            credentials_file: credentials_file.map(|s| s.to_string()),
        };

        store
            .refresh_token()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("GCS auth failed: {e}")))?;
        Ok(store)
    }

    async fn refresh_token(&self) -> Result<(), anyhow::Error> {
        let token = if let Some(ref creds_path) = self.credentials_file {
            self.token_from_service_account(creds_path).await?
        } else {
            self.token_from_metadata_server().await?
        };

        let mut lock = self.access_token.write().await;
        *lock = token;
        Ok(())
    }

    async fn token_from_service_account(&self, path: &str) -> Result<String, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;

        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        // Build JWT (header.claims.signature)
        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    async fn token_from_metadata_server(&self) -> Result<String, anyhow::Error> {
        let resp: TokenResponse = self
            .client
            .get("http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token")
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    fn upload_url(&self, key: &str) -> String {
        format!(
            "https://storage.googleapis.com/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.bucket, key
        )
    }

    fn media_url(&self, key: &str) -> String {
        format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o/{}?alt=media",
            self.bucket, key
        )
    }

    /// Metadata resource URL; also the DELETE endpoint.
    fn object_url(&self, key: &str) -> String {
        format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o/{}",
            self.bucket, key
        )
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, body: BodyReader) -> Result<(), ObjectStoreError> {
        let token = self.access_token.read().await.clone();

        let resp = self
            .client
            .post(self.upload_url(key))
            .bearer_auth(&token)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(ReaderStream::new(body)))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS upload failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<ObjectBody, ObjectStoreError> {
        let token = self.access_token.read().await.clone();

        let mut request = self.client.get(self.media_url(key)).bearer_auth(&token);
        if let Some(window) = range {
            request = request.header(
                header::RANGE,
                format!("bytes={}-{}", window.start, window.end),
            );
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => {
                return Err(ObjectStoreError::NotFound(key.to_string()));
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(ObjectStoreError::RangeNotSatisfiable(format!(
                    "requested window starts beyond '{key}'"
                )));
            }
            status if !status.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(ObjectStoreError::Backend(format!(
                    "GCS download failed ({status}): {body}"
                )));
            }
            _ => {}
        }

        // A partial response reports the full size in Content-Range;
        // a full response reports it in Content-Length.
        let total_size = if resp.status() == StatusCode::PARTIAL_CONTENT {
            content_range_total(resp.headers().get(header::CONTENT_RANGE))?
        } else {
            resp.content_length().ok_or_else(|| {
                ObjectStoreError::Backend("GCS response missing content length".to_string())
            })?
        };

        let stream: Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>> = Box::pin(
            resp.bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        Ok(ObjectBody {
            reader: Box::new(StreamReader::new(stream)),
            total_size,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let token = self.access_token.read().await.clone();

        let resp = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        // 404 is fine -- object already gone
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS delete failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let token = self.access_token.read().await.clone();

        let resp = self
            .client
            .get(self.object_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        Ok(resp.status().is_success())
    }
}

/// Extract the total object size from a `Content-Range: bytes a-b/total` value.
fn content_range_total(
    value: Option<&header::HeaderValue>,
) -> Result<u64, ObjectStoreError> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('/').next())
        .and_then(|total| total.parse::<u64>().ok())
        .ok_or_else(|| {
            ObjectStoreError::Backend("GCS partial response missing Content-Range".to_string())
        })
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    // Strip PEM headers and decode base64
    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &der_b64)?;

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
