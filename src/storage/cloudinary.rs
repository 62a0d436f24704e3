//! Cloudinary deletion gateway
//!
//! Uploaded images are delivered as
//! `https://res.cloudinary.com/{cloud}/image/upload/v{version}/{folder}/{name}.{ext}`.
//! The public id is recovered from the last path segment with its extension
//! stripped, prefixed with the configured upload folder.

use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{AssetGateway, DeleteOutcome};
use crate::types::{CuratorError, Result};

/// Connection settings for the Cloudinary admin API
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Admin API base (default: https://api.cloudinary.com)
    pub api_base: String,
    /// Host serving delivered images (default: res.cloudinary.com)
    pub delivery_host: String,
    /// Folder uploads are placed in, if any
    pub folder: Option<String>,
    /// Must match the account's API signature setting
    pub signature_algorithm: SignatureAlgorithm,
    pub request_timeout: Duration,
}

/// Digest used to sign API requests. Accounts sign with SHA-1 unless
/// switched to SHA-256 in their security settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(SignatureAlgorithm::Sha1),
            "sha256" => Ok(SignatureAlgorithm::Sha256),
            other => Err(format!("unknown signature algorithm '{}'", other)),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
        })
    }
}

impl CloudinaryConfig {
    pub fn new(cloud_name: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            api_base: "https://api.cloudinary.com".to_string(),
            delivery_host: "res.cloudinary.com".to_string(),
            folder: None,
            signature_algorithm: SignatureAlgorithm::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Deletes uploaded images through the signed `destroy` endpoint
pub struct CloudinaryGateway {
    config: CloudinaryConfig,
    http_client: reqwest::Client,
}

impl CloudinaryGateway {
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("curator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CuratorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Public id for a reference, or the reason it is not ours
    fn public_id_for(&self, reference: &str) -> std::result::Result<String, String> {
        let url = Url::parse(reference).map_err(|_| "not an absolute URL".to_string())?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("unsupported scheme '{}'", url.scheme()));
        }
        if url.host_str() != Some(self.config.delivery_host.as_str()) {
            return Err(format!(
                "host '{}' is not {}",
                url.host_str().unwrap_or(""),
                self.config.delivery_host
            ));
        }
        let first_segment = url.path_segments().and_then(|mut s| s.next());
        if first_segment != Some(self.config.cloud_name.as_str()) {
            return Err(format!("not in cloud '{}'", self.config.cloud_name));
        }

        let name = asset_id_from_reference(reference)
            .ok_or_else(|| "no file name in URL".to_string())?;

        Ok(match self.config.folder.as_deref().map(|f| f.trim_matches('/')) {
            Some(folder) if !folder.is_empty() => format!("{}/{}", folder, name),
            _ => name,
        })
    }

    fn destroy_url(&self) -> String {
        format!(
            "{}/v1_1/{}/image/destroy",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }
}

#[async_trait::async_trait]
impl AssetGateway for CloudinaryGateway {
    async fn delete(&self, reference: &str) -> Result<DeleteOutcome> {
        let public_id = match self.public_id_for(reference) {
            Ok(id) => id,
            Err(reason) => {
                warn!(reference = %reference, reason = %reason, "Skipping foreign image reference");
                return Ok(DeleteOutcome::Skipped(reason));
            }
        };

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [
            ("invalidate", "true"),
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
        ];
        let signature = sign(&signed, &self.config.api_secret, self.config.signature_algorithm);

        let mut form: Vec<(&str, &str)> = signed.to_vec();
        form.push(("api_key", self.config.api_key.as_str()));
        form.push(("signature", signature.as_str()));

        debug!(public_id = %public_id, "Destroying remote image");

        let response = self
            .http_client
            .post(self.destroy_url())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CuratorError::Gateway(format!(
                "HTTP {} destroying {}: {}",
                status, public_id, body
            )));
        }

        let body: DestroyResponse = response.json().await?;
        match body.result.as_str() {
            "ok" => Ok(DeleteOutcome::Deleted),
            "not found" => Ok(DeleteOutcome::NotFound),
            other => Err(CuratorError::Gateway(format!(
                "unexpected destroy result '{}' for {}",
                other, public_id
            ))),
        }
    }
}

/// Derive the asset name from a reference: last path segment, extension
/// stripped. Query strings and fragments are ignored.
pub fn asset_id_from_reference(reference: &str) -> Option<String> {
    let without_query = reference.split(['?', '#']).next().unwrap_or(reference);
    let last = without_query.trim_end_matches('/').rsplit('/').next()?;

    let stem = match last.rfind('.') {
        Some(0) | None => last,
        Some(idx) => &last[..idx],
    };

    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Cloudinary request signature: params sorted by key, joined as a query
/// string, secret appended, hex digest.
fn sign(params: &[(&str, &str)], secret: &str, algorithm: SignatureAlgorithm) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    match algorithm {
        SignatureAlgorithm::Sha1 => hex_digest::<Sha1>(&to_sign, secret),
        SignatureAlgorithm::Sha256 => hex_digest::<Sha256>(&to_sign, secret),
    }
}

fn hex_digest<D: Digest>(to_sign: &str, secret: &str) -> String {
    let mut hasher = D::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HERO: &str = "https://res.cloudinary.com/demo/image/upload/v1712/site/hero-banner.webp";

    fn gateway(api_base: &str) -> CloudinaryGateway {
        let mut config = CloudinaryConfig::new("demo", "key-123", "secret");
        config.api_base = api_base.to_string();
        config.folder = Some("site".to_string());
        CloudinaryGateway::new(config).unwrap()
    }

    #[test]
    fn test_asset_id_from_reference() {
        assert_eq!(asset_id_from_reference(HERO).as_deref(), Some("hero-banner"));
        assert_eq!(
            asset_id_from_reference("https://cdn/x/photo.min.jpg?w=200").as_deref(),
            Some("photo.min")
        );
        assert_eq!(asset_id_from_reference("logo").as_deref(), Some("logo"));
        assert_eq!(asset_id_from_reference("https://cdn/x/").as_deref(), Some("x"));
        assert!(asset_id_from_reference("").is_none());
    }

    #[test]
    fn test_public_id_uses_folder() {
        let gw = gateway("http://unused");
        assert_eq!(gw.public_id_for(HERO).unwrap(), "site/hero-banner");
    }

    #[test]
    fn test_foreign_references_rejected() {
        let gw = gateway("http://unused");
        assert!(gw.public_id_for("uploads/contact/cv.pdf").is_err());
        assert!(gw
            .public_id_for("https://images.example.com/demo/image/upload/a.png")
            .is_err());
        assert!(gw
            .public_id_for("https://res.cloudinary.com/other/image/upload/a.png")
            .is_err());
        assert!(gw.public_id_for("ftp://res.cloudinary.com/demo/a.png").is_err());
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = sign(&[("timestamp", "1"), ("public_id", "x")], "s", SignatureAlgorithm::Sha256);
        let b = sign(&[("public_id", "x"), ("timestamp", "1")], "s", SignatureAlgorithm::Sha256);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(
            a,
            sign(&[("public_id", "x"), ("timestamp", "1")], "other", SignatureAlgorithm::Sha256)
        );
    }

    #[test]
    fn test_signature_algorithms() {
        // Worked example from Cloudinary's authentication docs
        let params = [
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop"),
            ("public_id", "sample_image"),
            ("timestamp", "1315060510"),
        ];
        assert_eq!(
            sign(&params, "abcd", SignatureAlgorithm::Sha1),
            "bfd09f95f331f558cbd1320e67aa8d488770583e"
        );
        assert_eq!(sign(&params, "abcd", SignatureAlgorithm::Sha256).len(), 64);

        assert_eq!("SHA-256".parse::<SignatureAlgorithm>().unwrap(), SignatureAlgorithm::Sha256);
        assert_eq!("sha1".parse::<SignatureAlgorithm>().unwrap(), SignatureAlgorithm::Sha1);
        assert!("md5".parse::<SignatureAlgorithm>().is_err());
    }

    #[tokio::test]
    async fn test_foreign_reference_skips_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = gateway(&server.uri()).delete("/uploads/apply/cv.pdf").await.unwrap();
        assert!(matches!(outcome, DeleteOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_delete_twice_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1_1/demo/image/destroy"))
            .and(body_string_contains("public_id=site%2Fhero-banner"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1_1/demo/image/destroy"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": "not found" })),
            )
            .mount(&server)
            .await;

        let gw = gateway(&server.uri());
        assert_eq!(gw.delete(HERO).await.unwrap(), DeleteOutcome::Deleted);
        let second = gw.delete(HERO).await.unwrap();
        assert_eq!(second, DeleteOutcome::NotFound);
        assert!(second.is_success());
    }

    #[tokio::test]
    async fn test_signature_uses_configured_digest_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1_1/demo/image/destroy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
            .mount(&server)
            .await;

        gateway(&server.uri()).delete(HERO).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(!body.contains("signature_algorithm"));
        let signature = body
            .split('&')
            .find_map(|pair| pair.strip_prefix("signature="))
            .unwrap();
        assert_eq!(signature.len(), 40);
    }

    #[tokio::test]
    async fn test_server_error_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad signature"))
            .mount(&server)
            .await;

        let err = gateway(&server.uri()).delete(HERO).await.unwrap_err();
        assert!(matches!(err, CuratorError::Gateway(msg) if msg.contains("401")));
    }
}
