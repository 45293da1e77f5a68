//! Shared helpers for the integration tests
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use serde_json::Value;
use sha2::{Digest, Sha512};
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;

use sitebridge::{
    content::{MemoryContentRepository, MemoryMediaStore, Role, SiteUser, StaticUserDirectory},
    create_router,
    identity::{IdentityStore, MemorySettings, SettingsStore},
    keys::{KeyProvider, StaticKeyProvider},
    sync::UpdateScope,
    AppState,
};

pub const NAMESPACE: &str = "sitebridge";
pub const SITE_URL: &str = "https://blog.test";

/// The automation service's signing key
pub fn service_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
}

/// A key the site has never been told about
pub fn stranger_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
}

pub fn public_pem(key: &RsaPrivateKey) -> String {
    key.to_public_key().to_public_key_pem(LineEnding::LF).unwrap()
}

/// Base64 RSA-SHA512 signature over the identifier text
pub fn sign(key: &RsaPrivateKey, identifier: &str) -> String {
    let digest = Sha512::digest(identifier.as_bytes());
    let signature = key.sign(Pkcs1v15Sign::new::<Sha512>(), &digest).unwrap();
    STANDARD.encode(signature)
}

pub fn path(suffix: &str) -> String {
    format!("/{NAMESPACE}/v1{suffix}")
}

pub struct TestApp {
    pub router: Router,
    pub settings: Arc<MemorySettings>,
    pub repo: Arc<MemoryContentRepository>,
    pub media: Arc<MemoryMediaStore>,
    pub identifier: String,
}

fn users() -> StaticUserDirectory {
    let user = |id: u64, login: &str, role: Role| SiteUser {
        id,
        login: login.into(),
        display_name: login.to_uppercase(),
        email: Some(format!("{login}@blog.test")),
        roles: vec![role],
    };

    StaticUserDirectory::new(vec![
        user(1, "admin", Role::Administrator),
        user(2, "reader", Role::Subscriber),
        user(3, "writer", Role::Author),
    ])
}

pub async fn spawn_app(scope: UpdateScope) -> TestApp {
    let keys = Arc::new(StaticKeyProvider::new(public_pem(service_key())));
    spawn_app_with_keys(scope, keys).await
}

pub async fn spawn_app_with_keys(scope: UpdateScope, keys: Arc<dyn KeyProvider>) -> TestApp {
    let settings = Arc::new(MemorySettings::new());
    let identity = IdentityStore::new(settings.clone(), NAMESPACE);
    let identifier = identity.ensure_identifier().await.unwrap();

    let repo = Arc::new(MemoryContentRepository::new(SITE_URL));
    let media = Arc::new(MemoryMediaStore::new(format!("{SITE_URL}/media")));

    let state = AppState::new(
        NAMESPACE,
        settings.clone() as Arc<dyn SettingsStore>,
        keys,
        repo.clone(),
        media.clone(),
        Arc::new(users()),
    )
    .with_update_scope(scope);

    TestApp {
        router: create_router(Arc::new(state)),
        settings,
        repo,
        media,
        identifier: identifier.as_str().to_string(),
    }
}

impl TestApp {
    pub fn signature(&self) -> String {
        sign(service_key(), &self.identifier)
    }

    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// Unsigned request with an optional JSON body
    pub async fn anonymous(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(json_request(method, uri, None, body)).await
    }

    /// Request signed with the service key
    pub async fn signed(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let signature = self.signature();
        self.call(json_request(method, uri, Some(&signature), body)).await
    }

    /// Signed multipart request
    pub async fn signed_multipart(&self, method: Method, uri: &str, form: Multipart) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Signature", self.signature())
            .header(CONTENT_TYPE, form.content_type())
            .body(Body::from(form.finish()))
            .unwrap();
        self.call(request).await
    }
}

pub fn json_request(
    method: Method,
    uri: &str,
    signature: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(signature) = signature {
        builder = builder.header("Signature", signature);
    }

    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Minimal multipart/form-data encoder
pub struct Multipart {
    boundary: &'static str,
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self {
            boundary: "sitebridge-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}
