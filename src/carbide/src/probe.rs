//! Registry existence checks for `image:tag` references.
//!
//! Follows the OCI Distribution authentication flow:
//! 1. `GET /v2/<name>/manifests/<tag>` with the v2 manifest Accept header
//! 2. On `401` with a `Bearer` challenge, request a token from the realm
//! 3. Retry the manifest request once with the bearer token
//!
//! The probe only filters candidates, so every failure reads as "does not exist".

use crate::config::{
    RegistryAuth, DEFAULT_NAMESPACE, DEFAULT_REGISTRY_NAME, DEFAULT_REGISTRY_URL,
    MANIFEST_V2_MEDIA_TYPE,
};
use crate::error::{CarbideError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;

#[async_trait]
pub trait ImageProbe: Send + Sync {
    /// Whether `reference` (`image[:tag]`) exists in its registry.
    async fn exists(&self, reference: &str) -> bool;
}

/// Image reference split into registry host, repository path and tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    /// Parse `[registry/]name[:tag|@digest]`, defaulting the tag to `latest`.
    ///
    /// The first path segment is a registry host only when it contains `.`
    /// or `:` or is `localhost`; otherwise the image lives on Docker Hub and
    /// single-segment names are qualified under `library/`.
    pub fn parse(reference: &str) -> Self {
        let (name, tag) = if let Some((name, digest)) = reference.split_once('@') {
            (name, digest.to_string())
        } else {
            let last_slash = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
            match reference[last_slash..].rfind(':') {
                Some(colon) => (
                    &reference[..last_slash + colon],
                    reference[last_slash + colon + 1..].to_string(),
                ),
                None => (reference, "latest".to_string()),
            }
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest)) if is_registry_host(first) => (first.to_string(), rest.to_string()),
            _ => (DEFAULT_REGISTRY_NAME.to_string(), name.to_string()),
        };

        let repository = if registry == DEFAULT_REGISTRY_NAME && !repository.contains('/') {
            format!("{}/{}", DEFAULT_NAMESPACE, repository)
        } else {
            repository
        };

        Self {
            registry,
            repository,
            tag,
        }
    }

    /// Base URL of the registry API. Plain HTTP only for `localhost`.
    pub fn registry_url(&self) -> String {
        if self.registry == DEFAULT_REGISTRY_NAME {
            DEFAULT_REGISTRY_URL.to_string()
        } else if self.registry == "localhost" || self.registry.starts_with("localhost:") {
            format!("http://{}", self.registry)
        } else {
            format!("https://{}", self.registry)
        }
    }

    pub fn manifest_url(&self) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.registry_url(),
            self.repository,
            self.tag
        )
    }
}

fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl BearerChallenge {
    /// Parse `Bearer realm="...",service="...",scope="..."`.
    ///
    /// Quoted values may contain commas (`scope="repository:a:pull,push"`).
    /// Returns `None` for other schemes or when `realm` is missing.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut values: HashMap<String, String> = HashMap::new();
        let mut rest = params.trim();
        while !rest.is_empty() {
            let (key, after_key) = rest.split_once('=')?;
            let key = key.trim().trim_start_matches(',').trim().to_ascii_lowercase();
            let after_key = after_key.trim_start();

            let (value, remainder) = if let Some(quoted) = after_key.strip_prefix('"') {
                let end = quoted.find('"')?;
                (&quoted[..end], &quoted[end + 1..])
            } else {
                match after_key.find(',') {
                    Some(end) => (&after_key[..end], &after_key[end..]),
                    None => (after_key, ""),
                }
            };

            values.insert(key, value.to_string());
            rest = remainder.trim_start().trim_start_matches(',').trim_start();
        }

        Some(Self {
            realm: values.remove("realm")?,
            service: values.remove("service"),
            scope: values.remove("scope"),
        })
    }
}

/// Registry probe over HTTP(S)
#[derive(Clone)]
pub struct RegistryProbe {
    client: Client,
    auth: HashMap<String, RegistryAuth>,
}

impl RegistryProbe {
    pub fn new(client: Client, auth: HashMap<String, RegistryAuth>) -> Self {
        Self { client, auth }
    }

    /// Existence check that surfaces transport errors.
    pub async fn check(&self, reference: &ImageReference) -> Result<bool> {
        let url = reference.manifest_url();
        let credentials = self.auth.get(&reference.registry);

        let mut request = self.client.get(&url).header(ACCEPT, MANIFEST_V2_MEDIA_TYPE);
        if let Some(auth) = credentials {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }
        let response = request.send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response.status() == StatusCode::OK);
        }

        let Some(challenge) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(BearerChallenge::parse)
        else {
            tracing::debug!(url = %url, "401 without a usable bearer challenge");
            return Ok(false);
        };

        let token = self.fetch_token(&challenge, credentials).await?;
        let retry = self
            .client
            .get(&url)
            .header(ACCEPT, MANIFEST_V2_MEDIA_TYPE)
            .bearer_auth(token)
            .send()
            .await?;

        Ok(retry.status() == StatusCode::OK)
    }

    async fn fetch_token(
        &self,
        challenge: &BearerChallenge,
        credentials: Option<&RegistryAuth>,
    ) -> Result<String> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(service) = &challenge.service {
            query.push(("service", service.as_str()));
        }
        if let Some(scope) = &challenge.scope {
            query.push(("scope", scope.as_str()));
        }

        let mut request = self.client.get(&challenge.realm).query(&query);
        if let Some(auth) = credentials {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let json: serde_json::Value = request.send().await?.error_for_status()?.json().await?;

        // Docker Hub answers with "token", some registries with "access_token"
        json.get("token")
            .and_then(|t| t.as_str())
            .or_else(|| json.get("access_token").and_then(|t| t.as_str()))
            .map(str::to_string)
            .ok_or_else(|| CarbideError::Registry("Token response has no token field".to_string()))
    }
}

#[async_trait]
impl ImageProbe for RegistryProbe {
    async fn exists(&self, reference: &str) -> bool {
        let parsed = ImageReference::parse(reference);
        match self.check(&parsed).await {
            Ok(found) => {
                tracing::debug!(reference = %reference, found, "Registry probe");
                found
            }
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "Registry probe failed");
                false
            }
        }
    }
}
