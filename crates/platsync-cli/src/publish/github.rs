//! GitHub-backed release store
//!
//! Artifacts become assets of one release (looked up by tag), the manifest is
//! a file on a branch updated through the contents API. The blob `sha` of the
//! file is the revision token, which GitHub itself checks on update.

use super::{AssetRef, ReleaseStore, RemoteFile, RevisionToken};
use crate::errors::StoreError;
use crate::logger;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use platsync_config::ReleaseConfig;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct Release {
    id: u64,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadedAsset {
    name: String,
    browser_download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsFile {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct ContentsUpdate<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ContentsUpdated {
    content: ContentsRef,
}

#[derive(Debug, Deserialize)]
struct ContentsRef {
    sha: String,
}

/// Release store talking to the GitHub REST API
///
/// Reads work without a token on public repositories; uploads and commits
/// fail with [`StoreError::Credentials`] until one is configured.
pub struct GithubReleaseStore {
    client: Client,
    token: Option<String>,
    token_env: String,
    api_url: String,
    repository: String,
    tag: String,
    branch: String,
    release: Option<Release>,
}

impl GithubReleaseStore {
    pub fn new(config: &ReleaseConfig, token: Option<String>) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("platsync/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        Ok(GithubReleaseStore {
            client,
            token: token.filter(|t| !t.trim().is_empty()),
            token_env: config.token_env.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repository: config.repository.clone(),
            tag: config.tag.clone(),
            branch: config.branch.clone(),
            release: None,
        })
    }

    /// Token from `config.token_env`, if set
    pub fn from_config(config: &ReleaseConfig) -> Result<Self, StoreError> {
        Self::new(config, config.token().ok())
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn require_auth(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        match &self.token {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(StoreError::Credentials(format!(
                "{} is not set, cannot write to {}",
                self.token_env, self.repository
            ))),
        }
    }

    fn repo_url(&self, tail: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.repository, tail)
    }

    fn release(&mut self) -> Result<&Release, StoreError> {
        if self.release.is_none() {
            let url = self.repo_url(&format!("releases/tags/{}", self.tag));
            let response = self.with_auth(self.client.get(&url)).send()?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(StoreError::ReleaseNotFound(self.tag.clone()));
            }
            let release: Release = checked(response)?.json()?;
            logger::debug(&format!("Using release '{}' (id {})", self.tag, release.id));
            self.release = Some(release);
        }
        self.release
            .as_ref()
            .ok_or_else(|| StoreError::ReleaseNotFound(self.tag.clone()))
    }

    fn contents_url(&self, path: &str) -> String {
        self.repo_url(&format!("contents/{}", path.trim_start_matches('/')))
    }
}

impl ReleaseStore for GithubReleaseStore {
    fn upload_asset(
        &mut self,
        bytes: Vec<u8>,
        file_name: &str,
        mime: &str,
    ) -> Result<AssetRef, StoreError> {
        let upload_url = upload_base(&self.release()?.upload_url);
        let mut url = parse_url(&upload_url)?;
        url.query_pairs_mut().append_pair("name", file_name);

        let response = self
            .require_auth(self.client.post(url))?
            .header(CONTENT_TYPE, mime)
            .body(bytes)
            .send()?;
        let asset: UploadedAsset = checked(response)?.json()?;
        Ok(AssetRef {
            name: asset.name,
            url: asset.browser_download_url,
        })
    }

    fn get_file_revision(&mut self, path: &str) -> Result<Option<RemoteFile>, StoreError> {
        let mut url = parse_url(&self.contents_url(path))?;
        url.query_pairs_mut().append_pair("ref", &self.branch);
        let response = self.with_auth(self.client.get(url)).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let file: ContentsFile = checked(response)?.json()?;
        debug!(path, sha = %file.sha, "read remote file");
        if !file.encoding.is_empty() && file.encoding != "base64" {
            return Err(StoreError::InvalidResponse(format!(
                "unsupported content encoding '{}' for {}",
                file.encoding, path
            )));
        }
        let content = decode_content(&file.content)?;
        Ok(Some(RemoteFile {
            content,
            revision: RevisionToken(file.sha),
        }))
    }

    fn update_file(
        &mut self,
        path: &str,
        bytes: &[u8],
        expected: Option<&RevisionToken>,
        message: &str,
    ) -> Result<RevisionToken, StoreError> {
        let body = ContentsUpdate {
            message,
            content: STANDARD.encode(bytes),
            branch: &self.branch,
            sha: expected.map(|r| r.0.as_str()),
        };
        let response = self
            .require_auth(self.client.put(self.contents_url(path)))?
            .json(&body)
            .send()?;

        let status = response.status();
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            let reason = response.text().unwrap_or_default();
            // 422 is also used for malformed requests; only a sha complaint is a race
            if status == StatusCode::CONFLICT || reason.contains("sha") {
                return Err(StoreError::Conflict {
                    path: path.to_string(),
                    expected: expected.map(|r| r.0.clone()),
                    found: None,
                });
            }
            return Err(StoreError::Rejected {
                status: Some(status.as_u16()),
                reason,
            });
        }

        let updated: ContentsUpdated = checked(response)?.json()?;
        Ok(RevisionToken(updated.content.sha))
    }
}

fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let reason = response.text().unwrap_or_default();
    debug!(status = %status, body = %reason, "GitHub API request rejected");
    Err(StoreError::Rejected {
        status: Some(status.as_u16()),
        reason: if reason.is_empty() {
            status.to_string()
        } else {
            reason
        },
    })
}

fn parse_url(raw: &str) -> Result<Url, StoreError> {
    Url::parse(raw).map_err(|e| StoreError::InvalidResponse(format!("bad URL '{}': {}", raw, e)))
}

/// `upload_url` comes as a URI template, e.g. `.../assets{?name,label}`
fn upload_base(template: &str) -> String {
    match template.find('{') {
        Some(idx) => template[..idx].to_string(),
        None => template.to_string(),
    }
}

/// The contents API wraps base64 at 60 columns
fn decode_content(content: &str) -> Result<Vec<u8>, StoreError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| StoreError::InvalidResponse(format!("content is not valid base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_base_strips_template() {
        assert_eq!(
            upload_base("https://uploads.github.com/repos/o/r/releases/1/assets{?name,label}"),
            "https://uploads.github.com/repos/o/r/releases/1/assets"
        );
        assert_eq!(upload_base("https://x/assets"), "https://x/assets");
    }

    #[test]
    fn test_decode_wrapped_content() {
        let encoded = "WwogICAgewogICAg\nICAgICJpZCI6ICJ4\nIgogICAgfQpdCg==\n";
        let decoded = decode_content(encoded);
        assert!(decoded.is_ok_and(|bytes| bytes.starts_with(b"[\n    {")));
    }

    #[test]
    fn test_update_body_omits_missing_sha() {
        let body = ContentsUpdate {
            message: "[CI] Update platforms.json",
            content: STANDARD.encode(b"[]"),
            branch: "master",
            sha: None,
        };
        let Ok(json) = serde_json::to_value(&body) else {
            return;
        };
        assert!(json.get("sha").is_none());
        assert_eq!(json["content"], "W10=");
        assert_eq!(json["branch"], "master");
    }

    #[test]
    fn test_writes_need_a_token() {
        let config = ReleaseConfig {
            // Unroutable, the request must fail before any connection
            api_url: "http://127.0.0.1:9".to_string(),
            ..ReleaseConfig::default()
        };
        let Ok(mut store) = GithubReleaseStore::new(&config, Some("  ".to_string())) else {
            return;
        };
        assert!(!store.has_token());
        let result = store.update_file("platforms.json", b"[]", None, "update");
        assert!(matches!(result, Err(StoreError::Credentials(msg)) if msg.contains("GITHUB_TOKEN")));
    }
}
