//! GitLab item bank client.
//!
//! The item bank stores one repository per content unit, named after the
//! unit's canonical id. Uses the GitLab v4 REST API with a personal
//! access token in the `PRIVATE-TOKEN` header.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{ItemBank, ItemBankError, TreeEntry};

const API_PATH: &str = "/api/v4";

/// GitLab caps repository tree pages at 100 entries.
const FILES_PER_PAGE: u32 = 100;

/// GitLab REST client.
pub struct GitLabBank {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    id: String,
    path: String,
}

impl GitLabBank {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            access_token: access_token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, tail: &str) -> String {
        format!("{}{}/{}", self.base_url, API_PATH, tail)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ItemBankError> {
        let response = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.access_token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ItemBankError::NotFound(url.to_string()));
        }
        Ok(response.error_for_status()?)
    }

    fn header_u32(response: &reqwest::Response, name: &str) -> Option<u32> {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }
}

#[async_trait]
impl ItemBank for GitLabBank {
    async fn project_id(&self, namespace: &str, name: &str) -> Result<String, ItemBankError> {
        // Path-style project lookup wants the slash encoded.
        let encoded = format!("{}%2F{}", namespace, name);
        let url = self.api_url(&format!("projects/{}", encoded));
        let info: ProjectInfo = self.get(&url).await?.json().await?;
        Ok(info.id.to_string())
    }

    async fn list_tree(&self, project_id: &str) -> Result<Vec<TreeEntry>, ItemBankError> {
        let mut entries = Vec::new();
        let mut expected_total: Option<u32> = None;

        // The tree API is paginated; pages are numbered from 1.
        for page in 1u32.. {
            let url = self.api_url(&format!(
                "projects/{}/repository/tree?recursive=true&page={}&per_page={}",
                project_id, page, FILES_PER_PAGE
            ));
            let response = self.get(&url).await?;

            if expected_total.is_none() {
                expected_total = Self::header_u32(&response, "x-total");
            }
            let total_pages = Self::header_u32(&response, "x-total-pages").unwrap_or(1);
            let page_returned = Self::header_u32(&response, "x-page").unwrap_or(page);
            if page_returned != page {
                return Err(ItemBankError::Protocol(format!(
                    "item bank returned page {} but page {} was requested",
                    page_returned, page
                )));
            }

            let items: Vec<TreeItem> = response.json().await?;
            entries.extend(
                items
                    .into_iter()
                    .map(|item| TreeEntry::new(item.path, item.id)),
            );

            if page >= total_pages {
                break;
            }
        }

        if let Some(expected) = expected_total {
            if entries.len() != expected as usize {
                return Err(ItemBankError::Protocol(format!(
                    "expected {} files in listing but received {}",
                    expected,
                    entries.len()
                )));
            }
        }

        Ok(entries)
    }

    async fn read_blob(&self, project_id: &str, blob_id: &str) -> Result<Vec<u8>, ItemBankError> {
        let url = self.api_url(&format!(
            "projects/{}/repository/blobs/{}/raw",
            project_id, blob_id
        ));
        let bytes = self.get(&url).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_without_double_slash() {
        let bank = GitLabBank::new("https://itembank.example.org/", "tok");
        assert_eq!(
            bank.api_url("projects/42/repository/tree"),
            "https://itembank.example.org/api/v4/projects/42/repository/tree"
        );
    }
}
