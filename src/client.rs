use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::catalog::{ObjectDocument, UploadOutcome};
use crate::queue::UploadQueue;
use crate::search::SearchHit;

#[derive(Deserialize)]
struct Documents {
    images: Vec<ObjectDocument>,
}

#[derive(Deserialize)]
struct SearchResults {
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct Message {
    message: String,
}

/// Client of the meshdex HTTP API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).with_context(|| format!("invalid API URL {base_url:?}"))?;
        ensure!(!base_url.cannot_be_a_base(), "invalid API URL {base_url}");
        Ok(Self { client: Client::new(), base_url })
    }

    /// Appends path segments to the base URL, each one percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Submits every queued model in one request
    pub async fn upload(&self, queue: &UploadQueue) -> Result<UploadOutcome> {
        let form = queue.to_form().await?;
        let response = self.client.post(self.url(&["upload"])).multipart(form).send().await?;
        json(response).await
    }

    pub async fn search(&self, path: &Path, top_n: Option<usize>) -> Result<Vec<SearchHit>> {
        let data =
            tokio::fs::read(path).await.with_context(|| format!("failed to read {}", path.display()))?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let mut form = Form::new().part("file", Part::bytes(data).file_name(name));
        if let Some(top_n) = top_n {
            form = form.text("top_n", top_n.to_string());
        }
        let response = self.client.post(self.url(&["search"])).multipart(form).send().await?;
        Ok(json::<SearchResults>(response).await?.results)
    }

    /// All documents, an empty catalogue yields an empty list
    pub async fn documents(&self) -> Result<Vec<ObjectDocument>> {
        let response = self.client.get(self.url(&["images"])).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(vec![]);
        }
        Ok(json::<Documents>(response).await?.images)
    }

    pub async fn documents_by_category(&self, category: &str) -> Result<Vec<ObjectDocument>> {
        let response = self.client.get(self.url(&["images", "category", category])).send().await?;
        Ok(json::<Documents>(response).await?.images)
    }

    pub async fn download(&self, filename: &str) -> Result<Vec<u8>> {
        let response = self.client.get(self.url(&["download", filename])).send().await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }

    pub async fn delete(&self, filename: &str) -> Result<String> {
        let response = self.client.delete(self.url(&["delete", filename])).send().await?;
        Ok(json::<Message>(response).await?.message)
    }

    pub async fn delete_all(&self) -> Result<String> {
        let response = self.client.delete(self.url(&["delete"])).send().await?;
        Ok(json::<Message>(response).await?.message)
    }
}

/// Turns an error status into an error carrying the server message
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Message>(&body).map(|m| m.message).unwrap_or(body);
    bail!("server returned {status}: {message}")
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check(response).await?;
    response.json().await.context("invalid server response")
}
