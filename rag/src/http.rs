use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_str;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} failed: {status} {body}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("{method} {url} decode failed: {message} | {body}")]
    Decode {
        method: &'static str,
        url: String,
        message: String,
        body: String,
    },
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Builds the pooled client shared by every backend adapter.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

pub async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, HttpError> {
    send("GET", url, client.get(url)).await
}

pub async fn post_json<T: DeserializeOwned, B: Serialize>(
    client: &Client,
    url: &str,
    body: &B,
) -> Result<T, HttpError> {
    let req = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .json(body);
    send("POST", url, req).await
}

pub async fn put_json<T: DeserializeOwned, B: Serialize>(
    client: &Client,
    url: &str,
    body: &B,
) -> Result<T, HttpError> {
    let req = client
        .put(url)
        .header(CONTENT_TYPE, "application/json")
        .json(body);
    send("PUT", url, req).await
}

async fn send<T: DeserializeOwned>(
    method: &'static str,
    url: &str,
    req: RequestBuilder,
) -> Result<T, HttpError> {
    let resp = req.send().await.map_err(|source| HttpError::Transport {
        method,
        url: url.to_string(),
        source,
    })?;
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(HttpError::Status {
            method,
            url: url.to_string(),
            status,
            body: text,
        });
    }
    from_str::<T>(&text).map_err(|e| HttpError::Decode {
        method,
        url: url.to_string(),
        message: e.to_string(),
        body: text,
    })
}
