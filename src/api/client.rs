// SPDX-License-Identifier: PMPL-1.0-or-later

use super::response::{GenerateResponse, ValidationResponse};
use super::{ApiError, ApiResult};
use crate::payload;
use crate::types::{Endpoint, PaymentFields};
use reqwest::{header, multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://nbs.rs/QRcode/api/qr/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = concat!("nbs-qr/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct QrClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl QrClient {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::Config(format!(
                "base URL must be http(s): {:?}",
                base_url
            )));
        }
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /gen[/size]`: fields as JSON, PNG back.
    pub async fn generate_image(&self, fields: &PaymentFields, size: Option<u32>) -> ApiResult<Vec<u8>> {
        payload::build(fields)?;
        let request = self
            .http
            .post(self.url(Endpoint::Gen, size))
            .header(header::ACCEPT, "image/png")
            .json(fields);
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        if bytes.is_empty() {
            return Err(ApiError::Decode("empty image".to_string()));
        }
        Ok(bytes.to_vec())
    }

    /// `POST /generate[/size]`: payload text in, JSON with image out.
    pub async fn generate(&self, text: &str, size: Option<u32>) -> ApiResult<GenerateResponse> {
        let response: GenerateResponse = self.post_text(self.url(Endpoint::Generate, size), text).await?;
        if !response.s.is_ok() {
            return Err(ApiError::Rejected {
                code: response.s.code,
                desc: response.s.desc,
            });
        }
        Ok(response)
    }

    /// `POST /validate`. A payload the service considers invalid is a
    /// successful call with `is_valid() == false`.
    pub async fn validate(&self, text: &str) -> ApiResult<ValidationResponse> {
        self.post_text(self.url(Endpoint::Validate, None), text).await
    }

    /// `POST /upload`: multipart image in, validation JSON out.
    pub async fn upload(&self, image: Vec<u8>, file_name: &str) -> ApiResult<ValidationResponse> {
        let part = multipart::Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str(image_mime(file_name))
            .map_err(|e| ApiError::Config(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);
        let request = self
            .http
            .post(self.url(Endpoint::Upload, None))
            .header(header::ACCEPT, "application/json")
            .multipart(form);
        let response = self.send(request).await?;
        self.decode(response).await
    }

    pub async fn upload_file(&self, path: &Path) -> ApiResult<ValidationResponse> {
        let image = tokio::fs::read(path).await.map_err(|source| ApiError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("qr.png");
        self.upload(image, file_name).await
    }

    fn url(&self, endpoint: Endpoint, size: Option<u32>) -> String {
        match size {
            Some(size) => format!("{}{}/{}", self.base_url, endpoint.path(), size),
            None => format!("{}{}", self.base_url, endpoint.path()),
        }
    }

    async fn post_text<T: DeserializeOwned>(&self, url: String, text: &str) -> ApiResult<T> {
        let text = payload::normalize_line_breaks(text.trim());
        let charset = payload::charset_of(&text);
        let body = payload::encode(&text, charset)?;
        let request = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, format!("text/plain; charset={}", charset.label()))
            .header(header::ACCEPT, "application/json")
            .body(body);
        let response = self.send(request).await?;
        self.decode(response).await
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "QR service returned an error status");
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        tracing::debug!(status = status.as_u16(), url = %response.url(), "QR service responded");
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> ApiResult<T> {
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::Network(err)
        }
    }
}

fn image_mime(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/png"
    }
}
