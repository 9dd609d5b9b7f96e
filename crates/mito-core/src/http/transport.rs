//! The wire seam under the request executor.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

use super::request::{ApiRequest, ApiResponse, CONTENT_TYPE, RequestBody};
use crate::error::{Error, Result};

/// The request never produced an HTTP response (DNS, refused, reset, ...).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Sends one request and returns whatever status the server answered with.
///
/// HTTP error statuses are responses, not transport errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|error| Error::InvalidConfiguration(format!("HTTP client: {error}")))?;
        Ok(Self { client })
    }

    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.as_str());

        let is_multipart = matches!(request.body, Some(RequestBody::File(_)));
        for (name, value) in &request.headers {
            // reqwest sets the multipart boundary itself.
            if is_multipart && name.eq_ignore_ascii_case(CONTENT_TYPE) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            None => builder,
            Some(RequestBody::Json { content }) => builder.body(content.clone()),
            Some(RequestBody::File(part)) => {
                let file = Part::bytes(part.data.clone())
                    .file_name(part.file_name.clone())
                    .mime_str(&part.content_type)
                    .map_err(|error| TransportError::new(error.to_string()))?;
                builder.multipart(Form::new().part(part.field.clone(), file))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|error| TransportError::new(error.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| TransportError::new(error.to_string()))?;
        Ok(ApiResponse { status, body })
    }
}

/// Wraps a transport so requests fail immediately while marked offline.
///
/// Lets a shell force the offline path (e.g. a `--offline` flag) without
/// waiting for real network errors.
pub struct GatedTransport<T> {
    inner: T,
    connectivity: crate::connectivity::Connectivity,
}

impl<T: Transport> GatedTransport<T> {
    pub const fn new(inner: T, connectivity: crate::connectivity::Connectivity) -> Self {
        Self {
            inner,
            connectivity,
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for GatedTransport<T> {
    async fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        if !self.connectivity.is_online() {
            return Err(TransportError::new("device is offline"));
        }
        self.inner.send(request).await
    }
}
