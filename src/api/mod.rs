// SPDX-License-Identifier: PMPL-1.0-or-later

//! Client for the NBS IPS QR API.
//!
//! Four operations, one per [`Endpoint`](crate::types::Endpoint): render an
//! image from fields, generate from payload text, validate payload text, and
//! validate an uploaded image. Every request is bounded by the client's
//! timeout; there is no retry.

mod client;
mod response;

pub use client::{QrClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use response::{ApiStatus, GenerateResponse, ValidationResponse};

use crate::payload::PayloadError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("QR service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("cannot reach QR service: {0}")]
    Network(#[source] reqwest::Error),

    #[error("QR service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("QR service rejected the request ({code}): {desc}")]
    Rejected { code: i64, desc: String },

    #[error("unexpected response from QR service: {0}")]
    Decode(String),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("cannot read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

pub type ApiResult<T> = Result<T, ApiError>;
