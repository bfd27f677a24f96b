use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::config::{ClientConfig, normalize_base_url};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Caller-owned abort signal. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    Cancelled,
    Network(String),
}

impl TransportError {
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// One JSON POST against a named API endpoint such as `documents.info`.
pub trait Transport: Send + Sync {
    fn post_json(
        &self,
        endpoint: &str,
        body: String,
        cancel: &CancelToken,
    ) -> std::result::Result<HttpReply, TransportError>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("failed to build Outline HTTP client")?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&config.base_url),
            api_key: config.api_key.clone(),
        })
    }

    pub(crate) fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/api/{endpoint}", self.base_url)
    }
}

impl Transport for HttpTransport {
    fn post_json(
        &self,
        endpoint: &str,
        body: String,
        cancel: &CancelToken,
    ) -> std::result::Result<HttpReply, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let request = self
            .client
            .post(self.endpoint_url(endpoint))
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        // The blocking call runs on a worker so the caller can walk away from
        // it when the token fires; the worker's late result is dropped.
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let outcome = request.send().and_then(|response| {
                let status = response.status().as_u16();
                response.text().map(|body| HttpReply { status, body })
            });
            let _ = sender.send(outcome);
        });

        loop {
            match receiver.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(outcome) => return outcome.map_err(TransportError::from_reqwest),
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        return Err(TransportError::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TransportError::Network(
                        "request worker exited without a response".to_string(),
                    ));
                }
            }
        }
    }
}
