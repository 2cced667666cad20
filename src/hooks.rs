//! Request lifecycle hooks.
//!
//! Hooks are registered while the transport options are built and run by the
//! executor at two fixed points:
//! - before send: may add or replace headers on the materialized request
//! - after response: may inspect the response and re-send once
//!
//! They run in registration order.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Request, Response};

use crate::error_handling::RequestError;

/// Mutates the outgoing request immediately before it is sent.
pub trait BeforeSendHook: Send + Sync {
    fn before_send(&self, request: &mut Request) -> Result<(), RequestError>;
}

/// Reacts to a response; returns the response the caller should see.
#[async_trait]
pub trait AfterResponseHook: Send + Sync {
    /// `request` is a copy of what was sent, usable for a follow-up request.
    async fn after_response(
        &self,
        client: &Client,
        request: &Request,
        response: Response,
    ) -> Result<Response, RequestError>;
}

pub type BeforeSendHooks = Vec<Arc<dyn BeforeSendHook>>;
pub type AfterResponseHooks = Vec<Arc<dyn AfterResponseHook>>;

/// Sets `Authorization: Bearer <token>` on every request it sees.
#[derive(Debug, Clone)]
pub struct BearerTokenHook {
    token: String,
}

impl BearerTokenHook {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl BeforeSendHook for BearerTokenHook {
    fn before_send(&self, request: &mut Request) -> Result<(), RequestError> {
        let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| RequestError::Authentication(format!("invalid bearer token: {}", e)))?;
        request
            .headers_mut()
            .insert(reqwest::header::AUTHORIZATION, value);
        Ok(())
    }
}
