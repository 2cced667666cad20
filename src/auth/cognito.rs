//! Amazon Cognito user-pool sign-in.
//!
//! `Authorization: Cognito [...] <username> <password> <userPoolId> <clientId>`
//! triggers a sign-in before the request is sent; the request then carries
//! `Authorization: Bearer <access token>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{COGNITO_CONTENT_TYPE, COGNITO_INITIATE_AUTH_TARGET};
use crate::error_handling::RequestError;

/// The four trailing arguments of a `Cognito` authorization header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CognitoCredentials {
    pub username: String,
    pub password: String,
    pub user_pool_id: String,
    pub client_id: String,
}

impl CognitoCredentials {
    /// Takes the last four arguments; `None` when fewer are given.
    pub fn from_args(args: &[&str]) -> Option<Self> {
        let [username, password, user_pool_id, client_id] =
            args.get(args.len().checked_sub(4)?..)?
        else {
            return None;
        };
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
            user_pool_id: user_pool_id.to_string(),
            client_id: client_id.to_string(),
        })
    }

    /// Region prefix of the user pool id (`us-east-1_AbCdEf` → `us-east-1`).
    pub fn region(&self) -> Option<&str> {
        self.user_pool_id
            .split_once('_')
            .map(|(region, _)| region)
            .filter(|region| !region.is_empty())
    }
}

/// Tokens returned by a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CognitoTokens {
    pub access_token: String,
    pub id_token: Option<String>,
}

/// Exchanges user-pool credentials for tokens.
#[async_trait]
pub trait CognitoSignIn: Send + Sync {
    async fn sign_in(&self, credentials: &CognitoCredentials)
        -> Result<CognitoTokens, RequestError>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'static str,
    client_id: &'a str,
    auth_parameters: AuthParameters<'a>,
}

#[derive(Serialize)]
struct AuthParameters<'a> {
    #[serde(rename = "USERNAME")]
    username: &'a str,
    #[serde(rename = "PASSWORD")]
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: Option<String>,
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct ServiceError {
    #[serde(rename = "__type")]
    kind: Option<String>,
    message: Option<String>,
}

/// Signs in through the Cognito Identity Provider `InitiateAuth` API
/// (`USER_PASSWORD_AUTH` flow).
#[derive(Debug, Clone, Default)]
pub struct CognitoIdpClient {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl CognitoIdpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends sign-in calls to `endpoint` instead of the regional service.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: Some(endpoint.into()),
        }
    }

    fn endpoint_for(&self, credentials: &CognitoCredentials) -> Result<String, RequestError> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }
        let region = credentials.region().ok_or_else(|| {
            RequestError::Authentication(format!(
                "invalid user pool id {:?}, expected <region>_<id>",
                credentials.user_pool_id
            ))
        })?;
        Ok(format!("https://cognito-idp.{}.amazonaws.com/", region))
    }
}

#[async_trait]
impl CognitoSignIn for CognitoIdpClient {
    async fn sign_in(
        &self,
        credentials: &CognitoCredentials,
    ) -> Result<CognitoTokens, RequestError> {
        let endpoint = self.endpoint_for(credentials)?;
        let payload = InitiateAuthRequest {
            auth_flow: "USER_PASSWORD_AUTH",
            client_id: &credentials.client_id,
            auth_parameters: AuthParameters {
                username: &credentials.username,
                password: &credentials.password,
            },
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| RequestError::Authentication(format!("sign-in payload: {}", e)))?;

        log::debug!("Cognito sign-in for {} at {}", credentials.username, endpoint);
        let response = self
            .client
            .post(&endpoint)
            .header("X-Amz-Target", COGNITO_INITIATE_AUTH_TARGET)
            .header(reqwest::header::CONTENT_TYPE, COGNITO_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| RequestError::Authentication(format!("sign-in request failed: {}", e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RequestError::Authentication(format!("sign-in response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ServiceError>(&bytes)
                .ok()
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.kind.unwrap_or_else(|| "Error".to_string()),
                        e.message.unwrap_or_default()
                    )
                })
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
            return Err(RequestError::Authentication(format!(
                "sign-in rejected ({}): {}",
                status, detail
            )));
        }

        let parsed: InitiateAuthResponse = serde_json::from_slice(&bytes)
            .map_err(|e| RequestError::Authentication(format!("Invalid auth response: {}", e)))?;

        if let Some(challenge) = parsed.challenge_name {
            return Err(RequestError::Authentication(format!(
                "challenge {} is not supported",
                challenge
            )));
        }

        let result = parsed.authentication_result.ok_or_else(|| {
            RequestError::Authentication("Invalid auth response: no tokens".to_string())
        })?;
        let access_token = result.access_token.ok_or_else(|| {
            RequestError::Authentication("Invalid auth response: no access token".to_string())
        })?;

        Ok(CognitoTokens {
            access_token,
            id_token: result.id_token,
        })
    }
}
