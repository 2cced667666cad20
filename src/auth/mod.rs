//! Authorization scheme dispatch.
//!
//! Reads the `Authorization` header of the options being built and, depending
//! on the scheme, installs credentials or hooks in its place:
//!
//! - `Basic user password...`: credentials encoded by the transport
//! - `Digest user password...`: after-response challenge hook
//! - `AWS ...`: SigV4 before-send hook
//! - `Cognito ...`: sign-in now, bearer token before send
//!
//! `Bearer` and `Basic <base64>` pass through untouched. Any other scheme is
//! sent as is with a warning.

pub mod aws;
pub mod basic;
pub mod cognito;
pub mod digest;

use std::sync::Arc;

use crate::config::{
    unsupported_scheme_warning, AWS_FORMAT_WARNING, AWS_MIN_ARGS, COGNITO_FORMAT_WARNING,
    COGNITO_MIN_ARGS,
};
use crate::error_handling::RequestError;
use crate::headers::{get_header, remove_header};
use crate::hooks::BearerTokenHook;
use crate::options::TransportOptions;
use crate::warnings::WarningSink;

pub use aws::{AwsCredentials, AwsSignatureHook};
pub use basic::{split_credentials, BasicCredentials};
pub use cognito::{CognitoCredentials, CognitoIdpClient, CognitoSignIn, CognitoTokens};
pub use digest::{DigestAuthHook, DigestChallenge};

const AUTHORIZATION: &str = "Authorization";

/// Authorization scheme named by the first token of the header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
    Bearer,
    Aws,
    Cognito,
    Unrecognized(String),
}

impl AuthScheme {
    /// Case-insensitive parse of a scheme token.
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "basic" => AuthScheme::Basic,
            "digest" => AuthScheme::Digest,
            "bearer" => AuthScheme::Bearer,
            "aws" => AuthScheme::Aws,
            "cognito" => AuthScheme::Cognito,
            _ => AuthScheme::Unrecognized(token.to_string()),
        }
    }
}

/// Applies the `Authorization` header of `options`.
///
/// Returns the scheme found, or `None` without an `Authorization` header.
/// Only a failed Cognito sign-in is an error; malformed headers are warned
/// about and sent as is.
pub async fn dispatch(
    options: &mut TransportOptions,
    cognito: &dyn CognitoSignIn,
    warnings: &dyn WarningSink,
) -> Result<Option<AuthScheme>, RequestError> {
    let Some(value) = get_header(&options.headers, AUTHORIZATION).map(str::to_string) else {
        return Ok(None);
    };
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let Some((scheme_token, args)) = tokens.split_first() else {
        return Ok(None);
    };
    let scheme = AuthScheme::parse(scheme_token);

    match &scheme {
        AuthScheme::Basic => {
            if let Some((user, rest)) = args.split_first().filter(|(_, rest)| !rest.is_empty()) {
                remove_header(&mut options.headers, AUTHORIZATION);
                let credentials = split_credentials(user, rest);
                log::debug!("Basic credentials installed for user {}", credentials.username);
                options.basic_auth = Some(credentials);
            }
        }
        AuthScheme::Digest => {
            if let Some((user, rest)) = args.split_first().filter(|(_, rest)| !rest.is_empty()) {
                remove_header(&mut options.headers, AUTHORIZATION);
                log::debug!("Digest challenge hook installed for user {}", user);
                options
                    .after_response
                    .push(Arc::new(DigestAuthHook::new(*user, rest.join(" "))));
            }
        }
        AuthScheme::Bearer => {}
        AuthScheme::Aws => {
            match AwsCredentials::parse(&value).filter(|_| args.len() >= AWS_MIN_ARGS) {
                Some(credentials) => {
                    remove_header(&mut options.headers, AUTHORIZATION);
                    log::debug!(
                        "AWS signature hook installed for key {}",
                        credentials.access_key_id
                    );
                    options
                        .before_send
                        .push(Arc::new(AwsSignatureHook::new(credentials)));
                }
                None => warnings.warn(AWS_FORMAT_WARNING),
            }
        }
        AuthScheme::Cognito => {
            match CognitoCredentials::from_args(args).filter(|_| args.len() >= COGNITO_MIN_ARGS) {
                Some(credentials) => {
                    remove_header(&mut options.headers, AUTHORIZATION);
                    let tokens = cognito.sign_in(&credentials).await?;
                    log::debug!("Cognito sign-in succeeded for {}", credentials.username);
                    options
                        .before_send
                        .push(Arc::new(BearerTokenHook::new(tokens.access_token)));
                }
                None => warnings.warn(COGNITO_FORMAT_WARNING),
            }
        }
        AuthScheme::Unrecognized(name) => warnings.warn(&unsupported_scheme_warning(name)),
    }

    Ok(Some(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestDescriptor;
    use crate::warnings::CollectingWarningSink;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedSignIn {
        token: Option<String>,
        seen: Mutex<Vec<CognitoCredentials>>,
    }

    impl FixedSignIn {
        fn ok(token: &str) -> Self {
            Self {
                token: Some(token.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                token: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CognitoSignIn for FixedSignIn {
        async fn sign_in(
            &self,
            credentials: &CognitoCredentials,
        ) -> Result<CognitoTokens, RequestError> {
            self.seen.lock().unwrap().push(credentials.clone());
            match &self.token {
                Some(token) => Ok(CognitoTokens {
                    access_token: token.clone(),
                    id_token: None,
                }),
                None => Err(RequestError::Authentication("bad password".to_string())),
            }
        }
    }

    fn options_with(authorization: &str) -> TransportOptions {
        let descriptor = RequestDescriptor::new(reqwest::Method::GET, "https://example.com/a")
            .header("authorization", authorization);
        TransportOptions::from_descriptor(&descriptor).unwrap()
    }

    async fn run(
        options: &mut TransportOptions,
        signer: &FixedSignIn,
    ) -> (Option<AuthScheme>, Vec<String>) {
        let warnings = CollectingWarningSink::new();
        let scheme = dispatch(options, signer, &warnings).await.unwrap();
        (scheme, warnings.messages())
    }

    #[test]
    fn test_scheme_parse_is_case_insensitive() {
        assert_eq!(AuthScheme::parse("BASIC"), AuthScheme::Basic);
        assert_eq!(AuthScheme::parse("aWs"), AuthScheme::Aws);
        assert_eq!(
            AuthScheme::parse("Hawk"),
            AuthScheme::Unrecognized("Hawk".to_string())
        );
    }

    #[tokio::test]
    async fn test_no_authorization_header() {
        let descriptor = RequestDescriptor::new(reqwest::Method::GET, "https://example.com/");
        let mut options = TransportOptions::from_descriptor(&descriptor).unwrap();

        let (scheme, warnings) = run(&mut options, &FixedSignIn::ok("t")).await;

        assert_eq!(scheme, None);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_basic_with_colon_password() {
        let mut options = options_with("Basic alice:pw:with:colons extra");

        let (scheme, warnings) = run(&mut options, &FixedSignIn::ok("t")).await;

        assert_eq!(scheme, Some(AuthScheme::Basic));
        assert!(warnings.is_empty());
        assert!(get_header(&options.headers, "Authorization").is_none());
        let credentials = options.basic_auth.unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.password, "pw:with:colons extra");
    }

    #[tokio::test]
    async fn test_basic_encoded_passes_through() {
        let mut options = options_with("Basic YWxpY2U6c2VjcmV0");

        run(&mut options, &FixedSignIn::ok("t")).await;

        assert_eq!(
            get_header(&options.headers, "Authorization"),
            Some("Basic YWxpY2U6c2VjcmV0")
        );
        assert!(options.basic_auth.is_none());
    }

    #[tokio::test]
    async fn test_digest_installs_after_response_hook() {
        let mut options = options_with("Digest bob my secret");

        run(&mut options, &FixedSignIn::ok("t")).await;

        assert!(get_header(&options.headers, "Authorization").is_none());
        assert_eq!(options.after_response.len(), 1);
        assert!(options.before_send.is_empty());
    }

    #[tokio::test]
    async fn test_bearer_untouched() {
        let mut options = options_with("Bearer abc.def");

        let (scheme, warnings) = run(&mut options, &FixedSignIn::ok("t")).await;

        assert_eq!(scheme, Some(AuthScheme::Bearer));
        assert!(warnings.is_empty());
        assert_eq!(
            get_header(&options.headers, "Authorization"),
            Some("Bearer abc.def")
        );
        assert!(options.before_send.is_empty());
    }

    #[tokio::test]
    async fn test_aws_installs_single_signing_hook() {
        let mut options = options_with("AWS region:us-east-1 service:s3 AKIA SECRET");

        let (scheme, warnings) = run(&mut options, &FixedSignIn::ok("t")).await;

        assert_eq!(scheme, Some(AuthScheme::Aws));
        assert!(warnings.is_empty());
        assert!(get_header(&options.headers, "Authorization").is_none());
        assert_eq!(options.before_send.len(), 1);
    }

    #[tokio::test]
    async fn test_aws_too_few_arguments_warns() {
        let mut options = options_with("AWS AKIA");

        let (_, warnings) = run(&mut options, &FixedSignIn::ok("t")).await;

        assert_eq!(warnings, vec![AWS_FORMAT_WARNING.to_string()]);
        assert_eq!(get_header(&options.headers, "Authorization"), Some("AWS AKIA"));
        assert!(options.before_send.is_empty());
    }

    #[tokio::test]
    async fn test_aws_tags_without_secret_warns() {
        let mut options = options_with("AWS region:eu-west-1 service:s3 AKIA");

        let (_, warnings) = run(&mut options, &FixedSignIn::ok("t")).await;

        assert_eq!(warnings.len(), 1);
        assert!(options.before_send.is_empty());
    }

    #[tokio::test]
    async fn test_cognito_signs_in_before_send() {
        let signer = FixedSignIn::ok("access-1");
        let mut options = options_with("Cognito alice pw us-east-1_Pool client-1");

        let (scheme, warnings) = run(&mut options, &signer).await;

        assert_eq!(scheme, Some(AuthScheme::Cognito));
        assert!(warnings.is_empty());
        assert!(get_header(&options.headers, "Authorization").is_none());
        assert_eq!(options.before_send.len(), 1);
        let seen = signer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].user_pool_id, "us-east-1_Pool");

        let mut request = reqwest::Client::new()
            .get("https://example.com/a")
            .build()
            .unwrap();
        options.before_send[0].before_send(&mut request).unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer access-1");
    }

    #[tokio::test]
    async fn test_cognito_too_few_arguments_warns() {
        let signer = FixedSignIn::ok("t");
        let mut options = options_with("Cognito alice pw pool");

        let (_, warnings) = run(&mut options, &signer).await;

        assert_eq!(warnings, vec![COGNITO_FORMAT_WARNING.to_string()]);
        assert!(signer.seen.lock().unwrap().is_empty());
        assert!(get_header(&options.headers, "Authorization").is_some());
    }

    #[tokio::test]
    async fn test_cognito_failure_aborts() {
        let mut options = options_with("Cognito alice pw us-east-1_Pool client-1");
        let warnings = CollectingWarningSink::new();

        let result = dispatch(&mut options, &FixedSignIn::failing(), &warnings).await;

        assert!(matches!(result, Err(RequestError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_warns() {
        let mut options = options_with("Hawk id=abc");

        let (scheme, warnings) = run(&mut options, &FixedSignIn::ok("t")).await;

        assert_eq!(scheme, Some(AuthScheme::Unrecognized("Hawk".to_string())));
        assert_eq!(warnings, vec![unsupported_scheme_warning("Hawk")]);
        assert_eq!(get_header(&options.headers, "Authorization"), Some("Hawk id=abc"));
    }
}
