//! Configuration constants.
//!
//! This module defines the defaults and fixed texts used throughout the engine,
//! including the managed cookie location and the user-facing warning messages.

// Managed storage
/// Directory (under the user's home) holding engine-managed state
pub const DATA_DIR_NAME: &str = ".rest-engine";
/// File name of the persistent cookie jar inside [`DATA_DIR_NAME`]
pub const COOKIE_FILE_NAME: &str = "cookie.json";

// Request defaults
/// Default request timeout in milliseconds (0 = unbounded)
pub const DEFAULT_TIMEOUT_MS: u64 = 0;
/// Automatic retries performed by the transport. Fixed, never configurable.
pub const RETRY_LIMIT: u32 = 0;
/// Maximum redirect hops when redirect following is enabled
pub const MAX_REDIRECTS: usize = 10;
/// Charset used when the response does not declare a usable one
pub const DEFAULT_CHARSET: &str = "utf-8";

// Warning texts
pub const AWS_FORMAT_WARNING: &str = "Invalid AWS authorization header, the format should be \"Authorization: AWS [region:<region>] [service:<service>] [token:<sessionToken>] <accessKeyId> <secretAccessKey>\". The Authorization header will be sent as is.";
pub const COGNITO_FORMAT_WARNING: &str = "Invalid Cognito authorization header, the format should be \"Authorization: Cognito [...] <username> <password> <userPoolId> <clientId>\". The Authorization header will be sent as is.";

/// Minimum number of arguments after the scheme for `AWS` authorization
pub const AWS_MIN_ARGS: usize = 3;
/// Minimum number of arguments after the scheme for `Cognito` authorization
pub const COGNITO_MIN_ARGS: usize = 4;

// Cognito
/// `X-Amz-Target` for the user pool sign-in call
pub const COGNITO_INITIATE_AUTH_TARGET: &str =
    "AWSCognitoIdentityProviderService.InitiateAuth";
pub const COGNITO_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

// AWS SigV4
pub const AWS_SIGNING_ALGORITHM: &str = "AWS4-HMAC-SHA256";
/// Region used when neither the header nor the host names one
pub const AWS_DEFAULT_REGION: &str = "us-east-1";

pub fn unsupported_scheme_warning(scheme: &str) -> String {
    format!(
        "Authorization scheme {} is not supported, the Authorization header will be sent as is.",
        scheme
    )
}

pub fn missing_certificate_warning(path: &str) -> String {
    format!(
        "Certificate path {} doesn't exist, please make sure it exists.",
        path
    )
}
