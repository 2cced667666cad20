//! TLS client certificate resolution.
//!
//! Looks up the certificate configured for a request's host and loads the
//! certificate, key and PKCS#12 material from disk. Paths are resolved in
//! this order:
//! - absolute paths are read as is
//! - relative paths are joined to the workspace root, when one is known
//! - otherwise relative paths are joined to the directory of the file that
//!   declared the request
//!
//! A missing file is a warning, never a failure: the request goes out without
//! that piece of material. Cert, key and pfx are resolved independently.

mod identity;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use url::Url;

use crate::config::{missing_certificate_warning, CertificateSpec};
use crate::warnings::WarningSink;

pub use identity::build_identity;

/// Where relative certificate paths are anchored.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateContext<'a> {
    /// Workspace root, takes precedence over the declaring file
    pub workspace_root: Option<&'a Path>,
    /// File that declared the request
    pub source_path: Option<&'a Path>,
}

/// Certificate material loaded for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateMaterial {
    pub cert: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
    pub pfx: Option<Vec<u8>>,
    pub passphrase: Option<String>,
}

impl CertificateMaterial {
    pub fn is_empty(&self) -> bool {
        self.cert.is_none() && self.key.is_none() && self.pfx.is_none()
    }
}

/// The certificate table key for a URL: `host`, or `host:port` when the URL
/// names a non-default port.
pub fn certificate_host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Loads the certificate material configured for the request's host.
///
/// Returns `None` when no entry matches the host exactly.
pub fn request_certificate(
    url: &Url,
    certificates: &HashMap<String, CertificateSpec>,
    context: CertificateContext<'_>,
    warnings: &dyn WarningSink,
) -> Option<CertificateMaterial> {
    let host = certificate_host_key(url)?;
    let spec = certificates.get(&host)?;
    log::debug!("Client certificate configured for {}", host);

    Some(CertificateMaterial {
        cert: resolve_certificate(spec.cert.as_deref(), context, warnings),
        key: resolve_certificate(spec.key.as_deref(), context, warnings),
        pfx: resolve_certificate(spec.pfx.as_deref(), context, warnings),
        passphrase: spec.passphrase.clone(),
    })
}

/// Reads one certificate file, resolving relative paths against the context.
pub fn resolve_certificate(
    path: Option<&str>,
    context: CertificateContext<'_>,
    warnings: &dyn WarningSink,
) -> Option<Vec<u8>> {
    let path = path?;

    let candidate: PathBuf = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else if let Some(root) = context.workspace_root {
        root.join(path)
    } else {
        let dir = context.source_path?.parent()?;
        dir.join(path)
    };

    if !candidate.exists() {
        warnings.warn(&missing_certificate_warning(path));
        return None;
    }

    match std::fs::read(&candidate) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!("Failed to read certificate {}: {}", candidate.display(), e);
            warnings.warn(&missing_certificate_warning(path));
            None
        }
    }
}
