//! Client identity construction from loaded certificate material.

use reqwest::Identity;

use super::CertificateMaterial;
use crate::warnings::WarningSink;

/// Builds the TLS client identity presented during the handshake.
///
/// A PKCS#12 archive wins over a PEM certificate/key pair. Material that the
/// TLS backend rejects is reported as a warning and the request continues
/// without a client identity.
pub fn build_identity(
    material: &CertificateMaterial,
    warnings: &dyn WarningSink,
) -> Option<Identity> {
    if let Some(pfx) = &material.pfx {
        let passphrase = material.passphrase.as_deref().unwrap_or_default();
        return match Identity::from_pkcs12_der(pfx, passphrase) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warnings.warn(&format!("Failed to load PFX client certificate: {}", e));
                None
            }
        };
    }

    match (&material.cert, &material.key) {
        (Some(cert), Some(key)) => match Identity::from_pkcs8_pem(cert, key) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warnings.warn(&format!("Failed to load client certificate: {}", e));
                None
            }
        },
        (Some(_), None) | (None, Some(_)) => {
            log::debug!("Client certificate needs both cert and key; skipping");
            None
        }
        (None, None) => None,
    }
}
