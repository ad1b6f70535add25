use openssl::hash::MessageDigest;
use openssl::pkey::{Id, PKey, Public};
use openssl::sign::Verifier;
use openssl::x509::X509;

use crate::auth::DenialReason;
use crate::jwks::SigningKeySet;
use crate::jwt::SignedToken;

const PEM_LINE_LENGTH: usize = 64;
const PEM_HEADER: &str = "-----BEGIN CERTIFICATE-----";
const PEM_FOOTER: &str = "-----END CERTIFICATE-----";

/// Verifies the RS256 signature of `token` with the certificate of the key
/// it names in its header.
pub fn verify(token: &SignedToken, keys: &SigningKeySet) -> Result<(), DenialReason> {
    let key = keys.find(&token.header.key_id).ok_or_else(|| {
        tracing::debug!(
            kid = token.header.key_id.as_str(),
            available = keys.key_ids().join(", ").as_str(),
            "token signed with unknown key"
        );
        DenialReason::KeyNotFound
    })?;

    let certificate = key
        .certificate_chain
        .first()
        .ok_or(DenialReason::CertificateParseFailed)?;
    let public_key = certificate_public_key(certificate)?;

    if public_key.id() != Id::RSA {
        tracing::debug!(kid = key.key_id.as_str(), "signing certificate is not RSA");
        return Err(DenialReason::SignatureMismatch);
    }

    match verify_rs256(&public_key, token.signing_input().as_bytes(), &token.signature) {
        Ok(true) => Ok(()),
        Ok(false) => Err(DenialReason::SignatureMismatch),
        Err(e) => {
            tracing::debug!(err = e.to_string(), "signature verification failed");
            Err(DenialReason::SignatureMismatch)
        }
    }
}

fn verify_rs256(
    public_key: &PKey<Public>,
    input: &[u8],
    signature: &[u8],
) -> Result<bool, openssl::error::ErrorStack> {
    let mut verifier = Verifier::new(MessageDigest::sha256(), public_key)?;
    verifier.update(input)?;
    verifier.verify(signature)
}

fn certificate_public_key(certificate: &str) -> Result<PKey<Public>, DenialReason> {
    let pem = certificate_pem(certificate);
    X509::from_pem(pem.as_bytes())
        .and_then(|x509| x509.public_key())
        .map_err(|e| {
            tracing::debug!(err = e.to_string(), "failed to parse signing certificate");
            DenialReason::CertificateParseFailed
        })
}

/// Frames a bare base64 certificate body as PEM, 64 characters per line.
pub fn certificate_pem(certificate: &str) -> String {
    let lines = certificate.len() / PEM_LINE_LENGTH + 1;
    let mut pem =
        String::with_capacity(certificate.len() + lines + PEM_HEADER.len() + PEM_FOOTER.len() + 1);
    pem.push_str(PEM_HEADER);
    pem.push('\n');
    for line in certificate.as_bytes().chunks(PEM_LINE_LENGTH) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(PEM_FOOTER);
    pem
}
