//! Fixtures for exercising verification end to end: a throwaway issuer with
//! a self-signed certificate that publishes itself as a key set entry and
//! signs tokens the way the bot framework does.

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::x509::{X509Name, X509};

use crate::jwks::{SigningKey, SigningKeySet};
use crate::jwt::{Claims, Header, AUTHORIZATION_HEADER_PREFIX};
use crate::Error;

pub const SERVICE_URL: &str = "https://smba.trafficmanager.net/apis/";

const KEY_SIZE: u32 = 2048;

pub struct TestIssuer {
    key_id: String,
    private_key: PKey<Private>,
    certificate: X509,
}

impl TestIssuer {
    pub fn new(key_id: &str) -> Result<Self, Error> {
        let rsa = Rsa::generate(KEY_SIZE)?;
        let private_key = PKey::from_rsa(rsa)?;

        let mut name = X509Name::builder()?;
        name.append_entry_by_nid(Nid::COMMONNAME, "login.botframework.test")?;
        let name = name.build();

        let mut serial = BigNum::new()?;
        serial.rand(128, MsbOption::MAYBE_ZERO, false)?;

        let mut builder = X509::builder()?;
        builder.set_version(2)?;
        let serial = serial.to_asn1_integer()?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        let not_before = Asn1Time::days_from_now(0)?;
        let not_after = Asn1Time::days_from_now(365)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;
        builder.set_pubkey(&private_key)?;
        builder.sign(&private_key, MessageDigest::sha256())?;

        Ok(Self {
            key_id: key_id.to_string(),
            private_key,
            certificate: builder.build(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The key set entry publishing this issuer's certificate.
    pub fn signing_key(&self) -> SigningKey {
        let rsa = self.private_key.rsa().ok();
        let encode = |bytes: Vec<u8>| base64::encode_config(bytes, base64::URL_SAFE_NO_PAD);
        SigningKey {
            key_type: "RSA".to_string(),
            usage: "sig".to_string(),
            key_id: self.key_id.clone(),
            thumbprint: self.key_id.clone(),
            modulus: rsa.as_ref().map(|r| encode(r.n().to_vec())).unwrap_or_default(),
            exponent: rsa.as_ref().map(|r| encode(r.e().to_vec())).unwrap_or_default(),
            certificate_chain: self
                .certificate
                .to_der()
                .map(base64::encode)
                .into_iter()
                .collect(),
            endorsements: Some(vec!["msteams".to_string()]),
        }
    }

    /// The self-signed certificate, PEM encoded.
    pub fn certificate_pem(&self) -> Result<Vec<u8>, Error> {
        Ok(self.certificate.to_pem()?)
    }

    /// The private key in PKCS#8, PEM encoded.
    pub fn private_key_pem(&self) -> Result<Vec<u8>, Error> {
        Ok(self.private_key.private_key_to_pem_pkcs8()?)
    }

    pub fn key_set(&self) -> SigningKeySet {
        SigningKeySet::new(vec![self.signing_key()])
    }

    pub fn header(&self) -> Header {
        Header {
            token_type: "JWT".to_string(),
            algorithm: "RS256".to_string(),
            key_id: self.key_id.clone(),
            key_thumbprint: self.key_id.clone(),
        }
    }

    /// Signs `claims` into a compact token.
    pub fn token(&self, claims: &Claims) -> Result<String, Error> {
        let header = base64::encode_config(
            serde_json::to_string(&self.header())?,
            base64::URL_SAFE_NO_PAD,
        );
        let payload = base64::encode_config(serde_json::to_string(claims)?, base64::URL_SAFE_NO_PAD);
        let signing_input = format!("{}.{}", header, payload);
        let signature = self.sign(signing_input.as_bytes())?;
        Ok(format!(
            "{}.{}",
            signing_input,
            base64::encode_config(signature, base64::URL_SAFE_NO_PAD)
        ))
    }

    /// `claims` signed into an `Authorization` header value.
    pub fn bearer(&self, claims: &Claims) -> Result<String, Error> {
        Ok(format!("{}{}", AUTHORIZATION_HEADER_PREFIX, self.token(claims)?))
    }

    pub fn sign(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        let mut signer = Signer::new(MessageDigest::sha256(), &self.private_key)?;
        signer.update(input)?;
        Ok(signer.sign_to_vec()?)
    }
}

pub fn claims(issuer: &str, audience: &str, expires_at: i64) -> Claims {
    Claims {
        service_url: SERVICE_URL.to_string(),
        issuer: issuer.to_string(),
        audience: audience.to_string(),
        expires_at,
        not_before: expires_at - 3600,
    }
}
