//! Signing of outgoing requests with draft-cavage HTTP signatures.

use anyhow::{Context, Result};
use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::rsa::KeyPair;
use aws_lc_rs::signature::RSA_PKCS1_SHA256;
use base64ct::{Base64, Encoding};
use jiff::Timestamp;
use reqwest::Url;
use reqwest::header::{self, HeaderMap};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::{Digest, Sha256};

use super::model::Iri;

const HTTP_DATE_FMT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const SIGNED_HEADERS: &str = "(request-target) host date digest content-length";

/// Hook the remote client calls before pushing an activity.
pub trait SignRequest: Send + Sync {
    /// Headers that authenticate a POST of `body` to `url`.
    fn sign_post(&self, url: &Url, body: &[u8]) -> Result<HeaderMap>;
}

/// `rsa-sha256` signer holding one actor's private key.
pub struct Hs2019Signer {
    key_id: String,
    key_pair: KeyPair,
}

impl Hs2019Signer {
    pub fn new(actor: &Iri, pkcs8: &SecretSlice<u8>) -> Result<Hs2019Signer> {
        let key_pair = KeyPair::from_pkcs8(pkcs8.expose_secret())
            .map_err(|e| anyhow::anyhow!("invalid private key of {actor}: {e}"))?;
        Ok(Hs2019Signer {
            key_id: format!("{actor}#main-key"),
            key_pair,
        })
    }
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl SignRequest for Hs2019Signer {
    fn sign_post(&self, url: &Url, body: &[u8]) -> Result<HeaderMap> {
        let digest = base64_sha256_string(body);
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => anyhow::bail!("{url} should have a host component"),
        };
        let target = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        let date = Timestamp::now().strftime(HTTP_DATE_FMT).to_string();
        let content_length = body.len();

        let sig_body = signing_string(&target, &host, &date, &digest, content_length);
        let rng = SystemRandom::new();
        let mut rsa_signature = vec![0; self.key_pair.public_modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &rng, sig_body.as_bytes(), &mut rsa_signature)
            .context("unable to sign request")?;
        let signature = Base64::encode_string(&rsa_signature);

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, host.parse()?);
        headers.insert(header::DATE, date.parse()?);
        headers.insert("Digest", format!("SHA-256={digest}").parse()?);
        headers.insert(header::CONTENT_LENGTH, content_length.to_string().parse()?);
        headers.insert(
            "Signature",
            format!(
                "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{SIGNED_HEADERS}\",signature=\"{signature}\"",
                self.key_id
            )
            .parse()?,
        );
        Ok(headers)
    }
}

fn signing_string(
    target: &str,
    host: &str,
    date: &str,
    digest: &str,
    content_length: usize,
) -> String {
    format!(
        "(request-target): post {target}\nhost: {host}\ndate: {date}\ndigest: SHA-256={digest}\ncontent-length: {content_length}"
    )
}

fn base64_sha256_string(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Base64::encode_string(hasher.finalize().as_slice())
}

#[cfg(test)]
mod tests {
    use aws_lc_rs::signature::{KeyPair as _, RSA_PKCS1_2048_8192_SHA256, UnparsedPublicKey};
    use base64ct::{Base64, Encoding};
    use reqwest::Url;

    use super::{Hs2019Signer, SignRequest, base64_sha256_string, signing_string};
    use crate::activity_pub::model::Iri;
    use crate::activity_pub::testing::rsa_private_key;

    #[test]
    fn signed_post_verifies() {
        let key = rsa_private_key();
        let signer =
            Hs2019Signer::new(&Iri::from("https://social.example.com/users/john"), &key).unwrap();
        assert_eq!(signer.key_id(), "https://social.example.com/users/john#main-key");

        let url = Url::parse("https://remote.example:8443/users/jane/inbox").unwrap();
        let body = br#"{"type":"Follow"}"#;
        let headers = signer.sign_post(&url, body).unwrap();

        let date = headers["date"].to_str().unwrap();
        assert_eq!(headers["host"], "remote.example:8443");
        assert_eq!(
            headers["digest"].to_str().unwrap(),
            format!("SHA-256={}", base64_sha256_string(body))
        );
        let signature_header = headers["signature"].to_str().unwrap();
        assert!(signature_header.starts_with(
            "keyId=\"https://social.example.com/users/john#main-key\",algorithm=\"rsa-sha256\""
        ));
        let signature = signature_header
            .rsplit_once("signature=\"")
            .and_then(|(_, rest)| rest.strip_suffix('"'))
            .unwrap();
        let signature = Base64::decode_vec(signature).unwrap();

        let expected = signing_string(
            "/users/jane/inbox",
            "remote.example:8443",
            date,
            &base64_sha256_string(body),
            body.len(),
        );
        let public_key = signer.key_pair.public_key();
        let verified = UnparsedPublicKey::new(&RSA_PKCS1_2048_8192_SHA256, public_key.as_ref())
            .verify(expected.as_bytes(), &signature)
            .is_ok();
        assert!(verified);
    }

    #[test]
    fn reject_garbage_key() {
        let garbage = secrecy::SecretSlice::from(vec![1u8, 2, 3]);
        assert!(Hs2019Signer::new(&Iri::from("https://social.example.com/users/john"), &garbage).is_err());
    }
}
