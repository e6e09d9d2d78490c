/*
 * Responsibility
 * - RSA signing material for ID tokens
 * - one keypair per process, generated at startup (readiness gate: the router
 *   is only built once keys exist)
 * - publishes the public half as a JWK set under a stable kid
 */
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::IdpError;

const RSA_BITS: usize = 2048;
pub const KEY_ID: &str = "1";

/// Public JWK as served by `/jwks.json`.
///
/// Only the RSA members the relying party needs for RS256 verification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub alg: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Claims carried by issued ID tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub aud: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub name: String,
    pub email: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct SigningKeys {
    encoding_key: EncodingKey,
    jwks: JwkSet,
}

impl SigningKeys {
    /// Generate a fresh RSA keypair and derive the matching JWK set.
    ///
    /// RSA generation is CPU-heavy; callers should run this on a blocking
    /// thread before accepting traffic.
    pub fn generate() -> Result<Self, IdpError> {
        let mut rng = rsa::rand_core::OsRng;

        let private_key = RsaPrivateKey::new(&mut rng, RSA_BITS)
            .map_err(|e| IdpError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| IdpError::KeyGeneration(e.to_string()))?;

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| IdpError::KeyGeneration(e.to_string()))?;

        let jwk = Jwk {
            kty: "RSA".to_string(),
            use_: "sig".to_string(),
            alg: "RS256".to_string(),
            kid: KEY_ID.to_string(),
            n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        };

        Ok(Self {
            encoding_key,
            jwks: JwkSet { keys: vec![jwk] },
        })
    }

    pub fn jwks(&self) -> &JwkSet {
        &self.jwks
    }

    /// Sign an ID token with `alg=RS256` and the published kid.
    pub fn sign_id_token(&self, claims: &IdTokenClaims) -> Result<String, jsonwebtoken::errors::Error> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KEY_ID.to_string());
        jsonwebtoken::encode(&header, claims, &self.encoding_key)
    }
}
