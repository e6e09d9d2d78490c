/*
 * Responsibility
 * - credential hashing and verification
 * - primary format: scrypt, stored as `base64(salt)$base64(derived key)`;
 *   the base64 TEXT of the salt is the scrypt salt input
 * - legacy format: bcrypt (`$2...` prefixed), verified read-only; rehash
 *   happens on the next password change, not here
 */
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use scrypt::Params;
use subtle::ConstantTimeEq;
use thiserror::Error;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

fn scrypt_params() -> Params {
    // log2(N)=14, r=8, p=1, 64-byte output. Matches existing stored hashes;
    // changing these silently locks every local account out.
    Params::new(14, 8, 1, KEY_LEN).expect("static scrypt params are valid")
}

fn derive(password: &str, salt_b64: &str) -> Result<Vec<u8>, PasswordError> {
    let mut out = vec![0u8; KEY_LEN];
    scrypt::scrypt(
        password.as_bytes(),
        salt_b64.as_bytes(),
        &scrypt_params(),
        &mut out,
    )
    .map_err(|e| PasswordError::Hashing(e.to_string()))?;
    Ok(out)
}

/// Produces a `salt$key` scrypt hash with a fresh random salt.
///
/// CPU-bound; call through `spawn_blocking` from async contexts.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt: [u8; SALT_LEN] = rand::random();
    let salt_b64 = STANDARD.encode(salt);
    let derived = derive(password, &salt_b64)?;
    Ok(format!("{salt_b64}${}", STANDARD.encode(derived)))
}

/// Verifies `password` against a stored hash. Fails closed: `None`,
/// malformed, or unrecognized hashes all return `false`.
///
/// CPU-bound; call through `spawn_blocking` from async contexts.
pub fn verify_password(stored: Option<&str>, password: &str) -> bool {
    let Some(stored) = stored else {
        return false;
    };

    if let Some((salt_b64, key_b64)) = stored.split_once('$')
        && !stored.starts_with("$2")
    {
        let Ok(expected) = STANDARD.decode(key_b64) else {
            return false;
        };
        let Ok(derived) = derive(password, salt_b64) else {
            return false;
        };
        if derived.len() != expected.len() {
            return false;
        }
        return derived.ct_eq(&expected).into();
    }

    if stored.starts_with("$2") {
        return bcrypt::verify(password, stored).unwrap_or(false);
    }

    false
}
