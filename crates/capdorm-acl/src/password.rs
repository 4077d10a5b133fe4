//! Salted password digests.
//!
//! Stored form: `<salt hex>$<blake3(salt || password) hex>`.

const SALT_LEN: usize = 16;

/// Digest `password` under a fresh random salt.
pub(crate) fn hash(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    format!("{}${}", hex::encode(salt), digest(&salt, password).to_hex())
}

/// Check `password` against a stored digest. Malformed digests never match.
pub(crate) fn verify(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), blake3::Hash::from_hex(expected)) else {
        return false;
    };
    // blake3::Hash equality is constant-time.
    digest(&salt, password) == expected
}

fn digest(salt: &[u8], password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize()
}
