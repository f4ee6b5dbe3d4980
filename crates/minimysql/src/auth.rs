//! Password scramble for `mysql_native_password`.
//!
//! The server never sees the password. It sends a 20-byte random seed in its
//! greeting and the client answers with:
//!
//! ```text
//! SHA1(password) XOR SHA1(seed + SHA1(SHA1(password)))
//! ```
//!
//! The server stores `SHA1(SHA1(password))`, so it can undo the XOR and check
//! the result without holding the plaintext.

use sha1::{Digest, Sha1};

/// Size of the seed and of the scramble (SHA-1 digest size).
pub const SCRAMBLE_LENGTH: usize = 20;

/// Plugin name logged with the login packet.
pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";

fn sha1(parts: &[&[u8]]) -> [u8; SCRAMBLE_LENGTH] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Compute the authentication response for `password` against `seed`.
///
/// An empty password yields `None`: the login packet then carries a
/// zero-length response and the server checks for an account without a
/// password.
pub fn scramble_password(
    password: &str,
    seed: &[u8; SCRAMBLE_LENGTH],
) -> Option<[u8; SCRAMBLE_LENGTH]> {
    if password.is_empty() {
        return None;
    }

    let stage1 = sha1(&[password.as_bytes()]);
    let stage2 = sha1(&[&stage1[..]]);
    let stage3 = sha1(&[&seed[..], &stage2[..]]);

    let mut scramble = [0u8; SCRAMBLE_LENGTH];
    for (out, (a, b)) in scramble.iter_mut().zip(stage1.iter().zip(stage3.iter())) {
        *out = a ^ b;
    }
    Some(scramble)
}
