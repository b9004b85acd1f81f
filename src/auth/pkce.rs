//! PKCE S256 verifier and challenge generation
//!
//! The authorization-code leg of the Okta flow binds the code to this client
//! with a Proof Key for Code Exchange (RFC 7636):
//!
//! 1. Generate a high-entropy `code_verifier` from the unreserved character
//!    set (`A-Z a-z 0-9 - . _ ~`).
//! 2. Send `BASE64URL(SHA256(verifier))` as `code_challenge` with
//!    `code_challenge_method=S256` on the authorize call.
//! 3. Send the original verifier as `code_verifier` on the token call.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use base64::Engine as _;
use rand::Rng as _;
use sha2::{Digest, Sha256};

/// Characters allowed in a code verifier (RFC 7636 section 4.1).
const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of generated verifiers. RFC 7636 allows 43 to 128.
pub const VERIFIER_LEN: usize = 64;

/// A PKCE S256 verifier and its derived challenge.
///
/// Exactly one pair is generated per authentication run. The verifier is
/// kept until the token exchange and then dropped with the grant.
///
/// # Examples
///
/// ```
/// use gimme_creds::auth::pkce;
///
/// let pair = pkce::generate();
/// assert_eq!(pair.verifier.len(), pkce::VERIFIER_LEN);
/// assert_eq!(pair.challenge, pkce::challenge_for(&pair.verifier));
/// ```
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// Sent to the token endpoint as `code_verifier`.
    pub verifier: String,

    /// Sent to the authorize endpoint as `code_challenge`.
    pub challenge: String,
}

impl PkcePair {
    /// The challenge method, always `S256`.
    pub const METHOD: &'static str = "S256";
}

/// Generates a fresh verifier/challenge pair.
///
/// The verifier is [`VERIFIER_LEN`] characters drawn uniformly from the
/// unreserved set using the thread-local CSPRNG.
pub fn generate() -> PkcePair {
    let mut rng = rand::rng();
    let verifier: String = (0..VERIFIER_LEN)
        .map(|_| UNRESERVED[rng.random_range(0..UNRESERVED.len())] as char)
        .collect();
    let challenge = challenge_for(&verifier);

    PkcePair {
        verifier,
        challenge,
    }
}

/// Computes the S256 challenge for a verifier:
/// `ASCII(BASE64URL(SHA256(ASCII(code_verifier))))` without padding.
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice())
}
