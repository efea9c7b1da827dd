//! Correlation signer for `visit:<lesson id>:<hex mac>` tokens.
//!
//! The MAC is HMAC-SHA256 over `"visit:" + id`, truncated to its leftmost
//! 16 bytes so a whole token fits Telegram's 64-byte callback data limit.
//! Tokens are deterministic: the same key and id always give the same token.

use hmac::{Hmac, Mac};
use lessonbell_core::error::{LessonBellError, Result};
use lessonbell_core::types::LessonId;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Action prefix of a confirm token.
pub const VISIT_ACTION: &str = "visit";

/// Constant data of the "I did not attend" reply. Carries no lesson.
pub const DENY_SENTINEL: &str = "notvisited";

/// Bytes of the MAC kept in the token.
const SIGNATURE_LEN: usize = 16;
const MAX_TOKEN_LEN: usize = 64;

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidToken {
    #[error("token is malformed")]
    Malformed,
    #[error("token action is not recognised")]
    UnknownAction,
    #[error("token signature does not match")]
    SignatureMismatch,
}

/// Signs and verifies lesson correlation tokens with a symmetric key.
#[derive(Clone)]
pub struct CorrelationSigner {
    keyed: HmacSha256,
}

impl std::fmt::Debug for CorrelationSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationSigner")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl CorrelationSigner {
    /// Create a signer. The key must not be empty.
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(LessonBellError::Security("signing key is empty".into()));
        }
        let keyed = HmacSha256::new_from_slice(key)
            .map_err(|e| LessonBellError::Security(format!("bad signing key: {e}")))?;
        Ok(Self { keyed })
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(payload.as_bytes());
        mac
    }

    /// Token binding `id` to the visit action.
    pub fn sign(&self, id: LessonId) -> String {
        let payload = format!("{VISIT_ACTION}:{id}");
        let tag = self.mac(&payload).finalize().into_bytes();
        format!("{payload}:{}", hex::encode(&tag[..SIGNATURE_LEN]))
    }

    /// Recover the lesson id from a token produced by [`sign`](Self::sign).
    pub fn verify(&self, token: &str) -> std::result::Result<LessonId, InvalidToken> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(InvalidToken::Malformed);
        }
        let mut parts = token.splitn(3, ':');
        let (Some(action), Some(id), Some(signature)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(InvalidToken::Malformed);
        };
        if action != VISIT_ACTION {
            return Err(InvalidToken::UnknownAction);
        }
        let lesson_id = id.parse::<i64>().map_err(|_| InvalidToken::Malformed)?;
        if !is_lower_hex(signature) {
            return Err(InvalidToken::Malformed);
        }
        let signature = hex::decode(signature).map_err(|_| InvalidToken::Malformed)?;
        if signature.len() != SIGNATURE_LEN {
            return Err(InvalidToken::Malformed);
        }

        self.mac(&format!("{action}:{id}"))
            .verify_truncated_left(&signature)
            .map_err(|_| {
                tracing::debug!("Token signature mismatch for lesson id {id}");
                InvalidToken::SignatureMismatch
            })?;
        Ok(LessonId(lesson_id))
    }
}

/// Lowercase hex only, so every token has exactly one accepted spelling.
fn is_lower_hex(text: &str) -> bool {
    text.bytes()
        .all(|c| c.is_ascii_digit() || (b'a'..=b'f').contains(&c))
}
