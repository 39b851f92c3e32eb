//! Transcript fingerprinting
//!
//! A chain invocation is reproducible when the same model behaviour yields
//! the same transcript. The SHA-256 of the serialized transcript makes that
//! cheap to compare across runs.

use crate::models::Message;
use sha2::{Digest, Sha256};
use std::io::Write;

/// Hex SHA-256 of the serialized message sequence.
/// Streams JSON straight into the hasher.
pub fn transcript_hash(messages: &[Message]) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(DigestWriter(&mut hasher), messages).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Sink for the transcript serializer: every byte goes into the digest,
/// nothing is buffered
struct DigestWriter<'a>(&'a mut Sha256);

impl Write for DigestWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_content_sensitive() {
        let a = vec![Message::system("sys"), Message::user("Run the program 7 times")];
        let b = a.clone();
        let c = vec![Message::system("sys"), Message::user("Run the program 8 times")];

        let hash_a = transcript_hash(&a);
        assert_eq!(hash_a.len(), 64);
        assert_eq!(hash_a, transcript_hash(&b));
        assert_ne!(hash_a, transcript_hash(&c));
    }

    #[test]
    fn test_streamed_hash_matches_serialized_bytes() {
        let messages = vec![Message::system("sys"), Message::tool("add_to_array", "{\"added\":7}")];
        let bytes = serde_json::to_vec(&messages).unwrap();
        assert_eq!(transcript_hash(&messages), hex::encode(Sha256::digest(&bytes)));
    }

    #[test]
    fn test_role_is_part_of_the_hash() {
        let user = vec![Message::user("hello")];
        let assistant = vec![Message::assistant("hello")];
        assert_ne!(transcript_hash(&user), transcript_hash(&assistant));
    }
}
