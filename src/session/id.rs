//! Session identifier type and the built-in id generator.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};

use crate::error::SessionError;

/// Opaque token identifying one logical session.
///
/// Only ASCII letters, digits, `,` and `-` are accepted, which keeps ids
/// safe as file names and disjoint from reserved cache keys such as the
/// shadow index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Validate and wrap a raw id.
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionError> {
        let raw = raw.into();
        if Self::is_valid(&raw) {
            Ok(Self(raw))
        } else {
            Err(SessionError::InvalidSessionId(raw))
        }
    }

    /// Check whether `raw` would be accepted by [`SessionId::new`].
    pub fn is_valid(raw: &str) -> bool {
        !raw.is_empty()
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b',' || b == b'-')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Capability to mint fresh session ids.
///
/// Drivers that want to own id generation expose this through
/// [`crate::driver::SessionDriver::sid_generator`].
pub trait GenerateSid: Send + Sync {
    fn create_sid(&self, client_address: Option<&str>) -> SessionId;
}

/// Built-in id generator.
///
/// The id is `hex(sha256(address || timestamp || lcg || sample))`, cut to 32
/// characters. Nothing checks the result against existing ids, so a
/// collision is possible in principle.
#[derive(Debug, Clone, Default)]
pub struct SidGenerator {
    timestamp: Option<u64>,
    lcg: Option<f64>,
    sample: Option<String>,
}

impl SidGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the timestamp input (seconds).
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Pin the uniform `[0, 1)` input.
    pub fn with_lcg(mut self, lcg: f64) -> Self {
        self.lcg = Some(lcg);
        self
    }

    /// Pin the random sample input.
    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.sample = Some(sample.into());
        self
    }

    /// Hash the four inputs into an id.
    pub fn generate(&self, client_address: Option<&str>) -> SessionId {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let timestamp = self.timestamp.unwrap_or_else(|| now.as_secs());
        let lcg = self.lcg.unwrap_or_else(rand::random::<f64>);
        let sample = self
            .sample
            .clone()
            .unwrap_or_else(|| shuffled_sample(now.subsec_micros()));

        let mut hasher = Sha256::new();
        hasher.update(client_address.unwrap_or_default().as_bytes());
        hasher.update(timestamp.to_string().as_bytes());
        hasher.update(lcg.to_string().as_bytes());
        hasher.update(sample.as_bytes());
        let digest = hex::encode(hasher.finalize());

        SessionId(digest[..32].to_string())
    }
}

impl GenerateSid for SidGenerator {
    fn create_sid(&self, client_address: Option<&str>) -> SessionId {
        self.generate(client_address)
    }
}

/// Ten characters of a shuffled hex digest of the sub-second time.
fn shuffled_sample(micros: u32) -> String {
    let digest = hex::encode(Sha256::digest(micros.to_string().as_bytes()));
    let mut chars: Vec<char> = digest.chars().collect();
    chars.shuffle(&mut rand::rng());
    chars.into_iter().take(10).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_valid() {
        let id: SessionId = "abc123,-XYZ".parse().unwrap();
        assert_eq!(id.as_str(), "abc123,-XYZ");
        assert_eq!(id.to_string(), "abc123,-XYZ");
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<SessionId>().is_err());
        assert!("sess_index".parse::<SessionId>().is_err());
        assert!("../etc".parse::<SessionId>().is_err());
        assert!("has space".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_generated_shape() {
        let id = SidGenerator::new().generate(Some("10.0.0.1"));
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_pinned_inputs_are_deterministic() {
        let gen = SidGenerator::new()
            .with_timestamp(1_700_000_000)
            .with_lcg(0.25)
            .with_sample("abcdefghij");
        assert_eq!(gen.generate(Some("127.0.0.1")), gen.generate(Some("127.0.0.1")));
        assert_ne!(gen.generate(Some("127.0.0.1")), gen.generate(Some("127.0.0.2")));
    }

    #[test]
    fn test_unpinned_ids_differ() {
        let gen = SidGenerator::new();
        let ids: HashSet<_> = (0..1000).map(|_| gen.generate(None)).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_shuffled_sample_length() {
        assert_eq!(shuffled_sample(123_456).len(), 10);
    }
}
