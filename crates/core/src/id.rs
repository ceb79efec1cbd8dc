// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-size inline ID buffers.
//!
//! Keys in this system are content hashes (hex-encoded sha256), not random
//! IDs, so unlike a nanoid-based ID there is no type prefix: the buffer just
//! needs to hold 64 ASCII hex bytes inline without a heap allocation, and
//! support `Borrow<str>` so it can be used directly as a `HashMap` key.

use sha2::{Digest, Sha256};

/// Byte length of a hex-encoded sha256 digest.
pub const KEY_LEN: usize = 64;

/// Fixed-size inline buffer. Always exactly `KEY_LEN` ASCII bytes, `Copy`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyBuf {
    buf: [u8; KEY_LEN],
}

impl std::hash::Hash for KeyBuf {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Hash only via as_str so it matches str::hash, required for
        // Borrow<str> HashMap lookups.
        self.as_str().hash(state);
    }
}

impl KeyBuf {
    pub fn new(s: &str) -> Self {
        debug_assert_eq!(s.len(), KEY_LEN, "key must be {} bytes: {:?}", KEY_LEN, s);
        let mut buf = [0u8; KEY_LEN];
        let n = s.len().min(KEY_LEN);
        buf[..n].copy_from_slice(&s.as_bytes()[..n]);
        Self { buf }
    }

    pub fn as_str(&self) -> &str {
        // Invariant: only constructed from ASCII hex digests, always valid UTF-8.
        match std::str::from_utf8(&self.buf) {
            Ok(s) => s,
            Err(_) => unreachable!("KeyBuf constructed from non-UTF-8"),
        }
    }
}

impl std::borrow::Borrow<str> for KeyBuf {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Debug for KeyBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for KeyBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl serde::Serialize for KeyBuf {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for KeyBuf {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <&str>::deserialize(deserializer)?;
        if s.len() != KEY_LEN {
            return Err(serde::de::Error::custom(format!(
                "key must be {} bytes: {:?}",
                KEY_LEN, s
            )));
        }
        Ok(KeyBuf::new(s))
    }
}

/// The identity of a job: `sha256(cmd || '\0' || cwd)`, hex-encoded.
///
/// Two submissions with the same command and working directory always
/// produce the same key, which is what lets `Add` treat re-submission of an
/// already-queued job as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct JobKey(pub KeyBuf);

impl JobKey {
    pub fn derive(cmd: &str, cwd: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(cmd.as_bytes());
        hasher.update([0u8]);
        hasher.update(cwd.as_bytes());
        let digest = hasher.finalize();
        let hex = hex_encode(&digest);
        Self(KeyBuf::new(&hex))
    }

    pub fn from_string(s: impl AsRef<str>) -> Self {
        Self(KeyBuf::new(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

impl From<&str> for JobKey {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for JobKey {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl std::borrow::Borrow<str> for JobKey {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl std::ops::Deref for JobKey {
    type Target = str;

    fn deref(&self) -> &str {
        self.0.as_str()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0xf) as usize] as char);
    }
    out
}

/// Replication group name: a plain string newtype for `Borrow<str>` map
/// lookups, e.g. `RepGroupIndex: HashMap<RepGroupName, IndexSet<JobKey>>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RepGroupName(pub String);

impl RepGroupName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepGroupName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RepGroupName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RepGroupName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for RepGroupName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_stable_and_content_addressed() {
        let a = JobKey::derive("echo hi", "/tmp/a");
        let b = JobKey::derive("echo hi", "/tmp/a");
        let c = JobKey::derive("echo hi", "/tmp/b");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), KEY_LEN);
    }

    #[test]
    fn key_roundtrips_through_json() {
        let key = JobKey::derive("make test", "/srv/app");
        let json = serde_json::to_string(&key).unwrap();
        let back: JobKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
