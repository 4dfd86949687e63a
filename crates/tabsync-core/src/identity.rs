//! Per-instance identity and message ID minting.
//!
//! An instance is one running IDE process holding one project. Its ID is
//! `{hostname}-{md5(project_path)[0..6]}-{pid}`: stable for the process
//! lifetime, unique across IDE processes on the same host, and equal only
//! for a process talking to itself (which the inbound filter drops).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identifier for one IDE process + project pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Derive the identity for this process.
    pub fn derive(project_path: &str) -> Self {
        let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "unknown".into());
        Self::from_parts(&hostname, project_path, std::process::id())
    }

    /// Build an identity from explicit parts.
    pub fn from_parts(hostname: &str, project_path: &str, pid: u32) -> Self {
        let digest = format!("{:x}", md5::compute(project_path.as_bytes()));
        Self(format!("{}-{}-{}", hostname, &digest[..6], pid))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for InstanceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mints message IDs of the form `{instance_id}-{sequence}-{epoch_ms}`.
///
/// The sequence is strictly increasing across the process lifetime, so two
/// messages enqueued in order always carry increasing sequence numbers.
pub struct MessageIdMint {
    instance: InstanceId,
    sequence: AtomicU64,
}

impl MessageIdMint {
    pub fn new(instance: InstanceId) -> Self {
        Self {
            instance,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// Mint the next message ID using the given envelope timestamp.
    pub fn next(&self, epoch_ms: u64) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}-{}", self.instance, seq, epoch_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_shape() {
        let id = InstanceId::from_parts("devbox", "/home/u/proj", 4242);
        let s = id.as_str();
        assert!(s.starts_with("devbox-"));
        assert!(s.ends_with("-4242"));
        // hostname + 6 hex chars + pid
        let middle = &s["devbox-".len()..s.len() - "-4242".len()];
        assert_eq!(middle.len(), 6);
        assert!(middle.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_same_project_same_digest() {
        let a = InstanceId::from_parts("h", "/home/u/proj", 1);
        let b = InstanceId::from_parts("h", "/home/u/proj", 2);
        // Only the pid differs.
        assert_eq!(a.as_str()[..a.as_str().len() - 1], b.as_str()[..b.as_str().len() - 1]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_project_different_digest() {
        let a = InstanceId::from_parts("h", "/home/u/proj", 1);
        let b = InstanceId::from_parts("h", "/home/u/other", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = InstanceId::from_parts("h", "/p", 7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: InstanceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_mint_sequence_strictly_increasing() {
        let mint = MessageIdMint::new(InstanceId::from_parts("h", "/p", 7));
        let ids: Vec<String> = (0..5).map(|_| mint.next(1_000)).collect();

        let seqs: Vec<u64> = ids
            .iter()
            .map(|id| {
                let parts: Vec<&str> = id.rsplitn(3, '-').collect();
                parts[1].parse().unwrap()
            })
            .collect();

        for pair in seqs.windows(2) {
            assert!(pair[0] < pair[1], "sequence not increasing: {:?}", seqs);
        }
    }

    #[test]
    fn test_mint_embeds_instance_and_timestamp() {
        let instance = InstanceId::from_parts("h", "/p", 7);
        let mint = MessageIdMint::new(instance.clone());
        let id = mint.next(1_234_567);
        assert!(id.starts_with(instance.as_str()));
        assert!(id.ends_with("-1234567"));
    }
}
