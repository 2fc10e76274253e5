//! Session identity and client-side session id generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const RANDOM_SUFFIX_LEN: usize = 8;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Collector-specific session id prefix.
///
/// The heatmap tracker and the recorder never share a session object, so
/// their ids are distinguishable at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPrefix {
    /// Heatmap tracker sessions (`hm_`).
    Heatmap,
    /// Session recorder sessions (`rec_`).
    Recorder,
}

impl SessionPrefix {
    /// Returns the textual prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPrefix::Heatmap => "hm",
            SessionPrefix::Recorder => "rec",
        }
    }
}

/// Generates opaque session ids of the form `<prefix>_<time>_<random>`.
#[derive(Debug, Clone)]
pub struct SessionIdGenerator {
    rng: StdRng,
}

impl SessionIdGenerator {
    /// Creates a generator seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Creates a deterministic generator for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generates one session id.
    pub fn generate(&mut self, prefix: SessionPrefix, now_ms: u64) -> String {
        let suffix: String = (0..RANDOM_SUFFIX_LEN)
            .map(|_| BASE36[self.rng.random_range(0..BASE36.len())] as char)
            .collect();
        format!("{}_{}_{suffix}", prefix.as_str(), to_base36(now_ms))
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Identity of one logical visit as seen by one collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    session_id: String,
    user_id: Option<String>,
    recording_id: Option<String>,
    started_at_ms: u64,
}

impl SessionIdentity {
    /// Creates a session that started at `started_at_ms`.
    pub fn new(
        session_id: impl Into<String>,
        user_id: Option<String>,
        started_at_ms: u64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            recording_id: None,
            started_at_ms,
        }
    }

    /// Client-generated session id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current external user id.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Replaces the user id for events created from now on.
    ///
    /// Blank ids clear the identity.
    pub fn update_user_id(&mut self, user_id: Option<String>) {
        self.user_id = user_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
    }

    /// Server-assigned recording id, once registration succeeded.
    pub fn recording_id(&self) -> Option<&str> {
        self.recording_id.as_deref()
    }

    /// Stores the recording id from the first successful registration.
    ///
    /// Returns `false` and keeps the existing id when one is already set or
    /// the new id is blank.
    pub fn set_recording_id(&mut self, recording_id: impl Into<String>) -> bool {
        let recording_id = recording_id.into();
        if self.recording_id.is_some() || recording_id.trim().is_empty() {
            return false;
        }
        self.recording_id = Some(recording_id);
        true
    }

    /// Epoch milliseconds at which the session started.
    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    /// Milliseconds elapsed since the session started.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix_and_are_unique() {
        let mut generator = SessionIdGenerator::with_seed(7);
        let first = generator.generate(SessionPrefix::Heatmap, 1_700_000_000_000);
        let second = generator.generate(SessionPrefix::Recorder, 1_700_000_000_000);

        assert!(first.starts_with("hm_"));
        assert!(second.starts_with("rec_"));
        assert_ne!(first[3..], second[4..]);
    }

    #[test]
    fn base36_encodes_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn recording_id_is_set_once() {
        let mut session = SessionIdentity::new("rec_1", None, 0);
        assert!(session.set_recording_id("r-1"));
        assert!(!session.set_recording_id("r-2"));
        assert_eq!(session.recording_id(), Some("r-1"));
    }
}
