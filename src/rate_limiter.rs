//! Module for client-side submission cooldown.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A cooldown gate persisting the last submission timestamp across runs.
///
/// The state lives in a small client-local file holding unix milliseconds.
/// It is unauthenticated and trivially bypassed by deleting the file or
/// running from another directory: a UX throttle, never a security control.
/// Abuse prevention belongs on the server side.
#[derive(Debug)]
pub struct CooldownGate {
    state_path: PathBuf,
    cooldown: Duration,
}

impl CooldownGate {
    pub fn new(state_path: impl Into<PathBuf>, cooldown: Duration) -> Self {
        Self {
            state_path: state_path.into(),
            cooldown,
        }
    }

    /// Whether a submission within the cooldown window was already recorded.
    ///
    /// Missing or unreadable state counts as no prior submission.
    pub fn is_rate_limited(&self) -> bool {
        let Some(last) = self.last_submission_at() else {
            return false;
        };
        match SystemTime::now().duration_since(last) {
            Ok(elapsed) => elapsed < self.cooldown,
            // Clock went backwards since the record was written.
            Err(_) => true,
        }
    }

    /// Overwrites the persisted state with the current time.
    pub fn record_submission(&self) -> Result<(), crate::error::Error> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        std::fs::write(&self.state_path, millis.to_string())?;
        Ok(())
    }

    fn last_submission_at(&self) -> Option<SystemTime> {
        let content = std::fs::read_to_string(&self.state_path).ok()?;
        let millis: u64 = content.trim().parse().ok()?;
        Some(UNIX_EPOCH + Duration::from_millis(millis))
    }
}
