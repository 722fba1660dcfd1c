//! Rotation sampling: which tracked accounts get synced this cycle.
//!
//! The watch list is usually larger than the per-cycle budget, so cycles
//! draw a uniform sample from the handles not yet visited this rotation.
//! Visited handles live in a persisted cursor; once everyone has been
//! visited the cursor resets and a new rotation begins.

use std::collections::HashSet;

use followsignal_common::RotationCursor;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::info;

/// Sampling policy for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct Rotation {
    /// Accounts synced per cycle.
    pub batch_size: usize,
}

/// The batch chosen for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPlan {
    /// Handles to sync, at most `batch_size` of them.
    pub batch: Vec<String>,
    /// True when every handle had been visited and the rotation restarted.
    pub wrapped: bool,
}

impl Rotation {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    /// Pick the next batch from the handles not yet visited this rotation.
    ///
    /// Handles that left the watch list are pruned from the cursor first so
    /// a removed account can never wedge the rotation. Planning never marks
    /// anything visited: the caller advances the cursor afterwards, and only
    /// for handles whose sync actually succeeded.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        watchlist: &[String],
        cursor: &mut RotationCursor,
        rng: &mut R,
    ) -> RotationPlan {
        let known: HashSet<String> = watchlist.iter().cloned().collect();
        let pruned = cursor.retain_known(&known);
        if pruned > 0 {
            info!(pruned, "Dropped departed handles from the rotation cursor");
        }

        let mut remaining: Vec<&String> =
            watchlist.iter().filter(|h| !cursor.contains(h)).collect();
        let mut wrapped = false;
        if remaining.is_empty() && !watchlist.is_empty() {
            cursor.clear();
            remaining = watchlist.iter().collect();
            wrapped = true;
        }

        let batch: Vec<String> = if remaining.len() > self.batch_size {
            remaining
                .choose_multiple(rng, self.batch_size)
                .map(|h| (*h).clone())
                .collect()
        } else {
            remaining.into_iter().cloned().collect()
        };

        RotationPlan { batch, wrapped }
    }
}
