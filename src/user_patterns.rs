//! Per-user pattern learning: delivery-frequency histograms that feed the
//! mental-model adjustment and the frequent-delivery temporal dampening
//! term. Keyed by a hashed user id so raw identifiers never sit in memory;
//! counts decay with a 7-day half-life so stale habits fade rather than
//! accumulate forever. Profiles are cached in memory but write through to
//! the host-provided `KvStore` under `user_patterns/<hash>`, so state
//! survives a process restart on a durable store.

use crate::error::CoreError;
use crate::storage::KvStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const HALF_LIFE_DAYS: f64 = 7.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const FREQUENT_DELIVERY_WINDOW_DAYS: f64 = 7.0;
const FREQUENT_DELIVERY_THRESHOLD: usize = 3;
pub const FREQUENT_DELIVERY_DAMPENING: f64 = -0.15;

pub fn hash_user_id(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A 24-bin histogram of delivery-like events by hour of day, decayed
/// towards zero over time so old behavior stops influencing new scores,
/// plus a raw (hour, timestamp) log pruned to the last 7 days for the
/// "more than 3 confirmed deliveries this week at this hour" check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DeliveryHistogram {
    bins: [f64; 24],
    last_decay_at: f64,
    recent_events: Vec<(u32, f64)>,
}

impl DeliveryHistogram {
    fn new(now: f64) -> Self {
        Self { bins: [0.0; 24], last_decay_at: now, recent_events: Vec::new() }
    }

    fn decay(&mut self, now: f64) {
        let elapsed_days = (now - self.last_decay_at).max(0.0) / SECONDS_PER_DAY;
        if elapsed_days <= 0.0 {
            return;
        }
        let factor = 0.5_f64.powf(elapsed_days / HALF_LIFE_DAYS);
        for bin in &mut self.bins {
            *bin *= factor;
        }
        self.last_decay_at = now;
    }

    fn record(&mut self, now: f64, hour: u32) {
        self.decay(now);
        self.bins[(hour % 24) as usize] += 1.0;
        self.recent_events.push((hour, now));
        let window = FREQUENT_DELIVERY_WINDOW_DAYS * SECONDS_PER_DAY;
        self.recent_events.retain(|(_, ts)| now - ts <= window);
    }

    /// Fraction of recorded (decayed) mass that falls in `hour`, used as a
    /// prior for "this household usually gets deliveries at this hour".
    fn frequency_at(&self, now: f64, hour: u32) -> f64 {
        let mut snapshot = self.clone();
        snapshot.decay(now);
        let total: f64 = snapshot.bins.iter().sum();
        if total <= 1e-9 {
            0.0
        } else {
            snapshot.bins[(hour % 24) as usize] / total
        }
    }

    /// Count of confirmed deliveries at this hour within the past 7 days.
    fn recent_count_at(&self, now: f64, hour: u32) -> usize {
        let window = FREQUENT_DELIVERY_WINDOW_DAYS * SECONDS_PER_DAY;
        self.recent_events.iter().filter(|(h, ts)| *h == hour && now - ts <= window).count()
    }
}

/// Learned per-user state. Only delivery-chain-pattern events are recorded;
/// everything else leaves the profile untouched.
#[derive(Debug)]
pub struct UserPatternStore {
    profiles: RwLock<HashMap<String, DeliveryHistogram>>,
}

impl Default for UserPatternStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserPatternStore {
    pub fn new() -> Self {
        Self { profiles: RwLock::new(HashMap::new()) }
    }

    pub fn record_delivery(&self, storage: &dyn KvStore, hashed_user_id: &str, now: f64, hour: u32) -> Result<(), CoreError> {
        self.ensure_loaded(storage, hashed_user_id, now);
        {
            let mut profiles = self.profiles.write();
            profiles
                .entry(hashed_user_id.to_string())
                .or_insert_with(|| DeliveryHistogram::new(now))
                .record(now, hour);
        }
        self.persist(storage, hashed_user_id)
    }

    /// The learned "mental model" adjustment for this user/hour: positive
    /// frequency nudges the rule score down (deliveries at this hour are
    /// routine), capped to ±0.10 by the caller in `fusion::RuleContext`.
    pub fn mental_model_adjustment(&self, storage: &dyn KvStore, hashed_user_id: &str, now: f64, hour: u32) -> f64 {
        self.ensure_loaded(storage, hashed_user_id, now);
        let profiles = self.profiles.read();
        match profiles.get(hashed_user_id) {
            Some(histogram) => -histogram.frequency_at(now, hour) * 0.10,
            None => 0.0,
        }
    }

    /// Additional temporal-dampening term: more than
    /// `FREQUENT_DELIVERY_THRESHOLD` confirmed deliveries in the past 7 days
    /// at this hour makes this a routine delivery slot.
    pub fn frequent_delivery_dampening(&self, storage: &dyn KvStore, hashed_user_id: &str, now: f64, hour: u32) -> f64 {
        self.ensure_loaded(storage, hashed_user_id, now);
        let profiles = self.profiles.read();
        match profiles.get(hashed_user_id) {
            Some(histogram) if histogram.recent_count_at(now, hour) > FREQUENT_DELIVERY_THRESHOLD => FREQUENT_DELIVERY_DAMPENING,
            _ => 0.0,
        }
    }

    fn storage_key(hashed_user_id: &str) -> String {
        format!("user_patterns/{hashed_user_id}")
    }

    /// Seeds the in-memory cache from `storage` on first touch of a user id
    /// this process hasn't seen yet, falling back to a fresh profile if
    /// storage has nothing (or fails to read).
    fn ensure_loaded(&self, storage: &dyn KvStore, hashed_user_id: &str, now: f64) {
        if self.profiles.read().contains_key(hashed_user_id) {
            return;
        }
        let loaded = storage
            .get(&Self::storage_key(hashed_user_id))
            .ok()
            .flatten()
            .and_then(|bytes| serde_json::from_slice::<DeliveryHistogram>(&bytes).ok());
        let mut profiles = self.profiles.write();
        profiles.entry(hashed_user_id.to_string()).or_insert_with(|| loaded.unwrap_or_else(|| DeliveryHistogram::new(now)));
    }

    fn persist(&self, storage: &dyn KvStore, hashed_user_id: &str) -> Result<(), CoreError> {
        let bytes = {
            let profiles = self.profiles.read();
            let histogram = profiles.get(hashed_user_id).expect("ensure_loaded/record just populated this entry");
            serde_json::to_vec(histogram).map_err(|_| CoreError::Internal { stage: "user_pattern_persist" })?
        };
        storage.put(&Self::storage_key(hashed_user_id), bytes)
    }
}
