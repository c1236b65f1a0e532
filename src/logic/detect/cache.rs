//! Detection Cache - Frame Signature Dedup
//!
//! Visually-identical consecutive frames should not re-run the classifier.
//! Frames are keyed by a cheap perceptual signature; entries expire after a
//! fixed TTL and are swept on every lookup. Signature collisions are an
//! accepted tradeoff - the signature is coarse, not cryptographic.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::constants;
use crate::logic::capture::Frame;

/// Pixel sampling stride for the signature.
const SIGNATURE_STRIDE: usize = 64;

/// Wall-clock bucket folded into the signature (milliseconds).
const TIME_BUCKET_MS: u64 = 1_000;

// ============================================================================
// SIGNATURE
// ============================================================================

/// Cheap perceptual signature: dimensions + strided pixel samples + coarse
/// time bucket. Two captures of the same still screen inside one bucket
/// collide on purpose.
pub fn frame_signature(frame: &Frame) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&frame.width.to_le_bytes());
    hasher.update(&frame.height.to_le_bytes());

    let mut idx = 0;
    while idx < frame.rgba.len() {
        hasher.update(&[frame.rgba[idx]]);
        idx += SIGNATURE_STRIDE;
    }

    hasher.update(&(frame.wall_ms / TIME_BUCKET_MS).to_le_bytes());
    hasher.finalize()
}

// ============================================================================
// CACHE
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    at: Instant,
    should_blur: bool,
}

#[derive(Debug, Clone, Copy)]
struct RecentDetection {
    at: Instant,
    was_inappropriate: bool,
}

/// Result of a cache probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLookup {
    pub cached: bool,
    pub decision: Option<bool>,
}

/// Per-frame decision cache plus the short recent-detection list feeding
/// consecutive-detection smoothing. Owned by the frame-processing stream;
/// nothing else writes here.
pub struct DetectionCache {
    entries: HashMap<u32, CacheEntry>,
    recent: Vec<RecentDetection>,
    hits: u64,
    misses: u64,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            recent: Vec::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Probe for a cached decision. Expired entries are swept first, so a
    /// stale hit is impossible.
    pub fn lookup(&mut self, signature: u32, now: Instant) -> CacheLookup {
        self.sweep(now);

        match self.entries.get(&signature) {
            Some(entry) => {
                self.hits += 1;
                CacheLookup {
                    cached: true,
                    decision: Some(entry.should_blur),
                }
            }
            None => {
                self.misses += 1;
                CacheLookup {
                    cached: false,
                    decision: None,
                }
            }
        }
    }

    /// Store the decision for a signature. One entry per signature.
    pub fn insert(&mut self, signature: u32, should_blur: bool, now: Instant) {
        self.entries.insert(
            signature,
            CacheEntry {
                at: now,
                should_blur,
            },
        );
    }

    /// Record a processed frame's outcome in the recent-detection list.
    pub fn record_detection(&mut self, was_inappropriate: bool, now: Instant) {
        self.recent.push(RecentDetection {
            at: now,
            was_inappropriate,
        });
    }

    /// Inappropriate detections still inside the recent window.
    pub fn recent_inappropriate(&self, now: Instant) -> usize {
        let ttl = Duration::from_millis(constants::RECENT_DETECTION_TTL_MS);
        self.recent
            .iter()
            .filter(|d| d.was_inappropriate && now.duration_since(d.at) < ttl)
            .count()
    }

    /// O(n) age sweep; n stays small because it is bounded by
    /// frames-per-TTL-window.
    fn sweep(&mut self, now: Instant) {
        let cache_ttl = Duration::from_millis(constants::CACHE_TTL_MS);
        self.entries
            .retain(|_, e| now.duration_since(e.at) < cache_ttl);

        let recent_ttl = Duration::from_millis(constants::RECENT_DETECTION_TTL_MS);
        self.recent
            .retain(|d| now.duration_since(d.at) < recent_ttl);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recent.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_frames_share_signature() {
        let a = Frame::new(vec![128; 4 * 64 * 64], 64, 64);
        let mut b = a.clone();
        b.wall_ms = a.wall_ms; // same bucket
        assert_eq!(frame_signature(&a), frame_signature(&b));
    }

    #[test]
    fn test_different_content_changes_signature() {
        let a = Frame::new(vec![128; 4 * 64 * 64], 64, 64);
        let mut b = a.clone();
        for px in b.rgba.iter_mut() {
            *px = 10;
        }
        assert_ne!(frame_signature(&a), frame_signature(&b));
    }

    #[test]
    fn test_time_bucket_changes_signature() {
        let a = Frame::new(vec![128; 4 * 64 * 64], 64, 64);
        let mut b = a.clone();
        b.wall_ms = a.wall_ms + 10 * TIME_BUCKET_MS;
        assert_ne!(frame_signature(&a), frame_signature(&b));
    }

    #[test]
    fn test_hit_within_ttl() {
        let mut cache = DetectionCache::new();
        let now = Instant::now();

        cache.insert(42, true, now);
        let lookup = cache.lookup(42, now + Duration::from_millis(1_000));

        assert!(lookup.cached);
        assert_eq!(lookup.decision, Some(true));
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let mut cache = DetectionCache::new();
        let now = Instant::now();

        cache.insert(42, true, now);
        let lookup = cache.lookup(
            42,
            now + Duration::from_millis(constants::CACHE_TTL_MS + 100),
        );

        assert!(!lookup.cached);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_one_entry_per_signature() {
        let mut cache = DetectionCache::new();
        let now = Instant::now();

        cache.insert(42, true, now);
        cache.insert(42, false, now + Duration::from_millis(10));

        assert_eq!(cache.len(), 1);
        let lookup = cache.lookup(42, now + Duration::from_millis(20));
        assert_eq!(lookup.decision, Some(false));
    }

    #[test]
    fn test_recent_detections_expire() {
        let mut cache = DetectionCache::new();
        let now = Instant::now();

        cache.record_detection(true, now);
        cache.record_detection(true, now + Duration::from_millis(100));
        cache.record_detection(false, now + Duration::from_millis(200));

        assert_eq!(cache.recent_inappropriate(now + Duration::from_millis(300)), 2);

        let later = now + Duration::from_millis(constants::RECENT_DETECTION_TTL_MS + 300);
        assert_eq!(cache.recent_inappropriate(later), 0);
    }
}
