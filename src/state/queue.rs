use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::services::identity::AuthorizedIdentity;

/// Inclusive age window a participant is willing to be paired within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    /// Lower bound, inclusive.
    pub min: u8,
    /// Upper bound, inclusive.
    pub max: u8,
}

impl AgeRange {
    fn contains(&self, age: u8) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

/// Approximate geographic position used for the distance filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Matching preferences supplied at enqueue time.
///
/// `age` and `location` are what the participant discloses about themselves;
/// `age_range` and `max_distance_km` are the filters they apply to the other
/// side. A filter whose counterpart attribute is undisclosed is unsatisfied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    /// Disclosed age of this participant.
    pub age: Option<u8>,
    /// Acceptable age window for the counterpart.
    pub age_range: Option<AgeRange>,
    /// Disclosed position of this participant.
    pub location: Option<GeoPoint>,
    /// Maximum distance to the counterpart, in kilometres.
    pub max_distance_km: Option<u32>,
}

impl Preferences {
    /// Whether this participant's filters accept the counterpart.
    fn accepts(&self, other: &Preferences) -> bool {
        if let Some(range) = self.age_range {
            match other.age {
                Some(age) if range.contains(age) => {}
                _ => return false,
            }
        }

        if let Some(max_km) = self.max_distance_km {
            match (self.location, other.location) {
                (Some(here), Some(there)) if approx_distance_km(here, there) <= max_km as f64 => {}
                _ => return false,
            }
        }

        true
    }
}

/// Mean earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Equirectangular distance approximation, accurate enough for a coarse
/// "within N km" filter and cheap enough for the queue scan.
fn approx_distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let mean_lat = (a.latitude + b.latitude).to_radians() / 2.0;
    let dx = (b.longitude - a.longitude).to_radians() * mean_lat.cos();
    let dy = (b.latitude - a.latitude).to_radians();
    (dx * dx + dy * dy).sqrt() * EARTH_RADIUS_KM
}

/// A waiting identity's claim to be paired.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Handle returned to the client, used to poll and cancel.
    pub ticket: Uuid,
    /// The waiting identity.
    pub identity: AuthorizedIdentity,
    /// When the entry joined the pool; drives FIFO order and the wait bound.
    pub enqueued_at: OffsetDateTime,
    /// Matching preferences for this entry.
    pub preferences: Preferences,
}

impl QueueEntry {
    /// Create a fresh entry with a newly allocated ticket.
    pub fn new(
        identity: AuthorizedIdentity,
        preferences: Preferences,
        enqueued_at: OffsetDateTime,
    ) -> Self {
        Self {
            ticket: Uuid::new_v4(),
            identity,
            enqueued_at,
            preferences,
        }
    }

    fn expired(&self, now: OffsetDateTime, max_wait: Duration) -> bool {
        now - self.enqueued_at >= max_wait
    }
}

/// Two entries are pairable when both filters are satisfied symmetrically.
fn compatible(a: &QueueEntry, b: &QueueEntry) -> bool {
    a.preferences.accepts(&b.preferences) && b.preferences.accepts(&a.preferences)
}

/// FIFO pool of waiting entries.
///
/// All mutations happen under the pool lock held by the queue service, which
/// is what makes pairing atomic with respect to concurrent enqueue/cancel.
#[derive(Debug, Default)]
pub struct MatchmakingPool {
    entries: Vec<QueueEntry>,
}

impl MatchmakingPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of waiting entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no waiting entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the identity already holds a ticket.
    pub fn contains_identity(&self, identity: &AuthorizedIdentity) -> bool {
        self.entries.iter().any(|entry| &entry.identity == identity)
    }

    /// Look up a waiting entry by ticket.
    pub fn get(&self, ticket: Uuid) -> Option<&QueueEntry> {
        self.entries.iter().find(|entry| entry.ticket == ticket)
    }

    /// Append an entry at the back of the FIFO pool.
    pub fn insert(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    /// Remove and return the entry holding the given ticket.
    pub fn remove(&mut self, ticket: Uuid) -> Option<QueueEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.ticket == ticket)?;
        Some(self.entries.remove(index))
    }

    /// Remove and return every entry that waited beyond the bound.
    pub fn drain_expired(&mut self, now: OffsetDateTime, max_wait: Duration) -> Vec<QueueEntry> {
        let mut expired = Vec::new();
        self.entries.retain(|entry| {
            if entry.expired(now, max_wait) {
                expired.push(entry.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Remove and return the two oldest mutually compatible entries.
    ///
    /// The scan is strictly FIFO: the oldest entry is offered the oldest
    /// compatible counterpart, so no newer entry can jump the queue. This
    /// bounds the maximum wait and keeps starvation observable in tests.
    pub fn take_oldest_pair(&mut self) -> Option<(QueueEntry, QueueEntry)> {
        for first in 0..self.entries.len() {
            for second in (first + 1)..self.entries.len() {
                if compatible(&self.entries[first], &self.entries[second]) {
                    // Remove the later index first so `first` stays valid.
                    let b = self.entries.remove(second);
                    let a = self.entries.remove(first);
                    return Some((a, b));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::{IdentityVerifier, OpaqueTokenVerifier};

    fn identity(name: &str) -> AuthorizedIdentity {
        OpaqueTokenVerifier.verify(name).unwrap()
    }

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000 + secs).unwrap()
    }

    fn entry(name: &str, secs: i64) -> QueueEntry {
        QueueEntry::new(identity(name), Preferences::default(), at(secs))
    }

    fn entry_with(name: &str, secs: i64, preferences: Preferences) -> QueueEntry {
        QueueEntry::new(identity(name), preferences, at(secs))
    }

    #[test]
    fn pairing_is_fifo_fair() {
        let mut pool = MatchmakingPool::new();
        pool.insert(entry("t1", 0));
        pool.insert(entry("t2", 1));
        pool.insert(entry("t3", 2));

        let (a, b) = pool.take_oldest_pair().unwrap();
        assert_eq!(a.identity.as_str(), "t1");
        assert_eq!(b.identity.as_str(), "t2");
        assert_eq!(pool.len(), 1);
        assert!(pool.take_oldest_pair().is_none());
    }

    #[test]
    fn incompatible_head_is_skipped_without_starving_the_rest() {
        let narrow = Preferences {
            age: Some(51),
            age_range: Some(AgeRange { min: 50, max: 60 }),
            ..Preferences::default()
        };
        let mut pool = MatchmakingPool::new();
        pool.insert(entry_with("picky", 0, narrow));
        pool.insert(entry_with("young-1", 1, Preferences {
            age: Some(25),
            ..Preferences::default()
        }));
        pool.insert(entry_with("young-2", 2, Preferences {
            age: Some(27),
            ..Preferences::default()
        }));

        let (a, b) = pool.take_oldest_pair().unwrap();
        assert_eq!(a.identity.as_str(), "young-1");
        assert_eq!(b.identity.as_str(), "young-2");
        assert!(pool.contains_identity(&identity("picky")));
    }

    #[test]
    fn age_filter_must_hold_symmetrically() {
        let a = entry_with("a", 0, Preferences {
            age: Some(30),
            age_range: Some(AgeRange { min: 25, max: 35 }),
            ..Preferences::default()
        });
        // Accepts a's age but discloses an age outside a's window.
        let b = entry_with("b", 1, Preferences {
            age: Some(45),
            age_range: Some(AgeRange { min: 20, max: 60 }),
            ..Preferences::default()
        });
        assert!(!compatible(&a, &b));
    }

    #[test]
    fn undisclosed_attribute_fails_the_filter() {
        let filtering = entry_with("filtering", 0, Preferences {
            age_range: Some(AgeRange { min: 20, max: 30 }),
            ..Preferences::default()
        });
        let silent = entry("silent", 1);
        assert!(!compatible(&filtering, &silent));

        // No filters on either side pairs unconditionally.
        assert!(compatible(&entry("x", 0), &entry("y", 1)));
    }

    #[test]
    fn distance_filter_uses_disclosed_locations() {
        let paris = GeoPoint {
            latitude: 48.8566,
            longitude: 2.3522,
        };
        let versailles = GeoPoint {
            latitude: 48.8049,
            longitude: 2.1204,
        };
        let marseille = GeoPoint {
            latitude: 43.2965,
            longitude: 5.3698,
        };

        let near = |name: &str, location, secs| {
            entry_with(name, secs, Preferences {
                location: Some(location),
                max_distance_km: Some(50),
                ..Preferences::default()
            })
        };

        assert!(compatible(&near("a", paris, 0), &near("b", versailles, 1)));
        assert!(!compatible(&near("a", paris, 0), &near("c", marseille, 1)));
    }

    #[test]
    fn expired_entries_are_drained() {
        let mut pool = MatchmakingPool::new();
        pool.insert(entry("old", 0));
        pool.insert(entry("fresh", 100));

        let expired = pool.drain_expired(at(130), Duration::from_secs(120));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].identity.as_str(), "old");
        assert_eq!(pool.len(), 1);
        assert!(pool.contains_identity(&identity("fresh")));
    }

    #[test]
    fn remove_by_ticket() {
        let mut pool = MatchmakingPool::new();
        let entry = entry("solo", 0);
        let ticket = entry.ticket;
        pool.insert(entry);

        assert!(pool.get(ticket).is_some());
        assert!(pool.remove(ticket).is_some());
        assert!(pool.remove(ticket).is_none());
        assert!(pool.is_empty());
    }
}
