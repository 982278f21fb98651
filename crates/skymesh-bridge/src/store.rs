//! Aircraft state store.
//!
//! One exclusive lock guards both the track map and the admission window, so a
//! merge, an admission decision or a sweep never observes a half-updated
//! track. The lock is never held across an `.await`.

use crate::admission::{self, AdmissionLimits, RateWindow, Rejection};
use parking_lot::Mutex;
use skymesh_core::types::{IcaoAddress, Position};
use skymesh_sbs::{normalize_callsign, plausible_altitude, valid_position, TrackUpdate};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Merged state for one aircraft
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub icao: IcaoAddress,
    pub position: Option<Position>,
    pub altitude_ft: Option<u32>,
    pub callsign: Option<String>,
    /// Most recent record of any kind
    pub last_seen: Instant,
    /// Most recent confirmed announcement
    pub last_announced: Option<Instant>,
    /// An admitted dispatch has not reported its outcome yet
    pub dispatch_pending: bool,
}

impl Track {
    pub fn new(icao: IcaoAddress, now: Instant) -> Self {
        Self {
            icao,
            position: None,
            altitude_ft: None,
            callsign: None,
            last_seen: now,
            last_announced: None,
            dispatch_pending: false,
        }
    }

    /// Position and altitude are known. The identity always resolves, falling
    /// back to the address when no callsign has been seen.
    pub fn is_announceable(&self) -> bool {
        self.position.is_some() && self.altitude_ft.is_some()
    }

    /// Callsign, or `AC <ICAO>` when none has been received
    pub fn display_ident(&self) -> String {
        match &self.callsign {
            Some(callsign) => callsign.clone(),
            None => format!("AC {}", self.icao),
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    /// Merges the valid fields of `update`. Returns true if any field was written.
    fn apply(&mut self, update: &TrackUpdate, min_altitude_ft: u32) -> bool {
        let mut changed = false;

        if let Some(callsign) = update.callsign.as_deref().and_then(normalize_callsign) {
            self.callsign = Some(callsign);
            changed = true;
        }
        if let Some(feet) = update.altitude_ft.and_then(|ft| plausible_altitude(ft, min_altitude_ft)) {
            self.altitude_ft = Some(feet);
            changed = true;
        }
        if let Some(position) = update.lat_lon.and_then(|(lat, lon)| valid_position(lat, lon)) {
            self.position = Some(position);
            changed = true;
        }

        changed
    }

    /// Records the outcome of an admitted dispatch.
    pub fn finish_dispatch(&mut self, now: Instant, delivered: bool) {
        self.dispatch_pending = false;
        if delivered {
            self.last_announced = Some(now);
        }
    }
}

struct StoreInner {
    tracks: HashMap<IcaoAddress, Track>,
    window: RateWindow,
}

/// Thread-safe track table plus the global admission window
pub struct TrackStore {
    inner: Mutex<StoreInner>,
    min_altitude_ft: u32,
}

impl TrackStore {
    pub fn new(min_altitude_ft: u32, now: Instant) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                tracks: HashMap::new(),
                window: RateWindow::new(now),
            }),
            min_altitude_ft,
        }
    }

    /// Merges a partial update, creating the track on first sight.
    ///
    /// `last_seen` is refreshed even when nothing else changes. The flag is
    /// true when the update wrote at least one field and the track is now
    /// announceable: the trigger for an admission attempt.
    pub fn upsert(&self, icao: IcaoAddress, update: &TrackUpdate, now: Instant) -> (Track, bool) {
        let mut inner = self.inner.lock();
        let track = inner.tracks.entry(icao).or_insert_with(|| {
            trace!(icao = %icao, "New track");
            Track::new(icao, now)
        });

        track.last_seen = now;
        let changed = track.apply(update, self.min_altitude_ft);
        let announce = changed && track.is_announceable();

        (track.clone(), announce)
    }

    /// Runs admission for a tracked aircraft and returns its snapshot when admitted.
    pub fn try_admit(&self, icao: IcaoAddress, now: Instant, limits: &AdmissionLimits) -> Result<Track, Rejection> {
        let mut inner = self.inner.lock();
        let StoreInner { tracks, window } = &mut *inner;
        let track = tracks.get_mut(&icao).ok_or(Rejection::Untracked)?;

        admission::try_admit(track, window, now, limits)?;
        Ok(track.clone())
    }

    /// Runs admission and wraps the admitted snapshot in a [`Reservation`].
    pub fn reserve(&self, icao: IcaoAddress, now: Instant, limits: &AdmissionLimits) -> Result<Reservation<'_>, Rejection> {
        let track = self.try_admit(icao, now, limits)?;
        Ok(Reservation {
            store: self,
            track,
            now,
            settled: false,
        })
    }

    /// Reports the outcome of an admitted dispatch. A track evicted meanwhile is ignored.
    pub fn complete_dispatch(&self, icao: IcaoAddress, now: Instant, delivered: bool) {
        if let Some(track) = self.inner.lock().tracks.get_mut(&icao) {
            track.finish_dispatch(now, delivered);
        }
    }

    /// Removes tracks silent for longer than `threshold`. Returns the number removed.
    pub fn evict_stale(&self, now: Instant, threshold: Duration) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.tracks.len();
        inner.tracks.retain(|_, track| track.age(now) <= threshold);
        before - inner.tracks.len()
    }

    pub fn get(&self, icao: IcaoAddress) -> Option<Track> {
        self.inner.lock().tracks.get(&icao).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Admissions counted in the current window
    pub fn window_count(&self) -> u32 {
        self.inner.lock().window.count()
    }
}

/// An admitted dispatch that has not reported its outcome.
///
/// Dropping it unsettled, on a panic or a cancelled send, releases the
/// in-flight mark as undelivered.
#[must_use = "a reservation must be completed with the dispatch outcome"]
pub struct Reservation<'a> {
    store: &'a TrackStore,
    track: Track,
    now: Instant,
    settled: bool,
}

impl Reservation<'_> {
    /// Snapshot taken at admission
    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn complete(mut self, delivered: bool) {
        self.settled = true;
        self.store.complete_dispatch(self.track.icao, self.now, delivered);
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(icao = %self.track.icao, "Dispatch abandoned before completion");
            self.store.complete_dispatch(self.track.icao, self.now, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icao(hex: &str) -> IcaoAddress {
        hex.parse().unwrap()
    }

    fn store(now: Instant) -> TrackStore {
        TrackStore::new(100, now)
    }

    fn limits() -> AdmissionLimits {
        AdmissionLimits {
            per_aircraft_period: Duration::from_secs(30),
            global_cap: 30,
        }
    }

    fn callsign(cs: &str) -> TrackUpdate {
        TrackUpdate {
            callsign: Some(cs.to_string()),
            ..Default::default()
        }
    }

    fn airborne(alt: i64, lat: f64, lon: f64) -> TrackUpdate {
        TrackUpdate {
            altitude_ft: Some(alt),
            lat_lon: Some((lat, lon)),
            ..Default::default()
        }
    }

    #[test]
    fn test_identification_then_position_becomes_announceable() {
        let t0 = Instant::now();
        let store = store(t0);
        let a = icao("A00001");

        let (track, announce) = store.upsert(a, &callsign("UAL123"), t0);
        assert!(!announce);
        assert_eq!(track.callsign.as_deref(), Some("UAL123"));

        let (track, announce) = store.upsert(a, &airborne(36000, 32.12345, 34.56789), t0);
        assert!(announce);
        assert!(track.is_announceable());
        assert_eq!(track.display_ident(), "UAL123");
        assert_eq!(track.altitude_ft, Some(36000));
        let pos = track.position.unwrap();
        assert_eq!((pos.lat, pos.lon), (32.12345, 34.56789));
    }

    #[test]
    fn test_low_altitude_is_ignored() {
        let t0 = Instant::now();
        let store = store(t0);
        let a = icao("400001");

        let update = TrackUpdate {
            altitude_ft: Some(50),
            ..Default::default()
        };
        let (track, announce) = store.upsert(a, &update, t0);
        assert!(!announce);
        assert_eq!(track.altitude_ft, None);
        // The record still created the track
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_values_do_not_overwrite() {
        let t0 = Instant::now();
        let store = store(t0);
        let a = icao("A00001");
        store.upsert(a, &airborne(36000, 32.0, 34.0), t0);
        store.upsert(a, &callsign("EL123"), t0);

        for update in [
            airborne(20, 95.0, 34.0),
            airborne(-5, 0.0, 181.0),
            airborne(99, -90.5, -180.5),
            callsign("X"),
            callsign("TOOLONGCS"),
        ] {
            store.upsert(a, &update, t0);
        }

        let track = store.get(a).unwrap();
        assert_eq!(track.altitude_ft, Some(36000));
        assert_eq!(track.position, Position::new(32.0, 34.0));
        assert_eq!(track.callsign.as_deref(), Some("EL123"));
    }

    #[test]
    fn test_fields_never_regress() {
        let t0 = Instant::now();
        let store = store(t0);
        let a = icao("C01234");

        let updates = [
            callsign("ACA101"),
            TrackUpdate::default(),
            airborne(12000, 45.5, -73.6),
            TrackUpdate {
                altitude_ft: Some(12500),
                ..Default::default()
            },
            TrackUpdate {
                lat_lon: Some((45.6, -73.7)),
                ..Default::default()
            },
            TrackUpdate::default(),
            callsign("  "),
        ];

        let mut populated = (false, false, false);
        for update in &updates {
            let (track, _) = store.upsert(a, update, t0);
            let now = (
                track.callsign.is_some(),
                track.altitude_ft.is_some(),
                track.position.is_some(),
            );
            assert!(now.0 >= populated.0 && now.1 >= populated.1 && now.2 >= populated.2);
            populated = now;
        }
        assert_eq!(populated, (true, true, true));
    }

    #[test]
    fn test_last_seen_refreshed_without_changes() {
        let t0 = Instant::now();
        let store = store(t0);
        let a = icao("A00001");
        store.upsert(a, &TrackUpdate::default(), t0);

        let later = t0 + Duration::from_secs(42);
        let (track, announce) = store.upsert(a, &TrackUpdate::default(), later);
        assert!(!announce);
        assert_eq!(track.last_seen, later);
    }

    #[test]
    fn test_unchanged_update_does_not_retrigger() {
        let t0 = Instant::now();
        let store = store(t0);
        let a = icao("A00001");
        let (_, announce) = store.upsert(a, &airborne(36000, 32.0, 34.0), t0);
        assert!(announce);

        let (_, announce) = store.upsert(a, &TrackUpdate::default(), t0);
        assert!(!announce);
    }

    #[test]
    fn test_fallback_ident() {
        let t0 = Instant::now();
        let track = Track::new(icao("4CA123"), t0);
        assert_eq!(track.display_ident(), "AC 4CA123");
    }

    #[test]
    fn test_eviction_is_exact() {
        let t0 = Instant::now();
        let store = store(t0);
        let threshold = Duration::from_secs(300);
        let now = t0 + Duration::from_secs(1000);

        let ages = [
            ("A00001", 0u64),
            ("738000", 299),
            ("400001", 300),
            ("4CA123", 301),
            ("C01234", 1000),
        ];
        for (hex, age) in ages {
            store.upsert(icao(hex), &TrackUpdate::default(), now - Duration::from_secs(age));
        }

        assert_eq!(store.evict_stale(now, threshold), 2);
        assert!(store.get(icao("A00001")).is_some());
        assert!(store.get(icao("738000")).is_some());
        assert!(store.get(icao("400001")).is_some());
        assert!(store.get(icao("4CA123")).is_none());
        assert!(store.get(icao("C01234")).is_none());
        assert_eq!(store.evict_stale(now, threshold), 0);
    }

    #[test]
    fn test_admission_through_store() {
        let t0 = Instant::now();
        let store = store(t0);
        let limits = AdmissionLimits {
            per_aircraft_period: Duration::from_secs(30),
            global_cap: 30,
        };
        let a = icao("A00001");

        assert_eq!(store.try_admit(a, t0, &limits), Err(Rejection::Untracked));

        store.upsert(a, &airborne(36000, 32.0, 34.0), t0);
        let admitted = store.try_admit(a, t0, &limits).unwrap();
        assert!(admitted.dispatch_pending);
        assert_eq!(store.window_count(), 1);

        store.complete_dispatch(a, t0, true);
        let track = store.get(a).unwrap();
        assert_eq!(track.last_announced, Some(t0));
        assert!(!track.dispatch_pending);

        assert_eq!(store.try_admit(a, t0 + Duration::from_secs(29), &limits), Err(Rejection::Cooldown));
    }

    #[test]
    fn test_completion_after_eviction_is_ignored() {
        let t0 = Instant::now();
        let store = store(t0);
        let a = icao("A00001");
        store.upsert(a, &TrackUpdate::default(), t0);
        store.evict_stale(t0 + Duration::from_secs(400), Duration::from_secs(300));

        store.complete_dispatch(a, t0, true);
        assert!(store.is_empty());
    }

    #[test]
    fn test_dropped_reservation_releases_track() {
        let t0 = Instant::now();
        let store = store(t0);
        let limits = limits();
        let a = icao("A00001");
        store.upsert(a, &airborne(36000, 32.0, 34.0), t0);

        let reservation = store.reserve(a, t0, &limits).unwrap();
        assert!(store.get(a).unwrap().dispatch_pending);
        assert_eq!(store.reserve(a, t0, &limits).err(), Some(Rejection::InFlight));
        drop(reservation);

        let track = store.get(a).unwrap();
        assert!(!track.dispatch_pending);
        assert_eq!(track.last_announced, None);
        assert!(store.reserve(a, t0 + Duration::from_secs(1), &limits).is_ok());
    }

    #[test]
    fn test_completed_reservation_stamps_announcement() {
        let t0 = Instant::now();
        let store = store(t0);
        let limits = limits();
        let a = icao("A00001");
        store.upsert(a, &airborne(36000, 32.0, 34.0), t0);

        let reservation = store.reserve(a, t0, &limits).unwrap();
        assert_eq!(reservation.track().altitude_ft, Some(36000));
        reservation.complete(true);

        let track = store.get(a).unwrap();
        assert!(!track.dispatch_pending);
        assert_eq!(track.last_announced, Some(t0));
    }

    #[test]
    fn test_concurrent_upserts_and_sweeps() {
        use std::sync::Arc;

        let t0 = Instant::now();
        let store = Arc::new(store(t0));
        let mut workers = Vec::new();

        for worker in 0..4u32 {
            let store = Arc::clone(&store);
            workers.push(std::thread::spawn(move || {
                for i in 0..500u32 {
                    let addr = IcaoAddress::new(0xA00000 + (worker * 1000 + i) % 64).unwrap();
                    let now = t0 + Duration::from_millis(u64::from(i));
                    store.upsert(addr, &airborne(1000 + i64::from(i), 10.0, 20.0), now);
                    if i % 50 == 0 {
                        store.evict_stale(now, Duration::from_millis(100));
                    }
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(store.len() <= 64);
        for n in 0..64u32 {
            if let Some(track) = store.get(IcaoAddress::new(0xA00000 + n).unwrap()) {
                assert!(track.is_announceable());
            }
        }
    }
}
