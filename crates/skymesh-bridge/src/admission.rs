//! Two-tier admission control for announcements.
//!
//! An announcement must clear a per-aircraft cooldown and a global cap on
//! dispatches per fixed 60-second window. The window restarts when 60 seconds
//! have elapsed since it opened, not on clock-minute boundaries.
//!
//! Admission consumes a window slot immediately. A failed send does not refund
//! it; the aircraft's cooldown only starts on a confirmed send.

use crate::store::Track;
use skymesh_core::config::RateLimitConfig;
use std::fmt;
use std::time::{Duration, Instant};

/// Length of the global accounting window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Limits applied by [`try_admit`]
#[derive(Debug, Clone, Copy)]
pub struct AdmissionLimits {
    /// Minimum time between two confirmed announcements of one aircraft
    pub per_aircraft_period: Duration,
    /// Maximum admissions per window
    pub global_cap: u32,
}

impl From<&RateLimitConfig> for AdmissionLimits {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            per_aircraft_period: config.per_aircraft_period(),
            global_cap: config.global_rate_per_min,
        }
    }
}

/// Dispatch counter for the current window
#[derive(Debug, Clone)]
pub struct RateWindow {
    window_start: Instant,
    count: u32,
}

impl RateWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.window_start) >= WINDOW {
            self.window_start = now;
            self.count = 0;
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }
}

/// Why an announcement was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The aircraft was announced less than one period ago
    Cooldown,
    /// A dispatch for this aircraft has not completed yet
    InFlight,
    /// The window's cap has been reached
    GlobalCap,
    /// The aircraft is no longer tracked
    Untracked,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Cooldown => "cooldown",
            Rejection::InFlight => "in_flight",
            Rejection::GlobalCap => "global_cap",
            Rejection::Untracked => "untracked",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether `track` may be announced at `now`.
///
/// On admission the window count is incremented and the track is marked as
/// having a dispatch in flight. The caller must report the outcome through
/// [`Track::finish_dispatch`].
pub fn try_admit(
    track: &mut Track,
    window: &mut RateWindow,
    now: Instant,
    limits: &AdmissionLimits,
) -> Result<(), Rejection> {
    if let Some(last) = track.last_announced {
        if now.saturating_duration_since(last) < limits.per_aircraft_period {
            return Err(Rejection::Cooldown);
        }
    }
    if track.dispatch_pending {
        return Err(Rejection::InFlight);
    }

    window.roll(now);
    if window.count >= limits.global_cap {
        return Err(Rejection::GlobalCap);
    }

    window.count += 1;
    track.dispatch_pending = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skymesh_core::IcaoAddress;

    fn limits(period_secs: u64, cap: u32) -> AdmissionLimits {
        AdmissionLimits {
            per_aircraft_period: Duration::from_secs(period_secs),
            global_cap: cap,
        }
    }

    fn track(hex: &str, now: Instant) -> Track {
        Track::new(hex.parse::<IcaoAddress>().unwrap(), now)
    }

    #[test]
    fn test_cooldown_starts_on_confirmed_send() {
        let t0 = Instant::now();
        let mut window = RateWindow::new(t0);
        let mut a = track("A00001", t0);
        let limits = limits(30, 10);

        assert_eq!(try_admit(&mut a, &mut window, t0, &limits), Ok(()));
        a.finish_dispatch(t0, true);

        let t10 = t0 + Duration::from_secs(10);
        assert_eq!(try_admit(&mut a, &mut window, t10, &limits), Err(Rejection::Cooldown));

        let t30 = t0 + Duration::from_secs(30);
        assert_eq!(try_admit(&mut a, &mut window, t30, &limits), Ok(()));
    }

    #[test]
    fn test_failed_send_keeps_slot_and_skips_cooldown() {
        let t0 = Instant::now();
        let mut window = RateWindow::new(t0);
        let mut a = track("A00001", t0);
        let limits = limits(30, 10);

        assert_eq!(try_admit(&mut a, &mut window, t0, &limits), Ok(()));
        a.finish_dispatch(t0, false);
        assert_eq!(window.count(), 1);
        assert!(a.last_announced.is_none());

        // Eligible again right away, consuming a second slot
        assert_eq!(try_admit(&mut a, &mut window, t0, &limits), Ok(()));
        assert_eq!(window.count(), 2);
    }

    #[test]
    fn test_in_flight_dispatch_blocks_second_admission() {
        let t0 = Instant::now();
        let mut window = RateWindow::new(t0);
        let mut a = track("A00001", t0);
        let limits = limits(30, 10);

        assert_eq!(try_admit(&mut a, &mut window, t0, &limits), Ok(()));
        assert_eq!(try_admit(&mut a, &mut window, t0, &limits), Err(Rejection::InFlight));
        assert_eq!(window.count(), 1);
    }

    #[test]
    fn test_global_cap_and_window_roll() {
        let t0 = Instant::now();
        let mut window = RateWindow::new(t0);
        let limits = limits(30, 2);
        let mut tracks: Vec<Track> = ["A00001", "738000", "400001"]
            .iter()
            .map(|hex| track(hex, t0))
            .collect();

        let admitted: Vec<_> = tracks
            .iter_mut()
            .map(|t| try_admit(t, &mut window, t0, &limits))
            .collect();
        assert_eq!(admitted, vec![Ok(()), Ok(()), Err(Rejection::GlobalCap)]);

        // Still capped just before the window elapses
        let t59 = t0 + Duration::from_secs(59);
        assert_eq!(try_admit(&mut tracks[2], &mut window, t59, &limits), Err(Rejection::GlobalCap));

        let t60 = t0 + WINDOW;
        assert_eq!(try_admit(&mut tracks[2], &mut window, t60, &limits), Ok(()));
        assert_eq!(window.count(), 1);
        assert_eq!(window.window_start(), t60);
    }

    #[test]
    fn test_window_resets_relative_to_its_start() {
        let t0 = Instant::now();
        let mut window = RateWindow::new(t0);
        let limits = limits(0, 1);
        let mut a = track("A00001", t0);
        let mut b = track("738000", t0);

        let t90 = t0 + Duration::from_secs(90);
        assert_eq!(try_admit(&mut a, &mut window, t90, &limits), Ok(()));
        // New window opened at t90, so t140 is still inside it
        let t140 = t0 + Duration::from_secs(140);
        assert_eq!(try_admit(&mut b, &mut window, t140, &limits), Err(Rejection::GlobalCap));
        let t150 = t0 + Duration::from_secs(150);
        assert_eq!(try_admit(&mut b, &mut window, t150, &limits), Ok(()));
    }

    #[test]
    fn test_count_never_exceeds_cap() {
        let t0 = Instant::now();
        let mut window = RateWindow::new(t0);
        let limits = limits(0, 5);
        let mut tracks: Vec<Track> = (1..=40u32)
            .map(|n| track(&format!("{:06X}", 0xA00000 + n), t0))
            .collect();

        for step in 0..600u64 {
            let now = t0 + Duration::from_millis(step * 500);
            let idx = (step as usize * 7) % tracks.len();
            if try_admit(&mut tracks[idx], &mut window, now, &limits).is_ok() {
                tracks[idx].finish_dispatch(now, step % 3 != 0);
            }
            assert!(window.count() <= limits.global_cap);
        }
    }
}
