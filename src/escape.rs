//! `+++` escape sequence detection
//!
//! While a call is up, three consecutive `+` bytes followed by one second of
//! terminal silence drop the engine back to Command mode without closing the
//! call. The plus bytes are still forwarded to the remote; the detector only
//! watches the stream.

use fugit::TimerInstantU32;

/// Silence required after the third `+`, in milliseconds
pub const GUARD_TIME_MS: u32 = 1000;

/// Watches the terminal-to-network stream for the escape sequence.
///
/// `observe` is fed every outbound byte; `triggered` is polled once per loop
/// iteration with the current time.
pub struct EscapeDetector<const TIMER_HZ: u32> {
    run: u8,
    armed: Option<TimerInstantU32<TIMER_HZ>>,
}

impl<const TIMER_HZ: u32> EscapeDetector<TIMER_HZ> {
    pub fn new() -> Self {
        Self { run: 0, armed: None }
    }

    /// Feeds one byte the terminal sent while connected
    pub fn observe(&mut self, byte: u8, now: TimerInstantU32<TIMER_HZ>) {
        if byte == b'+' {
            self.run = self.run.saturating_add(1);
            if self.run >= 3 {
                // A fourth plus restarts the guard window
                self.armed = Some(now);
            }
        } else {
            self.reset();
        }
    }

    /// True once the guard time has elapsed after a completed `+++`.
    /// Resets the detector when it fires.
    pub fn triggered(&mut self, now: TimerInstantU32<TIMER_HZ>) -> bool {
        let Some(armed) = self.armed else {
            return false;
        };

        let elapsed = match now.checked_duration_since(armed) {
            Some(elapsed) => elapsed,
            None => return false,
        };

        if elapsed.to_millis() >= GUARD_TIME_MS {
            self.reset();
            return true;
        }

        false
    }

    /// Forgets any partial sequence, used when the call ends
    pub fn reset(&mut self) {
        self.run = 0;
        self.armed = None;
    }
}

impl<const TIMER_HZ: u32> Default for EscapeDetector<TIMER_HZ> {
    fn default() -> Self {
        Self::new()
    }
}
