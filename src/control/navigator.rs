//! Navigation state machine: owns drive mode, settle timers, and recovery
//! direction memory, and turns per-frame line observations into commands.

use std::fmt;
use std::time::{Duration, Instant};

use super::command::Command;
use super::policy;
use crate::vision::LineObservation;

/// Steering magnitude of the forced recovery turn.
pub const RECOVERY_STEER: i32 = 100;
/// Reverse throttle commanded while recovering.
pub const RECOVERY_THROTTLE: i32 = -10;

/// Mode label attached to every command, matching what the per-tick log
/// line reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    /// No decision yet: autonomous driving has not been entered.
    Undef,
    /// The tick that entered recovery; the command is neutral.
    RecoverInit,
    /// Reverse-and-turn maneuver to re-find a lost line.
    Recover,
    /// Line re-found after recovery; throttle held at zero to settle.
    ForwardDelay,
    /// First moments of autonomy; throttle held at zero to settle.
    Man2AutoDelay,
    /// Normal line-following.
    Forward,
}

impl DriveMode {
    pub fn label(&self) -> &'static str {
        match self {
            DriveMode::Undef => "UNDEF",
            DriveMode::RecoverInit => "RECOVER_INIT",
            DriveMode::Recover => "RECOVER",
            DriveMode::ForwardDelay => "FORWARD_DELAY",
            DriveMode::Man2AutoDelay => "MAN2AUTO_DELAY",
            DriveMode::Forward => "FORWARD",
        }
    }
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tunable timing and thresholds for the state machine.
#[derive(Debug, Clone, Copy)]
pub struct NavigatorConfig {
    /// Minimum contour coverage that counts as "line present". Used both for
    /// the manual-to-auto handoff and for recovery exit.
    pub coverage_threshold: f32,
    /// Minimum time the recovery maneuver runs before a re-seen line can end
    /// it.
    pub recovery_delay: Duration,
    /// Zero-throttle settle window after recovery ends.
    pub forward_delay: Duration,
    /// Zero-throttle settle window after autonomy is first entered.
    pub manual2auto_delay: Duration,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            coverage_threshold: 0.075,
            recovery_delay: Duration::from_millis(200),
            forward_delay: Duration::from_millis(200),
            manual2auto_delay: Duration::from_millis(100),
        }
    }
}

/// The long-lived controller state, one per drive session.
///
/// Mutated exactly once per tick by [`Navigator::tick`]; never shared
/// between sessions.
pub struct Navigator {
    config: NavigatorConfig,
    /// Has autonomous driving ever been entered.
    was_auto: bool,
    /// `Some` while the recovery maneuver is running.
    recovery_start: Option<Instant>,
    /// Forward throttle is suppressed until this deadline after recovery.
    forward_ready: Option<Instant>,
    /// Forward throttle is suppressed until this deadline after handoff.
    manual2auto_until: Option<Instant>,
    /// Turn direction of the next/current recovery maneuver, -1 or +1.
    recover_direction: i32,
    /// Steering of the most recent command, neutral ticks included.
    last_steer: i32,
}

impl Navigator {
    pub fn new(config: NavigatorConfig) -> Self {
        Self {
            config,
            was_auto: false,
            recovery_start: None,
            forward_ready: None,
            manual2auto_until: None,
            recover_direction: 1,
            // Small positive bias so the first recovery turns a known way.
            last_steer: 1,
        }
    }

    /// Advance the state machine by one tick.
    ///
    /// Consumes the frame's observation and the tick's clock reading, mutates
    /// the internal state, and returns the clamped command plus the mode it
    /// was decided in.
    pub fn tick(&mut self, observation: &LineObservation, now: Instant) -> (Command, DriveMode) {
        let line_visible = observation.centroid_x.is_some()
            || observation.coverage >= self.config.coverage_threshold;

        let (steer, throttle, mode) = if !self.was_auto {
            if line_visible {
                self.was_auto = true;
                self.manual2auto_until = Some(now + self.config.manual2auto_delay);
            }
            (0, 0, DriveMode::Undef)
        } else if let Some(started) = self.recovery_start {
            if now.duration_since(started) < self.config.recovery_delay {
                // Minimum maneuver window: a flickering line cannot cut the
                // reverse-and-turn short.
                self.recovery_command()
            } else if line_visible {
                // Recovery ends; the forward decision runs within this same
                // tick with the settle delay already armed.
                self.recovery_start = None;
                self.forward_ready = Some(now + self.config.forward_delay);
                self.forward_decision(observation, now)
            } else {
                self.recovery_command()
            }
        } else {
            match observation.centroid_x {
                None => {
                    self.recovery_start = Some(now);
                    self.forward_ready = None;
                    // Sweep toward the side the vehicle was last steering
                    // away from; a zero last steer sweeps positive.
                    self.recover_direction = if self.last_steer > 0 { -1 } else { 1 };
                    (0, 0, DriveMode::RecoverInit)
                }
                Some(_) => self.forward_decision(observation, now),
            }
        };

        let command = Command::clamped(steer, throttle);
        self.last_steer = command.steer;
        (command, mode)
    }

    fn recovery_command(&self) -> (i32, i32, DriveMode) {
        (
            self.recover_direction * RECOVERY_STEER,
            RECOVERY_THROTTLE,
            DriveMode::Recover,
        )
    }

    /// The centroid-present decision: steer from the policy, throttle
    /// suppressed while either settle window is open.
    fn forward_decision(&mut self, observation: &LineObservation, now: Instant) -> (i32, i32, DriveMode) {
        let (steer, base_throttle) = match observation.centroid_x {
            Some(cx) => policy::compute(cx, observation.frame_width),
            // Coverage-only redetection: hold straight until the centroid
            // itself returns.
            None => (0, 0),
        };

        if self.manual2auto_until.is_some_and(|until| now < until) {
            (steer, 0, DriveMode::Man2AutoDelay)
        } else if self.forward_ready.is_some_and(|ready| now < ready) {
            (steer, 0, DriveMode::ForwardDelay)
        } else {
            self.manual2auto_until = None;
            self.forward_ready = None;
            (steer, base_throttle, DriveMode::Forward)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: u32 = 640;

    fn seen(cx: u32) -> LineObservation {
        LineObservation {
            centroid_x: Some(cx),
            frame_width: WIDTH,
            coverage: 0.2,
        }
    }

    fn lost() -> LineObservation {
        LineObservation {
            centroid_x: None,
            frame_width: WIDTH,
            coverage: 0.0,
        }
    }

    #[test]
    fn test_neutral_until_line_first_seen() {
        let mut navigator = Navigator::new(NavigatorConfig::default());
        let t0 = Instant::now();

        let (command, mode) = navigator.tick(&lost(), t0);
        assert_eq!(mode, DriveMode::Undef);
        assert_eq!(command, Command::neutral());

        // Still neutral on the tick that arms the handoff.
        let (command, mode) = navigator.tick(&seen(320), t0 + Duration::from_millis(30));
        assert_eq!(mode, DriveMode::Undef);
        assert_eq!(command, Command::neutral());
    }

    #[test]
    fn test_coverage_alone_enters_autonomy() {
        let mut navigator = Navigator::new(NavigatorConfig::default());
        let t0 = Instant::now();

        let coverage_only = LineObservation {
            centroid_x: None,
            frame_width: WIDTH,
            coverage: 0.1,
        };
        let (_, mode) = navigator.tick(&coverage_only, t0);
        assert_eq!(mode, DriveMode::Undef);

        // Autonomy was entered, so a missing centroid now triggers recovery.
        let (command, mode) = navigator.tick(&lost(), t0 + Duration::from_millis(30));
        assert_eq!(mode, DriveMode::RecoverInit);
        assert_eq!(command, Command::neutral());
    }

    #[test]
    fn test_recover_init_command_is_neutral() {
        let mut navigator = Navigator::new(NavigatorConfig::default());
        let t0 = Instant::now();

        navigator.tick(&seen(320), t0);
        let (command, mode) = navigator.tick(&lost(), t0 + Duration::from_millis(30));
        assert_eq!(mode, DriveMode::RecoverInit);
        assert_eq!(command, Command::neutral());
    }
}
