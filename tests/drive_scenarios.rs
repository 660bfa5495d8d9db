//! End-to-end tests for the drive decision pipeline.
//!
//! These drive the navigation state machine with synthetic observations and
//! explicit clock values, covering the manual-to-auto handoff, steady
//! forward driving, line loss, the timed recovery maneuver, and the settle
//! delays in between.

use std::time::{Duration, Instant};

use line_pilot::control::navigator::{RECOVERY_STEER, RECOVERY_THROTTLE};
use line_pilot::control::{Command, DriveMode, Navigator, NavigatorConfig};
use line_pilot::vision::LineObservation;

const WIDTH: u32 = 640;

fn seen(cx: u32) -> LineObservation {
    LineObservation {
        centroid_x: Some(cx),
        frame_width: WIDTH,
        coverage: 0.2,
    }
}

fn coverage_only(coverage: f32) -> LineObservation {
    LineObservation {
        centroid_x: None,
        frame_width: WIDTH,
        coverage,
    }
}

fn lost() -> LineObservation {
    LineObservation {
        centroid_x: None,
        frame_width: WIDTH,
        coverage: 0.0,
    }
}

fn at(base: Instant, secs: f64) -> Instant {
    base + Duration::from_secs_f64(secs)
}

/// Drive the navigator into steady FORWARD mode on a centered line.
/// Returns the clock origin; the navigator is past all settle delays at
/// `at(base, 0.15)` and beyond.
fn enter_forward(navigator: &mut Navigator, base: Instant) {
    let (_, mode) = navigator.tick(&seen(320), base);
    assert_eq!(mode, DriveMode::Undef);
    let (_, mode) = navigator.tick(&seen(320), at(base, 0.03));
    assert_eq!(mode, DriveMode::Man2AutoDelay);
    let (command, mode) = navigator.tick(&seen(320), at(base, 0.12));
    assert_eq!(mode, DriveMode::Forward);
    assert_eq!(command, Command::clamped(0, 4));
}

#[test]
fn test_handoff_then_steady_forward() {
    let mut navigator = Navigator::new(NavigatorConfig::default());
    let base = Instant::now();

    // First sight of the line arms the handoff but commands nothing yet.
    let (command, mode) = navigator.tick(&seen(320), base);
    assert_eq!(mode, DriveMode::Undef);
    assert_eq!(command, Command::neutral());

    // Throttle is held at zero for the whole settle window.
    for secs in [0.03, 0.06, 0.09] {
        let (command, mode) = navigator.tick(&seen(320), at(base, secs));
        assert_eq!(mode, DriveMode::Man2AutoDelay, "at {}s", secs);
        assert_eq!(command.throttle, 0);
        assert_eq!(command.steer, 0);
    }

    // Once the window closes, the policy throttle comes through:
    // ceil(40 * 0.1) = 4 on a centered line.
    for tick in 0..10 {
        let secs = 0.12 + 0.03 * tick as f64;
        let (command, mode) = navigator.tick(&seen(320), at(base, secs));
        assert_eq!(mode, DriveMode::Forward, "tick {}", tick);
        assert_eq!(command, Command::clamped(0, 4));
    }
}

#[test]
fn test_handoff_settle_holds_throttle_regardless_of_centroid() {
    let mut navigator = Navigator::new(NavigatorConfig::default());
    let base = Instant::now();

    navigator.tick(&seen(320), base);

    // Even a far-off-center line gets steering but no throttle while the
    // handoff settles.
    let (command, mode) = navigator.tick(&seen(100), at(base, 0.05));
    assert_eq!(mode, DriveMode::Man2AutoDelay);
    assert_eq!(command.throttle, 0);
    assert_eq!(command.steer, 100);
}

#[test]
fn test_full_loss_and_recovery_scenario() {
    let mut navigator = Navigator::new(NavigatorConfig::default());
    let base = Instant::now();
    enter_forward(&mut navigator, base);

    for tick in 0..7 {
        let (command, mode) = navigator.tick(&seen(320), at(base, 0.15 + 0.03 * tick as f64));
        assert_eq!(mode, DriveMode::Forward);
        assert_eq!(command, Command::clamped(0, 4));
    }

    // The line disappears: the entering tick is neutral, with direction
    // memory choosing the sweep side (+1 after a straight run).
    let (command, mode) = navigator.tick(&lost(), at(base, 0.36));
    assert_eq!(mode, DriveMode::RecoverInit);
    assert_eq!(command, Command::neutral());

    // Minimum-duration reverse-and-turn.
    for secs in [0.39, 0.45, 0.51] {
        let (command, mode) = navigator.tick(&lost(), at(base, secs));
        assert_eq!(mode, DriveMode::Recover, "at {}s", secs);
        assert_eq!(command, Command::clamped(RECOVERY_STEER, RECOVERY_THROTTLE));
    }

    // Past the minimum but the line is still gone: keep turning.
    let (command, mode) = navigator.tick(&lost(), at(base, 0.58));
    assert_eq!(mode, DriveMode::Recover);
    assert_eq!(command, Command::clamped(RECOVERY_STEER, RECOVERY_THROTTLE));

    // Line re-found: recovery exits into the forward decision on the same
    // tick, with forward throttle suppressed by the just-armed delay.
    let (command, mode) = navigator.tick(&seen(320), at(base, 0.61));
    assert_eq!(mode, DriveMode::ForwardDelay);
    assert_eq!(command, Command::clamped(0, 0));

    let (command, mode) = navigator.tick(&seen(320), at(base, 0.75));
    assert_eq!(mode, DriveMode::ForwardDelay);
    assert_eq!(command.throttle, 0);

    // Settle window over: back to full forward driving.
    let (command, mode) = navigator.tick(&seen(320), at(base, 0.82));
    assert_eq!(mode, DriveMode::Forward);
    assert_eq!(command, Command::clamped(0, 4));
}

#[test]
fn test_recovery_minimum_duration_debounces_flicker() {
    let mut navigator = Navigator::new(NavigatorConfig::default());
    let base = Instant::now();
    enter_forward(&mut navigator, base);

    navigator.tick(&lost(), at(base, 0.15));

    // A momentarily re-seen line cannot cut the maneuver short.
    let (command, mode) = navigator.tick(&seen(320), at(base, 0.20));
    assert_eq!(mode, DriveMode::Recover);
    assert_eq!(command, Command::clamped(RECOVERY_STEER, RECOVERY_THROTTLE));

    let (command, mode) = navigator.tick(&seen(320), at(base, 0.30));
    assert_eq!(mode, DriveMode::Recover);
    assert_eq!(command, Command::clamped(RECOVERY_STEER, RECOVERY_THROTTLE));

    // Only once the minimum has elapsed does the sighting end recovery.
    let (_, mode) = navigator.tick(&seen(320), at(base, 0.36));
    assert_eq!(mode, DriveMode::ForwardDelay);
}

#[test]
fn test_recover_direction_opposes_last_steer() {
    // Line to the right of center: steer saturates negative.
    let mut navigator = Navigator::new(NavigatorConfig::default());
    let base = Instant::now();
    enter_forward(&mut navigator, base);

    let (command, _) = navigator.tick(&seen(400), at(base, 0.15));
    assert_eq!(command.steer, -100);

    navigator.tick(&lost(), at(base, 0.18));
    let (command, mode) = navigator.tick(&lost(), at(base, 0.21));
    assert_eq!(mode, DriveMode::Recover);
    assert_eq!(command.steer, RECOVERY_STEER);

    // And the mirror image: last steer positive sweeps negative.
    let mut navigator = Navigator::new(NavigatorConfig::default());
    let base = Instant::now();
    enter_forward(&mut navigator, base);

    let (command, _) = navigator.tick(&seen(240), at(base, 0.15));
    assert_eq!(command.steer, 100);

    navigator.tick(&lost(), at(base, 0.18));
    let (command, mode) = navigator.tick(&lost(), at(base, 0.21));
    assert_eq!(mode, DriveMode::Recover);
    assert_eq!(command.steer, -RECOVERY_STEER);
}

#[test]
fn test_direction_holds_for_the_whole_recovery() {
    let mut navigator = Navigator::new(NavigatorConfig::default());
    let base = Instant::now();
    enter_forward(&mut navigator, base);

    let (command, _) = navigator.tick(&seen(400), at(base, 0.15));
    assert_eq!(command.steer, -100);

    navigator.tick(&lost(), at(base, 0.18));
    for tick in 1..8 {
        let (command, mode) = navigator.tick(&lost(), at(base, 0.18 + 0.03 * tick as f64));
        assert_eq!(mode, DriveMode::Recover);
        assert_eq!(command.steer, RECOVERY_STEER, "tick {}", tick);
    }
}

#[test]
fn test_coverage_only_redetection_exits_but_holds_straight() {
    let mut navigator = Navigator::new(NavigatorConfig::default());
    let base = Instant::now();
    enter_forward(&mut navigator, base);

    navigator.tick(&lost(), at(base, 0.15));
    navigator.tick(&lost(), at(base, 0.25));

    // Coverage above threshold ends recovery even without a centroid, but
    // the steering stays neutral until the centroid itself returns.
    let (command, mode) = navigator.tick(&coverage_only(0.2), at(base, 0.40));
    assert_eq!(mode, DriveMode::ForwardDelay);
    assert_eq!(command, Command::clamped(0, 0));

    // With no centroid on the next tick the navigator re-enters recovery.
    let (_, mode) = navigator.tick(&coverage_only(0.2), at(base, 0.43));
    assert_eq!(mode, DriveMode::RecoverInit);
}

#[test]
fn test_sub_threshold_coverage_does_not_exit_recovery() {
    let mut navigator = Navigator::new(NavigatorConfig::default());
    let base = Instant::now();
    enter_forward(&mut navigator, base);

    navigator.tick(&lost(), at(base, 0.15));
    let (command, mode) = navigator.tick(&coverage_only(0.05), at(base, 0.40));
    assert_eq!(mode, DriveMode::Recover);
    assert_eq!(command, Command::clamped(RECOVERY_STEER, RECOVERY_THROTTLE));
}

#[test]
fn test_commands_always_within_actuator_bounds() {
    let mut navigator = Navigator::new(NavigatorConfig::default());
    let base = Instant::now();

    let observations = [
        seen(0),
        seen(WIDTH - 1),
        seen(320),
        lost(),
        coverage_only(0.5),
        lost(),
        seen(100),
    ];
    for (tick, observation) in observations.iter().cycle().take(100).enumerate() {
        let (command, _) = navigator.tick(observation, at(base, 0.03 * tick as f64));
        assert!((-100..=100).contains(&command.steer), "tick {}", tick);
        assert!((-60..=40).contains(&command.throttle), "tick {}", tick);
    }
}
