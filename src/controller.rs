// Drive controller: the entry point surfaces hold on to
//
// One instance per robot, constructed at startup and shut down explicitly.
// Intents go through the motion mapper, then the arbiter, then the
// indicator policy.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::arbiter::{CommandArbiter, WriteOutcome};
use crate::config::DriveConfig;
use crate::error::{DriveError, InitError};
use crate::indicator::{IndicatorController, IndicatorMode, IndicatorPolicy};
use crate::messages::{Direction, Indicator, MovementIntent, StatusSnapshot, Wheel};
use crate::motor::{Board, MotorDriver, map_intent};

pub struct DriveController {
    arbiter: CommandArbiter,
    indicators: Arc<IndicatorController>,
    blink_interval: Duration,
}

impl DriveController {
    /// Claim all outputs and start with motors stopped and lights off.
    /// Blink tasks run on the current tokio runtime.
    pub fn new(board: &mut dyn Board, config: &DriveConfig) -> Result<Self, InitError> {
        let runtime = Handle::try_current().map_err(|_| InitError::NoRuntime)?;
        Self::with_runtime(board, config, runtime)
    }

    pub fn with_runtime(
        board: &mut dyn Board,
        config: &DriveConfig,
        runtime: Handle,
    ) -> Result<Self, InitError> {
        let indicators = Arc::new(IndicatorController::open(
            board,
            config.front_indicator,
            config.back_indicator,
            runtime,
        )?);
        let left = MotorDriver::open(board, Wheel::Left, &config.left, config.pwm_frequency_hz)?;
        let right =
            MotorDriver::open(board, Wheel::Right, &config.right, config.pwm_frequency_hz)?;

        info!("Drive controller initialized");
        Ok(Self {
            arbiter: CommandArbiter::new(left, right, Arc::clone(&indicators)),
            indicators,
            blink_interval: config.blink_interval(),
        })
    }

    /// Map an intent to wheel targets and apply them.
    ///
    /// Returns the status after the write. If the emergency stop is active
    /// the robot is stopped instead and the returned status says so.
    pub fn issue_intent(&self, intent: &MovementIntent) -> Result<StatusSnapshot, DriveError> {
        let targets = map_intent(intent);
        debug!("Intent {:?} -> {:?}", intent, targets);

        if targets.is_stop() {
            self.arbiter.stop_all()?;
            return Ok(self.status());
        }

        for (wheel, target) in [(Wheel::Left, targets.left), (Wheel::Right, targets.right)] {
            let outcome = self
                .arbiter
                .set_wheel_target(wheel, target.speed, target.direction)?;
            if outcome == WriteOutcome::Overridden {
                return Ok(self.status());
            }
        }

        if IndicatorPolicy::for_intent(intent) == IndicatorPolicy::SolidOn {
            self.light_for_motion();
        }
        Ok(self.status())
    }

    fn light_for_motion(&self) {
        if let Err(e) = self.indicators.follow_motion(true) {
            warn!("Failed to switch indicators on: {}", e);
        }
        // An emergency stop that landed between the wheel writes and the
        // lights has already switched them off; undo what we just lit
        if self.status().emergency_stopped {
            if let Err(e) = self.indicators.follow_motion(false) {
                warn!("Failed to switch indicators off: {}", e);
            }
        }
    }

    pub fn set_wheel_target(
        &self,
        wheel: Wheel,
        speed: f64,
        direction: Direction,
    ) -> Result<WriteOutcome, DriveError> {
        self.arbiter.set_wheel_target(wheel, speed, direction)
    }

    pub fn stop_all(&self) -> Result<(), DriveError> {
        self.arbiter.stop_all()
    }

    pub fn activate_emergency_stop(&self) -> Result<(), DriveError> {
        self.arbiter.activate_emergency_stop()
    }

    pub fn reset_emergency_stop(&self) {
        self.arbiter.reset_emergency_stop()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.arbiter.status()
    }

    /// Blink an indicator; `None` uses the configured interval
    pub fn start_blink(&self, indicator: Indicator, interval: Option<Duration>) {
        self.indicators
            .start_blink(indicator, interval.unwrap_or(self.blink_interval));
    }

    pub fn stop_blink(&self, indicator: Indicator) {
        if let Err(e) = self.indicators.stop_blink(indicator) {
            warn!("Failed to switch {:?} indicator off: {}", indicator, e);
        }
    }

    pub fn indicator_mode(&self, indicator: Indicator) -> IndicatorMode {
        self.indicators.mode(indicator)
    }

    /// Stop the motors, cancel blinking and switch the lights off
    pub fn shutdown(&self) -> Result<(), DriveError> {
        info!("Shutting down drive controller");
        let result = self.arbiter.stop_all();
        self.indicators.shutdown();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::{Level, SimBoard};

    fn open() -> (SimBoard, DriveController) {
        let board = SimBoard::new();
        let controller = DriveController::new(&mut board.clone(), &DriveConfig::default()).unwrap();
        (board, controller)
    }

    fn assert_wheels(
        status: &StatusSnapshot,
        left: (f64, Direction),
        right: (f64, Direction),
    ) {
        assert!((status.left_speed - left.0).abs() < 1e-9, "{:?}", status);
        assert!((status.right_speed - right.0).abs() < 1e-9, "{:?}", status);
        assert_eq!(status.left_direction, left.1);
        assert_eq!(status.right_direction, right.1);
    }

    #[test]
    fn test_new_requires_runtime() {
        let result = DriveController::new(&mut SimBoard::new(), &DriveConfig::default());
        assert!(matches!(result, Err(InitError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_duplicate_pin_fails_init() {
        let config = DriveConfig {
            back_indicator: 17, // collides with the left enable pin
            ..DriveConfig::default()
        };
        let result = DriveController::new(&mut SimBoard::new(), &config);
        assert!(matches!(result, Err(InitError::Hardware(_))));
    }

    #[tokio::test]
    async fn test_forward_full_speed() {
        let (board, controller) = open();
        let status = controller
            .issue_intent(&MovementIntent::Forward { speed: None })
            .unwrap();
        assert_wheels(
            &status,
            (100.0, Direction::Forward),
            (100.0, Direction::Forward),
        );
        assert!(!status.emergency_stopped);
        assert_eq!(board.duty_cycle(17), Some(100.0));
        assert_eq!(board.duty_cycle(18), Some(100.0));
        // Straight moves light both indicators
        assert_eq!(board.level(20), Some(Level::High));
        assert_eq!(board.level(12), Some(Level::High));
    }

    #[tokio::test]
    async fn test_turns_leave_indicators_unchanged() {
        let (board, controller) = open();
        let status = controller
            .issue_intent(&MovementIntent::TurnRight { speed: Some(45.0) })
            .unwrap();
        assert_wheels(&status, (45.0, Direction::Forward), (45.0, Direction::Backward));
        assert_eq!(board.level(20), Some(Level::Low));
        assert_eq!(controller.indicator_mode(Indicator::Front), IndicatorMode::Off);
    }

    #[tokio::test]
    async fn test_joystick_arc() {
        let (_board, controller) = open();
        let status = controller
            .issue_intent(&MovementIntent::joystick(0.0, 0.6, 0.5, 0.0))
            .unwrap();
        assert_wheels(&status, (60.0, Direction::Forward), (30.0, Direction::Forward));
    }

    #[tokio::test]
    async fn test_joystick_spot_turn() {
        let (board, controller) = open();
        let status = controller
            .issue_intent(&MovementIntent::joystick(0.0, 0.0, -0.8, 0.0))
            .unwrap();
        assert_wheels(&status, (80.0, Direction::Forward), (80.0, Direction::Backward));
        assert_eq!(board.level(27), Some(Level::High));
        assert_eq!(board.level(24), Some(Level::High));
    }

    #[tokio::test]
    async fn test_joystick_overdrive_is_clamped() {
        let (_board, controller) = open();
        let status = controller
            .issue_intent(&MovementIntent::joystick(0.0, 1.5, 1.2, 0.0))
            .unwrap();
        assert_wheels(&status, (100.0, Direction::Forward), (0.0, Direction::Forward));
    }

    #[tokio::test]
    async fn test_stop_intent_turns_lights_off() {
        let (board, controller) = open();
        controller
            .issue_intent(&MovementIntent::Backward { speed: Some(50.0) })
            .unwrap();
        assert_eq!(board.level(12), Some(Level::High));

        let status = controller.issue_intent(&MovementIntent::Stop).unwrap();
        assert!(status.is_stopped());
        assert_eq!(board.level(20), Some(Level::Low));
        assert_eq!(board.level(12), Some(Level::Low));
    }

    #[tokio::test]
    async fn test_emergency_stop_overrides_intent() {
        let (board, controller) = open();
        controller
            .issue_intent(&MovementIntent::Forward { speed: None })
            .unwrap();
        controller.activate_emergency_stop().unwrap();

        let status = controller
            .issue_intent(&MovementIntent::Forward { speed: None })
            .unwrap();
        assert_wheels(&status, (0.0, Direction::Stopped), (0.0, Direction::Stopped));
        assert!(status.emergency_stopped);
        assert_eq!(board.duty_cycle(17), Some(0.0));
        assert_eq!(board.duty_cycle(18), Some(0.0));
        assert_eq!(board.level(20), Some(Level::Low));

        // Status stays readable during the emergency stop
        assert!(controller.status().emergency_stopped);
    }

    #[tokio::test]
    async fn test_lights_stay_off_when_estop_races_the_command() {
        let (board, controller) = open();
        controller
            .issue_intent(&MovementIntent::Forward { speed: None })
            .unwrap();
        // E-stop lands after the wheel writes, before the lights are set
        controller.activate_emergency_stop().unwrap();
        controller.light_for_motion();

        assert_eq!(board.level(20), Some(Level::Low));
        assert_eq!(board.level(12), Some(Level::Low));
        assert_eq!(controller.indicator_mode(Indicator::Front), IndicatorMode::Off);
    }

    #[tokio::test]
    async fn test_reset_waits_for_new_command() {
        let (_board, controller) = open();
        controller
            .issue_intent(&MovementIntent::Forward { speed: Some(70.0) })
            .unwrap();
        controller.activate_emergency_stop().unwrap();
        controller.reset_emergency_stop();
        assert!(controller.status().is_stopped());

        let status = controller
            .issue_intent(&MovementIntent::TurnLeft { speed: None })
            .unwrap();
        assert_wheels(&status, (100.0, Direction::Backward), (100.0, Direction::Forward));
    }

    #[tokio::test]
    async fn test_partial_failure_surfaces_error() {
        let (board, controller) = open();
        board.fail_pin(18); // right enable

        let err = controller
            .issue_intent(&MovementIntent::Forward { speed: Some(40.0) })
            .unwrap_err();
        assert!(matches!(err, DriveError::Driver { wheel: Wheel::Right, .. }));

        // Both attempts are on record
        let status = controller.status();
        assert_wheels(&status, (40.0, Direction::Forward), (40.0, Direction::Forward));
        // Lights stay off when the command failed
        assert_eq!(board.level(20), Some(Level::Low));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blink_through_controller() {
        let (board, controller) = open();
        controller.start_blink(Indicator::Back, Some(Duration::from_millis(200)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(board.level(12), Some(Level::High));
        assert_eq!(controller.indicator_mode(Indicator::Back), IndicatorMode::Blinking);

        controller.stop_blink(Indicator::Back);
        assert_eq!(board.level(12), Some(Level::Low));
        assert_eq!(controller.indicator_mode(Indicator::Back), IndicatorMode::Off);
    }

    #[tokio::test]
    async fn test_shutdown_leaves_everything_off() {
        let (board, controller) = open();
        controller
            .issue_intent(&MovementIntent::Forward { speed: None })
            .unwrap();
        controller.start_blink(Indicator::Front, None);

        controller.shutdown().unwrap();
        assert!(controller.status().is_stopped());
        assert_eq!(board.duty_cycle(17), Some(0.0));
        assert_eq!(board.level(20), Some(Level::Low));
        assert_eq!(board.level(12), Some(Level::Low));
        assert_eq!(controller.indicator_mode(Indicator::Front), IndicatorMode::Off);
    }
}
