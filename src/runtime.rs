// Operator runtime: zenoh topics in, drive controller calls out
// 50 Hz loop with a command watchdog
// Note: the watchdog stops the robot if the teleop/front-end stops sending drive commands while it is moving

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{error, info, warn};

// local imports
use crate::config::{
    LOOP_HZ, TOPIC_CMD_DRIVE, TOPIC_CMD_INDICATOR, TOPIC_CMD_SAFETY, TOPIC_HEALTH,
    TOPIC_STATE_DRIVE,
};
use crate::controller::DriveController;
use crate::messages::{
    ActionRequest, IndicatorCommand, MovementIntent, RuntimeHealth, SafetyCommand,
};

/// Parse a drive payload. Accepts a `MovementIntent` or a front-end
/// `{"action": ...}` request; anything else is a stop.
pub fn parse_drive_command(payload: &[u8]) -> MovementIntent {
    if let Ok(intent) = serde_json::from_slice::<MovementIntent>(payload) {
        return intent;
    }
    match serde_json::from_slice::<ActionRequest>(payload) {
        Ok(req) => MovementIntent::from(&req),
        Err(e) => {
            warn!("Failed to parse drive command, stopping: {}", e);
            MovementIntent::Stop
        }
    }
}

pub struct Runtime {
    controller: Arc<DriveController>,
    cmd_timeout: Duration,
    cmd_received_at: Instant,
    hardware_fault: bool,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new(controller: Arc<DriveController>, cmd_timeout: Duration) -> Self {
        Self {
            controller,
            cmd_timeout,
            cmd_received_at: Instant::now(),
            hardware_fault: false,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming drive command
    pub fn on_drive(&mut self, payload: &[u8]) {
        let intent = parse_drive_command(payload);
        info!("Received intent: {:?}", &intent);
        self.cmd_received_at = Instant::now();
        match self.controller.issue_intent(&intent) {
            Ok(_) => self.hardware_fault = false,
            Err(e) => {
                error!("Drive command failed: {}", e);
                self.hardware_fault = true;
            }
        }
    }

    pub fn on_safety(&mut self, payload: &[u8]) {
        match serde_json::from_slice::<SafetyCommand>(payload) {
            Ok(SafetyCommand::EmergencyStop) => {
                if let Err(e) = self.controller.activate_emergency_stop() {
                    error!("Emergency stop could not reach the motors: {}", e);
                    self.hardware_fault = true;
                }
            }
            Ok(SafetyCommand::Reset) => self.controller.reset_emergency_stop(),
            Err(e) => warn!("Failed to parse safety command: {}", e),
        }
    }

    pub fn on_indicator(&mut self, payload: &[u8]) {
        match serde_json::from_slice::<IndicatorCommand>(payload) {
            Ok(IndicatorCommand::StartBlink {
                indicator,
                interval_ms,
            }) => self
                .controller
                .start_blink(indicator, interval_ms.map(Duration::from_millis)),
            Ok(IndicatorCommand::StopBlink { indicator }) => self.controller.stop_blink(indicator),
            Err(e) => warn!("Failed to parse indicator command: {}", e),
        }
    }

    /// Update health, stopping the robot if drive commands went stale
    pub fn tick(&mut self, now: Instant) -> RuntimeHealth {
        let status = self.controller.status();
        let cmd_age = now.saturating_duration_since(self.cmd_received_at);
        let stale = cmd_age > self.cmd_timeout;

        // Watchdog runs regardless of any latched fault: a half-applied
        // command can leave one wheel turning
        if stale && !status.is_stopped() {
            warn!("Command stale ({:?} old), stopping robot", cmd_age);
            if let Err(e) = self.controller.stop_all() {
                error!("Watchdog stop failed: {}", e);
                self.hardware_fault = true;
            }
        }

        self.health = if self.hardware_fault {
            RuntimeHealth::HardwareFault
        } else if status.emergency_stopped {
            RuntimeHealth::EmergencyStopped
        } else if stale {
            RuntimeHealth::CmdStale
        } else {
            RuntimeHealth::Ok
        };
        self.health
    }
}

pub async fn run(
    controller: Arc<DriveController>,
    cmd_timeout: Duration,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_drive = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let sub_safety = session.declare_subscriber(TOPIC_CMD_SAFETY).await?;
    let sub_indicator = session.declare_subscriber(TOPIC_CMD_INDICATOR).await?;
    let pub_status = session.declare_publisher(TOPIC_STATE_DRIVE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new(Arc::clone(&controller), cmd_timeout);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        cmd_timeout.as_millis()
    );
    info!(
        "Subscribed to: {}, {}, {}",
        TOPIC_CMD_DRIVE, TOPIC_CMD_SAFETY, TOPIC_CMD_INDICATOR
    );
    info!("Publishing to: {}, {}", TOPIC_STATE_DRIVE, TOPIC_HEALTH);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut shutdown => {
                info!("Shutdown requested");
                return Ok(());
            }
        }

        // 1. Safety first, so an e-stop in the same tick pre-empts drive commands
        while let Ok(Some(sample)) = sub_safety.try_recv() {
            runtime.on_safety(&sample.payload().to_bytes());
        }

        // 2. Drain all pending drive commands (non-blocking), in order
        while let Ok(Some(sample)) = sub_drive.try_recv() {
            runtime.on_drive(&sample.payload().to_bytes());
        }

        while let Ok(Some(sample)) = sub_indicator.try_recv() {
            runtime.on_indicator(&sample.payload().to_bytes());
        }

        // 3. Watchdog and health
        let health = runtime.tick(Instant::now());

        // 4. Publish status and health
        let status_json = serde_json::to_string(&controller.status())?;
        pub_status.put(status_json).await?;

        let health_json = serde_json::to_string(&health)?;
        pub_health.put(health_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriveConfig;
    use crate::messages::{Direction, Indicator};
    use crate::motor::SimBoard;
    use crate::indicator::IndicatorMode;

    const TIMEOUT: Duration = Duration::from_millis(250);

    fn open() -> (SimBoard, Arc<DriveController>, Runtime) {
        let board = SimBoard::new();
        let controller =
            Arc::new(DriveController::new(&mut board.clone(), &DriveConfig::default()).unwrap());
        let runtime = Runtime::new(Arc::clone(&controller), TIMEOUT);
        (board, controller, runtime)
    }

    #[test]
    fn test_parse_drive_command() {
        assert_eq!(
            parse_drive_command(br#"{"intent": "backward", "speed": 20}"#),
            MovementIntent::Backward { speed: Some(20.0) }
        );
        assert_eq!(
            parse_drive_command(br#"{"action": "right"}"#),
            MovementIntent::TurnRight { speed: None }
        );
        // Unknown commands and garbage fail closed
        assert_eq!(
            parse_drive_command(br#"{"action": "dance"}"#),
            MovementIntent::Stop
        );
        assert_eq!(parse_drive_command(br#"{"intent": "fly"}"#), MovementIntent::Stop);
        assert_eq!(parse_drive_command(b"not json"), MovementIntent::Stop);
    }

    #[tokio::test]
    async fn test_stale_until_first_command() {
        let (_board, _controller, mut runtime) = open();
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
        assert_eq!(
            runtime.tick(Instant::now() + TIMEOUT * 2),
            RuntimeHealth::CmdStale
        );
    }

    #[tokio::test]
    async fn test_watchdog_stops_moving_robot() {
        let (board, controller, mut runtime) = open();
        runtime.on_drive(br#"{"intent": "forward"}"#);
        assert_eq!(runtime.tick(Instant::now()), RuntimeHealth::Ok);
        assert_eq!(controller.status().left_direction, Direction::Forward);

        let later = Instant::now() + TIMEOUT * 2;
        assert_eq!(runtime.tick(later), RuntimeHealth::CmdStale);
        assert!(controller.status().is_stopped());
        assert_eq!(board.duty_cycle(17), Some(0.0));

        // A fresh command brings it back
        runtime.on_drive(br#"{"intent": "turn_left", "speed": 30}"#);
        assert_eq!(runtime.tick(Instant::now()), RuntimeHealth::Ok);
        assert_eq!(controller.status().right_speed, 30.0);
    }

    #[tokio::test]
    async fn test_safety_commands() {
        let (_board, controller, mut runtime) = open();
        runtime.on_drive(br#"{"intent": "forward"}"#);
        runtime.on_safety(br#"{"command": "emergency_stop"}"#);
        assert_eq!(runtime.tick(Instant::now()), RuntimeHealth::EmergencyStopped);

        runtime.on_drive(br#"{"intent": "forward"}"#);
        let status = controller.status();
        assert!(status.is_stopped());
        assert!(status.emergency_stopped);

        runtime.on_safety(br#"{"command": "reset"}"#);
        assert!(!controller.status().emergency_stopped);
        assert!(controller.status().is_stopped());
    }

    #[tokio::test]
    async fn test_hardware_fault_reported_until_next_success() {
        let (board, _controller, mut runtime) = open();
        board.fail_pin(17);
        runtime.on_drive(br#"{"intent": "forward"}"#);
        assert_eq!(runtime.tick(Instant::now()), RuntimeHealth::HardwareFault);

        board.restore_pin(17);
        runtime.on_drive(br#"{"intent": "stop"}"#);
        assert_eq!(runtime.tick(Instant::now()), RuntimeHealth::Ok);
    }

    #[tokio::test]
    async fn test_watchdog_stops_half_applied_command() {
        let (board, controller, mut runtime) = open();
        // Left write lands, right enable write fails
        board.fail_pin(18);
        runtime.on_drive(br#"{"intent": "forward"}"#);
        assert_eq!(controller.status().left_direction, Direction::Forward);
        assert_eq!(board.duty_cycle(17), Some(100.0));
        board.restore_pin(18);

        // Operator goes quiet: the spinning wheel must still be stopped
        let later = Instant::now() + TIMEOUT * 40;
        assert_eq!(runtime.tick(later), RuntimeHealth::HardwareFault);
        assert!(controller.status().is_stopped());
        assert_eq!(board.duty_cycle(17), Some(0.0));
        assert_eq!(board.duty_cycle(18), Some(0.0));
    }

    #[tokio::test]
    async fn test_indicator_commands() {
        let (_board, controller, mut runtime) = open();
        runtime.on_indicator(br#"{"command": "start_blink", "indicator": "front", "interval_ms": 100}"#);
        assert_eq!(controller.indicator_mode(Indicator::Front), IndicatorMode::Blinking);

        runtime.on_indicator(br#"{"command": "stop_blink", "indicator": "front"}"#);
        assert_eq!(controller.indicator_mode(Indicator::Front), IndicatorMode::Off);
    }

    #[tokio::test]
    async fn test_stop_command_keeps_blink_running() {
        let (board, controller, mut runtime) = open();
        runtime.on_indicator(br#"{"command": "start_blink", "indicator": "back"}"#);

        // Idle teleop keeps publishing stops; the hazard blink survives them
        runtime.on_drive(br#"{"intent": "stop"}"#);
        runtime.on_drive(br#"{"intent": "stop"}"#);
        assert_eq!(controller.indicator_mode(Indicator::Back), IndicatorMode::Blinking);

        // Straight moves light the front without touching the blinking back light
        runtime.on_drive(br#"{"intent": "forward"}"#);
        assert_eq!(controller.indicator_mode(Indicator::Back), IndicatorMode::Blinking);
        assert_eq!(controller.indicator_mode(Indicator::Front), IndicatorMode::SolidOn);

        runtime.on_drive(br#"{"intent": "stop"}"#);
        assert_eq!(controller.indicator_mode(Indicator::Front), IndicatorMode::Off);
        assert_eq!(board.level(20), Some(crate::motor::Level::Low));
        assert_eq!(controller.indicator_mode(Indicator::Back), IndicatorMode::Blinking);
    }
}
