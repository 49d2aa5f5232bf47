// Keyboard teleop: WASD drive, R/F speed, SPACE e-stop, C clear e-stop, B blink, Q quit
//
// Usage: cargo run --example teleop
// Run the runtime alongside it: cargo run -- --simulate
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use rover_drive_runtime::config::{TOPIC_CMD_DRIVE, TOPIC_CMD_INDICATOR, TOPIC_CMD_SAFETY};
use rover_drive_runtime::messages::{Indicator, IndicatorCommand, MovementIntent, SafetyCommand};
use std::time::{Duration, Instant};
use tracing::info;

const SPEEDS: [f64; 3] = [30.0, 60.0, 100.0]; // duty-cycle percent
const INPUT_TIMEOUT_MS: u64 = 100; // Stop after this much time with no movement key

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_drive = session.declare_publisher(TOPIC_CMD_DRIVE).await?;
    let pub_safety = session.declare_publisher(TOPIC_CMD_SAFETY).await?;
    let pub_indicator = session.declare_publisher(TOPIC_CMD_INDICATOR).await?;

    info!("Controls: WASD=drive, R/F=speed, SPACE=e-stop, C=clear e-stop, B=blink, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&pub_drive, &pub_safety, &pub_indicator).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    pub_drive: &zenoh::pubsub::Publisher<'_>,
    pub_safety: &zenoh::pubsub::Publisher<'_>,
    pub_indicator: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let mut blinking = false;

    // Persistent intent
    let mut intent = MovementIntent::Stop;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let speed = Some(SPEEDS[speed_idx]);

                match code {
                    // Movement - update intent and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        intent = MovementIntent::Forward { speed };
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        intent = MovementIntent::Backward { speed };
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        intent = MovementIntent::TurnLeft { speed };
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        intent = MovementIntent::TurnRight { speed };
                        last_movement_input = Instant::now();
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Safety
                    KeyCode::Char(' ') if pressed => {
                        let cmd = serde_json::to_string(&SafetyCommand::EmergencyStop)?;
                        pub_safety.put(cmd).await?;
                        info!("Emergency stop sent");
                    }
                    KeyCode::Char('c') if pressed => {
                        let cmd = serde_json::to_string(&SafetyCommand::Reset)?;
                        pub_safety.put(cmd).await?;
                        info!("Emergency stop reset sent");
                    }

                    // Hazard blink on the back light
                    KeyCode::Char('b') if pressed => {
                        blinking = !blinking;
                        let cmd = if blinking {
                            IndicatorCommand::StartBlink {
                                indicator: Indicator::Back,
                                interval_ms: None,
                            }
                        } else {
                            IndicatorCommand::StopBlink {
                                indicator: Indicator::Back,
                            }
                        };
                        pub_indicator.put(serde_json::to_string(&cmd)?).await?;
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Stop if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            intent = MovementIntent::Stop;
        }

        // Always publish at ~50Hz
        pub_drive.put(serde_json::to_string(&intent)?).await?;
    }

    pub_drive
        .put(serde_json::to_string(&MovementIntent::Stop)?)
        .await?;
    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
