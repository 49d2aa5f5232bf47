// Status indicator controller
//
// Front/back lights are either off, solid on, or blinking. A blinking light
// is driven by one tokio task per indicator. All indicator state sits behind
// its own lock, separate from the actuator lock, so motion commands never
// wait on cosmetics.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::messages::{Indicator, MovementIntent};
use crate::motor::pins::{Board, DigitalOutput, Level, Result};

/// Shortest accepted blink half-cycle
pub const MIN_BLINK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorMode {
    Off,
    SolidOn,
    Blinking,
}

/// What a motion command does to the lights.
/// The caller decides; it is not inferred from wheel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorPolicy {
    SolidOn,
    Unchanged,
}

impl IndicatorPolicy {
    /// Straight moves light front and back; turns and joystick steering leave them alone
    pub fn for_intent(intent: &MovementIntent) -> Self {
        match intent {
            MovementIntent::Forward { .. } | MovementIntent::Backward { .. } => {
                IndicatorPolicy::SolidOn
            }
            _ => IndicatorPolicy::Unchanged,
        }
    }
}

struct BlinkTask {
    handle: JoinHandle<()>,
}

struct IndicatorSlot {
    output: Box<dyn DigitalOutput>,
    mode: IndicatorMode,
    blink: Option<BlinkTask>,
    // Bumped whenever a blink is cancelled; a task only toggles while it matches
    generation: u64,
}

impl IndicatorSlot {
    fn blink_alive(&self) -> bool {
        self.blink
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    fn cancel_blink(&mut self) {
        self.generation += 1;
        if let Some(task) = self.blink.take() {
            task.handle.abort();
        }
    }

    fn set_solid(&mut self, on: bool) -> Result<()> {
        self.cancel_blink();
        self.mode = if on {
            IndicatorMode::SolidOn
        } else {
            IndicatorMode::Off
        };
        self.output.set_level(Level::from(on))
    }
}

struct IndicatorBank {
    slots: [IndicatorSlot; 2],
}

impl IndicatorBank {
    fn slot(&mut self, indicator: Indicator) -> &mut IndicatorSlot {
        &mut self.slots[indicator.index()]
    }
}

pub struct IndicatorController {
    bank: Arc<Mutex<IndicatorBank>>,
    runtime: Handle,
}

impl IndicatorController {
    pub fn new(
        front: Box<dyn DigitalOutput>,
        back: Box<dyn DigitalOutput>,
        runtime: Handle,
    ) -> Result<Self> {
        let slot = |output| IndicatorSlot {
            output,
            mode: IndicatorMode::Off,
            blink: None,
            generation: 0,
        };
        let controller = Self {
            bank: Arc::new(Mutex::new(IndicatorBank {
                slots: [slot(front), slot(back)],
            })),
            runtime,
        };
        controller.all_off()?;
        Ok(controller)
    }

    /// Claim both indicator pins and switch them off
    pub fn open(board: &mut dyn Board, front_pin: u8, back_pin: u8, runtime: Handle) -> Result<Self> {
        info!("Setting up indicators: front={}, back={}", front_pin, back_pin);
        let front = board.digital_output(front_pin)?;
        let back = board.digital_output(back_pin)?;
        Self::new(front, back, runtime)
    }

    pub fn mode(&self, indicator: Indicator) -> IndicatorMode {
        self.bank.lock().slot(indicator).mode
    }

    /// Solid on or off. Cancels a running blink.
    pub fn set_solid(&self, indicator: Indicator, on: bool) -> Result<()> {
        self.bank.lock().slot(indicator).set_solid(on)
    }

    pub fn all_on(&self) -> Result<()> {
        self.set_all(true)
    }

    /// Switch every light off, including blinking ones
    pub fn all_off(&self) -> Result<()> {
        self.set_all(false)
    }

    /// Reflect motion onto the steady lights: solid on while moving, off
    /// when stopped. A light with a live blink task keeps blinking; only
    /// `stop_blink` (or `all_off`) cancels it.
    pub fn follow_motion(&self, moving: bool) -> Result<()> {
        let mut bank = self.bank.lock();
        let mut result = Ok(());
        for slot in bank.slots.iter_mut().filter(|slot| !slot.blink_alive()) {
            if let Err(e) = slot.set_solid(moving) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    fn set_all(&self, on: bool) -> Result<()> {
        let mut bank = self.bank.lock();
        // Attempt every light, report the first failure
        let mut result = Ok(());
        for slot in bank.slots.iter_mut() {
            if let Err(e) = slot.set_solid(on) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Start blinking with the given half-cycle.
    ///
    /// No-op while a blink task for this indicator is alive, so repeated
    /// calls never stack tasks (the running task keeps its interval).
    pub fn start_blink(&self, indicator: Indicator, interval: Duration) {
        let mut bank = self.bank.lock();
        let slot = bank.slot(indicator);
        if slot.blink_alive() {
            debug!("{:?} indicator already blinking", indicator);
            return;
        }

        slot.cancel_blink();
        slot.mode = IndicatorMode::Blinking;
        let interval = interval.max(MIN_BLINK_INTERVAL);
        debug!("{:?} indicator blinking every {:?}", indicator, interval);

        let handle = self.runtime.spawn(blink_loop(
            Arc::clone(&self.bank),
            indicator,
            slot.generation,
            interval,
        ));
        slot.blink = Some(BlinkTask { handle });
    }

    /// Stop blinking and force the light off before returning.
    ///
    /// The task is aborted at its sleep and re-checks its generation under
    /// the indicator lock before every toggle, so once this returns the
    /// light is off and stays off; the task itself is gone by its next
    /// scheduling point.
    pub fn stop_blink(&self, indicator: Indicator) -> Result<()> {
        let mut bank = self.bank.lock();
        let slot = bank.slot(indicator);
        if slot.mode == IndicatorMode::Blinking {
            debug!("{:?} indicator stopped blinking", indicator);
        }
        slot.set_solid(false)
    }

    /// Number of blink tasks that have not finished yet
    pub fn live_blink_tasks(&self) -> usize {
        self.bank
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.blink_alive())
            .count()
    }

    /// Cancel blinking and switch everything off
    pub fn shutdown(&self) {
        info!("Switching indicators off");
        if let Err(e) = self.all_off() {
            warn!("Failed to switch indicators off: {}", e);
        }
    }
}

impl Drop for IndicatorController {
    fn drop(&mut self) {
        for slot in self.bank.lock().slots.iter_mut() {
            slot.cancel_blink();
        }
    }
}

/// Alternate the light every `interval` until the slot's generation moves on
async fn blink_loop(
    bank: Arc<Mutex<IndicatorBank>>,
    indicator: Indicator,
    generation: u64,
    interval: Duration,
) {
    let mut lit = false;
    loop {
        {
            let mut guard = bank.lock();
            let slot = guard.slot(indicator);
            if slot.generation != generation {
                break;
            }
            lit = !lit;
            if let Err(e) = slot.output.set_level(Level::from(lit)) {
                warn!("{:?} indicator blink write failed: {}", indicator, e);
            }
        }
        tokio::time::sleep(interval).await;
    }
}
