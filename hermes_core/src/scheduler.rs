//! Runtime simulation scheduler.
//!
//! Drives frames until a stop condition, pacing execution to wall-clock
//! (realtime), as fast as possible (afap), or not at all (single_frame,
//! where an external caller steps explicitly).
//!
//! ## Determinism
//!
//! Time is tracked as integer nanoseconds and always derived
//! multiplicatively: `time_ns = frame * dt_ns`. Nothing is accumulated
//! in floating point, so every run with the same inputs sees the same
//! `(frame, time_ns)` sequence, and the sub-nanosecond rounding of
//! `dt_ns = round(1e9 / rate_hz)` never compounds.
//!
//! ## Clock publication
//!
//! The header `(frame, time_ns)` for frame f is written *before* the
//! barrier's step release for frame f, so a module that wakes from
//! `wait_step` during the f-th frame reads `frame == f` and
//! `time_ns == f * dt_ns`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use hermes_common::config::{ExecutionConfig, ExecutionMode};

use crate::error::CoreResult;
use crate::process::ProcessManager;

/// Sleep slice while paused or idling in single-frame mode.
const IDLE_SLICE: Duration = Duration::from_millis(10);

/// Yield interval in AFAP mode, in frames.
const AFAP_YIELD_INTERVAL: u64 = 100;

/// Per-frame hook consumed by the telemetry collaborator.
///
/// One implementation per run; invoked after each completed frame with
/// the post-step clock.
pub trait FrameHook: Send {
    /// Called after frame `frame` completes, with the simulation time.
    fn on_frame(&mut self, frame: u64, time_ns: u64);
}

/// Shared control flags, safe to flip from any thread or task.
#[derive(Debug, Default)]
struct ControlFlags {
    running: AtomicBool,
    paused: AtomicBool,
}

/// Cloneable handle for controlling a running scheduler from another
/// task (Ctrl-C handlers, network servers, scripting clients).
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    flags: Arc<ControlFlags>,
}

impl SchedulerHandle {
    /// Stop the run loop before its next frame. The in-flight frame
    /// completes first; the hook is not invoked for frames not started.
    pub fn stop(&self) {
        self.flags.running.store(false, Ordering::Release);
    }

    /// Pause the run loop. The in-flight frame completes first.
    pub fn pause(&self) {
        self.flags.paused.store(true, Ordering::Release);
    }

    /// Resume after a pause.
    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::Release);
    }

    /// Whether the run loop is active.
    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::Acquire)
    }

    /// Whether the run loop is paused.
    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::Acquire)
    }
}

/// The frame-driving scheduler.
pub struct Scheduler {
    pm: ProcessManager,
    mode: ExecutionMode,
    dt_ns: u64,
    end_time_ns: Option<u64>,
    frame: u64,
    time_ns: u64,
    flags: Arc<ControlFlags>,
}

impl Scheduler {
    /// Build a scheduler over a prepared process manager.
    pub fn new(pm: ProcessManager, execution: &ExecutionConfig) -> Self {
        Self {
            pm,
            mode: execution.mode,
            dt_ns: execution.dt_ns(),
            end_time_ns: execution.end_time_ns(),
            frame: 0,
            time_ns: 0,
            flags: Arc::new(ControlFlags::default()),
        }
    }

    /// Control handle for other tasks.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            flags: Arc::clone(&self.flags),
        }
    }

    /// Current frame number (completed frames).
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Current simulation time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.time_ns
    }

    /// Simulation time in seconds, for display boundaries only.
    pub fn time_seconds(&self) -> f64 {
        self.time_ns as f64 / 1e9
    }

    /// Timestep in nanoseconds.
    pub fn dt_ns(&self) -> u64 {
        self.dt_ns
    }

    /// Execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// The underlying process manager.
    pub fn manager(&self) -> &ProcessManager {
        &self.pm
    }

    /// Mutable access to the process manager (shutdown paths).
    pub fn manager_mut(&mut self) -> &mut ProcessManager {
        &mut self.pm
    }

    /// Stage the simulation: stage every module and zero the clock.
    pub fn stage(&mut self) -> CoreResult<()> {
        info!("staging simulation");
        self.pm.stage_all()?;
        self.frame = 0;
        self.time_ns = 0;
        self.pm.update_clock(0, 0)?;
        debug!(frame = self.frame, time_ns = self.time_ns, "simulation staged");
        Ok(())
    }

    /// Execute `count` frames.
    ///
    /// Each frame advances the clock, publishes it to the header,
    /// releases the barrier, collects completions, and routes wires
    /// (inside [`ProcessManager::step_all`]).
    pub fn step(&mut self, count: u64) -> CoreResult<()> {
        for _ in 0..count {
            self.frame += 1;
            self.time_ns = self.frame * self.dt_ns;
            self.pm.update_clock(self.frame, self.time_ns)?;
            self.pm.step_all()?;
        }
        debug!(frame = self.frame, time_ns = self.time_ns, "stepped");
        Ok(())
    }

    /// Reset to the staged state: modules revert, clock re-zeroes.
    pub fn reset(&mut self) -> CoreResult<()> {
        self.pm.reset_all()?;
        self.frame = 0;
        self.time_ns = 0;
        info!("simulation reset");
        Ok(())
    }

    /// Run frames until `stop()`, the configured end time, or an error.
    ///
    /// On error the run stops, every module is terminated, the IPC
    /// objects are unlinked, and the first error is returned.
    pub async fn run(&mut self, mut hook: Option<&mut dyn FrameHook>) -> CoreResult<()> {
        self.flags.running.store(true, Ordering::Release);
        let mut wall_start = Instant::now();
        let mut pause_start: Option<Instant> = None;

        info!(
            mode = %self.mode,
            dt_ns = self.dt_ns,
            end_time_ns = self.end_time_ns,
            "starting simulation loop"
        );

        let result = loop {
            if !self.flags.running.load(Ordering::Acquire) {
                break Ok(());
            }
            if let Some(end) = self.end_time_ns {
                if self.time_ns >= end {
                    info!(time_ns = self.time_ns, "end time reached");
                    break Ok(());
                }
            }

            // Pause gating; realtime pacing must not count paused time.
            if self.flags.paused.load(Ordering::Acquire) {
                if pause_start.is_none() {
                    pause_start = Some(Instant::now());
                    self.pm.mark_paused();
                }
                tokio::time::sleep(IDLE_SLICE).await;
                continue;
            } else if let Some(started) = pause_start.take() {
                wall_start += started.elapsed();
                self.pm.mark_running();
            }

            // Single-frame mode: an external caller steps explicitly.
            if self.mode == ExecutionMode::SingleFrame {
                tokio::time::sleep(IDLE_SLICE).await;
                continue;
            }

            // The barrier waits are blocking system calls.
            if let Err(e) = tokio::task::block_in_place(|| self.step(1)) {
                break Err(e);
            }

            if let Some(hook) = hook.as_mut() {
                hook.on_frame(self.frame, self.time_ns);
            }

            match self.mode {
                ExecutionMode::Realtime => {
                    // Absolute target; if already behind, continue without
                    // sleeping - realtime is best-effort, not catch-up.
                    let target = wall_start + Duration::from_nanos(self.time_ns);
                    let now = Instant::now();
                    if target > now {
                        tokio::time::sleep(target - now).await;
                    }
                }
                ExecutionMode::Afap => {
                    if self.frame % AFAP_YIELD_INTERVAL == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                ExecutionMode::SingleFrame => {}
            }
        };

        self.flags.running.store(false, Ordering::Release);
        info!(frames = self.frame, time_ns = self.time_ns, "simulation loop ended");

        if let Err(e) = result {
            // Nothing is recovered locally: shut everything down and
            // surface the first error.
            self.pm.terminate_all();
            return Err(e);
        }
        Ok(())
    }
}
