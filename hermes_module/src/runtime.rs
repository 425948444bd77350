//! Module process runtime: attach, command loop, frame loop.

use std::io::{BufRead, Write};
use std::sync::mpsc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use hermes_backplane::{Backplane, BackplaneError, FrameBarrier};
use hermes_common::protocol::{Command, Reply, Request};

/// How long one `wait_step` poll blocks before the runtime re-checks
/// the control channel. Bounds the latency of reset/terminate handling.
const STEP_POLL: Duration = Duration::from_millis(100);

/// Errors from the module-side runtime.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Shared memory or barrier failure.
    #[error(transparent)]
    Backplane(#[from] BackplaneError),

    /// A required spawn parameter is missing from the environment.
    #[error("missing environment variable: {var}")]
    MissingEnv {
        /// Variable name.
        var: &'static str,
    },

    /// Writing a control reply failed (coordinator gone).
    #[error("control channel write failed: {0}")]
    ControlWrite(#[from] std::io::Error),

    /// Module-specific failure; the process will exit non-zero.
    #[error("module error: {0}")]
    Behavior(String),
}

impl ModuleError {
    /// Build a behavior error from any displayable cause.
    pub fn behavior(detail: impl std::fmt::Display) -> Self {
        Self::Behavior(detail.to_string())
    }
}

/// Read-side view handed to behavior callbacks.
///
/// Wraps the attached backplane with the module's own name so local
/// signal names resolve without repeating the prefix.
pub struct ModuleContext {
    backplane: Backplane,
    module_name: String,
}

impl ModuleContext {
    /// Module name (the qualified-name prefix).
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Read a signal of this module by local name.
    pub fn get(&self, local: &str) -> Result<f64, ModuleError> {
        Ok(self
            .backplane
            .get_signal(&format!("{}.{local}", self.module_name))?)
    }

    /// Write a signal of this module by local name.
    pub fn set(&self, local: &str, value: f64) -> Result<(), ModuleError> {
        self.backplane
            .set_signal(&format!("{}.{local}", self.module_name), value)?;
        Ok(())
    }

    /// Read any signal by qualified name.
    pub fn get_qualified(&self, name: &str) -> Result<f64, ModuleError> {
        Ok(self.backplane.get_signal(name)?)
    }

    /// Write any signal by qualified name.
    pub fn set_qualified(&self, name: &str, value: f64) -> Result<(), ModuleError> {
        self.backplane.set_signal(name, value)?;
        Ok(())
    }

    /// Whether this module owns a signal with the given local name.
    pub fn has(&self, local: &str) -> bool {
        self.backplane
            .slot_index(&format!("{}.{local}", self.module_name))
            .is_ok()
    }

    /// Current frame from the header. Valid after `wait_step` returns.
    pub fn frame(&self) -> u64 {
        self.backplane.frame()
    }

    /// Current simulation time in nanoseconds from the header.
    pub fn time_ns(&self) -> u64 {
        self.backplane.time_ns()
    }

    /// Timestep in nanoseconds, derived from the header clock.
    ///
    /// `time_ns == frame * dt_ns` exactly, so the quotient recovers the
    /// coordinator's dt for any frame past the first.
    pub fn dt_ns(&self) -> u64 {
        let frame = self.frame();
        if frame == 0 {
            0
        } else {
            self.time_ns() / frame
        }
    }
}

/// Behavior callbacks a module implements.
pub trait ModuleBehavior {
    /// One-time initialization: validate configuration, apply initial
    /// conditions. Runs on the `stage` command.
    fn stage(&mut self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Advance one frame. The header clock has already been published
    /// for this frame.
    fn step(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError>;

    /// Revert to the staged state. Runs on the `reset` command.
    fn reset(&mut self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// The module main loop.
pub struct ModuleRuntime {
    ctx: ModuleContext,
    barrier: FrameBarrier,
    commands: mpsc::Receiver<Command>,
}

impl ModuleRuntime {
    /// Attach from the spawn environment.
    ///
    /// Reads `HERMES_MODULE_NAME`, `HERMES_SEGMENT_NAME` (falling back
    /// to `argv[1]`), and `HERMES_BARRIER_NAME`; attaches segment and
    /// barrier; starts the stdin command reader; and emits the `ready`
    /// reply.
    pub fn from_env() -> Result<Self, ModuleError> {
        let module_name =
            std::env::var("HERMES_MODULE_NAME").map_err(|_| ModuleError::MissingEnv {
                var: "HERMES_MODULE_NAME",
            })?;
        let segment_name = std::env::var("HERMES_SEGMENT_NAME")
            .ok()
            .or_else(|| std::env::args().nth(1))
            .ok_or(ModuleError::MissingEnv {
                var: "HERMES_SEGMENT_NAME",
            })?;
        let barrier_name =
            std::env::var("HERMES_BARRIER_NAME").map_err(|_| ModuleError::MissingEnv {
                var: "HERMES_BARRIER_NAME",
            })?;

        let backplane = Backplane::attach(&segment_name)?;
        let barrier = FrameBarrier::attach(&barrier_name)?;
        info!(
            module = %module_name,
            segment = %segment_name,
            barrier = %barrier_name,
            "module attached"
        );

        // Command reader: one line per request off stdin. EOF means the
        // coordinator is gone and the module should wind down.
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match Request::from_line(&line) {
                    Ok(request) => {
                        if tx.send(request.cmd).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        eprintln!("unparseable control request: {e}");
                    }
                }
            }
        });

        let runtime = Self {
            ctx: ModuleContext {
                backplane,
                module_name,
            },
            barrier,
            commands: rx,
        };
        runtime.reply(&Reply::Ready)?;
        Ok(runtime)
    }

    /// The module's backplane view.
    pub fn context(&self) -> &ModuleContext {
        &self.ctx
    }

    fn reply(&self, reply: &Reply) -> Result<(), ModuleError> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(reply.to_line().as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    fn ack(&self, cmd: Command) -> Result<(), ModuleError> {
        self.reply(&Reply::Ack { cmd })
    }

    /// Drive the behavior until `terminate` (exit 0) or an error.
    ///
    /// Before staging the runtime only answers commands. After staging
    /// it alternates between draining the command channel and polling
    /// `wait_step`; a released step runs the behavior and posts `done`.
    pub fn run(self, behavior: &mut dyn ModuleBehavior) -> Result<(), ModuleError> {
        // Phase 1: await stage.
        loop {
            match self.commands.recv() {
                Ok(Command::Stage) => {
                    self.run_callback(|b, ctx| b.stage(ctx), behavior, Command::Stage)?;
                    break;
                }
                Ok(Command::Reset) => self.ack(Command::Reset)?,
                Ok(Command::Terminate) => {
                    self.ack(Command::Terminate)?;
                    return Ok(());
                }
                // Coordinator went away before staging us.
                Err(mpsc::RecvError) => return Ok(()),
            }
        }
        debug!(module = %self.ctx.module_name, "module staged, entering frame loop");

        // Phase 2: frame loop.
        loop {
            loop {
                match self.commands.try_recv() {
                    Ok(Command::Terminate) => {
                        self.ack(Command::Terminate)?;
                        return Ok(());
                    }
                    Ok(Command::Reset) => {
                        self.run_callback(|b, ctx| b.reset(ctx), behavior, Command::Reset)?;
                    }
                    Ok(Command::Stage) => {
                        self.run_callback(|b, ctx| b.stage(ctx), behavior, Command::Stage)?;
                    }
                    Err(mpsc::TryRecvError::Empty) => break,
                    Err(mpsc::TryRecvError::Disconnected) => return Ok(()),
                }
            }

            if self.barrier.wait_step(Some(STEP_POLL))? {
                behavior.step(&self.ctx)?;
                self.barrier.signal_done()?;
            }
        }
    }

    /// Run a lifecycle callback, acking on success and reporting the
    /// failure on the control channel before surfacing it.
    fn run_callback(
        &self,
        f: impl FnOnce(&mut dyn ModuleBehavior, &ModuleContext) -> Result<(), ModuleError>,
        behavior: &mut dyn ModuleBehavior,
        cmd: Command,
    ) -> Result<(), ModuleError> {
        match f(behavior, &self.ctx) {
            Ok(()) => self.ack(cmd),
            Err(e) => {
                let _ = self.reply(&Reply::Error {
                    detail: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

/// Initialize stderr logging for a module binary.
///
/// Stdout belongs to the control channel, so the subscriber writes to
/// stderr, which the coordinator inherits.
pub fn init_module_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
