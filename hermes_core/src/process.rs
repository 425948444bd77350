//! Module process lifecycle and per-frame coordination.
//!
//! The process manager owns the backplane segment and the frame barrier:
//! it materializes both from configuration, spawns module processes in
//! configured order, sequences lifecycle commands over each module's
//! control channel, coordinates every frame, and tears everything down
//! on every exit path (including its own `Drop`).
//!
//! Module lifecycle:
//!
//! ```text
//!  spawn()       stage()       step()...        terminate()
//!    |             |              |                 |
//!    v             v              v                 v
//! +------+     +--------+     +---------+      +------+
//! | INIT | --> | STAGED | --> | RUNNING | ---> | DONE |
//! +------+     +--------+     +---------+      +------+
//!     |             ^      reset()  |  ^- resume
//!     |             +---------------+  v- pause -> PAUSED
//!     +--> ERROR (crash, timeout, rejected command)
//! ```
//!
//! Transitions are driven exclusively by the manager; modules respond
//! but never self-transition.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use hermes_backplane::{Backplane, BarrierPhase, FrameBarrier, SignalRegistry};
use hermes_common::config::{HermesConfig, ModuleConfig, ModuleKind};
use hermes_common::consts::DEFAULT_WAIT_TIMEOUT_MS;
use hermes_common::protocol::{Command as ControlCommand, Reply, Request};

use crate::error::{CoreError, CoreResult};
use crate::router::WireRouter;

/// Interpreter used to launch script modules.
const SCRIPT_RUNNER: &str = "python3";

/// Grace period after a `terminate` command before SIGTERM.
const TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// Grace period after SIGTERM before SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Poll interval while waiting for a child to exit.
const EXIT_POLL: Duration = Duration::from_millis(10);

// ─── Module State ───────────────────────────────────────────────────

/// Module lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Process started, not yet staged.
    Init,
    /// Ready for execution.
    Staged,
    /// Actively executing frames.
    Running,
    /// Execution paused (coordinator withholds step releases).
    Paused,
    /// Terminated normally.
    Done,
    /// Crashed, timed out, or rejected a command.
    Error,
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Staged => "staged",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

// ─── Module Process ─────────────────────────────────────────────────

/// One managed module subprocess and its control channel.
pub struct ModuleProcess {
    name: String,
    kind: ModuleKind,
    executable: Option<PathBuf>,
    script: Option<PathBuf>,
    config_path: Option<PathBuf>,
    segment_name: String,
    barrier_name: String,
    state: ModuleState,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    replies: Option<mpsc::Receiver<Reply>>,
    last_pid: Option<u32>,
    exit_description: Option<String>,
}

impl ModuleProcess {
    /// Build an unspawned module record from configuration.
    pub fn new(
        name: &str,
        config: &ModuleConfig,
        segment_name: &str,
        barrier_name: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind: config.kind,
            executable: config.executable.clone(),
            script: config.script.clone(),
            config_path: config.config.clone(),
            segment_name: segment_name.to_string(),
            barrier_name: barrier_name.to_string(),
            state: ModuleState::Init,
            child: None,
            stdin: None,
            replies: None,
            last_pid: None,
            exit_description: None,
        }
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModuleState {
        self.state
    }

    /// PID of the spawned process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.last_pid
    }

    /// Start the subprocess and its reply-reader thread.
    ///
    /// The child receives the segment name as `argv[1]` and the attach
    /// parameters through `HERMES_*` environment variables. Its stdout
    /// carries control replies; stderr is inherited so module logs reach
    /// the operator.
    pub fn spawn(&mut self) -> CoreResult<()> {
        let mut command = match self.kind {
            ModuleKind::Process => {
                let exe = self.executable.as_ref().ok_or_else(|| CoreError::ModuleSpawn {
                    name: self.name.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "no executable configured",
                    ),
                })?;
                if !exe.exists() {
                    return Err(CoreError::ModuleSpawn {
                        name: self.name.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("executable not found: {}", exe.display()),
                        ),
                    });
                }
                Command::new(exe)
            }
            ModuleKind::Script => {
                let script = self.script.as_ref().ok_or_else(|| CoreError::ModuleSpawn {
                    name: self.name.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "no script configured",
                    ),
                })?;
                if !script.exists() {
                    return Err(CoreError::ModuleSpawn {
                        name: self.name.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("script not found: {}", script.display()),
                        ),
                    });
                }
                let mut c = Command::new(SCRIPT_RUNNER);
                c.arg(script);
                c
            }
        };

        command
            .arg(&self.segment_name)
            .env("HERMES_MODULE_NAME", &self.name)
            .env("HERMES_SEGMENT_NAME", &self.segment_name)
            .env("HERMES_BARRIER_NAME", &self.barrier_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(cfg) = &self.config_path {
            command.env("HERMES_MODULE_CONFIG", cfg);
        }

        let mut child = command.spawn().map_err(|e| CoreError::ModuleSpawn {
            name: self.name.clone(),
            source: e,
        })?;

        self.last_pid = Some(child.id());
        self.stdin = child.stdin.take();

        // Reader thread: parse reply lines off the child's stdout and
        // queue them for bounded-timeout collection.
        let stdout = child.stdout.take();
        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = stdout {
            let module = self.name.clone();
            std::thread::spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match Reply::from_line(&line) {
                        Ok(reply) => {
                            if tx.send(reply).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(module = %module, error = %e, line, "unparseable control reply");
                        }
                    }
                }
            });
        }
        self.replies = Some(rx);
        self.child = Some(child);

        info!(module = %self.name, pid = self.last_pid, "module spawned");
        Ok(())
    }

    /// Whether the process is still running. Records the exit status on
    /// the transition to dead.
    pub fn is_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit_description = Some(describe_exit(&status));
                false
            }
            Err(_) => false,
        }
    }

    /// Human-readable exit status, once the process has been reaped.
    pub fn exit_description(&self) -> Option<&str> {
        self.exit_description.as_deref()
    }

    /// Send a command line down the control channel.
    fn send(&mut self, cmd: ControlCommand) -> CoreResult<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| CoreError::ControlChannel {
            name: self.name.clone(),
            detail: "module not spawned".to_string(),
        })?;
        stdin
            .write_all(Request { cmd }.to_line().as_bytes())
            .and_then(|()| stdin.flush())
            .map_err(|e| CoreError::ControlChannel {
                name: self.name.clone(),
                detail: e.to_string(),
            })
    }

    /// Send a command and wait for its acknowledgement.
    ///
    /// `ready` replies are consumed silently; an `error` reply or a
    /// timeout fails the command. A dead child is reported as a crash
    /// rather than a timeout.
    pub fn request_ack(&mut self, cmd: ControlCommand, timeout: Duration) -> CoreResult<()> {
        self.send(cmd)?;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let replies = self.replies.as_ref().ok_or_else(|| CoreError::ControlChannel {
                name: self.name.clone(),
                detail: "module not spawned".to_string(),
            })?;
            match replies.recv_timeout(remaining) {
                Ok(Reply::Ready) => continue,
                Ok(Reply::Ack { cmd: acked }) if acked == cmd => return Ok(()),
                Ok(Reply::Ack { cmd: acked }) => {
                    warn!(module = %self.name, expected = %cmd, got = %acked, "out-of-order ack");
                    continue;
                }
                Ok(Reply::Error { detail }) => {
                    self.state = ModuleState::Error;
                    return Err(CoreError::CommandFailed {
                        name: self.name.clone(),
                        command: cmd.to_string(),
                        detail,
                    });
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    self.state = ModuleState::Error;
                    return Err(self.crash_or(CoreError::CommandFailed {
                        name: self.name.clone(),
                        command: cmd.to_string(),
                        detail: format!("no acknowledgement within {timeout:?}"),
                    }));
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    self.state = ModuleState::Error;
                    return Err(self.crash_or(CoreError::ControlChannel {
                        name: self.name.clone(),
                        detail: "control channel closed".to_string(),
                    }));
                }
            }
        }
    }

    /// Prefer a crash report over a softer error when the child is dead.
    fn crash_or(&mut self, fallback: CoreError) -> CoreError {
        if !self.is_alive() {
            if let Some(status) = self.exit_description.clone() {
                return CoreError::ModuleCrashed {
                    name: self.name.clone(),
                    pid: self.last_pid.unwrap_or(0),
                    status,
                };
            }
        }
        fallback
    }

    /// Cooperative shutdown with timeout escalation: `terminate` command,
    /// then SIGTERM after `t1`, then SIGKILL after `t2`.
    pub fn terminate(&mut self, t1: Duration, t2: Duration) {
        if self.child.is_none() {
            return;
        }

        debug!(module = %self.name, "terminating module");
        let _ = self.send(ControlCommand::Terminate);

        if !self.wait_exit(t1) {
            warn!(module = %self.name, "module ignored terminate, sending SIGTERM");
            self.signal(Signal::SIGTERM);
            if !self.wait_exit(t2) {
                warn!(module = %self.name, "module ignored SIGTERM, sending SIGKILL");
                self.signal(Signal::SIGKILL);
                self.wait_exit(t2);
            }
        }

        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        self.stdin = None;
        self.replies = None;
        if self.state != ModuleState::Error {
            self.state = ModuleState::Done;
        }
    }

    fn signal(&self, signal: Signal) {
        if let Some(pid) = self.last_pid {
            let _ = kill(Pid::from_raw(pid as i32), signal);
        }
    }

    /// Poll until the child exits or the deadline passes.
    fn wait_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if !self.is_alive() {
                return true;
            }
            std::thread::sleep(EXIT_POLL);
        }
        !self.is_alive()
    }
}

// ─── Process Manager ────────────────────────────────────────────────

/// Coordinates all module processes and owns the shared IPC objects.
pub struct ProcessManager {
    segment_name: String,
    barrier_name: String,
    backplane: Backplane,
    barrier: FrameBarrier,
    registry: SignalRegistry,
    router: WireRouter,
    /// Module records in declaration order (slot order ABI).
    modules: Vec<ModuleProcess>,
    /// Execution order as indices into `modules`.
    order: Vec<usize>,
    wait_timeout: Duration,
    shutdown_done: bool,
}

impl ProcessManager {
    /// Materialize the segment and barrier from configuration and build
    /// the (unspawned) module records.
    ///
    /// Kernel object names are derived from this process's PID so that
    /// concurrent runs never collide and stale names are attributable.
    pub fn new(config: &HermesConfig) -> CoreResult<Self> {
        let pid = std::process::id();
        let segment_name = format!("/hermes_{pid}");
        let barrier_name = format!("/hermes_{pid}_barrier");
        Self::with_names(config, &segment_name, &barrier_name)
    }

    /// Materialize with explicit kernel object names (tests, tooling).
    pub fn with_names(
        config: &HermesConfig,
        segment_name: &str,
        barrier_name: &str,
    ) -> CoreResult<Self> {
        let registry = SignalRegistry::from_config(config)?;
        let router = WireRouter::compile(&config.wiring, &registry)?;

        let backplane = Backplane::create(segment_name, registry.descriptors())?;
        let barrier = match FrameBarrier::create(barrier_name, config.modules.len() as u32) {
            Ok(b) => b,
            Err(e) => {
                // `backplane` is dropped on this path and unlinks itself.
                return Err(e.into());
            }
        };
        info!(
            segment = segment_name,
            barrier = barrier_name,
            signals = registry.len(),
            modules = config.modules.len(),
            wires = router.len(),
            "process manager initialized"
        );

        let modules: Vec<ModuleProcess> = config
            .modules
            .iter()
            .map(|(name, module)| ModuleProcess::new(name, module, segment_name, barrier_name))
            .collect();

        let order = config
            .execution_order()
            .iter()
            .filter_map(|name| modules.iter().position(|m| m.name() == name))
            .collect();

        Ok(Self {
            segment_name: segment_name.to_string(),
            barrier_name: barrier_name.to_string(),
            backplane,
            barrier,
            registry,
            router,
            modules,
            order,
            wait_timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            shutdown_done: false,
        })
    }

    /// Override the coordinator-side wait bound (default 5 s).
    pub fn set_wait_timeout(&mut self, timeout: Duration) {
        self.wait_timeout = timeout;
    }

    /// Spawn every module in declaration order.
    ///
    /// On the first failure the already-spawned modules are terminated
    /// and the segment and barrier are unlinked before the error (which
    /// names the offending module) is returned.
    pub fn spawn_all(&mut self) -> CoreResult<()> {
        for i in 0..self.modules.len() {
            if let Err(e) = self.modules[i].spawn() {
                warn!(module = %self.modules[i].name(), error = %e, "spawn failed, rewinding");
                for j in 0..i {
                    self.modules[j].terminate(TERMINATE_GRACE, KILL_GRACE);
                }
                self.destroy_ipc();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stage every module: send `stage`, collect acks with a bounded
    /// timeout. Any failure is fatal.
    pub fn stage_all(&mut self) -> CoreResult<()> {
        for module in &mut self.modules {
            module.request_ack(ControlCommand::Stage, self.wait_timeout)?;
            module.state = ModuleState::Staged;
            debug!(module = %module.name(), "module staged");
        }
        Ok(())
    }

    /// Execute one frame across all modules.
    ///
    /// Routes wires at the frame boundary (so consumers observe wired
    /// values produced up to the previous frame and driver-injected
    /// inputs from between frames), releases `step` for every
    /// participant, then collects one `done` per module while iterating
    /// the configured execution order.
    pub fn step_all(&mut self) -> CoreResult<()> {
        self.router.route(&self.backplane)?;

        self.barrier.signal_step()?;

        for i in 0..self.order.len() {
            let idx = self.order[i];
            let released = self.barrier.wait_done(Some(self.wait_timeout))?;
            if !released {
                return Err(self.diagnose_missing_done(idx));
            }
        }

        for module in &mut self.modules {
            if matches!(module.state, ModuleState::Staged | ModuleState::Paused) {
                module.state = ModuleState::Running;
            }
        }
        Ok(())
    }

    /// A `done` collection timed out: attribute it.
    ///
    /// The done semaphore is anonymous, so a dead module anywhere
    /// explains a missing post better than the module currently being
    /// waited for. Prefer the crash report; fall back to a timeout
    /// naming the awaited module.
    fn diagnose_missing_done(&mut self, awaited_idx: usize) -> CoreError {
        for module in &mut self.modules {
            if !module.is_alive() {
                module.state = ModuleState::Error;
                let status = module
                    .exit_description()
                    .unwrap_or("unknown exit")
                    .to_string();
                return CoreError::ModuleCrashed {
                    name: module.name().to_string(),
                    pid: module.pid().unwrap_or(0),
                    status,
                };
            }
        }
        let module = &mut self.modules[awaited_idx];
        module.state = ModuleState::Error;
        CoreError::BarrierTimeout {
            module: Some(module.name().to_string()),
            phase: BarrierPhase::Done,
        }
    }

    /// Write both clock fields into the segment header.
    pub fn update_clock(&self, frame: u64, time_ns: u64) -> CoreResult<()> {
        self.backplane.set_clock(frame, time_ns)?;
        Ok(())
    }

    /// Send `reset` to every module, collect acks, then re-zero the
    /// header clock.
    pub fn reset_all(&mut self) -> CoreResult<()> {
        for module in &mut self.modules {
            module.request_ack(ControlCommand::Reset, self.wait_timeout)?;
            module.state = ModuleState::Staged;
        }
        self.backplane.set_clock(0, 0)?;
        Ok(())
    }

    /// Record the pause in the module states. The actual gating happens
    /// in the scheduler, which stops issuing step releases.
    pub fn mark_paused(&mut self) {
        for module in &mut self.modules {
            if module.state == ModuleState::Running {
                module.state = ModuleState::Paused;
            }
        }
    }

    /// Record resumption in the module states.
    pub fn mark_running(&mut self) {
        for module in &mut self.modules {
            if module.state == ModuleState::Paused {
                module.state = ModuleState::Running;
            }
        }
    }

    /// Terminate every module (reverse declaration order) and unlink the
    /// segment and barrier. Idempotent; also invoked from `Drop` so the
    /// names never outlive the coordinator.
    pub fn terminate_all(&mut self) {
        if self.shutdown_done {
            return;
        }
        for module in self.modules.iter_mut().rev() {
            module.terminate(TERMINATE_GRACE, KILL_GRACE);
        }
        self.destroy_ipc();
        info!("all modules terminated, IPC unlinked");
    }

    fn destroy_ipc(&mut self) {
        self.barrier.destroy();
        self.backplane.destroy();
        self.shutdown_done = true;
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// The shared backplane segment.
    pub fn backplane(&self) -> &Backplane {
        &self.backplane
    }

    /// The signal registry (read-only after build).
    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    /// Kernel name of the segment.
    pub fn segment_name(&self) -> &str {
        &self.segment_name
    }

    /// Base kernel name of the barrier semaphores.
    pub fn barrier_name(&self) -> &str {
        &self.barrier_name
    }

    /// Number of managed modules.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// PID of a module's spawned process.
    pub fn module_pid(&self, name: &str) -> Option<u32> {
        self.modules
            .iter()
            .find(|m| m.name() == name)
            .and_then(|m| m.pid())
    }

    /// Current `(name, state)` of every module, in declaration order.
    pub fn module_states(&self) -> Vec<(String, ModuleState)> {
        self.modules
            .iter()
            .map(|m| (m.name().to_string(), m.state()))
            .collect()
    }
}

impl Drop for ProcessManager {
    fn drop(&mut self) {
        self.terminate_all();
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Describe an exit status as `"exit code N"` or `"signal N"`.
fn describe_exit(status: &std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    if let Some(code) = status.code() {
        format!("exit code {code}")
    } else if let Some(signal) = status.signal() {
        format!("signal {signal}")
    } else {
        "unknown exit".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_backplane::BackplaneError;

    fn parse_config(yaml: &str) -> HermesConfig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.yaml");
        std::fs::write(&path, yaml).unwrap();
        HermesConfig::load(&path).unwrap()
    }

    fn unique_names(suffix: &str) -> (String, String) {
        use std::sync::atomic::{AtomicU32, Ordering};
        static CTR: AtomicU32 = AtomicU32::new(0);
        let id = CTR.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        (
            format!("/hermes_test_pm_{pid}_{id}_{suffix}"),
            format!("/hermes_test_pm_{pid}_{id}_{suffix}_barrier"),
        )
    }

    const ONE_MODULE: &str = r#"
modules:
  m:
    type: process
    executable: /nonexistent/module_binary
    signals:
      - name: v
        writable: true
"#;

    #[test]
    fn new_creates_segment_and_barrier() {
        let config = parse_config(ONE_MODULE);
        let (seg, bar) = unique_names("create");
        let pm = ProcessManager::with_names(&config, &seg, &bar).unwrap();
        assert_eq!(pm.module_count(), 1);
        assert_eq!(pm.registry().len(), 1);
        assert_eq!(pm.backplane().signal_count(), 1);
        assert_eq!(pm.module_states()[0].1, ModuleState::Init);
        // Another coordinator cannot claim the same names.
        assert!(matches!(
            ProcessManager::with_names(&config, &seg, &bar),
            Err(CoreError::Backplane(BackplaneError::AlreadyExists { .. }))
        ));
    }

    #[test]
    fn spawn_failure_rewinds_and_unlinks() {
        let config = parse_config(ONE_MODULE);
        let (seg, bar) = unique_names("rewind");
        let mut pm = ProcessManager::with_names(&config, &seg, &bar).unwrap();

        let err = pm.spawn_all().unwrap_err();
        match &err {
            CoreError::ModuleSpawn { name, source } => {
                assert_eq!(name, "m");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected ModuleSpawn, got {other:?}"),
        }

        // IPC names must already be unlinked.
        assert!(matches!(
            Backplane::attach(&seg),
            Err(BackplaneError::NotFound { .. })
        ));
        assert!(matches!(
            FrameBarrier::attach(&bar),
            Err(BackplaneError::NotFound { .. })
        ));
    }

    #[test]
    fn terminate_all_is_idempotent_and_unlinks() {
        let config = parse_config(ONE_MODULE);
        let (seg, bar) = unique_names("shutdown");
        let mut pm = ProcessManager::with_names(&config, &seg, &bar).unwrap();

        pm.terminate_all();
        pm.terminate_all(); // no-op
        assert!(matches!(
            Backplane::attach(&seg),
            Err(BackplaneError::NotFound { .. })
        ));
    }

    #[test]
    fn drop_unlinks_ipc() {
        let config = parse_config(ONE_MODULE);
        let (seg, bar) = unique_names("drop");
        {
            let _pm = ProcessManager::with_names(&config, &seg, &bar).unwrap();
        }
        assert!(matches!(
            Backplane::attach(&seg),
            Err(BackplaneError::NotFound { .. })
        ));
        assert!(matches!(
            FrameBarrier::attach(&bar),
            Err(BackplaneError::NotFound { .. })
        ));
    }

    #[test]
    fn execution_order_follows_schedule() {
        let config = parse_config(
            r#"
modules:
  a:
    type: process
    executable: /nonexistent/bin
    signals: [{name: x}]
  b:
    type: process
    executable: /nonexistent/bin
    signals: [{name: y}]
execution:
  schedule: [b, a]
"#,
        );
        let (seg, bar) = unique_names("order");
        let pm = ProcessManager::with_names(&config, &seg, &bar).unwrap();
        assert_eq!(pm.order, vec![1, 0]);
        // Slot order still follows declaration order.
        assert_eq!(pm.registry().slot_of("a.x"), Some(0));
        assert_eq!(pm.registry().slot_of("b.y"), Some(1));
    }

    #[test]
    fn describe_exit_formats() {
        // A real exit status from a child that exits 0.
        let status = Command::new("/bin/true").status().unwrap();
        assert_eq!(describe_exit(&status), "exit code 0");
    }
}
