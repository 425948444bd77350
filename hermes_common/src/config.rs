//! Simulation configuration schema and YAML loading.
//!
//! Configuration is a first-class citizen in Hermes: everything about a
//! run - modules, signals, wiring, execution - comes from one YAML file,
//! no recompilation needed. This module defines the serde schema, the
//! loader, and the whole-config cross-checks that must pass before any
//! IPC object is created.
//!
//! Module declaration order is significant: it determines backplane slot
//! order, which is an ABI between the coordinator and module processes.
//! The `modules` map therefore preserves YAML insertion order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::NANOS_PER_SECOND;
use crate::signal::{validate_qualified_name, SignalType};

/// Error type for configuration loading and validation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the given path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Offending path.
        path: String,
    },

    /// YAML parsing failed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Module execution kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// External executable (C, C++, Rust, ...).
    Process,
    /// Interpreted script launched through its runtime.
    Script,
}

/// Scheduler execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Paced to wall-clock time (HIL, visualization).
    Realtime,
    /// As fast as possible (batch runs, Monte Carlo).
    Afap,
    /// Manual stepping (debugging, scripted scenarios).
    SingleFrame,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Realtime => "realtime",
            Self::Afap => "afap",
            Self::SingleFrame => "single_frame",
        };
        f.write_str(s)
    }
}

/// Configuration for one module signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Local signal name (without module prefix).
    pub name: String,

    /// Data type. Defaults to f64.
    #[serde(rename = "type", default)]
    pub data_type: SignalType,

    /// Physical unit string (e.g. `"m"`, `"rad/s"`).
    #[serde(default)]
    pub unit: String,

    /// Whether the signal may be written through the public API.
    #[serde(default)]
    pub writable: bool,

    /// Whether the signal is included in telemetry streams.
    #[serde(default = "default_true")]
    pub published: bool,
}

fn default_true() -> bool {
    true
}

/// Configuration for a single module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Module kind: process or script.
    #[serde(rename = "type")]
    pub kind: ModuleKind,

    /// For process modules: path to the executable.
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// For script modules: path to the script.
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Path to a module-specific configuration file, forwarded verbatim.
    #[serde(default)]
    pub config: Option<PathBuf>,

    /// Signal declarations, in slot order.
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
}

/// Configuration for a signal wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireConfig {
    /// Source signal (qualified name).
    pub src: String,

    /// Destination signal (qualified name).
    pub dst: String,

    /// Multiplicative gain applied to the source value.
    #[serde(default = "default_gain")]
    pub gain: f64,

    /// Additive offset applied after the gain.
    #[serde(default)]
    pub offset: f64,
}

fn default_gain() -> f64 {
    1.0
}

/// Execution and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Execution mode.
    #[serde(default = "default_mode")]
    pub mode: ExecutionMode,

    /// Simulation rate in Hz. Any rate >= 1 is accepted; the timestep is
    /// rounded to the nearest nanosecond.
    #[serde(default = "default_rate")]
    pub rate_hz: f64,

    /// Simulation end time in seconds. `None` = run until stopped.
    #[serde(default)]
    pub end_time: Option<f64>,

    /// Explicit execution order. Empty = module declaration order.
    #[serde(default)]
    pub schedule: Vec<String>,
}

fn default_mode() -> ExecutionMode {
    ExecutionMode::Afap
}

fn default_rate() -> f64 {
    100.0
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            rate_hz: default_rate(),
            end_time: None,
            schedule: Vec::new(),
        }
    }
}

impl ExecutionConfig {
    /// Timestep in integer nanoseconds: `round(1e9 / rate_hz)`.
    ///
    /// Time advances multiplicatively from this value, so the rounding
    /// error (at most 0.5 ns per frame) never compounds.
    pub fn dt_ns(&self) -> u64 {
        (NANOS_PER_SECOND as f64 / self.rate_hz).round() as u64
    }

    /// End time in integer nanoseconds, if configured.
    pub fn end_time_ns(&self) -> Option<u64> {
        self.end_time
            .map(|t| (t * NANOS_PER_SECOND as f64).round() as u64)
    }
}

/// WebSocket telemetry server settings, passed through to the server
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Whether to start the telemetry server.
    #[serde(default)]
    pub enabled: bool,

    /// Server bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Telemetry streaming rate in Hz.
    #[serde(default = "default_telemetry_hz")]
    pub telemetry_hz: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_telemetry_hz() -> f64 {
    60.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
            telemetry_hz: default_telemetry_hz(),
        }
    }
}

/// Ordered module map. Preserves YAML insertion order (slot order ABI)
/// and rejects duplicate module names at parse time.
#[derive(Debug, Clone, Default)]
pub struct ModuleMap(Vec<(String, ModuleConfig)>);

impl Serialize for ModuleMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, module) in &self.0 {
            map.serialize_entry(name, module)?;
        }
        map.end()
    }
}

impl ModuleMap {
    /// Number of modules.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no modules are configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(name, config)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleConfig)> {
        self.0.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Look up a module by name.
    pub fn get(&self, name: &str) -> Option<&ModuleConfig> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Whether a module with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Module names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|(n, _)| n.clone()).collect()
    }
}

impl<'de> Deserialize<'de> for ModuleMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct MapVisitor;

        impl<'de> serde::de::Visitor<'de> for MapVisitor {
            type Value = ModuleMap;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of module name to module configuration")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut entries: Vec<(String, ModuleConfig)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, cfg)) = access.next_entry::<String, ModuleConfig>()? {
                    if entries.iter().any(|(n, _)| *n == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate module name: {name}"
                        )));
                    }
                    entries.push((name, cfg));
                }
                Ok(ModuleMap(entries))
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// Root Hermes configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HermesConfig {
    /// Module configurations keyed by module name, in declaration order.
    pub modules: ModuleMap,

    /// Signal wiring between modules.
    #[serde(default)]
    pub wiring: Vec<WireConfig>,

    /// Execution settings.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Telemetry server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl HermesConfig {
    /// Load and validate a configuration from a YAML file.
    ///
    /// Relative module paths (`executable`, `script`, `config`) are
    /// resolved against the configuration file's directory.
    ///
    /// # Errors
    /// - [`ConfigError::FileNotFound`] if the file does not exist
    /// - [`ConfigError::Parse`] on YAML syntax or schema errors
    /// - [`ConfigError::Validation`] if any cross-check fails
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::Parse(e.to_string())
            }
        })?;

        let mut config: HermesConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        config.validate()?;
        Ok(config)
    }

    /// Resolve relative module paths against `base`.
    fn resolve_paths(&mut self, base: &Path) {
        for (_, module) in self.modules.0.iter_mut() {
            for p in [&mut module.executable, &mut module.script, &mut module.config]
                .into_iter()
                .flatten()
            {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
    }

    /// Run all whole-config cross-checks.
    ///
    /// Checks module kind requirements, signal name rules and qualified
    /// uniqueness, wire endpoint existence and writability, schedule
    /// membership, and the rate bound. Detected before any IPC object
    /// is created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modules.is_empty() {
            return Err(ConfigError::Validation("no modules configured".into()));
        }

        let mut qualified: HashSet<String> = HashSet::new();
        let mut writable: HashSet<String> = HashSet::new();

        for (name, module) in self.modules.iter() {
            match module.kind {
                ModuleKind::Process if module.executable.is_none() => {
                    return Err(ConfigError::Validation(format!(
                        "module '{name}': 'executable' required for process modules"
                    )));
                }
                ModuleKind::Script if module.script.is_none() => {
                    return Err(ConfigError::Validation(format!(
                        "module '{name}': 'script' required for script modules"
                    )));
                }
                _ => {}
            }

            for sig in &module.signals {
                let q = format!("{name}.{}", sig.name);
                validate_qualified_name(&q).map_err(|reason| {
                    ConfigError::Validation(format!("invalid signal name '{q}': {reason}"))
                })?;
                if !qualified.insert(q.clone()) {
                    return Err(ConfigError::Validation(format!(
                        "duplicate signal name: {q}"
                    )));
                }
                if sig.writable {
                    writable.insert(q);
                }
            }
        }

        for wire in &self.wiring {
            if !qualified.contains(&wire.src) {
                return Err(ConfigError::Validation(format!(
                    "wire source signal not found: {}",
                    wire.src
                )));
            }
            if !qualified.contains(&wire.dst) {
                return Err(ConfigError::Validation(format!(
                    "wire destination signal not found: {}",
                    wire.dst
                )));
            }
            if !writable.contains(&wire.dst) {
                return Err(ConfigError::Validation(format!(
                    "wire destination not writable: {}",
                    wire.dst
                )));
            }
            if wire.src == wire.dst {
                return Err(ConfigError::Validation(format!(
                    "wire source equals destination: {}",
                    wire.src
                )));
            }
        }

        let mut seen = HashSet::new();
        for name in &self.execution.schedule {
            if !self.modules.contains(name) {
                return Err(ConfigError::Validation(format!(
                    "schedule references unknown module: {name}"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "schedule lists module twice: {name}"
                )));
            }
        }

        if self.execution.rate_hz < 1.0 {
            return Err(ConfigError::Validation(format!(
                "rate_hz must be >= 1, got {}",
                self.execution.rate_hz
            )));
        }

        Ok(())
    }

    /// Module names in execution order: the explicit schedule if set,
    /// otherwise declaration order.
    pub fn execution_order(&self) -> Vec<String> {
        if self.execution.schedule.is_empty() {
            self.modules.names()
        } else {
            self.execution.schedule.clone()
        }
    }

    /// Total number of declared signals.
    pub fn signal_count(&self) -> usize {
        self.modules.iter().map(|(_, m)| m.signals.len()).sum()
    }
}
