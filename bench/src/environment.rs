//! Detection of the host environment for the report header.
//!
//! Linux-specific data (memory limits, peak memory) degrades to `unknown` or [None] on other
//! platforms.

use crate::config::{EnvVars, Surface};
use std::fmt::{Display, Formatter};

/// The oldest Rust toolchain envbench supports.
pub const MINIMUM_RUST_VERSION: RustVersion = RustVersion::new(1, 80, 0);

/// The `rustc --version` of the toolchain that compiled envbench, recorded by the build script.
pub const BUILD_TOOLCHAIN: &str = env!("ENVBENCH_RUSTC_VERSION");

/// The message printed when the build toolchain is older than [MINIMUM_RUST_VERSION].
pub const UNSUPPORTED_TOOLCHAIN_MESSAGE: &str = "envbench requires Rust 1.80 or higher.";

/// Limits at or above this value are reported by cgroup v1 when no limit is set.
const CGROUP_V1_UNLIMITED: u64 = 1 << 62;

/// A `major.minor.patch` Rust version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RustVersion {
    major: u64,
    minor: u64,
    patch: u64,
}

impl RustVersion {
    /// Creates a new [RustVersion].
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Extracts the version from the output of `rustc --version`, e.g.
    /// `rustc 1.80.1 (3f5fd8dd4 2024-08-06)` or `rustc 1.83.0-nightly (...)`.
    pub fn from_rustc_output(output: &str) -> Option<Self> {
        let version = output.split_whitespace().nth(1)?;
        let version = version.split(['-', '+']).next()?;
        let mut parts = version.split('.').map(str::parse::<u64>);
        let major = parts.next()?.ok()?;
        let minor = parts.next()?.ok()?;
        let patch = parts.next().and_then(Result::ok).unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }
}

impl Display for RustVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Everything the report header shows about the host.
#[derive(Debug, Clone)]
pub struct EnvironmentInfo {
    /// When the report was generated.
    pub generated_at: String,
    /// The version of envbench.
    pub tool_version: &'static str,
    /// The `rustc --version` of the toolchain that compiled envbench, if known.
    pub rust_toolchain: Option<String>,
    /// The operating system and the architecture.
    pub platform: String,
    /// The host name, or `SERVER_NAME@SERVER_ADDR` when running as a CGI script.
    pub server: String,
    /// The memory limit of the process.
    pub max_memory: String,
    /// `release` or `debug`.
    pub build_profile: &'static str,
    /// Whether debug assertions are compiled in.
    pub debug_assertions: bool,
    /// The SIMD features compiled in.
    pub target_features: String,
}

impl EnvironmentInfo {
    /// Inspects the current environment.
    pub fn detect(surface: Surface, vars: &EnvVars) -> Self {
        Self {
            generated_at: chrono::Local::now()
                .format("%d/%b/%Y %H:%M:%S %Z")
                .to_string(),
            tool_version: env!("CARGO_PKG_VERSION"),
            rust_toolchain: Some(BUILD_TOOLCHAIN.to_owned()),
            platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            server: server_name(surface, vars),
            max_memory: memory_limit().unwrap_or_else(|| "unknown".to_owned()),
            build_profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
            debug_assertions: cfg!(debug_assertions),
            target_features: target_features(),
        }
    }

    /// Returns the version of the build toolchain.
    pub fn rust_version(&self) -> Option<RustVersion> {
        self.rust_toolchain
            .as_deref()
            .and_then(RustVersion::from_rustc_output)
    }

    /// Returns false if envbench was built with a toolchain older than [MINIMUM_RUST_VERSION].
    ///
    /// An unknown toolchain is accepted.
    pub fn meets_version_floor(&self) -> bool {
        self.rust_version()
            .map_or(true, |version| version >= MINIMUM_RUST_VERSION)
    }
}

fn server_name(surface: Surface, vars: &EnvVars) -> String {
    match surface {
        Surface::Cli => host_name(vars).unwrap_or_else(|| "unknown".to_owned()),
        Surface::Cgi => {
            let name = vars.get("SERVER_NAME").map_or("unknown", String::as_str);
            let addr = vars.get("SERVER_ADDR").map_or("unknown", String::as_str);
            format!("{name}@{addr}")
        }
    }
}

fn host_name(vars: &EnvVars) -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .or_else(|| vars.get("HOSTNAME").cloned())
        .or_else(|| vars.get("COMPUTERNAME").cloned())
}

/// Reads the memory limit of the cgroup of this process (Linux only).
fn memory_limit() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/sys/fs/cgroup/memory.max")
            .or_else(|_| std::fs::read_to_string("/sys/fs/cgroup/memory/memory.limit_in_bytes"))
            .ok()
            .and_then(|raw| describe_memory_limit(&raw))
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Renders the content of a cgroup memory limit file.
#[allow(clippy::cast_precision_loss)]
fn describe_memory_limit(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw == "max" {
        return Some("unlimited".to_owned());
    }
    let bytes = raw.parse::<u64>().ok()?;
    if bytes >= CGROUP_V1_UNLIMITED {
        return Some("unlimited".to_owned());
    }
    Some(format!("{:.0} MiB", bytes as f64 / 1024.0 / 1024.0))
}

fn target_features() -> String {
    let features = [
        ("sse2", cfg!(target_feature = "sse2")),
        ("sse4.2", cfg!(target_feature = "sse4.2")),
        ("avx", cfg!(target_feature = "avx")),
        ("avx2", cfg!(target_feature = "avx2")),
        ("avx512f", cfg!(target_feature = "avx512f")),
        ("neon", cfg!(target_feature = "neon")),
    ]
    .into_iter()
    .filter_map(|(name, enabled)| enabled.then_some(name))
    .collect::<Vec<_>>();

    if features.is_empty() {
        "baseline".to_owned()
    } else {
        features.join(", ")
    }
}

/// Returns the peak resident memory of this process in MiB (Linux only).
pub fn peak_memory_mib() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| parse_vm_hwm(&status))
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Extracts `VmHWM` from the content of `/proc/<pid>/status`, in MiB.
#[allow(clippy::cast_precision_loss)]
fn parse_vm_hwm(status: &str) -> Option<f64> {
    status
        .lines()
        .find(|line| line.starts_with("VmHWM:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kib| kib.parse::<u64>().ok())
        .map(|kib| kib as f64 / 1024.0)
}
