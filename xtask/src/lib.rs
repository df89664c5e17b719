use anyhow::Result;
use std::env;
use std::process::Command;
use std::string::String;

/// Options derived from the host machine used to configure cargo commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub features: Vec<String>,
    pub rustflags: Option<String>,
}

impl BuildConfig {
    /// Join features into a single string suitable for passing to cargo.
    pub fn features_arg(&self) -> Option<String> {
        if self.features.is_empty() {
            None
        } else {
            Some(self.features.join(" "))
        }
    }
}

/// Detect build configuration from the current machine.
pub fn detect_config() -> BuildConfig {
    let arch = detect_arch();
    let cpu_flags = detect_cpu_flags();
    let nproc = detect_nproc();
    let extra = env::var("FPMDFT_FEATURES").unwrap_or_default();
    compute_config(&arch, &cpu_flags, nproc, &extra)
}

fn detect_arch() -> String {
    if let Ok(arch) = env::var("ARCH") {
        if !arch.trim().is_empty() {
            return arch;
        }
    }
    Command::new("uname")
        .arg("-m")
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default()
}

fn detect_cpu_flags() -> String {
    if let Ok(out) = Command::new("lscpu").output() {
        let s = String::from_utf8_lossy(&out.stdout);
        for line in s.lines() {
            if line.to_lowercase().contains("flags") {
                return line.to_string();
            }
        }
    }
    if let Ok(out) = Command::new("sysctl")
        .args(["-n", "machdep.cpu.features"])
        .output()
    {
        return String::from_utf8_lossy(&out.stdout).to_string();
    }
    String::new()
}

fn detect_nproc() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Compute a [`BuildConfig`] from supplied inputs. This is separated for testing.
///
/// Multi-core hosts get the `parallel` feature. On x86_64 hosts with AVX2 the
/// benchmarks are built with FMA enabled so the masked DFT accumulation can
/// be fused.
pub fn compute_config(arch: &str, cpu_flags: &str, nproc: usize, extra: &str) -> BuildConfig {
    let mut features = Vec::new();
    let mut rustflags = None;

    if arch.contains("x86_64") {
        if cpu_flags.contains("avx512f") {
            rustflags = Some("-C target-feature=+avx512f,+fma".into());
        } else if cpu_flags.contains("avx2") {
            rustflags = Some("-C target-feature=+avx2,+fma".into());
        }
    } else if arch.contains("aarch64") || arch.contains("arm64") {
        rustflags = Some("-C target-cpu=native".into());
    }

    if nproc > 1 {
        features.push("parallel".into());
    }

    for feat in extra.split_whitespace() {
        if !feat.is_empty() && !features.iter().any(|f| f == feat) {
            features.push(feat.to_string());
        }
    }

    BuildConfig {
        features,
        rustflags,
    }
}

pub fn build_command(cfg: &BuildConfig) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.arg("build");
    if let Some(f) = cfg.features_arg() {
        cmd.arg("--features").arg(f);
    }
    cmd
}

pub fn test_command(cfg: &BuildConfig) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.arg("test");
    if let Some(f) = cfg.features_arg() {
        cmd.arg("--features").arg(f);
    }
    cmd
}

pub fn clippy_command() -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["clippy", "--all-targets", "--all-features"]);
    cmd
}

pub fn fmt_command() -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["fmt", "--all"]);
    cmd
}

/// Criterion benches of the bench crate. Only `parallel` is forwarded; the
/// bench crate exposes no other features.
pub fn benchmark_command(cfg: &BuildConfig) -> Command {
    let mut cmd = Command::new("cargo");
    if let Some(rf) = &cfg.rustflags {
        cmd.env("RUSTFLAGS", rf);
    }
    cmd.args(["bench", "--manifest-path", "fpmdft-bench/Cargo.toml"]);
    if cfg.features.iter().any(|f| f == "parallel") {
        cmd.arg("--features").arg("parallel");
    }
    cmd
}

pub fn demo_command(cfg: &BuildConfig, name: &str) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["run", "--release", "--example", name]);
    let mut features = cfg.features.clone();
    if name == "verbose_logging" && !features.iter().any(|f| f == "verbose-logging") {
        features.push("verbose-logging".into());
    }
    if !features.is_empty() {
        cmd.arg("--features").arg(features.join(" "));
    }
    cmd
}

/// Run a command to completion, failing on a non-zero exit.
pub fn run(cmd: &mut Command) -> Result<()> {
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{:?} exited with {}", cmd.get_program(), status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_compute_x86_avx512() {
        let cfg = compute_config("x86_64", "flags: avx512f sse4_1", 4, "verbose-logging");
        assert!(cfg.features.contains(&"parallel".into()));
        assert!(cfg.features.contains(&"verbose-logging".into()));
        assert_eq!(
            cfg.rustflags.as_deref(),
            Some("-C target-feature=+avx512f,+fma")
        );
    }

    #[test]
    fn test_compute_x86_avx2_single_core() {
        let cfg = compute_config("x86_64", "flags: avx2", 1, "");
        assert!(cfg.features.is_empty());
        assert_eq!(
            cfg.rustflags.as_deref(),
            Some("-C target-feature=+avx2,+fma")
        );
    }

    #[test]
    fn test_compute_aarch64() {
        let cfg = compute_config("aarch64", "", 1, "feat1 feat2 feat1");
        assert_eq!(cfg.features, vec!["feat1".to_string(), "feat2".to_string()]);
        assert_eq!(cfg.rustflags.as_deref(), Some("-C target-cpu=native"));
    }

    #[test]
    fn test_commands_include_features() {
        let cfg = compute_config("x86_64", "flags: avx2", 2, "internal-tests");
        let a = args(&build_command(&cfg));
        assert!(a.contains(&"build".to_string()));
        assert!(a.contains(&"--features".to_string()));
        assert!(a.iter().any(|s| s.contains("internal-tests")));
    }

    #[test]
    fn test_benchmark_env() {
        let cfg = compute_config("x86_64", "flags: avx2", 2, "internal-tests");
        let cmd = benchmark_command(&cfg);
        let envs: Vec<_> = cmd
            .get_envs()
            .map(|(k, v)| {
                (
                    k.to_str().unwrap().to_string(),
                    v.unwrap().to_str().unwrap().to_string(),
                )
            })
            .collect();
        assert!(envs
            .iter()
            .any(|(k, v)| k == "RUSTFLAGS" && v.contains("avx2")));
        let a = args(&cmd);
        assert!(a.contains(&"fpmdft-bench/Cargo.toml".to_string()));
        assert!(a.contains(&"parallel".to_string()));
        assert!(!a.iter().any(|s| s.contains("internal-tests")));
    }

    #[test]
    fn test_other_commands() {
        let cfg = compute_config("x86_64", "", 1, "");
        assert!(test_command(&cfg).get_args().any(|a| a == "test"));
        assert!(clippy_command().get_args().any(|a| a == "clippy"));
        assert!(fmt_command().get_args().any(|a| a == "fmt"));
        let demo = args(&demo_command(&cfg, "verbose_logging"));
        assert!(demo.contains(&"verbose_logging".to_string()));
        assert!(demo.contains(&"verbose-logging".to_string()));
        let plain = args(&demo_command(&cfg, "coronagraph"));
        assert!(!plain.contains(&"--features".to_string()));
    }

    #[test]
    fn test_detect_functions() {
        let arch = detect_arch();
        let _flags = detect_cpu_flags();
        let nproc = detect_nproc();
        assert!(!arch.is_empty());
        assert!(nproc >= 1);
    }
}
