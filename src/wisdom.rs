//! Measured FFT kernel choices, persisted per precision.
//!
//! A [`Wisdom`] table maps power-of-two transform lengths to the kernel
//! that measured fastest on this machine. Tables are written to
//! `<dir>/fft_wisdom_<precision>.dat`, where `<dir>` defaults to
//! [`DEFAULT_CONFIG_DIR`] and can be overridden with the
//! `FPMDFT_CONFIG_DIR` environment variable.
//!
//! The file is plain text:
//!
//! ```text
//! fpmdft-wisdom 1
//! precision f64
//! blake3 <hex digest of the body>
//! 64 stockham
//! 128 radix2
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::string::{String, ToString};
use std::time::Instant;
use std::vec::Vec;

use crate::fft::{FftError, FftImpl, FftPlanner, FftStrategy, ScalarFftImpl};
use crate::num::{Complex, Float};

pub const DEFAULT_CONFIG_DIR: &str = "fftconf";

const MAGIC: &str = "fpmdft-wisdom 1";
const MEASURE_ROUNDS: usize = 8;

/// Directory wisdom files are read from and written to.
pub fn config_dir() -> PathBuf {
    std::env::var_os("FPMDFT_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR))
}

#[derive(Debug)]
pub enum WisdomError {
    Io(io::Error),
    /// Unparseable line, 1-based.
    Malformed { line: usize },
    PrecisionMismatch { expected: &'static str, found: String },
    ChecksumMismatch,
    Fft(FftError),
}

impl fmt::Display for WisdomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WisdomError::Io(e) => write!(f, "wisdom i/o error: {e}"),
            WisdomError::Malformed { line } => write!(f, "malformed wisdom file at line {line}"),
            WisdomError::PrecisionMismatch { expected, found } => {
                write!(f, "wisdom precision mismatch: expected {expected}, found {found}")
            }
            WisdomError::ChecksumMismatch => write!(f, "wisdom checksum mismatch"),
            WisdomError::Fft(e) => write!(f, "wisdom measurement failed: {e}"),
        }
    }
}

impl std::error::Error for WisdomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WisdomError::Io(e) => Some(e),
            WisdomError::Fft(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WisdomError {
    fn from(e: io::Error) -> Self {
        WisdomError::Io(e)
    }
}

impl From<FftError> for WisdomError {
    fn from(e: FftError) -> Self {
        WisdomError::Fft(e)
    }
}

/// Per-length kernel choices for one precision.
#[derive(Debug, Clone, PartialEq)]
pub struct Wisdom<T: Float> {
    entries: BTreeMap<usize, FftStrategy>,
    _precision: PhantomData<T>,
}

impl<T: Float> Default for Wisdom<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Wisdom<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            _precision: PhantomData,
        }
    }

    pub fn get(&self, n: usize) -> Option<FftStrategy> {
        self.entries.get(&n).copied()
    }

    /// Record a kernel for length `n`. `Auto` clears the entry.
    pub fn insert(&mut self, n: usize, strategy: FftStrategy) {
        if strategy == FftStrategy::Auto {
            self.entries.remove(&n);
        } else {
            self.entries.insert(n, strategy);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, FftStrategy)> + '_ {
        self.entries.iter().map(|(&n, &s)| (n, s))
    }

    /// File name for this precision.
    pub fn file_name() -> String {
        std::format!("fft_wisdom_{}.dat", T::NAME)
    }

    /// Time both kernels on a length-`n` transform and record the faster.
    pub fn measure(&mut self, n: usize) -> Result<FftStrategy, WisdomError> {
        let fft = ScalarFftImpl::<T>::default();
        let signal: Vec<Complex<T>> = (0..n)
            .map(|i| {
                let t = i as f64 / n.max(1) as f64;
                Complex::new(T::from_f64(t), T::from_f64(1.0 - t))
            })
            .collect();
        let mut best = (FftStrategy::Radix2, u128::MAX);
        for strategy in [FftStrategy::Radix2, FftStrategy::Stockham] {
            let mut buf = signal.clone();
            // warm the twiddle cache
            fft.fft_with_strategy(&mut buf, strategy)?;
            let start = Instant::now();
            for _ in 0..MEASURE_ROUNDS {
                buf.copy_from_slice(&signal);
                fft.fft_with_strategy(&mut buf, strategy)?;
            }
            let elapsed = start.elapsed().as_nanos();
            debug_log!("wisdom: n={} {} took {}ns", n, strategy.as_str(), elapsed);
            if elapsed < best.1 {
                best = (strategy, elapsed);
            }
        }
        self.insert(n, best.0);
        Ok(best.0)
    }

    /// Measure every power of two from 2 up to `2^max_log2`.
    pub fn optimize(&mut self, max_log2: u32) -> Result<(), WisdomError> {
        for k in 1..=max_log2 {
            self.measure(1usize << k)?;
        }
        Ok(())
    }

    fn body(&self) -> String {
        let mut body = String::new();
        for (n, s) in self.iter() {
            body.push_str(&n.to_string());
            body.push(' ');
            body.push_str(s.as_str());
            body.push('\n');
        }
        body
    }

    /// Serialize with header and digest.
    pub fn to_text(&self) -> String {
        let body = self.body();
        let digest = blake3::hash(body.as_bytes());
        std::format!(
            "{MAGIC}\nprecision {}\nblake3 {}\n{body}",
            T::NAME,
            digest.to_hex()
        )
    }

    /// Parse text produced by [`Wisdom::to_text`].
    pub fn from_text(text: &str) -> Result<Self, WisdomError> {
        let mut lines = text.split_inclusive('\n');
        let header = lines.next().map(str::trim_end);
        if header != Some(MAGIC) {
            return Err(WisdomError::Malformed { line: 1 });
        }
        let precision = lines
            .next()
            .and_then(|l| l.trim_end().strip_prefix("precision "))
            .ok_or(WisdomError::Malformed { line: 2 })?;
        if precision != T::NAME {
            return Err(WisdomError::PrecisionMismatch {
                expected: T::NAME,
                found: precision.to_string(),
            });
        }
        let digest = lines
            .next()
            .and_then(|l| l.trim_end().strip_prefix("blake3 "))
            .ok_or(WisdomError::Malformed { line: 3 })?
            .to_string();
        let body: String = lines.collect();

        let mut hasher = blake3::Hasher::new();
        hasher.update(body.as_bytes());
        if hasher.finalize().to_hex().as_str() != digest {
            return Err(WisdomError::ChecksumMismatch);
        }

        let mut wisdom = Self::new();
        for (i, line) in body.lines().enumerate() {
            let line_no = i + 4;
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let n = parts
                .next()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| n.is_power_of_two())
                .ok_or(WisdomError::Malformed { line: line_no })?;
            let strategy = parts
                .next()
                .and_then(|s| s.parse::<FftStrategy>().ok())
                .ok_or(WisdomError::Malformed { line: line_no })?;
            if parts.next().is_some() {
                return Err(WisdomError::Malformed { line: line_no });
            }
            wisdom.insert(n, strategy);
        }
        Ok(wisdom)
    }

    /// Write the table into `dir`, creating it if needed.
    pub fn export(&self, dir: &Path) -> Result<PathBuf, WisdomError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name());
        fs::write(&path, self.to_text())?;
        info_log!(
            "wisdom: wrote {} entries to {}",
            self.len(),
            path.display()
        );
        Ok(path)
    }

    /// Read the table for this precision from `dir`. A missing file yields
    /// an empty table.
    pub fn import(dir: &Path) -> Result<Self, WisdomError> {
        let path = dir.join(Self::file_name());
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn_log!("wisdom: {} not found, using defaults", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let wisdom = Self::from_text(&text)?;
        info_log!(
            "wisdom: loaded {} entries from {}",
            wisdom.len(),
            path.display()
        );
        Ok(wisdom)
    }

    /// Apply every entry to a planner.
    pub fn apply(&self, planner: &mut FftPlanner<T>) {
        for (n, s) in self.iter() {
            planner.set_strategy(n, s);
        }
    }
}

impl<T: Float> FftPlanner<T> {
    /// Planner preloaded with measured kernel choices.
    pub fn with_wisdom(wisdom: &Wisdom<T>) -> Self {
        let mut planner = Self::new();
        wisdom.apply(&mut planner);
        planner
    }
}
