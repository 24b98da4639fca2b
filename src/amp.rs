//! Automatic mixed precision (autocast) state.
//!
//! This module holds the process-wide autocast level and compute dtype that
//! kernels consult to decide whether to run in reduced precision.
//!
//! # Levels
//!
//! - `O0` — autocast disabled; everything runs in full precision (default).
//! - `O1` — white-listed ops run in the autocast dtype.
//! - `O2` — almost everything runs in the autocast dtype.
//!
//! The state is stored globally using `AtomicU8`s, like the compute backend,
//! so reads are cheap and never block. Kernels should read it through the
//! [`AmpState`] trait so that tests and hosts can substitute their own state;
//! [`GlobalAmpState`] is the accessor for the process-wide values.
//!
//! # Scoped Changes
//!
//! [`AutoCast`] switches the global state for the lifetime of a guard and
//! restores the previous values when dropped.

use core::convert::TryFrom;
use core::fmt;
use core::str::FromStr;
use core::sync::atomic::{AtomicU8, Ordering};

use log::debug;
use thiserror::Error;

/// An unrecognized autocast level or dtype name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmpError {
    #[error("unknown autocast level `{0}` (expected O0, O1 or O2)")]
    UnknownLevel(String),
    #[error("unknown autocast dtype `{0}` (expected float16, bfloat16 or float32)")]
    UnknownDtype(String),
}

/// How aggressively autocast is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum AmpLevel {
    /// Autocast disabled (default).
    #[default]
    O0 = 0,
    /// Mixed precision on white-listed ops.
    O1,
    /// Pure reduced precision except black-listed ops.
    O2,
}

impl TryFrom<u8> for AmpLevel {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::O0),
            1 => Ok(Self::O1),
            2 => Ok(Self::O2),
            _ => Err(()),
        }
    }
}

impl FromStr for AmpLevel {
    type Err = AmpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "O0" => Ok(Self::O0),
            "O1" => Ok(Self::O1),
            "O2" => Ok(Self::O2),
            _ => Err(AmpError::UnknownLevel(s.to_owned())),
        }
    }
}

impl fmt::Display for AmpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::O0 => "O0",
            Self::O1 => "O1",
            Self::O2 => "O2",
        })
    }
}

/// The reduced-precision dtype autocast computes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AmpDtype {
    /// IEEE half precision (default).
    #[default]
    Float16 = 0,
    /// Brain floating point.
    BFloat16,
    /// Full precision; autocast becomes a no-op cast.
    Float32,
}

impl AmpDtype {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Float16 | Self::BFloat16 => 2,
            Self::Float32 => 4,
        }
    }
}

impl TryFrom<u8> for AmpDtype {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Float16),
            1 => Ok(Self::BFloat16),
            2 => Ok(Self::Float32),
            _ => Err(()),
        }
    }
}

impl FromStr for AmpDtype {
    type Err = AmpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float16" | "fp16" | "half" => Ok(Self::Float16),
            "bfloat16" | "bf16" => Ok(Self::BFloat16),
            "float32" | "fp32" | "float" => Ok(Self::Float32),
            _ => Err(AmpError::UnknownDtype(s.to_owned())),
        }
    }
}

impl fmt::Display for AmpDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Float16 => "float16",
            Self::BFloat16 => "bfloat16",
            Self::Float32 => "float32",
        })
    }
}

/// Read access to autocast state.
pub trait AmpState {
    fn amp_level(&self) -> AmpLevel;
    fn amp_dtype(&self) -> AmpDtype;
}

impl<S: AmpState + ?Sized> AmpState for &S {
    fn amp_level(&self) -> AmpLevel {
        (**self).amp_level()
    }

    fn amp_dtype(&self) -> AmpDtype {
        (**self).amp_dtype()
    }
}

/// Internal global state for the active autocast level.
///
/// This uses acquire/release ordering, but level and dtype are separate
/// atomics: a reader racing a writer may see the new level with the old dtype.
static GLOBAL_AMP_LEVEL: AtomicU8 = AtomicU8::new(AmpLevel::O0 as u8);

/// Internal global state for the active autocast dtype.
static GLOBAL_AMP_DTYPE: AtomicU8 = AtomicU8::new(AmpDtype::Float16 as u8);

/// The process-wide autocast state.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalAmpState;

impl AmpState for GlobalAmpState {
    fn amp_level(&self) -> AmpLevel {
        AmpLevel::try_from(GLOBAL_AMP_LEVEL.load(Ordering::Acquire)).unwrap_or_default()
    }

    fn amp_dtype(&self) -> AmpDtype {
        AmpDtype::try_from(GLOBAL_AMP_DTYPE.load(Ordering::Acquire)).unwrap_or_default()
    }
}

/// A fixed autocast state, independent of the global one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedAmpState {
    pub level: AmpLevel,
    pub dtype: AmpDtype,
}

impl FixedAmpState {
    pub const fn new(level: AmpLevel, dtype: AmpDtype) -> Self {
        Self { level, dtype }
    }
}

impl AmpState for FixedAmpState {
    fn amp_level(&self) -> AmpLevel {
        self.level
    }

    fn amp_dtype(&self) -> AmpDtype {
        self.dtype
    }
}

/// Sets the process-wide autocast level, returning the previous one.
///
/// # Example
///
/// ```
/// use briny_kernel::amp::{set_amp_level, AmpLevel};
/// let previous = set_amp_level(AmpLevel::O1);
/// set_amp_level(previous);
/// ```
pub fn set_amp_level(level: AmpLevel) -> AmpLevel {
    AmpLevel::try_from(GLOBAL_AMP_LEVEL.swap(level as u8, Ordering::AcqRel)).unwrap_or_default()
}

/// Sets the process-wide autocast dtype, returning the previous one.
pub fn set_amp_dtype(dtype: AmpDtype) -> AmpDtype {
    AmpDtype::try_from(GLOBAL_AMP_DTYPE.swap(dtype as u8, Ordering::AcqRel)).unwrap_or_default()
}

/// Whether `state` has autocast turned on (any level but `O0`).
pub fn is_autocast_enabled_in<S: AmpState + ?Sized>(state: &S) -> bool {
    state.amp_level() != AmpLevel::O0
}

/// The dtype `state` autocasts to.
pub fn autocast_dtype_in<S: AmpState + ?Sized>(state: &S) -> AmpDtype {
    state.amp_dtype()
}

/// Whether autocast is currently on for the process.
///
/// # Example
///
/// ```
/// use briny_kernel::amp::is_autocast_enabled;
/// let enabled = is_autocast_enabled();
/// ```
pub fn is_autocast_enabled() -> bool {
    is_autocast_enabled_in(&GlobalAmpState)
}

/// The dtype the process currently autocasts to.
pub fn get_autocast_gpu_dtype() -> AmpDtype {
    autocast_dtype_in(&GlobalAmpState)
}

/// Scoped autocast: sets the global state on creation, restores it on drop.
///
/// # Example
///
/// ```
/// use briny_kernel::amp::{get_autocast_gpu_dtype, AmpDtype, AmpLevel, AutoCast};
///
/// {
///     let _guard = AutoCast::new(true, AmpLevel::O2, AmpDtype::BFloat16);
///     assert_eq!(get_autocast_gpu_dtype(), AmpDtype::BFloat16);
/// }
/// ```
#[derive(Debug)]
#[must_use = "autocast is reverted as soon as the guard is dropped"]
pub struct AutoCast {
    previous_level: AmpLevel,
    previous_dtype: AmpDtype,
}

impl AutoCast {
    /// Switches to `level`/`dtype`, or to `O0` if `enable` is false.
    pub fn new(enable: bool, level: AmpLevel, dtype: AmpDtype) -> Self {
        let level = if enable { level } else { AmpLevel::O0 };
        let previous_level = set_amp_level(level);
        let previous_dtype = set_amp_dtype(dtype);
        debug!("autocast {previous_level}/{previous_dtype} -> {level}/{dtype}");
        Self {
            previous_level,
            previous_dtype,
        }
    }

    /// Enables `level` at the default dtype.
    pub fn enable(level: AmpLevel) -> Self {
        Self::new(true, level, AmpDtype::default())
    }

    /// Disables autocast for the scope.
    pub fn disable() -> Self {
        Self::new(false, AmpLevel::O0, GlobalAmpState.amp_dtype())
    }
}

impl Drop for AutoCast {
    fn drop(&mut self) {
        set_amp_level(self.previous_level);
        set_amp_dtype(self.previous_dtype);
        debug!(
            "autocast restored to {}/{}",
            self.previous_level, self.previous_dtype
        );
    }
}
