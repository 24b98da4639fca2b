//! Crate-wide error type.
//!
//! Each module reports its own error; [`Error`] wraps them for callers that
//! propagate more than one kind with `?`.

use thiserror::Error;

use crate::amp::AmpError;
use crate::custom::GradError;
use crate::package::ImportError;
use crate::version::VersionError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Grad(#[from] GradError),
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Amp(#[from] AmpError),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
