//! Version gates on installed packages.
//!
//! Kernels often need to know whether a dependency is present and recent
//! enough before picking a code path. Packages are resolved by name through a
//! [`PackageResolver`]; the default resolver is a process-wide
//! [`PackageRegistry`] that knows about this crate and anything registered
//! with [`register_package`].
//!
//! Names are compared the way crate names are: case-insensitively and with
//! `-` and `_` treated as the same character.
//!
//! # Example
//!
//! ```rust
//! use briny_kernel::package::{compare_version, register_package};
//! use briny_kernel::version::Version;
//!
//! register_package("flash-attn", "2.6.3");
//! assert!(compare_version("flash_attn", Version::ge, "2.5").unwrap());
//! assert!(!compare_version("not_installed", Version::ge, "1.0").unwrap());
//! ```

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::debug;
use parking_lot::RwLock;
use thiserror::Error;

use crate::version::{Version, VersionError};

/// A package that could not be resolved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("no package named `{0}`")]
    NotFound(String),
}

/// Looks up the version string advertised by a package.
pub trait PackageResolver {
    /// Returns the raw version string of `package`.
    ///
    /// # Errors
    /// Returns [`ImportError`] if the package is unknown.
    fn resolve(&self, package: &str) -> Result<String, ImportError>;
}

impl<R: PackageResolver + ?Sized> PackageResolver for &R {
    fn resolve(&self, package: &str) -> Result<String, ImportError> {
        (**self).resolve(package)
    }
}

fn normalize(name: &str) -> String {
    name.trim().replace('-', "_").to_ascii_lowercase()
}

/// A name → version table of known packages.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    packages: HashMap<String, String>,
}

impl PackageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that already knows this crate.
    pub fn seeded() -> Self {
        let mut registry = Self::new();
        registry.register(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        registry
    }

    /// Records `version` for `name`, returning the version it replaces.
    pub fn register(&mut self, name: &str, version: impl Into<String>) -> Option<String> {
        self.packages.insert(normalize(name), version.into())
    }

    /// Forgets `name`, returning the version it had.
    pub fn unregister(&mut self, name: &str) -> Option<String> {
        self.packages.remove(&normalize(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PackageResolver for PackageRegistry {
    fn resolve(&self, package: &str) -> Result<String, ImportError> {
        self.packages
            .get(&normalize(package))
            .cloned()
            .ok_or_else(|| ImportError::NotFound(package.to_owned()))
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: RwLock<PackageRegistry> = RwLock::new(PackageRegistry::seeded());
}

/// Resolver backed by the process-wide registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalRegistry;

impl PackageResolver for GlobalRegistry {
    fn resolve(&self, package: &str) -> Result<String, ImportError> {
        GLOBAL_REGISTRY.read().resolve(package)
    }
}

/// Registers a package in the process-wide registry.
pub fn register_package(name: &str, version: impl Into<String>) -> Option<String> {
    GLOBAL_REGISTRY.write().register(name, version)
}

/// Removes a package from the process-wide registry.
pub fn unregister_package(name: &str) -> Option<String> {
    GLOBAL_REGISTRY.write().unregister(name)
}

/// Compares the installed version of `package` with `target` using `op`.
///
/// `op` receives the installed version first, e.g. `Version::ge` asks
/// "is the installed version at least `target`?". A package that cannot be
/// resolved yields `Ok(false)`; nothing is cached between calls.
///
/// # Errors
/// Returns [`VersionError`] if the installed or target version is malformed.
pub fn compare_version_with<R, P>(
    resolver: &R,
    package: &str,
    op: P,
    target: &str,
) -> Result<bool, VersionError>
where
    R: PackageResolver + ?Sized,
    P: FnOnce(&Version, &Version) -> bool,
{
    let installed = match resolver.resolve(package) {
        Ok(v) => v,
        Err(err) => {
            debug!("version check skipped: {err}");
            return Ok(false);
        }
    };
    let installed = Version::parse(&installed)?;
    let target = Version::parse(target)?;
    Ok(op(&installed, &target))
}

/// [`compare_version_with`] against the process-wide registry.
///
/// # Errors
/// Returns [`VersionError`] if the installed or target version is malformed.
pub fn compare_version<P>(package: &str, op: P, target: &str) -> Result<bool, VersionError>
where
    P: FnOnce(&Version, &Version) -> bool,
{
    compare_version_with(&GlobalRegistry, package, op, target)
}
