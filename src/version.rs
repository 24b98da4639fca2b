//! Package version numbers.
//!
//! # Version Grammar
//!
//! Versions follow the usual Python packaging scheme, which is a superset of
//! the `MAJOR.MINOR.PATCH[-PRE]` form most packages use:
//!
//! ```text
//! [v][EPOCH!]N(.N)*[{a|b|rc}N][.postN][.devN][+LOCAL]
//! ```
//!
//! - Matching is case-insensitive and ignores surrounding whitespace.
//! - `alpha`, `beta`, `c`, `pre` and `preview` are accepted as pre-release tags.
//! - `.`, `-` or `_` may separate the tags; a missing tag number means `0`.
//! - `1.0-1` is shorthand for `1.0.post1`.
//! - Epoch, release and tag numbers must fit in a `u64`; longer digit runs
//!   are rejected with [`VersionError`]. An all-digit local segment too wide
//!   for a `u64` is kept as a text label.
//!
//! # Ordering
//!
//! Epoch first, then the release numbers with trailing zeros ignored
//! (`1.0 == 1.0.0`), then `dev < pre-release < final < post-release`, then the
//! local label (a version without one sorts first).

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, digit1, one_of};
use nom::combinator::{all_consuming, map, map_res, opt, value};
use nom::multi::separated_list1;
use nom::sequence::{preceded, terminated};
use nom::{IResult, Parser};
use thiserror::Error;

/// A version string that does not follow the version grammar.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid version: `{0}`")]
pub struct VersionError(pub String);

/// Pre-release phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
    Alpha,
    Beta,
    Rc,
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::Rc => "rc",
        })
    }
}

/// One dot-separated piece of a local version label.
///
/// Alphanumeric pieces sort before numeric ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocalSegment {
    Alpha(String),
    Numeric(u64),
}

impl fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alpha(s) => f.write_str(s),
            Self::Numeric(n) => write!(f, "{n}"),
        }
    }
}

/// A parsed, comparable version.
///
/// # Example
/// ```
/// use briny_kernel::version::Version;
///
/// let v: Version = "2.6.0rc1".parse().unwrap();
/// assert!(v.is_prerelease());
/// assert!(v < Version::parse("2.6").unwrap());
/// assert_eq!(Version::parse("1.0").unwrap(), Version::parse("1.0.0").unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreRelease, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Vec<LocalSegment>,
}

/// Sorts below or above every value of `T`.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Bounded<T> {
    Min,
    Value(T),
    Max,
}

type SortKey<'a> = (
    u64,
    &'a [u64],
    Bounded<(PreRelease, u64)>,
    Bounded<u64>,
    Bounded<u64>,
    Bounded<&'a [LocalSegment]>,
);

impl Version {
    /// Parses a version string.
    ///
    /// # Errors
    /// Returns [`VersionError`] carrying the input if it is not a valid version.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let normalized = input.trim().to_ascii_lowercase();
        all_consuming(version)
            .parse(normalized.as_str())
            .map(|(_, v)| v)
            .map_err(|_| VersionError(input.to_owned()))
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Release numbers as written, e.g. `[1, 2, 0]` for `1.2.0`.
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn major(&self) -> u64 {
        self.release_part(0)
    }

    pub fn minor(&self) -> u64 {
        self.release_part(1)
    }

    pub fn micro(&self) -> u64 {
        self.release_part(2)
    }

    pub fn pre(&self) -> Option<(PreRelease, u64)> {
        self.pre
    }

    pub fn post(&self) -> Option<u64> {
        self.post
    }

    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    pub fn local(&self) -> &[LocalSegment] {
        &self.local
    }

    /// Pre-releases and dev releases both count.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    pub fn is_devrelease(&self) -> bool {
        self.dev.is_some()
    }

    /// The version without pre/post/dev/local parts.
    pub fn base_version(&self) -> Self {
        Self {
            epoch: self.epoch,
            release: self.release.clone(),
            pre: None,
            post: None,
            dev: None,
            local: Vec::new(),
        }
    }

    fn release_part(&self, idx: usize) -> u64 {
        self.release.get(idx).copied().unwrap_or(0)
    }

    fn sort_key(&self) -> SortKey<'_> {
        let significant = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map_or(0, |i| i + 1);

        let pre = match (self.pre, self.post, self.dev) {
            // a bare dev release precedes every pre-release of the same version
            (None, None, Some(_)) => Bounded::Min,
            (None, _, _) => Bounded::Max,
            (Some(pre), _, _) => Bounded::Value(pre),
        };
        let post = self.post.map_or(Bounded::Min, Bounded::Value);
        let dev = self.dev.map_or(Bounded::Max, Bounded::Value);
        let local = if self.local.is_empty() {
            Bounded::Min
        } else {
            Bounded::Value(self.local.as_slice())
        };

        (
            self.epoch,
            &self.release[..significant],
            pre,
            post,
            dev,
            local,
        )
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        for (i, n) in self.release.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{n}")?;
        }
        if let Some((phase, n)) = self.pre {
            write!(f, "{phase}{n}")?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{n}")?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{n}")?;
        }
        for (i, seg) in self.local.iter().enumerate() {
            f.write_str(if i == 0 { "+" } else { "." })?;
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

fn number(input: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse::<u64>).parse(input)
}

fn separator(input: &str) -> IResult<&str, Option<char>> {
    opt(one_of("-_.")).parse(input)
}

/// Number after a pre/post/dev tag; an omitted number means `0`.
fn tag_number(input: &str) -> IResult<&str, u64> {
    map(opt(preceded(separator, number)), |n| n.unwrap_or(0)).parse(input)
}

fn epoch(input: &str) -> IResult<&str, u64> {
    terminated(number, char('!')).parse(input)
}

fn release(input: &str) -> IResult<&str, Vec<u64>> {
    separated_list1(char('.'), number).parse(input)
}

fn pre_phase(input: &str) -> IResult<&str, PreRelease> {
    alt((
        value(PreRelease::Alpha, alt((tag("alpha"), tag("a")))),
        value(PreRelease::Beta, alt((tag("beta"), tag("b")))),
        value(
            PreRelease::Rc,
            alt((tag("rc"), tag("preview"), tag("pre"), tag("c"))),
        ),
    ))
    .parse(input)
}

fn pre_release(input: &str) -> IResult<&str, (PreRelease, u64)> {
    (preceded(separator, pre_phase), tag_number).parse(input)
}

fn post_release(input: &str) -> IResult<&str, u64> {
    alt((
        preceded(
            (separator, alt((tag("post"), tag("rev"), tag("r")))),
            tag_number,
        ),
        preceded(char('-'), number),
    ))
    .parse(input)
}

fn dev_release(input: &str) -> IResult<&str, u64> {
    preceded((separator, tag("dev")), tag_number).parse(input)
}

fn local_segment(s: &str) -> LocalSegment {
    s.parse::<u64>()
        .map_or_else(|_| LocalSegment::Alpha(s.to_owned()), LocalSegment::Numeric)
}

fn local(input: &str) -> IResult<&str, Vec<LocalSegment>> {
    preceded(
        char('+'),
        separated_list1(
            one_of("-_."),
            map(take_while1(|c: char| c.is_ascii_alphanumeric()), local_segment),
        ),
    )
    .parse(input)
}

fn version(input: &str) -> IResult<&str, Version> {
    map(
        (
            opt(char('v')),
            opt(epoch),
            release,
            opt(pre_release),
            opt(post_release),
            opt(dev_release),
            opt(local),
        ),
        |(_, epoch, release, pre, post, dev, local)| Version {
            epoch: epoch.unwrap_or(0),
            release,
            pre,
            post,
            dev,
            local: local.unwrap_or_default(),
        },
    )
    .parse(input)
}
