//! Derivation paths with optional component labels.
//!
//! Paths look like `m/schema:1'/recovery:1'/invoices:4/1234/5678`. A label is purely cosmetic: two
//! paths are equal when their indices and hardening match, whatever their labels say.
use bitcoin::bip32::ChildNumber;
use core::{fmt, str::FromStr};

use crate::DerivationError;

/// Every invoice key lives below this path.
pub const INVOICES_BASE_PATH: &str = "m/schema:1'/recovery:1'/invoices:4";

#[derive(Clone, Debug, Eq)]
pub struct PathSegment {
    name: Option<String>,
    index: u32,
    hardened: bool,
}

impl PathSegment {
    pub fn normal(index: u32) -> Self {
        Self {
            name: None,
            index,
            hardened: false,
        }
    }

    pub fn hardened(index: u32) -> Self {
        Self {
            name: None,
            index,
            hardened: true,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }

    pub fn child_number(&self) -> Result<ChildNumber, DerivationError> {
        let child_number = if self.hardened {
            ChildNumber::from_hardened_idx(self.index)
        } else {
            ChildNumber::from_normal_idx(self.index)
        };
        child_number.map_err(|_| DerivationError::IndexOutOfRange { index: self.index })
    }
}

impl PartialEq for PathSegment {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.hardened == other.hardened
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}:", name)?;
        }
        write!(f, "{}", self.index)?;
        if self.hardened {
            write!(f, "'")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<PathSegment>,
}

impl KeyPath {
    /// The empty path `m`.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn invoices_base() -> Self {
        INVOICES_BASE_PATH
            .parse()
            .expect("invoices base path is well formed")
    }

    pub fn child(&self, index: u32) -> Self {
        self.push(PathSegment::normal(index))
    }

    pub fn hardened_child(&self, index: u32) -> Self {
        self.push(PathSegment::hardened(index))
    }

    fn push(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segments that remain after `prefix`, or `None` if `prefix` is not an ancestor of (or
    /// equal to) `self`.
    pub fn strip_prefix(&self, prefix: &KeyPath) -> Option<&[PathSegment]> {
        if prefix.len() > self.len() {
            return None;
        }
        let (head, tail) = self.segments.split_at(prefix.len());
        (head == prefix.segments()).then_some(tail)
    }

    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.strip_prefix(prefix).is_some()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for KeyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        match parts.next() {
            Some("m") | Some("M") => {}
            _ => return Err(PathError::MissingRoot),
        }

        let segments = parts
            .enumerate()
            .map(|(position, part)| {
                parse_segment(part).ok_or_else(|| PathError::InvalidSegment {
                    position,
                    segment: part.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }
}

fn parse_segment(part: &str) -> Option<PathSegment> {
    let (name, rest) = match part.split_once(':') {
        Some((name, rest)) if !name.is_empty() => (Some(name.to_string()), rest),
        Some(_) => return None,
        None => (None, part),
    };
    let (digits, hardened) = match rest.strip_suffix(['\'', 'h']) {
        Some(digits) => (digits, true),
        None => (rest, false),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse::<u32>().ok()?;
    if index >= 1 << 31 {
        return None;
    }
    Some(PathSegment {
        name,
        index,
        hardened,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathError {
    /// The path didn't start with `m`
    MissingRoot,
    /// A component was not of the form `[name:]index[']`
    InvalidSegment { position: usize, segment: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::MissingRoot => write!(f, "derivation path must start with 'm'"),
            PathError::InvalidSegment { position, segment } => write!(
                f,
                "invalid derivation path component {:?} at position {}",
                segment, position
            ),
        }
    }
}

impl std::error::Error for PathError {}
