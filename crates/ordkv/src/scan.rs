//! Scan requests and initial cursor positioning.
//!
//! A scan is described by a [`ScanRequest`]: an optional key prefix, an
//! optional inclusive start key, and a [`Direction`]. [`position`] moves a
//! fresh cursor onto the first entry the scan should visit.
//!
//! # Positioning
//!
//! | prefix | start | direction | initial position |
//! |--------|-------|-----------|------------------|
//! | none   | none  | forward   | first entry |
//! | none   | none  | backward  | last entry |
//! | none   | `s`   | either    | first key `>= s` |
//! | `p`    | any   | forward   | first key `>= e` |
//! | `p`    | any   | backward  | last key `< upper_bound(e)` |
//!
//! Here `e` is the effective start: the start key when it begins with the
//! prefix, otherwise the prefix itself. A start key outside the prefix is
//! ignored.
//!
//! The store only seeks forward, so a backward prefix scan seeks to
//! [`prefix_upper_bound`] and steps back once. When no upper bound exists, or
//! it lies past every stored key, the scan starts from the last entry.

use ordkv_store::{KvTraverse, OwnedKeyValue, RawKeyValue, StoreReadError};

/// Scan direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Ascending key order.
    #[default]
    Forward,
    /// Descending key order.
    Backward,
}

impl Direction {
    /// True for [`Direction::Backward`].
    pub const fn is_backward(self) -> bool {
        matches!(self, Self::Backward)
    }
}

/// Parameters of a single enumeration.
///
/// Empty strings are treated as absent, for both the prefix and the start
/// key.
///
/// ```
/// use ordkv::{Direction, ScanRequest};
///
/// let scan = ScanRequest::new().with_prefix("user:").backward();
/// assert_eq!(scan.prefix(), Some("user:"));
/// assert_eq!(scan.direction(), Direction::Backward);
///
/// assert_eq!(ScanRequest::new().with_prefix("").prefix(), None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanRequest<'a> {
    prefix: Option<&'a str>,
    start: Option<&'a str>,
    direction: Direction,
}

impl<'a> ScanRequest<'a> {
    /// A forward scan over the whole store.
    pub const fn new() -> Self {
        Self { prefix: None, start: None, direction: Direction::Forward }
    }

    /// Restrict the scan to keys beginning with `prefix`.
    pub const fn with_prefix(mut self, prefix: &'a str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Begin the scan at `start`, inclusive.
    pub const fn with_start(mut self, start: &'a str) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the scan direction.
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Scan in descending key order.
    pub const fn backward(self) -> Self {
        self.with_direction(Direction::Backward)
    }

    /// The prefix, if set and non-empty.
    pub fn prefix(&self) -> Option<&'a str> {
        self.prefix.filter(|p| !p.is_empty())
    }

    /// The start key, if set and non-empty.
    pub fn start(&self) -> Option<&'a str> {
        self.start.filter(|s| !s.is_empty())
    }

    /// The scan direction.
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// The key the scan is anchored on: the start key if it extends the
    /// prefix, otherwise the prefix. `None` when there is no prefix.
    pub fn effective_start(&self) -> Option<&'a str> {
        let prefix = self.prefix()?;
        match self.start() {
            Some(start) if start.starts_with(prefix) => Some(start),
            _ => Some(prefix),
        }
    }

    /// Copy the request into an owned form that can cross threads.
    pub fn to_owned_request(&self) -> OwnedScanRequest {
        OwnedScanRequest {
            prefix: self.prefix().map(str::to_owned),
            start: self.start().map(str::to_owned),
            direction: self.direction,
        }
    }
}

/// Owned counterpart of [`ScanRequest`], sent to the accessor task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedScanRequest {
    prefix: Option<String>,
    start: Option<String>,
    direction: Direction,
}

impl OwnedScanRequest {
    /// Borrow as a [`ScanRequest`].
    pub fn as_request(&self) -> ScanRequest<'_> {
        let mut request = ScanRequest::new().with_direction(self.direction);
        if let Some(prefix) = &self.prefix {
            request = request.with_prefix(prefix);
        }
        if let Some(start) = &self.start {
            request = request.with_start(start);
        }
        request
    }
}

impl From<ScanRequest<'_>> for OwnedScanRequest {
    fn from(request: ScanRequest<'_>) -> Self {
        request.to_owned_request()
    }
}

/// The smallest key that sorts after every key beginning with `key`.
///
/// Increments the rightmost byte below `0xff` and drops everything after it.
/// Returns `None` when every byte is `0xff` (or `key` is empty), since no
/// finite key sorts after all of their extensions.
///
/// ```
/// use ordkv::scan::prefix_upper_bound;
///
/// assert_eq!(prefix_upper_bound(b"test"), Some(b"tesu".to_vec()));
/// assert_eq!(prefix_upper_bound(b"a\xff\xff"), Some(b"b".to_vec()));
/// assert_eq!(prefix_upper_bound(b"\xff"), None);
/// ```
pub fn prefix_upper_bound(key: &[u8]) -> Option<Vec<u8>> {
    let idx = key.iter().rposition(|&b| b < u8::MAX)?;
    let mut bound = key[..=idx].to_vec();
    bound[idx] += 1;
    Some(bound)
}

pub(crate) fn owned(entry: Option<RawKeyValue<'_>>) -> Option<OwnedKeyValue> {
    entry.map(|(k, v)| (k.into_owned(), v.into_owned()))
}

/// Move `cursor` to the first entry `request` should visit, and return it.
///
/// Returns `Ok(None)` when the scan has nothing to visit. The returned entry
/// may lie outside the prefix. Callers check containment as they step.
pub fn position<C, E>(cursor: &mut C, request: &ScanRequest<'_>) -> Result<Option<OwnedKeyValue>, E>
where
    C: KvTraverse<E>,
    E: StoreReadError,
{
    let Some(effective) = request.effective_start() else {
        let found = match (request.start(), request.direction()) {
            (Some(start), _) => owned(cursor.lower_bound(start.as_bytes())?),
            (None, Direction::Forward) => owned(cursor.first()?),
            (None, Direction::Backward) => owned(cursor.last()?),
        };
        return Ok(found);
    };

    if !request.direction().is_backward() {
        return Ok(owned(cursor.lower_bound(effective.as_bytes())?));
    }

    let mut found = match prefix_upper_bound(effective.as_bytes()) {
        None => owned(cursor.last()?),
        Some(bound) => match owned(cursor.lower_bound(&bound)?) {
            Some(_) => owned(cursor.read_prev()?),
            None => owned(cursor.last()?),
        },
    };

    // A landing above the prefix run steps back once more.
    let prefix = request.prefix().unwrap_or_default().as_bytes();
    if let Some((key, _)) = &found
        && !key.starts_with(prefix)
        && key.as_slice() > prefix
    {
        found = owned(cursor.read_prev()?);
    }
    Ok(found)
}
