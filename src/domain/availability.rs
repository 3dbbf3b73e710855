//! Availability state machine
//!
//! Per identity the last notified state lives in two persisted sets:
//! the seen set holds `{identity}_status_{available|unavailable}` markers of
//! states already announced, the out-of-stock set holds identities whose last
//! observation was "unavailable". [`update_status`] is the only mutator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::constants::markers::{AVAILABLE, STATUS_SEPARATOR, UNAVAILABLE};
use crate::domain::identity::ProductIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    Unavailable,
}

impl StockStatus {
    pub fn from_available(is_available: bool) -> Self {
        if is_available { Self::Available } else { Self::Unavailable }
    }

    pub fn is_available(self) -> bool {
        self == Self::Available
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Available => Self::Unavailable,
            Self::Unavailable => Self::Available,
        }
    }

    fn wire_suffix(self) -> &'static str {
        match self {
            Self::Available => AVAILABLE,
            Self::Unavailable => UNAVAILABLE,
        }
    }
}

/// "Already notified about `identity` being in `status`"
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusMarker {
    pub identity: ProductIdentity,
    pub status: StockStatus,
}

impl StatusMarker {
    pub fn new(identity: ProductIdentity, status: StockStatus) -> Self {
        Self { identity, status }
    }

    /// Persisted line form, `{identity}_status_{available|unavailable}`
    pub fn to_wire(&self) -> String {
        format!("{}{STATUS_SEPARATOR}{}", self.identity, self.status.wire_suffix())
    }

    /// Parse a persisted line; `None` for lines that are not status markers.
    pub fn parse(line: &str) -> Option<Self> {
        let (identity, suffix) = line.trim().rsplit_once(STATUS_SEPARATOR)?;
        if identity.is_empty() {
            return None;
        }
        let status = match suffix {
            AVAILABLE => StockStatus::Available,
            UNAVAILABLE => StockStatus::Unavailable,
            _ => return None,
        };
        Some(Self::new(ProductIdentity::from_raw(identity), status))
    }
}

impl fmt::Display for StatusMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Markers of already announced states
///
/// Lines that do not parse as markers are kept verbatim so that saving never
/// loses entries written by other tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    markers: BTreeSet<StatusMarker>,
    unparsed: BTreeSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            match StatusMarker::parse(line) {
                Some(marker) => {
                    set.markers.insert(marker);
                }
                None => {
                    set.unparsed.insert(line.to_string());
                }
            }
        }
        set
    }

    /// Sorted persisted lines
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .markers
            .iter()
            .map(StatusMarker::to_wire)
            .chain(self.unparsed.iter().cloned())
            .collect();
        lines.sort();
        lines
    }

    pub fn contains(&self, identity: &ProductIdentity, status: StockStatus) -> bool {
        self.markers.contains(&StatusMarker::new(identity.clone(), status))
    }

    pub fn insert(&mut self, identity: &ProductIdentity, status: StockStatus) -> bool {
        self.markers.insert(StatusMarker::new(identity.clone(), status))
    }

    pub fn remove(&mut self, identity: &ProductIdentity, status: StockStatus) -> bool {
        self.markers.remove(&StatusMarker::new(identity.clone(), status))
    }

    pub fn markers(&self) -> impl Iterator<Item = &StatusMarker> {
        self.markers.iter()
    }

    pub fn len(&self) -> usize {
        self.markers.len() + self.unparsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record `status` as the announced state, dropping the opposite marker
    fn record(&mut self, identity: &ProductIdentity, status: StockStatus) {
        self.remove(identity, status.opposite());
        self.insert(identity, status);
    }
}

/// Identities whose last observation was "unavailable"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutOfStockSet(BTreeSet<ProductIdentity>);

impl OutOfStockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            lines
                .into_iter()
                .map(|line| line.as_ref().trim().to_string())
                .filter(|line| !line.is_empty())
                .map(ProductIdentity::from_raw)
                .collect(),
        )
    }

    pub fn to_lines(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn contains(&self, identity: &ProductIdentity) -> bool {
        self.0.contains(identity)
    }

    pub fn insert(&mut self, identity: ProductIdentity) -> bool {
        self.0.insert(identity)
    }

    pub fn remove(&mut self, identity: &ProductIdentity) -> bool {
        self.0.remove(identity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductIdentity> {
        self.0.iter()
    }
}

/// Decision for one observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    pub should_notify: bool,
    pub is_back_in_stock: bool,
}

impl StatusUpdate {
    const SILENT: Self = Self {
        should_notify: false,
        is_back_in_stock: false,
    };
}

/// Apply one availability observation and decide whether to notify.
///
/// A second call with the same `is_available` never notifies. The
/// out-of-stock to available edge always notifies, whatever the seen set
/// says about the available marker.
///
/// Recording a status drops the opposite marker, so the seen set holds at
/// most one marker per identity and always agrees with the out-of-stock set.
pub fn update_status(
    identity: &ProductIdentity,
    is_available: bool,
    seen: &mut SeenSet,
    out_of_stock: &mut OutOfStockSet,
) -> StatusUpdate {
    if is_available {
        if out_of_stock.remove(identity) {
            seen.record(identity, StockStatus::Available);
            return StatusUpdate {
                should_notify: true,
                is_back_in_stock: true,
            };
        }
        if seen.contains(identity, StockStatus::Available) {
            return StatusUpdate::SILENT;
        }
        seen.record(identity, StockStatus::Available);
        return StatusUpdate {
            should_notify: true,
            is_back_in_stock: false,
        };
    }

    if seen.contains(identity, StockStatus::Unavailable) {
        return StatusUpdate::SILENT;
    }
    if out_of_stock.contains(identity) {
        // Out of stock already known, only the marker was missing.
        seen.record(identity, StockStatus::Unavailable);
        return StatusUpdate::SILENT;
    }
    out_of_stock.insert(identity.clone());
    seen.record(identity, StockStatus::Unavailable);
    StatusUpdate {
        should_notify: true,
        is_back_in_stock: false,
    }
}

/// Both persisted sets, owned by the scan loop and threaded through each cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockLedger {
    pub seen: SeenSet,
    pub out_of_stock: OutOfStockSet,
}

impl StockLedger {
    pub fn new(seen: SeenSet, out_of_stock: OutOfStockSet) -> Self {
        Self { seen, out_of_stock }
    }

    pub fn observe(&mut self, identity: &ProductIdentity, is_available: bool) -> StatusUpdate {
        update_status(identity, is_available, &mut self.seen, &mut self.out_of_stock)
    }

    /// Last announced state of `identity`, if any
    pub fn status_of(&self, identity: &ProductIdentity) -> Option<StockStatus> {
        if self.out_of_stock.contains(identity) {
            Some(StockStatus::Unavailable)
        } else if self.seen.contains(identity, StockStatus::Available) {
            Some(StockStatus::Available)
        } else if self.seen.contains(identity, StockStatus::Unavailable) {
            Some(StockStatus::Unavailable)
        } else {
            None
        }
    }
}

/// Short human-readable status used in notifications
pub fn status_text(is_available: bool, is_back_in_stock: bool) -> &'static str {
    match (is_available, is_back_in_stock) {
        (true, true) => "🎉 Back in stock!",
        (true, false) => "✅ Available",
        (false, _) => "❌ Sold out",
    }
}
