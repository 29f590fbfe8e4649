//! Free-space ledger for one client run.
//!
//! The ledger starts from a single real measurement and is then advanced by
//! the declared size of every torrent whose removal the backend confirmed.
//! Remove predicates read it through a [`FreeSpaceView`], so a removal early in
//! a run is visible to the predicates of every later torrent.
//!
//! The ledger is owned by exactly one coordinator and is deliberately not
//! synchronized.

/// Bytes per GiB, the unit exposed to rules as `freeSpaceGB`.
pub const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Running free-space estimate for one client run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FreeSpaceLedger {
    free_gb: f64,
    set: bool,
}

impl FreeSpaceLedger {
    /// Creates a ledger that has not been measured; rules see `freeSpaceSet == false`.
    #[must_use]
    pub fn unset() -> Self {
        Self::default()
    }

    /// Creates a ledger seeded from a measurement in bytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_bytes(free_bytes: u64) -> Self {
        Self {
            free_gb: free_bytes as f64 / BYTES_PER_GIB,
            set: true,
        }
    }

    /// Current estimate in GiB.
    #[must_use]
    pub fn current_free_gb(&self) -> f64 {
        self.free_gb
    }

    /// Whether the ledger was seeded from a real measurement.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.set
    }

    /// Credits the space freed by a confirmed removal.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_removal(&mut self, bytes_freed: u64) {
        self.free_gb += bytes_freed as f64 / BYTES_PER_GIB;
    }

    /// Borrows a read-only view for predicate evaluation.
    #[must_use]
    pub fn view(&self) -> FreeSpaceView<'_> {
        FreeSpaceView { ledger: self }
    }
}

/// Read-only capability over a [`FreeSpaceLedger`], handed to the decision engine.
#[derive(Debug, Clone, Copy)]
pub struct FreeSpaceView<'a> {
    ledger: &'a FreeSpaceLedger,
}

impl FreeSpaceView<'_> {
    #[must_use]
    pub fn free_gb(&self) -> f64 {
        self.ledger.current_free_gb()
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.ledger.is_set()
    }
}
