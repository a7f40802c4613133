//! StateCell primitive
//!
//! A single transactional value: coordination records, flags, counters.
//!
//! ## Purity Requirement
//!
//! Code running under `Stm::atomically` may run several times because of
//! conflicts and retries. Closures passed to [`StateCell::update`] there
//! should be pure functions of the current value:
//! - No I/O
//! - No mutation of anything outside the transaction
//! - No irreversible effects

use mvstm_concurrency::{Persistent, Tracked, Transaction};
use mvstm_core::{Handle, StmResult};
use std::fmt;

struct CellValue<T>(T);

impl<T> Persistent for CellValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Stored = T;

    fn dehydrate(&self) -> T {
        self.0.clone()
    }

    fn hydrate(stored: &T) -> Self {
        CellValue(stored.clone())
    }
}

/// Transactional cell holding one value
pub struct StateCell<T> {
    cell: Tracked<CellValue<T>>,
}

impl<T> StateCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cell; it is stored once attached
    pub fn new(value: T) -> Self {
        Self {
            cell: Tracked::new(CellValue(value)),
        }
    }

    /// Open the cell stored under `handle`
    pub fn open(txn: &mut Transaction, handle: Handle) -> StmResult<Self> {
        Ok(Self {
            cell: txn.load(handle)?,
        })
    }

    /// Attach the cell to `txn`; returns its handle
    pub fn attach(&self, txn: &mut Transaction) -> StmResult<Handle> {
        txn.attach_as_root(&self.cell)
    }

    /// Handle, or [`Handle::NULL`] if never attached
    pub fn handle(&self) -> Handle {
        self.cell.handle()
    }

    /// Current value
    pub fn get(&self) -> T {
        self.cell.get().0.clone()
    }

    /// Replace the value
    pub fn set(&self, value: T) {
        self.cell.set(CellValue(value));
    }

    /// Modify the value in place
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.cell.update(|cell| f(&mut cell.0))
    }
}

impl<T> fmt::Debug for StateCell<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("handle", &self.cell.handle())
            .field("value", &self.cell.get().0)
            .finish()
    }
}
