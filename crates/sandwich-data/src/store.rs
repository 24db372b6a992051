//! SQLite storage for scanned slots and extracted swap events.
//!
//! Uses WAL mode and prepared statements inside a transaction for batch
//! inserts. Slots are recorded once they have been fetched so that reruns
//! over an overlapping range only hit the RPC for the missing slots.

use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::cell::RefCell;

use crate::types::{SlotSwaps, SwapEvent};

pub struct Store {
    conn: RefCell<Connection>,
}

impl Store {
    /// Creates or opens a SQLite database with WAL mode enabled.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrations fail.
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .wrap_err_with(|| format!("failed to open SQLite database at {path}"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: RefCell::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.borrow_mut().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scanned_slots (
                slot INTEGER PRIMARY KEY,
                swap_count INTEGER,
                rpc_error TEXT,
                extractor TEXT,
                scanned_at TEXT
            );

            CREATE TABLE IF NOT EXISTS swap_events (
                slot INTEGER,
                tx_order INTEGER,
                signature TEXT,
                signer TEXT,
                program_id TEXT,
                from_mint TEXT,
                to_mint TEXT,
                from_amount REAL,
                to_amount REAL,
                PRIMARY KEY (slot, signature)
            );

            CREATE INDEX IF NOT EXISTS idx_swap_events_signer ON swap_events (signer);
            ",
        )?;
        Ok(())
    }

    /// Records a fetched slot together with the swaps extracted from it.
    ///
    /// `extractor` identifies the extraction settings that produced `swaps`.
    /// Re-recording a slot replaces its previous swaps and extractor.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn record_slot(
        &self,
        slot: u64,
        swaps: &[SwapEvent],
        rpc_error: Option<&str>,
        extractor: &str,
    ) -> Result<usize> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM swap_events WHERE slot = ?",
            rusqlite::params![slot],
        )?;
        tx.execute(
            "
            INSERT OR REPLACE INTO scanned_slots (slot, swap_count, rpc_error, extractor, scanned_at)
            VALUES (?, ?, ?, ?, ?)
            ",
            rusqlite::params![
                slot,
                swaps.len() as u64,
                rpc_error,
                extractor,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR REPLACE INTO swap_events (
                    slot, tx_order, signature, signer, program_id,
                    from_mint, to_mint, from_amount, to_amount
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;

            for (order, swap) in swaps.iter().enumerate() {
                stmt.execute(rusqlite::params![
                    slot,
                    order as u64,
                    swap.signature,
                    swap.signer,
                    swap.program_id,
                    swap.from_mint,
                    swap.to_mint,
                    swap.from_amount,
                    swap.to_amount,
                ])?;
            }
        }

        let count = swaps.len();
        tx.commit()?;
        Ok(count)
    }

    /// Returns whether the slot has already been fetched and extracted with
    /// the given extractor. A slot stored under other settings is not scanned.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn is_slot_scanned(&self, slot: u64, extractor: &str) -> Result<bool> {
        let conn = self.conn.borrow();
        let found: Option<u64> = conn
            .query_row(
                "SELECT slot FROM scanned_slots WHERE slot = ? AND extractor = ?",
                rusqlite::params![slot, extractor],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Loads all stored swaps in `[start, end]`, ordered by slot then
    /// transaction order within the slot.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn get_swaps_in_range(&self, start: u64, end: u64) -> Result<Vec<SwapEvent>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "
            SELECT slot, signature, signer, program_id, from_mint, to_mint,
                   from_amount, to_amount
            FROM swap_events
            WHERE slot BETWEEN ? AND ?
            ORDER BY slot ASC, tx_order ASC
            ",
        )?;

        let swaps = stmt
            .query_map(rusqlite::params![start, end], |row| {
                Ok(SwapEvent {
                    slot: row.get(0)?,
                    signature: row.get(1)?,
                    signer: row.get(2)?,
                    program_id: row.get(3)?,
                    from_mint: row.get(4)?,
                    to_mint: row.get(5)?,
                    from_amount: row.get(6)?,
                    to_amount: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .wrap_err("failed to read swap_events rows")?;

        Ok(swaps)
    }

    /// Loads swaps in `[start, end]` grouped by slot. Scanned slots without
    /// swaps are included with an empty list.
    ///
    /// # Errors
    /// Returns error if either query fails.
    pub fn get_slot_swaps_in_range(&self, start: u64, end: u64) -> Result<Vec<SlotSwaps>> {
        let slots: Vec<u64> = {
            let conn = self.conn.borrow();
            let mut stmt = conn.prepare(
                "SELECT slot FROM scanned_slots WHERE slot BETWEEN ? AND ? ORDER BY slot ASC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![start, end], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut grouped: Vec<SlotSwaps> = slots
            .into_iter()
            .map(|slot| SlotSwaps {
                slot,
                swaps: Vec::new(),
            })
            .collect();

        for swap in self.get_swaps_in_range(start, end)? {
            match grouped.binary_search_by_key(&swap.slot, |group| group.slot) {
                Ok(ix) => grouped[ix].swaps.push(swap),
                Err(ix) => grouped.insert(
                    ix,
                    SlotSwaps {
                        slot: swap.slot,
                        swaps: vec![swap],
                    },
                ),
            }
        }

        Ok(grouped)
    }

    /// Returns `(min_slot, max_slot, scanned_count)` over all scanned slots.
    ///
    /// Slots are `None` when nothing has been scanned yet.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn get_slot_range(&self) -> Result<(Option<u64>, Option<u64>, u64)> {
        let conn = self.conn.borrow();
        let range = conn.query_row(
            "SELECT MIN(slot), MAX(slot), COUNT(*) FROM scanned_slots",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(range)
    }

    /// Total number of stored swap events.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn count_swaps(&self) -> Result<u64> {
        let conn = self.conn.borrow();
        let count = conn.query_row("SELECT COUNT(*) FROM swap_events", [], |row| row.get(0))?;
        Ok(count)
    }
}
