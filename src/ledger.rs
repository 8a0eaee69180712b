//! Append-only points ledger.
//!
//! The ledger is the source of truth for every point-affecting event; the
//! denormalized balance on a mason account is only a cached mirror of the
//! per-mason sum. Entries are never updated or removed; corrections are
//! appended as opposite-signed `Adjustment` entries.
//!
//! Entries that originate from a specific record carry a source reference,
//! and at most one entry may exist per distinct source. This makes
//! double-crediting the same lift or KYC submission structurally
//! impossible, independent of caller bugs.

use std::collections::HashSet;

use jiff::Timestamp;
use thiserror::Error;

use crate::Points;
use crate::model::MasonId;

/// Ledger entry identifier, assigned sequentially on append.
pub type EntryId = u64;

/// Kind of event an entry originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntrySource {
    /// Base credit for an approved bag lift.
    BagLift,
    /// Debit taken when a redemption is placed.
    Redemption,
    /// Milestone credit paid to a referring mason.
    ReferralBonus,
    /// One-time credit on first KYC verification.
    JoiningBonus,
    /// Manual or compensating correction; carries no source id.
    Adjustment,
}

/// One immutable signed point-delta record.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub mason: MasonId,
    pub source: EntrySource,
    /// Originating record, when the entry is tied to exactly one.
    pub source_id: Option<u32>,
    pub points: Points,
    pub memo: String,
    pub at: Timestamp,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{kind:?} {source_id} was already credited to the ledger")]
    DuplicateSource { kind: EntrySource, source_id: u32 },
}

/// Append-only store of [`LedgerEntry`] rows.
///
/// Source ids are per-record-kind counters rather than global UUIDs, so
/// uniqueness is keyed on the (kind, id) pair.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    sources: HashSet<(EntrySource, u32)>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry. Fails without writing anything if `source_id` is
    /// non-null and already used.
    pub fn append(
        &mut self,
        mason: MasonId,
        source: EntrySource,
        source_id: Option<u32>,
        points: Points,
        memo: impl Into<String>,
    ) -> Result<EntryId, LedgerError> {
        if let Some(id) = source_id {
            if !self.sources.insert((source, id)) {
                return Err(LedgerError::DuplicateSource {
                    kind: source,
                    source_id: id,
                });
            }
        }

        let id = self.entries.len() as EntryId + 1;
        self.entries.push(LedgerEntry {
            id,
            mason,
            source,
            source_id,
            points,
            memo: memo.into(),
            at: Timestamp::now(),
        });
        Ok(id)
    }

    /// Whether an entry for this source already exists.
    pub fn has_source(&self, source: EntrySource, source_id: u32) -> bool {
        self.sources.contains(&(source, source_id))
    }

    /// Signed sum of all deltas recorded for one mason.
    pub fn balance_of(&self, mason: MasonId) -> Points {
        self.entries_for(mason).map(|e| e.points).sum()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> + '_ {
        self.entries.iter()
    }

    pub fn entries_for(&self, mason: MasonId) -> impl Iterator<Item = &LedgerEntry> + '_ {
        self.entries.iter().filter(move |e| e.mason == mason)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
