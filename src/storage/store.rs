//! War record store: one record set per war plus the derived views.

use tracing::{info, warn};

use super::{
    is_derived_sheet, JsonlWorkbook, SheetPosition, StorageConfig, StorageError, Workbook,
    MISSED_HITS_SHEET, ROSTER_SHEET,
};
use crate::models::{AttackRecord, LootAnnotations, MissedHitEntry, RosterEntry, WarId};

/// Result of [`WarRecordStore::exists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WarPresence {
    pub found: bool,
    pub complete: bool,
}

/// Whether an upsert created a new record set or replaced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Replaced,
}

/// Typed access to the war workbook.
pub struct WarRecordStore<W = JsonlWorkbook> {
    workbook: W,
}

impl WarRecordStore<JsonlWorkbook> {
    /// Open the JSONL workbook under the configured data directory.
    pub fn open(config: &StorageConfig) -> Self {
        Self::new(JsonlWorkbook::open(config))
    }
}

impl<W: Workbook> WarRecordStore<W> {
    pub fn new(workbook: W) -> Self {
        Self { workbook }
    }

    pub fn workbook(&self) -> &W {
        &self.workbook
    }

    /// War record sets in workbook order, derived views excluded.
    pub fn war_ids(&self) -> Result<Vec<WarId>, StorageError> {
        Ok(self
            .workbook
            .sheet_names()?
            .iter()
            .filter(|name| !is_derived_sheet(name))
            .map(|name| WarId::from_timestamp(name))
            .collect())
    }

    pub fn read_war(&self, war_id: &WarId) -> Result<Vec<AttackRecord>, StorageError> {
        self.workbook.read_sheet(war_id.as_str())
    }

    /// Whether a war is stored, and whether its stored copy is complete.
    ///
    /// Completeness is read from the first row; every row of a set carries the
    /// same flag.
    pub fn exists(&self, war_id: &WarId) -> Result<WarPresence, StorageError> {
        if !self.workbook.has_sheet(war_id.as_str())? {
            return Ok(WarPresence::default());
        }

        let records = self.read_war(war_id)?;
        Ok(WarPresence {
            found: true,
            complete: records.first().is_some_and(|r| r.war_complete),
        })
    }

    /// Loot-hit markings stored for a war; empty if the war is unknown.
    pub fn loot_annotations(&self, war_id: &WarId) -> Result<LootAnnotations, StorageError> {
        if !self.workbook.has_sheet(war_id.as_str())? {
            return Ok(LootAnnotations::new());
        }
        Ok(LootAnnotations::from_records(&self.read_war(war_id)?))
    }

    /// Replace a war's record set wholesale, or append it if new.
    ///
    /// Callers fold loot annotations into `records` first and must not call
    /// this for a war already stored as complete.
    pub fn upsert(
        &self,
        war_id: &WarId,
        records: &[AttackRecord],
    ) -> Result<UpsertOutcome, StorageError> {
        if is_derived_sheet(war_id.as_str()) {
            return Err(StorageError::InvalidSheetName(war_id.to_string()));
        }

        let outcome = if self.workbook.has_sheet(war_id.as_str())? {
            info!("Updating existing war {}", war_id);
            UpsertOutcome::Replaced
        } else {
            info!("Creating new war {}", war_id);
            UpsertOutcome::Created
        };

        self.workbook
            .write_sheet(war_id.as_str(), records, SheetPosition::Append)?;
        Ok(outcome)
    }

    /// Set or clear the loot-hit mark on one attack.
    ///
    /// Returns false when the war has no such attack.
    pub fn set_loot_hit(
        &self,
        war_id: &WarId,
        player_tag: &str,
        attack_number: u32,
        is_loot_hit: bool,
    ) -> Result<bool, StorageError> {
        if attack_number == 0 {
            return Err(StorageError::InvalidAnnotation(
                "attack number 0 marks a member without attacks".to_string(),
            ));
        }

        let mut records = self.read_war(war_id)?;
        let Some(record) = records
            .iter_mut()
            .find(|r| r.player_tag == player_tag && r.attack_number == attack_number)
        else {
            return Ok(false);
        };

        if record.is_loot_hit == is_loot_hit {
            return Ok(true);
        }
        record.is_loot_hit = is_loot_hit;

        self.workbook
            .write_sheet(war_id.as_str(), &records, SheetPosition::Append)?;
        info!(
            "Set loot hit = {} for {} attack {} in war {}",
            is_loot_hit, player_tag, attack_number, war_id
        );
        Ok(true)
    }

    /// Every readable, non-empty war record set.
    ///
    /// Sets that fail to read are skipped with a warning so one bad sheet
    /// never stops a scan.
    pub fn scan_wars(&self) -> Result<Vec<(WarId, Vec<AttackRecord>)>, StorageError> {
        let mut wars = Vec::new();
        for war_id in self.war_ids()? {
            match self.read_war(&war_id) {
                Ok(records) if records.is_empty() => {
                    warn!("Skipping empty war sheet {}", war_id);
                }
                Ok(records) => wars.push((war_id, records)),
                Err(e) => warn!("Skipping unreadable war sheet {}: {}", war_id, e),
            }
        }
        Ok(wars)
    }

    /// Like [`Self::scan_wars`], restricted to completed wars.
    pub fn scan_complete_wars(&self) -> Result<Vec<(WarId, Vec<AttackRecord>)>, StorageError> {
        Ok(self
            .scan_wars()?
            .into_iter()
            .filter(|(_, records)| records[0].war_complete)
            .collect())
    }

    pub fn write_roster(&self, entries: &[RosterEntry]) -> Result<(), StorageError> {
        self.workbook
            .write_sheet(ROSTER_SHEET, entries, SheetPosition::At(0))
    }

    /// Roster sheet rows, empty if it was never built.
    pub fn read_roster(&self) -> Result<Vec<RosterEntry>, StorageError> {
        self.read_view(ROSTER_SHEET)
    }

    pub fn write_missed_hits(&self, entries: &[MissedHitEntry]) -> Result<(), StorageError> {
        let index = usize::from(self.workbook.has_sheet(ROSTER_SHEET)?);
        self.workbook
            .write_sheet(MISSED_HITS_SHEET, entries, SheetPosition::At(index))
    }

    /// Missed-hits sheet rows, empty if it was never built.
    pub fn read_missed_hits(&self) -> Result<Vec<MissedHitEntry>, StorageError> {
        self.read_view(MISSED_HITS_SHEET)
    }

    fn read_view<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StorageError> {
        match self.workbook.read_sheet(name) {
            Err(StorageError::SheetNotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }
}
