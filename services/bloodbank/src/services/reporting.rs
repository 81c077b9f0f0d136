use crate::database::Database;
use crate::errors::Result;
use crate::models::{Donation, InventoryUnit};
use bloodbank_types::{BloodType, InventoryTotals};
use std::sync::Arc;

/// Rows shown on the staff dashboard when no limit is given
pub const DEFAULT_RECENT_DONATIONS: i64 = 10;

/// Read-side queries over the inventory and donation ledgers.
///
/// Always reads committed state straight from the store; nothing is cached.
pub struct ReportingAggregator {
    db: Arc<Database>,
}

impl ReportingAggregator {
    pub fn new(db: Arc<Database>) -> Self {
        ReportingAggregator { db }
    }

    /// Available millilitres for each of the eight blood types
    pub async fn inventory_totals(&self) -> Result<InventoryTotals> {
        let rows = self.db.available_totals().await?;
        Ok(InventoryTotals::from_pairs(rows))
    }

    /// Available units of one type, soonest expiry first.
    ///
    /// `blood_type` is raw user input; unknown labels fail with `InvalidBloodType`.
    pub async fn search_by_type(&self, blood_type: &str) -> Result<Vec<InventoryUnit>> {
        let blood_type: BloodType = blood_type.parse()?;
        self.db.available_units(Some(blood_type)).await
    }

    /// All available units, soonest expiry first
    pub async fn available_inventory(&self) -> Result<Vec<InventoryUnit>> {
        self.db.available_units(None).await
    }

    /// Most recent donations, newest first
    pub async fn recent_donations(&self, limit: i64) -> Result<Vec<Donation>> {
        self.db.recent_donations(limit.max(0)).await
    }
}
