use crate::database::Database;
use crate::errors::{BloodBankError, Result};
use crate::metrics;
use crate::models::{Donation, DonationRequest, InventoryUnit};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// A donation together with the inventory unit derived from it
#[derive(Debug, Clone, Serialize)]
pub struct RecordedDonation {
    pub donation: Donation,
    pub unit: InventoryUnit,
}

/// Donation and inventory ledgers, always written together
pub struct DonationLedger {
    db: Arc<Database>,
}

impl DonationLedger {
    pub fn new(db: Arc<Database>) -> Self {
        DonationLedger { db }
    }

    /// Record a donation and derive its inventory unit atomically
    pub async fn record_donation(
        &self,
        donor_id: i64,
        request: DonationRequest,
    ) -> Result<RecordedDonation> {
        if request.quantity_ml <= 0 {
            return Err(BloodBankError::InvalidQuantity(format!(
                "quantity must be a positive number of ml, got {}",
                request.quantity_ml
            )));
        }

        let donor = self
            .db
            .get_donor(donor_id)
            .await?
            .ok_or_else(|| BloodBankError::InvalidReference(format!("unknown donor {}", donor_id)))?;

        let (donation, unit) = self
            .db
            .record_donation(&donor, &request, Utc::now())
            .await
            .map_err(|e| {
                error!("Failed to record donation for donor {}: {}", donor_id, e);
                e
            })?;

        metrics::DONATIONS_RECORDED.inc();
        metrics::DONATED_VOLUME_ML
            .with_label_values(&[unit.blood_type.as_str()])
            .inc_by(unit.quantity_ml as u64);

        info!(
            "Recorded donation {} of {} ml {} from donor {} (unit {}, expires {})",
            donation.id, donation.quantity_ml, unit.blood_type, donor_id, unit.id, unit.expiry_at
        );

        Ok(RecordedDonation { donation, unit })
    }

    /// Consume an available unit; its donation is marked used in the same transaction.
    ///
    /// Overdue units are retired first, so an expired unit fails with
    /// `InvalidState` and ends up `expired` rather than `used`.
    pub async fn mark_used(&self, unit_id: i64) -> Result<InventoryUnit> {
        let now = Utc::now();
        self.expire_stale_units(now).await?;

        let unit = self.db.use_unit(unit_id, now).await?;

        metrics::UNITS_USED
            .with_label_values(&[unit.blood_type.as_str()])
            .inc();

        info!(
            "Inventory unit {} ({} ml {}) marked used, donation {}",
            unit.id, unit.quantity_ml, unit.blood_type, unit.donation_id
        );

        Ok(unit)
    }

    /// Expire every available unit whose expiry is before `now`, with its donation.
    ///
    /// Returns the number of units expired.
    pub async fn expire_stale_units(&self, now: DateTime<Utc>) -> Result<usize> {
        let expired = self.db.expire_units_before(now).await?;

        for unit in &expired {
            metrics::UNITS_EXPIRED
                .with_label_values(&[unit.blood_type.as_str()])
                .inc();
        }

        if !expired.is_empty() {
            info!("Expired {} inventory units past shelf life", expired.len());
        }

        Ok(expired.len())
    }
}
