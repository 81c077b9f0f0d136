pub mod credentials;
pub mod donors;
pub mod intake;
pub mod ledger;
pub mod reporting;

pub use credentials::CredentialStore;
pub use donors::DonorRegistry;
pub use intake::{LoggingIntake, RequestIntake};
pub use ledger::{DonationLedger, RecordedDonation};
pub use reporting::{ReportingAggregator, DEFAULT_RECENT_DONATIONS};

use crate::database::Database;
use crate::errors::{BloodBankError, Result};
use crate::models::{
    BloodRequest, BloodRequestReceipt, Credential, Dashboard, DonationRequest, Donor, InventoryUnit,
    SearchResults,
};
use crate::session::SessionContext;
use bloodbank_types::{BloodType, InventoryTotals, Role};
use chrono::Utc;
use std::sync::Arc;

/// Every component wired to one store.
///
/// Staff-facing reads go through [`BloodBankService::sweep_expired`] first, so
/// units past their shelf life never show up as available.
pub struct BloodBankService {
    db: Arc<Database>,
    pub credentials: CredentialStore,
    pub donors: DonorRegistry,
    pub ledger: DonationLedger,
    pub reporting: ReportingAggregator,
    pub intake: Arc<dyn RequestIntake>,
}

impl BloodBankService {
    pub fn new(db: Arc<Database>, allow_staff_registration: bool) -> Self {
        Self::with_intake(db, allow_staff_registration, Arc::new(LoggingIntake))
    }

    pub fn with_intake(
        db: Arc<Database>,
        allow_staff_registration: bool,
        intake: Arc<dyn RequestIntake>,
    ) -> Self {
        BloodBankService {
            credentials: CredentialStore::new(db.clone(), allow_staff_registration),
            donors: DonorRegistry::new(db.clone()),
            ledger: DonationLedger::new(db.clone()),
            reporting: ReportingAggregator::new(db.clone()),
            intake,
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Lazy expiry: retire overdue units before reading inventory
    pub async fn sweep_expired(&self) -> Result<usize> {
        self.ledger.expire_stale_units(Utc::now()).await
    }

    /// Re-check a session against the store.
    ///
    /// A token whose credential no longer exists, or whose role no longer
    /// matches, is treated as anonymous.
    pub async fn resolve_session(&self, session: &SessionContext) -> Result<Credential> {
        let credential = match self.credentials.get(session.credential_id).await {
            Ok(credential) => credential,
            Err(BloodBankError::NotFound(_)) => return Err(BloodBankError::Unauthorized),
            Err(e) => return Err(e),
        };

        if credential.role != session.role {
            tracing::warn!(
                credential_id = credential.id,
                "session role {} does not match stored role {}",
                session.role,
                credential.role
            );
            return Err(BloodBankError::Unauthorized);
        }

        Ok(credential)
    }

    /// Donor profile of the logged-in donor
    pub async fn donor_for(&self, session: &SessionContext) -> Result<Donor> {
        self.donors.get_donor_by_credential(session.credential_id).await
    }

    pub async fn dashboard(&self, session: &SessionContext) -> Result<Dashboard> {
        self.resolve_session(session).await?;

        match session.role {
            Role::Donor => {
                let donor = self.donor_for(session).await?;
                let donations = self.donors.donation_history(donor.id).await?;
                Ok(Dashboard::Donor { donor, donations })
            }
            Role::Staff => {
                self.sweep_expired().await?;
                Ok(Dashboard::Staff {
                    blood_inventory: self.reporting.inventory_totals().await?,
                    recent_donations: self
                        .reporting
                        .recent_donations(DEFAULT_RECENT_DONATIONS)
                        .await?,
                })
            }
        }
    }

    pub async fn donate(
        &self,
        session: &SessionContext,
        request: DonationRequest,
    ) -> Result<RecordedDonation> {
        let donor = self.donor_for(session).await?;
        self.ledger.record_donation(donor.id, request).await
    }

    pub async fn inventory(&self) -> Result<Vec<InventoryUnit>> {
        self.sweep_expired().await?;
        self.reporting.available_inventory().await
    }

    pub async fn inventory_totals(&self) -> Result<InventoryTotals> {
        self.sweep_expired().await?;
        self.reporting.inventory_totals().await
    }

    pub async fn search(&self, blood_type: &str) -> Result<SearchResults> {
        // Reject bad labels before touching the store
        let label: BloodType = blood_type.parse()?;
        self.sweep_expired().await?;
        Ok(SearchResults {
            blood_type: Some(label),
            inventory: self.reporting.search_by_type(blood_type).await?,
        })
    }

    pub fn request_blood(
        &self,
        session: &SessionContext,
        request: &BloodRequest,
    ) -> Result<BloodRequestReceipt> {
        self.intake.submit(request, session)
    }
}
