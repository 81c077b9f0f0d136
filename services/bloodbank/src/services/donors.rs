use crate::database::Database;
use crate::errors::{BloodBankError, Result};
use crate::models::{Donation, Donor, NewDonor};
use bloodbank_types::Role;
use std::sync::Arc;
use tracing::info;

pub struct DonorRegistry {
    db: Arc<Database>,
}

impl DonorRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        DonorRegistry { db }
    }

    /// Attach a donor profile to a donor credential that has none yet
    pub async fn register_donor(&self, credential_id: i64, donor: NewDonor) -> Result<Donor> {
        let credential = self.db.get_credential(credential_id).await?.ok_or_else(|| {
            BloodBankError::InvalidReference(format!("unknown credential {}", credential_id))
        })?;

        if credential.role != Role::Donor {
            return Err(BloodBankError::InvalidReference(format!(
                "credential {} is not a donor account",
                credential_id
            )));
        }

        if self.db.find_donor_by_credential(credential_id).await?.is_some() {
            return Err(BloodBankError::InvalidReference(format!(
                "credential {} already has a donor profile",
                credential_id
            )));
        }

        let donor = self
            .db
            .insert_donor(credential_id, &donor)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    BloodBankError::InvalidReference(format!(
                        "credential {} already has a donor profile",
                        credential_id
                    ))
                } else {
                    e
                }
            })?;

        info!(
            "Registered donor {} ({}) for credential {}",
            donor.id, donor.blood_type, credential_id
        );

        Ok(donor)
    }

    pub async fn get_donor_by_credential(&self, credential_id: i64) -> Result<Donor> {
        self.db
            .find_donor_by_credential(credential_id)
            .await?
            .ok_or_else(|| {
                BloodBankError::NotFound(format!("donor profile for credential {}", credential_id))
            })
    }

    /// The donor's donations, newest first
    pub async fn donation_history(&self, donor_id: i64) -> Result<Vec<Donation>> {
        self.db.donations_for_donor(donor_id).await
    }
}
