use crate::errors::Result;
use crate::metrics;
use crate::models::{BloodRequest, BloodRequestReceipt};
use crate::session::SessionContext;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Destination for incoming blood requests.
///
/// Requests are acknowledged, never stored by this service.
pub trait RequestIntake: Send + Sync {
    fn submit(&self, request: &BloodRequest, requested_by: &SessionContext) -> Result<BloodRequestReceipt>;
}

/// Writes each request to the structured log under the `bloodbank::intake` target
#[derive(Debug, Default)]
pub struct LoggingIntake;

impl RequestIntake for LoggingIntake {
    fn submit(&self, request: &BloodRequest, requested_by: &SessionContext) -> Result<BloodRequestReceipt> {
        let receipt = BloodRequestReceipt {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            blood_type: request.blood_type,
            quantity_ml: request.quantity_ml,
            urgency: request.urgency,
            message: format!(
                "Request for {} ml of {} blood submitted successfully for {}.",
                request.quantity_ml, request.blood_type, request.patient_name
            ),
        };

        info!(
            target: "bloodbank::intake",
            receipt_id = %receipt.id,
            blood_type = %request.blood_type,
            quantity_ml = request.quantity_ml,
            urgency = %request.urgency,
            hospital = %request.hospital,
            requested_by = requested_by.credential_id,
            has_notes = request.notes.is_some(),
            "blood request received"
        );

        metrics::BLOOD_REQUESTS
            .with_label_values(&[request.blood_type.as_str(), request.urgency.as_str()])
            .inc();

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodbank_types::{BloodType, Role, Urgency};

    #[test]
    fn test_logging_intake_acknowledges() {
        let request = BloodRequest {
            blood_type: BloodType::ONegative,
            quantity_ml: 900,
            urgency: Urgency::High,
            patient_name: "J. Doe".to_string(),
            hospital: "General".to_string(),
            notes: None,
        };
        let staff = SessionContext {
            credential_id: 2,
            role: Role::Staff,
        };

        let receipt = LoggingIntake.submit(&request, &staff).unwrap();
        assert_eq!(receipt.blood_type, BloodType::ONegative);
        assert_eq!(receipt.quantity_ml, 900);
        assert_eq!(
            receipt.message,
            "Request for 900 ml of O- blood submitted successfully for J. Doe."
        );
    }
}
