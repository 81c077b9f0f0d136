use crate::errors::{BloodBankError, Result};
use bloodbank_types::{BloodType, InventoryTotals, Role, UnitStatus, Urgency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Login identity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Credential {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
}

/// Donor profile, one per donor credential
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Donor {
    pub id: i64,
    pub credential_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub blood_type: BloodType,
    pub contact: String,
    pub address: String,
    pub registered_at: DateTime<Utc>,
}

/// One recorded blood draw
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Donation {
    pub id: i64,
    pub donor_id: i64,
    pub donated_at: DateTime<Utc>,
    pub quantity_ml: i64,
    pub hemoglobin: Option<f64>,
    pub blood_pressure: Option<String>,
    pub status: UnitStatus,
}

/// Usable volume derived from a donation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryUnit {
    pub id: i64,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub donation_id: i64,
    pub expiry_at: DateTime<Utc>,
    pub status: UnitStatus,
}

// ===== Form payloads =====

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub user_type: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct DonorForm {
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    pub blood_type: String,
    #[validate(length(min = 1, max = 20))]
    pub contact: String,
    #[validate(length(min = 1, max = 200))]
    pub address: String,
}

/// Raw donation form; numbers arrive as text and are parsed by [`DonationRequest::try_from`].
#[derive(Debug, Deserialize, Serialize)]
pub struct DonationForm {
    pub quantity: String,
    #[serde(default)]
    pub hemoglobin: Option<String>,
    #[serde(default)]
    pub blood_pressure: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchForm {
    pub blood_type: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct BloodRequestForm {
    pub req_blood_type: String,
    pub quantity: String,
    pub urgency: String,
    #[validate(length(min = 1, max = 100))]
    pub patient_name: String,
    #[validate(length(min = 1, max = 200))]
    pub hospital: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

// ===== Typed requests =====

/// Registration fields after parsing
#[derive(Debug, Clone, Validate)]
pub struct NewCredential {
    #[validate(length(min = 3, max = 80))]
    pub username: String,
    #[validate(email, length(max = 120))]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: Role,
}

impl NewCredential {
    pub fn new(username: &str, email: &str, password: &str, role: Role) -> Self {
        NewCredential {
            username: username.trim().to_string(),
            email: email.trim().to_ascii_lowercase(),
            password: password.to_string(),
            role,
        }
    }
}

impl TryFrom<RegisterForm> for NewCredential {
    type Error = BloodBankError;

    fn try_from(form: RegisterForm) -> Result<Self> {
        let role: Role = form.user_type.parse()?;
        Ok(NewCredential::new(&form.username, &form.email, &form.password, role))
    }
}

/// Donor profile fields after validation
#[derive(Debug, Clone)]
pub struct NewDonor {
    pub first_name: String,
    pub last_name: String,
    pub blood_type: BloodType,
    pub contact: String,
    pub address: String,
}

impl TryFrom<DonorForm> for NewDonor {
    type Error = BloodBankError;

    fn try_from(form: DonorForm) -> Result<Self> {
        form.validate()?;
        Ok(NewDonor {
            blood_type: form.blood_type.parse()?,
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            contact: form.contact.trim().to_string(),
            address: form.address.trim().to_string(),
        })
    }
}

/// A donation ready to be recorded
#[derive(Debug, Clone, PartialEq)]
pub struct DonationRequest {
    pub quantity_ml: i64,
    pub hemoglobin: Option<f64>,
    pub blood_pressure: Option<String>,
}

impl DonationRequest {
    pub fn new(quantity_ml: i64, hemoglobin: Option<f64>, blood_pressure: Option<&str>) -> Result<Self> {
        if quantity_ml <= 0 {
            return Err(BloodBankError::InvalidQuantity(format!(
                "quantity must be a positive number of ml, got {}",
                quantity_ml
            )));
        }

        if let Some(hb) = hemoglobin {
            if !hb.is_finite() || hb <= 0.0 {
                return Err(BloodBankError::Validation(format!(
                    "hemoglobin must be a positive number, got {}",
                    hb
                )));
            }
        }

        let blood_pressure = blood_pressure
            .map(str::trim)
            .filter(|bp| !bp.is_empty())
            .map(str::to_string);

        if let Some(bp) = &blood_pressure {
            if bp.len() > 20 {
                return Err(BloodBankError::Validation(
                    "blood pressure must be at most 20 characters".to_string(),
                ));
            }
        }

        Ok(DonationRequest {
            quantity_ml,
            hemoglobin,
            blood_pressure,
        })
    }
}

impl TryFrom<DonationForm> for DonationRequest {
    type Error = BloodBankError;

    fn try_from(form: DonationForm) -> Result<Self> {
        let quantity_ml = parse_quantity(&form.quantity)?;
        let hemoglobin = match form.hemoglobin.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<f64>().map_err(|_| {
                BloodBankError::Validation(format!("hemoglobin must be a number, got {:?}", raw))
            })?),
        };

        DonationRequest::new(quantity_ml, hemoglobin, form.blood_pressure.as_deref())
    }
}

/// A blood request after validation
#[derive(Debug, Clone)]
pub struct BloodRequest {
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub urgency: Urgency,
    pub patient_name: String,
    pub hospital: String,
    pub notes: Option<String>,
}

impl TryFrom<BloodRequestForm> for BloodRequest {
    type Error = BloodBankError;

    fn try_from(form: BloodRequestForm) -> Result<Self> {
        form.validate()?;
        Ok(BloodRequest {
            blood_type: form.req_blood_type.parse()?,
            quantity_ml: parse_quantity(&form.quantity)?,
            urgency: form.urgency.parse()?,
            patient_name: form.patient_name.trim().to_string(),
            hospital: form.hospital.trim().to_string(),
            notes: form
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        })
    }
}

/// Acknowledgement handed back for an accepted blood request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodRequestReceipt {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub blood_type: BloodType,
    pub quantity_ml: i64,
    pub urgency: Urgency,
    pub message: String,
}

fn parse_quantity(raw: &str) -> Result<i64> {
    let quantity = raw.trim().parse::<i64>().map_err(|_| {
        BloodBankError::InvalidQuantity(format!("quantity must be a whole number of ml, got {:?}", raw))
    })?;
    if quantity <= 0 {
        return Err(BloodBankError::InvalidQuantity(format!(
            "quantity must be a positive number of ml, got {}",
            quantity
        )));
    }
    Ok(quantity)
}

// ===== View models =====

/// Role-branched dashboard
#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Donor {
        donor: Donor,
        donations: Vec<Donation>,
    },
    Staff {
        blood_inventory: InventoryTotals,
        recent_donations: Vec<Donation>,
    },
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub blood_type: Option<BloodType>,
    pub inventory: Vec<InventoryUnit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donation_form(quantity: &str, hb: Option<&str>, bp: Option<&str>) -> DonationForm {
        DonationForm {
            quantity: quantity.to_string(),
            hemoglobin: hb.map(str::to_string),
            blood_pressure: bp.map(str::to_string),
        }
    }

    #[test]
    fn test_donation_form_parses_typed_fields() {
        let request =
            DonationRequest::try_from(donation_form("450", Some("13.5"), Some(" 120/80 "))).unwrap();
        assert_eq!(request.quantity_ml, 450);
        assert_eq!(request.hemoglobin, Some(13.5));
        assert_eq!(request.blood_pressure.as_deref(), Some("120/80"));
    }

    #[test]
    fn test_donation_form_optional_fields_may_be_blank() {
        let request = DonationRequest::try_from(donation_form("300", Some(""), Some("  "))).unwrap();
        assert_eq!(request.hemoglobin, None);
        assert_eq!(request.blood_pressure, None);
    }

    #[test]
    fn test_donation_form_rejects_non_positive_quantity() {
        for bad in ["0", "-450", "abc", "", "4.5"] {
            let err = DonationRequest::try_from(donation_form(bad, None, None)).unwrap_err();
            assert!(matches!(err, BloodBankError::InvalidQuantity(_)), "{bad}: {err:?}");
        }
    }

    #[test]
    fn test_donation_form_rejects_bad_hemoglobin() {
        let err = DonationRequest::try_from(donation_form("450", Some("high"), None)).unwrap_err();
        assert!(matches!(err, BloodBankError::Validation(_)));

        let err = DonationRequest::new(450, Some(-1.0), None).unwrap_err();
        assert!(matches!(err, BloodBankError::Validation(_)));
    }

    #[test]
    fn test_donor_form_rejects_unknown_blood_type() {
        let form = DonorForm {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            blood_type: "Z+".into(),
            contact: "555-0100".into(),
            address: "1 Main St".into(),
        };
        let err = NewDonor::try_from(form).unwrap_err();
        assert!(matches!(err, BloodBankError::InvalidBloodType(ref v) if v == "Z+"));
    }

    #[test]
    fn test_blood_request_form() {
        let form = BloodRequestForm {
            req_blood_type: "AB-".into(),
            quantity: "900".into(),
            urgency: "critical".into(),
            patient_name: "J. Doe".into(),
            hospital: "General".into(),
            notes: Some("   ".into()),
        };
        let request = BloodRequest::try_from(form).unwrap();
        assert_eq!(request.blood_type, BloodType::AbNegative);
        assert_eq!(request.quantity_ml, 900);
        assert_eq!(request.urgency, Urgency::Critical);
        assert_eq!(request.notes, None);
    }

    #[test]
    fn test_credential_never_serializes_hash() {
        let credential = Credential {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Donor,
        };
        let json = serde_json::to_string(&credential).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"role\":\"donor\""));
    }
}
