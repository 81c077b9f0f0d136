use bloodbank::database::Database;
use bloodbank::errors::BloodBankError;
use bloodbank::models::{Dashboard, DonationRequest, Donor, NewCredential, NewDonor};
use bloodbank::services::{BloodBankService, DEFAULT_RECENT_DONATIONS};
use bloodbank::session::SessionContext;
use bloodbank_types::{BloodType, Role, UnitStatus, SHELF_LIFE_DAYS};
use chrono::{Duration, Utc};
use std::sync::Arc;

async fn setup() -> (Arc<Database>, BloodBankService) {
    let db = Arc::new(Database::in_memory().await.unwrap());
    let service = BloodBankService::new(db.clone(), true);
    (db, service)
}

async fn register_donor(service: &BloodBankService, username: &str, blood_type: BloodType) -> Donor {
    let credential = service
        .credentials
        .register(NewCredential::new(
            username,
            &format!("{}@example.org", username),
            "donor-password",
            Role::Donor,
        ))
        .await
        .unwrap();

    service
        .donors
        .register_donor(
            credential.id,
            NewDonor {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                blood_type,
                contact: "555-0100".to_string(),
                address: "1 Main St".to_string(),
            },
        )
        .await
        .unwrap()
}

fn donation(quantity_ml: i64) -> DonationRequest {
    DonationRequest::new(quantity_ml, Some(14.2), Some("120/80")).unwrap()
}

async fn count(db: &Database, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(db.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_donation_creates_matching_unit() {
    let (_db, service) = setup().await;
    let donor = register_donor(&service, "ada", BloodType::ONegative).await;

    let recorded = service.ledger.record_donation(donor.id, donation(450)).await.unwrap();

    assert_eq!(recorded.donation.donor_id, donor.id);
    assert_eq!(recorded.donation.quantity_ml, 450);
    assert_eq!(recorded.donation.status, UnitStatus::Available);
    assert_eq!(recorded.unit.donation_id, recorded.donation.id);
    assert_eq!(recorded.unit.blood_type, BloodType::ONegative);
    assert_eq!(recorded.unit.quantity_ml, 450);
    assert_eq!(recorded.unit.status, UnitStatus::Available);
    assert_eq!(
        recorded.unit.expiry_at,
        recorded.donation.donated_at + Duration::days(SHELF_LIFE_DAYS)
    );

    let totals = service.reporting.inventory_totals().await.unwrap();
    assert_eq!(totals[BloodType::ONegative], 450);
    assert_eq!(totals.total(), 450);

    service.ledger.mark_used(recorded.unit.id).await.unwrap();

    let totals = service.reporting.inventory_totals().await.unwrap();
    assert_eq!(totals[BloodType::ONegative], 0);
    assert!(service.reporting.search_by_type("O-").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_unit_insert_leaves_no_donation() {
    let (db, service) = setup().await;
    let donor = register_donor(&service, "grace", BloodType::APositive).await;

    sqlx::query(
        r#"
        CREATE TRIGGER reject_units BEFORE INSERT ON inventory_units
        BEGIN
            SELECT RAISE(ABORT, 'injected failure');
        END
        "#,
    )
    .execute(db.pool())
    .await
    .unwrap();

    let result = service.ledger.record_donation(donor.id, donation(300)).await;
    assert!(matches!(result, Err(BloodBankError::Storage(_))));

    assert_eq!(count(&db, "donations").await, 0);
    assert_eq!(count(&db, "inventory_units").await, 0);
}

#[tokio::test]
async fn test_rejects_non_positive_quantity() {
    let (db, service) = setup().await;
    let donor = register_donor(&service, "alan", BloodType::BPositive).await;

    let request = DonationRequest {
        quantity_ml: 0,
        hemoglobin: None,
        blood_pressure: None,
    };
    let result = service.ledger.record_donation(donor.id, request).await;
    assert!(matches!(result, Err(BloodBankError::InvalidQuantity(_))));
    assert_eq!(count(&db, "donations").await, 0);
}

#[tokio::test]
async fn test_unknown_donor_is_invalid_reference() {
    let (db, service) = setup().await;

    let result = service.ledger.record_donation(9999, donation(450)).await;
    assert!(matches!(result, Err(BloodBankError::InvalidReference(_))));
    assert_eq!(count(&db, "donations").await, 0);
}

#[tokio::test]
async fn test_mark_used_once_only() {
    let (db, service) = setup().await;
    let donor = register_donor(&service, "edsger", BloodType::AbNegative).await;
    let recorded = service.ledger.record_donation(donor.id, donation(500)).await.unwrap();

    let used = service.ledger.mark_used(recorded.unit.id).await.unwrap();
    assert_eq!(used.status, UnitStatus::Used);

    let donation_row = db.get_donation(recorded.donation.id).await.unwrap().unwrap();
    assert_eq!(donation_row.status, UnitStatus::Used);

    let again = service.ledger.mark_used(recorded.unit.id).await;
    assert!(matches!(again, Err(BloodBankError::InvalidState(_))));

    let unit = db.get_inventory_unit(recorded.unit.id).await.unwrap().unwrap();
    assert_eq!(unit.status, UnitStatus::Used);
    assert_eq!(service.reporting.inventory_totals().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_mark_used_unknown_unit() {
    let (_db, service) = setup().await;
    let result = service.ledger.mark_used(42).await;
    assert!(matches!(result, Err(BloodBankError::NotFound(_))));
}

#[tokio::test]
async fn test_totals_track_donations_and_use() {
    let (_db, service) = setup().await;
    let o_neg = register_donor(&service, "barbara", BloodType::ONegative).await;
    let a_pos = register_donor(&service, "donald", BloodType::APositive).await;

    let first = service.ledger.record_donation(o_neg.id, donation(450)).await.unwrap();
    service.ledger.record_donation(o_neg.id, donation(350)).await.unwrap();
    service.ledger.record_donation(a_pos.id, donation(500)).await.unwrap();

    let totals = service.reporting.inventory_totals().await.unwrap();
    assert_eq!(totals[BloodType::ONegative], 800);
    assert_eq!(totals[BloodType::APositive], 500);
    assert_eq!(totals[BloodType::BNegative], 0);

    service.ledger.mark_used(first.unit.id).await.unwrap();

    let totals = service.reporting.inventory_totals().await.unwrap();
    assert_eq!(totals[BloodType::ONegative], 350);
    assert_eq!(totals[BloodType::APositive], 500);
}

#[tokio::test]
async fn test_search_returns_only_requested_type() {
    let (db, service) = setup().await;
    let o_neg = register_donor(&service, "john", BloodType::ONegative).await;
    let b_pos = register_donor(&service, "ken", BloodType::BPositive).await;

    let older = service.ledger.record_donation(o_neg.id, donation(450)).await.unwrap();
    service.ledger.record_donation(b_pos.id, donation(400)).await.unwrap();
    let newer = service.ledger.record_donation(o_neg.id, donation(300)).await.unwrap();

    // The later unit expires first, so expiry order disagrees with id order
    let soon = Utc::now() + Duration::days(2);
    sqlx::query("UPDATE inventory_units SET expiry_at = $1 WHERE id = $2")
        .bind(soon)
        .bind(newer.unit.id)
        .execute(db.pool())
        .await
        .unwrap();

    let units = service.reporting.search_by_type(" o- ").await.unwrap();
    let ids: Vec<i64> = units.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![newer.unit.id, older.unit.id]);
    assert!(units.iter().all(|u| u.blood_type == BloodType::ONegative));

    let results = service.search("O-").await.unwrap();
    assert_eq!(results.blood_type, Some(BloodType::ONegative));
    let ids: Vec<i64> = results.inventory.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![newer.unit.id, older.unit.id]);

    let invalid = service.reporting.search_by_type("Z+").await;
    assert!(matches!(invalid, Err(BloodBankError::InvalidBloodType(_))));
}

#[tokio::test]
async fn test_expire_stale_units_syncs_donations() {
    let (db, service) = setup().await;
    let donor = register_donor(&service, "linus", BloodType::OPositive).await;
    let recorded = service.ledger.record_donation(donor.id, donation(450)).await.unwrap();

    assert_eq!(service.ledger.expire_stale_units(Utc::now()).await.unwrap(), 0);

    let later = Utc::now() + Duration::days(SHELF_LIFE_DAYS + 1);
    assert_eq!(service.ledger.expire_stale_units(later).await.unwrap(), 1);

    let unit = db.get_inventory_unit(recorded.unit.id).await.unwrap().unwrap();
    let donation_row = db.get_donation(recorded.donation.id).await.unwrap().unwrap();
    assert_eq!(unit.status, UnitStatus::Expired);
    assert_eq!(donation_row.status, UnitStatus::Expired);
    assert_eq!(service.reporting.inventory_totals().await.unwrap().total(), 0);

    let used = service.ledger.mark_used(recorded.unit.id).await;
    assert!(matches!(used, Err(BloodBankError::InvalidState(_))));

    assert_eq!(service.ledger.expire_stale_units(later).await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_identity_rejected() {
    let (db, service) = setup().await;
    register_donor(&service, "margaret", BloodType::ANegative).await;

    let same_username = service
        .credentials
        .register(NewCredential::new("margaret", "other@example.org", "password123", Role::Donor))
        .await;
    assert!(matches!(same_username, Err(BloodBankError::DuplicateIdentity(_))));

    let same_email = service
        .credentials
        .register(NewCredential::new("hamilton", "MARGARET@example.org", "password123", Role::Staff))
        .await;
    assert!(matches!(same_email, Err(BloodBankError::DuplicateIdentity(_))));

    assert_eq!(count(&db, "credentials").await, 1);
}

#[tokio::test]
async fn test_staff_registration_can_be_disabled() {
    let db = Arc::new(Database::in_memory().await.unwrap());
    let service = BloodBankService::new(db, false);

    let result = service
        .credentials
        .register(NewCredential::new("nurse", "nurse@example.org", "password123", Role::Staff))
        .await;
    assert!(matches!(result, Err(BloodBankError::Validation(_))));
}

#[tokio::test]
async fn test_register_donor_reference_checks() {
    let (_db, service) = setup().await;
    let profile = || NewDonor {
        first_name: "Tim".to_string(),
        last_name: "Berners-Lee".to_string(),
        blood_type: BloodType::AbPositive,
        contact: "555-0101".to_string(),
        address: "2 Web Way".to_string(),
    };

    let unknown = service.donors.register_donor(777, profile()).await;
    assert!(matches!(unknown, Err(BloodBankError::InvalidReference(_))));

    let staff = service
        .credentials
        .register(NewCredential::new("staffer", "staff@example.org", "password123", Role::Staff))
        .await
        .unwrap();
    let not_donor = service.donors.register_donor(staff.id, profile()).await;
    assert!(matches!(not_donor, Err(BloodBankError::InvalidReference(_))));

    let donor = register_donor(&service, "tim", BloodType::AbPositive).await;
    let twice = service.donors.register_donor(donor.credential_id, profile()).await;
    assert!(matches!(twice, Err(BloodBankError::InvalidReference(_))));
}

#[tokio::test]
async fn test_authenticate() {
    let (_db, service) = setup().await;
    let donor = register_donor(&service, "katherine", BloodType::BNegative).await;

    let credential = service
        .credentials
        .authenticate("katherine", "donor-password")
        .await
        .unwrap();
    assert_eq!(credential.id, donor.credential_id);
    assert_eq!(credential.role, Role::Donor);

    let wrong = service.credentials.authenticate("katherine", "nope-nope").await;
    assert!(matches!(wrong, Err(BloodBankError::InvalidCredentials)));

    let missing = service.credentials.authenticate("nobody", "donor-password").await;
    assert!(matches!(missing, Err(BloodBankError::InvalidCredentials)));
}

#[tokio::test]
async fn test_donation_history_newest_first() {
    let (_db, service) = setup().await;
    let donor = register_donor(&service, "hedy", BloodType::AbPositive).await;

    let first = service.ledger.record_donation(donor.id, donation(300)).await.unwrap();
    let second = service.ledger.record_donation(donor.id, donation(400)).await.unwrap();

    let history = service.donors.donation_history(donor.id).await.unwrap();
    let ids: Vec<i64> = history.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![second.donation.id, first.donation.id]);
}

#[tokio::test]
async fn test_mark_used_rejects_overdue_unit() {
    let (db, service) = setup().await;
    let donor = register_donor(&service, "frances", BloodType::ONegative).await;
    let recorded = service.ledger.record_donation(donor.id, donation(450)).await.unwrap();

    // Past its shelf life, but no read has swept it yet
    sqlx::query("UPDATE inventory_units SET expiry_at = $1 WHERE id = $2")
        .bind(Utc::now() - Duration::days(1))
        .bind(recorded.unit.id)
        .execute(db.pool())
        .await
        .unwrap();

    let result = service.ledger.mark_used(recorded.unit.id).await;
    assert!(matches!(result, Err(BloodBankError::InvalidState(_))));

    let unit = db.get_inventory_unit(recorded.unit.id).await.unwrap().unwrap();
    let donation_row = db.get_donation(recorded.donation.id).await.unwrap().unwrap();
    assert_eq!(unit.status, UnitStatus::Expired);
    assert_eq!(donation_row.status, UnitStatus::Expired);
}

#[tokio::test]
async fn test_use_unit_refuses_expired_without_sweep() {
    let (db, service) = setup().await;
    let donor = register_donor(&service, "radia", BloodType::APositive).await;
    let recorded = service.ledger.record_donation(donor.id, donation(300)).await.unwrap();

    let later = recorded.unit.expiry_at + Duration::seconds(1);
    let result = db.use_unit(recorded.unit.id, later).await;
    assert!(matches!(result, Err(BloodBankError::InvalidState(_))));

    let unit = db.get_inventory_unit(recorded.unit.id).await.unwrap().unwrap();
    assert_eq!(unit.status, UnitStatus::Available);
}

#[tokio::test]
async fn test_recent_donations_limited_newest_first() {
    let (_db, service) = setup().await;
    let donor = register_donor(&service, "sophie", BloodType::BPositive).await;

    let mut recorded = Vec::new();
    for i in 0..12 {
        let r = service
            .ledger
            .record_donation(donor.id, donation(300 + i))
            .await
            .unwrap();
        recorded.push(r.donation.id);
    }

    let recent = service
        .reporting
        .recent_donations(DEFAULT_RECENT_DONATIONS)
        .await
        .unwrap();
    let ids: Vec<i64> = recent.iter().map(|d| d.id).collect();
    let expected: Vec<i64> = recorded.iter().rev().take(10).copied().collect();
    assert_eq!(ids, expected);
    assert!(recent.windows(2).all(|w| w[0].donated_at >= w[1].donated_at));

    let staff = service
        .credentials
        .register(NewCredential::new("clerk", "clerk@example.org", "password123", Role::Staff))
        .await
        .unwrap();
    let session = SessionContext {
        credential_id: staff.id,
        role: Role::Staff,
    };
    match service.dashboard(&session).await.unwrap() {
        Dashboard::Staff {
            blood_inventory,
            recent_donations,
        } => {
            assert_eq!(recent_donations.len(), 10);
            assert_eq!(recent_donations[0].id, recorded[11]);
            assert_eq!(blood_inventory[BloodType::BPositive], (300..312).sum::<i64>());
        }
        other => panic!("expected staff dashboard, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stale_session_is_unauthorized() {
    let (_db, service) = setup().await;
    let donor = register_donor(&service, "jean", BloodType::ONegative).await;

    let unknown = SessionContext {
        credential_id: 4242,
        role: Role::Staff,
    };
    assert!(matches!(
        service.dashboard(&unknown).await,
        Err(BloodBankError::Unauthorized)
    ));

    // Token claims staff, store says donor
    let forged_role = SessionContext {
        credential_id: donor.credential_id,
        role: Role::Staff,
    };
    assert!(matches!(
        service.resolve_session(&forged_role).await,
        Err(BloodBankError::Unauthorized)
    ));

    let genuine = SessionContext {
        credential_id: donor.credential_id,
        role: Role::Donor,
    };
    let credential = service.resolve_session(&genuine).await.unwrap();
    assert_eq!(credential.username, "jean");
}
