use crate::errors::{BloodBankError, Result};
use crate::models::{Credential, Donation, DonationRequest, Donor, InventoryUnit, NewDonor};
use bloodbank_types::{expiry_for, BloodType, Role, UnitStatus};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Ok(Database { pool })
    }

    /// Private in-memory database with the schema applied.
    ///
    /// Pinned to a single connection that is never recycled, since every
    /// SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ===== Credentials =====

    pub async fn insert_credential(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Credential> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            INSERT INTO credentials (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(credential)
    }

    pub async fn identity_taken(&self, username: &str, email: &str) -> Result<bool> {
        let matches: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM credentials WHERE username = $1 OR email = $2
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(matches > 0)
    }

    pub async fn find_credential_by_username(&self, username: &str) -> Result<Option<Credential>> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            SELECT * FROM credentials WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    pub async fn get_credential(&self, credential_id: i64) -> Result<Option<Credential>> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            SELECT * FROM credentials WHERE id = $1
            "#,
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    // ===== Donors =====

    pub async fn insert_donor(&self, credential_id: i64, donor: &NewDonor) -> Result<Donor> {
        let donor = sqlx::query_as::<_, Donor>(
            r#"
            INSERT INTO donors (credential_id, first_name, last_name, blood_type, contact, address, registered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(credential_id)
        .bind(&donor.first_name)
        .bind(&donor.last_name)
        .bind(donor.blood_type)
        .bind(&donor.contact)
        .bind(&donor.address)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(donor)
    }

    pub async fn get_donor(&self, donor_id: i64) -> Result<Option<Donor>> {
        let donor = sqlx::query_as::<_, Donor>(
            r#"
            SELECT * FROM donors WHERE id = $1
            "#,
        )
        .bind(donor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(donor)
    }

    pub async fn find_donor_by_credential(&self, credential_id: i64) -> Result<Option<Donor>> {
        let donor = sqlx::query_as::<_, Donor>(
            r#"
            SELECT * FROM donors WHERE credential_id = $1
            "#,
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(donor)
    }

    // ===== Donations + inventory =====

    /// Insert a donation and its inventory unit in one transaction.
    ///
    /// The unit inherits the donor's blood type and expires a fixed shelf life
    /// after `donated_at`. If either insert fails the transaction is dropped
    /// uncommitted and neither row survives.
    pub async fn record_donation(
        &self,
        donor: &Donor,
        request: &DonationRequest,
        donated_at: DateTime<Utc>,
    ) -> Result<(Donation, InventoryUnit)> {
        let mut tx = self.pool.begin().await?;

        let donation = sqlx::query_as::<_, Donation>(
            r#"
            INSERT INTO donations (donor_id, donated_at, quantity_ml, hemoglobin, blood_pressure, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(donor.id)
        .bind(donated_at)
        .bind(request.quantity_ml)
        .bind(request.hemoglobin)
        .bind(request.blood_pressure.as_deref())
        .bind(UnitStatus::Available)
        .fetch_one(&mut *tx)
        .await?;

        let unit = sqlx::query_as::<_, InventoryUnit>(
            r#"
            INSERT INTO inventory_units (blood_type, quantity_ml, donation_id, expiry_at, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(donor.blood_type)
        .bind(donation.quantity_ml)
        .bind(donation.id)
        .bind(expiry_for(donation.donated_at))
        .bind(UnitStatus::Available)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((donation, unit))
    }

    pub async fn get_inventory_unit(&self, unit_id: i64) -> Result<Option<InventoryUnit>> {
        let unit = sqlx::query_as::<_, InventoryUnit>(
            r#"
            SELECT * FROM inventory_units WHERE id = $1
            "#,
        )
        .bind(unit_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(unit)
    }

    pub async fn get_donation(&self, donation_id: i64) -> Result<Option<Donation>> {
        let donation = sqlx::query_as::<_, Donation>(
            r#"
            SELECT * FROM donations WHERE id = $1
            "#,
        )
        .bind(donation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(donation)
    }

    /// Mark an available, unexpired unit and its donation used together.
    ///
    /// Both updates are conditional on the row still being `available`, so a
    /// unit consumed by a concurrent request fails with `InvalidState` and the
    /// transaction rolls back. A unit whose expiry is before `now` is never
    /// handed out, even if no sweep has retired it yet.
    pub async fn use_unit(&self, unit_id: i64, now: DateTime<Utc>) -> Result<InventoryUnit> {
        let mut tx = self.pool.begin().await?;

        let unit = sqlx::query_as::<_, InventoryUnit>(
            r#"
            SELECT * FROM inventory_units WHERE id = $1
            "#,
        )
        .bind(unit_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| BloodBankError::NotFound(format!("inventory unit {}", unit_id)))?;

        if !unit.status.can_transition_to(UnitStatus::Used) {
            return Err(BloodBankError::InvalidState(format!(
                "inventory unit {} is {}, cannot mark used",
                unit_id, unit.status
            )));
        }

        if unit.expiry_at < now {
            return Err(BloodBankError::InvalidState(format!(
                "inventory unit {} expired at {}",
                unit_id, unit.expiry_at
            )));
        }

        let updated = sqlx::query_as::<_, InventoryUnit>(
            r#"
            UPDATE inventory_units
            SET status = $1
            WHERE id = $2 AND status = $3 AND expiry_at >= $4
            RETURNING *
            "#,
        )
        .bind(UnitStatus::Used)
        .bind(unit_id)
        .bind(UnitStatus::Available)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            BloodBankError::InvalidState(format!("inventory unit {} is no longer available", unit_id))
        })?;

        let donation_rows = sqlx::query(
            r#"
            UPDATE donations
            SET status = $1
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(UnitStatus::Used)
        .bind(updated.donation_id)
        .bind(UnitStatus::Available)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if donation_rows != 1 {
            return Err(BloodBankError::InvalidState(format!(
                "donation {} out of sync with inventory unit {}",
                updated.donation_id, unit_id
            )));
        }

        tx.commit().await?;

        Ok(updated)
    }

    /// Expire every available unit past its expiry, together with its donation.
    ///
    /// Returns the expired units.
    pub async fn expire_units_before(&self, now: DateTime<Utc>) -> Result<Vec<InventoryUnit>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE donations
            SET status = $1
            WHERE status = $2
              AND id IN (
                  SELECT donation_id FROM inventory_units
                  WHERE status = $2 AND expiry_at < $3
              )
            "#,
        )
        .bind(UnitStatus::Expired)
        .bind(UnitStatus::Available)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let expired = sqlx::query_as::<_, InventoryUnit>(
            r#"
            UPDATE inventory_units
            SET status = $1
            WHERE status = $2 AND expiry_at < $3
            RETURNING *
            "#,
        )
        .bind(UnitStatus::Expired)
        .bind(UnitStatus::Available)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(expired)
    }

    // ===== Reporting =====

    /// Available units, soonest expiry first, optionally for one blood type.
    pub async fn available_units(&self, blood_type: Option<BloodType>) -> Result<Vec<InventoryUnit>> {
        let query = if let Some(bt) = blood_type {
            sqlx::query_as::<_, InventoryUnit>(
                r#"
                SELECT * FROM inventory_units
                WHERE status = $1 AND blood_type = $2
                ORDER BY expiry_at ASC, id ASC
                "#,
            )
            .bind(UnitStatus::Available)
            .bind(bt)
        } else {
            sqlx::query_as::<_, InventoryUnit>(
                r#"
                SELECT * FROM inventory_units
                WHERE status = $1
                ORDER BY expiry_at ASC, id ASC
                "#,
            )
            .bind(UnitStatus::Available)
        };

        let units = query.fetch_all(&self.pool).await?;

        Ok(units)
    }

    /// Available millilitres grouped by blood type. Types with no stock are absent.
    pub async fn available_totals(&self) -> Result<Vec<(BloodType, i64)>> {
        let totals = sqlx::query_as::<_, (BloodType, i64)>(
            r#"
            SELECT blood_type, COALESCE(SUM(quantity_ml), 0) AS total_ml
            FROM inventory_units
            WHERE status = $1
            GROUP BY blood_type
            "#,
        )
        .bind(UnitStatus::Available)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }

    pub async fn recent_donations(&self, limit: i64) -> Result<Vec<Donation>> {
        let donations = sqlx::query_as::<_, Donation>(
            r#"
            SELECT * FROM donations
            ORDER BY donated_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(donations)
    }

    pub async fn donations_for_donor(&self, donor_id: i64) -> Result<Vec<Donation>> {
        let donations = sqlx::query_as::<_, Donation>(
            r#"
            SELECT * FROM donations
            WHERE donor_id = $1
            ORDER BY donated_at DESC, id DESC
            "#,
        )
        .bind(donor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(donations)
    }
}
