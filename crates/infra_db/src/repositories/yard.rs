//! Yard register queries
//!
//! Row types for owners, horses, locations, rate types, ownership records,
//! placements and extra charges, and the SQL that reads and writes them.
//! Every function takes a connection so the same query runs on a pooled
//! connection or inside an open transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{
    Currency, ExtraChargeId, HorseId, LocationId, Money, OwnerId, OwnershipId, Percentage,
    PlacementId, RateTypeId,
};
use domain_yard::{
    ChargeType, ExtraCharge, Horse, Location, Owner, OwnershipRecord, Placement, RateType,
};

use crate::error::DatabaseError;

pub(crate) fn parse_currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_str(code).map_err(DatabaseError::corrupt)
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct OwnerRow {
    pub owner_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl OwnerRow {
    pub fn into_domain(self) -> Owner {
        Owner {
            id: OwnerId::from(self.owner_id),
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct HorseRow {
    pub horse_id: Uuid,
    pub name: String,
    pub breed: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
}

impl HorseRow {
    pub fn into_domain(self) -> Horse {
        Horse {
            id: HorseId::from(self.horse_id),
            name: self.name,
            breed: self.breed,
            date_of_birth: self.date_of_birth,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RateTypeRow {
    pub rate_type_id: Uuid,
    pub name: String,
    pub daily_rate: Decimal,
    pub currency: String,
}

impl RateTypeRow {
    pub fn into_domain(self) -> Result<RateType, DatabaseError> {
        Ok(RateType {
            id: RateTypeId::from(self.rate_type_id),
            name: self.name,
            daily_rate: Money::new(self.daily_rate, parse_currency(&self.currency)?),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OwnershipRow {
    pub ownership_id: Uuid,
    pub horse_id: Uuid,
    pub owner_id: Uuid,
    pub share: Decimal,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl OwnershipRow {
    pub fn into_domain(self) -> Result<OwnershipRecord, DatabaseError> {
        Ok(OwnershipRecord {
            id: OwnershipId::from(self.ownership_id),
            horse_id: HorseId::from(self.horse_id),
            owner_id: OwnerId::from(self.owner_id),
            share: Percentage::new(self.share).map_err(DatabaseError::corrupt)?,
            effective_from: self.effective_from,
            effective_to: self.effective_to,
        })
    }
}

/// A placement joined with its rate type
#[derive(Debug, Clone, FromRow)]
pub struct PlacementRow {
    pub placement_id: Uuid,
    pub horse_id: Uuid,
    pub owner_id: Uuid,
    pub location_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub rate_type_id: Uuid,
    pub rate_name: String,
    pub daily_rate: Decimal,
    pub currency: String,
}

impl PlacementRow {
    pub fn into_domain(self) -> Result<Placement, DatabaseError> {
        Ok(Placement {
            id: PlacementId::from(self.placement_id),
            horse_id: HorseId::from(self.horse_id),
            owner_id: OwnerId::from(self.owner_id),
            location_id: LocationId::from(self.location_id),
            rate_type: RateType {
                id: RateTypeId::from(self.rate_type_id),
                name: self.rate_name,
                daily_rate: Money::new(self.daily_rate, parse_currency(&self.currency)?),
            },
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ExtraChargeRow {
    pub extra_charge_id: Uuid,
    pub horse_id: Uuid,
    pub owner_id: Uuid,
    pub charge_type: String,
    pub charge_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub invoiced: bool,
    pub invoice_id: Option<Uuid>,
    pub split_by_ownership: bool,
}

impl ExtraChargeRow {
    pub fn into_domain(self) -> Result<ExtraCharge, DatabaseError> {
        Ok(ExtraCharge {
            id: ExtraChargeId::from(self.extra_charge_id),
            horse_id: HorseId::from(self.horse_id),
            owner_id: OwnerId::from(self.owner_id),
            charge_type: ChargeType::from_str(&self.charge_type).map_err(DatabaseError::corrupt)?,
            date: self.charge_date,
            description: self.description,
            amount: Money::new(self.amount, parse_currency(&self.currency)?),
            invoiced: self.invoiced,
            invoice_id: self.invoice_id.map(Into::into),
            split_by_ownership: self.split_by_ownership,
        })
    }
}

fn collect<R, T>(rows: Vec<R>, convert: fn(R) -> Result<T, DatabaseError>) -> Result<Vec<T>, DatabaseError> {
    rows.into_iter().map(convert).collect()
}

const PLACEMENT_SELECT: &str = r#"
    SELECT p.placement_id, p.horse_id, p.owner_id, p.location_id, p.start_date, p.end_date,
           r.rate_type_id, r.name AS rate_name, r.daily_rate, r.currency
    FROM placements p
    JOIN rate_types r ON r.rate_type_id = p.rate_type_id
"#;

const OWNERSHIP_COLUMNS: &str =
    "ownership_id, horse_id, owner_id, share, effective_from, effective_to";

const CHARGE_COLUMNS: &str = "extra_charge_id, horse_id, owner_id, charge_type, charge_date, \
     description, amount, currency, invoiced, invoice_id, split_by_ownership";

// ============================================================================
// Existence and locks
// ============================================================================

/// Locks the horse row, serializing register writes for that horse
pub async fn lock_horse(conn: &mut PgConnection, horse: HorseId) -> Result<(), DatabaseError> {
    sqlx::query_scalar::<_, Uuid>("SELECT horse_id FROM horses WHERE horse_id = $1 FOR UPDATE")
        .bind(Uuid::from(horse))
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| DatabaseError::not_found("Horse", horse))
}

/// Locks the owner row until the transaction ends
pub async fn lock_owner(conn: &mut PgConnection, owner: OwnerId) -> Result<(), DatabaseError> {
    sqlx::query_scalar::<_, Uuid>("SELECT owner_id FROM owners WHERE owner_id = $1 FOR UPDATE")
        .bind(Uuid::from(owner))
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| DatabaseError::not_found("Owner", owner))
}

pub async fn ensure_owner(conn: &mut PgConnection, owner: OwnerId) -> Result<(), DatabaseError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM owners WHERE owner_id = $1)")
        .bind(Uuid::from(owner))
        .fetch_one(&mut *conn)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(DatabaseError::not_found("Owner", owner))
    }
}

pub async fn ensure_location(conn: &mut PgConnection, location: LocationId) -> Result<(), DatabaseError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM locations WHERE location_id = $1)")
            .bind(Uuid::from(location))
            .fetch_one(&mut *conn)
            .await?;
    if exists {
        Ok(())
    } else {
        Err(DatabaseError::not_found("Location", location))
    }
}

// ============================================================================
// Owners, horses, locations and rate types
// ============================================================================

pub async fn insert_owner(conn: &mut PgConnection, owner: &Owner) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO owners (owner_id, name, email, phone, address) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::from(owner.id))
    .bind(&owner.name)
    .bind(&owner.email)
    .bind(&owner.phone)
    .bind(&owner.address)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_owner(conn: &mut PgConnection, id: OwnerId) -> Result<Owner, DatabaseError> {
    sqlx::query_as::<_, OwnerRow>(
        "SELECT owner_id, name, email, phone, address FROM owners WHERE owner_id = $1",
    )
    .bind(Uuid::from(id))
    .fetch_optional(&mut *conn)
    .await?
    .map(OwnerRow::into_domain)
    .ok_or_else(|| DatabaseError::not_found("Owner", id))
}

pub async fn insert_horse(conn: &mut PgConnection, horse: &Horse) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO horses (horse_id, name, breed, date_of_birth, is_active)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::from(horse.id))
    .bind(&horse.name)
    .bind(&horse.breed)
    .bind(horse.date_of_birth)
    .bind(horse.is_active)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_horse(conn: &mut PgConnection, id: HorseId) -> Result<Horse, DatabaseError> {
    sqlx::query_as::<_, HorseRow>(
        "SELECT horse_id, name, breed, date_of_birth, is_active FROM horses WHERE horse_id = $1",
    )
    .bind(Uuid::from(id))
    .fetch_optional(&mut *conn)
    .await?
    .map(HorseRow::into_domain)
    .ok_or_else(|| DatabaseError::not_found("Horse", id))
}

pub async fn insert_location(conn: &mut PgConnection, location: &Location) -> Result<(), DatabaseError> {
    sqlx::query("INSERT INTO locations (location_id, name) VALUES ($1, $2)")
        .bind(Uuid::from(location.id))
        .bind(&location.name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn insert_rate_type(conn: &mut PgConnection, rate_type: &RateType) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO rate_types (rate_type_id, name, daily_rate, currency) VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::from(rate_type.id))
    .bind(&rate_type.name)
    .bind(rate_type.daily_rate.amount())
    .bind(rate_type.daily_rate.currency().code())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_rate_type(conn: &mut PgConnection, id: RateTypeId) -> Result<RateType, DatabaseError> {
    sqlx::query_as::<_, RateTypeRow>(
        "SELECT rate_type_id, name, daily_rate, currency FROM rate_types WHERE rate_type_id = $1",
    )
    .bind(Uuid::from(id))
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("RateType", id))?
    .into_domain()
}

/// Changes the rate; placements read it through the join from now on
pub async fn update_daily_rate(
    conn: &mut PgConnection,
    id: RateTypeId,
    daily_rate: &Money,
) -> Result<RateType, DatabaseError> {
    sqlx::query_as::<_, RateTypeRow>(
        r#"
        UPDATE rate_types SET daily_rate = $2, currency = $3
        WHERE rate_type_id = $1
        RETURNING rate_type_id, name, daily_rate, currency
        "#,
    )
    .bind(Uuid::from(id))
    .bind(daily_rate.amount())
    .bind(daily_rate.currency().code())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("RateType", id))?
    .into_domain()
}

// ============================================================================
// Ownership records
// ============================================================================

pub async fn ownerships_for_horses(
    conn: &mut PgConnection,
    horses: &[HorseId],
) -> Result<Vec<OwnershipRecord>, DatabaseError> {
    let ids: Vec<Uuid> = horses.iter().map(|h| Uuid::from(*h)).collect();
    let sql = format!(
        "SELECT {OWNERSHIP_COLUMNS} FROM ownership_records WHERE horse_id = ANY($1) \
         ORDER BY horse_id, effective_from"
    );
    let rows = sqlx::query_as::<_, OwnershipRow>(&sql)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    collect(rows, OwnershipRow::into_domain)
}

pub async fn get_ownership(conn: &mut PgConnection, id: OwnershipId) -> Result<OwnershipRecord, DatabaseError> {
    let sql = format!("SELECT {OWNERSHIP_COLUMNS} FROM ownership_records WHERE ownership_id = $1");
    sqlx::query_as::<_, OwnershipRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("OwnershipRecord", id))?
        .into_domain()
}

pub async fn insert_ownership(conn: &mut PgConnection, record: &OwnershipRecord) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO ownership_records (ownership_id, horse_id, owner_id, share, effective_from, effective_to)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::from(record.id))
    .bind(Uuid::from(record.horse_id))
    .bind(Uuid::from(record.owner_id))
    .bind(record.share.value())
    .bind(record.effective_from)
    .bind(record.effective_to)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn set_ownership_end(
    conn: &mut PgConnection,
    id: OwnershipId,
    effective_to: Option<NaiveDate>,
) -> Result<(), DatabaseError> {
    sqlx::query("UPDATE ownership_records SET effective_to = $2 WHERE ownership_id = $1")
        .bind(Uuid::from(id))
        .bind(effective_to)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ============================================================================
// Placements
// ============================================================================

pub async fn placements_for_horses(
    conn: &mut PgConnection,
    horses: &[HorseId],
) -> Result<Vec<Placement>, DatabaseError> {
    let ids: Vec<Uuid> = horses.iter().map(|h| Uuid::from(*h)).collect();
    let sql = format!("{PLACEMENT_SELECT} WHERE p.horse_id = ANY($1) ORDER BY p.horse_id, p.start_date");
    let rows = sqlx::query_as::<_, PlacementRow>(&sql)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    collect(rows, PlacementRow::into_domain)
}

/// Placements active on at least one day of `[start, end]`
pub async fn placements_between(
    conn: &mut PgConnection,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Placement>, DatabaseError> {
    let sql = format!(
        "{PLACEMENT_SELECT} WHERE p.start_date <= $2 AND (p.end_date IS NULL OR p.end_date >= $1)"
    );
    let rows = sqlx::query_as::<_, PlacementRow>(&sql)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await?;
    collect(rows, PlacementRow::into_domain)
}

pub async fn get_placement(conn: &mut PgConnection, id: PlacementId) -> Result<Placement, DatabaseError> {
    let sql = format!("{PLACEMENT_SELECT} WHERE p.placement_id = $1");
    sqlx::query_as::<_, PlacementRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Placement", id))?
        .into_domain()
}

pub async fn insert_placement(conn: &mut PgConnection, placement: &Placement) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO placements (placement_id, horse_id, owner_id, location_id, rate_type_id, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::from(placement.id))
    .bind(Uuid::from(placement.horse_id))
    .bind(Uuid::from(placement.owner_id))
    .bind(Uuid::from(placement.location_id))
    .bind(Uuid::from(placement.rate_type.id))
    .bind(placement.start_date)
    .bind(placement.end_date)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn set_placement_end(
    conn: &mut PgConnection,
    id: PlacementId,
    end_date: Option<NaiveDate>,
) -> Result<(), DatabaseError> {
    sqlx::query("UPDATE placements SET end_date = $2 WHERE placement_id = $1")
        .bind(Uuid::from(id))
        .bind(end_date)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ============================================================================
// Extra charges
// ============================================================================

pub async fn insert_extra_charge(conn: &mut PgConnection, charge: &ExtraCharge) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO extra_charges (
            extra_charge_id, horse_id, owner_id, charge_type, charge_date, description,
            amount, currency, invoiced, invoice_id, split_by_ownership
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(Uuid::from(charge.id))
    .bind(Uuid::from(charge.horse_id))
    .bind(Uuid::from(charge.owner_id))
    .bind(charge.charge_type.as_str())
    .bind(charge.date)
    .bind(&charge.description)
    .bind(charge.amount.amount())
    .bind(charge.amount.currency().code())
    .bind(charge.invoiced)
    .bind(charge.invoice_id.map(Uuid::from))
    .bind(charge.split_by_ownership)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Fetches a charge, optionally locking it for the rest of the transaction
pub async fn get_extra_charge(
    conn: &mut PgConnection,
    id: ExtraChargeId,
    for_update: bool,
) -> Result<ExtraCharge, DatabaseError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {CHARGE_COLUMNS} FROM extra_charges WHERE extra_charge_id = $1{lock}");
    sqlx::query_as::<_, ExtraChargeRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("ExtraCharge", id))?
        .into_domain()
}

pub async fn update_charge_amount(
    conn: &mut PgConnection,
    id: ExtraChargeId,
    amount: &Money,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "UPDATE extra_charges SET amount = $2, currency = $3 WHERE extra_charge_id = $1 AND NOT invoiced",
    )
    .bind(Uuid::from(id))
    .bind(amount.amount())
    .bind(amount.currency().code())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Unbilled charges dated on or before `period_end`: `owner`'s direct
/// charges and split charges on `horses`
pub async fn unbilled_charges_for_owner(
    conn: &mut PgConnection,
    owner: OwnerId,
    horses: &[HorseId],
    period_end: NaiveDate,
    for_update: bool,
) -> Result<Vec<ExtraCharge>, DatabaseError> {
    let ids: Vec<Uuid> = horses.iter().map(|h| Uuid::from(*h)).collect();
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!(
        r#"
        SELECT {CHARGE_COLUMNS} FROM extra_charges
        WHERE NOT invoiced
          AND charge_date <= $2
          AND ((NOT split_by_ownership AND owner_id = $1)
               OR (split_by_ownership AND horse_id = ANY($3)))
        ORDER BY charge_date, extra_charge_id{lock}
        "#
    );
    let rows = sqlx::query_as::<_, ExtraChargeRow>(&sql)
        .bind(Uuid::from(owner))
        .bind(period_end)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    collect(rows, ExtraChargeRow::into_domain)
}

/// Every unbilled charge dated on or before `period_end`
pub async fn unbilled_charges_until(
    conn: &mut PgConnection,
    period_end: NaiveDate,
) -> Result<Vec<ExtraCharge>, DatabaseError> {
    let sql = format!(
        "SELECT {CHARGE_COLUMNS} FROM extra_charges WHERE NOT invoiced AND charge_date <= $1"
    );
    let rows = sqlx::query_as::<_, ExtraChargeRow>(&sql)
        .bind(period_end)
        .fetch_all(&mut *conn)
        .await?;
    collect(rows, ExtraChargeRow::into_domain)
}

/// Sets `invoiced`; fails with NotFound when the charge is missing or was
/// already settled by someone else
pub async fn mark_charge_invoiced(
    conn: &mut PgConnection,
    charge: ExtraChargeId,
    invoice: core_kernel::InvoiceId,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE extra_charges SET invoiced = TRUE, invoice_id = $2
        WHERE extra_charge_id = $1 AND NOT invoiced
        "#,
    )
    .bind(Uuid::from(charge))
    .bind(Uuid::from(invoice))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Unbilled ExtraCharge", charge));
    }
    Ok(())
}

/// Clears `invoiced` and the settling invoice on each charge
pub async fn release_charges(conn: &mut PgConnection, charges: &[ExtraChargeId]) -> Result<(), DatabaseError> {
    if charges.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = charges.iter().map(|c| Uuid::from(*c)).collect();
    sqlx::query(
        r#"
        UPDATE extra_charges SET invoiced = FALSE, invoice_id = NULL
        WHERE extra_charge_id = ANY($1) AND invoiced
        "#,
    )
    .bind(ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Horses `owner` holds a share of, has placed, or has charges against
pub async fn horses_involving(conn: &mut PgConnection, owner: OwnerId) -> Result<Vec<HorseId>, DatabaseError> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT horse_id FROM ownership_records WHERE owner_id = $1
        UNION
        SELECT horse_id FROM placements WHERE owner_id = $1
        UNION
        SELECT horse_id FROM extra_charges WHERE owner_id = $1
        "#,
    )
    .bind(Uuid::from(owner))
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids.into_iter().map(HorseId::from).collect())
}
