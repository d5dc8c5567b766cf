//! Invoice, line item and billing settings queries
//!
//! Invoices are written once with all their line items; afterwards only the
//! status columns change. The settings singleton holds the invoice number
//! counter, advanced with a single `UPDATE ... RETURNING`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{
    ExtraChargeId, HorseId, InvoiceId, LineItemId, Money, OwnerId, OwnershipId, Percentage,
    PlacementId,
};
use domain_billing::{
    AllocatedNumber, BillingSettings, Invoice, InvoiceLineItem, InvoiceStatus, LineSource,
    LineType,
};

use crate::error::DatabaseError;
use crate::repositories::yard::parse_currency;

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct SettingsRow {
    pub invoice_prefix: String,
    pub next_invoice_number: i64,
    pub default_payment_terms_days: i32,
    pub currency: String,
}

impl SettingsRow {
    pub fn into_domain(self) -> Result<BillingSettings, DatabaseError> {
        Ok(BillingSettings {
            invoice_prefix: self.invoice_prefix,
            next_invoice_number: self.next_invoice_number,
            default_payment_terms_days: self.default_payment_terms_days,
            currency: parse_currency(&self.currency)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub invoice_id: Uuid,
    pub owner_id: Uuid,
    pub invoice_number: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub currency: String,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub status: String,
    pub payment_terms_days: i32,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl InvoiceRow {
    fn into_domain(self, line_items: Vec<InvoiceLineItem>) -> Result<Invoice, DatabaseError> {
        let currency = parse_currency(&self.currency)?;
        Ok(Invoice {
            id: InvoiceId::from(self.invoice_id),
            owner_id: OwnerId::from(self.owner_id),
            invoice_number: self.invoice_number,
            period_start: self.period_start,
            period_end: self.period_end,
            currency,
            subtotal: Money::new(self.subtotal, currency),
            total: Money::new(self.total, currency),
            status: InvoiceStatus::from_str(&self.status).map_err(DatabaseError::corrupt)?,
            payment_terms_days: self.payment_terms_days,
            due_date: self.due_date,
            notes: self.notes,
            created_at: self.created_at,
            sent_at: self.sent_at,
            paid_at: self.paid_at,
            cancelled_at: self.cancelled_at,
            line_items,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LineItemRow {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub horse_id: Option<Uuid>,
    pub placement_id: Option<Uuid>,
    pub extra_charge_id: Option<Uuid>,
    pub ownership_id: Option<Uuid>,
    pub line_type: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub ownership_percentage: Option<Decimal>,
    pub service_date: NaiveDate,
    pub position: i32,
}

impl LineItemRow {
    fn into_domain(self, currency: core_kernel::Currency) -> Result<InvoiceLineItem, DatabaseError> {
        let source = match (self.placement_id, self.extra_charge_id) {
            (Some(p), None) => LineSource::Placement(PlacementId::from(p)),
            (None, Some(c)) => LineSource::ExtraCharge(ExtraChargeId::from(c)),
            _ => {
                return Err(DatabaseError::corrupt(format!(
                    "Line item {} must reference exactly one source",
                    self.line_item_id
                )))
            }
        };
        let ownership_percentage = self
            .ownership_percentage
            .map(Percentage::new)
            .transpose()
            .map_err(DatabaseError::corrupt)?;

        Ok(InvoiceLineItem {
            id: LineItemId::from(self.line_item_id),
            invoice_id: InvoiceId::from(self.invoice_id),
            horse_id: self.horse_id.map(HorseId::from),
            source,
            ownership_id: self.ownership_id.map(OwnershipId::from),
            line_type: LineType::from_str(&self.line_type).map_err(DatabaseError::corrupt)?,
            description: self.description,
            quantity: self.quantity,
            unit_price: Money::new(self.unit_price, currency),
            line_total: Money::new(self.line_total, currency),
            ownership_percentage,
            service_date: self.service_date,
            position: self.position,
        })
    }
}

const INVOICE_COLUMNS: &str = "invoice_id, owner_id, invoice_number, period_start, period_end, \
     currency, subtotal, total, status, payment_terms_days, due_date, notes, created_at, \
     sent_at, paid_at, cancelled_at";

const LINE_ITEM_COLUMNS: &str = "line_item_id, invoice_id, horse_id, placement_id, \
     extra_charge_id, ownership_id, line_type, description, quantity, unit_price, line_total, \
     ownership_percentage, service_date, position";

// ============================================================================
// Settings and numbering
// ============================================================================

/// Creates the settings row with defaults if it is missing
async fn ensure_settings(conn: &mut PgConnection) -> Result<(), DatabaseError> {
    sqlx::query("INSERT INTO billing_settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn get_settings(conn: &mut PgConnection) -> Result<BillingSettings, DatabaseError> {
    ensure_settings(conn).await?;
    sqlx::query_as::<_, SettingsRow>(
        r#"
        SELECT invoice_prefix, next_invoice_number, default_payment_terms_days, currency
        FROM billing_settings WHERE id = 1
        "#,
    )
    .fetch_one(&mut *conn)
    .await?
    .into_domain()
}

/// Atomically takes the next invoice number
///
/// The row stays locked until the surrounding transaction ends, so two
/// transactions can never take the same number.
pub async fn allocate_invoice_number(conn: &mut PgConnection) -> Result<AllocatedNumber, DatabaseError> {
    ensure_settings(conn).await?;
    let mut taken = sqlx::query_as::<_, SettingsRow>(
        r#"
        UPDATE billing_settings
        SET next_invoice_number = next_invoice_number + 1
        WHERE id = 1
        RETURNING invoice_prefix, next_invoice_number - 1 AS next_invoice_number,
                  default_payment_terms_days, currency
        "#,
    )
    .fetch_one(&mut *conn)
    .await?
    .into_domain()?;
    Ok(taken.take_next_number())
}

// ============================================================================
// Invoices
// ============================================================================

async fn attach_line_items(
    conn: &mut PgConnection,
    rows: Vec<InvoiceRow>,
) -> Result<Vec<Invoice>, DatabaseError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = rows.iter().map(|r| r.invoice_id).collect();
    let sql = format!(
        "SELECT {LINE_ITEM_COLUMNS} FROM invoice_line_items WHERE invoice_id = ANY($1) \
         ORDER BY invoice_id, position"
    );
    let line_rows = sqlx::query_as::<_, LineItemRow>(&sql)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut by_invoice: HashMap<Uuid, Vec<LineItemRow>> = HashMap::new();
    for line in line_rows {
        by_invoice.entry(line.invoice_id).or_default().push(line);
    }

    rows.into_iter()
        .map(|row| {
            let currency = parse_currency(&row.currency)?;
            let lines = by_invoice
                .remove(&row.invoice_id)
                .unwrap_or_default()
                .into_iter()
                .map(|l| l.into_domain(currency))
                .collect::<Result<Vec<_>, _>>()?;
            row.into_domain(lines)
        })
        .collect()
}

pub async fn get_invoice(conn: &mut PgConnection, id: InvoiceId) -> Result<Invoice, DatabaseError> {
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1");
    let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_all(&mut *conn)
        .await?;
    attach_line_items(conn, rows)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| DatabaseError::not_found("Invoice", id))
}

/// The earliest non-cancelled invoice of `owner` sharing a day with the period
pub async fn find_overlapping_invoice(
    conn: &mut PgConnection,
    owner: OwnerId,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Option<Invoice>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT {INVOICE_COLUMNS} FROM invoices
        WHERE owner_id = $1 AND status <> 'cancelled'
          AND period_start <= $3 AND period_end >= $2
        ORDER BY period_start
        LIMIT 1
        "#
    );
    let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(Uuid::from(owner))
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await?;
    Ok(attach_line_items(conn, rows).await?.into_iter().next())
}

pub async fn invoices_for_owner(conn: &mut PgConnection, owner: OwnerId) -> Result<Vec<Invoice>, DatabaseError> {
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE owner_id = $1 ORDER BY period_start");
    let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(Uuid::from(owner))
        .fetch_all(&mut *conn)
        .await?;
    attach_line_items(conn, rows).await
}

/// Sent invoices whose due date is before `today`
pub async fn invoices_past_due(conn: &mut PgConnection, today: NaiveDate) -> Result<Vec<Invoice>, DatabaseError> {
    let sql = format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE status = 'sent' AND due_date < $1 \
         ORDER BY due_date, invoice_number"
    );
    let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(today)
        .fetch_all(&mut *conn)
        .await?;
    attach_line_items(conn, rows).await
}

/// Inserts the header and every line item
pub async fn insert_invoice(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO invoices (
            invoice_id, owner_id, invoice_number, period_start, period_end, currency,
            subtotal, total, status, payment_terms_days, due_date, notes, created_at,
            sent_at, paid_at, cancelled_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#,
    )
    .bind(Uuid::from(invoice.id))
    .bind(Uuid::from(invoice.owner_id))
    .bind(&invoice.invoice_number)
    .bind(invoice.period_start)
    .bind(invoice.period_end)
    .bind(invoice.currency.code())
    .bind(invoice.subtotal.amount())
    .bind(invoice.total.amount())
    .bind(invoice.status.as_str())
    .bind(invoice.payment_terms_days)
    .bind(invoice.due_date)
    .bind(&invoice.notes)
    .bind(invoice.created_at)
    .bind(invoice.sent_at)
    .bind(invoice.paid_at)
    .bind(invoice.cancelled_at)
    .execute(&mut *conn)
    .await?;

    for line in &invoice.line_items {
        sqlx::query(
            r#"
            INSERT INTO invoice_line_items (
                line_item_id, invoice_id, horse_id, placement_id, extra_charge_id, ownership_id,
                line_type, description, quantity, unit_price, line_total, ownership_percentage,
                service_date, position
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(Uuid::from(line.id))
        .bind(Uuid::from(line.invoice_id))
        .bind(line.horse_id.map(Uuid::from))
        .bind(line.source.placement_id().map(Uuid::from))
        .bind(line.source.extra_charge_id().map(Uuid::from))
        .bind(line.ownership_id.map(Uuid::from))
        .bind(line.line_type.as_str())
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price.amount())
        .bind(line.line_total.amount())
        .bind(line.ownership_percentage.map(|p| p.value()))
        .bind(line.service_date)
        .bind(line.position)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Writes status and lifecycle timestamps while the stored status is `from`
pub async fn update_invoice_status(
    conn: &mut PgConnection,
    invoice: &Invoice,
    from: InvoiceStatus,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET status = $2, sent_at = $3, paid_at = $4, cancelled_at = $5
        WHERE invoice_id = $1 AND status = $6
        "#,
    )
    .bind(Uuid::from(invoice.id))
    .bind(invoice.status.as_str())
    .bind(invoice.sent_at)
    .bind(invoice.paid_at)
    .bind(invoice.cancelled_at)
    .bind(from.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let current: Option<String> = sqlx::query_scalar("SELECT status FROM invoices WHERE invoice_id = $1")
        .bind(Uuid::from(invoice.id))
        .fetch_optional(&mut *conn)
        .await?;
    match current {
        None => Err(DatabaseError::not_found("Invoice", invoice.id)),
        Some(status) => Err(DatabaseError::StaleWrite(format!(
            "Invoice {} is {}, expected {}",
            invoice.invoice_number, status, from
        ))),
    }
}

/// For each charge, the owners already holding a line item for it on a
/// non-cancelled invoice
pub async fn billed_owners(
    conn: &mut PgConnection,
    charges: &[ExtraChargeId],
) -> Result<HashMap<ExtraChargeId, HashSet<OwnerId>>, DatabaseError> {
    let mut billed: HashMap<ExtraChargeId, HashSet<OwnerId>> = HashMap::new();
    if charges.is_empty() {
        return Ok(billed);
    }
    let ids: Vec<Uuid> = charges.iter().map(|c| Uuid::from(*c)).collect();
    let pairs = sqlx::query_as::<_, (Uuid, Uuid)>(
        r#"
        SELECT DISTINCT l.extra_charge_id, i.owner_id
        FROM invoice_line_items l
        JOIN invoices i ON i.invoice_id = l.invoice_id
        WHERE l.extra_charge_id = ANY($1) AND i.status <> 'cancelled'
        "#,
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    for (charge, owner) in pairs {
        billed
            .entry(ExtraChargeId::from(charge))
            .or_default()
            .insert(OwnerId::from(owner));
    }
    Ok(billed)
}
