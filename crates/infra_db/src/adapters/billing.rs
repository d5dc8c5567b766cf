//! PostgreSQL yard and billing adapter
//!
//! `PostgresBillingStore` implements both [`YardPort`] and [`BillingStore`]
//! on one pool. Register writes that need a validation read run in a
//! transaction holding the horse row lock, so two concurrent writers for the
//! same horse validate against each other's results. Exclusion constraints
//! in the schema back the overlap rules up.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PostgresBillingStore};
//! use domain_billing::InvoiceGenerator;
//! use std::sync::Arc;
//!
//! let pool = create_pool(DatabaseConfig::new(url)).await?;
//! let generator = InvoiceGenerator::new(Arc::new(PostgresBillingStore::new(pool)));
//! ```

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, DateRange, DomainPort, ExtraChargeId, HealthCheckResult, HealthCheckable,
    HorseId, InvoiceId, LocationId, Money, OwnerId, OwnershipId, PlacementId, PortError,
    RateTypeId,
};
use domain_billing::{
    sources::candidate_owners, AllocatedNumber, BillingSettings, BillingStore,
    BillingTransaction, ChargeSources, Invoice, InvoiceStatus,
};
use domain_yard::{
    plan_move, validate_ownership, validate_placement, ExtraCharge, Horse, Location, MoveHorse,
    NewExtraCharge, NewHorse, NewOwner, NewOwnership, NewPlacement, NewRateType, Owner,
    OwnershipRecord, Placement, RateType, YardError, YardPort,
};

use crate::error::{db_to_port_error, DatabaseError};
use crate::repositories::{invoices, yard};

/// PostgreSQL-backed yard register and billing store
#[derive(Debug, Clone)]
pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin_tx(&self) -> Result<Transaction<'static, Postgres>, PortError> {
        self.pool
            .begin()
            .await
            .map_err(|e| db_to_port_error(e.into()))
    }
}

fn port(e: DatabaseError) -> YardError {
    YardError::Port(db_to_port_error(e))
}

async fn commit_tx(tx: Transaction<'static, Postgres>) -> Result<(), PortError> {
    tx.commit().await.map_err(|e| db_to_port_error(e.into()))
}

/// Builds one owner's charge sources, locking unbilled charges when asked
async fn owner_sources(
    conn: &mut PgConnection,
    owner: OwnerId,
    period_end: NaiveDate,
    lock_charges: bool,
) -> Result<ChargeSources, DatabaseError> {
    yard::ensure_owner(conn, owner).await?;
    let settings = invoices::get_settings(conn).await?;

    let horses = yard::horses_involving(conn, owner).await?;
    let ownerships = yard::ownerships_for_horses(conn, &horses).await?;
    let placements = yard::placements_for_horses(conn, &horses).await?;
    let extra_charges =
        yard::unbilled_charges_for_owner(conn, owner, &horses, period_end, lock_charges).await?;

    let split: Vec<ExtraChargeId> = extra_charges
        .iter()
        .filter(|c| c.split_by_ownership)
        .map(|c| c.id)
        .collect();
    let billed_owners = invoices::billed_owners(conn, &split).await?;

    debug!(
        owner = %owner,
        horses = horses.len(),
        charges = extra_charges.len(),
        "Loaded charge sources"
    );
    Ok(ChargeSources {
        owner_id: owner,
        currency: settings.currency,
        ownerships,
        placements,
        extra_charges,
        billed_owners,
    })
}

impl DomainPort for PostgresBillingStore {}

#[async_trait]
impl HealthCheckable for PostgresBillingStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: "postgres-billing-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: "postgres-billing-store".to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl YardPort for PostgresBillingStore {
    #[instrument(skip(self, request))]
    async fn create_owner(&self, request: NewOwner) -> Result<Owner, YardError> {
        if request.name.trim().is_empty() {
            return Err(YardError::invalid("Owner name is required"));
        }
        let owner = Owner {
            id: OwnerId::new(),
            name: request.name,
            email: request.email,
            phone: request.phone,
            address: request.address,
        };
        let mut conn = self.pool.acquire().await.map_err(|e| port(e.into()))?;
        yard::insert_owner(&mut conn, &owner).await.map_err(port)?;
        Ok(owner)
    }

    async fn get_owner(&self, id: OwnerId) -> Result<Owner, YardError> {
        let mut conn = self.pool.acquire().await.map_err(|e| port(e.into()))?;
        yard::get_owner(&mut conn, id).await.map_err(port)
    }

    #[instrument(skip(self, request))]
    async fn create_horse(&self, request: NewHorse) -> Result<Horse, YardError> {
        let horse = Horse {
            id: HorseId::new(),
            name: request.name,
            breed: request.breed,
            date_of_birth: request.date_of_birth,
            is_active: true,
        };
        let mut conn = self.pool.acquire().await.map_err(|e| port(e.into()))?;
        yard::insert_horse(&mut conn, &horse).await.map_err(port)?;
        Ok(horse)
    }

    async fn create_location(&self, name: String) -> Result<Location, YardError> {
        let location = Location {
            id: LocationId::new(),
            name,
        };
        let mut conn = self.pool.acquire().await.map_err(|e| port(e.into()))?;
        yard::insert_location(&mut conn, &location).await.map_err(port)?;
        Ok(location)
    }

    async fn create_rate_type(&self, request: NewRateType) -> Result<RateType, YardError> {
        if request.daily_rate.is_negative() {
            return Err(YardError::invalid("Daily rate must not be negative"));
        }
        let rate_type = RateType {
            id: RateTypeId::new(),
            name: request.name,
            daily_rate: request.daily_rate,
        };
        let mut conn = self.pool.acquire().await.map_err(|e| port(e.into()))?;
        yard::insert_rate_type(&mut conn, &rate_type).await.map_err(port)?;
        Ok(rate_type)
    }

    #[instrument(skip(self))]
    async fn update_daily_rate(&self, id: RateTypeId, daily_rate: Money) -> Result<RateType, YardError> {
        if daily_rate.is_negative() {
            return Err(YardError::invalid("Daily rate must not be negative"));
        }
        let mut conn = self.pool.acquire().await.map_err(|e| port(e.into()))?;
        yard::update_daily_rate(&mut conn, id, &daily_rate).await.map_err(port)
    }

    #[instrument(skip(self, request), fields(horse = %request.horse_id, owner = %request.owner_id))]
    async fn record_ownership(&self, request: NewOwnership) -> Result<OwnershipRecord, YardError> {
        let mut tx = self.begin_tx().await?;
        yard::lock_horse(&mut tx, request.horse_id).await.map_err(port)?;
        yard::ensure_owner(&mut tx, request.owner_id).await.map_err(port)?;

        let record = request.into_record();
        let existing = yard::ownerships_for_horses(&mut tx, &[record.horse_id])
            .await
            .map_err(port)?;
        validate_ownership(&existing, &record)?;
        yard::insert_ownership(&mut tx, &record).await.map_err(port)?;

        commit_tx(tx).await?;
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn end_ownership(&self, id: OwnershipId, effective_to: NaiveDate) -> Result<OwnershipRecord, YardError> {
        let mut tx = self.begin_tx().await?;
        let mut record = yard::get_ownership(&mut tx, id).await.map_err(port)?;
        yard::lock_horse(&mut tx, record.horse_id).await.map_err(port)?;

        record.effective_to = Some(effective_to);
        let existing = yard::ownerships_for_horses(&mut tx, &[record.horse_id])
            .await
            .map_err(port)?;
        validate_ownership(&existing, &record)?;
        yard::set_ownership_end(&mut tx, id, record.effective_to)
            .await
            .map_err(port)?;

        commit_tx(tx).await?;
        Ok(record)
    }

    async fn ownerships_for_horse(&self, horse: HorseId) -> Result<Vec<OwnershipRecord>, YardError> {
        let mut conn = self.pool.acquire().await.map_err(|e| port(e.into()))?;
        let mut records = yard::ownerships_for_horses(&mut conn, &[horse])
            .await
            .map_err(port)?;
        records.sort_by_key(|r| r.effective_from);
        Ok(records)
    }

    #[instrument(skip(self, request), fields(horse = %request.horse_id))]
    async fn record_placement(&self, request: NewPlacement) -> Result<Placement, YardError> {
        let mut tx = self.begin_tx().await?;
        yard::lock_horse(&mut tx, request.horse_id).await.map_err(port)?;
        yard::ensure_owner(&mut tx, request.owner_id).await.map_err(port)?;
        yard::ensure_location(&mut tx, request.location_id).await.map_err(port)?;

        let rate_type = yard::get_rate_type(&mut tx, request.rate_type_id)
            .await
            .map_err(port)?;
        let placement = request.into_placement(rate_type);
        let existing = yard::placements_for_horses(&mut tx, &[placement.horse_id])
            .await
            .map_err(port)?;
        validate_placement(&existing, &placement)?;
        yard::insert_placement(&mut tx, &placement).await.map_err(port)?;

        commit_tx(tx).await?;
        Ok(placement)
    }

    #[instrument(skip(self))]
    async fn end_placement(&self, id: PlacementId, end_date: NaiveDate) -> Result<Placement, YardError> {
        let mut tx = self.begin_tx().await?;
        let mut placement = yard::get_placement(&mut tx, id).await.map_err(port)?;
        yard::lock_horse(&mut tx, placement.horse_id).await.map_err(port)?;

        placement.end_date = Some(end_date);
        let existing = yard::placements_for_horses(&mut tx, &[placement.horse_id])
            .await
            .map_err(port)?;
        validate_placement(&existing, &placement)?;
        yard::set_placement_end(&mut tx, id, placement.end_date)
            .await
            .map_err(port)?;

        commit_tx(tx).await?;
        Ok(placement)
    }

    #[instrument(skip(self, request), fields(horse = %request.horse_id, date = %request.move_date))]
    async fn move_horse(&self, request: MoveHorse) -> Result<Placement, YardError> {
        let mut tx = self.begin_tx().await?;
        yard::lock_horse(&mut tx, request.horse_id).await.map_err(port)?;
        yard::ensure_location(&mut tx, request.location_id).await.map_err(port)?;
        if let Some(owner) = request.owner_id {
            yard::ensure_owner(&mut tx, owner).await.map_err(port)?;
        }
        let rate_type = match request.rate_type_id {
            Some(id) => Some(yard::get_rate_type(&mut tx, id).await.map_err(port)?),
            None => None,
        };

        let mut placements = yard::placements_for_horses(&mut tx, &[request.horse_id])
            .await
            .map_err(port)?;
        let current = placements.iter().find(|p| p.is_current()).cloned();
        let plan = plan_move(
            current.as_ref(),
            request.horse_id,
            request.location_id,
            request.owner_id,
            rate_type,
            request.move_date,
        )?;

        if let Some((ended, end)) = plan.ended {
            if let Some(p) = placements.iter_mut().find(|p| p.id == ended) {
                p.end_date = Some(end);
            }
            validate_placement(&placements, &plan.next)?;
            yard::set_placement_end(&mut tx, ended, Some(end)).await.map_err(port)?;
        } else {
            validate_placement(&placements, &plan.next)?;
        }
        yard::insert_placement(&mut tx, &plan.next).await.map_err(port)?;

        commit_tx(tx).await?;
        Ok(plan.next)
    }

    async fn placements_for_horse(&self, horse: HorseId) -> Result<Vec<Placement>, YardError> {
        let mut conn = self.pool.acquire().await.map_err(|e| port(e.into()))?;
        yard::placements_for_horses(&mut conn, &[horse]).await.map_err(port)
    }

    #[instrument(skip(self, request), fields(horse = %request.horse_id, owner = %request.owner_id))]
    async fn record_extra_charge(&self, request: NewExtraCharge) -> Result<ExtraCharge, YardError> {
        let charge = request.into_charge()?;
        let mut conn = self.pool.acquire().await.map_err(|e| port(e.into()))?;
        yard::get_horse(&mut conn, charge.horse_id).await.map_err(port)?;
        yard::ensure_owner(&mut conn, charge.owner_id).await.map_err(port)?;
        yard::insert_extra_charge(&mut conn, &charge).await.map_err(port)?;
        Ok(charge)
    }

    #[instrument(skip(self))]
    async fn update_extra_charge_amount(&self, id: ExtraChargeId, amount: Money) -> Result<ExtraCharge, YardError> {
        let mut tx = self.begin_tx().await?;
        let mut charge = yard::get_extra_charge(&mut tx, id, true).await.map_err(port)?;
        charge.amend_amount(amount)?;
        yard::update_charge_amount(&mut tx, id, &charge.amount)
            .await
            .map_err(port)?;
        commit_tx(tx).await?;
        Ok(charge)
    }

    async fn get_extra_charge(&self, id: ExtraChargeId) -> Result<ExtraCharge, YardError> {
        let mut conn = self.pool.acquire().await.map_err(|e| port(e.into()))?;
        yard::get_extra_charge(&mut conn, id, false).await.map_err(port)
    }
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, PortError> {
        let tx = self.begin_tx().await?;
        Ok(Box::new(PgBillingTransaction { tx: Some(tx) }))
    }

    async fn settings(&self) -> Result<BillingSettings, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(invoices::get_settings(&mut conn).await?)
    }

    #[instrument(skip(self), fields(period = %period))]
    async fn billing_candidates(&self, period: &DateRange) -> Result<Vec<OwnerId>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        let placements = yard::placements_between(&mut conn, period.start, period.end).await?;
        let charges = yard::unbilled_charges_until(&mut conn, period.end).await?;

        let mut horses: Vec<HorseId> = placements
            .iter()
            .map(|p| p.horse_id)
            .chain(charges.iter().map(|c| c.horse_id))
            .collect();
        horses.sort();
        horses.dedup();
        let ownerships = yard::ownerships_for_horses(&mut conn, &horses).await?;

        Ok(candidate_owners(&ownerships, &placements, &charges, period))
    }

    async fn load_owner_sources(&self, owner: OwnerId, period_end: NaiveDate) -> Result<ChargeSources, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(owner_sources(&mut conn, owner, period_end, false).await?)
    }

    async fn find_overlapping_invoice(
        &self,
        owner: OwnerId,
        period: &DateRange,
    ) -> Result<Option<Invoice>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(invoices::find_overlapping_invoice(&mut conn, owner, period.start, period.end).await?)
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(invoices::get_invoice(&mut conn, id).await?)
    }

    async fn invoices_for_owner(&self, owner: OwnerId) -> Result<Vec<Invoice>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(invoices::invoices_for_owner(&mut conn, owner).await?)
    }

    #[instrument(skip(self, invoice), fields(invoice = %invoice.invoice_number, to = %invoice.status))]
    async fn save_invoice_status(&self, invoice: &Invoice, from: InvoiceStatus) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(invoices::update_invoice_status(&mut conn, invoice, from).await?)
    }

    async fn invoices_past_due(&self, today: NaiveDate) -> Result<Vec<Invoice>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(invoices::invoices_past_due(&mut conn, today).await?)
    }
}

/// One invoice creation or cancellation transaction
///
/// Dropping it before `commit` rolls everything back, including the
/// invoice number it took.
pub struct PgBillingTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgBillingTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection, PortError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| PortError::internal("Billing transaction already committed"))
    }
}

#[async_trait]
impl BillingTransaction for PgBillingTransaction {
    async fn lock_owner(&mut self, owner: OwnerId) -> Result<(), PortError> {
        Ok(yard::lock_owner(self.conn()?, owner).await?)
    }

    async fn find_overlapping_invoice(
        &mut self,
        owner: OwnerId,
        period: &DateRange,
    ) -> Result<Option<Invoice>, PortError> {
        Ok(invoices::find_overlapping_invoice(self.conn()?, owner, period.start, period.end).await?)
    }

    async fn allocate_invoice_number(&mut self) -> Result<AllocatedNumber, PortError> {
        Ok(invoices::allocate_invoice_number(self.conn()?).await?)
    }

    async fn load_owner_sources(&mut self, owner: OwnerId, period_end: NaiveDate) -> Result<ChargeSources, PortError> {
        Ok(owner_sources(self.conn()?, owner, period_end, true).await?)
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        Ok(invoices::insert_invoice(self.conn()?, invoice).await?)
    }

    async fn mark_charge_invoiced(&mut self, charge: ExtraChargeId, invoice: InvoiceId) -> Result<(), PortError> {
        Ok(yard::mark_charge_invoiced(self.conn()?, charge, invoice).await?)
    }

    async fn save_invoice_status(&mut self, invoice: &Invoice, from: InvoiceStatus) -> Result<(), PortError> {
        Ok(invoices::update_invoice_status(self.conn()?, invoice, from).await?)
    }

    async fn release_charges(&mut self, charges: &[ExtraChargeId]) -> Result<(), PortError> {
        Ok(yard::release_charges(self.conn()?, charges).await?)
    }

    async fn commit(&mut self) -> Result<(), PortError> {
        match self.tx.take() {
            Some(tx) => commit_tx(tx).await,
            None => Err(PortError::internal("Billing transaction already committed")),
        }
    }
}
