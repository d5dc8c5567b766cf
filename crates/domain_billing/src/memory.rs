//! In-memory yard and billing store
//!
//! Implements [`YardPort`] and [`BillingStore`] over one shared state. A
//! billing transaction holds the state's async mutex for its whole
//! lifetime and works on a copy, which replaces the shared state on
//! commit. Dropping a transaction discards the copy.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::{
    AdapterHealth, DateRange, DomainPort, ExtraChargeId, HealthCheckResult, HealthCheckable,
    HorseId, InvoiceId, LocationId, Money, OwnerId, OwnershipId, PlacementId, PortError,
    RateTypeId,
};
use domain_yard::{
    plan_move, validate_ownership, validate_placement, ExtraCharge, Horse, Location, MoveHorse,
    NewExtraCharge, NewHorse, NewOwner, NewOwnership, NewPlacement, NewRateType, Owner,
    OwnershipRecord, Placement, RateType, YardError, YardPort,
};

use crate::invoice::{Invoice, InvoiceStatus};
use crate::numbering::{AllocatedNumber, BillingSettings};
use crate::ports::{BillingStore, BillingTransaction};
use crate::sources::{candidate_owners, horses_involving, unbilled_charges_for_owner, ChargeSources};

/// Everything the in-memory store holds
#[derive(Debug, Clone, Default)]
pub struct YardState {
    pub owners: HashMap<OwnerId, Owner>,
    pub horses: HashMap<HorseId, Horse>,
    pub locations: HashMap<LocationId, Location>,
    pub rate_types: HashMap<RateTypeId, RateType>,
    pub ownerships: Vec<OwnershipRecord>,
    pub placements: Vec<Placement>,
    pub extra_charges: Vec<ExtraCharge>,
    pub invoices: Vec<Invoice>,
    pub settings: BillingSettings,
}

impl YardState {
    fn owner_sources(&self, owner: OwnerId, period_end: NaiveDate) -> Result<ChargeSources, PortError> {
        if !self.owners.contains_key(&owner) {
            return Err(PortError::not_found("Owner", owner));
        }

        let horses = horses_involving(owner, &self.ownerships, &self.placements, &self.extra_charges);
        let extra_charges: Vec<ExtraCharge> =
            unbilled_charges_for_owner(owner, &horses, &self.extra_charges, period_end)
                .cloned()
                .collect();

        let mut billed_owners: HashMap<ExtraChargeId, HashSet<OwnerId>> = HashMap::new();
        for charge in extra_charges.iter().filter(|c| c.split_by_ownership) {
            let owners: HashSet<OwnerId> = self
                .invoices
                .iter()
                .filter(|i| i.status != InvoiceStatus::Cancelled)
                .filter(|i| i.extra_charge_ids().any(|id| id == charge.id))
                .map(|i| i.owner_id)
                .collect();
            if !owners.is_empty() {
                billed_owners.insert(charge.id, owners);
            }
        }

        Ok(ChargeSources {
            owner_id: owner,
            currency: self.settings.currency,
            ownerships: self
                .ownerships
                .iter()
                .filter(|r| horses.contains(&r.horse_id))
                .cloned()
                .collect(),
            placements: self
                .placements
                .iter()
                .filter(|p| horses.contains(&p.horse_id))
                .cloned()
                .collect(),
            extra_charges,
            billed_owners,
        })
    }

    fn overlapping_invoice(&self, owner: OwnerId, period: &DateRange) -> Option<Invoice> {
        self.invoices
            .iter()
            .filter(|i| i.owner_id == owner && i.blocks(period))
            .min_by_key(|i| i.period_start)
            .cloned()
    }

    fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        if self.overlapping_invoice(invoice.owner_id, &invoice.period()).is_some() {
            return Err(PortError::conflict(format!(
                "Invoice period {} overlaps an existing invoice of owner {}",
                invoice.period(),
                invoice.owner_id
            )));
        }
        if self.invoices.iter().any(|i| i.invoice_number == invoice.invoice_number) {
            return Err(PortError::conflict(format!(
                "Invoice number {} is already taken",
                invoice.invoice_number
            )));
        }
        self.invoices.push(invoice.clone());
        Ok(())
    }

    fn save_invoice_status(&mut self, invoice: &Invoice, from: InvoiceStatus) -> Result<(), PortError> {
        let stored = self
            .invoices
            .iter_mut()
            .find(|i| i.id == invoice.id)
            .ok_or_else(|| PortError::not_found("Invoice", invoice.id))?;
        if stored.status != from {
            return Err(PortError::conflict(format!(
                "Invoice {} is {}, expected {}",
                stored.invoice_number, stored.status, from
            )));
        }
        stored.status = invoice.status;
        stored.sent_at = invoice.sent_at;
        stored.paid_at = invoice.paid_at;
        stored.cancelled_at = invoice.cancelled_at;
        Ok(())
    }

    fn charge_mut(&mut self, id: ExtraChargeId) -> Result<&mut ExtraCharge, PortError> {
        self.extra_charges
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PortError::not_found("ExtraCharge", id))
    }

    fn rate_type(&self, id: RateTypeId) -> Result<RateType, YardError> {
        self.rate_types
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("RateType", id).into())
    }

    fn ensure_horse(&self, id: HorseId) -> Result<(), YardError> {
        if self.horses.contains_key(&id) {
            Ok(())
        } else {
            Err(PortError::not_found("Horse", id).into())
        }
    }

    fn ensure_owner(&self, id: OwnerId) -> Result<(), YardError> {
        if self.owners.contains_key(&id) {
            Ok(())
        } else {
            Err(PortError::not_found("Owner", id).into())
        }
    }

    fn ensure_location(&self, id: LocationId) -> Result<(), YardError> {
        if self.locations.contains_key(&id) {
            Ok(())
        } else {
            Err(PortError::not_found("Location", id).into())
        }
    }
}

/// Shared-state store for tests and single-process use
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingStore {
    state: Arc<Mutex<YardState>>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from custom settings, e.g. a different prefix or terms
    pub fn with_settings(settings: BillingSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(YardState {
                settings,
                ..Default::default()
            })),
        }
    }

    /// A copy of the current state
    pub async fn snapshot(&self) -> YardState {
        self.state.lock().await.clone()
    }
}

impl DomainPort for InMemoryBillingStore {}

#[async_trait]
impl HealthCheckable for InMemoryBillingStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult {
            adapter_id: "in-memory-billing-store".to_string(),
            status: AdapterHealth::Healthy,
            latency_ms: 0,
            message: None,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl YardPort for InMemoryBillingStore {
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
        self.state.lock().await.owners.insert(owner.id, owner.clone());
        Ok(owner)
    }

    async fn get_owner(&self, id: OwnerId) -> Result<Owner, YardError> {
        self.state
            .lock()
            .await
            .owners
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Owner", id).into())
    }

    async fn create_horse(&self, request: NewHorse) -> Result<Horse, YardError> {
        let horse = Horse {
            id: HorseId::new(),
            name: request.name,
            breed: request.breed,
            date_of_birth: request.date_of_birth,
            is_active: true,
        };
        self.state.lock().await.horses.insert(horse.id, horse.clone());
        Ok(horse)
    }

    async fn create_location(&self, name: String) -> Result<Location, YardError> {
        let location = Location {
            id: LocationId::new(),
            name,
        };
        self.state.lock().await.locations.insert(location.id, location.clone());
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
        self.state.lock().await.rate_types.insert(rate_type.id, rate_type.clone());
        Ok(rate_type)
    }

    async fn update_daily_rate(&self, id: RateTypeId, daily_rate: Money) -> Result<RateType, YardError> {
        if daily_rate.is_negative() {
            return Err(YardError::invalid("Daily rate must not be negative"));
        }
        let mut state = self.state.lock().await;
        let rate_type = state
            .rate_types
            .get_mut(&id)
            .ok_or_else(|| YardError::from(PortError::not_found("RateType", id)))?;
        rate_type.daily_rate = daily_rate;
        let updated = rate_type.clone();

        for placement in state.placements.iter_mut().filter(|p| p.rate_type.id == id) {
            placement.rate_type = updated.clone();
        }
        Ok(updated)
    }

    async fn record_ownership(&self, request: NewOwnership) -> Result<OwnershipRecord, YardError> {
        let mut state = self.state.lock().await;
        state.ensure_horse(request.horse_id)?;
        state.ensure_owner(request.owner_id)?;

        let record = request.into_record();
        validate_ownership(&state.ownerships, &record)?;
        state.ownerships.push(record.clone());
        Ok(record)
    }

    async fn end_ownership(&self, id: OwnershipId, effective_to: NaiveDate) -> Result<OwnershipRecord, YardError> {
        let mut state = self.state.lock().await;
        let mut record = state
            .ownerships
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| YardError::from(PortError::not_found("OwnershipRecord", id)))?;
        record.effective_to = Some(effective_to);
        validate_ownership(&state.ownerships, &record)?;

        if let Some(slot) = state.ownerships.iter_mut().find(|r| r.id == id) {
            *slot = record.clone();
        }
        Ok(record)
    }

    async fn ownerships_for_horse(&self, horse: HorseId) -> Result<Vec<OwnershipRecord>, YardError> {
        let state = self.state.lock().await;
        let mut records: Vec<OwnershipRecord> = state
            .ownerships
            .iter()
            .filter(|r| r.horse_id == horse)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.effective_from);
        Ok(records)
    }

    async fn record_placement(&self, request: NewPlacement) -> Result<Placement, YardError> {
        let mut state = self.state.lock().await;
        state.ensure_horse(request.horse_id)?;
        state.ensure_owner(request.owner_id)?;
        state.ensure_location(request.location_id)?;

        let rate_type = state.rate_type(request.rate_type_id)?;
        let placement = request.into_placement(rate_type);
        validate_placement(&state.placements, &placement)?;
        state.placements.push(placement.clone());
        Ok(placement)
    }

    async fn end_placement(&self, id: PlacementId, end_date: NaiveDate) -> Result<Placement, YardError> {
        let mut state = self.state.lock().await;
        let mut placement = state
            .placements
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| YardError::from(PortError::not_found("Placement", id)))?;
        placement.end_date = Some(end_date);
        validate_placement(&state.placements, &placement)?;

        if let Some(slot) = state.placements.iter_mut().find(|p| p.id == id) {
            *slot = placement.clone();
        }
        Ok(placement)
    }

    async fn move_horse(&self, request: MoveHorse) -> Result<Placement, YardError> {
        let mut state = self.state.lock().await;
        state.ensure_horse(request.horse_id)?;
        state.ensure_location(request.location_id)?;
        if let Some(owner) = request.owner_id {
            state.ensure_owner(owner)?;
        }
        let rate_type = match request.rate_type_id {
            Some(id) => Some(state.rate_type(id)?),
            None => None,
        };

        let current = state
            .placements
            .iter()
            .find(|p| p.horse_id == request.horse_id && p.is_current())
            .cloned();
        let plan = plan_move(
            current.as_ref(),
            request.horse_id,
            request.location_id,
            request.owner_id,
            rate_type,
            request.move_date,
        )?;

        // Validate against the register as it will be after the move
        let mut placements = state.placements.clone();
        if let Some((id, end)) = plan.ended {
            if let Some(p) = placements.iter_mut().find(|p| p.id == id) {
                p.end_date = Some(end);
            }
        }
        validate_placement(&placements, &plan.next)?;
        placements.push(plan.next.clone());
        state.placements = placements;
        Ok(plan.next)
    }

    async fn placements_for_horse(&self, horse: HorseId) -> Result<Vec<Placement>, YardError> {
        let state = self.state.lock().await;
        let mut placements: Vec<Placement> = state
            .placements
            .iter()
            .filter(|p| p.horse_id == horse)
            .cloned()
            .collect();
        placements.sort_by_key(|p| p.start_date);
        Ok(placements)
    }

    async fn record_extra_charge(&self, request: NewExtraCharge) -> Result<ExtraCharge, YardError> {
        let mut state = self.state.lock().await;
        state.ensure_horse(request.horse_id)?;
        state.ensure_owner(request.owner_id)?;

        let charge = request.into_charge()?;
        state.extra_charges.push(charge.clone());
        Ok(charge)
    }

    async fn update_extra_charge_amount(&self, id: ExtraChargeId, amount: Money) -> Result<ExtraCharge, YardError> {
        let mut state = self.state.lock().await;
        let charge = state.charge_mut(id)?;
        charge.amend_amount(amount)?;
        Ok(charge.clone())
    }

    async fn get_extra_charge(&self, id: ExtraChargeId) -> Result<ExtraCharge, YardError> {
        let state = self.state.lock().await;
        state
            .extra_charges
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| PortError::not_found("ExtraCharge", id).into())
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, PortError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn settings(&self) -> Result<BillingSettings, PortError> {
        Ok(self.state.lock().await.settings.clone())
    }

    async fn billing_candidates(&self, period: &DateRange) -> Result<Vec<OwnerId>, PortError> {
        let state = self.state.lock().await;
        Ok(candidate_owners(
            &state.ownerships,
            &state.placements,
            &state.extra_charges,
            period,
        ))
    }

    async fn load_owner_sources(&self, owner: OwnerId, period_end: NaiveDate) -> Result<ChargeSources, PortError> {
        self.state.lock().await.owner_sources(owner, period_end)
    }

    async fn find_overlapping_invoice(
        &self,
        owner: OwnerId,
        period: &DateRange,
    ) -> Result<Option<Invoice>, PortError> {
        Ok(self.state.lock().await.overlapping_invoice(owner, period))
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        self.state
            .lock()
            .await
            .invoices
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Invoice", id))
    }

    async fn invoices_for_owner(&self, owner: OwnerId) -> Result<Vec<Invoice>, PortError> {
        let state = self.state.lock().await;
        let mut invoices: Vec<Invoice> = state
            .invoices
            .iter()
            .filter(|i| i.owner_id == owner)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.period_start);
        Ok(invoices)
    }

    async fn save_invoice_status(&self, invoice: &Invoice, from: InvoiceStatus) -> Result<(), PortError> {
        self.state.lock().await.save_invoice_status(invoice, from)
    }

    async fn invoices_past_due(&self, today: NaiveDate) -> Result<Vec<Invoice>, PortError> {
        let state = self.state.lock().await;
        Ok(state
            .invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Sent && i.due_date < today)
            .cloned()
            .collect())
    }
}

/// Unit of work over a private copy of the state
struct MemoryTransaction {
    guard: OwnedMutexGuard<YardState>,
    working: YardState,
}

#[async_trait]
impl BillingTransaction for MemoryTransaction {
    async fn lock_owner(&mut self, _owner: OwnerId) -> Result<(), PortError> {
        // The whole store is already held by this transaction
        Ok(())
    }

    async fn find_overlapping_invoice(
        &mut self,
        owner: OwnerId,
        period: &DateRange,
    ) -> Result<Option<Invoice>, PortError> {
        Ok(self.working.overlapping_invoice(owner, period))
    }

    async fn allocate_invoice_number(&mut self) -> Result<AllocatedNumber, PortError> {
        Ok(self.working.settings.take_next_number())
    }

    async fn load_owner_sources(&mut self, owner: OwnerId, period_end: NaiveDate) -> Result<ChargeSources, PortError> {
        self.working.owner_sources(owner, period_end)
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        self.working.insert_invoice(invoice)
    }

    async fn mark_charge_invoiced(&mut self, charge: ExtraChargeId, invoice: InvoiceId) -> Result<(), PortError> {
        self.working.charge_mut(charge)?.settle(invoice);
        Ok(())
    }

    async fn save_invoice_status(&mut self, invoice: &Invoice, from: InvoiceStatus) -> Result<(), PortError> {
        self.working.save_invoice_status(invoice, from)
    }

    async fn release_charges(&mut self, charges: &[ExtraChargeId]) -> Result<(), PortError> {
        for id in charges {
            self.working.charge_mut(*id)?.release();
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), PortError> {
        *self.guard = self.working.clone();
        Ok(())
    }
}
