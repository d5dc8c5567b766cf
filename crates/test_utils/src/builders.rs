//! Test Data Builders
//!
//! Builders for yard register requests with sensible defaults, so a test
//! names only the fields it cares about. [`YardSeed`] drives any
//! [`YardPort`] to set up a yard in a few lines.

use chrono::NaiveDate;
use core_kernel::{HorseId, LocationId, Money, OwnerId, Percentage, RateTypeId};
use domain_yard::{
    ChargeType, ExtraCharge, Horse, Location, NewExtraCharge, NewHorse, NewOwner, NewOwnership,
    NewPlacement, NewRateType, Owner, OwnershipRecord, Placement, RateType, YardError, YardPort,
};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;

use crate::fixtures::{MoneyFixtures, ShareFixtures, StringFixtures, TemporalFixtures};

/// Builder for a new owner; name and email are random unless set
pub struct OwnerBuilder {
    name: String,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
}

impl Default for OwnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnerBuilder {
    pub fn new() -> Self {
        Self {
            name: Name().fake(),
            email: Some(SafeEmail().fake()),
            phone: None,
            address: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn build(self) -> NewOwner {
        NewOwner {
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
        }
    }
}

/// Builder for an ownership record; defaults to a whole share from 1 Jan 2026
pub struct OwnershipBuilder {
    horse_id: HorseId,
    owner_id: OwnerId,
    share: Percentage,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
}

impl OwnershipBuilder {
    pub fn new(horse_id: HorseId, owner_id: OwnerId) -> Self {
        Self {
            horse_id,
            owner_id,
            share: ShareFixtures::whole(),
            effective_from: TemporalFixtures::season_start(),
            effective_to: None,
        }
    }

    pub fn with_share(mut self, share: Percentage) -> Self {
        self.share = share;
        self
    }

    pub fn starting(mut self, date: NaiveDate) -> Self {
        self.effective_from = date;
        self
    }

    pub fn ending(mut self, date: NaiveDate) -> Self {
        self.effective_to = Some(date);
        self
    }

    pub fn build(self) -> NewOwnership {
        NewOwnership {
            horse_id: self.horse_id,
            owner_id: self.owner_id,
            share: self.share,
            effective_from: self.effective_from,
            effective_to: self.effective_to,
        }
    }
}

/// Builder for a placement; open-ended from 1 Jan 2026 by default
pub struct PlacementBuilder {
    horse_id: HorseId,
    owner_id: OwnerId,
    location_id: LocationId,
    rate_type_id: RateTypeId,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
}

impl PlacementBuilder {
    pub fn new(horse_id: HorseId, owner_id: OwnerId, location_id: LocationId, rate_type_id: RateTypeId) -> Self {
        Self {
            horse_id,
            owner_id,
            location_id,
            rate_type_id,
            start_date: TemporalFixtures::season_start(),
            end_date: None,
        }
    }

    pub fn starting(mut self, date: NaiveDate) -> Self {
        self.start_date = date;
        self
    }

    pub fn ending(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn build(self) -> NewPlacement {
        NewPlacement {
            horse_id: self.horse_id,
            owner_id: self.owner_id,
            location_id: self.location_id,
            rate_type_id: self.rate_type_id,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// Builder for an extra charge; a direct farrier visit on 15 Jan 2026 by default
pub struct ExtraChargeBuilder {
    horse_id: HorseId,
    owner_id: OwnerId,
    charge_type: ChargeType,
    date: NaiveDate,
    description: String,
    amount: Money,
    split_by_ownership: bool,
}

impl ExtraChargeBuilder {
    pub fn new(horse_id: HorseId, owner_id: OwnerId) -> Self {
        Self {
            horse_id,
            owner_id,
            charge_type: ChargeType::Farrier,
            date: TemporalFixtures::date(2026, 1, 15),
            description: "Front shoes".to_string(),
            amount: MoneyFixtures::farrier_visit(),
            split_by_ownership: false,
        }
    }

    pub fn of_type(mut self, charge_type: ChargeType) -> Self {
        self.charge_type = charge_type;
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    /// Bill the charge to every shareholder on its date
    pub fn split(mut self) -> Self {
        self.split_by_ownership = true;
        self
    }

    pub fn build(self) -> NewExtraCharge {
        NewExtraCharge {
            horse_id: self.horse_id,
            owner_id: self.owner_id,
            charge_type: self.charge_type,
            date: self.date,
            description: self.description,
            amount: self.amount,
            split_by_ownership: self.split_by_ownership,
        }
    }
}

/// Seeds a yard through any [`YardPort`]
///
/// ```rust,ignore
/// let seed = YardSeed::new(&store).await?;
/// let owner = seed.owner("Sarah Jones").await?;
/// let horse = seed.horse("Bramble").await?;
/// seed.place(horse.id, owner.id).await?;
/// ```
pub struct YardSeed<'a, P: YardPort + ?Sized> {
    port: &'a P,
    pub location: Location,
    pub full_livery: RateType,
}

impl<'a, P: YardPort + ?Sized> YardSeed<'a, P> {
    /// Creates one location and a £5 per day full livery rate
    pub async fn new(port: &'a P) -> Result<Self, YardError> {
        let location = port.create_location(StringFixtures::location_name().to_string()).await?;
        let full_livery = port
            .create_rate_type(NewRateType {
                name: StringFixtures::full_livery().to_string(),
                daily_rate: MoneyFixtures::full_livery_rate(),
            })
            .await?;
        Ok(Self {
            port,
            location,
            full_livery,
        })
    }

    pub async fn owner(&self, name: &str) -> Result<Owner, YardError> {
        self.port.create_owner(OwnerBuilder::new().with_name(name).build()).await
    }

    pub async fn horse(&self, name: &str) -> Result<Horse, YardError> {
        self.port
            .create_horse(NewHorse {
                name: name.to_string(),
                ..Default::default()
            })
            .await
    }

    pub async fn rate(&self, name: &str, daily_rate: Money) -> Result<RateType, YardError> {
        self.port
            .create_rate_type(NewRateType {
                name: name.to_string(),
                daily_rate,
            })
            .await
    }

    /// Open-ended full livery placement from 1 Jan 2026
    pub async fn place(&self, horse: HorseId, owner: OwnerId) -> Result<Placement, YardError> {
        self.port
            .record_placement(
                PlacementBuilder::new(horse, owner, self.location.id, self.full_livery.id).build(),
            )
            .await
    }

    /// Share of `horse` for `owner` from 1 Jan 2026
    pub async fn share(&self, horse: HorseId, owner: OwnerId, share: Percentage) -> Result<OwnershipRecord, YardError> {
        self.port
            .record_ownership(OwnershipBuilder::new(horse, owner).with_share(share).build())
            .await
    }

    pub async fn charge(&self, builder: ExtraChargeBuilder) -> Result<ExtraCharge, YardError> {
        self.port.record_extra_charge(builder.build()).await
    }
}
