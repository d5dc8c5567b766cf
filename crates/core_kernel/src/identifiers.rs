//! Typed identifiers
//!
//! Every entity id is a UUIDv7 behind its own newtype, so an `OwnerId` can
//! never be passed where a `HorseId` is expected and ids sort by creation
//! time. The display form carries a short tag (`HRS-0190...`) for logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident => $tag:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// A fresh time-ordered id
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $tag, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            /// Accepts the tagged display form or a bare UUID
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($tag, "-")).unwrap_or(s);
                Uuid::parse_str(raw).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

entity_id!(
    /// A horse owner, the party invoices are addressed to
    OwnerId => "OWN"
);
entity_id!(HorseId => "HRS");
entity_id!(LocationId => "LOC");
entity_id!(RateTypeId => "RATE");
entity_id!(
    /// One time-bounded ownership share record
    OwnershipId => "SHR"
);
entity_id!(PlacementId => "PLC");
entity_id!(ExtraChargeId => "CHG");
entity_id!(InvoiceId => "INV");
entity_id!(LineItemId => "LINE");
