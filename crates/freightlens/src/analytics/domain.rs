use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical facility a stop happens at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub location_id: String,
    pub location_code: String,
    pub name: String,
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(rename = "type")]
    pub location_type: LocationType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Warehouse,
    FulfillmentCenter,
    Port,
    DistributionCenter,
}

impl LocationType {
    pub const fn label(self) -> &'static str {
        match self {
            LocationType::Warehouse => "WAREHOUSE",
            LocationType::FulfillmentCenter => "FULFILLMENT_CENTER",
            LocationType::Port => "PORT",
            LocationType::DistributionCenter => "DISTRIBUTION_CENTER",
        }
    }
}

/// Carrier master record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
    pub carrier_id: String,
    pub scac: String,
    pub name: String,
    pub carrier_type: CarrierType,
    pub contract_type: ContractType,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarrierType {
    Asset,
    Broker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractType {
    ContractPrimary,
    ContractBackup,
}

impl ContractType {
    pub const fn label(self) -> &'static str {
        match self {
            ContractType::ContractPrimary => "CONTRACT_PRIMARY",
            ContractType::ContractBackup => "CONTRACT_BACKUP",
        }
    }
}

/// One priced line on a load's invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeLineItem {
    pub charge_type: ChargeType,
    pub amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeType {
    LineHaul,
    FuelSurcharge,
    Detention,
    Accessorial,
}

impl ChargeType {
    pub const fn label(self) -> &'static str {
        match self {
            ChargeType::LineHaul => "LINE_HAUL",
            ChargeType::FuelSurcharge => "FUEL_SURCHARGE",
            ChargeType::Detention => "DETENTION",
            ChargeType::Accessorial => "ACCESSORIAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub currency: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Charges {
    pub line_items: Vec<ChargeLineItem>,
}

/// Scheduled service window for a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub scheduled_earliest: DateTime<Utc>,
    pub scheduled_latest: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_earliest: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_latest: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentType {
    Appointment,
    Window,
}

/// Observed arrival/departure; either side may still be pending.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActualTimes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure: Option<DateTime<Utc>>,
}

/// Attribution recorded when a stop ran late.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateReason {
    pub code: String,
    pub description: String,
    pub responsible_party: ResponsibleParty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponsibleParty {
    Shipper,
    Carrier,
    Customer,
    ForceMajeure,
}

impl ResponsibleParty {
    pub const fn label(self) -> &'static str {
        match self {
            ResponsibleParty::Shipper => "SHIPPER",
            ResponsibleParty::Carrier => "CARRIER",
            ResponsibleParty::Customer => "CUSTOMER",
            ResponsibleParty::ForceMajeure => "FORCE_MAJEURE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopType {
    Pickup,
    Delivery,
}

impl StopType {
    pub const fn label(self) -> &'static str {
        match self {
            StopType::Pickup => "PICKUP",
            StopType::Delivery => "DELIVERY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadingType {
    Live,
    Drop,
}

impl LoadingType {
    pub const fn label(self) -> &'static str {
        match self {
            LoadingType::Live => "LIVE",
            LoadingType::Drop => "DROP",
        }
    }
}

/// Ordered waypoint on a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub sequence: u32,
    pub stop_type: StopType,
    pub loading_type: LoadingType,
    pub location: Location,
    pub appointment: Appointment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<ActualTimes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_reason: Option<LateReason>,
}

impl Stop {
    /// Minutes spent on site, once both actual timestamps are known.
    pub fn dwell_minutes(&self) -> Option<f64> {
        let actual = self.actual.as_ref()?;
        let (arrival, departure) = (actual.arrival?, actual.departure?);
        Some((departure - arrival).num_seconds() as f64 / 60.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenderStatus {
    Accepted,
    Rejected,
    Pending,
}

impl TenderStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TenderStatus::Accepted => "ACCEPTED",
            TenderStatus::Rejected => "REJECTED",
            TenderStatus::Pending => "PENDING",
        }
    }
}

/// Offer of a load to a carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tender {
    pub tendered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    pub status: TenderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl Tender {
    /// Hours from offer to response; undefined while the tender is pending.
    pub fn response_hours(&self) -> Option<f64> {
        let responded = match self.status {
            TenderStatus::Accepted => self.accepted_at?,
            TenderStatus::Rejected => self.rejected_at?,
            TenderStatus::Pending => return None,
        };
        Some((responded - self.tendered_at).num_seconds() as f64 / 3600.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadKind {
    Shipment,
    Tender,
}

impl LoadKind {
    pub const fn label(self) -> &'static str {
        match self {
            LoadKind::Shipment => "SHIPMENT",
            LoadKind::Tender => "TENDER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStatus {
    Delivered,
    InTransit,
    Rejected,
    Pending,
}

impl LoadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LoadStatus::Delivered => "DELIVERED",
            LoadStatus::InTransit => "IN_TRANSIT",
            LoadStatus::Rejected => "REJECTED",
            LoadStatus::Pending => "PENDING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    Truckload,
    Ltl,
    Parcel,
}

impl TransportMode {
    pub const fn label(self) -> &'static str {
        match self {
            TransportMode::Truckload => "TRUCKLOAD",
            TransportMode::Ltl => "LTL",
            TransportMode::Parcel => "PARCEL",
        }
    }
}

/// Carrier attribution embedded on a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierRef {
    pub carrier_id: String,
    pub scac: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthOfHaul {
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadMetadata {
    pub created_at: DateTime<Utc>,
    pub is_test: bool,
}

/// A shipment transaction: the unit the evaluator operates over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub load_id: String,
    pub load_type: LoadKind,
    pub load_status: LoadStatus,
    pub mode: TransportMode,
    pub equipment_type: String,
    pub carrier: CarrierRef,
    pub contract_type: ContractType,
    pub length_of_haul: LengthOfHaul,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charges: Option<Charges>,
    pub tender: Tender,
    pub stops: Vec<Stop>,
    pub metadata: LoadMetadata,
}

impl Load {
    pub fn first_pickup(&self) -> Option<&Stop> {
        self.stops
            .iter()
            .filter(|stop| stop.stop_type == StopType::Pickup)
            .min_by_key(|stop| stop.sequence)
    }

    pub fn last_delivery(&self) -> Option<&Stop> {
        self.stops
            .iter()
            .filter(|stop| stop.stop_type == StopType::Delivery)
            .max_by_key(|stop| stop.sequence)
    }

    /// Origin-to-destination lane code, e.g. `DAL-ATL`.
    pub fn lane_code(&self) -> Option<String> {
        let origin = self.first_pickup()?;
        let destination = self.last_delivery()?;
        Some(format!(
            "{}-{}",
            origin.location.location_code, destination.location.location_code
        ))
    }

    pub fn total_charges(&self) -> f64 {
        self.charges
            .as_ref()
            .map(|charges| charges.line_items.iter().map(|item| item.amount.value).sum())
            .unwrap_or(0.0)
    }

    /// All-in cost per mile; undefined when the haul length is not positive.
    pub fn cost_per_mile(&self) -> Option<f64> {
        if self.length_of_haul.value > 0.0 {
            Some(self.total_charges() / self.length_of_haul.value)
        } else {
            None
        }
    }
}

/// Origin/destination pairing reported on lane rollups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub origin: Location,
    pub destination: Location,
    pub lane_code: String,
}
