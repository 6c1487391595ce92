//! Core types for the exchange

use chrono::{DateTime, Utc};
use datamarket_ledger::{EntityKind, Record};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What a contract type delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataKind {
    /// One-off file delivery, gated by the shipment lifecycle
    File,
    /// Continuous stream until the contract's end time
    Stream,
    /// File exposed through queries
    FileQueryable,
    /// Stream exposed through queries
    StreamQueryable,
}

/// How stream data reaches the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    /// Consumer pulls from the provider's source endpoint
    Pull,
    /// Provider pushes to the consumer's target endpoint
    Push,
    /// Provider notifies on a topic
    Notification,
}

/// Stream delivery settings of a contract type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    /// Delivery mode
    pub stream_type: StreamType,

    /// Provider endpoint (required for PULL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_endpoint: Option<String>,

    /// Consumer endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_endpoint: Option<String>,

    /// Notification topic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Delivery frequency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
}

/// Period during which contracts of a type may be created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityWindow {
    /// First instant covered (inclusive)
    pub start: DateTime<Utc>,

    /// Last instant covered (inclusive)
    pub end: DateTime<Utc>,
}

impl ValidityWindow {
    /// Create new window
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when `at` lies within the window, bounds included
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

impl std::fmt::Display for ValidityWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Template offered by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractType {
    /// Contract type ID (store key)
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Offering party
    pub provider_id: String,

    /// Data category
    #[serde(default)]
    pub category_id: String,

    /// Tokens the consumer pays per contract
    pub price: Decimal,

    /// Delivery kind
    pub data_kind: DataKind,

    /// When contracts may be created
    pub validity_window: ValidityWindow,

    /// Stream delivery settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamSettings>,
}

impl Record for ContractType {
    const KIND: EntityKind = EntityKind::ContractType;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Proposal extras supplied by the consumer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalExtras {
    /// Requested end of a stream contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<DateTime<Utc>>,
}

/// Inbound request to create a contract (not persisted as-is)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractProposal {
    /// ID the contract will be stored under
    pub contract_id: String,

    /// Buying party
    pub consumer_id: String,

    /// Template being bought
    pub contract_type_id: String,

    /// Caller-supplied creation time
    pub timestamp: DateTime<Utc>,

    /// Kind-specific extras
    #[serde(default)]
    pub extras: ProposalExtras,
}

/// Delivery status of a FILE contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileStatus {
    /// Payment escrowed, awaiting shipment
    #[serde(rename = "PROPOSAL")]
    Proposal,
    /// Provider shipped the data, payment released
    #[serde(rename = "SHIPPED", alias = "DATASHIPPED")]
    Shipped,
    /// Consumer confirmed receipt (terminal)
    #[serde(rename = "RECEIVED", alias = "DATARECEIVED")]
    Received,
}

impl FileStatus {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Proposal => "PROPOSAL",
            FileStatus::Shipped => "SHIPPED",
            FileStatus::Received => "RECEIVED",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest of shipped data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    /// Digest algorithm
    pub method: String,

    /// Hex-encoded digest
    pub value: String,
}

impl FileHash {
    /// Create new hash
    pub fn new(method: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            value: value.into(),
        }
    }

    /// SHA-256 of `data`
    pub fn sha256(data: &[u8]) -> Self {
        Self::new("sha256", format!("{:x}", Sha256::digest(data)))
    }
}

/// Kind-specific contract state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractExtras {
    /// Delivery status (FILE contracts only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_status: Option<FileStatus>,

    /// Digest recorded at shipment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<FileHash>,

    /// End of a stream contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<DateTime<Utc>>,
}

/// Contract between a consumer and a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataContract {
    /// Contract ID (store key, immutable)
    pub id: String,

    /// Selling party
    pub provider_id: String,

    /// Buying party
    pub consumer_id: String,

    /// Template the contract was created from
    pub contract_type_id: String,

    /// Creation time taken from the proposal
    pub creation_time: DateTime<Utc>,

    /// Kind-specific state
    #[serde(default)]
    pub extras: ContractExtras,
}

impl Record for DataContract {
    const KIND: EntityKind = EntityKind::DataContract;

    fn id(&self) -> &str {
        &self.id
    }
}
