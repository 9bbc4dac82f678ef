use serde::{Deserialize, Serialize};

/// The normalized form of a `funding.json` document.
///
/// Instances are only ever built by the backend validator after every rule has
/// passed, so a `FundingManifest` in hand is always a valid one. Field names
/// serialize in the camelCase used by the published manifest format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingManifest {
    pub version: String,
    pub entity: Entity,
    pub projects: Vec<Project>,
    pub funding: Funding,
}

/// The person or organisation that declares the funding manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub role: EntityRole,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub webpage_url: UrlRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Individual,
    Group,
    Organisation,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityRole {
    Owner,
    Steward,
    Maintainer,
    Contributor,
    Other,
}

/// A URL plus the optional `.well-known` document proving ownership of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub well_known: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub guid: String,
    pub name: String,
    pub description: String,
    pub webpage_url: UrlRef,
    pub repository_url: UrlRef,
    /// SPDX identifiers, each prefixed with `spdx:`.
    pub licenses: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Funding {
    pub channels: Vec<Channel>,
    pub plans: Vec<Plan>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// A way of sending money to the entity (bank account, payment provider...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub guid: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelType {
    Bank,
    PaymentProvider,
    Cheque,
    Cash,
    Other,
}

/// A funding plan. `channels` holds guids of entries in `Funding::channels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub guid: String,
    pub status: PlanStatus,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub frequency: PlanFrequency,
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanFrequency {
    OneTime,
    Weekly,
    Fortnightly,
    Monthly,
    Yearly,
    Other,
}

/// One year of the entity's reported financial history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub year: i64,
    pub income: f64,
    pub expenses: f64,
    pub taxes: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
