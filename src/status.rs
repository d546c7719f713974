//! Status vocabulary shared by entities, the association store and the
//! backend.
//!
//! Three independent dimensions exist:
//! - [`ModerationStatus`]: administrator controlled, lives on assets and media.
//! - [`PreferenceStatus`]: owner controlled, lives on assets and media.
//! - link display status: per asset↔media association, same value space as
//!   [`PreferenceStatus`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} status: {value}")]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Platform moderation, ordered from most to least promoted.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    #[sea_orm(string_value = "featured")]
    Featured,
    #[sea_orm(string_value = "curated")]
    Curated,
    #[sea_orm(string_value = "listed")]
    #[default]
    Listed,
    #[sea_orm(string_value = "hidden")]
    Hidden,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Featured => "featured",
            Self::Curated => "curated",
            Self::Listed => "listed",
            Self::Hidden => "hidden",
            Self::Rejected => "rejected",
        }
    }

    /// Lower ranks sort first.
    pub fn sort_rank(&self) -> i32 {
        match self {
            Self::Featured => 0,
            Self::Curated => 1,
            Self::Listed => 2,
            Self::Hidden => 3,
            Self::Rejected => 4,
        }
    }

    /// Whether a viewer without owner or admin rights may see the item.
    pub fn is_public(&self) -> bool {
        !matches!(self, Self::Hidden | Self::Rejected)
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "featured" => Ok(Self::Featured),
            "curated" => Ok(Self::Curated),
            "listed" => Ok(Self::Listed),
            "hidden" => Ok(Self::Hidden),
            "rejected" => Ok(Self::Rejected),
            _ => Err(StatusParseError {
                kind: "moderation",
                value: s.to_string(),
            }),
        }
    }
}

/// Owner preference, also used as the per-link display status.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PreferenceStatus {
    #[sea_orm(string_value = "pinned")]
    Pinned,
    #[sea_orm(string_value = "listed")]
    #[default]
    Listed,
    #[sea_orm(string_value = "hidden")]
    Hidden,
}

impl PreferenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pinned => "pinned",
            Self::Listed => "listed",
            Self::Hidden => "hidden",
        }
    }

    /// Shares the scale of [`ModerationStatus::sort_rank`]: pinned sits with
    /// featured, listed with listed, hidden with hidden.
    pub fn sort_rank(&self) -> i32 {
        match self {
            Self::Pinned => 0,
            Self::Listed => 2,
            Self::Hidden => 3,
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden)
    }
}

impl fmt::Display for PreferenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreferenceStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pinned" => Ok(Self::Pinned),
            "listed" => Ok(Self::Listed),
            "hidden" => Ok(Self::Hidden),
            _ => Err(StatusParseError {
                kind: "preference",
                value: s.to_string(),
            }),
        }
    }
}
