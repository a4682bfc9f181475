//! Inventory roles.

use serde::{Deserialize, Serialize};

/// A caller's role on one inventory, resolved before any mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryRole {
    Owner,
    Admin,
    Write,
    Read,
}

impl InventoryRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "write" => Some(Self::Write),
            "read" => Some(Self::Read),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Write => "write",
            Self::Read => "read",
        }
    }

    pub fn can_read(&self) -> bool {
        true
    }

    /// Creating items consumes the inventory's sequence counter.
    pub fn can_create_items(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin | Self::Write)
    }

    /// Only administrators may change the identifier format.
    pub fn can_edit_format(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl std::fmt::Display for InventoryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
