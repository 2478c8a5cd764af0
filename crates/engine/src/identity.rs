//! Caller identity and shop capabilities.
//!
//! Authentication and role lookup live outside the engine; callers resolve an
//! [`Identity`] per request (user id, club role, per-shop capability grants)
//! and pass it into every operation. The engine trusts it as-is.

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Club-wide role of the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            other => Err(EngineError::Validation(format!("invalid role: {other}"))),
        }
    }
}

/// What a user may do within one shop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopCapability {
    Sell,
    ManageProducts,
    ManageInventory,
    ViewStats,
    ManageSettings,
    ManageEvents,
    ManageExpenses,
}

impl ShopCapability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sell => "sell",
            Self::ManageProducts => "manage_products",
            Self::ManageInventory => "manage_inventory",
            Self::ViewStats => "view_stats",
            Self::ManageSettings => "manage_settings",
            Self::ManageEvents => "manage_events",
            Self::ManageExpenses => "manage_expenses",
        }
    }
}

impl TryFrom<&str> for ShopCapability {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "sell" => Ok(Self::Sell),
            "manage_products" => Ok(Self::ManageProducts),
            "manage_inventory" => Ok(Self::ManageInventory),
            "view_stats" => Ok(Self::ViewStats),
            "manage_settings" => Ok(Self::ManageSettings),
            "manage_events" => Ok(Self::ManageEvents),
            "manage_expenses" => Ok(Self::ManageExpenses),
            other => Err(EngineError::Validation(format!(
                "invalid shop capability: {other}"
            ))),
        }
    }
}

/// Capabilities granted to a user within one shop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopGrant {
    pub shop_id: String,
    pub capabilities: Vec<ShopCapability>,
}

/// Resolved caller identity, threaded into every engine call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    pub grants: Vec<ShopGrant>,
}

impl Identity {
    #[must_use]
    pub fn member(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Member,
            grants: Vec::new(),
        }
    }

    #[must_use]
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
            grants: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_grant(mut self, shop_id: impl Into<String>, capabilities: Vec<ShopCapability>) -> Self {
        self.grants.push(ShopGrant {
            shop_id: shop_id.into(),
            capabilities,
        });
        self
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns `true` if the caller holds `capability` in `shop_id`.
    ///
    /// Admins pass every capability check.
    #[must_use]
    pub fn has_shop_capability(&self, shop_id: &str, capability: ShopCapability) -> bool {
        if self.is_admin() {
            return true;
        }
        self.grants
            .iter()
            .filter(|grant| grant.shop_id == shop_id)
            .any(|grant| grant.capabilities.contains(&capability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_without_grant_has_no_capability() {
        let identity = Identity::member("alice");
        assert!(!identity.has_shop_capability("bar", ShopCapability::Sell));
    }

    #[test]
    fn grant_is_scoped_to_its_shop() {
        let identity = Identity::member("alice").with_grant("bar", vec![ShopCapability::Sell]);
        assert!(identity.has_shop_capability("bar", ShopCapability::Sell));
        assert!(!identity.has_shop_capability("kitchen", ShopCapability::Sell));
        assert!(!identity.has_shop_capability("bar", ShopCapability::ManageEvents));
    }

    #[test]
    fn admin_passes_every_check() {
        let identity = Identity::admin("root");
        assert!(identity.has_shop_capability("bar", ShopCapability::ManageSettings));
    }
}
