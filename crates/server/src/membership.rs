//! The `shop_memberships` table and the mapping from staff roles to engine
//! capabilities.

use engine::ShopCapability;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "shop_memberships")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub shop_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub role: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// What each staff role may do in its shop. Unknown roles grant nothing.
pub fn capabilities_for_role(role: &str) -> Vec<ShopCapability> {
    match role {
        "cashier" => vec![ShopCapability::Sell, ShopCapability::ViewStats],
        "organizer" => vec![
            ShopCapability::ManageEvents,
            ShopCapability::ManageExpenses,
            ShopCapability::ViewStats,
        ],
        "manager" => vec![
            ShopCapability::Sell,
            ShopCapability::ManageProducts,
            ShopCapability::ManageInventory,
            ShopCapability::ViewStats,
            ShopCapability::ManageSettings,
            ShopCapability::ManageEvents,
            ShopCapability::ManageExpenses,
        ],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cashiers_sell_but_do_not_manage() {
        let caps = capabilities_for_role("cashier");
        assert!(caps.contains(&ShopCapability::Sell));
        assert!(!caps.contains(&ShopCapability::ManageEvents));
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        assert!(capabilities_for_role("barfly").is_empty());
    }
}
