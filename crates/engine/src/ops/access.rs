use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, accounts, events, expenses, products, transactions,
};

use super::Engine;

impl Engine {
    pub(super) async fn require_account(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find_by_id(account_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))
    }

    /// The personal wallet of one member.
    pub(super) async fn require_personal_account(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find()
            .filter(accounts::Column::Kind.eq("personal"))
            .filter(accounts::Column::OwnerId.eq(user_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))
    }

    pub(super) async fn find_account_for_owner(
        &self,
        db: &DatabaseTransaction,
        kind: &str,
        owner_id: &str,
    ) -> ResultEngine<Option<accounts::Model>> {
        accounts::Entity::find()
            .filter(accounts::Column::Kind.eq(kind.to_string()))
            .filter(accounts::Column::OwnerId.eq(owner_id.to_string()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn require_transaction(
        &self,
        db: &DatabaseTransaction,
        transaction_id: Uuid,
    ) -> ResultEngine<transactions::Model> {
        transactions::Entity::find_by_id(transaction_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))
    }

    pub(super) async fn require_product_in_shop(
        &self,
        db: &DatabaseTransaction,
        shop_id: &str,
        product_id: Uuid,
    ) -> ResultEngine<products::Model> {
        products::Entity::find_by_id(product_id.to_string())
            .filter(products::Column::ShopId.eq(shop_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::InvalidProduct("product not exists".to_string()))
    }

    pub(super) async fn require_event(
        &self,
        db: &DatabaseTransaction,
        event_id: Uuid,
    ) -> ResultEngine<events::Model> {
        events::Entity::find_by_id(event_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("event not exists".to_string()))
    }

    pub(super) async fn require_expense(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
    ) -> ResultEngine<expenses::Model> {
        expenses::Entity::find_by_id(expense_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }
}
