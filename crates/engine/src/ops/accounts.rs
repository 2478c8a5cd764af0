//! Account lifecycle: creation, freezing, top-ups and history reads.

use chrono::Utc;
use uuid::Uuid;

use sea_orm::{ActiveValue, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{
    Account, AccountOwner, EngineError, Identity, ResultEngine, ShopCapability, TopUpCmd,
    Transaction, TransactionDetail, accounts, transactions,
};

use super::{
    Engine,
    movements::{MovementPolicy, MovementSpec},
    normalize_optional_text, with_tx,
};

impl Engine {
    /// Opens a wallet for a member or a shared purse for a group.
    ///
    /// Admin only. At most one account exists per owner and kind.
    pub async fn new_account(
        &self,
        owner: AccountOwner,
        identity: &Identity,
    ) -> ResultEngine<Account> {
        if !identity.is_admin() {
            return Err(EngineError::Forbidden(
                "only admins can open accounts".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            if self
                .find_account_for_owner(&db_tx, owner.kind_str(), owner.owner_id())
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(owner.owner_id().to_string()));
            }
            let account = Account::new(owner, Utc::now());
            accounts::ActiveModel::from(&account).insert(&db_tx).await?;
            tracing::info!(account = %account.id, kind = account.owner.kind_str(), "opened account");
            Ok(account)
        })
    }

    /// Current snapshot of one account.
    ///
    /// Personal wallets are visible to their owner and to admins; shared
    /// purses to any member.
    pub async fn account(&self, account_id: Uuid, identity: &Identity) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            let model = self.require_account(&db_tx, account_id).await?;
            check_account_visibility(&model, identity)?;
            Account::try_from(model)
        })
    }

    /// The personal wallet of `user_id`, visible to that user and to admins.
    pub async fn account_for_user(
        &self,
        user_id: &str,
        identity: &Identity,
    ) -> ResultEngine<Account> {
        if identity.user_id != user_id && !identity.is_admin() {
            return Err(EngineError::Forbidden(
                "cannot read another member's wallet".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let model = self.require_personal_account(&db_tx, user_id).await?;
            Account::try_from(model)
        })
    }

    /// Freezes or unfreezes an account. Admin only.
    ///
    /// A frozen account refuses purchases, transfers, top-ups and
    /// adjustments; cancellations and event settlement still post to it.
    pub async fn set_account_frozen(
        &self,
        account_id: Uuid,
        frozen: bool,
        identity: &Identity,
    ) -> ResultEngine<Account> {
        if !identity.is_admin() {
            return Err(EngineError::Forbidden(
                "only admins can freeze accounts".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let model = self.require_account(&db_tx, account_id).await?;
            let update = accounts::ActiveModel {
                id: ActiveValue::Set(model.id.clone()),
                frozen: ActiveValue::Set(frozen),
                ..Default::default()
            };
            let updated = update.update(&db_tx).await?;
            tracing::info!(account = %updated.id, frozen, "changed freeze flag");
            Account::try_from(updated)
        })
    }

    /// Credits cash taken at the counter to an account.
    ///
    /// Authorized for admins, or for holders of the `Sell` capability in the
    /// shop whose till took the cash.
    pub async fn top_up(&self, cmd: TopUpCmd, identity: &Identity) -> ResultEngine<Transaction> {
        if cmd.amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }
        let authorized = identity.is_admin()
            || cmd
                .shop_id
                .as_deref()
                .is_some_and(|shop| identity.has_shop_capability(shop, ShopCapability::Sell));
        if !authorized {
            return Err(EngineError::Forbidden(
                "top-ups require the sell capability".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            let account = self.require_account(&db_tx, cmd.account_id).await?;
            self.record_movement(
                &db_tx,
                MovementSpec {
                    account: &account,
                    amount_minor: cmd.amount_minor,
                    issuer: identity,
                    description: normalize_optional_text(cmd.description.as_deref()),
                    group_id: None,
                    detail: TransactionDetail::TopUp,
                    policy: MovementPolicy::STRICT,
                },
            )
            .await
        })
    }

    /// Ledger history of one account, newest first.
    pub async fn transactions_for_account(
        &self,
        account_id: Uuid,
        limit: u64,
        identity: &Identity,
    ) -> ResultEngine<Vec<Transaction>> {
        with_tx!(self, |db_tx| {
            let account = self.require_account(&db_tx, account_id).await?;
            check_account_visibility(&account, identity)?;
            let rows = transactions::Entity::find()
                .filter(transactions::Column::AccountId.eq(account.id.clone()))
                .order_by_desc(transactions::Column::CreatedAt)
                .limit(limit)
                .all(&db_tx)
                .await?;
            rows.into_iter().map(Transaction::try_from).collect()
        })
    }
}

fn check_account_visibility(account: &accounts::Model, identity: &Identity) -> ResultEngine<()> {
    if account.kind == "personal" && account.owner_id != identity.user_id && !identity.is_admin() {
        return Err(EngineError::Forbidden(
            "cannot read another member's wallet".to_string(),
        ));
    }
    Ok(())
}
