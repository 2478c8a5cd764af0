//! The purchase processor.
//!
//! A cart is settled as one storage transaction: a single balance debit for
//! the cart total, one ledger row per line, and the stock decrement of every
//! sold product. Any precondition failure rolls the whole cart back.

use chrono::Utc;
use uuid::Uuid;

use sea_orm::{ActiveValue, DatabaseTransaction, TransactionTrait, prelude::*};

use crate::{
    EngineError, Identity, MoneyCents, PurchaseCmd, ResultEngine, ShopCapability, Transaction,
    TransactionDetail, WalletSource, accounts, events, products, transactions,
};

use super::{Engine, normalize_optional_text, with_tx};

struct ResolvedLine {
    product: products::Model,
    quantity: i64,
    line_total_minor: i64,
    /// Stamped when the product is linked to an open commercial event.
    event_id: Option<Uuid>,
}

impl Engine {
    /// Settles a cart against the payer account.
    ///
    /// Self-checkout (issuer buys for themself) only reaches self-service
    /// products; selling to someone else requires the `Sell` capability in
    /// the shop. A frozen payer or insufficient funds for the cart total
    /// fails the whole cart, leaving balance, ledger and stock untouched.
    ///
    /// Returns the appended ledger rows, one per cart line, sharing a fresh
    /// `group_id`.
    pub async fn record_purchase(
        &self,
        cmd: PurchaseCmd,
        identity: &Identity,
    ) -> ResultEngine<Vec<Transaction>> {
        if cmd.lines.is_empty() {
            return Err(EngineError::EmptyCart);
        }
        for line in &cmd.lines {
            if line.quantity <= 0 {
                return Err(EngineError::Validation("quantity must be > 0".to_string()));
            }
        }
        let self_checkout = identity.user_id == cmd.recipient_user_id;
        if !self_checkout && !identity.has_shop_capability(&cmd.shop_id, ShopCapability::Sell) {
            return Err(EngineError::Forbidden(
                "selling to another member requires the sell capability".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let payer = self.require_account(&db_tx, cmd.payer_account_id).await?;

            let mut resolved = Vec::with_capacity(cmd.lines.len());
            let mut total_minor: i64 = 0;
            for line in &cmd.lines {
                let product = self
                    .require_product_in_shop(&db_tx, &cmd.shop_id, line.product_id)
                    .await?;
                if product.archived {
                    return Err(EngineError::InvalidProduct(product.name));
                }
                if self_checkout && !product.self_service {
                    return Err(EngineError::InvalidProduct(format!(
                        "{} is not self-service",
                        product.name
                    )));
                }
                let event_id = self.open_commercial_event(&db_tx, &product).await?;
                let line_total_minor =
                    product
                        .price_minor
                        .checked_mul(line.quantity)
                        .ok_or_else(|| {
                            EngineError::Validation("cart line total too large".to_string())
                        })?;
                total_minor = total_minor
                    .checked_add(line_total_minor)
                    .ok_or_else(|| EngineError::Validation("cart total too large".to_string()))?;
                resolved.push(ResolvedLine {
                    product,
                    quantity: line.quantity,
                    line_total_minor,
                    event_id,
                });
            }

            if payer.frozen {
                return Err(EngineError::AccountFrozen(payer.id.clone()));
            }
            let new_balance = payer.balance_minor - total_minor;
            if new_balance < 0 {
                return Err(EngineError::InsufficientFunds(format!(
                    "balance {}, cart total {}",
                    MoneyCents::new(payer.balance_minor),
                    MoneyCents::new(total_minor)
                )));
            }
            let balance_update = accounts::ActiveModel {
                id: ActiveValue::Set(payer.id.clone()),
                balance_minor: ActiveValue::Set(new_balance),
                ..Default::default()
            };
            balance_update.update(&db_tx).await?;

            let wallet_source = match payer.kind.as_str() {
                "shared" => WalletSource::Shared,
                _ => WalletSource::Personal,
            };
            let payer_id = Uuid::parse_str(&payer.id)
                .map_err(|_| EngineError::KeyNotFound("account not exists".to_string()))?;
            let group_id = Uuid::new_v4();
            let description = normalize_optional_text(cmd.description.as_deref());

            let mut rows = Vec::with_capacity(resolved.len());
            for line in resolved {
                let product_id = Uuid::parse_str(&line.product.id)
                    .map_err(|_| EngineError::InvalidProduct(line.product.name.clone()))?;
                let tx = Transaction::new(
                    payer_id,
                    wallet_source,
                    -line.line_total_minor,
                    identity.user_id.clone(),
                    description.clone(),
                    Some(group_id),
                    TransactionDetail::Purchase {
                        product_id: Some(product_id),
                        quantity: Some(line.quantity),
                        shop_id: Some(cmd.shop_id.clone()),
                        event_id: line.event_id,
                    },
                    Utc::now(),
                )?;
                transactions::ActiveModel::from(&tx).insert(&db_tx).await?;
                self.apply_stock_delta(
                    &db_tx,
                    &line.product,
                    -(line.quantity as f64) * line.product.depletion_factor,
                )
                .await?;
                rows.push(tx);
            }

            tracing::info!(
                payer = %payer.id,
                total = %MoneyCents::new(total_minor),
                lines = rows.len(),
                "settled cart"
            );
            Ok(rows)
        })
    }

    /// The event to stamp on a sale of `product`, if any.
    ///
    /// Only an existing, open, commercial event qualifies; a stale link
    /// (deleted or closed event) stamps nothing. Rows stamped earlier keep
    /// their event id regardless of what happens to the link afterwards.
    async fn open_commercial_event(
        &self,
        db_tx: &DatabaseTransaction,
        product: &products::Model,
    ) -> ResultEngine<Option<Uuid>> {
        let Some(linked) = product.linked_event_id.as_deref() else {
            return Ok(None);
        };
        let Some(event) = events::Entity::find_by_id(linked.to_string())
            .one(db_tx)
            .await?
        else {
            return Ok(None);
        };
        if event.kind == "commercial" && event.status == "open" {
            let event_id = Uuid::parse_str(&event.id)
                .map_err(|_| EngineError::KeyNotFound("event not exists".to_string()))?;
            return Ok(Some(event_id));
        }
        Ok(None)
    }
}
