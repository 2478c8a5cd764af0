//! Command structs for engine operations.
//!
//! These types group parameters for write operations (purchase, transfer,
//! adjustment batch, top-up, event and expense creation), keeping call sites
//! readable and avoiding long argument lists.

use uuid::Uuid;

use crate::EventKind;

/// One cart line of a purchase.
#[derive(Clone, Debug)]
pub struct PurchaseLine {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Record a cart purchase against a payer account.
#[derive(Clone, Debug)]
pub struct PurchaseCmd {
    /// Account debited for the whole cart (personal wallet or shared purse).
    pub payer_account_id: Uuid,
    /// Member receiving the goods; equals the issuer on self-checkout.
    pub recipient_user_id: String,
    pub shop_id: String,
    pub lines: Vec<PurchaseLine>,
    pub description: Option<String>,
}

impl PurchaseCmd {
    #[must_use]
    pub fn new(
        payer_account_id: Uuid,
        recipient_user_id: impl Into<String>,
        shop_id: impl Into<String>,
    ) -> Self {
        Self {
            payer_account_id,
            recipient_user_id: recipient_user_id.into(),
            shop_id: shop_id.into(),
            lines: Vec::new(),
            description: None,
        }
    }

    #[must_use]
    pub fn line(mut self, product_id: Uuid, quantity: i64) -> Self {
        self.lines.push(PurchaseLine {
            product_id,
            quantity,
        });
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Move money between two accounts.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_minor: i64,
    pub description: Option<String>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(from_account_id: Uuid, to_account_id: Uuid, amount_minor: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount_minor,
            description: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Apply one signed correction to a list of accounts.
#[derive(Clone, Debug)]
pub struct AdjustmentBatchCmd {
    pub target_account_ids: Vec<Uuid>,
    pub amount_minor: i64,
    pub description: String,
}

impl AdjustmentBatchCmd {
    #[must_use]
    pub fn new(
        target_account_ids: Vec<Uuid>,
        amount_minor: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            target_account_ids,
            amount_minor,
            description: description.into(),
        }
    }
}

/// Credit an account with cash collected at the counter.
#[derive(Clone, Debug)]
pub struct TopUpCmd {
    pub account_id: Uuid,
    pub amount_minor: i64,
    /// Shop whose till took the cash; grants `Sell` there authorize the
    /// top-up for non-admins.
    pub shop_id: Option<String>,
    pub description: Option<String>,
}

impl TopUpCmd {
    #[must_use]
    pub fn new(account_id: Uuid, amount_minor: i64) -> Self {
        Self {
            account_id,
            amount_minor,
            shop_id: None,
            description: None,
        }
    }

    #[must_use]
    pub fn shop_id(mut self, shop_id: impl Into<String>) -> Self {
        self.shop_id = Some(shop_id.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Create an event.
#[derive(Clone, Debug)]
pub struct EventCmd {
    pub shop_id: String,
    pub name: String,
    pub kind: EventKind,
    pub deposit_minor: i64,
    pub allow_self_registration: bool,
}

impl EventCmd {
    #[must_use]
    pub fn new(shop_id: impl Into<String>, name: impl Into<String>, kind: EventKind) -> Self {
        Self {
            shop_id: shop_id.into(),
            name: name.into(),
            kind,
            deposit_minor: 0,
            allow_self_registration: false,
        }
    }

    #[must_use]
    pub fn deposit_minor(mut self, deposit_minor: i64) -> Self {
        self.deposit_minor = deposit_minor;
        self
    }

    #[must_use]
    pub fn allow_self_registration(mut self, allow: bool) -> Self {
        self.allow_self_registration = allow;
        self
    }
}

/// Record a pooled expense.
#[derive(Clone, Debug)]
pub struct ExpenseCmd {
    pub shop_id: String,
    pub amount_minor: i64,
    pub description: String,
    /// Direct event attribution; leave `None` to split later.
    pub event_id: Option<Uuid>,
}

impl ExpenseCmd {
    #[must_use]
    pub fn new(
        shop_id: impl Into<String>,
        amount_minor: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            shop_id: shop_id.into(),
            amount_minor,
            description: description.into(),
            event_id: None,
        }
    }

    #[must_use]
    pub fn event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = Some(event_id);
        self
    }
}
