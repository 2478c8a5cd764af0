//! Catalog products, as seen by the purchase processor.
//!
//! Catalog CRUD lives outside this engine; the table is here so stock
//! decrements can join the purchase's storage transaction. Stock is a REAL
//! column: depletion factors may be fractional (e.g. a 0.5l tap from a 30l
//! keg) and stock is allowed to go negative rather than blocking a sale.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub shop_id: String,
    pub name: String,
    pub price_minor: i64,
    pub stock: f64,
    /// Stock units consumed per sold unit. Defaults to 1.0.
    pub depletion_factor: f64,
    pub self_service: bool,
    pub archived: bool,
    pub linked_event_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
