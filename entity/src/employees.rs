use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row of the `employees` table. Pay is never stored; it is derived from
/// `hours` and `rate` when the row is displayed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub hours: i32,
    #[sea_orm(column_type = "Double")]
    pub rate: f64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("no relations")
    }
}

impl ActiveModelBehavior for ActiveModel {}
