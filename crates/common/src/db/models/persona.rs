//! Persona registry entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::Persona;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "personas")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub display_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub profile: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Persona {
    fn from(row: Model) -> Self {
        Persona {
            id: row.id,
            display_name: row.display_name,
            profile: row.profile,
            created_at: row.created_at.with_timezone(&chrono::Utc),
        }
    }
}
