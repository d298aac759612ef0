use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Menu item entity for the canteen catalog
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "menu_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub category: Category,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    pub item_type: ItemType,
    pub rating: f32,
    pub prep_time: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub is_special: bool,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Fixed category set for the canteen menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum Category {
    #[sea_orm(string_value = "Breakfast")]
    Breakfast,
    #[sea_orm(string_value = "Main Course")]
    MainCourse,
    #[sea_orm(string_value = "Snacks")]
    Snacks,
    #[sea_orm(string_value = "Beverages")]
    Beverages,
    #[sea_orm(string_value = "Desserts")]
    Desserts,
}

/// Veg / Non-Veg marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum ItemType {
    #[sea_orm(string_value = "Veg")]
    Veg,
    #[sea_orm(string_value = "Non-Veg")]
    NonVeg,
}
