use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    entities::menu_item::{self, Category, ItemType},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Menu catalog service.
///
/// The catalog is administered data: everyone reads it, only admins
/// mutate it. Items are immutable from a browsing session's point of
/// view; edits only affect carts on the next add.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMenuItemInput {
    /// Explicit id keeps seeded catalogs stable across environments
    pub id: Option<i32>,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub category: Category,
    pub price: Decimal,
    pub item_type: ItemType,
    #[validate(range(min = 0.0, max = 5.0, message = "Rating must be between 0 and 5"))]
    pub rating: f32,
    pub prep_time: String,
    pub description: String,
    #[serde(default)]
    pub is_special: bool,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMenuItemInput {
    pub name: Option<String>,
    pub category: Option<Category>,
    pub price: Option<Decimal>,
    pub item_type: Option<ItemType>,
    #[validate(range(min = 0.0, max = 5.0, message = "Rating must be between 0 and 5"))]
    pub rating: Option<f32>,
    pub prep_time: Option<String>,
    pub description: Option<String>,
    pub is_special: Option<bool>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuFilter {
    pub category: Option<Category>,
    pub item_type: Option<ItemType>,
    pub specials_only: Option<bool>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: MenuFilter) -> Result<Vec<menu_item::Model>, ServiceError> {
        let mut query = menu_item::Entity::find().order_by_asc(menu_item::Column::Id);
        if let Some(category) = filter.category {
            query = query.filter(menu_item::Column::Category.eq(category));
        }
        if let Some(item_type) = filter.item_type {
            query = query.filter(menu_item::Column::ItemType.eq(item_type));
        }
        if filter.specials_only.unwrap_or(false) {
            query = query.filter(menu_item::Column::IsSpecial.eq(true));
        }
        Ok(query.all(&*self.db).await?)
    }

    pub async fn get(&self, id: i32) -> Result<menu_item::Model, ServiceError> {
        menu_item::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Menu item {} not found", id)))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateMenuItemInput) -> Result<menu_item::Model, ServiceError> {
        input.validate()?;
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must not be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let mut active = menu_item::ActiveModel {
            name: Set(input.name),
            category: Set(input.category),
            price: Set(input.price),
            item_type: Set(input.item_type),
            rating: Set(input.rating),
            prep_time: Set(input.prep_time),
            description: Set(input.description),
            is_special: Set(input.is_special),
            image_url: Set(input.image_url),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        if let Some(id) = input.id {
            active.id = Set(id);
        }

        let model = active.insert(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::MenuItemCreated(model.id))
            .await;
        info!("Created menu item {} ({})", model.id, model.name);
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i32,
        input: UpdateMenuItemInput,
    ) -> Result<menu_item::Model, ServiceError> {
        input.validate()?;
        if let Some(price) = input.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price must not be negative".to_string(),
                ));
            }
        }

        let model = self.get(id).await?;
        let mut active: menu_item::ActiveModel = model.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(category) = input.category {
            active.category = Set(category);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(item_type) = input.item_type {
            active.item_type = Set(item_type);
        }
        if let Some(rating) = input.rating {
            active.rating = Set(rating);
        }
        if let Some(prep_time) = input.prep_time {
            active.prep_time = Set(prep_time);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(is_special) = input.is_special {
            active.is_special = Set(is_special);
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(image_url);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::MenuItemUpdated(id))
            .await;
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let model = self.get(id).await?;
        let name = model.name.clone();
        menu_item::Entity::delete_by_id(model.id)
            .exec(&*self.db)
            .await?;
        self.event_sender
            .send_or_log(Event::MenuItemDeleted(id))
            .await;
        info!("Deleted menu item {} ({})", id, name);
        Ok(())
    }
}
