use chrono::{Datelike, DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{profile, profile::Role, user},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Profile joined with its account for the admin user list
#[derive(Debug, Clone, Serialize)]
pub struct UserWithAccount {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub roll_number: Option<String>,
    pub photo_url: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub year_of_study: Option<i16>,
    pub branch: Option<String>,
    pub active: bool,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn join_row(profile_model: profile::Model, user_model: user::Model) -> UserWithAccount {
    UserWithAccount {
        user_id: user_model.id,
        full_name: profile_model.full_name,
        email: user_model.email,
        phone: profile_model.phone,
        role: profile_model.role,
        roll_number: profile_model.roll_number,
        photo_url: profile_model.photo_url,
        date_of_birth: profile_model.date_of_birth,
        year_of_study: profile_model.year_of_study,
        branch: profile_model.branch,
        active: user_model.active,
        email_confirmed_at: user_model.email_confirmed_at,
        created_at: user_model.created_at,
    }
}

/// Membership counters for the admin dashboard
#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total: u64,
    pub students: u64,
    pub teachers: u64,
    pub admins: u64,
    pub new_this_month: u64,
}

/// Fields a registered user may edit on their own profile
#[derive(Debug, serde::Deserialize)]
pub struct UpdateProfileInput {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub roll_number: Option<String>,
    pub photo_url: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub year_of_study: Option<i16>,
    pub branch: Option<String>,
}

/// User administration and profile management.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// All registered users with their account state, newest first (admin)
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<UserWithAccount>, ServiceError> {
        let rows = profile::Entity::find()
            .find_also_related(user::Entity)
            .order_by_desc(profile::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(p, u)| u.map(|u| join_row(p, u)))
            .collect())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserWithAccount, ServiceError> {
        let profile_model = self.load_profile(user_id).await?;
        let user_model = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
        Ok(join_row(profile_model, user_model))
    }

    /// Changes a user's role (admin)
    #[instrument(skip(self))]
    pub async fn update_role(&self, user_id: Uuid, role: Role) -> Result<(), ServiceError> {
        let profile_model = self.load_profile(user_id).await?;

        let mut active: profile::ActiveModel = profile_model.into();
        active.role = Set(role);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::UserRoleChanged { user_id, role })
            .await;
        info!("User {} role set to {}", user_id, role.as_str());
        Ok(())
    }

    /// Deletes a user and their profile (admin). Placed orders are kept
    /// for the books; they reference the user id historically.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let deleted = profile::Entity::delete_many()
            .filter(profile::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        let user_deleted = user::Entity::delete_by_id(user_id).exec(&txn).await?;

        if deleted.rows_affected == 0 && user_deleted.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }

        txn.commit().await?;

        self.event_sender.send_or_log(Event::UserDeleted(user_id)).await;
        info!("Deleted user {}", user_id);
        Ok(())
    }

    /// Fetches the caller's own profile
    pub async fn profile_for(&self, user_id: Uuid) -> Result<profile::Model, ServiceError> {
        self.load_profile(user_id).await
    }

    /// Self-service profile update; role changes go through `update_role`
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<profile::Model, ServiceError> {
        let profile_model = self.load_profile(user_id).await?;
        let mut active: profile::ActiveModel = profile_model.into();

        if let Some(full_name) = input.full_name {
            if full_name.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "Full name must not be empty".to_string(),
                ));
            }
            active.full_name = Set(full_name);
        }
        if let Some(phone) = input.phone {
            if phone.len() != 10 {
                return Err(ServiceError::ValidationError(
                    "Phone number must be 10 digits".to_string(),
                ));
            }
            active.phone = Set(phone);
        }
        if let Some(roll_number) = input.roll_number {
            active.roll_number = Set(Some(roll_number));
        }
        if let Some(photo_url) = input.photo_url {
            active.photo_url = Set(Some(photo_url));
        }
        if let Some(date_of_birth) = input.date_of_birth {
            active.date_of_birth = Set(Some(date_of_birth));
        }
        if let Some(year_of_study) = input.year_of_study {
            active.year_of_study = Set(Some(year_of_study));
        }
        if let Some(branch) = input.branch {
            active.branch = Set(Some(branch));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db).await?)
    }

    /// Membership counters (admin)
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<UserStats, ServiceError> {
        let profiles = profile::Entity::find().all(&*self.db).await?;

        let now = Utc::now();
        let mut stats = UserStats {
            total: profiles.len() as u64,
            students: 0,
            teachers: 0,
            admins: 0,
            new_this_month: 0,
        };

        for p in &profiles {
            match p.role {
                Role::Student => stats.students += 1,
                Role::Teacher => stats.teachers += 1,
                Role::Admin => stats.admins += 1,
            }
            if p.created_at.year() == now.year() && p.created_at.month() == now.month() {
                stats.new_this_month += 1;
            }
        }

        Ok(stats)
    }

    async fn load_profile(&self, user_id: Uuid) -> Result<profile::Model, ServiceError> {
        profile::Entity::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Profile for user {} not found", user_id)))
    }
}
