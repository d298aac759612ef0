use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::{profile, review},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Bounded retry with linear backoff for transient fetch failures.
///
/// Only the review list uses this; every other operation in the system
/// surfaces its first failure directly.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Added to the delay after every failed attempt
    pub delay_step: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_step: Duration::from_millis(200),
        }
    }
}

fn is_transient(error: &sea_orm::DbErr) -> bool {
    use sea_orm::DbErr;
    matches!(error, DbErr::ConnectionAcquire(_) | DbErr::Conn(_))
}

async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T, sea_orm::DbErr>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sea_orm::DbErr>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!("Fetch succeeded after {} attempts", attempts);
                }
                return Ok(result);
            }
            Err(error) => {
                if attempts >= config.max_attempts || !is_transient(&error) {
                    return Err(error);
                }
                let delay = config.delay_step * attempts;
                warn!(
                    "Fetch attempt {} failed: {}. Retrying in {:?}",
                    attempts, error, delay
                );
                sleep(delay).await;
            }
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewInput {
    #[validate(length(min = 1, message = "Item name is required"))]
    pub item_name: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
    #[validate(length(min = 1, message = "Comment is required"))]
    pub comment: String,
}

/// Reviews: list, create, like.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    retry: RetryConfig,
}

impl ReviewService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            retry,
        }
    }

    /// All reviews, newest first. Transient connection failures are
    /// retried a bounded number of times with linear backoff.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<review::Model>, ServiceError> {
        let db = self.db.clone();
        let reviews = with_retry(&self.retry, || {
            let db = db.clone();
            async move {
                review::Entity::find()
                    .order_by_desc(review::Column::CreatedAt)
                    .all(&*db)
                    .await
            }
        })
        .await?;
        Ok(reviews)
    }

    /// Creates a review for a registered identity, denormalizing the
    /// author's display name and role from the profile at write time.
    /// Later profile edits do not rewrite existing reviews.
    #[instrument(skip(self, auth, input), fields(user_id = %auth.user_id))]
    pub async fn create(
        &self,
        auth: &AuthUser,
        input: CreateReviewInput,
    ) -> Result<review::Model, ServiceError> {
        if auth.is_guest {
            return Err(ServiceError::Unauthorized(
                "Reviews require a registered account".to_string(),
            ));
        }
        input.validate()?;

        let profile_model = profile::Entity::find()
            .filter(profile::Column::UserId.eq(auth.user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Profile for user {} not found", auth.user_id))
            })?;

        let model = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(auth.user_id),
            user_name: Set(profile_model.full_name),
            user_role: Set(profile_model.role.as_str().to_string()),
            item_name: Set(input.item_name),
            rating: Set(input.rating),
            comment: Set(input.comment),
            likes: Set(0),
            created_at: Set(Utc::now()),
        };
        let model = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReviewCreated(model.id))
            .await;
        info!("Review {} created by {}", model.id, auth.user_id);
        Ok(model)
    }

    /// Increments a review's like counter.
    ///
    /// Deliberately unauthenticated and without per-viewer dedup: the
    /// same client may like the same review any number of times. The
    /// read-modify-write runs inside a transaction so concurrent likes
    /// don't lose increments.
    #[instrument(skip(self))]
    pub async fn like(&self, review_id: Uuid) -> Result<i32, ServiceError> {
        let txn = self.db.begin().await?;

        let model = review::Entity::find_by_id(review_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", review_id)))?;

        let likes = model.likes + 1;
        let mut active: review::ActiveModel = model.into();
        active.likes = Set(likes);
        active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ReviewLiked { review_id, likes })
            .await;
        Ok(likes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let config = RetryConfig {
            max_attempts: 3,
            delay_step: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sea_orm::DbErr::Conn(sea_orm::RuntimeErr::Internal("down".into()))) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failure() {
        let config = RetryConfig {
            max_attempts: 3,
            delay_step: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result = with_retry(&config, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(sea_orm::DbErr::Conn(sea_orm::RuntimeErr::Internal(
                        "hiccup".into(),
                    )))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.expect("second attempt succeeds"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let config = RetryConfig {
            max_attempts: 5,
            delay_step: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sea_orm::DbErr::Custom("constraint violation".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn review_input_validation() {
        let bad = CreateReviewInput {
            item_name: "".into(),
            rating: 6,
            comment: "".into(),
        };
        assert!(bad.validate().is_err());

        let good = CreateReviewInput {
            item_name: "Chicken Biryani".into(),
            rating: 5,
            comment: "Perfectly cooked, ordering again".into(),
        };
        assert!(good.validate().is_ok());
    }
}
