use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;
use crate::cache::{Partition, Record};
use crate::error::{DataError, DataResult};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(deserialize_with = "lenient::int_like")]
    pub id: i64,
    #[serde(deserialize_with = "lenient::int_like")]
    pub restaurant_id: i64,
    pub name: String,
    #[serde(deserialize_with = "lenient::int_like")]
    pub rating: i64,
    #[serde(default)]
    pub comments: String,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "updatedAt",
        default,
        deserialize_with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A review as submitted by a user, before the server assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub restaurant_id: i64,
    pub name: String,
    pub rating: i64,
    pub comments: String,
}

fn check_rating(rating: i64) -> DataResult<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(DataError::InvalidRecord(format!(
            "rating {} outside {}..={}",
            rating, MIN_RATING, MAX_RATING
        )))
    }
}

impl Review {
    pub fn validate(&self) -> DataResult<()> {
        check_rating(self.rating)
    }

    /// Build the locally numbered copy kept in the cache until the server responds.
    pub fn provisional(id: i64, draft: &NewReview, now: DateTime<Utc>) -> Self {
        Self {
            id,
            restaurant_id: draft.restaurant_id,
            name: draft.name.clone(),
            rating: draft.rating,
            comments: draft.comments.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

impl NewReview {
    pub fn validate(&self) -> DataResult<()> {
        if self.name.trim().is_empty() {
            return Err(DataError::InvalidRecord("reviewer name is empty".to_string()));
        }
        check_rating(self.rating)
    }
}

impl Record for Review {
    const PARTITION: Partition = Partition::Reviews;

    fn id(&self) -> i64 {
        self.id
    }
}
