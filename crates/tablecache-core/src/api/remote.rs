use std::future::Future;

use super::ApiError;
use crate::models::{NewReview, Restaurant, Review};

/// Operations the coordinator needs from the remote restaurant/review collection.
///
/// Implementations must be cheap to clone: fire-and-forget writes move a
/// clone into a background task.
pub trait RemoteCollection: Clone + Send + Sync + 'static {
    fn list_restaurants(&self) -> impl Future<Output = Result<Vec<Restaurant>, ApiError>> + Send;

    fn get_restaurant(&self, id: i64) -> impl Future<Output = Result<Restaurant, ApiError>> + Send;

    fn list_reviews(
        &self,
        restaurant_id: i64,
    ) -> impl Future<Output = Result<Vec<Review>, ApiError>> + Send;

    fn create_review(
        &self,
        review: &NewReview,
    ) -> impl Future<Output = Result<Review, ApiError>> + Send;

    fn update_review(&self, review: &Review) -> impl Future<Output = Result<Review, ApiError>> + Send;

    fn delete_review(&self, id: i64) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn set_favorite(&self, id: i64, value: bool) -> impl Future<Output = Result<(), ApiError>> + Send;
}
