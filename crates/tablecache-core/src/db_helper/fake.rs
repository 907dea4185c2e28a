//! In-memory stand-in for the restaurant server, counting every call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::api::{ApiError, RemoteCollection};
use crate::models::{NewReview, Restaurant, Review};

#[derive(Default)]
struct State {
    restaurants: Vec<Restaurant>,
    reviews: Vec<Review>,
    next_review_id: i64,
    failing: bool,
    favorites: Vec<(i64, bool)>,
}

#[derive(Default)]
pub struct Calls {
    pub list_restaurants: AtomicUsize,
    pub get_restaurant: AtomicUsize,
    pub list_reviews: AtomicUsize,
    pub create_review: AtomicUsize,
    pub update_review: AtomicUsize,
    pub delete_review: AtomicUsize,
    pub set_favorite: AtomicUsize,
}

impl Calls {
    pub fn total(&self) -> usize {
        [
            &self.list_restaurants,
            &self.get_restaurant,
            &self.list_reviews,
            &self.create_review,
            &self.update_review,
            &self.delete_review,
            &self.set_favorite,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<State>>,
    pub calls: Arc<Calls>,
}

impl FakeRemote {
    pub fn new(restaurants: Vec<Restaurant>, reviews: Vec<Review>) -> Self {
        let next_review_id = reviews.iter().map(|r| r.id).max().unwrap_or(0) + 100;
        Self {
            state: Arc::new(Mutex::new(State {
                restaurants,
                reviews,
                next_review_id,
                ..State::default()
            })),
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn reviews(&self) -> Vec<Review> {
        self.state.lock().unwrap().reviews.clone()
    }

    /// Delete a review server-side without going through the client.
    pub fn remove_review(&self, id: i64) {
        self.state.lock().unwrap().reviews.retain(|r| r.id != id);
    }

    pub fn favorites(&self) -> Vec<(i64, bool)> {
        self.state.lock().unwrap().favorites.clone()
    }

    /// Yield once so concurrent callers can observe the request in flight.
    async fn enter(&self, counter: &AtomicUsize) -> Result<(), ApiError> {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.state.lock().unwrap().failing {
            return Err(ApiError::ServerError("unavailable".to_string()));
        }
        Ok(())
    }
}

impl RemoteCollection for FakeRemote {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, ApiError> {
        self.enter(&self.calls.list_restaurants).await?;
        Ok(self.state.lock().unwrap().restaurants.clone())
    }

    async fn get_restaurant(&self, id: i64) -> Result<Restaurant, ApiError> {
        self.enter(&self.calls.get_restaurant).await?;
        self.state
            .lock()
            .unwrap()
            .restaurants
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("restaurant {}", id)))
    }

    async fn list_reviews(&self, restaurant_id: i64) -> Result<Vec<Review>, ApiError> {
        self.enter(&self.calls.list_reviews).await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .reviews
            .iter()
            .filter(|r| r.restaurant_id == restaurant_id)
            .cloned()
            .collect())
    }

    async fn create_review(&self, review: &NewReview) -> Result<Review, ApiError> {
        self.enter(&self.calls.create_review).await?;
        let mut state = self.state.lock().unwrap();
        let created = Review::provisional(state.next_review_id, review, Utc::now());
        state.next_review_id += 1;
        state.reviews.push(created.clone());
        Ok(created)
    }

    async fn update_review(&self, review: &Review) -> Result<Review, ApiError> {
        self.enter(&self.calls.update_review).await?;
        let mut state = self.state.lock().unwrap();
        let existing = state
            .reviews
            .iter_mut()
            .find(|r| r.id == review.id)
            .ok_or_else(|| ApiError::NotFound(format!("review {}", review.id)))?;
        *existing = review.clone();
        Ok(review.clone())
    }

    async fn delete_review(&self, id: i64) -> Result<(), ApiError> {
        self.enter(&self.calls.delete_review).await?;
        self.state.lock().unwrap().reviews.retain(|r| r.id != id);
        Ok(())
    }

    async fn set_favorite(&self, id: i64, value: bool) -> Result<(), ApiError> {
        self.enter(&self.calls.set_favorite).await?;
        let mut state = self.state.lock().unwrap();
        state.favorites.push((id, value));
        if let Some(r) = state.restaurants.iter_mut().find(|r| r.id == id) {
            r.is_favorite = value;
        }
        Ok(())
    }
}

pub fn restaurant(id: i64, cuisine: &str, neighborhood: &str) -> Restaurant {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": format!("Restaurant {}", id),
        "cuisine_type": cuisine,
        "neighborhood": neighborhood,
        "is_favorite": "false",
    }))
    .expect("test restaurant should parse")
}

pub fn review(id: i64, restaurant_id: i64, comments: &str) -> Review {
    Review {
        id,
        restaurant_id,
        name: "Tester".to_string(),
        rating: 4,
        comments: comments.to_string(),
        created_at: None,
        updated_at: None,
    }
}
