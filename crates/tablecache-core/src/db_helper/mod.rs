//! Data access coordinator.
//!
//! `DbHelper` is the single entry point for the UI's restaurant and review
//! data. Reads prefer the local cache and fall back to the remote
//! collection, backfilling the cache. Writes go to the remote collection
//! and are mirrored into the cache best-effort. Cache failures are logged
//! and never reach the caller.

pub mod filters;

#[cfg(test)]
mod fake;

use std::future::Future;
use std::sync::{Mutex as StdMutex, PoisonError};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, RemoteCollection};
use crate::cache::{CacheMode, LocalStore, Record, TransactionMode};
use crate::error::{DataError, DataResult};
use crate::models::{NewReview, Restaurant, Review};
use crate::network::NetworkStatus;
use filters::Selection;

type SharedFetch<T> = Shared<BoxFuture<'static, DataResult<T>>>;

/// Coordinates the local cache and the remote collection.
///
/// Construct one per application and share it by reference.
pub struct DbHelper<R = ApiClient> {
    remote: R,
    cache: CacheMode,
    network: NetworkStatus,
    restaurants_in_flight: Mutex<Option<SharedFetch<Vec<Restaurant>>>>,
    background: StdMutex<JoinSet<()>>,
}

impl<R: RemoteCollection> DbHelper<R> {
    pub fn new(remote: R, cache: CacheMode, network: NetworkStatus) -> Self {
        Self {
            remote,
            cache,
            network,
            restaurants_in_flight: Mutex::new(None),
            background: StdMutex::new(JoinSet::new()),
        }
    }

    pub fn cache(&self) -> &CacheMode {
        &self.cache
    }

    pub fn network(&self) -> &NetworkStatus {
        &self.network
    }

    // ===== Restaurants =====

    /// All restaurants: the cached partition when it has entries, otherwise
    /// the remote list. Concurrent callers share one remote request.
    pub async fn fetch_restaurants(&self) -> DataResult<Vec<Restaurant>> {
        if let Some(store) = self.cache.store() {
            match store.get_all::<Restaurant>().await {
                Ok(cached) if !cached.is_empty() => {
                    debug!(count = cached.len(), "Serving restaurants from local cache");
                    return Ok(cached);
                }
                Ok(_) => debug!("Restaurant cache empty"),
                Err(e) => warn!(error = %e, "Failed to read restaurant cache, using remote"),
            }
        }

        let fetch = {
            let mut in_flight = self.restaurants_in_flight.lock().await;
            match in_flight.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight restaurant fetch");
                    pending.clone()
                }
                None => {
                    let pending =
                        load_remote_restaurants(self.remote.clone(), self.cache.clone())
                            .boxed()
                            .shared();
                    *in_flight = Some(pending.clone());
                    pending
                }
            }
        };

        let result = fetch.clone().await;

        {
            let mut in_flight = self.restaurants_in_flight.lock().await;
            if in_flight.as_ref().is_some_and(|p| p.ptr_eq(&fetch)) {
                *in_flight = None;
            }
        }

        if let Err(ref e) = result {
            warn!(error = %e, "Failed to fetch restaurants");
        }
        result
    }

    /// Look up a restaurant by an id as it arrives from a URL or form.
    pub async fn fetch_restaurant_by_id(&self, id: &str) -> DataResult<Restaurant> {
        let key: i64 = id
            .trim()
            .parse()
            .map_err(|_| DataError::InvalidId(id.to_string()))?;
        self.fetch_restaurant(key).await
    }

    pub async fn fetch_restaurant(&self, id: i64) -> DataResult<Restaurant> {
        if let Some(store) = self.cache.store() {
            match store.get::<Restaurant>(id).await {
                Ok(Some(restaurant)) => {
                    debug!(restaurant_id = id, "Serving restaurant from local cache");
                    return Ok(restaurant);
                }
                Ok(None) => debug!(restaurant_id = id, "Restaurant not cached"),
                Err(e) => warn!(restaurant_id = id, error = %e, "Failed to read restaurant cache, using remote"),
            }
        }

        match self.remote.get_restaurant(id).await {
            Ok(restaurant) => {
                mirror(&self.cache, std::slice::from_ref(&restaurant)).await;
                Ok(restaurant)
            }
            Err(e) if e.is_not_found() => Err(DataError::NotFound(id)),
            Err(e) => {
                warn!(restaurant_id = id, error = %e, "Failed to fetch restaurant");
                Err(e.into())
            }
        }
    }

    /// Restaurants filtered by cuisine and neighborhood; `"all"` disables a filter.
    pub async fn fetch_restaurant_by_cuisine_and_neighborhood(
        &self,
        cuisine: &str,
        neighborhood: &str,
    ) -> DataResult<Vec<Restaurant>> {
        let restaurants = self.fetch_restaurants().await?;
        Ok(filters::filter_restaurants(
            &restaurants,
            &Selection::parse(cuisine),
            &Selection::parse(neighborhood),
        ))
    }

    pub async fn fetch_neighborhoods(&self) -> DataResult<Vec<String>> {
        let restaurants = self.fetch_restaurants().await?;
        Ok(filters::neighborhoods(&restaurants))
    }

    pub async fn fetch_cuisines(&self) -> DataResult<Vec<String>> {
        let restaurants = self.fetch_restaurants().await?;
        Ok(filters::cuisines(&restaurants))
    }

    /// Mark a restaurant as favorite or not. Runs in the background; failures
    /// are logged only.
    pub async fn toggle_restaurant_favorite(&self, id: i64, value: bool) {
        let remote = self.remote.clone();
        let cache = self.cache.clone();

        self.spawn_background(async move {
            if let Some(store) = cache.store() {
                if let Err(e) = set_cached_favorite(store, id, value).await {
                    warn!(restaurant_id = id, error = %e, "Failed to update cached favorite flag");
                }
            }
            match remote.set_favorite(id, value).await {
                Ok(()) => debug!(restaurant_id = id, value, "Favorite flag updated"),
                Err(e) => error!(restaurant_id = id, error = %e, "Failed to update favorite flag"),
            }
        });
    }

    // ===== Reviews =====

    /// Reviews for a restaurant. Fresh from the remote whenever online (or
    /// when there is no cache); from the cache when offline. A fresh list
    /// replaces that restaurant's cached reviews, so reviews deleted on the
    /// server do not reappear offline.
    pub async fn fetch_reviews(&self, restaurant_id: i64) -> DataResult<Vec<Review>> {
        let offline_store = if self.network.is_online() {
            None
        } else {
            self.cache.store()
        };

        if let Some(store) = offline_store {
            match store.get_all::<Review>().await {
                Ok(all) => {
                    let reviews: Vec<Review> = all
                        .into_iter()
                        .filter(|r| r.restaurant_id == restaurant_id)
                        .collect();
                    debug!(restaurant_id, count = reviews.len(), "Offline, serving cached reviews");
                    return Ok(reviews);
                }
                Err(e) => warn!(restaurant_id, error = %e, "Failed to read review cache, using remote"),
            }
        }

        let reviews = self
            .remote
            .list_reviews(restaurant_id)
            .await
            .map_err(|e| {
                warn!(restaurant_id, error = %e, "Failed to fetch reviews");
                DataError::from(e)
            })?;
        if let Some(store) = self.cache.store() {
            match sync_reviews(store, restaurant_id, &reviews).await {
                Ok(removed) => debug!(restaurant_id, removed, "Synced cached reviews"),
                Err(e) => warn!(restaurant_id, error = %e, "Failed to sync cached reviews"),
            }
        }
        Ok(reviews)
    }

    /// Submit a review. A provisional copy numbered after the highest cached
    /// id is written to the cache in the background so the review shows up
    /// offline; once the server answers, that copy is replaced by the
    /// server's record.
    pub async fn post_review(&self, draft: NewReview) -> DataResult<Review> {
        draft.validate()?;

        let (created_tx, created_rx) = oneshot::channel::<Review>();
        if let Some(store) = self.cache.store().cloned() {
            let draft = draft.clone();
            self.spawn_background(async move {
                let Some(provisional) = insert_provisional(&store, &draft).await else {
                    return;
                };
                // Sender dropped means the server never accepted it: keep the copy.
                if let Ok(created) = created_rx.await {
                    if let Err(e) = replace_provisional(&store, &provisional, &created).await {
                        warn!(review_id = created.id, error = %e, "Failed to reconcile provisional review");
                    }
                }
            });
        }

        match self.remote.create_review(&draft).await {
            Ok(created) => {
                info!(review_id = created.id, restaurant_id = created.restaurant_id, "Review posted");
                let _ = created_tx.send(created.clone());
                Ok(created)
            }
            Err(e) => {
                warn!(restaurant_id = draft.restaurant_id, error = %e, "Failed to post review");
                Err(e.into())
            }
        }
    }

    /// Update a review on both sides. The cache is written first and is not
    /// rolled back if the remote update fails.
    pub async fn edit_review(&self, mut review: Review) -> DataResult<Review> {
        review.validate()?;
        review.updated_at = Some(Utc::now());

        mirror(&self.cache, std::slice::from_ref(&review)).await;

        let updated = self.remote.update_review(&review).await.map_err(|e| {
            warn!(review_id = review.id, error = %e, "Failed to update review");
            DataError::from(e)
        })?;
        mirror(&self.cache, std::slice::from_ref(&updated)).await;
        Ok(updated)
    }

    /// Delete a review on both sides. The cached copy is removed whether or
    /// not the remote delete succeeds.
    pub async fn delete_review(&self, id: i64) -> DataResult<()> {
        if let Some(store) = self.cache.store() {
            match store.delete::<Review>(id).await {
                Ok(removed) => debug!(review_id = id, removed, "Removed review from local cache"),
                Err(e) => warn!(review_id = id, error = %e, "Failed to remove review from local cache"),
            }
        }

        self.remote.delete_review(id).await.map_err(|e| {
            warn!(review_id = id, error = %e, "Failed to delete review");
            DataError::from(e)
        })
    }

    // ===== Background work =====

    fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    /// Wait for every fire-and-forget task spawned so far.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(
            &mut *self.background.lock().unwrap_or_else(PoisonError::into_inner),
        );
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Background task failed");
            }
        }
    }
}

async fn load_remote_restaurants<R: RemoteCollection>(
    remote: R,
    cache: CacheMode,
) -> DataResult<Vec<Restaurant>> {
    let restaurants = remote.list_restaurants().await?;
    info!(count = restaurants.len(), "Fetched restaurants from remote");
    mirror(&cache, &restaurants).await;
    Ok(restaurants)
}

/// Best-effort upsert of records into the cache.
async fn mirror<T: Record>(cache: &CacheMode, records: &[T]) {
    let Some(store) = cache.store() else {
        return;
    };
    if records.is_empty() {
        return;
    }
    if let Err(e) = store.put_all(records).await {
        warn!(partition = %T::PARTITION, error = %e, "Failed to mirror records into local cache");
    }
}

/// Make the cached reviews for `restaurant_id` match `fresh`. Returns how
/// many stale entries were dropped.
async fn sync_reviews(store: &LocalStore, restaurant_id: i64, fresh: &[Review]) -> anyhow::Result<usize> {
    let mut tx = store.transaction::<Review>(TransactionMode::ReadWrite).await?;
    let stale: Vec<i64> = tx
        .get_all()
        .into_iter()
        .filter(|cached| cached.restaurant_id == restaurant_id)
        .filter(|cached| !fresh.iter().any(|r| r.id == cached.id))
        .map(|cached| cached.id)
        .collect();
    for id in &stale {
        tx.delete(*id)?;
    }
    for review in fresh {
        tx.put(review.clone())?;
    }
    tx.commit()?;
    Ok(stale.len())
}

async fn set_cached_favorite(store: &LocalStore, id: i64, value: bool) -> anyhow::Result<()> {
    let mut tx = store.transaction::<Restaurant>(TransactionMode::ReadWrite).await?;
    if let Some(mut restaurant) = tx.get(id).cloned() {
        restaurant.is_favorite = value;
        tx.put(restaurant)?;
    }
    tx.commit()
}

async fn insert_provisional(store: &LocalStore, draft: &NewReview) -> Option<Review> {
    match write_provisional(store, draft).await {
        Ok(provisional) => {
            debug!(review_id = provisional.id, "Cached provisional review");
            Some(provisional)
        }
        Err(e) => {
            warn!(error = %e, "Failed to cache provisional review");
            None
        }
    }
}

async fn write_provisional(store: &LocalStore, draft: &NewReview) -> anyhow::Result<Review> {
    let mut tx = store.transaction::<Review>(TransactionMode::ReadWrite).await?;
    let id = tx.max_id().unwrap_or(0) + 1;
    let provisional = Review::provisional(id, draft, Utc::now());
    tx.put(provisional.clone())?;
    tx.commit()?;
    Ok(provisional)
}

/// Swap the provisional copy for the server's record. The provisional entry
/// is only removed if nothing has overwritten it in the meantime.
async fn replace_provisional(
    store: &LocalStore,
    provisional: &Review,
    created: &Review,
) -> anyhow::Result<()> {
    let mut tx = store.transaction::<Review>(TransactionMode::ReadWrite).await?;
    if provisional.id != created.id {
        warn!(
            provisional_id = provisional.id,
            remote_id = created.id,
            "Provisional review id differs from server id"
        );
        if tx.get(provisional.id) == Some(provisional) {
            tx.delete(provisional.id)?;
        }
    }
    tx.put(created.clone())?;
    tx.commit()
}
