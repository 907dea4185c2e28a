//! Data models for the restaurant directory.
//!
//! - `Restaurant`: a listing with location, cuisine, hours and favorite flag
//! - `Review`, `NewReview`: stored reviews and user drafts
//!
//! Payloads from the server and the local cache are deserialized into
//! these schemas at the boundary; records that do not fit are rejected.

mod lenient;
pub mod restaurant;
pub mod review;

pub use restaurant::{LatLng, MapMarker, Restaurant};
pub use review::{NewReview, Review, MAX_RATING, MIN_RATING};
