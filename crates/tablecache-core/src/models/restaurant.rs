use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;
use crate::cache::{Partition, Record};

/// Days in display order for operating hours.
const WEEK_DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Directory holding restaurant photographs on the site.
const IMAGE_DIR: &str = "/img";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub cuisine_type: String,
    #[serde(default)]
    pub latlng: Option<LatLng>,
    #[serde(default)]
    pub photograph: Option<String>,
    #[serde(default)]
    pub operating_hours: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::bool_like")]
    pub is_favorite: bool,
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

/// Everything a map widget needs to place a pin for a restaurant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub position: LatLng,
    pub title: String,
    pub url: String,
}

impl Restaurant {
    /// Relative URL of the restaurant's detail page.
    pub fn url(&self) -> String {
        format!("./restaurant.html?id={}", self.id)
    }

    /// Photograph URL, falling back to the id when no photograph is recorded.
    pub fn image_url(&self) -> String {
        match self.photograph.as_deref() {
            Some(photo) if !photo.is_empty() => format!("{}/{}.jpg", IMAGE_DIR, photo),
            _ => format!("{}/{}.jpg", IMAGE_DIR, self.id),
        }
    }

    pub fn map_marker(&self) -> Option<MapMarker> {
        self.latlng.map(|position| MapMarker {
            position,
            title: self.name.clone(),
            url: self.url(),
        })
    }

    /// Operating hours Monday through Sunday, then any unrecognized keys.
    pub fn hours_in_week_order(&self) -> Vec<(&str, &str)> {
        let mut hours: Vec<(&str, &str)> = WEEK_DAYS
            .iter()
            .filter_map(|day| {
                self.operating_hours
                    .get_key_value(*day)
                    .map(|(d, h)| (d.as_str(), h.as_str()))
            })
            .collect();

        hours.extend(
            self.operating_hours
                .iter()
                .filter(|(day, _)| !WEEK_DAYS.contains(&day.as_str()))
                .map(|(d, h)| (d.as_str(), h.as_str())),
        );
        hours
    }
}

impl Record for Restaurant {
    const PARTITION: Partition = Partition::Restaurants;

    fn id(&self) -> i64 {
        self.id
    }
}
