//! Derived views over a restaurant list. Nothing here mutates its input.

use std::collections::HashSet;

use crate::models::Restaurant;

/// Filter value that disables a filter.
pub const ALL: &str = "all";

/// A filter selection from the UI: everything, or one exact value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Only(String),
}

impl Selection {
    pub fn parse(value: &str) -> Self {
        if value == ALL {
            Selection::All
        } else {
            Selection::Only(value.to_string())
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => wanted == value,
        }
    }
}

impl From<&str> for Selection {
    fn from(value: &str) -> Self {
        Selection::parse(value)
    }
}

/// Restaurants matching both selections, in input order.
pub fn filter_restaurants(
    restaurants: &[Restaurant],
    cuisine: &Selection,
    neighborhood: &Selection,
) -> Vec<Restaurant> {
    restaurants
        .iter()
        .filter(|r| cuisine.matches(&r.cuisine_type))
        .filter(|r| neighborhood.matches(&r.neighborhood))
        .cloned()
        .collect()
}

/// Distinct values in order of first occurrence.
pub fn distinct<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

pub fn neighborhoods(restaurants: &[Restaurant]) -> Vec<String> {
    distinct(restaurants.iter().map(|r| r.neighborhood.as_str()))
}

pub fn cuisines(restaurants: &[Restaurant]) -> Vec<String> {
    distinct(restaurants.iter().map(|r| r.cuisine_type.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restaurant(id: i64, cuisine: &str, neighborhood: &str) -> Restaurant {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("Restaurant {}", id),
            "cuisine_type": cuisine,
            "neighborhood": neighborhood,
        }))
        .unwrap()
    }

    fn sample() -> Vec<Restaurant> {
        vec![
            restaurant(1, "Asian", "Manhattan"),
            restaurant(2, "Pizza", "Brooklyn"),
            restaurant(3, "Asian", "Queens"),
            restaurant(4, "American", "Manhattan"),
            restaurant(5, "Pizza", "Manhattan"),
        ]
    }

    fn ids(restaurants: &[Restaurant]) -> Vec<i64> {
        restaurants.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_selection_parse() {
        assert_eq!(Selection::parse("all"), Selection::All);
        assert_eq!(Selection::parse("All"), Selection::Only("All".to_string()));
        assert!(Selection::All.matches("anything"));
        assert!(!Selection::from("Pizza").matches("Asian"));
    }

    #[test]
    fn test_all_all_is_identity() {
        let base = sample();
        let filtered = filter_restaurants(&base, &Selection::All, &Selection::All);
        assert_eq!(filtered, base);
    }

    #[test]
    fn test_filters_compose() {
        let base = sample();
        let cuisine = Selection::from("Pizza");
        let hood = Selection::from("Manhattan");

        assert_eq!(ids(&filter_restaurants(&base, &cuisine, &Selection::All)), vec![2, 5]);
        assert_eq!(ids(&filter_restaurants(&base, &Selection::All, &hood)), vec![1, 4, 5]);
        assert_eq!(ids(&filter_restaurants(&base, &cuisine, &hood)), vec![5]);
        assert!(filter_restaurants(&base, &Selection::from("Thai"), &hood).is_empty());

        // input untouched
        assert_eq!(base, sample());
    }

    #[test]
    fn test_distinct_preserves_first_occurrence() {
        let base = sample();
        assert_eq!(neighborhoods(&base), vec!["Manhattan", "Brooklyn", "Queens"]);
        assert_eq!(cuisines(&base), vec!["Asian", "Pizza", "American"]);
        assert!(neighborhoods(&[]).is_empty());
    }
}
