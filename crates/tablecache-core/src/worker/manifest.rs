use reqwest::Url;

use crate::api::ApiError;

/// The root document, always part of the manifest.
pub const ROOT: &str = "/";

/// Paths the asset worker pre-caches and serves from its cache.
#[derive(Debug, Clone)]
pub struct AssetManifest {
    origin: Url,
    entries: Vec<String>,
}

impl AssetManifest {
    /// Build a manifest for `origin`. The root document is appended if the
    /// list does not already contain it.
    pub fn new(origin: &str, assets: &[String]) -> Result<Self, ApiError> {
        let origin = Url::parse(origin).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", origin, e)))?;
        let mut entries: Vec<String> = Vec::with_capacity(assets.len() + 1);
        for asset in assets {
            if !entries.contains(asset) {
                entries.push(asset.clone());
            }
        }
        if !entries.iter().any(|e| e == ROOT) {
            entries.push(ROOT.to_string());
        }
        Ok(Self { origin, entries })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Whether requests for `url` go through the cache. The root entry
    /// matches only `/`; every other entry matches as a path prefix.
    pub fn matches(&self, url: &Url) -> bool {
        let path = url.path();
        self.entries.iter().any(|entry| {
            if entry == ROOT {
                path == ROOT
            } else {
                path.starts_with(entry.as_str())
            }
        })
    }

    /// Absolute URLs fetched at install time.
    pub fn install_urls(&self) -> Result<Vec<Url>, ApiError> {
        self.entries
            .iter()
            .map(|entry| {
                self.origin
                    .join(entry)
                    .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", entry, e)))
            })
            .collect()
    }

    /// Resolve a request path or absolute URL against the origin.
    pub fn resolve(&self, target: &str) -> Result<Url, ApiError> {
        self.origin
            .join(target)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", target, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> AssetManifest {
        AssetManifest::new(
            "http://localhost:8000",
            &["/index.html".to_string(), "/css/".to_string(), "/img/".to_string()],
        )
        .unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_root_always_included_once() {
        let m = manifest();
        assert_eq!(m.entries(), ["/index.html", "/css/", "/img/", "/"]);

        let with_root =
            AssetManifest::new("http://localhost:8000", &["/".to_string(), "/".to_string()]).unwrap();
        assert_eq!(with_root.entries(), ["/"]);
    }

    #[test]
    fn test_matches_by_path_prefix() {
        let m = manifest();
        assert!(m.matches(&url("http://localhost:8000/css/styles.css")));
        assert!(m.matches(&url("http://localhost:8000/img/1.jpg?w=400")));
        assert!(m.matches(&url("http://localhost:8000/index.html")));
        assert!(!m.matches(&url("http://localhost:8000/restaurant.html?id=3")));
    }

    #[test]
    fn test_root_matches_exactly() {
        let m = manifest();
        assert!(m.matches(&url("http://localhost:8000/")));
        assert!(!m.matches(&url("http://localhost:1337/restaurants")));
        assert!(!m.matches(&url("http://localhost:8000/js/main.js")));
    }

    #[test]
    fn test_install_urls_are_absolute() {
        let urls = manifest().install_urls().unwrap();
        assert_eq!(urls.len(), 4);
        assert_eq!(urls[0].as_str(), "http://localhost:8000/index.html");
        assert_eq!(urls[3].as_str(), "http://localhost:8000/");
    }

    #[test]
    fn test_invalid_origin() {
        assert!(matches!(
            AssetManifest::new("not a url", &[]),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
