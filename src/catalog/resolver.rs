use crate::api::client::AemetApi;
use crate::cache::{CacheError, JsonCache};
use crate::catalog::entry::{canonical_code, Catalog, CatalogEntry, CatalogKind};
use crate::catalog::error::CatalogError;
use crate::catalog::geodesic::geodesic_km;
use crate::catalog::nearest::{nearest_linear, NearestStrategy, SpatialIndex};
use crate::types::location::Location;
use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use std::sync::Arc;

const PERSIST_INTERVAL_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
enum Nearest {
    Unresolved,
    /// A code supplied by configuration that has not been looked up yet.
    Pinned(String),
    Resolved {
        entry: CatalogEntry,
        distance_km: Option<f64>,
        pinned: bool,
    },
}

/// Keeps one catalog fresh and answers nearest-entry queries against it.
#[derive(Debug)]
pub struct CatalogResolver {
    kind: CatalogKind,
    api: Arc<AemetApi>,
    cache: JsonCache,
    strategy: NearestStrategy,
    catalog: Option<Catalog>,
    index: Option<SpatialIndex>,
    nearest: Nearest,
    last_persisted: Option<DateTime<Utc>>,
}

impl CatalogResolver {
    pub fn new(kind: CatalogKind, api: Arc<AemetApi>, cache: JsonCache) -> Self {
        Self {
            kind,
            api,
            cache,
            strategy: NearestStrategy::default(),
            catalog: None,
            index: None,
            nearest: Nearest::Unresolved,
            last_persisted: None,
        }
    }

    /// Pins an entry by code, with or without the `id` prefix.
    pub fn with_pinned_code(mut self, code: Option<String>) -> Self {
        self.nearest = match code.as_deref().and_then(canonical_code) {
            Some(code) => Nearest::Pinned(code),
            None => Nearest::Unresolved,
        };
        self
    }

    pub fn with_strategy(mut self, strategy: NearestStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn nearest(&self) -> Option<&CatalogEntry> {
        match &self.nearest {
            Nearest::Resolved { entry, .. } => Some(entry),
            _ => None,
        }
    }

    pub fn nearest_distance_km(&self) -> Option<f64> {
        match &self.nearest {
            Nearest::Resolved { distance_km, .. } => *distance_km,
            _ => None,
        }
    }

    /// Loads the catalog on first use and reloads it once it is a week old.
    ///
    /// The first load prefers the cache and falls back to the API. A stale
    /// catalog always comes from the API. When the API returns nothing the
    /// previous catalog is kept.
    pub async fn load_or_refresh(&mut self) -> Result<Option<&Catalog>, CatalogError> {
        let now = Utc::now();
        let refreshed = match self.catalog.as_ref().map(|c| c.is_stale(now)) {
            None => self.load_initial(now).await?,
            Some(true) => {
                info!("Catalog of {} is older than a week, refreshing", self.kind);
                self.fetch_live().await?
            }
            Some(false) => None,
        };

        if let Some(catalog) = refreshed {
            self.catalog = Some(catalog);
            self.index = None;
            if let Err(e) = self.persist(false).await {
                warn!("Could not store catalog of {}: {}", self.kind, e);
            }
        }
        Ok(self.catalog.as_ref())
    }

    async fn load_initial(&mut self, now: DateTime<Utc>) -> Result<Option<Catalog>, CatalogError> {
        if let Some(cached) = self.cache.read(self.kind.cache_key()).await {
            match Catalog::clean(self.kind, cached) {
                Ok(catalog) => {
                    debug!(
                        "Loaded {} {} entries from cache",
                        catalog.len(),
                        self.kind
                    );
                    self.last_persisted = Some(now);
                    return Ok(Some(catalog));
                }
                Err(e) => warn!("Ignoring cached catalog of {}: {}", self.kind, e),
            }
        }
        self.fetch_live().await
    }

    async fn fetch_live(&self) -> Result<Option<Catalog>, CatalogError> {
        match self.api.call(&self.kind.endpoint()).await? {
            Some(raw) => Catalog::clean(self.kind, raw).map(Some),
            None => {
                warn!("Catalog of {} is unavailable", self.kind);
                Ok(None)
            }
        }
    }

    /// Stores the catalog when the last write is older than five minutes.
    pub async fn persist(&mut self, force: bool) -> Result<(), CacheError> {
        let Some(catalog) = &self.catalog else {
            return Ok(());
        };
        let now = Utc::now();
        let due = self.last_persisted.map_or(true, |last| {
            now - last > TimeDelta::minutes(PERSIST_INTERVAL_MINUTES)
        });
        if !due && !force {
            return Ok(());
        }
        self.cache.write(self.kind.cache_key(), catalog).await?;
        self.last_persisted = Some(now);
        Ok(())
    }

    /// Resolves the entry closest to `location`.
    ///
    /// A pinned code is looked up once and trusted regardless of distance.
    /// Otherwise a search runs when nothing is resolved yet or `force` is set,
    /// and a result beyond [`CatalogKind::max_distance_km`] counts as no match.
    pub fn resolve_nearest(
        &mut self,
        location: &Location,
        force: bool,
    ) -> Result<Option<&CatalogEntry>, CatalogError> {
        let Some(catalog) = self.catalog.as_ref() else {
            info!("No catalog of {} loaded, nothing to resolve", self.kind);
            return Ok(None);
        };

        if let Nearest::Pinned(code) = &self.nearest {
            let entry = catalog
                .find(code)
                .cloned()
                .ok_or_else(|| CatalogError::InvalidPinnedCode {
                    kind: self.kind,
                    code: code.clone(),
                })?;
            let distance_km = geodesic_km(location.lat_lon(), entry.lat_lon());
            debug!("Using pinned {} entry {}", self.kind, entry.code);
            self.nearest = Nearest::Resolved {
                entry,
                distance_km,
                pinned: true,
            };
        } else if force || self.nearest == Nearest::Unresolved {
            self.nearest = self.search(location);
        }

        Ok(self.nearest())
    }

    fn search(&mut self, location: &Location) -> Nearest {
        let Some(catalog) = self.catalog.as_ref() else {
            return Nearest::Unresolved;
        };
        let target = location.lat_lon();
        let found = match self.strategy {
            NearestStrategy::Linear => nearest_linear(&catalog.entries, target),
            NearestStrategy::SpatialIndex => self
                .index
                .get_or_insert_with(|| SpatialIndex::build(&catalog.entries))
                .nearest(&catalog.entries, target),
        };

        let Some((entry, distance)) =
            found.and_then(|(i, d)| catalog.entries.get(i).map(|e| (e, d)))
        else {
            info!("No {} entry has a usable distance to {:?}", self.kind, target);
            return Nearest::Unresolved;
        };

        let limit = self.kind.max_distance_km();
        if distance > limit {
            info!(
                "Nearest {} entry {} is {:.1} km away (limit {} km), location is outside coverage",
                self.kind, entry.code, distance, limit
            );
            return Nearest::Unresolved;
        }

        debug!(
            "Nearest {} entry is {} ({}) at {:.1} km",
            self.kind, entry.code, entry.name, distance
        );
        Nearest::Resolved {
            entry: entry.clone(),
            distance_km: Some(distance),
            pinned: false,
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(
            self.nearest,
            Nearest::Pinned(_) | Nearest::Resolved { pinned: true, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use crate::test_support::{FakeGateway, BASE_URL};
    use serde_json::json;
    use tempfile::TempDir;

    const MUNICIPALITIES_URL: &str = "http://aemet.test/api/maestro/municipios";

    fn municipalities() -> serde_json::Value {
        json!([
            {"id": "id08019", "nombre": "Barcelona", "latitud_dec": "41.3874", "longitud_dec": "2.1686", "altitud": "12"},
            {"id": "id28079", "nombre": "Madrid", "latitud_dec": "40.4168", "longitud_dec": "-3.7038", "altitud": "657"},
            {"id": "id46250", "nombre": "Valencia", "latitud_dec": "39.4699", "longitud_dec": "-0.3763", "altitud": "15"}
        ])
    }

    fn resolver(gateway: Arc<FakeGateway>, dir: &TempDir) -> CatalogResolver {
        let api = Arc::new(AemetApi::new(gateway, "test_key").with_base_url("http://aemet.test/api"));
        CatalogResolver::new(
            CatalogKind::Municipalities,
            api,
            JsonCache::new(dir.path()),
        )
    }

    fn madrid() -> Location {
        Location::new(40.4168, -3.7038, 667.0)
    }

    #[tokio::test]
    async fn madrid_resolves_to_itself() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gateway = Arc::new(FakeGateway::new().with(MUNICIPALITIES_URL, municipalities()));
        let mut resolver = resolver(gateway, &dir);

        resolver.load_or_refresh().await?;
        let nearest = resolver.resolve_nearest(&madrid(), false)?.cloned();

        assert_eq!(nearest.map(|e| e.code), Some("28079".to_string()));
        assert!(resolver.nearest_distance_km().unwrap_or(f64::MAX) < 0.001);
        Ok(())
    }

    #[tokio::test]
    async fn far_away_location_resolves_to_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gateway = Arc::new(FakeGateway::new().with(MUNICIPALITIES_URL, municipalities()));

        for strategy in [NearestStrategy::Linear, NearestStrategy::SpatialIndex] {
            let mut resolver = resolver(gateway.clone(), &dir).with_strategy(strategy);
            resolver.load_or_refresh().await?;
            let far_away = Location::new(10.0, 10.0, 0.0);
            assert_eq!(resolver.resolve_nearest(&far_away, false)?, None);
        }
        Ok(())
    }

    #[tokio::test]
    async fn unknown_pinned_code_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gateway = Arc::new(FakeGateway::new().with(MUNICIPALITIES_URL, municipalities()));
        let mut resolver = resolver(gateway, &dir).with_pinned_code(Some("99999".into()));

        resolver.load_or_refresh().await?;
        let result = resolver.resolve_nearest(&madrid(), false);

        assert!(matches!(
            result,
            Err(CatalogError::InvalidPinnedCode { ref code, .. }) if code == "99999"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn pinned_code_ignores_distance() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gateway = Arc::new(FakeGateway::new().with(MUNICIPALITIES_URL, municipalities()));
        let mut resolver = resolver(gateway, &dir).with_pinned_code(Some("46250".into()));

        resolver.load_or_refresh().await?;
        let nearest = resolver.resolve_nearest(&madrid(), false)?.cloned();

        assert_eq!(nearest.map(|e| e.name), Some("Valencia".to_string()));
        assert!(resolver.is_pinned());

        // A forced search replaces the pin with the actual nearest entry.
        let nearest = resolver.resolve_nearest(&madrid(), true)?.cloned();
        assert_eq!(nearest.map(|e| e.name), Some("Madrid".to_string()));
        assert!(!resolver.is_pinned());
        Ok(())
    }

    #[tokio::test]
    async fn resolution_sticks_until_forced() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gateway = Arc::new(FakeGateway::new().with(MUNICIPALITIES_URL, municipalities()));
        let mut resolver = resolver(gateway, &dir);
        resolver.load_or_refresh().await?;

        resolver.resolve_nearest(&madrid(), false)?;
        let valencia = Location::new(39.47, -0.38, 15.0);

        let unforced = resolver.resolve_nearest(&valencia, false)?.cloned();
        assert_eq!(unforced.map(|e| e.code), Some("28079".to_string()));

        let forced = resolver.resolve_nearest(&valencia, true)?.cloned();
        assert_eq!(forced.map(|e| e.code), Some("46250".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn catalog_is_cached_and_reused() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gateway = Arc::new(FakeGateway::new().with(MUNICIPALITIES_URL, municipalities()));

        let mut first = resolver(gateway.clone(), &dir);
        first.load_or_refresh().await?;
        assert_eq!(gateway.request_count(MUNICIPALITIES_URL), 1);
        assert!(dir.path().join("municipalities.json").exists());

        let mut second = resolver(gateway.clone(), &dir);
        let catalog = second.load_or_refresh().await?.cloned();
        assert_eq!(gateway.request_count(MUNICIPALITIES_URL), 1);
        assert_eq!(catalog, first.catalog().cloned());
        Ok(())
    }

    #[tokio::test]
    async fn stale_catalog_is_fetched_live() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gateway = Arc::new(FakeGateway::new().with(MUNICIPALITIES_URL, municipalities()));
        let mut resolver = resolver(gateway.clone(), &dir);

        resolver.load_or_refresh().await?;
        resolver.load_or_refresh().await?;
        assert_eq!(gateway.request_count(MUNICIPALITIES_URL), 1);

        if let Some(catalog) = resolver.catalog.as_mut() {
            catalog.saved_at = Utc::now() - TimeDelta::days(8);
        }
        let refreshed = resolver.load_or_refresh().await?.cloned();

        assert_eq!(gateway.request_count(MUNICIPALITIES_URL), 2);
        assert!(refreshed.is_some_and(|c| !c.is_stale(Utc::now())));
        Ok(())
    }

    #[tokio::test]
    async fn prefixed_pinned_code_is_found() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gateway = Arc::new(FakeGateway::new().with(MUNICIPALITIES_URL, municipalities()));
        let mut resolver = resolver(gateway, &dir).with_pinned_code(Some(" id46250 ".into()));

        resolver.load_or_refresh().await?;
        let nearest = resolver.resolve_nearest(&madrid(), false)?.cloned();

        assert_eq!(nearest.map(|e| e.code), Some("46250".to_string()));
        assert!(resolver.is_pinned());
        Ok(())
    }

    #[tokio::test]
    async fn distance_threshold_depends_on_kind() -> Result<(), Box<dyn std::error::Error>> {
        // About 30 km north of the target: inside the station radius only.
        let north = (40.6868, -3.7038);
        let stations = json!([
            {"idema": "3100B", "ubi": "NORTE", "lat": north.0, "lon": north.1, "alt": 900.0}
        ]);
        let towns = json!([
            {"id": "id28900", "nombre": "Norte", "latitud_dec": north.0.to_string(), "longitud_dec": north.1.to_string()}
        ]);
        let gateway = Arc::new(
            FakeGateway::new()
                .with_staged("/observacion/convencional/todas", stations)
                .with(MUNICIPALITIES_URL, towns),
        );
        let api = Arc::new(AemetApi::new(gateway.clone(), "test_key").with_base_url(BASE_URL));

        for strategy in [NearestStrategy::Linear, NearestStrategy::SpatialIndex] {
            let dir = tempfile::tempdir()?;
            let mut stations =
                CatalogResolver::new(CatalogKind::Stations, api.clone(), JsonCache::new(dir.path()))
                    .with_strategy(strategy);
            stations.load_or_refresh().await?;
            let station = stations.resolve_nearest(&madrid(), false)?.cloned();
            assert_eq!(station.map(|e| e.code), Some("3100B".to_string()));
            let km = stations.nearest_distance_km().unwrap_or(f64::MAX);
            assert!((29.0..31.0).contains(&km), "distance {km}");

            let mut towns = resolver(gateway.clone(), &dir).with_strategy(strategy);
            towns.load_or_refresh().await?;
            assert_eq!(towns.resolve_nearest(&madrid(), false)?, None);
        }
        Ok(())
    }

    async fn stored_entry_count(dir: &TempDir) -> Option<usize> {
        JsonCache::new(dir.path())
            .read_as::<Catalog>(CacheKey::Municipalities)
            .await
            .map(|catalog| catalog.len())
    }

    #[tokio::test]
    async fn persist_waits_after_cache_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut stored = Catalog::from_entries(
            CatalogKind::Municipalities,
            vec![CatalogEntry {
                code: "28079".into(),
                name: "Madrid".into(),
                latitude: 40.4168,
                longitude: -3.7038,
                elevation: None,
            }],
        );
        stored.saved_at = Utc::now() - TimeDelta::hours(1);
        JsonCache::new(dir.path())
            .write(CacheKey::Municipalities, &stored)
            .await?;

        let gateway = Arc::new(FakeGateway::new().with(MUNICIPALITIES_URL, municipalities()));
        let mut resolver = resolver(gateway.clone(), &dir);
        resolver.load_or_refresh().await?;
        assert_eq!(gateway.request_count(MUNICIPALITIES_URL), 0);

        // A live refresh right after the cache load is not written back.
        if let Some(catalog) = resolver.catalog.as_mut() {
            catalog.saved_at = Utc::now() - TimeDelta::days(8);
        }
        resolver.load_or_refresh().await?;
        assert_eq!(gateway.request_count(MUNICIPALITIES_URL), 1);
        assert_eq!(resolver.catalog().map(Catalog::len), Some(3));
        assert_eq!(stored_entry_count(&dir).await, Some(1));

        resolver.persist(false).await?;
        assert_eq!(stored_entry_count(&dir).await, Some(1));

        resolver.last_persisted = Some(Utc::now() - TimeDelta::minutes(6));
        resolver.persist(false).await?;
        assert_eq!(stored_entry_count(&dir).await, Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn forced_persist_always_writes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let gateway = Arc::new(FakeGateway::new().with(MUNICIPALITIES_URL, municipalities()));
        let mut resolver = resolver(gateway, &dir);
        resolver.load_or_refresh().await?;
        assert_eq!(stored_entry_count(&dir).await, Some(3));

        if let Some(catalog) = resolver.catalog.as_mut() {
            catalog.entries.truncate(2);
        }
        resolver.persist(false).await?;
        assert_eq!(stored_entry_count(&dir).await, Some(3));

        resolver.persist(true).await?;
        assert_eq!(stored_entry_count(&dir).await, Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_catalog_resolves_to_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut resolver = resolver(Arc::new(FakeGateway::new()), &dir);

        assert_eq!(resolver.load_or_refresh().await?, None);
        assert_eq!(resolver.resolve_nearest(&madrid(), false)?, None);
        Ok(())
    }
}
