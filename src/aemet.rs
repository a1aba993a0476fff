//! This module provides the main entry point of the crate: an [`Aemet`] instance
//! that keeps the nearest station and municipality for a location and collects
//! current conditions plus hourly and daily forecasts for them.

use crate::api::client::AemetApi;
use crate::api::gateway::{Gateway, HttpGateway};
use crate::cache::{CacheKey, JsonCache};
use crate::catalog::entry::{CatalogEntry, CatalogKind};
use crate::catalog::nearest::NearestStrategy;
use crate::catalog::resolver::CatalogResolver;
use crate::config::{Config, DEFAULT_NAME};
use crate::error::AemetError;
use crate::throttle::{Throttle, Throttled, COMPONENT_INTERVAL, DEFAULT_UPDATE_INTERVAL};
use crate::types::forecast_mode::ForecastMode;
use crate::types::location::Location;
use crate::types::snapshot::WeatherSnapshot;
use crate::utils::get_cache_dir;
use crate::view::WeatherView;
use crate::weather_data::forecast::ForecastUpdater;
use crate::weather_data::observation::CurrentConditions;
use bon::bon;
use chrono::{Local, NaiveDateTime, SubsecRound, Utc};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn check_location(location: &Location) -> Result<(), AemetError> {
    if location.lat_lon().is_valid() {
        Ok(())
    } else {
        Err(AemetError::InvalidLocation {
            latitude: location.latitude,
            longitude: location.longitude,
        })
    }
}

/// Weather for one location, sourced from AEMET OpenData.
///
/// An `Aemet` instance owns the station and municipality catalogs, resolves
/// the entries closest to its location and turns the upstream payloads into a
/// [`WeatherSnapshot`]. Catalogs, sections and the combined snapshot are
/// persisted as JSON in a cache directory so that a restart does not need to
/// download the catalogs again.
///
/// Create an instance with [`Aemet::builder()`] or [`Aemet::from_config()`].
///
/// # Examples
///
/// ```rust,no_run
/// # use aemet::{Aemet, AemetError, Location};
/// # #[tokio::main]
/// # async fn main() -> Result<(), AemetError> {
/// let mut aemet = Aemet::builder()
///     .api_key("your-api-key")
///     .location(Location::new(40.4168, -3.7038, 667.0))
///     .build()
///     .await?;
///
/// if let Some(snapshot) = aemet.update().await? {
///     println!("Observed: {:?}", snapshot.currently.as_ref().map(|o| &o.data));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Aemet {
    name: String,
    location: Location,
    mode: ForecastMode,
    cache: JsonCache,
    stations: CatalogResolver,
    municipalities: CatalogResolver,
    currently: Throttled<CurrentConditions>,
    hourly: Throttled<ForecastUpdater>,
    daily: Throttled<ForecastUpdater>,
    throttle: Throttle,
    snapshot: Option<WeatherSnapshot>,
}

#[bon]
impl Aemet {
    /// Creates a new `Aemet` instance.
    ///
    /// Nothing is downloaded here. Catalogs and weather data are loaded by the
    /// first call to [`Aemet::update`]. A snapshot stored by a previous run is
    /// restored from the cache and served until then.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.api_key(impl Into<String>)`: **Required.** AEMET OpenData API key.
    /// * `.location(Location)`: **Required.** The location to report weather for.
    /// * `.name(String)`: Optional. Display name of the instance, `AEMET` by default.
    /// * `.cache_dir(PathBuf)`: Optional. Defaults to the platform cache directory plus `aemet`.
    /// * `.weather_station(String)`: Optional. Pinned station code, used regardless of distance.
    /// * `.city(String)`: Optional. Pinned municipality code, used regardless of distance.
    /// * `.strategy(NearestStrategy)`: Optional. Nearest search strategy, linear by default.
    /// * `.mode(ForecastMode)`: Optional. Forecast granularity used by [`Aemet::view`], daily by default.
    /// * `.update_interval(Duration)`: Optional. Minimum spacing between full updates, 10 minutes by default.
    /// * `.gateway(Arc<dyn Gateway>)`: Optional. Transport, an [`HttpGateway`] by default.
    /// * `.base_url(String)`: Optional. API root, the public OpenData endpoint by default.
    ///
    /// # Errors
    ///
    /// Returns [`AemetError::InvalidLocation`] if the coordinates are out of range.
    /// Returns [`AemetError::CacheDirResolution`] if no cache directory was given and the default cannot be found.
    /// Returns [`AemetError::Cache`] if the cache directory cannot be created.
    /// Returns [`AemetError::Api`] if the HTTP client cannot be built.
    #[builder]
    pub async fn new(
        #[builder(into)] api_key: String,
        location: Location,
        name: Option<String>,
        cache_dir: Option<PathBuf>,
        weather_station: Option<String>,
        city: Option<String>,
        #[builder(default)] strategy: NearestStrategy,
        #[builder(default)] mode: ForecastMode,
        update_interval: Option<Duration>,
        gateway: Option<Arc<dyn Gateway>>,
        base_url: Option<String>,
    ) -> Result<Self, AemetError> {
        check_location(&location)?;

        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => get_cache_dir().map_err(AemetError::CacheDirResolution)?,
        };
        let cache = JsonCache::open(cache_dir).await?;

        let gateway: Arc<dyn Gateway> = match gateway {
            Some(gateway) => gateway,
            None => Arc::new(HttpGateway::new()?),
        };
        let mut api = AemetApi::new(gateway, api_key);
        if let Some(base_url) = base_url {
            api = api.with_base_url(base_url);
        }
        let api = Arc::new(api);

        let stations = CatalogResolver::new(CatalogKind::Stations, api.clone(), cache.clone())
            .with_pinned_code(weather_station)
            .with_strategy(strategy);
        let municipalities =
            CatalogResolver::new(CatalogKind::Municipalities, api.clone(), cache.clone())
                .with_pinned_code(city)
                .with_strategy(strategy);

        let currently = Throttled::new(
            CurrentConditions::new(api.clone(), cache.clone()),
            COMPONENT_INTERVAL,
        );
        let hourly = Throttled::new(
            ForecastUpdater::new(ForecastMode::Hourly, api.clone(), cache.clone()),
            COMPONENT_INTERVAL,
        );
        let daily = Throttled::new(
            ForecastUpdater::new(ForecastMode::Daily, api, cache.clone()),
            COMPONENT_INTERVAL,
        );

        let snapshot = cache.read_as::<WeatherSnapshot>(CacheKey::Data).await;
        if snapshot.is_some() {
            debug!("Restored previous snapshot from {}", cache.dir().display());
        }

        Ok(Self {
            name: name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            location,
            mode,
            cache,
            stations,
            municipalities,
            currently,
            hourly,
            daily,
            throttle: Throttle::new(update_interval.unwrap_or(DEFAULT_UPDATE_INTERVAL)),
            snapshot,
        })
    }

    /// Creates an instance from a validated [`Config`].
    ///
    /// # Errors
    ///
    /// Returns [`AemetError::Config`] if the configuration is invalid, and any
    /// error of [`Aemet::builder`] otherwise.
    pub async fn from_config(config: &Config) -> Result<Self, AemetError> {
        config.validate()?;
        Self::builder()
            .api_key(config.api_key()?)
            .location(config.location())
            .name(config.name.clone())
            .maybe_cache_dir(config.cache_dir.clone())
            .maybe_weather_station(config.weather_station.clone())
            .maybe_city(config.city.clone())
            .strategy(config.strategy())
            .mode(config.mode)
            .update_interval(config.update_interval())
            .build()
            .await
    }

    async fn refresh_nearest(
        resolver: &mut CatalogResolver,
        location: &Location,
        force: bool,
    ) -> Result<Option<CatalogEntry>, AemetError> {
        if let Err(e) = resolver.load_or_refresh().await {
            if e.is_fatal() {
                return Err(e.into());
            }
            warn!("Could not refresh the {} catalog: {}", resolver.kind(), e);
        }
        Ok(resolver.resolve_nearest(location, force)?.cloned())
    }

    /// Runs one update cycle and returns the resulting snapshot.
    ///
    /// Within the update interval this is a no-op returning the previous
    /// snapshot. Each section is refreshed at most every five minutes on top
    /// of that. A section whose fetch fails is absent from the new snapshot.
    ///
    /// # Errors
    ///
    /// Only errors that will not go away on their own are returned: an
    /// invalid API key ([`ApiError::Unauthorized`](crate::ApiError::Unauthorized))
    /// or a pinned code that does not exist
    /// ([`CatalogError::InvalidPinnedCode`](crate::CatalogError::InvalidPinnedCode)).
    /// Everything else is logged and degrades the snapshot.
    pub async fn update(&mut self) -> Result<Option<&WeatherSnapshot>, AemetError> {
        if !self.throttle.try_acquire(Instant::now()) {
            debug!("Update requested too soon, returning previous snapshot");
            return Ok(self.snapshot.as_ref());
        }

        let station = Self::refresh_nearest(&mut self.stations, &self.location, false).await?;
        let municipality =
            Self::refresh_nearest(&mut self.municipalities, &self.location, false).await?;
        self.assign(station, municipality);

        let (currently, hourly, daily) = futures_util::join!(
            self.currently.call(|c| c.update()),
            self.hourly.call(|f| f.update()),
            self.daily.call(|f| f.update()),
        );
        for (section, outcome) in [
            ("current conditions", currently),
            ("hourly forecast", hourly),
            ("daily forecast", daily),
        ] {
            match outcome {
                Some(Err(e)) if e.is_fatal() => return Err(e.into()),
                Some(Err(e)) => warn!("Could not update {}: {}", section, e),
                Some(Ok(())) => {}
                None => debug!("Skipping {}, updated less than five minutes ago", section),
            }
        }

        let snapshot = WeatherSnapshot {
            currently: self.currently.inner().data().cloned(),
            hourly: self.hourly.inner().data().cloned(),
            daily: self.daily.inner().data().cloned(),
            saved_at: Utc::now().trunc_subsecs(0),
        };
        if let Err(e) = self.cache.write(CacheKey::Data, &snapshot).await {
            warn!("Could not store snapshot: {}", e);
        }
        self.snapshot = Some(snapshot);
        Ok(self.snapshot.as_ref())
    }

    /// Moves to a new location.
    ///
    /// Both nearest entries are searched again immediately and the next
    /// [`Aemet::update`] fetches fresh data regardless of throttling.
    ///
    /// # Errors
    ///
    /// Returns [`AemetError::InvalidLocation`] for out of range coordinates and
    /// the fatal errors of [`Aemet::update`].
    pub async fn update_location(&mut self, location: Location) -> Result<(), AemetError> {
        check_location(&location)?;
        info!(
            "{}: location changed to ({}, {})",
            self.name, location.latitude, location.longitude
        );
        self.location = location;

        let station = Self::refresh_nearest(&mut self.stations, &self.location, true).await?;
        let municipality =
            Self::refresh_nearest(&mut self.municipalities, &self.location, true).await?;
        self.assign(station, municipality);

        self.currently.reset();
        self.hourly.reset();
        self.daily.reset();
        self.throttle.reset();
        Ok(())
    }

    fn assign(&mut self, station: Option<CatalogEntry>, municipality: Option<CatalogEntry>) {
        self.currently.inner_mut().set_station(station);
        self.hourly
            .inner_mut()
            .set_municipality(municipality.clone());
        self.daily.inner_mut().set_municipality(municipality);
    }

    /// The snapshot of the last update, or the one restored from the cache.
    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn mode(&self) -> ForecastMode {
        self.mode
    }

    pub fn nearest_station(&self) -> Option<&CatalogEntry> {
        self.stations.nearest()
    }

    pub fn nearest_municipality(&self) -> Option<&CatalogEntry> {
        self.municipalities.nearest()
    }

    /// Display accessors over the current snapshot, as of now in local time.
    pub fn view(&self) -> Option<WeatherView<'_>> {
        self.view_at(Local::now().naive_local())
    }

    pub fn view_at(&self, now: NaiveDateTime) -> Option<WeatherView<'_>> {
        self.snapshot
            .as_ref()
            .map(|snapshot| WeatherView::new(snapshot, self.mode, now))
    }
}
