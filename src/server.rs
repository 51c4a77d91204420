//! Booking engine runtime.
//!
//! Provides [`EngineHandle`] that encapsulates the full lifecycle: database
//! init, migrations, the MQTT channel, the light dispatcher, the booking
//! expiry sweep, metrics, and graceful shutdown.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use metrics_exporter_prometheus::PrometheusBuilder;
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::ports::DevicePublisher;
use crate::application::services::{
    start_booking_expiry_task, BookingService, BookingSettings, DispatcherConfig, LightDispatcher,
    LightScheduler, PricingService, SlotLocks,
};
use crate::config::{AppConfig, MetricsSection};
use crate::domain::RepositoryProvider;
use crate::infrastructure::mqtt::{LoggingPublisher, MqttPublisher};
use crate::infrastructure::{init_database, run_migrations, DatabaseConfig, SeaOrmRepositoryProvider};
use crate::support::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::support::time::{SharedClock, SystemClock};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the engine.
pub struct EngineOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── Services ───────────────────────────────────────────────────────

/// Application services wired over one repository provider.
#[derive(Clone)]
pub struct Services {
    pub bookings: Arc<BookingService>,
    pub pricing: Arc<PricingService>,
    pub scheduler: Arc<LightScheduler>,
    pub locks: Arc<SlotLocks>,
}

impl Services {
    pub fn build(
        repos: Arc<dyn RepositoryProvider>,
        clock: SharedClock,
        config: &AppConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let scheduler = Arc::new(LightScheduler::new(repos.clone(), clock.clone()));
        let locks = Arc::new(SlotLocks::new());
        let settings = BookingSettings {
            hold: ChronoDuration::minutes(config.booking.hold_minutes),
            utc_offset: config.booking.utc_offset()?,
            ..BookingSettings::default()
        };
        let bookings = Arc::new(BookingService::new(
            repos.clone(),
            scheduler.clone(),
            locks.clone(),
            clock.clone(),
            settings,
        ));
        let pricing = Arc::new(PricingService::new(
            repos,
            clock,
            config.pricing.default_price_per_hour,
        ));
        Ok(Self {
            bookings,
            pricing,
            scheduler,
            locks,
        })
    }
}

// ── EngineHandle ───────────────────────────────────────────────────

/// Handle to a running booking engine.
///
/// ```rust,no_run
/// use court_booking::server::{EngineHandle, EngineOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = EngineHandle::start(EngineOptions::default()).await?;
///     // ... wait for shutdown signal ...
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct EngineHandle {
    /// Repository provider for data access.
    pub repos: Arc<dyn RepositoryProvider>,
    pub services: Services,
    /// The configuration the engine was started with.
    pub config: AppConfig,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    mqtt: Option<Arc<MqttPublisher>>,
    dispatcher_task: JoinHandle<()>,
    expiry_task: JoinHandle<()>,
}

impl EngineHandle {
    /// Start the engine.
    ///
    /// This will:
    /// 1. Install the Prometheus metrics recorder
    /// 2. Connect to the database and run migrations
    /// 3. Open the MQTT channel (or log commands when MQTT is disabled)
    /// 4. Start the light dispatcher and the booking expiry sweep
    pub async fn start(opts: EngineOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting court booking engine...");
        install_metrics(&app_cfg.metrics)?;

        // ── Database ───────────────────────────────────────────
        let db_config = DatabaseConfig::from(&app_cfg.database);
        let db = init_database(&db_config).await?;
        if opts.auto_migrate {
            run_migrations(&db).await?;
        } else {
            info!("Skipping database migrations");
        }
        let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));

        // ── Services ───────────────────────────────────────────
        let clock: SharedClock = Arc::new(SystemClock);
        let services = Services::build(repos.clone(), clock.clone(), &app_cfg)?;
        let shutdown = ShutdownCoordinator::new(app_cfg.scheduler.shutdown_timeout_secs);

        // ── Device channel ─────────────────────────────────────
        let (publisher, mqtt): (Arc<dyn DevicePublisher>, Option<Arc<MqttPublisher>>) =
            if app_cfg.mqtt.enabled {
                info!(host = %app_cfg.mqtt.host, port = app_cfg.mqtt.port, "Connecting to MQTT broker");
                let mqtt = Arc::new(MqttPublisher::connect(&app_cfg.mqtt));
                (mqtt.clone(), Some(mqtt))
            } else {
                warn!("MQTT disabled, light commands will only be logged");
                (Arc::new(LoggingPublisher), None)
            };

        // ── Background tasks ───────────────────────────────────
        let dispatcher = Arc::new(LightDispatcher::new(
            repos.clone(),
            publisher,
            clock,
            DispatcherConfig {
                poll_interval: Duration::from_millis(app_cfg.scheduler.poll_interval_ms.max(10)),
                batch_size: app_cfg.scheduler.batch_size,
                stale_after: Duration::from_secs(app_cfg.scheduler.stale_after_secs),
                retry: app_cfg.scheduler.retry_config(),
            },
        ));
        let dispatcher_task = dispatcher.start(shutdown.signal());
        let expiry_task = start_booking_expiry_task(
            services.bookings.clone(),
            shutdown.signal(),
            app_cfg.booking.expiry_check_interval_secs,
        );

        info!("✅ Court booking engine started");

        Ok(Self {
            repos,
            services,
            config: app_cfg,
            db,
            shutdown,
            mqtt,
            dispatcher_task,
            expiry_task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for shutdown to be triggered, then stop every task.
    pub async fn wait(self) {
        let Self {
            shutdown,
            db,
            mqtt,
            dispatcher_task,
            expiry_task,
            ..
        } = self;

        let completed = shutdown
            .shutdown_with_cleanup(|| async move {
                info!("⏳ Waiting for background tasks to complete...");
                match dispatcher_task.await {
                    Ok(()) => info!("Light dispatcher stopped"),
                    Err(e) => error!("Light dispatcher task panicked: {}", e),
                }
                match expiry_task.await {
                    Ok(()) => info!("Booking expiry task stopped"),
                    Err(e) => error!("Booking expiry task panicked: {}", e),
                }
                if let Some(mqtt) = mqtt {
                    mqtt.shutdown().await;
                    info!("✅ MQTT channel closed");
                }
            })
            .await;
        if !completed {
            warn!("Some background tasks did not stop in time");
        }

        if let Err(e) = db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }

        info!("👋 Court booking engine shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down court booking engine...");
        self.trigger_shutdown();
        self.wait().await;
    }

    /// Check if the engine is still running.
    pub fn is_running(&self) -> bool {
        !self.dispatcher_task.is_finished() || !self.expiry_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// The global metrics recorder can only be installed once per process.
static METRICS_INSTALLED: OnceLock<()> = OnceLock::new();

fn install_metrics(section: &MetricsSection) -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INSTALLED.get().is_some() {
        return Ok(());
    }
    let builder = PrometheusBuilder::new();
    match &section.listen {
        Some(listen) => {
            let addr: std::net::SocketAddr = listen.parse()?;
            builder.with_http_listener(addr).install()?;
            info!(%addr, "📊 Prometheus exporter listening");
        }
        None => {
            builder.install_recorder()?;
            info!("📊 Prometheus metrics recorder installed");
        }
    }
    let _ = METRICS_INSTALLED.set(());
    Ok(())
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`EngineHandle::start`]).
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
