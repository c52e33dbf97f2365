use hunt_property::config::{AppConfig, SmsConfig};
use hunt_property::error::AppError;
use hunt_property::otp::{
    HttpSmsGateway, LogSmsGateway, MemoryOtpStore, MirroredOtpStore, MongoOtpStore, OtpService,
    OtpStore, SmsGateway,
};
use hunt_property::store::mongo;
use hunt_property::Stores;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// Operational state shared by the health, readiness and metrics routes.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) backend: Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Backend {
    Mongo,
    Memory,
}

impl Backend {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Backend::Mongo => "mongodb",
            Backend::Memory => "memory",
        }
    }
}

/// Collections plus the OTP store matching them.
pub(crate) struct Persistence {
    pub(crate) backend: Backend,
    pub(crate) stores: Stores,
    pub(crate) otp_store: Arc<dyn OtpStore>,
}

/// MongoDB when a URL is configured, otherwise process-local collections.
/// With MongoDB, OTP codes are also mirrored in memory.
pub(crate) async fn open_persistence(config: &AppConfig) -> Result<Persistence, AppError> {
    let Some(url) = config.database.url.as_deref() else {
        warn!("MONGODB_URL not set, data is kept in memory and lost on restart");
        return Ok(Persistence {
            backend: Backend::Memory,
            stores: Stores::in_memory(),
            otp_store: Arc::new(MemoryOtpStore::default()),
        });
    };

    let (_client, database) = mongo::connect(&config.database, url).await?;
    mongo::ensure_indexes(&database).await?;
    let otp_store = MirroredOtpStore::new(
        Arc::new(MongoOtpStore::new(&database)),
        Arc::new(MemoryOtpStore::default()),
    );

    Ok(Persistence {
        backend: Backend::Mongo,
        stores: Stores::mongo(&database),
        otp_store: Arc::new(otp_store),
    })
}

fn sms_gateway(config: Option<&SmsConfig>) -> Arc<dyn SmsGateway> {
    let Some(config) = config else {
        info!("SMS gateway not configured, OTP codes are only logged");
        return Arc::new(LogSmsGateway);
    };
    match HttpSmsGateway::new(config.clone()) {
        Ok(gateway) => Arc::new(gateway),
        Err(err) => {
            warn!(error = %err, "SMS gateway unavailable, OTP codes are only logged");
            Arc::new(LogSmsGateway)
        }
    }
}

pub(crate) fn otp_service(config: &AppConfig, store: Arc<dyn OtpStore>) -> OtpService {
    OtpService::new(
        store,
        sms_gateway(config.sms.as_ref()),
        config.otp.ttl_minutes,
    )
}
