#[macro_use]
extern crate tracing;
#[macro_use]
extern crate anyhow;

use std::{path::Path, sync::Arc};

use anyhow::Result;
use clap::Parser;
use flume::Sender;
use tokio::runtime;

use remoteweather::{
    aprs::{self, encode, AprsBackend},
    config::{self, Config},
    consumer::{
        log::LogBackend,
        memory::{MemoryBackend, MemoryStore},
    },
    health::{HealthRegistry, HealthStatus},
    ingest, log,
    shutdown::{self, Shutdown},
    Distributor, Reading,
};

mod args;

use args::{ArgsParser, Cmd};

fn main() -> Result<()> {
    let args = ArgsParser::parse();
    match args.cmd {
        Cmd::Passcode { callsign } => {
            println!("{}", encode::passcode(&callsign));
            Ok(())
        }
        Cmd::Check { config } => {
            log::init_logging()?;
            check(&config)
        }
        Cmd::Run { config } => run(&config),
    }
}

fn read_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        bail!("Configuration file {path:?} does not exist!");
    }
    let buf = std::fs::read_to_string(path)?;
    config::from_str(&buf)
}

fn check(path: &Path) -> Result<()> {
    info!("Reading configuration from {:?}", path);
    let cfg = read_config(path)?;
    let Some(aprs_cfg) = &cfg.aprs else {
        bail!("No [aprs] section is configured, there is nothing to check");
    };
    let settings = aprs::Settings::from_config(aprs_cfg)?;
    let stations = aprs::stations_from_config(&cfg.stations)?;
    if stations.is_empty() {
        bail!("No station has APRS enabled");
    }
    info!("APRS-IS server: {}", settings.server);
    for station in &stations {
        info!(
            "{} reports as {} (passcode {}) from {} {}",
            station.name,
            station.callsign,
            station.passcode,
            encode::latitude(station.latitude),
            encode::longitude(station.longitude),
        );
    }

    let runtime = runtime::Builder::new_current_thread().enable_all().build()?;
    let record = runtime.block_on(async {
        let monitor = aprs::HealthMonitor::new(
            Arc::new(settings),
            stations.into_iter().map(Arc::new).collect(),
            Arc::new(HealthRegistry::new()),
        );
        monitor.check().await
    });
    println!("{}", serde_json::to_string_pretty(&record)?);
    if record.status != HealthStatus::Healthy {
        bail!("APRS-IS login test failed");
    }
    Ok(())
}

fn run(path: &Path) -> Result<()> {
    let cfg = read_config(path)?;
    std::fs::create_dir_all(&cfg.directory.run)?;
    let _guard = log::init_logging_with_file(cfg.directory.run.clone())?;
    info!(
        "Starting {} {} with configuration {:?}",
        remoteweather::SOFTWARE,
        remoteweather::VERSION,
        path
    );

    debug!("Launching async runtime");
    let runtime = runtime::Builder::new_multi_thread().enable_all().build()?;
    let mut shutdown = Shutdown::new();
    runtime.block_on(async {
        let result = async_main(cfg, &mut shutdown).await;
        if let Err(e) = &result {
            error!("Main task exited with error: {e:?}");
        }
        shutdown.trigger_shutdown();
        info!("shut down - waiting for tasks to stop");
        shutdown.wait_for_completion().await;
        result
    })
}

async fn async_main(cfg: Config, shutdown: &mut Shutdown) -> Result<()> {
    // trap the ctrl+c signal, will only start listening later in the main loop
    shutdown::util::trap_ctrl_c(shutdown.handle()).await;

    let health_file = cfg.directory.run.join("health.json");
    debug!("Recording health in {:?}", health_file);
    let health = Arc::new(HealthRegistry::persisted(health_file));

    let store = MemoryStore::new(chrono::Duration::hours(
        cfg.backends.memory.retention_hours.into(),
    ));
    let aprs = match &cfg.aprs {
        Some(aprs_cfg) => {
            let mut aprs = AprsBackend::from_config(aprs_cfg, &cfg.stations, health.clone())?;
            if aprs_cfg.compute_day_rain {
                info!("Reporting day-rain computed from stored observations");
                aprs = aprs.with_rain_source(Arc::new(store.clone()));
            }
            Some(aprs)
        }
        None => {
            if cfg.stations.iter().any(|s| s.aprs.is_some()) {
                warn!("Stations have APRS settings but there is no [aprs] section, not reporting");
            } else {
                info!("APRS-IS reporting is not configured");
            }
            None
        }
    };

    let mut distributor = Distributor::new(cfg.distributor.backend_queue_size);
    let result = serve(&cfg, &mut distributor, store, aprs, shutdown).await;
    distributor.close().await;
    result
}

async fn serve(
    cfg: &Config,
    distributor: &mut Distributor,
    store: MemoryStore,
    aprs: Option<AprsBackend>,
    shutdown: &Shutdown,
) -> Result<()> {
    distributor
        .with_backend(MemoryBackend::new(store), shutdown.handle())
        .await?;
    if cfg.backends.log {
        distributor
            .with_backend(LogBackend::new(), shutdown.handle())
            .await?;
    }
    if let Some(aprs) = aprs {
        distributor.with_backend(aprs, shutdown.handle()).await?;
    }

    let (incoming, incoming_rx) = flume::bounded::<Reading>(cfg.distributor.queue_size.max(1));
    // without ingest nothing ever sends, but the queue must stay open
    let _idle: Option<Sender<Reading>> = match cfg.ingest.listen {
        Some(addr) => {
            let sock = ingest::bind(addr).await?;
            let handle = shutdown.handle();
            let trigger = shutdown.handle();
            tokio::spawn(async move {
                if let Err(e) = ingest::udp_ingest(sock, incoming, handle).await {
                    error!("Ingest failed: {e:?}");
                    trigger.trigger_shutdown();
                }
            });
            None
        }
        None => {
            warn!("No ingest address configured, readings will not arrive");
            Some(incoming)
        }
    };

    info!("running -- press ctrl+c to exit");
    distributor.run(incoming_rx, shutdown.handle()).await;
    Ok(())
}
