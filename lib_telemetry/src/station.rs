//! # Ground Station
//!
//! The facade a presentation layer talks to. It builds the shared console,
//! store and event bus, hands them to the port registry and the launch
//! controller, and exposes the operator commands and read-only queries.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::configs::{ConfigError, StationSettings};
use crate::core::{ConsoleLog, EventBus, Subscription, TelemetryRecord, TelemetryStats, TelemetryStore};
use crate::launch::{
    LaunchController, LaunchError, LaunchMode, LaunchScript, LaunchSequencer, LaunchState, ScriptedTrigger,
    StepTrigger, TelemetryTrigger,
};
#[cfg(feature = "serial")]
use crate::ports::OsSerialTransport;
use crate::ports::{CompositeTransport, Port, PortError, PortRegistry, SerialTransport, SimTransport};

/// Optional capabilities resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Operating-system serial ports are compiled in.
    pub os_serial: bool,
    /// The `SIM0` simulator port is offered.
    pub simulator: bool,
}

impl Capabilities {
    /// What this build and `settings` provide.
    pub fn detect(settings: &StationSettings) -> Self {
        Self {
            os_serial: cfg!(feature = "serial"),
            simulator: settings.simulator,
        }
    }
}

/// Snapshot backing the status bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStatus {
    /// Time since liftoff, or the device's own mission clock before that.
    pub mission_clock: Option<Duration>,
    /// Satellites in view.
    pub satellites: Option<u8>,
    /// Id of the open port.
    pub port: Option<String>,
    /// Signal strength.
    pub rssi_dbm: Option<f64>,
    /// Battery charge.
    pub battery_pct: Option<f64>,
    /// Launch state.
    pub launch_state: LaunchState,
    /// Decode and error counters.
    pub stats: TelemetryStats,
}

impl StationStatus {
    /// True while a port is open.
    pub fn connected(&self) -> bool {
        self.port.is_some()
    }
}

/// # Ground Station
pub struct GroundStation {
    settings: StationSettings,
    capabilities: Capabilities,
    bus: EventBus,
    console: Arc<ConsoleLog>,
    store: Arc<TelemetryStore>,
    ports: PortRegistry,
    launch: LaunchController,
    script: Arc<LaunchScript>,
}

impl GroundStation {
    /// Builds a station reading through `transport`.
    pub fn new(
        settings: StationSettings,
        transport: Arc<dyn SerialTransport>,
        capabilities: Capabilities,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let script = Arc::new(settings.load_launch_script()?);

        let bus = EventBus::new(settings.event_capacity);
        let console = Arc::new(ConsoleLog::new(settings.console_capacity, bus.clone()));
        let store = Arc::new(TelemetryStore::new(bus.clone()));
        let ports = PortRegistry::new(
            transport,
            Arc::clone(&console),
            Arc::clone(&store),
            bus.clone(),
            settings.parser_config(),
        );
        let launch = LaunchController::new(Arc::clone(&console), bus.clone());

        log::info!(
            "Ground station initialized (launch mode {}, {} script steps, {:?})",
            settings.launch_mode,
            script.len(),
            capabilities
        );
        console.info("Initializing system...");

        Ok(Self {
            settings,
            capabilities,
            bus,
            console,
            store,
            ports,
            launch,
            script,
        })
    }

    /// Builds a station over OS ports (when compiled in) and the simulator
    /// (when enabled).
    pub fn with_default_transports(settings: StationSettings) -> Result<Self, ConfigError> {
        let capabilities = Capabilities::detect(&settings);
        let mut transport = CompositeTransport::new();
        #[cfg(feature = "serial")]
        {
            transport = transport.with(Arc::new(OsSerialTransport::new(
                settings.baud_rate,
                settings.read_timeout(),
            )));
        }
        if settings.simulator {
            transport = transport.with(Arc::new(SimTransport::new(settings.sim_config())));
        }
        Self::new(settings, Arc::new(transport), capabilities)
    }

    /// Available ports with their states.
    pub fn ports(&self) -> Vec<Port> {
        self.ports.list()
    }

    /// Opens `port_id` and starts ingesting its telemetry.
    pub async fn open(&self, port_id: &str) -> Result<(), PortError> {
        self.ports.open(port_id).await
    }

    /// Closes the open port, if any.
    pub async fn close(&self) -> Result<(), PortError> {
        self.ports.close().await
    }

    /// Starts a launch run in the configured mode.
    pub fn start_launch(&self) -> Result<Arc<LaunchSequencer>, LaunchError> {
        let script = Arc::clone(&self.script);
        self.launch.start(script, || match self.settings.launch_mode {
            LaunchMode::Mock => Ok(Box::new(ScriptedTrigger) as Box<dyn StepTrigger>),
            LaunchMode::Live => {
                if !self.ports.is_connected() {
                    return Err(LaunchError::LinkRequired);
                }
                let trigger = TelemetryTrigger::for_script(
                    &self.script,
                    self.store.subscribe(),
                    self.settings.live_conditions.clone(),
                )?;
                Ok(Box::new(trigger) as Box<dyn StepTrigger>)
            }
        })
    }

    /// Aborts the active run. Returns `false` when nothing is running.
    pub fn abort_launch(&self) -> bool {
        self.launch.abort()
    }

    /// Last decoded telemetry.
    pub fn latest_telemetry(&self) -> Arc<TelemetryRecord> {
        self.store.latest()
    }

    /// The shared console log.
    pub fn console(&self) -> &Arc<ConsoleLog> {
        &self.console
    }

    /// The shared telemetry store.
    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    /// State of the current launch run.
    pub fn launch_state(&self) -> LaunchState {
        self.launch.state()
    }

    /// The run flag.
    pub fn is_running(&self) -> bool {
        self.launch.is_running()
    }

    /// The current or most recent launch run.
    pub fn current_run(&self) -> Option<Arc<LaunchSequencer>> {
        self.launch.current()
    }

    /// True while a port is open.
    pub fn is_connected(&self) -> bool {
        self.ports.is_connected()
    }

    /// Registers a change-notification subscriber.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Snapshot for the status bar.
    pub fn status(&self) -> StationStatus {
        let record = self.store.latest();
        let mission_clock = self
            .launch
            .current()
            .and_then(|run| run.mission_elapsed())
            .or_else(|| {
                record
                    .mission_time_s
                    .and_then(|s| Duration::try_from_secs_f64(s).ok())
            });

        StationStatus {
            mission_clock,
            satellites: record.satellite_count,
            port: self.ports.open_port_id(),
            rssi_dbm: record.rssi_dbm,
            battery_pct: record.battery_pct,
            launch_state: self.launch.state(),
            stats: self.store.stats(),
        }
    }

    /// Settings the station was built with.
    pub fn settings(&self) -> &StationSettings {
        &self.settings
    }

    /// Capabilities resolved at startup.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Aborts any run and closes the port.
    pub async fn shutdown(&self) {
        if self.launch.abort() {
            log::info!("Launch run aborted by shutdown");
        }
        if let Err(e) = self.ports.close().await {
            log::warn!("Failed to close port during shutdown: {}", e);
        }
    }
}
