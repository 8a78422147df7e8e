// End-to-end scenarios: startup handshake, tracking loop and shutdown,
// driven through simulated lines and a manual clock.

use chrono::{TimeZone, Utc};
use photon_monitor::{
    DecoderConfig, Edge, Level, LineMode, ManualClock, MeasurementSink, MemorySink, MilliVolts,
    Monitor, MonitorError, MonitorOptions, Phase, PinRole, Reading, SimulatedPins, SinkError,
};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PERIOD: Duration = Duration::from_secs(120);

fn options() -> MonitorOptions {
    MonitorOptions::new()
        .with_startup_timeout(Duration::from_secs(300))
        .with_decoder(DecoderConfig::new().with_idle_timeout(Some(Duration::from_secs(1))))
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ))
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn connect<S: MeasurementSink>(
    sink: S,
) -> (Arc<SimulatedPins>, Arc<ManualClock>, Monitor<SimulatedPins, Arc<ManualClock>, S>) {
    init_logging();
    let pins = Arc::new(SimulatedPins::new());
    pins.push_edge(PinRole::StartSignal);
    let clock = clock();
    let monitor = Monitor::init(pins.clone(), clock.clone(), sink, options())
        .expect("Failed to initialise monitor");
    (pins, clock, monitor)
}

/// Fails the first `failures` appends, then stores into `inner`
struct FlakySink {
    failures: usize,
    inner: MemorySink,
}

impl MeasurementSink for FlakySink {
    fn append(&mut self, reading: &Reading) -> Result<(), SinkError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(SinkError::Rejected("disk full".to_string()));
        }
        self.inner.append(reading)
    }
}

/// Blocks inside `append` until released, then fails
struct GateSink {
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

impl MeasurementSink for GateSink {
    fn append(&mut self, _reading: &Reading) -> Result<(), SinkError> {
        let _ = self.entered.send(());
        let _ = self.release.recv();
        Err(SinkError::Rejected("gate closed".to_string()))
    }
}

#[test]
fn test_startup_handshake_configures_lines() {
    let (pins, _clock, _monitor) = connect(MemorySink::new());

    assert_eq!(pins.output_level(PinRole::BootedHandshake), Some(Level::High));
    assert_eq!(pins.output_level(PinRole::ReadyHandshake), Some(Level::High));
    assert_eq!(pins.mode(PinRole::StartSignal), Some(LineMode::Input(Edge::Falling)));
    assert_eq!(pins.mode(PinRole::Clock), Some(LineMode::Input(Edge::Rising)));
    assert_eq!(pins.mode(PinRole::Data), Some(LineMode::Input(Edge::None)));
}

#[test]
fn test_startup_timeout_keeps_handshake_high() {
    let pins = Arc::new(SimulatedPins::new());
    let result = Monitor::init(pins.clone(), clock(), MemorySink::new(), options());

    match result {
        Err(MonitorError::StartupTimeout(timeout)) => assert_eq!(timeout, Duration::from_secs(300)),
        Err(e) => panic!("Expected startup timeout, got {}", e),
        Ok(_) => panic!("Expected startup timeout"),
    }
    assert_eq!(pins.output_level(PinRole::BootedHandshake), Some(Level::High));
    assert_eq!(pins.output_level(PinRole::ReadyHandshake), Some(Level::High));
}

#[test]
fn test_startup_fails_when_line_cannot_be_configured() {
    let pins = Arc::new(SimulatedPins::new());
    pins.push_edge(PinRole::StartSignal);
    pins.fail_configuration(PinRole::Clock);

    let result = Monitor::init(pins, clock(), MemorySink::new(), options());
    assert!(matches!(result, Err(MonitorError::Hardware(_))));
}

#[test]
fn test_end_to_end_reading() {
    let sink = MemorySink::new();
    let (pins, _clock, monitor) = connect(sink.clone());
    pins.script_transmission(0b1011_0100);

    let reading = monitor.sample_once().unwrap();

    assert_eq!(reading.voltage, MilliVolts(7200));
    assert_eq!(reading.voltage.volts(), 7.2);
    let percentage = reading.voltage.percentage();
    assert!((percentage - 4.333).abs() < 1e-3, "percentage was {}", percentage);

    assert_eq!(sink.readings(), vec![reading]);
    assert_eq!(monitor.latest().get(), Some(reading));
    assert!(!monitor.is_tracking());
}

#[test]
fn test_track_samples_on_fixed_rate() {
    let sink = MemorySink::new();
    let (pins, _clock, monitor) = connect(sink.clone());
    for raw in [100, 99, 98] {
        pins.script_transmission(raw);
    }

    // Runs until the device goes quiet
    match monitor.track(PERIOD) {
        Err(MonitorError::DecodeStall { phase, .. }) => assert_eq!(phase, Phase::Idle),
        other => panic!("Expected idle stall, got {:?}", other),
    }

    let readings = sink.readings();
    let voltages: Vec<_> = readings.iter().map(|r| r.voltage).collect();
    assert_eq!(voltages, vec![MilliVolts(4000), MilliVolts(3960), MilliVolts(3920)]);

    let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    assert_eq!(readings[0].captured_at, start);
    assert_eq!(readings[1].captured_at, start + chrono::Duration::seconds(120));
    assert_eq!(readings[2].captured_at, start + chrono::Duration::seconds(240));

    assert_eq!(monitor.latest().get(), Some(readings[2]));
    assert!(!monitor.is_tracking());
}

#[test]
fn test_track_rejects_zero_period() {
    let (_pins, _clock, monitor) = connect(MemorySink::new());
    assert!(matches!(
        monitor.track(Duration::ZERO),
        Err(MonitorError::InvalidPeriod(_))
    ));
    assert!(!monitor.is_tracking());
}

#[test]
fn test_concurrent_track_is_rejected() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let sink = GateSink {
        entered: entered_tx,
        release: release_rx,
    };

    let (pins, _clock, monitor) = connect(sink);
    pins.script_transmission(0x80);
    let monitor = Arc::new(monitor);

    let worker = {
        let monitor = monitor.clone();
        thread::spawn(move || monitor.track(PERIOD))
    };

    // First loop is now parked inside the sink
    entered_rx.recv().unwrap();
    assert!(monitor.is_tracking());
    assert!(matches!(monitor.track(PERIOD), Err(MonitorError::AlreadyTracking)));
    assert!(matches!(monitor.sample_once(), Err(MonitorError::AlreadyTracking)));
    assert!(monitor.is_tracking());

    release_tx.send(()).unwrap();
    let result = worker.join().unwrap();
    assert!(matches!(
        result,
        Err(MonitorError::Persistence(SinkError::Rejected(_)))
    ));
    assert!(!monitor.is_tracking());
}

#[test]
fn test_sink_failure_ends_tracking_and_releases_flag() {
    let stored = MemorySink::new();
    let sink = FlakySink {
        failures: 1,
        inner: stored.clone(),
    };
    let (pins, _clock, monitor) = connect(sink);

    pins.script_transmission(0x50);
    let first = monitor.track(PERIOD);
    assert!(matches!(first, Err(MonitorError::Persistence(_))));
    assert!(!monitor.is_tracking());
    assert_eq!(monitor.latest().get(), None);

    // A new loop may start and stores normally
    pins.script_transmission(0x60);
    let second = monitor.track(PERIOD);
    assert!(matches!(second, Err(MonitorError::DecodeStall { .. })));

    let readings = stored.readings();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].voltage, MilliVolts(0x60 * 40));
}

#[test]
fn test_shutdown_while_tracking_leaves_protocol_lines_alone() {
    let (pins, _clock, monitor) = connect(MemorySink::new());
    pins.script_transmission(0x90);
    monitor.sample_once().unwrap();

    let coordinator = monitor.shutdown_coordinator();
    assert!(coordinator.shutdown());
    assert!(!monitor.shutdown_coordinator().shutdown());

    assert_eq!(pins.output_level(PinRole::BootedHandshake), Some(Level::Low));
    assert_eq!(pins.output_level(PinRole::ReadyHandshake), Some(Level::High));
    assert_eq!(pins.mode(PinRole::StartSignal), Some(LineMode::Input(Edge::Falling)));
}
