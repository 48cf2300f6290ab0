// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for lines of scripted devices.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use smartyline::client::{ClientFactory, DeviceClient, DeviceCommand};
use smartyline::coordinator::{CoordinatorOptions, CoordinatorPhase, DeviceCoordinator};
use smartyline::error::{ClientError, CommandErrorKind, Error};
use smartyline::event::{DeviceEvent, EventBus};
use smartyline::gate::TransportGate;
use smartyline::line::{Line, LineConfig, PollConnection};
use smartyline::types::{DeviceAddress, FanSpeed};

// ============================================================================
// Scripted line
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    Data(u8),
    NoData,
    Fail,
}

/// A simulated line with one script of update results per address.
///
/// Commands change the simulated unit, so the next `Data` step reports the
/// commanded speed when it carries `0`.
#[derive(Debug, Default)]
struct SimLine {
    scripts: Mutex<HashMap<u8, VecDeque<Step>>>,
    speeds: Mutex<HashMap<u8, u8>>,
    io_time: Duration,
    in_io: AtomicBool,
    overlaps: AtomicU32,
    connects: AtomicU32,
    closes: AtomicU32,
    fail_close: AtomicBool,
}

impl SimLine {
    fn new(io_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            io_time,
            ..Self::default()
        })
    }

    fn script(&self, address: u8, steps: impl IntoIterator<Item = Step>) {
        self.scripts
            .lock()
            .entry(address)
            .or_default()
            .extend(steps);
    }

    fn io<T>(&self, call: impl FnOnce() -> T) -> T {
        if self.in_io.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.io_time.is_zero() {
            std::thread::sleep(self.io_time);
        }
        let result = call();
        self.in_io.store(false, Ordering::SeqCst);
        result
    }
}

#[derive(Debug, Clone)]
struct SimFactory(Arc<SimLine>);

impl ClientFactory for SimFactory {
    type Client = SimClient;

    fn connect(&self, _host: &str, address: DeviceAddress) -> Result<SimClient, ClientError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        Ok(SimClient {
            line: Arc::clone(&self.0),
            address: address.value(),
            fan_speed: FanSpeed::OFF,
        })
    }
}

#[derive(Debug)]
struct SimClient {
    line: Arc<SimLine>,
    address: u8,
    fan_speed: FanSpeed,
}

impl SimClient {
    fn command(&mut self, speed: u8) -> Result<bool, ClientError> {
        let line = Arc::clone(&self.line);
        line.io(|| {
            line.speeds.lock().insert(self.address, speed);
            Ok(true)
        })
    }
}

impl DeviceClient for SimClient {
    fn update(&mut self) -> Result<bool, ClientError> {
        let line = Arc::clone(&self.line);
        let step = line.io(|| {
            line.scripts
                .lock()
                .get_mut(&self.address)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Step::NoData)
        });

        match step {
            Step::Data(0) => {
                let speed = line.speeds.lock().get(&self.address).copied().unwrap_or(0);
                self.fan_speed = FanSpeed::new(speed).unwrap();
                Ok(true)
            }
            Step::Data(speed) => {
                self.fan_speed = FanSpeed::new(speed).unwrap();
                Ok(true)
            }
            Step::NoData => Ok(false),
            Step::Fail => Err(ClientError::Timeout(500)),
        }
    }

    fn fan_speed(&self) -> FanSpeed {
        self.fan_speed
    }

    fn boost(&self) -> bool {
        false
    }

    fn software_version(&self) -> String {
        "1.10".to_string()
    }

    fn configuration_version(&self) -> String {
        "1.3".to_string()
    }

    fn set_fan_speed(&mut self, speed: FanSpeed) -> Result<bool, ClientError> {
        self.command(speed.value())
    }

    fn enable_boost(&mut self) -> Result<bool, ClientError> {
        Ok(true)
    }

    fn disable_boost(&mut self) -> Result<bool, ClientError> {
        Ok(true)
    }

    fn turn_off(&mut self) -> Result<bool, ClientError> {
        self.command(0)
    }

    fn reset_filters_timer(&mut self) -> Result<bool, ClientError> {
        Ok(true)
    }

    fn close(&mut self) -> Result<(), ClientError> {
        self.line.closes.fetch_add(1, Ordering::SeqCst);
        if self.line.fail_close.load(Ordering::SeqCst) {
            return Err(ClientError::Io("broken pipe".to_string()));
        }
        Ok(())
    }
}

fn address(value: u8) -> DeviceAddress {
    DeviceAddress::new(value).unwrap()
}

async fn coordinator(
    line: &Arc<SimLine>,
    device: u8,
    gate: &TransportGate,
    events: &EventBus,
) -> Result<Arc<DeviceCoordinator<SimFactory>>, Error> {
    DeviceCoordinator::setup(
        address(device),
        "192.168.1.40",
        Arc::new(SimFactory(Arc::clone(line))),
        gate.clone(),
        events.clone(),
        CoordinatorOptions::default(),
    )
    .await
}

// ============================================================================
// Refresh
// ============================================================================

mod refresh {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn immediate_success_reaches_ready_without_delay() {
        let line = SimLine::new(Duration::ZERO);
        line.script(5, [Step::Data(1)]);
        let start = tokio::time::Instant::now();

        let coordinator = coordinator(&line, 5, &TransportGate::new("line"), &EventBus::new())
            .await
            .unwrap();

        assert_eq!(coordinator.phase(), CoordinatorPhase::Ready);
        assert_eq!(coordinator.state().unwrap().fan_speed(), FanSpeed::LOW);
        assert_eq!(coordinator.stats().retry_delays, 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_last_attempt_waits_twice() {
        let line = SimLine::new(Duration::ZERO);
        line.script(12, [Step::Fail, Step::Fail, Step::Data(3)]);
        let start = tokio::time::Instant::now();

        let coordinator = coordinator(&line, 12, &TransportGate::new("line"), &EventBus::new())
            .await
            .unwrap();

        assert_eq!(coordinator.phase(), CoordinatorPhase::Ready);
        assert_eq!(coordinator.state().unwrap().fan_speed(), FanSpeed::HIGH);
        assert_eq!(coordinator.stats().retry_delays, 2);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_refresh_keeps_previous_state() {
        let line = SimLine::new(Duration::ZERO);
        line.script(7, [Step::Data(2), Step::Fail, Step::Fail, Step::Fail]);
        let events = EventBus::new();
        let coordinator = coordinator(&line, 7, &TransportGate::new("line"), &events)
            .await
            .unwrap();
        let before = coordinator.state().unwrap();
        let mut rx = events.subscribe();

        let err = coordinator.refresh().await.unwrap_err();

        match err {
            Error::Refresh(err) => {
                assert_eq!(err.attempts, 3);
                assert_eq!(err.last_error, Some(ClientError::Timeout(500)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(Arc::ptr_eq(&before, &coordinator.state().unwrap()));
        assert!(matches!(
            rx.recv().await.unwrap(),
            DeviceEvent::RefreshFailed { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn identical_data_publishes_no_state_change() {
        let line = SimLine::new(Duration::ZERO);
        line.script(5, [Step::Data(1), Step::Data(1)]);
        let events = EventBus::new();
        let coordinator = coordinator(&line, 5, &TransportGate::new("line"), &events)
            .await
            .unwrap();
        let mut rx = events.subscribe();

        coordinator.refresh().await.unwrap();

        assert!(rx.try_recv().is_err());
        assert!(coordinator.is_available());
    }
}

// ============================================================================
// Commands
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test]
    async fn set_speed_then_refresh_shows_new_speed() {
        let line = SimLine::new(Duration::ZERO);
        line.script(5, [Step::Data(1), Step::Data(0)]);
        let coordinator = coordinator(&line, 5, &TransportGate::new("line"), &EventBus::new())
            .await
            .unwrap();
        let connects = line.connects.load(Ordering::SeqCst);

        coordinator
            .send_command(DeviceCommand::SetFanSpeed(FanSpeed::MEDIUM))
            .await
            .unwrap();

        assert_eq!(line.connects.load(Ordering::SeqCst), connects + 1);
        assert_eq!(line.closes.load(Ordering::SeqCst), 1);

        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.state().unwrap().fan_speed(), FanSpeed::MEDIUM);
    }

    #[tokio::test]
    async fn close_failure_does_not_mask_command_result() {
        let line = SimLine::new(Duration::ZERO);
        line.script(5, [Step::Data(1)]);
        let coordinator = coordinator(&line, 5, &TransportGate::new("line"), &EventBus::new())
            .await
            .unwrap();
        line.fail_close.store(true, Ordering::SeqCst);

        coordinator.turn_off().await.unwrap();

        assert_eq!(line.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn arbitrary_mutation_returns_its_value() {
        let line = SimLine::new(Duration::ZERO);
        line.script(5, [Step::Data(1)]);
        let coordinator = coordinator(&line, 5, &TransportGate::new("line"), &EventBus::new())
            .await
            .unwrap();

        let version = coordinator
            .execute(|client| Ok(client.software_version()))
            .await
            .unwrap();

        assert_eq!(version, "1.10");
        assert_eq!(line.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mutation_error_is_classified() {
        let line = SimLine::new(Duration::ZERO);
        line.script(5, [Step::Data(1)]);
        let coordinator = coordinator(&line, 5, &TransportGate::new("line"), &EventBus::new())
            .await
            .unwrap();

        let err = coordinator
            .execute(|_client| -> Result<(), ClientError> {
                Err(ClientError::InvalidResponse("exception 2".to_string()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err.kind, CommandErrorKind::Communication(_)));
        assert_eq!(line.closes.load(Ordering::SeqCst), 1);
    }
}

// ============================================================================
// Serialization on a shared line
// ============================================================================

mod shared_line {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_operations_never_overlap() {
        let line = SimLine::new(Duration::from_millis(5));
        for device in [1, 2] {
            line.script(device, (0..20).map(|_| Step::Data(1)));
        }
        let gate = TransportGate::new("line");
        let events = EventBus::new();
        let first = coordinator(&line, 1, &gate, &events).await.unwrap();
        let second = coordinator(&line, 2, &gate, &events).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..5 {
            for coordinator in [&first, &second] {
                let refresh = Arc::clone(coordinator);
                tasks.push(tokio::spawn(async move {
                    refresh.refresh().await.unwrap();
                }));
                let command = Arc::clone(coordinator);
                tasks.push(tokio::spawn(async move {
                    command.set_fan_percentage(100).await.unwrap();
                }));
            }
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(line.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(gate.acquisitions(), 22);
        assert!(!gate.is_busy());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn lines_with_ephemeral_polling_never_overlap() {
        let sim = SimLine::new(Duration::from_millis(5));
        for device in [1, 2, 3] {
            sim.script(device, (0..30).map(|_| Step::Data(2)));
        }
        let config = LineConfig::new("192.168.1.40")
            .with_address_list("1, 2, 3")
            .unwrap()
            .with_poll_interval(Duration::from_millis(20))
            .with_poll_connection(PollConnection::Ephemeral);

        let line = Line::setup(config, Arc::new(SimFactory(Arc::clone(&sim))))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        line.shutdown().await;

        assert_eq!(sim.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(
            sim.connects.load(Ordering::SeqCst),
            sim.closes.load(Ordering::SeqCst)
        );
    }
}

// ============================================================================
// Line lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn line_reports_online_devices_and_stops_them() {
        let sim = SimLine::new(Duration::ZERO);
        sim.script(5, [Step::Data(1)]);
        sim.script(12, [Step::Data(3)]);
        let config = LineConfig::from_json(r#"{"host": "192.168.1.40", "slaves": [5, 12]}"#)
            .unwrap();

        let mut line = Line::new(config, Arc::new(SimFactory(Arc::clone(&sim)))).unwrap();
        let mut rx = line.subscribe();
        line.start().await.unwrap();

        assert_eq!(line.addresses(), vec![address(5), address(12)]);
        assert_eq!(line.coordinator(address(12)).unwrap().versions().unwrap().software, "1.10");

        line.shutdown().await;

        let mut online = 0;
        let mut stopped = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                DeviceEvent::DeviceOnline { .. } => online += 1,
                DeviceEvent::DeviceStopped { .. } => stopped += 1,
                _ => {}
            }
        }
        assert_eq!(online, 2);
        assert_eq!(stopped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn one_unreachable_device_fails_the_line() {
        let sim = SimLine::new(Duration::ZERO);
        sim.script(1, [Step::Data(1)]);
        sim.script(2, [Step::Fail, Step::Fail, Step::Fail]);
        let config = LineConfig::new("192.168.1.40")
            .with_address_list("1, 2")
            .unwrap();

        let err = Line::setup(config, Arc::new(SimFactory(Arc::clone(&sim))))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Setup { address: a, .. } if a == address(2)));
        assert_eq!(
            sim.connects.load(Ordering::SeqCst),
            sim.closes.load(Ordering::SeqCst)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn commands_after_shutdown_fail() {
        let sim = SimLine::new(Duration::ZERO);
        sim.script(1, [Step::Data(1)]);
        let line = Line::setup(
            LineConfig::new("192.168.1.40"),
            Arc::new(SimFactory(Arc::clone(&sim))),
        )
        .await
        .unwrap();
        let coordinator = Arc::clone(line.coordinator(address(1)).unwrap());

        line.shutdown().await;

        let err = coordinator.turn_off().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Command(ref e) if e.kind == CommandErrorKind::GateClosed
        ));
        assert!(matches!(coordinator.refresh().await, Err(Error::GateClosed(_))));
    }
}
