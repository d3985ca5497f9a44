//! Mock construction helpers

use std::thread::JoinHandle;
use uroflow_rs::acquisition::{AcquisitionBackend, AcquisitionMessage, OperatorHandle};
use uroflow_rs::config::AppConfig;
use uroflow_rs::link::{MockLink, MockLinkHandle};
use uroflow_rs::Sample;

/// Config with a short tick so tests run quickly
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.acquisition.tick_period_ms = 5;
    config.acquisition.command_timeout_ms = 2000;
    config.link.settle_ms = 0;
    config
}

/// A running acquisition worker driven by a mock link
pub struct MockRig {
    pub operator: OperatorHandle,
    pub device: MockLinkHandle,
    pub worker: Option<JoinHandle<()>>,
}

impl MockRig {
    /// Spawn a worker over an open mock link
    pub fn spawn(config: AppConfig) -> Self {
        let (link, device) = MockLink::new();
        Self::spawn_with(config, link, device)
    }

    /// Spawn a worker over a mock link that starts closed
    pub fn spawn_closed(config: AppConfig) -> Self {
        let (link, device) = MockLink::closed();
        Self::spawn_with(config, link, device)
    }

    fn spawn_with(config: AppConfig, link: MockLink, device: MockLinkHandle) -> Self {
        let (backend, operator) = AcquisitionBackend::new(config, Box::new(link));
        let worker = backend.spawn().expect("spawn acquisition worker");
        Self {
            operator,
            device,
            worker: Some(worker),
        }
    }

    /// Number of samples the worker currently holds
    pub fn sample_count(&self) -> usize {
        self.operator.status().expect("status").sample_count
    }

    /// Samples reported through the message channel so far
    pub fn accepted_samples(&self) -> Vec<Sample> {
        self.operator
            .drain()
            .into_iter()
            .filter_map(|m| match m {
                AcquisitionMessage::SampleAccepted(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Shut the worker down and wait for it
    pub fn shutdown(mut self) {
        self.operator.shutdown();
        if let Some(worker) = self.worker.take() {
            worker.join().expect("worker thread exits cleanly");
        }
    }
}
