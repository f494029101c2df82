//! Scripted checker shared by unit tests.

use crate::checker::AvailabilityChecker;
use crate::normalize::Domain;
use crate::types::Availability;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Answers from a fixed table (default: unavailable) and records when each
/// lookup started.
#[derive(Default)]
pub struct ScriptedChecker {
    answers: HashMap<String, Availability>,
    delays: HashMap<String, Duration>,
    panics: bool,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedChecker {
    pub fn answer(mut self, domain: &str, result: Availability) -> Self {
        self.answers.insert(domain.to_string(), result);
        self
    }

    pub fn delay(mut self, domain: &str, delay: Duration) -> Self {
        self.delays.insert(domain.to_string(), delay);
        self
    }

    /// Every lookup panics.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AvailabilityChecker for ScriptedChecker {
    async fn check(&self, domain: &Domain) -> Availability {
        if self.panics {
            panic!("scripted checker panic on {}", domain);
        }
        self.calls
            .lock()
            .unwrap()
            .push((domain.to_string(), Instant::now()));
        if let Some(delay) = self.delays.get(domain.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        self.answers
            .get(domain.as_str())
            .cloned()
            .unwrap_or(Availability::Unavailable)
    }
}

pub fn fail() -> Availability {
    Availability::error("boom")
}
