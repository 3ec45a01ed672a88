//! Shared helpers for engine integration tests.

#![allow(dead_code)]

pub mod gateway_server;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use outreach_core::job::{Job, JobId, JobRegistry};
use outreach_core::processor::EngineSettings;
use outreach_core::provider::{ChannelType, Provider, ProviderError, SendResult, UserIdentity};
use outreach_core::scheduler::SchedulerLimits;
use outreach_core::sheet::{self, Sheet};

/// What the scripted provider answers for one phone.
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(UserIdentity),
    NotFound,
    Fail(ProviderError),
}

/// In-memory provider answering from a per-phone script. Unscripted phones
/// are found with a generated identity.
#[derive(Default)]
pub struct ScriptedProvider {
    lookups: Mutex<HashMap<String, Lookup>>,
    lookup_delay: Duration,
    send_delay: Duration,
    send_delays: Mutex<HashMap<String, Duration>>,
    send_failures: Mutex<HashMap<String, ProviderError>>,
    calls: Mutex<Vec<(String, Instant)>>,
    sent: Mutex<Vec<(String, String)>>,
    live: AtomicUsize,
    peak: AtomicUsize,
}

/// Identity for phone `p`, with target id `u<p>`.
pub fn identity(phone: &str) -> UserIdentity {
    UserIdentity {
        name: Some(format!("User {phone}")),
        uid: Some(format!("u{phone}")),
        phone: Some(phone.to_string()),
        ..Default::default()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Sends to `target_id` take `delay` instead of the default send delay.
    pub fn slow_send_to(self, target_id: &str, delay: Duration) -> Self {
        self.send_delays
            .lock()
            .unwrap()
            .insert(target_id.to_string(), delay);
        self
    }

    pub fn script(self, phone: &str, lookup: Lookup) -> Self {
        self.lookups
            .lock()
            .unwrap()
            .insert(phone.to_string(), lookup);
        self
    }

    pub fn fail_send_to(self, target_id: &str, err: ProviderError) -> Self {
        self.send_failures
            .lock()
            .unwrap()
            .insert(target_id.to_string(), err);
        self
    }

    /// Phones looked up, in call order.
    pub fn looked_up(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn lookup_starts(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    /// (target id, message) pairs delivered.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Highest number of lookups running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct Live<'a>(&'a AtomicUsize);

impl Drop for Live<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn find_user(&self, phone: &str) -> Result<Option<UserIdentity>, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((phone.to_string(), Instant::now()));
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _live = Live(&self.live);
        if !self.lookup_delay.is_zero() {
            tokio::time::sleep(self.lookup_delay).await;
        }
        let scripted = self.lookups.lock().unwrap().get(phone).cloned();
        match scripted {
            Some(Lookup::Found(user)) => Ok(Some(user)),
            Some(Lookup::NotFound) => Ok(None),
            Some(Lookup::Fail(e)) => Err(e),
            None => Ok(Some(identity(phone))),
        }
    }

    async fn send_message(
        &self,
        content: &str,
        target_id: &str,
        _channel: ChannelType,
    ) -> Result<SendResult, ProviderError> {
        let delay = self
            .send_delays
            .lock()
            .unwrap()
            .get(target_id)
            .copied()
            .unwrap_or(self.send_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.send_failures.lock().unwrap().get(target_id).cloned() {
            return Err(e);
        }
        self.sent
            .lock()
            .unwrap()
            .push((target_id.to_string(), content.to_string()));
        Ok(SendResult {
            message_id: Some(format!("m-{target_id}")),
        })
    }
}

/// Fast settings: wide start window, 10 ms pause poll.
pub fn fast_settings(concurrency: usize) -> EngineSettings {
    EngineSettings {
        limits: SchedulerLimits {
            concurrency,
            interval_cap: 1_000,
            interval: Duration::from_millis(10),
        },
        checkpoint_interval: 5,
        pause_poll: Duration::from_millis(10),
        templates: vec!["Hello {name}".to_string()].into(),
    }
}

/// Valid test phone number `n`.
pub fn phone(n: usize) -> String {
    format!("09123{n:05}")
}

pub async fn write_dataset(dir: &Path, name: &str, sheet: &Sheet) -> PathBuf {
    let path = dir.join(name);
    sheet::flush(sheet, &path).await.unwrap();
    path
}

pub async fn read_dataset(path: &Path) -> Sheet {
    sheet::load(path).await.unwrap()
}

/// Poll the registry until `pred` holds for the job, or panic after 10 s.
pub async fn wait_for<F>(registry: &JobRegistry, id: JobId, mut pred: F) -> Job
where
    F: FnMut(&Job) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(job) = registry.get(id) {
            if pred(&job) {
                return job;
            }
        }
        assert!(Instant::now() < deadline, "condition not reached for job {id}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn shared(provider: ScriptedProvider) -> (Arc<ScriptedProvider>, Arc<dyn Provider>) {
    let provider = Arc::new(provider);
    let dyn_provider: Arc<dyn Provider> = provider.clone();
    (provider, dyn_provider)
}
