//! Concurrent subscription demo
//!
//! Simulates many users subscribing to a handful of topics at once while
//! the counts are polled, then removes everything again. The registry is
//! never locked; consistency comes from the serializer alone.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use futures_util::future::try_join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};

use crate::config::{ActionConfig, DemoSettings, RemoveMode};
use crate::error::Error;
use crate::executor::{Scope, StatsSnapshot};
use crate::subscription::{LockFreeSubscriptions, PersonName, SubscriptionHandler, SubscriptionId, Topic};

/// Demo scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Create every subscription, wait for all of them, then remove them
    CreateThenDelete,
    /// Remove each subscription as soon as it has been created
    CreateAndDelete,
}

impl Scenario {
    pub const ALL: [Scenario; 2] = [Scenario::CreateThenDelete, Scenario::CreateAndDelete];
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::CreateThenDelete => write!(f, "create-then-delete"),
            Scenario::CreateAndDelete => write!(f, "create-and-delete"),
        }
    }
}

/// Outcome of one scenario
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub scenario: Scenario,
    /// Subscriptions created
    pub created: usize,
    /// Highest total count observed while polling
    pub peak_total: usize,
    /// Number of count rounds performed
    pub polls: u64,
    /// Per-topic counts at the end (empty when everything was removed)
    pub final_counts: BTreeMap<Topic, usize>,
    pub elapsed_ms: u64,
}

/// Reports of a whole demo run plus the serializer counters
#[derive(Debug, Clone, Serialize)]
pub struct DemoSummary {
    pub reports: Vec<DemoReport>,
    pub stats: StatsSnapshot,
}

/// Run `scenarios` in order against a fresh registry
///
/// The registry's scope is cancelled and its loop joined before returning,
/// whether the scenarios succeeded or not.
pub async fn run_demo(config: &ActionConfig, scenarios: &[Scenario]) -> anyhow::Result<DemoSummary> {
    let scope = Scope::new();
    let (registry, handle) = LockFreeSubscriptions::spawn(scope.clone(), config.serializer_config());
    let handler: Arc<dyn SubscriptionHandler> = Arc::new(registry.clone());

    let mut reports = Vec::with_capacity(scenarios.len());
    let mut outcome = Ok(());
    for &scenario in scenarios {
        match run_scenario(Arc::clone(&handler), scenario, &config.demo).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    scope.cancel();
    handle.join().await.context("subscription registry did not shut down cleanly")?;
    outcome?;

    let stats = registry.stats();
    info!(executed = stats.executed(), failed = stats.failed, dropped = stats.dropped, "Demo finished");
    Ok(DemoSummary { reports, stats })
}

/// Run one scenario, bounded by the configured timeout
pub async fn run_scenario(
    handler: Arc<dyn SubscriptionHandler>,
    scenario: Scenario,
    settings: &DemoSettings,
) -> anyhow::Result<DemoReport> {
    let started = Instant::now();
    let limit = Duration::from_secs(settings.timeout_secs);

    let run = async {
        match scenario {
            Scenario::CreateThenDelete => create_then_delete(handler, settings).await,
            Scenario::CreateAndDelete => create_and_delete(handler, settings).await,
        }
    };

    let mut report = tokio::time::timeout(limit, run.instrument(info_span!("scenario", %scenario)))
        .await
        .map_err(|_| Error::Timeout(format!("scenario {} after {}s", scenario, settings.timeout_secs)))??;

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        %scenario,
        created = report.created,
        peak_total = report.peak_total,
        polls = report.polls,
        elapsed_ms = report.elapsed_ms,
        "Scenario completed"
    );
    Ok(report)
}

/// Create all subscriptions while polling, then remove them all
async fn create_then_delete(
    handler: Arc<dyn SubscriptionHandler>,
    settings: &DemoSettings,
) -> anyhow::Result<DemoReport> {
    let (created_tx, created_rx) = mpsc::channel(settings.users);
    let creators = spawn_creators(&handler, settings, created_tx);

    let mut progress = Progress::default();
    poll_until(handler.as_ref(), settings, settings.users, &mut progress).await?;
    join_all_tasks(creators).await.context("creating subscriptions")?;

    let (created, removers) = spawn_removers(&handler, settings, created_rx).await?;
    poll_until(handler.as_ref(), settings, 0, &mut progress).await?;
    join_all_tasks(removers).await.context("removing subscriptions")?;

    finish(handler.as_ref(), Scenario::CreateThenDelete, created, progress).await
}

/// Remove every subscription as soon as its creation is reported
async fn create_and_delete(
    handler: Arc<dyn SubscriptionHandler>,
    settings: &DemoSettings,
) -> anyhow::Result<DemoReport> {
    // Capacity 1: each creator waits until its id has been picked up.
    let (created_tx, created_rx) = mpsc::channel(1);
    let creators = spawn_creators(&handler, settings, created_tx);

    let (created, removers) = spawn_removers(&handler, settings, created_rx).await?;
    join_all_tasks(creators).await.context("creating subscriptions")?;

    let mut progress = Progress::default();
    poll_until(handler.as_ref(), settings, 0, &mut progress).await?;
    join_all_tasks(removers).await.context("removing subscriptions")?;

    finish(handler.as_ref(), Scenario::CreateAndDelete, created, progress).await
}

// ─────────────────────────────────────────────────────────────────
// Building blocks
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Progress {
    peak_total: usize,
    polls: u64,
}

fn topic_name(index: usize) -> Topic {
    Topic::new(format!("topic {}", index))
}

/// One (topic, person) pair per user, spread round-robin over the topics and shuffled
fn planned_subscriptions(users: usize, topics: usize) -> Vec<(Topic, PersonName)> {
    let mut planned: Vec<_> = (0..users)
        .map(|i| (topic_name(i % topics), PersonName::new(format!("Name {}", i))))
        .collect();
    planned.shuffle(&mut rand::thread_rng());
    planned
}

fn jitter(max_jitter_ms: u64) -> Duration {
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_jitter_ms))
}

fn spawn_creators(
    handler: &Arc<dyn SubscriptionHandler>,
    settings: &DemoSettings,
    created_tx: mpsc::Sender<(Topic, SubscriptionId)>,
) -> Vec<JoinHandle<anyhow::Result<()>>> {
    planned_subscriptions(settings.users, settings.topics)
        .into_iter()
        .map(|(topic, name)| {
            let handler = Arc::clone(handler);
            let created_tx = created_tx.clone();
            let delay = jitter(settings.max_jitter_ms);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let id = handler.add_subscription(topic.clone(), name).await?;
                created_tx
                    .send((topic, id))
                    .await
                    .context("created subscription could not be reported")?;
                Ok::<_, anyhow::Error>(())
            })
        })
        .collect()
}

/// Receive every created id and spawn its removal
async fn spawn_removers(
    handler: &Arc<dyn SubscriptionHandler>,
    settings: &DemoSettings,
    mut created_rx: mpsc::Receiver<(Topic, SubscriptionId)>,
) -> anyhow::Result<(usize, Vec<JoinHandle<anyhow::Result<()>>>)> {
    let mut seen = HashSet::with_capacity(settings.users);
    let mut removers = Vec::with_capacity(settings.users);

    while seen.len() < settings.users {
        let Some((topic, id)) = created_rx.recv().await else {
            bail!("only {} of {} subscriptions were created", seen.len(), settings.users);
        };
        if !seen.insert(id) {
            bail!("subscription id {} was handed out twice", id);
        }

        let handler = Arc::clone(handler);
        let delay = jitter(settings.max_jitter_ms);
        let mode = settings.remove_mode;
        removers.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match mode {
                RemoveMode::Sync => handler.remove_subscription_sync(&topic, id).await?,
                RemoveMode::Async => handler.remove_subscription_async(&topic, id),
            }
            Ok::<_, anyhow::Error>(())
        }));
    }

    Ok((seen.len(), removers))
}

async fn join_all_tasks(tasks: Vec<JoinHandle<anyhow::Result<()>>>) -> anyhow::Result<()> {
    for outcome in try_join_all(tasks).await? {
        outcome?;
    }
    Ok(())
}

/// Count every topic until the total equals `expected`
async fn poll_until(
    handler: &dyn SubscriptionHandler,
    settings: &DemoSettings,
    expected: usize,
    progress: &mut Progress,
) -> anyhow::Result<()> {
    loop {
        let mut total = 0;
        for index in 0..settings.topics {
            total += handler.count_by_topic(&topic_name(index)).await?;
        }
        progress.polls += 1;
        progress.peak_total = progress.peak_total.max(total);
        debug!(total, expected, "Total subscriptions count");

        if total > settings.users {
            bail!("counted {} subscriptions but only {} users exist", total, settings.users);
        }
        if total == expected {
            info!(total, expected, polls = progress.polls, "Subscription count reached");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

async fn finish(
    handler: &dyn SubscriptionHandler,
    scenario: Scenario,
    created: usize,
    progress: Progress,
) -> anyhow::Result<DemoReport> {
    let final_counts = handler.topic_counts().await?;
    for (topic, count) in &final_counts {
        info!(%topic, count, "Remaining subscriptions");
    }
    Ok(DemoReport {
        scenario,
        created,
        peak_total: progress.peak_total,
        polls: progress.polls,
        final_counts,
        elapsed_ms: 0,
    })
}
