//! Publication fan-out: one independent publish per (architecture, region).
//!
//! Every unit runs on its own tokio task. The blocking provider calls run on
//! the blocking pool under a per-call timeout, and a semaphore caps how many
//! are in flight. Results are reduced into a [`PublishReport`] only after
//! every task has been joined; a failed unit never stops its siblings.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use cairn_core::{PublishConfig, ReleaseManifest};

use crate::client::{RegionClient, RegionClientFactory};
use crate::error::PublishError;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_PARALLEL: usize = 8;

/// Explicit inputs of one fan-out run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutConfig {
    /// Media key in the manifest, e.g. `aws`.
    pub provider: String,
    pub call_timeout: Duration,
    pub max_parallel: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            provider: "aws".to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

impl FanoutConfig {
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            call_timeout: Duration::from_secs(config.timeout_secs),
            max_parallel: config.max_parallel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PublishUnit {
    pub architecture: String,
    pub region: String,
    pub image: String,
}

/// Units of `manifest` for `provider`, ordered by (architecture, region).
/// Architectures without images for the provider contribute nothing.
pub fn plan_units(manifest: &ReleaseManifest, provider: &str) -> Vec<PublishUnit> {
    let mut units = Vec::new();
    for (architecture, build) in &manifest.architectures {
        let Some(images) = build.images_for(provider) else {
            tracing::debug!(%architecture, provider, "no images for provider; skipping");
            continue;
        };
        for (region, entry) in images {
            units.push(PublishUnit {
                architecture: architecture.clone(),
                region: region.clone(),
                image: entry.image.clone(),
            });
        }
    }
    units
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// The region client could not be constructed.
    Client,
    Publish,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UnitStatus {
    Succeeded,
    Failed { stage: FailureStage, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    #[serde(flatten)]
    pub unit: PublishUnit,
    #[serde(flatten)]
    pub status: UnitStatus,
    pub elapsed: Duration,
}

impl UnitReport {
    pub fn succeeded(&self) -> bool {
        self.status == UnitStatus::Succeeded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishOutcome {
    /// Nothing to publish for the provider.
    Skip,
    Success,
    /// Some but not all units succeeded.
    Incomplete,
    /// Units were attempted and none succeeded.
    Fatal,
}

/// Overall result from the attempted/succeeded/failed counters.
pub fn classify(attempted: usize, succeeded: usize, any_failed: bool) -> PublishOutcome {
    match (attempted, succeeded, any_failed) {
        (0, _, _) => PublishOutcome::Skip,
        (_, 0, _) => PublishOutcome::Fatal,
        (_, _, true) => PublishOutcome::Incomplete,
        (_, _, false) => PublishOutcome::Success,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub outcome: PublishOutcome,
    pub units: Vec<UnitReport>,
}

impl PublishReport {
    fn from_units(mut units: Vec<UnitReport>) -> Self {
        units.sort_by(|a, b| a.unit.cmp(&b.unit));
        let succeeded = units.iter().filter(|u| u.succeeded()).count();
        let outcome = classify(units.len(), succeeded, succeeded < units.len());
        Self { outcome, units }
    }

    pub fn attempted(&self) -> usize {
        self.units.len()
    }

    pub fn succeeded(&self) -> usize {
        self.units.iter().filter(|u| u.succeeded()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| !u.succeeded())
    }

    /// `Err(Systemic)` when every attempted unit failed.
    pub fn systemic_error(&self) -> Option<PublishError> {
        (self.outcome == PublishOutcome::Fatal).then(|| PublishError::Systemic {
            attempted: self.attempted(),
        })
    }
}

/// Publish every unit of `manifest` and aggregate the results.
pub async fn publish<F>(
    manifest: &ReleaseManifest,
    factory: Arc<F>,
    config: &FanoutConfig,
) -> PublishReport
where
    F: RegionClientFactory,
{
    let units = plan_units(manifest, &config.provider);
    if units.is_empty() {
        tracing::info!(provider = %config.provider, "no images to publish");
        return PublishReport::from_units(Vec::new());
    }
    tracing::info!(
        provider = %config.provider,
        units = units.len(),
        max_parallel = config.max_parallel,
        "publishing images"
    );

    let permits = Arc::new(Semaphore::new(config.max_parallel.max(1)));
    let mut tasks = JoinSet::new();
    for (slot, unit) in units.iter().cloned().enumerate() {
        let factory = factory.clone();
        let permits = permits.clone();
        let call_timeout = config.call_timeout;
        tasks.spawn(async move {
            let report = run_unit(unit, factory, permits, call_timeout).await;
            (slot, report)
        });
    }

    let mut slots: Vec<Option<UnitReport>> = vec![None; units.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, report)) => slots[slot] = Some(report),
            Err(err) => tracing::error!(error = %err, "publish task join failure"),
        }
    }

    let reports = slots
        .into_iter()
        .zip(units)
        .map(|(report, unit)| {
            report.unwrap_or_else(|| UnitReport {
                unit,
                status: UnitStatus::Failed {
                    stage: FailureStage::Publish,
                    error: "publish task did not complete".to_string(),
                },
                elapsed: Duration::ZERO,
            })
        })
        .collect();
    let report = PublishReport::from_units(reports);
    tracing::info!(
        outcome = ?report.outcome,
        attempted = report.attempted(),
        succeeded = report.succeeded(),
        "publish finished"
    );
    report
}

async fn run_unit<F>(
    unit: PublishUnit,
    factory: Arc<F>,
    permits: Arc<Semaphore>,
    call_timeout: Duration,
) -> UnitReport
where
    F: RegionClientFactory,
{
    let permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(err) => {
            return failed(unit, FailureStage::Publish, err.to_string(), Duration::ZERO);
        }
    };
    let started = Instant::now();

    let region = unit.region.clone();
    let image = unit.image.clone();
    // The permit lives in the blocking call so a timed-out call keeps its
    // slot until it actually returns.
    let call = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let client = factory
            .new_region_client(&region)
            .map_err(|err| (FailureStage::Client, err))?;
        client
            .publish(&image)
            .map_err(|err| (FailureStage::Publish, err))
    });

    let status = match tokio::time::timeout(call_timeout, call).await {
        Ok(Ok(Ok(()))) => UnitStatus::Succeeded,
        Ok(Ok(Err((stage, err)))) => UnitStatus::Failed {
            stage,
            error: err.to_string(),
        },
        Ok(Err(join_err)) => UnitStatus::Failed {
            stage: FailureStage::Publish,
            error: PublishError::Runtime(join_err.to_string()).to_string(),
        },
        Err(_) => UnitStatus::Failed {
            stage: FailureStage::Timeout,
            error: PublishError::Timeout {
                after: call_timeout,
            }
            .to_string(),
        },
    };
    let elapsed = started.elapsed();

    match &status {
        UnitStatus::Succeeded => tracing::info!(
            architecture = %unit.architecture,
            region = %unit.region,
            image = %unit.image,
            elapsed_ms = elapsed.as_millis() as u64,
            "image published"
        ),
        UnitStatus::Failed { stage, error } => tracing::warn!(
            architecture = %unit.architecture,
            region = %unit.region,
            image = %unit.image,
            stage = ?stage,
            error = %error,
            "image publish failed"
        ),
    }
    UnitReport {
        unit,
        status,
        elapsed,
    }
}

fn failed(unit: PublishUnit, stage: FailureStage, error: String, elapsed: Duration) -> UnitReport {
    UnitReport {
        unit,
        status: UnitStatus::Failed { stage, error },
        elapsed,
    }
}

/// Run [`publish`] on a fresh multi-threaded runtime and block until done.
///
/// Blocking calls still running past their timeout are abandoned at
/// shutdown rather than waited for.
pub fn publish_blocking<F>(
    manifest: &ReleaseManifest,
    factory: Arc<F>,
    config: &FanoutConfig,
) -> Result<PublishReport, PublishError>
where
    F: RegionClientFactory,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| PublishError::Runtime(format!("failed to start tokio runtime: {err}")))?;
    let report = runtime.block_on(publish(manifest, factory, config));
    runtime.shutdown_timeout(Duration::from_millis(100));
    Ok(report)
}
