use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::calculators::GenerationParams;
use crate::config::{FeeConfig, ScheduleSlot, SchedulerConfig};
use crate::errors::Result;
use crate::events::{BillingEvent, EventStore};
use crate::generator::{GenerationReport, MonthlyFeeGenerator};
use crate::store::FeeConfigStore;
use crate::types::{BillingPeriod, FeeConfigId, FeeType};

/// time-triggered jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduledJob {
    /// monthly parking fees for every apartment
    VehicleParking,
    /// every tick, configs whose own schedule matches
    ConfigScan,
    /// monthly, effective configs without autogeneration
    ManualConfigs,
    /// daily advisory check
    HealthCheck,
}

impl ScheduledJob {
    pub const ALL: [ScheduledJob; 4] = [
        ScheduledJob::VehicleParking,
        ScheduledJob::ConfigScan,
        ScheduledJob::ManualConfigs,
        ScheduledJob::HealthCheck,
    ];
}

impl fmt::Display for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduledJob::VehicleParking => f.write_str("vehicle-parking"),
            ScheduledJob::ConfigScan => f.write_str("config-scan"),
            ScheduledJob::ManualConfigs => f.write_str("manual-configs"),
            ScheduledJob::HealthCheck => f.write_str("health-check"),
        }
    }
}

/// daily health check findings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub period: BillingPeriod,
    pub recurring_fees: usize,
    pub active_configs: usize,
    pub auto_configs: usize,
    /// no recurring fee exists past the first of the month
    pub gap_detected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Generated {
        created: usize,
        skipped: usize,
        failed: usize,
    },
    Health(HealthReport),
    Failed(String),
}

/// one job execution within a tick
#[derive(Debug, Clone, PartialEq)]
pub struct JobRun {
    pub job: ScheduledJob,
    pub config_id: Option<FeeConfigId>,
    pub label: Option<String>,
    pub outcome: JobOutcome,
}

impl JobRun {
    fn generated(job: ScheduledJob, config: Option<&FeeConfig>, report: &GenerationReport) -> Self {
        Self {
            job,
            config_id: config.map(|c| c.id),
            label: config.map(|c| c.fee_name.clone()),
            outcome: JobOutcome::Generated {
                created: report.created_count(),
                skipped: report.skipped_count(),
                failed: report.failed_count(),
            },
        }
    }

    fn failed(job: ScheduledJob, config: Option<&FeeConfig>, error: String) -> Self {
        Self {
            job,
            config_id: config.map(|c| c.id),
            label: config.map(|c| c.fee_name.clone()),
            outcome: JobOutcome::Failed(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, JobOutcome::Failed(_))
    }
}

/// every job run in one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    pub runs: Vec<JobRun>,
}

impl TickReport {
    pub fn fired(&self, job: ScheduledJob) -> bool {
        self.runs.iter().any(|r| r.job == job)
    }

    pub fn runs_of(&self, job: ScheduledJob) -> impl Iterator<Item = &JobRun> {
        self.runs.iter().filter(move |r| r.job == job)
    }

    pub fn failures(&self) -> usize {
        self.runs.iter().filter(|r| r.is_failure()).count()
    }
}

/// drives the generator from the clock
///
/// Holds no billing logic: it works out which jobs are due at the current
/// tick, assembles generation parameters and delegates. Every job and every
/// config is isolated, so one failure is recorded and the rest still run.
/// A tick slot fires each job at most once.
pub struct FeeScheduler {
    config: SchedulerConfig,
    generator: MonthlyFeeGenerator,
    configs: Arc<dyn FeeConfigStore>,
    last_fired: HashMap<ScheduledJob, DateTime<Utc>>,
    pub events: EventStore,
}

impl FeeScheduler {
    pub fn new(
        config: SchedulerConfig,
        generator: MonthlyFeeGenerator,
        configs: Arc<dyn FeeConfigStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            configs,
            last_fired: HashMap::new(),
            events: EventStore::new(),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn generator(&self) -> &MonthlyFeeGenerator {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut MonthlyFeeGenerator {
        &mut self.generator
    }

    /// seed default configs into an empty store, returns how many were added
    pub fn initialize_default_configs(&self) -> Result<usize> {
        if !self.configs.all_configs()?.is_empty() {
            return Ok(0);
        }

        let defaults = FeeConfig::default_configs();
        for config in &defaults {
            config.validate(self.config.tick_minutes)?;
            self.configs.save_config(config.clone())?;
        }
        tracing::info!(count = defaults.len(), "Scheduler: seeded default fee configs");
        Ok(defaults.len())
    }

    pub fn tick(&mut self, time_provider: &SafeTimeProvider) -> TickReport {
        self.tick_at(time_provider.now())
    }

    /// run every job due in the tick containing `now`
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> TickReport {
        let at = self.config.round_to_tick(now);
        let (day, hour, minute) = self.config.tick_slot(now);
        let today = at.date_naive();
        let mut runs = Vec::new();

        if self.config.vehicle_parking_slot.matches(day, hour, minute)
            && self.claim(ScheduledJob::VehicleParking, at)
        {
            runs.push(self.run_vehicle_parking(today, now));
        }

        if self.claim(ScheduledJob::ConfigScan, at) {
            runs.extend(self.run_config_scan(day, hour, minute, today, now));
        }

        if self.config.manual_configs_slot.matches(day, hour, minute)
            && self.claim(ScheduledJob::ManualConfigs, at)
        {
            runs.extend(self.run_manual_configs(today, now));
        }

        let health = self.config.health_check;
        if health.hour == hour && health.minute == minute && self.claim(ScheduledJob::HealthCheck, at) {
            runs.push(self.run_health_check(today, now));
        }

        for run in &runs {
            self.record(run, now);
        }
        TickReport { at, runs }
    }

    /// next instant strictly after `after` at which `job` fires
    pub fn next_fire(&self, job: ScheduledJob, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match job {
            ScheduledJob::ConfigScan => {
                Some(self.config.round_to_tick(after) + Duration::minutes(self.config.tick_minutes as i64))
            }
            ScheduledJob::HealthCheck => {
                let health = self.config.health_check;
                let today = at_time(after.date_naive(), health.hour, health.minute)?;
                if today > after {
                    Some(today)
                } else {
                    at_time(after.date_naive().succ_opt()?, health.hour, health.minute)
                }
            }
            ScheduledJob::VehicleParking => next_monthly(self.config.vehicle_parking_slot, after),
            ScheduledJob::ManualConfigs => next_monthly(self.config.manual_configs_slot, after),
        }
    }

    /// earliest fire time across all jobs
    pub fn next_wakeup(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        ScheduledJob::ALL
            .iter()
            .filter_map(|job| self.next_fire(*job, after))
            .min()
    }

    /// sleep until the next fire time, then tick
    pub async fn wait_and_tick(&mut self, time_provider: &SafeTimeProvider) -> TickReport {
        let now = time_provider.now();
        let next = self
            .next_wakeup(now)
            .unwrap_or_else(|| now + Duration::minutes(self.config.tick_minutes as i64));
        let wait = (next - now).to_std().unwrap_or_default();
        sleep(wait).await;

        // a test clock does not move while sleeping
        self.tick_at(time_provider.now().max(next))
    }

    /// take the scheduler's and the generator's pending events, generator first
    pub fn drain_events(&mut self) -> Vec<BillingEvent> {
        let mut events = self.generator.events.take_events();
        events.extend(self.events.take_events());
        events
    }

    /// run forever; jobs are retried at their next natural tick
    pub async fn run(mut self, time_provider: SafeTimeProvider) {
        tracing::info!(tick_minutes = self.config.tick_minutes, "Fee scheduler started");

        if self.config.seed_default_configs {
            if let Err(e) = self.initialize_default_configs() {
                tracing::warn!(error = %e, "Scheduler: could not seed default configs");
            }
        }

        loop {
            let report = self.wait_and_tick(&time_provider).await;
            if !report.runs.is_empty() {
                tracing::debug!(
                    at = %report.at,
                    runs = report.runs.len(),
                    failures = report.failures(),
                    "Scheduler: tick completed"
                );
            }
            for event in self.drain_events() {
                tracing::debug!(event = ?event, "Scheduler: event");
            }
        }
    }

    /// true when `job` has not yet fired in slot `at`
    fn claim(&mut self, job: ScheduledJob, at: DateTime<Utc>) -> bool {
        if self.last_fired.get(&job) == Some(&at) {
            return false;
        }
        self.last_fired.insert(job, at);
        true
    }

    fn run_vehicle_parking(&mut self, today: NaiveDate, now: DateTime<Utc>) -> JobRun {
        let result = BillingPeriod::containing(today).and_then(|period| {
            tracing::info!(period = %period, "Scheduler: generating vehicle parking fees");
            self.generate(FeeType::VehicleParking, &GenerationParams::new(period), now)
        });
        match result {
            Ok(report) => JobRun::generated(ScheduledJob::VehicleParking, None, &report),
            Err(e) => JobRun::failed(ScheduledJob::VehicleParking, None, e.to_string()),
        }
    }

    fn run_config_scan(
        &mut self,
        day: u32,
        hour: u32,
        minute: u32,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Vec<JobRun> {
        let configs = match self.configs.all_configs() {
            Ok(configs) => configs,
            Err(e) => return vec![JobRun::failed(ScheduledJob::ConfigScan, None, e.to_string())],
        };

        let due: Vec<FeeConfig> = configs
            .into_iter()
            .filter(|c| c.is_due_at(day, hour, minute) && c.is_effective(today))
            .collect();
        if !due.is_empty() {
            tracing::info!(count = due.len(), day, hour, minute, "Scheduler: configs due");
        }

        due.iter()
            .map(|config| self.run_config(ScheduledJob::ConfigScan, config, today, now))
            .collect()
    }

    fn run_manual_configs(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Vec<JobRun> {
        let configs = match self.configs.all_configs() {
            Ok(configs) => configs,
            Err(e) => return vec![JobRun::failed(ScheduledJob::ManualConfigs, None, e.to_string())],
        };

        let manual: Vec<FeeConfig> = configs
            .into_iter()
            .filter(|c| c.is_effective(today) && !c.auto_generate)
            .collect();
        tracing::info!(count = manual.len(), "Scheduler: generating non-auto configs");

        manual
            .iter()
            .map(|config| self.run_config(ScheduledJob::ManualConfigs, config, today, now))
            .collect()
    }

    fn run_config(
        &mut self,
        job: ScheduledJob,
        config: &FeeConfig,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> JobRun {
        let period = match BillingPeriod::containing(today) {
            Ok(period) => period,
            Err(e) => return JobRun::failed(job, Some(config), e.to_string()),
        };
        let params = GenerationParams::from_config(config, period);
        tracing::info!(
            config = %config.fee_name,
            period = %params.period,
            unit_price = %config.unit_price,
            "Scheduler: generating from config"
        );

        match self.generate(config.fee_type, &params, now) {
            Ok(report) => JobRun::generated(job, Some(config), &report),
            Err(e) => {
                tracing::error!(config = %config.fee_name, error = %e, "Scheduler: config generation failed");
                JobRun::failed(job, Some(config), e.to_string())
            }
        }
    }

    fn run_health_check(&mut self, today: NaiveDate, now: DateTime<Utc>) -> JobRun {
        match self.health_report(today) {
            Ok(report) => {
                if report.gap_detected {
                    tracing::warn!(
                        period = %report.period,
                        "Scheduler: no recurring fees for current period, manual intervention may be required"
                    );
                    self.events.emit(BillingEvent::BillingGapDetected {
                        period: report.period,
                        timestamp: now,
                    });
                } else {
                    tracing::info!(
                        period = %report.period,
                        recurring_fees = report.recurring_fees,
                        "Scheduler: health check passed"
                    );
                }
                tracing::info!(
                    active = report.active_configs,
                    auto = report.auto_configs,
                    "Scheduler: fee configs"
                );
                JobRun {
                    job: ScheduledJob::HealthCheck,
                    config_id: None,
                    label: None,
                    outcome: JobOutcome::Health(report),
                }
            }
            Err(e) => JobRun::failed(ScheduledJob::HealthCheck, None, e.to_string()),
        }
    }

    pub fn health_report(&self, today: NaiveDate) -> Result<HealthReport> {
        let period = BillingPeriod::containing(today)?;
        let recurring_fees = self.generator.fees_for_period(period)?.len();
        let configs = self.configs.all_configs()?;

        Ok(HealthReport {
            period,
            recurring_fees,
            active_configs: configs.iter().filter(|c| c.is_active).count(),
            auto_configs: configs.iter().filter(|c| c.is_active && c.auto_generate).count(),
            gap_detected: recurring_fees == 0 && today.day() > 1,
        })
    }

    fn generate(
        &mut self,
        fee_type: FeeType,
        params: &GenerationParams,
        now: DateTime<Utc>,
    ) -> Result<GenerationReport> {
        self.generator.generate_for_all_at(fee_type, params, now)
    }

    fn record(&mut self, run: &JobRun, now: DateTime<Utc>) {
        let job = match &run.label {
            Some(label) => format!("{} ({label})", run.job),
            None => run.job.to_string(),
        };
        match &run.outcome {
            JobOutcome::Generated {
                created,
                skipped,
                failed,
            } => {
                tracing::info!(job = %job, created, skipped, failed, "Scheduler: job completed");
                self.events.emit(BillingEvent::ScheduledJobCompleted {
                    job,
                    created: *created,
                    skipped: *skipped,
                    failed: *failed,
                    timestamp: now,
                });
            }
            JobOutcome::Health(_) => {}
            JobOutcome::Failed(error) => {
                tracing::error!(job = %job, error = %error, "Scheduler: job failed");
                self.events.emit(BillingEvent::ScheduledJobFailed {
                    job,
                    error: error.clone(),
                    timestamp: now,
                });
            }
        }
    }
}

fn at_time(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    date.and_hms_opt(hour, minute, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// first occurrence of a monthly slot strictly after `after`, skipping months
/// too short for the slot's day
fn next_monthly(slot: ScheduleSlot, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut period = BillingPeriod::containing(after.date_naive()).ok()?;
    for _ in 0..24 {
        if let Some(date) = NaiveDate::from_ymd_opt(period.year(), period.month(), slot.day) {
            if let Some(fire) = at_time(date, slot.hour, slot.minute) {
                if fire > after {
                    return Some(fire);
                }
            }
        }
        period = period.next().ok()?;
    }
    None
}
