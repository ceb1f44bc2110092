//! Background scheduler with standard 5-field cron expressions.
//!
//! Supported per field: wildcard `*`, exact values, and steps `*/N`.
//! Minimum resolution is one minute; the run loop wakes every 30 seconds
//! and fires each due job at most once per wall-clock minute.
//!
//! Register all jobs before calling [`Scheduler::run`]; the job list is
//! single-owner once the loop has started.

use cclaw_core::{CronError, Shutdown};
use chrono::{Datelike, Local, Timelike};
use std::time::Duration;
use tracing::{debug, info};

/// Fixed job capacity.
pub const MAX_JOBS: usize = 64;

const TICK: Duration = Duration::from_secs(1);
const CHECK_INTERVAL_SECS: u64 = 30;

/// One field of a cron expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronField {
    Wildcard,
    Exact(u8),
    Step(u8),
}

impl CronField {
    fn parse(field: &str) -> Result<Self, String> {
        if field == "*" {
            return Ok(CronField::Wildcard);
        }
        if let Some(step) = field.strip_prefix("*/") {
            let step: u8 = step.parse().map_err(|_| format!("bad step '{field}'"))?;
            if step == 0 {
                return Err(format!("zero step '{field}'"));
            }
            return Ok(CronField::Step(step));
        }
        let value: u8 = field.parse().map_err(|_| format!("bad value '{field}'"))?;
        Ok(CronField::Exact(value))
    }

    fn matches(&self, time_value: u8) -> bool {
        match self {
            CronField::Wildcard => true,
            CronField::Exact(v) => *v == time_value,
            CronField::Step(n) => time_value % n == 0,
        }
    }
}

/// A parsed 5-field expression: minute, hour, day-of-month, month,
/// day-of-week (0 = Sunday).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronExpr {
    pub minute: CronField,
    pub hour: CronField,
    pub day_of_month: CronField,
    pub month: CronField,
    pub day_of_week: CronField,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let invalid = |reason: String| CronError::InvalidExpression {
            expr: expr.to_string(),
            reason,
        };

        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(format!("expected 5 fields, got {}", fields.len())));
        }

        Ok(Self {
            minute: CronField::parse(fields[0]).map_err(&invalid)?,
            hour: CronField::parse(fields[1]).map_err(&invalid)?,
            day_of_month: CronField::parse(fields[2]).map_err(&invalid)?,
            month: CronField::parse(fields[3]).map_err(&invalid)?,
            day_of_week: CronField::parse(fields[4]).map_err(&invalid)?,
        })
    }

    /// Test against a wall-clock instant.
    pub fn matches(&self, time: &impl Timeish) -> bool {
        self.minute.matches(time.minute())
            && self.hour.matches(time.hour())
            && self.day_of_month.matches(time.day_of_month())
            && self.month.matches(time.month())
            && self.day_of_week.matches(time.day_of_week())
    }
}

/// The time fields a cron match needs, so matching is testable without a
/// real clock.
pub trait Timeish {
    fn minute(&self) -> u8;
    fn hour(&self) -> u8;
    fn day_of_month(&self) -> u8;
    fn month(&self) -> u8;
    /// 0 = Sunday.
    fn day_of_week(&self) -> u8;
}

impl Timeish for chrono::DateTime<Local> {
    fn minute(&self) -> u8 {
        Timelike::minute(self) as u8
    }
    fn hour(&self) -> u8 {
        Timelike::hour(self) as u8
    }
    fn day_of_month(&self) -> u8 {
        self.day() as u8
    }
    fn month(&self) -> u8 {
        Datelike::month(self) as u8
    }
    fn day_of_week(&self) -> u8 {
        self.weekday().num_days_from_sunday() as u8
    }
}

type JobFn = Box<dyn Fn() + Send + Sync>;

struct Job {
    name: String,
    expr: CronExpr,
    callback: JobFn,
    last_fire: i64,
    active: bool,
}

/// Owns a fixed-capacity job table and the run loop.
#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<Job>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Names are assumed unique within a scheduler.
    pub fn add(
        &mut self,
        name: &str,
        expr: &str,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<(), CronError> {
        if self.jobs.len() >= MAX_JOBS {
            return Err(CronError::Full(MAX_JOBS));
        }

        let expr = CronExpr::parse(expr)?;
        info!(name, "cron job added");
        self.jobs.push(Job {
            name: name.to_string(),
            expr,
            callback: Box::new(callback),
            last_fire: 0,
            active: true,
        });
        Ok(())
    }

    /// Deactivate a job by name.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.jobs.iter_mut().find(|j| j.name == name) {
            Some(job) => {
                job.active = false;
                info!(name, "cron job removed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Fire every due job for the given instant. A job fires at most once
    /// per wall-clock minute, anchored at `now - now % 60`.
    fn fire_due(&mut self, now_unix: i64, time: &impl Timeish) {
        let minute_start = now_unix - now_unix.rem_euclid(60);
        for job in &mut self.jobs {
            if !job.active || job.last_fire >= minute_start {
                continue;
            }
            if job.expr.matches(time) {
                debug!(name = %job.name, "cron job firing");
                job.last_fire = now_unix;
                (job.callback)();
            }
        }
    }

    /// The scheduler loop. Wakes every 30 seconds; the sleep is broken into
    /// 1-second slices so shutdown latency stays around a second.
    pub async fn run(mut self, shutdown: Shutdown) {
        info!(jobs = self.jobs.len(), "cron scheduler started");

        while !shutdown.is_shutdown() {
            let now = Local::now();
            self.fire_due(now.timestamp(), &now);

            for _ in 0..CHECK_INTERVAL_SECS {
                if shutdown.is_shutdown() {
                    break;
                }
                tokio::time::sleep(TICK).await;
            }
        }

        info!("cron scheduler stopped");
    }
}
