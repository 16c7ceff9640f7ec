//! Scheduled and manual deliveries for the long-running `run` command.
//!
//! Each job is a [`cron::Schedule`] evaluated in the configured IANA
//! timezone. A plain `at: "HH:MM"` job becomes `0 M H * * *`. Daylight-saving
//! transitions are left to the cron crate.
//!
//! Manual triggers arrive over a channel (fed by Unix signals in `main`) and
//! run beside the schedule on the same dispatcher, so both share one
//! [`crate::cache::DailyCache`].

use crate::config::{JobConfig, ScheduleConfig};
use crate::dispatcher::Dispatcher;
use crate::error::ConfigError;
use crate::sinks::ChatSink;
use crate::source::PoemSource;
use chrono::{DateTime, Local, NaiveTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use std::future::{Future, pending};
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

/// Runs missed by more than this (a suspended host, say) are skipped rather
/// than replayed.
const MISFIRE_GRACE: TimeDelta = TimeDelta::hours(1);

#[derive(Debug, Clone)]
pub struct ScheduledJob {
    /// The configured `at` or `cron` text, for logs.
    label: String,
    cron: cron::Schedule,
    pub destination: Option<String>,
}

impl ScheduledJob {
    fn from_config(job: &JobConfig) -> Result<Self, ConfigError> {
        let (label, cron) = match (&job.cron, &job.at) {
            (Some(expr), _) => (expr.clone(), parse_cron(expr)?),
            (None, Some(at)) => {
                let time = NaiveTime::parse_from_str(at, "%H:%M")
                    .map_err(|_| ConfigError::JobTime(at.clone()))?;
                let expr = format!("0 {} {} * * *", time.minute(), time.hour());
                (at.clone(), parse_cron(&expr)?)
            }
            (None, None) => return Err(ConfigError::JobWithoutTime),
        };
        Ok(Self {
            label,
            cron,
            destination: job.destination.clone(),
        })
    }

    /// First run strictly after `after`, evaluated in `tz`.
    fn next_after(&self, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron
            .after(&after.with_timezone(&tz))
            .next()
            .map(|when| when.with_timezone(&Utc))
    }
}

/// Parse a cron expression, accepting the common five-field form.
fn parse_cron(expr: &str) -> Result<cron::Schedule, ConfigError> {
    cron::Schedule::from_str(expr)
        .or_else(|_| cron::Schedule::from_str(&format!("0 {expr} *")))
        .map_err(|e| ConfigError::Cron {
            expr: expr.to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, Clone)]
pub struct Schedule {
    tz: Tz,
    jobs: Vec<ScheduledJob>,
}

impl Schedule {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|_| ConfigError::Timezone(config.timezone.clone()))?;
        let jobs = config
            .jobs
            .iter()
            .map(ScheduledJob::from_config)
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { tz, jobs })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// The earliest run strictly after `after`, with every job due at that instant.
    pub fn next_due(&self, after: DateTime<Utc>) -> Option<(DateTime<Utc>, Vec<&ScheduledJob>)> {
        let runs: Vec<(DateTime<Utc>, &ScheduledJob)> = self
            .jobs
            .iter()
            .filter_map(|job| job.next_after(self.tz, after).map(|when| (when, job)))
            .collect();
        let earliest = runs.iter().map(|(when, _)| *when).min()?;
        let due = runs
            .into_iter()
            .filter(|(when, _)| *when == earliest)
            .map(|(_, job)| job)
            .collect();
        Some((earliest, due))
    }
}

/// Where to look for the next run after a batch that fired at `last_fire`.
///
/// Searching from the previous fire instant rather than from `now` keeps a
/// job whose minute passed during a slow delivery; it fires late instead of
/// tomorrow.
pub fn resume_point(last_fire: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    last_fire.max(now - MISFIRE_GRACE)
}

/// A delivery requested outside the schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub destination: Option<String>,
    /// Drop today's cached entry (including a stored failure) first.
    pub fresh: bool,
}

/// Manual triggers from Unix signals: `SIGUSR1` delivers today's poem to the
/// default destination, `SIGUSR2` refetches it first.
#[cfg(unix)]
pub fn signal_triggers() -> std::io::Result<mpsc::Receiver<Trigger>> {
    use tokio::signal::unix::{SignalKind, signal};

    let (tx, rx) = mpsc::channel(4);
    let mut deliver = signal(SignalKind::user_defined1())?;
    let mut refetch = signal(SignalKind::user_defined2())?;
    tokio::spawn(async move {
        loop {
            let trigger = tokio::select! {
                Some(()) = deliver.recv() => Trigger { destination: None, fresh: false },
                Some(()) = refetch.recv() => Trigger { destination: None, fresh: true },
                else => break,
            };
            info!(?trigger, "Manual trigger received");
            if tx.send(trigger).await.is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

#[cfg(not(unix))]
pub fn signal_triggers() -> std::io::Result<mpsc::Receiver<Trigger>> {
    let (_tx, rx) = mpsc::channel(1);
    Ok(rx)
}

/// Run scheduled and manual deliveries until Ctrl-C.
pub async fn run<S, P>(
    schedule: &Schedule,
    dispatcher: &Dispatcher<S, P>,
    triggers: mpsc::Receiver<Trigger>,
) where
    S: ChatSink,
    P: PoemSource,
{
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    run_until(schedule, dispatcher, Utc::now, triggers, ctrl_c).await;
}

/// Run scheduled and manual deliveries until `shutdown` completes.
///
/// `clock` supplies the current time; deliveries in flight when `shutdown`
/// fires are dropped.
pub async fn run_until<S, P, C, F>(
    schedule: &Schedule,
    dispatcher: &Dispatcher<S, P>,
    clock: C,
    triggers: mpsc::Receiver<Trigger>,
    shutdown: F,
) where
    S: ChatSink,
    P: PoemSource,
    C: Fn() -> DateTime<Utc>,
    F: Future<Output = ()>,
{
    info!(timezone = %schedule.tz, jobs = schedule.jobs.len(), "Scheduler started");

    tokio::select! {
        _ = scheduled_loop(schedule, dispatcher, &clock) => {}
        _ = manual_loop(dispatcher, triggers) => {}
        _ = shutdown => info!("Shutdown requested; scheduler exiting"),
    }
}

async fn scheduled_loop<S, P, C>(schedule: &Schedule, dispatcher: &Dispatcher<S, P>, clock: &C)
where
    S: ChatSink,
    P: PoemSource,
    C: Fn() -> DateTime<Utc>,
{
    let mut last_fire = clock();

    loop {
        let now = clock();
        let Some((when, due)) = schedule.next_due(resume_point(last_fire, now)) else {
            warn!("No scheduled jobs; serving manual triggers only");
            return pending().await;
        };

        let wait = (when - now).to_std().unwrap_or_default();
        if wait.is_zero() {
            warn!(missed = %when.with_timezone(&schedule.tz), "Previous delivery ran late; firing now");
        } else {
            info!(
                next_run = %when.with_timezone(&schedule.tz),
                wait_secs = wait.as_secs(),
                "Waiting for next job"
            );
            sleep(wait).await;
        }

        for job in due {
            let outcome = dispatcher.deliver(job.destination.as_deref()).await;
            info!(job = %job.label, ?outcome, "Scheduled delivery finished");
        }
        last_fire = when;
    }
}

async fn manual_loop<S, P>(dispatcher: &Dispatcher<S, P>, mut triggers: mpsc::Receiver<Trigger>)
where
    S: ChatSink,
    P: PoemSource,
{
    while let Some(trigger) = triggers.recv().await {
        let today = Local::now().date_naive();
        if trigger.fresh {
            dispatcher.cache().invalidate(today).await;
        }
        let outcome = dispatcher
            .deliver_on(today, trigger.destination.as_deref())
            .await;
        info!(?trigger, ?outcome, "Manual delivery finished");
    }
    pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DailyCache;
    use crate::config::DeliveryConfig;
    use crate::error::{PipelineError, SendError};
    use crate::models::PoemRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn at(time: &str, destination: Option<&str>) -> JobConfig {
        JobConfig {
            at: Some(time.to_string()),
            cron: None,
            destination: destination.map(str::to_string),
        }
    }

    fn schedule(timezone: &str, jobs: Vec<JobConfig>) -> Schedule {
        Schedule::from_config(&ScheduleConfig {
            timezone: timezone.to_string(),
            jobs,
        })
        .unwrap()
    }

    fn next(schedule: &Schedule, after: &str) -> DateTime<Utc> {
        schedule.next_due(utc(after)).unwrap().0
    }

    #[test]
    fn test_later_today() {
        // 05:00 EST
        let s = schedule("America/New_York", vec![at("06:05", None)]);
        assert_eq!(next(&s, "2024-01-15T10:00:00Z"), utc("2024-01-15T11:05:00Z"));
    }

    #[test]
    fn test_already_passed_today() {
        // 07:00 EST
        let s = schedule("America/New_York", vec![at("06:05", None)]);
        assert_eq!(next(&s, "2024-01-15T12:00:00Z"), utc("2024-01-16T11:05:00Z"));
    }

    #[test]
    fn test_exactly_now_moves_to_tomorrow() {
        let s = schedule("America/New_York", vec![at("06:05", None)]);
        assert_eq!(next(&s, "2024-01-15T11:05:00Z"), utc("2024-01-16T11:05:00Z"));
    }

    #[test]
    fn test_summer_offset() {
        // 06:05 EDT is 10:05 UTC
        let s = schedule("America/New_York", vec![at("06:05", None)]);
        assert_eq!(next(&s, "2024-07-01T00:00:00Z"), utc("2024-07-01T10:05:00Z"));
    }

    #[test]
    fn test_five_field_cron_job() {
        let job = JobConfig {
            at: None,
            cron: Some("30 7 * * MON-FRI".to_string()),
            destination: None,
        };
        let s = schedule("UTC", vec![job]);
        // Saturday 2024-01-13; next weekday is Monday the 15th
        assert_eq!(next(&s, "2024-01-13T12:00:00Z"), utc("2024-01-15T07:30:00Z"));
    }

    #[test]
    fn test_cron_takes_precedence_over_at() {
        let job = JobConfig {
            at: Some("06:05".to_string()),
            cron: Some("0 0 9 * * *".to_string()),
            destination: None,
        };
        let s = schedule("UTC", vec![job]);
        assert_eq!(next(&s, "2024-01-15T00:00:00Z"), utc("2024-01-15T09:00:00Z"));
    }

    #[test]
    fn test_default_schedule() {
        let s = Schedule::from_config(&ScheduleConfig::default()).unwrap();
        assert_eq!(s.timezone(), chrono_tz::America::New_York);
        assert_eq!(s.jobs.len(), 1);
        assert_eq!(s.jobs[0].label, "06:05");
    }

    #[test]
    fn test_invalid_timezone() {
        let config = ScheduleConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            jobs: vec![],
        };
        assert!(matches!(
            Schedule::from_config(&config),
            Err(ConfigError::Timezone(_))
        ));
    }

    #[test]
    fn test_invalid_job_time() {
        let config = ScheduleConfig {
            timezone: "UTC".to_string(),
            jobs: vec![at("25:61", None)],
        };
        assert!(matches!(
            Schedule::from_config(&config),
            Err(ConfigError::JobTime(ref t)) if t == "25:61"
        ));
    }

    #[test]
    fn test_invalid_cron_expression() {
        let config = ScheduleConfig {
            timezone: "UTC".to_string(),
            jobs: vec![JobConfig {
                at: None,
                cron: Some("every morning".to_string()),
                destination: None,
            }],
        };
        assert!(matches!(
            Schedule::from_config(&config),
            Err(ConfigError::Cron { .. })
        ));
    }

    #[test]
    fn test_job_without_time() {
        let config = ScheduleConfig {
            timezone: "UTC".to_string(),
            jobs: vec![JobConfig {
                at: None,
                cron: None,
                destination: Some("general".to_string()),
            }],
        };
        assert!(matches!(
            Schedule::from_config(&config),
            Err(ConfigError::JobWithoutTime)
        ));
    }

    #[test]
    fn test_next_due_groups_simultaneous_jobs() {
        let s = schedule(
            "UTC",
            vec![
                at("09:00", Some("late")),
                at("06:05", None),
                at("06:05", Some("general")),
            ],
        );
        let (when, due) = s.next_due(utc("2024-01-15T00:00:00Z")).unwrap();
        assert_eq!(when, utc("2024-01-15T06:05:00Z"));
        assert_eq!(due.len(), 2);
        assert_eq!(due[1].destination.as_deref(), Some("general"));
    }

    #[test]
    fn test_no_jobs_means_nothing_due() {
        let s = schedule("UTC", vec![]);
        assert!(s.next_due(utc("2024-01-15T00:00:00Z")).is_none());
    }

    #[test]
    fn test_slow_delivery_keeps_next_minute_job() {
        let s = schedule("UTC", vec![at("06:05", Some("a")), at("06:06", Some("b"))]);
        // The 06:05 batch finished at 06:07:30
        let resume = resume_point(utc("2024-01-15T06:05:00Z"), utc("2024-01-15T06:07:30Z"));
        let (when, due) = s.next_due(resume).unwrap();
        assert_eq!(when, utc("2024-01-15T06:06:00Z"));
        assert_eq!(due[0].destination.as_deref(), Some("b"));
    }

    #[test]
    fn test_long_outage_skips_stale_runs() {
        let resume = resume_point(utc("2024-01-13T06:05:00Z"), utc("2024-01-15T12:00:00Z"));
        assert_eq!(resume, utc("2024-01-15T11:00:00Z"));
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl ChatSink for RecordingSink {
        async fn send(&self, destination: &str, _text: &str) -> Result<(), SendError> {
            self.sent.lock().unwrap().push(destination.to_string());
            Ok(())
        }
    }

    struct SlowSource {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl PoemSource for SlowSource {
        async fn fetch_poem(&self) -> Result<PoemRecord, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            Ok(PoemRecord {
                title: "Ode".to_string(),
                author: "Jane Doe".to_string(),
                body_lines: vec!["line".to_string()],
                source_url: None,
            })
        }
    }

    fn fixture(delay: Duration) -> (Dispatcher<RecordingSink, SlowSource>, RecordingSink, Arc<AtomicUsize>) {
        let sink = RecordingSink::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let source = SlowSource {
            calls: Arc::clone(&calls),
            delay,
        };
        let dispatcher = Dispatcher::new(
            sink.clone(),
            source,
            Arc::new(DailyCache::new()),
            DeliveryConfig::default(),
        );
        (dispatcher, sink, calls)
    }

    /// Wall clock that follows tokio's paused clock from `base`.
    fn paused_clock(base: DateTime<Utc>) -> impl Fn() -> DateTime<Utc> {
        let start = tokio::time::Instant::now();
        move || base + TimeDelta::from_std(start.elapsed()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fires_job_passed_during_slow_delivery() {
        let s = schedule("UTC", vec![at("06:05", Some("a")), at("06:06", Some("b"))]);
        let (dispatcher, sink, calls) = fixture(Duration::from_secs(90));
        let (_tx, rx) = mpsc::channel(1);

        run_until(
            &s,
            &dispatcher,
            paused_clock(utc("2024-01-15T06:00:00Z")),
            rx,
            sleep(Duration::from_secs(600)),
        )
        .await;

        // intro and one body chunk per delivery
        assert_eq!(*sink.sent.lock().unwrap(), vec!["a", "a", "b", "b"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger_shares_in_flight_fetch() {
        let s = schedule("UTC", vec![at("06:05", None)]);
        let (dispatcher, sink, calls) = fixture(Duration::from_secs(30));
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            // lands while the 06:05 fetch is still running
            sleep(Duration::from_secs(3)).await;
            let trigger = Trigger {
                destination: Some("manual".to_string()),
                fresh: false,
            };
            tx.send(trigger).await.unwrap();
        });

        run_until(
            &s,
            &dispatcher,
            paused_clock(utc("2024-01-15T06:04:59Z")),
            rx,
            sleep(Duration::from_secs(120)),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let mut sent = sink.sent.lock().unwrap().clone();
        sent.sort();
        assert_eq!(sent, vec!["manual", "manual", "poems", "poems"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_trigger_refetches() {
        let s = schedule("UTC", vec![]);
        let (dispatcher, sink, calls) = fixture(Duration::ZERO);
        let (tx, rx) = mpsc::channel(4);

        for fresh in [false, false, true] {
            tx.send(Trigger {
                destination: None,
                fresh,
            })
            .await
            .unwrap();
        }

        run_until(
            &s,
            &dispatcher,
            paused_clock(utc("2024-01-15T06:00:00Z")),
            rx,
            sleep(Duration::from_secs(60)),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sink.sent.lock().unwrap().len(), 6);
    }
}
