//! Daily publish slots.
//!
//! Every configured wall-clock time gets its own task. A task sleeps until its
//! next occurrence in the configured timezone, runs one publish cycle, then
//! schedules the following day. A slot whose time passes while the process is
//! down is not caught up; the next fire is always strictly in the future.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::publisher::Publisher;

/// Longest single sleep. Waits are split so wall-clock jumps are noticed.
const MAX_SLEEP: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(NaiveTime);

impl Slot {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Slot)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl From<NaiveTime> for Slot {
    fn from(time: NaiveTime) -> Self {
        Slot(time)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| "expected HH:MM".to_string())?;
        let hour: u32 = hour.parse().map_err(|_| "hour is not a number".to_string())?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| "minute is not a number".to_string())?;
        Slot::new(hour, minute).ok_or_else(|| "time out of range".to_string())
    }
}

/// The first instant strictly after `after` at which `slot` occurs in `tz`.
///
/// Ambiguous local times (clocks going back) resolve to the earlier instant.
/// Local times skipped by a forward transition fire one hour later on the
/// wall clock, which is the first instant after the gap.
pub fn next_fire(slot: Slot, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut date = after.with_timezone(&tz).date_naive();

    for _ in 0..3 {
        if let Some(fire_at) = resolve_local(tz, date.and_time(slot.time())) {
            if fire_at > after {
                return Some(fire_at);
            }
        }
        date = date.succ_opt()?;
    }

    None
}

/// Next fire after a cycle that served `served` and finished at `now`.
///
/// A cycle whose backoff outlasts the slot's following occurrence skips it
/// rather than firing again straight away.
fn next_after_cycle(
    slot: Slot,
    tz: Tz,
    served: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    next_fire(slot, tz, served.max(now))
}

fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(local + chrono::Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
}

/// Sleep until `deadline`. Returns false if shutdown was signalled first.
pub async fn wait_until(deadline: DateTime<Utc>, shutdown: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *shutdown.borrow() {
            return false;
        }

        let remaining = match (deadline - Utc::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => return true,
        };

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
            _ = tokio::time::sleep(remaining.min(MAX_SLEEP)) => {}
        }
    }
}

pub struct Scheduler {
    slots: Vec<Slot>,
    timezone: Tz,
    publisher: Arc<Publisher>,
}

impl Scheduler {
    pub fn new(slots: Vec<Slot>, timezone: Tz, publisher: Arc<Publisher>) -> Self {
        Self {
            slots,
            timezone,
            publisher,
        }
    }

    /// Start one task per slot. Tasks exit once `shutdown` flips to true;
    /// a publish cycle already in progress is finished first.
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        tracing::info!(
            "Scheduling {} daily slot(s) in {}: {}",
            self.slots.len(),
            self.timezone,
            self.slots
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.slots
            .iter()
            .map(|&slot| {
                tokio::spawn(run_slot(
                    slot,
                    self.timezone,
                    self.publisher.clone(),
                    shutdown.clone(),
                ))
            })
            .collect()
    }
}

/// Next fire time of every slot, in slot order.
pub fn upcoming(
    slots: &[Slot],
    timezone: Tz,
    now: DateTime<Utc>,
) -> Vec<(Slot, Option<DateTime<Tz>>)> {
    slots
        .iter()
        .map(|&slot| {
            (
                slot,
                next_fire(slot, timezone, now).map(|at| at.with_timezone(&timezone)),
            )
        })
        .collect()
}

async fn run_slot(
    slot: Slot,
    tz: Tz,
    publisher: Arc<Publisher>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut next = next_fire(slot, tz, Utc::now());

    loop {
        let Some(fire_at) = next else {
            tracing::error!("Slot {slot}: could not compute next fire time, stopping");
            break;
        };

        tracing::debug!("Slot {slot}: next publish at {}", fire_at.with_timezone(&tz));

        if !wait_until(fire_at, &mut shutdown).await {
            break;
        }

        tracing::info!("Slot {slot} fired");
        match publisher.publish_next(&mut shutdown).await {
            Ok(outcome) => tracing::debug!("Slot {slot}: {outcome:?}"),
            Err(e) => tracing::error!("Slot {slot}: queue error: {e}"),
        }

        // Strictly after the instant just served, so it can never fire twice.
        next = next_after_cycle(slot, tz, fire_at, Utc::now());
    }

    tracing::debug!("Slot {slot} stopped");
}
