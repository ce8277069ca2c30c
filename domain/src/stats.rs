//! Pure diff statistics: pixel counting, snapshot comparison, and the
//! per-project counters the diff engine maintains (completion ratchet,
//! largest regress, streaks, recent rate).

use chrono::DateTime;

use crate::record::{DiffStatus, ProjectRecord, StreakKind};

/// Estimated seconds of painting per remaining pixel, used for the ETA line.
const SECONDS_PER_PIXEL: i64 = 27;

/// The rate window resets after this many seconds without restarting.
const RATE_WINDOW_SECONDS: i64 = 86_400;

/// Everything one diff produced; the fields map directly onto a
/// `HistoryChange` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOutcome {
    pub status: DiffStatus,
    pub num_remaining: i64,
    pub num_target: i64,
    pub completion_percent: f64,
    pub progress_pixels: i64,
    pub regress_pixels: i64,
}

fn count_nonzero(data: &[u8]) -> i64 {
    data.iter().filter(|&&value| value != 0).count() as i64
}

/// Non-transparent pixels in the target; never less than 1 so completion
/// percentages stay well-defined.
#[must_use]
pub fn count_target_pixels(target: &[u8]) -> i64 {
    count_nonzero(target).max(1)
}

#[must_use]
pub fn completion_percent(num_remaining: i64, num_target: i64) -> f64 {
    100.0 - (num_remaining as f64 * 100.0 / num_target as f64)
}

/// Compares current and previous canvas state over the target, returning
/// `(progress_pixels, regress_pixels)`. Transparent target pixels are not
/// part of the project and are skipped.
#[must_use]
pub fn compare_snapshots(current: &[u8], previous: &[u8], target: &[u8]) -> (i64, i64) {
    let mut progress = 0;
    let mut regress = 0;
    for ((&curr, &prev), &want) in current.iter().zip(previous).zip(target) {
        if want == 0 {
            continue;
        }
        if prev != want && curr == want {
            progress += 1;
        } else if prev == want && curr != want {
            regress += 1;
        }
    }
    (progress, regress)
}

impl ProjectRecord {
    /// Advances the completion ratchet: only a strictly better (lower)
    /// remaining count is recorded.
    pub fn update_completion(&mut self, num_remaining: i64, percent: f64, now: i64) {
        if self.max_completion_pixels == 0 || num_remaining < self.max_completion_pixels {
            self.max_completion_pixels = num_remaining;
            self.max_completion_percent = percent;
            self.max_completion_time = now;
        }
    }

    /// Records the worst griefing incident seen so far.
    pub fn update_regress(&mut self, regress_pixels: i64, now: i64) {
        if regress_pixels > self.largest_regress_pixels {
            self.largest_regress_pixels = regress_pixels;
            self.largest_regress_time = now;
        }
    }

    /// Change streaks (progress/regress/mixed) survive nochange events;
    /// nochange streaks reset on any change.
    pub fn update_streak(&mut self, progress_pixels: i64, regress_pixels: i64) {
        let event = match (progress_pixels, regress_pixels) {
            (0, 0) => {
                self.nochange_streak_count += 1;
                return;
            }
            (_, 0) => StreakKind::Progress,
            (0, _) => StreakKind::Regress,
            _ => StreakKind::Mixed,
        };

        self.nochange_streak_count = 0;
        if self.change_streak_kind == event {
            self.change_streak_count += 1;
        } else {
            self.change_streak_kind = event;
            self.change_streak_count = 1;
        }
    }

    /// Net pixels per hour since the rate window opened; the window restarts
    /// after 24 hours.
    pub fn update_rate(&mut self, progress_pixels: i64, regress_pixels: i64, now: i64) {
        if self.recent_rate_window_start > 0 {
            let elapsed_hours = (now - self.recent_rate_window_start) as f64 / 3600.0;
            if elapsed_hours > 0.0 {
                let net = progress_pixels - regress_pixels;
                self.recent_rate_pixels_per_hour = net as f64 / elapsed_hours;
            }
        } else {
            self.recent_rate_window_start = now;
        }

        if now - self.recent_rate_window_start > RATE_WINDOW_SECONDS {
            self.recent_rate_window_start = now;
            self.recent_rate_pixels_per_hour = 0.0;
        }
    }
}

/// Runs one diff over raw palette-indexed buffers and updates the record's
/// counters and status message. `current` and `target` must be the same
/// length; `previous` is the last saved snapshot, if any.
pub fn process_diff(
    record: &mut ProjectRecord,
    current: &[u8],
    target: &[u8],
    previous: Option<&[u8]>,
    now: i64,
) -> DiffOutcome {
    record.last_check = now;

    let num_target = count_target_pixels(target);

    let remaining: Vec<u8> = current
        .iter()
        .zip(target)
        .map(|(&curr, &want)| if want == curr { 0 } else { want })
        .collect();

    if previous.is_none() && remaining.as_slice() == target {
        record.last_log_message = format!("{}: Not started", record.name);
        return DiffOutcome {
            status: DiffStatus::NotStarted,
            num_remaining: 0,
            num_target,
            completion_percent: 0.0,
            progress_pixels: 0,
            regress_pixels: 0,
        };
    }

    let num_remaining = count_nonzero(&remaining);
    let percent = completion_percent(num_remaining, num_target);

    let (progress_pixels, regress_pixels) = previous
        .map(|prev| compare_snapshots(current, prev, target))
        .unwrap_or((0, 0));

    record.total_progress += progress_pixels;
    record.total_regress += regress_pixels;

    record.update_completion(num_remaining, percent, now);
    record.update_regress(regress_pixels, now);
    // Streak before the completion check so it reflects the final change.
    record.update_streak(progress_pixels, regress_pixels);

    if remaining.iter().all(|&value| value == 0) {
        record.last_log_message = format!("{}: Complete! {num_target} pixels total.", record.name);
        return DiffOutcome {
            status: DiffStatus::Complete,
            num_remaining: 0,
            num_target,
            completion_percent: percent,
            progress_pixels,
            regress_pixels,
        };
    }

    record.update_rate(progress_pixels, regress_pixels, now);

    record.last_log_message = progress_message(
        record,
        num_remaining,
        percent,
        progress_pixels,
        regress_pixels,
        now,
    );

    DiffOutcome {
        status: DiffStatus::InProgress,
        num_remaining,
        num_target,
        completion_percent: percent,
        progress_pixels,
        regress_pixels,
    }
}

fn progress_message(
    record: &ProjectRecord,
    num_remaining: i64,
    percent: f64,
    progress_pixels: i64,
    regress_pixels: i64,
    now: i64,
) -> String {
    let time_to_go = SECONDS_PER_PIXEL * num_remaining;
    let total_hours = ((time_to_go as f64) / 3600.0).round() as i64;
    let (days, hours) = (total_hours / 24, total_hours % 24);
    let when = DateTime::from_timestamp(now + time_to_go, 0)
        .map(|at| at.format("%b %d %H:%M").to_string())
        .unwrap_or_else(|| "the far future".to_owned());

    let mut parts = vec![
        format!("{}:", record.name),
        format!("{num_remaining}px remaining ({percent:.2}% complete)"),
    ];
    if progress_pixels > 0 || regress_pixels > 0 {
        parts.push(format!("[+{progress_pixels}/-{regress_pixels}]"));
    }
    if record.change_streak_count > 1 {
        parts.push(format!(
            "({} x{})",
            record.change_streak_kind, record.change_streak_count
        ));
    }
    if record.nochange_streak_count > 0 {
        parts.push(format!("(nochange x{})", record.nochange_streak_count));
    }
    parts.push(format!("ETA: {days}d{hours}h to {when}"));
    parts.join(" ")
}
