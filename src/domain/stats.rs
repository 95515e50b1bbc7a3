//! Read-only summaries derived from a user aggregate.

use chrono::{DateTime, Utc};

use super::journey::{Journey, JourneyStatus, ceil_days};
use super::user::User;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    pub total_journeys: u32,
    pub active_journeys: usize,
    pub paused_journeys: usize,
    pub completed_journeys: usize,
    pub completed_resources: u32,
    pub average_completion_days: i64,
    pub current_streak: u32,
    pub total_ai_conversations: u32,
    pub last_active_date: Option<DateTime<Utc>>,
}

/// Counts journeys by status plus the lifetime counters from the user's stats.
pub fn compute_stats(user: &User) -> StatsSummary {
    let stats = user.stats();
    StatsSummary {
        total_journeys: stats.total_journeys_started,
        active_journeys: user.count_journeys(JourneyStatus::Active),
        paused_journeys: user.count_journeys(JourneyStatus::Paused),
        completed_journeys: user.count_journeys(JourneyStatus::Completed),
        completed_resources: stats.total_resources_completed,
        average_completion_days: average_completion_days(user.journeys()),
        current_streak: stats.current_streak,
        total_ai_conversations: stats.total_ai_conversations,
        last_active_date: stats.last_active_date,
    }
}

/// Mean of `ceil(completed - start)` in days over completed journeys, rounded; 0 when none.
pub fn average_completion_days(journeys: &[Journey]) -> i64 {
    let durations: Vec<i64> = journeys
        .iter()
        .filter_map(|journey| {
            journey
                .completed_date()
                .map(|done| ceil_days(journey.start_date(), done))
        })
        .collect();

    if durations.is_empty() {
        return 0;
    }
    let total: i64 = durations.iter().sum();
    (total as f64 / durations.len() as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Entitlement, JourneyNumber, StepNumber, UserId};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
    }

    fn complete(user: &mut User, number: u32, at: DateTime<Utc>) {
        let number = JourneyNumber::new(number).unwrap();
        for step in StepNumber::all() {
            user.update_journey_step(number, step, true, at).unwrap();
        }
    }

    #[test]
    fn test_average_is_zero_without_completions() {
        let mut user = User::new(UserId::new("u").unwrap(), "sam");
        user.start_journey("a", Entitlement::Free, t0()).unwrap();
        let summary = compute_stats(&user);
        assert_eq!(summary.average_completion_days, 0);
        assert_eq!(summary.active_journeys, 1);
        assert_eq!(summary.total_journeys, 1);
    }

    #[test]
    fn test_average_rounds_ceiled_durations() {
        let mut user = User::new(UserId::new("u").unwrap(), "sam");
        user.start_journey("a", Entitlement::Premium, t0()).unwrap();
        user.start_journey("b", Entitlement::Premium, t0()).unwrap();
        user.start_journey("c", Entitlement::Premium, t0()).unwrap();
        // 2 days + 1 hour -> 3, 4 days -> 4
        complete(&mut user, 1, t0() + Duration::days(2) + Duration::hours(1));
        complete(&mut user, 2, t0() + Duration::days(4));
        user.pause_journey(JourneyNumber::new(3).unwrap()).unwrap();

        let summary = compute_stats(&user);
        assert_eq!(summary.average_completion_days, 4); // 3.5 rounds up
        assert_eq!(summary.completed_journeys, 2);
        assert_eq!(summary.paused_journeys, 1);
        assert_eq!(summary.active_journeys, 0);
    }
}
