//! Calendar schedules: which fixed-time capacity rules fire in a window.

use warpgrid_state::{ScalingSchedule, Weekday};

const DAY_SECS: u64 = 86_400;

/// Schedules with an occurrence in `(from, to]` (UTC), in input order.
pub fn due_schedules(schedules: &[ScalingSchedule], from: u64, to: u64) -> Vec<&ScalingSchedule> {
    if to <= from {
        return Vec::new();
    }
    schedules
        .iter()
        .filter(|s| next_occurrence(s, from).is_some_and(|at| at <= to))
        .collect()
}

/// First occurrence of `schedule` strictly after `after`.
pub fn next_occurrence(schedule: &ScalingSchedule, after: u64) -> Option<u64> {
    if schedule.days.is_empty() || schedule.hour > 23 || schedule.minute > 59 {
        return None;
    }
    let offset = schedule.hour as u64 * 3600 + schedule.minute as u64 * 60;
    let first_day = after / DAY_SECS * DAY_SECS;
    // Eight days covers a full week even when today's slot already passed.
    (0..8)
        .map(|d| first_day + d * DAY_SECS)
        .filter(|day| schedule.days.contains(&Weekday::of_timestamp(*day)))
        .map(|day| day + offset)
        .find(|at| *at > after)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Friday 1970-01-02 00:00 UTC.
    const FRIDAY: u64 = DAY_SECS;

    fn ramp_up() -> ScalingSchedule {
        ScalingSchedule::new("weekday-ramp-up", Weekday::WORKDAYS.to_vec(), 9, 0, 6)
    }

    fn weekend_low() -> ScalingSchedule {
        ScalingSchedule::new("weekend-low", vec![Weekday::Saturday], 0, 0, 1)
    }

    #[test]
    fn fires_inside_window() {
        let schedules = vec![ramp_up(), weekend_low()];
        let nine = FRIDAY + 9 * 3600;
        let due = due_schedules(&schedules, nine - 300, nine);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "weekday-ramp-up");
    }

    #[test]
    fn window_is_open_at_start() {
        let schedules = vec![ramp_up()];
        let nine = FRIDAY + 9 * 3600;
        assert!(due_schedules(&schedules, nine, nine + 300).is_empty());
    }

    #[test]
    fn respects_days() {
        let schedules = vec![ramp_up(), weekend_low()];
        let saturday = FRIDAY + DAY_SECS;
        let due = due_schedules(&schedules, saturday - 60, saturday + 10 * 3600);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "weekend-low");
    }

    #[test]
    fn next_occurrence_skips_to_next_matching_day() {
        // Friday 10:00, so the next weekday 09:00 is Monday.
        let after = FRIDAY + 10 * 3600;
        let monday_nine = FRIDAY + 3 * DAY_SECS + 9 * 3600;
        assert_eq!(next_occurrence(&ramp_up(), after), Some(monday_nine));
    }

    #[test]
    fn invalid_schedule_never_fires() {
        let mut bad = ramp_up();
        bad.hour = 25;
        assert_eq!(next_occurrence(&bad, 0), None);
        bad.hour = 9;
        bad.days.clear();
        assert_eq!(next_occurrence(&bad, 0), None);
    }
}
