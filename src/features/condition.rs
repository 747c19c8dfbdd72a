//! Conditioning-vector and target-delta assembly from season records

use crate::features::transform::{logit, safe_log};
use crate::{ConditionUsed, SeasonRecord};

/// Number of conditioning features
pub const COND_DIM: usize = 4;
/// Number of target features
pub const TARGET_DIM: usize = 2;

/// Raw (unscaled) conditioning vector for predicting `target_year` from a
/// previous season: [logit(OBP), log(SLG), PA, age entering the target year].
///
/// The age is projected across gap years, so a 27-year-old 2025 season
/// conditions a 2026 forecast at age 28.
pub fn condition_vector(prev: &SeasonRecord, target_year: i32) -> [f64; COND_DIM] {
    [
        logit(prev.obp),
        safe_log(prev.slg),
        prev.pa as f64,
        prev.age + (target_year - prev.year) as f64,
    ]
}

/// Raw (unscaled) target vector between two consecutive seasons:
/// [delta logit(OBP), delta log(SLG)].
pub fn target_delta(prev: &SeasonRecord, cur: &SeasonRecord) -> [f64; TARGET_DIM] {
    [
        logit(cur.obp) - logit(prev.obp),
        safe_log(cur.slg) - safe_log(prev.slg),
    ]
}

/// Pick the season to condition on: the most recent record meeting
/// `min_pa`, falling back to the most recent record outright.
///
/// `history` must be sorted ascending by year.
pub fn select_conditioning_season(history: &[SeasonRecord], min_pa: u32) -> Option<&SeasonRecord> {
    history
        .iter()
        .rev()
        .find(|s| s.qualifies(min_pa))
        .or_else(|| history.last())
}

/// Describe the conditioning season for the response payload
pub fn condition_used(prev: &SeasonRecord, target_year: i32) -> ConditionUsed {
    ConditionUsed {
        prev_year: prev.year,
        prev_obp: prev.obp,
        prev_slg: prev.slg,
        prev_pa: prev.pa,
        age_next: prev.age + (target_year - prev.year) as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlayerId;

    fn season(year: i32, pa: u32, obp: f64, slg: f64, age: f64) -> SeasonRecord {
        SeasonRecord {
            player_id: PlayerId("troutmi01".to_string()),
            year,
            pa,
            obp,
            slg,
            age,
        }
    }

    #[test]
    fn test_single_qualifying_season_conditions_next_year() {
        // One season: 2025, PA=500, OBP=.350, SLG=.450, age 27. Predicting
        // 2026 must condition on it with the age projected to 28.
        let history = vec![season(2025, 500, 0.350, 0.450, 27.0)];
        let prev = select_conditioning_season(&history, 50).unwrap();
        let used = condition_used(prev, 2026);

        assert_eq!(used.prev_year, 2025);
        assert_eq!(used.prev_pa, 500);
        assert!((used.age_next - 28.0).abs() < 1e-12);

        let cond = condition_vector(prev, 2026);
        assert!((cond[0] - logit(0.350)).abs() < 1e-12);
        assert!((cond[1] - safe_log(0.450)).abs() < 1e-12);
        assert!((cond[2] - 500.0).abs() < 1e-12);
        assert!((cond[3] - 28.0).abs() < 1e-12);
    }

    #[test]
    fn test_age_projected_across_gap_years() {
        let history = vec![season(2023, 600, 0.330, 0.500, 29.0)];
        let prev = select_conditioning_season(&history, 50).unwrap();
        let used = condition_used(prev, 2026);
        assert!((used.age_next - 32.0).abs() < 1e-12);
    }

    #[test]
    fn test_prefers_recent_qualifying_over_most_recent() {
        // 2025 was a 30-PA cup of coffee; conditioning should fall back to
        // the qualifying 2024 season.
        let history = vec![
            season(2024, 550, 0.340, 0.470, 26.0),
            season(2025, 30, 0.200, 0.250, 27.0),
        ];
        let prev = select_conditioning_season(&history, 50).unwrap();
        assert_eq!(prev.year, 2024);
    }

    #[test]
    fn test_falls_back_to_most_recent_when_none_qualify() {
        let history = vec![
            season(2024, 20, 0.300, 0.400, 24.0),
            season(2025, 30, 0.310, 0.420, 25.0),
        ];
        let prev = select_conditioning_season(&history, 50).unwrap();
        assert_eq!(prev.year, 2025);
    }

    #[test]
    fn test_empty_history_selects_nothing() {
        assert!(select_conditioning_season(&[], 50).is_none());
    }

    #[test]
    fn test_target_delta_is_model_space_change() {
        let prev = season(2024, 500, 0.350, 0.450, 27.0);
        let cur = season(2025, 520, 0.370, 0.480, 28.0);
        let d = target_delta(&prev, &cur);
        assert!((d[0] - (logit(0.370) - logit(0.350))).abs() < 1e-12);
        assert!((d[1] - (safe_log(0.480) - safe_log(0.450))).abs() < 1e-12);
    }
}
