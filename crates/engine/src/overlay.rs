use serde::{Deserialize, Serialize};

/// Accepted overlay start times plus the padding the main track needs when
/// the last overlay runs past its end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySchedule {
    pub starts: Vec<f64>,
    /// Total duration the main track must be padded to, when an accepted
    /// overlay extends beyond it. `None` when no padding is needed.
    pub padded_main_duration: Option<f64>,
}

impl OverlaySchedule {
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

/// Compute overlay start times `start + k * interval`.
///
/// A candidate is accepted only if it begins before the main track ends.
/// With `extend` enabled, candidates are accepted up to a safety bound of
/// twice the main duration, and the schedule reports the padded duration
/// the main track needs to fit the last overlay. A negative `interval`
/// places the overlay once at `start`, subject to the same rules.
pub fn schedule_overlay(
    start: f64,
    interval: f64,
    overlay_duration: f64,
    main_duration: f64,
    extend: bool,
) -> OverlaySchedule {
    let bound = if extend {
        main_duration * 2.0
    } else {
        main_duration
    };

    let mut starts = Vec::new();
    if interval < 0.0 {
        let accepted = if extend {
            start <= bound
        } else {
            start < main_duration
        };
        if accepted {
            starts.push(start);
        }
    } else {
        let mut k = 0u32;
        loop {
            let t = start + f64::from(k) * interval;
            if extend {
                if t > bound {
                    break;
                }
            } else if t >= main_duration {
                break;
            }
            starts.push(t);
            k += 1;
        }
    }

    let padded_main_duration = starts
        .last()
        .map(|last| last + overlay_duration)
        .filter(|end| extend && *end > main_duration);

    OverlaySchedule {
        starts,
        padded_main_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_until_main_duration_without_extend() {
        let schedule = schedule_overlay(10.0, 30.0, 5.0, 100.0, false);
        assert_eq!(schedule.starts, vec![10.0, 40.0, 70.0]);
        assert_eq!(schedule.padded_main_duration, None);
    }

    #[test]
    fn candidate_at_main_duration_is_rejected() {
        let schedule = schedule_overlay(0.0, 50.0, 5.0, 100.0, false);
        assert_eq!(schedule.starts, vec![0.0, 50.0]);
    }

    #[test]
    fn extend_accepts_up_to_twice_main_duration() {
        let schedule = schedule_overlay(0.0, 60.0, 10.0, 100.0, true);
        assert_eq!(schedule.starts, vec![0.0, 60.0, 120.0, 180.0]);
        assert_eq!(schedule.padded_main_duration, Some(190.0));
    }

    #[test]
    fn extend_candidate_on_safety_bound_is_accepted() {
        let schedule = schedule_overlay(0.0, 40.0, 5.0, 100.0, true);
        assert_eq!(schedule.starts, vec![0.0, 40.0, 80.0, 120.0, 160.0, 200.0]);
        assert_eq!(schedule.padded_main_duration, Some(205.0));
    }

    #[test]
    fn extend_without_overhang_needs_no_padding() {
        let schedule = schedule_overlay(50.0, -1.0, 5.0, 100.0, true);
        assert_eq!(schedule.starts, vec![50.0]);
        assert_eq!(schedule.padded_main_duration, None);
    }

    #[test]
    fn no_valid_candidates_yields_empty_schedule() {
        let schedule = schedule_overlay(120.0, 30.0, 5.0, 100.0, false);
        assert!(schedule.is_empty());
        assert_eq!(schedule.padded_main_duration, None);
    }

    #[test]
    fn negative_interval_places_once() {
        let schedule = schedule_overlay(20.0, -1.0, 5.0, 100.0, false);
        assert_eq!(schedule.starts, vec![20.0]);

        let late = schedule_overlay(120.0, -1.0, 5.0, 100.0, false);
        assert!(late.is_empty());
    }

    #[test]
    fn negative_interval_with_extend_pads_overhang() {
        let schedule = schedule_overlay(98.0, -1.0, 5.0, 100.0, true);
        assert_eq!(schedule.starts, vec![98.0]);
        assert_eq!(schedule.padded_main_duration, Some(103.0));
    }
}
