//! Scheduled parameter automation.
//!
//! An `AudioParam` is a timeline of value events against the audio clock.
//! Each ramp event runs from the previous event's time and value to its own
//! time and value; before the first event the param sits at its default.

/// Floor used when an exponential ramp is asked to reach a non-positive
/// target.
pub const MIN_EXPONENTIAL_VALUE: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Set,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ParamEvent {
    shape: Shape,
    value: f32,
    time: f64,
}

#[derive(Debug, Clone)]
pub struct AudioParam {
    default_value: f32,
    events: Vec<ParamEvent>,
}

impl AudioParam {
    pub fn new(default_value: f32) -> Self {
        AudioParam {
            default_value,
            events: Vec::new(),
        }
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent {
            shape: Shape::Set,
            value,
            time,
        });
    }

    /// Ramp linearly from the previous event to `value`, arriving at `time`.
    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent {
            shape: Shape::Linear,
            value,
            time,
        });
    }

    /// Ramp exponentially from the previous event to `value`, arriving at
    /// `time`. Non-positive targets are raised to `MIN_EXPONENTIAL_VALUE`.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent {
            shape: Shape::Exponential,
            value: value.max(MIN_EXPONENTIAL_VALUE),
            time,
        });
    }

    /// Drop every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time < time);
    }

    /// Value of the param at `time`.
    pub fn value_at(&self, time: f64) -> f32 {
        let mut prev_time = 0.0;
        let mut prev_value = self.default_value;

        for event in &self.events {
            if event.time <= time {
                prev_time = event.time;
                prev_value = event.value;
                continue;
            }

            let span = event.time - prev_time;
            if span <= 0.0 {
                return prev_value;
            }
            let t = ((time - prev_time) / span).clamp(0.0, 1.0) as f32;

            return match event.shape {
                Shape::Set => prev_value,
                Shape::Linear => prev_value + (event.value - prev_value) * t,
                Shape::Exponential => {
                    if prev_value > 0.0 && event.value > 0.0 {
                        prev_value * (event.value / prev_value).powf(t)
                    } else {
                        prev_value
                    }
                }
            };
        }

        prev_value
    }

    /// Forget events that can no longer influence values at or after `time`.
    ///
    /// The last event at or before `time` is kept since later ramps start
    /// from it.
    pub fn prune(&mut self, time: f64) {
        let anchor = self.events.iter().rposition(|e| e.time <= time);
        if let Some(idx) = anchor {
            self.events.drain(..idx);
        }
    }

    /// Number of pending events, including the anchor.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Time of the last scheduled event, if any.
    pub fn end_time(&self) -> Option<f64> {
        self.events.last().map(|e| e.time)
    }

    fn insert(&mut self, event: ParamEvent) {
        // Later events at the same time land after earlier ones.
        let idx = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(idx, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn default_before_any_event() {
        let p = AudioParam::new(0.3);
        assert_eq!(p.value_at(0.0), 0.3);
        assert_eq!(p.value_at(10.0), 0.3);
    }

    #[test]
    fn set_value_holds() {
        let mut p = AudioParam::new(1.0);
        p.set_value_at_time(0.5, 1.0);
        assert_eq!(p.value_at(0.5), 1.0);
        assert_eq!(p.value_at(1.0), 0.5);
        assert_eq!(p.value_at(3.0), 0.5);
    }

    #[test]
    fn linear_ramp_interpolates() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 1.0);
        p.linear_ramp_to_value_at_time(1.0, 2.0);
        assert!(close(p.value_at(1.5), 0.5));
        assert!(close(p.value_at(1.25), 0.25));
        assert_eq!(p.value_at(2.0), 1.0);
        assert_eq!(p.value_at(5.0), 1.0);
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(1.0, 0.0);
        p.exponential_ramp_to_value_at_time(0.25, 2.0);
        // Halfway through a geometric ramp from 1 to 0.25 is 0.5.
        assert!(close(p.value_at(1.0), 0.5));
        assert!(close(p.value_at(2.0), 0.25));
    }

    #[test]
    fn exponential_from_zero_holds_until_end() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.exponential_ramp_to_value_at_time(1.0, 1.0);
        assert_eq!(p.value_at(0.5), 0.0);
        assert_eq!(p.value_at(1.0), 1.0);
    }

    #[test]
    fn non_positive_exponential_target_is_floored() {
        let mut p = AudioParam::new(1.0);
        p.set_value_at_time(1.0, 0.0);
        p.exponential_ramp_to_value_at_time(0.0, 1.0);
        assert_eq!(p.value_at(1.0), MIN_EXPONENTIAL_VALUE);
    }

    #[test]
    fn cancel_drops_future_events() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.linear_ramp_to_value_at_time(1.0, 1.0);
        p.exponential_ramp_to_value_at_time(0.5, 2.0);

        let held = p.value_at(0.5);
        p.cancel_scheduled_values(0.5);
        p.set_value_at_time(held, 0.5);

        assert_eq!(p.event_count(), 2);
        assert!(close(p.value_at(0.75), held));
        assert!(close(p.value_at(3.0), held));
    }

    #[test]
    fn prune_keeps_anchor_for_running_ramp() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.set_value_at_time(0.2, 0.5);
        p.linear_ramp_to_value_at_time(1.0, 1.5);

        let before = p.value_at(1.0);
        p.prune(1.0);
        assert_eq!(p.event_count(), 2);
        assert!(close(p.value_at(1.0), before));
    }

    #[test]
    fn same_time_events_keep_insertion_order() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.1, 1.0);
        p.set_value_at_time(0.9, 1.0);
        assert_eq!(p.value_at(1.0), 0.9);
    }
}
