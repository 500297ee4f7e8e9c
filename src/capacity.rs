//! Advisory capacity planning from recorded metric samples.
//!
//! The planner keeps the most recent [`MAX_SAMPLES`] values per component
//! and compares their average with a fixed threshold. It never acts on
//! anything; callers decide what to do with the analysis.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

pub const CPU: &str = "cpu";
pub const MEMORY: &str = "memory";
pub const REQUESTS: &str = "requests";
/// Response time in milliseconds.
pub const RESPONSE_TIME: &str = "responseTime";
/// Error rate in percent.
pub const ERROR_RATE: &str = "errorRate";

/// Samples retained per component.
pub const MAX_SAMPLES: usize = 100;

const THRESHOLDS: &[(&str, f64)] = &[
    (CPU, 70.0),
    (MEMORY, 80.0),
    (REQUESTS, 1000.0),
    (RESPONSE_TIME, 2000.0),
    (ERROR_RATE, 1.0),
];

/// Utilization (percent) below which scaling down is suggested.
const SCALE_DOWN_BELOW: f64 = 30.0;

/// Relative change between sample halves that counts as a trend.
const TREND_TOLERANCE: f64 = 0.10;

/// Alert threshold for a component, if it has one.
pub fn threshold(component: &str) -> Option<f64> {
    THRESHOLDS
        .iter()
        .find(|(name, _)| *name == component)
        .map(|(_, limit)| *limit)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingDirection {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

/// Summary of one component's samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSummary {
    pub component: String,
    pub samples: usize,
    pub average: f64,
    pub threshold: Option<f64>,
    pub trend: Trend,
}

impl ComponentSummary {
    pub fn is_bottleneck(&self) -> bool {
        self.threshold.is_some_and(|limit| self.average > limit)
    }
}

/// Result of [`CapacityPlanner::analyze_capacity`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityAnalysis {
    /// Mean of `average / threshold * 100` over thresholded components.
    pub utilization: f64,
    /// Components whose average exceeds their threshold, sorted by name.
    pub bottlenecks: Vec<String>,
    pub scaling: ScalingDirection,
    /// Every component with samples, sorted by name.
    pub components: Vec<ComponentSummary>,
}

/// Sliding-window metric store with threshold analysis.
#[derive(Default)]
pub struct CapacityPlanner {
    samples: Mutex<HashMap<String, VecDeque<f64>>>,
}

impl CapacityPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<f64>>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a sample, discarding the oldest beyond [`MAX_SAMPLES`].
    /// Non-finite values are ignored.
    pub fn record_metric(&self, component: &str, value: f64) {
        if !value.is_finite() {
            debug!(component, value, "ignoring non-finite capacity sample");
            return;
        }
        let mut samples = self.lock();
        let window = samples.entry(component.to_string()).or_default();
        if window.len() == MAX_SAMPLES {
            window.pop_front();
        }
        window.push_back(value);
    }

    /// Number of retained samples for `component`.
    pub fn samples(&self, component: &str) -> usize {
        self.lock().get(component).map_or(0, VecDeque::len)
    }

    pub fn analyze_capacity(&self) -> CapacityAnalysis {
        let mut components: Vec<ComponentSummary> = self
            .lock()
            .iter()
            .filter(|(_, window)| !window.is_empty())
            .map(|(name, window)| ComponentSummary {
                component: name.clone(),
                samples: window.len(),
                average: mean(window.iter().copied()),
                threshold: threshold(name),
                trend: trend(window),
            })
            .collect();
        components.sort_by(|a, b| a.component.cmp(&b.component));

        let ratios: Vec<f64> = components
            .iter()
            .filter_map(|c| c.threshold.map(|limit| c.average / limit * 100.0))
            .collect();
        let utilization = if ratios.is_empty() {
            0.0
        } else {
            mean(ratios.iter().copied())
        };

        let bottlenecks: Vec<String> = components
            .iter()
            .filter(|c| c.is_bottleneck())
            .map(|c| c.component.clone())
            .collect();

        let scaling = if !bottlenecks.is_empty() {
            ScalingDirection::Up
        } else if !ratios.is_empty() && utilization < SCALE_DOWN_BELOW {
            ScalingDirection::Down
        } else {
            ScalingDirection::Stable
        };

        CapacityAnalysis {
            utilization,
            bottlenecks,
            scaling,
            components,
        }
    }

    /// Human-readable advice derived from the current analysis.
    pub fn generate_scaling_recommendations(&self) -> Vec<String> {
        let analysis = self.analyze_capacity();
        if analysis.bottlenecks.is_empty() {
            let note = match analysis.scaling {
                ScalingDirection::Down => format!(
                    "Utilization is {:.0}%; consider scaling down to reduce cost.",
                    analysis.utilization
                ),
                _ => "System is operating within normal capacity.".to_string(),
            };
            return vec![note];
        }
        analysis
            .bottlenecks
            .iter()
            .map(|component| recommendation(component).to_string())
            .collect()
    }

    /// Drop every sample.
    pub fn reset(&self) {
        self.lock().clear();
    }
}

fn recommendation(component: &str) -> &'static str {
    match component {
        CPU => "CPU usage is high; add compute instances or optimize hot paths.",
        MEMORY => "Memory usage is high; increase memory or look for leaks and large caches.",
        REQUESTS => "Request volume is high; scale out and add caching in front of hot endpoints.",
        RESPONSE_TIME => "Response times are slow; profile slow endpoints and cache AI responses.",
        ERROR_RATE => "Error rate is elevated; inspect failing requests and upstream health.",
        _ => "Component exceeds its threshold; investigate resource pressure.",
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Compare the newer half of the window with the older half.
fn trend(window: &VecDeque<f64>) -> Trend {
    if window.len() < 2 {
        return Trend::Flat;
    }
    let half = window.len() / 2;
    let older = mean(window.iter().take(half).copied());
    let newer = mean(window.iter().skip(window.len() - half).copied());
    let base = older.abs().max(f64::EPSILON);
    let change = (newer - older) / base;
    if change > TREND_TOLERANCE {
        Trend::Rising
    } else if change < -TREND_TOLERANCE {
        Trend::Falling
    } else {
        Trend::Flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(values: &[f64]) -> VecDeque<f64> {
        values.iter().copied().collect()
    }

    #[test]
    fn trend_compares_halves() {
        assert_eq!(trend(&window(&[10.0, 10.0, 20.0, 20.0])), Trend::Rising);
        assert_eq!(trend(&window(&[20.0, 20.0, 10.0, 10.0])), Trend::Falling);
        assert_eq!(trend(&window(&[10.0, 10.5, 10.0, 10.5])), Trend::Flat);
    }

    #[test]
    fn single_sample_is_flat() {
        assert_eq!(trend(&window(&[5.0])), Trend::Flat);
    }

    #[test]
    fn known_thresholds() {
        assert_eq!(threshold(CPU), Some(70.0));
        assert_eq!(threshold(ERROR_RATE), Some(1.0));
        assert_eq!(threshold("disk"), None);
    }
}
