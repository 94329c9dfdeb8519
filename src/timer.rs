use std::time::{Duration, Instant};

/// Monotonic clock for screen deadlines, plus a rolling record of frame
/// durations so display timing can be checked after a session.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    start_time: Instant,
    frame_times: Vec<Duration>,
    max_samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    pub samples: usize,
    pub average_frame_time_ns: f64,
    /// standard deviation
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_samples: usize) -> Self {
        Self {
            start_time: Instant::now(),
            frame_times: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Nanoseconds since the timer was created.
    pub fn now_ns(&self) -> u64 {
        self.start_time.elapsed().as_nanos() as u64
    }

    /// Keeps the newest `max_samples` durations.
    pub fn record_frame_time(&mut self, duration: Duration) {
        if self.max_samples == 0 {
            return;
        }
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.remove(0);
        }
        self.frame_times.push(duration);
    }

    pub fn frame_stats(&self) -> Option<FrameStats> {
        if self.frame_times.is_empty() {
            return None;
        }
        let times_ns: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();

        let n = times_ns.len() as f64;
        let avg = times_ns.iter().sum::<f64>() / n;
        let variance = times_ns.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = times_ns.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = times_ns.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Some(FrameStats {
            samples: times_ns.len(),
            average_frame_time_ns: avg,
            jitter_ns: variance.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        })
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}
