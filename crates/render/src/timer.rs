use std::collections::VecDeque;
use std::time::Duration;

/// Frame durations over the last `window` frames, for the fps readout.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    recent: VecDeque<Duration>,
    window: usize,
    sum: Duration,
    total_frames: u64,
}

impl Default for FrameTimer {
    /// Two seconds at 60 Hz.
    fn default() -> Self {
        Self::new(120)
    }
}

impl FrameTimer {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            recent: VecDeque::with_capacity(window),
            window,
            sum: Duration::ZERO,
            total_frames: 0,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        if self.recent.len() == self.window {
            if let Some(oldest) = self.recent.pop_front() {
                self.sum -= oldest;
            }
        }
        self.recent.push_back(dt);
        self.sum += dt;
        self.total_frames += 1;
    }

    /// Mean frame time over the window; zero before the first frame.
    pub fn average(&self) -> Duration {
        match self.recent.len() {
            0 => Duration::ZERO,
            n => self.sum / n as u32,
        }
    }

    pub fn last(&self) -> Option<Duration> {
        self.recent.back().copied()
    }

    pub fn fps(&self) -> f32 {
        let avg = self.average().as_secs_f32();
        if avg > 0.0 { avg.recip() } else { 0.0 }
    }

    /// Frames currently inside the window.
    pub fn count(&self) -> usize {
        self.recent.len()
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn average_and_fps() {
        let mut timer = FrameTimer::new(4);
        for v in [10, 20, 30] {
            timer.record(ms(v));
        }
        assert_eq!(timer.count(), 3);
        assert_eq!(timer.average(), ms(20));
        assert_eq!(timer.last(), Some(ms(30)));
        assert!((timer.fps() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn old_frames_leave_the_window() {
        let mut timer = FrameTimer::new(2);
        for v in [100, 10, 30] {
            timer.record(ms(v));
        }
        assert_eq!(timer.count(), 2);
        assert_eq!(timer.average(), ms(20));
        assert_eq!(timer.total_frames(), 3);
    }

    #[test]
    fn fresh_timer_reads_zero() {
        let timer = FrameTimer::default();
        assert_eq!(timer.average(), Duration::ZERO);
        assert_eq!(timer.fps(), 0.0);
        assert_eq!(timer.last(), None);
    }
}
