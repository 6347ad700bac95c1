//! Opt-in wall-clock accounting of the solver phases (feature `timing`).
//!
//! Without the feature every wrapper just calls its closure.

#[cfg(feature = "timing")]
use std::cell::RefCell;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Jacobian,
    LinearSolve,
    Sensitivity,
}

impl Phase {
    const ALL: [Phase; 3] = [Phase::Jacobian, Phase::LinearSolve, Phase::Sensitivity];

    fn label(self) -> &'static str {
        match self {
            Phase::Jacobian => "Jacobian assembly",
            Phase::LinearSolve => "Linear solve",
            Phase::Sensitivity => "Sensitivity steps",
        }
    }
}

/// Per-thread wall-clock breakdown of the solver phases.
#[derive(Debug, Default, Clone)]
pub struct TimingStats {
    pub jacobian_times: Vec<Duration>,
    pub linear_solve_times: Vec<Duration>,
    pub sensitivity_times: Vec<Duration>,
    pub total_time: Duration,
}

impl TimingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn times(&self, phase: Phase) -> &[Duration] {
        match phase {
            Phase::Jacobian => &self.jacobian_times,
            Phase::LinearSolve => &self.linear_solve_times,
            Phase::Sensitivity => &self.sensitivity_times,
        }
    }

    #[cfg(feature = "timing")]
    fn push(&mut self, phase: Phase, elapsed: Duration) {
        match phase {
            Phase::Jacobian => self.jacobian_times.push(elapsed),
            Phase::LinearSolve => self.linear_solve_times.push(elapsed),
            Phase::Sensitivity => self.sensitivity_times.push(elapsed),
        }
    }

    pub fn accounted(&self) -> Duration {
        Phase::ALL.iter().flat_map(|&p| self.times(p)).sum()
    }

    #[cfg(feature = "timing")]
    pub fn print_summary(&self) {
        if self.jacobian_times.is_empty() {
            return;
        }
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;

        println!("\n{}", "=".repeat(60));
        println!("{:^60}", "SOLVER TIMING SUMMARY");
        println!("{}", "=".repeat(60));
        println!("Total time:                    {:.3}s", self.total_time.as_secs_f64());
        println!("{}", "-".repeat(60));
        for phase in Phase::ALL {
            let times = self.times(phase);
            if times.is_empty() {
                continue;
            }
            let total: Duration = times.iter().sum();
            println!(
                "  {:<24}{:>9.3}ms  (avg: {:>9.3}ms, {} calls)",
                phase.label(),
                ms(total),
                ms(total) / times.len() as f64,
                times.len()
            );
        }
        println!("{}", "=".repeat(60));
        println!(
            "Overhead/Other:                {:>9.3}ms\n",
            ms(self.total_time.saturating_sub(self.accounted()))
        );
    }

    #[cfg(not(feature = "timing"))]
    pub fn print_summary(&self) {}
}

#[cfg(feature = "timing")]
thread_local! {
    static TIMING_STATS: RefCell<TimingStats> = RefCell::new(TimingStats::new());
}

/// Runs `f` and books its duration under `phase`.
pub fn record<F, R>(phase: Phase, f: F) -> R
where
    F: FnOnce() -> R,
{
    #[cfg(feature = "timing")]
    {
        let start = std::time::Instant::now();
        let result = f();
        let elapsed = start.elapsed();
        TIMING_STATS.with(|stats| stats.borrow_mut().push(phase, elapsed));
        result
    }
    #[cfg(not(feature = "timing"))]
    {
        let _ = phase;
        f()
    }
}

pub fn record_jacobian<F: FnOnce() -> R, R>(f: F) -> R {
    record(Phase::Jacobian, f)
}

pub fn record_linear_solve<F: FnOnce() -> R, R>(f: F) -> R {
    record(Phase::LinearSolve, f)
}

pub fn record_sensitivity<F: FnOnce() -> R, R>(f: F) -> R {
    record(Phase::Sensitivity, f)
}

pub fn reset_timing() {
    #[cfg(feature = "timing")]
    TIMING_STATS.with(|stats| *stats.borrow_mut() = TimingStats::new());
}

/// Stats of the calling thread. Work done on rayon workers is not included.
pub fn finalize_timing(total_time: Duration) -> TimingStats {
    #[cfg(feature = "timing")]
    {
        TIMING_STATS.with(|stats| {
            let mut s = stats.borrow_mut();
            s.total_time = total_time;
            s.clone()
        })
    }
    #[cfg(not(feature = "timing"))]
    {
        TimingStats {
            total_time,
            ..TimingStats::new()
        }
    }
}

pub fn finalize_and_print(total_time: Duration) {
    finalize_timing(total_time).print_summary();
}
