//! Signal conditioning graph — the fixed DSP chain every input block runs
//! through before recording.
//!
//! ```text
//! input → high-pass → low-pass → gain → analyser → monitor gain → monitor out
//! ```
//!
//! The topology is built once per [`crate::audio::AudioInterface`] and never
//! rebuilt; toggling the voice filter only retunes the corner frequencies of
//! the two existing filter stages.  The analyser keeps a bounded window of
//! the most recent post-gain samples and reduces it to a single peak volume
//! in `[0, 1]` whenever the level meter asks.

use std::collections::VecDeque;

use crate::config::AudioConfig;

/// Gain ceiling of the input stage (matches the front-panel knob range).
pub const MAX_GAIN: f32 = 2.5;

// ---------------------------------------------------------------------------
// Biquad
// ---------------------------------------------------------------------------

/// Filter role of one biquad stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterKind {
    HighPass,
    LowPass,
}

/// Second-order IIR filter (RBJ cookbook coefficients, Butterworth Q).
///
/// Retuning via [`set_corner`](Self::set_corner) recomputes coefficients in
/// place and keeps the delay line, so a running signal is not interrupted.
#[derive(Debug, Clone)]
struct Biquad {
    kind: FilterKind,
    sample_rate: f32,
    corner_hz: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    fn new(kind: FilterKind, sample_rate: f32, corner_hz: f32) -> Self {
        let mut f = Self {
            kind,
            sample_rate,
            corner_hz,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        };
        f.recompute();
        f
    }

    fn set_corner(&mut self, corner_hz: f32) {
        self.corner_hz = corner_hz;
        self.recompute();
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recompute();
    }

    fn corner(&self) -> f32 {
        self.corner_hz
    }

    fn recompute(&mut self) {
        let q = std::f32::consts::FRAC_1_SQRT_2;
        let w0 = 2.0 * std::f32::consts::PI * self.corner_hz / self.sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;

        match self.kind {
            FilterKind::HighPass => {
                self.b0 = (1.0 + cos_w0) / 2.0 / a0;
                self.b1 = -(1.0 + cos_w0) / a0;
                self.b2 = (1.0 + cos_w0) / 2.0 / a0;
            }
            FilterKind::LowPass => {
                self.b0 = (1.0 - cos_w0) / 2.0 / a0;
                self.b1 = (1.0 - cos_w0) / a0;
                self.b2 = (1.0 - cos_w0) / 2.0 / a0;
            }
        }
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    /// Transposed direct form II, one sample.
    fn tick(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

// ---------------------------------------------------------------------------
// ProcessedBlock
// ---------------------------------------------------------------------------

/// Output of one pass through the graph.
#[derive(Debug, Clone)]
pub struct ProcessedBlock {
    /// Conditioned samples (post filter + gain) — what the recorder captures.
    pub samples: Vec<f32>,
    /// Monitor copy scaled by the monitor gain; empty while monitoring is
    /// silent so the common path allocates nothing extra.
    pub monitor: Vec<f32>,
}

// ---------------------------------------------------------------------------
// ConditioningGraph
// ---------------------------------------------------------------------------

/// The fixed conditioning topology plus its mutable parameters.
///
/// Parameter mutation is the owner's job ([`crate::audio::AudioInterface`]);
/// nothing else touches the stages.
pub struct ConditioningGraph {
    high_pass: Biquad,
    low_pass: Biquad,
    gain: f32,
    monitor_volume: f32,
    filter_on: bool,
    wide_band_hz: (f32, f32),
    voice_band_hz: (f32, f32),
    /// Bounded window of recent post-gain samples read by the analyser.
    analysis: VecDeque<f32>,
    analysis_size: usize,
}

impl ConditioningGraph {
    /// Build the graph for one input sample rate.  Starts with the wide
    /// band (filter off), the configured default gain, and a silent monitor.
    pub fn new(config: &AudioConfig, sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let (hp_hz, lp_hz) = config.wide_band_hz;

        Self {
            high_pass: Biquad::new(FilterKind::HighPass, sr, hp_hz),
            low_pass: Biquad::new(FilterKind::LowPass, sr, lp_hz),
            gain: config.gain.clamp(0.0, MAX_GAIN),
            monitor_volume: config.monitor_volume.clamp(0.0, MAX_GAIN),
            filter_on: false,
            wide_band_hz: config.wide_band_hz,
            voice_band_hz: config.voice_band_hz,
            analysis: VecDeque::with_capacity(config.analysis_size),
            analysis_size: config.analysis_size.max(1),
        }
    }

    /// Run one block through the chain.
    pub fn process(&mut self, input: &[f32]) -> ProcessedBlock {
        let mut samples = Vec::with_capacity(input.len());
        for &x in input {
            let y = self.low_pass.tick(self.high_pass.tick(x)) * self.gain;
            if self.analysis.len() == self.analysis_size {
                self.analysis.pop_front();
            }
            self.analysis.push_back(y);
            samples.push(y);
        }

        let monitor = if self.monitor_volume > 0.0 {
            samples.iter().map(|s| s * self.monitor_volume).collect()
        } else {
            Vec::new()
        };

        ProcessedBlock { samples, monitor }
    }

    /// Peak volume over the analysis window, clamped to `[0, 1]`.
    ///
    /// Sampled continuously by the level meter, independent of recording
    /// state.
    pub fn peak_volume(&self) -> f32 {
        self.analysis
            .iter()
            .fold(0.0_f32, |max, s| max.max(s.abs()))
            .min(1.0)
    }

    // -- parameters ---------------------------------------------------------

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Set the input gain, clamped to `[0, 2.5]`.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, MAX_GAIN);
    }

    pub fn monitor_volume(&self) -> f32 {
        self.monitor_volume
    }

    pub fn set_monitor_volume(&mut self, volume: f32) {
        self.monitor_volume = volume.clamp(0.0, MAX_GAIN);
    }

    pub fn filter_on(&self) -> bool {
        self.filter_on
    }

    /// Switch between the wide band and the voice band.
    ///
    /// Retunes the existing filter stages; the graph is never rebuilt.
    pub fn set_filter_on(&mut self, on: bool) {
        if self.filter_on == on {
            return;
        }
        self.filter_on = on;

        let (hp_hz, lp_hz) = if on {
            self.voice_band_hz
        } else {
            self.wide_band_hz
        };
        self.high_pass.set_corner(hp_hz);
        self.low_pass.set_corner(lp_hz);
    }

    /// Current corner frequencies as `(high_pass_hz, low_pass_hz)`.
    pub fn corner_frequencies(&self) -> (f32, f32) {
        (self.high_pass.corner(), self.low_pass.corner())
    }

    /// Retune both filter stages for a new input sample rate.
    ///
    /// Used when input routing switches to a device with a different native
    /// rate; the stages themselves are kept.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        let sr = sample_rate.max(1) as f32;
        self.high_pass.set_sample_rate(sr);
        self.low_pass.set_sample_rate(sr);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
