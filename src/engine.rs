use nih_plug::prelude::{nih_debug_assert, nih_log, Smoother, SmoothingStyle};
use std::sync::Arc;
use thiserror::Error;

use crate::biquad::{calculate, BiquadCoefficients, FilterShape};
use crate::controls::{LiveParameters, ParameterId, ParameterValues};
use crate::response::{ResponseProbe, SharedCoefficients};

/// Samples between two coefficient recomputations.
pub const DEFAULT_UPDATE_INTERVAL: usize = 32;
/// Length of the linear cutoff and resonance ramps.
pub const DEFAULT_SMOOTHING_MS: f32 = 20.0;

/// Feedback values at or below this magnitude are flushed to zero.
const SQUELCH_FLOOR: f32 = 1e-15;
/// Feedback values at or above this magnitude are treated as a blow-up and flushed to zero.
const SQUELCH_CEILING: f32 = 1e15;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("the filter needs at least one channel")]
    NoChannels,
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(f32),
}

/// How the engine turns control changes into coefficient updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Length of the linear ramp towards a new cutoff or resonance. Zero jumps immediately.
    pub smoothing_ms: f32,
    /// Coefficients are recomputed every this many samples. Zero is treated as one.
    pub update_interval: usize,
}

impl EngineConfig {
    /// No smoothing and a fresh coefficient set on every sample.
    pub fn per_sample() -> Self {
        Self {
            smoothing_ms: 0.0,
            update_interval: 1,
        }
    }

    pub fn with_smoothing_ms(mut self, smoothing_ms: f32) -> Self {
        self.smoothing_ms = smoothing_ms.max(0.0);
        self
    }

    pub fn with_update_interval(mut self, update_interval: usize) -> Self {
        self.update_interval = update_interval.max(1);
        self
    }

    fn smoothing_style(&self) -> SmoothingStyle {
        if self.smoothing_ms > 0.0 {
            SmoothingStyle::Linear(self.smoothing_ms)
        } else {
            SmoothingStyle::None
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_ms: DEFAULT_SMOOTHING_MS,
            update_interval: DEFAULT_UPDATE_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unconfigured,
    Active,
    Bypassed,
}

/// Forces denormals, infinities and NaN to zero. NaN fails both comparisons.
#[inline]
pub fn squelch(x: f32) -> f32 {
    let abs = x.abs();
    if abs > SQUELCH_FLOOR && abs < SQUELCH_CEILING {
        x
    } else {
        0.0
    }
}

/// The last two inputs and outputs of one channel (direct form I).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ChannelState {
    pub x1: f32,
    pub x2: f32,
    pub y1: f32,
    pub y2: f32,
}

impl ChannelState {
    #[inline]
    pub fn tick(&mut self, coefficients: &BiquadCoefficients, x0: f32) -> f32 {
        let y0 = coefficients.b0 * x0 + coefficients.b1 * self.x1 + coefficients.b2 * self.x2
            - coefficients.a1 * self.y1
            - coefficients.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x0;
        self.y2 = self.y1;
        self.y1 = y0;

        y0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Once fed a NaN or infinity the recursion would never recover on its own, so bad feedback
    /// values are flushed here.
    pub fn squelch(&mut self) {
        self.x1 = squelch(self.x1);
        self.x2 = squelch(self.x2);
        self.y1 = squelch(self.y1);
        self.y2 = squelch(self.y2);
    }

    /// True when every value is finite and none is subnormal.
    pub fn is_clean(&self) -> bool {
        [self.x1, self.x2, self.y1, self.y2]
            .iter()
            .all(|v| v.is_finite() && !v.is_subnormal())
    }
}

/// A multichannel biquad running on block-based, non-interleaved audio.
///
/// The render thread owns the engine and calls [`FilterEngine::process`] or
/// [`FilterEngine::process_in_place`]. Control threads change the filter through the
/// [`LiveParameters`] handle from [`FilterEngine::parameters`] and draw the response through a
/// [`ResponseProbe`]; neither ever blocks the render thread. [`FilterEngine::configure`] and
/// [`FilterEngine::reset`] must only be called while no block is being rendered.
pub struct FilterEngine {
    config: EngineConfig,
    params: Arc<LiveParameters>,

    states: Vec<ChannelState>,
    sample_rate: f32,
    configured: bool,
    bypassed: bool,

    /// The goals the smoothers were last pointed at.
    goals: ParameterValues,
    cutoff: Smoother<f32>,
    resonance: Smoother<f32>,

    coefficients: BiquadCoefficients,
    samples_until_update: usize,
    published: Arc<SharedCoefficients>,
}

impl FilterEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_parameters(config, Arc::new(LiveParameters::default()))
    }

    /// Creates an engine that reads its controls from an existing parameter store.
    pub fn with_parameters(config: EngineConfig, params: Arc<LiveParameters>) -> Self {
        let goals = params.values();
        let cutoff = Smoother::new(config.smoothing_style());
        let resonance = Smoother::new(config.smoothing_style());
        cutoff.reset(goals.cutoff);
        resonance.reset(goals.resonance);

        Self {
            config,
            params,

            states: Vec::new(),
            sample_rate: 44100.0,
            configured: false,
            bypassed: false,

            goals,
            cutoff,
            resonance,

            coefficients: BiquadCoefficients::PASSTHROUGH,
            samples_until_update: 0,
            published: Arc::new(SharedCoefficients::new(
                BiquadCoefficients::PASSTHROUGH,
                44100.0,
            )),
        }
    }

    /// Allocates zeroed feedback state for `channel_count` channels and adopts `sample_rate`.
    /// Not real-time safe.
    pub fn configure(&mut self, channel_count: usize, sample_rate: f32) -> Result<(), EngineError> {
        if channel_count == 0 {
            return Err(EngineError::NoChannels);
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }

        self.states.clear();
        self.states.resize(channel_count, ChannelState::default());
        self.sample_rate = sample_rate;
        self.configured = true;
        self.settle();

        nih_log!(
            "Filter configured for {} channel(s) at {} Hz ({}, every {} samples)",
            channel_count,
            sample_rate,
            if self.config.smoothing_ms > 0.0 {
                format!("{} ms smoothing", self.config.smoothing_ms)
            } else {
                String::from("no smoothing")
            },
            self.config.update_interval.max(1)
        );

        Ok(())
    }

    /// Clears all feedback state and snaps the smoothers to their goals. The parameters
    /// themselves are left alone.
    pub fn reset(&mut self) {
        for state in self.states.iter_mut() {
            state.clear();
        }
        self.settle();
    }

    /// Jumps straight to the current goals and commits matching coefficients.
    fn settle(&mut self) {
        self.goals = self.params.values();
        self.cutoff.reset(self.goals.cutoff);
        self.resonance.reset(self.goals.resonance);
        self.coefficients = calculate(
            self.goals.cutoff,
            self.goals.resonance,
            self.goals.shape,
            self.sample_rate,
        );
        self.samples_until_update = 0;
        self.published.publish(&self.coefficients, self.sample_rate);
    }

    /// The shared control store. Hand clones of this to whichever thread drives the controls.
    pub fn parameters(&self) -> Arc<LiveParameters> {
        self.params.clone()
    }

    pub fn set_parameter(&self, id: ParameterId, value: f32) {
        self.params.set(id, value);
    }

    /// The goal value, never an intermediate ramp value.
    pub fn get_parameter(&self, id: ParameterId) -> f32 {
        self.params.get(id)
    }

    /// Address-based variant of [`Self::set_parameter`]. Unknown addresses are ignored.
    pub fn set_parameter_at(&self, address: u32, value: f32) {
        if let Some(id) = ParameterId::from_address(address) {
            self.params.set(id, value);
        }
    }

    pub fn get_parameter_at(&self, address: u32) -> Option<f32> {
        ParameterId::from_address(address).map(|id| self.params.get(id))
    }

    pub fn set_bypass(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    pub fn state(&self) -> EngineState {
        match (self.configured, self.bypassed) {
            (false, _) => EngineState::Unconfigured,
            (true, false) => EngineState::Active,
            (true, true) => EngineState::Bypassed,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn channel_count(&self) -> usize {
        self.states.len()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channel_state(&self, channel: usize) -> Option<&ChannelState> {
        self.states.get(channel)
    }

    pub fn channel_state_mut(&mut self, channel: usize) -> Option<&mut ChannelState> {
        self.states.get_mut(channel)
    }

    /// The coefficients the last processed sample used.
    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coefficients
    }

    /// Coefficients for the current goal values, computed on the spot. The audio path is not
    /// affected.
    pub fn calculate_coefficients(&self) -> BiquadCoefficients {
        let goals = self.params.values();
        calculate(goals.cutoff, goals.resonance, goals.shape, self.sample_rate)
    }

    /// Coefficients for arbitrary control values at this engine's sample rate. The values are
    /// clamped the same way parameter writes are.
    pub fn calculate_coefficients_for(
        &self,
        frequency: f32,
        resonance: f32,
        shape: FilterShape,
    ) -> BiquadCoefficients {
        calculate(
            ParameterId::Cutoff.clamp(frequency),
            ParameterId::Resonance.clamp(resonance),
            shape,
            self.sample_rate,
        )
    }

    /// Magnitude of the last committed filter at `normalized` frequency (`0.0` is DC, `1.0` is
    /// Nyquist).
    pub fn frequency_response_magnitude(&self, normalized: f64) -> f64 {
        self.coefficients.magnitude_at(normalized)
    }

    /// A handle for reading the committed coefficients from another thread.
    pub fn response_probe(&self) -> ResponseProbe {
        ResponseProbe::new(self.published.clone())
    }

    /// Filters `inputs` into `outputs`, one slice per channel.
    ///
    /// At most `frame_count` samples are processed per channel, fewer if any filtered input or
    /// output slice is shorter. Channels beyond the configured count are copied through
    /// unchanged. Outputs without a matching input are left alone and never filtered.
    pub fn process(&mut self, frame_count: usize, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        let filtered = self.states.len().min(inputs.len()).min(outputs.len());
        let frame_count = inputs[..filtered]
            .iter()
            .zip(outputs[..filtered].iter())
            .fold(frame_count, |len, (input, output)| {
                len.min(input.len()).min(output.len())
            });

        for (output, input) in outputs.iter_mut().zip(inputs) {
            let len = frame_count.min(input.len()).min(output.len());
            output[..len].copy_from_slice(&input[..len]);
        }

        self.process_in_place(frame_count, &mut outputs[..filtered]);
    }

    /// Filters `buffers` in place. When bypassed the buffers are left exactly as they are and
    /// neither the feedback state nor the coefficients change.
    pub fn process_in_place(&mut self, frame_count: usize, buffers: &mut [&mut [f32]]) {
        nih_debug_assert!(self.configured, "process called on an unconfigured filter");
        if self.bypassed {
            return;
        }

        self.retarget();

        let frame_count = buffers
            .iter()
            .take(self.states.len())
            .fold(frame_count, |len, buffer| len.min(buffer.len()));
        let update_interval = self.config.update_interval.max(1);

        for frame in 0..frame_count {
            let cutoff = self.cutoff.next();
            let resonance = self.resonance.next();
            if self.samples_until_update == 0 {
                self.coefficients =
                    calculate(cutoff, resonance, self.goals.shape, self.sample_rate);
                self.samples_until_update = update_interval;
            }
            self.samples_until_update -= 1;

            let coefficients = self.coefficients;
            for (state, buffer) in self.states.iter_mut().zip(buffers.iter_mut()) {
                let sample = &mut buffer[frame];
                *sample = state.tick(&coefficients, *sample);
            }
        }

        // Squelch any blowups once per block
        for state in self.states.iter_mut() {
            state.squelch();
        }

        self.published.publish(&self.coefficients, self.sample_rate);
    }

    /// Points the smoothers at any goals that changed since the last block.
    fn retarget(&mut self) {
        let goals = self.params.values();

        if goals.cutoff != self.goals.cutoff {
            self.cutoff.set_target(self.sample_rate, goals.cutoff);
        }
        if goals.resonance != self.goals.resonance {
            self.resonance.set_target(self.sample_rate, goals.resonance);
        }
        if goals.shape != self.goals.shape {
            // A new shape has to take effect on the next sample, not the next tick
            self.samples_until_update = 0;
        }

        self.goals = goals;
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
