use nih_plug::prelude::*;

use crate::biquad::FilterShape;
use crate::controls::{
    ParameterValues, DEFAULT_CUTOFF, DEFAULT_RESONANCE, DEFAULT_SHAPE, RESONANCE_RANGE,
};

/// Lowest cutoff the host control offers. The engine itself accepts anything down to 0 Hz.
pub const MIN_CUTOFF_HZ: f32 = 12.0;
pub const MAX_CUTOFF_HZ: f32 = 20_000.0;

#[derive(Params)]
pub struct BiquadFilterParams {
    #[id = "cutoff"]
    pub cutoff: FloatParam,
    #[id = "resonance"]
    pub resonance: FloatParam,
    #[id = "filter_type"]
    pub shape: EnumParam<FilterShape>,

    #[id = "bypass"]
    pub bypass: BoolParam,
}

impl BiquadFilterParams {
    /// The current host values as engine goals.
    pub fn values(&self) -> ParameterValues {
        ParameterValues {
            cutoff: self.cutoff.value(),
            resonance: self.resonance.value(),
            shape: self.shape.value(),
        }
    }
}

impl Default for BiquadFilterParams {
    fn default() -> Self {
        Self {
            // No smoothers here, the engine ramps cutoff and resonance itself
            cutoff: FloatParam::new(
                "Cutoff",
                DEFAULT_CUTOFF,
                FloatRange::Skewed {
                    min: MIN_CUTOFF_HZ,
                    max: MAX_CUTOFF_HZ,
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_unit(" Hz")
            .with_value_to_string(formatters::v2s_f32_rounded(0)),

            resonance: FloatParam::new(
                "Resonance",
                DEFAULT_RESONANCE,
                FloatRange::Skewed {
                    min: *RESONANCE_RANGE.start(),
                    max: *RESONANCE_RANGE.end(),
                    factor: FloatRange::skew_factor(-1.5),
                },
            )
            .with_value_to_string(formatters::v2s_f32_rounded(2)),

            shape: EnumParam::new("Filter Type", DEFAULT_SHAPE),

            bypass: BoolParam::new("Bypass", false).make_bypass(),
        }
    }
}
