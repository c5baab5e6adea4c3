//! Second-order section coefficient design (bilinear-transform cookbook form).
//!
//! Every shape is driven by the same three controls: frequency, resonance and
//! shape. For [`FilterShape::PeakingEq`] the resonance control also sets the
//! boost, see [`peaking_gain_db`].

use nih_plug::prelude::Enum;
use std::f64::consts::PI;

/// The filter response selected by the shape parameter. Declaration order defines the codes
/// used by the host parameter and by [`FilterShape::from_code`].
#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterShape {
    #[id = "passthrough"]
    #[name = "PassThrough"]
    Passthrough,
    #[id = "lowpass"]
    #[name = "LowPass"]
    LowPass,
    #[id = "highpass"]
    #[name = "HighPass"]
    HighPass,
    #[id = "bandpass"]
    #[name = "BandPass"]
    BandPass,
    #[id = "notch"]
    #[name = "Notch"]
    Notch,
    #[id = "peaking_eq"]
    #[name = "PeakingEQ"]
    PeakingEq,
}

impl FilterShape {
    pub const ALL: [FilterShape; 6] = [
        FilterShape::Passthrough,
        FilterShape::LowPass,
        FilterShape::HighPass,
        FilterShape::BandPass,
        FilterShape::Notch,
        FilterShape::PeakingEq,
    ];

    /// Unknown codes fall back to [`FilterShape::Passthrough`] so a malformed control value can
    /// never leave the coefficients undefined.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => FilterShape::LowPass,
            2 => FilterShape::HighPass,
            3 => FilterShape::BandPass,
            4 => FilterShape::Notch,
            5 => FilterShape::PeakingEq,
            _ => FilterShape::Passthrough,
        }
    }

    /// Maps a real-valued parameter value onto a shape by truncation. Negative and non-finite
    /// values select [`FilterShape::Passthrough`].
    pub fn from_value(value: f32) -> Self {
        if value.is_finite() && value >= 0.0 {
            Self::from_code(value as u32)
        } else {
            FilterShape::Passthrough
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        Self::variants()[self.to_index()]
    }
}

/// Boost in decibels the peaking shape derives from the resonance control.
///
/// This is a loose logarithmic fit that maps the resonance range `0.1..=25` onto roughly
/// `-50..=50` dB so that one knob can drive both the sharpness of the other shapes and the gain
/// of the peak. It is deliberately approximate: unity gain lands near a resonance of `1.58`,
/// not `1.0`.
pub fn peaking_gain_db(resonance: f64) -> f64 {
    18.1 * resonance.ln() - 8.33
}

/// Recursion coefficients with the leading feedback coefficient normalized to one, so that
///
/// `y0 = b0·x0 + b1·x1 + b2·x2 − a1·y1 − a2·y2`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoefficients {
    /// The identity filter.
    pub const PASSTHROUGH: BiquadCoefficients = BiquadCoefficients {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    pub fn is_finite(&self) -> bool {
        self.b0.is_finite()
            && self.b1.is_finite()
            && self.b2.is_finite()
            && self.a1.is_finite()
            && self.a2.is_finite()
    }

    /// Magnitude of the transfer function at `normalized` frequency, where `0.0` is DC and
    /// `1.0` is Nyquist.
    pub fn magnitude_at(&self, normalized: f64) -> f64 {
        let (z_imag, z_real) = (PI * normalized).sin_cos();
        self.magnitude_on_unit_circle(z_real, z_imag)
    }

    /// Magnitude at the frequency `frequency_hz` for a stream running at `sample_rate`.
    pub fn magnitude_at_hz(&self, frequency_hz: f32, sample_rate: f32) -> f64 {
        self.magnitude_at(frequency_hz as f64 / (0.5 * sample_rate as f64))
    }

    /// Evaluates `|b0·z² + b1·z + b2| / |z² + a1·z + a2|` at `z = z_real + j·z_imag`.
    pub(crate) fn magnitude_on_unit_circle(&self, z_real: f64, z_imag: f64) -> f64 {
        let b0 = self.b0 as f64;
        let b1 = self.b1 as f64;
        let b2 = self.b2 as f64;
        let a1 = self.a1 as f64;
        let a2 = self.a2 as f64;

        let z2_real = z_real * z_real - z_imag * z_imag;
        let z2_imag = 2.0 * z_real * z_imag;

        // Zeros
        let numerator_real = b0 * z2_real + b1 * z_real + b2;
        let numerator_imag = b0 * z2_imag + b1 * z_imag;

        // Poles
        let denominator_real = z2_real + a1 * z_real + a2;
        let denominator_imag = z2_imag + a1 * z_imag;

        numerator_real.hypot(numerator_imag) / denominator_real.hypot(denominator_imag)
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::PASSTHROUGH
    }
}

/// The cookbook design before normalization, kept in double precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadDesign {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadDesign {
    const PASSTHROUGH: BiquadDesign = BiquadDesign {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Designs the section for `shape` at `frequency` Hz.
    ///
    /// `resonance` must be positive and `frequency` should stay below `sample_rate / 2`. Past
    /// Nyquist the angular frequency folds back over π. Keeping both in range is up to the
    /// caller; [`crate::controls::LiveParameters`] clamps the resonance for you.
    pub fn new(frequency: f32, resonance: f32, shape: FilterShape, sample_rate: f32) -> Self {
        let resonance = resonance as f64;
        let omega = 2.0 * PI * frequency as f64 / sample_rate as f64;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * resonance);

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        match shape {
            FilterShape::Passthrough => Self::PASSTHROUGH,
            FilterShape::LowPass => {
                let b1 = 1.0 - cos_omega;
                BiquadDesign { b0: b1 / 2.0, b1, b2: b1 / 2.0, a0, a1, a2 }
            }
            FilterShape::HighPass => {
                let b0 = (1.0 + cos_omega) / 2.0;
                BiquadDesign { b0, b1: -(1.0 + cos_omega), b2: b0, a0, a1, a2 }
            }
            FilterShape::BandPass => BiquadDesign { b0: alpha, b1: 0.0, b2: -alpha, a0, a1, a2 },
            FilterShape::Notch => BiquadDesign { b0: 1.0, b1: a1, b2: 1.0, a0, a1, a2 },
            FilterShape::PeakingEq => {
                let a = 10.0_f64.powf(peaking_gain_db(resonance) / 40.0);
                BiquadDesign {
                    b0: 1.0 + alpha * a,
                    b1: a1,
                    b2: 1.0 - alpha * a,
                    a0: 1.0 + alpha / a,
                    a1,
                    a2: 1.0 - alpha / a,
                }
            }
        }
    }

    /// Divides everything by `a0` and narrows to single precision.
    pub fn normalize(&self) -> BiquadCoefficients {
        BiquadCoefficients {
            b0: (self.b0 / self.a0) as f32,
            b1: (self.b1 / self.a0) as f32,
            b2: (self.b2 / self.a0) as f32,
            a1: (self.a1 / self.a0) as f32,
            a2: (self.a2 / self.a0) as f32,
        }
    }
}

/// Computes the normalized coefficients for one set of control values. Never fails.
pub fn calculate(
    frequency: f32,
    resonance: f32,
    shape: FilterShape,
    sample_rate: f32,
) -> BiquadCoefficients {
    BiquadDesign::new(frequency, resonance, shape, sample_rate).normalize()
}
