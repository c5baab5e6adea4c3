use atomic_float::AtomicF32;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::biquad::FilterShape;

/// Cutoff values are clamped to this range (Hz) before they are stored.
pub const CUTOFF_RANGE: RangeInclusive<f32> = 0.0..=20_000.0;
/// Resonance values are clamped to this range before they are stored. The lower bound keeps the
/// bandwidth term finite and the peaking gain curve away from `ln(0)`.
pub const RESONANCE_RANGE: RangeInclusive<f32> = 0.1..=25.0;

pub const DEFAULT_CUTOFF: f32 = 1000.0;
pub const DEFAULT_RESONANCE: f32 = 0.707;
pub const DEFAULT_SHAPE: FilterShape = FilterShape::LowPass;

/// Addresses of the three controls the engine listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterId {
    Cutoff,
    Resonance,
    Shape,
}

impl ParameterId {
    pub const ALL: [ParameterId; 3] = [
        ParameterId::Cutoff,
        ParameterId::Resonance,
        ParameterId::Shape,
    ];

    pub fn from_address(address: u32) -> Option<Self> {
        match address {
            0 => Some(ParameterId::Cutoff),
            1 => Some(ParameterId::Resonance),
            2 => Some(ParameterId::Shape),
            _ => None,
        }
    }

    pub fn address(self) -> u32 {
        self as u32
    }

    /// Brings `value` into the stored domain of this parameter. Shape values are truncated onto
    /// a valid shape code.
    pub fn clamp(self, value: f32) -> f32 {
        match self {
            ParameterId::Cutoff => value.clamp(*CUTOFF_RANGE.start(), *CUTOFF_RANGE.end()),
            ParameterId::Resonance => {
                value.clamp(*RESONANCE_RANGE.start(), *RESONANCE_RANGE.end())
            }
            ParameterId::Shape => FilterShape::from_value(value).code() as f32,
        }
    }
}

/// One coherent read of all three controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterValues {
    pub cutoff: f32,
    pub resonance: f32,
    pub shape: FilterShape,
}

impl Default for ParameterValues {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
            resonance: DEFAULT_RESONANCE,
            shape: DEFAULT_SHAPE,
        }
    }
}

/// The goal values of the filter controls, shared between the control thread (writer) and the
/// render thread (reader).
///
/// Every field is its own relaxed atomic. A reader may see one field's update before another's,
/// but never a torn value inside a field, and neither side ever waits on the other.
#[derive(Debug)]
pub struct LiveParameters {
    cutoff: AtomicF32,
    resonance: AtomicF32,
    shape: AtomicU32,
}

impl LiveParameters {
    pub fn new(initial: ParameterValues) -> Self {
        Self {
            cutoff: AtomicF32::new(ParameterId::Cutoff.clamp(initial.cutoff)),
            resonance: AtomicF32::new(ParameterId::Resonance.clamp(initial.resonance)),
            shape: AtomicU32::new(initial.shape.code()),
        }
    }

    /// Clamps and stores a new goal value. NaN is ignored so a broken automation source can't
    /// poison the coefficient math.
    pub fn set(&self, id: ParameterId, value: f32) {
        if value.is_nan() {
            return;
        }

        let value = id.clamp(value);
        match id {
            ParameterId::Cutoff => self.cutoff.store(value, Ordering::Relaxed),
            ParameterId::Resonance => self.resonance.store(value, Ordering::Relaxed),
            ParameterId::Shape => self.shape.store(value as u32, Ordering::Relaxed),
        }
    }

    /// The stored goal value. Shapes are reported by their code.
    pub fn get(&self, id: ParameterId) -> f32 {
        match id {
            ParameterId::Cutoff => self.cutoff(),
            ParameterId::Resonance => self.resonance(),
            ParameterId::Shape => self.shape().code() as f32,
        }
    }

    pub fn set_shape(&self, shape: FilterShape) {
        self.shape.store(shape.code(), Ordering::Relaxed);
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff.load(Ordering::Relaxed)
    }

    pub fn resonance(&self) -> f32 {
        self.resonance.load(Ordering::Relaxed)
    }

    pub fn shape(&self) -> FilterShape {
        FilterShape::from_code(self.shape.load(Ordering::Relaxed))
    }

    pub fn values(&self) -> ParameterValues {
        ParameterValues {
            cutoff: self.cutoff(),
            resonance: self.resonance(),
            shape: self.shape(),
        }
    }
}

impl Default for LiveParameters {
    fn default() -> Self {
        Self::new(ParameterValues::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn addresses_round_trip() {
        for id in ParameterId::ALL {
            assert_eq!(ParameterId::from_address(id.address()), Some(id));
        }
        assert_eq!(ParameterId::from_address(3), None);
    }

    #[test]
    fn set_clamps_before_storing() {
        let params = LiveParameters::default();

        params.set(ParameterId::Cutoff, 30_000.0);
        assert_eq!(params.get(ParameterId::Cutoff), 20_000.0);
        params.set(ParameterId::Cutoff, -5.0);
        assert_eq!(params.get(ParameterId::Cutoff), 0.0);

        params.set(ParameterId::Resonance, 0.0);
        assert_eq!(params.get(ParameterId::Resonance), 0.1);
        params.set(ParameterId::Resonance, f32::INFINITY);
        assert_eq!(params.get(ParameterId::Resonance), 25.0);

        params.set(ParameterId::Shape, 4.0);
        assert_eq!(params.shape(), FilterShape::Notch);
        params.set(ParameterId::Shape, 17.0);
        assert_eq!(params.shape(), FilterShape::Passthrough);
        assert_eq!(params.get(ParameterId::Shape), 0.0);
    }

    #[test]
    fn nan_writes_are_ignored() {
        let params = LiveParameters::default();
        params.set(ParameterId::Cutoff, 440.0);
        params.set(ParameterId::Cutoff, f32::NAN);
        params.set(ParameterId::Resonance, f32::NAN);
        assert_eq!(params.cutoff(), 440.0);
        assert_eq!(params.resonance(), DEFAULT_RESONANCE);
    }

    #[test]
    fn initial_values_are_clamped() {
        let params = LiveParameters::new(ParameterValues {
            cutoff: 50_000.0,
            resonance: 20_000.0,
            shape: FilterShape::BandPass,
        });
        assert_eq!(
            params.values(),
            ParameterValues {
                cutoff: 20_000.0,
                resonance: 25.0,
                shape: FilterShape::BandPass,
            }
        );
    }

    #[test]
    fn writes_from_another_thread_become_visible() {
        let params = Arc::new(LiveParameters::default());
        let writer = {
            let params = params.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    params.set(ParameterId::Cutoff, i as f32);
                }
                params.set_shape(FilterShape::HighPass);
            })
        };

        // Every value the reader sees must be one the writer stored
        for _ in 0..1000 {
            let cutoff = params.cutoff();
            assert!(cutoff == DEFAULT_CUTOFF || (cutoff.fract() == 0.0 && cutoff < 1000.0));
        }

        writer.join().unwrap();
        assert_eq!(params.cutoff(), 999.0);
        assert_eq!(params.shape(), FilterShape::HighPass);
    }
}
