//! Magnitude response queries for non-real-time readers such as an editor drawing the filter
//! curve.
//!
//! The render thread publishes the coefficients it last used into [`SharedCoefficients`] once
//! per block. Readers get a [`ResponseProbe`] and always observe a complete coefficient set,
//! possibly one block old.

use atomic_float::AtomicF32;
use std::f64::consts::PI;
use std::sync::atomic::{fence, AtomicU32, Ordering};
use std::sync::Arc;

use crate::biquad::BiquadCoefficients;

/// Number of points in a [`ResponseCurve`] when nothing else is asked for.
pub const DEFAULT_CURVE_POINTS: usize = 64;

/// A coefficient set plus the sample rate it was designed for, guarded by a sequence counter.
///
/// There must only ever be one writer. The writer never waits; readers retry when they raced a
/// write, so they always get all five coefficients from the same publication.
#[derive(Debug)]
pub struct SharedCoefficients {
    sequence: AtomicU32,
    b0: AtomicF32,
    b1: AtomicF32,
    b2: AtomicF32,
    a1: AtomicF32,
    a2: AtomicF32,
    sample_rate: AtomicF32,
}

impl SharedCoefficients {
    pub fn new(coefficients: BiquadCoefficients, sample_rate: f32) -> Self {
        Self {
            sequence: AtomicU32::new(0),
            b0: AtomicF32::new(coefficients.b0),
            b1: AtomicF32::new(coefficients.b1),
            b2: AtomicF32::new(coefficients.b2),
            a1: AtomicF32::new(coefficients.a1),
            a2: AtomicF32::new(coefficients.a2),
            sample_rate: AtomicF32::new(sample_rate),
        }
    }

    /// Called by the single writer. Wait-free.
    pub(crate) fn publish(&self, coefficients: &BiquadCoefficients, sample_rate: f32) {
        let sequence = self.sequence.load(Ordering::Relaxed);
        self.sequence
            .store(sequence.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.b0.store(coefficients.b0, Ordering::Relaxed);
        self.b1.store(coefficients.b1, Ordering::Relaxed);
        self.b2.store(coefficients.b2, Ordering::Relaxed);
        self.a1.store(coefficients.a1, Ordering::Relaxed);
        self.a2.store(coefficients.a2, Ordering::Relaxed);
        self.sample_rate.store(sample_rate, Ordering::Relaxed);

        self.sequence
            .store(sequence.wrapping_add(2), Ordering::Release);
    }

    /// Returns the last complete publication.
    pub fn load(&self) -> (BiquadCoefficients, f32) {
        loop {
            let before = self.sequence.load(Ordering::Acquire);
            if before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let coefficients = BiquadCoefficients {
                b0: self.b0.load(Ordering::Relaxed),
                b1: self.b1.load(Ordering::Relaxed),
                b2: self.b2.load(Ordering::Relaxed),
                a1: self.a1.load(Ordering::Relaxed),
                a2: self.a2.load(Ordering::Relaxed),
            };
            let sample_rate = self.sample_rate.load(Ordering::Relaxed);

            fence(Ordering::Acquire);
            if self.sequence.load(Ordering::Relaxed) == before {
                return (coefficients, sample_rate);
            }
            std::hint::spin_loop();
        }
    }
}

/// A cloneable read handle on the coefficients an engine last committed.
#[derive(Debug, Clone)]
pub struct ResponseProbe {
    shared: Arc<SharedCoefficients>,
}

impl ResponseProbe {
    pub(crate) fn new(shared: Arc<SharedCoefficients>) -> Self {
        Self { shared }
    }

    pub fn coefficients(&self) -> BiquadCoefficients {
        self.shared.load().0
    }

    pub fn sample_rate(&self) -> f32 {
        self.shared.load().1
    }

    /// `normalized` runs from `0.0` (DC) to `1.0` (Nyquist).
    pub fn magnitude_at(&self, normalized: f64) -> f64 {
        self.coefficients().magnitude_at(normalized)
    }

    pub fn magnitude_at_hz(&self, frequency_hz: f32) -> f64 {
        let (coefficients, sample_rate) = self.shared.load();
        coefficients.magnitude_at_hz(frequency_hz, sample_rate)
    }

    /// Element-wise magnitudes for a list of frequencies in Hz, all taken from one snapshot.
    pub fn magnitudes_for_hz(&self, frequencies_hz: &[f32]) -> Vec<f32> {
        let mut magnitudes = vec![0.0; frequencies_hz.len()];
        self.magnitudes_into(frequencies_hz, &mut magnitudes);
        magnitudes
    }

    /// Like [`Self::magnitudes_for_hz`] but writes into `magnitudes`. Only the overlapping prefix
    /// of the two slices is touched.
    pub fn magnitudes_into(&self, frequencies_hz: &[f32], magnitudes: &mut [f32]) {
        let (coefficients, sample_rate) = self.shared.load();
        for (magnitude, &frequency_hz) in magnitudes.iter_mut().zip(frequencies_hz) {
            *magnitude = coefficients.magnitude_at_hz(frequency_hz, sample_rate) as f32;
        }
    }

    pub fn curve(&self, curve: &ResponseCurve) -> Vec<f32> {
        curve.response(&self.coefficients())
    }
}

/// An evenly spaced grid of normalized frequencies from DC to Nyquist with the matching points
/// on the unit circle precomputed, for redrawing a response curve cheaply.
#[derive(Debug, Clone)]
pub struct ResponseCurve {
    ramp: Vec<f32>,
    reals: Vec<f64>,
    imaginaries: Vec<f64>,
}

impl ResponseCurve {
    pub fn new(point_count: usize) -> Self {
        let step = if point_count > 1 {
            1.0 / (point_count - 1) as f64
        } else {
            0.0
        };

        let ramp: Vec<f64> = (0..point_count).map(|i| i as f64 * step).collect();
        let (imaginaries, reals): (Vec<f64>, Vec<f64>) =
            ramp.iter().map(|f| (PI * f).sin_cos()).unzip();

        Self {
            ramp: ramp.iter().map(|&f| f as f32).collect(),
            reals,
            imaginaries,
        }
    }

    pub fn len(&self) -> usize {
        self.ramp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ramp.is_empty()
    }

    /// The normalized frequencies of the grid.
    pub fn ramp(&self) -> &[f32] {
        &self.ramp
    }

    /// The frequency of point `index` in Hz, or `None` if the grid is shorter than that.
    pub fn frequency_hz(&self, index: usize, sample_rate: f32) -> Option<f32> {
        self.ramp.get(index).map(|f| f * sample_rate / 2.0)
    }

    pub fn response(&self, coefficients: &BiquadCoefficients) -> Vec<f32> {
        let mut magnitudes = vec![0.0; self.len()];
        self.response_into(coefficients, &mut magnitudes);
        magnitudes
    }

    pub fn response_into(&self, coefficients: &BiquadCoefficients, magnitudes: &mut [f32]) {
        for ((magnitude, &real), &imaginary) in
            magnitudes.iter_mut().zip(&self.reals).zip(&self.imaginaries)
        {
            *magnitude = coefficients.magnitude_on_unit_circle(real, imaginary) as f32;
        }
    }
}

impl Default for ResponseCurve {
    fn default() -> Self {
        Self::new(DEFAULT_CURVE_POINTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biquad::{calculate, FilterShape};
    use std::thread;

    #[test]
    fn load_returns_the_latest_publication() {
        let shared = SharedCoefficients::new(BiquadCoefficients::PASSTHROUGH, 44100.0);
        assert_eq!(shared.load(), (BiquadCoefficients::PASSTHROUGH, 44100.0));

        let lowpass = calculate(500.0, 0.707, FilterShape::LowPass, 48000.0);
        shared.publish(&lowpass, 48000.0);
        assert_eq!(shared.load(), (lowpass, 48000.0));
    }

    #[test]
    fn readers_never_see_a_mixed_snapshot() {
        let shared = Arc::new(SharedCoefficients::new(BiquadCoefficients::PASSTHROUGH, 1.0));

        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for i in 1..=20_000u32 {
                    let v = i as f32;
                    let coefficients = BiquadCoefficients {
                        b0: v,
                        b1: v,
                        b2: v,
                        a1: v,
                        a2: v,
                    };
                    shared.publish(&coefficients, v);
                }
            })
        };

        for _ in 0..20_000 {
            let (c, sample_rate) = shared.load();
            if c == BiquadCoefficients::PASSTHROUGH {
                assert_eq!(sample_rate, 1.0);
                continue;
            }
            assert!(c.b1 == c.b0 && c.b2 == c.b0 && c.a1 == c.b0 && c.a2 == c.b0);
            assert_eq!(sample_rate, c.b0);
        }

        writer.join().unwrap();
        assert_eq!(shared.load().1, 20_000.0);
    }

    #[test]
    fn curve_matches_pointwise_evaluation() {
        let curve = ResponseCurve::default();
        assert_eq!(curve.len(), DEFAULT_CURVE_POINTS);
        assert_eq!(curve.ramp()[0], 0.0);
        assert_eq!(*curve.ramp().last().unwrap(), 1.0);

        let coefficients = calculate(2500.0, 3.0, FilterShape::BandPass, 44100.0);
        let response = curve.response(&coefficients);
        for (&f, &magnitude) in curve.ramp().iter().zip(&response) {
            let expected = coefficients.magnitude_at(f as f64) as f32;
            assert!((magnitude - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn curve_points_map_to_hertz() {
        let curve = ResponseCurve::new(5);
        assert_eq!(curve.ramp(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(curve.frequency_hz(2, 48000.0), Some(12000.0));
        assert_eq!(curve.frequency_hz(4, 48000.0), Some(24000.0));
        assert_eq!(curve.frequency_hz(5, 48000.0), None);

        assert!(ResponseCurve::new(0).is_empty());
        assert_eq!(ResponseCurve::new(1).ramp(), &[0.0]);
    }

    #[test]
    fn probe_uses_the_published_sample_rate() {
        let shared = Arc::new(SharedCoefficients::new(BiquadCoefficients::PASSTHROUGH, 44100.0));
        let probe = ResponseProbe::new(shared.clone());
        assert_eq!(probe.magnitudes_for_hz(&[0.0, 1000.0, 20000.0]), vec![1.0, 1.0, 1.0]);

        let notch = calculate(1000.0, 25.0, FilterShape::Notch, 44100.0);
        shared.publish(&notch, 44100.0);

        let magnitudes = probe.magnitudes_for_hz(&[1000.0, 100.0]);
        assert!(magnitudes[0] < 1e-2);
        assert!((magnitudes[1] - 1.0).abs() < 1e-2);
        assert_eq!(probe.coefficients(), notch);
        assert_eq!(probe.sample_rate(), 44100.0);

        let mut short = [0.0; 1];
        probe.magnitudes_into(&[100.0, 1000.0], &mut short);
        assert!((short[0] - 1.0).abs() < 1e-2);
    }
}
