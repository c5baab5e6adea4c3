use nih_plug::prelude::*;
use std::sync::Arc;

pub mod biquad;
pub mod controls;
pub mod engine;
pub mod params;
pub mod response;

pub use crate::biquad::{calculate, BiquadCoefficients, BiquadDesign, FilterShape};
pub use controls::{LiveParameters, ParameterId, ParameterValues};
pub use engine::{ChannelState, EngineConfig, EngineError, EngineState, FilterEngine};
pub use response::{ResponseCurve, ResponseProbe};

use params::BiquadFilterParams;

/// The cutoff handed to the engine never exceeds this fraction of the sample rate, so the
/// design frequency can't fold over Nyquist at low sample rates.
const MAX_CUTOFF_RATIO: f32 = 0.49;

/// A resonant biquad filter with six shapes.
///
/// This is only the host-facing shell. All of the signal processing lives in [`FilterEngine`],
/// which this plugin feeds with the host's parameter values once per block.
pub struct BiquadFilter {
    params: Arc<BiquadFilterParams>,

    /// The engine's control store. Written here on the audio thread, read by the engine.
    live: Arc<LiveParameters>,
    engine: FilterEngine,
}

impl Default for BiquadFilter {
    fn default() -> Self {
        let params = Arc::new(BiquadFilterParams::default());
        let live = Arc::new(LiveParameters::new(params.values()));
        let engine = FilterEngine::with_parameters(EngineConfig::default(), live.clone());

        Self {
            params,
            live,
            engine,
        }
    }
}

impl BiquadFilter {
    /// A handle for drawing the response curve from outside the audio thread.
    pub fn response_probe(&self) -> ResponseProbe {
        self.engine.response_probe()
    }

    /// Copies the host's values into the engine's control store.
    fn sync_parameters(&mut self, sample_rate: f32) {
        self.live.set(
            ParameterId::Cutoff,
            limit_cutoff(self.params.cutoff.value(), sample_rate),
        );
        self.live
            .set(ParameterId::Resonance, self.params.resonance.value());
        self.live.set_shape(self.params.shape.value());
        self.engine.set_bypass(self.params.bypass.value());
    }
}

fn limit_cutoff(cutoff: f32, sample_rate: f32) -> f32 {
    cutoff.min(sample_rate * MAX_CUTOFF_RATIO)
}

impl Plugin for BiquadFilter {
    const NAME: &'static str = "Biquad Filter";
    const VENDOR: &'static str = "Kakeru3";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";

    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            ..AudioIOLayout::const_default()
        },
    ];

    const SAMPLE_ACCURATE_AUTOMATION: bool = true;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let channel_count = audio_io_layout
            .main_output_channels
            .map(NonZeroU32::get)
            .unwrap_or(0) as usize;

        // The engine settles on whatever the control store holds when it's configured
        self.sync_parameters(buffer_config.sample_rate);

        match self.engine.configure(channel_count, buffer_config.sample_rate) {
            Ok(()) => true,
            Err(err) => {
                nih_error!("Failed to initialize the filter: {}", err);
                false
            }
        }
    }

    fn reset(&mut self) {
        self.engine.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        self.sync_parameters(self.engine.sample_rate());

        let frame_count = buffer.samples();
        self.engine.process_in_place(frame_count, buffer.as_slice());

        ProcessStatus::Normal
    }
}

impl ClapPlugin for BiquadFilter {
    const CLAP_ID: &'static str = "com.kakeru3.biquad-filter";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A resonant low/high/band-pass, notch and peaking filter");
    const CLAP_MANUAL_URL: Option<&'static str> = Some(Self::URL);
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Filter,
        ClapFeature::Stereo,
        ClapFeature::Mono,
    ];
}

impl Vst3Plugin for BiquadFilter {
    const VST3_CLASS_ID: [u8; 16] = *b"BiquadFiltrKkr3!";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Filter];
}

nih_export_clap!(BiquadFilter);
nih_export_vst3!(BiquadFilter);
