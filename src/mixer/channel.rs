// Channel graph - the per-track effect chain
//
// Signal order for every frame:
//
//   sources ─┬─> input ──> pre-gain ─> waveshaper ─> post-gain ─> lowpass ─> gate ─> volume ─> out
//            │     │ ▲
//            │     │ └── delay line ─> feedback gain ──┐
//            │     │ └── reverb send ─> convolver ─────┤ (summed into input)
//            │     └───────────────────────────────────┘
//
// The delay and reverb paths are feedback loops: their outputs for the
// current frame depend only on earlier input, so they are read before the
// input is formed and written after.
//
// Every numeric parameter glides to its target with PARAM_SMOOTHING_MS.

use std::sync::Arc;

use crate::audio::buffer::StereoFrame;
use crate::audio::dsp_utils::{OnePoleSmoother, PARAM_SMOOTHING_MS};
use crate::audio::parameters::PeakMeter;
use crate::audio::render::RENDER_QUANTUM;
use crate::mixer::params::MixerParams;
use crate::synth::delay::{DelayParams, FeedbackDelay};
use crate::synth::distortion::{Waveshaper, post_gain, pre_gain};
use crate::synth::dynamics::NoiseGate;
use crate::synth::filter::{Biquad, FilterParams};
use crate::synth::reverb::{Convolver, ImpulseResponse};

// Bound on the channel input so feedback loops cannot run away
const INPUT_LIMIT: f32 = 4.0;

pub struct ChannelGraph {
    sample_rate: f32,
    params: MixerParams,
    input: Vec<StereoFrame>,
    delay: FeedbackDelay,
    reverb: Convolver,
    reverb_send: OnePoleSmoother,
    shaper: Waveshaper,
    pre_gain: OnePoleSmoother,
    post_gain: OnePoleSmoother,
    cutoff: OnePoleSmoother,
    lowpass: [Biquad; 2],
    gate: NoiseGate,
    volume: OnePoleSmoother,
    meter: PeakMeter,
}

impl ChannelGraph {
    /// Build a graph with `params` applied immediately (no glide)
    pub fn new(sample_rate: u32, impulse: Arc<ImpulseResponse>, params: &MixerParams) -> Self {
        let sr = sample_rate as f32;
        let p = params.clamped();
        let smoother = |value: f32| OnePoleSmoother::new(value, PARAM_SMOOTHING_MS, sr);

        Self {
            sample_rate: sr,
            params: p,
            input: vec![StereoFrame::SILENCE; RENDER_QUANTUM],
            delay: FeedbackDelay::new(
                DelayParams {
                    time_sec: p.delay_time_sec,
                    feedback: p.delay_feedback,
                },
                sr,
            ),
            reverb: Convolver::new(impulse),
            reverb_send: smoother(p.reverb_send),
            shaper: Waveshaper::new(p.distortion_drive),
            pre_gain: smoother(pre_gain(p.distortion_drive)),
            post_gain: smoother(post_gain(p.distortion_drive)),
            cutoff: smoother(p.lowpass_cutoff_hz),
            lowpass: [
                Biquad::new(FilterParams::lowpass(p.lowpass_cutoff_hz), sr),
                Biquad::new(FilterParams::lowpass(p.lowpass_cutoff_hz), sr),
            ],
            gate: NoiseGate::new(p.noise_gate_threshold_db, sr),
            volume: smoother(p.volume),
            meter: PeakMeter::new(),
        }
    }

    /// Update the targets in place; the running signal glides to them
    pub fn apply_params(&mut self, params: &MixerParams) {
        let p = params.clamped();
        self.params = p;
        self.delay.set_params(DelayParams {
            time_sec: p.delay_time_sec,
            feedback: p.delay_feedback,
        });
        self.shaper.set_drive(p.distortion_drive);
        self.gate.set_threshold(p.noise_gate_threshold_db);
    }

    /// Update the targets and jump straight to them
    pub fn set_params_immediate(&mut self, params: &MixerParams) {
        self.apply_params(params);
        let p = self.params;
        self.delay.set_params_immediate(DelayParams {
            time_sec: p.delay_time_sec,
            feedback: p.delay_feedback,
        });
        self.reverb_send.reset(p.reverb_send);
        self.pre_gain.reset(pre_gain(p.distortion_drive));
        self.post_gain.reset(post_gain(p.distortion_drive));
        self.cutoff.reset(p.lowpass_cutoff_hz);
        for filter in &mut self.lowpass {
            filter.set_cutoff(p.lowpass_cutoff_hz);
        }
        self.gate.set_threshold_immediate(p.noise_gate_threshold_db);
        self.volume.reset(p.volume);
    }

    /// Currently applied (clamped) parameters
    pub fn params(&self) -> MixerParams {
        self.params
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Level tap after the track gain
    pub fn meter(&self) -> PeakMeter {
        self.meter.clone()
    }

    /// Entry point for sources during the current render quantum
    pub fn input_mut(&mut self) -> &mut [StereoFrame] {
        &mut self.input
    }

    pub fn clear_input(&mut self) {
        self.input.fill(StereoFrame::SILENCE);
    }

    /// Run one frame of source signal through the chain
    #[inline]
    pub fn process_frame(&mut self, source: StereoFrame) -> StereoFrame {
        let p = self.params;

        let input = (source + self.delay.tap() + self.reverb.output())
            .map(|s| s.clamp(-INPUT_LIMIT, INPUT_LIMIT));
        self.delay.write(input);
        let send = self.reverb_send.process(p.reverb_send);
        self.reverb.push(input * send);

        let pre = self.pre_gain.process(pre_gain(p.distortion_drive));
        let post = self.post_gain.process(post_gain(p.distortion_drive));
        let shaped = input.map(|s| self.shaper.shape(s * pre) * post);

        let cutoff = self.cutoff.process(p.lowpass_cutoff_hz);
        let [left, right] = &mut self.lowpass;
        left.set_cutoff(cutoff);
        right.set_cutoff(cutoff);
        let filtered = StereoFrame::new(left.process(shaped.left), right.process(shaped.right));

        let gated = self.gate.process(filtered);
        gated * self.volume.process(p.volume)
    }

    /// Process the accumulated input block and mix the result into `out`
    pub fn process_block(&mut self, out: &mut [StereoFrame]) {
        let frames = out.len().min(self.input.len());
        let mut peak = 0.0f32;
        for i in 0..frames {
            let source = self.input[i];
            let frame = self.process_frame(source);
            peak = peak.max(frame.peak());
            out[i] += frame;
        }
        self.meter.update(peak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::noise::NoiseGenerator;

    const SAMPLE_RATE: u32 = 44100;

    fn impulse() -> Arc<ImpulseResponse> {
        let mut noise = NoiseGenerator::seeded(5);
        Arc::new(ImpulseResponse::generate(SAMPLE_RATE, 0.2, 0.5, &mut noise))
    }

    fn run(graph: &mut ChannelGraph, input: &[StereoFrame]) -> Vec<StereoFrame> {
        input.iter().map(|&x| graph.process_frame(x)).collect()
    }

    fn sine(frames: usize, amplitude: f32) -> Vec<StereoFrame> {
        (0..frames)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                StereoFrame::mono(amplitude * (2.0 * std::f32::consts::PI * 220.0 * t).sin())
            })
            .collect()
    }

    #[test]
    fn test_default_graph_is_transparent() {
        let mut graph = ChannelGraph::new(SAMPLE_RATE, impulse(), &MixerParams::default());
        let input = sine(4410, 0.5);
        let output = run(&mut graph, &input);
        for (x, y) in input.iter().zip(&output).skip(1000) {
            assert!((x.left - y.left).abs() < 1e-3, "x {} y {}", x.left, y.left);
        }
    }

    #[test]
    fn test_applied_params_read_back_clamped() {
        let mut graph = ChannelGraph::new(SAMPLE_RATE, impulse(), &MixerParams::default());
        graph.apply_params(&MixerParams {
            volume: 4.0,
            delay_feedback: 2.0,
            lowpass_cutoff_hz: 1.0,
            noise_gate_threshold_db: -300.0,
            ..MixerParams::default()
        });
        let params = graph.params();
        assert_eq!(params.volume, 1.0);
        assert_eq!(params.delay_feedback, 0.95);
        assert_eq!(params.lowpass_cutoff_hz, 50.0);
        assert_eq!(params.noise_gate_threshold_db, -100.0);
    }

    #[test]
    fn test_volume_change_is_smoothed() {
        let mut graph = ChannelGraph::new(SAMPLE_RATE, impulse(), &MixerParams::default());
        let dc = vec![StereoFrame::mono(0.5); 2000];
        run(&mut graph, &dc);

        graph.apply_params(&MixerParams {
            volume: 0.0,
            ..MixerParams::default()
        });
        let output = run(&mut graph, &dc[..10]);
        // First frame after the change is still close to the old level
        assert!(output[0].left > 0.45, "jumped to {}", output[0].left);
        assert!(output[9].left < output[0].left);
    }

    #[test]
    fn test_delay_feedback_produces_echo() {
        let params = MixerParams {
            delay_time_sec: 0.1,
            delay_feedback: 0.5,
            ..MixerParams::default()
        };
        let mut graph = ChannelGraph::new(SAMPLE_RATE, impulse(), &params);
        let mut input = vec![StereoFrame::SILENCE; 13230];
        input[0] = StereoFrame::mono(1.0);
        let output = run(&mut graph, &input);

        let echo = output[4410].left;
        assert!((echo - 0.5).abs() < 0.05, "echo {}", echo);
        assert!(output[2205].left.abs() < 1e-3);
    }

    #[test]
    fn test_reverb_send_adds_tail() {
        let dry_params = MixerParams::default();
        let wet_params = MixerParams {
            reverb_send: 1.0,
            ..MixerParams::default()
        };
        let mut dry = ChannelGraph::new(SAMPLE_RATE, impulse(), &dry_params);
        let mut wet = ChannelGraph::new(SAMPLE_RATE, impulse(), &wet_params);

        let mut input = vec![StereoFrame::SILENCE; 8820];
        input[0] = StereoFrame::mono(1.0);
        let tail = |out: &[StereoFrame]| out[1000..].iter().map(|f| f.left.abs()).sum::<f32>();

        assert!(tail(&run(&mut dry, &input)) < 1e-6);
        assert!(tail(&run(&mut wet, &input)) > 0.01);
    }

    #[test]
    fn test_lowpass_darkens_noise() {
        let params = MixerParams {
            lowpass_cutoff_hz: 200.0,
            ..MixerParams::default()
        };
        let mut graph = ChannelGraph::new(SAMPLE_RATE, impulse(), &params);
        let mut noise = NoiseGenerator::seeded(8);
        let input: Vec<StereoFrame> = noise.buffer(8820).into_iter().map(StereoFrame::mono).collect();
        let output = run(&mut graph, &input);

        let power = |s: &[StereoFrame]| s.iter().map(|f| f.left * f.left).sum::<f32>();
        assert!(power(&output) < power(&input) * 0.1);
    }

    #[test]
    fn test_process_block_feeds_meter() {
        let mut graph = ChannelGraph::new(SAMPLE_RATE, impulse(), &MixerParams::default());
        let meter = graph.meter();
        graph.input_mut().fill(StereoFrame::mono(0.25));

        let mut out = vec![StereoFrame::SILENCE; RENDER_QUANTUM];
        graph.process_block(&mut out);
        assert!(meter.level() > 0.2);
        assert!(out.iter().skip(64).all(|f| (f.left - 0.25).abs() < 0.01));

        graph.clear_input();
        assert!(graph.input_mut().iter().all(|f| f.peak() == 0.0));
    }

    #[test]
    fn test_uses_shared_impulse() {
        let shared = impulse();
        let _a = ChannelGraph::new(SAMPLE_RATE, shared.clone(), &MixerParams::default());
        let _b = ChannelGraph::new(SAMPLE_RATE, shared.clone(), &MixerParams::default());
        assert_eq!(Arc::strong_count(&shared), 3);
    }
}
