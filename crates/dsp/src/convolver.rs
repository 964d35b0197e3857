//! Uniform partitioned convolution for the reverb.
//!
//! The impulse response is split into `PARTITION_SIZE` blocks held as
//! spectra; each completed input block is convolved against every
//! partition through a frequency-domain delay line, with overlap-add
//! reassembly. Per-frame cost stays flat regardless of tail length, at
//! the price of one partition of latency.

use std::sync::Arc;

use rand::Rng;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

/// Block size in frames. FFTs run at twice this length.
pub const PARTITION_SIZE: usize = 512;

const FFT_SIZE: usize = PARTITION_SIZE * 2;
const SPECTRUM_LEN: usize = FFT_SIZE / 2 + 1;

/// Uniform noise shaped by a quadratic decay `(1 - t/len)^2`, the
/// synthetic room tail the reverb convolves against.
pub fn decaying_noise(len: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|i| {
            let envelope = (1.0 - i as f32 / len as f32).powi(2);
            rng.gen_range(-1.0f32..1.0) * envelope
        })
        .collect()
}

struct ChannelState {
    /// IR partition spectra, in tail order.
    partitions: Vec<Vec<Complex<f32>>>,
    /// Frequency-domain delay line of past input block spectra.
    fdl: Vec<Vec<Complex<f32>>>,
    input: Vec<f32>,
    output: Vec<f32>,
    overlap: Vec<f32>,
}

impl ChannelState {
    fn new(ir: &[f32], fft: &Arc<dyn RealToComplex<f32>>) -> Self {
        let mut partitions = Vec::with_capacity(ir.len().div_ceil(PARTITION_SIZE).max(1));
        for chunk in ir.chunks(PARTITION_SIZE) {
            let mut padded = vec![0.0f32; FFT_SIZE];
            padded[..chunk.len()].copy_from_slice(chunk);
            let mut spectrum = vec![Complex::new(0.0, 0.0); SPECTRUM_LEN];
            fft.process(&mut padded, &mut spectrum).ok();
            partitions.push(spectrum);
        }
        if partitions.is_empty() {
            partitions.push(vec![Complex::new(0.0, 0.0); SPECTRUM_LEN]);
        }
        let count = partitions.len();
        Self {
            partitions,
            fdl: vec![vec![Complex::new(0.0, 0.0); SPECTRUM_LEN]; count],
            input: vec![0.0; PARTITION_SIZE],
            output: vec![0.0; PARTITION_SIZE],
            overlap: vec![0.0; PARTITION_SIZE],
        }
    }
}

/// Stereo convolver applying an independent impulse response per channel.
pub struct Convolver {
    fft: Arc<dyn RealToComplex<f32>>,
    ifft: Arc<dyn ComplexToReal<f32>>,
    left: ChannelState,
    right: ChannelState,
    fdl_pos: usize,
    fill: usize,
    out_pos: usize,
    time_scratch: Vec<f32>,
    spec_scratch: Vec<Complex<f32>>,
}

impl Convolver {
    pub fn new(ir_left: &[f32], ir_right: &[f32]) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let ifft = planner.plan_fft_inverse(FFT_SIZE);
        let left = ChannelState::new(ir_left, &fft);
        let right = ChannelState::new(ir_right, &fft);
        Self {
            fft,
            ifft,
            left,
            right,
            fdl_pos: 0,
            fill: 0,
            out_pos: 0,
            time_scratch: vec![0.0; FFT_SIZE],
            spec_scratch: vec![Complex::new(0.0, 0.0); SPECTRUM_LEN],
        }
    }

    /// Same impulse in both channels.
    pub fn mono_ir(ir: &[f32]) -> Self {
        Self::new(ir, ir)
    }

    fn convolve_block(
        channel: &mut ChannelState,
        fdl_pos: usize,
        fft: &Arc<dyn RealToComplex<f32>>,
        ifft: &Arc<dyn ComplexToReal<f32>>,
        time_scratch: &mut [f32],
        spec_scratch: &mut [Complex<f32>],
    ) {
        // New input block spectrum into the delay line.
        time_scratch[..PARTITION_SIZE].copy_from_slice(&channel.input);
        time_scratch[PARTITION_SIZE..].fill(0.0);
        fft.process(time_scratch, &mut channel.fdl[fdl_pos]).ok();

        // Multiply-accumulate across all partitions: partition p pairs
        // with the input block from p blocks ago.
        let count = channel.partitions.len();
        spec_scratch.fill(Complex::new(0.0, 0.0));
        for (p, partition) in channel.partitions.iter().enumerate() {
            let block = &channel.fdl[(fdl_pos + count - p) % count];
            for (acc, (x, h)) in spec_scratch.iter_mut().zip(block.iter().zip(partition)) {
                *acc += x * h;
            }
        }

        // The inverse transform expects purely real DC/Nyquist bins.
        spec_scratch[0].im = 0.0;
        spec_scratch[SPECTRUM_LEN - 1].im = 0.0;
        ifft.process(spec_scratch, time_scratch).ok();
        let norm = 1.0 / FFT_SIZE as f32;
        for i in 0..PARTITION_SIZE {
            channel.output[i] = time_scratch[i] * norm + channel.overlap[i];
            channel.overlap[i] = time_scratch[PARTITION_SIZE + i] * norm;
        }
    }

    #[inline]
    pub fn process_frame(&mut self, input_l: f32, input_r: f32) -> (f32, f32) {
        self.left.input[self.fill] = input_l;
        self.right.input[self.fill] = input_r;
        self.fill += 1;

        if self.fill == PARTITION_SIZE {
            Self::convolve_block(
                &mut self.left,
                self.fdl_pos,
                &self.fft,
                &self.ifft,
                &mut self.time_scratch,
                &mut self.spec_scratch,
            );
            Self::convolve_block(
                &mut self.right,
                self.fdl_pos,
                &self.fft,
                &self.ifft,
                &mut self.time_scratch,
                &mut self.spec_scratch,
            );
            self.fdl_pos = (self.fdl_pos + 1) % self.left.fdl.len();
            self.fill = 0;
            self.out_pos = 0;
        }

        let out = (self.left.output[self.out_pos], self.right.output[self.out_pos]);
        self.out_pos += 1;
        out
    }

    /// Frames between a sample entering and its convolution appearing.
    pub fn latency_frames(&self) -> usize {
        PARTITION_SIZE - 1
    }
}
