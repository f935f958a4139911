use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

// Sample rates at the seams of the pipeline
pub const ROOM_SAMPLE_RATE: f64 = 24000.0; // room frames and TTS output
pub const STT_SAMPLE_RATE: f64 = 16000.0; // Deepgram streaming input

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1, // mono
    )?;
    Ok(resampler)
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Converts a slice of i16 samples to a vector of f32 samples.
pub fn convert_i16_to_f32(pcm16: &[i16]) -> Vec<f32> {
    pcm16
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

/// Encodes PCM16 samples as base64 little-endian bytes.
pub fn encode_i16(pcm16: &[i16]) -> String {
    let pcm16_bytes: Vec<u8> = pcm16
        .iter()
        .flat_map(|&sample| sample.to_le_bytes().to_vec())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(&pcm16_bytes)
}

/// Decodes base64 little-endian bytes back into PCM16 samples.
pub fn decode_i16(base64_fragment: &str) -> Vec<i16> {
    if let Ok(pcm16_bytes) = base64::engine::general_purpose::STANDARD.decode(base64_fragment) {
        pcm16_bytes
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect()
    } else {
        tracing::error!("Failed to decode base64 fragment to i16");
        Vec::new()
    }
}

/// Interprets raw little-endian bytes as PCM16 samples.
pub fn bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

/// Resamples PCM16 audio between the pipeline's fixed rates. Incomplete
/// trailing chunks are dropped, matching the fixed-chunk resampler.
pub fn resample(samples: &[i16], from_rate: f64, to_rate: f64) -> anyhow::Result<Vec<i16>> {
    if (from_rate - to_rate).abs() < f64::EPSILON {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(from_rate, to_rate, 512)?;
    let input = convert_i16_to_f32(samples);
    let chunk_size = resampler.input_frames_next();
    let mut output = Vec::new();
    for chunk in input.chunks(chunk_size) {
        if let Ok(res) = resampler.process(&[chunk.to_vec()], None) {
            output.extend_from_slice(&res[0]);
        }
    }
    Ok(convert_f32_to_i16(&output))
}

/// One-pole high-pass filter used as a light noise-reduction pre-stage on
/// inbound room audio. State is per stream: feed frames in arrival order.
pub struct HighPassFilter {
    alpha: f32,
    prev_input: f32,
    prev_output: f32,
}

impl HighPassFilter {
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff_hz);
        let dt = 1.0 / sample_rate;
        Self {
            alpha: rc / (rc + dt),
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }

    pub fn process(&mut self, frame: &mut [f32]) {
        for sample in frame.iter_mut() {
            let output = self.alpha * (self.prev_output + *sample - self.prev_input);
            self.prev_input = *sample;
            self.prev_output = output;
            *sample = output;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_create_resampler() {
        assert!(create_resampler(24000.0, 16000.0, 512).is_ok());
        assert!(create_resampler(24000.0, 24000.0, 512).is_ok());
        assert!(create_resampler(ROOM_SAMPLE_RATE, STT_SAMPLE_RATE, 512).is_ok());
    }

    #[test]
    fn test_convert_f32_to_i16() {
        let input = vec![1.0f32, -1.0f32, 0.0f32, 0.5f32];
        let result = convert_f32_to_i16(&input);

        assert_eq!(result.len(), 4);
        assert_eq!(result[0], i16::MAX);
        assert_eq!(result[1], -32767);
        assert_eq!(result[2], 0);

        // Out-of-range values clamp instead of wrapping.
        let clamped = convert_f32_to_i16(&[2.0f32, -2.0f32]);
        assert_eq!(clamped[0], i16::MAX);
        assert_eq!(clamped[1], i16::MIN);
    }

    #[test]
    fn test_convert_i16_to_f32() {
        let input = vec![i16::MAX, i16::MIN, 0i16, 16384i16];
        let result = convert_i16_to_f32(&input);

        assert_abs_diff_eq!(result[0], i16::MAX as f32 / 32768.0, epsilon = 0.0001);
        assert_abs_diff_eq!(result[1], -1.0, epsilon = 0.0001);
        assert_abs_diff_eq!(result[2], 0.0, epsilon = 0.0001);
        assert_abs_diff_eq!(result[3], 0.5, epsilon = 0.0001);
    }

    #[test]
    fn test_i16_base64_round_trip() {
        let original = vec![256i16, -256i16, 0i16, i16::MAX, i16::MIN];
        let encoded = encode_i16(&original);
        assert_eq!(decode_i16(&encoded), original);

        assert!(decode_i16("invalid_base64!").is_empty());
        assert!(decode_i16("").is_empty());
    }

    #[test]
    fn test_bytes_to_i16_skips_incomplete_chunks() {
        assert_eq!(bytes_to_i16(&[0x00, 0x40]), vec![16384]);
        assert!(bytes_to_i16(&[0x00]).is_empty());
    }

    #[test]
    fn test_resample_halves_and_passes_through() {
        let input: Vec<i16> = (0..2048).map(|i| ((i % 100) * 100) as i16).collect();

        let identical = resample(&input, 24000.0, 24000.0).unwrap();
        assert_eq!(identical, input);

        let downsampled = resample(&input, 24000.0, 16000.0).unwrap();
        // 2/3 of the input length, modulo chunk-boundary rounding.
        let expected = input.len() * 2 / 3;
        assert!((downsampled.len() as i64 - expected as i64).unsigned_abs() < 64);
    }

    #[test]
    fn test_high_pass_filter_removes_dc_offset() {
        let mut filter = HighPassFilter::new(100.0, ROOM_SAMPLE_RATE as f32);
        let mut frame = vec![1.0f32; 2400];
        filter.process(&mut frame);
        // A constant signal decays toward zero through a high-pass stage.
        assert!(frame.last().unwrap().abs() < 0.1);
    }

    #[test]
    fn test_high_pass_filter_passes_speech_band() {
        let mut filter = HighPassFilter::new(100.0, ROOM_SAMPLE_RATE as f32);
        let mut frame: Vec<f32> = (0..2400)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 24000.0).sin())
            .collect();
        filter.process(&mut frame);
        let energy: f32 = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        // A 1 kHz tone keeps most of its energy (raw RMS energy is 0.5).
        assert!(energy > 0.4);
    }
}
