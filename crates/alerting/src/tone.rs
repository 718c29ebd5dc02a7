//! Alert tone synthesis

use std::f32::consts::PI;
use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};

use crate::NotifyError;

/// Delay before a spoken message, letting the beeps lead
pub const SPEECH_DELAY_MS: u32 = 600;

/// Default sample rate for rendered tones
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

/// One sine beep within a sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beep {
    pub frequency_hz: f32,
    pub duration_s: f32,
    /// Start, relative to the sequence start
    pub offset_ms: u32,
}

/// Ascending three-beep alarm with an exponential fade on every beep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneSequence {
    pub beeps: Vec<Beep>,
    pub start_gain: f32,
    pub end_gain: f32,
}

impl Default for ToneSequence {
    fn default() -> Self {
        Self {
            beeps: vec![
                Beep { frequency_hz: 800.0, duration_s: 0.2, offset_ms: 0 },
                Beep { frequency_hz: 1000.0, duration_s: 0.2, offset_ms: 200 },
                Beep { frequency_hz: 1200.0, duration_s: 0.4, offset_ms: 400 },
            ],
            start_gain: 0.3,
            end_gain: 0.01,
        }
    }
}

impl ToneSequence {
    /// Length of the whole sequence in seconds
    pub fn duration_s(&self) -> f32 {
        self.beeps
            .iter()
            .map(|b| b.offset_ms as f32 / 1000.0 + b.duration_s)
            .fold(0.0, f32::max)
    }

    /// Render to signed 16-bit mono PCM
    pub fn render(&self, sample_rate: u32) -> Vec<i16> {
        let rate = sample_rate as f32;
        let total = (self.duration_s() * rate).ceil() as usize;
        let mut mix = vec![0.0_f32; total];

        for beep in &self.beeps {
            let start = (beep.offset_ms as u64 * sample_rate as u64 / 1000) as usize;
            let len = (beep.duration_s * rate).round() as usize;
            let ratio = self.end_gain / self.start_gain;

            for (i, sample) in mix.iter_mut().skip(start).take(len).enumerate() {
                let t = i as f32 / rate;
                let gain = self.start_gain * ratio.powf(t / beep.duration_s);
                *sample += gain * (2.0 * PI * beep.frequency_hz * t).sin();
            }
        }

        mix.into_iter()
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect()
    }

    /// Render to an in-memory WAV file
    pub fn to_wav(&self, sample_rate: u32) -> Result<Vec<u8>, NotifyError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for sample in self.render(sample_rate) {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }

        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_crossings(samples: &[i16]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0 && w[1] >= 0) || (w[0] >= 0 && w[1] < 0))
            .count()
    }

    #[test]
    fn test_default_sequence_length() {
        let tone = ToneSequence::default();
        assert!((tone.duration_s() - 0.8).abs() < 1e-6);
        assert_eq!(tone.render(8_000).len(), 6_400);
    }

    #[test]
    fn test_amplitude_bounded_by_start_gain() {
        let samples = ToneSequence::default().render(DEFAULT_SAMPLE_RATE);
        let peak = samples.iter().map(|s| (*s as i32).abs()).max().unwrap();
        assert!(peak as f32 <= 0.3 * i16::MAX as f32 + 1.0);
        assert!(peak > 1_000);
    }

    #[test]
    fn test_first_beep_pitch() {
        let rate = DEFAULT_SAMPLE_RATE;
        let samples = ToneSequence::default().render(rate);
        let first = &samples[..(rate as usize / 5)];
        // 800 Hz for 0.2 s => 160 cycles, two crossings each
        let crossings = zero_crossings(first);
        assert!((300..=340).contains(&crossings), "crossings = {}", crossings);
    }

    #[test]
    fn test_wav_round_trip_header() {
        let wav = ToneSequence::default().to_wav(16_000).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(reader.len(), 12_800);
    }
}
