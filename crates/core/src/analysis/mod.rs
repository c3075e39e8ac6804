use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PreviewError, Result};

/// Samples folded into one column before the final bar reduction.
const COLUMN_SAMPLES: usize = 256;
/// Bars quieter than this are treated as silence when normalizing.
const SILENCE_FLOOR: f32 = 1e-6;

/// Amplitude envelope of one audio source, ready for drawing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveformPeaks {
    pub sample_rate: u32,
    pub duration_seconds: f64,
    /// One value per bar in `[0, 1]`.
    pub bars: Vec<f32>,
}

impl WaveformPeaks {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Amplitude of the bar under a normalized position.
    pub fn amplitude_at(&self, position: f64) -> f32 {
        if self.bars.is_empty() || !(0.0..=1.0).contains(&position) {
            return 0.0;
        }
        let index = (position * (self.bars.len() - 1) as f64).round() as usize;
        self.bars.get(index).copied().unwrap_or(0.0)
    }
}

/// Streaming reducer from mono samples to waveform bars.
///
/// Samples are folded into fixed-size columns as they arrive so decoding
/// never has to hold the whole source in memory. [`PeakAnalyzer::finish`]
/// groups the columns into the requested number of bars.
pub struct PeakAnalyzer {
    sample_rate: u32,
    columns: Vec<Column>,
    pending: Column,
    processed_samples: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Column {
    peak: f32,
    sum_squares: f32,
    count: usize,
}

impl Column {
    fn push(&mut self, sample: f32) {
        let magnitude = sample.abs();
        if magnitude.is_finite() {
            self.peak = self.peak.max(magnitude);
            self.sum_squares += sample * sample;
        }
        self.count += 1;
    }

    fn rms(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum_squares / self.count as f32).sqrt()
        }
    }
}

impl PeakAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            columns: Vec::new(),
            pending: Column::default(),
            processed_samples: 0,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.processed_samples as f64 / self.sample_rate as f64
    }

    /// Consumes a block of mono samples.
    pub fn process_block(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.pending.push(sample);
            if self.pending.count == COLUMN_SAMPLES {
                self.columns.push(std::mem::take(&mut self.pending));
            }
        }
        self.processed_samples += samples.len();
    }

    /// Reduces everything seen so far into `bars` values.
    pub fn finish(mut self, bars: usize, normalize: bool) -> Result<WaveformPeaks> {
        if bars == 0 {
            return Err(PreviewError::InvalidInput(
                "waveform needs at least one bar",
            ));
        }
        if self.pending.count > 0 {
            self.columns.push(self.pending);
        }
        if self.columns.is_empty() {
            return Err(PreviewError::InvalidInput("audio source contained no samples"));
        }

        let mut values = Vec::with_capacity(bars);
        let total = self.columns.len();
        for bar in 0..bars {
            let start = bar * total / bars;
            let end = ((bar + 1) * total / bars).max(start + 1).min(total);
            let value = self.columns[start.min(total - 1)..end]
                .iter()
                .map(|column| column.peak.max(column.rms()))
                .fold(0.0_f32, f32::max);
            values.push(value);
        }

        if normalize {
            normalize_bars(&mut values);
        } else {
            values.iter_mut().for_each(|value| *value = value.clamp(0.0, 1.0));
        }

        Ok(WaveformPeaks {
            sample_rate: self.sample_rate,
            duration_seconds: self.duration_seconds(),
            bars: values,
        })
    }
}

impl fmt::Debug for PeakAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeakAnalyzer")
            .field("sample_rate", &self.sample_rate)
            .field("columns", &self.columns.len())
            .field("processed_samples", &self.processed_samples)
            .finish()
    }
}

fn normalize_bars(values: &mut [f32]) {
    let loudest = values.iter().copied().fold(0.0_f32, f32::max);
    if loudest <= SILENCE_FLOOR {
        values.iter_mut().for_each(|value| *value = 0.0);
        return;
    }
    for value in values.iter_mut() {
        *value = (*value / loudest).clamp(0.0, 1.0);
    }
}

/// Averages interleaved frames down to one channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
