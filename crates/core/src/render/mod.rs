use crossterm::style::{Color, Stylize};

use crate::analysis::WaveformPeaks;
use crate::config::WaveformOptions;
use crate::{PreviewError, Result};

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const PLACEHOLDER: char = '─';
const UNAVAILABLE: &str = "preview unavailable";

/// Draws a waveform and its progress as one line of block glyphs.
///
/// Bars left of the cursor use the progress colour, the rest the wave
/// colour. Without colour the played part is drawn solid and the rest
/// as outlines so the cursor stays visible in plain logs.
#[derive(Debug, Clone)]
pub struct WaveformPainter {
    width: usize,
    colored: bool,
    wave: Rgb,
    progress: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parses `#rrggbb`.
    pub fn parse(hex: &str) -> Result<Self> {
        let digits = hex
            .strip_prefix('#')
            .filter(|digits| digits.len() == 6)
            .ok_or(PreviewError::InvalidInput("colour must look like #rrggbb"))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| PreviewError::InvalidInput("colour must look like #rrggbb"))
        };
        Ok(Self(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl From<Rgb> for Color {
    fn from(Rgb(r, g, b): Rgb) -> Self {
        Color::Rgb { r, g, b }
    }
}

impl WaveformPainter {
    pub fn new(width: usize, options: &WaveformOptions) -> Result<Self> {
        if width == 0 {
            return Err(PreviewError::InvalidInput("waveform width must be positive"));
        }
        Ok(Self {
            width,
            colored: false,
            wave: Rgb::parse(&options.wave_color)?,
            progress: Rgb::parse(&options.progress_color)?,
        })
    }

    pub fn colored(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Paints `peaks` with the cursor at `progress` in `[0, 1]`.
    pub fn paint(&self, peaks: &WaveformPeaks, progress: f64) -> String {
        if peaks.is_empty() {
            return self.placeholder();
        }
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let played = (progress * self.width as f64).round() as usize;

        let mut line = String::with_capacity(self.width * 4);
        for column in 0..self.width {
            let position = if self.width == 1 {
                0.0
            } else {
                column as f64 / (self.width - 1) as f64
            };
            let amplitude = peaks.amplitude_at(position);
            let is_played = column < played;
            let glyph = if is_played || self.colored {
                level_glyph(amplitude)
            } else {
                outline_glyph(amplitude)
            };

            if self.colored {
                let color = if is_played { self.progress } else { self.wave };
                line.push_str(&glyph.with(Color::from(color)).to_string());
            } else {
                line.push(glyph);
            }
        }
        line
    }

    /// Inert line shown while nothing is loaded.
    pub fn placeholder(&self) -> String {
        std::iter::repeat(PLACEHOLDER).take(self.width).collect()
    }

    /// Inert line shown after a load failure.
    pub fn unavailable(&self) -> String {
        if self.width <= UNAVAILABLE.len() + 2 {
            return self.placeholder();
        }
        let side = (self.width - UNAVAILABLE.len()) / 2;
        let mut line: String = std::iter::repeat(PLACEHOLDER).take(side).collect();
        line.push_str(UNAVAILABLE);
        line.extend(std::iter::repeat(PLACEHOLDER).take(self.width - side - UNAVAILABLE.len()));
        line
    }
}

fn level_glyph(amplitude: f32) -> char {
    let index = (amplitude.clamp(0.0, 1.0) * (LEVELS.len() - 1) as f32).round() as usize;
    LEVELS[index]
}

fn outline_glyph(amplitude: f32) -> char {
    if amplitude >= 0.66 {
        '┃'
    } else if amplitude >= 0.33 {
        '│'
    } else {
        '╷'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peaks(bars: Vec<f32>) -> WaveformPeaks {
        WaveformPeaks {
            sample_rate: 1,
            duration_seconds: bars.len() as f64,
            bars,
        }
    }

    fn painter(width: usize) -> WaveformPainter {
        WaveformPainter::new(width, &WaveformOptions::default()).unwrap()
    }

    #[test]
    fn parses_hex_colours() {
        assert_eq!(Rgb::parse("#f97316").unwrap(), Rgb(0xf9, 0x73, 0x16));
        assert!(Rgb::parse("transparent").is_err());
        assert!(Rgb::parse("#12345").is_err());
    }

    #[test]
    fn played_part_is_solid_and_rest_outlined() {
        let line = painter(4).paint(&peaks(vec![1.0; 4]), 0.5);
        assert_eq!(line, "██┃┃");
    }

    #[test]
    fn plain_output_has_requested_width() {
        let line = painter(10).paint(&peaks(vec![0.0, 0.5, 1.0]), 0.3);
        assert_eq!(line.chars().count(), 10);
    }

    #[test]
    fn empty_peaks_draw_placeholder() {
        assert_eq!(painter(3).paint(&WaveformPeaks::default(), 0.2), "───");
    }

    #[test]
    fn unavailable_line_is_centred() {
        let line = painter(23).unavailable();
        assert_eq!(line, "──preview unavailable──");
        assert_eq!(painter(5).unavailable(), "─────");
    }

    #[test]
    fn coloured_output_uses_progress_then_wave_colour() {
        let line = painter(2).colored(true).paint(&peaks(vec![1.0, 1.0]), 0.5);
        let played = Color::Rgb { r: 0xf9, g: 0x73, b: 0x16 };
        let unplayed = Color::Rgb { r: 0x55, g: 0x55, b: 0x55 };
        assert_eq!(line, format!("{}{}", '█'.with(played), '█'.with(unplayed)));
        assert!(line.contains("38;2;249;115;22"));
    }

    #[test]
    fn rejects_zero_width() {
        assert!(WaveformPainter::new(0, &WaveformOptions::default()).is_err());
    }
}
