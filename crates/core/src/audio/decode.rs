//! Symphonia based decoding of local sources into waveform peaks.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::analysis::{downmix, PeakAnalyzer, WaveformPeaks};
use crate::config::{DecodeConfig, WaveformOptions};
use crate::{PreviewError, Result};

/// Resolves an audio source string to a local path.
///
/// Plain paths and `file://` URLs are accepted. Remote schemes are
/// rejected so the caller can degrade to "preview unavailable".
pub fn local_path(src: &str) -> Result<&Path> {
    if let Some(rest) = src.strip_prefix("file://") {
        return Ok(Path::new(rest));
    }
    if src.contains("://") {
        return Err(PreviewError::decode(src, "only local sources can be decoded"));
    }
    if src.trim().is_empty() {
        return Err(PreviewError::InvalidInput("audio source is empty"));
    }
    Ok(Path::new(src))
}

/// Decodes `src` and reduces it to peaks.
///
/// Returns `Ok(None)` when `cancel` was raised part way through; the
/// caller has been torn down and nobody wants the result.
pub fn decode_peaks(
    src: &str,
    options: &WaveformOptions,
    limits: &DecodeConfig,
    cancel: &AtomicBool,
) -> Result<Option<WaveformPeaks>> {
    let path = local_path(src)?;
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PreviewError::decode(src, e))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PreviewError::decode(src, "no audio track found"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PreviewError::decode(src, "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PreviewError::decode(src, e))?;

    let mut analyzer = PeakAnalyzer::new(sample_rate);

    loop {
        if cancel.load(Ordering::Acquire) {
            tracing::debug!(src, "decode cancelled");
            return Ok(None);
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(PreviewError::decode(src, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(src, error = e, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(PreviewError::decode(src, e)),
        };

        let channels = decoded.spec().channels.count();
        let mut buffer = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        let mono = downmix(buffer.samples(), channels);
        analyzer.process_block(&mono);

        if analyzer.duration_seconds() > limits.max_duration_seconds.max(0.0) {
            return Err(PreviewError::decode(src, "source exceeds maximum preview length"));
        }
    }

    let peaks = analyzer.finish(options.bars, options.normalize)?;
    tracing::debug!(
        src,
        duration = peaks.duration_seconds,
        bars = peaks.bars.len(),
        "decoded waveform"
    );
    Ok(Some(peaks))
}
