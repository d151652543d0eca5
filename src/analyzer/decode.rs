use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("No audio track found")]
    NoTrack,
    #[error("symphonia decode error: {0}")]
    Symphonia(#[from] SymphoniaError),
    #[error("Resample error: {0}")]
    Resample(String),
}

/// Decoded mono signal.
#[derive(Debug)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio file, average its channels to mono and resample to
/// `target_rate`.
pub fn load_mono(path: &Path, target_rate: u32) -> Result<MonoAudio, DecodeError> {
    let (samples, source_rate) = decode_to_mono(path)?;
    let samples = resample(samples, source_rate, target_rate)?;
    Ok(MonoAudio {
        samples,
        sample_rate: target_rate,
    })
}

fn decode_to_mono(path: &Path) -> Result<(Vec<f32>, u32), DecodeError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| match e {
            SymphoniaError::Unsupported(what) => DecodeError::UnsupportedFormat(what.to_string()),
            other => DecodeError::Symphonia(other),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Corrupt packets are skipped, not fatal
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping bad packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        let channels = spec.channels.count().max(1);

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        mono.extend(
            buf.samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    if sample_rate == 0 {
        return Err(DecodeError::UnsupportedFormat("unknown sample rate".to_string()));
    }

    Ok((mono, sample_rate))
}

fn resample(samples: Vec<f32>, from: u32, to: u32) -> Result<Vec<f32>, DecodeError> {
    if from == to || samples.is_empty() {
        return Ok(samples);
    }
    log::debug!("Resampling {} frames from {}Hz to {}Hz", samples.len(), from, to);

    let mut resampler = FastFixedIn::<f32>::new(
        to as f64 / from as f64,
        1.0,
        PolynomialDegree::Septic,
        samples.len(),
        1,
    )
    .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    Ok(output.pop().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let s = ((i as f32 * 0.05).sin() * 16000.0) as i16;
            for ch in 0..channels {
                // Right channel silent so the mono mix halves the level
                writer.write_sample(if ch == 0 { s } else { 0 }).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decodes_wav_to_mono_at_native_rate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 44100, 2, 4410);

        let audio = load_mono(&path, 44100).unwrap();
        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.samples.len(), 4410);
        assert!((audio.duration_secs() - 0.1).abs() < 1e-9);

        let peak = audio.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let expected = 16000.0 / 32768.0 / 2.0;
        assert!((peak - expected).abs() < 0.01, "peak = {peak}");
    }

    #[test]
    fn resamples_to_target_rate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 22050, 1, 22050);

        let audio = load_mono(&path, 44100).unwrap();
        assert_eq!(audio.sample_rate, 44100);
        let len = audio.samples.len() as f64;
        assert!((len - 44100.0).abs() < 200.0, "len = {len}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_mono(Path::new("/no/such/file.wav"), 44100).unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"this is not audio at all").unwrap();
        assert!(load_mono(&path, 44100).is_err());
    }
}
