use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use thiserror::Error;

/// The fixed feature vocabulary. Declaration order is the analysis CSV's
/// feature column order (after `audiolength`, which comes first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    AudioLength,
    Harmonicity,
    FundamentalPitch,
    AttackMs,
    EffectiveDurationS,
    SpectralCentroid,
    BassPresenceRatio,
    RhythmicDensityOps,
    DynamicRangeDb,
    LoudnessDbfs,
    SpectralBandwidth,
    SpectralFlatness,
    RmsEnergy,
    ZeroCrossingRate,
    SpectralRolloff,
}

impl Feature {
    pub const ALL: [Feature; 15] = [
        Feature::AudioLength,
        Feature::Harmonicity,
        Feature::FundamentalPitch,
        Feature::AttackMs,
        Feature::EffectiveDurationS,
        Feature::SpectralCentroid,
        Feature::BassPresenceRatio,
        Feature::RhythmicDensityOps,
        Feature::DynamicRangeDb,
        Feature::LoudnessDbfs,
        Feature::SpectralBandwidth,
        Feature::SpectralFlatness,
        Feature::RmsEnergy,
        Feature::ZeroCrossingRate,
        Feature::SpectralRolloff,
    ];

    /// Column / key name.
    pub fn key(self) -> &'static str {
        match self {
            Self::AudioLength => "audiolength",
            Self::Harmonicity => "harmonicity",
            Self::FundamentalPitch => "fundamental_pitch",
            Self::AttackMs => "attack_ms",
            Self::EffectiveDurationS => "effective_duration_s",
            Self::SpectralCentroid => "spectral_centroid",
            Self::BassPresenceRatio => "bass_presence_ratio",
            Self::RhythmicDensityOps => "rhythmic_density_ops",
            Self::DynamicRangeDb => "dynamic_range_db",
            Self::LoudnessDbfs => "loudness_dbfs",
            Self::SpectralBandwidth => "spectral_bandwidth",
            Self::SpectralFlatness => "spectral_flatness",
            Self::RmsEnergy => "rms_energy",
            Self::ZeroCrossingRate => "zero_crossing_rate",
            Self::SpectralRolloff => "spectral_rolloff",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Value assumed when the feature is missing: silence for loudness,
    /// zero for everything else.
    pub fn neutral_default(self) -> f64 {
        match self {
            Self::LoudnessDbfs => -60.0,
            _ => 0.0,
        }
    }
}

/// Named scalar features for one audio file. Values are stored unrounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    values: BTreeMap<Feature, f64>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.values.insert(feature, value);
        self
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values.get(&feature).copied()
    }

    /// The stored value, or the feature's neutral default when absent.
    pub fn value_or_default(&self, feature: Feature) -> f64 {
        self.get(feature).unwrap_or_else(|| feature.neutral_default())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.values.iter().map(|(f, v)| (*f, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(Feature, f64)> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Empty signal")]
    EmptySignal,
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Turns a decoded mono signal into a `FeatureSet`.
pub trait FeatureExtractor {
    fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<FeatureSet, ExtractError>;
}

// STFT framing
const FRAME_LENGTH: usize = 2048;
const HOP_LENGTH: usize = 512;
// Fine RMS envelope used for attack timing
const FINE_FRAME_LENGTH: usize = 256;
const FINE_HOP_LENGTH: usize = 128;
// Pitch search range: C2..C7
const PITCH_FMIN: f64 = 65.406;
const PITCH_FMAX: f64 = 2093.005;
const PITCH_WINDOW: usize = 1024;
const VOICING_THRESHOLD: f64 = 0.3;
const BASS_CUTOFF_HZ: f64 = 150.0;
const ROLLOFF_PERCENT: f64 = 0.85;
const SILENCE_TOP_DB: f64 = 40.0;
const AMPLITUDE_FLOOR: f64 = 1e-5;
// Onset peak picking, in frames at HOP_LENGTH
const ONSET_PRE_MAX: usize = 3;
const ONSET_POST_MAX: usize = 1;
const ONSET_PRE_AVG: usize = 10;
const ONSET_POST_AVG: usize = 5;
const ONSET_DELTA: f64 = 0.07;
const ONSET_WAIT: usize = 3;

/// Default extractor: STFT statistics (rustfft), YIN-style pitch and
/// spectral-flux onsets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpectralExtractor;

impl FeatureExtractor for SpectralExtractor {
    fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<FeatureSet, ExtractError> {
        if samples.is_empty() {
            return Err(ExtractError::EmptySignal);
        }
        if sample_rate == 0 {
            return Err(ExtractError::InvalidSampleRate(sample_rate));
        }
        let sr = sample_rate as f64;
        let duration = samples.len() as f64 / sr;

        let frames = frame_signal(samples, FRAME_LENGTH, HOP_LENGTH);
        let spectral = spectral_stats(&frames, sr);

        let rms: Vec<f64> = frames.iter().map(|f| frame_rms(f)).collect();
        let rms_mean = mean(&rms);
        let zcr = mean(&frames.iter().map(|f| zero_crossing_rate(f)).collect::<Vec<_>>());
        let peak = samples.iter().fold(0.0f64, |m, &s| m.max((s as f64).abs()));

        let onsets = pick_onsets(&spectral.flux);
        let (harmonicity, pitch) = estimate_pitch(samples, sr);

        let dynamic_range = if rms_mean > 0.0 {
            20.0 * (peak / rms_mean).log10()
        } else {
            0.0
        };
        let rhythmic_density = if duration > 0.0 {
            onsets.len() as f64 / duration
        } else {
            0.0
        };

        Ok(FeatureSet::new()
            .with(Feature::AudioLength, duration)
            .with(Feature::Harmonicity, harmonicity)
            .with(Feature::FundamentalPitch, pitch)
            .with(Feature::AttackMs, attack_ms(samples, &onsets, sr))
            .with(Feature::EffectiveDurationS, effective_duration(&rms, sr).min(duration))
            .with(Feature::SpectralCentroid, mean(&spectral.centroid))
            .with(Feature::BassPresenceRatio, spectral.bass_ratio)
            .with(Feature::RhythmicDensityOps, rhythmic_density)
            .with(Feature::DynamicRangeDb, dynamic_range)
            .with(Feature::LoudnessDbfs, 20.0 * rms_mean.max(AMPLITUDE_FLOOR).log10())
            .with(Feature::SpectralBandwidth, mean(&spectral.bandwidth))
            .with(Feature::SpectralFlatness, mean(&spectral.flatness))
            .with(Feature::RmsEnergy, rms_mean)
            .with(Feature::ZeroCrossingRate, zcr)
            .with(Feature::SpectralRolloff, mean(&spectral.rolloff)))
    }
}

/// Split into complete frames. A signal shorter than one frame becomes a
/// single zero-padded frame.
fn frame_signal(samples: &[f32], frame_length: usize, hop: usize) -> Vec<Vec<f32>> {
    if samples.len() <= frame_length {
        let mut frame = samples.to_vec();
        frame.resize(frame_length, 0.0);
        return vec![frame];
    }
    (0..=(samples.len() - frame_length) / hop)
        .map(|i| samples[i * hop..i * hop + frame_length].to_vec())
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn frame_rms(frame: &[f32]) -> f64 {
    let energy: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (energy / frame.len() as f64).sqrt()
}

fn zero_crossing_rate(frame: &[f32]) -> f64 {
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / frame.len() as f64
}

struct SpectralStats {
    centroid: Vec<f64>,
    bandwidth: Vec<f64>,
    rolloff: Vec<f64>,
    flatness: Vec<f64>,
    flux: Vec<f64>,
    bass_ratio: f64,
}

fn spectral_stats(frames: &[Vec<f32>], sr: f64) -> SpectralStats {
    let n = FRAME_LENGTH;
    let bins = n / 2 + 1;
    let fft = FftPlanner::<f64>::new().plan_fft_forward(n);
    let window: Vec<f64> = (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect();
    let freqs: Vec<f64> = (0..bins).map(|k| k as f64 * sr / n as f64).collect();

    let mut stats = SpectralStats {
        centroid: Vec::with_capacity(frames.len()),
        bandwidth: Vec::with_capacity(frames.len()),
        rolloff: Vec::with_capacity(frames.len()),
        flatness: Vec::with_capacity(frames.len()),
        flux: Vec::with_capacity(frames.len()),
        bass_ratio: 0.0,
    };
    let mut low_sum = 0.0;
    let mut total_sum = 0.0;
    let mut previous_log: Option<Vec<f64>> = None;
    let mut buffer = vec![Complex::new(0.0f64, 0.0); n];

    for frame in frames {
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(frame[i] as f64 * window[i], 0.0);
        }
        fft.process(&mut buffer);
        let mag: Vec<f64> = buffer[..bins].iter().map(|c| c.norm()).collect();

        let mag_sum: f64 = mag.iter().sum();
        let (centroid, bandwidth, rolloff) = if mag_sum > 0.0 {
            let c = mag.iter().zip(&freqs).map(|(m, f)| m * f).sum::<f64>() / mag_sum;
            let bw = (mag
                .iter()
                .zip(&freqs)
                .map(|(m, f)| m * (f - c).powi(2))
                .sum::<f64>()
                / mag_sum)
                .sqrt();
            let target = ROLLOFF_PERCENT * mag_sum;
            let mut acc = 0.0;
            let mut roll = freqs[bins - 1];
            for (m, f) in mag.iter().zip(&freqs) {
                acc += m;
                if acc >= target {
                    roll = *f;
                    break;
                }
            }
            (c, bw, roll)
        } else {
            (0.0, 0.0, 0.0)
        };
        stats.centroid.push(centroid);
        stats.bandwidth.push(bandwidth);
        stats.rolloff.push(rolloff);

        let power: Vec<f64> = mag.iter().map(|m| (m * m).max(1e-10)).collect();
        let log_mean = power.iter().map(|p| p.ln()).sum::<f64>() / bins as f64;
        let arith_mean = power.iter().sum::<f64>() / bins as f64;
        stats.flatness.push(log_mean.exp() / arith_mean);

        let low: f64 = mag
            .iter()
            .zip(&freqs)
            .filter(|(_, f)| **f < BASS_CUTOFF_HZ)
            .map(|(m, _)| m * m)
            .sum();
        let total: f64 = mag.iter().map(|m| m * m).sum();
        low_sum += low.sqrt();
        total_sum += total.sqrt();

        let log_mag: Vec<f64> = mag.iter().map(|m| m.ln_1p()).collect();
        let flux = match &previous_log {
            Some(prev) => log_mag
                .iter()
                .zip(prev)
                .map(|(cur, old)| (cur - old).max(0.0))
                .sum(),
            None => 0.0,
        };
        stats.flux.push(flux);
        previous_log = Some(log_mag);
    }

    stats.bass_ratio = if total_sum > 0.0 { low_sum / total_sum } else { 0.0 };
    stats
}

/// Peak-pick the normalised onset envelope. Returns frame indices.
fn pick_onsets(flux: &[f64]) -> Vec<usize> {
    let max = flux.iter().cloned().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let env: Vec<f64> = flux.iter().map(|f| f / max).collect();

    let mut onsets = Vec::new();
    let mut last: Option<usize> = None;
    for t in 0..env.len() {
        let lo = t.saturating_sub(ONSET_PRE_MAX);
        let hi = (t + ONSET_POST_MAX + 1).min(env.len());
        let local_max = env[lo..hi].iter().cloned().fold(f64::MIN, f64::max);
        if env[t] < local_max {
            continue;
        }

        let lo = t.saturating_sub(ONSET_PRE_AVG);
        let hi = (t + ONSET_POST_AVG + 1).min(env.len());
        let local_avg = env[lo..hi].iter().sum::<f64>() / (hi - lo) as f64;
        if env[t] < local_avg + ONSET_DELTA {
            continue;
        }

        if let Some(prev) = last {
            if t - prev < ONSET_WAIT {
                continue;
            }
        }
        onsets.push(t);
        last = Some(t);
    }
    onsets
}

/// Time from the first onset to the following peak of a fine RMS envelope.
fn attack_ms(samples: &[f32], onsets: &[usize], sr: f64) -> f64 {
    let Some(&first) = onsets.first() else {
        return 0.0;
    };
    // Onset frames are reported at their centre, as with centred STFT frames.
    let onset_sample = first * HOP_LENGTH + FRAME_LENGTH / 2;
    let envelope: Vec<f64> = frame_signal(samples, FINE_FRAME_LENGTH, FINE_HOP_LENGTH)
        .iter()
        .map(|f| frame_rms(f))
        .collect();

    let start = onset_sample / FINE_HOP_LENGTH;
    if start >= envelope.len() {
        return 0.0;
    }
    let mut peak = start;
    for (i, v) in envelope.iter().enumerate().skip(start) {
        if *v > envelope[peak] {
            peak = i;
        }
    }
    (peak - start) as f64 * FINE_HOP_LENGTH as f64 / sr * 1000.0
}

/// Time covered by frames within `SILENCE_TOP_DB` of the loudest frame.
fn effective_duration(rms: &[f64], sr: f64) -> f64 {
    let db: Vec<f64> = rms.iter().map(|r| 20.0 * r.max(1e-10).log10()).collect();
    let max_db = db.iter().cloned().fold(f64::MIN, f64::max);
    if rms.iter().all(|r| *r <= 0.0) {
        return 0.0;
    }
    let active = rms
        .iter()
        .zip(&db)
        .filter(|(r, d)| **r > 0.0 && **d > max_db - SILENCE_TOP_DB)
        .count();
    active as f64 * HOP_LENGTH as f64 / sr
}

/// YIN-style pitch tracking. Returns (mean voiced confidence, mean voiced f0),
/// both zero when no frame is voiced.
fn estimate_pitch(samples: &[f32], sr: f64) -> (f64, f64) {
    let tau_min = ((sr / PITCH_FMAX).floor() as usize).max(2);
    let tau_max = (sr / PITCH_FMIN).ceil() as usize;
    if samples.len() < PITCH_WINDOW + tau_max + 1 {
        return (0.0, 0.0);
    }

    let x: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
    let mut diff = vec![0.0f64; tau_max + 1];
    let mut confidences = Vec::new();
    let mut pitches = Vec::new();

    let mut start = 0;
    while start + PITCH_WINDOW + tau_max < x.len() {
        for (tau, d) in diff.iter_mut().enumerate().skip(1) {
            *d = (0..PITCH_WINDOW)
                .map(|j| {
                    let delta = x[start + j] - x[start + j + tau];
                    delta * delta
                })
                .sum();
        }

        // Cumulative mean normalised difference
        let mut running = 0.0;
        let mut cmnd = vec![1.0f64; tau_max + 1];
        for tau in 1..=tau_max {
            running += diff[tau];
            cmnd[tau] = if running > 0.0 {
                diff[tau] * tau as f64 / running
            } else {
                1.0
            };
        }

        let mut tau = tau_min;
        let mut found = None;
        while tau <= tau_max {
            if cmnd[tau] < VOICING_THRESHOLD {
                while tau < tau_max && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                found = Some(tau);
                break;
            }
            tau += 1;
        }

        if let Some(tau) = found {
            confidences.push((1.0 - cmnd[tau]).clamp(0.0, 1.0));
            pitches.push(sr / refine_lag(&cmnd, tau));
        }
        start += PITCH_WINDOW;
    }

    (mean(&confidences), mean(&pitches))
}

/// Parabolic interpolation around a lag minimum.
fn refine_lag(cmnd: &[f64], tau: usize) -> f64 {
    if tau == 0 || tau + 1 >= cmnd.len() {
        return tau as f64;
    }
    let (a, b, c) = (cmnd[tau - 1], cmnd[tau], cmnd[tau + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < 1e-12 {
        tau as f64
    } else {
        tau as f64 + 0.5 * (a - c) / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 22050;

    fn sine(freq: f64, amplitude: f64, seconds: f64) -> Vec<f32> {
        let n = (SR as f64 * seconds) as usize;
        (0..n)
            .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / SR as f64).sin()) as f32)
            .collect()
    }

    #[test]
    fn keys_round_trip() {
        for f in Feature::ALL {
            assert_eq!(Feature::from_key(f.key()), Some(f));
        }
        assert_eq!(Feature::from_key("mfcc_0"), None);
    }

    #[test]
    fn missing_values_use_neutral_defaults() {
        let set = FeatureSet::new().with(Feature::Harmonicity, 0.5);
        assert_eq!(set.value_or_default(Feature::Harmonicity), 0.5);
        assert_eq!(set.value_or_default(Feature::AttackMs), 0.0);
        assert_eq!(set.value_or_default(Feature::LoudnessDbfs), -60.0);
        assert_eq!(set.get(Feature::LoudnessDbfs), None);
    }

    #[test]
    fn empty_signal_is_rejected() {
        assert!(matches!(
            SpectralExtractor.extract(&[], SR),
            Err(ExtractError::EmptySignal)
        ));
        assert!(matches!(
            SpectralExtractor.extract(&[0.1], 0),
            Err(ExtractError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn extractor_emits_every_feature() {
        let set = SpectralExtractor.extract(&sine(440.0, 0.5, 0.5), SR).unwrap();
        assert_eq!(set.len(), Feature::ALL.len());
    }

    #[test]
    fn silence_extracts_neutral_values() {
        let set = SpectralExtractor.extract(&vec![0.0; SR as usize], SR).unwrap();
        assert!((set.get(Feature::AudioLength).unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(set.get(Feature::Harmonicity), Some(0.0));
        assert_eq!(set.get(Feature::FundamentalPitch), Some(0.0));
        assert_eq!(set.get(Feature::AttackMs), Some(0.0));
        assert_eq!(set.get(Feature::EffectiveDurationS), Some(0.0));
        assert_eq!(set.get(Feature::DynamicRangeDb), Some(0.0));
        assert_eq!(set.get(Feature::RhythmicDensityOps), Some(0.0));
        assert!((set.get(Feature::LoudnessDbfs).unwrap() + 100.0).abs() < 1e-9);
    }

    #[test]
    fn sine_pitch_and_level() {
        let set = SpectralExtractor.extract(&sine(440.0, 0.5, 1.0), SR).unwrap();

        let f0 = set.get(Feature::FundamentalPitch).unwrap();
        assert!((f0 - 440.0).abs() < 5.0, "f0 = {f0}");
        assert!(set.get(Feature::Harmonicity).unwrap() > 0.8);

        // RMS of a 0.5 sine is 0.5/sqrt(2) -> about -9.03 dBFS, crest 3.01 dB
        let loudness = set.get(Feature::LoudnessDbfs).unwrap();
        assert!((loudness + 9.03).abs() < 0.1, "loudness = {loudness}");
        let crest = set.get(Feature::DynamicRangeDb).unwrap();
        assert!((crest - 3.01).abs() < 0.1, "crest = {crest}");

        let zcr = set.get(Feature::ZeroCrossingRate).unwrap();
        assert!((zcr - 880.0 / SR as f64).abs() < 0.005, "zcr = {zcr}");

        let centroid = set.get(Feature::SpectralCentroid).unwrap();
        assert!((centroid - 440.0).abs() < 60.0, "centroid = {centroid}");
    }

    #[test]
    fn bass_ratio_separates_low_and_high_tones() {
        let low = SpectralExtractor.extract(&sine(60.0, 0.5, 0.5), SR).unwrap();
        let high = SpectralExtractor.extract(&sine(2000.0, 0.5, 0.5), SR).unwrap();
        assert!(low.get(Feature::BassPresenceRatio).unwrap() > 0.9);
        assert!(high.get(Feature::BassPresenceRatio).unwrap() < 0.1);
    }

    #[test]
    fn decaying_hit_has_onset_and_fast_attack() {
        let mut signal = vec![0.0f32; SR as usize / 2];
        let hit: Vec<f32> = sine(220.0, 0.9, 0.5)
            .into_iter()
            .enumerate()
            .map(|(i, s)| s * (-(i as f32) / 1500.0).exp())
            .collect();
        signal.extend(hit);

        let set = SpectralExtractor.extract(&signal, SR).unwrap();
        assert!(set.get(Feature::RhythmicDensityOps).unwrap() > 0.0);
        assert!(set.get(Feature::AttackMs).unwrap() < 100.0);
        let effective = set.get(Feature::EffectiveDurationS).unwrap();
        assert!(effective > 0.0 && effective < 1.0, "effective = {effective}");
    }

    #[test]
    fn short_signal_is_padded_not_rejected() {
        let set = SpectralExtractor.extract(&sine(440.0, 0.5, 0.01), SR).unwrap();
        assert_eq!(set.get(Feature::FundamentalPitch), Some(0.0));
        assert!(set.get(Feature::RmsEnergy).unwrap() > 0.0);
    }
}
