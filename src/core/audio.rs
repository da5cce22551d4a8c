use lewton::inside_ogg::OggStreamReader;
use log::{info, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Amplitude (full scale 1.0) above which a sample counts as sound.
pub const SILENCE_THRESHOLD: f32 = 0.005;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("failed to read audio file: {0}")]
    Io(#[from] std::io::Error),
    #[error("ogg vorbis decode failed: {0}")]
    Vorbis(#[from] lewton::VorbisError),
    #[error("mp3 decode failed: {0}")]
    Mp3(String),
    #[error("unsupported audio format '{0}'")]
    UnsupportedFormat(String),
}

/// Incremental scan over decoded audio, fed one packet at a time so the
/// decoder can stop as soon as the first audible sample shows up.
#[derive(Debug, Default)]
struct OnsetScan {
    elapsed_ms: f64,
    onset_ms: Option<f64>,
}

impl OnsetScan {
    /// Feeds interleaved i16 frames; only the first channel is inspected.
    fn feed_i16(&mut self, interleaved: &[i16], channels: usize, sample_rate: u32) -> bool {
        if self.onset_ms.is_some() {
            return true;
        }
        if channels == 0 || sample_rate == 0 {
            return false;
        }
        let ms_per_frame = 1000.0 / f64::from(sample_rate);
        for (frame, chunk) in interleaved.chunks(channels).enumerate() {
            let amplitude = f32::from(chunk[0]) / 32768.0;
            if amplitude.abs() > SILENCE_THRESHOLD {
                self.onset_ms = Some(self.elapsed_ms + frame as f64 * ms_per_frame);
                return true;
            }
        }
        self.elapsed_ms += (interleaved.len() / channels) as f64 * ms_per_frame;
        false
    }

    fn finish(self) -> f64 {
        // All-silent asset: nothing to compensate for.
        self.onset_ms.unwrap_or(0.0)
    }
}

/// Decodes an audio asset far enough to find where sound begins.
pub fn detect_leading_silence(path: &Path) -> Result<f64, AudioError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "ogg" | "oga" => scan_ogg(path),
        "mp3" => scan_mp3(path),
        _ => Err(AudioError::UnsupportedFormat(ext)),
    }
}

/// The setup-time entry point: any failure means "no offset".
pub fn lead_silence_or_zero(path: Option<&Path>) -> f64 {
    let Some(path) = path else { return 0.0 };
    match detect_leading_silence(path) {
        Ok(ms) => {
            info!("Detected audio start in '{}' at {ms:.2}ms", path.display());
            ms
        }
        Err(e) => {
            warn!("Leading-silence analysis of '{}' failed: {e}", path.display());
            0.0
        }
    }
}

fn scan_ogg(path: &Path) -> Result<f64, AudioError> {
    let file = File::open(path)?;
    let mut ogg = OggStreamReader::new(BufReader::new(file))?;
    let channels = ogg.ident_hdr.audio_channels as usize;
    let sample_rate = ogg.ident_hdr.audio_sample_rate;
    let mut scan = OnsetScan::default();
    while let Some(packet) = ogg.read_dec_packet_itl()? {
        if scan.feed_i16(&packet, channels, sample_rate) {
            break;
        }
    }
    Ok(scan.finish())
}

fn scan_mp3(path: &Path) -> Result<f64, AudioError> {
    let file = File::open(path)?;
    let mut decoder = minimp3::Decoder::new(BufReader::new(file));
    let mut scan = OnsetScan::default();
    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                if scan.feed_i16(&frame.data, frame.channels, sample_rate) {
                    break;
                }
            }
            Err(minimp3::Error::Eof | minimp3::Error::InsufficientData) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(AudioError::Mp3(format!("{e:?}"))),
        }
    }
    Ok(scan.finish())
}
