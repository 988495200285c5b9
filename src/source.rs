//! Fetching and decoding raw audio for waveform generation.

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::analyzer;
use crate::error::WaveformError;
use crate::peaks::{self, DecodedAudio, PeakSeries};

/// Largest response body accepted from a remote source.
const MAX_REMOTE_BYTES: u64 = 512 * 1024 * 1024;

/// Retrieves the raw bytes behind a source URL.
pub trait AudioFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, WaveformError>;
}

/// Reads local paths and `file://` URLs from disk and `http(s)://` URLs over the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFetcher;

impl AudioFetcher for DefaultFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, WaveformError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            log::debug!("fetch: GET {url}");
            let mut response = ureq::get(url).call()?;
            let bytes = response
                .body_mut()
                .with_config()
                .limit(MAX_REMOTE_BYTES)
                .read_to_vec()?;
            return Ok(bytes);
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        std::fs::read(path).map_err(|source| WaveformError::Io {
            path: path.to_string(),
            source,
        })
    }
}

/// File extension of a URL or path, ignoring any query or fragment.
pub fn extension_of(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    Path::new(name).extension().and_then(|ext| ext.to_str())
}

/// Decode a complete audio file into per-channel samples.
pub fn decode_audio(
    bytes: Vec<u8>,
    extension: Option<&str>,
) -> Result<DecodedAudio, WaveformError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    // Hint the format reader with the file's extension.
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let detected = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    let mut format = detected.format;

    // Find the first audio track with a known (decodeable) codec.
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(WaveformError::NoTrack)?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &dec_opts)?;
    let track_id = track.id;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let mut channels: Vec<Vec<f32>> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream
            Err(Error::IoError(_)) | Err(Error::ResetRequired) => break,
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                let spec = *audio_buf.spec();
                let channel_count = spec.channels.count().max(1);
                if sample_buf.is_none() {
                    sample_rate = spec.rate;
                    channels = vec![Vec::new(); channel_count];
                    // Note: this is capacity, not length
                    let duration = audio_buf.capacity() as u64;
                    sample_buf = Some(SampleBuffer::<f32>::new(duration, spec));
                }

                if let Some(buf) = &mut sample_buf {
                    buf.copy_interleaved_ref(audio_buf);
                    for frame in buf.samples().chunks(channel_count) {
                        for (channel, &sample) in channels.iter_mut().zip(frame) {
                            channel.push(sample);
                        }
                    }
                }
            }
            // Skip over a corrupt packet
            Err(Error::DecodeError(err)) => log::debug!("decode_audio: skipping packet: {err}"),
            Err(err) => return Err(err.into()),
        }
    }

    Ok(DecodedAudio::new(channels, sample_rate))
}

/// Peaks and optional tempo for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformData {
    pub peaks: PeakSeries,
    pub bpm: Option<f32>,
    pub duration_secs: f64,
}

/// Fetch, decode and reduce `url` to `samples` peaks.
pub fn generate_waveform(
    fetcher: &dyn AudioFetcher,
    url: &str,
    samples: usize,
    detect_bpm: bool,
) -> Result<WaveformData, WaveformError> {
    let bytes = fetcher.fetch(url)?;
    let audio = decode_audio(bytes, extension_of(url))?;
    log::info!(
        "generate_waveform: decoded {} frames x {} channels at {} Hz",
        audio.len(),
        audio.channels.len(),
        audio.sample_rate
    );

    let peaks = peaks::extract_peaks(&audio, samples);
    let bpm = if detect_bpm {
        analyzer::estimate_bpm(&audio.mono(), audio.sample_rate)
    } else {
        None
    };
    Ok(WaveformData {
        peaks,
        bpm,
        duration_secs: audio.duration_secs(),
    })
}

/// Generate peaks for `url` without a player instance.
pub fn generate_peaks(
    fetcher: &dyn AudioFetcher,
    url: &str,
    samples: usize,
) -> Result<PeakSeries, WaveformError> {
    generate_waveform(fetcher, url, samples, false)
        .map(|data| data.peaks)
        .inspect_err(|err| log::error!("Failed to generate waveform: {err}"))
}
