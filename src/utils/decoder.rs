use std::{fs::File, io, path::Path};

use symphonia::core::{
    audio::SampleBuffer,
    codecs::DecoderOptions,
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::{MediaSource, MediaSourceStream},
    meta::MetadataOptions,
    probe::Hint,
};

use crate::error::Error;

// -------------------------------------------------------------------------------------------------

/// A fully decoded audio stream with interleaved f32 samples.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channel_count: usize,
}

/// Decode the audio file at the given path. The file extension is used as a format hint.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<DecodedAudio, Error> {
    let path = path.as_ref();
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }
    decode(Box::new(File::open(path)?), hint)
}

/// Decode an encoded, in-memory audio file.
pub fn decode_buffer(buffer: Vec<u8>) -> Result<DecodedAudio, Error> {
    decode(Box::new(io::Cursor::new(buffer)), Hint::new())
}

fn decode(source: Box<dyn MediaSource>, hint: Hint) -> Result<DecodedAudio, Error> {
    let stream = MediaSourceStream::new(source, Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| Error::AudioDecodingError(Box::new(err)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::AudioDecodingError("no default audio track".into()))?;
    let track_id = track.id;
    let (sample_rate, channel_count) = match (
        track.codec_params.sample_rate,
        track.codec_params.channels,
    ) {
        (Some(rate), Some(channels)) if rate > 0 && channels.count() > 0 => {
            (rate, channels.count())
        }
        _ => {
            return Err(Error::AudioDecodingError(
                "audio track has no sample rate or channel layout".into(),
            ))
        }
    };
    let mut samples = Vec::with_capacity(
        track.codec_params.n_frames.unwrap_or(0) as usize * channel_count,
    );
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| Error::AudioDecodingError(Box::new(err)))?;

    let mut sample_buffer: Option<SampleBuffer<f32>> = None;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(err) => return Err(Error::AudioDecodingError(Box::new(err))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let buffer = sample_buffer.get_or_insert_with(|| {
                    SampleBuffer::new(decoded.capacity() as u64, *decoded.spec())
                });
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(err)) => {
                // corrupt packets are skipped
                log::warn!("skipping undecodable audio packet: {err}");
            }
            Err(err) => return Err(Error::AudioDecodingError(Box::new(err))),
        }
    }

    if samples.is_empty() {
        return Err(Error::AudioDecodingError(
            "audio track contains no samples".into(),
        ));
    }
    Ok(DecodedAudio {
        samples,
        sample_rate,
        channel_count,
    })
}

// -------------------------------------------------------------------------------------------------
