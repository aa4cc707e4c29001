use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
};

#[cfg(feature = "assert-allocs")]
use assert_no_alloc::assert_no_alloc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::{error::Error, output::OutputDevice, source::Source};

// -------------------------------------------------------------------------------------------------

const PREFERRED_SAMPLE_RATE: u32 = 44100;
const PREFERRED_CHANNEL_COUNT: u16 = 2;

// -------------------------------------------------------------------------------------------------

/// State shared between the device handle and the render callback.
#[derive(Default)]
struct SharedState {
    running: AtomicBool,
    sample_position: AtomicU64,
}

/// Commands for the thread which owns the cpal stream.
enum StreamCommand {
    Start(Sender<Result<(), Error>>),
    Stop,
    Close,
}

// -------------------------------------------------------------------------------------------------

/// Audio output device which plays back on the default output device of the system's
/// default cpal host, preferably in 44.1kHz stereo f32.
///
/// cpal streams can't be moved across threads on all platforms, so the stream is created and
/// owned by a separate thread, which gets controlled via commands.
pub struct CpalOutput {
    channel_count: usize,
    sample_rate: u32,
    state: Arc<SharedState>,
    source_send: Sender<Box<dyn Source>>,
    command_send: Sender<StreamCommand>,
    stream_thread: Option<thread::JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the default output device of the default host.
    pub fn open() -> Result<Self, Error> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(cpal::DefaultStreamConfigError::DeviceNotAvailable)?;
        if let Ok(name) = device.name() {
            log::info!("opening audio output device '{name}'");
        }

        let config = Self::stream_config(&device)?;
        let channel_count = config.channels as usize;
        let sample_rate = config.sample_rate.0;

        let state = Arc::new(SharedState::default());
        let (source_send, source_recv) = bounded(1);
        let (command_send, command_recv) = bounded(16);
        let (opened_send, opened_recv) = bounded(1);

        let stream_thread = thread::Builder::new()
            .name("aetheryte_audio_output".to_string())
            .spawn({
                let state = Arc::clone(&state);
                move || {
                    let mut renderer = Renderer {
                        state,
                        source_recv,
                        source: None,
                    };
                    let stream = device.build_output_stream(
                        &config,
                        move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            renderer.render(output)
                        },
                        |err| log::error!("audio output stream error: {err}"),
                        None,
                    );
                    match stream {
                        Ok(stream) => {
                            let _ = opened_send.send(Ok(()));
                            run_stream(&stream, &command_recv);
                        }
                        Err(err) => {
                            let _ = opened_send.send(Err(Error::from(err)));
                        }
                    }
                }
            })?;

        opened_recv
            .recv()
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))??;
        log::info!("audio output opened with {channel_count} channels at {sample_rate}Hz");

        Ok(Self {
            channel_count,
            sample_rate,
            state,
            source_send,
            command_send,
            stream_thread: Some(stream_thread),
        })
    }

    /// Preferred f32 stream config of the device, or the device's default config.
    fn stream_config(device: &cpal::Device) -> Result<cpal::StreamConfig, Error> {
        let preferred = device.supported_output_configs()?.find_map(|range| {
            let rates = range.min_sample_rate().0..=range.max_sample_rate().0;
            if range.sample_format() == cpal::SampleFormat::F32
                && range.channels() == PREFERRED_CHANNEL_COUNT
                && rates.contains(&PREFERRED_SAMPLE_RATE)
            {
                Some(range.with_sample_rate(cpal::SampleRate(PREFERRED_SAMPLE_RATE)))
            } else {
                None
            }
        });
        let supported = match preferred {
            Some(supported) => supported,
            None => device.default_output_config()?,
        };
        if supported.sample_format() != cpal::SampleFormat::F32 {
            log::warn!(
                "audio device's default sample format is {}, requesting f32 samples",
                supported.sample_format()
            );
        }
        Ok(supported.config())
    }

    fn send_command(&self, command: StreamCommand) -> Result<(), Error> {
        self.command_send
            .send(command)
            .map_err(|_| Error::SendError("audio output thread is not running".to_string()))
    }
}

impl OutputDevice for CpalOutput {
    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn sample_position(&self) -> u64 {
        self.state.sample_position.load(Ordering::Relaxed)
    }

    fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Relaxed)
    }

    fn play(&mut self, source: Box<dyn Source>) {
        assert_eq!(source.channel_count(), self.channel_count);
        assert_eq!(source.sample_rate(), self.sample_rate);
        if self.source_send.try_send(source).is_err() {
            log::error!("failed to pass source to the audio output");
        }
    }

    fn start(&mut self) -> Result<(), Error> {
        if self.is_running() {
            return Ok(());
        }
        let (reply_send, reply_recv) = bounded(1);
        self.send_command(StreamCommand::Start(reply_send))
            .map_err(|err| Error::EngineStartError(Box::new(err)))?;
        reply_recv
            .recv()
            .map_err(|err| Error::EngineStartError(Box::new(err)))??;
        self.state.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.state.running.store(false, Ordering::Relaxed);
        if let Err(err) = self.send_command(StreamCommand::Stop) {
            log::error!("failed to stop audio output: {err}");
        }
    }

    fn close(&mut self) {
        self.stop();
        if let Some(thread) = self.stream_thread.take() {
            let _ = self.send_command(StreamCommand::Close);
            if let Err(err) = thread.join() {
                log::error!(
                    "audio output thread panicked: {}",
                    panic_message::panic_message(&err)
                );
            }
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

// -------------------------------------------------------------------------------------------------

/// Handle stream commands until the device got closed or dropped.
fn run_stream(stream: &cpal::Stream, commands: &Receiver<StreamCommand>) {
    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Start(reply) => {
                log::debug!("starting audio output stream");
                let _ = reply.send(stream.play().map_err(Error::from));
            }
            StreamCommand::Stop => {
                log::debug!("stopping audio output stream");
                if let Err(err) = stream.pause() {
                    log::warn!("failed to pause audio output stream: {err}");
                }
            }
            StreamCommand::Close => break,
        }
    }
    let _ = stream.pause();
    log::debug!("audio output stream closed");
}

// -------------------------------------------------------------------------------------------------

/// Renders the installed source in the cpal stream callback.
struct Renderer {
    state: Arc<SharedState>,
    source_recv: Receiver<Box<dyn Source>>,
    source: Option<Box<dyn Source>>,
}

impl Renderer {
    fn render(&mut self, output: &mut [f32]) {
        if let Ok(source) = self.source_recv.try_recv() {
            self.source = Some(source);
        }
        let written = match self.source.as_mut() {
            Some(source) if self.state.running.load(Ordering::Relaxed) => {
                #[cfg(feature = "assert-allocs")]
                let written = assert_no_alloc(|| source.write(output));
                #[cfg(not(feature = "assert-allocs"))]
                let written = source.write(output);
                self.state
                    .sample_position
                    .fetch_add(output.len() as u64, Ordering::Relaxed);
                written
            }
            _ => 0,
        };
        output[written..].fill(0.0);
    }
}

// -------------------------------------------------------------------------------------------------

impl From<cpal::DefaultStreamConfigError> for Error {
    fn from(err: cpal::DefaultStreamConfigError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::SupportedStreamConfigsError> for Error {
    fn from(err: cpal::SupportedStreamConfigsError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::BuildStreamError> for Error {
    fn from(err: cpal::BuildStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::PlayStreamError> for Error {
    fn from(err: cpal::PlayStreamError) -> Error {
        Error::EngineStartError(Box::new(err))
    }
}
