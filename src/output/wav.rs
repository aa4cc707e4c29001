use std::{
    fs::File,
    io::BufWriter,
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::{error::Error, output::OutputDevice, source::Source};

// -------------------------------------------------------------------------------------------------

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNEL_COUNT: usize = 2;

const BLOCK_FRAMES: usize = 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(2);

// -------------------------------------------------------------------------------------------------

enum WriterCommand {
    Install(Box<dyn Source>),
    Start(Instant),
    Stop,
    Close,
}

#[derive(Default)]
struct WriterState {
    running: AtomicBool,
    finalized: AtomicBool,
    sample_position: AtomicU64,
}

// -------------------------------------------------------------------------------------------------

/// Audio output device which records into a 32bit float wav file instead of playing back.
///
/// Recording runs at real-time pace, so the whir delays end up in the file exactly as they
/// would be heard. Only started periods get recorded: stopping the device pauses the recording.
pub struct WavOutput {
    channel_count: usize,
    sample_rate: u32,
    state: Arc<WriterState>,
    command_send: Sender<WriterCommand>,
    writer_thread: Option<thread::JoinHandle<()>>,
}

impl WavOutput {
    /// Open a stereo, 44.1kHz wav output without a length limit.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::open_with_specs(path, DEFAULT_SAMPLE_RATE, DEFAULT_CHANNEL_COUNT, None)
    }

    /// Open a wav output with the given format. When a `max_duration` is given, recording stops
    /// and the file gets finalized as soon as that much audio got written. Else the file gets
    /// finalized when the device gets closed.
    pub fn open_with_specs<P: AsRef<Path>>(
        path: P,
        sample_rate: u32,
        channel_count: usize,
        max_duration: Option<Duration>,
    ) -> Result<Self, Error> {
        if sample_rate == 0 || channel_count == 0 || channel_count > u16::MAX as usize {
            return Err(Error::ParameterError(format!(
                "invalid wav format: {channel_count} channels at {sample_rate}Hz"
            )));
        }
        let spec = WavSpec {
            channels: channel_count as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let file = WavWriter::create(path.as_ref(), spec)
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        log::info!("recording audio output into '{}'", path.as_ref().display());

        let max_frames = max_duration
            .map(|duration| (duration.as_secs_f64() * sample_rate as f64).round() as u64)
            .unwrap_or(u64::MAX);
        let state = Arc::new(WriterState::default());
        let (command_send, command_recv) = bounded(16);
        let mut recorder = Recorder {
            file: Some(file),
            state: Arc::clone(&state),
            source: None,
            block: vec![0.0; BLOCK_FRAMES * channel_count],
            channel_count,
            sample_rate,
            started_at: None,
            frames_since_start: 0,
            recorded_frames: 0,
            max_frames,
        };
        let writer_thread = thread::Builder::new()
            .name("aetheryte_wav_output".to_string())
            .spawn(move || {
                if let Err(err) = audio_thread_priority::promote_current_thread_to_real_time(
                    BLOCK_FRAMES as u32,
                    sample_rate,
                ) {
                    log::warn!("failed to promote wav writer thread to audio priority: {err}");
                }
                recorder.run(command_recv);
            })?;

        Ok(Self {
            channel_count,
            sample_rate,
            state,
            command_send,
            writer_thread: Some(writer_thread),
        })
    }

    fn send_command(&self, command: WriterCommand) -> Result<(), Error> {
        self.command_send
            .send(command)
            .map_err(|_| Error::SendError("wav writer thread is not running".to_string()))
    }
}

impl OutputDevice for WavOutput {
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
        if let Err(err) = self.send_command(WriterCommand::Install(source)) {
            log::error!("failed to pass source to the wav output: {err}");
        }
    }

    fn start(&mut self) -> Result<(), Error> {
        if self.state.finalized.load(Ordering::Relaxed) {
            return Err(Error::EngineStartError(
                "wav output file got finalized".into(),
            ));
        }
        if self.is_running() {
            return Ok(());
        }
        self.send_command(WriterCommand::Start(Instant::now()))
            .map_err(|err| Error::EngineStartError(Box::new(err)))?;
        self.state.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) {
        if self.is_running() {
            self.state.running.store(false, Ordering::Relaxed);
            let _ = self.send_command(WriterCommand::Stop);
        }
    }

    fn close(&mut self) {
        self.stop();
        if let Some(thread) = self.writer_thread.take() {
            let _ = self.send_command(WriterCommand::Close);
            if let Err(err) = thread.join() {
                log::error!(
                    "wav writer thread panicked: {}",
                    panic_message::panic_message(&err)
                );
            }
        }
    }
}

impl Drop for WavOutput {
    fn drop(&mut self) {
        self.close();
    }
}

// -------------------------------------------------------------------------------------------------

/// Owns the wav file and the source, and records blocks of audio whenever they are due.
struct Recorder {
    file: Option<WavWriter<BufWriter<File>>>,
    state: Arc<WriterState>,
    source: Option<Box<dyn Source>>,
    block: Vec<f32>,
    channel_count: usize,
    sample_rate: u32,
    started_at: Option<Instant>,
    frames_since_start: u64,
    recorded_frames: u64,
    max_frames: u64,
}

impl Recorder {
    fn run(&mut self, commands: Receiver<WriterCommand>) {
        loop {
            let command = if self.started_at.is_some() {
                match commands.recv_timeout(POLL_INTERVAL) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };
            match command {
                Some(WriterCommand::Install(source)) => self.source = Some(source),
                Some(WriterCommand::Start(time)) => {
                    self.started_at = Some(time);
                    self.frames_since_start = 0;
                }
                Some(WriterCommand::Stop) => {
                    // record everything up to now, then pause
                    self.record_due_blocks();
                    self.started_at = None;
                }
                Some(WriterCommand::Close) => break,
                None => (),
            }
            self.record_due_blocks();
            if self.file.is_none() {
                break;
            }
        }
        self.finalize();
    }

    fn record_due_blocks(&mut self) {
        let Some(started_at) = self.started_at else {
            return;
        };
        let due_frames = (started_at.elapsed().as_secs_f64() * self.sample_rate as f64) as u64;
        while self.frames_since_start + BLOCK_FRAMES as u64 <= due_frames {
            if let Err(err) = self.record_block() {
                log::error!("failed to write wav output: {err}");
                self.finalize();
                return;
            }
            if self.recorded_frames >= self.max_frames {
                log::info!("wav output reached its max duration");
                self.finalize();
                return;
            }
        }
    }

    fn record_block(&mut self) -> Result<(), Error> {
        let written = match self.source.as_mut() {
            Some(source) => source.write(&mut self.block),
            None => 0,
        };
        self.block[written..].fill(0.0);

        let remaining_frames = self.max_frames - self.recorded_frames;
        let frames = (BLOCK_FRAMES as u64).min(remaining_frames) as usize;
        if let Some(file) = self.file.as_mut() {
            for sample in &self.block[..frames * self.channel_count] {
                file.write_sample(*sample)
                    .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
            }
        }
        self.frames_since_start += BLOCK_FRAMES as u64;
        self.recorded_frames += frames as u64;
        self.state.sample_position.fetch_add(
            (frames * self.channel_count) as u64,
            Ordering::Relaxed,
        );
        Ok(())
    }

    fn finalize(&mut self) {
        self.started_at = None;
        self.state.running.store(false, Ordering::Relaxed);
        self.state.finalized.store(true, Ordering::Relaxed);
        if let Some(file) = self.file.take() {
            match file.finalize() {
                Ok(()) => log::info!("wav output finalized"),
                Err(err) => log::error!("failed to finalize wav output: {err}"),
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f32);

    impl Source for Constant {
        fn write(&mut self, output: &mut [f32]) -> usize {
            output.fill(self.0);
            output.len()
        }
        fn channel_count(&self) -> usize {
            1
        }
        fn sample_rate(&self) -> u32 {
            8000
        }
    }

    #[test]
    fn records_started_periods() {
        let path = std::env::temp_dir().join(format!(
            "aetheryte-wav-output-{}.wav",
            crate::utils::unique_usize_id()
        ));
        let mut output =
            WavOutput::open_with_specs(&path, 8000, 1, Some(Duration::from_millis(256))).unwrap();
        output.play(Box::new(Constant(0.25)));
        assert!(!output.is_running());
        output.start().unwrap();
        assert!(output.is_running());

        // 256 ms at 8kHz are two blocks
        let deadline = Instant::now() + Duration::from_secs(5);
        while output.sample_position() < 2048 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(output.sample_position(), 2048);
        output.close();
        assert!(matches!(output.start(), Err(Error::EngineStartError(_))));

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples = reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(samples.len(), 2048);
        assert!(samples.iter().all(|s| *s == 0.25));
        std::fs::remove_file(&path).unwrap();
    }
}
