//! Voice transport that plays on the local audio output using rodio.
//!
//! Used by the console harness in place of a chat platform voice gateway.
//! rodio's `OutputStream` is not `Send`, so every connection owns a
//! dedicated audio thread holding the stream; the connection handle talks to
//! it over a crossbeam command queue. Decoding happens on the caller's
//! thread so bad files are reported synchronously from `play`.

use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::catalog::SoundResource;
use super::error::SoundError;
use super::transport::{PlaybackDone, PlaybackEnd, VoiceConnection, VoiceTransport};
use crate::types::ChannelRef;

/// How often the audio thread checks whether the current sound finished.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

type FileDecoder = Decoder<BufReader<File>>;

enum AudioCommand {
    Play {
        source: FileDecoder,
        done: oneshot::Sender<PlaybackEnd>,
    },
    Stop,
    Close,
}

/// Transport backed by the default local output device.
#[derive(Debug, Clone, Default)]
pub struct LocalAudioTransport;

impl LocalAudioTransport {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VoiceTransport for LocalAudioTransport {
    async fn open_connection(
        &self,
        channel: &ChannelRef,
    ) -> Result<Arc<dyn VoiceConnection>, SoundError> {
        let (commands, queue) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name(format!("audio-{channel}"))
            .spawn(move || audio_thread(queue, ready_tx))
            .map_err(|e| SoundError::StreamError(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                debug!("Local audio connection opened for channel {}", channel);
                Ok(Arc::new(LocalConnection {
                    commands,
                    closed: AtomicBool::new(false),
                }))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SoundError::StreamError(
                "audio thread exited during startup".to_string(),
            )),
        }
    }
}

fn audio_thread(queue: Receiver<AudioCommand>, ready: oneshot::Sender<Result<(), SoundError>>) {
    let (_stream, handle): (OutputStream, OutputStreamHandle) = match OutputStream::try_default()
    {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(SoundError::DeviceNotAvailable(e.to_string())));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        // The opener gave up (timeout) before we were ready.
        return;
    }

    let mut current: Option<(Sink, oneshot::Sender<PlaybackEnd>)> = None;

    loop {
        match queue.recv_timeout(POLL_INTERVAL) {
            Ok(AudioCommand::Play { source, done }) => {
                interrupt(&mut current);
                match Sink::try_new(&handle) {
                    Ok(sink) => {
                        sink.append(source);
                        current = Some((sink, done));
                    }
                    Err(e) => {
                        warn!("Failed to create audio sink: {}", e);
                        let _ = done.send(PlaybackEnd::Interrupted);
                    }
                }
            }
            Ok(AudioCommand::Stop) => interrupt(&mut current),
            Ok(AudioCommand::Close) | Err(RecvTimeoutError::Disconnected) => {
                interrupt(&mut current);
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        if matches!(&current, Some((sink, _)) if sink.empty()) {
            if let Some((_, done)) = current.take() {
                let _ = done.send(PlaybackEnd::Finished);
            }
        }
    }

    debug!("Local audio thread exiting");
}

fn interrupt(current: &mut Option<(Sink, oneshot::Sender<PlaybackEnd>)>) {
    if let Some((sink, done)) = current.take() {
        sink.stop();
        let _ = done.send(PlaybackEnd::Interrupted);
    }
}

struct LocalConnection {
    commands: Sender<AudioCommand>,
    closed: AtomicBool,
}

impl VoiceConnection for LocalConnection {
    fn play(&self, sound: &SoundResource) -> Result<PlaybackDone, SoundError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SoundError::ConnectionClosed);
        }

        let file = File::open(&sound.path)
            .map_err(|e| SoundError::NotFound(format!("{}: {}", sound.path.display(), e)))?;
        let source =
            Decoder::new(BufReader::new(file)).map_err(|e| SoundError::DecodeError(e.to_string()))?;

        let (done, rx) = oneshot::channel();
        self.commands
            .send(AudioCommand::Play { source, done })
            .map_err(|_| SoundError::ConnectionClosed)?;

        debug!("Playing sound '{}'", sound.id);
        Ok(rx)
    }

    fn stop_playback(&self) {
        let _ = self.commands.send(AudioCommand::Stop);
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(AudioCommand::Close);
        }
    }
}

impl Drop for LocalConnection {
    fn drop(&mut self) {
        self.close();
    }
}
