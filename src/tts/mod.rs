//! TTS fan-out: blocking synthesis off the event loop
//!
//! Synthesis is a blocking, high-latency HTTP call; the gateway's event loop
//! must never wait on it. A small pool of plain worker threads pulls jobs
//! from a shared injector queue, synthesizes, and pushes finished clips onto
//! a thread-safe completion queue. One consumer task on the runtime drains
//! completions and broadcasts `tts_audio` to the owning room.
//!
//! Clips are delivered in completion order, each tagged with its
//! `sentence_index` - the client reassembles; the server never reorders.
//! A failed synthesis drops that one sentence. Clips for rooms that died in
//! the meantime are discarded at the store lookup.

use base64::Engine;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::normalize_base_url;
use crate::gateway::messages::{Outbound, ServerMessage};
use crate::rooms::RoomStore;

/// One synthesis request.
#[derive(Debug, Clone)]
pub struct TtsJob {
    pub room: String,
    pub message_id: String,
    pub sentence_index: u32,
    pub total_sentences: u32,
    pub text: String,
    pub voice: String,
}

/// One finished clip, an opaque audio blob.
#[derive(Debug)]
struct TtsClip {
    room: String,
    message_id: String,
    sentence_index: u32,
    audio: Vec<u8>,
}

/// Blocking synthesis backend. The trait exists so tests can fake the
/// provider; production uses [`HttpSynthesizer`].
pub trait Synthesizer: Send + Sync + 'static {
    fn synthesize(&self, text: &str, voice: &str) -> anyhow::Result<Vec<u8>>;
}

/// OpenAI-style `/audio/speech` provider. The blocking client is built
/// lazily inside a worker thread, never on the runtime.
pub struct HttpSynthesizer {
    endpoint: String,
    api_key: String,
    model: String,
    client: OnceLock<reqwest::blocking::Client>,
}

impl HttpSynthesizer {
    pub fn new(base_url: &str, api_key: String, model: String) -> Self {
        Self {
            endpoint: format!("{}/audio/speech", normalize_base_url(base_url)),
            api_key,
            model,
            client: OnceLock::new(),
        }
    }
}

impl Synthesizer for HttpSynthesizer {
    fn synthesize(&self, text: &str, voice: &str) -> anyhow::Result<Vec<u8>> {
        let client = self.client.get_or_init(reqwest::blocking::Client::new);
        let response = client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "voice": voice,
                "input": text,
            }))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("TTS provider returned {}", status);
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Handle for enqueueing synthesis work.
#[derive(Clone)]
pub struct TtsFanout {
    jobs: std_mpsc::Sender<TtsJob>,
    default_voice: String,
}

impl TtsFanout {
    /// Spawn the worker pool and the broadcast consumer.
    pub fn spawn<S: Synthesizer>(
        synthesizer: Arc<S>,
        workers: usize,
        default_voice: String,
        store: Arc<RoomStore>,
    ) -> Self {
        let (job_tx, job_rx) = std_mpsc::channel::<TtsJob>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (clip_tx, clip_rx) = mpsc::unbounded_channel::<TtsClip>();

        for worker_id in 0..workers.max(1) {
            let job_rx = Arc::clone(&job_rx);
            let clip_tx = clip_tx.clone();
            let synthesizer = Arc::clone(&synthesizer);
            std::thread::Builder::new()
                .name(format!("tts-worker-{}", worker_id))
                .spawn(move || worker_loop(worker_id, &job_rx, &clip_tx, synthesizer.as_ref()))
                .ok();
        }

        tokio::spawn(consumer_loop(clip_rx, store));
        info!(workers = workers.max(1), "TTS fan-out started");

        Self {
            jobs: job_tx,
            default_voice,
        }
    }

    /// Queue one sentence for synthesis. Never blocks.
    pub fn enqueue(&self, mut job: TtsJob) {
        if job.voice.is_empty() {
            job.voice = self.default_voice.clone();
        }
        if self.jobs.send(job).is_err() {
            warn!("TTS worker pool is gone, dropping synthesis request");
        }
    }
}

/// Worker thread: block on the injector queue, synthesize, push the clip.
fn worker_loop<S: Synthesizer + ?Sized>(
    worker_id: usize,
    jobs: &Mutex<std_mpsc::Receiver<TtsJob>>,
    clips: &mpsc::UnboundedSender<TtsClip>,
    synthesizer: &S,
) {
    loop {
        // Take one job while holding the lock, then release before the
        // blocking synthesis call so the pool stays parallel.
        let job = {
            let Ok(guard) = jobs.lock() else { return };
            match guard.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };

        match synthesizer.synthesize(&job.text, &job.voice) {
            Ok(audio) => {
                let clip = TtsClip {
                    room: job.room,
                    message_id: job.message_id,
                    sentence_index: job.sentence_index,
                    audio,
                };
                if clips.send(clip).is_err() {
                    return;
                }
            }
            Err(e) => {
                // One lost sentence, not a broken session.
                warn!(
                    worker = worker_id,
                    room = %job.room,
                    message_id = %job.message_id,
                    sentence = job.sentence_index,
                    error = %e,
                    "TTS synthesis failed, sentence dropped"
                );
            }
        }
    }
}

/// Runtime consumer: drain finished clips and broadcast them to their rooms.
async fn consumer_loop(mut clips: mpsc::UnboundedReceiver<TtsClip>, store: Arc<RoomStore>) {
    while let Some(clip) = clips.recv().await {
        let Some(handle) = store.get(&clip.room) else {
            debug!(room = %clip.room, "room gone, dropping TTS clip");
            continue;
        };
        let audio_base64 = base64::engine::general_purpose::STANDARD.encode(&clip.audio);
        let _ = handle.events.send(Outbound::room(ServerMessage::TtsAudio {
            message_id: clip.message_id,
            sentence_index: clip.sentence_index,
            audio_base64,
        }));
    }
}
