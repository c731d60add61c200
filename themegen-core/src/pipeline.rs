use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use tokio::sync::mpsc;

use crate::config::ThemeConfig;
use crate::error::{StageFailure, ThemeError};
use crate::mapper::map_roles;
use crate::sampler::{decode, sample};
use crate::serializer::{serialize, GeneratedTheme};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Decoding,
    Sampling,
    Mapping,
    Serializing,
    Done,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Decoding => "decoding",
            Stage::Sampling => "sampling",
            Stage::Mapping => "mapping",
            Stage::Serializing => "serializing",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub enum PipelineEvent {
    /// The pipeline entered a stage. `Stage::Done` precedes a successful result.
    Stage(Stage),
    /// Terminal event; nothing follows it.
    Finished(Result<GeneratedTheme, StageFailure>),
}

/// Runs the whole pipeline on the current thread, reporting each stage to `on_stage`.
pub fn generate_theme(
    bytes: &[u8],
    name: &str,
    config: &ThemeConfig,
    mut on_stage: impl FnMut(Stage),
) -> Result<GeneratedTheme, StageFailure> {
    on_stage(Stage::Decoding);
    let image = decode(bytes).map_err(|e| StageFailure::new(Stage::Decoding, e))?;
    on_stage(Stage::Sampling);
    let palette =
        sample(&image, &config.sampler).map_err(|e| StageFailure::new(Stage::Sampling, e))?;
    on_stage(Stage::Mapping);
    let mapping =
        map_roles(&palette, config).map_err(|e| StageFailure::new(Stage::Mapping, e))?;
    on_stage(Stage::Serializing);
    let theme = serialize(&mapping, name, config)
        .map_err(|e| StageFailure::new(Stage::Serializing, e))?;
    on_stage(Stage::Done);
    Ok(theme)
}

/// Entry point for interactive callers.
///
/// Each `generate` call supersedes the previous one: once a newer request has been
/// issued, an older request never delivers another event, and it stops at its next
/// stage boundary. Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct ThemeGenerator {
    config: Arc<ThemeConfig>,
    latest: Arc<Mutex<u64>>,
}

impl ThemeGenerator {
    pub fn new(config: ThemeConfig) -> Self {
        Self {
            config: Arc::new(config),
            latest: Arc::new(Mutex::new(0)),
        }
    }

    pub fn config(&self) -> &ThemeConfig {
        &self.config
    }

    pub fn generate(&self, bytes: Vec<u8>) -> GenerationHandle {
        let name = self.config.theme_name.clone();
        self.generate_named(bytes, name)
    }

    pub fn generate_named(&self, bytes: Vec<u8>, name: impl Into<String>) -> GenerationHandle {
        let sequence = {
            let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
            *latest += 1;
            *latest
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let outbox = Outbox {
            sequence,
            latest: Arc::clone(&self.latest),
            tx,
        };
        let config = Arc::clone(&self.config);
        let name = name.into();
        debug!("starting generation #{sequence} ({} bytes)", bytes.len());

        tokio::spawn(run(bytes, name, config, outbox));

        GenerationHandle {
            sequence,
            latest: Arc::clone(&self.latest),
            rx,
        }
    }
}

/// Event stream of one generation request.
#[derive(Debug)]
pub struct GenerationHandle {
    sequence: u64,
    latest: Arc<Mutex<u64>>,
    rx: mpsc::UnboundedReceiver<PipelineEvent>,
}

impl GenerationHandle {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Next event, or `None` once the stream ended. A stream that ends without
    /// `Finished` belongs to a superseded request. Events still buffered when a newer
    /// request starts are discarded.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        let event = self.rx.recv().await?;
        if *self.latest.lock().unwrap_or_else(PoisonError::into_inner) != self.sequence {
            debug!("dropping buffered events of superseded generation #{}", self.sequence);
            self.rx.close();
            return None;
        }
        Some(event)
    }

    /// Skips stage events and returns the result, or `None` if superseded.
    pub async fn finish(mut self) -> Option<Result<GeneratedTheme, StageFailure>> {
        while let Some(event) = self.next_event().await {
            if let PipelineEvent::Finished(result) = event {
                return Some(result);
            }
        }
        None
    }
}

/// Delivers events only while its request is the latest one.
struct Outbox {
    sequence: u64,
    latest: Arc<Mutex<u64>>,
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl Outbox {
    /// Compare and send under one lock, so a request issued after the comparison can
    /// never see an older event arrive. Returns false if the run should stop.
    fn deliver(&self, event: PipelineEvent) -> bool {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if *latest != self.sequence {
            debug!("generation #{} superseded by #{}", self.sequence, *latest);
            return false;
        }
        self.tx.send(event).is_ok()
    }

    fn enter(&self, stage: Stage) -> bool {
        self.deliver(PipelineEvent::Stage(stage))
    }

    fn fail(&self, failure: StageFailure) {
        info!("generation #{} failed: {failure}", self.sequence);
        self.deliver(PipelineEvent::Finished(Err(failure)));
    }
}

async fn run(bytes: Vec<u8>, name: String, config: Arc<ThemeConfig>, outbox: Outbox) {
    if !outbox.enter(Stage::Decoding) {
        return;
    }
    let image = match run_stage(Stage::Decoding, move || decode(&bytes)).await {
        Ok(image) => image,
        Err(failure) => return outbox.fail(failure),
    };

    if !outbox.enter(Stage::Sampling) {
        return;
    }
    let sampler_config = config.sampler.clone();
    let sampling = run_stage(Stage::Sampling, move || sample(&image, &sampler_config));
    let palette = match sampling.await {
        Ok(palette) => palette,
        Err(failure) => return outbox.fail(failure),
    };

    if !outbox.enter(Stage::Mapping) {
        return;
    }
    let mapping_config = Arc::clone(&config);
    let mapping_stage = run_stage(Stage::Mapping, move || map_roles(&palette, &mapping_config));
    let mapping = match mapping_stage.await {
        Ok(mapping) => mapping,
        Err(failure) => return outbox.fail(failure),
    };

    if !outbox.enter(Stage::Serializing) {
        return;
    }
    let serializing = run_stage(Stage::Serializing, move || serialize(&mapping, &name, &config));
    let theme = match serializing.await {
        Ok(theme) => theme,
        Err(failure) => return outbox.fail(failure),
    };

    if outbox.enter(Stage::Done) {
        info!("generation #{} finished", outbox.sequence);
        outbox.deliver(PipelineEvent::Finished(Ok(theme)));
    }
}

/// Runs one CPU-bound stage off the async worker. A panic inside the stage surfaces as
/// `ThemeError::Pipeline`.
async fn run_stage<T, F>(stage: Stage, work: F) -> Result<T, StageFailure>
where
    F: FnOnce() -> Result<T, ThemeError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(|error| StageFailure::new(stage, error)),
        Err(join_error) => Err(StageFailure::new(
            stage,
            ThemeError::Pipeline {
                stage,
                reason: join_error.to_string(),
            },
        )),
    }
}
