//! Voice separation pipeline
//!
//! Runs one request end to end:
//! 1. Decode the input (via per-request scratch space)
//! 2. Segment (segment policy only)
//! 3. Estimate pitch per frame or per segment
//! 4. Analyze the pitch distribution (detected-peaks policy only)
//! 5. Build voice masks
//! 6. Smooth frame masks
//! 7. Synthesize voice tracks
//! 8. Encode each voice
//!
//! Any stage error aborts the run and is recorded with the stage it came
//! from. Cancellation is cooperative and checked between stages.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use vx_core::Waveform;
use vx_dsp::MovingAverage;
use vx_pitch::detection::PeakPickingDetector;
use vx_pitch::distribution::DistributionAnalyzer;
use vx_pitch::segment::Segmenter;
use vx_pitch::PitchEstimate;

use crate::config::SeparationConfig;
use crate::decoder::AudioDecoder;
use crate::encoder::encoder_for;
use crate::error::{SeparationError, SeparationResult};
use crate::job::{JobResult, SeparationJob};
use crate::mask::{self, MaskPolicy, PeakContext, VoiceMask, TARGET_VOICE};
use crate::scratch::ScratchSpace;
use crate::synthesis::{Synthesizer, VoiceTrack};

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Pipeline execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Decoding,
    Segmenting,
    Estimating,
    DistributionAnalysis,
    MaskBuilding,
    Smoothing,
    Synthesizing,
    Encoding,
    Done,
    Failed,
    Cancelled,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Idle
    }
}

impl PipelineState {
    /// Approximate fraction of the run completed on entering this state
    pub fn weight(&self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Decoding => 0.05,
            Self::Segmenting => 0.15,
            Self::Estimating => 0.25,
            Self::DistributionAnalysis => 0.55,
            Self::MaskBuilding => 0.60,
            Self::Smoothing => 0.65,
            Self::Synthesizing => 0.70,
            Self::Encoding => 0.80,
            Self::Done => 1.0,
            Self::Failed | Self::Cancelled => 0.0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROGRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot reported at every stage boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub state: PipelineState,
    pub message: String,
    /// 0.0 - 1.0
    pub overall_progress: f64,
    pub elapsed_ms: u64,
}

impl Default for PipelineProgress {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            message: String::new(),
            overall_progress: 0.0,
            elapsed_ms: 0,
        }
    }
}

/// Receives progress at stage boundaries. Observers never affect results.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &PipelineProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&PipelineProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &PipelineProgress) {
        self(progress)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Masks and rendered tracks for one waveform
#[derive(Debug, Clone)]
pub struct Separation {
    pub sample_rate: u32,
    pub num_samples: usize,
    /// Smoothed masks, one per voice
    pub masks: Vec<VoiceMask>,
    pub tracks: Vec<VoiceTrack>,
    /// Present for the detected-peaks policy
    pub peaks: Option<PeakContext>,
}

/// One encoded voice buffer
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVoice {
    pub label: String,
    pub extension: &'static str,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub num_samples: usize,
}

/// Result of a full request
#[derive(Debug, Clone)]
pub struct SeparationOutput {
    pub sample_rate: u32,
    pub num_samples: usize,
    pub policy: MaskPolicy,
    pub voices: Vec<EncodedVoice>,
    pub peaks: Option<PeakContext>,
}

impl SeparationOutput {
    pub fn voice(&self, label: &str) -> Option<&EncodedVoice> {
        self.voices.iter().find(|v| v.label == label)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEPARATION PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Single-request separation pipeline
pub struct SeparationPipeline {
    config: SeparationConfig,
    observer: Option<Box<dyn ProgressObserver>>,

    state: Arc<RwLock<PipelineState>>,
    failed_stage: Arc<RwLock<Option<PipelineState>>>,
    cancelled: Arc<AtomicBool>,
    start_time: Option<Instant>,
}

impl SeparationPipeline {
    /// Create pipeline; the configuration is validated here
    pub fn new(config: SeparationConfig) -> SeparationResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            observer: None,
            state: Arc::new(RwLock::new(PipelineState::Idle)),
            failed_stage: Arc::new(RwLock::new(None)),
            cancelled: Arc::new(AtomicBool::new(false)),
            start_time: None,
        })
    }

    /// Attach a progress observer
    pub fn with_observer<O: ProgressObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    /// Request cancellation; takes effect at the next stage boundary
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Shared cancellation token, settable from any thread
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Clear a previous cancellation so the pipeline can run again
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn state(&self) -> PipelineState {
        *self.state.read()
    }

    /// Stage that was running when the last run failed
    pub fn failed_stage(&self) -> Option<PipelineState> {
        *self.failed_stage.read()
    }

    pub fn progress(&self) -> PipelineProgress {
        let state = self.state();
        PipelineProgress {
            state,
            message: format!("{:?}", state),
            overall_progress: state.weight(),
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }

    fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn set_state(&self, state: PipelineState, message: impl Into<String>) {
        *self.state.write() = state;
        let message = message.into();
        log::info!("[{:?}] {}", state, message);

        if let Some(observer) = &self.observer {
            observer.on_progress(&PipelineProgress {
                state,
                message,
                overall_progress: state.weight(),
                elapsed_ms: self.elapsed().as_millis() as u64,
            });
        }
    }

    fn checkpoint(&self) -> SeparationResult<()> {
        if self.is_cancelled() {
            Err(SeparationError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn begin(&mut self) {
        self.start_time = Some(Instant::now());
        *self.failed_stage.write() = None;
        *self.state.write() = PipelineState::Idle;
    }

    /// Record the terminal state of a run
    fn finish<T>(&self, result: SeparationResult<T>) -> SeparationResult<T> {
        match &result {
            Ok(_) => self.set_state(PipelineState::Done, "Complete"),
            Err(SeparationError::Cancelled) => {
                self.set_state(PipelineState::Cancelled, "Cancelled");
            }
            Err(e) => {
                let stage = self.state();
                *self.failed_stage.write() = Some(stage);
                log::error!("Separation failed during {:?}: {}", stage, e);
                self.set_state(PipelineState::Failed, e.to_string());
            }
        }
        result
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Entry points
    // ───────────────────────────────────────────────────────────────────────────

    /// Separate compressed audio bytes into encoded voice buffers.
    ///
    /// `extension` is an optional container hint such as `"mp3"`.
    pub fn separate(
        &mut self,
        bytes: &[u8],
        extension: Option<&str>,
    ) -> SeparationResult<SeparationOutput> {
        self.begin();
        let result = self.run_separate(bytes, extension);
        self.finish(result)
    }

    /// Separate an audio file
    pub fn separate_file(&mut self, path: &Path) -> SeparationResult<SeparationOutput> {
        let bytes = std::fs::read(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        self.separate(&bytes, extension)
    }

    /// Separate an already decoded waveform, without encoding
    pub fn separate_waveform(&mut self, waveform: &Waveform) -> SeparationResult<Separation> {
        self.begin();
        let result = self.run_waveform(waveform);
        self.finish(result)
    }

    /// Decode and analyze the pitch distribution only
    pub fn analyze(&mut self, bytes: &[u8], extension: Option<&str>) -> SeparationResult<PeakContext> {
        self.begin();
        let result = self.run_analyze(bytes, extension);
        self.finish(result)
    }

    /// Analyze an already decoded waveform
    pub fn analyze_waveform(&mut self, waveform: &Waveform) -> SeparationResult<PeakContext> {
        self.begin();
        let result = self.estimate_distribution(waveform);
        self.finish(result)
    }

    /// Run a job and write its voice files
    pub fn process_job(&mut self, job: &SeparationJob) -> JobResult {
        let started = Instant::now();
        match self.run_job(job) {
            Ok(outputs) => JobResult::success(job.id, outputs, started.elapsed()),
            Err(e) => JobResult::failure(job.id, &e, started.elapsed()),
        }
    }

    fn run_job(&mut self, job: &SeparationJob) -> SeparationResult<Vec<std::path::PathBuf>> {
        let bytes = std::fs::read(&job.input_path)?;
        let output = self.separate(&bytes, job.input_extension())?;

        std::fs::create_dir_all(&job.output_dir)?;
        let mut written = Vec::with_capacity(output.voices.len());
        for voice in &output.voices {
            let path = job.output_path(&voice.label, voice.extension);
            std::fs::write(&path, &voice.bytes)?;
            log::info!("Wrote {} ({} bytes)", path.display(), voice.bytes.len());
            written.push(path);
        }
        Ok(written)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Stages
    // ───────────────────────────────────────────────────────────────────────────

    fn run_separate(
        &mut self,
        bytes: &[u8],
        extension: Option<&str>,
    ) -> SeparationResult<SeparationOutput> {
        let waveform = self.decode(bytes, extension)?;
        let separation = self.run_waveform(&waveform)?;

        self.set_state(
            PipelineState::Encoding,
            format!("Encoding {} voice(s) as {}", separation.tracks.len(), self.config.output.extension()),
        );
        let encoder = encoder_for(&self.config.output)?;
        let mut voices = Vec::with_capacity(separation.tracks.len());
        for track in &separation.tracks {
            self.checkpoint()?;
            voices.push(EncodedVoice {
                label: track.label.clone(),
                extension: encoder.extension(),
                mime_type: encoder.mime_type(),
                bytes: encoder.encode(track)?,
                num_samples: track.len(),
            });
        }

        Ok(SeparationOutput {
            sample_rate: separation.sample_rate,
            num_samples: separation.num_samples,
            policy: self.config.policy,
            voices,
            peaks: separation.peaks,
        })
    }

    fn run_analyze(&mut self, bytes: &[u8], extension: Option<&str>) -> SeparationResult<PeakContext> {
        let waveform = self.decode(bytes, extension)?;
        self.estimate_distribution(&waveform)
    }

    /// Spool the input into scratch space and decode it from there
    fn decode(&self, bytes: &[u8], extension: Option<&str>) -> SeparationResult<Waveform> {
        self.set_state(PipelineState::Decoding, format!("Decoding {} bytes", bytes.len()));
        self.checkpoint()?;
        if bytes.is_empty() {
            return Err(SeparationError::EmptyAudio);
        }

        let scratch = ScratchSpace::new(self.config.scratch_dir.as_deref())?;
        let name = match extension {
            Some(ext) => format!("input.{}", ext),
            None => "input".to_string(),
        };
        let path = scratch.spool(&name, bytes)?;
        let waveform = AudioDecoder::decode_resampled(&path, self.config.target_sample_rate)?;

        if waveform.is_empty() {
            return Err(SeparationError::EmptyAudio);
        }
        Ok(waveform)
    }

    fn detector(&self, sample_rate: u32) -> SeparationResult<PeakPickingDetector> {
        Ok(PeakPickingDetector::new(self.config.analysis, sample_rate)?)
    }

    fn estimate_frames(
        &self,
        detector: &PeakPickingDetector,
        waveform: &Waveform,
    ) -> SeparationResult<Vec<PitchEstimate>> {
        self.checkpoint()?;
        self.set_state(PipelineState::Estimating, "Tracking frame pitch");
        let track = detector.detect_frames(&waveform.samples);

        let voiced = track
            .iter()
            .filter(|e| e.is_valid(self.config.analysis.min_magnitude))
            .count();
        log::debug!("{} of {} frames voiced", voiced, track.len());
        Ok(track)
    }

    fn estimate_distribution(&self, waveform: &Waveform) -> SeparationResult<PeakContext> {
        if waveform.is_empty() {
            return Err(SeparationError::EmptyAudio);
        }
        let detector = self.detector(waveform.sample_rate)?;
        let track = self.estimate_frames(&detector, waveform)?;
        self.distribution(waveform.sample_rate, &track)
    }

    fn distribution(&self, sample_rate: u32, track: &[PitchEstimate]) -> SeparationResult<PeakContext> {
        self.checkpoint()?;
        self.set_state(PipelineState::DistributionAnalysis, "Finding dominant pitches");

        let analyzer = DistributionAnalyzer::new(self.config.distribution)?;
        let analysis = analyzer.analyze(track, self.config.analysis.min_magnitude);
        for (i, peak) in analysis.peaks.iter().enumerate() {
            log::info!(
                "Peak {}: {:.1} Hz (height {:.2}, prominence {:.2})",
                i + 1,
                peak.frequency,
                peak.height,
                peak.prominence
            );
        }
        Ok(PeakContext::new(sample_rate, track.len(), analysis))
    }

    fn run_waveform(&mut self, waveform: &Waveform) -> SeparationResult<Separation> {
        if waveform.is_empty() {
            return Err(SeparationError::EmptyAudio);
        }

        let (mut masks, peaks) = self.build_masks(waveform)?;

        self.checkpoint()?;
        self.set_state(
            PipelineState::Smoothing,
            format!("Smoothing masks (window {})", self.config.smoothing.window),
        );
        let smoother = MovingAverage::new(self.config.smoothing.window);
        for mask in &mut masks {
            mask.smooth(&smoother);
        }

        self.checkpoint()?;
        self.set_state(
            PipelineState::Synthesizing,
            format!("Rendering {} voice(s)", masks.len()),
        );
        let tracks = Synthesizer::render_all(waveform, &masks);

        Ok(Separation {
            sample_rate: waveform.sample_rate,
            num_samples: waveform.len(),
            masks,
            tracks,
            peaks,
        })
    }

    /// Unsmoothed voice masks for the configured policy
    fn build_masks(
        &self,
        waveform: &Waveform,
    ) -> SeparationResult<(Vec<VoiceMask>, Option<PeakContext>)> {
        let layout = self.config.layout()?;
        let detector = self.detector(waveform.sample_rate)?;
        let min_magnitude = self.config.analysis.min_magnitude;

        match self.config.policy {
            MaskPolicy::SegmentThreshold { split_hz } => {
                self.checkpoint()?;
                self.set_state(PipelineState::Segmenting, "Finding non-silent segments");
                let segmenter = Segmenter::new(layout, self.config.segmentation.top_db)?;
                let segments = segmenter.split(&waveform.samples);

                self.checkpoint()?;
                self.set_state(
                    PipelineState::Estimating,
                    format!("Averaging pitch over {} segment(s)", segments.len()),
                );
                let pitched: Vec<_> = segments
                    .into_par_iter()
                    .map(|segment| (segment, detector.segment_pitch(&waveform.samples, segment)))
                    .collect();
                for (segment, pitch) in &pitched {
                    log::debug!(
                        "Segment {}..{}: {}",
                        segment.start,
                        segment.end,
                        pitch.map_or("no pitch".to_string(), |p| format!("{:.1} Hz", p))
                    );
                }

                self.checkpoint()?;
                self.set_state(PipelineState::MaskBuilding, format!("Splitting at {} Hz", split_hz));
                let masks = mask::segment_threshold_masks(waveform.len(), &pitched, split_hz);
                Ok((masks.into(), None))
            }
            MaskPolicy::FrameThreshold { split_hz } => {
                let track = self.estimate_frames(&detector, waveform)?;

                self.checkpoint()?;
                self.set_state(PipelineState::MaskBuilding, format!("Splitting at {} Hz", split_hz));
                let masks = mask::frame_threshold_masks(&track, layout, split_hz, min_magnitude);
                Ok((masks.into(), None))
            }
            MaskPolicy::TargetBand {
                target_hz,
                tolerance_hz,
            } => {
                let track = self.estimate_frames(&detector, waveform)?;

                self.checkpoint()?;
                self.set_state(
                    PipelineState::MaskBuilding,
                    format!("Selecting {} +/- {} Hz", target_hz, tolerance_hz),
                );
                let mask = mask::target_band_mask(
                    TARGET_VOICE,
                    &track,
                    layout,
                    target_hz,
                    tolerance_hz,
                    min_magnitude,
                );
                Ok((vec![mask], None))
            }
            MaskPolicy::DetectedPeaks { tolerance_hz } => {
                let track = self.estimate_frames(&detector, waveform)?;
                let context = self.distribution(waveform.sample_rate, &track)?;

                self.checkpoint()?;
                self.set_state(
                    PipelineState::MaskBuilding,
                    format!("Building {} peak band(s)", context.peaks().len()),
                );
                if context.peaks().is_empty() {
                    log::warn!("No pitch peaks found; no voices will be produced");
                }
                let masks =
                    mask::peak_band_masks(&context, &track, layout, tolerance_hz, min_magnitude);
                Ok((masks, Some(context)))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH PROCESSOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs independent jobs in parallel, one pipeline per job
pub struct BatchProcessor {
    config: SeparationConfig,
    max_parallel: usize,
}

impl BatchProcessor {
    pub fn new(config: SeparationConfig) -> SeparationResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            max_parallel: rayon::current_num_threads(),
        })
    }

    /// Set max parallel jobs
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max.max(1);
        self
    }

    /// Process all jobs; results keep the job order
    pub fn process_all(&self, jobs: &[SeparationJob]) -> Vec<JobResult> {
        let run = |job: &SeparationJob| match SeparationPipeline::new(self.config.clone()) {
            Ok(mut pipeline) => pipeline.process_job(job),
            Err(e) => JobResult::failure(job.id, &e, Duration::ZERO),
        };

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_parallel)
            .build()
        {
            Ok(pool) => pool.install(|| jobs.par_iter().map(run).collect()),
            Err(e) => {
                log::warn!("Thread pool unavailable ({}), running jobs sequentially", e);
                jobs.iter().map(run).collect()
            }
        }
    }
}
