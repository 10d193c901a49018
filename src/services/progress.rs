//! Progress reporting service
//!
//! This module separates progress reporting concerns from business logic,
//! allowing different frontends to implement their own progress handling.

use crate::types::ProcessingTimings;
use instant::Instant;
use std::sync::Arc;

/// Progress stages during background removal processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Waiting for the runtime and creating the inference session
    Initialization,
    /// Loading and decoding input image
    ImageLoading,
    /// Resampling to the working size and building the input tensor
    Preprocessing,
    /// Running model inference
    Inference,
    /// Thresholding saliency into a binary mask
    MaskGeneration,
    /// Keeping the seeded or largest region
    RegionSelection,
    /// Softening mask edges
    Feathering,
    /// Applying alpha and encoding the PNG
    Compositing,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Initialization => "Initializing model and backend",
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::Preprocessing => "Preprocessing image",
            ProcessingStage::Inference => "Running saliency inference",
            ProcessingStage::MaskGeneration => "Generating foreground mask",
            ProcessingStage::RegionSelection => "Selecting subject region",
            ProcessingStage::Feathering => "Feathering mask edges",
            ProcessingStage::Compositing => "Compositing and encoding PNG",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Initialization => 5,
            ProcessingStage::ImageLoading => 10,
            ProcessingStage::Preprocessing => 20,
            ProcessingStage::Inference => 60,
            ProcessingStage::MaskGeneration => 75,
            ProcessingStage::RegionSelection => 85,
            ProcessingStage::Feathering => 90,
            ProcessingStage::Compositing => 95,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Trait for reporting progress during background removal operations
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: &ProcessingTimings);

    /// Report an error during processing
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Reporter that emits progress as `tracing` events
pub struct TracingProgressReporter {
    verbose: bool,
}

impl TracingProgressReporter {
    /// `verbose` adds elapsed time and the timing breakdown
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for TracingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            tracing::info!(
                progress = update.progress,
                elapsed_ms = update.elapsed_ms,
                "{}",
                update.description
            );
        } else {
            tracing::info!(progress = update.progress, "{}", update.description);
        }
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        tracing::info!(total_ms = timings.total_ms, "✅ Background removal completed");
        if self.verbose {
            tracing::info!(
                model_load_ms = timings.model_load_ms,
                decode_ms = timings.image_decode_ms,
                preprocessing_ms = timings.preprocessing_ms,
                inference_ms = timings.inference_ms,
                mask_refinement_ms = timings.mask_refinement_ms,
                compositing_ms = timings.compositing_ms,
                "📊 Timing breakdown"
            );
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        tracing::error!(stage = stage.description(), "❌ {error}");
    }
}

/// Progress tracker that manages timing and progress reporting for one run
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified reporter
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Create a progress tracker with no-op reporter (for testing/disabled progress)
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Arc::new(NoOpProgressReporter))
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report completion with final timings
    pub fn report_completion(&self, timings: &ProcessingTimings) {
        self.reporter.report_completion(timings);
    }

    /// Report an error against the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self
            .current_stage
            .unwrap_or(ProcessingStage::Initialization);
        self.reporter.report_error(stage, error);
    }

    /// Get the elapsed time since tracking started
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Get the current processing stage
    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        updates: Mutex<Vec<ProgressUpdate>>,
        completions: Mutex<Vec<ProcessingTimings>>,
        errors: Mutex<Vec<(ProcessingStage, String)>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.updates.lock().unwrap().push(update);
        }

        fn report_completion(&self, timings: &ProcessingTimings) {
            self.completions.lock().unwrap().push(timings.clone());
        }

        fn report_error(&self, stage: ProcessingStage, error: &str) {
            self.errors.lock().unwrap().push((stage, error.to_string()));
        }
    }

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            ProcessingStage::Initialization,
            ProcessingStage::ImageLoading,
            ProcessingStage::Preprocessing,
            ProcessingStage::Inference,
            ProcessingStage::MaskGeneration,
            ProcessingStage::RegionSelection,
            ProcessingStage::Feathering,
            ProcessingStage::Compositing,
            ProcessingStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
        assert_eq!(ProcessingStage::Completed.progress_percentage(), 100);
    }

    #[test]
    fn test_tracker_forwards_to_reporter() {
        let reporter = Arc::new(RecordingReporter::default());
        let mut tracker = ProgressTracker::new(reporter.clone());

        tracker.report_stage(ProcessingStage::ImageLoading);
        tracker.report_stage(ProcessingStage::Inference);
        tracker.report_error("boom");
        tracker.report_completion(&ProcessingTimings::new());

        let updates = reporter.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].stage, ProcessingStage::Inference);
        assert_eq!(updates[1].description, "Running saliency inference");

        let errors = reporter.errors.lock().unwrap();
        assert_eq!(errors[0], (ProcessingStage::Inference, "boom".to_string()));
        assert_eq!(reporter.completions.lock().unwrap().len(), 1);
        assert_eq!(tracker.current_stage(), Some(ProcessingStage::Inference));
    }

    #[test]
    fn test_error_before_any_stage_uses_initialization() {
        let reporter = Arc::new(RecordingReporter::default());
        let tracker = ProgressTracker::new(reporter.clone());
        tracker.report_error("early");
        assert_eq!(
            reporter.errors.lock().unwrap()[0].0,
            ProcessingStage::Initialization
        );
    }

    #[test]
    fn test_no_op_reporter_accepts_everything() {
        let mut tracker = ProgressTracker::no_op();
        tracker.report_stage(ProcessingStage::Completed);
        tracker.report_error("ignored");
        tracker.report_completion(&ProcessingTimings::new());
        TracingProgressReporter::new(true).report_completion(&ProcessingTimings::new());
    }
}
