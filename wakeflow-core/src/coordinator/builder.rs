//! Construction and validation of a [`Coordinator`].

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{Coordinator, Detection, InferenceCallback, WakeWordCallback};
use crate::{
    config::CoordinatorConfig,
    engine::{
        Inference, IntentRecognizer, KeywordRef, KeywordSpotter, RecognizerError,
        RecognizerParams, SpotterError, SpotterParams, DEFAULT_ENDPOINT_DURATION_SEC,
        DEFAULT_SENSITIVITY, ENDPOINT_DURATION_RANGE_SEC,
    },
    error::{Result, WakeflowError},
};

pub struct CoordinatorBuilder {
    access_key: String,
    keyword: KeywordRef,
    context_path: PathBuf,
    on_wake_word: Option<WakeWordCallback>,
    on_inference: Option<InferenceCallback>,
    spotter_model_path: Option<PathBuf>,
    spotter_library_path: Option<PathBuf>,
    spotter_sensitivity: f32,
    recognizer_model_path: Option<PathBuf>,
    recognizer_library_path: Option<PathBuf>,
    recognizer_sensitivity: f32,
    endpoint_duration_sec: f32,
    require_endpoint: bool,
}

impl CoordinatorBuilder {
    pub fn new(
        access_key: impl Into<String>,
        keyword: KeywordRef,
        context_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            keyword,
            context_path: context_path.into(),
            on_wake_word: None,
            on_inference: None,
            spotter_model_path: None,
            spotter_library_path: None,
            spotter_sensitivity: DEFAULT_SENSITIVITY,
            recognizer_model_path: None,
            recognizer_library_path: None,
            recognizer_sensitivity: DEFAULT_SENSITIVITY,
            endpoint_duration_sec: DEFAULT_ENDPOINT_DURATION_SEC,
            require_endpoint: true,
        }
    }

    /// Seed every parameter from a loaded config. Callbacks still have to be set.
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        let mut builder = Self::new(
            config.access_key.clone(),
            config.keyword.clone(),
            config.context_path.clone(),
        )
        .spotter_sensitivity(config.spotter_sensitivity)
        .recognizer_sensitivity(config.recognizer_sensitivity)
        .endpoint_duration_sec(config.endpoint_duration_sec)
        .require_endpoint(config.require_endpoint);
        builder.spotter_model_path = config.spotter_model_path.clone();
        builder.spotter_library_path = config.spotter_library_path.clone();
        builder.recognizer_model_path = config.recognizer_model_path.clone();
        builder.recognizer_library_path = config.recognizer_library_path.clone();
        builder
    }

    pub fn on_wake_word<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Detection) + Send + 'static,
    {
        self.on_wake_word = Some(Box::new(callback));
        self
    }

    pub fn on_inference<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Inference) + Send + 'static,
    {
        self.on_inference = Some(Box::new(callback));
        self
    }

    pub fn spotter_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.spotter_model_path = Some(path.into());
        self
    }

    pub fn spotter_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.spotter_library_path = Some(path.into());
        self
    }

    pub fn spotter_sensitivity(mut self, sensitivity: f32) -> Self {
        self.spotter_sensitivity = sensitivity;
        self
    }

    pub fn recognizer_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.recognizer_model_path = Some(path.into());
        self
    }

    pub fn recognizer_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.recognizer_library_path = Some(path.into());
        self
    }

    pub fn recognizer_sensitivity(mut self, sensitivity: f32) -> Self {
        self.recognizer_sensitivity = sensitivity;
        self
    }

    pub fn endpoint_duration_sec(mut self, seconds: f32) -> Self {
        self.endpoint_duration_sec = seconds;
        self
    }

    pub fn require_endpoint(mut self, require: bool) -> Self {
        self.require_endpoint = require;
        self
    }

    /// Wrap whichever callbacks are set. Unset callbacks stay unset so
    /// validation still reports them.
    pub(crate) fn wrap_callbacks(
        mut self,
        wake: impl FnOnce(WakeWordCallback) -> WakeWordCallback,
        inference: impl FnOnce(InferenceCallback) -> InferenceCallback,
    ) -> Self {
        self.on_wake_word = self.on_wake_word.take().map(wake);
        self.on_inference = self.on_inference.take().map(inference);
        self
    }

    pub fn spotter_params(&self) -> SpotterParams {
        SpotterParams {
            access_key: self.access_key.clone(),
            keyword: self.keyword.clone(),
            sensitivity: self.spotter_sensitivity,
            model_path: self.spotter_model_path.clone(),
            library_path: self.spotter_library_path.clone(),
        }
    }

    pub fn recognizer_params(&self) -> RecognizerParams {
        RecognizerParams {
            access_key: self.access_key.clone(),
            context_path: self.context_path.clone(),
            sensitivity: self.recognizer_sensitivity,
            endpoint_duration_sec: self.endpoint_duration_sec,
            require_endpoint: self.require_endpoint,
            model_path: self.recognizer_model_path.clone(),
            library_path: self.recognizer_library_path.clone(),
        }
    }

    /// Check every parameter without constructing anything.
    pub fn validate(&self) -> Result<()> {
        check_access_key(&self.access_key)?;
        if let Some(path) = self.keyword.as_path() {
            check_path_exists("keyword", path)?;
        }
        if self.on_wake_word.is_none() {
            return Err(WakeflowError::InvalidArgument(
                "wake word callback is required".into(),
            ));
        }
        check_path_exists("context", &self.context_path)?;
        if self.on_inference.is_none() {
            return Err(WakeflowError::InvalidArgument(
                "inference callback is required".into(),
            ));
        }

        check_optional_paths(
            &self.spotter_model_path,
            &self.spotter_library_path,
            &self.recognizer_model_path,
            &self.recognizer_library_path,
        )?;

        check_sensitivity("keyword spotter", self.spotter_sensitivity)?;
        check_sensitivity("intent recognizer", self.recognizer_sensitivity)?;
        check_endpoint_duration(self.endpoint_duration_sec)
    }

    /// Validate, then construct both engines and the coordinator.
    ///
    /// Nothing is constructed when validation fails. If the recognizer
    /// cannot be built, or the two engines disagree on frame length or
    /// sample rate, every engine built so far is dropped before returning.
    pub fn build<S, R>(
        self,
        spotter_factory: impl FnOnce(&SpotterParams) -> std::result::Result<S, SpotterError>,
        recognizer_factory: impl FnOnce(&RecognizerParams) -> std::result::Result<R, RecognizerError>,
    ) -> Result<Coordinator>
    where
        S: KeywordSpotter,
        R: IntentRecognizer,
    {
        self.validate()?;

        let spotter_params = self.spotter_params();
        let recognizer_params = self.recognizer_params();
        let on_wake_word = self.on_wake_word.ok_or_else(|| {
            WakeflowError::InvalidArgument("wake word callback is required".into())
        })?;
        let on_inference = self.on_inference.ok_or_else(|| {
            WakeflowError::InvalidArgument("inference callback is required".into())
        })?;

        let spotter: Box<dyn KeywordSpotter> = Box::new(spotter_factory(&spotter_params)?);
        let recognizer: Box<dyn IntentRecognizer> = Box::new(recognizer_factory(&recognizer_params)?);

        if spotter.frame_length() != recognizer.frame_length() {
            warn!(
                spotter = spotter.frame_length(),
                recognizer = recognizer.frame_length(),
                "engine frame lengths differ"
            );
            return Err(WakeflowError::InvalidArgument(format!(
                "keyword spotter frame length ({}) differs from intent recognizer frame length ({})",
                spotter.frame_length(),
                recognizer.frame_length()
            )));
        }
        if spotter.sample_rate() != recognizer.sample_rate() {
            warn!(
                spotter = spotter.sample_rate(),
                recognizer = recognizer.sample_rate(),
                "engine sample rates differ"
            );
            return Err(WakeflowError::InvalidArgument(format!(
                "keyword spotter sample rate ({}) differs from intent recognizer sample rate ({})",
                spotter.sample_rate(),
                recognizer.sample_rate()
            )));
        }

        let coordinator = Coordinator::from_parts(spotter, recognizer, on_wake_word, on_inference);
        info!(
            keyword = %spotter_params.keyword,
            context = %recognizer_params.context_path.display(),
            frame_length = coordinator.frame_length(),
            sample_rate = coordinator.sample_rate(),
            spotter_version = coordinator.spotter_version(),
            recognizer_version = coordinator.recognizer_version(),
            "coordinator created"
        );
        Ok(coordinator)
    }
}

pub(crate) fn check_access_key(access_key: &str) -> Result<()> {
    if access_key.trim().is_empty() {
        return Err(WakeflowError::InvalidArgument(
            "access key must be a non-empty string".into(),
        ));
    }
    Ok(())
}

pub(crate) fn check_path_exists(what: &str, path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(WakeflowError::InvalidArgument(format!(
            "couldn't find {what} file at '{}'",
            path.display()
        )));
    }
    Ok(())
}

/// Model and library paths are optional, but must exist when given.
pub(crate) fn check_optional_paths(
    spotter_model: &Option<PathBuf>,
    spotter_library: &Option<PathBuf>,
    recognizer_model: &Option<PathBuf>,
    recognizer_library: &Option<PathBuf>,
) -> Result<()> {
    let paths = [
        ("keyword spotter model", spotter_model),
        ("keyword spotter library", spotter_library),
        ("intent recognizer model", recognizer_model),
        ("intent recognizer library", recognizer_library),
    ];
    for (what, path) in paths {
        if let Some(path) = path {
            check_path_exists(what, path)?;
        }
    }
    Ok(())
}

pub(crate) fn check_sensitivity(engine: &str, sensitivity: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&sensitivity) {
        return Err(WakeflowError::InvalidArgument(format!(
            "{engine} sensitivity should be within [0, 1], got {sensitivity}"
        )));
    }
    Ok(())
}

pub(crate) fn check_endpoint_duration(seconds: f32) -> Result<()> {
    let (lo, hi) = ENDPOINT_DURATION_RANGE_SEC;
    if !(lo..=hi).contains(&seconds) {
        return Err(WakeflowError::InvalidArgument(format!(
            "endpoint duration should be within [{lo}, {hi}] seconds, got {seconds}"
        )));
    }
    Ok(())
}
