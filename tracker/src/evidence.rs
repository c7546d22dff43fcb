//! Pluggable evidence collection: screenshots, videos, page sources.
//!
//! The core calls into registered collectors when a failure needs evidence
//! attached; their logic (driver access, file handling) stays external.
//! Registration is additive only and order-preserving. A failing collector
//! is logged and skipped so it never takes down the collection of the rest.

use std::path::PathBuf;

use anyhow::Result;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::EvidenceConfig;

/// A captured screenshot, optionally paired with a page-source dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screenshot {
    pub path: PathBuf,
    pub page_source_path: Option<PathBuf>,
}

impl Screenshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            page_source_path: None,
        }
    }
}

/// A captured session video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Video {
    pub path: PathBuf,
}

/// Script source snippet associated with a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptSource {
    pub file_name: String,
    pub method_name: String,
    pub snippet: String,
}

/// Supplies screenshots for the current failure, or `None` when it has
/// nothing to contribute.
pub trait ScreenshotCollector: Send + Sync {
    fn take_screenshots(&self) -> Result<Option<Vec<Screenshot>>>;
}

/// Supplies session videos. Legacy path, kept for compatibility; prefer
/// attaching videos to the session context directly.
pub trait VideoCollector: Send + Sync {
    fn collect_videos(&self) -> Result<Option<Vec<Video>>>;
}

/// Resolves the script source responsible for a failure.
pub trait SourceCollector: Send + Sync {
    fn source_for(&self, error: &anyhow::Error) -> Result<Option<ScriptSource>>;
}

/// Ordered registries of evidence collectors.
///
/// Constructed once per run with the evidence feature flags and shared by
/// reference. `None` results mean "no result" and are distinct from an empty
/// collection: a run with the feature disabled or no collectors registered
/// yields `None`, a collector that captured nothing yields `Some(vec![])`.
pub struct EvidenceCollectorRegistry {
    flags: EvidenceConfig,
    screenshot_collectors: RwLock<Vec<Box<dyn ScreenshotCollector>>>,
    video_collectors: RwLock<Vec<Box<dyn VideoCollector>>>,
    source_collectors: RwLock<Vec<Box<dyn SourceCollector>>>,
}

impl EvidenceCollectorRegistry {
    pub fn new(flags: EvidenceConfig) -> Self {
        Self {
            flags,
            screenshot_collectors: RwLock::new(Vec::new()),
            video_collectors: RwLock::new(Vec::new()),
            source_collectors: RwLock::new(Vec::new()),
        }
    }

    pub fn register_screenshot_collector(&self, collector: Box<dyn ScreenshotCollector>) {
        self.screenshot_collectors.write().push(collector);
    }

    /// Legacy path, kept for compatibility.
    pub fn register_video_collector(&self, collector: Box<dyn VideoCollector>) {
        self.video_collectors.write().push(collector);
    }

    pub fn register_source_collector(&self, collector: Box<dyn SourceCollector>) {
        self.source_collectors.write().push(collector);
    }

    /// Concatenate screenshots from all collectors in registration order.
    ///
    /// Returns `None` when screenshotting is disabled or no collectors are
    /// registered. Collector failures are logged and skipped.
    pub fn collect_screenshots(&self) -> Option<Vec<Screenshot>> {
        if !self.flags.screenshotter_active {
            return None;
        }
        let collectors = self.screenshot_collectors.read();
        if collectors.is_empty() {
            return None;
        }

        let mut screenshots = Vec::new();
        for collector in collectors.iter() {
            match collector.take_screenshots() {
                Ok(Some(taken)) => screenshots.extend(taken),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "collecting screenshots failed"),
            }
        }
        Some(screenshots)
    }

    /// Concatenate videos from all collectors in registration order.
    ///
    /// Legacy path. Same shape as [`collect_screenshots`](Self::collect_screenshots):
    /// a failing collector degrades to whatever was collected so far.
    pub fn collect_videos(&self) -> Option<Vec<Video>> {
        if !self.flags.screencaster_active {
            return None;
        }
        let collectors = self.video_collectors.read();
        if collectors.is_empty() {
            return None;
        }

        let mut videos = Vec::new();
        for collector in collectors.iter() {
            match collector.collect_videos() {
                Ok(Some(collected)) => videos.extend(collected),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "collecting videos failed"),
            }
        }
        Some(videos)
    }

    /// First script source any collector resolves for `error`, in
    /// registration order. Short-circuits on the first hit.
    pub fn source_for(&self, error: &anyhow::Error) -> Option<ScriptSource> {
        for collector in self.source_collectors.read().iter() {
            match collector.source_for(error) {
                Ok(Some(source)) => return Some(source),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "resolving script source failed"),
            }
        }
        None
    }

    pub fn log_info(&self) {
        trace!(
            screenshots = self.screenshot_collectors.read().len(),
            sources = self.source_collectors.read().len(),
            videos = self.video_collectors.read().len(),
            "registered collectors"
        );
        debug!(
            screenshotter = self.flags.screenshotter_active,
            screencaster = self.flags.screencaster_active,
            "evidence flags"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingScreenshotCollector, StaticScreenshotCollector};
    use anyhow::anyhow;

    fn flags(screenshotter: bool) -> EvidenceConfig {
        EvidenceConfig {
            screenshotter_active: screenshotter,
            screencaster_active: true,
        }
    }

    #[test]
    fn no_collectors_means_no_result() {
        let registry = EvidenceCollectorRegistry::new(flags(true));
        assert_eq!(registry.collect_screenshots(), None);
    }

    #[test]
    fn disabled_flag_means_no_result_even_with_collectors() {
        let registry = EvidenceCollectorRegistry::new(flags(false));
        registry.register_screenshot_collector(Box::new(StaticScreenshotCollector::with_paths(
            &["a.png"],
        )));
        assert_eq!(registry.collect_screenshots(), None);
    }

    #[test]
    fn empty_collector_yields_empty_not_none() {
        let registry = EvidenceCollectorRegistry::new(flags(true));
        registry.register_screenshot_collector(Box::new(StaticScreenshotCollector::empty()));
        assert_eq!(registry.collect_screenshots(), Some(Vec::new()));
    }

    #[test]
    fn concatenates_in_registration_order() {
        let registry = EvidenceCollectorRegistry::new(flags(true));
        registry.register_screenshot_collector(Box::new(StaticScreenshotCollector::with_paths(
            &["a.png", "b.png"],
        )));
        registry.register_screenshot_collector(Box::new(StaticScreenshotCollector::with_paths(
            &["c.png"],
        )));

        let shots = registry.collect_screenshots().expect("some");
        let paths: Vec<_> = shots.iter().map(|s| s.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("a.png"),
                PathBuf::from("b.png"),
                PathBuf::from("c.png")
            ]
        );
    }

    #[test]
    fn failing_collector_is_isolated() {
        let registry = EvidenceCollectorRegistry::new(flags(true));
        registry.register_screenshot_collector(Box::new(FailingScreenshotCollector));
        registry.register_screenshot_collector(Box::new(StaticScreenshotCollector::with_paths(
            &["after-failure.png"],
        )));

        let shots = registry.collect_screenshots().expect("some");
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].path, PathBuf::from("after-failure.png"));
    }

    #[test]
    fn source_lookup_short_circuits_on_first_hit() {
        struct Fixed(&'static str);
        impl SourceCollector for Fixed {
            fn source_for(&self, _error: &anyhow::Error) -> Result<Option<ScriptSource>> {
                Ok(Some(ScriptSource {
                    file_name: self.0.to_string(),
                    method_name: "m".to_string(),
                    snippet: String::new(),
                }))
            }
        }
        struct Never;
        impl SourceCollector for Never {
            fn source_for(&self, _error: &anyhow::Error) -> Result<Option<ScriptSource>> {
                Ok(None)
            }
        }

        let registry = EvidenceCollectorRegistry::new(flags(true));
        registry.register_source_collector(Box::new(Never));
        registry.register_source_collector(Box::new(Fixed("first.rs")));
        registry.register_source_collector(Box::new(Fixed("second.rs")));

        let source = registry.source_for(&anyhow!("boom")).expect("some");
        assert_eq!(source.file_name, "first.rs");
    }
}
