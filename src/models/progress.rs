use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible session stage. Ordered; only `Error` may be entered
/// out of sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStage {
    Initializing,
    Crawling,
    Analyzing,
    Processing,
    Completed,
    Error,
}

impl ScanStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStage::Completed | ScanStage::Error)
    }

    pub fn can_transition_to(&self, next: ScanStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == ScanStage::Error || next >= *self
    }
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanStage::Initializing => "initializing",
            ScanStage::Crawling => "crawling",
            ScanStage::Analyzing => "analyzing",
            ScanStage::Processing => "processing",
            ScanStage::Completed => "completed",
            ScanStage::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub stage: ScanStage,
    pub progress: u8,
    pub pages_scanned: usize,
    pub endpoints_found: usize,
    pub current_url: Option<String>,
    pub message: String,
}

impl ScanProgress {
    pub fn initial() -> Self {
        Self {
            stage: ScanStage::Initializing,
            progress: 0,
            pages_scanned: 0,
            endpoints_found: 0,
            current_url: None,
            message: "Initializing scan".to_string(),
        }
    }

    /// Folds a new observation into the current progress without letting any
    /// counter move backwards.
    pub fn advance(
        &mut self,
        stage: ScanStage,
        progress: u8,
        pages_scanned: usize,
        endpoints_found: usize,
    ) {
        if self.stage.can_transition_to(stage) {
            self.stage = stage;
        }
        self.progress = self.progress.max(progress.min(100));
        self.pages_scanned = self.pages_scanned.max(pages_scanned);
        self.endpoints_found = self.endpoints_found.max(endpoints_found);
    }
}
