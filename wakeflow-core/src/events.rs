//! Events broadcast by [`CoordinatorManager`](crate::manager::CoordinatorManager).
//!
//! Every event carries a `seq` that increases by one per event sent by the
//! same manager, so a subscriber that lagged can tell how many it missed.
//!
//! ```json
//! {"seq":4,"type":"wakeWord","keywordIndex":0}
//! {"seq":5,"type":"inference","inference":{"isUnderstood":true,"intent":"orderBeverage","slots":{"size":"large"}}}
//! {"seq":6,"type":"processError","kind":"invalid-argument","message":"..."}
//! {"seq":7,"type":"status","status":"stopped"}
//! ```

use serde::{Deserialize, Serialize};

use crate::{engine::Inference, error::ErrorKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub kind: PipelineEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PipelineEventKind {
    WakeWord {
        #[serde(rename = "keywordIndex")]
        keyword_index: usize,
    },
    Inference {
        inference: Inference,
    },
    /// A frame failed inside the coordinator or the audio source.
    ProcessError {
        kind: ErrorKind,
        message: String,
    },
    Status {
        status: ManagerStatus,
    },
}

/// Lifecycle of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerStatus {
    /// Created, never started.
    Idle,
    /// Subscribed to the voice processor.
    Listening,
    /// Unsubscribed; may be started again.
    Stopped,
    /// Coordinator released; terminal.
    Deleted,
}
