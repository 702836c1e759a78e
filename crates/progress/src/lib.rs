//! Metrics (Layer 3)
//!
//! Blocker detection, feature progress, velocity, and the health summary.

#![warn(missing_docs)]

pub mod blocker;
pub mod progress;
pub mod velocity;
pub mod summary;

pub use blocker::{detect, open_pull_requests, BlockerDetector, OpenPullRequest};
pub use progress::{apply_progress, compute_progress};
pub use velocity::{aggregate, carry_forward, classify_trend};
pub use summary::summarize;
