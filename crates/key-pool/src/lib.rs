//! API key pool for rate-limited upstream model APIs
//!
//! Coordinates a fixed set of interchangeable API keys across sequential calls:
//! the pool hands out the current key, the caller performs one upstream call and
//! reports exactly one outcome, and the pool updates that key's state.
//!
//! Key lifecycle:
//! 1. Pool created from an already-resolved key list → every key `Available`
//! 2. Success → stay on the same key, error count cleared
//! 3. Quota exceeded → key `CoolingDown` for the cooldown duration, rotate round-robin
//! 4. Generic failure → error count grows; at the threshold the key is `Disabled`
//! 5. Cooldown passes → key available again on its next evaluation (no timers)
//! 6. Disabled keys come back only through `enable` / `reset_all`
//!
//! `classify` maps raw upstream failures to the outcome to report, and
//! `render_report` produces the masked operator-facing status text.

pub mod classify;
pub mod clock;
pub mod error;
pub mod pool;
pub mod report;
pub mod shared;

pub use classify::{classify, classify_message, classify_status, classify_transport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use pool::{
    Credential, DEFAULT_COOLDOWN, DEFAULT_ERROR_THRESHOLD, KeyPool, KeyStatus, SelectedKey,
};
pub use provider::FailureClass;
pub use report::{mask_key, render_report};
pub use shared::SharedPool;
