// tagsync-core: Subscription, cache and control layer between tagsync-api and UIs.

pub mod cache;
pub mod config;
pub mod control;
mod dispatch;
pub mod error;
pub mod events;
pub mod gateway;
pub mod registry;
pub mod session;
pub mod sink;
pub mod stats;
pub mod sync;
pub mod value;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::CacheEntry;
pub use config::{DEFAULT_DEVICE_ID, ReconnectSettings, SyncConfig, TlsVerification};
pub use control::{
    ActivateOutcome, DEFAULT_PULSE, PulseOutcome, SwitchControl, SwitchMode, SwitchView,
    ToggleOutcome, ToggleState,
};
pub use error::CoreError;
pub use events::{CoreEvent, EventCallback, EventKind, ObserverId};
pub use gateway::{ReadResult, VariableGateway};
pub use registry::{ActiveSubscription, DeliveryCallback, DeliveryError};
pub use session::Session;
pub use sink::{DiscardSink, IntentSink};
pub use stats::Statistics;
pub use sync::SyncCore;
pub use value::{TagValue, ValueKind, VariableKey, VariableUpdate};

// Wire types consumers need to drive a core by hand.
pub use tagsync_api::{ClientIntent, TransportEvent};
