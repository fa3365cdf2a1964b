/*!
# smartmon core

Domain logic of the storage health monitor, free of process handling:
- `device`  : smartctl report → `DeviceRecord`
- `journal` : smartd journal text → failing devices + headline
- `status`  : `StatusAggregator`, the single owner of the problem set
- `runner`  : `CommandRunner` seam for every external invocation
- `config`  : `MonitorConfig` with the default command lines
*/

pub mod config;
pub mod device;
pub mod error;
pub mod journal;
pub mod runner;
pub mod state;
pub mod status;

pub use config::{MonitorConfig, PrivilegedAction};
pub use device::{parse_attributes, parse_device_list, parse_smartctl, DeviceRecord, UNREADABLE_REASON};
pub use error::{MonitorError, Result};
pub use journal::{extract_failures, Extraction, ALL_CLEAR_HEADLINE};
pub use runner::{CommandOutput, CommandRunner, CommandSpec};
pub use state::{new_state, read_snapshot, Shared, SharedStatus};
pub use status::{
    EnvironmentStatus, FollowState, HealthSnapshot, HealthStatus, LogHealth, OverallLevel, StatusAggregator,
    TransitionOutcome,
};
