/*!
# smartmon DevKit - Test stubs

Helpers for testing smartmon components without smartmontools or systemd:
- Scripted `CommandRunner` recording every invocation
- Realistic smartctl reports and smartd journal lines
- Harness bundling runner, configuration and shared status
*/

pub mod runner_stub;
pub mod fixtures;
pub mod test_utils;

pub use runner_stub::{MockResponse, MockRunner};
pub use fixtures::{JournalLines, NVME_REPORT, SATA_HDD_REPORT, SATA_SSD_REPORT};
pub use test_utils::TestHarness;
