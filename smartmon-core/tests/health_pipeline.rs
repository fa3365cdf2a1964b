//! End-to-end checks of the core pipeline against scripted host output

use smartmon_core::{
    parse_device_list, parse_smartctl, CommandRunner, DeviceRecord, OverallLevel, ALL_CLEAR_HEADLINE,
    UNREADABLE_REASON,
};
use smartmon_devkit::{JournalLines, TestHarness, NVME_REPORT, SATA_HDD_REPORT, SATA_SSD_REPORT};

async fn poll(harness: &TestHarness) -> Vec<DeviceRecord> {
    let runner = harness.runner_handle();
    let listing = runner
        .run(&harness.config.devices.list_command, None)
        .await
        .expect("device listing is scripted");

    let mut records = Vec::new();
    for device in parse_device_list(&listing.stdout, &harness.config.devices.prefix) {
        let record = match runner.run(&harness.config.smartctl_command(&device), None).await {
            Ok(output) => parse_smartctl(&device, &output),
            Err(_) => DeviceRecord::unreadable(&device),
        };
        records.push(record);
    }
    records
}

#[tokio::test]
async fn test_device_records_from_mixed_hosts() {
    let harness = TestHarness::new();
    harness
        .script_device_list(&["sda", "sdb", "nvme0n1"])
        .script_report("/dev/sda", SATA_HDD_REPORT)
        .script_report("/dev/sdb", SATA_SSD_REPORT)
        .script_report("/dev/nvme0n1", NVME_REPORT);

    let records = poll(&harness).await;

    assert_eq!(records.len(), 3);
    let hdd = &records[0];
    assert_eq!(hdd.model.as_deref(), Some("Seagate IronWolf"));
    assert_eq!(hdd.serial.as_deref(), Some("ZGY5ABCD"));
    assert_eq!(hdd.firmware.as_deref(), Some("SC60"));
    assert_eq!(hdd.health.as_deref(), Some("PASSED"));
    assert_eq!(hdd.temperature_label().as_deref(), Some("34 °C"));

    let ssd = &records[1];
    assert_eq!(ssd.model.as_deref(), Some("Samsung SSD 860 EVO 500GB"));
    assert_eq!(ssd.health.as_deref(), Some("FAILED!"));
    assert!(ssd.temperature_celsius.is_none());

    let nvme = &records[2];
    assert_eq!(nvme.device, "/dev/nvme0n1");
    assert!(nvme.is_readable());
    assert!(nvme.temperature_celsius.is_none());
}

#[tokio::test]
async fn test_unreadable_device_does_not_spoil_others() {
    let harness = TestHarness::new();
    harness
        .script_device_list(&["sda", "sdb", "sdc"])
        .script_report("/dev/sda", SATA_HDD_REPORT)
        .script_report_exit("/dev/sdb", 1);

    let records = poll(&harness).await;

    assert!(records[0].is_readable());
    for record in &records[1..] {
        assert_eq!(record.error.as_deref(), Some(UNREADABLE_REASON));
        assert!(record.model.is_none());
        assert!(record.health.is_none());
    }
}

#[tokio::test]
async fn test_backlog_then_tail_then_resync() {
    let harness = TestHarness::new();
    harness.script_backlog(
        &JournalLines::new("nas")
            .attribute_change("/dev/sda")
            .failed("/dev/sdb")
            .failed("/dev/sdb")
            .build(),
    );

    let backlog = harness
        .runner_handle()
        .run(&harness.config.backlog_command(), None)
        .await
        .expect("backlog is scripted");
    harness.status.lock().apply_full_check(&backlog.stdout);
    harness.assert_problems(&["/dev/sdb"]).unwrap();
    harness.assert_headline("⚠️ Failures on /dev/sdb").unwrap();

    let chunk = JournalLines::new("nas").failed("/dev/sda").build();
    harness.status.lock().apply_tail_chunk(&chunk);
    harness.assert_problems(&["/dev/sda", "/dev/sdb"]).unwrap();

    harness.status.lock().apply_full_check("");
    harness.assert_problems(&[]).unwrap();
    harness.assert_headline(ALL_CLEAR_HEADLINE).unwrap();
    assert_eq!(harness.snapshot().overall, OverallLevel::Ok);
}

#[test]
fn test_snapshot_json_shape() {
    let harness = TestHarness::new();
    harness.status.lock().update_environment(false, true);
    harness
        .status
        .lock()
        .apply_tail_chunk(&JournalLines::new("nas").failed("/dev/sdd").build());

    let json = harness.snapshot_json();
    assert_eq!(json["headline"], "⚠️ Failures on /dev/sdd");
    assert_eq!(json["overall"], "failing");
    assert_eq!(json["environment"]["tool_installed"], false);
    assert_eq!(json["warnings"][0], "⚠️ smartctl is not installed");
}
