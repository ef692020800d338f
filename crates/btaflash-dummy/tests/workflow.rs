//! End-to-end workflow runs against the emulated tool

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use btaflash_core::backup::{BackupConfig, FixedName, NoProgress, FLASH_SIZE, PAGE_COUNT};
use btaflash_core::gateway::{Gateway, GatewayConfig};
use btaflash_core::workflow::{Completion, Operation, Workflow, WorkflowOptions};
use btaflash_core::{Error, Result};
use btaflash_dummy::{DummyTool, Fault};

struct Run {
    result: Result<Completion>,
    output: String,
    backups: Vec<PathBuf>,
}

fn run_with(
    tool: &mut DummyTool,
    gateway_config: GatewayConfig,
    operation: Operation,
    skip_backup: bool,
    dir: &Path,
) -> Run {
    let options = WorkflowOptions {
        skip_backup,
        backup: BackupConfig {
            directory: dir.to_path_buf(),
            read_pacing: Duration::ZERO,
            write_pacing: Duration::ZERO,
        },
    };
    let mut namer = FixedName("pihat".to_string());
    let mut progress = NoProgress;
    let mut output = Vec::new();

    let gateway = Gateway::new(tool, gateway_config);
    let mut workflow = Workflow::new(gateway, options, &mut namer, &mut progress, &mut output);
    let result = workflow.run(operation);
    let backups = workflow.backups().to_vec();
    drop(workflow);

    Run {
        result,
        output: String::from_utf8(output).unwrap(),
        backups,
    }
}

fn run(tool: &mut DummyTool, operation: Operation, skip_backup: bool, dir: &Path) -> Run {
    run_with(tool, GatewayConfig::default(), operation, skip_backup, dir)
}

/// Operation-specific arguments of a recorded call
fn op_args(call: &[String]) -> Vec<&str> {
    call[2..].iter().map(String::as_str).collect()
}

fn is_page_read(call: &[String], index: usize) -> bool {
    op_args(call) == ["-s", format!("-r{}", index * 4096).as_str(), "-n4096"]
}

#[test]
fn test_read_address() {
    let mut tool = DummyTool::new_default();
    let dir = tempfile::tempdir().unwrap();

    let run = run(&mut tool, Operation::ReadAddress, false, dir.path());

    assert_eq!(run.result.unwrap(), Completion::Done);
    assert_eq!(run.output, "Current BT Address: 0xb0b448c0ffee\n");
    assert!(run.backups.is_empty());

    let calls = tool.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(op_args(&calls[0]), ["-s", "-f0x48b4b0"]);
    assert_eq!(op_args(&calls[1]), ["-s", "-r0x1ffa0", "-n6"]);
}

#[test]
fn test_write_address_backs_up_first() {
    let mut tool = DummyTool::new_default();
    let before = tool.data().to_vec();
    let dir = tempfile::tempdir().unwrap();

    let run = run(
        &mut tool,
        Operation::WriteAddress {
            address: "0xb0b448010203".to_string(),
        },
        false,
        dir.path(),
    );

    assert_eq!(run.result.unwrap(), Completion::Done);
    assert_eq!(run.backups.len(), 1);
    assert_eq!(fs::read(&run.backups[0]).unwrap(), before);

    let calls = tool.calls();
    assert_eq!(calls.len(), PAGE_COUNT + 3);
    for (i, call) in calls[..PAGE_COUNT].iter().enumerate() {
        assert!(is_page_read(call, i), "{:?}", call);
    }
    assert_eq!(op_args(&calls[PAGE_COUNT]), ["-s", "-f0x48b4b0"]);
    assert_eq!(op_args(&calls[PAGE_COUNT + 1]), ["-s", "-r0x1ffa0", "-n6"]);
    assert_eq!(
        op_args(&calls[PAGE_COUNT + 2]),
        ["-w0x1ffa0", "0x03020148b4b0"]
    );

    assert_eq!(tool.stored_address(), "b0b448010203");
    assert!(run.output.contains("Current BT Address: 0xb0b448c0ffee\n"));
    assert!(run
        .output
        .contains("Wrote new BT Address 0xb0b448010203 to 0x1ffa0.\n"));
}

#[test]
fn test_write_address_without_backup() {
    let mut tool = DummyTool::new_default();
    let dir = tempfile::tempdir().unwrap();

    let run = run(
        &mut tool,
        Operation::WriteAddress {
            address: "b0b448a1b2c3".to_string(),
        },
        true,
        dir.path(),
    );

    assert!(run.result.is_ok());
    assert!(run.backups.is_empty());
    assert_eq!(tool.calls().len(), 3);
    assert_eq!(tool.stored_address(), "b0b448a1b2c3");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_write_address_rejected_before_device_access() {
    let dir = tempfile::tempdir().unwrap();
    for (address, invalid_format) in [
        ("0xb0b449010203", false),
        ("b0b44801020", false),
        ("b0b448zz0203", true),
        ("0xB0B448010203", false),
    ] {
        let mut tool = DummyTool::new_default();
        let run = run(
            &mut tool,
            Operation::WriteAddress {
                address: address.to_string(),
            },
            false,
            dir.path(),
        );
        match run.result {
            Err(Error::InvalidFormat(_)) => assert!(invalid_format, "{}", address),
            Err(Error::InvalidAddress(_)) => assert!(!invalid_format, "{}", address),
            other => panic!("unexpected result for {}: {:?}", address, other),
        }
        assert!(tool.calls().is_empty());
        assert!(run.backups.is_empty());
    }
}

#[test]
fn test_write_address_aborts_when_backup_fails() {
    let mut tool = DummyTool::new_default().fail_on_call(3, Fault::GpioUninitialized);
    let dir = tempfile::tempdir().unwrap();

    let run = run(
        &mut tool,
        Operation::WriteAddress {
            address: "b0b448010203".to_string(),
        },
        false,
        dir.path(),
    );

    assert!(matches!(run.result, Err(Error::GpioUninitialized)));
    assert_eq!(tool.calls().len(), 4);
    assert_eq!(tool.stored_address(), "b0b448c0ffee");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_find() {
    let mut tool = DummyTool::new_default();
    let dir = tempfile::tempdir().unwrap();

    let run = run(
        &mut tool,
        Operation::Find {
            pattern: "0x48b4b0".to_string(),
        },
        false,
        dir.path(),
    );

    assert!(run.result.is_ok());
    assert_eq!(run.output, "Bytes 0x48b4b0 were found at:\n0x0001ffa3\n");
    assert_eq!(tool.calls().len(), 1);
}

#[test]
fn test_find_not_found() {
    let mut tool = DummyTool::new_default();
    let dir = tempfile::tempdir().unwrap();

    let run = run(
        &mut tool,
        Operation::Find {
            pattern: "0x010203".to_string(),
        },
        false,
        dir.path(),
    );

    assert!(matches!(
        run.result,
        Err(Error::AddressNotFound { ref pattern }) if pattern == "0x010203"
    ));
    assert!(run.output.is_empty());
}

#[test]
fn test_read_address_without_header() {
    let mut tool = DummyTool::new_default();
    tool.data_mut().fill(0xFF);
    let dir = tempfile::tempdir().unwrap();

    let run = run(&mut tool, Operation::ReadAddress, false, dir.path());

    assert!(matches!(run.result, Err(Error::AddressNotFound { .. })));
    assert_eq!(tool.calls().len(), 1);
}

#[test]
fn test_read_range() {
    let mut tool = DummyTool::new_default();
    tool.data_mut()[0x1000..0x1010].copy_from_slice(&[
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ]);
    let dir = tempfile::tempdir().unwrap();

    let run = run(
        &mut tool,
        Operation::ReadRange {
            offset: "0x1000".to_string(),
            count: 16,
        },
        false,
        dir.path(),
    );

    assert!(run.result.is_ok());
    assert_eq!(
        run.output,
        " \tData\n0x00001000\t00112233445566778899aabbccddeeff\n"
    );
    assert_eq!(op_args(&tool.calls()[0]), ["-r0x1000", "-n16"]);
    assert!(run.backups.is_empty());
}

#[test]
fn test_read_range_timeout() {
    let mut tool = DummyTool::new_default().fail_on_call(0, Fault::Timeout);
    let dir = tempfile::tempdir().unwrap();

    let run = run(
        &mut tool,
        Operation::ReadRange {
            offset: "0".to_string(),
            count: 16,
        },
        false,
        dir.path(),
    );

    assert!(matches!(run.result, Err(Error::Timeout)));
}

#[test]
fn test_write_range() {
    let mut tool = DummyTool::new_default();
    let dir = tempfile::tempdir().unwrap();

    let run = run(
        &mut tool,
        Operation::WriteRange {
            offset: "0x40".to_string(),
            value: "0xaabb".to_string(),
        },
        false,
        dir.path(),
    );

    assert!(run.result.is_ok());
    assert_eq!(run.output, "Success.\n");
    assert_eq!(run.backups.len(), 1);
    assert_eq!(&tool.data()[0x40..0x42], &[0xaa, 0xbb]);

    let calls = tool.calls();
    assert_eq!(calls.len(), PAGE_COUNT + 1);
    assert_eq!(op_args(&calls[PAGE_COUNT]), ["-s", "-w0x40", "0xaabb"]);
}

#[test]
fn test_write_range_error() {
    let mut tool = DummyTool::new_default();
    let dir = tempfile::tempdir().unwrap();

    let run = run(
        &mut tool,
        Operation::WriteRange {
            offset: "0x1fffff".to_string(),
            value: "0xaabb".to_string(),
        },
        true,
        dir.path(),
    );

    assert!(matches!(
        run.result,
        Err(Error::OperationError {
            action: "writing to device"
        })
    ));
}

#[test]
fn test_full_rewrite_hands_off_after_backup() {
    let mut tool = DummyTool::new_default();
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("firmware.bin");
    fs::write(&image, vec![0x11; FLASH_SIZE]).unwrap();

    let run = run(
        &mut tool,
        Operation::FullRewrite {
            image: image.clone(),
        },
        false,
        dir.path(),
    );

    assert_eq!(
        run.result.unwrap(),
        Completion::HandedOff { code: Some(0) }
    );
    assert_eq!(run.backups.len(), 1);
    assert!(run.output.is_empty());

    let calls = tool.calls();
    assert_eq!(calls.len(), PAGE_COUNT + 1);
    assert_eq!(op_args(&calls[PAGE_COUNT]), [image.display().to_string()]);
    assert_eq!(tool.images(), [image.display().to_string()]);
    assert!(tool.data().iter().all(|&b| b == 0x11));
}

#[test]
fn test_full_rewrite_missing_image() {
    let mut tool = DummyTool::new_default();
    let dir = tempfile::tempdir().unwrap();

    let run = run(
        &mut tool,
        Operation::FullRewrite {
            image: dir.path().join("missing.bin"),
        },
        false,
        dir.path(),
    );

    assert!(matches!(run.result, Err(Error::Io(_))));
    assert!(tool.calls().is_empty());
}

#[test]
fn test_list_ports() {
    let mut tool = DummyTool::new_default();
    let dir = tempfile::tempdir().unwrap();
    let config = GatewayConfig {
        list_ports: true,
        ..GatewayConfig::default()
    };

    let run = run_with(&mut tool, config, Operation::ListPorts, false, dir.path());

    assert!(run.result.is_ok());
    assert!(run.output.contains("| COM ports:"));
    assert!(run.output.contains("/dev/ttyS0"));
    assert_eq!(op_args(&tool.calls()[0]), ["-s", "-r0", "-n1", "-l"]);
}

#[test]
fn test_list_flag_reaches_every_call() {
    let mut tool = DummyTool::new_default();
    let dir = tempfile::tempdir().unwrap();
    let config = GatewayConfig {
        list_ports: true,
        port: Some(0),
        ..GatewayConfig::default()
    };

    let run = run_with(
        &mut tool,
        config,
        Operation::WriteAddress {
            address: "b0b448010203".to_string(),
        },
        false,
        dir.path(),
    );

    assert!(run.result.is_ok());
    let calls = tool.calls();
    assert_eq!(calls.len(), PAGE_COUNT + 3);
    for call in calls {
        assert_eq!(call[2], "-p0");
        assert_eq!(call.last().map(String::as_str), Some("-l"));
    }
}
