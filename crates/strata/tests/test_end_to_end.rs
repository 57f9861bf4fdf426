//! End-to-end test through the facade: load a module, stage data in a view,
//! run host work between semaphores and read the result back.

use pretty_assertions::assert_eq;
use std::time::Duration;
use strata::prelude::*;

#[test]
fn test_bytecode_pipeline() {
    let device = HostDevice::new(
        DeviceConfig::builder()
            .identifier("e2e")
            .worker_count(2)
            .loaders([LoaderKind::EmbeddedBytecode])
            .build(),
    )
    .unwrap();

    // The "kernel" is a single byte: the value to add to every element.
    let executable = device
        .load_executable(&ExecutableFormat::BYTECODE, &[5])
        .unwrap();

    let (shape, element_type) = parse_shape_and_element_type("2x4xi8").unwrap();
    let view = device.allocate_buffer_view(&shape, element_type).unwrap();
    view.buffer().write(0, &[0, 1, 2, 3, 4, 5, 6, 7]).unwrap();

    let staged = device.create_semaphore(0).unwrap();
    let done = device.create_semaphore(0).unwrap();

    // Only the second row is handed to the kernel.
    let row = view.subview(&[1, 0], &[1, 4]).unwrap();
    let kernel = executable.clone();
    device
        .queue_submit(
            SubmissionBatch::new(move || {
                let module = kernel
                    .payload::<BytecodeModule>()
                    .ok_or_else(|| HalError::failed_precondition("unexpected payload"))?;
                let addend = module.bytes()[0];
                let mut bytes = row.buffer().read_to_vec(0, row.byte_length())?;
                for byte in &mut bytes {
                    *byte += addend;
                }
                row.buffer().write(0, &bytes)
            })
            .wait_on(staged.clone(), 1)
            .signal(done.clone(), 1),
        )
        .unwrap();

    staged.signal(1).unwrap();
    let set = SemaphoreSet::new().with(done, 1);
    device
        .wait_semaphores_with_timeout(WaitMode::All, &set.as_list(), Duration::from_secs(10))
        .unwrap();

    assert_eq!(
        view.buffer().read_to_vec(0, 8).unwrap(),
        vec![0, 1, 2, 3, 9, 10, 11, 12]
    );
    assert_eq!(view.to_string(), "2x4xi8");
}

#[test]
fn test_failure_surfaces_through_any_wait() {
    let device = HostDevice::new(DeviceConfig::builder().worker_count(1).build()).unwrap();
    let ok = device.create_semaphore(0).unwrap();
    let failed = device.create_semaphore(0).unwrap();

    device
        .queue_submit(
            SubmissionBatch::new(|| Err(HalError::unknown("out of registers")))
                .signal(failed.clone(), 1),
        )
        .unwrap();
    device.wait_idle(Timeout::INFINITE).unwrap();

    let set = SemaphoreSet::new().with(ok, 1).with(failed, 1);
    let err = device
        .wait_semaphores(WaitMode::Any, &set.as_list(), Timeout::INFINITE)
        .unwrap_err();
    assert_eq!(err.code(), StatusCode::Unknown);
}
