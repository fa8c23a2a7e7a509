//! Session lifecycle: idempotent close, scoped release, live-set
//! tracking, discovery and dispatch.

mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use common::TestBackend;
use visa::constants::{AddressSpace, DataWidth, LockKind, ResourceClass, Timeout};
use visa::{AnyResource, AttrValue, Error, OpenOptions, Resource, ResourceManager};

fn open(backend: &Arc<TestBackend>, name: &str) -> (ResourceManager, AnyResource) {
    let rm = ResourceManager::new(backend.clone()).unwrap();
    let resource = rm.open_resource(name, OpenOptions::default()).unwrap();
    (rm, resource)
}

#[test]
fn close_is_idempotent() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "GPIB0::20::INSTR");

    resource.close().unwrap();
    assert!(resource.is_closed());
    // Second close is absorbed silently.
    resource.close().unwrap();

    let err = resource.get_visa_attribute(visa::AttrId::TMO_VALUE).unwrap_err();
    assert!(matches!(err, Error::InvalidSession));
    let mb = resource.as_message_based().unwrap();
    assert!(matches!(mb.write("*RST"), Err(Error::InvalidSession)));
}

#[test]
fn dropping_a_resource_releases_it() {
    let backend = TestBackend::new();
    let rm = ResourceManager::new(backend.clone()).unwrap();
    {
        let _resource = rm
            .open_resource("GPIB0::21::INSTR", OpenOptions::default())
            .unwrap();
        assert_eq!(rm.list_opened_resources().len(), 1);
    }
    assert!(rm.list_opened_resources().is_empty());
}

#[test]
fn rm_close_closes_children_first() {
    let backend = TestBackend::new();
    let rm = ResourceManager::new(backend.clone()).unwrap();
    let resource = rm
        .open_resource("GPIB0::22::INSTR", OpenOptions::default())
        .unwrap();

    rm.close().unwrap();
    assert!(resource.is_closed());
    // RM close is idempotent as well.
    rm.close().unwrap();
    assert!(matches!(rm.session(), Err(Error::InvalidSession)));
    assert!(matches!(
        rm.open_resource("GPIB0::23::INSTR", OpenOptions::default()),
        Err(Error::InvalidSession)
    ));
}

#[test]
fn lock_guard_releases_on_unwind() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "GPIB0::24::INSTR");

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _guard = resource
            .lock_guard(LockKind::Exclusive, 100, None)
            .unwrap();
        panic!("while holding the lock");
    }));
    assert!(outcome.is_err());

    // The unwind released the lock, so it can be taken again.
    let guard = resource.lock_guard(LockKind::Shared, 100, Some("key")).unwrap();
    assert_eq!(guard.key(), Some("key"));
    drop(guard);
    resource.lock_exclusive(100).unwrap();
    resource.unlock().unwrap();
}

#[test]
fn lock_conflicts_surface_as_busy() {
    let backend = TestBackend::new();
    let rm = ResourceManager::new(backend.clone()).unwrap();
    let first = rm
        .open_resource("GPIB0::25::INSTR", OpenOptions::default())
        .unwrap();
    let second = rm
        .open_resource("GPIB0::25::INSTR", OpenOptions::default())
        .unwrap();

    first.lock_exclusive(10).unwrap();
    let err = second.lock_exclusive(10).unwrap_err();
    assert!(matches!(err, Error::ResourceBusy(_)));
}

#[test]
fn missing_bus_helper_is_unsupported() {
    let backend = TestBackend::new();
    let rm = ResourceManager::new(backend.clone()).unwrap();
    let resource = rm
        .open_resource("VXI0::MEMACC", OpenOptions::default())
        .unwrap();
    let registers = resource.as_register_based().unwrap();

    // The test backend implements 8- and 32-bit access only.
    registers
        .write_u32(AddressSpace::A16, 0x40, 0xDEAD_BEEF)
        .unwrap();
    assert_eq!(registers.read_u32(AddressSpace::A16, 0x40).unwrap(), 0xDEAD_BEEF);

    let err = resource
        .as_register_based()
        .unwrap()
        .read_memory(AddressSpace::A16, 0x40, DataWidth::W16)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperation { .. }));
}

#[test]
fn timeout_sentinels_round_trip() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "GPIB0::26::INSTR");

    resource.set_timeout(Timeout::Immediate).unwrap();
    assert_eq!(resource.timeout().unwrap(), Timeout::Immediate);

    resource.set_timeout(Timeout::Infinite).unwrap();
    assert_eq!(resource.timeout().unwrap(), Timeout::Infinite);

    resource.set_timeout(Timeout::Ms(1500)).unwrap();
    assert_eq!(resource.timeout().unwrap(), Timeout::Ms(1500));

    // A silent instrument turns into a timeout error on read.
    let mb = resource.as_message_based().unwrap();
    assert!(matches!(mb.read(), Err(Error::Timeout { .. })));
}

#[test]
fn attribute_ranges_are_enforced() {
    let backend = TestBackend::new();
    let rm = ResourceManager::new(backend.clone()).unwrap();
    let serial = rm
        .open_resource("ASRL3::INSTR", OpenOptions::default())
        .unwrap()
        .into_serial()
        .ok()
        .unwrap();

    serial.set_data_bits(8).unwrap();
    assert_eq!(serial.data_bits().unwrap(), 8);
    assert!(serial.set_data_bits(9).is_err());
    assert!(serial.set_data_bits(4).is_err());

    serial.set_baud_rate(115_200).unwrap();
    assert_eq!(serial.baud_rate().unwrap(), 115_200);
}

#[test]
fn serial_resources_default_to_cr_termination() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "ASRL1::INSTR");
    let serial = resource.as_message_based().unwrap();
    assert_eq!(serial.read_termination(), "\r");
    assert_eq!(serial.write_termination(), "\r");
}

#[test]
fn discovery_canonicalizes_and_reports_info() {
    let backend = TestBackend::new();
    backend.advertise("GPIB0::5::INSTR");
    backend.advertise("ASRL/dev/ttyS0::INSTR");
    backend.advertise("TCPIP0::1.2.3.4::999::SOCKET");
    let rm = ResourceManager::new(backend.clone()).unwrap();

    let names = rm.list_resources_default().unwrap();
    assert_eq!(
        names,
        vec![
            "GPIB0::5::INSTR".to_string(),
            "ASRL/dev/ttyS0::INSTR".to_string(),
        ]
    );

    let infos = rm.list_resources_info("?*::INSTR").unwrap();
    let serial = &infos["ASRL/dev/ttyS0::INSTR"];
    assert_eq!(serial.alias.as_deref(), Some("/dev/ttyS0"));

    let all = rm.list_resources("?*").unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn open_dispatches_to_typed_resources() {
    let backend = TestBackend::new();
    let rm = ResourceManager::new(backend.clone()).unwrap();

    let opened = rm
        .open_resource("gpib0::9::instr", OpenOptions::default())
        .unwrap();
    assert!(matches!(opened, AnyResource::GpibInstrument(_)));
    assert_eq!(opened.resource_name(), "GPIB0::9::INSTR");

    let opened = rm
        .open_resource("USB::0x1234::5::SN::RAW", OpenOptions::default())
        .unwrap();
    assert!(matches!(opened, AnyResource::UsbRaw(_)));

    let opened = rm
        .open_resource("GPIB1::INTFC", OpenOptions::default())
        .unwrap();
    assert!(matches!(opened, AnyResource::GpibInterface(_)));

    // Forcing an unknown (interface, class) pair falls back to the
    // generic resource.
    let opened = rm
        .open_resource(
            "GPIB0::9::INSTR",
            OpenOptions {
                resource_class_override: Some(ResourceClass::Socket),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(matches!(opened, AnyResource::Generic(_)));
}

#[test]
fn attribute_overrides_apply_at_open() {
    let backend = TestBackend::new();
    let rm = ResourceManager::new(backend.clone()).unwrap();
    let resource = rm
        .open_resource(
            "GPIB0::11::INSTR",
            OpenOptions {
                attr_overrides: vec![(visa::AttrId::TMO_VALUE, AttrValue::U32(750))],
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(resource.timeout().unwrap(), Timeout::Ms(750));
}

#[test]
fn two_managers_share_the_backend_with_distinct_sessions() {
    let backend = TestBackend::new();
    let rm1 = ResourceManager::new(backend.clone()).unwrap();
    let rm2 = ResourceManager::new(backend.clone()).unwrap();
    assert_ne!(rm1.session().unwrap(), rm2.session().unwrap());

    // Either manager can open resources independently.
    let a = rm1
        .open_resource("GPIB0::1::INSTR", OpenOptions::default())
        .unwrap();
    let b = rm2
        .open_resource("GPIB0::1::INSTR", OpenOptions::default())
        .unwrap();
    assert_ne!(a.session().unwrap(), b.session().unwrap());
}

#[test]
fn open_failure_propagates_backend_mapping() {
    let backend = TestBackend::new();
    let rm = ResourceManager::new(backend.clone()).unwrap();
    let err = rm
        .open_resource("TCPIP::missing.example::INSTR", OpenOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::ResourceNotFound(_)));
}
