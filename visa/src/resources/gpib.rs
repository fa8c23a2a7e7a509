//! GPIB instrument and interface (board controller) operations.

use std::time::{Duration, Instant};

use crate::backend::AttrValue;
use crate::constants::{AttrId, EventMechanism, EventType, RenMode, TRIG_PROT_DEFAULT, TRIG_SW};
use crate::error::{Error, Result};
use crate::resources::messagebased::MessageBased;
use crate::resources::resource::Resource;
use crate::resources::resource_type;

// IEEE-488.1 multiline command bytes.
const CMD_GTL: u8 = 0x01;
const CMD_GET: u8 = 0x08;
const CMD_UNL: u8 = 0x3F;
const LISTEN_BASE: u8 = 0x20;

/// Status-byte bit signalling that this device requested service.
const STB_RQS: u8 = 0x40;

resource_type! {
    /// An instrument on a GPIB bus (`GPIB[board]::primary[::secondary]::INSTR`).
    GpibInstrument, "GPIBInstrument"
}

impl MessageBased for GpibInstrument {}

impl GpibInstrument {
    /// Send a software trigger to the device.
    pub fn trigger(&self) -> Result<()> {
        self.set_visa_attribute(AttrId::TRIG_ID, AttrValue::I16(TRIG_SW))?;
        self.core().run("assert_trigger", |backend, session| {
            backend.assert_trigger(session, TRIG_PROT_DEFAULT)
        })
    }

    /// Write interface command bytes on the bus.
    pub fn send_command(&self, data: &[u8]) -> Result<usize> {
        self.core().with_session("gpib_command", |backend, session| {
            backend.gpib_command(session, data)
        })
    }

    /// Block until *this* device requests service, or the deadline passes.
    ///
    /// Service requests from other devices on the bus wake the wait but do
    /// not end it; the status byte is polled after each event and the wait
    /// continues unless the RQS bit is set. `None` waits forever.
    pub fn wait_for_srq(&self, timeout_ms: Option<u32>) -> Result<()> {
        self.enable_event(EventType::ServiceRequest, EventMechanism::QUEUE)?;

        let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms as u64));
        loop {
            let wait_ms = match deadline {
                None => crate::constants::TIMEOUT_INFINITE,
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    left.as_millis().min(u32::MAX as u128) as u32
                }
            };

            let response = self.wait_on_event(EventType::ServiceRequest, wait_ms)?;
            if response.timed_out {
                return Err(Error::Timeout {
                    op: "wait_for_srq",
                    timeout_ms: timeout_ms.unwrap_or(0),
                });
            }
            if self.read_stb()? & STB_RQS != 0 {
                break;
            }
        }

        self.discard_events(EventType::ServiceRequest, EventMechanism::QUEUE)
    }
}

resource_type! {
    /// A GPIB board controller (`GPIB[board]::INTFC`).
    GpibInterface, "GPIBInterface"
}

impl MessageBased for GpibInterface {}

impl GpibInterface {
    /// Pulse the IFC line, making this controller the controller-in-charge.
    pub fn send_ifc(&self) -> Result<()> {
        self.core()
            .run("gpib_send_ifc", |backend, session| backend.gpib_send_ifc(session))
    }

    /// Write interface command bytes on the bus.
    pub fn send_command(&self, data: &[u8]) -> Result<usize> {
        self.core().with_session("gpib_command", |backend, session| {
            backend.gpib_command(session, data)
        })
    }

    /// Address the given primary addresses to listen.
    pub fn send_list(&self, listeners: &[u8]) -> Result<usize> {
        let mut command = Vec::with_capacity(listeners.len() + 1);
        command.push(CMD_UNL);
        for &address in listeners {
            command.push(LISTEN_BASE | (address & 0x1F));
        }
        self.send_command(&command)
    }

    /// Assert REN so addressed devices switch to remote operation.
    pub fn enable_remote(&self) -> Result<()> {
        self.core().run("gpib_control_ren", |backend, session| {
            backend.gpib_control_ren(session, RenMode::Assert)
        })
    }

    /// Deassert REN and return devices to local operation.
    pub fn disable_remote(&self) -> Result<()> {
        self.core().run("gpib_control_ren", |backend, session| {
            backend.gpib_control_ren(session, RenMode::Deassert)
        })
    }

    /// Send GTL to the listed devices.
    pub fn go_to_local(&self, listeners: &[u8]) -> Result<usize> {
        let mut command = Vec::with_capacity(listeners.len() + 2);
        command.push(CMD_UNL);
        for &address in listeners {
            command.push(LISTEN_BASE | (address & 0x1F));
        }
        command.push(CMD_GTL);
        self.send_command(&command)
    }

    /// Pass control-in-charge to another controller.
    pub fn pass_control(&self, primary: u16, secondary: u16) -> Result<()> {
        self.core().run("gpib_pass_control", |backend, session| {
            backend.gpib_pass_control(session, primary, secondary)
        })
    }

    /// Address the devices to listen and send a group execute trigger.
    pub fn group_execute_trigger(&self, listeners: &[u8]) -> Result<usize> {
        let mut command = Vec::with_capacity(listeners.len() + 2);
        command.push(CMD_UNL);
        for &address in listeners {
            command.push(LISTEN_BASE | (address & 0x1F));
        }
        command.push(CMD_GET);
        self.send_command(&command)
    }
}
