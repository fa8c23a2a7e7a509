//! USB-TMC instrument and raw USB device resources.

use crate::constants::{AttrId, StatusCode};
use crate::error::{Error, Result};
use crate::resources::messagebased::MessageBased;
use crate::resources::resource::Resource;
use crate::resources::resource_type;

fn bad_state(op: &'static str) -> Error {
    Error::Io {
        status: StatusCode::ERROR_NSUP_ATTR_STATE,
        op,
    }
}

macro_rules! usb_common {
    ($name:ident) => {
        impl $name {
            pub fn manufacturer_id(&self) -> Result<u16> {
                self.get_visa_attribute(AttrId::MANF_ID)?
                    .as_u16()
                    .ok_or_else(|| bad_state("manufacturer_id"))
            }

            pub fn model_code(&self) -> Result<u16> {
                self.get_visa_attribute(AttrId::MODEL_CODE)?
                    .as_u16()
                    .ok_or_else(|| bad_state("model_code"))
            }

            pub fn serial_number(&self) -> Result<String> {
                Ok(self
                    .get_visa_attribute(AttrId::USB_SERIAL_NUM)?
                    .as_str()
                    .unwrap_or_default()
                    .to_string())
            }

            pub fn usb_interface_number(&self) -> Result<u16> {
                self.get_visa_attribute(AttrId::USB_INTFC_NUM)?
                    .as_u16()
                    .ok_or_else(|| bad_state("usb_interface_number"))
            }

            /// Control transfer from the device (IN direction).
            pub fn control_in(
                &self,
                request_type: i16,
                request: i16,
                value: u16,
                index: u16,
                length: u16,
            ) -> Result<Vec<u8>> {
                self.core().with_session("usb_control_in", |backend, session| {
                    backend.usb_control_in(session, request_type, request, value, index, length)
                })
            }

            /// Control transfer to the device (OUT direction).
            pub fn control_out(
                &self,
                request_type: i16,
                request: i16,
                value: u16,
                index: u16,
                data: &[u8],
            ) -> Result<()> {
                self.core().run("usb_control_out", |backend, session| {
                    backend.usb_control_out(session, request_type, request, value, index, data)
                })
            }
        }
    };
}

resource_type! {
    /// A USB-TMC instrument (`USB[board]::mfg::model::serial[::iface]::INSTR`).
    UsbInstrument, "USBInstrument"
}

impl MessageBased for UsbInstrument {}
usb_common!(UsbInstrument);

resource_type! {
    /// A raw USB device (`...::RAW`): message pipes without TMC framing.
    UsbRaw, "USBRaw"
}

impl MessageBased for UsbRaw {}
usb_common!(UsbRaw);
