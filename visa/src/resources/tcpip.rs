//! TCPIP instrument (VXI-11/HiSLIP device), raw socket and VICP resources.

use crate::backend::AttrValue;
use crate::constants::AttrId;
use crate::error::Result;
use crate::resources::messagebased::MessageBased;
use crate::resources::resource::Resource;
use crate::resources::resource_type;

resource_type! {
    /// A LAN instrument (`TCPIP[board]::host[::lan_device]::INSTR`).
    TcpipInstrument, "TCPIPInstrument"
}

impl MessageBased for TcpipInstrument {}

impl TcpipInstrument {
    pub fn address(&self) -> Result<String> {
        Ok(self
            .get_visa_attribute(AttrId::TCPIP_ADDR)?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    pub fn hostname(&self) -> Result<String> {
        Ok(self
            .get_visa_attribute(AttrId::TCPIP_HOSTNAME)?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    pub fn lan_device_name(&self) -> Result<String> {
        Ok(self
            .get_visa_attribute(AttrId::TCPIP_DEVICE_NAME)?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

resource_type! {
    /// A raw TCP socket (`TCPIP[board]::host::port::SOCKET`).
    TcpipSocket, "TCPIPSocket"
}

impl MessageBased for TcpipSocket {}

impl TcpipSocket {
    pub fn nodelay(&self) -> Result<bool> {
        Ok(self
            .get_visa_attribute(AttrId::TCPIP_NODELAY)?
            .as_bool()
            .unwrap_or(false))
    }

    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.set_visa_attribute(AttrId::TCPIP_NODELAY, AttrValue::Bool(nodelay))
    }

    pub fn keepalive(&self) -> Result<bool> {
        Ok(self
            .get_visa_attribute(AttrId::TCPIP_KEEPALIVE)?
            .as_bool()
            .unwrap_or(false))
    }

    pub fn set_keepalive(&self, keepalive: bool) -> Result<()> {
        self.set_visa_attribute(AttrId::TCPIP_KEEPALIVE, AttrValue::Bool(keepalive))
    }
}

resource_type! {
    /// A LeCroy VICP instrument (`VICP[board]::host::INSTR`).
    VicpInstrument, "VICPInstrument"
}

impl MessageBased for VicpInstrument {}
