//! Serial (RS-232) instrument: typed line-setting properties.
//!
//! Every property is a thin wrapper over the corresponding `ASRL_*`
//! attribute, validated against the attribute registry (data bits 5..=8,
//! deci-encoded stop bits, enumerated parity).

use crate::backend::AttrValue;
use crate::constants::{
    AttrId, FlowControl, LineState, Parity, SerialEnd, StatusCode, StopBits,
};
use crate::error::{Error, Result};
use crate::resources::messagebased::MessageBased;
use crate::resources::resource::Resource;
use crate::resources::resource_type;

resource_type! {
    /// An instrument behind a serial port (`ASRL[board]::INSTR`), including
    /// ENET-serial bridges and OS device-path aliases.
    SerialInstrument, "SerialInstrument"
}

impl MessageBased for SerialInstrument {}

fn bad_state(op: &'static str) -> Error {
    Error::Io {
        status: StatusCode::ERROR_NSUP_ATTR_STATE,
        op,
    }
}

impl SerialInstrument {
    pub fn baud_rate(&self) -> Result<u32> {
        self.get_visa_attribute(AttrId::ASRL_BAUD)?
            .as_u32()
            .ok_or_else(|| bad_state("baud_rate"))
    }

    pub fn set_baud_rate(&self, baud: u32) -> Result<()> {
        self.set_visa_attribute(AttrId::ASRL_BAUD, AttrValue::U32(baud))
    }

    /// Data bits per frame, 5..=8.
    pub fn data_bits(&self) -> Result<u16> {
        self.get_visa_attribute(AttrId::ASRL_DATA_BITS)?
            .as_u16()
            .ok_or_else(|| bad_state("data_bits"))
    }

    pub fn set_data_bits(&self, bits: u16) -> Result<()> {
        // Registry range 5..=8 enforced by the attribute setter.
        self.set_visa_attribute(AttrId::ASRL_DATA_BITS, AttrValue::U16(bits))
    }

    pub fn stop_bits(&self) -> Result<StopBits> {
        let deci = self
            .get_visa_attribute(AttrId::ASRL_STOP_BITS)?
            .as_u16()
            .ok_or_else(|| bad_state("stop_bits"))?;
        StopBits::from_deci_bits(deci).ok_or_else(|| bad_state("stop_bits"))
    }

    pub fn set_stop_bits(&self, stop_bits: StopBits) -> Result<()> {
        self.set_visa_attribute(AttrId::ASRL_STOP_BITS, AttrValue::U16(stop_bits.deci_bits()))
    }

    pub fn parity(&self) -> Result<Parity> {
        let raw = self
            .get_visa_attribute(AttrId::ASRL_PARITY)?
            .as_u16()
            .ok_or_else(|| bad_state("parity"))?;
        Parity::from_value(raw).ok_or_else(|| bad_state("parity"))
    }

    pub fn set_parity(&self, parity: Parity) -> Result<()> {
        self.set_visa_attribute(AttrId::ASRL_PARITY, AttrValue::U16(parity.value()))
    }

    pub fn flow_control(&self) -> Result<FlowControl> {
        let raw = self
            .get_visa_attribute(AttrId::ASRL_FLOW_CNTRL)?
            .as_u16()
            .ok_or_else(|| bad_state("flow_control"))?;
        Ok(FlowControl::from_bits_truncate(raw))
    }

    pub fn set_flow_control(&self, flow: FlowControl) -> Result<()> {
        self.set_visa_attribute(AttrId::ASRL_FLOW_CNTRL, AttrValue::U16(flow.bits()))
    }

    /// Policy ending read operations (last bit, termchar, break).
    pub fn end_input(&self) -> Result<SerialEnd> {
        let raw = self
            .get_visa_attribute(AttrId::ASRL_END_IN)?
            .as_u16()
            .ok_or_else(|| bad_state("end_input"))?;
        SerialEnd::from_value(raw).ok_or_else(|| bad_state("end_input"))
    }

    pub fn set_end_input(&self, end: SerialEnd) -> Result<()> {
        self.set_visa_attribute(AttrId::ASRL_END_IN, AttrValue::U16(end.value()))
    }

    pub fn end_output(&self) -> Result<SerialEnd> {
        let raw = self
            .get_visa_attribute(AttrId::ASRL_END_OUT)?
            .as_u16()
            .ok_or_else(|| bad_state("end_output"))?;
        SerialEnd::from_value(raw).ok_or_else(|| bad_state("end_output"))
    }

    pub fn set_end_output(&self, end: SerialEnd) -> Result<()> {
        self.set_visa_attribute(AttrId::ASRL_END_OUT, AttrValue::U16(end.value()))
    }

    /// Whether the transmit line is held in the break state.
    pub fn break_state(&self) -> Result<LineState> {
        let raw = self
            .get_visa_attribute(AttrId::ASRL_BREAK_STATE)?
            .as_i16()
            .ok_or_else(|| bad_state("break_state"))?;
        Ok(LineState::from_value(raw))
    }

    pub fn set_break_state(&self, asserted: bool) -> Result<()> {
        self.set_visa_attribute(
            AttrId::ASRL_BREAK_STATE,
            AttrValue::I16(if asserted { 1 } else { 0 }),
        )
    }

    /// Duration of a transmitted break, in milliseconds.
    pub fn break_length(&self) -> Result<i16> {
        self.get_visa_attribute(AttrId::ASRL_BREAK_LEN)?
            .as_i16()
            .ok_or_else(|| bad_state("break_length"))
    }

    pub fn set_break_length(&self, milliseconds: i16) -> Result<()> {
        self.set_visa_attribute(AttrId::ASRL_BREAK_LEN, AttrValue::I16(milliseconds))
    }

    pub fn xon_char(&self) -> Result<u8> {
        self.get_visa_attribute(AttrId::ASRL_XON_CHAR)?
            .as_u8()
            .ok_or_else(|| bad_state("xon_char"))
    }

    pub fn set_xon_char(&self, ch: u8) -> Result<()> {
        self.set_visa_attribute(AttrId::ASRL_XON_CHAR, AttrValue::U8(ch))
    }

    pub fn xoff_char(&self) -> Result<u8> {
        self.get_visa_attribute(AttrId::ASRL_XOFF_CHAR)?
            .as_u8()
            .ok_or_else(|| bad_state("xoff_char"))
    }

    pub fn set_xoff_char(&self, ch: u8) -> Result<()> {
        self.set_visa_attribute(AttrId::ASRL_XOFF_CHAR, AttrValue::U8(ch))
    }

    /// Number of bytes available in the low-level input buffer.
    pub fn bytes_in_buffer(&self) -> Result<u32> {
        self.get_visa_attribute(AttrId::ASRL_AVAIL_NUM)?
            .as_u32()
            .ok_or_else(|| bad_state("bytes_in_buffer"))
    }

    pub fn cts_state(&self) -> Result<LineState> {
        let raw = self
            .get_visa_attribute(AttrId::ASRL_CTS_STATE)?
            .as_i16()
            .ok_or_else(|| bad_state("cts_state"))?;
        Ok(LineState::from_value(raw))
    }

    pub fn dsr_state(&self) -> Result<LineState> {
        let raw = self
            .get_visa_attribute(AttrId::ASRL_DSR_STATE)?
            .as_i16()
            .ok_or_else(|| bad_state("dsr_state"))?;
        Ok(LineState::from_value(raw))
    }
}
