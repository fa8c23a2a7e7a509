//! Resource-name grammar: parse, canonical rendering and the discovery
//! pattern matcher.
//!
//! ```text
//! ASRL[board][::INSTR]                                | ASRL0::host::port::INSTR
//! GPIB[board]::primary[::secondary][::INSTR]          | GPIB[board]::INTFC
//! TCPIP[board]::host[::lan_device][::INSTR]           | TCPIP[board]::host::port::SOCKET
//! VICP[board]::host[::INSTR]
//! USB[board]::mfg::model::serial[::iface][::INSTR|::RAW]
//! PXI[bus]::device[::function][::INSTR]
//! PXI[iface]::bus-device[.function][::INSTR]
//! PXI[iface]::CHASSISn::SLOTm[::FUNCk][::INSTR]
//! PXI[iface]::chassis::BACKPLANE                      | PXI[iface]::MEMACC
//! VXI[board]::logical[::INSTR]                        | VXI[board][::logical]::BACKPLANE
//! VXI[board]::MEMACC                                  | VXI[board]::SERVANT
//! visa://host[:port]/remote_resource
//! ```
//!
//! Parsing is case-insensitive; rendering produces the canonical upper-case
//! form, materializing the board and omitting optional fields equal to their
//! defaults. A parsed record re-renders to a string that parses back to an
//! equal record.

use std::fmt;
use std::str::FromStr;

use crate::constants::{InterfaceType, ResourceClass};
use crate::error::{Error, Result};

/// Default LAN device name for `TCPIP::host::INSTR` resources.
pub const DEFAULT_LAN_DEVICE: &str = "inst0";

/// Board or interface index in front of the first `::`.
///
/// Non-numeric serial boards (OS device paths, `COM2`-style aliases) keep
/// the original spelling for re-emission toward the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Board {
    Number(u32),
    Alias(String),
}

impl Board {
    pub fn number(&self) -> Option<u32> {
        match self {
            Board::Number(n) => Some(*n),
            Board::Alias(_) => None,
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::Number(0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Board::Number(n) => write!(f, "{n}"),
            Board::Alias(s) => f.write_str(s),
        }
    }
}

/// Family-specific payload of a parsed resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResourceKind {
    GpibInstr {
        /// Primary address, 0..=30.
        primary: u8,
        /// Secondary address, 0..=30. Carried on the wire biased by 96;
        /// absent maps to the `NO_SEC_ADDR` sentinel.
        secondary: Option<u8>,
    },
    GpibIntfc,
    AsrlInstr,
    /// Serial port reached through an ENET-serial bridge.
    AsrlEnet { host: String, serial_port: u32 },
    TcpipInstr { host: String, lan_device: String },
    TcpipSocket { host: String, port: u16 },
    VicpInstr { host: String },
    Usb {
        manufacturer_id: u16,
        model_code: u16,
        serial_number: String,
        interface_number: Option<u8>,
        raw: bool,
    },
    PxiInstr {
        /// Present for the `bus-device[.function]` spelling.
        bus: Option<u32>,
        device: u32,
        function: u32,
    },
    PxiChassis {
        chassis: u32,
        slot: u32,
        function: Option<u32>,
    },
    PxiBackplane { chassis: u32 },
    PxiMemacc,
    VxiInstr { logical_address: u8 },
    VxiBackplane { logical_address: u8 },
    VxiMemacc,
    VxiServant,
    /// `visa://host[:port]/resource`; the inner name is never itself remote.
    Remote {
        host: String,
        port: Option<u16>,
        inner: Box<ResourceName>,
    },
}

/// A parsed, normalized resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    pub board: Board,
    pub kind: ResourceKind,
}

impl ResourceName {
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::parse(0, "empty resource name"));
        }

        let upper = name.to_ascii_uppercase();
        if upper.starts_with("VISA://") {
            return parse_remote(name);
        }
        if is_serial_alias(&upper) {
            return Ok(ResourceName {
                board: Board::Alias(name.to_string()),
                kind: ResourceKind::AsrlInstr,
            });
        }

        let parts = split_parts(name);
        let (head_pos, head) = parts[0];
        let (prefix, board) = split_interface(head, head_pos)?;

        // An explicit class token always wins over the family default.
        let mut rest: &[(usize, &str)] = &parts[1..];
        let class = match rest.last().and_then(|(_, t)| ResourceClass::from_token(t)) {
            Some(class) => {
                rest = &rest[..rest.len() - 1];
                Some(class)
            }
            None => None,
        };

        let kind = match prefix {
            "GPIB" => parse_gpib(name, rest, class)?,
            "ASRL" => parse_asrl(name, rest, class)?,
            "TCPIP" => parse_tcpip(name, rest, class)?,
            "VICP" => parse_vicp(name, rest, class)?,
            "USB" => parse_usb(name, rest, class)?,
            "PXI" => parse_pxi(name, rest, class)?,
            "VXI" => parse_vxi(name, rest, class)?,
            _ => unreachable!(),
        };

        Ok(ResourceName { board, kind })
    }

    pub fn interface_type(&self) -> InterfaceType {
        match &self.kind {
            ResourceKind::GpibInstr { .. } | ResourceKind::GpibIntfc => InterfaceType::Gpib,
            ResourceKind::AsrlInstr | ResourceKind::AsrlEnet { .. } => InterfaceType::Asrl,
            ResourceKind::TcpipInstr { .. } | ResourceKind::TcpipSocket { .. } => {
                InterfaceType::Tcpip
            }
            ResourceKind::VicpInstr { .. } => InterfaceType::Vicp,
            ResourceKind::Usb { .. } => InterfaceType::Usb,
            ResourceKind::PxiInstr { .. }
            | ResourceKind::PxiChassis { .. }
            | ResourceKind::PxiBackplane { .. }
            | ResourceKind::PxiMemacc => InterfaceType::Pxi,
            ResourceKind::VxiInstr { .. }
            | ResourceKind::VxiBackplane { .. }
            | ResourceKind::VxiMemacc
            | ResourceKind::VxiServant => InterfaceType::Vxi,
            ResourceKind::Remote { inner, .. } => inner.interface_type(),
        }
    }

    pub fn resource_class(&self) -> ResourceClass {
        match &self.kind {
            ResourceKind::GpibInstr { .. }
            | ResourceKind::AsrlInstr
            | ResourceKind::AsrlEnet { .. }
            | ResourceKind::TcpipInstr { .. }
            | ResourceKind::VicpInstr { .. }
            | ResourceKind::PxiInstr { .. }
            | ResourceKind::PxiChassis { .. }
            | ResourceKind::VxiInstr { .. } => ResourceClass::Instr,
            ResourceKind::GpibIntfc => ResourceClass::Intfc,
            ResourceKind::TcpipSocket { .. } => ResourceClass::Socket,
            ResourceKind::Usb { raw, .. } => {
                if *raw {
                    ResourceClass::Raw
                } else {
                    ResourceClass::Instr
                }
            }
            ResourceKind::PxiBackplane { .. } | ResourceKind::VxiBackplane { .. } => {
                ResourceClass::Backplane
            }
            ResourceKind::PxiMemacc | ResourceKind::VxiMemacc => ResourceClass::Memacc,
            ResourceKind::VxiServant => ResourceClass::Servant,
            ResourceKind::Remote { inner, .. } => inner.resource_class(),
        }
    }

    /// Canonical string form; `parse` of the result yields an equal record.
    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }
}

impl FromStr for ResourceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResourceName::parse(s)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let ResourceKind::Remote { host, port, inner } = &self.kind {
            write!(f, "visa://{host}")?;
            if let Some(port) = port {
                write!(f, ":{port}")?;
            }
            return write!(f, "/{inner}");
        }

        write!(f, "{}{}", self.interface_type().prefix(), self.board)?;
        match &self.kind {
            ResourceKind::GpibInstr { primary, secondary } => {
                write!(f, "::{primary}")?;
                if let Some(secondary) = secondary {
                    write!(f, "::{secondary}")?;
                }
            }
            ResourceKind::GpibIntfc
            | ResourceKind::AsrlInstr
            | ResourceKind::PxiMemacc
            | ResourceKind::VxiMemacc
            | ResourceKind::VxiServant => {}
            ResourceKind::AsrlEnet { host, serial_port } => {
                write!(f, "::{host}::{serial_port}")?;
            }
            ResourceKind::TcpipInstr { host, lan_device } => {
                write!(f, "::{host}")?;
                if lan_device != DEFAULT_LAN_DEVICE {
                    write!(f, "::{lan_device}")?;
                }
            }
            ResourceKind::TcpipSocket { host, port } => write!(f, "::{host}::{port}")?,
            ResourceKind::VicpInstr { host } => write!(f, "::{host}")?,
            ResourceKind::Usb {
                manufacturer_id,
                model_code,
                serial_number,
                interface_number,
                ..
            } => {
                write!(
                    f,
                    "::{:#06X}::{:#06X}::{serial_number}",
                    manufacturer_id, model_code
                )?;
                if let Some(iface) = interface_number {
                    write!(f, "::{iface}")?;
                }
            }
            ResourceKind::PxiInstr { bus, device, function } => {
                match bus {
                    Some(bus) => {
                        write!(f, "::{bus}-{device}")?;
                        if *function != 0 {
                            write!(f, ".{function}")?;
                        }
                    }
                    None => {
                        write!(f, "::{device}")?;
                        if *function != 0 {
                            write!(f, "::{function}")?;
                        }
                    }
                }
            }
            ResourceKind::PxiChassis { chassis, slot, function } => {
                write!(f, "::CHASSIS{chassis}::SLOT{slot}")?;
                if let Some(func) = function {
                    write!(f, "::FUNC{func}")?;
                }
            }
            ResourceKind::PxiBackplane { chassis } => write!(f, "::{chassis}")?,
            ResourceKind::VxiInstr { logical_address } => write!(f, "::{logical_address}")?,
            ResourceKind::VxiBackplane { logical_address } => {
                if *logical_address != 0 {
                    write!(f, "::{logical_address}")?;
                }
            }
            ResourceKind::Remote { .. } => unreachable!(),
        }
        write!(f, "::{}", self.resource_class())
    }
}

/// Resource class a name string resolves to, applying family defaults.
pub fn resource_class(name: &str) -> Result<ResourceClass> {
    Ok(ResourceName::parse(name)?.resource_class())
}

/// Parse a resource name and return its canonical form.
pub fn to_canonical_name(name: &str) -> Result<String> {
    Ok(ResourceName::parse(name)?.to_string())
}

// --- pattern matching ---------------------------------------------------

/// Match a discovery pattern (`?` one character, `*` any run) against a
/// resource name, case-insensitively and anchored at both ends.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let pat: Vec<u8> = pattern.to_ascii_uppercase().into_bytes();
    let txt: Vec<u8> = name.to_ascii_uppercase().into_bytes();
    glob(&pat, &txt)
}

/// Filter resource names against a discovery pattern, preserving order.
pub fn filter<'a, I>(names: I, pattern: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter(|name| matches_pattern(pattern, name))
        .map(|name| name.to_string())
        .collect()
}

fn glob(pat: &[u8], txt: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == b'?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            // Backtrack: let the last star swallow one more character.
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == b'*' {
        p += 1;
    }
    p == pat.len()
}

// --- parser internals ---------------------------------------------------

fn split_parts(s: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b':' && bytes[i + 1] == b':' {
            out.push((start, &s[start..i]));
            start = i + 2;
            i += 2;
        } else {
            i += 1;
        }
    }
    out.push((start, &s[start..]));
    out
}

fn is_serial_alias(upper: &str) -> bool {
    for prefix in ["COM", "LPT"] {
        if let Some(rest) = upper.strip_prefix(prefix) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                return true;
            }
        }
    }
    false
}

/// Split `GPIB1` / `ASRL/dev/ttyS0` into the interface prefix and board.
fn split_interface(head: &str, pos: usize) -> Result<(&'static str, Board)> {
    const PREFIXES: [&str; 7] = ["TCPIP", "VICP", "ASRL", "GPIB", "USB", "PXI", "VXI"];

    let upper = head.to_ascii_uppercase();
    let prefix = PREFIXES
        .iter()
        .find(|p| upper.starts_with(*p))
        .copied()
        .ok_or_else(|| Error::parse(pos, format!("unknown interface type in '{head}'")))?;

    let rest = &head[prefix.len()..];
    let board = if rest.is_empty() {
        Board::Number(0)
    } else if let Ok(n) = parse_u32(rest) {
        Board::Number(n)
    } else if prefix == "ASRL" {
        Board::Alias(rest.to_string())
    } else {
        return Err(Error::parse(
            pos + prefix.len(),
            format!("board '{rest}' is not a number"),
        ));
    };
    Ok((prefix, board))
}

fn parse_u32(token: &str) -> std::result::Result<u32, ()> {
    let token = token.trim();
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).map_err(|_| ())
    } else {
        token.parse().map_err(|_| ())
    }
}

fn num(name: &str, parts: &[(usize, &str)], idx: usize, field: &str) -> Result<u32> {
    let (pos, token) = required(name, parts, idx, field)?;
    parse_u32(token).map_err(|_| Error::parse(pos, format!("{field} '{token}' is not a number")))
}

fn num_in(
    name: &str,
    parts: &[(usize, &str)],
    idx: usize,
    field: &str,
    max: u32,
) -> Result<u32> {
    let value = num(name, parts, idx, field)?;
    if value > max {
        let (pos, _) = parts[idx];
        return Err(Error::parse(pos, format!("{field} {value} out of range 0..={max}")));
    }
    Ok(value)
}

fn required<'a>(
    name: &str,
    parts: &[(usize, &'a str)],
    idx: usize,
    field: &str,
) -> Result<(usize, &'a str)> {
    match parts.get(idx) {
        Some((pos, token)) if !token.is_empty() => Ok((*pos, *token)),
        Some((pos, _)) => Err(Error::parse(*pos, format!("{field} is empty"))),
        None => Err(Error::parse(name.len(), format!("missing {field}"))),
    }
}

fn no_trailing(parts: &[(usize, &str)], max: usize) -> Result<()> {
    if parts.len() > max {
        let (pos, token) = parts[max];
        return Err(Error::parse(pos, format!("unexpected trailing token '{token}'")));
    }
    Ok(())
}

fn wrong_class(pos_hint: &str, class: ResourceClass, family: &str) -> Error {
    Error::parse(
        pos_hint.len(),
        format!("resource class {class} is not valid for {family}"),
    )
}

fn parse_gpib(
    name: &str,
    parts: &[(usize, &str)],
    class: Option<ResourceClass>,
) -> Result<ResourceKind> {
    match class.unwrap_or(ResourceClass::Instr) {
        ResourceClass::Instr => {
            let primary = num_in(name, parts, 0, "primary address", 30)? as u8;
            let secondary = match parts.get(1) {
                Some(_) => Some(num_in(name, parts, 1, "secondary address", 30)? as u8),
                None => None,
            };
            no_trailing(parts, 2)?;
            Ok(ResourceKind::GpibInstr { primary, secondary })
        }
        ResourceClass::Intfc => {
            no_trailing(parts, 0)?;
            Ok(ResourceKind::GpibIntfc)
        }
        other => Err(wrong_class(name, other, "GPIB")),
    }
}

fn parse_asrl(
    name: &str,
    parts: &[(usize, &str)],
    class: Option<ResourceClass>,
) -> Result<ResourceKind> {
    match class.unwrap_or(ResourceClass::Instr) {
        ResourceClass::Instr => match parts.len() {
            0 => Ok(ResourceKind::AsrlInstr),
            2 => {
                let (_, host) = required(name, parts, 0, "host address")?;
                let serial_port = num(name, parts, 1, "serial port")?;
                Ok(ResourceKind::AsrlEnet {
                    host: host.to_ascii_lowercase(),
                    serial_port,
                })
            }
            _ => no_trailing(parts, 0).map(|_| unreachable!()),
        },
        other => Err(wrong_class(name, other, "ASRL")),
    }
}

fn parse_tcpip(
    name: &str,
    parts: &[(usize, &str)],
    class: Option<ResourceClass>,
) -> Result<ResourceKind> {
    match class.unwrap_or(ResourceClass::Instr) {
        ResourceClass::Instr => {
            let (_, host) = required(name, parts, 0, "host address")?;
            let lan_device = match parts.get(1) {
                Some((_, dev)) if !dev.is_empty() => dev.to_ascii_lowercase(),
                Some((pos, _)) => return Err(Error::parse(*pos, "LAN device name is empty")),
                None => DEFAULT_LAN_DEVICE.to_string(),
            };
            no_trailing(parts, 2)?;
            Ok(ResourceKind::TcpipInstr {
                host: host.to_ascii_lowercase(),
                lan_device,
            })
        }
        ResourceClass::Socket => {
            let (_, host) = required(name, parts, 0, "host address")?;
            let port = num(name, parts, 1, "port")?;
            let (port_pos, _) = parts[1];
            if port == 0 || port > u16::MAX as u32 {
                return Err(Error::parse(port_pos, format!("port {port} out of range 1..=65535")));
            }
            no_trailing(parts, 2)?;
            Ok(ResourceKind::TcpipSocket {
                host: host.to_ascii_lowercase(),
                port: port as u16,
            })
        }
        other => Err(wrong_class(name, other, "TCPIP")),
    }
}

fn parse_vicp(
    name: &str,
    parts: &[(usize, &str)],
    class: Option<ResourceClass>,
) -> Result<ResourceKind> {
    match class.unwrap_or(ResourceClass::Instr) {
        ResourceClass::Instr => {
            let (_, host) = required(name, parts, 0, "host address")?;
            no_trailing(parts, 1)?;
            Ok(ResourceKind::VicpInstr {
                host: host.to_ascii_lowercase(),
            })
        }
        other => Err(wrong_class(name, other, "VICP")),
    }
}

fn parse_usb(
    name: &str,
    parts: &[(usize, &str)],
    class: Option<ResourceClass>,
) -> Result<ResourceKind> {
    let raw = match class.unwrap_or(ResourceClass::Instr) {
        ResourceClass::Instr => false,
        ResourceClass::Raw => true,
        other => return Err(wrong_class(name, other, "USB")),
    };

    let manufacturer_id = num_in(name, parts, 0, "manufacturer ID", u16::MAX as u32)? as u16;
    let model_code = num_in(name, parts, 1, "model code", u16::MAX as u32)? as u16;
    let (_, serial) = required(name, parts, 2, "serial number")?;
    let interface_number = match parts.get(3) {
        Some(_) => Some(num_in(name, parts, 3, "USB interface number", u8::MAX as u32)? as u8),
        None => None,
    };
    no_trailing(parts, 4)?;
    Ok(ResourceKind::Usb {
        manufacturer_id,
        model_code,
        serial_number: serial.to_ascii_uppercase(),
        interface_number,
        raw,
    })
}

fn parse_pxi(
    name: &str,
    parts: &[(usize, &str)],
    class: Option<ResourceClass>,
) -> Result<ResourceKind> {
    match class.unwrap_or(ResourceClass::Instr) {
        ResourceClass::Instr => {
            let (pos, first) = required(name, parts, 0, "device")?;
            let upper = first.to_ascii_uppercase();
            if let Some(chassis) = upper.strip_prefix("CHASSIS") {
                let chassis = parse_u32(chassis)
                    .map_err(|_| Error::parse(pos, format!("bad chassis number in '{first}'")))?;
                let (slot_pos, slot_tok) = required(name, parts, 1, "slot")?;
                let slot_tok_upper = slot_tok.to_ascii_uppercase();
                let slot = slot_tok_upper
                    .strip_prefix("SLOT")
                    .and_then(|s| parse_u32(s).ok())
                    .ok_or_else(|| Error::parse(slot_pos, format!("expected SLOT<n>, got '{slot_tok}'")))?;
                let function = match parts.get(2) {
                    Some((func_pos, func_tok)) => {
                        let func_tok_upper = func_tok.to_ascii_uppercase();
                        Some(
                            func_tok_upper
                                .strip_prefix("FUNC")
                                .and_then(|s| parse_u32(s).ok())
                                .ok_or_else(|| {
                                    Error::parse(*func_pos, format!("expected FUNC<n>, got '{func_tok}'"))
                                })?,
                        )
                    }
                    None => None,
                };
                no_trailing(parts, 3)?;
                return Ok(ResourceKind::PxiChassis { chassis, slot, function });
            }

            if let Some((bus_str, rest)) = first.split_once('-') {
                let bus = parse_u32(bus_str)
                    .map_err(|_| Error::parse(pos, format!("bad bus number in '{first}'")))?;
                let (device_str, function) = match rest.split_once('.') {
                    Some((dev, func)) => {
                        let func = parse_u32(func)
                            .map_err(|_| Error::parse(pos, format!("bad function in '{first}'")))?;
                        (dev, func)
                    }
                    None => (rest, 0),
                };
                let device = parse_u32(device_str)
                    .map_err(|_| Error::parse(pos, format!("bad device number in '{first}'")))?;
                no_trailing(parts, 1)?;
                return Ok(ResourceKind::PxiInstr {
                    bus: Some(bus),
                    device,
                    function,
                });
            }

            let device = num(name, parts, 0, "device")?;
            let function = match parts.get(1) {
                Some(_) => num(name, parts, 1, "function")?,
                None => 0,
            };
            no_trailing(parts, 2)?;
            Ok(ResourceKind::PxiInstr {
                bus: None,
                device,
                function,
            })
        }
        ResourceClass::Backplane => {
            let chassis = num(name, parts, 0, "chassis number")?;
            no_trailing(parts, 1)?;
            Ok(ResourceKind::PxiBackplane { chassis })
        }
        ResourceClass::Memacc => {
            no_trailing(parts, 0)?;
            Ok(ResourceKind::PxiMemacc)
        }
        other => Err(wrong_class(name, other, "PXI")),
    }
}

fn parse_vxi(
    name: &str,
    parts: &[(usize, &str)],
    class: Option<ResourceClass>,
) -> Result<ResourceKind> {
    match class.unwrap_or(ResourceClass::Instr) {
        ResourceClass::Instr => {
            let logical = num_in(name, parts, 0, "logical address", u8::MAX as u32)? as u8;
            no_trailing(parts, 1)?;
            Ok(ResourceKind::VxiInstr {
                logical_address: logical,
            })
        }
        ResourceClass::Backplane => {
            let logical = match parts.first() {
                Some(_) => num_in(name, parts, 0, "logical address", u8::MAX as u32)? as u8,
                None => 0,
            };
            no_trailing(parts, 1)?;
            Ok(ResourceKind::VxiBackplane {
                logical_address: logical,
            })
        }
        ResourceClass::Memacc => {
            no_trailing(parts, 0)?;
            Ok(ResourceKind::VxiMemacc)
        }
        ResourceClass::Servant => {
            no_trailing(parts, 0)?;
            Ok(ResourceKind::VxiServant)
        }
        other => Err(wrong_class(name, other, "VXI")),
    }
}

fn parse_remote(name: &str) -> Result<ResourceName> {
    let body = &name["visa://".len()..];
    let slash = body
        .find('/')
        .ok_or_else(|| Error::parse(name.len(), "missing remote resource after host"))?;
    let (authority, inner_str) = (&body[..slash], &body[slash + 1..]);
    if authority.is_empty() {
        return Err(Error::parse("visa://".len(), "missing host"));
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port_str)) => {
            let pos = "visa://".len() + host.len() + 1;
            let port = parse_u32(port_str)
                .ok()
                .filter(|p| (1..=u16::MAX as u32).contains(p))
                .ok_or_else(|| Error::parse(pos, format!("bad server port '{port_str}'")))?;
            (host, Some(port as u16))
        }
        None => (authority, None),
    };

    let inner = ResourceName::parse(inner_str)?;
    if matches!(inner.kind, ResourceKind::Remote { .. }) {
        return Err(Error::parse(
            "visa://".len() + slash + 1,
            "remote resource names do not nest",
        ));
    }

    Ok(ResourceName {
        board: Board::Number(0),
        kind: ResourceKind::Remote {
            host: host.to_ascii_lowercase(),
            port,
            inner: Box::new(inner),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> ResourceName {
        ResourceName::parse(s).unwrap()
    }

    fn round_trip(s: &str) {
        let first = parse(s);
        let canonical = first.to_string();
        assert_eq!(parse(&canonical), first, "canonical form {canonical:?} of {s:?}");
    }

    #[test]
    fn gpib_with_secondary() {
        let r = parse("gpib1::3::5::instr");
        assert_eq!(r.board, Board::Number(1));
        assert_eq!(
            r.kind,
            ResourceKind::GpibInstr {
                primary: 3,
                secondary: Some(5)
            }
        );
        assert_eq!(r.to_string(), "GPIB1::3::5::INSTR");
    }

    #[test]
    fn gpib_defaults() {
        let r = parse("GPIB::11");
        assert_eq!(r.board, Board::Number(0));
        assert_eq!(
            r.kind,
            ResourceKind::GpibInstr {
                primary: 11,
                secondary: None
            }
        );
        assert_eq!(r.to_string(), "GPIB0::11::INSTR");
    }

    #[test]
    fn gpib_primary_range() {
        assert!(ResourceName::parse("GPIB::0").is_ok());
        assert!(ResourceName::parse("GPIB::30").is_ok());
        assert!(ResourceName::parse("GPIB::31").is_err());
    }

    #[test]
    fn gpib_interface() {
        let r = parse("GPIB2::INTFC");
        assert_eq!(r.board, Board::Number(2));
        assert_eq!(r.kind, ResourceKind::GpibIntfc);
        assert_eq!(r.resource_class(), ResourceClass::Intfc);
    }

    #[test]
    fn tcpip_socket_scenario() {
        let r = parse("TCPIP0::1.2.3.4::999::SOCKET");
        assert_eq!(
            r.kind,
            ResourceKind::TcpipSocket {
                host: "1.2.3.4".into(),
                port: 999
            }
        );
        assert_eq!(r.to_string(), "TCPIP0::1.2.3.4::999::SOCKET");
    }

    #[test]
    fn tcpip_default_lan_device() {
        let r = parse("TCPIP::scope.local::INSTR");
        assert_eq!(
            r.kind,
            ResourceKind::TcpipInstr {
                host: "scope.local".into(),
                lan_device: "inst0".into()
            }
        );
        // Default LAN device is omitted from the canonical form.
        assert_eq!(r.to_string(), "TCPIP0::scope.local::INSTR");
        assert_eq!(parse("TCPIP0::scope.local::inst0::INSTR"), r);
    }

    #[test]
    fn tcpip_port_range() {
        assert!(ResourceName::parse("TCPIP::h::0::SOCKET").is_err());
        assert!(ResourceName::parse("TCPIP::h::65536::SOCKET").is_err());
        assert!(ResourceName::parse("TCPIP::h::65535::SOCKET").is_ok());
    }

    #[test]
    fn asrl_forms() {
        assert_eq!(parse("ASRL1").to_string(), "ASRL1::INSTR");
        let alias = parse("ASRL/dev/ttyUSB0::INSTR");
        assert_eq!(alias.board, Board::Alias("/dev/ttyUSB0".into()));
        assert_eq!(alias.to_string(), "ASRL/dev/ttyUSB0::INSTR");

        let com = parse("com2");
        assert_eq!(com.board, Board::Alias("com2".into()));
        assert_eq!(com.kind, ResourceKind::AsrlInstr);

        let enet = parse("ASRL0::192.168.0.5::4::INSTR");
        assert_eq!(
            enet.kind,
            ResourceKind::AsrlEnet {
                host: "192.168.0.5".into(),
                serial_port: 4
            }
        );
    }

    #[test]
    fn usb_forms() {
        let r = parse("USB::0x1234::125::A22-5::INSTR");
        assert_eq!(
            r.kind,
            ResourceKind::Usb {
                manufacturer_id: 0x1234,
                model_code: 125,
                serial_number: "A22-5".into(),
                interface_number: None,
                raw: false,
            }
        );
        assert_eq!(r.to_string(), "USB0::0x1234::0x007D::A22-5::INSTR");
        round_trip("USB::0x1234::125::A22-5::INSTR");

        let raw = parse("usb0::0x5678::0x33::SN9::3::RAW");
        assert_eq!(raw.resource_class(), ResourceClass::Raw);
        assert!(matches!(
            raw.kind,
            ResourceKind::Usb {
                raw: true,
                interface_number: Some(3),
                ..
            }
        ));
    }

    #[test]
    fn pxi_forms() {
        assert_eq!(
            parse("PXI::15::INSTR").kind,
            ResourceKind::PxiInstr {
                bus: None,
                device: 15,
                function: 0
            }
        );
        assert_eq!(
            parse("PXI0::2-12.3::INSTR").kind,
            ResourceKind::PxiInstr {
                bus: Some(2),
                device: 12,
                function: 3
            }
        );
        assert_eq!(
            parse("PXI0::CHASSIS1::SLOT4::FUNC2::INSTR").kind,
            ResourceKind::PxiChassis {
                chassis: 1,
                slot: 4,
                function: Some(2)
            }
        );
        assert_eq!(
            parse("PXI::1::BACKPLANE").kind,
            ResourceKind::PxiBackplane { chassis: 1 }
        );
        assert_eq!(parse("PXI::MEMACC").kind, ResourceKind::PxiMemacc);
        round_trip("PXI0::2-12.3::INSTR");
        round_trip("PXI0::CHASSIS1::SLOT4::INSTR");
    }

    #[test]
    fn vxi_forms() {
        assert_eq!(
            parse("VXI::9").kind,
            ResourceKind::VxiInstr { logical_address: 9 }
        );
        assert_eq!(
            parse("VXI0::BACKPLANE").kind,
            ResourceKind::VxiBackplane { logical_address: 0 }
        );
        assert_eq!(parse("VXI::SERVANT").kind, ResourceKind::VxiServant);
        assert_eq!(parse("VXI::MEMACC").kind, ResourceKind::VxiMemacc);
        round_trip("VXI2::5::BACKPLANE");
    }

    #[test]
    fn remote_names() {
        let r = parse("visa://lab-host:3537/GPIB0::5::INSTR");
        match &r.kind {
            ResourceKind::Remote { host, port, inner } => {
                assert_eq!(host, "lab-host");
                assert_eq!(*port, Some(3537));
                assert_eq!(
                    inner.kind,
                    ResourceKind::GpibInstr {
                        primary: 5,
                        secondary: None
                    }
                );
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(r.to_string(), "visa://lab-host:3537/GPIB0::5::INSTR");
        assert_eq!(r.interface_type(), InterfaceType::Gpib);

        assert!(ResourceName::parse("visa://a/visa://b/GPIB::1").is_err());
    }

    #[test]
    fn mixed_case_equals_upper_case() {
        for (mixed, upper) in [
            ("gpib1::3::5::instr", "GPIB1::3::5::INSTR"),
            ("tcpip::Host.Example::Inst0::insTR", "TCPIP::HOST.EXAMPLE::INST0::INSTR"),
            ("usb::0x1234::12::sn::raw", "USB::0X1234::12::SN::RAW"),
        ] {
            assert_eq!(parse(mixed), parse(upper));
        }
    }

    #[test]
    fn trailing_tokens_rejected() {
        assert!(ResourceName::parse("GPIB0::1::2::3::INSTR").is_err());
        assert!(ResourceName::parse("TCPIP::h::inst0::extra::INSTR").is_err());
        assert!(ResourceName::parse("VXI::MEMACC::1").is_err());
    }

    #[test]
    fn unknown_interface_rejected() {
        let err = ResourceName::parse("FOO::1::INSTR").unwrap_err();
        assert!(matches!(err, Error::Parse { pos: 0, .. }));
    }

    #[test]
    fn canonical_round_trips() {
        for name in [
            "gpib::1",
            "GPIB1::3::5",
            "GPIB::INTFC",
            "asrl7",
            "ASRL/dev/ttyS0",
            "TCPIP::1.2.3.4",
            "TCPIP::dev.example::gpib0,5::INSTR",
            "TCPIP1::1.2.3.4::999::SOCKET",
            "VICP::10.0.0.7",
            "USB::0x104d::0x9::sn-1",
            "USB1::0x104D::0x0009::SN-1::2::RAW",
            "PXI::3",
            "PXI::MEMACC",
            "VXI::24",
            "visa://host/ASRL3::INSTR",
        ] {
            round_trip(name);
        }
    }

    #[test]
    fn pattern_filter() {
        let names = [
            "GPIB0::5::INSTR",
            "GPIB1::7::INSTR",
            "TCPIP0::1.2.3.4::INSTR",
            "ASRL1::INSTR",
            "GPIB0::INTFC",
        ];
        assert_eq!(
            filter(names, "?*::INSTR"),
            vec![
                "GPIB0::5::INSTR".to_string(),
                "GPIB1::7::INSTR".to_string(),
                "TCPIP0::1.2.3.4::INSTR".to_string(),
                "ASRL1::INSTR".to_string(),
            ]
        );
        assert_eq!(filter(names, "GPIB?::*"), {
            vec![
                "GPIB0::5::INSTR".to_string(),
                "GPIB1::7::INSTR".to_string(),
                "GPIB0::INTFC".to_string(),
            ]
        });
        assert_eq!(filter(names, "gpib0::5::instr").len(), 1);
        assert!(filter(names, "USB?*").is_empty());
    }
}
