//! Message-based capability: chunked reads, termination handling, ASCII
//! and binary value transfers.
//!
//! The engine lives in default methods of [`MessageBased`]; bus-specific
//! resource types opt in with an empty impl. Each backend call serializes
//! on the per-resource mutex of the core; a transfer is a sequence of such
//! calls driven by the returned statuses (`SUCCESS_MAX_CNT` keeps a read
//! loop going, anything else ends it).

use std::time::Duration;

use crate::backend::AttrValue;
use crate::codec::{
    self,
    block::{self, BlockHeader, Scan},
};
use crate::constants::{AttrId, FlushMask, StatusCode};
use crate::error::{Error, Result};
use crate::resources::resource::Resource;

/// How many bytes one low-level read requests by default.
pub const DEFAULT_CHUNK_SIZE: usize = 20 * 1024;

/// Default delay between the write and read legs of a query, in seconds.
pub const DEFAULT_QUERY_DELAY: f64 = 0.0;

/// Text encoding of message transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Ascii,
    Utf8,
    Latin1,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Ascii => "ascii",
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin-1",
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Encoding::Ascii => match bytes.iter().position(|&b| b >= 0x80) {
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
                Some(offset) => Err(Error::Encoding {
                    encoding: self.name(),
                    offset,
                }),
            },
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| Error::Encoding {
                encoding: self.name(),
                offset: e.utf8_error().valid_up_to(),
            }),
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Ascii | Encoding::Latin1 => {
                let limit = if *self == Encoding::Ascii { 0x80 } else { 0x100 };
                let mut out = Vec::with_capacity(text.len());
                for (offset, ch) in text.char_indices() {
                    let code = ch as u32;
                    if code >= limit {
                        return Err(Error::Encoding {
                            encoding: self.name(),
                            offset,
                        });
                    }
                    out.push(code as u8);
                }
                Ok(out)
            }
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        }
    }
}

/// Per-resource I/O configuration of a message-based session.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Termination sequence expected on reads; empty means none.
    pub read_termination: String,
    /// Termination appended to writes.
    pub write_termination: String,
    pub chunk_size: usize,
    /// Seconds slept between the write and read legs of a query.
    pub query_delay: f64,
    pub encoding: Encoding,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            read_termination: String::new(),
            write_termination: "\r\n".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            query_delay: DEFAULT_QUERY_DELAY,
            encoding: Encoding::Ascii,
        }
    }
}

/// Framing of a binary value transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockFormat {
    #[default]
    Ieee,
    Hp,
    Empty,
}

/// Options of a binary value read.
pub struct BinaryOptions<'m> {
    pub format: BlockFormat,
    pub big_endian: bool,
    /// Expect (and consume) a trailing termination byte after the payload.
    pub expect_termination: bool,
    /// Element count, required for `Empty` framing and useful for `#0`.
    pub data_points: Option<usize>,
    /// Bytes searched for the `#` sentinel.
    pub header_scan_window: usize,
    pub chunk_size: Option<usize>,
    /// Invoked with the byte delta after each backend read.
    pub monitor: Option<&'m mut dyn FnMut(usize)>,
}

impl Default for BinaryOptions<'_> {
    fn default() -> Self {
        BinaryOptions {
            format: BlockFormat::Ieee,
            big_endian: false,
            expect_termination: true,
            data_points: None,
            header_scan_window: block::DEFAULT_HEADER_SCAN_WINDOW,
            chunk_size: None,
            monitor: None,
        }
    }
}

/// Options of a counted byte read.
pub struct ReadBytesOptions<'m> {
    /// Terminate at the first termination character, which is included in
    /// the returned bytes.
    pub break_on_termchar: bool,
    pub chunk_size: Option<usize>,
    pub monitor: Option<&'m mut dyn FnMut(usize)>,
}

impl Default for ReadBytesOptions<'_> {
    fn default() -> Self {
        ReadBytesOptions {
            break_on_termchar: false,
            chunk_size: None,
            monitor: None,
        }
    }
}

/// Message-based I/O surface (GPIB, USB-TMC, TCPIP, serial, VXI/PXI
/// message devices).
pub trait MessageBased: Resource {
    // --- configuration --------------------------------------------------

    fn read_termination(&self) -> String {
        self.core().io_cfg.lock().read_termination.clone()
    }

    /// Set the read termination. The last character is configured as the
    /// low-level termination character; the full sequence is verified and
    /// stripped after each read. A sequence whose final character also
    /// appears earlier would stop reads prematurely and is rejected.
    fn set_read_termination(&self, termination: &str) -> Result<()> {
        if termination.is_empty() {
            self.set_visa_attribute(AttrId::TERMCHAR_EN, AttrValue::Bool(false))?;
            self.core().io_cfg.lock().read_termination.clear();
            return Ok(());
        }

        let last = termination.as_bytes()[termination.len() - 1];
        if termination.as_bytes()[..termination.len() - 1].contains(&last) {
            return Err(Error::protocol(
                "ambiguous ending in termination characters",
            ));
        }
        self.set_visa_attribute(AttrId::TERMCHAR, AttrValue::U8(last))?;
        self.set_visa_attribute(AttrId::TERMCHAR_EN, AttrValue::Bool(true))?;
        self.core().io_cfg.lock().read_termination = termination.to_string();
        Ok(())
    }

    fn write_termination(&self) -> String {
        self.core().io_cfg.lock().write_termination.clone()
    }

    fn set_write_termination(&self, termination: &str) {
        self.core().io_cfg.lock().write_termination = termination.to_string();
    }

    fn chunk_size(&self) -> usize {
        self.core().io_cfg.lock().chunk_size
    }

    fn set_chunk_size(&self, chunk_size: usize) {
        self.core().io_cfg.lock().chunk_size = chunk_size.max(1);
    }

    fn query_delay(&self) -> f64 {
        self.core().io_cfg.lock().query_delay
    }

    fn set_query_delay(&self, delay: f64) {
        self.core().io_cfg.lock().query_delay = delay.max(0.0);
    }

    fn encoding(&self) -> Encoding {
        self.core().io_cfg.lock().encoding
    }

    fn set_encoding(&self, encoding: Encoding) {
        self.core().io_cfg.lock().encoding = encoding;
    }

    /// Whether END (EOI or equivalent) is asserted after each write.
    fn send_end(&self) -> Result<bool> {
        Ok(self
            .get_visa_attribute(AttrId::SEND_END_EN)?
            .as_bool()
            .unwrap_or(true))
    }

    fn set_send_end(&self, send_end: bool) -> Result<()> {
        self.set_visa_attribute(AttrId::SEND_END_EN, AttrValue::Bool(send_end))
    }

    // --- raw transfers --------------------------------------------------

    /// One backend read of up to `count` bytes plus the ending status.
    fn read_chunk(&self, count: usize) -> Result<(Vec<u8>, StatusCode)> {
        self.core().with_session("read", |backend, session| {
            backend
                .read(session, count)
                .map(|(data, status)| ((data, status), status))
        })
    }

    fn write_raw(&self, data: &[u8]) -> Result<usize> {
        self.core().with_session("write", |backend, session| {
            backend.write(session, data)
        })
    }

    /// Read chunk by chunk until the backend reports anything other than
    /// a filled buffer. No termination handling, nothing stripped.
    fn read_raw(&self, size: Option<usize>) -> Result<Vec<u8>> {
        let chunk = size.unwrap_or_else(|| self.chunk_size());
        let mut out = Vec::new();
        loop {
            let (data, status) = self.read_chunk(chunk)?;
            out.extend_from_slice(&data);
            if status != StatusCode::SUCCESS_MAX_CNT {
                return Ok(out);
            }
        }
    }

    /// Read exactly `count` bytes unless the backend legitimately ends the
    /// transfer early (END indicator, or the termination character when
    /// `break_on_termchar` is set). Early endings are visible in
    /// `last_status`.
    fn read_bytes(&self, count: usize, mut opts: ReadBytesOptions<'_>) -> Result<Vec<u8>> {
        let chunk = opts.chunk_size.unwrap_or_else(|| self.chunk_size());

        // Temporarily let the session terminate reads on the termchar.
        let saved_termchar_en = if opts.break_on_termchar {
            let saved = self
                .get_visa_attribute(AttrId::TERMCHAR_EN)?
                .as_bool()
                .unwrap_or(false);
            self.set_visa_attribute(AttrId::TERMCHAR_EN, AttrValue::Bool(true))?;
            Some(saved)
        } else {
            None
        };

        let mut out = Vec::with_capacity(count.min(chunk));
        let result = loop {
            let want = chunk.min(count - out.len());
            let (data, status) = match self.read_chunk(want) {
                Ok(read) => read,
                Err(err) => break Err(err),
            };
            if let Some(monitor) = opts.monitor.as_mut() {
                monitor(data.len());
            }
            out.extend_from_slice(&data);

            if out.len() >= count {
                break Ok(());
            }
            match status {
                StatusCode::SUCCESS_MAX_CNT => continue,
                StatusCode::SUCCESS_TERM_CHAR if opts.break_on_termchar => break Ok(()),
                StatusCode::SUCCESS_TERM_CHAR => continue,
                other => {
                    log::debug!(
                        "{}: read_bytes ended after {} of {count} bytes ({other})",
                        self.resource_name(),
                        out.len()
                    );
                    break Ok(());
                }
            }
        };

        if let Some(saved) = saved_termchar_en {
            if let Err(err) = self.set_visa_attribute(AttrId::TERMCHAR_EN, AttrValue::Bool(saved)) {
                log::debug!(
                    "{}: restoring TERMCHAR_EN after read_bytes: {err}",
                    self.resource_name()
                );
            }
        }

        result.map(|_| out)
    }

    // --- text transfers -------------------------------------------------

    /// Read a decoded string using the configured termination and
    /// encoding. The termination sequence is stripped.
    fn read(&self) -> Result<String> {
        self.read_with(None, None)
    }

    /// Read with explicit overrides. An explicit termination temporarily
    /// reconfigures the low-level termination character for this call.
    fn read_with(&self, termination: Option<&str>, encoding: Option<Encoding>) -> Result<String> {
        let cfg = self.core().io_cfg.lock().clone();
        let term = termination.unwrap_or(&cfg.read_termination).to_string();
        let enco = encoding.unwrap_or(cfg.encoding);

        let override_termchar = match termination {
            Some(t) if !t.is_empty() && t != cfg.read_termination => {
                let saved = self.get_visa_attribute(AttrId::TERMCHAR)?;
                self.set_visa_attribute(
                    AttrId::TERMCHAR,
                    AttrValue::U8(t.as_bytes()[t.len() - 1]),
                )?;
                self.set_visa_attribute(AttrId::TERMCHAR_EN, AttrValue::Bool(true))?;
                Some(saved)
            }
            _ => None,
        };

        let bytes = if term.is_empty() {
            // No termination: a single chunk defines the message boundary.
            self.read_chunk(cfg.chunk_size).map(|(data, _)| data)
        } else {
            self.read_until_termination(term.as_bytes(), cfg.chunk_size)
        };

        if let Some(saved) = override_termchar {
            if let Err(err) = self.set_visa_attribute(AttrId::TERMCHAR, saved) {
                log::debug!(
                    "{}: restoring TERMCHAR after read: {err}",
                    self.resource_name()
                );
            }
        }
        let bytes = bytes?;

        let mut message = enco.decode(&bytes)?;
        if !term.is_empty() {
            if message.ends_with(&term) {
                message.truncate(message.len() - term.len());
            } else {
                log::warn!(
                    "{}: read string does not end with the termination sequence",
                    self.resource_name()
                );
            }
        }
        Ok(message)
    }

    /// Chunked read ending on the termination sequence, END, or an error.
    fn read_until_termination(&self, termination: &[u8], chunk: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let (data, status) = self.read_chunk(chunk)?;
            out.extend_from_slice(&data);
            match status {
                StatusCode::SUCCESS_MAX_CNT => continue,
                StatusCode::SUCCESS_TERM_CHAR => {
                    if out.ends_with(termination) {
                        return Ok(out);
                    }
                    // Lone termchar inside the body; keep reading.
                    continue;
                }
                _ => return Ok(out),
            }
        }
    }

    /// Write a string, appending the write termination exactly once.
    /// Fails if the message already carries it.
    fn write(&self, message: &str) -> Result<usize> {
        self.write_with(message, None, None)
    }

    fn write_with(
        &self,
        message: &str,
        termination: Option<&str>,
        encoding: Option<Encoding>,
    ) -> Result<usize> {
        let cfg = self.core().io_cfg.lock().clone();
        let term = termination.unwrap_or(&cfg.write_termination);
        let enco = encoding.unwrap_or(cfg.encoding);

        if !term.is_empty() && message.ends_with(term) {
            return Err(Error::protocol(
                "write message already ends with the termination sequence",
            ));
        }

        let mut payload = enco.encode(message)?;
        payload.extend_from_slice(&enco.encode(term)?);
        self.write_raw(&payload)
    }

    /// Write `command`, optionally sleep, then read the response.
    fn query(&self, command: &str) -> Result<String> {
        let delay = self.query_delay();
        self.query_with_delay(command, delay)
    }

    fn query_with_delay(&self, command: &str, delay: f64) -> Result<String> {
        self.write(command)?;
        if delay > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(delay));
        }
        self.read()
    }

    /// Flush the selected I/O buffers.
    fn flush(&self, mask: FlushMask) -> Result<()> {
        self.core()
            .run("flush", |backend, session| backend.flush(session, mask))
    }

    /// Last byte of the configured read termination, `\n` when none is
    /// configured. Used to recognize block terminators.
    fn termination_byte(&self) -> u8 {
        self.core()
            .io_cfg
            .lock()
            .read_termination
            .as_bytes()
            .last()
            .copied()
            .unwrap_or(b'\n')
    }
}

/// Value-transfer extension of [`MessageBased`].
///
/// Kept separate so `MessageBased` stays usable as a trait object; these
/// methods are generic over element and container types and dispatch
/// statically. Implemented for every message-based resource, including
/// `dyn MessageBased`.
pub trait MessageBasedExt: MessageBased {
    // --- ASCII value transfers ------------------------------------------

    /// Read a separator-delimited value stream, converting each element
    /// with `FromStr`.
    fn read_ascii_values<T, C>(&self) -> Result<C>
    where
        T: std::str::FromStr,
        C: FromIterator<T>,
    {
        self.read_ascii_values_with(codec::DEFAULT_SEPARATOR, |token| token.parse().ok())
    }

    fn read_ascii_values_with<T, C>(
        &self,
        separator: &str,
        convert: impl Fn(&str) -> Option<T>,
    ) -> Result<C>
    where
        C: FromIterator<T>,
    {
        let text = self.read()?;
        Ok(codec::parse_ascii_values(&text, separator, convert)?
            .into_iter()
            .collect())
    }

    fn query_ascii_values<T, C>(&self, command: &str) -> Result<C>
    where
        T: std::str::FromStr,
        C: FromIterator<T>,
    {
        let delay = self.query_delay();
        self.write(command)?;
        if delay > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(delay));
        }
        self.read_ascii_values()
    }

    /// Write `command` followed by the formatted values.
    fn write_ascii_values<T>(
        &self,
        command: &str,
        values: &[T],
        separator: &str,
        format: impl Fn(&T) -> String,
    ) -> Result<usize> {
        let body = codec::format_ascii_values(values, separator, format);
        let mut message = String::with_capacity(command.len() + body.len());
        message.push_str(command);
        message.push_str(&body);
        self.write(&message)
    }

    // --- binary value transfers -----------------------------------------

    /// Read a framed block of fixed-width values.
    fn read_binary_values<T, C>(&self, mut opts: BinaryOptions<'_>) -> Result<C>
    where
        T: codec::Datum,
        C: FromIterator<T>,
    {
        let chunk = opts.chunk_size.unwrap_or_else(|| self.chunk_size());
        let term_byte = self.termination_byte();

        let mut buf: Vec<u8> = Vec::new();
        let mut last_status = StatusCode::SUCCESS_MAX_CNT;

        // Locate the header, growing the buffer chunk by chunk.
        let (header, payload_offset) = loop {
            let scan = match opts.format {
                BlockFormat::Ieee => block::scan_ieee(&buf, opts.header_scan_window)?,
                BlockFormat::Hp => block::scan_hp(&buf, opts.header_scan_window)?,
                BlockFormat::Empty => Scan::Found(block::LocatedHeader {
                    header: BlockHeader::Empty,
                    payload_offset: 0,
                }),
            };
            match scan {
                Scan::Found(located) => break (located.header, located.payload_offset),
                Scan::Incomplete => {
                    if last_status != StatusCode::SUCCESS_MAX_CNT && !buf.is_empty() {
                        return Err(Error::protocol(
                            "stream ended before a complete block header",
                        ));
                    }
                    let (data, status) = self.read_chunk(chunk)?;
                    if data.is_empty() && status != StatusCode::SUCCESS_MAX_CNT {
                        return Err(Error::protocol(
                            "stream ended before a complete block header",
                        ));
                    }
                    if let Some(monitor) = opts.monitor.as_mut() {
                        monitor(data.len());
                    }
                    buf.extend_from_slice(&data);
                    last_status = status;
                }
            }
        };

        let declared = match header {
            BlockHeader::Ieee { len: Some(len) } => Some(len as usize),
            BlockHeader::Hp { len } => Some(len as usize),
            BlockHeader::Ieee { len: None } | BlockHeader::Empty => {
                opts.data_points.map(|n| n * T::SIZE)
            }
        };

        let payload = match declared {
            Some(len) => {
                let needed = payload_offset + len + usize::from(opts.expect_termination);
                while buf.len() < needed {
                    let want = chunk.min(needed - buf.len());
                    let (data, status) = self.read_chunk(want)?;
                    if let Some(monitor) = opts.monitor.as_mut() {
                        monitor(data.len());
                    }
                    if data.is_empty() && status != StatusCode::SUCCESS_MAX_CNT {
                        return Err(Error::protocol(format!(
                            "block payload ended after {} of {len} declared bytes",
                            buf.len().saturating_sub(payload_offset)
                        )));
                    }
                    buf.extend_from_slice(&data);
                }
                if opts.expect_termination {
                    let last = buf[needed - 1];
                    if last != term_byte {
                        log::warn!(
                            "{}: block not followed by the termination character \
                             (found {last:#04X})",
                            self.resource_name()
                        );
                    }
                }
                &buf[payload_offset..payload_offset + len]
            }
            None => {
                // Indefinite length: drain until END or a short read.
                while last_status == StatusCode::SUCCESS_MAX_CNT {
                    let (data, status) = self.read_chunk(chunk)?;
                    if let Some(monitor) = opts.monitor.as_mut() {
                        monitor(data.len());
                    }
                    if data.is_empty() && status == StatusCode::SUCCESS_MAX_CNT {
                        continue;
                    }
                    buf.extend_from_slice(&data);
                    last_status = status;
                }
                let mut end = buf.len();
                if opts.expect_termination && end > payload_offset && buf[end - 1] == term_byte {
                    end -= 1;
                }
                &buf[payload_offset..end]
            }
        };

        Ok(codec::unpack::<T>(payload, opts.big_endian)?
            .into_iter()
            .collect())
    }

    fn query_binary_values<T, C>(&self, command: &str, opts: BinaryOptions<'_>) -> Result<C>
    where
        T: codec::Datum,
        C: FromIterator<T>,
    {
        let delay = self.query_delay();
        self.write(command)?;
        if delay > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(delay));
        }
        self.read_binary_values(opts)
    }

    /// Write `command` followed by a framed block of values and the write
    /// termination, as a single backend write.
    fn write_binary_values<T>(
        &self,
        command: &str,
        values: &[T],
        format: BlockFormat,
        big_endian: bool,
    ) -> Result<usize>
    where
        T: codec::Datum,
    {
        let cfg = self.core().io_cfg.lock().clone();
        if !cfg.write_termination.is_empty() && command.ends_with(&cfg.write_termination) {
            return Err(Error::protocol(
                "write message already ends with the termination sequence",
            ));
        }

        let payload = codec::pack(values, big_endian);
        let header = match format {
            BlockFormat::Ieee => block::ieee_header(payload.len() as u64),
            BlockFormat::Hp => block::hp_header(payload.len())?,
            BlockFormat::Empty => Vec::new(),
        };

        let mut message = cfg.encoding.encode(command)?;
        message.extend_from_slice(&header);
        message.extend_from_slice(&payload);
        message.extend_from_slice(&cfg.encoding.encode(&cfg.write_termination)?);
        self.write_raw(&message)
    }
}

impl<R: MessageBased + ?Sized> MessageBasedExt for R {}
