//! Pull-based content stream tokenizer.
//!
//! [`ContentTokenizer`] turns raw content-stream bytes into a sequence of
//! [`Operation`]s on demand, each carrying the operands that preceded it.
//! Structural syntax problems surface as [`StreamFault`]s with the byte
//! offset and the last operator that tokenized cleanly, so a caller can
//! report where a damaged stream went wrong while keeping everything
//! delivered up to that point.

use inkstream_core::{StreamFault, StreamFaultKind};

/// A content stream operand value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Integer number (e.g., `42`, `-7`).
    Integer(i64),
    /// Real (floating-point) number (e.g., `3.14`, `.5`).
    Real(f64),
    /// Name object (e.g., `/F1`, `/DeviceRGB`). Stored without the leading `/`.
    Name(String),
    /// Literal string delimited by parentheses, stored as raw bytes.
    LiteralString(Vec<u8>),
    /// Hexadecimal string delimited by angle brackets, stored as decoded bytes.
    HexString(Vec<u8>),
    /// Array of operands (e.g., `[1 2 3]`).
    Array(Vec<Operand>),
    /// Boolean value (`true` or `false`).
    Boolean(bool),
    /// The null object.
    Null,
    /// Dictionary object (`<< /Key value ... >>`).
    Dictionary(Vec<(String, Operand)>),
    /// Captured inline image (`BI ... ID ... EI`).
    InlineImage(Box<InlineImage>),
}

impl Operand {
    /// Numeric value of an `Integer` or `Real` operand.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Operand::Integer(i) => Some(*i as f64),
            Operand::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Operand::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Raw bytes of a literal or hex string operand.
    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Operand::LiteralString(b) | Operand::HexString(b) => Some(b),
            _ => None,
        }
    }
}

/// One operator together with its operands and stream position.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operator name as it appeared in the stream (e.g., `"Tj"`, `"f*"`).
    pub name: String,
    /// Operands that preceded this operator.
    pub operands: Vec<Operand>,
    /// Byte offset of the operator token.
    pub offset: usize,
}

/// An inline image captured between `BI` and `EI`.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// Image dictionary entries between `BI` and `ID`, abbreviated keys as-is.
    pub dict: Vec<(String, Operand)>,
    /// Raw (still encoded) image data between `ID` and `EI`.
    pub data: Vec<u8>,
    /// True when the declared `/L`/`/Length` did not land on an `EI`
    /// terminator and the data boundary was recovered by scanning.
    pub recovered: bool,
}

impl InlineImage {
    /// Look up a dictionary entry by its abbreviated or full key.
    pub fn entry(&self, abbrev: &str, full: &str) -> Option<&Operand> {
        self.dict
            .iter()
            .find(|(k, _)| k == abbrev || k == full)
            .map(|(_, v)| v)
    }
}

/// Tokenizes a content stream one operation at a time.
pub struct ContentTokenizer<'a> {
    input: &'a [u8],
    pos: usize,
    last_operator: Option<String>,
}

impl<'a> ContentTokenizer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            last_operator: None,
        }
    }

    /// Current byte offset into the stream.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Pull the next operation, or `Ok(None)` at end of stream.
    ///
    /// Trailing operands with no operator are discarded, matching the
    /// tolerance of mainstream viewers.
    pub fn next_operation(&mut self) -> Result<Option<Operation>, StreamFault> {
        let mut operand_stack: Vec<Operand> = Vec::new();

        while self.pos < self.input.len() {
            self.skip_whitespace_and_comments();
            if self.pos >= self.input.len() {
                break;
            }

            let b = self.input[self.pos];
            match b {
                b'(' => {
                    let s = self.parse_literal_string()?;
                    operand_stack.push(Operand::LiteralString(s));
                }
                b'<' => {
                    if self.peek(1) == Some(b'<') {
                        let dict = self.parse_dictionary()?;
                        operand_stack.push(Operand::Dictionary(dict));
                    } else {
                        let s = self.parse_hex_string()?;
                        operand_stack.push(Operand::HexString(s));
                    }
                }
                b'[' => {
                    self.pos += 1;
                    let arr = self.parse_array()?;
                    operand_stack.push(Operand::Array(arr));
                }
                b'/' => {
                    let name = self.parse_name();
                    operand_stack.push(Operand::Name(name));
                }
                b'0'..=b'9' | b'+' | b'-' | b'.' => {
                    let num = self.parse_number()?;
                    operand_stack.push(num);
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'*' | b'\'' | b'"' => {
                    let start = self.pos;
                    let keyword = self.parse_keyword();
                    match keyword.as_str() {
                        "true" => operand_stack.push(Operand::Boolean(true)),
                        "false" => operand_stack.push(Operand::Boolean(false)),
                        "null" => operand_stack.push(Operand::Null),
                        "BI" => {
                            let image = self.parse_inline_image()?;
                            self.last_operator = Some("BI".to_string());
                            return Ok(Some(Operation {
                                name: "BI".to_string(),
                                operands: vec![Operand::InlineImage(Box::new(image))],
                                offset: start,
                            }));
                        }
                        _ => {
                            self.last_operator = Some(keyword.clone());
                            return Ok(Some(Operation {
                                name: keyword,
                                operands: operand_stack,
                                offset: start,
                            }));
                        }
                    }
                }
                b']' | b')' | b'>' | b'{' | b'}' => {
                    return Err(self.fault(StreamFaultKind::UnexpectedByte(b)));
                }
                _ => {
                    // Stray byte outside any token; skip it
                    self.pos += 1;
                }
            }
        }

        Ok(None)
    }

    fn fault(&self, kind: StreamFaultKind) -> StreamFault {
        StreamFault {
            kind,
            offset: self.pos,
            last_operator: self.last_operator.clone(),
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.pos + ahead).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.input.len() {
            let b = self.input[self.pos];
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while self.pos < self.input.len()
                    && self.input[self.pos] != b'\n'
                    && self.input[self.pos] != b'\r'
                {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Literal string `(...)` with balanced parentheses and escapes.
    fn parse_literal_string(&mut self) -> Result<Vec<u8>, StreamFault> {
        debug_assert_eq!(self.input[self.pos], b'(');
        self.pos += 1;

        let mut result = Vec::new();
        let mut depth = 1u32;

        while self.pos < self.input.len() {
            let b = self.input[self.pos];
            match b {
                b'(' => {
                    depth += 1;
                    result.push(b'(');
                    self.pos += 1;
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(result);
                    }
                    result.push(b')');
                    self.pos += 1;
                }
                b'\\' => {
                    self.pos += 1;
                    if self.pos >= self.input.len() {
                        return Err(self.fault(StreamFaultKind::UnterminatedString));
                    }
                    let escaped = self.input[self.pos];
                    match escaped {
                        b'n' => result.push(b'\n'),
                        b'r' => result.push(b'\r'),
                        b't' => result.push(b'\t'),
                        b'b' => result.push(0x08),
                        b'f' => result.push(0x0C),
                        b'(' => result.push(b'('),
                        b')' => result.push(b')'),
                        b'\\' => result.push(b'\\'),
                        b'\r' => {
                            // Line continuation, CR optionally followed by LF
                            self.pos += 1;
                            if self.pos < self.input.len() && self.input[self.pos] == b'\n' {
                                self.pos += 1;
                            }
                            continue;
                        }
                        b'\n' => {
                            self.pos += 1;
                            continue;
                        }
                        b'0'..=b'7' => {
                            // Octal escape, 1-3 digits
                            let mut val = escaped - b'0';
                            for _ in 0..2 {
                                match self.peek(1) {
                                    Some(d @ b'0'..=b'7') => {
                                        self.pos += 1;
                                        val = val.wrapping_mul(8).wrapping_add(d - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            result.push(val);
                            self.pos += 1;
                            continue;
                        }
                        _ => {
                            // Unknown escape, keep the character itself
                            result.push(escaped);
                        }
                    }
                    self.pos += 1;
                }
                _ => {
                    result.push(b);
                    self.pos += 1;
                }
            }
        }

        Err(self.fault(StreamFaultKind::UnterminatedString))
    }

    /// Hex string `<...>`; odd digit counts get a trailing zero.
    fn parse_hex_string(&mut self) -> Result<Vec<u8>, StreamFault> {
        debug_assert_eq!(self.input[self.pos], b'<');
        self.pos += 1;

        let mut hex_chars = Vec::new();
        let mut closed = false;
        while self.pos < self.input.len() {
            let b = self.input[self.pos];
            if b == b'>' {
                self.pos += 1;
                closed = true;
                break;
            }
            if is_whitespace(b) {
                self.pos += 1;
                continue;
            }
            hex_chars.push(b);
            self.pos += 1;
        }
        if !closed {
            return Err(self.fault(StreamFaultKind::UnterminatedString));
        }

        if hex_chars.len() % 2 != 0 {
            hex_chars.push(b'0');
        }

        let mut result = Vec::with_capacity(hex_chars.len() / 2);
        for chunk in hex_chars.chunks(2) {
            match (hex_digit(chunk[0]), hex_digit(chunk[1])) {
                (Some(hi), Some(lo)) => result.push((hi << 4) | lo),
                _ => return Err(self.fault(StreamFaultKind::UnexpectedByte(chunk[0]))),
            }
        }
        Ok(result)
    }

    /// Array body after `[` has been consumed.
    fn parse_array(&mut self) -> Result<Vec<Operand>, StreamFault> {
        let mut elements = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.input.len() {
                return Err(self.fault(StreamFaultKind::UnterminatedArray));
            }

            let b = self.input[self.pos];
            match b {
                b']' => {
                    self.pos += 1;
                    return Ok(elements);
                }
                b'(' => {
                    let s = self.parse_literal_string()?;
                    elements.push(Operand::LiteralString(s));
                }
                b'<' => {
                    if self.peek(1) == Some(b'<') {
                        let dict = self.parse_dictionary()?;
                        elements.push(Operand::Dictionary(dict));
                    } else {
                        let s = self.parse_hex_string()?;
                        elements.push(Operand::HexString(s));
                    }
                }
                b'[' => {
                    self.pos += 1;
                    let arr = self.parse_array()?;
                    elements.push(Operand::Array(arr));
                }
                b'/' => {
                    let name = self.parse_name();
                    elements.push(Operand::Name(name));
                }
                b'0'..=b'9' | b'+' | b'-' | b'.' => {
                    let num = self.parse_number()?;
                    elements.push(num);
                }
                b'a'..=b'z' | b'A'..=b'Z' => {
                    let keyword = self.parse_keyword();
                    match keyword.as_str() {
                        "true" => elements.push(Operand::Boolean(true)),
                        "false" => elements.push(Operand::Boolean(false)),
                        "null" => elements.push(Operand::Null),
                        // Operators never appear inside arrays; keep as name-like
                        _ => elements.push(Operand::Name(keyword)),
                    }
                }
                _ => return Err(self.fault(StreamFaultKind::UnexpectedByte(b))),
            }
        }
    }

    /// Dictionary `<< /Key value ... >>`; current bytes are `<<`.
    fn parse_dictionary(&mut self) -> Result<Vec<(String, Operand)>, StreamFault> {
        self.pos += 2;

        let mut entries = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.input.len() {
                return Err(self.fault(StreamFaultKind::UnterminatedDictionary));
            }

            if self.input[self.pos] == b'>' && self.peek(1) == Some(b'>') {
                self.pos += 2;
                return Ok(entries);
            }

            if self.input[self.pos] != b'/' {
                return Err(self.fault(StreamFaultKind::UnexpectedByte(self.input[self.pos])));
            }
            let key = self.parse_name();

            self.skip_whitespace_and_comments();
            if self.pos >= self.input.len() {
                return Err(self.fault(StreamFaultKind::UnterminatedDictionary));
            }
            let value = self.parse_value()?;
            entries.push((key, value));
        }
    }

    /// One value in a dictionary or inline-image dictionary position.
    fn parse_value(&mut self) -> Result<Operand, StreamFault> {
        let b = self.input[self.pos];
        match b {
            b'/' => Ok(Operand::Name(self.parse_name())),
            b'(' => Ok(Operand::LiteralString(self.parse_literal_string()?)),
            b'<' => {
                if self.peek(1) == Some(b'<') {
                    Ok(Operand::Dictionary(self.parse_dictionary()?))
                } else {
                    Ok(Operand::HexString(self.parse_hex_string()?))
                }
            }
            b'[' => {
                self.pos += 1;
                Ok(Operand::Array(self.parse_array()?))
            }
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.parse_number(),
            b'a'..=b'z' | b'A'..=b'Z' => {
                let kw = self.parse_keyword();
                match kw.as_str() {
                    "true" => Ok(Operand::Boolean(true)),
                    "false" => Ok(Operand::Boolean(false)),
                    "null" => Ok(Operand::Null),
                    _ => Ok(Operand::Name(kw)),
                }
            }
            _ => Err(self.fault(StreamFaultKind::UnexpectedByte(b))),
        }
    }

    /// `/Name` token with `#XX` hex escapes; current byte is `/`.
    fn parse_name(&mut self) -> String {
        debug_assert_eq!(self.input[self.pos], b'/');
        self.pos += 1;

        let start = self.pos;
        while self.pos < self.input.len()
            && !is_whitespace(self.input[self.pos])
            && !is_delimiter(self.input[self.pos])
        {
            self.pos += 1;
        }

        let raw = &self.input[start..self.pos];
        let mut name = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(hi), Some(lo)) = (hex_digit(raw[i + 1]), hex_digit(raw[i + 2])) {
                    name.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            name.push(raw[i]);
            i += 1;
        }
        String::from_utf8_lossy(&name).into_owned()
    }

    /// Integer or real number.
    fn parse_number(&mut self) -> Result<Operand, StreamFault> {
        let start = self.pos;
        let mut has_dot = false;

        if self.pos < self.input.len()
            && (self.input[self.pos] == b'+' || self.input[self.pos] == b'-')
        {
            self.pos += 1;
        }

        while self.pos < self.input.len() {
            let b = self.input[self.pos];
            if b == b'.' {
                if has_dot {
                    break;
                }
                has_dot = true;
                self.pos += 1;
            } else if b.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }

        let token = &self.input[start..self.pos];
        let s = match std::str::from_utf8(token) {
            Ok(s) => s,
            Err(_) => return Err(self.fault(StreamFaultKind::InvalidNumber)),
        };

        if has_dot {
            s.parse::<f64>()
                .map(Operand::Real)
                .map_err(|_| self.fault(StreamFaultKind::InvalidNumber))
        } else {
            s.parse::<i64>()
                .map(Operand::Integer)
                .map_err(|_| self.fault(StreamFaultKind::InvalidNumber))
        }
    }

    /// Keyword token (alphabetic plus `*`, `'`, `"`).
    fn parse_keyword(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.input.len() {
            let b = self.input[self.pos];
            if b.is_ascii_alphabetic() || b == b'*' || b == b'\'' || b == b'"' {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Inline image after `BI` has been consumed: dictionary, `ID`, data, `EI`.
    ///
    /// A declared `/L` (or `/Length`) is honored when the byte it points at
    /// is really followed by `EI`; otherwise the terminator is recovered by
    /// scanning and the image is flagged as recovered.
    fn parse_inline_image(&mut self) -> Result<InlineImage, StreamFault> {
        let mut dict = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.input.len() {
                return Err(self.fault(StreamFaultKind::UnterminatedInlineImage));
            }

            if self.input[self.pos] == b'I'
                && self.peek(1) == Some(b'D')
                && self.peek(2).is_none_or(is_whitespace)
            {
                self.pos += 2;
                // Single mandatory whitespace separator after ID
                if self.pos < self.input.len() && is_whitespace(self.input[self.pos]) {
                    self.pos += 1;
                }
                break;
            }

            if self.input[self.pos] != b'/' {
                return Err(self.fault(StreamFaultKind::UnexpectedByte(self.input[self.pos])));
            }
            let key = self.parse_name();

            self.skip_whitespace_and_comments();
            if self.pos >= self.input.len() {
                return Err(self.fault(StreamFaultKind::UnterminatedInlineImage));
            }
            let value = self.parse_value()?;
            dict.push((key, value));
        }

        let data_start = self.pos;

        let declared_len = dict
            .iter()
            .find(|(k, _)| k == "L" || k == "Length")
            .and_then(|(_, v)| v.as_i64())
            .and_then(|n| usize::try_from(n).ok());

        if let Some(len) = declared_len {
            if let Some(end) = self.try_declared_length(data_start, len) {
                let data = self.input[data_start..data_start + len].to_vec();
                self.pos = end;
                return Ok(InlineImage {
                    dict,
                    data,
                    recovered: false,
                });
            }
            // Declared length does not land on EI; fall through to scanning
            let (data, end) = self
                .scan_for_ei(data_start)
                .ok_or_else(|| self.fault(StreamFaultKind::UnterminatedInlineImage))?;
            self.pos = end;
            return Ok(InlineImage {
                dict,
                data,
                recovered: true,
            });
        }

        let (data, end) = self
            .scan_for_ei(data_start)
            .ok_or_else(|| self.fault(StreamFaultKind::UnterminatedInlineImage))?;
        self.pos = end;
        Ok(InlineImage {
            dict,
            data,
            recovered: false,
        })
    }

    /// Check that `EI` follows `len` data bytes (after optional whitespace).
    /// Returns the position just past `EI` on success.
    fn try_declared_length(&self, data_start: usize, len: usize) -> Option<usize> {
        let mut p = data_start.checked_add(len)?;
        if p > self.input.len() {
            return None;
        }
        while p < self.input.len() && is_whitespace(self.input[p]) {
            p += 1;
        }
        if p + 2 <= self.input.len() && self.input[p] == b'E' && self.input[p + 1] == b'I' {
            let after = p + 2;
            if after >= self.input.len()
                || is_whitespace(self.input[after])
                || is_delimiter(self.input[after])
            {
                return Some(after);
            }
        }
        None
    }

    /// Scan forward for an `EI` terminator preceded by whitespace and
    /// followed by whitespace, a delimiter, or end of stream. Returns the
    /// data (trailing separator trimmed) and the position past `EI`.
    fn scan_for_ei(&self, data_start: usize) -> Option<(Vec<u8>, usize)> {
        let mut p = data_start;
        while p + 2 <= self.input.len() {
            if (p == data_start || is_whitespace(self.input[p - 1]))
                && self.input[p] == b'E'
                && self.input[p + 1] == b'I'
                && (p + 2 >= self.input.len()
                    || is_whitespace(self.input[p + 2])
                    || is_delimiter(self.input[p + 2]))
            {
                let mut end = p;
                if end > data_start && is_whitespace(self.input[end - 1]) {
                    end -= 1;
                }
                return Some((self.input[data_start..end].to_vec(), p + 2));
            }
            p += 1;
        }
        None
    }
}

/// Tokenize a whole stream eagerly. Convenience wrapper over the pull API.
pub fn tokenize(input: &[u8]) -> Result<Vec<Operation>, StreamFault> {
    let mut tokenizer = ContentTokenizer::new(input);
    let mut ops = Vec::new();
    while let Some(op) = tokenizer.next_operation()? {
        ops.push(op);
    }
    Ok(ops)
}

/// Returns `true` if `b` is a PDF whitespace character.
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

/// Returns `true` if `b` is a PDF delimiter character.
pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
