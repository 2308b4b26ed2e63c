//! Error and warning taxonomy for content-stream processing.
//!
//! Three severities exist:
//! - [`ContentError`]: recoverable per-operator problems. The dispatcher
//!   logs them, records a [`ProcessWarning`], skips the operation, and
//!   continues.
//! - [`StreamFault`]: structural problems in the stream syntax. The pass
//!   aborts, but events already delivered to listeners remain valid.
//! - [`SetupError`]: caller misuse detected before processing begins.

use std::fmt;

/// A recoverable problem with a single operation.
///
/// These never escape the dispatch loop; they are converted into
/// [`ProcessWarning`]s and the offending operation is skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentError {
    /// The operand buffer did not match the operator's expected shape.
    OperandMismatch {
        /// Operator name as it appeared in the stream.
        operator: String,
        /// What the shape check expected versus what it found.
        detail: String,
    },
    /// A `cm` (or form placement) matrix had no inverse; the CTM is left
    /// unchanged.
    NonInvertibleMatrix { operator: String },
    /// A text-showing or text-positioning operator appeared outside BT/ET.
    OutsideTextObject { operator: String },
    /// A `Q` operator with no matching `q` on the state stack.
    UnbalancedRestore,
    /// A named resource (font, XObject, ExtGState) was not found.
    MissingResource {
        /// Resource category (e.g., "font", "xobject").
        kind: &'static str,
        name: String,
    },
    /// Anything else a handler wants to report without aborting.
    Other(String),
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentError::OperandMismatch { operator, detail } => {
                write!(f, "operand mismatch for '{operator}': {detail}")
            }
            ContentError::NonInvertibleMatrix { operator } => {
                write!(f, "non-invertible matrix in '{operator}'")
            }
            ContentError::OutsideTextObject { operator } => {
                write!(f, "'{operator}' outside BT/ET text object")
            }
            ContentError::UnbalancedRestore => write!(f, "unbalanced 'Q' with empty state stack"),
            ContentError::MissingResource { kind, name } => {
                write!(f, "{kind} resource '{name}' not found")
            }
            ContentError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ContentError {}

/// Category of structural stream fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFaultKind {
    /// A literal string was never closed.
    UnterminatedString,
    /// An array was never closed.
    UnterminatedArray,
    /// A dictionary was never closed.
    UnterminatedDictionary,
    /// An inline image never reached its `EI` terminator.
    UnterminatedInlineImage,
    /// A numeric literal could not be parsed.
    InvalidNumber,
    /// A byte that cannot start any token appeared at top level.
    UnexpectedByte(u8),
}

impl fmt::Display for StreamFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamFaultKind::UnterminatedString => write!(f, "unterminated string"),
            StreamFaultKind::UnterminatedArray => write!(f, "unterminated array"),
            StreamFaultKind::UnterminatedDictionary => write!(f, "unterminated dictionary"),
            StreamFaultKind::UnterminatedInlineImage => {
                write!(f, "inline image missing EI terminator")
            }
            StreamFaultKind::InvalidNumber => write!(f, "unparsable numeric literal"),
            StreamFaultKind::UnexpectedByte(b) => write!(f, "unexpected byte 0x{b:02X}"),
        }
    }
}

/// A structural fault that aborts processing of the current stream.
///
/// Carries the byte offset where tokenization failed and the last operator
/// that was dispatched successfully, for diagnostics. Partial results
/// delivered to listeners before the fault are not rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFault {
    pub kind: StreamFaultKind,
    /// Byte offset into the content stream where the fault was detected.
    pub offset: usize,
    /// Name of the last successfully tokenized operator, if any.
    pub last_operator: Option<String>,
}

impl fmt::Display for StreamFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.kind, self.offset)?;
        if let Some(op) = &self.last_operator {
            write!(f, " (last good operator: '{op}')")?;
        }
        Ok(())
    }
}

impl std::error::Error for StreamFault {}

/// Caller misuse detected at construction time, before any processing.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupError {
    /// A region filter was constructed with no regions.
    EmptyRegionList,
    /// A configuration value is out of its valid range.
    InvalidOption {
        option: &'static str,
        detail: String,
    },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::EmptyRegionList => {
                write!(f, "region filter requires at least one region")
            }
            SetupError::InvalidOption { option, detail } => {
                write!(f, "invalid option '{option}': {detail}")
            }
        }
    }
}

impl std::error::Error for SetupError {}

/// Machine-readable code categorizing a [`ProcessWarning`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessWarningCode {
    /// Operand shape mismatch; operation skipped.
    OperandMismatch,
    /// Non-invertible matrix; transform skipped.
    DegenerateMatrix,
    /// Unbalanced q/Q nesting.
    UnbalancedState,
    /// Text operator outside a text object.
    StrayTextOperator,
    /// A named resource could not be resolved.
    MissingResource,
    /// Inline image recovered by byte-scan after a bad /Length.
    InlineImageRecovered,
    /// Form XObject nesting exceeded the configured depth.
    RecursionLimit,
    /// Any other recoverable condition.
    Other(String),
}

impl ProcessWarningCode {
    /// Stable string tag for this code.
    pub fn as_str(&self) -> &str {
        match self {
            ProcessWarningCode::OperandMismatch => "OPERAND_MISMATCH",
            ProcessWarningCode::DegenerateMatrix => "DEGENERATE_MATRIX",
            ProcessWarningCode::UnbalancedState => "UNBALANCED_STATE",
            ProcessWarningCode::StrayTextOperator => "STRAY_TEXT_OPERATOR",
            ProcessWarningCode::MissingResource => "MISSING_RESOURCE",
            ProcessWarningCode::InlineImageRecovered => "INLINE_IMAGE_RECOVERED",
            ProcessWarningCode::RecursionLimit => "RECURSION_LIMIT",
            ProcessWarningCode::Other(_) => "OTHER",
        }
    }
}

impl fmt::Display for ProcessWarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal condition recorded while processing a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessWarning {
    pub code: ProcessWarningCode,
    /// Human-readable description.
    pub message: String,
    /// Index of the operation within the stream, when known.
    pub op_index: Option<usize>,
    /// Operator name, when known.
    pub operator: Option<String>,
}

impl ProcessWarning {
    pub fn new(code: ProcessWarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            op_index: None,
            operator: None,
        }
    }

    /// Attach the operation index and operator name.
    pub fn at(mut self, op_index: usize, operator: impl Into<String>) -> Self {
        self.op_index = Some(op_index);
        self.operator = Some(operator.into());
        self
    }
}

impl fmt::Display for ProcessWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let (Some(i), Some(op)) = (self.op_index, &self.operator) {
            write!(f, " (operation #{i} '{op}')")?;
        }
        Ok(())
    }
}
