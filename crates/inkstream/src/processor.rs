//! The content stream processor: dispatch table, default operator
//! handlers, and failure semantics.
//!
//! [`ContentStreamProcessor`] pulls operations from the tokenizer and
//! dispatches each through a registry of [`OperatorHandler`]s keyed by
//! operator name. Unknown operators are skipped silently; recoverable
//! handler errors become [`ProcessWarning`]s and skip the one operation;
//! structural [`StreamFault`]s abort the pass with everything delivered
//! so far left intact.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ProcessError;
use crate::events::{
    ClippingPathInfo, EventListener, EventTypes, ImageRenderInfo, MarkedContentRef, RenderEvent,
};
use crate::font::{ExtGState, Font, PageResources, XObject};
use crate::state::{GraphicsStateStack, TextRenderMode};
use crate::text::{TextObject, TjElement, apply_adjustment, show_text};
use crate::tokenizer::{ContentTokenizer, Operand, Operation};
use inkstream_core::{
    Color, ContentError, DashPattern, FillRule, Matrix, PaintOp, PathBuilder, ProcessWarning,
    ProcessWarningCode, SetupError, StreamFault,
};

/// Expected operand shape, checked before a handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// No operands needed; extras are tolerated.
    None,
    /// At least `n` operands, the first `n` numeric.
    Numbers(usize),
    /// A single name operand.
    Name,
    /// A name followed by a number (`Tf`).
    NameNumber,
    /// The last operand is a string (`Tj`, `'`).
    String,
    /// The first operand is an array (`TJ`).
    Array,
    /// The handler validates its own operands.
    Any,
}

impl OperandShape {
    /// Check `operands` against this shape; `Err` carries a description of
    /// the mismatch.
    pub fn check(&self, operands: &[Operand]) -> Result<(), String> {
        match self {
            OperandShape::None | OperandShape::Any => Ok(()),
            OperandShape::Numbers(n) => {
                if operands.len() < *n {
                    return Err(format!("expected {n} numbers, found {} operands", operands.len()));
                }
                for (i, operand) in operands.iter().take(*n).enumerate() {
                    if operand.as_f64().is_none() {
                        return Err(format!("operand {i} is not a number"));
                    }
                }
                Ok(())
            }
            OperandShape::Name => match operands.first() {
                Some(Operand::Name(_)) => Ok(()),
                _ => Err("expected a name operand".to_string()),
            },
            OperandShape::NameNumber => {
                match (operands.first(), operands.get(1)) {
                    (Some(Operand::Name(_)), Some(size)) if size.as_f64().is_some() => Ok(()),
                    _ => Err("expected a name and a number".to_string()),
                }
            }
            OperandShape::String => match operands.last() {
                Some(Operand::LiteralString(_)) | Some(Operand::HexString(_)) => Ok(()),
                _ => Err("expected a string operand".to_string()),
            },
            OperandShape::Array => match operands.first() {
                Some(Operand::Array(_)) => Ok(()),
                _ => Err("expected an array operand".to_string()),
            },
        }
    }
}

/// A registered operator implementation.
///
/// Custom handlers can replace or extend the defaults through
/// [`ContentStreamProcessor::register_handler`].
pub trait OperatorHandler {
    /// Operand shape checked before [`invoke`](OperatorHandler::invoke).
    fn shape(&self) -> OperandShape {
        OperandShape::Any
    }

    /// Apply the operation. A returned [`ContentError`] is recorded as a
    /// warning and the operation is skipped; it never aborts the pass.
    fn invoke(
        &self,
        processor: &mut ContentStreamProcessor<'_>,
        op: &Operation,
    ) -> Result<(), ContentError>;
}

type HandlerFn = fn(&mut ContentStreamProcessor<'_>, &Operation) -> Result<(), ContentError>;

/// Adapter turning a plain function into an [`OperatorHandler`].
struct FnHandler {
    shape: OperandShape,
    run: HandlerFn,
}

impl OperatorHandler for FnHandler {
    fn shape(&self) -> OperandShape {
        self.shape
    }

    fn invoke(
        &self,
        processor: &mut ContentStreamProcessor<'_>,
        op: &Operation,
    ) -> Result<(), ContentError> {
        (self.run)(processor, op)
    }
}

/// Processor configuration.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Maximum form XObject nesting depth. Deeper `Do` invocations are
    /// skipped with a warning instead of recursing.
    pub max_form_depth: usize,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self { max_form_depth: 12 }
    }
}

/// Processes content streams and feeds render events to a listener.
///
/// A processor is reusable: each [`process`](Self::process) call starts
/// from a fresh graphics state and clears accumulated warnings.
pub struct ContentStreamProcessor<'a> {
    listener: &'a mut dyn EventListener,
    handlers: HashMap<String, Rc<dyn OperatorHandler>>,
    options: ProcessOptions,
    supported: EventTypes,

    states: GraphicsStateStack,
    text_object: Option<TextObject>,
    path_builder: PathBuilder,
    pending_clip: Option<FillRule>,
    marked_content: Vec<MarkedContentRef>,
    marked_content_seq: u64,
    resources: Vec<Rc<dyn PageResources>>,
    warnings: Vec<ProcessWarning>,
    op_index: usize,
    form_depth: usize,
    /// Structural fault raised inside a nested form stream, surfaced by
    /// the outer dispatch loop.
    nested_fault: Option<StreamFault>,
}

impl<'a> ContentStreamProcessor<'a> {
    pub fn new(listener: &'a mut dyn EventListener) -> Self {
        let supported = listener.supported_events();
        let mut processor = Self {
            listener,
            handlers: HashMap::new(),
            options: ProcessOptions::default(),
            supported,
            states: GraphicsStateStack::new(),
            text_object: None,
            path_builder: PathBuilder::new(Matrix::identity()),
            pending_clip: None,
            marked_content: Vec::new(),
            marked_content_seq: 0,
            resources: Vec::new(),
            warnings: Vec::new(),
            op_index: 0,
            form_depth: 0,
            nested_fault: None,
        };
        register_defaults(&mut processor.handlers);
        processor
    }

    pub fn with_options(
        listener: &'a mut dyn EventListener,
        options: ProcessOptions,
    ) -> Result<Self, SetupError> {
        if options.max_form_depth == 0 {
            return Err(SetupError::InvalidOption {
                option: "max_form_depth",
                detail: "must be at least 1".to_string(),
            });
        }
        let mut processor = Self::new(listener);
        processor.options = options;
        Ok(processor)
    }

    /// Register a handler for an operator name, returning the one it
    /// replaces, if any.
    pub fn register_handler(
        &mut self,
        name: impl Into<String>,
        handler: Rc<dyn OperatorHandler>,
    ) -> Option<Rc<dyn OperatorHandler>> {
        self.handlers.insert(name.into(), handler)
    }

    /// Warnings recorded by the most recent [`process`](Self::process) call.
    pub fn warnings(&self) -> &[ProcessWarning] {
        &self.warnings
    }

    /// Process one content stream against the given resources.
    ///
    /// On a structural fault the error carries the offset and last good
    /// operator; events already delivered to the listener stay valid.
    pub fn process(
        &mut self,
        content: &[u8],
        resources: Rc<dyn PageResources>,
    ) -> Result<(), ProcessError> {
        // Re-read here: fan-out listeners may gain attachments after
        // construction.
        self.supported = self.listener.supported_events();
        self.states = GraphicsStateStack::new();
        self.text_object = None;
        self.path_builder = PathBuilder::new(Matrix::identity());
        self.pending_clip = None;
        self.marked_content.clear();
        self.marked_content_seq = 0;
        self.resources.clear();
        self.resources.push(resources);
        self.warnings.clear();
        self.op_index = 0;
        self.form_depth = 0;
        self.nested_fault = None;

        self.run_stream(content).map_err(ProcessError::from)
    }

    fn run_stream(&mut self, content: &[u8]) -> Result<(), StreamFault> {
        let mut tokenizer = ContentTokenizer::new(content);
        while let Some(op) = tokenizer.next_operation()? {
            self.dispatch(&op);
            self.op_index += 1;
            if let Some(fault) = self.nested_fault.take() {
                return Err(fault);
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, op: &Operation) {
        let handler = match self.handlers.get(&op.name) {
            Some(h) => Rc::clone(h),
            None => {
                tracing::trace!(operator = %op.name, "skipping unknown operator");
                return;
            }
        };

        let result = match handler.shape().check(&op.operands) {
            Ok(()) => handler.invoke(self, op),
            Err(detail) => Err(ContentError::OperandMismatch {
                operator: op.name.clone(),
                detail,
            }),
        };

        if let Err(err) = result {
            let code = match &err {
                ContentError::OperandMismatch { .. } => ProcessWarningCode::OperandMismatch,
                ContentError::NonInvertibleMatrix { .. } => ProcessWarningCode::DegenerateMatrix,
                ContentError::OutsideTextObject { .. } => ProcessWarningCode::StrayTextOperator,
                ContentError::UnbalancedRestore => ProcessWarningCode::UnbalancedState,
                ContentError::MissingResource { .. } => ProcessWarningCode::MissingResource,
                ContentError::Other(_) => ProcessWarningCode::Other(op.name.clone()),
            };
            self.warn(op, code, err.to_string());
        }
    }

    fn warn(&mut self, op: &Operation, code: ProcessWarningCode, message: String) {
        tracing::warn!(operator = %op.name, op_index = self.op_index, %message, "operation skipped");
        self.warnings
            .push(ProcessWarning::new(code, message).at(self.op_index, &op.name));
    }

    /// Deliver an event to the listener, respecting its subscription
    /// mask. Public so custom [`OperatorHandler`]s can publish events of
    /// their own.
    pub fn emit(&mut self, event: RenderEvent) {
        if self.supported.contains(event.event_type()) {
            self.listener.on_event(&event);
        }
    }

    fn lookup_font(&self) -> Result<Rc<dyn Font>, ContentError> {
        let name = &self.states.current().font_name;
        if name.is_empty() {
            return Err(ContentError::Other(
                "text shown before any Tf".to_string(),
            ));
        }
        self.resources
            .last()
            .and_then(|r| r.font(name))
            .ok_or_else(|| ContentError::MissingResource {
                kind: "font",
                name: name.clone(),
            })
    }

    fn lookup_xobject(&self, name: &str) -> Result<Rc<XObject>, ContentError> {
        self.resources
            .last()
            .and_then(|r| r.xobject(name))
            .ok_or_else(|| ContentError::MissingResource {
                kind: "xobject",
                name: name.to_string(),
            })
    }

    fn lookup_ext_g_state(&self, name: &str) -> Result<ExtGState, ContentError> {
        self.resources
            .last()
            .and_then(|r| r.ext_g_state(name))
            .ok_or_else(|| ContentError::MissingResource {
                kind: "extgstate",
                name: name.to_string(),
            })
    }

    /// Show string bytes with the active font, advancing the text matrix
    /// and emitting one text event (empty strings emit nothing).
    fn show_bytes(&mut self, operator: &str, bytes: &[u8]) -> Result<(), ContentError> {
        let mut object = match self.text_object.take() {
            Some(o) => o,
            None => {
                return Err(ContentError::OutsideTextObject {
                    operator: operator.to_string(),
                });
            }
        };
        let font = match self.lookup_font() {
            Ok(f) => f,
            Err(e) => {
                self.text_object = Some(object);
                return Err(e);
            }
        };

        let mut info = show_text(&mut object, self.states.current(), font.as_ref(), bytes);
        self.text_object = Some(object);

        if !info.glyphs.is_empty() {
            info.marked_content = self.marked_content.clone();
            self.emit(RenderEvent::Text(info));
        }
        Ok(())
    }

    /// Take the built path, realize any pending clip, and emit the paint
    /// event.
    fn paint_path(&mut self, op: PaintOp, fill_rule: FillRule, close_first: bool) {
        if close_first {
            self.path_builder.close();
        }
        let path = self.path_builder.take();

        if let Some(clip_rule) = self.pending_clip.take() {
            if !path.is_empty() {
                self.states.current_mut().clip_path = Some(path.clone());
                self.emit(RenderEvent::Clip(ClippingPathInfo {
                    path: path.clone(),
                    fill_rule: clip_rule,
                }));
            }
        }

        if op != PaintOp::NoPaint && !path.is_empty() {
            let gs = self.states.current();
            let info = crate::events::PathRenderInfo {
                path,
                op,
                fill_rule,
                line_width: gs.line_width,
                dash_pattern: gs.dash_pattern.clone(),
                stroke_color: gs.stroke_color.clone(),
                fill_color: gs.fill_color.clone(),
                marked_content: self.marked_content.clone(),
            };
            self.emit(RenderEvent::Path(info));
        }
    }

    /// Run a form XObject's content stream in a saved state scope.
    fn run_form(
        &mut self,
        matrix: Matrix,
        content: &[u8],
        form_resources: Option<Rc<dyn PageResources>>,
        op: &Operation,
    ) {
        if self.form_depth >= self.options.max_form_depth {
            self.warn(
                op,
                ProcessWarningCode::RecursionLimit,
                format!(
                    "form nesting exceeds depth {}; subtree skipped",
                    self.options.max_form_depth
                ),
            );
            return;
        }

        self.form_depth += 1;
        self.states.save();
        self.states.current_mut().concat_matrix(matrix);
        self.path_builder.set_ctm(self.states.current().ctm);

        let pushed_resources = match form_resources {
            Some(res) => {
                self.resources.push(res);
                true
            }
            None => false,
        };
        // A form body is its own stream; any open text object stays
        // suspended on the outside.
        let outer_text = self.text_object.take();
        let outer_pending_clip = self.pending_clip.take();

        let result = self.run_stream(content);

        self.text_object = outer_text;
        self.pending_clip = outer_pending_clip;
        if pushed_resources {
            self.resources.pop();
        }
        self.states.restore();
        self.path_builder.set_ctm(self.states.current().ctm);
        self.form_depth -= 1;

        if let Err(fault) = result {
            self.nested_fault = Some(fault);
        }
    }
}

fn f64_at(operands: &[Operand], i: usize) -> f64 {
    operands.get(i).and_then(Operand::as_f64).unwrap_or(0.0)
}

fn matrix_from(operands: &[Operand]) -> Matrix {
    Matrix::new(
        f64_at(operands, 0),
        f64_at(operands, 1),
        f64_at(operands, 2),
        f64_at(operands, 3),
        f64_at(operands, 4),
        f64_at(operands, 5),
    )
}

fn f32_components(operands: &[Operand]) -> Vec<f32> {
    operands
        .iter()
        .filter_map(|o| o.as_f64().map(|v| v as f32))
        .collect()
}

// --- graphics state handlers ---

fn op_save(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    p.states.save();
    Ok(())
}

fn op_restore(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    if !p.states.restore() {
        return Err(ContentError::UnbalancedRestore);
    }
    p.path_builder.set_ctm(p.states.current().ctm);
    Ok(())
}

fn op_concat(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let m = matrix_from(&op.operands);
    if !m.is_invertible() {
        return Err(ContentError::NonInvertibleMatrix {
            operator: op.name.clone(),
        });
    }
    p.states.current_mut().concat_matrix(m);
    p.path_builder.set_ctm(p.states.current().ctm);
    Ok(())
}

fn op_line_width(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().line_width = f64_at(&op.operands, 0);
    Ok(())
}

fn op_line_cap(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().line_cap = op.operands[0].as_i64().unwrap_or(0);
    Ok(())
}

fn op_line_join(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().line_join = op.operands[0].as_i64().unwrap_or(0);
    Ok(())
}

fn op_miter_limit(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().miter_limit = f64_at(&op.operands, 0);
    Ok(())
}

fn op_flatness(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().flatness = f64_at(&op.operands, 0);
    Ok(())
}

fn op_rendering_intent(
    p: &mut ContentStreamProcessor<'_>,
    op: &Operation,
) -> Result<(), ContentError> {
    if let Some(name) = op.operands.first().and_then(Operand::as_name) {
        p.states.current_mut().rendering_intent = name.to_string();
    }
    Ok(())
}

fn op_dash(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let array = match op.operands.first() {
        Some(Operand::Array(elements)) => elements
            .iter()
            .filter_map(Operand::as_f64)
            .collect::<Vec<_>>(),
        _ => {
            return Err(ContentError::OperandMismatch {
                operator: op.name.clone(),
                detail: "expected a dash array and a phase".to_string(),
            });
        }
    };
    let phase = f64_at(&op.operands, 1);
    p.states.current_mut().dash_pattern = DashPattern::new(array, phase);
    Ok(())
}

fn op_ext_g_state(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let name = op.operands[0].as_name().unwrap_or_default().to_string();
    let ext = p.lookup_ext_g_state(&name)?;
    let gs = p.states.current_mut();
    if let Some(w) = ext.line_width {
        gs.line_width = w;
    }
    if let Some(d) = ext.dash_pattern {
        gs.dash_pattern = d;
    }
    if let Some(a) = ext.stroke_alpha {
        gs.stroke_alpha = a;
    }
    if let Some(a) = ext.fill_alpha {
        gs.fill_alpha = a;
    }
    if let Some((font_name, size)) = ext.font {
        gs.font_name = font_name;
        gs.font_size = size;
    }
    Ok(())
}

// --- color handlers ---

fn op_stroke_gray(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().stroke_color = Color::Gray(f64_at(&op.operands, 0) as f32);
    Ok(())
}

fn op_fill_gray(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().fill_color = Color::Gray(f64_at(&op.operands, 0) as f32);
    Ok(())
}

fn op_stroke_rgb(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().stroke_color = Color::Rgb(
        f64_at(&op.operands, 0) as f32,
        f64_at(&op.operands, 1) as f32,
        f64_at(&op.operands, 2) as f32,
    );
    Ok(())
}

fn op_fill_rgb(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().fill_color = Color::Rgb(
        f64_at(&op.operands, 0) as f32,
        f64_at(&op.operands, 1) as f32,
        f64_at(&op.operands, 2) as f32,
    );
    Ok(())
}

fn op_stroke_cmyk(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().stroke_color = Color::Cmyk(
        f64_at(&op.operands, 0) as f32,
        f64_at(&op.operands, 1) as f32,
        f64_at(&op.operands, 2) as f32,
        f64_at(&op.operands, 3) as f32,
    );
    Ok(())
}

fn op_fill_cmyk(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().fill_color = Color::Cmyk(
        f64_at(&op.operands, 0) as f32,
        f64_at(&op.operands, 1) as f32,
        f64_at(&op.operands, 2) as f32,
        f64_at(&op.operands, 3) as f32,
    );
    Ok(())
}

/// `CS`/`cs`: color spaces are not resolved here; the color resets to the
/// space's conventional initial value (black) and later `SC`/`SCN` values
/// are inferred from component count.
fn op_stroke_color_space(
    p: &mut ContentStreamProcessor<'_>,
    _op: &Operation,
) -> Result<(), ContentError> {
    p.states.current_mut().stroke_color = Color::black();
    Ok(())
}

fn op_fill_color_space(
    p: &mut ContentStreamProcessor<'_>,
    _op: &Operation,
) -> Result<(), ContentError> {
    p.states.current_mut().fill_color = Color::black();
    Ok(())
}

fn op_stroke_color(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let components = f32_components(&op.operands);
    p.states.current_mut().stroke_color = Color::from_components(&components);
    Ok(())
}

fn op_fill_color(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let components = f32_components(&op.operands);
    p.states.current_mut().fill_color = Color::from_components(&components);
    Ok(())
}

// --- text object and text state handlers ---

fn op_begin_text(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    let nested = p.text_object.is_some();
    p.text_object = Some(TextObject::new());
    p.emit(RenderEvent::BeginText);
    if nested {
        return Err(ContentError::Other("BT inside an open text object".to_string()));
    }
    Ok(())
}

fn op_end_text(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    if p.text_object.take().is_none() {
        return Err(ContentError::OutsideTextObject {
            operator: op.name.clone(),
        });
    }
    p.emit(RenderEvent::EndText);
    Ok(())
}

fn op_set_font(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let name = op.operands[0].as_name().unwrap_or_default().to_string();
    let size = f64_at(&op.operands, 1);
    let gs = p.states.current_mut();
    gs.font_name = name;
    gs.font_size = size;
    Ok(())
}

fn op_char_spacing(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().char_spacing = f64_at(&op.operands, 0);
    Ok(())
}

fn op_word_spacing(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().word_spacing = f64_at(&op.operands, 0);
    Ok(())
}

fn op_h_scaling(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().h_scaling = f64_at(&op.operands, 0);
    Ok(())
}

fn op_leading(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().leading = f64_at(&op.operands, 0);
    Ok(())
}

fn op_render_mode(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let value = op.operands[0].as_i64().unwrap_or(-1);
    match TextRenderMode::from_i64(value) {
        Some(mode) => {
            p.states.current_mut().render_mode = mode;
            Ok(())
        }
        None => Err(ContentError::OperandMismatch {
            operator: op.name.clone(),
            detail: format!("render mode {value} outside 0..=7"),
        }),
    }
}

fn op_rise(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.states.current_mut().rise = f64_at(&op.operands, 0);
    Ok(())
}

fn text_object_mut<'b>(
    p: &'b mut ContentStreamProcessor<'_>,
    op: &Operation,
) -> Result<&'b mut TextObject, ContentError> {
    p.text_object
        .as_mut()
        .ok_or_else(|| ContentError::OutsideTextObject {
            operator: op.name.clone(),
        })
}

fn op_text_matrix(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let m = matrix_from(&op.operands);
    text_object_mut(p, op)?.set_matrix(m);
    Ok(())
}

fn op_text_move(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let tx = f64_at(&op.operands, 0);
    let ty = f64_at(&op.operands, 1);
    text_object_mut(p, op)?.move_position(tx, ty);
    Ok(())
}

fn op_text_move_set_leading(
    p: &mut ContentStreamProcessor<'_>,
    op: &Operation,
) -> Result<(), ContentError> {
    let tx = f64_at(&op.operands, 0);
    let ty = f64_at(&op.operands, 1);
    // A stray TD is skipped whole; it must not leak the leading change.
    if p.text_object.is_none() {
        return Err(ContentError::OutsideTextObject {
            operator: op.name.clone(),
        });
    }
    p.states.current_mut().leading = -ty;
    text_object_mut(p, op)?.move_position(tx, ty);
    Ok(())
}

fn op_text_next_line(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let leading = p.states.current().leading;
    text_object_mut(p, op)?.next_line(leading);
    Ok(())
}

// --- text showing handlers ---

fn op_show_text(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let bytes = op
        .operands
        .last()
        .and_then(Operand::as_string_bytes)
        .unwrap_or_default()
        .to_vec();
    p.show_bytes(&op.name, &bytes)
}

fn op_show_text_adjusted(
    p: &mut ContentStreamProcessor<'_>,
    op: &Operation,
) -> Result<(), ContentError> {
    let elements: Vec<TjElement> = match op.operands.first() {
        Some(Operand::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Operand::LiteralString(b) | Operand::HexString(b) => {
                    Some(TjElement::Bytes(b.clone()))
                }
                other => other.as_f64().map(TjElement::Adjustment),
            })
            .collect(),
        _ => Vec::new(),
    };

    if p.text_object.is_none() {
        return Err(ContentError::OutsideTextObject {
            operator: op.name.clone(),
        });
    }

    for element in elements {
        match element {
            TjElement::Bytes(bytes) => p.show_bytes(&op.name, &bytes)?,
            TjElement::Adjustment(adj) => {
                if let Some(mut object) = p.text_object.take() {
                    apply_adjustment(&mut object, p.states.current(), adj);
                    p.text_object = Some(object);
                }
            }
        }
    }
    Ok(())
}

fn op_next_line_show(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    op_text_next_line(p, op)?;
    op_show_text(p, op)
}

fn op_spacing_next_line_show(
    p: &mut ContentStreamProcessor<'_>,
    op: &Operation,
) -> Result<(), ContentError> {
    if op.operands.len() < 3 {
        return Err(ContentError::OperandMismatch {
            operator: op.name.clone(),
            detail: format!("expected aw, ac and a string, found {} operands", op.operands.len()),
        });
    }
    {
        let gs = p.states.current_mut();
        gs.word_spacing = f64_at(&op.operands, 0);
        gs.char_spacing = f64_at(&op.operands, 1);
    }
    op_next_line_show(p, op)
}

// --- path construction handlers ---

fn op_move_to(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.path_builder
        .move_to(f64_at(&op.operands, 0), f64_at(&op.operands, 1));
    Ok(())
}

fn op_line_to(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.path_builder
        .line_to(f64_at(&op.operands, 0), f64_at(&op.operands, 1));
    Ok(())
}

fn op_curve_to(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.path_builder.curve_to(
        f64_at(&op.operands, 0),
        f64_at(&op.operands, 1),
        f64_at(&op.operands, 2),
        f64_at(&op.operands, 3),
        f64_at(&op.operands, 4),
        f64_at(&op.operands, 5),
    );
    Ok(())
}

fn op_curve_to_v(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.path_builder.curve_to_v(
        f64_at(&op.operands, 0),
        f64_at(&op.operands, 1),
        f64_at(&op.operands, 2),
        f64_at(&op.operands, 3),
    );
    Ok(())
}

fn op_curve_to_y(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.path_builder.curve_to_y(
        f64_at(&op.operands, 0),
        f64_at(&op.operands, 1),
        f64_at(&op.operands, 2),
        f64_at(&op.operands, 3),
    );
    Ok(())
}

fn op_rect(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    p.path_builder.rectangle(
        f64_at(&op.operands, 0),
        f64_at(&op.operands, 1),
        f64_at(&op.operands, 2),
        f64_at(&op.operands, 3),
    );
    Ok(())
}

fn op_close_path(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    p.path_builder.close();
    Ok(())
}

// --- path painting handlers ---

fn op_stroke(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    p.paint_path(PaintOp::Stroke, FillRule::NonZeroWinding, false);
    Ok(())
}

fn op_close_stroke(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    p.paint_path(PaintOp::Stroke, FillRule::NonZeroWinding, true);
    Ok(())
}

fn op_fill(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    p.paint_path(PaintOp::Fill, FillRule::NonZeroWinding, false);
    Ok(())
}

fn op_fill_even_odd(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    p.paint_path(PaintOp::Fill, FillRule::EvenOdd, false);
    Ok(())
}

fn op_fill_stroke(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    p.paint_path(PaintOp::FillAndStroke, FillRule::NonZeroWinding, false);
    Ok(())
}

fn op_fill_stroke_even_odd(
    p: &mut ContentStreamProcessor<'_>,
    _op: &Operation,
) -> Result<(), ContentError> {
    p.paint_path(PaintOp::FillAndStroke, FillRule::EvenOdd, false);
    Ok(())
}

fn op_close_fill_stroke(
    p: &mut ContentStreamProcessor<'_>,
    _op: &Operation,
) -> Result<(), ContentError> {
    p.paint_path(PaintOp::FillAndStroke, FillRule::NonZeroWinding, true);
    Ok(())
}

fn op_close_fill_stroke_even_odd(
    p: &mut ContentStreamProcessor<'_>,
    _op: &Operation,
) -> Result<(), ContentError> {
    p.paint_path(PaintOp::FillAndStroke, FillRule::EvenOdd, true);
    Ok(())
}

fn op_end_path(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    p.paint_path(PaintOp::NoPaint, FillRule::NonZeroWinding, false);
    Ok(())
}

fn op_clip(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    p.pending_clip = Some(FillRule::NonZeroWinding);
    Ok(())
}

fn op_clip_even_odd(p: &mut ContentStreamProcessor<'_>, _op: &Operation) -> Result<(), ContentError> {
    p.pending_clip = Some(FillRule::EvenOdd);
    Ok(())
}

// --- marked content handlers ---

fn dict_entry<'b>(entries: &'b [(String, Operand)], key: &str) -> Option<&'b Operand> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// Decode a text string value: UTF-16BE when it carries a BOM, otherwise
/// treated as single-byte PDFDoc-style text.
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let (text, _, _) = encoding_rs::UTF_16BE.decode(&bytes[2..]);
        text.into_owned()
    } else {
        let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
        text.into_owned()
    }
}

fn push_marked_content(
    p: &mut ContentStreamProcessor<'_>,
    tag: String,
    properties: Option<&[(String, Operand)]>,
) {
    let mcid = properties
        .and_then(|entries| dict_entry(entries, "MCID"))
        .and_then(Operand::as_i64);
    let actual_text = properties
        .and_then(|entries| dict_entry(entries, "ActualText"))
        .and_then(Operand::as_string_bytes)
        .map(decode_text_string);

    p.marked_content_seq += 1;
    p.marked_content.push(MarkedContentRef {
        tag,
        mcid,
        actual_text,
        seq: p.marked_content_seq,
    });
}

fn op_begin_marked(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let tag = op.operands[0].as_name().unwrap_or_default().to_string();
    push_marked_content(p, tag, None);
    Ok(())
}

fn op_begin_marked_props(
    p: &mut ContentStreamProcessor<'_>,
    op: &Operation,
) -> Result<(), ContentError> {
    let tag = match op.operands.first() {
        Some(Operand::Name(n)) => n.clone(),
        _ => {
            return Err(ContentError::OperandMismatch {
                operator: op.name.clone(),
                detail: "expected a tag name".to_string(),
            });
        }
    };
    // Named property lists live in the resource dictionary and are not
    // resolvable here; only inline dictionaries contribute MCID/ActualText.
    let properties = match op.operands.get(1) {
        Some(Operand::Dictionary(entries)) => Some(entries.as_slice()),
        _ => None,
    };
    push_marked_content(p, tag, properties);
    Ok(())
}

fn op_end_marked(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    if p.marked_content.pop().is_none() {
        p.warn(
            op,
            ProcessWarningCode::UnbalancedState,
            "EMC without matching BMC/BDC".to_string(),
        );
    }
    Ok(())
}

fn op_marked_point(_p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    // MP/DP mark a single point; nothing renders
    tracing::trace!(operator = %op.name, "marked-content point ignored");
    Ok(())
}

// --- XObject and inline image handlers ---

fn op_invoke_xobject(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let name = op.operands[0].as_name().unwrap_or_default().to_string();
    let xobject = p.lookup_xobject(&name)?;
    match &*xobject {
        XObject::Image { width, height } => {
            let info = ImageRenderInfo {
                ctm: p.states.current().ctm,
                name: Some(name),
                width: Some(*width),
                height: Some(*height),
                marked_content: p.marked_content.clone(),
            };
            p.emit(RenderEvent::Image(info));
        }
        XObject::Form {
            matrix,
            bbox: _,
            content,
            resources,
        } => {
            p.run_form(*matrix, content, resources.clone(), op);
        }
    }
    Ok(())
}

fn op_inline_image(p: &mut ContentStreamProcessor<'_>, op: &Operation) -> Result<(), ContentError> {
    let image = match op.operands.first() {
        Some(Operand::InlineImage(image)) => image,
        _ => {
            return Err(ContentError::OperandMismatch {
                operator: op.name.clone(),
                detail: "missing inline image payload".to_string(),
            });
        }
    };
    if image.recovered {
        p.warn(
            op,
            ProcessWarningCode::InlineImageRecovered,
            "inline image length mismatch; terminator recovered by scan".to_string(),
        );
    }
    let width = image
        .entry("W", "Width")
        .and_then(Operand::as_i64)
        .and_then(|v| u32::try_from(v).ok());
    let height = image
        .entry("H", "Height")
        .and_then(Operand::as_i64)
        .and_then(|v| u32::try_from(v).ok());
    let info = ImageRenderInfo {
        ctm: p.states.current().ctm,
        name: None,
        width,
        height,
        marked_content: p.marked_content.clone(),
    };
    p.emit(RenderEvent::Image(info));
    Ok(())
}

fn register_defaults(handlers: &mut HashMap<String, Rc<dyn OperatorHandler>>) {
    let mut add = |name: &str, shape: OperandShape, run: HandlerFn| {
        handlers.insert(name.to_string(), Rc::new(FnHandler { shape, run }));
    };

    // Graphics state
    add("q", OperandShape::None, op_save);
    add("Q", OperandShape::None, op_restore);
    add("cm", OperandShape::Numbers(6), op_concat);
    add("w", OperandShape::Numbers(1), op_line_width);
    add("J", OperandShape::Numbers(1), op_line_cap);
    add("j", OperandShape::Numbers(1), op_line_join);
    add("M", OperandShape::Numbers(1), op_miter_limit);
    add("i", OperandShape::Numbers(1), op_flatness);
    add("ri", OperandShape::Name, op_rendering_intent);
    add("d", OperandShape::Any, op_dash);
    add("gs", OperandShape::Name, op_ext_g_state);

    // Color
    add("G", OperandShape::Numbers(1), op_stroke_gray);
    add("g", OperandShape::Numbers(1), op_fill_gray);
    add("RG", OperandShape::Numbers(3), op_stroke_rgb);
    add("rg", OperandShape::Numbers(3), op_fill_rgb);
    add("K", OperandShape::Numbers(4), op_stroke_cmyk);
    add("k", OperandShape::Numbers(4), op_fill_cmyk);
    add("CS", OperandShape::Name, op_stroke_color_space);
    add("cs", OperandShape::Name, op_fill_color_space);
    add("SC", OperandShape::Any, op_stroke_color);
    add("SCN", OperandShape::Any, op_stroke_color);
    add("sc", OperandShape::Any, op_fill_color);
    add("scn", OperandShape::Any, op_fill_color);

    // Text object and state
    add("BT", OperandShape::None, op_begin_text);
    add("ET", OperandShape::None, op_end_text);
    add("Tf", OperandShape::NameNumber, op_set_font);
    add("Tc", OperandShape::Numbers(1), op_char_spacing);
    add("Tw", OperandShape::Numbers(1), op_word_spacing);
    add("Tz", OperandShape::Numbers(1), op_h_scaling);
    add("TL", OperandShape::Numbers(1), op_leading);
    add("Tr", OperandShape::Numbers(1), op_render_mode);
    add("Ts", OperandShape::Numbers(1), op_rise);
    add("Tm", OperandShape::Numbers(6), op_text_matrix);
    add("Td", OperandShape::Numbers(2), op_text_move);
    add("TD", OperandShape::Numbers(2), op_text_move_set_leading);
    add("T*", OperandShape::None, op_text_next_line);

    // Text showing
    add("Tj", OperandShape::String, op_show_text);
    add("TJ", OperandShape::Array, op_show_text_adjusted);
    add("'", OperandShape::String, op_next_line_show);
    add("\"", OperandShape::Any, op_spacing_next_line_show);

    // Path construction
    add("m", OperandShape::Numbers(2), op_move_to);
    add("l", OperandShape::Numbers(2), op_line_to);
    add("c", OperandShape::Numbers(6), op_curve_to);
    add("v", OperandShape::Numbers(4), op_curve_to_v);
    add("y", OperandShape::Numbers(4), op_curve_to_y);
    add("re", OperandShape::Numbers(4), op_rect);
    add("h", OperandShape::None, op_close_path);

    // Path painting
    add("S", OperandShape::None, op_stroke);
    add("s", OperandShape::None, op_close_stroke);
    add("f", OperandShape::None, op_fill);
    add("F", OperandShape::None, op_fill);
    add("f*", OperandShape::None, op_fill_even_odd);
    add("B", OperandShape::None, op_fill_stroke);
    add("B*", OperandShape::None, op_fill_stroke_even_odd);
    add("b", OperandShape::None, op_close_fill_stroke);
    add("b*", OperandShape::None, op_close_fill_stroke_even_odd);
    add("n", OperandShape::None, op_end_path);
    add("W", OperandShape::None, op_clip);
    add("W*", OperandShape::None, op_clip_even_odd);

    // Marked content
    add("BMC", OperandShape::Name, op_begin_marked);
    add("BDC", OperandShape::Any, op_begin_marked_props);
    add("EMC", OperandShape::None, op_end_marked);
    add("MP", OperandShape::Name, op_marked_point);
    add("DP", OperandShape::Any, op_marked_point);

    // XObjects and inline images
    add("Do", OperandShape::Name, op_invoke_xobject);
    add("BI", OperandShape::Any, op_inline_image);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{SimpleFont, SimpleResources};

    /// Records every event it receives.
    #[derive(Default)]
    struct Recorder {
        events: Vec<RenderEvent>,
    }

    impl EventListener for Recorder {
        fn on_event(&mut self, event: &RenderEvent) {
            self.events.push(event.clone());
        }
    }

    fn simple_resources() -> Rc<SimpleResources> {
        let mut res = SimpleResources::new();
        res.add_font("F1", Rc::new(SimpleFont::new("Helvetica")));
        Rc::new(res)
    }

    fn run(content: &[u8]) -> (Vec<RenderEvent>, Vec<ProcessWarning>) {
        let mut recorder = Recorder::default();
        let mut processor = ContentStreamProcessor::new(&mut recorder);
        processor
            .process(content, simple_resources())
            .expect("stream should process");
        let warnings = processor.warnings().to_vec();
        (recorder.events, warnings)
    }

    #[test]
    fn unknown_operators_are_skipped_silently() {
        let (events, warnings) = run(b"1 0 0 1 5 5 xyzzy");
        assert!(events.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn bt_and_et_emit_bracket_events() {
        let (events, warnings) = run(b"BT /F1 12 Tf (x) Tj ET");
        assert!(warnings.is_empty());
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], RenderEvent::BeginText);
        assert!(matches!(events[1], RenderEvent::Text(_)));
        assert_eq!(events[2], RenderEvent::EndText);
    }

    #[test]
    fn operand_mismatch_skips_and_warns() {
        let (_, warnings) = run(b"1 2 3 cm");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, ProcessWarningCode::OperandMismatch);
        assert_eq!(warnings[0].operator.as_deref(), Some("cm"));
    }

    #[test]
    fn degenerate_cm_warns_and_keeps_ctm() {
        let (events, warnings) = run(b"0 0 0 0 0 0 cm BT /F1 12 Tf (x) Tj ET");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, ProcessWarningCode::DegenerateMatrix);
        // CTM unchanged, glyph lands at the origin with width 6
        match &events[1] {
            RenderEvent::Text(info) => {
                assert_eq!(info.start.x, 0.0);
                assert!((info.end.x - 6.0).abs() < 1e-9);
            }
            other => panic!("expected text event, got {other:?}"),
        }
    }

    #[test]
    fn unbalanced_restore_warns() {
        let (_, warnings) = run(b"Q");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, ProcessWarningCode::UnbalancedState);
    }

    #[test]
    fn stray_text_operator_warns() {
        let (events, warnings) = run(b"/F1 12 Tf (x) Tj");
        assert!(events.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, ProcessWarningCode::StrayTextOperator);
    }

    #[test]
    fn stray_td_does_not_leak_leading() {
        let (events, warnings) = run(
            b"0 -14 TD BT /F1 12 Tf 72 700 Td (a) Tj T* (b) Tj ET",
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, ProcessWarningCode::StrayTextOperator);
        // Leading stayed 0, so T* did not move the baseline
        let ys: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                RenderEvent::Text(info) => Some(info.start.y),
                _ => None,
            })
            .collect();
        assert_eq!(ys, vec![700.0, 700.0]);
    }

    #[test]
    fn missing_font_warns_and_continues() {
        let (events, warnings) = run(b"BT /Nope 12 Tf (x) Tj ET 0 0 m 5 5 l S");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, ProcessWarningCode::MissingResource);
        // The later path still renders
        assert!(events.iter().any(|e| matches!(e, RenderEvent::Path(_))));
    }

    #[test]
    fn invalid_render_mode_is_rejected() {
        let (_, warnings) = run(b"9 Tr");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, ProcessWarningCode::OperandMismatch);
    }

    #[test]
    fn structural_fault_keeps_delivered_events() {
        let mut recorder = Recorder::default();
        let mut processor = ContentStreamProcessor::new(&mut recorder);
        let err = processor
            .process(b"BT /F1 12 Tf (ok) Tj ET (unclosed", simple_resources())
            .unwrap_err();
        assert!(matches!(err, ProcessError::Stream(_)));
        let texts = recorder
            .events
            .iter()
            .filter(|e| matches!(e, RenderEvent::Text(_)))
            .count();
        assert_eq!(texts, 1);
    }

    #[test]
    fn custom_handler_overrides_default() {
        struct DropText;
        impl OperatorHandler for DropText {
            fn invoke(
                &self,
                _processor: &mut ContentStreamProcessor<'_>,
                _op: &Operation,
            ) -> Result<(), ContentError> {
                Ok(())
            }
        }

        let mut recorder = Recorder::default();
        let mut processor = ContentStreamProcessor::new(&mut recorder);
        let previous = processor.register_handler("Tj", Rc::new(DropText));
        assert!(previous.is_some());
        processor
            .process(b"BT /F1 12 Tf (gone) Tj ET", simple_resources())
            .unwrap();
        assert!(
            recorder
                .events
                .iter()
                .all(|e| !matches!(e, RenderEvent::Text(_)))
        );
    }

    #[test]
    fn zero_max_form_depth_is_a_setup_error() {
        let mut recorder = Recorder::default();
        let result =
            ContentStreamProcessor::with_options(&mut recorder, ProcessOptions { max_form_depth: 0 });
        assert!(matches!(result, Err(SetupError::InvalidOption { .. })));
    }

    #[test]
    fn operand_shape_checks() {
        assert!(OperandShape::Numbers(2)
            .check(&[Operand::Integer(1), Operand::Real(2.0)])
            .is_ok());
        assert!(OperandShape::Numbers(2).check(&[Operand::Integer(1)]).is_err());
        assert!(
            OperandShape::Name
                .check(&[Operand::Name("F1".to_string())])
                .is_ok()
        );
        assert!(OperandShape::Name.check(&[Operand::Integer(1)]).is_err());
        assert!(
            OperandShape::String
                .check(&[Operand::LiteralString(b"x".to_vec())])
                .is_ok()
        );
        assert!(OperandShape::Array.check(&[Operand::Integer(1)]).is_err());
        assert!(OperandShape::Any.check(&[]).is_ok());
    }
}
