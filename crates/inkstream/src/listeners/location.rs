//! Location-based text extraction.

use std::collections::HashSet;

use crate::events::{EventListener, EventTypes, RenderEvent, TextRenderInfo};
use inkstream_core::{AssemblyOptions, TextChunk, assemble_text};

/// Collects text events as positioned chunks and assembles them into a
/// reading-order string.
///
/// Chunk order on the page, not operation order in the stream, decides the
/// output: lines sort top to bottom, chunks within a line left to right
/// (or right to left under an RTL run direction), with spaces inserted
/// across word-sized gaps and newlines across line breaks. When a
/// marked-content `/ActualText` replacement is in scope, the replacement
/// string stands in for the rendered glyphs, once per marked-content
/// entry even when the entry spans several show operations.
pub struct LocationTextExtraction {
    chunks: Vec<TextChunk>,
    options: AssemblyOptions,
    skip_invisible: bool,
    emitted_actual_text: HashSet<u64>,
}

impl Default for LocationTextExtraction {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationTextExtraction {
    pub fn new() -> Self {
        Self::with_options(AssemblyOptions::default())
    }

    pub fn with_options(options: AssemblyOptions) -> Self {
        Self {
            chunks: Vec::new(),
            options,
            skip_invisible: false,
            emitted_actual_text: HashSet::new(),
        }
    }

    /// Drop text in rendering modes 3 and 7 (invisible and clip-only)
    /// instead of extracting it.
    pub fn skip_invisible(mut self) -> Self {
        self.skip_invisible = true;
        self
    }

    /// The collected chunks, in content-stream order.
    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    /// Assemble the collected chunks into reading-order text.
    pub fn text(&self) -> String {
        assemble_text(&self.chunks, &self.options)
    }

    fn chunk_from(&mut self, info: &TextRenderInfo) -> Option<TextChunk> {
        // Innermost ActualText wins; the sequence number dedups entries
        // spanning several show operations.
        let replacement = info
            .marked_content
            .iter()
            .rev()
            .find(|m| m.actual_text.is_some());
        if let Some(marked) = replacement {
            if !self.emitted_actual_text.insert(marked.seq) {
                return None;
            }
            let text = marked.actual_text.clone().unwrap_or_default();
            return Some(TextChunk::new(text, info.start, info.end, info.space_width));
        }
        Some(TextChunk::new(
            info.text.clone(),
            info.start,
            info.end,
            info.space_width,
        ))
    }
}

impl EventListener for LocationTextExtraction {
    fn on_event(&mut self, event: &RenderEvent) {
        if let RenderEvent::Text(info) = event {
            if self.skip_invisible && info.render_mode.is_invisible() {
                return;
            }
            if let Some(chunk) = self.chunk_from(info) {
                self.chunks.push(chunk);
            }
        }
    }

    fn supported_events(&self) -> EventTypes {
        EventTypes::TEXT
    }
}
