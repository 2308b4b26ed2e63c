//! Per-glyph event decomposition.

use crate::events::{EventListener, EventTypes, RenderEvent};

/// Re-emits every text event as a series of single-glyph text events.
///
/// A filter applied downstream then makes its decision per glyph rather
/// than per show operation, which matters for region filters at chunk
/// boundaries. Non-text events pass through unchanged.
pub struct GlyphEventListener<'a> {
    inner: &'a mut dyn EventListener,
}

impl<'a> GlyphEventListener<'a> {
    pub fn new(inner: &'a mut dyn EventListener) -> Self {
        Self { inner }
    }
}

impl EventListener for GlyphEventListener<'_> {
    fn on_event(&mut self, event: &RenderEvent) {
        match event {
            RenderEvent::Text(info) => {
                for glyph_info in info.chars() {
                    self.inner.on_event(&RenderEvent::Text(glyph_info));
                }
            }
            other => self.inner.on_event(other),
        }
    }

    fn supported_events(&self) -> EventTypes {
        self.inner.supported_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ClippingPathInfo, GlyphPos, TextRenderInfo};
    use crate::state::TextRenderMode;
    use inkstream_core::{Color, FillRule, Path, Point};

    #[derive(Default)]
    struct Recorder {
        events: Vec<RenderEvent>,
    }

    impl EventListener for Recorder {
        fn on_event(&mut self, event: &RenderEvent) {
            self.events.push(event.clone());
        }
    }

    fn two_glyph_info() -> TextRenderInfo {
        TextRenderInfo {
            text: "ab".to_string(),
            glyphs: vec![
                GlyphPos {
                    text: "a".to_string(),
                    code: 97,
                    start: Point::new(0.0, 0.0),
                    end: Point::new(6.0, 0.0),
                },
                GlyphPos {
                    text: "b".to_string(),
                    code: 98,
                    start: Point::new(6.0, 0.0),
                    end: Point::new(12.0, 0.0),
                },
            ],
            start: Point::new(0.0, 0.0),
            end: Point::new(12.0, 0.0),
            space_width: 3.0,
            font_name: "F1".to_string(),
            font_size: 12.0,
            render_mode: TextRenderMode::Fill,
            fill_color: Color::black(),
            stroke_color: Color::black(),
            marked_content: Vec::new(),
        }
    }

    #[test]
    fn splits_text_events_per_glyph() {
        let mut recorder = Recorder::default();
        {
            let mut splitter = GlyphEventListener::new(&mut recorder);
            splitter.on_event(&RenderEvent::Text(two_glyph_info()));
        }
        assert_eq!(recorder.events.len(), 2);
        match (&recorder.events[0], &recorder.events[1]) {
            (RenderEvent::Text(a), RenderEvent::Text(b)) => {
                assert_eq!(a.text, "a");
                assert_eq!(b.text, "b");
                assert_eq!(a.end, b.start);
            }
            other => panic!("expected two text events, got {other:?}"),
        }
    }

    #[test]
    fn non_text_events_pass_through() {
        let mut recorder = Recorder::default();
        {
            let mut splitter = GlyphEventListener::new(&mut recorder);
            splitter.on_event(&RenderEvent::Clip(ClippingPathInfo {
                path: Path::default(),
                fill_rule: FillRule::NonZeroWinding,
            }));
        }
        assert_eq!(recorder.events.len(), 1);
        assert!(matches!(recorder.events[0], RenderEvent::Clip(_)));
    }
}
