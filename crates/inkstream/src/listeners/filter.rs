//! Event filtering and listener fan-out.

use inkstream_core::{Point, Rect, SetupError};

use crate::events::{EventListener, EventTypes, RenderEvent};

/// Decides whether an event reaches a listener attached through a
/// [`FilteredEventListener`].
pub trait EventFilter {
    fn accept(&self, event: &RenderEvent) -> bool;
}

/// Accepts events that fall inside at least one of a set of page regions.
///
/// A text event is in-region when its baseline start point lies inside a
/// region; wrap the target listener in a
/// [`GlyphEventListener`](super::GlyphEventListener) for per-glyph
/// precision at region borders. Images test their placement point (the
/// CTM origin), paths their bounding box, and clip events always pass.
#[derive(Debug)]
pub struct TextRegionFilter {
    regions: Vec<Rect>,
}

impl TextRegionFilter {
    /// Fails with [`SetupError::EmptyRegionList`] when `regions` is empty;
    /// an accidental empty list would silently filter everything out.
    pub fn new(regions: Vec<Rect>) -> Result<Self, SetupError> {
        if regions.is_empty() {
            return Err(SetupError::EmptyRegionList);
        }
        Ok(Self { regions })
    }

    fn contains_point(&self, p: Point) -> bool {
        self.regions.iter().any(|r| r.contains(p.x, p.y))
    }
}

impl EventFilter for TextRegionFilter {
    fn accept(&self, event: &RenderEvent) -> bool {
        match event {
            RenderEvent::Text(info) => self.contains_point(info.start),
            RenderEvent::Image(info) => {
                self.contains_point(info.ctm.transform_point(Point::new(0.0, 0.0)))
            }
            RenderEvent::Path(info) => match info.path.bounding_box() {
                Some(bbox) => self.regions.iter().any(|r| r.intersects(&bbox)),
                None => false,
            },
            RenderEvent::Clip(_) => true,
            // No position of their own to test against a region.
            RenderEvent::BeginText | RenderEvent::EndText => true,
        }
    }
}

struct Attachment<'a> {
    listener: &'a mut dyn EventListener,
    filters: Vec<Box<dyn EventFilter>>,
}

/// Fans events out to several listeners, each behind its own filter chain.
///
/// Every attached listener receives the events its `supported_events`
/// declares and all of its filters accept, in attachment order. This is
/// the way to run several extractions over a single processing pass.
#[derive(Default)]
pub struct FilteredEventListener<'a> {
    attachments: Vec<Attachment<'a>>,
}

impl<'a> FilteredEventListener<'a> {
    pub fn new() -> Self {
        Self {
            attachments: Vec::new(),
        }
    }

    /// Attach a listener that receives every event it supports.
    pub fn attach(&mut self, listener: &'a mut dyn EventListener) {
        self.attach_filtered(listener, Vec::new());
    }

    /// Attach a listener behind a filter chain; an event is delivered only
    /// when every filter accepts it.
    pub fn attach_filtered(
        &mut self,
        listener: &'a mut dyn EventListener,
        filters: Vec<Box<dyn EventFilter>>,
    ) {
        self.attachments.push(Attachment { listener, filters });
    }
}

impl EventListener for FilteredEventListener<'_> {
    fn on_event(&mut self, event: &RenderEvent) {
        let event_type = event.event_type();
        for attachment in &mut self.attachments {
            if !attachment.listener.supported_events().contains(event_type) {
                continue;
            }
            if attachment.filters.iter().all(|f| f.accept(event)) {
                attachment.listener.on_event(event);
            }
        }
    }

    fn supported_events(&self) -> EventTypes {
        self.attachments
            .iter()
            .fold(EventTypes::empty(), |acc, a| {
                acc | a.listener.supported_events()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ImageRenderInfo, TextRenderInfo};
    use crate::listeners::LocationTextExtraction;
    use crate::state::TextRenderMode;
    use inkstream_core::{Color, Matrix};

    fn text_info(text: &str, x0: f64, x1: f64, y: f64) -> TextRenderInfo {
        TextRenderInfo {
            text: text.to_string(),
            glyphs: Vec::new(),
            start: Point::new(x0, y),
            end: Point::new(x1, y),
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
    fn empty_region_list_is_rejected() {
        assert_eq!(
            TextRegionFilter::new(Vec::new()).unwrap_err(),
            SetupError::EmptyRegionList
        );
    }

    #[test]
    fn region_filter_on_text_baseline_start() {
        let filter = TextRegionFilter::new(vec![Rect::new(0.0, 0.0, 100.0, 100.0)]).unwrap();
        assert!(filter.accept(&RenderEvent::Text(text_info("in", 50.0, 60.0, 50.0))));
        assert!(!filter.accept(&RenderEvent::Text(text_info("out", 150.0, 160.0, 50.0))));
    }

    #[test]
    fn region_filter_any_region_suffices() {
        let filter = TextRegionFilter::new(vec![
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(100.0, 100.0, 200.0, 200.0),
        ])
        .unwrap();
        assert!(filter.accept(&RenderEvent::Text(text_info("a", 5.0, 8.0, 5.0))));
        assert!(filter.accept(&RenderEvent::Text(text_info("b", 150.0, 160.0, 150.0))));
        assert!(!filter.accept(&RenderEvent::Text(text_info("c", 50.0, 60.0, 50.0))));
    }

    #[test]
    fn region_filter_on_image_placement() {
        let filter = TextRegionFilter::new(vec![Rect::new(0.0, 0.0, 100.0, 100.0)]).unwrap();
        let inside = ImageRenderInfo {
            ctm: Matrix::translation(50.0, 50.0),
            name: None,
            width: None,
            height: None,
            marked_content: Vec::new(),
        };
        let outside = ImageRenderInfo {
            ctm: Matrix::translation(500.0, 500.0),
            ..inside.clone()
        };
        assert!(filter.accept(&RenderEvent::Image(inside)));
        assert!(!filter.accept(&RenderEvent::Image(outside)));
    }

    #[test]
    fn fanout_delivers_to_all_attached() {
        let mut first = LocationTextExtraction::new();
        let mut second = LocationTextExtraction::new();
        {
            let mut fanout = FilteredEventListener::new();
            fanout.attach(&mut first);
            fanout.attach(&mut second);
            fanout.on_event(&RenderEvent::Text(text_info("x", 10.0, 16.0, 50.0)));
        }
        assert_eq!(first.text(), "x");
        assert_eq!(second.text(), "x");
    }

    #[test]
    fn filtered_attachment_sees_region_subset_only() {
        let mut all = LocationTextExtraction::new();
        let mut left_half = LocationTextExtraction::new();
        {
            let mut fanout = FilteredEventListener::new();
            fanout.attach(&mut all);
            let filter = TextRegionFilter::new(vec![Rect::new(0.0, 0.0, 100.0, 800.0)]).unwrap();
            fanout.attach_filtered(&mut left_half, vec![Box::new(filter)]);
            fanout.on_event(&RenderEvent::Text(text_info("left", 10.0, 40.0, 700.0)));
            fanout.on_event(&RenderEvent::Text(text_info("right", 200.0, 240.0, 700.0)));
        }
        assert_eq!(all.text(), "left right");
        assert_eq!(left_half.text(), "left");
    }

    #[test]
    fn supported_events_is_union_of_attachments() {
        let mut text_only = LocationTextExtraction::new();
        let mut fanout = FilteredEventListener::new();
        assert_eq!(fanout.supported_events(), EventTypes::empty());
        fanout.attach(&mut text_only);
        assert_eq!(fanout.supported_events(), EventTypes::TEXT);
    }

    #[test]
    fn unsupported_event_types_not_delivered() {
        let mut text_only = LocationTextExtraction::new();
        let mut fanout = FilteredEventListener::new();
        fanout.attach(&mut text_only);
        // An image event must not reach a TEXT-only listener
        fanout.on_event(&RenderEvent::Image(ImageRenderInfo {
            ctm: Matrix::identity(),
            name: None,
            width: None,
            height: None,
            marked_content: Vec::new(),
        }));
        fanout.on_event(&RenderEvent::Text(text_info("t", 10.0, 16.0, 50.0)));
        assert_eq!(text_only.chunks().len(), 1);
    }
}
