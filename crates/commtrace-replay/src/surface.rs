//! Drawing seam between the replay core and a concrete map renderer
//!
//! The lifecycle controller and segment window speak only [`DrawSurface`].
//! A real frontend implements it over its map layer; tests use
//! [`RecordingSurface`], which remembers every operation and the set of
//! shapes currently alive.

use commtrace_track::GeoPoint;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Opaque identifier of one drawn shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(pub u64);

/// Stroke and fill styling for a drawn shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// `#rrggbb` stroke color.
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
    /// SVG-style dash pattern, e.g. `"4, 4"`. `None` draws solid.
    pub dash: Option<String>,
}

impl Style {
    pub fn solid(color: impl Into<String>, weight: f64, opacity: f64) -> Self {
        Self {
            color: color.into(),
            weight,
            opacity,
            fill_opacity: 0.0,
            dash: None,
        }
    }

    pub fn with_fill(mut self, fill_opacity: f64) -> Self {
        self.fill_opacity = fill_opacity;
        self
    }

    pub fn with_dash(mut self, dash: impl Into<String>) -> Self {
        self.dash = Some(dash.into());
        self
    }

    /// Copy of this style with its opacities scaled by `factor`, used for
    /// fade-out steps.
    pub fn faded(&self, factor: f64) -> Self {
        let mut s = self.clone();
        s.opacity *= factor;
        s.fill_opacity *= factor;
        s
    }
}

/// Renderer abstraction: geodesic shapes in, opaque handles out.
pub trait DrawSurface {
    fn draw_segment(&mut self, from: GeoPoint, to: GeoPoint, style: &Style) -> Handle;
    fn draw_halo(&mut self, center: GeoPoint, radius_m: f64, style: &Style) -> Handle;
    fn draw_arc(
        &mut self,
        center: GeoPoint,
        radius_m: f64,
        from_deg: f64,
        to_deg: f64,
        style: &Style,
    ) -> Handle;
    fn draw_marker(&mut self, at: GeoPoint, style: &Style) -> Handle;
    fn set_style(&mut self, handle: Handle, style: &Style);
    fn remove(&mut self, handle: Handle);
    /// Current screen scale at a latitude, used to suppress shapes that
    /// would render below legibility.
    fn pixels_per_meter(&self, lat: f64) -> f64;
}

/// One shape currently alive on a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Segment {
        from: GeoPoint,
        to: GeoPoint,
        style: Style,
    },
    Halo {
        center: GeoPoint,
        radius_m: f64,
        style: Style,
    },
    Arc {
        center: GeoPoint,
        radius_m: f64,
        from_deg: f64,
        to_deg: f64,
        style: Style,
    },
    Marker {
        at: GeoPoint,
        style: Style,
    },
}

impl Shape {
    pub fn style(&self) -> &Style {
        match self {
            Self::Segment { style, .. }
            | Self::Halo { style, .. }
            | Self::Arc { style, .. }
            | Self::Marker { style, .. } => style,
        }
    }
}

/// In-memory surface for tests: keeps every live shape addressable by
/// handle and counts removals.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    next_handle: u64,
    live: IndexMap<Handle, Shape>,
    removed: usize,
    pixels_per_meter: f64,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            pixels_per_meter: 1.0,
            ..Default::default()
        }
    }

    /// Pretend the map is zoomed such that one meter covers this many
    /// pixels.
    pub fn with_pixels_per_meter(mut self, ppm: f64) -> Self {
        self.pixels_per_meter = ppm;
        self
    }

    /// Change the pretend zoom level mid-test.
    pub fn set_pixels_per_meter(&mut self, ppm: f64) {
        self.pixels_per_meter = ppm;
    }

    pub fn live_shapes(&self) -> impl Iterator<Item = (Handle, &Shape)> {
        self.live.iter().map(|(h, s)| (*h, s))
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn removed_count(&self) -> usize {
        self.removed
    }

    pub fn get(&self, handle: Handle) -> Option<&Shape> {
        self.live.get(&handle)
    }

    pub fn segments(&self) -> Vec<&Shape> {
        self.live
            .values()
            .filter(|s| matches!(s, Shape::Segment { .. }))
            .collect()
    }

    pub fn halos(&self) -> Vec<&Shape> {
        self.live
            .values()
            .filter(|s| matches!(s, Shape::Halo { .. }))
            .collect()
    }

    pub fn arcs(&self) -> Vec<&Shape> {
        self.live
            .values()
            .filter(|s| matches!(s, Shape::Arc { .. }))
            .collect()
    }

    pub fn markers(&self) -> Vec<&Shape> {
        self.live
            .values()
            .filter(|s| matches!(s, Shape::Marker { .. }))
            .collect()
    }

    fn insert(&mut self, shape: Shape) -> Handle {
        let handle = Handle(self.next_handle);
        self.next_handle += 1;
        self.live.insert(handle, shape);
        handle
    }
}

impl DrawSurface for RecordingSurface {
    fn draw_segment(&mut self, from: GeoPoint, to: GeoPoint, style: &Style) -> Handle {
        self.insert(Shape::Segment {
            from,
            to,
            style: style.clone(),
        })
    }

    fn draw_halo(&mut self, center: GeoPoint, radius_m: f64, style: &Style) -> Handle {
        self.insert(Shape::Halo {
            center,
            radius_m,
            style: style.clone(),
        })
    }

    fn draw_arc(
        &mut self,
        center: GeoPoint,
        radius_m: f64,
        from_deg: f64,
        to_deg: f64,
        style: &Style,
    ) -> Handle {
        self.insert(Shape::Arc {
            center,
            radius_m,
            from_deg,
            to_deg,
            style: style.clone(),
        })
    }

    fn draw_marker(&mut self, at: GeoPoint, style: &Style) -> Handle {
        self.insert(Shape::Marker {
            at,
            style: style.clone(),
        })
    }

    fn set_style(&mut self, handle: Handle, style: &Style) {
        if let Some(shape) = self.live.get_mut(&handle) {
            match shape {
                Shape::Segment { style: s, .. }
                | Shape::Halo { style: s, .. }
                | Shape::Arc { style: s, .. }
                | Shape::Marker { style: s, .. } => *s = style.clone(),
            }
        }
    }

    fn remove(&mut self, handle: Handle) {
        if self.live.shift_remove(&handle).is_some() {
            self.removed += 1;
        }
    }

    fn pixels_per_meter(&self, _lat: f64) -> f64 {
        self.pixels_per_meter
    }
}
