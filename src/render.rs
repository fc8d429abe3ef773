//! Renderer - Encoded Path to Vector Graphic
//!
//! Rendering never fails on a structurally valid path. Garbage geometry in,
//! garbage geometry out. Segments whose vertices cannot be placed on the
//! lattice are skipped and the pen lifts.
//!
//! Two SVG shapes are emitted from one [`VectorGraphic`]:
//! - document: XML declaration, explicit size, optional background
//! - fragment: no declaration, no background, `currentColor` strokes

use std::fmt::Write as _;
use std::str::FromStr;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::encoder::{CurveControl, EncodedPath};
use crate::lattice::{Bounds, Lattice, Point};

const SVG_NS: &str = "http://www.w3.org/2000/svg";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderStyle {
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    #[serde(default = "default_background")]
    pub background: Option<String>,
    #[serde(default)]
    pub show_nodes: bool,
    #[serde(default = "default_node_radius")]
    pub node_radius: f64,
    #[serde(default = "default_node_color")]
    pub node_color: String,
    #[serde(default)]
    pub show_grid: bool,
    #[serde(default = "default_grid_color")]
    pub grid_color: String,
    #[serde(default = "default_grid_width")]
    pub grid_width: f64,
    #[serde(default = "default_padding")]
    pub padding: f64,
}

fn default_stroke_width() -> f64 { 2.0 }
fn default_stroke_color() -> String { "#111111".to_string() }
fn default_background() -> Option<String> { Some("#ffffff".to_string()) }
fn default_node_radius() -> f64 { 1.5 }
fn default_node_color() -> String { "#888888".to_string() }
fn default_grid_color() -> String { "#dddddd".to_string() }
fn default_grid_width() -> f64 { 0.5 }
fn default_padding() -> f64 { 8.0 }

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            stroke_width: default_stroke_width(),
            stroke_color: default_stroke_color(),
            background: default_background(),
            show_nodes: false,
            node_radius: default_node_radius(),
            node_color: default_node_color(),
            show_grid: false,
            grid_color: default_grid_color(),
            grid_width: default_grid_width(),
            padding: default_padding(),
        }
    }
}

/// Fixed transform applied about the lattice centre before emission.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    FlipHorizontal,
    FlipVertical,
}

impl Orientation {
    pub fn apply(self, p: Point, center: Point) -> Point {
        let (dx, dy) = (p.x - center.x, p.y - center.y);
        let (rx, ry) = match self {
            Orientation::Normal => (dx, dy),
            Orientation::Rotate90 => (-dy, dx),
            Orientation::Rotate180 => (-dx, -dy),
            Orientation::Rotate270 => (dy, -dx),
            Orientation::FlipHorizontal => (-dx, dy),
            Orientation::FlipVertical => (dx, -dy),
        };
        Point::new(center.x + rx, center.y + ry)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Normal => "normal",
            Orientation::Rotate90 => "rotate90",
            Orientation::Rotate180 => "rotate180",
            Orientation::Rotate270 => "rotate270",
            Orientation::FlipHorizontal => "flip-horizontal",
            Orientation::FlipVertical => "flip-vertical",
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "0" => Ok(Orientation::Normal),
            "rotate90" | "90" => Ok(Orientation::Rotate90),
            "rotate180" | "180" => Ok(Orientation::Rotate180),
            "rotate270" | "270" => Ok(Orientation::Rotate270),
            "flip-horizontal" => Ok(Orientation::FlipHorizontal),
            "flip-vertical" => Ok(Orientation::FlipVertical),
            other => Err(format!("unknown orientation: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo { control: Point, to: Point },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Background { color: String },
    GridLine { from: Point, to: Point },
    Stroke { commands: Vec<PathCommand> },
    Node { center: Point, radius: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Drawable primitives in paint order plus the viewport they live in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorGraphic {
    pub viewport: ViewBox,
    pub primitives: Vec<Primitive>,
    pub style: RenderStyle,
}

/// Render an encoded path onto its lattice.
pub fn render(
    path: &EncodedPath,
    lattice: &Lattice,
    style: &RenderStyle,
    orientation: Orientation,
) -> VectorGraphic {
    let center = lattice.bounds().center();
    let place = |p: Point| orientation.apply(p, center);
    let vertex = |pos: usize| {
        path.vertices
            .get(pos)
            .and_then(|&v| lattice.anchor(v))
            .map(place)
    };

    let mut primitives = vec![];

    if let Some(color) = &style.background {
        primitives.push(Primitive::Background { color: color.clone() });
    }

    if style.show_grid {
        primitives.extend(grid_lines(lattice).into_iter().map(|(a, b)| Primitive::GridLine {
            from: place(a),
            to: place(b),
        }));
    }

    let mut commands = vec![];
    let mut pen: Option<usize> = None;

    for seg in &path.paths {
        let (Some(a), Some(b)) = (vertex(seg.from), vertex(seg.to)) else {
            pen = None;
            continue;
        };
        if pen != Some(seg.from) {
            commands.push(PathCommand::MoveTo(a));
        }
        match &seg.control {
            CurveControl::Straight => commands.push(PathCommand::LineTo(b)),
            CurveControl::Quadratic { x, y } => commands.push(PathCommand::QuadTo {
                control: place(Point::new(*x, *y)),
                to: b,
            }),
            CurveControl::Fractal { points, .. } => {
                commands.extend(points.iter().map(|p| PathCommand::LineTo(place(*p))));
                if let Some(first) = points.first() {
                    commands.push(PathCommand::LineTo(place(*first)));
                }
                commands.push(PathCommand::LineTo(b));
            }
        }
        pen = Some(seg.to);
    }

    // a single character is drawn as a dot
    if path.paths.is_empty() {
        if let Some(p) = vertex(0) {
            commands.push(PathCommand::MoveTo(p));
            commands.push(PathCommand::LineTo(p));
        }
    }

    if !commands.is_empty() {
        primitives.push(Primitive::Stroke { commands });
    }

    if style.show_nodes {
        primitives.extend(lattice.anchors().iter().map(|&a| Primitive::Node {
            center: place(a),
            radius: style.node_radius,
        }));
    }

    VectorGraphic {
        viewport: viewport(lattice, style, orientation),
        primitives,
        style: style.clone(),
    }
}

/// Lines through every distinct anchor column and row, spanning the lattice.
fn grid_lines(lattice: &Lattice) -> Vec<(Point, Point)> {
    let b = lattice.bounds();
    let xs = distinct(lattice.anchors().iter().map(|p| p.x));
    let ys = distinct(lattice.anchors().iter().map(|p| p.y));

    xs.into_iter()
        .map(|x| (Point::new(x, b.min_y), Point::new(x, b.max_y)))
        .chain(
            ys.into_iter()
                .map(|y| (Point::new(b.min_x, y), Point::new(b.max_x, y))),
        )
        .collect()
}

fn distinct(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v.dedup();
    v
}

fn viewport(lattice: &Lattice, style: &RenderStyle, orientation: Orientation) -> ViewBox {
    let center = lattice.bounds().center();
    let oriented: Vec<Point> = lattice
        .anchors()
        .iter()
        .map(|&p| orientation.apply(p, center))
        .collect();
    let bounds = Bounds::of(&oriented).unwrap_or_else(|| lattice.bounds());

    let rules = lattice.rules();
    let loop_margin = if rules.fractal_depth > 0 { rules.loop_radius } else { 0.0 };
    let margin = style.padding.max(0.0) + loop_margin + style.stroke_width.max(0.0) / 2.0;
    let b = bounds.inflate(margin);

    let (mut width, mut height) = (b.width(), b.height());
    let (mut min_x, mut min_y) = (b.min_x, b.min_y);
    if width <= 0.0 {
        min_x -= 0.5;
        width = 1.0;
    }
    if height <= 0.0 {
        min_y -= 0.5;
        height = 1.0;
    }
    ViewBox { min_x, min_y, width, height }
}

impl VectorGraphic {
    /// Pixel size for a target height, keeping the viewport's aspect ratio.
    pub fn dimensions(&self, height: u32) -> (u32, u32) {
        let aspect = self.viewport.width / self.viewport.height;
        let width = (height as f64 * aspect).round().max(1.0) as u32;
        (width, height.max(1))
    }

    /// Standalone SVG document.
    pub fn to_document(&self, width: u32, height: u32) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            out,
            r#"<svg xmlns="{}" width="{}" height="{}" viewBox="{}">"#,
            SVG_NS,
            width,
            height,
            self.view_box_attr()
        );
        self.write_body(&mut out, false);
        out.push_str("</svg>\n");
        out
    }

    /// Inline SVG fragment; strokes follow the surrounding text colour.
    pub fn to_fragment(&self, size: u32) -> String {
        let (width, height) = self.dimensions(size);
        let mut out = String::new();
        let _ = write!(
            out,
            r#"<svg xmlns="{}" width="{}" height="{}" viewBox="{}" fill="none" stroke="currentColor" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round">"#,
            SVG_NS,
            width,
            height,
            self.view_box_attr(),
            num(self.style.stroke_width)
        );
        self.write_body(&mut out, true);
        out.push_str("</svg>");
        out
    }

    /// Document wrapped as a base64 `data:` URI.
    pub fn to_data_uri(&self, width: u32, height: u32) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.to_document(width, height));
        format!("data:image/svg+xml;base64,{}", encoded)
    }

    fn view_box_attr(&self) -> String {
        let v = &self.viewport;
        format!("{} {} {} {}", num(v.min_x), num(v.min_y), num(v.width), num(v.height))
    }

    fn write_body(&self, out: &mut String, inline: bool) {
        let style = &self.style;
        let v = &self.viewport;

        for primitive in &self.primitives {
            match primitive {
                Primitive::Background { color } if !inline => {
                    let _ = writeln!(
                        out,
                        r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
                        num(v.min_x),
                        num(v.min_y),
                        num(v.width),
                        num(v.height),
                        escape_attr(color)
                    );
                }
                Primitive::Background { .. } => {}
                Primitive::GridLine { from, to } => {
                    let stroke = if inline {
                        r#"stroke-opacity="0.25""#.to_string()
                    } else {
                        format!(r#"stroke="{}""#, escape_attr(&style.grid_color))
                    };
                    let _ = write!(
                        out,
                        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" {} stroke-width="{}"/>"#,
                        num(from.x),
                        num(from.y),
                        num(to.x),
                        num(to.y),
                        stroke,
                        num(style.grid_width)
                    );
                    if !inline {
                        out.push('\n');
                    }
                }
                Primitive::Stroke { commands } => {
                    if inline {
                        let _ = write!(out, r#"<path d="{}"/>"#, path_data(commands));
                    } else {
                        let _ = writeln!(
                            out,
                            r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round"/>"#,
                            path_data(commands),
                            escape_attr(&style.stroke_color),
                            num(style.stroke_width)
                        );
                    }
                }
                Primitive::Node { center, radius } => {
                    let fill = if inline {
                        "currentColor".to_string()
                    } else {
                        escape_attr(&style.node_color)
                    };
                    let _ = write!(
                        out,
                        r#"<circle cx="{}" cy="{}" r="{}" fill="{}" stroke="none"/>"#,
                        num(center.x),
                        num(center.y),
                        num(*radius),
                        fill
                    );
                    if !inline {
                        out.push('\n');
                    }
                }
            }
        }
    }
}

fn path_data(commands: &[PathCommand]) -> String {
    let parts: Vec<String> = commands
        .iter()
        .map(|c| match c {
            PathCommand::MoveTo(p) => format!("M{} {}", num(p.x), num(p.y)),
            PathCommand::LineTo(p) => format!("L{} {}", num(p.x), num(p.y)),
            PathCommand::QuadTo { control, to } => format!(
                "Q{} {} {} {}",
                num(control.x),
                num(control.y),
                num(to.x),
                num(to.y)
            ),
        })
        .collect();
    parts.join(" ")
}

/// Shortest decimal form with at most three fractional digits.
fn num(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode;
    use serde_json::json;

    fn lattice(rules: serde_json::Value) -> Lattice {
        let anchors = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 10.0),
        ];
        Lattice::new("grid", anchors, &rules, None).unwrap()
    }

    fn abc() -> serde_json::Value {
        json!({"mapping": {"A": 0, "B": 1, "C": 4}})
    }

    fn stroke(g: &VectorGraphic) -> &[PathCommand] {
        g.primitives
            .iter()
            .find_map(|p| match p {
                Primitive::Stroke { commands } => Some(commands.as_slice()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_stroke_follows_paths() {
        let l = lattice(abc());
        let g = render(&encode("ABC", &l), &l, &RenderStyle::default(), Orientation::Normal);
        assert_eq!(
            stroke(&g),
            &[
                PathCommand::MoveTo(Point::new(0.0, 0.0)),
                PathCommand::LineTo(Point::new(10.0, 0.0)),
                PathCommand::LineTo(Point::new(10.0, 10.0)),
            ]
        );
        assert!(matches!(g.primitives[0], Primitive::Background { .. }));
    }

    #[test]
    fn test_optional_markers() {
        let l = lattice(abc());
        let style = RenderStyle { show_nodes: true, show_grid: true, ..RenderStyle::default() };
        let g = render(&encode("AB", &l), &l, &style, Orientation::Normal);
        let nodes = g.primitives.iter().filter(|p| matches!(p, Primitive::Node { .. })).count();
        let lines = g.primitives.iter().filter(|p| matches!(p, Primitive::GridLine { .. })).count();
        assert_eq!(nodes, 6);
        // three columns, two rows
        assert_eq!(lines, 5);
    }

    #[test]
    fn test_orientation_transforms() {
        let c = Point::new(10.0, 5.0);
        let p = Point::new(20.0, 5.0);
        assert_eq!(Orientation::Rotate90.apply(p, c), Point::new(10.0, 15.0));
        assert_eq!(Orientation::Rotate180.apply(p, c), Point::new(0.0, 5.0));
        assert_eq!(Orientation::Rotate270.apply(p, c), Point::new(10.0, -5.0));
        assert_eq!(Orientation::FlipHorizontal.apply(p, c), Point::new(0.0, 5.0));
        assert_eq!(Orientation::FlipVertical.apply(Point::new(0.0, 0.0), c), Point::new(0.0, 10.0));
        assert_eq!(Orientation::Normal.apply(p, c), p);
    }

    #[test]
    fn test_rotated_render() {
        let l = lattice(abc());
        let g = render(&encode("A", &l), &l, &RenderStyle::default(), Orientation::Rotate180);
        assert_eq!(stroke(&g)[0], PathCommand::MoveTo(Point::new(20.0, 10.0)));
    }

    #[test]
    fn test_orientation_parse() {
        assert_eq!("rotate90".parse::<Orientation>().unwrap(), Orientation::Rotate90);
        assert_eq!("Flip-Vertical".parse::<Orientation>().unwrap(), Orientation::FlipVertical);
        assert!("sideways".parse::<Orientation>().is_err());
        for o in [Orientation::Rotate270, Orientation::FlipHorizontal] {
            assert_eq!(o.as_str().parse::<Orientation>().unwrap(), o);
        }
    }

    #[test]
    fn test_curved_and_loop_commands() {
        let l = lattice(json!({"mapping": {"A": 0, "B": 1}, "connection": "curved", "fractalDepth": 1}));
        let g = render(&encode("AAB", &l), &l, &RenderStyle::default(), Orientation::Normal);
        let cmds = stroke(&g);
        // move, 4 loop points, close, return to anchor, curve to B
        assert_eq!(cmds.len(), 8);
        assert!(matches!(cmds[7], PathCommand::QuadTo { .. }));
    }

    #[test]
    fn test_garbage_input_does_not_panic() {
        let l = lattice(abc());
        let mut path = encode("ABC", &l);
        path.vertices = vec![99, 0];
        path.paths[0].to = 7;
        let g = render(&path, &l, &RenderStyle::default(), Orientation::Normal);
        assert!(g.primitives.iter().all(|p| !matches!(p, Primitive::Stroke { .. })));
    }

    #[test]
    fn test_document_shape() {
        let l = lattice(abc());
        let g = render(&encode("AB", &l), &l, &RenderStyle::default(), Orientation::Normal);
        let doc = g.to_document(200, 100);
        assert!(doc.starts_with("<?xml"));
        assert!(doc.contains(r#"width="200" height="100""#));
        assert!(doc.contains("<rect"));
        assert!(doc.contains(r##"stroke="#111111""##));
        assert!(doc.contains(r#"d="M0 0 L10 0""#));
    }

    #[test]
    fn test_fragment_shape() {
        let l = lattice(abc());
        let g = render(&encode("AB", &l), &l, &RenderStyle::default(), Orientation::Normal);
        let frag = g.to_fragment(32);
        assert!(frag.starts_with("<svg"));
        assert!(!frag.contains("<?xml"));
        assert!(!frag.contains("<rect"));
        assert!(frag.contains(r#"stroke="currentColor""#));
        assert!(frag.contains(r#"height="32""#));
    }

    #[test]
    fn test_data_uri() {
        let l = lattice(abc());
        let g = render(&encode("AB", &l), &l, &RenderStyle::default(), Orientation::Normal);
        assert!(g.to_data_uri(10, 10).starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn test_colors_escaped() {
        let l = lattice(abc());
        let style = RenderStyle { stroke_color: "\"><script>".to_string(), ..RenderStyle::default() };
        let doc = render(&encode("AB", &l), &l, &style, Orientation::Normal).to_document(10, 10);
        assert!(!doc.contains("<script>"));
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(1.0), "1");
        assert_eq!(num(-0.0001), "0");
        assert_eq!(num(2.5), "2.5");
        assert_eq!(num(1.23456), "1.235");
        assert_eq!(num(-3.0), "-3");
    }
}
