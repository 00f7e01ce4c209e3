//! Line extraction for the read-result payloads the vision service has been
//! seen to return. Each parser is tried in order until one yields a line.

use serde_json::Value;

use super::{LineBounds, OcrLine};

pub type ShapeParser = fn(&Value) -> Vec<OcrLine>;

/// Fallback order matters: block lines carry the best geometry.
pub const SHAPE_PARSERS: &[(&str, ShapeParser)] = &[
    ("blocks", block_lines),
    ("pages", page_lines),
    ("content", flat_content),
];

/// Run the parsers in order; returns the first non-empty result with its shape name.
pub fn extract_lines(payload: &Value) -> Option<(&'static str, Vec<OcrLine>)> {
    SHAPE_PARSERS.iter().find_map(|(name, parser)| {
        let lines = parser(payload);
        if lines.is_empty() {
            None
        } else {
            Some((*name, lines))
        }
    })
}

/// `readResult.blocks[].lines[]`, preferring `text` over `content`.
pub fn block_lines(payload: &Value) -> Vec<OcrLine> {
    read_result_array(payload, "blocks")
        .flat_map(|block| collect_lines(block, "text", "content"))
        .collect()
}

/// `readResult.pages[].lines[]`, preferring `content` over `text`.
pub fn page_lines(payload: &Value) -> Vec<OcrLine> {
    read_result_array(payload, "pages")
        .flat_map(|page| collect_lines(page, "content", "text"))
        .collect()
}

/// `readResult.content` as a single line without geometry.
pub fn flat_content(payload: &Value) -> Vec<OcrLine> {
    payload
        .get("readResult")
        .and_then(|result| result.get("content"))
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .map(|content| {
            vec![OcrLine {
                text: content.to_string(),
                bounds: None,
            }]
        })
        .unwrap_or_default()
}

fn read_result_array<'a>(payload: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    payload
        .get("readResult")
        .and_then(|result| result.get(key))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn collect_lines(container: &Value, primary: &str, secondary: &str) -> Vec<OcrLine> {
    let Some(lines) = container.get("lines").and_then(Value::as_array) else {
        return Vec::new();
    };
    lines
        .iter()
        .filter_map(|line| {
            let text = non_empty_str(line, primary).or_else(|| non_empty_str(line, secondary))?;
            let geometry = line.get("boundingBox").or_else(|| line.get("polygon"));
            Some(OcrLine {
                text: text.to_string(),
                bounds: geometry.and_then(parse_bounds),
            })
        })
        .collect()
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

/// Accepts flat `[x0, y0, x1, y1, ...]` polygons (at least four points),
/// `[{x, y}, ...]` point lists and `{x, y, w|width, h|height}` boxes.
pub fn parse_bounds(geometry: &Value) -> Option<LineBounds> {
    match geometry {
        Value::Array(items) if items.iter().all(Value::is_number) => {
            if items.len() < 8 {
                return None;
            }
            let coords = items.iter().filter_map(Value::as_f64).collect::<Vec<_>>();
            LineBounds::from_points(coords.chunks_exact(2).map(|pair| (pair[0], pair[1])))
        }
        Value::Array(items) => LineBounds::from_points(items.iter().filter_map(|point| {
            Some((point.get("x")?.as_f64()?, point.get("y")?.as_f64()?))
        })),
        Value::Object(_) => {
            let x = geometry.get("x")?.as_f64()?;
            let y = geometry.get("y")?.as_f64()?;
            let width = number_field(geometry, "w", "width");
            let height = number_field(geometry, "h", "height");
            Some(LineBounds {
                min_x: x,
                max_x: x + width,
                min_y: y,
                max_y: y + height,
            })
        }
        _ => None,
    }
}

fn number_field(value: &Value, short: &str, long: &str) -> f64 {
    value
        .get(short)
        .and_then(Value::as_f64)
        .or_else(|| value.get(long).and_then(Value::as_f64))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_shape_reads_text_and_polygon() {
        let payload = json!({
            "readResult": {
                "blocks": [{
                    "lines": [
                        {"text": "Hello", "boundingPolygon": [], "polygon": [{"x": 1, "y": 2}, {"x": 9, "y": 2}, {"x": 9, "y": 7}, {"x": 1, "y": 7}]},
                        {"content": "World", "boundingBox": [10, 20, 50, 20, 50, 30, 10, 30]},
                        {"text": ""}
                    ]
                }]
            }
        });
        let lines = block_lines(&payload);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Hello");
        assert_eq!(
            lines[0].bounds,
            Some(LineBounds {
                min_x: 1.0,
                max_x: 9.0,
                min_y: 2.0,
                max_y: 7.0
            })
        );
        assert_eq!(lines[1].text, "World");
        assert_eq!(
            lines[1].bounds,
            Some(LineBounds {
                min_x: 10.0,
                max_x: 50.0,
                min_y: 20.0,
                max_y: 30.0
            })
        );
    }

    #[test]
    fn page_shape_prefers_content_field() {
        let payload = json!({
            "readResult": {
                "pages": [{"lines": [{"content": "from content", "text": "from text"}]}]
            }
        });
        let lines = page_lines(&payload);
        assert_eq!(lines[0].text, "from content");
        assert_eq!(lines[0].bounds, None);
    }

    #[test]
    fn fallback_chain_stops_at_first_shape_with_lines() {
        let payload = json!({
            "readResult": {
                "blocks": [{"lines": []}],
                "pages": [{"lines": [{"content": "page line"}]}],
                "content": "whole content"
            }
        });
        let (shape, lines) = extract_lines(&payload).unwrap();
        assert_eq!(shape, "pages");
        assert_eq!(lines.len(), 1);

        let payload = json!({"readResult": {"blocks": [], "content": "whole content"}});
        let (shape, lines) = extract_lines(&payload).unwrap();
        assert_eq!(shape, "content");
        assert_eq!(lines[0].text, "whole content");

        assert!(extract_lines(&json!({"readResult": {"blocks": []}})).is_none());
        assert!(extract_lines(&json!({"modelVersion": "2023-10-01"})).is_none());
    }

    #[test]
    fn bounds_accept_box_objects_and_reject_short_polygons() {
        let bounds = parse_bounds(&json!({"x": 5, "y": 6, "width": 10, "h": 4})).unwrap();
        assert_eq!(
            bounds,
            LineBounds {
                min_x: 5.0,
                max_x: 15.0,
                min_y: 6.0,
                max_y: 10.0
            }
        );
        assert_eq!(parse_bounds(&json!([1, 2, 3, 4])), None);
        assert_eq!(parse_bounds(&json!("nope")), None);
    }
}
