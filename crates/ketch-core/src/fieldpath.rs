//! Field-path value injection
//!
//! A field path addresses a node inside a manifest document:
//!
//! ```text
//! spec.template.spec.containers[0].image
//! spec.selector.matchLabels['app.ketch.io/component']
//! ```
//!
//! Writing through a path creates missing map keys (and lists, when the next
//! segment is an index). A list index may address an existing element or the
//! slot right after the last one; anything further is "path not found".

use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::value::{ParameterType, ParameterValue, RawProperty};

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Map key, from `name` or `['name']`
    Field(String),
    /// List position, from `[0]`
    Index(usize),
}

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Clone, Copy, PartialEq)]
enum Prev {
    Start,
    Dot,
    Field,
    Bracket,
}

impl FieldPath {
    /// Parse a dot/bracket path
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |message: &str| CoreError::InvalidFieldPath {
            path: path.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut field = String::new();
        let mut prev = Prev::Start;
        let mut chars = path.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    match prev {
                        Prev::Start | Prev::Dot => return Err(invalid("empty segment")),
                        Prev::Field => segments.push(Segment::Field(std::mem::take(&mut field))),
                        Prev::Bracket => {}
                    }
                    prev = Prev::Dot;
                }
                '[' => {
                    match prev {
                        Prev::Dot => return Err(invalid("empty segment")),
                        Prev::Field => segments.push(Segment::Field(std::mem::take(&mut field))),
                        Prev::Start | Prev::Bracket => {}
                    }

                    let segment = match chars.peek().copied() {
                        Some(quote @ ('\'' | '"')) => {
                            chars.next();
                            let mut key = String::new();
                            loop {
                                match chars.next() {
                                    Some(c) if c == quote => break,
                                    Some(c) => key.push(c),
                                    None => return Err(invalid("unterminated quoted key")),
                                }
                            }
                            if chars.next() != Some(']') {
                                return Err(invalid("expected ']' after quoted key"));
                            }
                            Segment::Field(key)
                        }
                        _ => {
                            let mut index = String::new();
                            loop {
                                match chars.next() {
                                    Some(']') => break,
                                    Some(c) => index.push(c),
                                    None => return Err(invalid("unterminated '['")),
                                }
                            }
                            let index = index
                                .trim()
                                .parse::<usize>()
                                .map_err(|_| invalid(&format!("invalid list index {:?}", index)))?;
                            Segment::Index(index)
                        }
                    };
                    segments.push(segment);
                    prev = Prev::Bracket;
                }
                ']' => return Err(invalid("unexpected ']'")),
                c => {
                    if prev == Prev::Bracket {
                        return Err(invalid("expected '.' or '[' after ']'"));
                    }
                    field.push(c);
                    prev = Prev::Field;
                }
            }
        }

        match prev {
            Prev::Start => return Err(invalid("empty path")),
            Prev::Dot => return Err(invalid("trailing '.'")),
            Prev::Field => segments.push(Segment::Field(field)),
            Prev::Bracket => {}
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for FieldPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Empty container matching what the next segment expects
fn placeholder(next: Option<&Segment>) -> JsonValue {
    match next {
        Some(Segment::Field(_)) => JsonValue::Object(Map::new()),
        Some(Segment::Index(_)) => JsonValue::Array(Vec::new()),
        None => JsonValue::Null,
    }
}

fn descend<'a>(
    node: &'a mut JsonValue,
    segment: &Segment,
    next: Option<&Segment>,
) -> Option<&'a mut JsonValue> {
    match segment {
        Segment::Field(key) => {
            if node.is_null() {
                *node = JsonValue::Object(Map::new());
            }
            match node {
                JsonValue::Object(map) => {
                    Some(map.entry(key.clone()).or_insert_with(|| placeholder(next)))
                }
                _ => None,
            }
        }
        Segment::Index(index) => {
            if node.is_null() {
                *node = JsonValue::Array(Vec::new());
            }
            match node {
                JsonValue::Array(items) => {
                    if *index == items.len() {
                        items.push(placeholder(next));
                    }
                    items.get_mut(*index)
                }
                _ => None,
            }
        }
    }
}

/// Write `value` at `path`, mutating the document in place
///
/// On error the document may already hold containers created for the
/// segments before the failing one. Use [`set_values`] when that matters.
pub fn set_value(document: &mut JsonValue, path: &FieldPath, value: JsonValue) -> Result<()> {
    let segments = path.segments();
    let mut current = document;
    for (i, segment) in segments.iter().enumerate() {
        current = descend(current, segment, segments.get(i + 1)).ok_or_else(|| {
            CoreError::PathNotFound {
                path: path.to_string(),
            }
        })?;
    }
    *current = value;
    Ok(())
}

/// Write the same value at every path, all or nothing
pub fn set_values(document: &mut JsonValue, paths: &[FieldPath], value: &JsonValue) -> Result<()> {
    let mut scratch = document.clone();
    for path in paths {
        set_value(&mut scratch, path, value.clone())?;
    }
    *document = scratch;
    Ok(())
}

/// Decode a raw parameter payload and write it at every field path
///
/// Paths are parsed and the value decoded before the document is touched.
pub fn inject(
    document: &mut JsonValue,
    parameter: &str,
    ty: ParameterType,
    raw: &RawProperty,
    field_paths: &[String],
) -> Result<()> {
    let paths = field_paths
        .iter()
        .map(|p| FieldPath::parse(p))
        .collect::<Result<Vec<_>>>()?;
    let value = ParameterValue::decode(parameter, ty, raw)?;
    set_values(document, &paths, &value.to_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment() -> JsonValue {
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "deployment" },
            "spec": {
                "selector": { "matchLabels": { "app": "web" } },
                "template": {
                    "spec": {
                        "containers": [
                            { "name": "web", "image": "nginx", "ports": [{ "containerPort": 80 }] }
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn test_parse_dotted_path() {
        let path = FieldPath::parse("spec.template.spec.containers[0].image").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Field("spec".into()),
                Segment::Field("template".into()),
                Segment::Field("spec".into()),
                Segment::Field("containers".into()),
                Segment::Index(0),
                Segment::Field("image".into()),
            ]
        );
    }

    #[test]
    fn test_parse_quoted_key() {
        let path = FieldPath::parse("spec.selector.matchLabels['app.ketch.io/component']").unwrap();
        assert_eq!(
            path.segments().last(),
            Some(&Segment::Field("app.ketch.io/component".into()))
        );

        let double = FieldPath::parse(r#"metadata.labels["a.b"]"#).unwrap();
        assert_eq!(double.segments().len(), 3);
    }

    #[test]
    fn test_parse_consecutive_selectors() {
        let path = FieldPath::parse("matrix[1][2]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Field("matrix".into()),
                Segment::Index(1),
                Segment::Index(2)
            ]
        );
    }

    #[test]
    fn test_parse_invalid_paths() {
        for bad in ["", ".spec", "spec.", "spec..name", "a[x]", "a[0", "a['b'", "a[0]b", "a.[0]", "a]"] {
            let err = FieldPath::parse(bad).unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidFieldPath { .. }),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_set_existing_field() {
        let mut doc = deployment();
        let path = FieldPath::parse("spec.template.spec.containers[0].image").unwrap();
        set_value(&mut doc, &path, json!("me/my-frontend:1.2.3")).unwrap();
        assert_eq!(
            doc["spec"]["template"]["spec"]["containers"][0]["image"],
            "me/my-frontend:1.2.3"
        );
    }

    #[test]
    fn test_set_quoted_label() {
        let mut doc = deployment();
        let path = FieldPath::parse("spec.selector.matchLabels['app.ketch.io/component']").unwrap();
        set_value(&mut doc, &path, json!("frontend")).unwrap();
        assert_eq!(
            doc["spec"]["selector"]["matchLabels"]["app.ketch.io/component"],
            "frontend"
        );
        assert_eq!(doc["spec"]["selector"]["matchLabels"]["app"], "web");
    }

    #[test]
    fn test_set_creates_missing_maps() {
        let mut doc = deployment();
        let path = FieldPath::parse("metadata.labels.app").unwrap();
        set_value(&mut doc, &path, json!("hello-world")).unwrap();
        assert_eq!(doc["metadata"]["labels"]["app"], "hello-world");
        assert_eq!(doc["metadata"]["name"], "deployment");
    }

    #[test]
    fn test_set_creates_missing_list() {
        let mut doc = json!({ "spec": {} });
        let path = FieldPath::parse("spec.args[0]").unwrap();
        set_value(&mut doc, &path, json!("--verbose")).unwrap();
        assert_eq!(doc, json!({ "spec": { "args": ["--verbose"] } }));
    }

    #[test]
    fn test_set_appends_at_list_end() {
        let mut doc = deployment();
        let path = FieldPath::parse("spec.template.spec.containers[0].ports[1].containerPort").unwrap();
        set_value(&mut doc, &path, json!(443)).unwrap();
        let ports = &doc["spec"]["template"]["spec"]["containers"][0]["ports"];
        assert_eq!(ports[0]["containerPort"], 80);
        assert_eq!(ports[1]["containerPort"], 443);
    }

    #[test]
    fn test_index_past_end_is_not_found() {
        let mut doc = deployment();
        let path = FieldPath::parse("spec.template.spec.containers[3].image").unwrap();
        let err = set_value(&mut doc, &path, json!("x")).unwrap_err();
        assert!(err.to_string().contains("path not found"));
    }

    #[test]
    fn test_field_of_scalar_is_not_found() {
        let mut doc = deployment();
        let path = FieldPath::parse("kind.name").unwrap();
        assert!(matches!(
            set_value(&mut doc, &path, json!("x")),
            Err(CoreError::PathNotFound { .. })
        ));
    }

    #[test]
    fn test_index_into_map_is_not_found() {
        let mut doc = deployment();
        let path = FieldPath::parse("metadata[0]").unwrap();
        assert!(set_value(&mut doc, &path, json!("x")).is_err());
    }

    #[test]
    fn test_set_values_fans_out() {
        let mut doc = deployment();
        let paths = vec![
            FieldPath::parse("metadata.name").unwrap(),
            FieldPath::parse("spec.template.spec.containers[0].name").unwrap(),
        ];
        set_values(&mut doc, &paths, &json!("frontend")).unwrap();
        assert_eq!(doc["metadata"]["name"], "frontend");
        assert_eq!(doc["spec"]["template"]["spec"]["containers"][0]["name"], "frontend");
    }

    #[test]
    fn test_set_values_is_all_or_nothing() {
        let mut doc = deployment();
        let before = doc.clone();
        let paths = vec![
            FieldPath::parse("metadata.name").unwrap(),
            FieldPath::parse("kind.broken").unwrap(),
        ];
        assert!(set_values(&mut doc, &paths, &json!("frontend")).is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_inject_number_and_bool() {
        let mut doc = json!({ "spec": { "decimal": 1.1, "required": false } });
        inject(
            &mut doc,
            "decimal",
            ParameterType::Number,
            &RawProperty::from("2.1"),
            &["spec.decimal".to_string()],
        )
        .unwrap();
        inject(
            &mut doc,
            "required",
            ParameterType::Bool,
            &RawProperty::from("true"),
            &["spec.required".to_string()],
        )
        .unwrap();
        assert_eq!(doc, json!({ "spec": { "decimal": 2.1, "required": true } }));
    }

    #[test]
    fn test_inject_rejects_malformed_value_before_writing() {
        let mut doc = json!({ "spec": { "replicas": 1 } });
        let before = doc.clone();
        let result = inject(
            &mut doc,
            "replicas",
            ParameterType::Number,
            &RawProperty::from("three"),
            &["spec.replicas".to_string()],
        );
        assert!(result.is_err());
        assert_eq!(doc, before);
    }
}
