//! CFI (Canonical Fragment Identifier) types
//!
//! Parsed CFIs are plain values: they serialize without reference to any
//! document and compare structurally.
//!
//! Format: epubcfi(/6/4[chap01ref]!/4[body01]/10[para05]/3:10)
//!
//! Reference: <https://idpf.org/epub/linking/cfi/epub-cfi.html>

use serde::{Deserialize, Serialize};
use std::fmt;

use super::escape::escape;

/// Tie-break direction for a location sitting on a boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideBias {
    Before,
    After,
}

impl SideBias {
    /// The single-letter code used inside `[;s=...]`
    pub fn code(self) -> char {
        match self {
            SideBias::Before => 'b',
            SideBias::After => 'a',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "b" => Some(SideBias::Before),
            "a" => Some(SideBias::After),
            _ => None,
        }
    }
}

/// Text expected next to the addressed character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextLocationAssertion {
    /// `[text]`: matched literally, the location is the match start
    Plain(String),
    /// `[pre,post]`: the location is the character between both halves
    Context {
        pre: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        post: Option<String>,
    },
}

/// Spatial position for images (`@x:y`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spatial {
    pub x: f64,
    pub y: f64,
}

/// One `/N[...]` segment of a Part
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// CFI-space index (even = element, odd = text position)
    pub node_index: u32,
    #[serde(rename = "nodeID", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_location_assertion: Option<TextLocationAssertion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_bias: Option<SideBias>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<Spatial>,
}

/// Steps addressing a location within one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub steps: Vec<Step>,
}

/// Parts chained across documents (`!` separated)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub parts: Vec<Part>,
}

/// A simple range: shared prefix plus two divergent Step suffixes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub common_parts: Path,
    pub from_suffix: Vec<Step>,
    pub to_suffix: Vec<Step>,
}

/// The parsed form of a CFI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParsedCfi {
    Location(Path),
    Range(Range),
}

impl Step {
    /// Create a step addressing `node_index`
    pub fn new(node_index: u32) -> Self {
        Self {
            node_index,
            ..Self::default()
        }
    }

    /// Create a step with an ID assertion
    pub fn with_id(node_index: u32, id: impl Into<String>) -> Self {
        Self {
            node_index,
            node_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Set the character offset
    pub fn at_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether the index addresses an element slot
    pub fn is_element_index(&self) -> bool {
        self.node_index % 2 == 0
    }

    /// Whether any terminal-only qualifier is present
    pub fn has_qualifiers(&self) -> bool {
        self.offset.is_some()
            || self.text_location_assertion.is_some()
            || self.side_bias.is_some()
            || self.temporal.is_some()
            || self.spatial.is_some()
    }

    /// Drop every qualifier that only makes sense at a path terminus
    pub fn strip_qualifiers(&mut self) {
        self.offset = None;
        self.text_location_assertion = None;
        self.side_bias = None;
        self.temporal = None;
        self.spatial = None;
    }
}

impl Part {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }
}

impl Path {
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    /// Append steps to the final Part
    pub fn extend_last(&mut self, steps: &[Step]) {
        match self.parts.last_mut() {
            Some(last) => last.steps.extend_from_slice(steps),
            None => self.parts.push(Part::new(steps.to_vec())),
        }
    }
}

impl Range {
    /// The full start location
    pub fn from_path(&self) -> Path {
        let mut path = self.common_parts.clone();
        path.extend_last(&self.from_suffix);
        path
    }

    /// The full end location
    pub fn to_path(&self) -> Path {
        let mut path = self.common_parts.clone();
        path.extend_last(&self.to_suffix);
        path
    }
}

// Display implementations for serialization

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.node_index)?;
        if let Some(ref id) = self.node_id {
            write!(f, "[{}]", escape(id))?;
        }
        if let Some(offset) = self.offset {
            write!(f, ":{}", offset)?;
        }
        if let Some(temporal) = self.temporal {
            write!(f, "~{}", temporal)?;
        }
        if let Some(ref spatial) = self.spatial {
            write!(f, "@{}:{}", spatial.x, spatial.y)?;
        }
        if self.text_location_assertion.is_some() || self.side_bias.is_some() {
            write!(f, "[")?;
            match self.text_location_assertion {
                Some(TextLocationAssertion::Plain(ref text)) => write!(f, "{}", escape(text))?,
                Some(TextLocationAssertion::Context { ref pre, ref post }) => {
                    write!(f, "{},", escape(pre))?;
                    if let Some(post) = post {
                        write!(f, "{}", escape(post))?;
                    }
                }
                None => {}
            }
            if let Some(bias) = self.side_bias {
                write!(f, ";s={}", bias.code())?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "!")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl fmt::Display for ParsedCfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedCfi::Location(path) => write!(f, "epubcfi({})", path),
            ParsedCfi::Range(range) => {
                write!(f, "epubcfi({},", range.common_parts)?;
                for step in &range.from_suffix {
                    write!(f, "{}", step)?;
                }
                write!(f, ",")?;
                for step in &range.to_suffix {
                    write!(f, "{}", step)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_path_display() {
        let path = Path::new(vec![
            Part::new(vec![Step::new(6), Step::with_id(4, "chap01ref")]),
            Part::new(vec![Step::new(4), Step::new(2), Step::new(1).at_offset(42)]),
        ]);

        assert_eq!(
            ParsedCfi::Location(path).to_string(),
            "epubcfi(/6/4[chap01ref]!/4/2/1:42)"
        );
    }

    #[test]
    fn test_step_display_escapes_id() {
        let step = Step::with_id(2, "a[b]");
        assert_eq!(step.to_string(), "/2[a^[b^]]");
    }

    #[test]
    fn test_step_display_assertion_and_bias() {
        let mut step = Step::new(3).at_offset(5);
        step.text_location_assertion = Some(TextLocationAssertion::Context {
            pre: "yes".to_string(),
            post: Some("sir".to_string()),
        });
        step.side_bias = Some(SideBias::After);
        assert_eq!(step.to_string(), "/3:5[yes,sir;s=a]");
    }

    #[test]
    fn test_range_endpoints() {
        let range = Range {
            common_parts: Path::new(vec![Part::new(vec![Step::new(4)])]),
            from_suffix: vec![Step::new(2), Step::new(1).at_offset(3)],
            to_suffix: vec![Step::new(4), Step::new(1).at_offset(8)],
        };

        assert_eq!(range.from_path().to_string(), "/4/2/1:3");
        assert_eq!(range.to_path().to_string(), "/4/4/1:8");
        assert_eq!(
            ParsedCfi::Range(range).to_string(),
            "epubcfi(/4,/2/1:3,/4/1:8)"
        );
    }

    #[test]
    fn test_step_serializes_camel_case() {
        let step = Step::with_id(4, "body01").at_offset(7);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["nodeIndex"], 4);
        assert_eq!(json["nodeID"], "body01");
        assert_eq!(json["offset"], 7);
        assert!(json.get("temporal").is_none());
    }
}
