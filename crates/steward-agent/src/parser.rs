//! Plan types and the plan parser.
//!
//! Models asked for "JSON only" still wrap the object in prose, emit a draft
//! and then a corrected version, leave trailing commas or add comments.  The
//! parser recovers a [`Plan`] from all of that and never fails: unusable
//! output turns into an empty plan with an explanatory rationale.
//!
//! Candidate objects are found with a plain brace-depth counter that does not
//! know about JSON strings, so a brace inside a string value shifts the
//! depth.  Stray closing braces at depth zero are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Rationale of the plan returned when the text holds no `{...}` block.
pub const NO_JSON_RATIONALE: &str = "no valid JSON found";

/// Rationale of the plan returned when the selected block does not parse.
pub const INVALID_JSON_RATIONALE: &str = "invalid JSON";

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// A single tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Tool name as written by the model; resolved through the registry.
    pub tool: String,
    /// Free-form input passed to the tool.
    pub input: String,
}

impl PlanStep {
    pub fn new(tool: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            input: input.into(),
        }
    }
}

/// An ordered list of tool invocations plus the model's explanation.
///
/// A plan with no steps means "answer directly".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub rationale: String,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>, rationale: impl Into<String>) -> Self {
        Self {
            rationale: rationale.into(),
            steps,
        }
    }

    /// A plan without steps.
    pub fn empty(rationale: impl Into<String>) -> Self {
        Self::new(Vec::new(), rationale)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Outcome of parsing model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanParse {
    /// A plan was recovered from the last JSON block.
    Parsed(Plan),
    /// The text contained no balanced `{...}` block.
    NoJson,
    /// The last block was not a valid plan object.
    Invalid(String),
}

impl PlanParse {
    /// Collapse into a plan, substituting an empty plan for failures.
    pub fn into_plan(self) -> Plan {
        match self {
            Self::Parsed(plan) => plan,
            Self::NoJson => Plan::empty(NO_JSON_RATIONALE),
            Self::Invalid(_) => Plan::empty(INVALID_JSON_RATIONALE),
        }
    }
}

/// Parse raw model output into a plan.
pub fn parse_plan(text: &str) -> PlanParse {
    let Some(block) = extract_json_blocks(text).pop() else {
        return PlanParse::NoJson;
    };

    let cleaned = sanitize_json(block);
    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(v) => v,
        Err(e) => return PlanParse::Invalid(e.to_string()),
    };

    match plan_from_value(&value) {
        Ok(plan) => PlanParse::Parsed(plan),
        Err(reason) => PlanParse::Invalid(reason),
    }
}

/// Every maximal balanced `{...}` span in `text`, in order of appearance.
pub fn extract_json_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, b) in text.bytes().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    blocks.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    blocks
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

fn string_field(obj: &Map<String, Value>, name: &str) -> Result<String, String> {
    match field(obj, name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(format!("`{name}` must be a string, got {other}")),
    }
}

fn plan_from_value(value: &Value) -> Result<Plan, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "plan must be a JSON object".to_owned())?;

    let rationale = string_field(obj, "rationale")?;

    let steps = match field(obj, "steps") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                let step = item
                    .as_object()
                    .ok_or_else(|| "each step must be a JSON object".to_owned())?;
                Ok(PlanStep {
                    tool: string_field(step, "tool")?,
                    input: string_field(step, "input")?,
                })
            })
            .collect::<Result<Vec<_>, String>>()?,
        Some(_) => return Err("`steps` must be an array".into()),
    };

    Ok(Plan { rationale, steps })
}

/// Strip `//` and `/* */` comments and trailing commas outside strings.
fn sanitize_json(raw: &str) -> String {
    let without_comments = strip_comments(raw);
    strip_trailing_commas(&without_comments)
}

fn strip_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match (c, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

fn strip_trailing_commas(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().copied().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(text: &str) -> Plan {
        parse_plan(text).into_plan()
    }

    #[test]
    fn no_braces_gives_empty_plan() {
        for text in ["", "I will just answer.", "}{", "no json ] here"] {
            assert_eq!(parse_plan(text), PlanParse::NoJson, "{text:?}");
            let p = plan(text);
            assert!(p.is_empty());
            assert_eq!(p.rationale, NO_JSON_RATIONALE);
        }
    }

    #[test]
    fn prose_around_object() {
        let text = r#"Sure! Here is the plan:
{"rationale":"look it up","steps":[{"tool":"WebSearch","input":"rust 2024 edition"}]}
Let me know if you need more."#;

        let p = plan(text);
        assert_eq!(p.rationale, "look it up");
        assert_eq!(p.steps, vec![PlanStep::new("WebSearch", "rust 2024 edition")]);
    }

    #[test]
    fn last_object_wins() {
        let text = r#"Draft: {"rationale":"draft","steps":[{"tool":"A","input":"1"}]}
Final: {"rationale":"final","steps":[{"tool":"B","input":"2"},{"tool":"C","input":"3"}]}"#;

        let p = plan(text);
        assert_eq!(p.rationale, "final");
        assert_eq!(
            p.steps,
            vec![PlanStep::new("B", "2"), PlanStep::new("C", "3")]
        );
    }

    #[test]
    fn nested_objects_are_one_block() {
        let blocks = extract_json_blocks(r#"x {"a":{"b":{}}} y {"c":1}"#);
        assert_eq!(blocks, vec![r#"{"a":{"b":{}}}"#, r#"{"c":1}"#]);
    }

    #[test]
    fn stray_closing_brace_is_ignored() {
        let p = plan(r#"} oops } {"rationale":"ok","steps":[]}"#);
        assert_eq!(p.rationale, "ok");
        assert!(p.is_empty());
    }

    #[test]
    fn brace_inside_string_shifts_depth() {
        // The `{` inside the string keeps the object from closing.
        assert_eq!(
            parse_plan(r#"{"rationale":"use {x","steps":[]}"#),
            PlanParse::NoJson
        );
    }

    #[test]
    fn trailing_commas_and_comments() {
        let text = r#"{
            // why
            "rationale": "search, then answer", /* inline */
            "steps": [
                {"tool": "WebSearch", "input": "a // not a comment",},
            ],
        }"#;

        let p = plan(text);
        assert_eq!(p.rationale, "search, then answer");
        assert_eq!(p.steps, vec![PlanStep::new("WebSearch", "a // not a comment")]);
    }

    #[test]
    fn field_names_are_case_insensitive() {
        let p = plan(r#"{"Rationale":"r","STEPS":[{"Tool":"Calendar","INPUT":"today"}]}"#);
        assert_eq!(p.rationale, "r");
        assert_eq!(p.steps, vec![PlanStep::new("Calendar", "today")]);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let p = plan(r#"{"steps":[{"tool":"WebSearch"},{"input":"x"},{}]}"#);
        assert_eq!(p.rationale, "");
        assert_eq!(
            p.steps,
            vec![
                PlanStep::new("WebSearch", ""),
                PlanStep::new("", "x"),
                PlanStep::new("", ""),
            ]
        );

        let p = plan(r#"{"rationale":null}"#);
        assert!(p.is_empty());
        assert_eq!(p.rationale, "");
    }

    #[test]
    fn malformed_block_is_invalid() {
        for text in [
            r#"{"rationale": "unterminated}"#,
            r#"{rationale: bare}"#,
            r#"{"steps": "WebSearch"}"#,
            r#"{"steps": [{"tool": 42, "input": "x"}]}"#,
            r#"{"steps": ["WebSearch"]}"#,
        ] {
            assert!(
                matches!(parse_plan(text), PlanParse::Invalid(_)),
                "{text:?}"
            );
            let p = plan(text);
            assert!(p.is_empty());
            assert_eq!(p.rationale, INVALID_JSON_RATIONALE);
        }
    }

    #[test]
    fn invalid_last_block_does_not_fall_back_to_earlier() {
        let text = r#"{"rationale":"good","steps":[]} then {broken}"#;
        assert_eq!(plan(text).rationale, INVALID_JSON_RATIONALE);
    }

    #[test]
    fn empty_steps_is_valid() {
        let parsed = parse_plan(r#"{"rationale":"direct","steps":[]}"#);
        assert_eq!(parsed, PlanParse::Parsed(Plan::empty("direct")));
    }

    #[test]
    fn serialized_plan_parses_back() {
        let original = Plan::new(
            vec![
                PlanStep::new("WebSearch", "weather \"Dhaka\"\ntomorrow"),
                PlanStep::new("Calendar", "free slots, next week"),
            ],
            "check, then schedule",
        );
        let json = serde_json::to_string_pretty(&original).unwrap();
        assert_eq!(plan(&format!("Plan:\n{json}\n")), original);
    }
}
