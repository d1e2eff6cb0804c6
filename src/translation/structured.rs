//! JSON clause representation returned by the structured strategy.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TranslationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuredKind {
    Fact,
    Rule,
    Query,
}

/// A predicate applied to arguments, e.g. `{"predicate":"bird","args":["X"]}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredAtom {
    pub predicate: String,
    pub args: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredClause {
    #[serde(rename = "type")]
    pub kind: StructuredKind,
    pub head: StructuredAtom,
    #[serde(default)]
    pub body: Option<Vec<StructuredAtom>>,
}

/// Returns the outermost `{...}` span of `raw`, skipping any prose or code
/// fences around it.
#[must_use]
pub fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

fn malformed(reason: impl Into<String>, raw: &str) -> TranslationError {
    TranslationError::MalformedOutput {
        reason: reason.into(),
        raw: raw.to_string(),
    }
}

fn render_arg(arg: &Value, raw: &str) -> Result<String, TranslationError> {
    match arg {
        Value::String(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(malformed(format!("unsupported argument `{other}`"), raw)),
    }
}

fn render_atom(atom: &StructuredAtom, raw: &str) -> Result<String, TranslationError> {
    let predicate = atom.predicate.trim();
    if predicate.is_empty() {
        return Err(malformed("empty predicate", raw));
    }
    if atom.args.is_empty() {
        return Ok(predicate.to_string());
    }
    let args = atom
        .args
        .iter()
        .map(|arg| render_arg(arg, raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("{predicate}({})", args.join(", ")))
}

impl StructuredClause {
    /// Renders the clause as Prolog text: `p(a, b).`, `h :- b1, b2.` or `p(a)`.
    ///
    /// # Errors
    /// Returns [`TranslationError::MalformedOutput`] when a rule has no body
    /// or an argument cannot be rendered.
    pub fn render(&self, raw: &str) -> Result<String, TranslationError> {
        let head = render_atom(&self.head, raw)?;
        match self.kind {
            StructuredKind::Fact => Ok(format!("{head}.")),
            StructuredKind::Query => Ok(head),
            StructuredKind::Rule => {
                let body = match self.body.as_deref() {
                    Some(body) if !body.is_empty() => body,
                    _ => return Err(malformed("rule without a body", raw)),
                };
                let goals = body
                    .iter()
                    .map(|goal| render_atom(goal, raw))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{head} :- {}.", goals.join(", ")))
            }
        }
    }
}

/// Parses raw structured-strategy output into Prolog text.
///
/// # Errors
/// Returns [`TranslationError::MalformedOutput`] carrying the raw text when no
/// JSON object is present or required fields are missing.
pub fn to_prolog(raw: &str) -> Result<String, TranslationError> {
    let json = extract_json(raw).ok_or_else(|| malformed("no JSON object found", raw))?;
    let clause: StructuredClause =
        serde_json::from_str(json).map_err(|err| malformed(err.to_string(), raw))?;
    clause.render(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn renders_each_clause_kind() {
        let fact = to_prolog(r#"{"type":"fact","head":{"predicate":"likes","args":["alice","pizza"]}}"#)
            .expect("fact");
        assert_snapshot!(fact, @"likes(alice, pizza).");

        let rule = to_prolog(
            r#"```json
{"type":"rule","head":{"predicate":"has_wings","args":["X"]},"body":[{"predicate":"bird","args":["X"]},{"predicate":"adult","args":["X"]}]}
```"#,
        )
        .expect("rule");
        assert_snapshot!(rule, @"has_wings(X) :- bird(X), adult(X).");

        let query = to_prolog(r#"{"type":"query","head":{"predicate":"age","args":["tweety",3]}}"#)
            .expect("query");
        assert_snapshot!(query, @"age(tweety, 3)");
    }

    #[test]
    fn missing_fields_are_malformed() {
        let raw = r#"{"type":"fact","head":{"args":["tweety"]}}"#;
        let err = to_prolog(raw).expect_err("missing predicate");
        assert!(matches!(err, TranslationError::MalformedOutput { raw: ref text, .. } if text == raw));
    }

    #[test]
    fn rule_without_body_is_malformed() {
        let err = to_prolog(r#"{"type":"rule","head":{"predicate":"p","args":["X"]}}"#)
            .expect_err("no body");
        assert!(matches!(err, TranslationError::MalformedOutput { .. }));
    }

    #[test]
    fn prose_without_json_is_malformed() {
        assert!(to_prolog("bird(tweety).").is_err());
        assert_eq!(extract_json("x } y {"), None);
    }
}
