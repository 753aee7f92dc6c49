//! The path-expression subset the gateway supports: `$` root, `.field` member access,
//! `[n]` array index, `[*]` array wildcard, and dotted chains thereof (SPEC_FULL.md §4.D).
//! This is deliberately not a full JSONPath implementation — only the subset the original's
//! `ojg`-based mapping expressions actually exercise.

use serde_json::Value;

use super::TransformError;

#[derive(Debug, Clone)]
enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
}

/// Evaluates `expr` against `tree`, returning zero, one, or many matches. A `[*]` segment
/// anywhere in the chain expands to the many-match case for every remaining suffix.
pub fn evaluate<'a>(tree: &'a Value, expr: &str) -> Result<Vec<&'a Value>, TransformError> {
    let segments = parse(expr)?;
    let mut current = vec![tree];
    for segment in &segments {
        let mut next = Vec::new();
        for value in current {
            match segment {
                Segment::Field(name) => {
                    if let Some(found) = value.get(name) {
                        next.push(found);
                    }
                }
                Segment::Index(i) => {
                    if let Some(found) = value.get(*i) {
                        next.push(found);
                    }
                }
                Segment::Wildcard => {
                    if let Some(array) = value.as_array() {
                        next.extend(array.iter());
                    }
                }
            }
        }
        current = next;
    }
    Ok(current)
}

fn parse(expr: &str) -> Result<Vec<Segment>, TransformError> {
    let rest = expr
        .strip_prefix('$')
        .ok_or_else(|| TransformError::InvalidPath(expr.to_string()))?;

    let mut segments = Vec::new();
    let mut chars = rest.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                let mut name = String::new();
                while let Some(&c2) = chars.peek() {
                    if c2 == '.' || c2 == '[' {
                        break;
                    }
                    name.push(c2);
                    chars.next();
                }
                if name.is_empty() {
                    return Err(TransformError::InvalidPath(expr.to_string()));
                }
                segments.push(Segment::Field(name));
            }
            '[' => {
                chars.next();
                let mut inner = String::new();
                for c2 in chars.by_ref() {
                    if c2 == ']' {
                        break;
                    }
                    inner.push(c2);
                }
                if inner == "*" {
                    segments.push(Segment::Wildcard);
                } else {
                    let index: usize = inner
                        .parse()
                        .map_err(|_| TransformError::InvalidPath(expr.to_string()))?;
                    segments.push(Segment::Index(index));
                }
            }
            _ => return Err(TransformError::InvalidPath(expr.to_string())),
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_field() {
        let tree = json!({"cep": "01310100"});
        let matches = evaluate(&tree, "$.cep").unwrap();
        assert_eq!(matches, vec![&json!("01310100")]);
    }

    #[test]
    fn array_index() {
        let tree = json!({"items": ["a", "b"]});
        let matches = evaluate(&tree, "$.items[0]").unwrap();
        assert_eq!(matches, vec![&json!("a")]);
    }

    #[test]
    fn wildcard_then_field() {
        let tree = json!({"items": [{"sku": "A"}, {"sku": "B"}]});
        let matches = evaluate(&tree, "$.items[*].sku").unwrap();
        assert_eq!(matches, vec![&json!("A"), &json!("B")]);
    }

    #[test]
    fn zero_matches_is_not_an_error() {
        let tree = json!({"cep": "01310100"});
        let matches = evaluate(&tree, "$.missing").unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn malformed_expression_is_rejected() {
        let tree = json!({});
        assert!(evaluate(&tree, "cep").is_err());
    }
}
