//! Built-in transform plugins (SPEC_FULL.md §4.D). Each operates on the stringified value
//! and passes through unchanged on malformed input.

use std::collections::HashMap;

use serde_json::Value;

use super::{TransformEngine, stringify};

/// `(value, params) -> value`, dispatched by name from the transform list. Mirrors the
/// original's `TransformPlugin` interface.
pub trait TransformPlugin: Send + Sync {
    fn transform(&self, value: &Value, params: Option<&HashMap<String, Value>>) -> Result<Value, String>;
}

pub(super) fn register_builtins(engine: &mut TransformEngine) {
    engine.register_plugin("format_cnpj", Box::new(FormatCnpj));
    engine.register_plugin("format_cpf", Box::new(FormatCpf));
    engine.register_plugin("format_cep", Box::new(FormatCep));
    engine.register_plugin("to_upper", Box::new(ToUpper));
    engine.register_plugin("to_lower", Box::new(ToLower));
    engine.register_plugin("trim", Box::new(Trim));
}

fn digits_only(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

fn format_grouped(digits: &str, len: usize, groups: &[(usize, usize)], sep: &str) -> Option<String> {
    if digits.len() != len {
        return None;
    }
    let parts: Vec<&str> = groups.iter().map(|&(start, end)| &digits[start..end]).collect();
    Some(parts.join(sep))
}

struct FormatCnpj;
impl TransformPlugin for FormatCnpj {
    fn transform(&self, value: &Value, _params: Option<&HashMap<String, Value>>) -> Result<Value, String> {
        let digits = digits_only(&stringify(value));
        if digits.len() != 14 {
            return Ok(value.clone());
        }
        let formatted = format!(
            "{}.{}.{}/{}-{}",
            &digits[0..2],
            &digits[2..5],
            &digits[5..8],
            &digits[8..12],
            &digits[12..14]
        );
        Ok(Value::String(formatted))
    }
}

struct FormatCpf;
impl TransformPlugin for FormatCpf {
    fn transform(&self, value: &Value, _params: Option<&HashMap<String, Value>>) -> Result<Value, String> {
        let digits = digits_only(&stringify(value));
        match format_grouped(&digits, 11, &[(0, 3), (3, 6), (6, 9)], ".") {
            Some(head) => Ok(Value::String(format!("{head}-{}", &digits[9..11]))),
            None => Ok(value.clone()),
        }
    }
}

struct FormatCep;
impl TransformPlugin for FormatCep {
    fn transform(&self, value: &Value, _params: Option<&HashMap<String, Value>>) -> Result<Value, String> {
        let digits = digits_only(&stringify(value));
        if digits.len() != 8 {
            return Ok(value.clone());
        }
        Ok(Value::String(format!("{}-{}", &digits[0..5], &digits[5..8])))
    }
}

struct ToUpper;
impl TransformPlugin for ToUpper {
    fn transform(&self, value: &Value, _params: Option<&HashMap<String, Value>>) -> Result<Value, String> {
        Ok(Value::String(stringify(value).to_uppercase()))
    }
}

struct ToLower;
impl TransformPlugin for ToLower {
    fn transform(&self, value: &Value, _params: Option<&HashMap<String, Value>>) -> Result<Value, String> {
        Ok(Value::String(stringify(value).to_lowercase()))
    }
}

struct Trim;
impl TransformPlugin for Trim {
    fn transform(&self, value: &Value, _params: Option<&HashMap<String, Value>>) -> Result<Value, String> {
        Ok(Value::String(stringify(value).trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cnpj_formats_fourteen_digits() {
        let result = FormatCnpj.transform(&Value::String("12345678000195".to_string()), None).unwrap();
        assert_eq!(result, "12.345.678/0001-95");
    }

    #[test]
    fn cnpj_passes_through_malformed_input() {
        let result = FormatCnpj.transform(&Value::String("abc".to_string()), None).unwrap();
        assert_eq!(result, "abc");
    }

    #[test]
    fn cpf_formats_eleven_digits() {
        let result = FormatCpf.transform(&Value::String("12345678901".to_string()), None).unwrap();
        assert_eq!(result, "123.456.789-01");
    }

    #[test]
    fn cep_formats_eight_digits() {
        let result = FormatCep.transform(&Value::String("01310100".to_string()), None).unwrap();
        assert_eq!(result, "01310-100");
    }

    #[test]
    fn trim_removes_surrounding_whitespace() {
        let result = Trim.transform(&Value::String("  hi  ".to_string()), None).unwrap();
        assert_eq!(result, "hi");
    }
}
