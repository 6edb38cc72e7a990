use semmap_model::{AttributeMapping, EntityType, Row, Value};

use crate::error::EvaluationError;
use crate::traits::ExpressionEvaluator;

/// Evaluates expressions that copy one source attribute.
///
/// Accepted forms are a bare attribute name (`length`) and the selector form
/// `$('length').value()`. An empty expression or `null` yields `Null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeReferenceEvaluator;

impl ExpressionEvaluator for AttributeReferenceEvaluator {
    fn evaluate(
        &self,
        mapping: &AttributeMapping,
        source_row: &Row,
        source_type: &EntityType,
        _depth: u32,
    ) -> Result<Value, EvaluationError> {
        let expression = mapping.algorithm.trim();
        if expression.is_empty() || expression == "null" {
            return Ok(Value::Null);
        }
        let name = referenced_attribute(expression)?;
        if !source_type.has_attribute(name) && !source_row.contains(name) {
            return Err(EvaluationError::UnknownSourceAttribute(name.to_string()));
        }
        Ok(source_row.value(name).clone())
    }
}

fn referenced_attribute(expression: &str) -> Result<&str, EvaluationError> {
    let invalid = |reason: &str| EvaluationError::InvalidExpression {
        expression: expression.to_string(),
        reason: reason.to_string(),
    };

    let Some(selector) = expression.strip_prefix("$(") else {
        let is_name = expression
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '#'));
        return if is_name {
            Ok(expression)
        } else {
            Err(invalid("expected an attribute name or $('name').value()"))
        };
    };

    let (quoted, rest) = selector
        .split_once(')')
        .ok_or_else(|| invalid("unclosed attribute selector"))?;
    let call = rest.trim().trim_end_matches(';').trim_end();
    if !call.is_empty() && call != ".value()" {
        return Err(invalid("only .value() is supported on a selector"));
    }
    let quoted = quoted.trim();
    let name = ['\'', '"']
        .into_iter()
        .find_map(|quote| {
            quoted
                .strip_prefix(quote)
                .and_then(|inner| inner.strip_suffix(quote))
        })
        .ok_or_else(|| invalid("attribute name must be quoted"))?;
    if name.is_empty() {
        return Err(invalid("attribute name is empty"));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use semmap_model::{Attribute, AttributeType};

    use super::*;

    fn source() -> (EntityType, Row) {
        let schema = EntityType::new("Gene")
            .with_attribute(Attribute::new("id", AttributeType::String))
            .with_attribute(Attribute::new("length", AttributeType::Long));
        let row = Row::new().with("id", "g1").with("length", 12_i64);
        (schema, row)
    }

    fn eval(expression: &str) -> Result<Value, EvaluationError> {
        let (schema, row) = source();
        let mapping = AttributeMapping::new("target").with_algorithm(expression);
        AttributeReferenceEvaluator.evaluate(&mapping, &row, &schema, 0)
    }

    #[test]
    fn bare_name_and_selector_forms() {
        assert_eq!(eval("length"), Ok(Value::Int(12)));
        assert_eq!(eval("$('length').value()"), Ok(Value::Int(12)));
        assert_eq!(eval("$(\"id\").value();"), Ok(Value::text("g1")));
        assert_eq!(eval("$('id')"), Ok(Value::text("g1")));
    }

    #[test]
    fn empty_and_null_expressions() {
        assert_eq!(eval(""), Ok(Value::Null));
        assert_eq!(eval("  null "), Ok(Value::Null));
    }

    #[test]
    fn unknown_source_attribute_fails() {
        assert_eq!(
            eval("height"),
            Err(EvaluationError::UnknownSourceAttribute("height".to_string()))
        );
    }

    #[test]
    fn malformed_expressions_fail() {
        for expression in ["$('length'", "$(length).value()", "$('length').map(x)", "a + b"] {
            assert!(
                matches!(eval(expression), Err(EvaluationError::InvalidExpression { .. })),
                "{expression}"
            );
        }
    }
}
