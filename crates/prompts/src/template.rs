//! Template strings with state interpolation and function calls.
//!
//! Syntax:
//! - `{{$temp.input}}` reads a value from turn state (missing → empty)
//! - `{{getWeather 'Seattle' today}}` invokes a prompt function; quoted
//!   arguments may contain spaces and `}}`
//!
//! Templates are parsed once at construction so malformed input fails
//! early; resolution happens on every render.

use crate::section::RenderContext;
use promptloom_core::{Result, TemplateError};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Variable(String),
    Function { name: String, args: Vec<String> },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

impl Template {
    pub fn parse(source: &str) -> std::result::Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                parts.push(Part::Text(rest[..start].to_string()));
            }
            let open = offset + start;
            let after_open = &rest[start + 2..];
            // An unbalanced quote falls back to the first `}}` so the
            // expression reports the quote error.
            let end = find_close(after_open)
                .or_else(|| after_open.find("}}"))
                .ok_or(TemplateError::Unterminated { offset: open })?;

            parts.push(parse_expression(after_open[..end].trim(), open)?);

            let consumed = start + 2 + end + 2;
            rest = &rest[consumed..];
            offset += consumed;
        }
        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    /// The original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the template has no `{{...}}` expressions.
    pub fn is_static(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, Part::Text(_)))
    }

    /// Names of the functions this template calls.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::Function { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Resolve every expression against the render context.
    pub async fn render(&self, ctx: &RenderContext<'_>) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Variable(path) => match ctx.state.get_value(path)? {
                    Some(value) => out.push_str(&value_to_text(value)),
                    None => debug!(path = %path, "Template variable not set, rendering empty"),
                },
                Part::Function { name, args } => {
                    let value = ctx.functions.invoke(name, args, ctx.state).await?;
                    out.push_str(&value_to_text(value));
                }
            }
        }
        Ok(out)
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_expression(expression: &str, offset: usize) -> std::result::Result<Part, TemplateError> {
    if expression.is_empty() {
        return Err(TemplateError::EmptyExpression { offset });
    }

    if let Some(path) = expression.strip_prefix('$') {
        let path = path.trim();
        if path.is_empty() {
            return Err(TemplateError::EmptyVariable { offset });
        }
        return Ok(Part::Variable(path.to_string()));
    }

    let mut words = split_args(expression)?.into_iter();
    let name = words.next().ok_or(TemplateError::EmptyExpression { offset })?;
    Ok(Part::Function {
        name,
        args: words.collect(),
    })
}

/// Byte offset of the `}}` closing an expression, skipping quoted words.
fn find_close(expression: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for (i, c) in expression.char_indices() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                in_word = false;
            }
            Some(_) => {}
            None if expression[i..].starts_with("}}") => return Some(i),
            None if matches!(c, '\'' | '"' | '`') && !in_word => quote = Some(c),
            None => in_word = !c.is_whitespace(),
        }
    }
    None
}

/// Whitespace separated words; `'`, `"` and `` ` `` quote words with spaces.
fn split_args(expression: &str) -> std::result::Result<Vec<String>, TemplateError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in expression.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                words.push(std::mem::take(&mut current));
                in_word = false;
            }
            Some(_) => current.push(c),
            None if matches!(c, '\'' | '"' | '`') && !in_word => quote = Some(c),
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(TemplateError::UnterminatedQuote {
            expression: expression.to_string(),
        });
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::EstimateTokenizer;
    use promptloom_core::{Error, FunctionRegistry, MemoryState, ResolutionError, TurnState};
    use serde_json::json;

    fn parts(source: &str) -> Vec<Part> {
        Template::parse(source).unwrap().parts
    }

    #[test]
    fn plain_text_is_static() {
        let template = Template::parse("Hello World").unwrap();
        assert!(template.is_static());
        assert_eq!(template.parts, vec![Part::Text("Hello World".into())]);
    }

    #[test]
    fn variables_and_functions_are_split_out() {
        assert_eq!(
            parts("Hi {{ $user.name }}, it is {{weather 'New York' today}}."),
            vec![
                Part::Text("Hi ".into()),
                Part::Variable("user.name".into()),
                Part::Text(", it is ".into()),
                Part::Function {
                    name: "weather".into(),
                    args: vec!["New York".into(), "today".into()],
                },
                Part::Text(".".into()),
            ]
        );
    }

    #[test]
    fn quoted_empty_argument_is_kept() {
        assert_eq!(
            parts("{{f \"\" x}}"),
            vec![Part::Function {
                name: "f".into(),
                args: vec![String::new(), "x".into()],
            }]
        );
    }

    #[test]
    fn closing_braces_inside_quotes_are_arguments() {
        assert_eq!(
            parts("a {{f '}}' \"x }} y\"}} b"),
            vec![
                Part::Text("a ".into()),
                Part::Function {
                    name: "f".into(),
                    args: vec!["}}".into(), "x }} y".into()],
                },
                Part::Text(" b".into()),
            ]
        );
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert_eq!(
            Template::parse("Hello {{name"),
            Err(TemplateError::Unterminated { offset: 6 })
        );
        assert_eq!(
            Template::parse("a {{  }} b"),
            Err(TemplateError::EmptyExpression { offset: 2 })
        );
        assert_eq!(
            Template::parse("{{$}}"),
            Err(TemplateError::EmptyVariable { offset: 0 })
        );
        assert!(matches!(
            Template::parse("{{f 'open}}"),
            Err(TemplateError::UnterminatedQuote { .. })
        ));
    }

    #[tokio::test]
    async fn render_resolves_state_and_functions() {
        let state = MemoryState::new()
            .with_value("user.name", json!("Ada"))
            .with_value("temp.count", json!(3));
        let mut functions = FunctionRegistry::new();
        functions.register_fn("shout", |args, _state| Ok(json!(args.join(" ").to_uppercase())));
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let template = Template::parse("{{$user.name}} has {{$temp.count}}: {{shout hi there}}").unwrap();
        assert_eq!(template.render(&ctx).await.unwrap(), "Ada has 3: HI THERE");
    }

    #[tokio::test]
    async fn missing_variable_renders_empty() {
        let state = MemoryState::new();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let template = Template::parse("[{{$temp.input}}]").unwrap();
        assert_eq!(template.render(&ctx).await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn unknown_function_fails_the_render() {
        let state = MemoryState::new();
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&state, &functions, &tokenizer);

        let template = Template::parse("{{missing}}").unwrap();
        let err = template.render(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Resolution(ResolutionError::FunctionNotFound(name)) if name == "missing"
        ));
    }

    struct BrokenState;

    impl TurnState for BrokenState {
        fn get_value(&self, path: &str) -> std::result::Result<Option<Value>, ResolutionError> {
            Err(ResolutionError::StateUnavailable {
                path: path.to_string(),
                reason: "store offline".into(),
            })
        }
    }

    #[tokio::test]
    async fn failing_state_lookup_fails_the_render() {
        let functions = FunctionRegistry::new();
        let tokenizer = EstimateTokenizer::new();
        let ctx = RenderContext::new(&BrokenState, &functions, &tokenizer);

        let template = Template::parse("{{$temp.input}}").unwrap();
        let err = template.render(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("store offline"));
    }

    #[test]
    fn structured_values_render_as_json() {
        assert_eq!(value_to_text(json!(null)), "");
        assert_eq!(value_to_text(json!("plain")), "plain");
        assert_eq!(value_to_text(json!({"a": 1})), r#"{"a":1}"#);
    }
}
