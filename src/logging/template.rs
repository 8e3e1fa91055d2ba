//! Record layout
//!
//! A line template such as `[{timestamp}] {message}` is parsed once at configuration
//! time so that rendering a record can never fail.

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Timestamp,
    Message,
}

/// Parsed line template. `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTemplate {
    segments: Vec<Segment>,
}

impl LineTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        if c == '{' {
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(ConfigError::UnbalancedBrace { position: pos });
                    }
                    let segment = match name.as_str() {
                        "timestamp" => Segment::Timestamp,
                        "message" => Segment::Message,
                        _ => return Err(ConfigError::UnknownPlaceholder { name }),
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => return Err(ConfigError::UnbalancedBrace { position: pos }),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Render one record (without the trailing newline)
    pub fn render(&self, timestamp: &str, message: &str) -> String {
        let mut out = String::with_capacity(timestamp.len() + message.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Timestamp => out.push_str(timestamp),
                Segment::Message => out.push_str(message),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_template() {
        let template = LineTemplate::parse("[{timestamp}] {message}").unwrap();
        assert_eq!(template.render("12:00:00", "hello"), "[12:00:00] hello");
    }

    #[test]
    fn test_render_escaped_braces_and_repeats() {
        let template = LineTemplate::parse("{{{timestamp}}} {message} | {message}").unwrap();
        assert_eq!(template.render("t", "m"), "{t} m | m");
    }

    #[test]
    fn test_message_is_not_reinterpreted() {
        let template = LineTemplate::parse("{message}").unwrap();
        assert_eq!(template.render("t", "{timestamp}"), "{timestamp}");
    }

    #[test]
    fn test_template_without_placeholders() {
        let template = LineTemplate::parse("static").unwrap();
        assert_eq!(template.render("t", "m"), "static");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            LineTemplate::parse("{level}: {message}"),
            Err(ConfigError::UnknownPlaceholder { name }) if name == "level"
        ));
        assert!(matches!(
            LineTemplate::parse("[{timestamp] {message}"),
            Err(ConfigError::UnbalancedBrace { position: 1 })
        ));
        assert!(matches!(
            LineTemplate::parse("{message} }"),
            Err(ConfigError::UnbalancedBrace { position: 10 })
        ));
        assert!(matches!(
            LineTemplate::parse("{message"),
            Err(ConfigError::UnbalancedBrace { position: 0 })
        ));
    }
}
