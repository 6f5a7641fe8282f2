//! Index-name templates.
//!
//! An index name like `monitors-%{[agent.version]}-%{+yyyy.MM.dd}` mixes
//! literal text, references to agent-identity fields, and date segments
//! driven by each event's timestamp. Compilation resolves the field
//! references up front against the agent's static fields, so rendering a
//! name needs nothing but a timestamp and allocates one string.

use chrono::{DateTime, Utc};

use crate::error::TemplateError;
use crate::event::Fields;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// A chrono format string translated from the template's date tokens.
    Date(String),
}

/// A compiled, timestamp-substitutable index-name template.
///
/// Constructed once per monitor at creation time, immutable afterwards, and
/// reused for every event the monitor emits. Compilation is pure: the same
/// template and static fields always compile to an equal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl IndexTemplate {
    /// Compiles `template` against the given static fields.
    ///
    /// Supported syntax:
    /// - literal text, copied through verbatim;
    /// - `%{[path.to.field]}`, substituted at compile time from
    ///   `static_fields`; an unresolved reference is an error because
    ///   rendering has only the event timestamp to work with;
    /// - `%{+PATTERN}`, a date segment rendered per event from its
    ///   timestamp, using the tokens `yyyy`/`yy`, `MM`, `dd`, `HH`, `mm`,
    ///   `ss` and `ww`; separator characters pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] naming the template and the offending
    /// expression for unterminated, empty or unsupported expressions,
    /// unresolved field references, and unknown date tokens.
    pub fn compile(template: &str, static_fields: &Fields) -> Result<Self, TemplateError> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(start) = rest.find("%{") {
            literal.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            let Some(end) = after.find('}') else {
                return Err(TemplateError::UnterminatedExpression {
                    template: template.to_string(),
                });
            };

            let expression = &after[..end];
            rest = &after[end + 1..];

            if expression.is_empty() {
                return Err(TemplateError::EmptyExpression {
                    template: template.to_string(),
                });
            }

            if let Some(field) = expression
                .strip_prefix('[')
                .and_then(|e| e.strip_suffix(']'))
            {
                match static_fields.get_str(field) {
                    Some(value) => literal.push_str(value),
                    None => {
                        return Err(TemplateError::UnresolvedField {
                            template: template.to_string(),
                            field: field.to_string(),
                        });
                    }
                }
            } else if let Some(pattern) = expression.strip_prefix('+') {
                let format = translate_date_pattern(pattern).map_err(|reason| {
                    TemplateError::InvalidDatePattern {
                        template: template.to_string(),
                        pattern: pattern.to_string(),
                        reason,
                    }
                })?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Date(format));
            } else {
                return Err(TemplateError::UnsupportedExpression {
                    template: template.to_string(),
                    expression: expression.to_string(),
                });
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    /// The template source this value was compiled from.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether any segment varies with the event timestamp.
    #[must_use]
    pub fn has_date(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Date(_)))
    }

    /// Renders the index name for an event timestamp.
    #[must_use]
    pub fn format(&self, timestamp: DateTime<Utc>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Date(format) => {
                    out.push_str(&timestamp.format(format).to_string());
                }
            }
        }
        out
    }
}

/// Translates a date pattern (`yyyy.MM.dd` and friends) into a chrono format
/// string. Tokens are runs of a repeated letter; everything else is a
/// separator copied through, with `%` escaped for chrono.
fn translate_date_pattern(pattern: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if !c.is_ascii_alphabetic() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
            continue;
        }

        let mut run = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }

        let translated = match (c, run) {
            ('y', 4) => "%Y",
            ('y', 2) => "%y",
            ('M', 1 | 2) => "%m",
            ('d', 1 | 2) => "%d",
            ('H', 1 | 2) => "%H",
            ('m', 1 | 2) => "%M",
            ('s', 1 | 2) => "%S",
            ('w', 1 | 2) => "%V",
            _ => {
                return Err(format!(
                    "unsupported date token '{}'",
                    c.to_string().repeat(run)
                ));
            }
        };
        out.push_str(translated);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    use crate::agent::AgentInfo;

    fn fields() -> Fields {
        AgentInfo::new("upbeat", "9.1.0").static_fields()
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 31, 4, 5, 6).unwrap()
    }

    #[test]
    fn literal_template_renders_unchanged() {
        let tpl = IndexTemplate::compile("synthetics-generic-default", &fields()).unwrap();
        assert!(!tpl.has_date());
        assert_eq!(tpl.format(ts()), "synthetics-generic-default");
    }

    #[test]
    fn field_references_resolve_at_compile_time() {
        let tpl = IndexTemplate::compile("monitors-%{[agent.version]}", &fields()).unwrap();
        assert_eq!(tpl.format(ts()), "monitors-9.1.0");
    }

    #[test]
    fn date_segments_render_from_the_event_timestamp() {
        let tpl = IndexTemplate::compile("checks-%{+yyyy.MM.dd}", &fields()).unwrap();
        assert!(tpl.has_date());
        assert_eq!(tpl.format(ts()), "checks-2025.01.31");
    }

    #[test]
    fn mixed_template_combines_all_segment_kinds() {
        let tpl =
            IndexTemplate::compile("%{[beat.name]}-%{[beat.version]}-%{+yyyy.MM.dd}", &fields())
                .unwrap();
        assert_eq!(tpl.format(ts()), "upbeat-9.1.0-2025.01.31");
    }

    #[test]
    fn week_token_renders_iso_week() {
        let tpl = IndexTemplate::compile("weekly-%{+yyyy.ww}", &fields()).unwrap();
        assert_eq!(tpl.format(ts()), "weekly-2025.05");
    }

    #[test]
    fn unresolved_field_is_a_compile_error() {
        let err = IndexTemplate::compile("x-%{[event.dataset]}", &fields()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnresolvedField {
                template: "x-%{[event.dataset]}".to_string(),
                field: "event.dataset".to_string(),
            }
        );
    }

    #[test]
    fn unterminated_expression_is_rejected() {
        let err = IndexTemplate::compile("x-%{[agent.name]", &fields()).unwrap_err();
        assert!(matches!(err, TemplateError::UnterminatedExpression { .. }));
    }

    #[test]
    fn empty_expression_is_rejected() {
        let err = IndexTemplate::compile("x-%{}", &fields()).unwrap_err();
        assert!(matches!(err, TemplateError::EmptyExpression { .. }));
    }

    #[test]
    fn unsupported_expression_is_rejected() {
        let err = IndexTemplate::compile("x-%{agent.name}", &fields()).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::UnsupportedExpression { expression, .. } if expression == "agent.name"
        ));
    }

    #[test]
    fn unknown_date_token_is_rejected() {
        let err = IndexTemplate::compile("x-%{+qq}", &fields()).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::InvalidDatePattern { reason, .. } if reason.contains("qq")
        ));
    }

    #[test]
    fn stray_percent_is_literal() {
        let tpl = IndexTemplate::compile("cpu-100%-%{+yyyy}", &fields()).unwrap();
        assert_eq!(tpl.format(ts()), "cpu-100%-2025");
    }

    #[test]
    fn compilation_is_deterministic() {
        let a = IndexTemplate::compile("m-%{[agent.version]}-%{+yyyy}", &fields()).unwrap();
        let b = IndexTemplate::compile("m-%{[agent.version]}-%{+yyyy}", &fields()).unwrap();
        assert_eq!(a, b);
    }
}
