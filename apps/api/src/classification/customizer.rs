//! Template Customizer: fills `{{placeholder}}` slots with job-specific values.
//!
//! Values are LaTeX-escaped before insertion; the template's own markup is never
//! touched. Substitution is a single left-to-right pass, so inserted text is
//! never rescanned for placeholders.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Structural markers every usable LaTeX template must contain.
pub const DEFAULT_REQUIRED_MARKERS: &[&str] =
    &["\\documentclass", "\\begin{document}", "\\end{document}"];

#[derive(Debug, Error)]
pub enum CustomizeError {
    #[error("template is missing required markers: {}", .0.join(", "))]
    InvalidStructure(Vec<String>),

    #[error("customized output lost required markers: {}", .0.join(", "))]
    StructureLost(Vec<String>),
}

/// Output of a customization pass.
#[derive(Debug, Clone, Serialize)]
pub struct CustomizedDocument {
    pub content: String,
    /// Placeholder name → number of slots filled.
    pub replaced: BTreeMap<String, usize>,
    /// Placeholder names found in the template with no value supplied, left as-is.
    pub unresolved: Vec<String>,
}

/// Escapes characters reserved by LaTeX.
pub fn escape_latex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + value.len() / 4);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\textbackslash{}"),
            '&' => escaped.push_str("\\&"),
            '%' => escaped.push_str("\\%"),
            '$' => escaped.push_str("\\$"),
            '#' => escaped.push_str("\\#"),
            '_' => escaped.push_str("\\_"),
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            '~' => escaped.push_str("\\textasciitilde{}"),
            '^' => escaped.push_str("\\textasciicircum{}"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Returns the markers not present in `text`.
pub fn missing_markers(text: &str, markers: &[String]) -> Vec<String> {
    markers
        .iter()
        .filter(|marker| !text.contains(marker.as_str()))
        .cloned()
        .collect()
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replaces every `{{name}}` whose name is in `values`; leaves the rest untouched.
pub fn customize(
    template: &str,
    values: &BTreeMap<String, String>,
    required_markers: &[String],
) -> Result<CustomizedDocument, CustomizeError> {
    let missing = missing_markers(template, required_markers);
    if !missing.is_empty() {
        return Err(CustomizeError::InvalidStructure(missing));
    }

    let escaped: BTreeMap<&str, String> = values
        .iter()
        .map(|(name, value)| (name.as_str(), escape_latex(value)))
        .collect();

    let mut content = String::with_capacity(template.len());
    let mut replaced: BTreeMap<String, usize> = BTreeMap::new();
    let mut unresolved: Vec<String> = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };
        let name = after_open[..close].trim();

        if !is_placeholder_name(name) {
            // Not a placeholder (e.g. nested LaTeX braces); advance one byte past '{'.
            content.push_str(&rest[..open + 1]);
            rest = &rest[open + 1..];
            continue;
        }

        content.push_str(&rest[..open]);
        match escaped.get(name) {
            Some(value) => {
                content.push_str(value);
                *replaced.entry(name.to_string()).or_insert(0) += 1;
            }
            None => {
                content.push_str(&rest[open..open + 2 + close + 2]);
                if !unresolved.iter().any(|n| n == name) {
                    unresolved.push(name.to_string());
                }
            }
        }
        rest = &after_open[close + 2..];
    }
    content.push_str(rest);

    let lost = missing_markers(&content, required_markers);
    if !lost.is_empty() {
        return Err(CustomizeError::StructureLost(lost));
    }

    Ok(CustomizedDocument {
        content,
        replaced,
        unresolved,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\\documentclass{article}\n\
        \\begin{document}\n\
        Dear {{company}} team,\n\
        I am applying for {{job_title}} at {{company}}.\n\
        Signed, {{candidate}}\n\
        \\end{document}\n";

    fn markers() -> Vec<String> {
        DEFAULT_REQUIRED_MARKERS.iter().map(|m| m.to_string()).collect()
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_escape_latex_reserved_characters() {
        assert_eq!(escape_latex("R&D 100% $5 #1 a_b"), "R\\&D 100\\% \\$5 \\#1 a\\_b");
        assert_eq!(escape_latex("{x}"), "\\{x\\}");
        assert_eq!(escape_latex("~^"), "\\textasciitilde{}\\textasciicircum{}");
        assert_eq!(escape_latex("a\\b"), "a\\textbackslash{}b");
        assert_eq!(escape_latex("Plain Text"), "Plain Text");
    }

    #[test]
    fn test_all_occurrences_replaced() {
        let doc = customize(
            TEMPLATE,
            &values(&[("company", "Acme"), ("job_title", "Engineer")]),
            &markers(),
        )
        .unwrap();
        assert!(doc.content.contains("Dear Acme team"));
        assert!(doc.content.contains("Engineer at Acme."));
        assert_eq!(doc.replaced.get("company"), Some(&2));
        assert_eq!(doc.replaced.get("job_title"), Some(&1));
    }

    #[test]
    fn test_unknown_placeholders_left_untouched() {
        let doc = customize(TEMPLATE, &values(&[("company", "Acme")]), &markers()).unwrap();
        assert!(doc.content.contains("{{job_title}}"));
        assert!(doc.content.contains("{{candidate}}"));
        assert_eq!(doc.unresolved, vec!["job_title".to_string(), "candidate".to_string()]);
    }

    #[test]
    fn test_values_escaped_but_template_markup_preserved() {
        let doc = customize(
            TEMPLATE,
            &values(&[("company", "AT&T {R&D}"), ("job_title", "C# Dev_Ops")]),
            &markers(),
        )
        .unwrap();
        assert!(doc.content.contains("Dear AT\\&T \\{R\\&D\\} team"));
        assert!(doc.content.contains("C\\# Dev\\_Ops"));
        assert!(doc.content.starts_with("\\documentclass{article}\n\\begin{document}"));
        assert!(doc.content.ends_with("\\end{document}\n"));
    }

    #[test]
    fn test_inserted_value_is_not_rescanned() {
        let doc = customize(
            TEMPLATE,
            &values(&[("company", "{{job_title}}"), ("job_title", "X")]),
            &markers(),
        )
        .unwrap();
        assert!(doc.content.contains("Dear \\{\\{job\\_title\\}\\} team"));
    }

    #[test]
    fn test_content_outside_placeholders_unchanged() {
        let doc = customize(TEMPLATE, &BTreeMap::new(), &markers()).unwrap();
        assert_eq!(doc.content, TEMPLATE);
        assert!(doc.replaced.is_empty());
    }

    #[test]
    fn test_latex_braces_are_not_placeholders() {
        let template = "\\documentclass{article}\\begin{document}\\textbf{{{company}}} {{ }} \\end{document}";
        let doc = customize(template, &values(&[("company", "Acme")]), &markers()).unwrap();
        assert_eq!(
            doc.content,
            "\\documentclass{article}\\begin{document}\\textbf{Acme} {{ }} \\end{document}"
        );
    }

    #[test]
    fn test_template_without_markers_rejected() {
        let err = customize("Hello {{company}}", &values(&[("company", "Acme")]), &markers())
            .unwrap_err();
        match err {
            CustomizeError::InvalidStructure(missing) => assert_eq!(missing.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
