//! Template engine for variable substitution in crew documents.
//!
//! This module provides a simple template engine that performs `{{ variable }}`
//! substitution over the raw document text before YAML parsing. This lets one
//! document describe many crews: the caller supplies a context mapping at load
//! time and again on every reload.
//!
//! # Syntax
//!
//! - `{{ name }}` - Substitutes the value of variable `name` (inner whitespace
//!   is trimmed, so `{{name}}` and `{{ name }}` are equivalent)
//! - A lone `{` or `}` is ordinary text
//!
//! # Error Handling
//!
//! The engine is fail-safe: undefined variables cause an error rather than
//! silent substitution with empty strings. This prevents subtle bugs from
//! typos in variable names.

use std::collections::HashMap;
use std::fmt;

/// Error type for template rendering failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A variable was referenced but not provided.
    UndefinedVariable {
        /// The name of the undefined variable.
        name: String,
        /// The byte position in the template where the placeholder starts.
        position: usize,
    },
    /// A `{{` was found without a matching `}}`.
    Unterminated {
        /// The byte position of the unterminated `{{`.
        position: usize,
    },
    /// An empty placeholder was found (e.g., `{{ }}`).
    EmptyVariableName {
        /// The byte position of the empty placeholder.
        position: usize,
    },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::UndefinedVariable { name, position } => {
                write!(
                    f,
                    "undefined variable '{}' at position {} in template",
                    name, position
                )
            }
            TemplateError::Unterminated { position } => {
                write!(f, "unterminated '{{{{' at position {} in template", position)
            }
            TemplateError::EmptyVariableName { position } => {
                write!(
                    f,
                    "empty placeholder '{{{{ }}}}' at position {} in template",
                    position
                )
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Render a template string by substituting variables.
///
/// # Arguments
///
/// * `template` - The template string containing `{{ variable }}` placeholders
/// * `variables` - A map of variable names to their values
///
/// # Returns
///
/// * `Ok(String)` - The rendered string with all placeholders substituted
/// * `Err(TemplateError)` - If a variable is undefined or a placeholder is malformed
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use crewfile::template::render;
///
/// let mut vars = HashMap::new();
/// vars.insert("text".to_string(), "the annual report".to_string());
///
/// let result = render("Summarize {{ text }}.", &vars).unwrap();
/// assert_eq!(result, "Summarize the annual report.");
/// ```
pub fn render(
    template: &str,
    variables: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        if ch == '{' && matches!(chars.peek(), Some((_, '{'))) {
            chars.next(); // consume the second {
            let start_pos = pos;
            let mut var_name = String::new();
            let mut closed = false;

            while let Some((_, c)) = chars.next() {
                if c == '}' {
                    match chars.next() {
                        Some((_, '}')) => {
                            closed = true;
                            break;
                        }
                        Some((_, other)) => {
                            // Lone } inside a placeholder stays part of the
                            // name and will fail lookup below.
                            var_name.push('}');
                            var_name.push(other);
                        }
                        None => {
                            return Err(TemplateError::Unterminated {
                                position: start_pos,
                            });
                        }
                    }
                } else {
                    var_name.push(c);
                }
            }

            if !closed {
                return Err(TemplateError::Unterminated {
                    position: start_pos,
                });
            }

            let var_name = var_name.trim();

            if var_name.is_empty() {
                return Err(TemplateError::EmptyVariableName {
                    position: start_pos,
                });
            }

            match variables.get(var_name) {
                Some(value) => result.push_str(value),
                None => {
                    return Err(TemplateError::UndefinedVariable {
                        name: var_name.to_string(),
                        position: start_pos,
                    });
                }
            }
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Helper to create a variables map from a list of key-value pairs.
pub fn vars<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
