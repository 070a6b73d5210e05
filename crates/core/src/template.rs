//! Prompt templates with named placeholders.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// The error type for template construction and filling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateError {
    /// The template text references a placeholder that was not declared
    /// as an input variable.
    UndeclaredPlaceholder(String),
    /// A `{` in the template text is never closed.
    UnterminatedPlaceholder,
    /// A declared input variable was not supplied when filling.
    MissingVariable(String),
}

impl Display for TemplateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::UndeclaredPlaceholder(name) => {
                write!(f, "placeholder `{name}` is not a declared input variable")
            }
            TemplateError::UnterminatedPlaceholder => {
                write!(f, "unterminated placeholder in template")
            }
            TemplateError::MissingVariable(name) => {
                write!(f, "missing value for template variable `{name}`")
            }
        }
    }
}

impl Error for TemplateError {}

/// A prompt template with `{name}` placeholders.
///
/// The set of input variables is declared up front and validated
/// against the template text at construction, so a filling call can
/// only fail when a declared variable is not supplied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    /// Creates a template, validating that every placeholder in `text`
    /// is one of `input_variables`.
    pub fn new(
        text: impl Into<String>,
        input_variables: &[&str],
    ) -> Result<Self, TemplateError> {
        let text = text.into();
        for placeholder in placeholders(&text)? {
            if !input_variables.contains(&placeholder) {
                return Err(TemplateError::UndeclaredPlaceholder(
                    placeholder.to_owned(),
                ));
            }
        }
        Ok(Self {
            text,
            input_variables: input_variables
                .iter()
                .map(|v| (*v).to_owned())
                .collect(),
        })
    }

    /// Returns the declared input variable names.
    #[inline]
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Fills the template with the supplied named values.
    ///
    /// Values for variables the template never references are ignored.
    pub fn fill(
        &self,
        values: &[(&str, &str)],
    ) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(open_idx) = rest.find('{') {
            out.push_str(&rest[..open_idx]);
            let after_open = &rest[open_idx + 1..];
            let Some(close_idx) = after_open.find('}') else {
                return Err(TemplateError::UnterminatedPlaceholder);
            };
            let name = &after_open[..close_idx];
            let Some((_, value)) = values.iter().find(|(k, _)| *k == name)
            else {
                return Err(TemplateError::MissingVariable(name.to_owned()));
            };
            out.push_str(value);
            rest = &after_open[close_idx + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn placeholders(text: &str) -> Result<Vec<&str>, TemplateError> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(open_idx) = rest.find('{') {
        let after_open = &rest[open_idx + 1..];
        let Some(close_idx) = after_open.find('}') else {
            return Err(TemplateError::UnterminatedPlaceholder);
        };
        names.push(&after_open[..close_idx]);
        rest = &after_open[close_idx + 1..];
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill() {
        let template = PromptTemplate::new(
            "Generate {number} {industry} machines",
            &["number", "industry"],
        )
        .unwrap();
        let filled = template
            .fill(&[("industry", "automotive"), ("number", "5")])
            .unwrap();
        assert_eq!(filled, "Generate 5 automotive machines");
    }

    #[test]
    fn test_missing_variable() {
        let template =
            PromptTemplate::new("Hello {name}", &["name"]).unwrap();
        assert_eq!(
            template.fill(&[("other", "x")]),
            Err(TemplateError::MissingVariable("name".to_owned()))
        );
    }

    #[test]
    fn test_undeclared_placeholder() {
        assert_eq!(
            PromptTemplate::new("Hello {name}", &["number"]),
            Err(TemplateError::UndeclaredPlaceholder("name".to_owned()))
        );
    }

    #[test]
    fn test_unterminated_placeholder() {
        assert_eq!(
            PromptTemplate::new("Hello {name", &["name"]),
            Err(TemplateError::UnterminatedPlaceholder)
        );
    }

    #[test]
    fn test_extra_values_ignored() {
        let template = PromptTemplate::new("plain text", &[]).unwrap();
        assert_eq!(template.fill(&[("x", "1")]).unwrap(), "plain text");
    }
}
