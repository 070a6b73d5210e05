//! The default prompt templates the pipeline stages are built around.
//!
//! The wording matters: both templates instruct the model to fence its
//! payload with triple backticks, which is what [`crate::extract`]
//! relies on, and the code template additionally establishes the
//! `<error>` self-review protocol that [`crate::extract::extract_code`]
//! discards.

use crate::template::PromptTemplate;

/// The list-generation prompt, over `{number}` and `{industry}`.
pub const LIST_PROMPT: &str = "\
Generate a NUMBERED list of at least {number} different {industry} \
manufacturing machines.
IMPORTANT: Fence the list with '```'. DO NOT add any explanations, only \
the machine name.
";

/// The code-generation prompt, over `{context}`, `{topic}` and
/// `{language}`.
pub const CODE_PROMPT: &str = "\
Write a high-quality {language} script for the following task, something \
a {context} {language} expert would write. You are writing code for an \
experienced developer so only add comments for things that are \
non-obvious. Make sure to include any imports required.

NEVER write anything before the ```{language}``` block. After you are \
done generating the code and after the ```{language}``` block, check \
your work VERY CAREFULLY to make sure there are no mistakes, errors, or \
inconsistencies. It's IMPORTANT that if there are ERRORS, LIST THOSE \
ERRORS in <error> tags, then GENERATE a new version with those ERRORS \
FIXED. If there are no errors, write \"CHECKED: NO ERRORS\" in <error> \
tags.

Here is the task:
<task>
* Write code to generate synthetic {topic} data using ACTUAL and \
REALISTIC physical signal names and values
* Add some occasional anomalies to the signals that are created
* The first column is `Timestamp` in the format `yyyy-MM-dd HH:mm:ss`
* The `Timestamp` is collected every minute and the dataset should span \
an entire year
* Write a `main` function that executes the data generation and saves \
the entire data to local disk. Make sure the file contains the headers!
* Use object-oriented programming for all code and add docstrings
</task>
";

/// Returns the default list-generation template.
pub fn list_template() -> PromptTemplate {
    PromptTemplate::new(LIST_PROMPT, &["number", "industry"])
        .expect("default list template is valid")
}

/// Returns the default code-generation template.
pub fn code_template() -> PromptTemplate {
    PromptTemplate::new(CODE_PROMPT, &["context", "topic", "language"])
        .expect("default code template is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_templates_fill() {
        let prompt = list_template()
            .fill(&[("number", "10"), ("industry", "automotive")])
            .unwrap();
        assert!(prompt.contains("at least 10 different automotive"));

        let prompt = code_template()
            .fill(&[
                ("context", "very skilled"),
                ("topic", "CNC Milling Machine"),
                ("language", "python"),
            ])
            .unwrap();
        assert!(prompt.contains("synthetic CNC Milling Machine data"));
        assert!(prompt.contains("```python```"));
    }
}
