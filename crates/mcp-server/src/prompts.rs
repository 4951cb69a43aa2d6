//! Built-in MCP prompt templates.
//!
//! Prompts are data shipped in `prompts/builtin.json`. A template names its arguments as
//! `{argument}` placeholders; rendering substitutes them and rejects calls missing a required one.

use rmcp::model::{GetPromptResult, JsonObject, Prompt, PromptArgument, PromptMessage, PromptMessageRole};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const BUILTIN_PROMPTS: &str = include_str!("../prompts/builtin.json");
const PROMPTS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("Unknown prompt: {0}")]
    Unknown(String),

    #[error("Missing required argument '{argument}' for prompt '{prompt}'")]
    MissingArgument { prompt: String, argument: String },

    #[error("Invalid prompt catalog: {0}")]
    InvalidCatalog(String),
}

#[derive(Debug, Clone, Deserialize)]
struct PromptTemplate {
    name: String,
    description: String,
    #[serde(default)]
    arguments: Vec<PromptArgument>,
    result_description: String,
    template: String,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    schema_version: Option<u32>,
    prompts: Vec<PromptTemplate>,
}

#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    templates: Vec<PromptTemplate>,
}

impl PromptCatalog {
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_PROMPTS).unwrap_or_else(|err| {
            log::error!("built-in prompts are invalid: {err}");
            Self::default()
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, PromptError> {
        let raw: RawCatalog =
            serde_json::from_str(raw).map_err(|err| PromptError::InvalidCatalog(err.to_string()))?;
        if let Some(version) = raw.schema_version {
            if version != PROMPTS_SCHEMA_VERSION {
                return Err(PromptError::InvalidCatalog(format!(
                    "schema_version {version} is not supported (expected {PROMPTS_SCHEMA_VERSION})"
                )));
            }
        }
        Ok(Self {
            templates: raw.prompts,
        })
    }

    pub fn list(&self) -> Vec<Prompt> {
        self.templates
            .iter()
            .map(|template| {
                Prompt::new(
                    template.name.as_str(),
                    Some(template.description.as_str()),
                    Some(template.arguments.clone()),
                )
            })
            .collect()
    }

    /// Renders `name` with `arguments` into a single user message.
    pub fn render(
        &self,
        name: &str,
        arguments: Option<&JsonObject>,
    ) -> Result<GetPromptResult, PromptError> {
        let template = self
            .templates
            .iter()
            .find(|template| template.name == name)
            .ok_or_else(|| PromptError::Unknown(name.to_string()))?;

        let mut text = template.template.clone();
        let mut description = template.result_description.clone();
        for argument in &template.arguments {
            let placeholder = format!("{{{}}}", argument.name);
            let value = match arguments.and_then(|args| args.get(&argument.name)) {
                Some(value) => argument_text(value),
                None if argument.required.unwrap_or(false) => {
                    return Err(PromptError::MissingArgument {
                        prompt: template.name.clone(),
                        argument: argument.name.clone(),
                    })
                }
                None => String::new(),
            };
            text = text.replace(&placeholder, &value);
            description = description.replace(&placeholder, &value);
        }

        Ok(GetPromptResult {
            description: Some(description),
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
        })
    }
}

fn argument_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rmcp::model::PromptMessageContent;
    use serde_json::json;

    fn message_text(result: &GetPromptResult) -> &str {
        match &result.messages[0].content {
            PromptMessageContent::Text { text } => text,
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn builtin_catalog_lists_every_prompt() {
        let names: Vec<String> = PromptCatalog::builtin()
            .list()
            .into_iter()
            .map(|prompt| prompt.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "analyze-ticket",
                "draft-ticket-response",
                "search-tickets",
                "analytics-dashboard",
                "analyze-user-workload",
            ]
        );
    }

    #[test]
    fn arguments_fill_the_template() {
        let catalog = PromptCatalog::builtin();
        let args = json!({"ticket_id": 42});
        let result = catalog
            .render("analyze-ticket", args.as_object())
            .unwrap();
        assert_eq!(result.description.as_deref(), Some("Analysis of ticket #42"));
        assert!(message_text(&result).contains("ticket #42"));
        assert!(!message_text(&result).contains("{ticket_id}"));
        assert_eq!(result.messages[0].role, PromptMessageRole::User);

        let search = catalog
            .render(
                "search-tickets",
                json!({"search_criteria": " urgent billing "}).as_object(),
            )
            .unwrap();
        assert_eq!(
            search.description.as_deref(),
            Some("Ticket search for: urgent billing")
        );
    }

    #[test]
    fn prompts_without_arguments_render_as_is() {
        let result = PromptCatalog::builtin()
            .render("analytics-dashboard", None)
            .unwrap();
        assert!(message_text(&result).contains("get_ticket_counts"));
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let err = PromptCatalog::builtin()
            .render("analyze-user-workload", json!({}).as_object())
            .unwrap_err();
        assert_eq!(
            err,
            PromptError::MissingArgument {
                prompt: "analyze-user-workload".to_string(),
                argument: "user_id".to_string(),
            }
        );
    }

    #[test]
    fn unknown_prompt_and_bad_catalog_are_errors() {
        assert_eq!(
            PromptCatalog::builtin().render("agent-performance", None).unwrap_err(),
            PromptError::Unknown("agent-performance".to_string())
        );
        assert!(matches!(
            PromptCatalog::from_json(r#"{"schema_version": 2, "prompts": []}"#),
            Err(PromptError::InvalidCatalog(_))
        ));
    }
}
