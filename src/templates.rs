//! Enhancement styles and their instruction templates.
//!
//! Every template carries a `{user_prompt}` placeholder that is replaced with
//! the user's raw prompt. Templates can be overridden per style from the
//! `[templates]` table of the config file.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Placeholder substituted with the original prompt.
pub const PROMPT_PLACEHOLDER: &str = "{user_prompt}";

/// A named enhancement style.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Detailed,
    Concise,
    Creative,
    Technical,
    Json,
    Bullets,
    Summary,
    Formal,
    Casual,
}

impl Style {
    pub const ALL: [Style; 9] = [
        Style::Detailed,
        Style::Concise,
        Style::Creative,
        Style::Technical,
        Style::Json,
        Style::Bullets,
        Style::Summary,
        Style::Formal,
        Style::Casual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Detailed => "detailed",
            Style::Concise => "concise",
            Style::Creative => "creative",
            Style::Technical => "technical",
            Style::Json => "json",
            Style::Bullets => "bullets",
            Style::Summary => "summary",
            Style::Formal => "formal",
            Style::Casual => "casual",
        }
    }

    /// Parse a style name, falling back to the default style when unknown.
    pub fn parse_or_default(name: &str) -> Style {
        name.parse().unwrap_or_else(|e: UnknownStyle| {
            warn!("{}, falling back to '{}'", e, Style::default());
            Style::default()
        })
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown style '{0}'")]
pub struct UnknownStyle(pub String);

impl FromStr for Style {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Style::ALL
            .into_iter()
            .find(|style| style.as_str() == name)
            .ok_or_else(|| UnknownStyle(s.to_string()))
    }
}

/// Built-in template for a style.
fn builtin_template(style: Style) -> &'static str {
    match style {
        Style::Detailed => {
            "You are an expert prompt engineer. Rewrite the prompt below into a detailed, \
             well-structured prompt for a large language model. State the goal clearly, add the \
             relevant context, list concrete requirements and constraints, and describe the \
             expected output format. Keep the user's original intent intact.\n\n\
             Output ONLY the enhanced prompt, with no preamble or commentary.\n\n\
             Original prompt:\n{user_prompt}"
        }
        Style::Concise => {
            "You are an expert prompt engineer. Rewrite the prompt below so it is clear, precise \
             and as short as possible while removing any ambiguity. Keep every essential \
             requirement and drop filler.\n\n\
             Output ONLY the enhanced prompt, with no preamble or commentary.\n\n\
             Original prompt:\n{user_prompt}"
        }
        Style::Creative => {
            "You are an imaginative prompt engineer. Rewrite the prompt below to invite creative, \
             original and vivid responses. Suggest a tone, a perspective and sensory or narrative \
             details the model could explore, without losing the user's goal.\n\n\
             Output ONLY the enhanced prompt, with no preamble or commentary.\n\n\
             Original prompt:\n{user_prompt}"
        }
        Style::Technical => {
            "You are a senior engineer writing prompts for a technical assistant. Rewrite the \
             prompt below with precise terminology, explicit inputs and outputs, edge cases, \
             performance or compatibility constraints, and acceptance criteria.\n\n\
             Output ONLY the enhanced prompt, with no preamble or commentary.\n\n\
             Original prompt:\n{user_prompt}"
        }
        Style::Json => {
            "You are an expert prompt engineer. Rewrite the prompt below as a single JSON object \
             with the keys \"role\", \"task\", \"context\", \"requirements\" (array of strings), \
             \"constraints\" (array of strings) and \"output_format\".\n\n\
             Output ONLY valid JSON, with no markdown fences or commentary.\n\n\
             Original prompt:\n{user_prompt}"
        }
        Style::Bullets => {
            "You are an expert prompt engineer. Rewrite the prompt below as a structured list of \
             bullet points covering the objective, context, requirements, constraints and the \
             expected output.\n\n\
             Output ONLY the enhanced prompt as bullet points, with no preamble.\n\n\
             Original prompt:\n{user_prompt}"
        }
        Style::Summary => {
            "You are an expert prompt engineer. Rewrite the prompt below into a short paragraph \
             that summarizes exactly what is being asked and what a good answer looks like.\n\n\
             Output ONLY the enhanced prompt, with no preamble or commentary.\n\n\
             Original prompt:\n{user_prompt}"
        }
        Style::Formal => {
            "You are an expert prompt engineer. Rewrite the prompt below in a formal, professional \
             register suitable for business or academic use. Be explicit about scope, audience \
             and deliverables.\n\n\
             Output ONLY the enhanced prompt, with no preamble or commentary.\n\n\
             Original prompt:\n{user_prompt}"
        }
        Style::Casual => {
            "You are a friendly prompt writer. Rewrite the prompt below in a relaxed, \
             conversational tone while making the request clearer and adding the details a \
             helpful assistant would need.\n\n\
             Output ONLY the enhanced prompt, with no preamble or commentary.\n\n\
             Original prompt:\n{user_prompt}"
        }
    }
}

/// The set of templates in effect for this process.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: BTreeMap<Style, String>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateSet {
    /// Templates shipped with the tool.
    pub fn builtin() -> Self {
        let templates = Style::ALL
            .into_iter()
            .map(|style| (style, builtin_template(style).to_string()))
            .collect();
        Self { templates }
    }

    /// Built-in templates with user overrides applied on top.
    ///
    /// Keys that do not name a known style are ignored.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut set = Self::builtin();
        for (name, template) in overrides {
            match name.parse::<Style>() {
                Ok(style) => {
                    set.templates.insert(style, template.clone());
                }
                Err(e) => warn!("Ignoring template override: {}", e),
            }
        }
        set
    }

    /// Known styles, in declaration order.
    pub fn styles(&self) -> Vec<Style> {
        self.templates.keys().copied().collect()
    }

    pub fn template(&self, style: Style) -> &str {
        self.templates
            .get(&style)
            .map(String::as_str)
            .unwrap_or_else(|| builtin_template(style))
    }

    /// Combine the style's template with the raw prompt.
    pub fn build_system_prompt(&self, prompt: &str, style: Style) -> String {
        let template = self.template(style);
        if template.contains(PROMPT_PLACEHOLDER) {
            template.replace(PROMPT_PLACEHOLDER, prompt)
        } else {
            format!("{}\n\n{}", template.trim_end(), prompt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_style_contains_prompt() {
        let set = TemplateSet::builtin();
        let prompt = "write a haiku about {rust} & \"borrowing\"";
        for style in Style::ALL {
            let built = set.build_system_prompt(prompt, style);
            assert!(built.contains(prompt), "style {} dropped the prompt", style);
            assert!(!built.contains(PROMPT_PLACEHOLDER));
        }
    }

    #[test]
    fn test_unknown_style_falls_back() {
        assert_eq!(Style::parse_or_default("shouty"), Style::Detailed);
        assert_eq!(Style::parse_or_default("Summary"), Style::Summary);
    }

    #[test]
    fn test_style_parse_is_case_insensitive() {
        assert_eq!("JSON".parse::<Style>(), Ok(Style::Json));
        assert_eq!(" bullets ".parse::<Style>(), Ok(Style::Bullets));
        assert!("nope".parse::<Style>().is_err());
    }

    #[test]
    fn test_override_replaces_template() {
        let mut overrides = HashMap::new();
        overrides.insert("concise".to_string(), "Shorten: {user_prompt}".to_string());
        overrides.insert("mystery".to_string(), "ignored".to_string());
        let set = TemplateSet::with_overrides(&overrides);
        assert_eq!(set.build_system_prompt("fix my code", Style::Concise), "Shorten: fix my code");
        assert_eq!(set.styles().len(), Style::ALL.len());
    }

    #[test]
    fn test_override_without_placeholder_appends_prompt() {
        let mut overrides = HashMap::new();
        overrides.insert("casual".to_string(), "Make it chill.\n".to_string());
        let set = TemplateSet::with_overrides(&overrides);
        assert_eq!(
            set.build_system_prompt("plan a trip", Style::Casual),
            "Make it chill.\n\nplan a trip"
        );
    }
}
