//! Interactive enhancement session.

use crate::clipboard::copy_to_clipboard;
use crate::enhancer::{EnhancementRequest, EnhancementResult, Enhancer};
use crate::history::History;
use crate::llm::ModelService;
use crate::render::{self, StreamPrinter};
use crate::templates::{Style, TemplateSet};
use crate::tui::{self, Action, InputResult};
use anyhow::Result;
use tracing::{debug, warn};

/// Fixed settings for the whole session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: String,
    pub style: Style,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Words that end the session when typed as a prompt.
fn is_exit_word(prompt: &str) -> bool {
    matches!(prompt.trim().to_ascii_lowercase().as_str(), "quit" | "exit")
}

/// Apply a style typed by the user. Empty input keeps the current one.
fn choose_style(current: Style, input: &str) -> Result<Style, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(current);
    }
    input
        .parse::<Style>()
        .map_err(|_| format!("Invalid style. Sticking with {}.", current))
}

/// What the copy action offers after a run. A failed run leaves nothing, so
/// an older result is never copied in its place.
fn copy_text<E>(outcome: &Result<EnhancementResult, E>) -> Option<String> {
    outcome.as_ref().ok().map(|result| result.enhanced_prompt.clone())
}

pub async fn run<S: ModelService + ?Sized>(
    service: &S,
    templates: &TemplateSet,
    history: &History,
    settings: SessionSettings,
) -> Result<()> {
    render::panel(
        "✨ Enhance This - Interactive Mode",
        "Enhance your prompts in real-time with AI assistance.\n\
         Type 'quit' or 'exit' to end the session.",
    );
    render::info(&format!("🤖 Using model: {}", settings.model));

    let enhancer = Enhancer::new(service, templates);
    let mut style = settings.style;
    let mut prompt: Option<String> = None;
    let mut last_enhanced: Option<String> = None;
    let mut needs_run = true;

    loop {
        let current = match &prompt {
            Some(p) => p.clone(),
            None => match tui::prompt_input("Enter initial prompt", None)? {
                InputResult::Submitted(p) if !is_exit_word(&p) => {
                    prompt = Some(p.clone());
                    needs_run = true;
                    p
                }
                _ => break,
            },
        };

        if needs_run {
            let request = EnhancementRequest {
                original_prompt: current.clone(),
                style,
                model_name: settings.model.clone(),
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            };
            let mut printer = StreamPrinter::start("Enhancing your prompt...", "✨ Enhanced Prompt ✨");
            let outcome = enhancer.enhance(&request, |f| printer.fragment(f)).await;
            printer.finish();
            last_enhanced = copy_text(&outcome);
            match outcome {
                Ok(result) => {
                    if let Err(e) = history.append(&result) {
                        warn!("Could not save history: {:#}", e);
                    }
                }
                Err(e) => render::error(&e.to_string()),
            }
            needs_run = false;
        }

        match tui::read_action()? {
            Action::Refine => match tui::prompt_input("Refine prompt", Some(current))? {
                InputResult::Submitted(p) if !is_exit_word(&p) => {
                    prompt = Some(p);
                    needs_run = true;
                }
                InputResult::Submitted(_) => break,
                InputResult::Cancelled => {}
            },
            Action::Style => {
                let names: Vec<&str> = templates.styles().iter().map(|s| s.as_str()).collect();
                render::info(&format!("Available styles: {}", names.join(", ")));
                let title = format!("New style ({})", style);
                if let InputResult::Submitted(input) = tui::prompt_input(&title, None)? {
                    match choose_style(style, &input) {
                        Ok(new_style) if new_style != style => {
                            debug!("Style changed to {}", new_style);
                            style = new_style;
                            needs_run = true;
                        }
                        Ok(_) => {}
                        Err(message) => render::warning(&message),
                    }
                }
            }
            Action::Copy => match &last_enhanced {
                Some(text) => match copy_to_clipboard(text) {
                    Ok(()) => render::success("Copied to clipboard."),
                    Err(e) => render::warning(&format!("Could not copy to clipboard: {:#}", e)),
                },
                None => render::warning("Nothing to copy yet."),
            },
            Action::Quit => break,
            Action::Invalid => render::warning("Invalid action."),
        }
    }

    render::success("Exiting interactive mode. Goodbye! 👋");
    Ok(())
}
