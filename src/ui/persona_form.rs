//! Configuration view: walks through every persona field on a line-based
//! terminal and hands back a validated persona.

use std::io::{self, Write};

use tokio::io::AsyncBufRead;
use tracing::debug;

use crate::core::persona::{PersonaConfig, MAX_THINKING_BUDGET, SUGGESTED_MODELS};
use crate::ui::read_line;

const CLEAR_MARKER: &str = "-";
const PREVIEW_CHARS: usize = 60;

#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Keep,
    Clear,
    Value(String),
}

fn parse_answer(line: &str) -> Answer {
    match line.trim() {
        "" => Answer::Keep,
        CLEAR_MARKER => Answer::Clear,
        value => Answer::Value(value.to_string()),
    }
}

fn preview(current: &str) -> String {
    let current = current.trim();
    if current.chars().count() <= PREVIEW_CHARS {
        return current.to_string();
    }
    let mut shortened: String = current.chars().take(PREVIEW_CHARS).collect();
    shortened.push('…');
    shortened
}

pub struct PersonaForm<'a, R, W> {
    input: &'a mut R,
    output: &'a mut W,
}

impl<'a, R, W> PersonaForm<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(input: &'a mut R, output: &'a mut W) -> Self {
        Self { input, output }
    }

    /// Ask for every field, offering `seed` as the default for each.
    ///
    /// Returns `None` if input ends before the form is complete.
    pub async fn run(mut self, seed: &PersonaConfig) -> io::Result<Option<PersonaConfig>> {
        writeln!(
            self.output,
            "🎭 Persona setup (Enter keeps the current value, '{CLEAR_MARKER}' clears an optional field)"
        )?;

        let mut persona = seed.clone();
        loop {
            let Some(filled) = self.fill(&persona).await? else {
                return Ok(None);
            };
            persona = filled;

            match persona.validate() {
                Ok(()) => break,
                Err(err) => writeln!(self.output, "⚠️  {err}")?,
            }
        }

        debug!(
            persona = %persona.name,
            model = %persona.effective_model(),
            thinking_budget = persona.thinking_budget,
            "persona form submitted"
        );
        writeln!(self.output, "✅ Persona ready: {}", persona.display_label())?;
        writeln!(self.output)?;
        Ok(Some(persona))
    }

    async fn fill(&mut self, current: &PersonaConfig) -> io::Result<Option<PersonaConfig>> {
        let Some(name) = self.required_text("Name", &current.name).await? else {
            return Ok(None);
        };
        let Some(avatar_emoji) = self
            .optional_text("Avatar emoji", &current.avatar_emoji)
            .await?
        else {
            return Ok(None);
        };
        let Some(description) = self
            .optional_text("Description", &current.description)
            .await?
        else {
            return Ok(None);
        };
        let Some(system_instruction) = self
            .required_text("System instruction", &current.system_instruction)
            .await?
        else {
            return Ok(None);
        };
        let Some(model) = self.model(current.effective_model()).await? else {
            return Ok(None);
        };
        let Some(thinking_budget) = self.thinking_budget(current.thinking_budget).await? else {
            return Ok(None);
        };

        Ok(Some(PersonaConfig {
            name,
            avatar_emoji,
            description,
            system_instruction,
            thinking_budget,
            model,
        }))
    }

    async fn prompt(&mut self, label: &str, current: &str) -> io::Result<Option<String>> {
        if current.trim().is_empty() {
            write!(self.output, "{label}: ")?;
        } else {
            write!(self.output, "{label} [{}]: ", preview(current))?;
        }
        self.output.flush()?;
        read_line(&mut *self.input).await
    }

    async fn required_text(&mut self, label: &str, current: &str) -> io::Result<Option<String>> {
        loop {
            let Some(line) = self.prompt(label, current).await? else {
                return Ok(None);
            };
            match parse_answer(&line) {
                Answer::Value(value) => return Ok(Some(value)),
                Answer::Keep if !current.trim().is_empty() => {
                    return Ok(Some(current.to_string()))
                }
                _ => writeln!(self.output, "⚠️  {label} is required.")?,
            }
        }
    }

    async fn optional_text(&mut self, label: &str, current: &str) -> io::Result<Option<String>> {
        let Some(line) = self.prompt(label, current).await? else {
            return Ok(None);
        };
        Ok(Some(match parse_answer(&line) {
            Answer::Keep => current.to_string(),
            Answer::Clear => String::new(),
            Answer::Value(value) => value,
        }))
    }

    /// A number picks from the suggested models; anything else is taken as a
    /// model identifier.
    async fn model(&mut self, current: &str) -> io::Result<Option<String>> {
        writeln!(self.output, "Models:")?;
        for (i, (id, summary)) in SUGGESTED_MODELS.iter().enumerate() {
            writeln!(self.output, "  {}. {id} ({summary})", i + 1)?;
        }

        let Some(line) = self.prompt("Model", current).await? else {
            return Ok(None);
        };
        Ok(Some(match parse_answer(&line) {
            Answer::Keep => current.to_string(),
            Answer::Clear => String::new(),
            Answer::Value(value) => match value.parse::<usize>() {
                Ok(choice) if (1..=SUGGESTED_MODELS.len()).contains(&choice) => {
                    SUGGESTED_MODELS[choice - 1].0.to_string()
                }
                _ => value,
            },
        }))
    }

    async fn thinking_budget(&mut self, current: u32) -> io::Result<Option<u32>> {
        let label = format!("Thinking budget (0-{MAX_THINKING_BUDGET} tokens, 0 disables)");
        loop {
            let Some(line) = self.prompt(&label, &current.to_string()).await? else {
                return Ok(None);
            };
            match parse_answer(&line) {
                Answer::Keep => return Ok(Some(current)),
                Answer::Clear => return Ok(Some(0)),
                Answer::Value(value) => match value.parse::<u32>() {
                    Ok(budget) if budget <= MAX_THINKING_BUDGET => return Ok(Some(budget)),
                    _ => writeln!(
                        self.output,
                        "⚠️  Thinking budget must be a whole number between 0 and {MAX_THINKING_BUDGET}."
                    )?,
                },
            }
        }
    }
}
