use std::io::{self, Write};

use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect, Password, Select};

/// The questions the planner asks while a command runs.
pub trait Prompter {
    fn say(&mut self, text: &str) -> io::Result<()>;

    /// Free text, trimmed. `None` when left blank.
    fn input(&mut self, prompt: &str) -> Result<Option<String>, dialoguer::Error>;

    /// Read without echo and returned exactly as typed.
    fn password(&mut self, prompt: &str) -> Result<String, dialoguer::Error>;

    fn confirm(&mut self, prompt: &str) -> Result<bool, dialoguer::Error>;

    /// The index of the chosen item, `None` when the person backs out.
    fn select(&mut self, prompt: &str, items: &[String]) -> Result<Option<usize>, dialoguer::Error>;

    /// Indices of every checked item.
    fn multi_select(&mut self, prompt: &str, items: &[String]) -> Result<Vec<usize>, dialoguer::Error>;
}

#[derive(Default)]
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl Prompter for TerminalPrompter {
    fn say(&mut self, text: &str) -> io::Result<()> {
        writeln!(io::stdout().lock(), "{text}")
    }

    fn input(&mut self, prompt: &str) -> Result<Option<String>, dialoguer::Error> {
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;

        Ok(non_blank(&answer))
    }

    fn password(&mut self, prompt: &str) -> Result<String, dialoguer::Error> {
        Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .interact()
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool, dialoguer::Error> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()
    }

    fn select(&mut self, prompt: &str, items: &[String]) -> Result<Option<usize>, dialoguer::Error> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact_opt()
    }

    fn multi_select(&mut self, prompt: &str, items: &[String]) -> Result<Vec<usize>, dialoguer::Error> {
        Ok(MultiSelect::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .interact_opt()?
            .unwrap_or_default())
    }
}

fn non_blank(answer: &str) -> Option<String> {
    let answer = answer.trim();
    (!answer.is_empty()).then(|| answer.to_owned())
}
