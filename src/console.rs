//! Interactive console front end
//!
//! A blocking command menu over async I/O. Each option maps to a credential
//! update followed by re-initialization, or to a chat sub-loop.

use crate::agent::Agent;
use crate::config::present;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

const MENU: &str = "Options:\n\
    1. Update OPENAI_ASSISTANT_ID\n\
    2. Send messages\n\
    3. Update OPENAI_API_KEY\n\
    4. Exit";
const CHAT_PROMPT: &str = "Type your message (or 'exit' to return to the main menu):";
const EXIT_COMMAND: &str = "exit";

/// Line-oriented prompting over any reader/writer pair
pub struct Prompter<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R, W> Prompter<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, out: W) -> Self {
        Self {
            lines: reader.lines(),
            out,
        }
    }

    pub async fn say(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }

    /// Next raw line, `None` at end of input
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }

    /// Ask until a non-empty line arrives. `None` at end of input.
    pub async fn read_valid_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        loop {
            self.say(prompt).await?;
            let Some(line) = self.next_line().await? else {
                return Ok(None);
            };
            let line = line.trim();
            if line.is_empty() {
                self.say("Input cannot be empty.").await?;
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }

    /// Use `current` when it holds something, otherwise ask for `name`
    pub async fn value_or_prompt(
        &mut self,
        current: Option<&str>,
        name: &str,
    ) -> io::Result<Option<String>> {
        if let Some(value) = present(current) {
            return Ok(Some(value.to_string()));
        }
        self.read_valid_line(&format!("{name} is not set. Please enter {name}:"))
            .await
    }
}

/// The command menu
pub struct Console<R, W> {
    agent: Arc<Agent>,
    prompter: Prompter<R, W>,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(agent: Arc<Agent>, prompter: Prompter<R, W>) -> Self {
        Self { agent, prompter }
    }

    /// Initialize and report the outcome without leaving the menu
    pub async fn initialize(&mut self) -> io::Result<()> {
        match self.agent.initialize().await {
            Ok(()) => self.prompter.say("Assistant ready.").await,
            Err(e) => {
                tracing::warn!(error = %e, "Initialization failed");
                self.prompter.say(&format!("Error: {e}")).await
            }
        }
    }

    /// Run the menu until the user exits or input ends. Shuts the agent down
    /// on the way out.
    pub async fn run(mut self) -> io::Result<()> {
        let result = self.menu_loop().await;
        self.agent.shutdown();
        result
    }

    async fn menu_loop(&mut self) -> io::Result<()> {
        loop {
            self.prompter.say(MENU).await?;
            let Some(choice) = self.prompter.next_line().await? else {
                return Ok(());
            };
            match choice.trim() {
                "1" => {
                    if !self.update_assistant_id().await? {
                        return Ok(());
                    }
                }
                "2" => {
                    if !self.chat_loop().await? {
                        return Ok(());
                    }
                }
                "3" => {
                    if !self.update_api_token().await? {
                        return Ok(());
                    }
                }
                "4" => {
                    self.prompter.say("Closing application...").await?;
                    return Ok(());
                }
                _ => self.prompter.say("Unrecognized option, try again.").await?,
            }
        }
    }

    /// Returns false when input ended
    async fn update_assistant_id(&mut self) -> io::Result<bool> {
        let Some(id) = self
            .prompter
            .read_valid_line("Enter the new OPENAI_ASSISTANT_ID:")
            .await?
        else {
            return Ok(false);
        };
        match self.agent.set_assistant_id(id) {
            Ok(()) => {
                self.prompter
                    .say("OPENAI_ASSISTANT_ID updated. Re-initializing the assistant...")
                    .await?;
                self.initialize().await?;
            }
            Err(e) => self.prompter.say(&format!("Error: {e}")).await?,
        }
        Ok(true)
    }

    /// Returns false when input ended
    async fn update_api_token(&mut self) -> io::Result<bool> {
        let Some(token) = self
            .prompter
            .read_valid_line("Enter the new OPENAI_API_KEY:")
            .await?
        else {
            return Ok(false);
        };
        match self.agent.set_token(token) {
            Ok(()) => {
                self.prompter
                    .say("OPENAI_API_KEY updated. Re-initializing the assistant...")
                    .await?;
                self.initialize().await?;
            }
            Err(e) => self.prompter.say(&format!("Error: {e}")).await?,
        }
        Ok(true)
    }

    /// Returns false when input ended
    async fn chat_loop(&mut self) -> io::Result<bool> {
        loop {
            let Some(message) = self.prompter.read_valid_line(CHAT_PROMPT).await? else {
                return Ok(false);
            };
            if message.eq_ignore_ascii_case(EXIT_COMMAND) {
                return Ok(true);
            }
            let reply = self.agent.chat(&message).await;
            self.prompter.say(&format!("Reply: {reply}")).await?;
        }
    }
}
