pub mod conversation_state;
pub mod indicator;
pub mod prompt;
pub mod session;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use color_print::cformat;
use conversation_state::{Message, Role};
use eyre::Result;
use indicator::{Indicator, BLINK_INTERVAL};
use prompt::generate_prompt;
use rustyline::error::ReadlineError;
use session::ChatSessionManager;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::gemini_client::ChatProvider;

const WELCOME_TEXT: &str = "
Hi, I'm Gemini Chat. Ask me anything.

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
Gemini Chat CLI

/clear        Start a new conversation
/help         Show this help dialogue
/quit         Quit the application
";

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    provider: Arc<dyn ChatProvider>,
    session: ChatSessionManager,
    /// Number of messages of the current conversation already on screen.
    rendered: usize,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        provider: Arc<dyn ChatProvider>,
    ) -> Self {
        let session = ChatSessionManager::new(Arc::clone(&provider));
        Self {
            output,
            input,
            interactive,
            provider,
            session,
            rendered: 0,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Handle non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(ExitCode::SUCCESS);
        }

        if self.interactive {
            writeln!(self.output, "{}", WELCOME_TEXT)?;
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            match rl.readline(&generate_prompt()) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if line.trim() == "/quit" {
                        break;
                    }

                    self.handle_input(&line).await?;
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        match input.trim() {
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                info!(
                    dropped_remote_session = self.session.has_remote_session(),
                    "Started a new conversation"
                );
                self.session = ChatSessionManager::new(Arc::clone(&self.provider));
                self.rendered = 0;
                writeln!(self.output, "Conversation cleared.")?;
            }
            _ => self.send(input).await?,
        }

        Ok(())
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        if let Err(e) = self.session.submit(text) {
            writeln!(self.output, "{}", cformat!("<yellow>{}</>", e))?;
            return Ok(());
        }
        self.render_new()?;

        let mut indicator = Indicator::new();
        let mut ticker = interval(BLINK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.session.settle() => break,
                _ = ticker.tick() => indicator.blink(&mut self.output)?,
            }
        }

        indicator.clear(&mut self.output)?;
        self.render_new()
    }

    /// Print every message appended since the last render, oldest first.
    fn render_new(&mut self) -> Result<()> {
        let messages = self.session.messages();
        for message in &messages[self.rendered..] {
            // the prompt line already shows what the user typed
            if self.interactive && message.role() == Role::User {
                continue;
            }
            debug!(id = %message.id(), role = ?message.role(), "Rendering message");
            writeln!(self.output, "{}", format_message(message))?;
        }
        self.rendered = messages.len();
        self.output.flush()?;
        Ok(())
    }
}

fn format_message(message: &Message) -> String {
    match message.role() {
        Role::User => cformat!("<green,bold>you</>: {}", message.text()),
        Role::Assistant => cformat!("<blue,bold>gemini</>: {}\n", message.text()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::gemini_client::{Content, GeminiError, RemoteChat};
    use crate::cli::chat::session::FALLBACK_TEXT;

    /// Cloneable in-memory sink so tests can read what was printed.
    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl SharedOutput {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct CannedProvider {
        replies: Arc<Mutex<VecDeque<Option<String>>>>,
        started: Mutex<usize>,
    }

    impl CannedProvider {
        fn new(replies: Vec<Option<&str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Arc::new(Mutex::new(
                    replies.into_iter().map(|r| r.map(str::to_string)).collect(),
                )),
                started: Mutex::new(0),
            })
        }
    }

    impl ChatProvider for CannedProvider {
        fn start_chat(&self, _history: Vec<Content>) -> Box<dyn RemoteChat> {
            *self.started.lock().unwrap() += 1;
            Box::new(CannedChat(Arc::clone(&self.replies)))
        }
    }

    struct CannedChat(Arc<Mutex<VecDeque<Option<String>>>>);

    #[async_trait]
    impl RemoteChat for CannedChat {
        async fn send_message(&mut self, _text: &str) -> Result<Option<String>, GeminiError> {
            Ok(self.0.lock().unwrap().pop_front().flatten())
        }
    }

    fn context(provider: Arc<CannedProvider>, interactive: bool) -> (ChatContext, SharedOutput) {
        let output = SharedOutput::default();
        let ctx = ChatContext::new(Box::new(output.clone()), None, interactive, provider);
        (ctx, output)
    }

    #[tokio::test]
    async fn one_shot_prints_exchange() {
        let provider = CannedProvider::new(vec![Some("Hi there!")]);
        let output = SharedOutput::default();
        let mut ctx = ChatContext::new(
            Box::new(output.clone()),
            Some("Hello".to_string()),
            false,
            provider,
        );

        let code = ctx.run().await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let printed = output.contents();
        let user_at = printed.find("Hello").unwrap();
        let reply_at = printed.find("Hi there!").unwrap();
        assert!(user_at < reply_at);
        assert_eq!(ctx.session.messages().len(), 2);
    }

    #[tokio::test]
    async fn interactive_mode_does_not_echo_user_text() {
        let provider = CannedProvider::new(vec![None]);
        let (mut ctx, output) = context(provider, true);

        ctx.handle_input("Hello").await.unwrap();

        let printed = output.contents();
        assert!(!printed.contains("Hello"));
        assert!(printed.contains(FALLBACK_TEXT));
        assert_eq!(ctx.rendered, 2);
    }

    #[tokio::test]
    async fn clear_starts_a_new_conversation() {
        let provider = CannedProvider::new(vec![Some("one"), Some("two")]);
        let (mut ctx, output) = context(provider.clone(), false);

        ctx.handle_input("first").await.unwrap();
        ctx.handle_input("/clear").await.unwrap();
        assert!(ctx.session.messages().is_empty());
        assert!(!ctx.session.has_remote_session());
        assert_eq!(ctx.rendered, 0);

        ctx.handle_input("second").await.unwrap();
        assert_eq!(ctx.session.messages().len(), 2);
        assert_eq!(*provider.started.lock().unwrap(), 2);
        assert!(output.contents().contains("Conversation cleared."));
    }

    #[tokio::test]
    async fn blank_message_prints_notice_only() {
        let provider = CannedProvider::new(vec![]);
        let (mut ctx, output) = context(provider.clone(), false);

        ctx.send("   ").await.unwrap();

        assert!(output.contents().contains("Message is empty."));
        assert!(ctx.session.messages().is_empty());
        assert_eq!(*provider.started.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn help_lists_commands() {
        let provider = CannedProvider::new(vec![]);
        let (mut ctx, output) = context(provider, true);

        ctx.handle_input("/help").await.unwrap();

        let printed = output.contents();
        for command in ["/clear", "/help", "/quit"] {
            assert!(printed.contains(command));
        }
    }
}
