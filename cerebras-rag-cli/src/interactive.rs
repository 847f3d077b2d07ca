//! Interactive chat loop and answer rendering

use anyhow::Result;
use cerebras_rag::{AnswerEvent, AskOptions, DocsAgent, MessageRole};
use futures::StreamExt;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Status,
    History,
    Threads,
    Clear,
    Citations(bool),
    Reranking(bool),
    Quit,
    Ask(String),
    Usage(String),
    Empty,
}

impl ReplCommand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Self::Empty;
        }

        let mut words = input.split_whitespace();
        let command = words.next().unwrap_or_default().to_lowercase();
        let argument = words.next().map(str::to_lowercase);
        let extra = words.next().is_some();

        match (command.as_str(), argument.as_deref(), extra) {
            ("help" | "h", None, false) => Self::Help,
            ("status", None, false) => Self::Status,
            ("history", None, false) => Self::History,
            ("threads", None, false) => Self::Threads,
            ("clear", None, false) => Self::Clear,
            ("quit" | "exit" | "q", None, false) => Self::Quit,
            ("citations", arg, false) => match parse_switch(arg) {
                Some(on) => Self::Citations(on),
                None => Self::Usage("citations on|off".to_string()),
            },
            ("reranking", arg, false) => match parse_switch(arg) {
                Some(on) => Self::Reranking(on),
                None => Self::Usage("reranking on|off".to_string()),
            },
            _ => Self::Ask(input.to_string()),
        }
    }
}

fn parse_switch(argument: Option<&str>) -> Option<bool> {
    match argument? {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Writes streamed answer events as terminal text
#[derive(Debug, Default)]
pub struct EventPrinter {
    answer_open: bool,
    sources_shown: bool,
    pub failed: bool,
}

impl EventPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print<W: Write>(&mut self, event: &AnswerEvent, out: &mut W) -> io::Result<()> {
        match event {
            AnswerEvent::Status { message } => {
                self.close_answer(out)?;
                writeln!(out, "{}", message)?;
            }
            AnswerEvent::Answer { content } => {
                if !self.answer_open {
                    write!(out, "\n🤖 Assistant: ")?;
                    self.answer_open = true;
                }
                write!(out, "{}", content)?;
                out.flush()?;
            }
            AnswerEvent::Citation {
                source_id,
                quote,
                title,
                url,
            } => {
                self.close_answer(out)?;
                if !self.sources_shown {
                    writeln!(out, "\n📚 Sources:")?;
                    self.sources_shown = true;
                }
                writeln!(out, "  [{}] {} - {}", source_id, title, url)?;
                writeln!(out, "      \"{}\"", quote)?;
            }
            AnswerEvent::Warning { message } => {
                self.close_answer(out)?;
                writeln!(out, "⚠️  {}", message)?;
            }
            AnswerEvent::Error { message } => {
                self.close_answer(out)?;
                writeln!(out, "❌ Error: {}", message)?;
            }
        }
        self.failed |= event.is_terminal();
        Ok(())
    }

    /// Terminate an answer that is still being written
    pub fn finish<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.close_answer(out)?;
        out.flush()
    }

    fn close_answer<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.answer_open {
            writeln!(out)?;
            self.answer_open = false;
        }
        Ok(())
    }
}

/// Stream one answer to stdout. Returns false when the stream ended in an error.
pub async fn stream_answer(agent: &DocsAgent, question: &str, options: &AskOptions) -> Result<bool> {
    let events = agent.stream_response(question, options);
    futures::pin_mut!(events);

    let mut printer = EventPrinter::new();
    let mut stdout = io::stdout();
    while let Some(event) = events.next().await {
        debug!(?event, "Answer event");
        printer.print(&event, &mut stdout)?;
    }
    printer.finish(&mut stdout)?;

    Ok(!printer.failed)
}

/// Interactive session over one conversation thread
pub struct ChatSession<'a> {
    agent: &'a DocsAgent,
    options: AskOptions,
}

impl<'a> ChatSession<'a> {
    pub fn new(agent: &'a DocsAgent, options: AskOptions) -> Self {
        Self { agent, options }
    }

    fn thread_label(&self) -> &str {
        self.options
            .thread
            .as_ref()
            .map(|t| t.thread_id.as_str())
            .unwrap_or(self.agent.config().memory.default_thread_id.as_str())
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("🤖 Cerebras Docs Assistant");
        println!("🧠 Model: {}", self.agent.model_name());
        println!("🆔 Thread: {}", self.thread_label());
        println!("💡 Type 'help' for commands, 'quit' to exit\n");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("💬 You: ");
            io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };

            match ReplCommand::parse(&line) {
                ReplCommand::Empty => continue,
                ReplCommand::Quit => {
                    println!("👋 Goodbye!");
                    break;
                }
                ReplCommand::Help => print_help(),
                ReplCommand::Status => self.show_status().await,
                ReplCommand::History => self.show_history().await,
                ReplCommand::Threads => self.show_threads().await,
                ReplCommand::Clear => match self.agent.clear_history(self.options.thread.as_ref()).await {
                    Ok(()) => println!("🧹 Thread '{}' cleared", self.thread_label()),
                    Err(e) => println!("❌ Failed to clear history: {}", e),
                },
                ReplCommand::Citations(on) => {
                    self.options.use_citations = on;
                    println!("📎 Citations {}", on_off(on));
                }
                ReplCommand::Reranking(on) => {
                    self.options.use_reranking = on;
                    println!("🔀 Reranking {}", on_off(on));
                }
                ReplCommand::Usage(usage) => println!("Usage: {}", usage),
                ReplCommand::Ask(question) => {
                    // Errors are shown by the printer; the session continues
                    stream_answer(self.agent, &question, &self.options).await?;
                    println!();
                }
            }
        }

        Ok(())
    }

    async fn show_status(&self) {
        let status = self.agent.initialize_vector_store().await;
        let icon = if status.success { "✅" } else { "❌" };
        println!("{} Vector store: {}", icon, status.message);
        println!("🧠 Model: {}", self.agent.model_name());
        println!("🆔 Thread: {}", self.thread_label());
        println!("📎 Citations: {}", on_off(self.options.use_citations));
        println!("🔀 Reranking: {}", on_off(self.options.use_reranking));
    }

    async fn show_history(&self) {
        match self.agent.conversation_history(self.options.thread.as_ref()).await {
            Ok(messages) if messages.is_empty() => println!("📜 No messages in this thread yet."),
            Ok(messages) => {
                println!("📜 Conversation ({} messages):", messages.len());
                for message in &messages {
                    let icon = match message.role {
                        MessageRole::User => "💬 You",
                        MessageRole::Assistant => "🤖 Assistant",
                    };
                    println!("{}: {}", icon, preview(&message.content, 200));
                }
            }
            Err(e) => println!("❌ Failed to load history: {}", e),
        }
    }

    async fn show_threads(&self) {
        match self.agent.list_threads().await {
            Ok(threads) if threads.is_empty() => println!("📋 No saved threads."),
            Ok(threads) => {
                println!("📋 Threads:");
                for (i, thread) in threads.iter().enumerate() {
                    println!("  {}. {}", i + 1, thread);
                }
            }
            Err(e) => println!("❌ Failed to list threads: {}", e),
        }
    }
}

fn print_help() {
    println!("🔧 Available commands:");
    println!("  help                 - Show this help message");
    println!("  status               - Show vector store and session settings");
    println!("  history              - Show this thread's conversation");
    println!("  threads              - List known threads");
    println!("  clear                - Forget this thread's conversation");
    println!("  citations on|off     - Toggle quoted citations");
    println!("  reranking on|off     - Toggle reranking of retrieved chunks");
    println!("  quit, exit           - Leave the chat");
    println!("  <question>           - Ask about the Cerebras API docs\n");
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// First `max_chars` characters of `text`
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ReplCommand::parse("  "), ReplCommand::Empty);
        assert_eq!(ReplCommand::parse("help"), ReplCommand::Help);
        assert_eq!(ReplCommand::parse("STATUS"), ReplCommand::Status);
        assert_eq!(ReplCommand::parse("history"), ReplCommand::History);
        assert_eq!(ReplCommand::parse("exit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("quit"), ReplCommand::Quit);
        assert_eq!(
            ReplCommand::parse("citations off"),
            ReplCommand::Citations(false)
        );
        assert_eq!(
            ReplCommand::parse("Reranking ON"),
            ReplCommand::Reranking(true)
        );
    }

    #[test]
    fn test_parse_bad_switch() {
        assert_eq!(
            ReplCommand::parse("citations maybe"),
            ReplCommand::Usage("citations on|off".to_string())
        );
        assert_eq!(
            ReplCommand::parse("reranking"),
            ReplCommand::Usage("reranking on|off".to_string())
        );
    }

    #[test]
    fn test_questions_pass_through() {
        assert_eq!(
            ReplCommand::parse("How do I authenticate with the Cerebras API?"),
            ReplCommand::Ask("How do I authenticate with the Cerebras API?".to_string())
        );
        // Command words followed by more text are questions
        assert_eq!(
            ReplCommand::parse("history of the streaming API"),
            ReplCommand::Ask("history of the streaming API".to_string())
        );
    }

    #[test]
    fn test_printer_sources_header_once() {
        let events = vec![
            AnswerEvent::status("🔍 Searching documentation..."),
            AnswerEvent::Answer {
                content: "Use an API key.".to_string(),
            },
            AnswerEvent::Citation {
                source_id: 0,
                quote: "API key".to_string(),
                title: "Auth".to_string(),
                url: "https://inference-docs.cerebras.ai/auth".to_string(),
            },
            AnswerEvent::Citation {
                source_id: 2,
                quote: "Bearer".to_string(),
                title: "Quickstart".to_string(),
                url: "https://inference-docs.cerebras.ai/quickstart".to_string(),
            },
        ];

        let mut printer = EventPrinter::new();
        let mut out = Vec::new();
        for event in &events {
            printer.print(event, &mut out).unwrap();
        }
        printer.finish(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("📚 Sources:").count(), 1);
        assert!(text.contains("🤖 Assistant: Use an API key.\n"));
        assert!(text.contains("[2] Quickstart - https://inference-docs.cerebras.ai/quickstart"));
        assert!(!printer.failed);
    }

    #[test]
    fn test_printer_joins_deltas_and_flags_errors() {
        let mut printer = EventPrinter::new();
        let mut out = Vec::new();
        for piece in ["Hello ", "there"] {
            let event = AnswerEvent::Answer {
                content: piece.to_string(),
            };
            printer.print(&event, &mut out).unwrap();
        }
        printer
            .print(&AnswerEvent::error("model unavailable"), &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("🤖 Assistant: Hello there\n❌ Error: model unavailable"));
        assert!(printer.failed);
    }

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
    }
}
