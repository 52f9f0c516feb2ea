//! Interactive chat
//!
//! A reedline REPL in front of an [`Assistant`]. Also supports one-shot
//! execution of a single message.

use std::borrow::Cow;

use cb_agent::Assistant;
use cb_core::Message;
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, EditCommand, Emacs, KeyCode, KeyModifiers,
    Keybindings, MenuBuilder, Prompt, PromptEditMode, PromptHistorySearch, Reedline,
    ReedlineEvent, ReedlineMenu, Signal, Span, Suggestion,
};
use tracing::info;

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show this help"),
    ("/clear", "Start a new conversation"),
    ("/history", "Show the conversation so far"),
    ("/exit", "Quit"),
    ("/quit", "Quit"),
];

/// Plain words that also end the chat
const EXIT_WORDS: &[&str] = &["exit", "quit", "bye", "goodbye"];

/// Command completer for reedline
#[derive(Clone)]
struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if !line.starts_with('/') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

struct ColoredPrompt {
    style: Style,
}

impl ColoredPrompt {
    fn new() -> Self {
        Self {
            style: Color::Cyan.bold(),
        }
    }
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(self.style.paint("you> ").to_string())
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        Cow::Borrowed("")
    }
}

/// What a line of input asks the REPL to do
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Exit,
    Clear,
    Help,
    History,
    Unknown(String),
    /// Not a command: send it to the assistant
    Chat,
}

fn parse_command(input: &str) -> Command {
    let lower = input.trim().to_lowercase();

    match lower.as_str() {
        "/exit" | "/quit" | "/q" => Command::Exit,
        "/clear" => Command::Clear,
        "/help" | "/?" => Command::Help,
        "/history" => Command::History,
        _ if lower.starts_with('/') => Command::Unknown(input.trim().to_string()),
        _ if EXIT_WORDS.contains(&lower.as_str()) => Command::Exit,
        _ => Command::Chat,
    }
}

/// Run the interactive chat until the user leaves
pub async fn run_cli(assistant: &mut dyn Assistant) -> anyhow::Result<()> {
    info!("Starting interactive chat");
    print_welcome();

    let mut keybindings = default_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![EditCommand::InsertChar('/'), EditCommand::Complete]),
    );

    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(40))
            .with_only_buffer_difference(false),
    );
    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let prompt = ColoredPrompt::new();

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                match parse_command(input) {
                    Command::Exit => break,
                    Command::Clear => {
                        assistant.reset();
                        println!("\nConversation cleared.\n");
                    }
                    Command::Help => print_help(),
                    Command::History => print_history(assistant.history()),
                    Command::Unknown(cmd) => {
                        eprintln!("\nUnknown command: {}. Type /help for the list.\n", cmd);
                    }
                    Command::Chat => {
                        let reply = assistant.respond(input).await;
                        println!("\n{}\n", Color::Green.paint(reply));
                    }
                }
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
            }
            Ok(Signal::CtrlD) => break,
            Err(err) => {
                eprintln!("\nInput error: {}\n", err);
                break;
            }
        }
    }

    println!("\nGoodbye!\n");
    Ok(())
}

/// Answer one message and exit
pub async fn run_execute(assistant: &mut dyn Assistant, message: &str) -> anyhow::Result<()> {
    let message = message.trim();
    if message.is_empty() {
        anyhow::bail!("The message is empty");
    }

    println!("{}", assistant.respond(message).await);
    Ok(())
}

fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('c'), ReedlineEvent::CtrlC);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::CtrlD);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

fn print_welcome() {
    println!();
    println!("{}", Color::Cyan.bold().paint("cb-gateway: appointment booking"));
    println!("Tell me what to book, e.g. 'Book a dentist appointment on July 8th at 5 PM for 30 minutes'.");
    println!("Commands: /help, /clear, /history, /exit");
    println!();
}

fn print_help() {
    println!();
    println!("Available commands:");
    for (cmd, desc) in COMMANDS {
        println!("  {:<10} {}", cmd, desc);
    }
    println!();
    println!("Typing exit, quit or bye also ends the chat.");
    println!();
}

fn print_history(messages: &[Message]) {
    let visible: Vec<&Message> = messages.iter().filter(|m| !m.is_tool_exchange()).collect();

    println!();
    println!("Conversation ({} messages):", visible.len());
    println!("{}", "-".repeat(50));

    for (i, msg) in visible.iter().enumerate() {
        let role = match msg.role.as_str() {
            "user" => "you",
            "assistant" => "assistant",
            other => other,
        };
        let text = msg.text_content().replace('\n', " ");
        let preview = match text.char_indices().nth(100) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text,
        };
        println!("{}. {}: {}", i + 1, role, preview);
    }

    println!("{}", "-".repeat(50));
    println!();
}
