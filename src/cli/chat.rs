use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::watch;

use crate::ai::chat::{ChatBuilder, ChatRole, ChatState, ChatView, TurnOutcome};
use crate::ai::gateway::ProjectContext;
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::gemini::GeminiGateway;
use crate::projects::{ProjectRepository, SqliteProjectRepository};

/// Prints a transcript incrementally as views are published. User
/// messages are skipped since they were just typed in.
#[derive(Default)]
struct Printer {
    // Messages printed in full
    printed: usize,
    // Bytes already printed of the message being streamed
    partial: usize,
    // Set once the streamed message's prefix is out
    prefix_printed: bool,
    status: Option<String>,
}

impl Printer {
    fn print(&mut self, view: &ChatView) {
        let mut out = std::io::stdout();
        let _ = self.write_view(&mut out, view);
        let _ = out.flush();
    }

    fn write_view(&mut self, out: &mut impl Write, view: &ChatView) -> std::io::Result<()> {
        if view.status != self.status {
            if let Some(status) = &view.status {
                writeln!(out, "  {}", status)?;
            }
            self.status = view.status.clone();
        }

        while let Some(msg) = view.messages.get(self.printed) {
            if msg.role == ChatRole::Model {
                if !self.prefix_printed {
                    write!(out, "tutor> ")?;
                    self.prefix_printed = true;
                }
                write!(out, "{}", &msg.text[self.partial..])?;
            }
            if msg.pending {
                self.partial = msg.text.len();
                break;
            }
            if msg.role == ChatRole::Model {
                writeln!(out)?;
            }
            self.printed += 1;
            self.partial = 0;
            self.prefix_printed = false;
        }
        Ok(())
    }
}

/// Drives `fut` to completion while printing every view it publishes.
async fn printing<T>(
    fut: impl Future<Output = T>,
    views: &mut watch::Receiver<ChatView>,
    printer: &mut Printer,
) -> T {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            out = &mut fut => return out,
            changed = views.changed() => match changed {
                Ok(()) => printer.print(&views.borrow_and_update()),
                Err(_) => return fut.await,
            },
        }
    }
}

pub async fn run(config: &AppConfig, project_id: &str) -> Result<()> {
    let db = async_db(&config.db_path).await?;
    let project = SqliteProjectRepository::new(&db)
        .find(project_id)
        .await?
        .ok_or_else(|| anyhow!("No project with id {}", project_id))?;

    println!("AI tutor for {} ({})", project.title, project.language);
    println!("Type /retry to reconnect or /quit to leave");

    let gateway = Arc::new(GeminiGateway::from_config(config));
    let mut chat = ChatBuilder::new(gateway, ProjectContext::from(&project))
        .config(config)
        .build();
    let mut views = chat.subscribe();
    let mut printer = Printer::default();

    let state = printing(chat.activate(), &mut views, &mut printer).await;
    printer.print(&chat.view());
    if state == ChatState::Failed {
        println!("AI connection failed. Type /retry to try again");
    }

    let mut rl = DefaultEditor::new()?;
    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                match line {
                    "" => continue,
                    "/quit" => break,
                    "/retry" => {
                        let state = printing(chat.retry(), &mut views, &mut printer).await;
                        printer.print(&chat.view());
                        if state == ChatState::Failed {
                            println!("AI connection failed. Type /retry to try again");
                        }
                    }
                    _ => {
                        let _ = rl.add_history_entry(line);
                        let outcome =
                            printing(chat.send_message(line), &mut views, &mut printer).await;
                        printer.print(&chat.view());
                        if outcome == TurnOutcome::Ignored {
                            println!("The tutor is not connected. Type /retry to try again");
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::chat::{ChatMessage, LOST_CONNECTION_MESSAGE};

    fn view(state: ChatState, messages: Vec<ChatMessage>) -> ChatView {
        ChatView {
            state,
            status: None,
            messages,
        }
    }

    fn pending(text: &str) -> ChatMessage {
        ChatMessage {
            pending: true,
            ..ChatMessage::model(text)
        }
    }

    fn render(printer: &mut Printer, views: &[ChatView]) -> String {
        let mut out = Vec::new();
        for v in views {
            printer.write_view(&mut out, v).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_streamed_reply_has_one_prefix() {
        let mut printer = Printer::default();
        let user = ChatMessage::user("hi");
        let out = render(
            &mut printer,
            &[
                view(ChatState::Streaming, vec![user.clone(), pending("")]),
                view(ChatState::Streaming, vec![user.clone(), pending("Hel")]),
                view(ChatState::Streaming, vec![user.clone(), pending("Hello")]),
                view(ChatState::Ready, vec![user, ChatMessage::model("Hello")]),
            ],
        );
        assert_eq!(out, "tutor> Hello\n");
    }

    #[test]
    fn test_error_without_fragments() {
        let mut printer = Printer::default();
        let user = ChatMessage::user("hi");
        let out = render(
            &mut printer,
            &[
                view(ChatState::Streaming, vec![user.clone(), pending("")]),
                view(
                    ChatState::Ready,
                    vec![
                        user,
                        ChatMessage::model(""),
                        ChatMessage::model(LOST_CONNECTION_MESSAGE),
                    ],
                ),
            ],
        );
        assert_eq!(
            out,
            format!("tutor> \ntutor> {}\n", LOST_CONNECTION_MESSAGE)
        );
    }

    #[test]
    fn test_status_lines_print_once() {
        let mut printer = Printer::default();
        let analyzing = ChatView {
            state: ChatState::Analyzing,
            status: Some("> Parsing Rust syntax trees...".to_string()),
            messages: Vec::new(),
        };
        let out = render(&mut printer, &[analyzing.clone(), analyzing]);
        assert_eq!(out, "  > Parsing Rust syntax trees...\n");
    }
}
