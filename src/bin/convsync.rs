//! Convsync demo client
//!
//! A line-oriented chat over the local SQLite backend. Run two instances
//! against the same database to talk to yourself.
//!
//! Usage: `convsync <settings.json> <user-id> <counterparty-id>`
//!
//! Plain lines are sent. Commands: `/more`, `/users`, `/actions <id>`,
//! `/edit <id>`, `/cancel`, `/delete <id>`, `/quit`.

use anyhow::{bail, Context};
use convsync::{
    conversation::{ConversationConfig, ConversationSync, ConversationView, LoadOutcome, MessageAction},
    directory::{PushTokenStore, User, UserDirectory},
    i18n::Strings,
    push::Notifier,
    storage::{Backend, Settings},
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    convsync::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        bail!("usage: {} <settings.json> <user-id> <counterparty-id>", program_name(&args));
    }
    let (settings_path, current_user, counterparty) = (&args[1], &args[2], &args[3]);

    let settings = Settings::load(settings_path).context("loading settings")?;
    let backend = Arc::new(Backend::new(&settings.database_path).context("opening database")?);

    for id in [current_user, counterparty] {
        if backend.user(id).await?.is_none() {
            backend
                .register_user(User::new(id, id, &format!("{}@localhost", id)))
                .await?;
        }
    }
    if let Ok(token) = std::env::var("CONVSYNC_PUSH_TOKEN") {
        backend.register_push_token(current_user, &token).await?;
    }

    let config = ConversationConfig::from_settings(&settings, current_user, counterparty);
    let notifier = Notifier::from_settings(&settings, backend.clone(), backend.clone());
    let sync = ConversationSync::new(config, backend.clone(), backend.clone()).with_notifier(notifier);

    sync.activate();
    sync.load_initial().await.context("loading history")?;

    let mut views = sync.watch();
    let locale = sync.config().locale;
    let strings = locale.strings();
    let render_task = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            render(&view, strings, locale.is_rtl());
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let result = match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/more", _) => match sync.load_more().await {
                Ok(LoadOutcome::Loaded { added, .. }) => {
                    println!("loaded {} older messages", added);
                    Ok(())
                }
                Ok(LoadOutcome::Skipped) => Ok(()),
                Err(e) => Err(e),
            },
            ("/users", _) => match backend.counterparts(&format!("{}@localhost", current_user)).await {
                Ok(users) => {
                    for user in users {
                        println!("{} ({})", user.name, user.id);
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
            ("/actions", id) => {
                let id = id.trim();
                for line in action_menu(id, &sync.message_actions(id), strings) {
                    println!("{}", line);
                }
                Ok(())
            }
            ("/edit", id) => sync.begin_edit(id.trim()),
            ("/cancel", _) => {
                sync.cancel_edit();
                Ok(())
            }
            ("/delete", id) => match sync.request_delete(id.trim()) {
                Ok(pending) => {
                    println!("{} {} [y/N]", strings.delete_message, strings.delete_confirmation);
                    let answer = lines.next_line().await?.unwrap_or_default();
                    if answer.trim().eq_ignore_ascii_case("y") {
                        pending.confirm().await
                    } else {
                        pending.cancel();
                        Ok(())
                    }
                }
                Err(e) => Err(e),
            },
            _ => {
                sync.set_input(line).await;
                sync.send().await.map(|_| ())
            }
        };

        if let Err(e) = result {
            eprintln!("error: {}", e);
        }
    }

    sync.deactivate();
    render_task.abort();
    Ok(())
}

fn program_name(args: &[String]) -> &str {
    args.first().map(String::as_str).unwrap_or("convsync")
}

/// Long-press menu for a message; empty when no action is offered
fn action_menu(id: &str, actions: &[MessageAction], strings: &Strings) -> Vec<String> {
    if actions.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("{}: {}", strings.message_options, strings.choose_action)];
    for action in actions {
        lines.push(match action {
            MessageAction::Edit => format!("  /edit {}  {}", id, strings.edit),
            MessageAction::Delete => format!("  /delete {}  {}", id, strings.delete),
        });
    }
    lines.push(format!("  /cancel  {}", strings.cancel));
    lines
}

fn render(view: &ConversationView, strings: &Strings, rtl: bool) {
    // Right-to-left mark
    let mark = if rtl { "\u{200F}" } else { "" };
    println!("----");
    if view.loading || view.loading_more {
        println!("{}{}", mark, strings.loading);
    }
    for message in &view.messages {
        let edited = if message.edited { strings.edited } else { "" };
        println!(
            "{}[{}] {} {}: {} {}",
            mark,
            message.id,
            message.display_time(),
            message.sender,
            message.content,
            edited
        );
    }
    if !view.typing_indicator.is_empty() {
        println!("{}{}", mark, view.typing_indicator);
    }
    if let Some(id) = &view.pending_edit_id {
        println!("({} {}: {})", strings.edit, id, view.input);
    }
}
