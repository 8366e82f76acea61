//! Interactive conflict prompts on the terminal.

use std::io::{BufRead, Write};

use skydrive_uploader::{ConflictAction, ConflictDecision, ConflictPrompt};
use tokio::sync::mpsc;
use tracing::warn;

/// Parses an answer: `r`ename, `o`verwrite or `s`kip. Upper case applies
/// the answer to every later collision.
pub fn parse_answer(input: &str) -> Option<ConflictDecision> {
    let c = input.trim().chars().next()?;
    let action = match c.to_ascii_lowercase() {
        'r' => ConflictAction::Rename,
        'o' => ConflictAction::Replace,
        's' => ConflictAction::Skip,
        _ => return None,
    };
    Some(ConflictDecision {
        action,
        apply_to_all: c.is_ascii_uppercase(),
    })
}

fn ask(prompt: &ConflictPrompt) -> std::io::Result<ConflictDecision> {
    let location = prompt.relative_path.as_deref().unwrap_or(&prompt.file_name);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        write!(
            stdout,
            "\"{location}\" already exists. [r]ename, [o]verwrite, [s]kip (capital letter = apply to all): "
        )?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF: nobody is there to answer.
            return Ok(ConflictDecision::once(ConflictAction::Skip));
        }
        if let Some(decision) = parse_answer(&line) {
            return Ok(decision);
        }
    }
}

/// Answers prompts from stdin until the engine goes away.
pub fn spawn(mut prompts: mpsc::Receiver<ConflictPrompt>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(prompt) = prompts.recv().await {
            let answered = tokio::task::spawn_blocking(move || {
                let decision = ask(&prompt);
                (prompt, decision)
            })
            .await;

            match answered {
                Ok((prompt, Ok(decision))) => {
                    prompt.respond(decision);
                }
                Ok((_, Err(e))) => warn!(error = %e, "failed to read conflict answer"),
                Err(e) => warn!(error = %e, "conflict prompt task failed"),
            }
        }
    })
}
