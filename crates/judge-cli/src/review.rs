use futures::StreamExt;
use judge_agent::{
    AgentError, RoundOptions, SPECIALIST_ACTIONS, Session, initial_review_prompt,
};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const RULE_WIDTH: usize = 60;

/// Runs the initial review round, then follow-up rounds until the user quits.
pub async fn run_interactive(
    mut session: Session,
    source: &str,
    target: &str,
    notes: Option<&str>,
) -> Result<(), String> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut round = 1usize;
    let mut input = initial_review_prompt(source, target, notes);
    let mut options = RoundOptions::requiring(SPECIALIST_ACTIONS);

    loop {
        print_header(round, round_title(round));
        match stream_round(&mut session, input, options).await {
            Ok(()) => {}
            Err(AgentError::Aborted) => println!("\n[round aborted]"),
            // The round is lost but the session keeps its history.
            Err(error) => eprintln!("\nerror: {error}"),
        }

        println!("\n\nEnter follow-up feedback (or 'q' to quit):");
        print!("> ");
        flush_stdout();
        let line = tokio::select! {
            line = lines.next_line() => line.map_err(|error| error.to_string())?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let feedback = line.trim();
        if is_quit(feedback) {
            break;
        }

        input = feedback.to_string();
        options = RoundOptions::default();
        round += 1;
    }

    session.end().map_err(|error| error.to_string())?;
    println!("\nReview session complete.");
    Ok(())
}

/// Prints coordinator text as it arrives. Ctrl-C aborts the round, not the
/// process.
async fn stream_round(
    session: &mut Session,
    input: String,
    options: RoundOptions,
) -> Result<(), AgentError> {
    let abort = session.abort_handle();
    let mut round = session.submit_round_with_options(input, options);
    loop {
        tokio::select! {
            item = round.next() => match item {
                Some(Ok(fragment)) => {
                    print!("{fragment}");
                    flush_stdout();
                }
                Some(Err(error)) => return Err(error),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received; aborting round");
                abort.request_abort();
            }
        }
    }
    if let Some(outcome) = round.outcome() {
        tracing::debug!(
            round = outcome.round,
            action_cycles = outcome.action_cycles,
            total_tokens = outcome.usage.total_tokens,
            "round finished"
        );
        if !outcome.missing_actions.is_empty() {
            eprintln!(
                "\nwarning: review concluded without calling {}",
                outcome.missing_actions.join(", ")
            );
        }
    }
    Ok(())
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

fn round_title(round: usize) -> &'static str {
    if round == 1 {
        "Initial Code Review"
    } else {
        "Follow-up Review"
    }
}

fn print_header(round: usize, title: &str) {
    println!("\n{}", "=".repeat(RULE_WIDTH));
    println!("ROUND {round} — {title}");
    println!("{}\n", "=".repeat(RULE_WIDTH));
}

pub fn is_quit(input: &str) -> bool {
    matches!(
        input.trim().to_ascii_lowercase().as_str(),
        "" | "q" | "quit" | "exit" | "done"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_words_end_the_session() {
        for input in ["", "  ", "q", "QUIT", "exit", "Done\n"] {
            assert!(is_quit(input), "{input:?} should quit");
        }
        assert!(!is_quit("please look at Foo.swift again"));
        assert!(!is_quit("question"));
    }

    #[test]
    fn only_the_first_round_is_the_initial_review() {
        assert_eq!(round_title(1), "Initial Code Review");
        assert_eq!(round_title(2), "Follow-up Review");
    }
}
