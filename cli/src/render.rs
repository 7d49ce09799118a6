//! Terminal rendering of client progress and results.

use std::io::{self, Write};

use arbor_engine::SearchOutcome;
use arbor_providers::Progress;
use arbor_types::StateScores;
use crossterm::execute;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use tokio::sync::mpsc;

fn colored(out: &mut impl Write, color: Color, text: &str) -> io::Result<()> {
    execute!(out, SetForegroundColor(color), Print(text), ResetColor)
}

fn heading(out: &mut impl Write, text: &str) -> io::Result<()> {
    execute!(
        out,
        SetAttribute(Attribute::Bold),
        Print(text),
        SetAttribute(Attribute::Reset),
        Print("\n")
    )
}

/// Streamed text goes to `out`; counters and retries to `diag`.
///
/// `quiet` silences streamed text and token counters. Retry notices always show.
pub(crate) fn render_event(
    out: &mut impl Write,
    diag: &mut impl Write,
    event: &Progress,
    quiet: bool,
) -> io::Result<()> {
    match event {
        Progress::Fragment(text) => {
            if !quiet {
                colored(out, Color::Green, text)?;
            }
        }
        Progress::Usage {
            call_fragments,
            session_total,
        } => {
            if quiet {
                return Ok(());
            }
            writeln!(out)?;
            colored(
                diag,
                Color::Red,
                &format!("Tokens used this time: {call_fragments}\n"),
            )?;
            colored(
                diag,
                Color::Yellow,
                &format!("Tokens used so far: {session_total}\n"),
            )?;
        }
        Progress::Retry {
            attempt,
            delay,
            error,
        } => {
            // Text from the failed attempt stays on screen; start the retry on a fresh line.
            if !quiet {
                writeln!(out)?;
                colored(out, Color::DarkGrey, "[discarded]\n")?;
            }
            colored(
                diag,
                Color::Yellow,
                &format!(
                    "Request failed (attempt {attempt}): {error}; retrying in {:.1}s\n",
                    delay.as_secs_f64()
                ),
            )?;
        }
    }
    Ok(())
}

/// Drain `rx` until every sender is dropped.
pub(crate) async fn render_progress(mut rx: mpsc::UnboundedReceiver<Progress>, quiet: bool) {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    while let Some(event) = rx.recv().await {
        if let Err(e) = render_event(&mut stdout, &mut stderr, &event, quiet) {
            tracing::debug!(%e, "Progress output failed");
        }
    }
}

pub(crate) fn print_thoughts(out: &mut impl Write, thoughts: &[String]) -> io::Result<()> {
    heading(out, "Thoughts")?;
    for (i, thought) in thoughts.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, thought.trim())?;
    }
    Ok(())
}

pub(crate) fn print_scores(out: &mut impl Write, scores: &StateScores) -> io::Result<()> {
    heading(out, "Scores")?;
    for (state, score) in scores.iter() {
        writeln!(out, "{:>5.2}  {}", score.as_f64(), state.render().replace('\n', " | "))?;
    }
    Ok(())
}

pub(crate) fn print_outcome(out: &mut impl Write, outcome: &SearchOutcome) -> io::Result<()> {
    heading(out, "Best reasoning")?;
    for (i, step) in outcome.best_state.steps().iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, step.trim())?;
    }
    writeln!(
        out,
        "score {:.2} after {} step(s), {} rejected",
        outcome.best_score,
        outcome.steps.len(),
        outcome.rejected.len()
    )?;
    writeln!(out)?;

    heading(out, "Solution")?;
    match &outcome.solution {
        Some(solution) => writeln!(out, "{}", solution.trim()),
        None => colored(out, Color::Red, "No solution generated\n"),
    }
}
