//! Ctrl-C handling around long awaits.
//!
//! rustyline only sees Ctrl-C while it owns the terminal. A snapshot read or
//! a completion request can take seconds, so every such await is raced
//! against the signal instead. Losing the race drops the pending future and
//! returns to the caller, which then unwinds normally and lets the
//! [`Session`][pitwall_telemetry::Session] guard disconnect.

use std::future::Future;

use colored::Colorize;

/// Run `work` unless Ctrl-C arrives first; `None` when interrupted.
pub async fn interruptible<F: Future>(work: F) -> Option<F::Output> {
    let out = until_interrupted(work, tokio::signal::ctrl_c()).await;
    if out.is_none() {
        println!();
        println!("{}", "⚠  Ctrl-C received – leaving the session …".yellow().bold());
    }
    out
}

/// Race `work` against `interrupt`.
///
/// An `interrupt` that resolves to `Err` (no signal handler could be
/// installed) is ignored and `work` runs to completion.
pub async fn until_interrupted<F, I, E>(work: F, interrupt: I) -> Option<F::Output>
where
    F: Future,
    I: Future<Output = Result<(), E>>,
{
    tokio::select! {
        out = work => Some(out),
        Ok(()) = interrupt => None,
    }
}
