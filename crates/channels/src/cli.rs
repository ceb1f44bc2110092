//! Interactive and one-shot terminal channels.

use cclaw_agent::AgentContext;
use cclaw_core::Shutdown;
use cclaw_session::Session;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const PROMPT_USER: &str = "\x1b[1;36myou>\x1b[0m ";
const PROMPT_AGENT: &str = "\x1b[1;33mcclaw>\x1b[0m ";

fn stdout_sink(shutdown: &Shutdown) -> impl FnMut(&str) -> bool + Send + '_ {
    move |delta: &str| {
        print!("{delta}");
        let _ = std::io::stdout().flush();
        !shutdown.is_shutdown()
    }
}

/// Interactive terminal loop: read a line, run a streaming turn, repeat.
/// Recognizes `/quit` and `/exit`; empty lines are skipped. The session is
/// keyed `cli` and persists across restarts.
pub async fn interactive(agent: &AgentContext, version: &str, shutdown: Shutdown) {
    let mut session = Session::open(&agent.workspace, Some("cli"));

    println!("CClaw v{version} -- type /quit to exit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while !shutdown.is_shutdown() {
        print!("{PROMPT_USER}");
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.cancelled() => break,
        };

        let line = match line {
            Ok(Some(line)) => line.trim().to_string(),
            _ => break, // EOF or read error
        };

        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        print!("{PROMPT_AGENT}");
        let _ = std::io::stdout().flush();

        let mut sink = stdout_sink(&shutdown);
        agent.run_turn(&mut session, &line, Some(&mut sink)).await;
        println!("\n");
    }
}

/// One-shot mode: a single streamed turn against an ephemeral session.
pub async fn one_shot(agent: &AgentContext, prompt: &str, shutdown: Shutdown) {
    let mut session = Session::ephemeral();
    let mut sink = stdout_sink(&shutdown);
    agent.run_turn(&mut session, prompt, Some(&mut sink)).await;
    println!();
}
