//! stdin/stdout REPL: each line is submitted as one job.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::router::{JobResponse, Router};

/// Read tasks until EOF or `/quit`, printing each job's results.
pub async fn run_repl<R>(router: Arc<Router>, input: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    eprint!("> ");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                break;
            }
        };

        let task = line.trim();
        if task.is_empty() {
            eprint!("> ");
            continue;
        }
        if task == "/quit" || task == "/exit" {
            break;
        }

        match router.handle(task).await {
            Ok(response) => println!("\n{}\n", render(&response)),
            Err(e) => eprintln!("Job failed: {e}"),
        }
        eprint!("> ");
    }
}

/// Plain-text rendering of a job response.
pub fn render(response: &JobResponse) -> String {
    if response.needs_clarification {
        return format!(
            "{}\n? {}",
            response.plan,
            response.clarification_question.as_deref().unwrap_or_default()
        );
    }

    let mut out = response.plan.clone();
    for result in &response.results {
        out.push_str(&format!("\n\n── {} ({}) ──\n", result.worker_name, result.worker_id));
        if result.success {
            out.push_str(&result.output);
        } else {
            out.push_str(&format!(
                "failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::WorkerResult;

    #[test]
    fn renders_results_and_failures() {
        let response = JobResponse {
            session_id: "s".into(),
            needs_clarification: false,
            clarification_question: None,
            plan: "Two workers on it.".into(),
            results: vec![
                WorkerResult::success("writer", "Wren", "Hello!".into()),
                WorkerResult::failure("intern", "intern", "Worker intern not found"),
            ],
        };
        let text = render(&response);
        assert!(text.starts_with("Two workers on it."));
        assert!(text.contains("── Wren (writer) ──\nHello!"));
        assert!(text.contains("failed: Worker intern not found"));
    }

    #[test]
    fn renders_clarification() {
        let response = JobResponse {
            session_id: "s".into(),
            needs_clarification: true,
            clarification_question: Some("Which report?".into()),
            plan: "Need more detail.".into(),
            results: Vec::new(),
        };
        assert_eq!(render(&response), "Need more detail.\n? Which report?");
    }
}
