//! Baseline vs plan-execute comparison
//!
//! For each goal (command-line arguments, or two built-in research goals) runs
//! the single-call baseline and then the full pipeline, printing length,
//! latency and call counts side by side.

use plan_execute_agent::config::Config;
use plan_execute_agent::generation::provider::build_service;
use plan_execute_agent::orchestrator::baseline::run_baseline;
use plan_execute_agent::orchestrator::events::RunEvent;
use plan_execute_agent::orchestrator::utils::{line_count, word_count};
use plan_execute_agent::orchestrator::{Goal, Orchestrator};
use std::env;
use tokio::sync::mpsc;

const RESEARCH_GOALS: [&str; 2] = [
    "Summarize the key differences between supervised, unsupervised, and \
     reinforcement learning for a software engineer who is new to ML.",
    "Explain three practical use cases for RAG (retrieval-augmented generation) \
     in enterprise software, with a concrete example for each.",
];

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &flat[..end]),
        None => flat,
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::PlanningStarted { .. } => println!("\n[1/3] Planning..."),
        RunEvent::PlanReady { plan, .. } => {
            println!("Generated {}-step plan:", plan.len());
            for step in plan.steps() {
                println!("  {}. {}", step.index + 1, step.description);
            }
            println!("\n[2/3] Executing {} steps...", plan.len());
        }
        RunEvent::StepStarted {
            step_index,
            description,
        } => println!("  Executing step {}: {}", step_index + 1, preview(description, 60)),
        RunEvent::StepCompleted {
            output, elapsed_ms, ..
        } => println!("    -> {} ({} ms)", preview(output, 100), elapsed_ms),
        RunEvent::StepFailed { step_index, error } => {
            println!("    x step {} failed: {}", step_index + 1, error)
        }
        RunEvent::SynthesisStarted { .. } => println!("\n[3/3] Synthesizing final answer..."),
        RunEvent::Completed { .. } | RunEvent::Failed { .. } => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let service = build_service(&config.provider, config.retry)?;

    let args: Vec<String> = env::args().skip(1).collect();
    let goals: Vec<String> = if args.is_empty() {
        RESEARCH_GOALS.iter().map(|g| g.to_string()).collect()
    } else {
        args
    };

    println!(
        "Plan-and-execute comparison ({} via {})",
        config.provider.model, config.provider.base_url
    );

    let separator = "=".repeat(60);
    for goal in goals {
        let goal = Goal::new(goal);

        println!("\n{}", "-".repeat(60));
        println!("BASELINE (single prompt): {}", preview(goal.as_str(), 60));
        match run_baseline(service.as_ref(), &goal, config.orchestrator.baseline).await {
            Ok(answer) => println!(
                "  -> {} words, {} lines, {} ms (1 LLM call)",
                answer.word_count, answer.line_count, answer.elapsed_ms
            ),
            Err(e) => println!("  -> baseline failed: {}", e),
        }

        println!("\n{}", separator);
        println!("GOAL: {}", goal);
        println!("{}", separator);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                print_event(&event);
            }
        });

        let orchestrator =
            Orchestrator::new(service.clone(), config.orchestrator.clone()).with_events(tx);
        let result = orchestrator.run_goal(goal).await;
        drop(orchestrator);
        printer.await?;

        match result {
            Ok(outcome) => {
                let steps = outcome.trace.step_results.len();
                println!("\n{}", separator);
                println!("FINAL ANSWER:");
                println!("{}", separator);
                println!("{}", outcome.answer.text);
                println!("{}", separator);
                println!(
                    "\nAgent used {} LLM calls: 1 planner + {} executors + 1 synthesizer",
                    outcome.trace.generation_calls, steps
                );
                println!(
                    "  -> {} words, {} lines, {} ms total",
                    word_count(&outcome.answer.text),
                    line_count(&outcome.answer.text),
                    outcome.trace.elapsed_ms().unwrap_or_default()
                );
            }
            Err(failure) => {
                println!("\nRun failed: {}", failure);
                println!(
                    "  completed {} step(s) before the failure, {} LLM calls issued",
                    failure.partial_trace.step_results.len(),
                    failure.partial_trace.generation_calls
                );
            }
        }
    }

    println!("\nTakeaway:");
    println!("  - Plan-and-execute produces modular, debuggable intermediate outputs");
    println!("  - Cost: N+2 LLM calls instead of 1; useful when the task requires depth");
    Ok(())
}
