//! Ask and chat command handlers

use std::io::Write;
use std::io::{
    self,
};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::output::*;
use crate::models::Department;
use crate::models::QueryContext;
use crate::rag::RagService;
use crate::rag::RetrievalMethod;
use crate::session::ChatSession;
use crate::session::SESSION_IDLE_TIMEOUT_SECS;
use crate::store::DocumentStore;
use crate::AppConfig;
use crate::Result;

/// Simple spinner for showing progress
struct Spinner {
    running: Arc<AtomicBool>,
}

impl Spinner {
    fn start(message: &str) -> Self {
        let message = message.to_string();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        std::thread::spawn(move || {
            let frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
            let mut idx = 0;

            while flag.load(Ordering::Relaxed) {
                print!("\r   {} {}...", frames[idx], message);
                io::stdout().flush().ok();
                idx = (idx + 1) % frames.len();
                std::thread::sleep(Duration::from_millis(80));
            }

            print!("\r{}\r", " ".repeat(80));
            io::stdout().flush().ok();
        });

        Self { running }
    }

    fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(100));
    }
}

fn build_service(config: &AppConfig, method: Option<RetrievalMethod>) -> Result<RagService> {
    let service = RagService::new(config)?;
    Ok(match method {
        Some(method) => service.with_method(method),
        None => service,
    })
}

/// Answer one question and print it
pub async fn handle_ask(
    config: &AppConfig,
    question: String,
    department: Department,
    method: Option<RetrievalMethod>,
    details: bool,
) -> Result<()> {
    let store = DocumentStore::load(config)?;
    let service = build_service(config, method)?;
    let query = QueryContext::new(question, department);

    let spinner = Spinner::start("Thinking");
    let response = service.answer_with_details(&query, &store).await;
    spinner.stop();
    let response = response?;

    if details {
        print_retrieval_details(
            service.method(),
            service.retriever(),
            &response.retrieved,
            response.final_state,
        );
    }
    print_answer(&response.result);

    Ok(())
}

/// Interactive chat keeping a bounded session history
pub async fn handle_chat(config: &AppConfig, department: Department, method: Option<RetrievalMethod>) -> Result<()> {
    let store = DocumentStore::load(config)?;
    let service = build_service(config, method)?;
    let mut session = ChatSession::new(department);

    println!("╔════════════════════════════════════════════════════════════════╗");
    println!("║  💬 Nexus Interactive Chat                                    ║");
    println!("║  Department: {}", department.label());
    println!("║  Commands: 'exit', 'quit', 'clear' (forget history), Ctrl+C   ║");
    println!("╚════════════════════════════════════════════════════════════════╝");
    println!();

    let visible = store.permitted_for(department).len();
    print_info(&format!("{visible} of {} documents are visible to you", store.len()));
    println!();

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let question = input.trim();

        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit")
            || question.eq_ignore_ascii_case("quit")
            || question.eq_ignore_ascii_case("q")
        {
            println!();
            print_success("👋 Conversation ended. Goodbye!");
            break;
        }
        if question.eq_ignore_ascii_case("clear") {
            session.clear();
            print_info("History cleared");
            println!();
            continue;
        }

        if !session.history.is_empty() && session.is_expired(SESSION_IDLE_TIMEOUT_SECS) {
            session.clear();
            print_info("Session was idle, earlier history forgotten");
        }

        let query = session.query(question);
        let spinner = Spinner::start("Thinking");
        let answer = service.answer(&query, &store).await;
        spinner.stop();

        match answer {
            Ok(answer) => {
                println!();
                print_answer(&answer);
                println!();
                session.record_exchange(question, &answer);
            }
            Err(e) => {
                print_error(&format!("Failed to answer: {e}"));
                break;
            }
        }
    }

    Ok(())
}
