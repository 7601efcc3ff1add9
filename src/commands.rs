use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::chat::ChatClient;
use crate::config::Config;
use crate::retriever::SearchResult;
use crate::session::KnowledgeBase;

/// Characters of chunk text shown per result in terminal output
const PREVIEW_CHARS: usize = 240;

/// Outcome of ingesting the files named on the command line
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub documents_added: usize,
    pub chunks_added: usize,
    pub failed: Vec<(PathBuf, String)>,
}

/// Ingest every file, reporting failures without aborting the others
#[inline]
pub async fn ingest_files(knowledge_base: &KnowledgeBase, files: &[PathBuf]) -> IngestSummary {
    let mut summary = IngestSummary::default();

    for file in files {
        let bar = progress_bar(file);
        let result = knowledge_base
            .add_file_with_progress(file, &|done, total| {
                bar.set_length(total as u64);
                bar.set_position(done as u64);
            })
            .await;
        bar.finish_and_clear();

        match result {
            Ok(ingested) => {
                eprintln!(
                    "{} {} ({} pages, {} chunks)",
                    style("✓").green(),
                    ingested.metadata.filename,
                    ingested.metadata.page_count,
                    ingested.chunks_added
                );
                summary.documents_added += 1;
                summary.chunks_added += ingested.chunks_added;
            }
            Err(e) => {
                warn!("Skipping {}: {}", file.display(), e);
                eprintln!("{} {}: {}", style("✗").red(), file.display(), e);
                summary.failed.push((file.clone(), e.to_string()));
            }
        }
    }

    info!(
        "Ingested {} documents ({} chunks), {} failed",
        summary.documents_added,
        summary.chunks_added,
        summary.failed.len()
    );
    summary
}

/// Ingest `files` and print the passages most similar to `query`
#[inline]
pub async fn search_documents(
    files: &[PathBuf],
    query: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let knowledge_base = open_with_files(&config, files).await?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let results = knowledge_base
        .search(query, top_k)
        .await
        .with_context(|| format!("Search for '{}' failed", query))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&results).context("Failed to serialize results")?
        );
    } else if results.is_empty() {
        println!("No matching passages found.");
    } else {
        for (rank, result) in results.iter().enumerate() {
            println!("{}", format_result(rank + 1, result));
        }
    }

    knowledge_base.close().await;
    Ok(())
}

/// Ingest `files`, retrieve context for `question` and print the model's answer
#[inline]
pub async fn ask_question(files: &[PathBuf], question: &str, top_k: Option<usize>) -> Result<()> {
    let config = load_config()?;
    let chat = chat_client(&config)?;
    let knowledge_base = open_with_files(&config, files).await?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let answer = answer(&knowledge_base, &chat, question, top_k).await?;
    println!("{}", answer);

    knowledge_base.close().await;
    Ok(())
}

/// Interactive question loop over the ingested files
#[inline]
pub async fn run_chat(files: &[PathBuf]) -> Result<()> {
    let config = load_config()?;
    let chat = chat_client(&config)?;
    let knowledge_base = open_with_files(&config, files).await?;
    let top_k = config.retrieval.top_k;

    eprintln!(
        "{}",
        style("Ask about your documents. /docs lists them, /clear empties the knowledge base, /quit exits.")
            .dim()
    );

    loop {
        let line: String = Input::new()
            .with_prompt(">")
            .allow_empty(true)
            .interact_text()?;

        match ChatCommand::parse(&line) {
            ChatCommand::Empty => {}
            ChatCommand::Quit => break,
            ChatCommand::Documents => {
                let documents = knowledge_base.documents().await;
                if documents.is_empty() {
                    eprintln!("No documents loaded.");
                }
                for document in documents {
                    eprintln!(
                        "  {} ({} pages, {} chunks, added {})",
                        document.metadata.filename,
                        document.metadata.page_count,
                        document.chunk_count,
                        document.metadata.uploaded_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            ChatCommand::Clear => {
                knowledge_base.clear_all().await;
                eprintln!("{}", style("Knowledge base cleared.").yellow());
            }
            ChatCommand::Question(question) => {
                if knowledge_base.document_count().await == 0 {
                    eprintln!("No documents loaded; nothing to search.");
                    continue;
                }
                match answer(&knowledge_base, &chat, question, top_k).await {
                    Ok(text) => println!("\n{}\n", text),
                    Err(e) => eprintln!("{} {:#}", style("Error:").red(), e),
                }
            }
        }
    }

    knowledge_base.close().await;
    Ok(())
}

/// A line typed into the chat loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand<'a> {
    Empty,
    Quit,
    Clear,
    Documents,
    Question(&'a str),
}

impl<'a> ChatCommand<'a> {
    #[inline]
    pub fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/quit" | "/exit" => Self::Quit,
            "/clear" => Self::Clear,
            "/docs" => Self::Documents,
            question => Self::Question(question),
        }
    }
}

/// One ranked result as shown in the terminal
#[inline]
pub fn format_result(rank: usize, result: &SearchResult) -> String {
    format!(
        "{}. {} (chunk {}/{}, similarity {:.3})\n   {}",
        rank,
        result.metadata.filename,
        result.metadata.chunk_index + 1,
        result.metadata.total_chunks,
        result.similarity,
        preview(&result.text, PREVIEW_CHARS)
    )
}

/// The distinct source files of `results`, in rank order
#[inline]
pub fn format_sources(results: &[SearchResult]) -> String {
    let mut sources: Vec<&str> = Vec::new();
    for result in results {
        if !sources.contains(&result.metadata.filename.as_str()) {
            sources.push(&result.metadata.filename);
        }
    }
    format!("Sources: {}", sources.join(", "))
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut shown = text.chars().take(max_chars).collect::<String>();
    if shown.len() < text.len() {
        shown.push('…');
    }
    shown
}

async fn answer(
    knowledge_base: &KnowledgeBase,
    chat: &ChatClient,
    question: &str,
    top_k: usize,
) -> Result<String> {
    let context = knowledge_base
        .search(question, top_k)
        .await
        .context("Failed to retrieve context")?;
    let answer = chat
        .ask(question, &context)
        .await
        .context("Failed to get an answer")?;

    if context.is_empty() {
        Ok(answer)
    } else {
        Ok(format!("{}\n\n{}", answer, style(format_sources(&context)).dim()))
    }
}

fn chat_client(config: &Config) -> Result<ChatClient> {
    Ok(ChatClient::new(&config.chat)
        .context("Failed to create chat client")?
        .with_timeout(config.timeouts.chat()))
}

fn load_config() -> Result<Config> {
    Config::load().context("Failed to load configuration")
}

async fn open_with_files(config: &Config, files: &[PathBuf]) -> Result<KnowledgeBase> {
    let knowledge_base = KnowledgeBase::open(config)
        .await
        .context("Failed to open knowledge base")?;

    let summary = ingest_files(&knowledge_base, files).await;
    if summary.documents_added == 0 {
        bail!("None of the {} files could be ingested", files.len());
    }

    Ok(knowledge_base)
}

fn progress_bar(file: &Path) -> ProgressBar {
    let name = file
        .file_name()
        .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());

    if console::user_attended_stderr() {
        let style = ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let bar = ProgressBar::new_spinner().with_style(style);
        bar.set_message(name);
        bar
    } else {
        ProgressBar::hidden()
    }
}
