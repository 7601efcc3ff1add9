use std::path::PathBuf;

use clap::{Parser, Subcommand};
use doc_rag::Result;
use doc_rag::commands::{ask_question, run_chat, search_documents};
use doc_rag::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "doc-rag")]
#[command(about = "Ask questions about your own documents using semantic retrieval")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding model, retrieval and chat settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest documents and print the passages most similar to a query
    Search {
        /// PDF, Markdown, HTML or text files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Text to search for
        #[arg(long, short)]
        query: String,
        /// Number of passages to return; defaults to the configured value
        #[arg(long)]
        top_k: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ingest documents and answer a single question about them
    Ask {
        /// PDF, Markdown, HTML or text files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Question to answer
        #[arg(long, short)]
        question: String,
        /// Number of passages given to the model as context
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Ingest documents and start an interactive question session
    Chat {
        /// PDF, Markdown, HTML or text files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Search {
            files,
            query,
            top_k,
            json,
        } => {
            search_documents(&files, &query, top_k, json).await?;
        }
        Commands::Ask {
            files,
            question,
            top_k,
        } => {
            ask_question(&files, &question, top_k).await?;
        }
        Commands::Chat { files } => {
            run_chat(&files).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn search_command() {
        let cli = Cli::try_parse_from([
            "doc-rag",
            "search",
            "law.pdf",
            "notes.md",
            "--query",
            "annual leave",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search {
                files,
                query,
                top_k,
                json,
            } = parsed.command
            {
                assert_eq!(
                    files,
                    vec![PathBuf::from("law.pdf"), PathBuf::from("notes.md")]
                );
                assert_eq!(query, "annual leave");
                assert_eq!(top_k, None);
                assert!(!json);
            } else {
                panic!("expected search command");
            }
        }
    }

    #[test]
    fn search_with_top_k_and_json() {
        let cli = Cli::try_parse_from([
            "doc-rag", "search", "law.pdf", "-q", "wages", "--top-k", "5", "--json",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search { top_k, json, .. } = parsed.command {
                assert_eq!(top_k, Some(5));
                assert!(json);
            } else {
                panic!("expected search command");
            }
        }
    }

    #[test]
    fn search_requires_files() {
        let cli = Cli::try_parse_from(["doc-rag", "search", "--query", "wages"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn ask_command() {
        let cli = Cli::try_parse_from([
            "doc-rag",
            "ask",
            "law.pdf",
            "--question",
            "How many hours is a working day?",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask {
                files, question, ..
            } = parsed.command
            {
                assert_eq!(files, vec![PathBuf::from("law.pdf")]);
                assert_eq!(question, "How many hours is a working day?");
            } else {
                panic!("expected ask command");
            }
        }
    }

    #[test]
    fn chat_command() {
        let cli = Cli::try_parse_from(["doc-rag", "chat", "a.txt", "b.html"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Chat { ref files } if files.len() == 2));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["doc-rag", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["doc-rag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["doc-rag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
