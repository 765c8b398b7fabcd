mod commit;
mod diff;
mod error;
mod hash;
mod log;
mod merge;
mod object;
mod refs;
mod repository;
mod store;
mod write_tree;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use diff::{ChangeKind, DiffEntry};
use repository::{Repository, DEFAULT_REPO_DIR};

#[derive(Parser)]
#[command(name = "caf")]
#[command(about = "A content-addressable filesystem")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a repository in the current directory.
    Init {
        #[arg(long, default_value = "main")]
        default_branch: String,
    },
    /// Delete the repository metadata in the current directory.
    DeleteRepo,
    /// Hash a file's contents without storing it.
    HashFile { path: PathBuf },
    /// Snapshot the working directory into a new commit.
    Commit {
        #[arg(long)]
        author: String,
        #[arg(long)]
        message: String,
    },
    /// Print the commit history reachable from a reference.
    Log {
        #[arg(default_value = "HEAD")]
        reference: String,
    },
    /// List branches.
    Branch,
    /// Create a branch pointing at HEAD.
    AddBranch { name: String },
    /// Delete a branch.
    DeleteBranch { name: String },
    /// Check whether a branch exists.
    BranchExists { name: String },
    /// List tags.
    Tags,
    /// Create a tag, optionally at a specific commit.
    CreateTag {
        name: String,
        commit: Option<String>,
    },
    /// Delete a tag.
    DeleteTag { name: String },
    /// Structurally diff two commits.
    Diff {
        old: String,
        new: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(255)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { default_branch } => {
            Repository::init(&cwd, DEFAULT_REPO_DIR, &default_branch)?;
            println!("Initialized empty repository in {}", cwd.join(DEFAULT_REPO_DIR).display());
        }

        Commands::DeleteRepo => {
            Repository::open(&cwd, DEFAULT_REPO_DIR)?.delete()?;
            println!("Repository deleted");
        }

        Commands::HashFile { path } => {
            let hash = hash::hash_file(&path)?;
            println!("Hash: {hash}");
        }

        Commands::Commit { author, message } => {
            let repo = Repository::open(&cwd, DEFAULT_REPO_DIR)?;
            let hash = repo.commit_working_dir(&author, &message)?;
            println!("Commit created successfully:");
            println!("Hash: {hash}");
            println!("Author: {author}");
            println!("Message: {message}");
        }

        Commands::Log { reference } => {
            let repo = Repository::open(&cwd, DEFAULT_REPO_DIR)?;
            for (hash, commit) in log::log_chain(&repo, &reference)? {
                println!("Commit: {hash}");
                println!("Author: {}", commit.author);
                println!("Date: {}", commit.timestamp);
                println!("Message: {}", commit.message);
                println!();
            }
        }

        Commands::Branch => {
            let repo = Repository::open(&cwd, DEFAULT_REPO_DIR)?;
            for name in repo.list_branches()? {
                println!("{name}");
            }
        }

        Commands::AddBranch { name } => {
            let repo = Repository::open(&cwd, DEFAULT_REPO_DIR)?;
            repo.add_branch(&name)?;
            println!("Branch created: {name}");
        }

        Commands::DeleteBranch { name } => {
            let repo = Repository::open(&cwd, DEFAULT_REPO_DIR)?;
            repo.delete_branch(&name)?;
            println!("Branch deleted: {name}");
        }

        Commands::BranchExists { name } => {
            let repo = Repository::open(&cwd, DEFAULT_REPO_DIR)?;
            println!("{}", repo.branch_exists(&name));
        }

        Commands::Tags => {
            let repo = Repository::open(&cwd, DEFAULT_REPO_DIR)?;
            for name in repo.list_tags()? {
                println!("{name}");
            }
        }

        Commands::CreateTag { name, commit } => {
            let repo = Repository::open(&cwd, DEFAULT_REPO_DIR)?;
            repo.create_tag(&name, commit.as_deref())?;
            println!("Tag created: {name}");
        }

        Commands::DeleteTag { name } => {
            let repo = Repository::open(&cwd, DEFAULT_REPO_DIR)?;
            repo.delete_tag(&name)?;
            println!("Tag deleted: {name}");
        }

        Commands::Diff { old, new } => {
            let repo = Repository::open(&cwd, DEFAULT_REPO_DIR)?;
            let entries = repo.diff_commits(&old, &new)?;
            println!("Diff:");
            print_diff(&entries, 0);
        }
    }

    Ok(())
}

fn print_diff(entries: &[DiffEntry], depth: usize) {
    let indent = "   ".repeat(depth);
    for entry in entries {
        match entry.change {
            ChangeKind::Added => println!("{indent}Added: {}", entry.name),
            ChangeKind::Removed => println!("{indent}Removed: {}", entry.name),
            ChangeKind::Modified => println!("{indent}Modified: {}", entry.name),
            ChangeKind::MovedFrom => {}
            ChangeKind::MovedTo => {
                let dest = entry.moved_path.as_deref().unwrap_or("?");
                println!("{indent}Moved: {} -> {}", entry.name, dest);
            }
        }
        if !entry.children.is_empty() {
            print_diff(&entry.children, depth + 1);
        }
    }
}
