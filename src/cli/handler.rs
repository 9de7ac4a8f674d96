use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};

use crate::cli::formatter;
use threadview::domain::entity::ThreadData;
use threadview::domain::error::DomainError;
use threadview::domain::repository::{PostRepository, ThreadSource};
use threadview::infra::wire;
use threadview::usecase::fetch::{FailureKind, ThreadStatus, ThreadUseCase};

const MAX_IMPORT_SIZE: usize = 10 * 1024 * 1024; // 10MB

fn read_input(file: Option<&Path>) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    let bytes_read = match file {
        Some(path) => std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?
            .take(MAX_IMPORT_SIZE as u64 + 1)
            .read_to_end(&mut buf)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => std::io::stdin()
            .take(MAX_IMPORT_SIZE as u64 + 1)
            .read_to_end(&mut buf)
            .context("failed to read stdin")?,
    };

    if bytes_read > MAX_IMPORT_SIZE {
        bail!("input exceeds the 10MB limit ({} bytes)", bytes_read);
    }

    String::from_utf8(buf).context("input is not valid UTF-8")
}

/// Ensures the thread, retrying transport failures up to `retries` times.
fn load_thread<'u, S: ThreadSource>(
    thread_uc: &'u mut ThreadUseCase<S>,
    id: &str,
    retries: u32,
) -> anyhow::Result<&'u ThreadData> {
    thread_uc.ensure_thread(id);

    let mut attempts = 0;
    while attempts < retries
        && thread_uc
            .state(id)
            .error
            .map_or(false, |failure| failure.retryable())
    {
        attempts += 1;
        log::warn!("retrying thread {} ({}/{})", id, attempts, retries);
        thread_uc.refresh(id);
    }

    let state = thread_uc.state(id);
    match (state.status, state.data, state.error) {
        (ThreadStatus::Loaded, Some(data), _) => Ok(data),
        (_, _, Some(failure)) => match failure.kind {
            FailureKind::NotFound => Err(DomainError::NotFound(id.to_string()).into()),
            FailureKind::Transport => Err(DomainError::Transport(failure.message.clone()).into()),
            FailureKind::Other => Err(anyhow::anyhow!("{}", failure)),
        },
        (status, _, _) => bail!("thread {} did not settle (state: {:?})", id, status),
    }
}

pub fn handle_show<S: ThreadSource>(
    thread_uc: &mut ThreadUseCase<S>,
    id: &str,
    retries: u32,
    format: &str,
) -> anyhow::Result<()> {
    let thread = load_thread(thread_uc, id, retries)?;
    match format {
        "json" => println!("{}", formatter::format_thread_json(thread)),
        _ => println!("{}", formatter::format_thread_text(thread)),
    }
    Ok(())
}

pub fn handle_orphans<S: ThreadSource>(
    thread_uc: &mut ThreadUseCase<S>,
    id: &str,
    format: &str,
) -> anyhow::Result<()> {
    let thread = load_thread(thread_uc, id, 0)?;
    let orphans = thread.orphaned_replies();
    match format {
        "json" => println!("{}", formatter::format_orphans_json(&orphans)),
        _ => {
            if orphans.is_empty() {
                eprintln!("every reply in thread {} is reachable", id);
            } else {
                println!("{}", formatter::format_orphans_text(&orphans));
            }
        }
    }
    Ok(())
}

pub fn handle_import<R: PostRepository>(repo: &R, file: Option<&Path>) -> anyhow::Result<()> {
    let input = read_input(file)?;
    let (posts, rejected) = wire::parse_post_dump(&input)?;

    let stored = repo.insert_batch(&posts)?;
    println!("{}", stored);
    if rejected > 0 {
        eprintln!("skipped {} malformed records", rejected);
    }
    Ok(())
}
