use anyhow::Result;

use super::args::LogsCliArgs;
use crate::logs::{tail_journal, JournalQuery};

/// `roomkeeper logs`: reads the journal directly, so it works while the
/// agent is down.
pub fn handle_logs_command(args: LogsCliArgs) -> Result<()> {
    let mut query = JournalQuery::new(args.lines);
    if let Some(pattern) = args.grep {
        query = query.matching(pattern);
    }
    let tail = tail_journal(&query)?;

    if !tail.journal_available {
        println!(
            "No journal for {}. Is roomkeeper installed as a systemd user service?",
            tail.unit
        );
        return Ok(());
    }
    if tail.entries.is_empty() {
        println!("{}: no matching entries", tail.unit);
        return Ok(());
    }

    for entry in &tail.entries {
        println!("{entry}");
    }
    Ok(())
}
