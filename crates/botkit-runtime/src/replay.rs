//! Feed newline-delimited JSON notifications into a [`MemoryFeed`].

use botkit_core::{MemoryFeed, Notification};
use botkit_log::Logger;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt};

/// Read NDJSON notifications from `reader` until EOF, pushing each onto its
/// kind's stream. Blank and malformed lines are skipped. Returns the number
/// of notifications queued.
pub async fn replay<R>(reader: R, feed: &MemoryFeed, log: &Logger) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut queued = 0usize;
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let notification: Notification = match serde_json::from_str(trimmed) {
            Ok(n) => n,
            Err(e) => {
                log.warn(format_args!("replay line {line_no}: {e}"));
                continue;
            }
        };
        if let Err(e) = feed.push(notification) {
            log.warn(format_args!("replay stopped at line {line_no}: {e}"));
            break;
        }
        queued += 1;
    }

    log.debug(format_args!("replayed {queued} notifications"));
    Ok(queued)
}
