//! Append-only CSV ledger of accepted repair orders.
//!
//! The file is UTF-8 with a byte-order mark so spreadsheet tools open the
//! CJK text correctly. The header row is written once, when the file is
//! first created (or found empty). Each row is encoded in memory and
//! written with a single append while holding the ledger lock, so
//! concurrent submissions never interleave inside a row. A write that
//! fails partway is truncated back to the previous length.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::LedgerError;
use crate::order::RepairOrder;

/// UTF-8 byte-order mark.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column labels, in row order.
pub const HEADER: [&str; 6] = ["報修時間", "客戶姓名", "電話", "地址", "報修項目", "故障描述"];

/// Timestamp format of the first column.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Receipt for one appended row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub received_at: DateTime<Local>,
}

/// Append-only CSV log.
pub struct CsvLedger {
    path: PathBuf,
    /// Guards the file and remembers the last timestamp written.
    last_written: Mutex<Option<DateTime<Local>>>,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one order as a row, stamping it with the receive time.
    ///
    /// Timestamps never go backwards across rows written by this ledger,
    /// even if the wall clock does.
    pub async fn append(&self, order: &RepairOrder) -> Result<LedgerEntry, LedgerError> {
        let mut last = self.last_written.lock().await;

        let now = Local::now();
        let received_at = match *last {
            Some(prev) if prev > now => prev,
            _ => now,
        };

        let stamp = received_at.format(TIME_FORMAT).to_string();
        let row = encode_row(&[
            stamp.as_str(),
            order.customer_name.as_str(),
            order.phone.as_str(),
            order.address.as_str(),
            order.issue_type.as_str(),
            order.description.as_str(),
        ])?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let prev_len = file.metadata().await?.len();
        let mut buf = Vec::with_capacity(row.len() + 128);
        if prev_len == 0 {
            buf.extend_from_slice(UTF8_BOM);
            buf.extend_from_slice(&encode_row(&HEADER)?);
        }
        buf.extend_from_slice(&row);

        write_or_rollback(&mut file, prev_len, &buf).await?;

        *last = Some(received_at);
        tracing::debug!(order_id = %order.id, path = %self.path.display(), "Ledger row appended");

        Ok(LedgerEntry { received_at })
    }
}

/// An append target that can be cut back after a failed write.
trait Truncate: AsyncWrite + Unpin {
    async fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for fs::File {
    async fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len).await
    }
}

/// Write `buf` whole, or restore the target to `prev_len` bytes.
async fn write_or_rollback<W: Truncate>(
    target: &mut W,
    prev_len: u64,
    buf: &[u8],
) -> Result<(), LedgerError> {
    let written = async {
        target.write_all(buf).await?;
        target.flush().await
    }
    .await;

    if let Err(e) = written {
        if let Err(trunc) = target.truncate(prev_len).await {
            tracing::error!(
                error = %trunc,
                prev_len,
                "Failed to roll back partial ledger write"
            );
        }
        return Err(e.into());
    }
    Ok(())
}

/// Encode one CSV record (RFC 4180 quoting, `\r\n` terminator).
fn encode_row(fields: &[&str]) -> Result<Vec<u8>, LedgerError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| LedgerError::Io(e.into_error()))
}
