// ABOUTME: Byte-stream file copies over SSH exec channels.
// ABOUTME: Streams through `cat` on the remote side and reports cumulative progress.

use super::error::{Error, Result};
use super::shell::ProgressFn;
use crate::runtime::quote;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;

/// Push a local file to `remote` by piping it into `cat` on the far side.
pub(crate) async fn upload(
    mut channel: Channel<Msg>,
    local: &Path,
    remote: &str,
    progress: ProgressFn<'_>,
) -> Result<u64> {
    let mut file = tokio::fs::File::open(local).await.map_err(|e| {
        Error::Transfer(format!("failed to open {}: {}", local.display(), e))
    })?;

    let command = format!("cat > {}", quote(remote));
    debug!(local = %local.display(), remote, "upload");
    channel.exec(true, command).await.map_err(Error::Protocol)?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut sent = 0u64;

    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| Error::Transfer(format!("failed to read {}: {}", local.display(), e)))?;
        if n == 0 {
            break;
        }
        channel
            .data(&buf[..n])
            .await
            .map_err(|e| Error::ConnectionLost(format!("upload interrupted: {}", e)))?;
        sent += n as u64;
        progress(sent);
    }

    channel.eof().await.map_err(Error::Protocol)?;

    let mut stderr = Vec::new();
    let mut exit_code = None;
    loop {
        match channel.wait().await {
            Some(ChannelMsg::ExtendedData { data, ext: 1 }) => stderr.extend_from_slice(&data),
            Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
            Some(ChannelMsg::Close) | None => break,
            Some(_) => {}
        }
    }

    match exit_code {
        Some(0) => Ok(sent),
        Some(code) => Err(Error::Transfer(format!(
            "remote write to {} exited with code {}: {}",
            remote,
            code,
            String::from_utf8_lossy(&stderr).trim()
        ))),
        None => Err(Error::ConnectionLost(
            "upload channel closed without exit status".to_string(),
        )),
    }
}

/// Pull `remote` into a local file by reading the output of `cat`.
pub(crate) async fn download(
    mut channel: Channel<Msg>,
    remote: &str,
    local: &Path,
    progress: ProgressFn<'_>,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(local).await.map_err(|e| {
        Error::Transfer(format!("failed to create {}: {}", local.display(), e))
    })?;

    let command = format!("cat {}", quote(remote));
    debug!(remote, local = %local.display(), "download");
    channel.exec(true, command).await.map_err(Error::Protocol)?;

    let mut received = 0u64;
    let mut stderr = Vec::new();
    let mut exit_code = None;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => {
                file.write_all(&data).await.map_err(|e| {
                    Error::Transfer(format!("failed to write {}: {}", local.display(), e))
                })?;
                received += data.len() as u64;
                progress(received);
            }
            Some(ChannelMsg::ExtendedData { data, ext: 1 }) => stderr.extend_from_slice(&data),
            Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
            Some(ChannelMsg::Close) | None => break,
            Some(_) => {}
        }
    }

    file.flush().await?;

    match exit_code {
        Some(0) => Ok(received),
        Some(code) => Err(Error::Transfer(format!(
            "remote read of {} exited with code {}: {}",
            remote,
            code,
            String::from_utf8_lossy(&stderr).trim()
        ))),
        None => Err(Error::ConnectionLost(
            "download channel closed without exit status".to_string(),
        )),
    }
}
