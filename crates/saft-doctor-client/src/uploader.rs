//! Chunked upload of SAFT files.
//!
//! The file is announced with `start`, sent strictly in order in chunks of the
//! size the backend suggests, and sealed with `finish`. There is no retry: the
//! first rejected chunk aborts the upload and the caller starts over.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use saft_doctor_core::models::{
    FinishUploadRequest, StartUploadRequest, StartUploadResponse, UploadProgress, UploadSession,
    DEFAULT_CHUNK_SIZE,
};
use saft_doctor_core::{backend_message, ClientError};
use std::ops::Range;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::ApiClient;

impl ApiClient {
    /// Open an upload session for `size` bytes.
    pub async fn start_upload(
        &self,
        filename: &str,
        size: u64,
        fallback_chunk_size: u64,
    ) -> Result<UploadSession, ClientError> {
        let body = StartUploadRequest {
            filename: filename.to_string(),
            size,
        };
        let request = self.authed(self.client().post(self.build_url("/pt/upload/start")))?;
        let (status, text) = Self::read_text(Self::send(request.json(&body)).await?).await?;

        if !(200..300).contains(&status) {
            return Err(ClientError::Session {
                status,
                message: backend_message(&text, "Upload start failed"),
            });
        }

        let start: StartUploadResponse = serde_json::from_str(&text).map_err(|e| {
            ClientError::InvalidResponse(format!("Failed to parse upload start response: {}", e))
        })?;
        let upload_id = start
            .upload_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ClientError::Session {
                status,
                message: "Backend returned no upload_id".to_string(),
            })?;

        Ok(UploadSession::new(
            upload_id,
            start.chunk_size,
            size,
            fallback_chunk_size,
        ))
    }

    /// Send one chunk. `index` is zero-based.
    pub async fn send_chunk(
        &self,
        upload_id: &str,
        index: u64,
        data: Bytes,
    ) -> Result<(), ClientError> {
        let request = self
            .authed(self.client().put(self.build_url("/pt/upload/chunk")))?
            .query(&[("upload_id", upload_id.to_string()), ("index", index.to_string())])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data);
        let (status, text) = Self::read_text(Self::send(request).await?).await?;

        if !(200..300).contains(&status) {
            return Err(ClientError::Chunk {
                index,
                status,
                message: backend_message(&text, "Chunk rejected"),
            });
        }
        Ok(())
    }

    pub async fn finish_upload(&self, upload_id: &str) -> Result<(), ClientError> {
        let body = FinishUploadRequest {
            upload_id: upload_id.to_string(),
        };
        let request = self.authed(self.client().post(self.build_url("/pt/upload/finish")))?;
        let (status, text) = Self::read_text(Self::send(request.json(&body)).await?).await?;

        if !(200..300).contains(&status) {
            return Err(ClientError::Finish {
                status,
                message: backend_message(&text, "Upload finish failed"),
            });
        }
        Ok(())
    }
}

enum ChunkSource {
    File(File),
    Memory(Bytes),
}

impl ChunkSource {
    /// Ranges are requested in order, so the file is read sequentially.
    async fn read(&mut self, range: Range<u64>) -> Result<Bytes, ClientError> {
        match self {
            ChunkSource::File(file) => {
                let mut buf = vec![0u8; (range.end - range.start) as usize];
                file.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
            ChunkSource::Memory(data) => Ok(data.slice(range.start as usize..range.end as usize)),
        }
    }
}

type ProgressFn<'a> = Box<dyn FnMut(UploadProgress) + Send + 'a>;

/// Drives a complete chunked upload through an [`ApiClient`].
pub struct Uploader<'a> {
    client: &'a ApiClient,
    fallback_chunk_size: u64,
    on_progress: Option<ProgressFn<'a>>,
}

impl<'a> Uploader<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            client,
            fallback_chunk_size: DEFAULT_CHUNK_SIZE,
            on_progress: None,
        }
    }

    /// Chunk size to use when the backend does not suggest one.
    pub fn with_fallback_chunk_size(mut self, size: u64) -> Self {
        self.fallback_chunk_size = size.max(1);
        self
    }

    /// Called after every acknowledged chunk.
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(UploadProgress) + Send + 'a,
    {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Upload a file from disk without loading it whole.
    pub async fn upload_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<UploadSession, ClientError> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("saft.xml")
            .to_string();

        self.run(&filename, size, ChunkSource::File(file)).await
    }

    pub async fn upload_bytes(
        &mut self,
        filename: &str,
        data: impl Into<Bytes>,
    ) -> Result<UploadSession, ClientError> {
        let data = data.into();
        let size = data.len() as u64;
        self.run(filename, size, ChunkSource::Memory(data)).await
    }

    async fn run(
        &mut self,
        filename: &str,
        size: u64,
        mut source: ChunkSource,
    ) -> Result<UploadSession, ClientError> {
        let mut session = self
            .client
            .start_upload(filename, size, self.fallback_chunk_size)
            .await?;
        let total_chunks = session.total_chunks();

        tracing::info!(
            upload_id = %session.upload_id,
            filename = %filename,
            total_size = size,
            chunk_size = session.chunk_size,
            total_chunks = total_chunks,
            "Started chunked upload session"
        );

        for (index, range) in (0u64..).zip(session.ranges()) {
            let len = range.end - range.start;
            let data = source.read(range).await?;
            self.client
                .send_chunk(&session.upload_id, index, data)
                .await?;
            session.record_chunk(len);

            tracing::debug!(
                upload_id = %session.upload_id,
                index = index,
                bytes_sent = session.bytes_sent,
                "Chunk acknowledged"
            );

            if let Some(on_progress) = self.on_progress.as_mut() {
                on_progress(UploadProgress {
                    index,
                    total_chunks,
                    bytes_sent: session.bytes_sent,
                    total_size: session.total_size,
                    percent: session.percent(),
                });
            }
        }

        self.client.finish_upload(&session.upload_id).await?;
        session.mark_finished();

        tracing::info!(
            upload_id = %session.upload_id,
            total_size = session.total_size,
            "Completed chunked upload"
        );

        Ok(session)
    }
}
