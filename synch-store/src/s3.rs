//! S3 bucket access over `aws-sdk-s3`.
//!
//! The SDK is async; [`S3Store`] owns a multi-thread tokio runtime and
//! blocks on it, so the rest of the pipeline stays synchronous and upload
//! workers can share one store.
//!
//! Objects larger than the part size are written as multi-part uploads
//! with exactly that part size, so the etag the bucket assigns follows
//! the `<md5-of-md5s>-<parts>` convention the fingerprint reproduces.

use std::num::NonZeroUsize;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client;
use tokio::runtime::Runtime;

use synch_core::{DestinationSpec, MAX_PARTS};

use crate::error::StoreError;
use crate::object::{ObjectStore, PutRequest, RemoteObject};

const CREDENTIALS_PROVIDER: &str = "synch-settings";

/// A connected bucket.
pub struct S3Store {
    runtime: Runtime,
    client: Client,
    bucket: String,
    part_size: NonZeroUsize,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("part_size", &self.part_size)
            .finish()
    }
}

impl S3Store {
    /// Build a client for `destination` and confirm the bucket is reachable.
    ///
    /// Uses the destination's static credentials when both halves are set,
    /// otherwise the ambient AWS credential chain.
    pub fn connect(
        destination: &DestinationSpec,
        part_size: NonZeroUsize,
    ) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        let client = runtime.block_on(async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(destination.region.clone()));
            if let Some((id, secret)) = destination.credentials() {
                loader = loader.credentials_provider(Credentials::new(
                    id,
                    secret,
                    None,
                    None,
                    CREDENTIALS_PROVIDER,
                ));
            }
            Client::new(&loader.load().await)
        });

        runtime
            .block_on(client.head_bucket().bucket(&destination.bucket).send())
            .map_err(|e| StoreError::Connection {
                bucket: destination.bucket.clone(),
                message: describe(e),
            })?;
        tracing::debug!(
            "connected to bucket {} in {}",
            destination.bucket,
            destination.region
        );

        Ok(Self {
            runtime,
            client,
            bucket: destination.bucket.clone(),
            part_size,
        })
    }

    async fn list_async(&self, prefix: &str) -> Result<Vec<RemoteObject>, StoreError> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StoreError::List {
                prefix: prefix.to_owned(),
                message: describe(e),
            })?;
            for obj in page.contents() {
                let (Some(key), Some(etag)) = (obj.key(), obj.e_tag()) else {
                    continue;
                };
                objects.push(RemoteObject {
                    key: key.to_owned(),
                    etag: etag.to_owned(),
                });
            }
        }
        Ok(objects)
    }

    async fn put_single(&self, request: PutRequest<'_>) -> Result<(), StoreError> {
        let body = request
            .body
            .read_all()
            .map_err(|source| body_err(request.key, source))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(request.key)
            .content_type(request.content_type)
            .set_acl(acl(request.public_read))
            .body(ByteStream::from(body.into_owned()))
            .send()
            .await
            .map_err(|e| put_err(request.key, describe(e)))?;
        Ok(())
    }

    async fn put_multipart(&self, request: PutRequest<'_>) -> Result<(), StoreError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(request.key)
            .content_type(request.content_type)
            .set_acl(acl(request.public_read))
            .send()
            .await
            .map_err(|e| put_err(request.key, describe(e)))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| put_err(request.key, "no upload id returned".to_owned()))?
            .to_owned();

        let completed = match self.upload_parts(request, &upload_id).await {
            Ok(parts) => parts,
            Err(err) => {
                self.abort(request.key, &upload_id).await;
                return Err(err);
            }
        };

        let finished = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(request.key)
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await;
        if let Err(e) = finished {
            self.abort(request.key, &upload_id).await;
            return Err(put_err(request.key, describe(e)));
        }
        Ok(())
    }

    async fn upload_parts(
        &self,
        request: PutRequest<'_>,
        upload_id: &str,
    ) -> Result<CompletedMultipartUpload, StoreError> {
        let part_size = self.part_size.get();
        let count = part_count(request.body.len(), part_size);
        let mut parts = Vec::with_capacity(count);
        for index in 0..count {
            let part_number = i32::try_from(index + 1)
                .map_err(|_| put_err(request.key, "too many parts".to_owned()))?;
            let chunk = request
                .body
                .read_range((index * part_size) as u64, part_size)
                .map_err(|source| body_err(request.key, source))?;
            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(request.key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.into_owned()))
                .send()
                .await
                .map_err(|e| put_err(request.key, describe(e)))?;
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_owned))
                    .part_number(part_number)
                    .build(),
            );
        }
        Ok(CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build())
    }

    async fn abort(&self, key: &str, upload_id: &str) {
        let aborted = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;
        if let Err(e) = aborted {
            tracing::warn!("could not abort multi-part upload of {key}: {}", describe(e));
        }
    }
}

impl ObjectStore for S3Store {
    fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, StoreError> {
        self.runtime.block_on(self.list_async(prefix))
    }

    fn put(&self, request: PutRequest<'_>) -> Result<(), StoreError> {
        let part_size = self.part_size.get();
        if request.body.len() > part_size as u64 {
            let parts = part_count(request.body.len(), part_size);
            if parts > MAX_PARTS {
                return Err(put_err(
                    request.key,
                    format!("{parts} parts of {part_size} bytes exceed the limit of {MAX_PARTS}"),
                ));
            }
            self.runtime.block_on(self.put_multipart(request))
        } else {
            self.runtime.block_on(self.put_single(request))
        }
    }
}

fn acl(public_read: bool) -> Option<ObjectCannedAcl> {
    public_read.then_some(ObjectCannedAcl::PublicRead)
}

fn part_count(len: u64, part_size: usize) -> usize {
    usize::try_from(len.div_ceil(part_size as u64)).unwrap_or(usize::MAX)
}

fn body_err(key: &str, source: std::io::Error) -> StoreError {
    StoreError::Body {
        key: key.to_owned(),
        source,
    }
}

fn put_err(key: &str, message: String) -> StoreError {
    StoreError::Put {
        key: key.to_owned(),
        message,
    }
}

fn describe<E: std::error::Error>(err: E) -> String {
    DisplayErrorContext(err).to_string()
}
