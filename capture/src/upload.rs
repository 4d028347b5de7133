use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use log::{debug, warn};
use plantcare_camera::EncodedImage;
use plantcare_storage::{ObjectStore, UploadRelay};

use crate::session::Shared;
use crate::{Notice, SessionEvent, UploadStatus};

/// The upload of a freshly captured image.
///
/// Nothing is sent until this is awaited or spawned. The image is already
/// held by the session, so dropping this is safe: an upload that never
/// started stays [`UploadStatus::NotStarted`], one dropped mid-flight settles
/// as [`UploadStatus::FailedLocalFallback`].
///
/// Awaiting yields the final status of this upload, even if the session has
/// since moved on to another image.
#[must_use = "the upload only runs when awaited or spawned"]
pub struct PendingUpload {
    generation: u64,
    future: BoxFuture<'static, UploadStatus>,
}

impl PendingUpload {
    pub(crate) fn new<O>(
        shared: Arc<Shared>,
        relay: UploadRelay<O>,
        image: EncodedImage,
        generation: u64,
    ) -> Self
    where
        O: ObjectStore + 'static,
    {
        let future = async move {
            let mut guard = SettleGuard {
                shared,
                generation,
                armed: true,
            };
            guard
                .shared
                .advance_upload(generation, UploadStatus::InProgress);

            let status = match relay.upload(&image).await {
                Ok(reference) => UploadStatus::Succeeded(reference),
                Err(err) => {
                    warn!("image {generation} kept locally: {err}");
                    UploadStatus::FailedLocalFallback
                }
            };

            guard.armed = false;
            settle(&guard.shared, generation, &status);
            status
        }
        .boxed();
        Self { generation, future }
    }

    /// Sequence number of the image being uploaded.
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl IntoFuture for PendingUpload {
    type Output = UploadStatus;
    type IntoFuture = BoxFuture<'static, UploadStatus>;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

impl fmt::Debug for PendingUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingUpload")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

fn settle(shared: &Shared, generation: u64, status: &UploadStatus) {
    if !shared.advance_upload(generation, status.clone()) {
        debug!("ignoring upload result for replaced image {generation}");
        return;
    }
    shared.emit(&SessionEvent::UploadFinished(status.clone()));
    let notice = match status {
        UploadStatus::Succeeded(_) => Notice::info(
            "Image uploaded",
            "Your plant image has been saved to the cloud.",
        ),
        _ => Notice::destructive(
            "Upload failed",
            "We couldn't upload your image. The local version will still be used.",
        ),
    };
    shared.emit(&SessionEvent::Notice(notice));
}

// Keeps the session from showing `InProgress` forever when an upload future
// is dropped before it finishes.
struct SettleGuard {
    shared: Arc<Shared>,
    generation: u64,
    armed: bool,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("upload of image {} abandoned", self.generation);
            settle(
                &self.shared,
                self.generation,
                &UploadStatus::FailedLocalFallback,
            );
        }
    }
}
