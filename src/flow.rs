use crate::capture::AcceptedImage;
use crate::garden::PlantDraft;
use crate::identify::{Identification, IdentifyError, Identifier};

/// Identify an accepted capture and prefill the add-plant form with the
/// result.
///
/// The draft carries the image's `data:` URL and, if the upload succeeded,
/// its public URL.
///
/// # Errors
/// Returns the identifier's error; [`IdentifyError::NeedsClearerImage`]
/// means the user should retake the photo.
pub async fn draft_from_capture<I: Identifier>(
    identifier: &I,
    accepted: &AcceptedImage,
) -> Result<(Identification, PlantDraft), IdentifyError> {
    let identification = identifier.identify(&accepted.image).await?;
    let draft = PlantDraft::from_identification(
        &identification,
        accepted.image_data.clone(),
        accepted.image_path.clone(),
    );
    Ok((identification, draft))
}
