//! Payload encoding: PDF bytes → base64 `ImageData` attachment.
//!
//! Multimodal APIs take attachments as base64 inline data tagged with a MIME
//! type. Gemini reads `application/pdf` natively (text layer and rendered
//! pages), so the PDF is sent as-is rather than rasterised.

use crate::model::DocumentPayload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// MIME type of every attachment we send.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Encode a payload as an inline PDF attachment.
pub fn encode_document(payload: &DocumentPayload) -> ImageData {
    let b64 = STANDARD.encode(&payload.bytes[..]);
    debug!(
        "Encoded {} → {} bytes base64",
        payload.label(),
        b64.len()
    );
    ImageData::new(b64, PDF_MIME_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn encodes_pdf_bytes() {
        let bytes: Arc<[u8]> = Arc::from(&b"%PDF-1.5 tiny"[..]);
        let payload = DocumentPayload::whole(Path::new("tiny.pdf"), 1, bytes);
        let data = encode_document(&payload);
        assert_eq!(data.mime_type, "application/pdf");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, b"%PDF-1.5 tiny");
    }
}
