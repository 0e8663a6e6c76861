//! Serving the rewriting engine bundle.
//!
//! The engine is loaded by a classic `<script>` in every bootstrapped
//! document, so the `.wasm` bytes are shipped inside a small script that
//! defines `self.WASM`.

use std::path::Path;

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Script defining `self.WASM` as the bytes of `module`.
pub fn wasm_stub(module: &[u8]) -> String {
    format!(
        "self.WASM = Uint8Array.from(atob(\"{}\"), c => c.charCodeAt(0));",
        STANDARD.encode(module)
    )
}

/// Read `path` and answer with its script stub.
pub async fn serve_wasm(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(module) => (
            [
                (CONTENT_TYPE, "application/javascript"),
                (CACHE_CONTROL, "no-cache"),
            ],
            wasm_stub(&module),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Failed to read wasm bundle");
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_embeds_base64_bytes() {
        assert_eq!(
            wasm_stub(b"\0asm"),
            "self.WASM = Uint8Array.from(atob(\"AGFzbQ==\"), c => c.charCodeAt(0));"
        );
    }

    #[tokio::test]
    async fn test_missing_module_is_not_found() {
        let response = serve_wasm(Path::new("/nonexistent/webrascal.wasm")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
