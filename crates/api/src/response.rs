//! API response helpers.

use axum::http::StatusCode;
use axum::response::Html;
use serde::Serialize;

/// Plain confirmation payload, `{"message": "..."}`.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    /// Build a confirmation payload.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Browser-facing page shown after a successful email verification.
#[must_use]
pub fn verification_success_page() -> Html<&'static str> {
    Html(
        r#"<html>
<body style="font-family: Arial; text-align: center; padding: 50px;">
    <h2 style="color: green;">Verificación exitosa</h2>
    <p>Tu cuenta ha sido verificada correctamente.</p>
    <p>Ya puedes iniciar sesión en la aplicación.</p>
</body>
</html>"#,
    )
}

/// Browser-facing page shown for an invalid or expired verification link.
#[must_use]
pub fn verification_error_page() -> (StatusCode, Html<&'static str>) {
    (
        StatusCode::BAD_REQUEST,
        Html(
            r#"<html>
<body style="font-family: Arial; text-align: center; padding: 50px;">
    <h2 style="color: red;">Error</h2>
    <p>El enlace de verificación no es válido o ha expirado.</p>
</body>
</html>"#,
        ),
    )
}
