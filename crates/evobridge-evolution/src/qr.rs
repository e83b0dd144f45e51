// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Renders raw pairing codes into QR image data URLs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use evobridge_core::EvobridgeError;
use qrcode::QrCode;
use qrcode::render::svg;

/// Encodes `code` as a QR symbol and returns it as an SVG data URL.
pub fn render_data_url(code: &str) -> Result<String, EvobridgeError> {
    let symbol = QrCode::new(code.as_bytes()).map_err(|e| EvobridgeError::Gateway {
        message: format!("pairing code cannot be encoded as QR: {e}"),
        source: Some(Box::new(e)),
    })?;
    let image = symbol
        .render::<svg::Color<'_>>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
}

/// `true` for strings that are already image data URLs.
pub fn is_data_url(value: &str) -> bool {
    value.starts_with("data:image/")
}
