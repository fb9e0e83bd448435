use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{GrayImage, ImageFormat};

use crate::error::{NoteError, NoteResult};

use super::traits::RasterImage;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

impl RasterImage {
    pub fn to_png(&self) -> NoteResult<Vec<u8>> {
        let image = GrayImage::from_raw(self.width, self.height, self.pixels.to_vec()).ok_or(
            NoteError::invalid_argument("raster pixels length does not match dimensions"),
        )?;
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|err| NoteError::invalid_argument(format!("png encoding failed: {err}")))?;
        Ok(png)
    }

    pub fn to_data_url(&self) -> NoteResult<String> {
        let png = self.to_png()?;
        Ok(format!("{PNG_DATA_URL_PREFIX}{}", BASE64.encode(png)))
    }
}

/// Returns the PNG bytes carried by a data URL produced by
/// [`RasterImage::to_data_url`].
pub fn decode_png_data_url(data_url: &str) -> NoteResult<Vec<u8>> {
    let payload = data_url
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .ok_or(NoteError::invalid_argument("not a base64 PNG data URL"))?;
    BASE64
        .decode(payload)
        .map_err(|err| NoteError::invalid_argument(format!("invalid base64 payload: {err}")))
}
