//! Builders for synthetic `.note` containers used across the test suites.

use super::rle::{COLOR_BACKGROUND, COLOR_BLACK};

pub(crate) const PAGE_WIDTH: u32 = 1404;
pub(crate) const PAGE_HEIGHT: u32 = 1872;

pub(crate) enum FixturePage {
    /// Top band of `ink_rows` black rows over a transparent page.
    Ink { ink_rows: u32, text: Option<String> },
    /// RLE stream that cannot fill the page.
    Corrupt,
}

pub(crate) fn ink_page(ink_rows: u32) -> FixturePage {
    FixturePage::Ink {
        ink_rows,
        text: None,
    }
}

pub(crate) fn build_note(pages: &[FixturePage]) -> Vec<u8> {
    build_container(|bytes| {
        let header = push_block(
            bytes,
            b"<MODULE_LABEL:SNFILE_FEATURE><FILE_TYPE:NOTE><APPLY_EQUIPMENT:A5X>",
        );

        let mut footer = format!("<FILE_FEATURE:{header}>");
        for (index, page) in pages.iter().enumerate() {
            let (layer_data, text) = match page {
                FixturePage::Ink { ink_rows, text } => (ink_layer(*ink_rows), text.as_deref()),
                FixturePage::Corrupt => (vec![COLOR_BLACK, 0x10, COLOR_BLACK], None),
            };
            let layer = push_layer(bytes, "MAINLAYER", "RATTA_RLE", &layer_data);
            let recogn = match text {
                Some(text) => push_block(bytes, recognition_payload(text).as_bytes()),
                None => 0,
            };
            let page_meta = push_block(
                bytes,
                format!(
                    "<PAGESTYLE:style_white><MAINLAYER:{layer}><LAYER1:0><BGLAYER:0><LAYERSEQ:MAINLAYER,BGLAYER><RECOGNTEXT:{recogn}>"
                )
                .as_bytes(),
            );
            footer.push_str(&format!("<PAGE{}:{page_meta}>", index + 1));
        }
        footer
    })
}

/// Signature, the blocks pushed by `body`, then the footer it returns and the
/// trailing footer pointer.
pub(crate) fn build_container(body: impl FnOnce(&mut Vec<u8>) -> String) -> Vec<u8> {
    let mut bytes = b"noteSN_FILE_VER_20230015".to_vec();
    let footer = body(&mut bytes);
    let footer_address = push_block(&mut bytes, footer.as_bytes());
    bytes.extend_from_slice(&(footer_address as u32).to_le_bytes());
    bytes
}

pub(crate) fn push_block(bytes: &mut Vec<u8>, payload: &[u8]) -> usize {
    let address = bytes.len();
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(payload);
    address
}

/// Pushes a bitmap and its layer metadata; returns the metadata address.
pub(crate) fn push_layer(bytes: &mut Vec<u8>, name: &str, protocol: &str, data: &[u8]) -> usize {
    let bitmap = push_block(bytes, data);
    push_block(
        bytes,
        format!(
            "<LAYERTYPE:NOTE><LAYERPROTOCOL:{protocol}><LAYERNAME:{name}><LAYERBITMAP:{bitmap}>"
        )
        .as_bytes(),
    )
}

pub(crate) fn ink_layer(ink_rows: u32) -> Vec<u8> {
    let ink = (ink_rows.min(PAGE_HEIGHT) * PAGE_WIDTH) as usize;
    let total = (PAGE_WIDTH * PAGE_HEIGHT) as usize;
    let mut out = Vec::new();
    push_runs(&mut out, COLOR_BLACK, ink);
    push_runs(&mut out, COLOR_BACKGROUND, total - ink);
    out
}

fn push_runs(out: &mut Vec<u8>, color: u8, mut count: usize) {
    while count >= 0x4000 {
        out.extend_from_slice(&[color, 0xff]);
        count -= 0x4000;
    }
    while count > 0 {
        let run = count.min(0x80);
        out.extend_from_slice(&[color, (run - 1) as u8]);
        count -= run;
    }
}

fn recognition_payload(text: &str) -> String {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;

    let json = serde_json::json!({
        "elements": [
            { "type": "Raw", "label": "ignored" },
            { "type": "Text", "label": text },
        ]
    });
    BASE64.encode(json.to_string())
}
