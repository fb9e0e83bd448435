//! Supernote `.note` container.
//!
//! The file ends with a little-endian pointer to the footer block. Every block
//! is a 4-byte little-endian length followed by its payload; metadata payloads
//! are sequences of `<KEY:VALUE>` pairs whose numeric values are addresses of
//! further blocks.

use std::ops::Range;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use crate::error::{NoteError, NoteResult};

use super::rle;
use super::traits::{Layer, Note, NoteDecoder, Page, PageNumber, RasterImage};

const FILE_SIGNATURES: [&[u8]; 2] = [b"noteSN_FILE_VER_", b"SN_FILE_VER_"];
const MIN_FILE_LEN: usize = 24 + 4;
const ADDRESS_LEN: usize = 4;

const DEFAULT_PAGE_SIZE: (u32, u32) = (1404, 1872);
const HIGH_RES_PAGE_SIZE: (u32, u32) = (1920, 2560);
const HIGH_RES_EQUIPMENT: &str = "N5";

const PROTOCOL_RLE: &str = "RATTA_RLE";
const PROTOCOL_PNG: &str = "PNG";
const BACKGROUND_LAYER: &str = "BGLAYER";
const LAYER_KEYS: [&str; 5] = ["MAINLAYER", "LAYER1", "LAYER2", "LAYER3", BACKGROUND_LAYER];

#[derive(Debug, Default, Clone, Copy)]
pub struct SupernoteDecoder;

impl NoteDecoder for SupernoteDecoder {
    fn validate(&self, bytes: &[u8]) -> NoteResult<()> {
        if bytes.len() < MIN_FILE_LEN {
            return Err(NoteError::malformed(format!(
                "buffer too small: {} bytes",
                bytes.len()
            )));
        }
        if !FILE_SIGNATURES.iter().any(|sig| bytes.starts_with(sig)) {
            return Err(NoteError::malformed("missing Supernote file signature"));
        }
        footer_address(bytes).map(|_| ())
    }

    fn decode(&self, bytes: Vec<u8>) -> NoteResult<Note> {
        self.validate(&bytes)?;

        let footer = Metadata::read(&bytes, footer_address(&bytes)?)?;
        let (width, height) = match footer.address("FILE_FEATURE")? {
            Some(address) => {
                let header = Metadata::read(&bytes, address)?;
                page_size_for(header.get("APPLY_EQUIPMENT"))
            }
            None => DEFAULT_PAGE_SIZE,
        };

        let mut page_addresses = footer
            .entries
            .iter()
            .filter_map(|(key, value)| {
                let number = key.strip_prefix("PAGE")?.parse::<PageNumber>().ok()?;
                Some((number, value.as_str()))
            })
            .collect::<Vec<_>>();
        page_addresses.sort_by_key(|(number, _)| *number);

        let mut pages = Vec::with_capacity(page_addresses.len());
        for (expected, (number, address)) in (1..).zip(page_addresses) {
            if number != expected {
                return Err(NoteError::malformed(format!(
                    "page table expected PAGE{expected}, found PAGE{number}"
                )));
            }
            pages.push(parse_page(&bytes, number, parse_address(address)?)?);
        }

        Ok(Note::new(width, height, pages, bytes))
    }

    fn rasterize(&self, note: &Note, page: PageNumber) -> NoteResult<RasterImage> {
        let page_ref = note.page(page)?;
        let pixel_count = note.width as usize * note.height as usize;
        let mut canvas = vec![rle::GRAY_WHITE; pixel_count];

        // layers are stored top-most first
        for layer in page_ref.layers.iter().rev() {
            let data = note.layer_bytes(layer)?;
            match layer.protocol.as_str() {
                PROTOCOL_RLE => {
                    let all_blank = layer.name == BACKGROUND_LAYER;
                    let codes = rle::decode(data, note.width, note.height, all_blank)
                        .map_err(|err| NoteError::page_render(page, err))?;
                    for (pixel, code) in canvas.iter_mut().zip(codes) {
                        if let Some(gray) = rle::gray_level(code) {
                            *pixel = gray;
                        }
                    }
                }
                PROTOCOL_PNG => {
                    let image = image::load_from_memory(data)
                        .map_err(|err| NoteError::page_render(page, err))?
                        .to_luma_alpha8();
                    if image.dimensions() != (note.width, note.height) {
                        return Err(NoteError::page_render_message(
                            page,
                            format!(
                                "layer {} is {}x{}, page is {}x{}",
                                layer.name,
                                image.width(),
                                image.height(),
                                note.width,
                                note.height
                            ),
                        ));
                    }
                    let coverage = image.pixels().map(|px| (px.0[0], px.0[1]));
                    for (pixel, (gray, alpha)) in canvas.iter_mut().zip(coverage) {
                        *pixel = blend(*pixel, gray, alpha);
                    }
                }
                other => {
                    return Err(NoteError::page_render_message(
                        page,
                        format!("unsupported layer protocol {other:?}"),
                    ));
                }
            }
        }

        RasterImage::new(note.width, note.height, canvas)
    }
}

/// Straight-alpha "over" of `top` onto `below`.
fn blend(below: u8, top: u8, alpha: u8) -> u8 {
    match alpha {
        0 => below,
        u8::MAX => top,
        _ => {
            let alpha = u16::from(alpha);
            let mixed = u16::from(top) * alpha + u16::from(below) * (255 - alpha);
            ((mixed + 127) / 255) as u8
        }
    }
}

fn page_size_for(equipment: Option<&str>) -> (u32, u32) {
    match equipment {
        Some(HIGH_RES_EQUIPMENT) => HIGH_RES_PAGE_SIZE,
        _ => DEFAULT_PAGE_SIZE,
    }
}

fn parse_page(bytes: &[u8], number: PageNumber, address: usize) -> NoteResult<Page> {
    let meta = Metadata::read(bytes, address)?;

    let order = match meta.get("LAYERSEQ") {
        Some(seq) if !seq.is_empty() => seq.split(',').map(str::trim).collect::<Vec<_>>(),
        _ => LAYER_KEYS.to_vec(),
    };

    let mut layers = Vec::new();
    for name in order {
        let Some(layer_address) = meta.address(name)? else {
            continue;
        };
        let layer_meta = Metadata::read(bytes, layer_address)?;
        let Some(bitmap_address) = layer_meta.address("LAYERBITMAP")? else {
            continue;
        };
        layers.push(Layer {
            name: layer_meta.get("LAYERNAME").unwrap_or(name).to_string(),
            protocol: layer_meta
                .get("LAYERPROTOCOL")
                .unwrap_or(PROTOCOL_RLE)
                .to_string(),
            bitmap: block(bytes, bitmap_address)?,
        });
    }

    let recognized_text = match meta.address("RECOGNTEXT")? {
        Some(text_address) => recognized_text(&bytes[block(bytes, text_address)?]),
        None => None,
    };

    Ok(Page {
        number,
        layers,
        recognized_text,
    })
}

#[derive(Deserialize)]
struct RecognitionDoc {
    #[serde(default)]
    elements: Vec<RecognitionElement>,
}

#[derive(Deserialize)]
struct RecognitionElement {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    label: String,
}

fn recognized_text(payload: &[u8]) -> Option<String> {
    let json = match BASE64.decode(payload) {
        Ok(json) => json,
        Err(err) => {
            log::debug!("recognized text block is not base64: {err}");
            return None;
        }
    };
    let doc = match serde_json::from_slice::<RecognitionDoc>(&json) {
        Ok(doc) => doc,
        Err(err) => {
            log::debug!("recognized text block is not valid json: {err}");
            return None;
        }
    };
    let text = doc
        .elements
        .into_iter()
        .filter(|element| element.kind == "Text")
        .map(|element| element.label)
        .collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn footer_address(bytes: &[u8]) -> NoteResult<usize> {
    let tail = bytes
        .len()
        .checked_sub(ADDRESS_LEN)
        .ok_or(NoteError::malformed("buffer too small for footer pointer"))?;
    let address = read_u32(bytes, tail)? as usize;
    if address >= tail {
        return Err(NoteError::malformed(format!(
            "footer address {address} is outside the file"
        )));
    }
    Ok(address)
}

/// Payload range of the block starting at `address`.
fn block(bytes: &[u8], address: usize) -> NoteResult<Range<usize>> {
    let len = read_u32(bytes, address)? as usize;
    let start = address
        .checked_add(ADDRESS_LEN)
        .ok_or_else(|| NoteError::malformed(format!("block address {address} overflows")))?;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| NoteError::malformed(format!("block at {address} overruns the file")))?;
    Ok(start..end)
}

fn read_u32(bytes: &[u8], offset: usize) -> NoteResult<u32> {
    let raw = offset
        .checked_add(ADDRESS_LEN)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| NoteError::malformed(format!("address {offset} is outside the file")))?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn parse_address(value: &str) -> NoteResult<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| NoteError::malformed(format!("invalid block address {value:?}")))
}

struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    fn parse_str(raw: &str) -> Self {
        let mut entries = Vec::new();
        let mut rest = raw;
        while let Some(open) = rest.find('<') {
            let Some(close) = rest[open..].find('>') else {
                break;
            };
            let item = &rest[open + 1..open + close];
            if let Some((key, value)) = item.split_once(':') {
                entries.push((key.to_string(), value.to_string()));
            }
            rest = &rest[open + close + 1..];
        }
        Self { entries }
    }

    fn read(bytes: &[u8], address: usize) -> NoteResult<Self> {
        let raw = std::str::from_utf8(&bytes[block(bytes, address)?]).map_err(|_| {
            NoteError::malformed(format!("metadata block at {address} is not utf-8"))
        })?;
        Ok(Self::parse_str(raw))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Address stored under `key`; `0` and absent keys mean "no block".
    fn address(&self, key: &str) -> NoteResult<Option<usize>> {
        match self.get(key) {
            Some(value) => parse_address(value).map(|address| (address != 0).then_some(address)),
            None => Ok(None),
        }
    }
}
