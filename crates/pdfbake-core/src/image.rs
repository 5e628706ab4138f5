//! Raster image decoding and XObject embedding

use std::io::{Cursor, Write};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::ComposeError;
use crate::operations::ImageData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Detect the image format from magic bytes, then from the MIME hint
pub fn sniff_format(bytes: &[u8], mime: Option<&str>) -> Option<ImageFormat> {
    if bytes.starts_with(PNG_MAGIC) {
        return Some(ImageFormat::Png);
    }
    if bytes.starts_with(JPEG_MAGIC) {
        return Some(ImageFormat::Jpeg);
    }
    let mime = mime?.to_lowercase();
    if mime.contains("png") {
        Some(ImageFormat::Png)
    } else if mime.contains("jpeg") || mime.contains("jpg") {
        Some(ImageFormat::Jpeg)
    } else {
        None
    }
}

/// Image samples ready to be written as an XObject
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub color_space: &'static str,
    pub filter: &'static str,
    pub data: Vec<u8>,
    /// `/Decode` array, for samples stored inverted
    pub decode: Option<Vec<f32>>,
    /// Flate-compressed 8-bit alpha channel
    pub alpha: Option<Vec<u8>>,
}

/// Decode an image operation's payload
pub fn prepare_image(image: &ImageData) -> Result<PreparedImage, ComposeError> {
    match sniff_format(&image.bytes, image.mime.as_deref()) {
        Some(ImageFormat::Png) => decode_png(&image.bytes),
        Some(ImageFormat::Jpeg) => decode_jpeg(&image.bytes),
        None => Err(ComposeError::UnsupportedImage(format!(
            "unrecognized image data ({} bytes, mime {:?})",
            image.bytes.len(),
            image.mime
        ))),
    }
}

fn decode_png(bytes: &[u8]) -> Result<PreparedImage, ComposeError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| ComposeError::UnsupportedImage(format!("PNG header: {}", e)))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| ComposeError::UnsupportedImage(format!("PNG data: {}", e)))?;
    let pixels = &buf[..info.buffer_size()];

    let (color_space, channels, has_alpha) = match info.color_type {
        png::ColorType::Grayscale => ("DeviceGray", 1, false),
        png::ColorType::GrayscaleAlpha => ("DeviceGray", 2, true),
        png::ColorType::Rgb => ("DeviceRGB", 3, false),
        png::ColorType::Rgba => ("DeviceRGB", 4, true),
        png::ColorType::Indexed => {
            return Err(ComposeError::UnsupportedImage(
                "indexed PNG was not expanded".to_string(),
            ))
        }
    };

    let (color, alpha) = if has_alpha {
        let color_channels = channels - 1;
        let mut color = Vec::with_capacity(pixels.len() / channels * color_channels);
        let mut alpha = Vec::with_capacity(pixels.len() / channels);
        for pixel in pixels.chunks_exact(channels) {
            color.extend_from_slice(&pixel[..color_channels]);
            alpha.push(pixel[color_channels]);
        }
        // Fully opaque images need no soft mask
        let alpha = if alpha.iter().all(|&a| a == 255) {
            None
        } else {
            Some(deflate(&alpha)?)
        };
        (color, alpha)
    } else {
        (pixels.to_vec(), None)
    };

    Ok(PreparedImage {
        width: info.width,
        height: info.height,
        color_space,
        filter: "FlateDecode",
        data: deflate(&color)?,
        decode: None,
        alpha,
    })
}

/// Frame parameters read from a JPEG's markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegHeader {
    width: u32,
    height: u32,
    components: u8,
    /// An APP14 "Adobe" segment was present
    adobe: bool,
}

/// Walk the marker segments up to the first start-of-scan.
fn read_jpeg_header(bytes: &[u8]) -> Result<JpegHeader, ComposeError> {
    let truncated = || ComposeError::UnsupportedImage("JPEG: truncated header".to_string());
    let mut pos = 2;
    let mut adobe = false;
    let mut frame = None;

    loop {
        if bytes.get(pos) != Some(&0xFF) {
            return Err(ComposeError::UnsupportedImage(format!("JPEG: no marker at offset {}", pos)));
        }
        // Fill bytes
        while bytes.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        let marker = *bytes.get(pos + 1).ok_or_else(truncated)?;
        pos += 2;

        // Standalone markers carry no length
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if marker == 0xDA || marker == 0xD9 {
            break;
        }

        let segment = bytes.get(pos..pos + 2).ok_or_else(truncated)?;
        let len = u16::from_be_bytes([segment[0], segment[1]]) as usize;
        let body = bytes.get(pos + 2..pos + len).ok_or_else(truncated)?;

        match marker {
            // SOF0-SOF15 except DHT, JPG and DAC
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                if body.len() < 6 {
                    return Err(truncated());
                }
                frame = Some((
                    u16::from_be_bytes([body[3], body[4]]) as u32,
                    u16::from_be_bytes([body[1], body[2]]) as u32,
                    body[5],
                ));
            }
            0xEE if body.starts_with(b"Adobe") => adobe = true,
            _ => {}
        }
        pos += len;
    }

    let (width, height, components) =
        frame.ok_or_else(|| ComposeError::UnsupportedImage("JPEG: no frame header".to_string()))?;
    Ok(JpegHeader {
        width,
        height,
        components,
        adobe,
    })
}

fn decode_jpeg(bytes: &[u8]) -> Result<PreparedImage, ComposeError> {
    let header = read_jpeg_header(bytes)?;
    // Decode once so corrupt scan data is rejected here, not by the viewer
    let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
        .map_err(|e| ComposeError::UnsupportedImage(format!("JPEG: {}", e)))?;

    let (color_space, decode) = match header.components {
        1 => ("DeviceGray", None),
        3 => ("DeviceRGB", None),
        // Adobe writes CMYK inverted
        4 if header.adobe => ("DeviceCMYK", Some([1.0, 0.0].repeat(4))),
        4 => ("DeviceCMYK", None),
        n => {
            return Err(ComposeError::UnsupportedImage(format!(
                "JPEG with {} color components",
                n
            )))
        }
    };

    Ok(PreparedImage {
        width: decoded.width(),
        height: decoded.height(),
        color_space,
        filter: "DCTDecode",
        data: bytes.to_vec(),
        decode,
        alpha: None,
    })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ComposeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ComposeError::Content(format!("compressing image: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| ComposeError::Content(format!("compressing image: {}", e)))
}

/// Add the image (and its soft mask) as XObjects
pub fn embed_image(doc: &mut Document, image: &PreparedImage) -> ObjectId {
    let smask_id = image.alpha.as_ref().map(|alpha| {
        doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(image.width as i64),
                "Height" => Object::Integer(image.height as i64),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => "FlateDecode",
            },
            alpha.clone(),
        ))
    });

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => Object::Integer(image.width as i64),
        "Height" => Object::Integer(image.height as i64),
        "ColorSpace" => image.color_space,
        "BitsPerComponent" => Object::Integer(8),
        "Filter" => image.filter,
    };
    if let Some(decode) = &image.decode {
        dict.set("Decode", decode.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>());
    }
    if let Some(smask_id) = smask_id {
        dict.set("SMask", Object::Reference(smask_id));
    }

    doc.add_object(Stream::new(dict, image.data.clone()))
}
