//! Image XObjects for signature and stamp values
//!
//! PNG is decoded to 8-bit samples and re-compressed with Flate, with any
//! alpha channel split into a soft mask. JPEG is passed through untouched
//! under `DCTDecode`; only its header is read for size and components.

use flate2::{write::ZlibEncoder, Compression};
use image::{codecs::jpeg::JpegDecoder, ExtendedColorType, ImageDecoder};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Write};

use crate::error::ImageError;
use crate::operations::ImageFormat;

/// Pixel data ready to become an image XObject
#[derive(Debug)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub color_space: &'static str,
    pub filter: &'static str,
    pub data: Vec<u8>,
    /// Flate-compressed 8-bit gray soft mask
    pub alpha: Option<Vec<u8>>,
}

pub fn decode_image(bytes: &[u8], format: ImageFormat) -> Result<ImageData, ImageError> {
    match format {
        ImageFormat::Png => decode_png(bytes),
        ImageFormat::Jpeg => inspect_jpeg(bytes),
    }
}

fn decode_png(bytes: &[u8]) -> Result<ImageData, ImageError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    let samples = &buf[..info.buffer_size()];

    let (channels, has_alpha, color_space) = match info.color_type {
        png::ColorType::Grayscale => (1, false, "DeviceGray"),
        png::ColorType::GrayscaleAlpha => (2, true, "DeviceGray"),
        png::ColorType::Rgb => (3, false, "DeviceRGB"),
        png::ColorType::Rgba => (4, true, "DeviceRGB"),
        png::ColorType::Indexed => return Err(ImageError::UnexpandedPalette),
    };

    let (color, alpha) = if has_alpha {
        let color_channels = channels - 1;
        let pixels = samples.len() / channels;
        let mut color = Vec::with_capacity(pixels * color_channels);
        let mut alpha = Vec::with_capacity(pixels);
        for px in samples.chunks_exact(channels) {
            color.extend_from_slice(&px[..color_channels]);
            alpha.push(px[color_channels]);
        }
        let alpha = if alpha.iter().all(|a| *a == 255) {
            None
        } else {
            Some(flate_compress(&alpha)?)
        };
        (color, alpha)
    } else {
        (samples.to_vec(), None)
    };

    Ok(ImageData {
        width: info.width,
        height: info.height,
        color_space,
        filter: "FlateDecode",
        data: flate_compress(&color)?,
        alpha,
    })
}

fn inspect_jpeg(bytes: &[u8]) -> Result<ImageData, ImageError> {
    let decoder = JpegDecoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions();
    let color_space = match decoder.original_color_type() {
        ExtendedColorType::L8 | ExtendedColorType::L16 => "DeviceGray",
        ExtendedColorType::Cmyk8 => "DeviceCMYK",
        _ => "DeviceRGB",
    };

    Ok(ImageData {
        width,
        height,
        color_space,
        filter: "DCTDecode",
        data: bytes.to_vec(),
        alpha: None,
    })
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Add the image (and its soft mask) to the document, returning the XObject id
pub fn add_image_xobject(doc: &mut Document, image: ImageData) -> ObjectId {
    let smask_id = image.alpha.map(|alpha| {
        doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            alpha,
        ))
    });

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => image.color_space,
        "BitsPerComponent" => 8,
        "Filter" => image.filter,
    };
    if let Some(smask_id) = smask_id {
        dict.set("SMask", Object::Reference(smask_id));
    }

    // Already encoded; keep lopdf from compressing it again
    let stream = Stream::new(dict, image.data).with_compression(false);
    doc.add_object(stream)
}
