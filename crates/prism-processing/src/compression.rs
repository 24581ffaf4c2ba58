use prism_core::{DerivativeJob, SourceFormat, TargetFormat};

/// JPEG encode options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegOptions {
    pub quality: u8,
    pub progressive: bool,
}

/// PNG encode options. Output is palette-quantized; `quality` scales the
/// palette size (100 keeps the full 256 colours). `interlaced` writes Adam7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngOptions {
    pub quality: u8,
    pub palette: bool,
    pub max_compression: bool,
    pub interlaced: bool,
}

/// WebP encode options. `method` is libwebp's effort knob, 0 (fast) to 6 (slowest, smallest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebPOptions {
    pub quality: u8,
    pub method: u8,
}

/// Output encoding for a derivative, with its options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg(JpegOptions),
    Png(PngOptions),
    WebP(WebPOptions),
}

pub const MAX_WEBP_METHOD: u8 = 6;

impl OutputFormat {
    /// Encoding for `job` given the source's format.
    pub fn for_job(source: SourceFormat, job: &DerivativeJob) -> Self {
        let quality = job.variant.quality;
        match (job.target, source) {
            (TargetFormat::Original, SourceFormat::Jpeg) => OutputFormat::Jpeg(JpegOptions {
                quality,
                progressive: true,
            }),
            (TargetFormat::Original, SourceFormat::Png) => OutputFormat::Png(PngOptions {
                quality,
                palette: true,
                max_compression: true,
                interlaced: true,
            }),
            (TargetFormat::WebP, _) => OutputFormat::WebP(WebPOptions {
                quality,
                method: MAX_WEBP_METHOD,
            }),
        }
    }

    pub fn quality(&self) -> u8 {
        match self {
            OutputFormat::Jpeg(opts) => opts.quality,
            OutputFormat::Png(opts) => opts.quality,
            OutputFormat::WebP(opts) => opts.quality,
        }
    }
}

/// Encoders behind the native codec
#[cfg(feature = "native-codec")]
pub struct ImageCompressor;

#[cfg(feature = "native-codec")]
mod native {
    use super::{ImageCompressor, JpegOptions, OutputFormat, PngOptions, WebPOptions};
    use crate::error::EncodeError;
    use bytes::Bytes;
    use image::{DynamicImage, GenericImageView};

    /// NeuQuant sampling factor: 1 is the most thorough, 30 the fastest.
    const NEUQUANT_SAMPLE_FACTOR: i32 = 10;
    const MIN_PALETTE_COLORS: usize = 16;
    const MAX_PALETTE_COLORS: usize = 256;

    impl ImageCompressor {
        pub fn compress(img: &DynamicImage, format: &OutputFormat) -> Result<Bytes, EncodeError> {
            match format {
                OutputFormat::Jpeg(opts) => Self::compress_jpeg(img, opts),
                OutputFormat::Png(opts) => Self::compress_png(img, opts),
                OutputFormat::WebP(opts) => Self::compress_webp(img, opts),
            }
        }

        /// Compress to JPEG using mozjpeg
        fn compress_jpeg(img: &DynamicImage, opts: &JpegOptions) -> Result<Bytes, EncodeError> {
            let rgb_img = img.to_rgb8();
            let (width, height) = rgb_img.dimensions();

            let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
            comp.set_size(width as usize, height as usize);
            comp.set_quality(f32::from(opts.quality));
            if opts.progressive {
                comp.set_progressive_mode();
            }
            comp.set_optimize_coding(true);

            let mut comp = comp.start_compress(Vec::new()).map_err(EncodeError::codec)?;
            comp.write_scanlines(&rgb_img).map_err(EncodeError::codec)?;
            let jpeg_data = comp.finish().map_err(EncodeError::codec)?;

            Ok(Bytes::from(jpeg_data))
        }

        /// Compress to an indexed PNG with a NeuQuant palette
        fn compress_png(img: &DynamicImage, opts: &PngOptions) -> Result<Bytes, EncodeError> {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();

            let mut buffer = Vec::new();
            let mut encoder = png::Encoder::new(&mut buffer, width, height);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(if opts.max_compression {
                png::Compression::Best
            } else {
                png::Compression::Default
            });
            encoder.set_adaptive_filter(png::AdaptiveFilterType::Adaptive);

            let data = if opts.palette {
                let colors = palette_size(opts.quality);
                let quantizer =
                    color_quant::NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, colors, rgba.as_raw());
                let color_map = quantizer.color_map_rgba();

                let mut palette = Vec::with_capacity(colors * 3);
                let mut alphas = Vec::with_capacity(colors);
                for entry in color_map.chunks_exact(4) {
                    palette.extend_from_slice(&entry[..3]);
                    alphas.push(entry[3]);
                }

                encoder.set_color(png::ColorType::Indexed);
                encoder.set_palette(palette);
                if alphas.iter().any(|&a| a != u8::MAX) {
                    encoder.set_trns(alphas);
                }

                rgba.as_raw()
                    .chunks_exact(4)
                    .map(|pixel| quantizer.index_of(pixel) as u8)
                    .collect::<Vec<u8>>()
            } else {
                encoder.set_color(png::ColorType::Rgba);
                rgba.into_raw()
            };

            let mut writer = encoder.write_header().map_err(EncodeError::codec)?;
            writer.write_image_data(&data).map_err(EncodeError::codec)?;
            writer.finish().map_err(EncodeError::codec)?;

            if opts.interlaced || opts.max_compression {
                buffer = Self::optimize_png(&buffer, opts)?;
            }

            Ok(Bytes::from(buffer))
        }

        /// Re-deflate with oxipng, optionally rewriting the scanlines as Adam7.
        ///
        /// Colour type is left alone so an indexed image stays indexed.
        fn optimize_png(data: &[u8], opts: &PngOptions) -> Result<Vec<u8>, EncodeError> {
            let mut options = if opts.max_compression {
                oxipng::Options::max_compression()
            } else {
                oxipng::Options::default()
            };
            options.interlace = Some(if opts.interlaced {
                oxipng::Interlacing::Adam7
            } else {
                oxipng::Interlacing::None
            });
            options.color_type_reduction = false;
            options.grayscale_reduction = false;
            options.force = true;

            oxipng::optimize_from_memory(data, &options).map_err(EncodeError::codec)
        }

        /// Compress to lossy WebP
        fn compress_webp(img: &DynamicImage, opts: &WebPOptions) -> Result<Bytes, EncodeError> {
            let (width, height) = img.dimensions();

            // Convert to RGBA for WebP encoding
            let rgba_img = img.to_rgba8();

            let mut config = libwebp_sys::WebPConfig::new()
                .map_err(|_| EncodeError::Codec("failed to initialise WebP config".to_string()))?;
            config.lossless = 0;
            config.quality = f32::from(opts.quality);
            config.method = i32::from(opts.method.min(super::MAX_WEBP_METHOD));

            let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
            let webp_data = encoder
                .encode_advanced(&config)
                .map_err(|e| EncodeError::Codec(format!("WebP encode failed: {:?}", e)))?;

            Ok(Bytes::copy_from_slice(&webp_data))
        }
    }

    /// Palette size for a quality value: 100 keeps 256 colours, lower values
    /// shrink the palette proportionally down to a floor of 16.
    pub(crate) fn palette_size(quality: u8) -> usize {
        (usize::from(quality.min(100)) * MAX_PALETTE_COLORS / 100)
            .clamp(MIN_PALETTE_COLORS, MAX_PALETTE_COLORS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::VariantCatalog;

    fn job(name: &str, target: TargetFormat) -> DerivativeJob {
        DerivativeJob::new(VariantCatalog::standard().get(name).unwrap().clone(), target)
    }

    #[test]
    fn test_for_job_jpeg_source() {
        let format =
            OutputFormat::for_job(SourceFormat::Jpeg, &job("mobile", TargetFormat::Original));
        assert_eq!(
            format,
            OutputFormat::Jpeg(JpegOptions {
                quality: 40,
                progressive: true
            })
        );
    }

    #[test]
    fn test_for_job_png_source_keeps_literal_quality() {
        let format =
            OutputFormat::for_job(SourceFormat::Png, &job("widescreen", TargetFormat::Original));
        assert_eq!(
            format,
            OutputFormat::Png(PngOptions {
                quality: 100,
                palette: true,
                max_compression: true,
                interlaced: true
            })
        );
    }

    #[test]
    fn test_for_job_webp_uses_max_effort() {
        for source in [SourceFormat::Jpeg, SourceFormat::Png] {
            let format = OutputFormat::for_job(source, &job("placeholder", TargetFormat::WebP));
            assert_eq!(
                format,
                OutputFormat::WebP(WebPOptions {
                    quality: 30,
                    method: 6
                })
            );
            assert_eq!(format.quality(), 30);
        }
    }

    #[cfg(feature = "native-codec")]
    mod native_codec {
        use super::super::native::palette_size;
        use super::super::*;
        use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
        use std::io::Cursor;

        fn gradient(width: u32, height: u32) -> DynamicImage {
            let mut img = RgbaImage::new(width, height);
            for (x, y, pixel) in img.enumerate_pixels_mut() {
                *pixel = Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255]);
            }
            DynamicImage::ImageRgba8(img)
        }

        #[test]
        fn test_palette_size() {
            assert_eq!(palette_size(100), 256);
            assert_eq!(palette_size(40), 102);
            assert_eq!(palette_size(0), 16);
        }

        #[test]
        fn test_compress_jpeg_is_progressive() {
            let img = gradient(64, 48);
            let data = ImageCompressor::compress(
                &img,
                &OutputFormat::Jpeg(JpegOptions {
                    quality: 60,
                    progressive: true,
                }),
            )
            .unwrap();

            assert_eq!(&data[..2], &[0xFF, 0xD8]);
            // SOF2 marks a progressive DCT frame.
            assert!(data.windows(2).any(|w| w == [0xFF, 0xC2]));

            let decoded = image::load_from_memory_with_format(&data, ImageFormat::Jpeg).unwrap();
            assert_eq!(decoded.dimensions(), (64, 48));
        }

        #[test]
        fn test_compress_png_is_indexed() {
            let img = gradient(40, 30);
            let data = ImageCompressor::compress(
                &img,
                &OutputFormat::Png(PngOptions {
                    quality: 100,
                    palette: true,
                    max_compression: true,
                    interlaced: true,
                }),
            )
            .unwrap();

            let decoder = png::Decoder::new(Cursor::new(data.to_vec()));
            let reader = decoder.read_info().unwrap();
            assert_eq!(reader.info().color_type, png::ColorType::Indexed);
            assert_eq!((reader.info().width, reader.info().height), (40, 30));
        }

        #[test]
        fn test_compress_png_is_adam7_interlaced() {
            let img = gradient(90, 30);
            let data = ImageCompressor::compress(
                &img,
                &OutputFormat::Png(PngOptions {
                    quality: 40,
                    palette: true,
                    max_compression: true,
                    interlaced: true,
                }),
            )
            .unwrap();

            // IHDR interlace method byte.
            assert_eq!(&data[12..16], b"IHDR");
            assert_eq!(data[28], 1);

            let reader = png::Decoder::new(Cursor::new(data.to_vec()))
                .read_info()
                .unwrap();
            assert!(reader.info().interlaced);
            assert_eq!(reader.info().color_type, png::ColorType::Indexed);

            let decoded = image::load_from_memory_with_format(&data, ImageFormat::Png).unwrap();
            assert_eq!(decoded.dimensions(), (90, 30));
        }

        #[test]
        fn test_compress_png_keeps_transparency() {
            let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 0])));
            let data = ImageCompressor::compress(
                &img,
                &OutputFormat::Png(PngOptions {
                    quality: 50,
                    palette: true,
                    max_compression: true,
                    interlaced: true,
                }),
            )
            .unwrap();

            let decoded = image::load_from_memory_with_format(&data, ImageFormat::Png).unwrap();
            assert_eq!(decoded.to_rgba8().get_pixel(0, 0)[3], 0);
        }

        #[test]
        fn test_compress_webp() {
            let img = gradient(50, 20);
            let data = ImageCompressor::compress(
                &img,
                &OutputFormat::WebP(WebPOptions {
                    quality: 80,
                    method: 6,
                }),
            )
            .unwrap();

            assert_eq!(&data[..4], b"RIFF");
            assert_eq!(&data[8..12], b"WEBP");
            let decoded = image::load_from_memory_with_format(&data, ImageFormat::WebP).unwrap();
            assert_eq!(decoded.dimensions(), (50, 20));
        }
    }
}
