use std::io::Cursor;

use tiff::ColorType;

use crate::image_pipeline::common::error::DebandError;
use crate::image_pipeline::tiff::{
    CorrectedRaster, DebandConfig, DimensionPolicy, EncodeMetadata, Photometric, RasterGrid,
    RasterReader, StandardTiffReader, StandardTiffWriter, TiffCompression, TiffWriter,
    rows_per_strip,
};

fn gradient(width: usize, height: usize, channels: usize) -> CorrectedRaster {
    let mut raster = CorrectedRaster::zeroed(width, height, channels);
    for (i, v) in raster.data.iter_mut().enumerate() {
        *v = (i * 97 % 65536) as u16;
    }
    raster
}

fn encode(raster: &CorrectedRaster, photometric: Photometric, config: &DebandConfig) -> Vec<u8> {
    let metadata = EncodeMetadata::for_output(
        raster.width,
        raster.height,
        raster.channels,
        photometric,
        config,
    );
    let mut out = Vec::new();
    StandardTiffWriter
        .write_tiff(raster, &metadata, &mut out)
        .unwrap();
    out
}

#[test]
fn test_config_builder() {
    let config = DebandConfig::builder()
        .compression(TiffCompression::Lzw)
        .predictor(Some(2))
        .strength(1.5)
        .validate_dimensions(false)
        .dimension_policy(DimensionPolicy::Reject)
        .strip_bytes(4096)
        .build();

    assert_eq!(config.compression, TiffCompression::Lzw);
    assert_eq!(config.predictor, Some(2));
    assert_eq!(config.strength, 1.5);
    assert!(!config.validate_dimensions);
    assert_eq!(config.dimension_policy, DimensionPolicy::Reject);
    assert_eq!(config.strip_bytes, 4096);
    assert!(config.validate().is_ok());
}

#[test]
fn test_default_config_uses_deflate_and_unit_strength() {
    let config = DebandConfig::default();
    assert_eq!(config.compression, TiffCompression::DeflateBalanced);
    assert_eq!(config.strength, 1.0);
    assert_eq!(config.dimension_policy, DimensionPolicy::Truncate);
}

#[test]
fn test_invalid_strength_rejected() {
    for strength in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let config = DebandConfig::builder().strength(strength).build();
        assert!(matches!(
            config.validate(),
            Err(DebandError::InvalidConfig(_))
        ));
    }
}

#[test]
fn test_rows_per_strip_budget() {
    // 100 px * 1 channel * 2 bytes = 200 bytes per row
    assert_eq!(rows_per_strip(100, 1, 8192), 40);
    // rows larger than the budget still get one row per strip
    assert_eq!(rows_per_strip(10_000, 3, 8192), 1);
    assert_eq!(rows_per_strip(0, 3, 8192), 1);
}

#[test]
fn test_rgb_output_decodes_back() {
    let raster = gradient(17, 9, 3);
    let bytes = encode(&raster, Photometric::Rgb, &DebandConfig::default());

    let grid = StandardTiffReader.read_raster(&bytes).unwrap();
    assert_eq!((grid.width, grid.height, grid.channels), (17, 9, 3));
    assert_eq!(grid.bits_per_sample, 16);
    assert_eq!(grid.photometric, Photometric::Rgb);
    let expected: Vec<u32> = raster.data.iter().map(|&v| v as u32).collect();
    assert_eq!(grid.data, expected);
}

#[test]
fn test_gray_output_with_lzw_and_predictor() {
    let raster = gradient(32, 4, 1);
    let config = DebandConfig::builder()
        .compression(TiffCompression::Lzw)
        .predictor(Some(2))
        .build();
    let bytes = encode(&raster, Photometric::MinIsBlack, &config);

    let grid = StandardTiffReader.read_raster(&bytes).unwrap();
    assert_eq!(grid.channels, 1);
    assert_eq!(grid.photometric, Photometric::MinIsBlack);
    assert_eq!(grid.sample(5, 2, 0), raster.sample(5, 2, 0) as u32);
}

#[test]
fn test_rows_per_strip_tag_written() {
    let raster = gradient(100, 50, 1);
    let bytes = encode(&raster, Photometric::MinIsBlack, &DebandConfig::default());

    let mut decoder = tiff::decoder::Decoder::new(Cursor::new(bytes)).unwrap();
    let rows = decoder
        .get_tag_u32(tiff::tags::Tag::RowsPerStrip)
        .unwrap();
    assert_eq!(rows, 40);
}

#[test]
fn test_eight_bit_samples_kept_unscaled() {
    let mut bytes = Vec::new();
    {
        let mut encoder = tiff::encoder::TiffEncoder::new(Cursor::new(&mut bytes)).unwrap();
        let data: Vec<u8> = vec![10, 20, 30, 40, 50, 60];
        encoder
            .write_image::<tiff::encoder::colortype::RGB8>(2, 1, &data)
            .unwrap();
    }

    let grid = StandardTiffReader.read_raster(&bytes).unwrap();
    assert_eq!(grid.bits_per_sample, 8);
    assert_eq!(grid.data, vec![10, 20, 30, 40, 50, 60]);
    assert_eq!(grid.sample(1, 0, 2), 60);
}

#[test]
fn test_garbage_input_is_decode_error() {
    let result = StandardTiffReader.read_raster(b"definitely not a tiff");
    assert!(matches!(result, Err(DebandError::DecodeError(_))));
}

#[test]
fn test_reader_layouts() {
    assert!(matches!(
        StandardTiffReader::layout(ColorType::Gray(16)),
        Ok((1, Photometric::MinIsBlack, 16))
    ));
    assert!(matches!(
        StandardTiffReader::layout(ColorType::RGBA(8)),
        Ok((4, Photometric::Rgb, 8))
    ));
    for unsupported in [ColorType::GrayA(16), ColorType::CMYK(8), ColorType::Palette(8)] {
        assert!(matches!(
            StandardTiffReader::layout(unsupported),
            Err(DebandError::UnsupportedFormat(_))
        ));
    }
}

#[test]
fn test_unsupported_output_layout() {
    let raster = gradient(4, 4, 3);
    let metadata = EncodeMetadata::for_output(
        4,
        4,
        3,
        Photometric::MinIsBlack,
        &DebandConfig::default(),
    );
    let mut out = Vec::new();
    let result = StandardTiffWriter.write_tiff(&raster, &metadata, &mut out);
    assert!(matches!(result, Err(DebandError::UnsupportedFormat(_))));
    assert!(out.is_empty());
}

#[test]
fn test_metadata_mismatch_is_encode_error() {
    let raster = gradient(4, 4, 3);
    let metadata =
        EncodeMetadata::for_output(5, 4, 3, Photometric::Rgb, &DebandConfig::default());
    let mut out = Vec::new();
    let result = StandardTiffWriter.write_tiff(&raster, &metadata, &mut out);
    assert!(matches!(result, Err(DebandError::EncodeError(_))));
}

#[test]
fn test_raster_grid_rejects_short_buffer() {
    let result = RasterGrid::new(2, 2, 3, vec![0; 11], 16, Photometric::Rgb);
    assert!(matches!(result, Err(DebandError::DecodeError(_))));
}
