use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use crate::image_pipeline::common::error::{DebandError, ProfileError, Result};
use crate::image_pipeline::conversions::DebandPipeline;
use crate::image_pipeline::flat_field::CorrectionProfile;
use crate::image_pipeline::tiff::{
    CorrectedRaster, DebandConfig, EncodeMetadata, Photometric, RasterGrid, RasterReader,
    StandardTiffReader, StandardTiffWriter, TiffWriter,
};

struct MockReader {
    should_fail: bool,
    mock_data: Option<RasterGrid>,
}

impl RasterReader for MockReader {
    fn read_raster(&self, _data: &[u8]) -> Result<RasterGrid> {
        if self.should_fail {
            return Err(DebandError::DecodeError("Mock decode error".to_string()));
        }
        Ok(self
            .mock_data
            .clone()
            .unwrap_or_else(|| flat_rgb(100, 100, 1000)))
    }
}

struct MockWriter {
    should_fail: bool,
    written_data: Arc<Mutex<Vec<(CorrectedRaster, EncodeMetadata)>>>,
}

impl TiffWriter for MockWriter {
    fn write_tiff(
        &self,
        image: &CorrectedRaster,
        metadata: &EncodeMetadata,
        _output: &mut dyn Write,
    ) -> Result<()> {
        if self.should_fail {
            return Err(DebandError::EncodeError("Mock encode error".to_string()));
        }
        self.written_data
            .lock()
            .unwrap()
            .push((image.clone(), metadata.clone()));
        Ok(())
    }
}

fn flat_rgb(width: usize, height: usize, value: u32) -> RasterGrid {
    RasterGrid::new(
        width,
        height,
        3,
        vec![value; width * height * 3],
        16,
        Photometric::Rgb,
    )
    .unwrap()
}

fn flat_profile() -> CorrectionProfile {
    CorrectionProfile::analyze(&flat_rgb(100, 100, 1000)).unwrap()
}

fn mock_pipeline(
    reader: MockReader,
    writer_fails: bool,
    config: DebandConfig,
) -> (
    DebandPipeline<MockReader, MockWriter>,
    Arc<Mutex<Vec<(CorrectedRaster, EncodeMetadata)>>>,
) {
    let written = Arc::new(Mutex::new(Vec::new()));
    let writer = MockWriter {
        should_fail: writer_fails,
        written_data: written.clone(),
    };
    (
        DebandPipeline::with_custom(reader, writer, config).unwrap(),
        written,
    )
}

#[test]
fn test_successful_deband() {
    let reader = MockReader {
        should_fail: false,
        mock_data: None,
    };
    let (pipeline, written) = mock_pipeline(reader, false, DebandConfig::default());

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.deband(b"fake tiff data", &flat_profile(), &mut output);

    assert!(result.is_ok());
    let written = written.lock().unwrap();
    assert_eq!(written.len(), 1);
    let (raster, metadata) = &written[0];
    assert!(raster.data.iter().all(|&v| v == 1000));
    assert_eq!(metadata.bits_per_sample, 16);
    assert_eq!(metadata.photometric, Photometric::Rgb);
}

#[test]
fn test_reader_failure() {
    let reader = MockReader {
        should_fail: true,
        mock_data: None,
    };
    let (pipeline, written) = mock_pipeline(reader, false, DebandConfig::default());

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.deband(b"fake tiff data", &flat_profile(), &mut output);

    assert!(matches!(result, Err(DebandError::DecodeError(_))));
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_writer_failure() {
    let reader = MockReader {
        should_fail: false,
        mock_data: None,
    };
    let (pipeline, _) = mock_pipeline(reader, true, DebandConfig::default());

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.deband(b"fake tiff data", &flat_profile(), &mut output);

    assert!(matches!(result, Err(DebandError::EncodeError(_))));
}

#[test]
fn test_dimension_validation_failure() {
    let reader = MockReader {
        should_fail: false,
        mock_data: Some(RasterGrid::new(0, 10, 3, Vec::new(), 16, Photometric::Rgb).unwrap()),
    };
    let (pipeline, written) = mock_pipeline(reader, false, DebandConfig::default());

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.deband(b"fake tiff data", &flat_profile(), &mut output);

    assert!(matches!(result, Err(DebandError::InvalidDimensions(0, 10))));
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_dimension_validation_disabled() {
    let reader = MockReader {
        should_fail: false,
        mock_data: Some(RasterGrid::new(0, 10, 3, Vec::new(), 16, Photometric::Rgb).unwrap()),
    };
    let config = DebandConfig::builder().validate_dimensions(false).build();
    let (pipeline, written) = mock_pipeline(reader, false, config);

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.deband(b"fake tiff data", &flat_profile(), &mut output);

    assert!(result.is_ok());
    assert_eq!(written.lock().unwrap().len(), 1);
}

#[test]
fn test_invalid_strength_rejected_at_construction() {
    let config = DebandConfig::builder().strength(0.0).build();
    let result = DebandPipeline::new(config);
    assert!(matches!(result, Err(DebandError::InvalidConfig(_))));
}

#[test]
fn test_empty_reference_is_profile_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.tif");
    std::fs::write(&path, b"ignored by the mock").unwrap();

    let reader = MockReader {
        should_fail: false,
        mock_data: Some(RasterGrid::new(0, 0, 3, Vec::new(), 16, Photometric::Rgb).unwrap()),
    };
    let (pipeline, _) = mock_pipeline(reader, false, DebandConfig::default());

    let result = pipeline.analyze_reference(&path);
    assert!(matches!(
        result,
        Err(DebandError::Profile(ProfileError::EmptyReference { .. }))
    ));
}

#[test]
fn test_missing_input_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = DebandPipeline::new(DebandConfig::default()).unwrap();

    let result = pipeline.deband_file(
        dir.path().join("missing.tif"),
        dir.path().join("out.tif"),
        &flat_profile(),
    );
    assert!(matches!(result, Err(DebandError::InputReadError(_))));
    assert!(!dir.path().join("out.tif").exists());
}

#[test]
fn test_reference_mode_writes_flat_rgb() {
    let dir = tempfile::tempdir().unwrap();
    let reference_path = dir.path().join("light.tif");
    let output_path = dir.path().join("light-debanded.tif");

    let mut reference = CorrectedRaster::zeroed(8, 6, 3);
    for (i, v) in reference.data.iter_mut().enumerate() {
        *v = 30_000 + (i % 7) as u16 * 1_000;
    }
    let metadata = EncodeMetadata::for_output(8, 6, 3, Photometric::Rgb, &DebandConfig::default());
    let mut bytes = Vec::new();
    StandardTiffWriter
        .write_tiff(&reference, &metadata, &mut bytes)
        .unwrap();
    std::fs::write(&reference_path, bytes).unwrap();

    let pipeline = DebandPipeline::new(DebandConfig::default()).unwrap();
    let profile = pipeline
        .deband_reference(&reference_path, &output_path)
        .unwrap();

    let written = StandardTiffReader
        .read_raster(&std::fs::read(&output_path).unwrap())
        .unwrap();
    assert_eq!(written.photometric, Photometric::Rgb);
    for y in 0..6 {
        for x in 0..8 {
            for c in 0..3 {
                let avg = profile.channel_average()[c];
                assert!((written.sample(x, y, c) as f64 - avg).abs() <= 1.0);
            }
        }
    }
}

#[test]
fn test_reference_mode_keeps_gray_layout() {
    let dir = tempfile::tempdir().unwrap();
    let reference_path = dir.path().join("light-gray.tif");
    let output_path = dir.path().join("light-gray-debanded.tif");

    let mut reference = CorrectedRaster::zeroed(3, 2, 1);
    for (i, v) in reference.data.iter_mut().enumerate() {
        *v = 20_000 + i as u16 * 500;
    }
    let metadata =
        EncodeMetadata::for_output(3, 2, 1, Photometric::MinIsBlack, &DebandConfig::default());
    let mut bytes = Vec::new();
    StandardTiffWriter
        .write_tiff(&reference, &metadata, &mut bytes)
        .unwrap();
    std::fs::write(&reference_path, bytes).unwrap();

    let pipeline = DebandPipeline::new(DebandConfig::default()).unwrap();
    let profile = pipeline
        .deband_reference(&reference_path, &output_path)
        .unwrap();

    let written = StandardTiffReader
        .read_raster(&std::fs::read(&output_path).unwrap())
        .unwrap();
    assert_eq!(written.channels, 1);
    assert_eq!(written.photometric, Photometric::MinIsBlack);
    let avg = profile.channel_average()[0];
    for y in 0..2 {
        for x in 0..3 {
            assert!((written.sample(x, y, 0) as f64 - avg).abs() <= 1.0);
        }
    }
}
