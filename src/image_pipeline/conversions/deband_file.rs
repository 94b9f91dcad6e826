use std::io::Write;
use std::path::Path;

use tracing::{debug, info, instrument};

use crate::image_pipeline::{
    common::error::{DebandError, Result},
    flat_field::{CorrectionProfile, correct_image},
    tiff::{
        CorrectedRaster, DebandConfig, EncodeMetadata, Photometric, RasterGrid, RasterReader,
        StandardTiffReader, StandardTiffWriter, TiffWriter,
    },
};

/// Decode, correct and encode stages for single files.
///
/// The batch orchestrator calls the stage methods individually from its worker
/// pools; the `deband*` methods run a whole file on the calling thread.
pub struct DebandPipeline<R: RasterReader, W: TiffWriter> {
    reader: R,
    writer: W,
    config: DebandConfig,
}

impl DebandPipeline<StandardTiffReader, StandardTiffWriter> {
    pub fn new(config: DebandConfig) -> Result<Self> {
        Self::with_custom(StandardTiffReader, StandardTiffWriter, config)
    }
}

impl<R: RasterReader, W: TiffWriter> DebandPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: DebandConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reader,
            writer,
            config,
        })
    }

    fn validate_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if !self.config.validate_dimensions {
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(DebandError::InvalidDimensions(width, height));
        }

        Ok(())
    }

    fn read_input(path: &Path) -> Result<Vec<u8>> {
        let _span = tracing::info_span!("read_input_file").entered();
        std::fs::read(path)
            .map_err(|e| DebandError::InputReadError(format!("{}: {}", path.display(), e)))
    }

    /// Decodes a target image and checks its geometry.
    pub fn decode(&self, input_data: &[u8]) -> Result<RasterGrid> {
        let grid = {
            let _span = tracing::info_span!("decode_tiff").entered();
            self.reader.read_raster(input_data)?
        };
        {
            let _span = tracing::info_span!(
                "validate_dimensions",
                width = grid.width,
                height = grid.height
            )
            .entered();
            self.validate_dimensions(grid.width, grid.height)?;
        }
        Ok(grid)
    }

    pub fn decode_file(&self, path: &Path) -> Result<RasterGrid> {
        let input_data = Self::read_input(path)?;
        self.decode(&input_data)
    }

    /// Decodes the reference image and derives its profile.
    ///
    /// Geometry is left to the analyzer so that an empty reference surfaces as a
    /// profile error rather than a plain dimension error.
    #[instrument(skip(self, path), fields(reference = %path.display()))]
    pub fn analyze_reference(&self, path: &Path) -> Result<CorrectionProfile> {
        let reference = self.decode_reference(path)?;
        let _span = tracing::info_span!("analyze_reference").entered();
        Ok(CorrectionProfile::analyze(&reference)?)
    }

    pub fn decode_reference(&self, path: &Path) -> Result<RasterGrid> {
        let input_data = Self::read_input(path)?;
        let _span = tracing::info_span!("decode_tiff").entered();
        self.reader.read_raster(&input_data)
    }

    /// Corrects `target` and builds the metadata for its output file,
    /// keeping the target's photometric interpretation.
    pub fn correct(
        &self,
        target: &RasterGrid,
        profile: &CorrectionProfile,
    ) -> Result<(CorrectedRaster, EncodeMetadata)> {
        self.correct_as(target, profile, target.photometric)
    }

    pub fn correct_as(
        &self,
        target: &RasterGrid,
        profile: &CorrectionProfile,
        photometric: Photometric,
    ) -> Result<(CorrectedRaster, EncodeMetadata)> {
        let _span = tracing::info_span!("correct", strength = self.config.strength).entered();
        let corrected = correct_image(
            target,
            profile,
            self.config.strength,
            self.config.dimension_policy,
        )?;
        let metadata = EncodeMetadata::for_output(
            corrected.width,
            corrected.height,
            corrected.channels,
            photometric,
            &self.config,
        );
        Ok((corrected, metadata))
    }

    pub fn encode(
        &self,
        image: &CorrectedRaster,
        metadata: &EncodeMetadata,
        output: &mut dyn Write,
    ) -> Result<()> {
        let _span = tracing::info_span!("encode_tiff").entered();
        self.writer.write_tiff(image, metadata, output)
    }

    /// Encodes in memory first so a failed encode never leaves a partial file behind.
    pub fn encode_file(
        &self,
        image: &CorrectedRaster,
        metadata: &EncodeMetadata,
        output_path: &Path,
    ) -> Result<()> {
        let mut buffer = Vec::new();
        self.encode(image, metadata, &mut buffer)?;

        let _span = tracing::info_span!("write_output_file").entered();
        std::fs::write(output_path, &buffer).map_err(|e| {
            DebandError::OutputWriteError(format!("{}: {}", output_path.display(), e))
        })?;
        debug!(output = %output_path.display(), bytes = buffer.len(), "Output written");
        Ok(())
    }

    #[instrument(skip(self, input_data, profile, output), fields(input_size = input_data.len()))]
    pub fn deband(
        &self,
        input_data: &[u8],
        profile: &CorrectionProfile,
        output: &mut dyn Write,
    ) -> Result<()> {
        let target = self.decode(input_data)?;
        let (corrected, metadata) = self.correct(&target, profile)?;
        self.encode(&corrected, &metadata, output)?;

        info!(
            width = corrected.width,
            height = corrected.height,
            "Debanding complete"
        );
        Ok(())
    }

    #[instrument(skip(self, input_path, output_path, profile))]
    pub fn deband_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        profile: &CorrectionProfile,
    ) -> Result<()> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            "Debanding file"
        );

        let target = self.decode_file(input_path)?;
        let (corrected, metadata) = self.correct(&target, profile)?;
        self.encode_file(&corrected, &metadata, output_path)
    }

    /// Corrects the reference with its own profile and writes it out, as RGB
    /// when it has colour channels and in its own layout otherwise.
    ///
    /// A well-behaved light source comes out as an evenly flat image, which makes
    /// this a quick visual check of the reference before running a batch.
    #[instrument(skip(self, reference_path, output_path))]
    pub fn deband_reference<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        reference_path: P,
        output_path: Q,
    ) -> Result<CorrectionProfile> {
        let reference_path = reference_path.as_ref();
        let output_path = output_path.as_ref();

        let reference = self.decode_reference(reference_path)?;
        let profile = CorrectionProfile::analyze(&reference)?;
        let photometric = if reference.channels >= 3 {
            Photometric::Rgb
        } else {
            reference.photometric
        };
        let (corrected, metadata) = self.correct_as(&reference, &profile, photometric)?;
        self.encode_file(&corrected, &metadata, output_path)?;

        info!(
            reference = %reference_path.display(),
            output = %output_path.display(),
            "Reference debanded"
        );
        Ok(profile)
    }

    pub fn config(&self) -> &DebandConfig {
        &self.config
    }
}
