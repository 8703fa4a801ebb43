//! Raster export for offline authoring tools.
//!
//! The grid is written as a row-major grayscale PNG (one sample per cell,
//! row = z index, column = x index) linearly normalised between
//! `minHeight` and `maxHeight`, plus a JSON sidecar carrying the numbers
//! needed to rebuild matching displacement geometry.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ExportConfig;
use crate::error::{Result, TerrainError};
use crate::heightgrid::{GridLayout, HeightGrid};
use crate::query::ElevationProbe;
use crate::tilemap::bilinear;

/// Sample depth of the exported raster
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitDepth {
    Eight,
    #[default]
    Sixteen,
}

impl BitDepth {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(BitDepth::Eight),
            16 => Some(BitDepth::Sixteen),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    /// Largest sample value
    pub fn max_sample(&self) -> u16 {
        match self {
            BitDepth::Eight => u8::MAX as u16,
            BitDepth::Sixteen => u16::MAX,
        }
    }
}

/// Sidecar record written next to the raster
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterMetadata {
    pub world_size: f32,
    pub cell_size: f32,
    /// Height encoded by sample 0
    pub min_height: f32,
    /// Height encoded by the largest sample
    pub max_height: f32,
    pub bit_depth: BitDepth,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    /// RFC 3339 timestamp
    pub exported_at: String,
}

/// A quantised copy of the grid that decodes heights the same way the
/// offline tool does.
#[derive(Clone, Debug)]
pub struct HeightRaster {
    metadata: RasterMetadata,
    layout: GridLayout,
    samples: Vec<u16>,
}

impl HeightRaster {
    /// Quantise the current grid. Requires a ready grid.
    pub fn from_grid(grid: &HeightGrid, config: &ExportConfig, seed: u64) -> Result<Self> {
        let snapshot = grid.snapshot()?;
        let (min_height, max_height) = match config.height_range {
            Some(range) => range,
            None => snapshot.min_max().unwrap_or((0.0, 0.0)),
        };
        let layout = *grid.layout();
        let max_sample = config.bit_depth.max_sample() as f32;
        let span = max_height - min_height;

        let samples = snapshot
            .as_slice()
            .iter()
            .map(|&h| {
                let t = if span > 0.0 {
                    ((h - min_height) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (t * max_sample).round() as u16
            })
            .collect();

        let n = layout.cells_per_side() as u32;
        let metadata = RasterMetadata {
            world_size: layout.world_size(),
            cell_size: layout.cell_size(),
            min_height,
            max_height,
            bit_depth: config.bit_depth,
            width: n,
            height: n,
            seed,
            exported_at: Utc::now().to_rfc3339(),
        };
        Ok(Self { metadata, layout, samples })
    }

    pub fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Height difference represented by one sample step.
    pub fn quantization_step(&self) -> f32 {
        (self.metadata.max_height - self.metadata.min_height)
            / self.metadata.bit_depth.max_sample() as f32
    }

    pub fn decode(&self, sample: u16) -> f32 {
        let t = sample as f32 / self.metadata.bit_depth.max_sample() as f32;
        self.metadata.min_height + (self.metadata.max_height - self.metadata.min_height) * t
    }

    /// Decoded height of one cell; indices clamp to the edge.
    pub fn cell_height(&self, cell_x: usize, cell_z: usize) -> f32 {
        let max = self.layout.cells_per_side() - 1;
        let idx = cell_z.min(max) * self.layout.cells_per_side() + cell_x.min(max);
        self.decode(self.samples[idx])
    }

    /// Bilinear reconstruction over cell centres, as displacement geometry
    /// built from the raster would produce.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let (gx, gz) = self.layout.grid_coords(x, z);
        let x0 = gx.floor();
        let z0 = gz.floor();
        let (x0u, z0u) = (x0 as usize, z0 as usize);
        bilinear(
            self.cell_height(x0u, z0u),
            self.cell_height(x0u + 1, z0u),
            self.cell_height(x0u, z0u + 1),
            self.cell_height(x0u + 1, z0u + 1),
            gx - x0,
            gz - z0,
        )
    }

    /// Write the grayscale PNG.
    pub fn write_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let (w, h) = (self.metadata.width, self.metadata.height);
        let shape_error = TerrainError::RasterShape {
            expected: (w * h) as usize,
            actual: self.samples.len(),
        };
        match self.metadata.bit_depth {
            BitDepth::Eight => {
                let bytes = self.samples.iter().map(|&s| s as u8).collect();
                let img = GrayImage::from_raw(w, h, bytes).ok_or(shape_error)?;
                img.save(path.as_ref())?;
            }
            BitDepth::Sixteen => {
                let img: ImageBuffer<Luma<u16>, Vec<u16>> =
                    ImageBuffer::from_raw(w, h, self.samples.clone()).ok_or(shape_error)?;
                img.save(path.as_ref())?;
            }
        }
        info!(
            path = %path.as_ref().display(),
            width = w,
            height = h,
            bits = self.metadata.bit_depth.bits(),
            "wrote height raster"
        );
        Ok(())
    }

    /// Write the JSON sidecar.
    pub fn write_metadata(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.metadata)?;
        info!(path = %path.as_ref().display(), "wrote raster metadata");
        Ok(())
    }

    /// Write `<prefix>.png` and `<prefix>.json`, returning both paths.
    pub fn write_files(&self, prefix: impl AsRef<Path>) -> Result<(PathBuf, PathBuf)> {
        let png = prefix.as_ref().with_extension("png");
        let json = prefix.as_ref().with_extension("json");
        self.write_png(&png)?;
        self.write_metadata(&json)?;
        Ok((png, json))
    }

    /// Read a raster and its sidecar back.
    pub fn load(png: impl AsRef<Path>, metadata: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(metadata.as_ref())?);
        let metadata: RasterMetadata = serde_json::from_reader(reader)?;
        let layout = GridLayout::new(metadata.world_size, metadata.cell_size)?;

        let img = image::open(png.as_ref())?;
        let samples: Vec<u16> = match metadata.bit_depth {
            BitDepth::Eight => img.to_luma8().into_raw().into_iter().map(u16::from).collect(),
            BitDepth::Sixteen => img.to_luma16().into_raw(),
        };

        let expected = layout.cell_count();
        if samples.len() != expected
            || metadata.width as usize != layout.cells_per_side()
            || metadata.height as usize != layout.cells_per_side()
        {
            return Err(TerrainError::RasterShape {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self { metadata, layout, samples })
    }
}

impl ElevationProbe for HeightRaster {
    /// `None` outside the exported world.
    fn probe_height(&self, x: f32, z: f32) -> Option<f32> {
        let half = self.layout.half_world();
        if x.abs() > half || z.abs() > half {
            return None;
        }
        Some(self.height_at(x, z))
    }
}
