use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use databuffer_core::error::DataBufferError;
use databuffer_core::grid::CountGrid;
use databuffer_core::manifest::{DataBuffer, Manifest};

pub fn write_buffers(buffers: &[DataBuffer]) -> Result<(), DataBufferError> {
    info!("Writing files");
    for buffer in buffers {
        let mut writer = BufWriter::new(File::create(&buffer.url)?);
        serde_json::to_writer(&mut writer, &buffer.grid.to_rows())?;
        writer.flush()?;
        info!("Wrote {}", buffer.url);
    }
    Ok(())
}

pub fn manifest_path(stem: &Path) -> PathBuf {
    PathBuf::from(format!("{}_data.json", stem.display()))
}

/// The manifest is written last: a failed run leaves buffer files behind
/// but never a manifest describing them.
pub fn write_manifest(stem: &Path, manifest: &Manifest) -> Result<(), DataBufferError> {
    let path = manifest_path(stem);
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, manifest)?;
    writer.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Sum several written buffer files elementwise into one combined buffer.
pub fn aggregate(outfile: &Path, infiles: &[PathBuf]) -> Result<(), DataBufferError> {
    let mut combined: Option<CountGrid> = None;
    for path in infiles {
        let rows: Vec<Vec<f64>> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let grid = CountGrid::from_rows(rows)?;
        match combined.as_mut() {
            Some(total) => total.merge_from(&grid)?,
            None => combined = Some(grid),
        }
    }
    let combined = combined
        .ok_or_else(|| DataBufferError::MalformedInput("no input buffers".to_string()))?;
    let mut writer = BufWriter::new(File::create(outfile)?);
    serde_json::to_writer(&mut writer, &combined.to_rows())?;
    writer.flush()?;
    info!("Wrote {}", outfile.display());
    Ok(())
}
