//! Reading and writing of every artifact the pipeline produces.
//!
//! Each function opens its file, writes through a `BufWriter`, and flushes
//! before returning.

use crate::error::Result;
use crate::join::CleanedClinical;
use crate::model::{FactorModel, PlsdaModel, TrainingArtifact};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

fn create<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Write the binary training artifact (bincode, standard config).
pub fn write_training_artifact<P: AsRef<Path>>(path: P, artifact: &TrainingArtifact) -> Result<()> {
    let mut writer = create(&path)?;
    bincode::serde::encode_into_std_write(artifact, &mut writer, bincode::config::standard())?;
    writer.flush()?;
    debug!(path = %path.as_ref().display(), "Wrote training artifact");
    Ok(())
}

/// Read a training artifact written by `write_training_artifact`.
pub fn read_training_artifact<P: AsRef<Path>>(path: P) -> Result<TrainingArtifact> {
    let mut reader = BufReader::new(File::open(path)?);
    let artifact = bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
    Ok(artifact)
}

/// Write any serializable value as pretty JSON.
pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let mut writer = create(&path)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Read a JSON document.
pub fn read_json<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Save a fitted factor model as JSON.
pub fn save_factor_model<P: AsRef<Path>>(path: P, model: &FactorModel) -> Result<()> {
    write_json(path, model)
}

/// Load a factor model saved by `save_factor_model`.
pub fn load_factor_model<P: AsRef<Path>>(path: P) -> Result<FactorModel> {
    read_json(path)
}

/// Save a fitted block PLS-DA model as JSON.
pub fn save_plsda_model<P: AsRef<Path>>(path: P, model: &PlsdaModel) -> Result<()> {
    write_json(path, model)
}

/// Load a block PLS-DA model saved by `save_plsda_model`.
pub fn load_plsda_model<P: AsRef<Path>>(path: P) -> Result<PlsdaModel> {
    read_json(path)
}

/// Write the cleaned clinical subset as CSV.
///
/// Header is `sample_id` followed by the selected columns; missing values
/// are written as `NA`.
pub fn write_clinical_csv<P: AsRef<Path>>(path: P, cleaned: &CleanedClinical) -> Result<()> {
    let mut writer = csv::Writer::from_writer(create(&path)?);

    let mut header = vec!["sample_id".to_string()];
    header.extend(cleaned.columns.iter().cloned());
    writer.write_record(&header)?;

    for (sample_id, row) in cleaned.sample_ids.iter().zip(&cleaned.rows) {
        let mut record = vec![sample_id.clone()];
        record.extend(row.iter().map(|v| v.to_field()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    debug!(path = %path.as_ref().display(), rows = cleaned.len(), "Wrote clinical CSV");
    Ok(())
}

/// Write factor scores as TSV: one row per sample, one column per factor.
pub fn write_factor_scores<P: AsRef<Path>>(path: P, model: &FactorModel) -> Result<()> {
    let mut writer = create(path)?;
    writeln!(writer, "sample_id\t{}", model.factor_names().join("\t"))?;
    for (i, sample_id) in model.sample_ids.iter().enumerate() {
        let values: Vec<String> = model.scores.row(i).iter().map(|v| format!("{:.6}", v)).collect();
        writeln!(writer, "{}\t{}", sample_id, values.join("\t"))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the selected features of every block and component as TSV.
pub fn write_selected_features<P: AsRef<Path>>(path: P, model: &PlsdaModel) -> Result<()> {
    let mut writer = create(path)?;
    writeln!(writer, "block\tcomponent\trank\tfeature_id\tloading")?;
    for block in &model.blocks {
        for comp in 0..model.ncomp {
            for (rank, f) in block.selected_features(comp).iter().enumerate() {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{:.6}",
                    block.name,
                    comp + 1,
                    rank + 1,
                    f.feature_id,
                    f.loading
                )?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
