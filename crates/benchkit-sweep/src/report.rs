//! CSV output for sweep results.

use crate::knee::KneePoint;
use crate::spike::ThdPoint;
use crate::{Result, SweepError};
use std::io::Write;
use std::path::Path;

fn create_with_parents(path: &Path) -> Result<std::fs::File> {
    let csv_err = |source| SweepError::Csv {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(csv_err)?;
    }
    std::fs::File::create(path).map_err(csv_err)
}

/// Write THD sweep rows as `freq_hz,vrms,pkpk,thd_percent`.
pub fn write_thd_csv(path: &Path, rows: &[ThdPoint]) -> Result<()> {
    let mut file = create_with_parents(path)?;
    let csv_err = |source| SweepError::Csv {
        path: path.to_path_buf(),
        source,
    };
    writeln!(file, "freq_hz,vrms,pkpk,thd_percent").map_err(csv_err)?;
    for row in rows {
        writeln!(
            file,
            "{},{},{},{}",
            row.freq_hz, row.vrms, row.vpp, row.thd_percent
        )
        .map_err(csv_err)?;
    }
    Ok(())
}

/// Write knee sweep rows as `freq_hz,vrms,pkpk,rel_db`.
pub fn write_knee_csv(path: &Path, rows: &[KneePoint]) -> Result<()> {
    let mut file = create_with_parents(path)?;
    let csv_err = |source| SweepError::Csv {
        path: path.to_path_buf(),
        source,
    };
    writeln!(file, "freq_hz,vrms,pkpk,rel_db").map_err(csv_err)?;
    for row in rows {
        writeln!(
            file,
            "{},{},{},{}",
            row.freq_hz, row.vrms, row.vpp, row.rel_db
        )
        .map_err(csv_err)?;
    }
    Ok(())
}
