//! KDD Cup 99 column schema and header-less CSV reader.

use super::{AttributeValue, RawRecord};
use crate::error::{IdsError, Result};
use crate::features::Label;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

pub const LABEL_COLUMN: &str = "Class";

/// The 41 attribute columns, in file order. The label column follows them.
pub const KDD_COLUMNS: [(&str, ColumnKind); 41] = [
    ("Duration", ColumnKind::Numeric),
    ("protocol_type", ColumnKind::Categorical),
    ("Service", ColumnKind::Categorical),
    ("Flag", ColumnKind::Categorical),
    ("src_bytes", ColumnKind::Numeric),
    ("dst_bytes", ColumnKind::Numeric),
    ("Land", ColumnKind::Numeric),
    ("wrong_fragment", ColumnKind::Numeric),
    ("Urgent", ColumnKind::Numeric),
    ("Hot", ColumnKind::Numeric),
    ("num_failed_logins", ColumnKind::Numeric),
    ("logged_in", ColumnKind::Numeric),
    ("num_compromised", ColumnKind::Numeric),
    ("root_shell", ColumnKind::Numeric),
    ("su_attempted", ColumnKind::Numeric),
    ("num_root", ColumnKind::Numeric),
    ("num_file_creations", ColumnKind::Numeric),
    ("num_shells", ColumnKind::Numeric),
    ("num_access_files", ColumnKind::Numeric),
    ("num_outbound_cmds", ColumnKind::Numeric),
    ("is_host_login", ColumnKind::Numeric),
    ("is_guest_login", ColumnKind::Numeric),
    ("Count", ColumnKind::Numeric),
    ("srv_count", ColumnKind::Numeric),
    ("serror_rate", ColumnKind::Numeric),
    ("srv_serror_rate", ColumnKind::Numeric),
    ("rerror_rate", ColumnKind::Numeric),
    ("srv_rerror_rate", ColumnKind::Numeric),
    ("same_srv_rate", ColumnKind::Numeric),
    ("diff_srv_rate", ColumnKind::Numeric),
    ("srv_diff_host_rate", ColumnKind::Numeric),
    ("dst_host_count", ColumnKind::Numeric),
    ("dst_host_srv_count", ColumnKind::Numeric),
    ("dst_host_same_srv_rate", ColumnKind::Numeric),
    ("dst_host_diff_srv_rate", ColumnKind::Numeric),
    ("dst_host_same_src_port_rate", ColumnKind::Numeric),
    ("dst_host_srv_diff_host_rate", ColumnKind::Numeric),
    ("dst_host_serror_rate", ColumnKind::Numeric),
    ("dst_host_srv_serror_rate", ColumnKind::Numeric),
    ("dst_host_rerror_rate", ColumnKind::Numeric),
    ("dst_host_srv_rerror_rate", ColumnKind::Numeric),
];

/// Parse header-less KDD rows. Labels collapse to normal/attack before anything else sees them.
pub fn read_kdd<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for (idx, row) in rdr.records().enumerate() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);
        if row.len() == 1 && row.get(0).map_or(true, str::is_empty) {
            continue;
        }
        if row.len() != KDD_COLUMNS.len() + 1 {
            return Err(IdsError::Corpus {
                line,
                reason: format!(
                    "expected {} columns, found {}",
                    KDD_COLUMNS.len() + 1,
                    row.len()
                ),
            });
        }

        let label = Label::from_raw(&row[KDD_COLUMNS.len()]);
        let mut record = RawRecord::new(label);
        for (field, (name, kind)) in row.iter().zip(KDD_COLUMNS.iter()) {
            let value = match kind {
                ColumnKind::Categorical => AttributeValue::Categorical(field.to_string()),
                ColumnKind::Numeric => {
                    let v: f64 = field.parse().map_err(|_| IdsError::Corpus {
                        line,
                        reason: format!("column {name}: '{field}' is not numeric"),
                    })?;
                    AttributeValue::Numeric(v)
                }
            };
            record.attributes.insert((*name).to_string(), value);
        }
        records.push(record);
    }
    Ok(records)
}

pub fn load_kdd(path: &Path) -> Result<Vec<RawRecord>> {
    let file = std::fs::File::open(path)?;
    let records = read_kdd(std::io::BufReader::new(file))?;
    let attacks = records.iter().filter(|r| r.label == Label::Attack).count();
    info!(
        path = %path.display(),
        records = records.len(),
        attacks,
        "corpus loaded"
    );
    Ok(records)
}
