//! Append-only result logs

use std::path::Path;

use anyhow::{Context, Result};
use ecotox_query::{PlannedQuery, QueryCondition, QueryResult};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// The detail log and result matrix of one batch run
///
/// Both files are opened for append and created when missing. Each
/// [`record`](Self::record) call flushes before returning, so an aborted run
/// leaves every completed query on disk.
pub struct ResultLogs {
    detail: File,
    matrix: File,
}

impl ResultLogs {
    pub async fn open(detail_path: &Path, matrix_path: &Path) -> Result<Self> {
        Ok(Self {
            detail: open_append(detail_path).await?,
            matrix: open_append(matrix_path).await?,
        })
    }

    pub async fn record(&mut self, planned: &PlannedQuery, result: &QueryResult) -> Result<()> {
        let line = detail_line(&planned.condition, result);
        self.detail
            .write_all(line.as_bytes())
            .await
            .context("Failed to write detail log")?;
        self.detail.flush().await.context("Failed to flush detail log")?;

        let cell = matrix_cell(planned, result);
        self.matrix
            .write_all(cell.as_bytes())
            .await
            .context("Failed to write result matrix")?;
        self.matrix
            .flush()
            .await
            .context("Failed to flush result matrix")?;

        debug!(summary = %result.summary, "query logged");
        Ok(())
    }
}

async fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))
}

/// `species\tchemical\tendpoint\tN_Day(s)\tsummary\t[values]\n`
pub fn detail_line(condition: &QueryCondition, result: &QueryResult) -> String {
    format!(
        "{}\t{}\t{}\n",
        condition.log_prefix(),
        result.summary,
        float_list_repr(&result.accepted_values)
    )
}

/// Summary cell; the species name and a newline close each species row
pub fn matrix_cell(planned: &PlannedQuery, result: &QueryResult) -> String {
    let mut cell = format!("{}\t", result.summary);
    if planned.closes_species_row {
        cell.push_str(planned.condition.species());
        cell.push('\n');
    }
    cell
}

/// `[1.2, 3.0]` style list rendering
pub fn float_list_repr(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|v| float_repr(*v)).collect();
    format!("[{}]", items.join(", "))
}

/// Shortest round-trip rendering with a signed, two-digit exponent (`1e-05`, `1.5e+16`)
pub fn float_repr(value: f64) -> String {
    let debug = format!("{:?}", value);
    let Some((mantissa, exponent)) = debug.split_once('e') else {
        return debug;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{}e{}{:0>2}", mantissa, sign, digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned(closes_species_row: bool) -> PlannedQuery {
        PlannedQuery {
            condition: QueryCondition::new("DDT", "Lepomis", "LC50", 4),
            closes_species_row,
        }
    }

    #[test]
    fn floats_render_like_list_reprs() {
        assert_eq!(float_repr(1.2), "1.2");
        assert_eq!(float_repr(3.0), "3.0");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(0.00001), "1e-05");
        assert_eq!(float_repr(2.5e-7), "2.5e-07");
        assert_eq!(float_repr(1.5e16), "1.5e+16");
        assert_eq!(float_repr(1e300), "1e+300");
        assert_eq!(float_list_repr(&[]), "[]");
        assert_eq!(float_list_repr(&[1.2, 3.0]), "[1.2, 3.0]");
    }

    #[test]
    fn detail_line_is_tab_separated() {
        let result = QueryResult::new(vec![1.2, 3.0], "1.89737".to_string());
        assert_eq!(
            detail_line(&planned(false).condition, &result),
            "Lepomis\tDDT\tLC50\t4_Day(s)\t1.89737\t[1.2, 3.0]\n"
        );
        assert_eq!(
            detail_line(&planned(false).condition, &QueryResult::empty()),
            "Lepomis\tDDT\tLC50\t4_Day(s)\t0.00000\t[]\n"
        );
    }

    #[test]
    fn matrix_row_closes_with_species() {
        let result = QueryResult::new(vec![1.2], "1.20000".to_string());
        assert_eq!(matrix_cell(&planned(false), &result), "1.20000\t");
        assert_eq!(matrix_cell(&planned(true), &result), "1.20000\tLepomis\n");
    }

    #[tokio::test]
    async fn records_append_to_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let detail = dir.path().join("log_file.txt");
        let matrix = dir.path().join("result_file.txt");
        std::fs::write(&detail, "earlier run\n").unwrap();

        let mut logs = ResultLogs::open(&detail, &matrix).await.unwrap();
        logs.record(&planned(true), &QueryResult::empty())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&detail).unwrap(),
            "earlier run\nLepomis\tDDT\tLC50\t4_Day(s)\t0.00000\t[]\n"
        );
        assert_eq!(
            std::fs::read_to_string(&matrix).unwrap(),
            "0.00000\tLepomis\n"
        );
    }
}
