use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{SolverError, SolverResult};
use crate::game::Outcome;

const CSV_HEADER: &str =
    "timestamp,position,nimber,outcome,solving_time,tree_size,nimbers,iterations";

#[derive(Clone, Debug)]
pub struct SolveStats {
    pub position: String,
    pub nimber: u8,
    pub outcome: Outcome,
    pub solving_time_secs: f64,
    pub tree_size: usize,
    pub nimbers: usize,
    pub iterations: usize,
}

/// Appends one row per solve; the header is written when the file is
/// created.
pub fn append_csv(path: &Path, stats: &SolveStats) -> SolverResult<()> {
    let new_file = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SolverError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    if new_file {
        writeln!(writer, "{CSV_HEADER}").map_err(|e| SolverError::io(path, e))?;
    }

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    writeln!(
        writer,
        "{timestamp},{},{},{},{:.3},{},{},{}",
        stats.position,
        stats.nimber,
        stats.outcome.to_i8(),
        stats.solving_time_secs,
        stats.tree_size,
        stats.nimbers,
        stats.iterations,
    )
    .map_err(|e| SolverError::io(path, e))?;

    writer.flush().map_err(|e| SolverError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("grundy_stats_{}_{name}.csv", std::process::id()));
        path
    }

    #[test]
    fn header_is_written_once() {
        let path = temp_path("header");
        let _ = fs::remove_file(&path);

        let stats = SolveStats {
            position: "5+2".to_string(),
            nimber: 1,
            outcome: Outcome::Win,
            solving_time_secs: 0.25,
            tree_size: 42,
            nimbers: 7,
            iterations: 99,
        };
        append_csv(&path, &stats).unwrap();
        append_csv(&path, &stats).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].ends_with(",5+2,1,1,0.250,42,7,99"));

        let _ = fs::remove_file(&path);
    }
}
