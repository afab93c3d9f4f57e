use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use parking_lot::RwLock;

use crate::error::{SolverError, SolverResult};
use crate::game::Game;
use crate::solver::nimber::Nimber;

const NORMAL_HEADER: &str = "[Positions+Nimber]";
const MISERE_HEADER: &str = "[WinLoss_Misere:Losing_Position]";

struct Inner<G: Game> {
    data: HashMap<G::Compact, Nimber>,
    tracked: HashMap<G::Compact, Nimber>,
    track_new: bool,
}

/// Shared map from compact position to its known nimber. Insertions are
/// monotone: a stored value is never revised or removed except by an
/// explicit `clear`. The tracked overlay records entries inserted since the
/// last drain, for propagation between workers.
pub struct NimberDatabase<G: Game> {
    inner: RwLock<Inner<G>>,
}

impl<G: Game> NimberDatabase<G> {
    #[must_use]
    pub fn new(track_new: bool) -> Self {
        Self {
            inner: RwLock::new(Inner {
                data: HashMap::new(),
                tracked: HashMap::new(),
                track_new,
            }),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.data.clear();
        inner.tracked.clear();
    }

    pub fn clear_tracked(&self) {
        self.inner.write().tracked.clear();
    }

    pub fn set_track_new(&self, track_new: bool) {
        self.inner.write().track_new = track_new;
    }

    pub fn insert(&self, position: G::Compact, nimber: Nimber) {
        let mut inner = self.inner.write();
        if inner.track_new {
            inner.tracked.insert(position.clone(), nimber);
        }

        inner.data.insert(position, nimber);
    }

    #[must_use]
    pub fn get(&self, position: &G::Compact) -> Option<Nimber> {
        self.inner.read().data.get(position).copied()
    }

    /// Bulk-inserts nimbers, skipping positions that are already known.
    /// Returns the number of actual additions.
    pub fn add_nimbers(&self, nimbers: HashMap<G::Compact, Nimber>) -> usize {
        let mut inner = self.inner.write();
        let mut inserted = 0;
        for (position, nimber) in nimbers {
            if let std::collections::hash_map::Entry::Vacant(entry) =
                inner.data.entry(position)
            {
                entry.insert(nimber);
                inserted += 1;
            }
        }

        inserted
    }

    #[must_use]
    pub fn snapshot(&self) -> HashMap<G::Compact, Nimber> {
        self.inner.read().data.clone()
    }

    #[must_use]
    pub fn tracked(&self, clear: bool) -> HashMap<G::Compact, Nimber> {
        let mut inner = self.inner.write();
        if clear {
            std::mem::take(&mut inner.tracked)
        } else {
            inner.tracked.clone()
        }
    }

    /// Writes a snapshot of the database. Entries on disk are never mutated
    /// by the solver; `store` always rewrites the whole file.
    pub fn store(&self, path: &Path, sort: bool) -> SolverResult<()> {
        let file = File::create(path).map_err(|e| SolverError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let header = if G::NORMAL_IMPARTIAL {
            NORMAL_HEADER
        } else {
            MISERE_HEADER
        };
        writeln!(writer, "{header}").map_err(|e| SolverError::io(path, e))?;

        let inner = self.inner.read();
        let mut lines: Vec<String> = inner
            .data
            .iter()
            .map(|(position, nimber)| {
                if G::NORMAL_IMPARTIAL {
                    format!("{position} {nimber}")
                } else {
                    position.to_string()
                }
            })
            .collect();
        drop(inner);

        if sort {
            lines.sort();
        }

        for line in lines {
            writeln!(writer, "{line}").map_err(|e| SolverError::io(path, e))?;
        }

        writer.flush().map_err(|e| SolverError::io(path, e))
    }

    /// Loads nimbers from a file, inserting only previously-absent entries.
    /// Invalid lines are reported and skipped. Returns the number of new
    /// entries.
    pub fn load(&self, path: &Path) -> SolverResult<usize> {
        let file = File::open(path).map_err(|e| SolverError::io(path, e))?;
        let reader = BufReader::new(file);

        let mut inserted = 0;
        let mut inner = self.inner.write();
        for line in reader.lines() {
            let line = line.map_err(|e| SolverError::io(path, e))?;
            let line = line.trim_end();
            if line.is_empty() || line == NORMAL_HEADER || line == MISERE_HEADER {
                continue;
            }

            match Self::parse_line(line) {
                Ok((position, nimber)) => {
                    if let std::collections::hash_map::Entry::Vacant(entry) =
                        inner.data.entry(position)
                    {
                        entry.insert(nimber);
                        inserted += 1;
                    }
                }
                Err(err) => eprintln!("数据库行无效: {line} ({err})"),
            }
        }

        Ok(inserted)
    }

    fn parse_line(line: &str) -> SolverResult<(G::Compact, Nimber)> {
        let (position_str, nimber_str) = match line.split_once(' ') {
            Some((p, n)) => (p, n),
            None => (line, "0"),
        };

        let position = position_str.parse()?;
        let nimber = if G::NORMAL_IMPARTIAL {
            nimber_str.trim().parse()?
        } else {
            Nimber::LOSS
        };

        Ok((position, nimber))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::kayles::{Kayles, KaylesCompact};
    use std::fs;

    fn compact(s: &str) -> KaylesCompact {
        s.parse().unwrap()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("grundy_nimdb_{}_{name}.spr", std::process::id()));
        path
    }

    #[test]
    fn inserts_are_monotone_under_add_nimbers() {
        let db: NimberDatabase<Kayles> = NimberDatabase::new(false);
        db.insert(compact("4"), Nimber(1));

        let mut batch = HashMap::new();
        batch.insert(compact("4"), Nimber(7));
        batch.insert(compact("5"), Nimber(4));
        assert_eq!(db.add_nimbers(batch), 1);

        assert_eq!(db.get(&compact("4")), Some(Nimber(1)));
        assert_eq!(db.get(&compact("5")), Some(Nimber(4)));
    }

    #[test]
    fn tracked_overlay_records_new_inserts() {
        let db: NimberDatabase<Kayles> = NimberDatabase::new(true);
        db.insert(compact("3"), Nimber(3));
        db.insert(compact("2"), Nimber(2));

        let tracked = db.tracked(true);
        assert_eq!(tracked.len(), 2);
        assert!(db.tracked(false).is_empty());

        db.insert(compact("1"), Nimber(1));
        assert_eq!(db.tracked(false).len(), 1);
        assert_eq!(db.len(), 3);
    }

    #[test]
    fn store_and_load_round_trip() {
        let path = temp_path("roundtrip");
        let db: NimberDatabase<Kayles> = NimberDatabase::new(false);
        db.insert(compact("4"), Nimber(1));
        db.insert(compact("5+2"), Nimber(6));
        db.store(&path, true).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "[Positions+Nimber]");
        assert_eq!(&lines[1..], ["4 1", "5+2 6"]);

        let restored: NimberDatabase<Kayles> = NimberDatabase::new(false);
        assert_eq!(restored.load(&path).unwrap(), 2);
        assert_eq!(restored.get(&compact("5+2")), Some(Nimber(6)));

        // Loading again inserts nothing new.
        assert_eq!(restored.load(&path).unwrap(), 0);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn load_skips_blank_and_invalid_lines() {
        let path = temp_path("invalid");
        fs::write(&path, "[Positions+Nimber]\n\n4 1\nbogus line !\n3 2\n").unwrap();

        let db: NimberDatabase<Kayles> = NimberDatabase::new(false);
        assert_eq!(db.load(&path).unwrap(), 2);
        assert_eq!(db.get(&compact("3")), Some(Nimber(2)));

        let _ = fs::remove_file(&path);
    }
}
