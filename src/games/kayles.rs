use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::SolverError;
use crate::game::{Game, Outcome};

type Rows = SmallVec<[u16; 8]>;

/// Kayles: rows of pins, a move knocks down one pin or two adjacent pins and
/// may split a row in two. Independent rows are the subgames; the player
/// unable to move loses. The bundled reference adapter of the engine.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Kayles {
    rows: Rows,
}

/// Canonical form: row lengths sorted descending, zero-length rows dropped.
/// Encodes as `"a+b+c"`, with `"0"` for the empty position.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct KaylesCompact {
    rows: Rows,
}

fn canonicalize(mut rows: Rows) -> Rows {
    rows.retain(|&mut row| row > 0);
    rows.sort_unstable_by(|a, b| b.cmp(a));
    rows
}

fn write_rows(rows: &Rows, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if rows.is_empty() {
        return write!(f, "0");
    }

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            write!(f, "+")?;
        }
        write!(f, "{row}")?;
    }

    Ok(())
}

fn parse_rows(s: &str) -> Result<Rows, SolverError> {
    if s.is_empty() {
        return Err(SolverError::InvalidInput(s.to_string()));
    }

    let mut rows = Rows::new();
    for part in s.split('+') {
        let row: u16 = part
            .trim()
            .parse()
            .map_err(|_| SolverError::InvalidInput(s.to_string()))?;
        rows.push(row);
    }

    Ok(canonicalize(rows))
}

impl Kayles {
    #[must_use]
    pub fn new(rows: impl IntoIterator<Item = u16>) -> Self {
        Self {
            rows: canonicalize(rows.into_iter().collect()),
        }
    }

    #[must_use]
    pub fn single_row(pins: u16) -> Self {
        Self::new([pins])
    }

    /// Successors of one row: knock down one pin or two adjacent pins, each
    /// choice splitting the row into two (possibly empty) parts.
    fn row_moves(row: u16) -> impl Iterator<Item = (u16, u16)> {
        let take_one = (0..=(row - 1) / 2).map(move |left| (left, row - 1 - left));
        let take_two = (row >= 2)
            .then(|| (0..=(row - 2) / 2).map(move |left| (left, row - 2 - left)))
            .into_iter()
            .flatten();
        take_one.chain(take_two)
    }
}

impl fmt::Display for Kayles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_rows(&self.rows, f)
    }
}

impl FromStr for Kayles {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            rows: parse_rows(s)?,
        })
    }
}

impl fmt::Display for KaylesCompact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_rows(&self.rows, f)
    }
}

impl FromStr for KaylesCompact {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            rows: parse_rows(s)?,
        })
    }
}

impl Game for Kayles {
    type Compact = KaylesCompact;

    const NORMAL_IMPARTIAL: bool = true;

    fn from_compact(compact: &Self::Compact) -> Self {
        Self {
            rows: compact.rows.clone(),
        }
    }

    fn to_compact(&self) -> Self::Compact {
        KaylesCompact {
            rows: self.rows.clone(),
        }
    }

    fn from_subgames(subgames: Vec<Self>) -> Self {
        let mut rows = Rows::new();
        for subgame in subgames {
            rows.extend(subgame.rows);
        }

        Self {
            rows: canonicalize(rows),
        }
    }

    fn compute_children(&self) -> Vec<Self> {
        let mut seen: HashSet<Self> = HashSet::new();
        for (idx, &row) in self.rows.iter().enumerate() {
            for (left, right) in Self::row_moves(row) {
                let mut rows: Rows = self
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| i != idx)
                    .map(|(_, &r)| r)
                    .collect();
                rows.push(left);
                rows.push(right);
                seen.insert(Self {
                    rows: canonicalize(rows),
                });
            }
        }

        let mut children: Vec<Self> = seen.into_iter().collect();
        children.sort_by(|a, b| a.rows.cmp(&b.rows));
        children
    }

    fn subgames(&self) -> Vec<Self> {
        self.rows.iter().map(|&row| Self::single_row(row)).collect()
    }

    fn subgame_count(&self) -> usize {
        self.rows.len()
    }

    fn is_terminal(&self) -> bool {
        self.rows.is_empty()
    }

    fn outcome(&self) -> Outcome {
        if self.is_terminal() {
            Outcome::Loss
        } else {
            Outcome::Unknown
        }
    }

    fn lives(&self) -> u32 {
        self.rows.iter().map(|&row| u32::from(row)).sum()
    }

    fn estimate_children(&self) -> usize {
        self.rows.iter().map(|&row| usize::from(row)).sum()
    }

    fn estimate_proof_depth(&self) -> usize {
        // Every move removes one or two pins, so at least half the pins many
        // moves remain.
        (self.lives() as usize + 1) / 2
    }

    fn estimate_disproof_depth(&self) -> usize {
        self.estimate_proof_depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(s: &str) -> Kayles {
        s.parse().unwrap()
    }

    #[test]
    fn encoding_round_trips_through_the_compact_form() {
        for s in ["0", "1", "7", "5+3", "9+4+1"] {
            let parsed = position(s);
            let compact = parsed.to_compact();
            assert_eq!(compact.to_string(), s);
            assert_eq!(Kayles::from_compact(&compact), parsed);
            assert_eq!(
                compact.to_string().parse::<KaylesCompact>().unwrap(),
                compact
            );
        }
    }

    #[test]
    fn parsing_canonicalizes_order_and_zeros() {
        assert_eq!(position("3+5"), position("5+3"));
        assert_eq!(position("3+0+5").to_string(), "5+3");
        assert!("".parse::<Kayles>().is_err());
        assert!("2+x".parse::<Kayles>().is_err());
    }

    #[test]
    fn children_of_a_short_row() {
        let children: Vec<String> = position("3")
            .compute_children()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(children, ["1", "1+1", "2"]);
    }

    #[test]
    fn moves_split_rows_into_independent_subgames() {
        let children = position("5").compute_children();
        assert!(children.contains(&position("2+2")));
        assert!(children.contains(&position("1+3")));
        assert!(children.iter().any(|child| child.subgame_count() == 2));
    }

    #[test]
    fn multi_row_moves_touch_one_row_at_a_time() {
        let children = position("2+2").compute_children();
        assert!(children.contains(&position("2+1")));
        assert!(children.contains(&position("2")));
        assert!(!children.contains(&position("1+1")));
    }

    #[test]
    fn terminal_and_lives() {
        assert!(position("0").is_terminal());
        assert_eq!(position("0").outcome(), Outcome::Loss);
        assert!(!position("1").is_terminal());
        assert_eq!(position("4+2").lives(), 6);
        assert_eq!(position("4+2").estimate_proof_depth(), 3);
        assert!(position("4+2").is_multi_land());
    }
}
