use serde::{Deserialize, Serialize};

use crate::error::SolverResult;
use crate::game::Game;
use crate::solver::couple::Couple;
use crate::solver::nimber::Nimber;
use crate::solver::node::ExpansionInfo;
use crate::solver::proof_numbers::{Pn, ProofNumbers};

/// A job shipped to a worker process: the compact couple to expand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobAssignment {
    pub couple: String,
}

impl JobAssignment {
    #[must_use]
    pub fn new<G: Game>(couple: &Couple<G>) -> Self {
        Self {
            couple: couple.to_compact().to_string(),
        }
    }

    pub fn to_couple<G: Game>(&self) -> SolverResult<Couple<G>> {
        Couple::parse(&self.couple)
    }
}

/// A finished expansion crossing the process boundary, serialized as the
/// tuple `(parent, proof, disproof, mergedNimber, [(child, (proof,
/// disproof))])`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedJob(
    pub String,
    pub Pn,
    pub Pn,
    pub Nimber,
    pub Vec<(String, (Pn, Pn))>,
);

impl CompletedJob {
    #[must_use]
    pub fn parent(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn proof_numbers(&self) -> ProofNumbers {
        ProofNumbers::new(self.1, self.2)
    }

    #[must_use]
    pub fn is_proved(&self) -> bool {
        self.proof_numbers().is_proved()
    }

    #[must_use]
    pub fn assignment(&self) -> JobAssignment {
        JobAssignment {
            couple: self.0.clone(),
        }
    }
}

impl From<&ExpansionInfo> for CompletedJob {
    fn from(info: &ExpansionInfo) -> Self {
        Self(
            info.parent.clone(),
            info.pn.proof,
            info.pn.disproof,
            info.merged_nimber,
            info.children
                .iter()
                .map(|(child, pn)| (child.clone(), (pn.proof, pn.disproof)))
                .collect(),
        )
    }
}

impl From<CompletedJob> for ExpansionInfo {
    fn from(job: CompletedJob) -> Self {
        Self {
            parent: job.0,
            pn: ProofNumbers::new(job.1, job.2),
            merged_nimber: job.3,
            children: job
                .4
                .into_iter()
                .map(|(child, (proof, disproof))| {
                    (child, ProofNumbers::new(proof, disproof))
                })
                .collect(),
        }
    }
}
