//! Docking job requests and receptor identifiers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cabsdock_common::{CabsError, Result};
use url::Url;

/// Shortest ligand the server will dock.
pub const MIN_LIGAND_LENGTH: usize = 4;

/// A PDB code with an optional chain suffix, e.g. `1CRN` or `2AM9:A`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceptorId {
    code: String,
    chain: Option<String>,
}

impl ReceptorId {
    /// The structure code with any chain suffix stripped.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// File name used for the cached structure, `<code>.pdb`.
    pub fn pdb_file_name(&self) -> String {
        format!("{}.pdb", self.code)
    }
}

impl FromStr for ReceptorId {
    type Err = CabsError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (code, chain) = match s.split_once(':') {
            Some((code, chain)) => (code, Some(chain)),
            None => (s, None),
        };
        if code.is_empty() {
            return Err(CabsError::InvalidRequest(format!(
                "receptor identifier '{}' has no structure code",
                s
            )));
        }
        if matches!(chain, Some(c) if c.is_empty()) {
            return Err(CabsError::InvalidRequest(format!(
                "receptor identifier '{}' has an empty chain",
                s
            )));
        }
        Ok(Self {
            code: code.to_string(),
            chain: chain.map(str::to_string),
        })
    }
}

impl fmt::Display for ReceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.chain {
            Some(chain) => write!(f, "{}:{}", self.code, chain),
            None => f.write_str(&self.code),
        }
    }
}

/// Everything needed for one submission. Consumed by the submitter.
#[derive(Debug, Clone)]
pub struct DockingJobRequest {
    receptor: ReceptorId,
    structure_file: PathBuf,
    ligand_sequence: String,
    cycles: u32,
}

impl DockingJobRequest {
    /// Validates the ligand and cycle count up front so that a bad request
    /// never reaches the network.
    pub fn new(
        receptor: ReceptorId,
        structure_file: impl AsRef<Path>,
        ligand_sequence: impl Into<String>,
        cycles: u32,
    ) -> Result<Self> {
        let ligand_sequence = ligand_sequence.into().trim().to_string();
        validate_ligand(&ligand_sequence)?;
        if cycles == 0 {
            return Err(CabsError::InvalidRequest(
                "simulation cycle count must be positive".to_string(),
            ));
        }
        Ok(Self {
            receptor,
            structure_file: structure_file.as_ref().to_path_buf(),
            ligand_sequence,
            cycles,
        })
    }

    pub fn receptor(&self) -> &ReceptorId {
        &self.receptor
    }

    pub fn structure_file(&self) -> &Path {
        &self.structure_file
    }

    pub fn ligand_sequence(&self) -> &str {
        &self.ligand_sequence
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }
}

/// URL of a submitted job's status page. The server owns the job's state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(url: &str) -> Result<Self> {
        let url = url.trim();
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CabsError::InvalidRequest(format!("job URL {} is not http(s)", url)));
        }
        Ok(Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Url> for JobHandle {
    fn from(url: Url) -> Self {
        Self(url.into())
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ligands are counted in residues, one letter each.
pub fn validate_ligand(sequence: &str) -> Result<()> {
    let residues = sequence.chars().count();
    if residues < MIN_LIGAND_LENGTH {
        return Err(CabsError::InvalidRequest(format!(
            "Ligand must contain at least {} residues, got {} ('{}')",
            MIN_LIGAND_LENGTH, residues, sequence
        )));
    }
    Ok(())
}
