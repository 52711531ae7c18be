use regex::Regex;
use std::path::{
    Path,
    PathBuf,
};
use tracing::{
    debug,
    info,
};

use super::{
    FilterContext,
    FilterOutcome,
    PsmFilter,
};
use crate::errors::{
    Result,
    RtFilterError,
};
use crate::io::expand_path;
use crate::models::{
    CanonicalColumn,
    PsmTable,
};

/// Flags PSMs whose protein string contains any of a list of accessions.
///
/// Matching is a substring search, so `P1234` also matches `P12345`.
#[derive(Debug, Clone)]
pub struct UniprotExclusionFilter {
    pub file: Option<PathBuf>,
    pub list: Vec<String>,
}

const UNIPROT_KEY: &str = "filters.uniprot_exclusion";

fn read_accessions(path: &Path) -> std::io::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect())
}

/// Alternation of the escaped accessions.
pub fn accession_pattern(accessions: &[String]) -> std::result::Result<Regex, regex::Error> {
    let pattern = accessions
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&pattern)
}

impl UniprotExclusionFilter {
    fn accessions(&self, ctx: &FilterContext) -> Result<Option<Vec<String>>> {
        if let Some(file) = self.file.as_ref() {
            let path = expand_path(file)?;
            info!("Loading UniProt exclusion list from {}", path.display());
            return match read_accessions(&path) {
                Ok(x) if !x.is_empty() => Ok(Some(x)),
                Ok(_) => ctx
                    .strict_or_skip(
                        &format!("{}.file", UNIPROT_KEY),
                        format!("UniProt exclusion list {} is empty.", path.display()),
                    )
                    .map(|_| None),
                Err(e) => ctx
                    .strict_or_skip(
                        &format!("{}.file", UNIPROT_KEY),
                        format!(
                            "Could not read UniProt exclusion list {}: {}.",
                            path.display(),
                            e
                        ),
                    )
                    .map(|_| None),
            };
        }

        let list: Vec<String> = self
            .list
            .iter()
            .map(|x| x.trim().to_string())
            .filter(|x| !x.is_empty())
            .collect();
        if !list.is_empty() {
            return Ok(Some(list));
        }
        if self.list.is_empty() {
            ctx.skip("No UniProt exclusion file or list provided.")?;
        } else {
            ctx.strict_or_skip(
                &format!("{}.list", UNIPROT_KEY),
                "UniProt exclusion list only contains blank entries.",
            )?;
        }
        Ok(None)
    }
}

impl PsmFilter for UniprotExclusionFilter {
    fn name(&self) -> &'static str {
        "uniprot_exclusion"
    }

    fn required_columns(&self) -> &'static [CanonicalColumn] {
        &[CanonicalColumn::Proteins]
    }

    fn apply(&self, table: &PsmTable, ctx: &FilterContext) -> Result<FilterOutcome> {
        let accessions = match self.accessions(ctx)? {
            Some(x) => x,
            None => return Ok(FilterOutcome::Skip),
        };
        debug!("Excluding {} UniProt accessions", accessions.len());
        let re = accession_pattern(&accessions)
            .map_err(|e| RtFilterError::regex(e, "filters.uniprot_exclusion"))?;

        let mask = table
            .psms
            .iter()
            .map(|p| p.proteins.as_deref().is_some_and(|x| re.is_match(x)))
            .collect();
        Ok(FilterOutcome::Mask(mask))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTarget {
    /// Tag searched in the `proteins` column.
    Contaminant,
    /// Tag searched in the `leading_protein` column.
    Decoy,
}

/// Substring match of a protein tag, e.g. `CON__` or `REV__`.
#[derive(Debug, Clone)]
pub struct TagFilter {
    pub tag: Option<String>,
    pub target: TagTarget,
}

impl PsmFilter for TagFilter {
    fn name(&self) -> &'static str {
        match self.target {
            TagTarget::Contaminant => "contaminant",
            TagTarget::Decoy => "decoy",
        }
    }

    fn required_columns(&self) -> &'static [CanonicalColumn] {
        match self.target {
            TagTarget::Contaminant => &[CanonicalColumn::Proteins],
            TagTarget::Decoy => &[CanonicalColumn::LeadingProtein],
        }
    }

    fn apply(&self, table: &PsmTable, ctx: &FilterContext) -> Result<FilterOutcome> {
        let tag = match self.tag.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => return ctx.skip(format!("No tag provided to the {} filter.", self.name())),
        };

        let mask = table
            .psms
            .iter()
            .map(|p| {
                let field = match self.target {
                    TagTarget::Contaminant => p.proteins.as_deref(),
                    TagTarget::Decoy => p.leading_protein.as_deref(),
                };
                field.is_some_and(|x| x.contains(tag))
            })
            .collect();
        Ok(FilterOutcome::Mask(mask))
    }
}
