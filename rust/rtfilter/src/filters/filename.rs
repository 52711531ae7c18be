use regex::Regex;
use tracing::info;

use super::{
    FilterContext,
    FilterOutcome,
    PsmFilter,
};
use crate::errors::Result;
use crate::models::PsmTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenameMode {
    /// Exclude experiments whose raw file matches.
    Exclude,
    /// Keep only experiments whose raw file matches.
    Include,
}

/// Regular-expression search over the distinct raw file names.
#[derive(Debug, Clone)]
pub struct FilenameFilter {
    pub expr: Option<String>,
    pub mode: FilenameMode,
}

impl FilenameFilter {
    fn config_key(&self) -> &'static str {
        match self.mode {
            FilenameMode::Exclude => "filters.exclude_filename.expr",
            FilenameMode::Include => "filters.include_filename.expr",
        }
    }
}

/// Whether the raw file of every experiment matches, indexed by exp_id.
fn matching_experiments(table: &PsmTable, re: &Regex) -> Vec<bool> {
    let mut out: Vec<Option<bool>> = vec![None; table.num_experiments()];
    for psm in table.psms.iter() {
        if out[psm.exp_id].is_none() {
            out[psm.exp_id] = Some(re.is_match(&psm.raw_file));
        }
    }
    out.into_iter().map(|x| x.unwrap_or(false)).collect()
}

impl PsmFilter for FilenameFilter {
    fn name(&self) -> &'static str {
        match self.mode {
            FilenameMode::Exclude => "exclude_filename",
            FilenameMode::Include => "include_filename",
        }
    }

    fn apply(&self, table: &PsmTable, ctx: &FilterContext) -> Result<FilterOutcome> {
        let expr = match self.expr.as_deref() {
            Some(e) if !e.is_empty() => e,
            _ => {
                return ctx.skip(format!(
                    "No expression provided to the {} filter.",
                    self.name()
                ));
            }
        };
        let re = match Regex::new(expr) {
            Ok(re) => re,
            Err(e) => {
                return ctx.strict_or_skip(
                    self.config_key(),
                    format!("Invalid raw file expression \"{}\": {}", expr, e),
                );
            }
        };

        let matches = matching_experiments(table, &re);
        let mask: Vec<bool> = table
            .psms
            .iter()
            .map(|p| match self.mode {
                FilenameMode::Exclude => matches[p.exp_id],
                FilenameMode::Include => !matches[p.exp_id],
            })
            .collect();

        let num_matching = matches.iter().filter(|&&x| x).count();
        match self.mode {
            FilenameMode::Exclude => info!(
                "Filtering out {} experiments matching \"{}\"",
                num_matching, expr
            ),
            FilenameMode::Include => info!(
                "Keeping {} experiments out of {} matching inclusion expression \"{}\"",
                num_matching,
                matches.len(),
                expr
            ),
        }
        Ok(FilterOutcome::Mask(mask))
    }
}
