use crate::RepoError;
use std::fmt;

/// Collects non-fatal problems found while validating or planning a query.
#[derive(Clone, Debug, Default)]
pub struct Problems {
    errors: Vec<RepoError>,
    warnings: Vec<String>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a validation error.
    ///
    /// # Arguments
    ///
    /// * `message` - Description of the problem.
    pub fn add_error(&mut self, message: String) {
        debug!("validation problem: {}", message);
        self.errors.push(RepoError::ValidationError(message));
    }

    pub fn add_warning(&mut self, message: String) {
        debug!("validation warning: {}", message);
        self.warnings.push(message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn errors(&self) -> &[RepoError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }
}

impl fmt::Display for Problems {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "{}", error)?;
        }
        for warning in &self.warnings {
            writeln!(f, "Warning: {}", warning)?;
        }
        Ok(())
    }
}
