use common::plan::PlanHints;
use common::schemata::{Schemata, DEFAULT_TYPE};
use common::{Problems, Value};
use std::collections::HashMap;

/// State shared by one planning pass: the schemata to resolve names against, the hints gathered
/// so far, the problems found, and the bind variables in use.
///
/// Shares lifetime 'a with the schemata.
pub struct QueryContext<'a, S: Schemata> {
    schemata: &'a S,
    hints: PlanHints,
    problems: Problems,
    variables: HashMap<String, Option<Value>>,
}

impl<'a, S: 'a + Schemata> QueryContext<'a, S> {
    /// Creates a new context with default hints.
    ///
    /// # Arguments
    ///
    /// * `schemata` - Tables and views available to the query.
    pub fn new(schemata: &'a S) -> Self {
        Self::with_hints(schemata, PlanHints::default())
    }

    pub fn with_hints(schemata: &'a S, hints: PlanHints) -> Self {
        QueryContext {
            schemata,
            hints,
            problems: Problems::new(),
            variables: HashMap::new(),
        }
    }

    pub fn schemata(&self) -> &'a S {
        self.schemata
    }

    pub fn hints(&self) -> &PlanHints {
        &self.hints
    }

    pub fn hints_mut(&mut self) -> &mut PlanHints {
        &mut self.hints
    }

    pub fn problems(&self) -> &Problems {
        &self.problems
    }

    pub fn problems_mut(&mut self) -> &mut Problems {
        &mut self.problems
    }

    pub fn variables(&self) -> &HashMap<String, Option<Value>> {
        &self.variables
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Binds a variable; `None` reserves the name without a value.
    pub fn set_variable(&mut self, name: &str, value: Option<Value>) {
        self.variables.insert(name.to_string(), value);
    }

    /// Type name given to columns whose type is unknown.
    pub fn default_type(&self) -> &'static str {
        DEFAULT_TYPE
    }
}
