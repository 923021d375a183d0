use std::fmt;

/// Characteristics of a plan gathered while it is built, for use by the optimizer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanHints {
    /// The query has criteria.
    pub has_criteria: bool,
    /// The query references at least one view.
    pub has_view: bool,
    pub has_join: bool,
    pub has_sort: bool,
    /// The query is a set query (union, intersect, or except).
    pub has_set_queries: bool,
    pub has_limit: bool,
    /// The query contains a left outer join.
    pub has_optional_join: bool,
    pub has_full_text_search: bool,
    pub has_subqueries: bool,
    /// The query only needs to know whether any row exists.
    pub is_existence_query: bool,
    pub show_plan: bool,
    /// Stop after planning.
    pub plan_only: bool,
    /// Skip the check that projected columns exist on their tables.
    pub allow_unknown_columns: bool,
}

impl PlanHints {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for PlanHints {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flags = [
            ("hasCriteria", self.has_criteria),
            ("hasView", self.has_view),
            ("hasJoin", self.has_join),
            ("hasSort", self.has_sort),
            ("hasSetQueries", self.has_set_queries),
            ("hasLimit", self.has_limit),
            ("hasOptionalJoin", self.has_optional_join),
            ("hasFullTextSearch", self.has_full_text_search),
            ("hasSubqueries", self.has_subqueries),
            ("isExistenceQuery", self.is_existence_query),
            ("showPlan", self.show_plan),
            ("planOnly", self.plan_only),
            ("allowUnknownColumns", self.allow_unknown_columns),
        ];
        let set: Vec<&str> = flags.iter().filter(|(_, v)| *v).map(|(k, _)| *k).collect();
        write!(f, "PlanHints {{{}}}", set.join(", "))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_false() {
        let hints = PlanHints::new();
        assert_eq!("PlanHints {}", hints.to_string());
        let mut copy = hints.clone();
        copy.has_join = true;
        copy.has_sort = true;
        assert_eq!("PlanHints {hasJoin, hasSort}", copy.to_string());
        assert!(!hints.has_join);
    }
}
