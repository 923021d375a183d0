use crate::query::{Column, QueryCommand, SelectorName, Source};
use std::collections::{HashMap, HashSet};

/// Type name used when a column's type is not known.
pub const DEFAULT_TYPE: &str = "STRING";

/// A column in a table or view definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub property_type: String,
    pub full_text_searchable: bool,
}

impl SchemaColumn {
    pub fn new(name: &str, property_type: &str) -> Self {
        SchemaColumn {
            name: name.to_string(),
            property_type: property_type.to_string(),
            full_text_searchable: false,
        }
    }
}

/// Table or view metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Table {
    name: SelectorName,
    columns: Vec<SchemaColumn>,
    /// Columns left out of `SELECT *`.
    hidden: HashSet<String>,
    extra_columns: bool,
    definition: Option<QueryCommand>,
}

impl Table {
    /// Creates a new table with the given name and columns.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table.
    /// * `columns` - Columns of the table in declaration order.
    pub fn new(name: &str, columns: Vec<SchemaColumn>) -> Self {
        Table {
            name: SelectorName::new(name),
            columns,
            hidden: HashSet::new(),
            extra_columns: false,
            definition: None,
        }
    }

    pub fn name(&self) -> &SelectorName {
        &self.name
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns included when a query selects `*`, in declaration order.
    pub fn select_star_columns(&self) -> Vec<&SchemaColumn> {
        self.columns
            .iter()
            .filter(|c| !self.hidden.contains(&c.name))
            .collect()
    }

    /// True if rows may carry columns beyond the declared ones.
    pub fn has_extra_columns(&self) -> bool {
        self.extra_columns
    }

    pub fn has_full_text_searchable_columns(&self) -> bool {
        self.columns.iter().any(|c| c.full_text_searchable)
    }

    pub fn is_view(&self) -> bool {
        self.definition.is_some()
    }

    /// The query defining this view, if the table is a view.
    pub fn definition(&self) -> Option<&QueryCommand> {
        self.definition.as_ref()
    }
}

/// Lookup of tables and views by name.
pub trait Schemata {
    /// Gets the table or view with the given name.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the table or view.
    fn table(&self, name: &SelectorName) -> Option<&Table>;

    /// Checks if the column exists on the named table.
    fn is_valid_column(&self, table: &SelectorName, column: &str) -> bool {
        match self.table(table) {
            Some(table) => table.has_extra_columns() || table.column(column).is_some(),
            None => false,
        }
    }
}

/// Schemata that cannot change once built.
#[derive(Clone, Debug, Default)]
pub struct ImmutableSchemata {
    tables: HashMap<SelectorName, Table>,
}

impl ImmutableSchemata {
    pub fn builder() -> SchemataBuilder {
        SchemataBuilder::default()
    }

    pub fn table_names(&self) -> Vec<&SelectorName> {
        let mut names: Vec<&SelectorName> = self.tables.keys().collect();
        names.sort();
        names
    }
}

impl Schemata for ImmutableSchemata {
    fn table(&self, name: &SelectorName) -> Option<&Table> {
        self.tables.get(name)
    }
}

/// Builds an [`ImmutableSchemata`].
#[derive(Default)]
pub struct SchemataBuilder {
    tables: Vec<Table>,
    views: Vec<(SelectorName, QueryCommand)>,
}

impl SchemataBuilder {
    fn table_mut(&mut self, name: &str) -> &mut Table {
        if let Some(pos) = self.tables.iter().position(|t| t.name.name() == name) {
            return &mut self.tables[pos];
        }
        self.tables.push(Table::new(name, Vec::new()));
        let last = self.tables.len() - 1;
        &mut self.tables[last]
    }

    /// Adds a table whose columns all have the default type.
    pub fn add_table(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        let table = self.table_mut(name);
        for column in columns {
            table.columns.push(SchemaColumn::new(column, DEFAULT_TYPE));
        }
        self
    }

    /// Adds a typed column, creating the table if needed.
    pub fn add_column(&mut self, table: &str, column: &str, property_type: &str, searchable: bool) -> &mut Self {
        let table = self.table_mut(table);
        let mut col = SchemaColumn::new(column, property_type);
        col.full_text_searchable = searchable;
        table.columns.retain(|c| c.name != column);
        table.columns.push(col);
        self
    }

    pub fn make_searchable(&mut self, table: &str, column: &str) -> &mut Self {
        let table = self.table_mut(table);
        for col in table.columns.iter_mut().filter(|c| c.name == column) {
            col.full_text_searchable = true;
        }
        self
    }

    pub fn exclude_from_select_star(&mut self, table: &str, column: &str) -> &mut Self {
        self.table_mut(table).hidden.insert(column.to_string());
        self
    }

    /// Marks the table as allowing columns that were never declared.
    pub fn mark_extra_columns(&mut self, table: &str) -> &mut Self {
        self.table_mut(table).extra_columns = true;
        self
    }

    /// Adds a view; its columns are derived from the definition when the schemata is built.
    pub fn add_view(&mut self, name: &str, definition: QueryCommand) -> &mut Self {
        self.views.push((SelectorName::new(name), definition));
        self
    }

    pub fn build(self) -> ImmutableSchemata {
        let mut tables: HashMap<SelectorName, Table> = self
            .tables
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        for (name, definition) in self.views {
            let columns = view_columns(&tables, &definition);
            let mut view = Table::new(name.name(), columns);
            view.definition = Some(definition);
            tables.insert(name, view);
        }
        ImmutableSchemata { tables }
    }
}

fn bound_tables(source: &Source, bound: &mut Vec<(SelectorName, SelectorName)>) {
    match source {
        Source::Selector(selector) => {
            bound.push((selector.alias_or_name().clone(), selector.name.clone()))
        }
        Source::Join(join) => {
            bound_tables(&join.left, bound);
            bound_tables(&join.right, bound);
        }
    }
}

/// Derives the output columns of a view from its defining query.
fn view_columns(tables: &HashMap<SelectorName, Table>, definition: &QueryCommand) -> Vec<SchemaColumn> {
    let query = match definition {
        QueryCommand::Query(query) => query,
        QueryCommand::SetQuery(set) => return view_columns(tables, &set.left),
    };
    let mut bound = Vec::new();
    bound_tables(&query.source, &mut bound);
    let table_for = |selector: &SelectorName| {
        bound
            .iter()
            .find(|(alias, _)| alias == selector)
            .and_then(|(_, name)| tables.get(name))
    };
    let star = |table: Option<&Table>, out: &mut Vec<SchemaColumn>| {
        if let Some(table) = table {
            for col in table.select_star_columns() {
                out.push(col.clone());
            }
        }
    };
    let mut columns = Vec::new();
    if query.columns.is_empty() {
        for (alias, _) in &bound {
            star(table_for(alias), &mut columns);
        }
        return columns;
    }
    for Column {
        selector_name,
        property_name,
        column_name,
    } in &query.columns
    {
        let table = table_for(selector_name);
        if property_name == Column::WILDCARD {
            star(table, &mut columns);
            continue;
        }
        let mut col = table
            .and_then(|t| t.column(property_name))
            .cloned()
            .unwrap_or_else(|| SchemaColumn::new(property_name, DEFAULT_TYPE));
        col.name = column_name.clone();
        columns.push(col);
    }
    columns
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::query::{Query, Selector};

    #[test]
    fn test_tables() {
        let mut builder = ImmutableSchemata::builder();
        builder
            .add_table("t1", &["c1", "c2", "c3"])
            .exclude_from_select_star("t1", "c3")
            .make_searchable("t1", "c2")
            .add_table("t2", &["c1"])
            .mark_extra_columns("t2");
        let schemata = builder.build();
        let t1 = schemata.table(&SelectorName::new("t1")).unwrap();
        assert_eq!(3, t1.columns().len());
        assert_eq!(2, t1.select_star_columns().len());
        assert!(t1.has_full_text_searchable_columns());
        assert!(!t1.is_view());
        assert!(schemata.is_valid_column(&SelectorName::new("t1"), "c3"));
        assert!(!schemata.is_valid_column(&SelectorName::new("t1"), "c4"));
        assert!(schemata.is_valid_column(&SelectorName::new("t2"), "anything"));
        assert!(schemata.table(&SelectorName::new("t3")).is_none());
    }

    #[test]
    fn test_view_columns() {
        let mut builder = ImmutableSchemata::builder();
        builder
            .add_column("t1", "c1", "LONG", false)
            .add_column("t1", "c2", "STRING", false);
        let t = SelectorName::new("t");
        let definition = Query::select_star(Selector::aliased("t1", "t").into())
            .with_columns(vec![Column::aliased(&t, "c1", "id"), Column::new(&t, "c2")]);
        builder.add_view("v1", definition.into());
        let schemata = builder.build();
        let view = schemata.table(&SelectorName::new("v1")).unwrap();
        assert!(view.is_view());
        let names: Vec<&str> = view.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(vec!["id", "c2"], names);
        assert_eq!("LONG", view.column("id").unwrap().property_type);
    }
}
