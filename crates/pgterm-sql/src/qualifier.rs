//! Schema qualification of table references.
//!
//! Statements are parsed, every relation in a `FROM`/`JOIN`/target position
//! that names no schema gets the active schema prepended, and the statement is
//! serialized again. Subqueries are followed wherever an expression can hold
//! one: projections, assignments, join conditions, `VALUES` rows, function
//! arguments, `ORDER BY`, `RETURNING` and `ON CONFLICT`. Names that already carry a schema are never touched, so
//! qualifying twice is a no-op. When nothing changes the input text is
//! returned byte for byte.
//!
//! Not qualified:
//! - references to CTEs defined by an enclosing `WITH`
//! - table functions such as `generate_series(1, 10)`
//! - unqualified `pg_catalog` relations such as `pg_class` or `pg_tables`
//! - the name of a `CREATE TEMPORARY TABLE`, which Postgres places in `pg_temp`

use sqlparser::ast::{
    AlterTableOperation, Assignment, ColumnOption, Cte, Distinct, Expr, FromTable, Function,
    FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Ident, Interval, JoinConstraint,
    JoinOperator, ObjectName, OnConflict, OnConflictAction, OnInsert, OrderByExpr, Query, Select,
    SelectItem, SetExpr, Statement, Subscript, TableConstraint, TableFactor, TableWithJoins,
    WindowType,
};

use crate::error::SqlError;
use crate::parser::{SqlAnalyzer, TableReference, is_system_catalog_table};

/// Rewrites unqualified table references into the active schema.
#[derive(Clone, Default)]
pub struct SchemaQualifier {
    analyzer: SqlAnalyzer,
}

impl SchemaQualifier {
    pub fn new() -> Self {
        Self {
            analyzer: SqlAnalyzer::new(),
        }
    }

    /// Qualify every unqualified table reference in `sql` with `schema`.
    pub fn qualify(&self, sql: &str, schema: &str) -> Result<Qualification, SqlError> {
        let mut statements = self.analyzer.parse(sql)?;

        let mut rewriter = Rewriter::new(schema);
        for stmt in &mut statements {
            let operation = self.analyzer.get_operation(stmt);
            if !operation.is_qualified() {
                tracing::trace!(?operation, "Statement kind is not qualified");
                continue;
            }
            rewriter.visit_statement(stmt);
        }

        if rewriter.qualified.is_empty() {
            return Ok(Qualification {
                original_sql: sql.to_string(),
                rewritten_sql: sql.to_string(),
                tables_qualified: vec![],
            });
        }

        let rewritten_sql = format!(
            "{};",
            statements
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        );

        self.check_rewrite(&rewritten_sql)?;

        tracing::debug!(
            schema,
            tables = ?rewriter.qualified,
            rewritten = %rewritten_sql,
            "Qualified table references"
        );

        Ok(Qualification {
            original_sql: sql.to_string(),
            rewritten_sql,
            tables_qualified: rewriter.qualified,
        })
    }

    /// The serializer can emit text the grammar does not accept back.
    fn check_rewrite(&self, rewritten_sql: &str) -> Result<(), SqlError> {
        match self.analyzer.parse(rewritten_sql) {
            Ok(_) => Ok(()),
            Err(SqlError::InvalidSql(reason)) => Err(SqlError::RewriteFailure(reason)),
            Err(other) => Err(SqlError::RewriteFailure(other.to_string())),
        }
    }
}

/// Result of schema qualification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qualification {
    /// The statement as entered.
    pub original_sql: String,
    /// The statement to execute.
    pub rewritten_sql: String,
    /// References that received the active schema, as they were written.
    pub tables_qualified: Vec<TableReference>,
}

impl Qualification {
    pub fn changed(&self) -> bool {
        !self.tables_qualified.is_empty()
    }
}

struct Rewriter {
    schema: Ident,
    /// CTE names visible at the current point of the walk.
    ctes: Vec<String>,
    qualified: Vec<TableReference>,
}

impl Rewriter {
    fn new(schema: &str) -> Self {
        Self {
            schema: schema_ident(schema),
            ctes: Vec::new(),
            qualified: Vec::new(),
        }
    }

    fn visit_statement(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Query(query) => self.visit_query(query),
            Statement::Insert(insert) => {
                self.qualify_name(&mut insert.table_name);
                if let Some(source) = &mut insert.source {
                    self.visit_query(source);
                }
                match &mut insert.on {
                    Some(OnInsert::OnConflict(OnConflict {
                        action: OnConflictAction::DoUpdate(update),
                        ..
                    })) => {
                        self.visit_assignments(&mut update.assignments);
                        if let Some(selection) = &mut update.selection {
                            self.visit_expr(selection);
                        }
                    }
                    Some(OnInsert::DuplicateKeyUpdate(assignments)) => {
                        self.visit_assignments(assignments)
                    }
                    _ => {}
                }
                if let Some(returning) = &mut insert.returning {
                    self.visit_select_items(returning);
                }
            }
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                returning,
                ..
            } => {
                self.visit_table_with_joins(table);
                self.visit_assignments(assignments);
                if let Some(from) = from {
                    self.visit_table_with_joins(from);
                }
                if let Some(selection) = selection {
                    self.visit_expr(selection);
                }
                if let Some(returning) = returning {
                    self.visit_select_items(returning);
                }
            }
            Statement::Delete(delete) => {
                let from = match &mut delete.from {
                    FromTable::WithFromKeyword(tables) => tables,
                    FromTable::WithoutKeyword(tables) => tables,
                };
                for table in from {
                    self.visit_table_with_joins(table);
                }
                if let Some(using) = &mut delete.using {
                    for table in using {
                        self.visit_table_with_joins(table);
                    }
                }
                if let Some(selection) = &mut delete.selection {
                    self.visit_expr(selection);
                }
                if let Some(returning) = &mut delete.returning {
                    self.visit_select_items(returning);
                }
                self.visit_order_by_exprs(&mut delete.order_by);
                if let Some(limit) = &mut delete.limit {
                    self.visit_expr(limit);
                }
            }
            Statement::CreateTable(create) => {
                if !create.temporary {
                    self.qualify_name(&mut create.name);
                }
                for column in &mut create.columns {
                    for option in &mut column.options {
                        match &mut option.option {
                            ColumnOption::ForeignKey { foreign_table, .. } => {
                                self.qualify_name(foreign_table)
                            }
                            ColumnOption::Default(expr) | ColumnOption::Check(expr) => {
                                self.visit_expr(expr)
                            }
                            _ => {}
                        }
                    }
                }
                for constraint in &mut create.constraints {
                    self.visit_constraint(constraint);
                }
                if let Some(like) = &mut create.like {
                    self.qualify_name(like);
                }
                if let Some(query) = &mut create.query {
                    self.visit_query(query);
                }
            }
            Statement::AlterTable {
                name, operations, ..
            } => {
                self.qualify_name(name);
                for operation in operations {
                    if let AlterTableOperation::AddConstraint(constraint) = operation {
                        self.visit_constraint(constraint);
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_constraint(&mut self, constraint: &mut TableConstraint) {
        match constraint {
            TableConstraint::ForeignKey { foreign_table, .. } => self.qualify_name(foreign_table),
            TableConstraint::Check { expr, .. } => self.visit_expr(expr),
            _ => {}
        }
    }

    fn visit_query(&mut self, query: &mut Query) {
        let scope = self.ctes.len();
        if let Some(with) = &mut query.with {
            // Every CTE name is in scope for the bodies of a recursive WITH
            // and for the main query either way.
            if with.recursive {
                self.ctes.extend(with.cte_tables.iter().map(cte_name));
            }
            for cte in &mut with.cte_tables {
                self.visit_query(&mut cte.query);
                if !with.recursive {
                    self.ctes.push(cte_name(cte));
                }
            }
        }
        self.visit_set_expr(&mut query.body);
        if let Some(order_by) = &mut query.order_by {
            self.visit_order_by_exprs(&mut order_by.exprs);
        }
        if let Some(limit) = &mut query.limit {
            self.visit_expr(limit);
        }
        if let Some(offset) = &mut query.offset {
            self.visit_expr(&mut offset.value);
        }
        self.ctes.truncate(scope);
    }

    fn visit_set_expr(&mut self, body: &mut SetExpr) {
        match body {
            SetExpr::Select(select) => self.visit_select(select),
            SetExpr::Query(query) => self.visit_query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.visit_set_expr(left);
                self.visit_set_expr(right);
            }
            SetExpr::Values(values) => {
                for row in &mut values.rows {
                    self.visit_exprs(row);
                }
            }
            SetExpr::Insert(stmt) | SetExpr::Update(stmt) => self.visit_statement(stmt),
            // `TABLE orders`
            SetExpr::Table(table) => {
                if table.schema_name.is_none()
                    && let Some(name) = table.table_name.clone()
                    && !self.is_reserved(&Ident::new(name.as_str()))
                {
                    table.schema_name = Some(self.schema.to_string());
                    self.qualified.push(TableReference { schema: None, name });
                }
            }
        }
    }

    fn visit_select(&mut self, select: &mut Select) {
        if let Some(Distinct::On(exprs)) = &mut select.distinct {
            self.visit_exprs(exprs);
        }
        self.visit_select_items(&mut select.projection);
        for table_with_joins in &mut select.from {
            self.visit_table_with_joins(table_with_joins);
        }
        if let Some(selection) = &mut select.selection {
            self.visit_expr(selection);
        }
        if let GroupByExpr::Expressions(exprs, _) = &mut select.group_by {
            self.visit_exprs(exprs);
        }
        if let Some(having) = &mut select.having {
            self.visit_expr(having);
        }
        if let Some(qualify) = &mut select.qualify {
            self.visit_expr(qualify);
        }
    }

    fn visit_select_items(&mut self, items: &mut [SelectItem]) {
        for item in items {
            match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    self.visit_expr(expr)
                }
                _ => {}
            }
        }
    }

    fn visit_assignments(&mut self, assignments: &mut [Assignment]) {
        for assignment in assignments {
            self.visit_expr(&mut assignment.value);
        }
    }

    fn visit_order_by_exprs(&mut self, exprs: &mut [OrderByExpr]) {
        for order_by in exprs {
            self.visit_expr(&mut order_by.expr);
        }
    }

    fn visit_table_with_joins(&mut self, twj: &mut TableWithJoins) {
        self.visit_table_factor(&mut twj.relation);
        for join in &mut twj.joins {
            self.visit_table_factor(&mut join.relation);
            self.visit_join_operator(&mut join.join_operator);
        }
    }

    fn visit_join_operator(&mut self, operator: &mut JoinOperator) {
        let constraint = match operator {
            JoinOperator::Inner(c)
            | JoinOperator::LeftOuter(c)
            | JoinOperator::RightOuter(c)
            | JoinOperator::FullOuter(c)
            | JoinOperator::Semi(c)
            | JoinOperator::LeftSemi(c)
            | JoinOperator::RightSemi(c)
            | JoinOperator::Anti(c)
            | JoinOperator::LeftAnti(c)
            | JoinOperator::RightAnti(c) => c,
            JoinOperator::AsOf {
                match_condition,
                constraint,
            } => {
                self.visit_expr(match_condition);
                constraint
            }
            JoinOperator::CrossJoin | JoinOperator::CrossApply | JoinOperator::OuterApply => {
                return;
            }
        };
        if let JoinConstraint::On(expr) = constraint {
            self.visit_expr(expr);
        }
    }

    fn visit_table_factor(&mut self, factor: &mut TableFactor) {
        match factor {
            TableFactor::Table { name, args, .. } => match args {
                // A table function names a function, not a relation.
                Some(args) => self.visit_function_args(&mut args.args),
                None => self.qualify_name(name),
            },
            TableFactor::Derived { subquery, .. } => self.visit_query(subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.visit_table_with_joins(table_with_joins),
            TableFactor::TableFunction { expr, .. } => self.visit_expr(expr),
            TableFactor::Function { args, .. } => self.visit_function_args(args),
            TableFactor::UNNEST { array_exprs, .. } => self.visit_exprs(array_exprs),
            _ => {}
        }
    }

    fn visit_exprs(&mut self, exprs: &mut [Expr]) {
        for expr in exprs {
            self.visit_expr(expr);
        }
    }

    /// Descend into every child expression that can hold a subquery.
    fn visit_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Subquery(query) | Expr::Exists { subquery: query, .. } => {
                self.visit_query(query)
            }
            Expr::InSubquery { expr, subquery, .. } => {
                self.visit_expr(expr);
                self.visit_query(subquery);
            }
            Expr::BinaryOp { left, right, .. }
            | Expr::AnyOp { left, right, .. }
            | Expr::AllOp { left, right, .. }
            | Expr::IsDistinctFrom(left, right)
            | Expr::IsNotDistinctFrom(left, right)
            | Expr::AtTimeZone {
                timestamp: left,
                time_zone: right,
            }
            | Expr::Position {
                expr: left,
                r#in: right,
            }
            | Expr::InUnnest {
                expr: left,
                array_expr: right,
                ..
            } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::Like { expr, pattern, .. }
            | Expr::ILike { expr, pattern, .. }
            | Expr::SimilarTo { expr, pattern, .. }
            | Expr::RLike { expr, pattern, .. } => {
                self.visit_expr(expr);
                self.visit_expr(pattern);
            }
            Expr::UnaryOp { expr, .. }
            | Expr::Nested(expr)
            | Expr::IsNull(expr)
            | Expr::IsNotNull(expr)
            | Expr::IsTrue(expr)
            | Expr::IsNotTrue(expr)
            | Expr::IsFalse(expr)
            | Expr::IsNotFalse(expr)
            | Expr::IsUnknown(expr)
            | Expr::IsNotUnknown(expr)
            | Expr::Cast { expr, .. }
            | Expr::Convert { expr, .. }
            | Expr::Collate { expr, .. }
            | Expr::Extract { expr, .. }
            | Expr::Ceil { expr, .. }
            | Expr::Floor { expr, .. }
            | Expr::CompositeAccess { expr, .. }
            | Expr::Named { expr, .. }
            | Expr::JsonAccess { value: expr, .. }
            | Expr::Interval(Interval { value: expr, .. })
            | Expr::OuterJoin(expr)
            | Expr::Prior(expr) => self.visit_expr(expr),
            Expr::InList { expr, list, .. } => {
                self.visit_expr(expr);
                self.visit_exprs(list);
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.visit_expr(expr);
                self.visit_expr(low);
                self.visit_expr(high);
            }
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                if let Some(operand) = operand {
                    self.visit_expr(operand);
                }
                self.visit_exprs(conditions);
                self.visit_exprs(results);
                if let Some(else_result) = else_result {
                    self.visit_expr(else_result);
                }
            }
            Expr::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                self.visit_expr(expr);
                for part in [substring_from, substring_for].into_iter().flatten() {
                    self.visit_expr(part);
                }
            }
            Expr::Trim {
                expr,
                trim_what,
                trim_characters,
                ..
            } => {
                self.visit_expr(expr);
                if let Some(what) = trim_what {
                    self.visit_expr(what);
                }
                if let Some(characters) = trim_characters {
                    self.visit_exprs(characters);
                }
            }
            Expr::Overlay {
                expr,
                overlay_what,
                overlay_from,
                overlay_for,
            } => {
                self.visit_expr(expr);
                self.visit_expr(overlay_what);
                self.visit_expr(overlay_from);
                if let Some(overlay_for) = overlay_for {
                    self.visit_expr(overlay_for);
                }
            }
            Expr::Function(function) => self.visit_function(function),
            Expr::Method(method) => {
                self.visit_expr(&mut method.expr);
                for function in &mut method.method_chain {
                    self.visit_function(function);
                }
            }
            Expr::Tuple(exprs) | Expr::Struct { values: exprs, .. } => self.visit_exprs(exprs),
            Expr::Array(array) => self.visit_exprs(&mut array.elem),
            Expr::GroupingSets(sets) | Expr::Cube(sets) | Expr::Rollup(sets) => {
                for set in sets {
                    self.visit_exprs(set);
                }
            }
            Expr::Subscript { expr, subscript } => {
                self.visit_expr(expr);
                match subscript.as_mut() {
                    Subscript::Index { index } => self.visit_expr(index),
                    Subscript::Slice {
                        lower_bound,
                        upper_bound,
                        stride,
                    } => {
                        for part in [lower_bound, upper_bound, stride].into_iter().flatten() {
                            self.visit_expr(part);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_function(&mut self, function: &mut Function) {
        for arguments in [&mut function.parameters, &mut function.args] {
            match arguments {
                FunctionArguments::Subquery(query) => self.visit_query(query),
                FunctionArguments::List(list) => self.visit_function_args(&mut list.args),
                FunctionArguments::None => {}
            }
        }
        if let Some(filter) = &mut function.filter {
            self.visit_expr(filter);
        }
        self.visit_order_by_exprs(&mut function.within_group);
        if let Some(WindowType::WindowSpec(spec)) = &mut function.over {
            self.visit_exprs(&mut spec.partition_by);
            self.visit_order_by_exprs(&mut spec.order_by);
        }
    }

    fn visit_function_args(&mut self, args: &mut [FunctionArg]) {
        for function_arg in args {
            let (FunctionArg::Named { arg, .. }
            | FunctionArg::ExprNamed { arg, .. }
            | FunctionArg::Unnamed(arg)) = function_arg;
            if let FunctionArgExpr::Expr(expr) = arg {
                self.visit_expr(expr);
            }
        }
    }

    fn qualify_name(&mut self, name: &mut ObjectName) {
        if name.0.len() != 1 || self.is_reserved(&name.0[0]) {
            return;
        }
        self.qualified.push(TableReference::from_object_name(name));
        name.0.insert(0, self.schema.clone());
    }

    /// A CTE in scope or a system catalog, which must stay unqualified.
    fn is_reserved(&self, table: &Ident) -> bool {
        if table.quote_style.is_some() {
            return self.ctes.iter().any(|cte| cte == &table.value);
        }
        self.ctes
            .iter()
            .any(|cte| cte.eq_ignore_ascii_case(&table.value))
            || is_system_catalog_table(&table.value)
    }
}

fn cte_name(cte: &Cte) -> String {
    cte.alias.name.value.clone()
}

/// The schema as an identifier, quoted when it would not survive unquoted.
fn schema_ident(schema: &str) -> Ident {
    let mut chars = schema.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$');
    if plain {
        Ident::new(schema)
    } else {
        Ident::with_quote('"', schema)
    }
}
