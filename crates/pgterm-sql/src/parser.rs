//! SQL parsing and statement classification.

use crate::error::SqlError;
use sqlparser::ast::{ObjectName, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Parses statements with the PostgreSQL grammar.
pub struct SqlAnalyzer {
    dialect: PostgreSqlDialect,
}

impl Clone for SqlAnalyzer {
    fn clone(&self) -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }
}

impl Default for SqlAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlAnalyzer {
    /// Create a new SQL analyzer.
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Parse a SQL string into statements.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, SqlError> {
        Parser::parse_sql(&self.dialect, sql).map_err(|e| SqlError::InvalidSql(e.to_string()))
    }

    /// The kind of a parsed statement.
    pub fn get_operation(&self, stmt: &Statement) -> SqlOperation {
        match stmt {
            Statement::Query(_) => SqlOperation::Select,
            Statement::Insert(_) => SqlOperation::Insert,
            Statement::Update { .. } => SqlOperation::Update,
            Statement::Delete(_) => SqlOperation::Delete,
            Statement::CreateTable(_) => SqlOperation::CreateTable,
            Statement::AlterTable { .. } => SqlOperation::AlterTable,
            _ => SqlOperation::Other,
        }
    }
}

/// A table mentioned by a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    /// Explicit schema, if the statement named one.
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
}

impl TableReference {
    /// Build a reference from a (possibly qualified) object name.
    pub fn from_object_name(name: &ObjectName) -> Self {
        let parts = &name.0;
        match parts.len() {
            0 => Self {
                schema: None,
                name: String::new(),
            },
            1 => Self {
                schema: None,
                name: parts[0].value.clone(),
            },
            n => Self {
                schema: Some(parts[n - 2].value.clone()),
                name: parts[n - 1].value.clone(),
            },
        }
    }

    /// Whether the reference carries its own schema.
    pub fn is_qualified(&self) -> bool {
        self.schema.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl std::fmt::Display for TableReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Statement kinds the qualifier distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    AlterTable,
    Other,
}

impl SqlOperation {
    /// Whether unqualified tables in this kind of statement get the active schema.
    pub fn is_qualified(self) -> bool {
        !matches!(self, SqlOperation::Other)
    }
}

/// Relations in `pg_catalog`. They resolve ahead of the search path, so an
/// unqualified name from this list always means the catalog.
const PG_CATALOG_RELATIONS: &[&str] = &[
    // tables
    "pg_aggregate", "pg_am", "pg_amop", "pg_amproc", "pg_attrdef", "pg_attribute",
    "pg_auth_members", "pg_authid", "pg_cast", "pg_class", "pg_collation", "pg_constraint",
    "pg_conversion", "pg_database", "pg_db_role_setting", "pg_default_acl", "pg_depend",
    "pg_description", "pg_enum", "pg_event_trigger", "pg_extension", "pg_foreign_data_wrapper",
    "pg_foreign_server", "pg_foreign_table", "pg_index", "pg_inherits", "pg_init_privs",
    "pg_language", "pg_largeobject", "pg_largeobject_metadata", "pg_namespace", "pg_opclass",
    "pg_operator", "pg_opfamily", "pg_parameter_acl", "pg_partitioned_table", "pg_policy",
    "pg_proc", "pg_publication", "pg_publication_namespace", "pg_publication_rel", "pg_range",
    "pg_replication_origin", "pg_rewrite", "pg_seclabel", "pg_sequence", "pg_shdepend",
    "pg_shdescription", "pg_shseclabel", "pg_statistic", "pg_statistic_ext",
    "pg_statistic_ext_data", "pg_subscription", "pg_subscription_rel", "pg_tablespace",
    "pg_transform", "pg_trigger", "pg_ts_config", "pg_ts_config_map", "pg_ts_dict",
    "pg_ts_parser", "pg_ts_template", "pg_type", "pg_user_mapping",
    // views
    "pg_available_extension_versions", "pg_available_extensions", "pg_backend_memory_contexts",
    "pg_config", "pg_cursors", "pg_file_settings", "pg_group", "pg_hba_file_rules",
    "pg_ident_file_mappings", "pg_indexes", "pg_locks", "pg_matviews", "pg_policies",
    "pg_prepared_statements", "pg_prepared_xacts", "pg_publication_tables",
    "pg_replication_origin_status", "pg_replication_slots", "pg_roles", "pg_rules",
    "pg_seclabels", "pg_sequences", "pg_settings", "pg_shadow", "pg_shmem_allocations",
    "pg_stats", "pg_stats_ext", "pg_stats_ext_exprs", "pg_tables", "pg_timezone_abbrevs",
    "pg_timezone_names", "pg_user", "pg_user_mappings", "pg_views",
    // statistics views
    "pg_stat_activity", "pg_stat_all_indexes", "pg_stat_all_tables", "pg_stat_archiver",
    "pg_stat_bgwriter", "pg_stat_checkpointer", "pg_stat_database",
    "pg_stat_database_conflicts", "pg_stat_gssapi", "pg_stat_io",
    "pg_stat_progress_analyze", "pg_stat_progress_basebackup", "pg_stat_progress_cluster",
    "pg_stat_progress_copy", "pg_stat_progress_create_index", "pg_stat_progress_vacuum",
    "pg_stat_recovery_prefetch", "pg_stat_replication", "pg_stat_replication_slots",
    "pg_stat_slru", "pg_stat_ssl", "pg_stat_subscription", "pg_stat_subscription_stats",
    "pg_stat_sys_indexes", "pg_stat_sys_tables", "pg_stat_user_functions",
    "pg_stat_user_indexes", "pg_stat_user_tables", "pg_stat_wal", "pg_stat_wal_receiver",
    "pg_stat_xact_all_tables", "pg_stat_xact_sys_tables", "pg_stat_xact_user_functions",
    "pg_stat_xact_user_tables", "pg_statio_all_indexes", "pg_statio_all_sequences",
    "pg_statio_all_tables", "pg_statio_sys_indexes", "pg_statio_sys_sequences",
    "pg_statio_sys_tables", "pg_statio_user_indexes", "pg_statio_user_sequences",
    "pg_statio_user_tables",
];

/// Check if a table is a system catalog that must resolve through the search path.
pub fn is_system_catalog_table(table_name: &str) -> bool {
    let table_lower = table_name.to_lowercase();

    if table_lower.starts_with("pg_catalog.") || table_lower.starts_with("information_schema.") {
        return true;
    }

    PG_CATALOG_RELATIONS.contains(&table_lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_is_invalid_sql() {
        let analyzer = SqlAnalyzer::new();
        assert!(matches!(
            analyzer.parse("SELEC * FORM t"),
            Err(SqlError::InvalidSql(_))
        ));
    }

    #[test]
    fn test_operations() {
        let analyzer = SqlAnalyzer::new();
        let cases = [
            ("SELECT * FROM t", SqlOperation::Select),
            ("INSERT INTO t VALUES (1)", SqlOperation::Insert),
            ("UPDATE t SET a = 1", SqlOperation::Update),
            ("DELETE FROM t", SqlOperation::Delete),
            ("CREATE TABLE t (id INT)", SqlOperation::CreateTable),
            ("ALTER TABLE t ADD COLUMN b INT", SqlOperation::AlterTable),
            ("DROP TABLE t", SqlOperation::Other),
        ];
        for (sql, expected) in cases {
            let stmts = analyzer.parse(sql).unwrap();
            assert_eq!(analyzer.get_operation(&stmts[0]), expected, "{sql}");
        }
    }

    #[test]
    fn test_table_reference_from_name() {
        let analyzer = SqlAnalyzer::new();
        let stmts = analyzer.parse("DROP TABLE sales.orders").unwrap();
        let Statement::Drop { names, .. } = &stmts[0] else {
            panic!("expected DROP");
        };
        let reference = TableReference::from_object_name(&names[0]);
        assert_eq!(reference.schema.as_deref(), Some("sales"));
        assert_eq!(reference.name, "orders");
        assert!(reference.is_qualified());
        assert_eq!(reference.to_string(), "sales.orders");
    }

    #[test]
    fn test_system_catalogs() {
        assert!(is_system_catalog_table("pg_class"));
        assert!(is_system_catalog_table("PG_TABLES"));
        assert!(is_system_catalog_table("information_schema.columns"));
        assert!(!is_system_catalog_table("orders"));
        assert!(!is_system_catalog_table("page_views"));
    }

    #[test]
    fn test_user_tables_with_pg_prefix() {
        assert!(is_system_catalog_table("pg_stat_activity"));
        assert!(!is_system_catalog_table("pg_stats_custom"));
        assert!(!is_system_catalog_table("pg_orders"));
    }
}
