//! Text shown by the shell: the welcome banner and the `help;` catalog.

use pgterm_adapter_pg::ServerInfo;
use pgterm_core::Session;

pub fn banner(server: &ServerInfo) -> String {
    format!(
        "Welcome to the pgterm PostgreSQL client v{}.  Commands end with ;.\n\
         Your PostgreSQL user ID is {}\n\
         Server version: PostgreSQL {}\n\
         \n\
         Type 'help;' for help.\n",
        env!("CARGO_PKG_VERSION"),
        server.user,
        server.display_version(),
    )
}

/// The command catalog, filled in with where the session currently points.
pub fn help_text(session: &Session) -> String {
    let schema = session.schema();
    let database = session.database();
    format!(
        r#"
Supported commands:

SHOW SCHEMAS;
    Lists the schemas in the current database.

SHOW TABLES;
    Lists the tables in the current schema ({schema}).

SHOW DATABASES;
    Lists the databases on the server, excluding templates.

SHOW CREATE TABLE <table>;
    Prints a CREATE TABLE statement for the table.

DESCRIBE <table>;
DESC <table>;
    Shows column names, data types and nullability.

USE SCHEMA <schema>;
    Sets the schema unqualified table names resolve to.

USE DATABASE <database>;
    Reconnects to another database with the same credentials.

CREATE ...;
GRANT ...;
ALTER ...;
    Sent to the server; table names in CREATE TABLE and ALTER TABLE are
    qualified with the current schema.

Any other SQL statement (SELECT, INSERT, UPDATE, DELETE, ...) is qualified
with the current schema and sent to the server. UPDATE and DELETE without a
WHERE clause ask for confirmation first.

exit; quit;
    Closes the connection and leaves.

Notes:
    - Statements end with a semicolon and may span several lines.
    - Commands are case-insensitive.
    - Current schema: {schema}
    - Current database: {database}
"#
    )
}
