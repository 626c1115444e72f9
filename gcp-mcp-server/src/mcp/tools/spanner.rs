//! Spanner Tools
//!
//! Tools for browsing Spanner instances and databases and running read-only
//! queries.

use serde::Deserialize;
use serde_json::Value;

use super::{into_tool_result, parse_args};
use crate::error::ServiceError;
use crate::gcp::spanner::{
    cell_to_string, short_name, validate_read_only_sql, DatabasePath, ResultSet, LIST_TABLES_SQL,
};
use crate::gcp::CloudApi;
use crate::mcp::context::ToolContext;
use crate::mcp::format::{markdown_table, or_dash, truncate};
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

const DEFAULT_MAX_ROWS: usize = 100;
const MAX_ROWS: usize = 1000;
const MAX_CELL_CHARS: usize = 100;

/// Register spanner tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(list_instances_tool());
    registry.register_tool(list_databases_tool());
    registry.register_tool(list_tables_tool());
    registry.register_tool(execute_query_tool());
}

#[derive(Debug, Deserialize)]
struct ProjectParams {
    #[serde(default)]
    project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstanceParams {
    #[serde(default)]
    project_id: Option<String>,
    instance: String,
}

#[derive(Debug, Deserialize)]
struct DatabaseParams {
    #[serde(default)]
    project_id: Option<String>,
    instance: String,
    database: String,
}

fn require_non_empty(field: &str, value: &str) -> Result<(), McpError> {
    if value.trim().is_empty() {
        return Err(McpError::InvalidParams(format!("{} must not be empty", field)));
    }
    Ok(())
}

// ============================================================================
// spanner.list_instances
// ============================================================================

fn list_instances_tool() -> RegisteredTool {
    ToolBuilder::new("spanner.list_instances")
        .description("List Spanner instances in a project")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project to list (defaults to the current project)"
                }
            }
        }))
        .build(list_instances_handler)
}

async fn list_instances_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ProjectParams = parse_args(params)?;

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let instances = ctx
                .cloud()
                .await?
                .list_spanner_instances(&project_id)
                .await?;

            let mut out = format!("## Spanner instances in `{}`\n\n", project_id);
            if instances.is_empty() {
                out.push_str("No instances found.\n");
            } else {
                let rows: Vec<Vec<String>> = instances
                    .iter()
                    .map(|i| {
                        vec![
                            short_name(&i.name).to_string(),
                            or_dash(i.display_name.as_deref()).to_string(),
                            i.config
                                .as_deref()
                                .map(short_name)
                                .unwrap_or("-")
                                .to_string(),
                            i.node_count
                                .map(|n| n.to_string())
                                .unwrap_or_else(|| "-".to_string()),
                            or_dash(i.state.as_deref()).to_string(),
                        ]
                    })
                    .collect();
                out.push_str(&markdown_table(
                    &["Instance", "Display name", "Config", "Nodes", "State"],
                    &rows,
                ));
            }
            Ok(ToolsCallResult::text(out))
        }
        .await,
    )
}

// ============================================================================
// spanner.list_databases
// ============================================================================

fn list_databases_tool() -> RegisteredTool {
    ToolBuilder::new("spanner.list_databases")
        .description("List databases in a Spanner instance")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project (defaults to the current project)"
                },
                "instance": { "type": "string", "description": "Instance id" }
            },
            "required": ["instance"]
        }))
        .build(list_databases_handler)
}

async fn list_databases_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: InstanceParams = parse_args(params)?;
    require_non_empty("instance", &params.instance)?;

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let databases = ctx
                .cloud()
                .await?
                .list_spanner_databases(&project_id, params.instance.trim())
                .await?;

            let mut out = format!(
                "## Databases in `{}/{}`\n\n",
                project_id,
                params.instance.trim()
            );
            if databases.is_empty() {
                out.push_str("No databases found.\n");
            } else {
                let rows: Vec<Vec<String>> = databases
                    .iter()
                    .map(|d| {
                        vec![
                            short_name(&d.name).to_string(),
                            or_dash(d.state.as_deref()).to_string(),
                        ]
                    })
                    .collect();
                out.push_str(&markdown_table(&["Database", "State"], &rows));
            }
            Ok(ToolsCallResult::text(out))
        }
        .await,
    )
}

// ============================================================================
// spanner.list_tables
// ============================================================================

fn list_tables_tool() -> RegisteredTool {
    ToolBuilder::new("spanner.list_tables")
        .description("List tables and their columns in a Spanner database")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project (defaults to the current project)"
                },
                "instance": { "type": "string", "description": "Instance id" },
                "database": { "type": "string", "description": "Database id" }
            },
            "required": ["instance", "database"]
        }))
        .build(list_tables_handler)
}

async fn list_tables_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: DatabaseParams = parse_args(params)?;
    require_non_empty("instance", &params.instance)?;
    require_non_empty("database", &params.database)?;

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let path = DatabasePath::new(
                project_id,
                params.instance.trim(),
                params.database.trim(),
            );
            let text = describe_schema(ctx.cloud().await?, &path).await?;
            Ok(ToolsCallResult::text(text))
        }
        .await,
    )
}

/// Markdown description of every user table in the database.
pub(crate) async fn describe_schema(
    cloud: &dyn CloudApi,
    path: &DatabasePath,
) -> Result<String, ServiceError> {
    let result = cloud.execute_sql(path, LIST_TABLES_SQL).await?;
    Ok(render_schema(path, &result))
}

fn render_schema(path: &DatabasePath, result: &ResultSet) -> String {
    let mut out = format!(
        "## Schema of `{}/{}/{}`\n\n",
        path.project_id, path.instance, path.database
    );

    // rows: table_name, column_name, spanner_type, is_nullable
    let mut tables: Vec<(String, Vec<Vec<String>>)> = Vec::new();
    for row in &result.rows {
        let cell = |i: usize| row.get(i).map(cell_to_string).unwrap_or_default();
        let table = cell(0);
        let column = vec![cell(1), cell(2), cell(3)];
        match tables.last_mut() {
            Some((name, columns)) if *name == table => columns.push(column),
            _ => tables.push((table, vec![column])),
        }
    }

    if tables.is_empty() {
        out.push_str("No tables found.\n");
        return out;
    }

    for (table, columns) in &tables {
        out.push_str(&format!("### {}\n\n", table));
        out.push_str(&markdown_table(&["Column", "Type", "Nullable"], columns));
        out.push('\n');
    }
    out.push_str(&format!("{} tables\n", tables.len()));
    out
}

// ============================================================================
// spanner.execute_query
// ============================================================================

#[derive(Debug, Deserialize)]
struct ExecuteQueryParams {
    #[serde(default)]
    project_id: Option<String>,
    instance: String,
    database: String,
    sql: String,
    #[serde(default)]
    max_rows: Option<usize>,
}

fn execute_query_tool() -> RegisteredTool {
    ToolBuilder::new("spanner.execute_query")
        .description("Run a read-only SQL query (a single SELECT or WITH statement) against a Spanner database")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "Project (defaults to the current project)"
                },
                "instance": { "type": "string", "description": "Instance id" },
                "database": { "type": "string", "description": "Database id" },
                "sql": { "type": "string", "description": "SELECT or WITH statement" },
                "max_rows": {
                    "type": "integer",
                    "description": "Maximum rows to display (default 100)",
                    "minimum": 1,
                    "maximum": MAX_ROWS
                }
            },
            "required": ["instance", "database", "sql"]
        }))
        .build(execute_query_handler)
}

async fn execute_query_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ExecuteQueryParams = parse_args(params)?;
    require_non_empty("instance", &params.instance)?;
    require_non_empty("database", &params.database)?;
    let sql = validate_read_only_sql(&params.sql)?;
    let max_rows = params.max_rows.unwrap_or(DEFAULT_MAX_ROWS).clamp(1, MAX_ROWS);

    into_tool_result(
        async {
            let project_id = ctx.resolve_project_id(params.project_id.as_deref()).await?;
            let path = DatabasePath::new(
                project_id,
                params.instance.trim(),
                params.database.trim(),
            );
            let result = ctx.cloud().await?.execute_sql(&path, sql).await?;
            Ok(ToolsCallResult::text(render_result_set(&result, max_rows)))
        }
        .await,
    )
}

fn render_result_set(result: &ResultSet, max_rows: usize) -> String {
    let columns = result.column_names();
    if columns.is_empty() {
        return "Query returned no columns.\n".to_string();
    }
    let headers: Vec<&str> = columns.iter().map(String::as_str).collect();
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .take(max_rows)
        .map(|row| {
            row.iter()
                .map(|v| truncate(&cell_to_string(v), MAX_CELL_CHARS))
                .collect()
        })
        .collect();

    let mut out = markdown_table(&headers, &rows);
    if result.rows.len() > max_rows {
        out.push_str(&format!(
            "\nShowing {} of {} rows\n",
            max_rows,
            result.rows.len()
        ));
    } else {
        out.push_str(&format!("\n{} rows\n", result.rows.len()));
    }
    out
}
